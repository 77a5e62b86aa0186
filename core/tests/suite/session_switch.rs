//! Session switching: atomic swap to a fresh ledger and discard of
//! in-flight fetches issued for the previous session.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fable_core::FableErr;
use fable_core::config::TuningConfig;
use fable_core::history::{HistoryError, HistoryStore};
use fable_core::session::{ResyncTrigger, SessionRegistry};
use fable_protocol::SessionId;
use fable_protocol::events::{SessionEvent, TurnStartedEvent};
use fable_protocol::message::{MessageRecord, Sender};
use pretty_assertions::assert_eq;

/// Switches the registry to another session while the fetch is in flight.
struct SwitchingStore {
    registry: Arc<SessionRegistry>,
    next_session: SessionId,
    records: Vec<MessageRecord>,
}

#[async_trait]
impl HistoryStore for SwitchingStore {
    async fn fetch_history(
        &self,
        _session_id: SessionId,
    ) -> Result<Vec<MessageRecord>, HistoryError> {
        self.registry.activate(self.next_session);
        Ok(self.records.clone())
    }
}

#[tokio::test]
async fn test_fetch_resolving_after_switch_is_discarded() {
    super::init_test_logging();
    let registry = Arc::new(SessionRegistry::new(TuningConfig::default()));
    let old = registry.activate(SessionId::new());
    old.push_local(MessageRecord::local(Sender::User, "from the old session"));

    let next_session = SessionId::new();
    let store = SwitchingStore {
        registry: registry.clone(),
        next_session,
        records: vec![MessageRecord::confirmed(
            "m-1",
            Utc::now(),
            Sender::Dm,
            "stale narration",
        )],
    };

    let err = old
        .resync(ResyncTrigger::Reactivated, &store)
        .await
        .unwrap_err();
    assert!(matches!(err, FableErr::StaleSession { .. }));

    // The new session never saw the stale snapshot.
    let current = registry.active().unwrap();
    assert_eq!(current.session_id(), next_session);
    assert!(current.messages().is_empty());
}

#[test]
fn test_switch_swaps_to_empty_ledger() {
    let registry = SessionRegistry::new(TuningConfig::default());
    let first_session = SessionId::new();
    let first = registry.activate(first_session);
    registry.dispatch(&SessionEvent::TurnStarted(TurnStartedEvent {
        session_id: first_session,
        turn_number: 1,
    }));
    assert_eq!(first.snapshot().turns.len(), 1);

    let second = registry.activate(SessionId::new());
    assert!(second.snapshot().turns.is_empty());
    assert!(!second.snapshot().is_processing);
}

#[test]
fn test_events_for_previous_session_are_dropped_after_switch() {
    let registry = SessionRegistry::new(TuningConfig::default());
    let first_session = SessionId::new();
    registry.activate(first_session);
    let second = registry.activate(SessionId::new());

    // A late frame from the old session's stream.
    registry.dispatch(&SessionEvent::TurnStarted(TurnStartedEvent {
        session_id: first_session,
        turn_number: 7,
    }));
    assert!(second.snapshot().turns.is_empty());
}
