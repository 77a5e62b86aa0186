//! Reconciliation scenarios: streamed content confirmed by a later history
//! fetch, and backfill from a flat history.

use async_trait::async_trait;
use chrono::Utc;
use fable_core::config::TuningConfig;
use fable_core::history::{HistoryError, HistoryStore};
use fable_core::ledger::TurnPhase;
use fable_core::session::{ResyncTrigger, SessionHandle};
use fable_protocol::SessionId;
use fable_protocol::message::{MessageRecord, Sender};
use pretty_assertions::assert_eq;

struct FixedStore(Vec<MessageRecord>);

#[async_trait]
impl HistoryStore for FixedStore {
    async fn fetch_history(
        &self,
        _session_id: SessionId,
    ) -> Result<Vec<MessageRecord>, HistoryError> {
        Ok(self.0.clone())
    }
}

struct FailingStore;

#[async_trait]
impl HistoryStore for FailingStore {
    async fn fetch_history(
        &self,
        _session_id: SessionId,
    ) -> Result<Vec<MessageRecord>, HistoryError> {
        Err(HistoryError::new("backend unavailable"))
    }
}

#[tokio::test]
async fn test_reconciliation_after_streamed_turn() {
    super::init_test_logging();
    let handle = SessionHandle::new(SessionId::new(), TuningConfig::default());
    let asked_at = Utc::now();
    let answered_at = asked_at + chrono::Duration::seconds(4);

    // Unconfirmed user+DM pair built from the live stream.
    handle.push_local(MessageRecord {
        message_id: None,
        timestamp: asked_at,
        sender: Sender::User,
        text: "I open the door".to_string(),
        is_local: true,
    });
    handle.push_local(MessageRecord {
        message_id: None,
        timestamp: answered_at,
        sender: Sender::Dm,
        text: "The door creaks open.".to_string(),
        is_local: true,
    });

    // The backend echoes the same pair with identities assigned.
    let store = FixedStore(vec![
        MessageRecord::confirmed("m-1", asked_at, Sender::User, "I open the door"),
        MessageRecord::confirmed("m-2", answered_at, Sender::Dm, "The door creaks open."),
    ]);
    handle
        .resync(ResyncTrigger::StreamCompleted, &store)
        .await
        .unwrap();

    let messages = handle.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| !m.is_local));
    assert_eq!(messages[0].message_id.as_deref(), Some("m-1"));
    assert_eq!(messages[1].message_id.as_deref(), Some("m-2"));
}

#[tokio::test]
async fn test_failed_fetch_preserves_local_state() {
    let handle = SessionHandle::new(SessionId::new(), TuningConfig::default());
    handle.push_local(MessageRecord::local(Sender::User, "still visible"));

    let err = handle
        .resync(ResyncTrigger::Reactivated, &FailingStore)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("backend unavailable"));

    let messages = handle.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "still visible");
    assert!(messages[0].is_local);
}

#[tokio::test]
async fn test_empty_backend_snapshot_clears_nothing() {
    let handle = SessionHandle::new(SessionId::new(), TuningConfig::default());
    handle.push_local(MessageRecord::local(Sender::User, "one"));
    handle.push_local(MessageRecord::local(Sender::Dm, "two"));

    handle
        .resync(ResyncTrigger::ExplicitReload, &FixedStore(Vec::new()))
        .await
        .unwrap();
    assert_eq!(handle.messages().len(), 2);
}

#[test]
fn test_load_from_history_backfills_turns() {
    let handle = SessionHandle::new(SessionId::new(), TuningConfig::default());
    let base = Utc::now();
    let records = vec![
        MessageRecord::confirmed("m-1", base, Sender::User, "I listen at the door"),
        MessageRecord::confirmed(
            "m-2",
            base + chrono::Duration::seconds(3),
            Sender::Dm,
            "Muffled voices argue inside.",
        ),
    ];

    handle.load_from_history(&records);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.turns.len(), 1);
    assert!(!snapshot.is_processing);
    let turn = snapshot.turn(1).unwrap();
    assert_eq!(turn.input.as_deref(), Some("I listen at the door"));
    assert_eq!(
        turn.final_message.as_ref().unwrap().text,
        "Muffled voices argue inside."
    );
    assert_eq!(turn.phase, TurnPhase::Completed);
    assert_eq!(handle.messages().len(), 2);
}

#[tokio::test]
async fn test_resync_only_touches_messages_not_turns() {
    // A merge landing while a new turn is already streaming must leave the
    // turn-lifecycle state alone.
    use fable_protocol::events::{
        ResponseKind, SessionEvent, TurnMessageEvent, TurnStartedEvent,
    };

    let handle = SessionHandle::new(SessionId::new(), TuningConfig::default());
    let session_id = handle.session_id();
    handle.apply_event(&SessionEvent::TurnStarted(TurnStartedEvent {
        session_id,
        turn_number: 1,
    }));
    handle.apply_event(&SessionEvent::TurnMessage(TurnMessageEvent::new(
        session_id,
        1,
        ResponseKind::Streaming,
        "mid-stream",
    )));

    let store = FixedStore(vec![MessageRecord::confirmed(
        "m-1",
        Utc::now(),
        Sender::Dm,
        "old narration",
    )]);
    handle
        .resync(ResyncTrigger::Reactivated, &store)
        .await
        .unwrap();

    let snapshot = handle.snapshot();
    assert!(snapshot.is_processing);
    assert!(snapshot.is_any_turn_streaming);
    assert_eq!(snapshot.turn(1).unwrap().streaming_text, "mid-stream");
    assert_eq!(handle.messages().len(), 1);
}
