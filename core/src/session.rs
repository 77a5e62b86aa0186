//! Per-session ownership of the ledger and message list.
//!
//! Each session's state lives behind exactly one [`SessionHandle`]; all
//! mutation is serialized through its lock, which is what preserves the
//! append-only streaming semantics when the host delivers events from more
//! than one task. State is never shared across sessions, and it is never
//! module-level: the handle is owned by whoever manages session lifecycle
//! and passed to consumers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fable_protocol::SessionId;
use fable_protocol::events::SessionEvent;
use fable_protocol::message::MessageRecord;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::TuningConfig;
use crate::error::{FableErr, Result};
use crate::history::{HistoryStore, backfill_ledger};
use crate::ledger::{LedgerSnapshot, TurnLedger};
use crate::reconcile::{is_recent_dm_duplicate, merge};

/// Why a history resync was requested. The trigger carries no behavior of
/// its own; the merge algorithm stays free of timing concerns and the host
/// decides when to call it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncTrigger {
    /// A turn finished streaming and completed.
    StreamCompleted,
    /// The consumer surface became visible again.
    Reactivated,
    /// The host explicitly asked for a reload.
    ExplicitReload,
}

struct SessionState {
    ledger: TurnLedger,
    messages: Vec<MessageRecord>,
}

/// Owner of one session's ledger and local message list.
pub struct SessionHandle {
    session_id: SessionId,
    config: TuningConfig,
    state: Mutex<SessionState>,
    /// Bumped whenever the session's contents are discarded (clear or
    /// switch-away). A history fetch captures the value at issue time and
    /// its resolution is dropped if the value moved.
    generation: AtomicU64,
    snapshot_tx: watch::Sender<LedgerSnapshot>,
}

impl SessionHandle {
    pub fn new(session_id: SessionId, config: TuningConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(LedgerSnapshot::default());
        Self {
            session_id,
            config,
            state: Mutex::new(SessionState {
                ledger: TurnLedger::new(),
                messages: Vec::new(),
            }),
            generation: AtomicU64::new(0),
            snapshot_tx,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    // State is plain data with no invariants spanning the panic point, so a
    // poisoned lock still holds a consistent value.
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot_tx.send_replace(state.ledger.snapshot());
    }

    /// Apply one decoded channel event.
    ///
    /// Events for other sessions are dropped. Returns true when the host
    /// should schedule a history resync (a turn completed and the config
    /// asks for post-completion reconciliation).
    pub fn apply_event(&self, event: &SessionEvent) -> bool {
        if event.session_id() != self.session_id {
            debug!(
                event_session = %event.session_id(),
                session = %self.session_id,
                "event for another session dropped"
            );
            return false;
        }
        let mut state = self.state();
        state.ledger.apply(event);
        self.publish(&state);
        matches!(event, SessionEvent::TurnComplete(_)) && self.config.resync_after_completion
    }

    /// Current render-ready view.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Watch endpoint for consumers that want to await snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<LedgerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Copy of the local message list, ascending by timestamp.
    pub fn messages(&self) -> Vec<MessageRecord> {
        self.state().messages.clone()
    }

    /// Optimistically insert a record, subject to the content-based
    /// duplicate guard. Returns false when the record was suppressed.
    pub fn push_local(&self, record: MessageRecord) -> bool {
        let mut state = self.state();
        if is_recent_dm_duplicate(&state.messages, &record, self.config.dm_duplicate_window) {
            debug!(session = %self.session_id, "duplicate DM record suppressed");
            return false;
        }
        state.messages.push(record);
        state.messages.sort_by_key(|r| r.timestamp);
        true
    }

    /// Reset the session to empty. In-flight history fetches issued before
    /// the reset are discarded when they resolve.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.ledger.clear();
        state.messages.clear();
        self.publish(&state);
    }

    /// Replace the session's state from a flat backend history, backfilling
    /// synthetic turns for sessions with no live turn metadata.
    pub fn load_from_history(&self, records: &[MessageRecord]) {
        let mut state = self.state();
        state.ledger = backfill_ledger(self.session_id, records);
        state.messages = records.to_vec();
        state.messages.sort_by_key(|r| r.timestamp);
        self.publish(&state);
    }

    /// Fetch authoritative history and merge it into the local message
    /// list.
    ///
    /// Safe to call at any time, any number of times: merging the same
    /// snapshot twice is a no-op beyond the first application, and a fetch
    /// that fails or resolves after the session changed leaves local state
    /// untouched. Turn-lifecycle state is never touched by a resync.
    pub async fn resync(&self, trigger: ResyncTrigger, store: &dyn HistoryStore) -> Result<()> {
        let generation = self.generation.load(Ordering::SeqCst);
        debug!(session = %self.session_id, ?trigger, "fetching authoritative history");
        let fetched = store.fetch_history(self.session_id).await?;

        let mut state = self.state();
        if self.generation.load(Ordering::SeqCst) != generation {
            info!(session = %self.session_id, "session changed mid-fetch; snapshot discarded");
            return Err(FableErr::StaleSession {
                session_id: self.session_id,
            });
        }

        // Content-based duplicate guard, applied before the identity merge.
        // Records that would be consumed as replacements (id or timestamp
        // match) are exempt; filtering those would strand their local twin
        // as unconfirmed forever.
        let candidates: Vec<MessageRecord> = fetched
            .into_iter()
            .filter(|record| {
                let replaces = record
                    .message_id
                    .as_deref()
                    .map(|id| {
                        state
                            .messages
                            .iter()
                            .any(|m| m.message_id.as_deref() == Some(id))
                    })
                    .unwrap_or(false)
                    || state.messages.iter().any(|m| m.timestamp == record.timestamp);
                if replaces
                    || !is_recent_dm_duplicate(
                        &state.messages,
                        record,
                        self.config.dm_duplicate_window,
                    )
                {
                    true
                } else {
                    warn!(session = %self.session_id, "content-duplicate backend record suppressed");
                    false
                }
            })
            .collect();

        state.messages = merge(&state.messages, &candidates);
        Ok(())
    }

    /// Invalidate outstanding fetches without touching state. Called when
    /// the handle stops being the active session.
    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Owner of the active session.
///
/// Switching sessions atomically swaps in a fresh, empty handle; nothing
/// carries over, and fetches still in flight for the previous session are
/// invalidated rather than merged into the new one.
pub struct SessionRegistry {
    config: TuningConfig,
    active: Mutex<Option<Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new(config: TuningConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    /// Make `session_id` the active session, creating a fresh handle unless
    /// it is already active.
    pub fn activate(&self, session_id: SessionId) -> Arc<SessionHandle> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = active.as_ref()
            && handle.session_id() == session_id
        {
            return handle.clone();
        }
        if let Some(previous) = active.take() {
            previous.invalidate();
            info!(
                previous = %previous.session_id(),
                next = %session_id,
                "switching active session"
            );
        }
        let handle = Arc::new(SessionHandle::new(session_id, self.config.clone()));
        *active = Some(handle.clone());
        handle
    }

    pub fn active(&self) -> Option<Arc<SessionHandle>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Route a channel event to the active session. Events for any other
    /// session are dropped. Returns true when a resync should be scheduled.
    pub fn dispatch(&self, event: &SessionEvent) -> bool {
        match self.active() {
            Some(handle) if handle.session_id() == event.session_id() => {
                handle.apply_event(event)
            }
            _ => {
                debug!(session = %event.session_id(), "event for inactive session dropped");
                false
            }
        }
    }
}
