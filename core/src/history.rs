//! History-store collaborator seam and flat-history backfill.

use async_trait::async_trait;
use fable_protocol::events::{ResponseKind, TurnMessageEvent};
use fable_protocol::message::{MessageRecord, Sender};
use fable_protocol::{SessionId, TurnNumber};
use thiserror::Error;

use crate::ledger::TurnLedger;

/// Failure reported by the backing store. Retryable from the caller's point
/// of view; local state is never modified on a failed fetch.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HistoryError {
    pub message: String,
}

impl HistoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outbound interface to the backing store.
///
/// The store is eventually consistent: a snapshot may lag behind live
/// events, so `fetch_history` must be callable repeatedly and its results
/// merged idempotently.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn fetch_history(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<MessageRecord>, HistoryError>;
}

/// Rebuild a ledger from a flat backend message history.
///
/// Used to backfill sessions that have no live turn metadata: records are
/// grouped into synthetic turns by alternating user/DM messages and driven
/// through the ordinary ledger operations, so the grouping cannot violate
/// ledger invariants. A user message opens a turn (completing any turn left
/// open by a previous input-only exchange); a DM message concludes the open
/// turn, or opens and concludes one of its own if none is open.
pub fn backfill_ledger(session_id: SessionId, records: &[MessageRecord]) -> TurnLedger {
    let mut ordered: Vec<&MessageRecord> = records.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);

    let mut ledger = TurnLedger::new();
    let mut turn_number: TurnNumber = 0;
    for record in ordered {
        match record.sender {
            Sender::User => {
                if ledger.is_processing() {
                    // Input-only exchange; close it so the next start lands.
                    ledger.turn_complete(turn_number);
                }
                turn_number += 1;
                ledger.turn_started(turn_number);
                ledger.turn_message(&TurnMessageEvent::new(
                    session_id,
                    turn_number,
                    ResponseKind::TurnInput,
                    record.text.clone(),
                ));
            }
            Sender::Dm => {
                if !ledger.is_processing() {
                    turn_number += 1;
                    ledger.turn_started(turn_number);
                }
                let mut final_msg = TurnMessageEvent::new(
                    session_id,
                    turn_number,
                    ResponseKind::Final,
                    record.text.clone(),
                );
                final_msg.message_id = record.message_id.clone();
                final_msg.role = Some(Sender::Dm);
                ledger.turn_message(&final_msg);
                ledger.turn_complete(turn_number);
            }
        }
    }
    ledger
}
