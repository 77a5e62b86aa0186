//! The Turn Ledger: canonical in-memory state of all turns for a session.
//!
//! The ledger consumes raw turn-lifecycle events and produces a queryable,
//! render-ready view. Every operation is an idempotent, synchronous, pure
//! state transition: no I/O, no awaiting, and no panicking on malformed
//! input. Protocol anomalies (conflicting turn starts, sub-messages for
//! terminal turns) are logged and ignored so a live stream can never halt
//! event processing.

mod snapshot;

pub use snapshot::LedgerSnapshot;

use std::collections::BTreeMap;

use fable_protocol::TurnNumber;
use fable_protocol::events::{
    ResponseKind, SessionEvent, TurnErrorPayload, TurnMessageEvent,
};
use fable_protocol::message::{FinalMessage, Sender};
use tracing::{debug, warn};

/// Lifecycle phase of a single turn.
///
/// `Streaming` is not a phase of its own: deltas may arrive and stop
/// repeatedly while a turn stays `Started`, so streaming is tracked as a
/// flag on [`Turn`]. `Completed` and `Errored` are terminal; nothing short
/// of a full ledger [`TurnLedger::clear`] reopens them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Started,
    Completed,
    Errored,
}

/// One unit of interaction: a player submission and the narrated response.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Turn {
    /// Backend-assigned number, strictly increasing per session.
    pub turn_number: TurnNumber,

    /// The submission that initiated the turn. None until the input echo
    /// sub-message arrives.
    pub input: Option<String>,

    /// Accumulated narration content. Grows monotonically while streaming;
    /// never shrinks until the whole ledger is cleared.
    pub streaming_text: String,

    /// The completed response payload. None until the final sub-message.
    pub final_message: Option<FinalMessage>,

    /// True from the first streaming delta until completion or error.
    pub is_streaming: bool,

    /// Present iff the turn failed terminally. Partial narration is kept.
    pub error: Option<TurnErrorPayload>,

    /// Current lifecycle phase.
    pub phase: TurnPhase,
}

impl Turn {
    fn new(turn_number: TurnNumber) -> Self {
        Self {
            turn_number,
            input: None,
            streaming_text: String::new(),
            final_message: None,
            is_streaming: false,
            error: None,
            phase: TurnPhase::Started,
        }
    }

    /// Whether the turn has concluded, successfully or not.
    pub fn is_terminal(&self) -> bool {
        self.phase != TurnPhase::Started
    }
}

/// Ordered mapping from turn number to turn state, plus the derived
/// processing marker.
///
/// One ledger per session; mutation must be serialized by the owner (see
/// [`crate::session::SessionHandle`]). The ledger itself is single-threaded
/// plain data.
#[derive(Debug, Clone, Default)]
pub struct TurnLedger {
    turns: BTreeMap<TurnNumber, Turn>,
    processing_turn: Option<TurnNumber>,
}

impl TurnLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one decoded channel event to the matching operation.
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::TurnStarted(ev) => self.turn_started(ev.turn_number),
            SessionEvent::TurnMessage(ev) => self.turn_message(ev),
            SessionEvent::TurnComplete(ev) => self.turn_complete(ev.turn_number),
            SessionEvent::TurnError(ev) => self.turn_error(ev.turn_number, ev.error.clone()),
        }
    }

    /// Open a turn and mark it as processing.
    ///
    /// Idempotent: re-starting an existing non-terminal turn is a no-op
    /// beyond setting the processing marker. Turns are strictly sequential,
    /// so a start for a different turn while one is still processing is a
    /// protocol anomaly: it is logged and ignored rather than corrupting
    /// the in-flight turn.
    pub fn turn_started(&mut self, turn_number: TurnNumber) {
        if let Some(processing) = self.processing_turn
            && processing != turn_number
        {
            warn!(
                turn_number,
                processing, "turn_started while another turn is processing; ignored"
            );
            return;
        }

        match self.turns.get(&turn_number) {
            Some(turn) if turn.is_terminal() => {
                warn!(turn_number, "turn_started for a concluded turn; ignored");
                return;
            }
            Some(_) => {}
            None => {
                // Turn numbers only move forward; a fresh start below the
                // current maximum means the stream replayed an old frame.
                if let Some((&max, _)) = self.turns.last_key_value()
                    && turn_number <= max
                {
                    warn!(turn_number, max, "non-monotonic turn_started; ignored");
                    return;
                }
                self.turns.insert(turn_number, Turn::new(turn_number));
                debug!(turn_number, "turn started");
            }
        }
        self.processing_turn = Some(turn_number);
    }

    /// Apply a sub-message, routed by its `response_type`.
    ///
    /// Tolerates content for a turn not yet marked started (the turn is
    /// created on first reference) and replayed frames (input echoes and
    /// streaming deltas are deduplicated).
    pub fn turn_message(&mut self, ev: &TurnMessageEvent) {
        if ev.response_index != ev.response_type.expected_index() {
            debug!(
                turn_number = ev.turn_number,
                response_index = ev.response_index,
                "response_index disagrees with response_type; type wins"
            );
        }

        let turn = self
            .turns
            .entry(ev.turn_number)
            .or_insert_with(|| Turn::new(ev.turn_number));
        if turn.is_terminal() {
            warn!(
                turn_number = ev.turn_number,
                "sub-message for a concluded turn; ignored"
            );
            return;
        }

        match ev.response_type {
            ResponseKind::TurnInput => match &turn.input {
                None => turn.input = Some(ev.content.clone()),
                Some(existing) if *existing == ev.content => {}
                Some(_) => {
                    // First write wins.
                    warn!(
                        turn_number = ev.turn_number,
                        "conflicting input echo; keeping the first"
                    );
                }
            },
            ResponseKind::Streaming => {
                if ev.content.is_empty() {
                    return;
                }
                // A retransmitted chunk arrives as an exact copy of the tail
                // of what we already accumulated; appending it again would
                // double the text.
                if turn.streaming_text.ends_with(&ev.content) {
                    debug!(
                        turn_number = ev.turn_number,
                        "retransmitted streaming delta; ignored"
                    );
                } else {
                    turn.streaming_text.push_str(&ev.content);
                }
                turn.is_streaming = true;
            }
            ResponseKind::Final => {
                let text = if ev.content.is_empty() {
                    // Some backends send an empty final and rely on the
                    // streamed accumulation being the full text.
                    turn.streaming_text.clone()
                } else {
                    ev.content.clone()
                };
                turn.final_message = Some(FinalMessage {
                    text,
                    role: ev.role.unwrap_or(Sender::Dm),
                    message_id: ev.message_id.clone(),
                    audio_url: ev.audio_url.clone(),
                    flags: ev.flags.clone(),
                });
                // Content arriving is not the same as the turn concluding;
                // completion is a separate explicit signal.
                turn.is_streaming = false;
            }
        }
    }

    /// Conclude a turn successfully.
    pub fn turn_complete(&mut self, turn_number: TurnNumber) {
        let Some(turn) = self.turns.get_mut(&turn_number) else {
            warn!(turn_number, "turn_complete for an unknown turn; ignored");
            return;
        };
        if turn.phase == TurnPhase::Errored {
            warn!(turn_number, "turn_complete for an errored turn; ignored");
            return;
        }
        turn.is_streaming = false;
        turn.phase = TurnPhase::Completed;
        if self.processing_turn == Some(turn_number) {
            self.processing_turn = None;
        }
    }

    /// Conclude a turn as failed. Accumulated partial narration is kept so
    /// whatever the user already saw stays visible.
    pub fn turn_error(&mut self, turn_number: TurnNumber, error: TurnErrorPayload) {
        let turn = self
            .turns
            .entry(turn_number)
            .or_insert_with(|| Turn::new(turn_number));
        if turn.is_terminal() {
            warn!(turn_number, "turn_error for a concluded turn; ignored");
            return;
        }
        turn.error = Some(error);
        turn.is_streaming = false;
        turn.phase = TurnPhase::Errored;
        if self.processing_turn == Some(turn_number) {
            self.processing_turn = None;
        }
    }

    /// Reset the ledger to empty. Used on session change, never on turn
    /// failure. Turn numbering restarts with the ledger.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.processing_turn = None;
    }

    /// Highest turn number seen, if any.
    pub fn current_turn_number(&self) -> Option<TurnNumber> {
        self.turns.last_key_value().map(|(&n, _)| n)
    }

    /// The turn currently processing, if any.
    pub fn processing_turn_number(&self) -> Option<TurnNumber> {
        self.processing_turn
    }

    /// True iff exactly one turn has been started but not concluded.
    pub fn is_processing(&self) -> bool {
        self.processing_turn.is_some()
    }

    pub fn turn(&self, turn_number: TurnNumber) -> Option<&Turn> {
        self.turns.get(&turn_number)
    }

    /// Turns in ascending turn-number order.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.values()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Produce an immutable render-ready view of the current state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::capture(self)
    }
}
