//! Immutable, render-ready view of a ledger.

use std::collections::BTreeMap;

use fable_protocol::TurnNumber;
use serde::Serialize;

use super::{Turn, TurnLedger};

/// Snapshot of every turn plus the derived aggregate flags.
///
/// Recomputed on every mutation; consumers must treat one snapshot as
/// immutable for the duration of a render and pick up changes by taking a
/// new one (or awaiting the watch channel on the session handle).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    /// All turns, ascending by turn number.
    pub turns: Vec<Turn>,

    /// Highest turn number seen.
    pub current_turn_number: Option<TurnNumber>,

    /// The turn started but not yet concluded, if any.
    pub processing_turn_number: Option<TurnNumber>,

    /// True iff exactly one turn is processing.
    pub is_processing: bool,

    /// OR over all turns' `is_streaming`.
    pub is_any_turn_streaming: bool,
}

impl LedgerSnapshot {
    pub(crate) fn capture(ledger: &TurnLedger) -> Self {
        let turns: Vec<Turn> = ledger.turns().cloned().collect();
        Self {
            current_turn_number: ledger.current_turn_number(),
            processing_turn_number: ledger.processing_turn_number(),
            is_processing: ledger.is_processing(),
            is_any_turn_streaming: turns.iter().any(|t| t.is_streaming),
            turns,
        }
    }

    /// Look up a turn by number.
    pub fn turn(&self, turn_number: TurnNumber) -> Option<&Turn> {
        self.turns
            .binary_search_by_key(&turn_number, |t| t.turn_number)
            .ok()
            .map(|idx| &self.turns[idx])
    }

    /// Lookup table over the snapshot, keyed by turn number.
    pub fn turns_by_number(&self) -> BTreeMap<TurnNumber, &Turn> {
        self.turns.iter().map(|t| (t.turn_number, t)).collect()
    }
}
