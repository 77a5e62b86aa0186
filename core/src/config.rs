//! Tuning knobs for the session core.

// Note this file should generally be restricted to simple struct/enum
// definitions that do not contain business logic.

use serde::{Deserialize, Serialize};

/// Heuristic constants governing reconciliation and resync behavior.
///
/// The duplicate window in particular has no correctness proof behind it; a
/// narrator intentionally repeating identical flavor text within the window
/// would be suppressed. It is a knob, not an invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TuningConfig {
    /// How many recent DM records the content-based duplicate guard scans.
    pub dm_duplicate_window: usize,

    /// Whether applying a `turn_complete` event should request a history
    /// resync from the host.
    pub resync_after_completion: bool,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            dm_duplicate_window: 10,
            resync_after_completion: true,
        }
    }
}
