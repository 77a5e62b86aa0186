//! Content-based duplicate suppression.
//!
//! Independent of the identity-based merge: the same logical narration can
//! arrive twice through different paths (optimistic local add, then a
//! backend-confirmed add carrying a server timestamp far in the future),
//! with no identity fields to correlate them. The guard compares normalized
//! text against the most recent DM records instead.

use fable_protocol::message::{MessageRecord, Sender};

/// Collapse all whitespace runs to single spaces and trim the ends.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `candidate` duplicates one of the last `window` DM records in
/// `existing`, by normalized text alone. Timestamps and ids are ignored;
/// non-DM candidates are never suppressed.
///
/// Pure function of existing state plus candidate; runs at insertion time,
/// before any identity-based merge.
pub fn is_recent_dm_duplicate(
    existing: &[MessageRecord],
    candidate: &MessageRecord,
    window: usize,
) -> bool {
    if candidate.sender != Sender::Dm || window == 0 {
        return false;
    }
    let needle = normalize_text(&candidate.text);
    if needle.is_empty() {
        return false;
    }
    existing
        .iter()
        .rev()
        .filter(|r| r.sender == Sender::Dm)
        .take(window)
        .any(|r| normalize_text(&r.text) == needle)
}
