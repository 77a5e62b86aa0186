//! Identity-based merge of local and backend message lists.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fable_protocol::message::MessageRecord;
use tracing::debug;

/// Merge a locally-built, possibly-optimistic message list against an
/// authoritative backend list.
///
/// For each local record the backend is searched by `message_id` first,
/// then by `timestamp` (the fallback for records that predate identity
/// assignment). A match replaces the local record with the backend version
/// and consumes that backend record; matching is strictly pairwise. A local
/// record with no match is retained as-is: the live channel often delivers
/// content before the backend has durably persisted it, and dropping
/// unconfirmed entries would lose content the user has already seen.
/// Backend records left unconsumed are appended as confirmed. The combined
/// set is sorted by timestamp ascending.
///
/// The merge is idempotent: feeding its output back in with the same
/// backend snapshot reproduces it exactly. An empty backend list preserves
/// every local record unchanged.
pub fn merge(local: &[MessageRecord], backend: &[MessageRecord]) -> Vec<MessageRecord> {
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    let mut by_timestamp: HashMap<DateTime<Utc>, usize> = HashMap::new();
    for (idx, record) in backend.iter().enumerate() {
        if let Some(id) = record.message_id.as_deref() {
            by_id.entry(id).or_insert(idx);
        }
        by_timestamp.entry(record.timestamp).or_insert(idx);
    }

    let mut consumed = vec![false; backend.len()];
    let mut merged: Vec<MessageRecord> = Vec::with_capacity(local.len() + backend.len());

    for record in local {
        let matched = record
            .message_id
            .as_deref()
            .and_then(|id| by_id.get(id).copied())
            .or_else(|| by_timestamp.get(&record.timestamp).copied())
            .filter(|&idx| !consumed[idx]);

        match matched {
            Some(idx) => {
                consumed[idx] = true;
                let mut confirmed = backend[idx].clone();
                confirmed.is_local = false;
                merged.push(confirmed);
            }
            None => merged.push(record.clone()),
        }
    }

    let appended = consumed.iter().filter(|&&c| !c).count();
    if appended > 0 {
        debug!(appended, "backend records with no local counterpart");
    }
    for (idx, record) in backend.iter().enumerate() {
        if !consumed[idx] {
            let mut confirmed = record.clone();
            confirmed.is_local = false;
            merged.push(confirmed);
        }
    }

    // Stable sort keeps arrival order for records sharing a timestamp.
    merged.sort_by_key(|r| r.timestamp);
    merged
}
