//! Error type for the session core.
//!
//! Only the fetch-and-merge path returns errors. Event application never
//! does: it sits on the hot stream path and recovers from malformed or
//! conflicting frames by logging and ignoring them.

use fable_protocol::SessionId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FableErr>;

#[derive(Debug, Error)]
pub enum FableErr {
    /// The history store failed to produce a snapshot. Retryable; local
    /// state is left untouched.
    #[error("history fetch failed: {0}")]
    HistoryFetch(#[from] crate::history::HistoryError),

    /// A history fetch resolved after the session it was issued for was
    /// switched away from or cleared. The snapshot was discarded.
    #[error("session {session_id} changed while fetch was in flight")]
    StaleSession { session_id: SessionId },

    /// An operation referenced a session the registry does not hold.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
}
