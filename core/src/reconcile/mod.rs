//! History reconciliation: merging the locally-built message list against
//! an authoritative backend snapshot, plus the content-based duplicate
//! guard applied at insertion time.
//!
//! Both halves are pure functions of their arguments so the scheduler that
//! decides *when* to reconcile (stream completion, tab reactivation,
//! explicit reload) stays entirely outside the algorithm.

mod dedupe;
mod merge;

pub use dedupe::is_recent_dm_duplicate;
pub use dedupe::normalize_text;
pub use merge::merge;
