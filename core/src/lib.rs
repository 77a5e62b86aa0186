//! Root of the `fable-core` library.
//!
//! Rebuilds a causally ordered, duplicate-free view of a turn-based session
//! from an unreliable event stream, and reconciles locally-built state
//! against authoritative backend history.

// Prevent accidental direct writes to stdout/stderr in library code. All
// diagnostics go through the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod reconcile;
pub mod session;

pub use config::TuningConfig;
pub use error::FableErr;
pub use error::Result;
pub use history::HistoryStore;
pub use ledger::LedgerSnapshot;
pub use ledger::Turn;
pub use ledger::TurnLedger;
pub use ledger::TurnPhase;
pub use reconcile::merge;
pub use session::ResyncTrigger;
pub use session::SessionHandle;
pub use session::SessionRegistry;
