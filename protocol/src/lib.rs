//! Wire-level types shared between the channel, the history store, and the
//! session core. This crate holds only data definitions; all session logic
//! lives in `fable-core`.

pub mod events;
pub mod ids;
pub mod message;

// Re-export the identifiers at crate root for convenience
pub use ids::SessionId;
pub use ids::TurnNumber;
