//! Domain layer for the session tracker.
//!
//! Holds the session tracker model, the request shapes, and the contracts of
//! the external collaborators (key-value backend, clock, capability gate).
//! Nothing in this crate performs I/O.

pub mod backend;
pub mod capability;
pub mod clock;
pub mod config;
pub mod error;
pub mod session;

// Re-export common error type
pub use error::TrackerError;
