//! Application layer for the session tracker.
//!
//! This crate composes the backend contract, the wire codec and the domain
//! model into the operations server processes call: create, get, list,
//! update, update-presence and remove.

pub mod cas;
pub mod reconcile;
pub mod service;
pub mod telemetry;

pub use cas::CasUpdater;
pub use service::{SESSION_PREFIX, SessionTrackerService, tracker_key};
pub use telemetry::{TrackerEvent, TrackerEventLayer};
