//! Session tracker domain module.
//!
//! # Module Structure
//!
//! - `model`: Core tracker model (`SessionTracker`, `Participant`)
//! - `state`: Lifecycle and classification enums
//! - `policy`: Host moderation policy sets
//! - `request`: Create/update request shapes

mod model;
mod policy;
mod request;
mod state;

// Re-export public API
pub use model::{Participant, SessionTracker};
pub use policy::{OnLeaveAction, SessionJoinPolicy, SessionRequirePolicy, SessionTrackerPolicySet};
pub use request::{CreateSessionTrackerRequest, SessionTrackerUpdate, UpdateSessionTrackerRequest};
pub use state::{ParticipantMode, SessionKind, SessionState};
