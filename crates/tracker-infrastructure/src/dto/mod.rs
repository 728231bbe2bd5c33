//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs represent the versioned wire schema of stored resources. They
//! are private to the infrastructure layer and isolate the domain model from
//! the evolution of the storage format.
//!
//! ### SessionTracker Version History
//! - **v1**: Initial schema (`metadata` + `spec`, participants as a list)

mod session_tracker;

pub use session_tracker::{
    KIND_SESSION_TRACKER, MarshalOptions, MetadataV1, ParticipantV1, SESSION_TRACKER_V1,
    SessionTrackerSpecV1, SessionTrackerV1, marshal_session_tracker, unmarshal_session_tracker,
};
