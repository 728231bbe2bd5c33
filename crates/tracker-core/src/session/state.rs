//! Session lifecycle and classification enums.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Lifecycle state of a tracked session.
///
/// Sessions are created `Pending`, move to `Running` once the first party
/// is connected and end `Terminated`. The tracker itself does not enforce
/// this ordering unless strict transitions are enabled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Created but waiting on moderators or the initiator.
    Pending,
    /// Active and streaming.
    Running,
    /// Finished. The stored record is due for reclamation.
    Terminated,
}

impl SessionState {
    /// Whether a strict state machine allows moving from `self` to `next`.
    ///
    /// Re-applying the current state is always allowed. `Terminated` is
    /// final and nothing returns to `Pending`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        if self == next {
            return true;
        }
        match (self, next) {
            (SessionState::Terminated, _) => false,
            (_, SessionState::Pending) => false,
            _ => true,
        }
    }
}

/// The kind of access a session provides.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum SessionKind {
    /// Interactive terminal session.
    #[serde(rename = "ssh")]
    #[strum(serialize = "ssh")]
    Ssh,
    /// Cluster workload session (exec/attach).
    #[serde(rename = "k8s")]
    #[strum(serialize = "k8s")]
    Kubernetes,
    /// Remote desktop session.
    #[serde(rename = "desktop")]
    #[strum(serialize = "desktop")]
    Desktop,
}

/// How a participant joined a session.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantMode {
    /// Read-only viewer.
    Observer,
    /// Can approve and terminate the session.
    Moderator,
    /// Full interactive participant.
    #[default]
    Peer,
}
