//! Moderation policy sets attached to a session by its host.

use super::state::{ParticipantMode, SessionKind};
use serde::{Deserialize, Serialize};

/// What happens to a moderated session when a required participant leaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnLeaveAction {
    #[default]
    Terminate,
    Pause,
}

/// A rule requiring `count` matching participants before the session may
/// start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequirePolicy {
    pub name: String,
    /// Predicate expression selecting which participants count.
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub kinds: Vec<SessionKind>,
    pub count: u32,
    #[serde(default)]
    pub modes: Vec<ParticipantMode>,
    #[serde(default)]
    pub on_leave: OnLeaveAction,
}

/// A rule allowing holders of `roles` to join with the given `modes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionJoinPolicy {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<SessionKind>,
    #[serde(default)]
    pub modes: Vec<ParticipantMode>,
}

/// The moderation rules one host role contributes to a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTrackerPolicySet {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub require_session_join: Vec<SessionRequirePolicy>,
    #[serde(default)]
    pub allow: Vec<SessionJoinPolicy>,
}

impl SessionTrackerPolicySet {
    /// Whether this set asks for session-join approval, which makes the
    /// session moderated.
    pub fn requires_moderation(&self) -> bool {
        !self.require_session_join.is_empty()
    }
}
