//! Request shapes consumed from the transport layer.

use super::model::Participant;
use super::policy::SessionTrackerPolicySet;
use super::state::{SessionKind, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to start tracking a new session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSessionTrackerRequest {
    /// Session ID. A fresh one is generated when empty.
    #[serde(default)]
    pub id: String,
    pub kind: SessionKind,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub invited: Vec<String>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub login: String,
    /// The participant who started the session
    pub initiator: Participant,
    /// Requested session expiry
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default)]
    pub kubernetes_cluster: String,
    #[serde(default)]
    pub host_user: String,
    #[serde(default)]
    pub host_policies: Vec<SessionTrackerPolicySet>,
}

impl CreateSessionTrackerRequest {
    /// Creates a request with only the required fields set.
    pub fn new(id: impl Into<String>, kind: SessionKind, initiator: Participant) -> Self {
        Self {
            id: id.into(),
            kind,
            reason: String::new(),
            invited: Vec::new(),
            hostname: String::new(),
            address: String::new(),
            cluster_name: String::new(),
            login: String::new(),
            initiator,
            expires: None,
            kubernetes_cluster: String::new(),
            host_user: String::new(),
            host_policies: Vec::new(),
        }
    }

    /// Whether any attached policy set requires session-join approval.
    pub fn requires_moderation(&self) -> bool {
        self.host_policies
            .iter()
            .any(SessionTrackerPolicySet::requires_moderation)
    }
}

/// Exactly one in-place change to a stored tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionTrackerUpdate {
    /// Set the lifecycle state. Terminating also expires the resource now.
    SetState(SessionState),
    /// Insert or replace a participant.
    AddParticipant(Participant),
    /// Remove a participant by participant ID.
    RemoveParticipant(String),
    /// Set the session expiry.
    SetExpiry(DateTime<Utc>),
}

/// Request to apply one update to a tracked session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSessionTrackerRequest {
    pub session_id: String,
    pub update: SessionTrackerUpdate,
}

impl UpdateSessionTrackerRequest {
    pub fn new(session_id: impl Into<String>, update: SessionTrackerUpdate) -> Self {
        Self {
            session_id: session_id.into(),
            update,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::policy::SessionRequirePolicy;
    use crate::session::state::ParticipantMode;

    #[test]
    fn test_update_request_wire_shape() {
        let request = UpdateSessionTrackerRequest::new(
            "s1",
            SessionTrackerUpdate::SetState(SessionState::Running),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"session_id": "s1", "update": {"set_state": "running"}})
        );

        let parsed: UpdateSessionTrackerRequest = serde_json::from_value(serde_json::json!({
            "session_id": "s1",
            "update": {"remove_participant": "p-bob"}
        }))
        .unwrap();
        assert_eq!(
            parsed.update,
            SessionTrackerUpdate::RemoveParticipant("p-bob".to_string())
        );
    }

    #[test]
    fn test_create_request_defaults() {
        let request: CreateSessionTrackerRequest = serde_json::from_value(serde_json::json!({
            "kind": "ssh",
            "initiator": {"id": "p-alice", "user": "alice", "last_active": null}
        }))
        .unwrap();
        assert!(request.id.is_empty());
        assert_eq!(request.initiator.mode, ParticipantMode::Peer);
        assert!(!request.requires_moderation());
    }

    #[test]
    fn test_requires_moderation_only_with_join_requirements() {
        let mut request = CreateSessionTrackerRequest::new(
            "s1",
            SessionKind::Ssh,
            Participant::new("p-alice", "alice", ParticipantMode::Peer),
        );
        request.host_policies.push(SessionTrackerPolicySet {
            name: "dev".to_string(),
            ..Default::default()
        });
        assert!(!request.requires_moderation());

        request.host_policies.push(SessionTrackerPolicySet {
            name: "prod".to_string(),
            version: "v5".to_string(),
            require_session_join: vec![SessionRequirePolicy {
                name: "auditor".to_string(),
                filter: "contains(user.roles, \"auditor\")".to_string(),
                kinds: vec![SessionKind::Ssh],
                count: 1,
                modes: vec![ParticipantMode::Moderator],
                on_leave: Default::default(),
            }],
            allow: vec![],
        });
        assert!(request.requires_moderation());
    }
}
