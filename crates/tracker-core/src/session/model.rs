//! Session tracker domain model.
//!
//! This module contains the `SessionTracker` entity that represents one live
//! interactive session shared by every process in the cluster.

use super::policy::SessionTrackerPolicySet;
use super::state::{ParticipantMode, SessionKind, SessionState};
use crate::error::{Result, TrackerError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An identity attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Participant ID, unique within the session
    pub id: String,
    /// The user this participant acts as
    pub user: String,
    /// How the participant joined
    #[serde(default)]
    pub mode: ParticipantMode,
    /// Last presence heartbeat
    pub last_active: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(id: impl Into<String>, user: impl Into<String>, mode: ParticipantMode) -> Self {
        Self {
            id: id.into(),
            user: user.into(),
            mode,
            last_active: None,
        }
    }
}

/// Represents one active session in the tracker's domain layer.
///
/// Two deadlines coexist on a tracker:
/// - `expires` is the session-semantic deadline (e.g. when the
///   authorization backing the session runs out)
/// - `resource_expiry` is the physical deadline after which the backend may
///   drop the stored bytes
///
/// A tracker is live while the later of the two is in the future.
///
/// This is the "pure" domain model that business logic operates on,
/// independent of the wire format or its version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTracker {
    /// Internal resource identifier assigned by the backend. Not part of the
    /// compare-and-swap precondition.
    pub resource_id: i64,
    /// Unique session identifier, immutable after creation
    pub session_id: String,
    pub kind: SessionKind,
    pub state: SessionState,
    pub created: DateTime<Utc>,
    /// Session expiry
    pub expires: Option<DateTime<Utc>>,
    /// Resource expiry, mirrored onto the backend item
    pub resource_expiry: Option<DateTime<Utc>>,
    pub reason: String,
    /// Identities invited to join, in invitation order
    pub invited: Vec<String>,
    pub hostname: String,
    pub address: String,
    pub cluster_name: String,
    pub login: String,
    /// Participants keyed by participant ID
    pub participants: BTreeMap<String, Participant>,
    pub kubernetes_cluster: String,
    pub host_user: String,
    pub host_policies: Vec<SessionTrackerPolicySet>,
}

impl SessionTracker {
    /// Validates the invariants every stored tracker must satisfy.
    pub fn check(&self) -> Result<()> {
        if self.session_id.is_empty() {
            return Err(TrackerError::bad_parameter("missing session id"));
        }
        for (key, participant) in &self.participants {
            if key != &participant.id {
                return Err(TrackerError::bad_parameter(format!(
                    "participant key '{}' does not match participant id '{}'",
                    key, participant.id
                )));
            }
        }
        Ok(())
    }

    /// Fills `resource_expiry` from the session expiry, or from
    /// `created + default_ttl` when the session has none.
    pub fn apply_default_expiry(&mut self, default_ttl: Duration) {
        let fallback = self
            .created
            .checked_add_signed(default_ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.resource_expiry = Some(self.expires.unwrap_or(fallback));
    }

    /// The instant after which the tracker is logically dead.
    pub fn live_deadline(&self) -> Option<DateTime<Utc>> {
        match (self.expires, self.resource_expiry) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Whether the tracker is still live at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.live_deadline().is_some_and(|deadline| deadline > now)
    }

    pub fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Sets the session expiry. The resource expiry is left alone.
    pub fn set_expires(&mut self, expires: DateTime<Utc>) {
        self.expires = Some(expires);
    }

    pub fn set_resource_expiry(&mut self, expiry: DateTime<Utc>) {
        self.resource_expiry = Some(expiry);
    }

    /// Inserts the participant, replacing any entry with the same ID.
    pub fn add_participant(&mut self, participant: Participant) {
        self.participants.insert(participant.id.clone(), participant);
    }

    /// Removes a participant by ID. Returns whether an entry was removed.
    pub fn remove_participant(&mut self, participant_id: &str) -> bool {
        self.participants.remove(participant_id).is_some()
    }

    /// Refreshes the presence timestamp of the participant acting as `user`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no participant is acting as `user`.
    pub fn update_presence(&mut self, user: &str, now: DateTime<Utc>) -> Result<()> {
        let participant = self
            .participants
            .values_mut()
            .find(|p| p.user == user)
            .ok_or_else(|| TrackerError::not_found("Participant", user))?;
        participant.last_active = Some(now);
        Ok(())
    }
}
