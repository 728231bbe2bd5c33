//! Session tracker DTOs and the wire codec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracker_core::error::{Result, TrackerError};
use tracker_core::session::{
    Participant, ParticipantMode, SessionKind, SessionState, SessionTracker,
    SessionTrackerPolicySet,
};

/// Resource kind written into every stored tracker.
pub const KIND_SESSION_TRACKER: &str = "session_tracker";
/// Current wire version.
pub const SESSION_TRACKER_V1: &str = "v1";

// ============================================================================
// Marshal options
// ============================================================================

/// Knobs for [`marshal_session_tracker`] and [`unmarshal_session_tracker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarshalOptions {
    /// Resource ID to stamp on unmarshal (0 keeps the stored one)
    pub id: i64,
    /// Resource expiry to stamp on unmarshal
    pub expires: Option<DateTime<Utc>>,
    /// Echo the resource ID on marshal instead of zeroing it
    pub preserve_resource_id: bool,
}

impl MarshalOptions {
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_expires(mut self, expires: Option<DateTime<Utc>>) -> Self {
        self.expires = expires;
        self
    }

    pub fn preserve_resource_id(mut self) -> Self {
        self.preserve_resource_id = true;
        self
    }
}

// ============================================================================
// DTOs
// ============================================================================

/// Only the fields needed to pick a decoder.
#[derive(Debug, Deserialize)]
struct ResourceHeader {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataV1 {
    #[serde(default)]
    pub name: String,
    /// Resource ID used for optimistic updates of metadata
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: i64,
    /// Resource expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

fn is_zero(id: &i64) -> bool {
    *id == 0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantV1 {
    pub id: String,
    pub user: String,
    #[serde(default)]
    pub mode: ParticipantMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTrackerSpecV1 {
    pub session_id: String,
    pub kind: SessionKind,
    pub state: SessionState,
    pub created: DateTime<Utc>,
    /// Session expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
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
    #[serde(default)]
    pub participants: Vec<ParticipantV1>,
    #[serde(default)]
    pub kubernetes_cluster: String,
    #[serde(default)]
    pub host_user: String,
    #[serde(default)]
    pub host_policies: Vec<SessionTrackerPolicySet>,
}

/// Represents V1 of the stored session tracker resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTrackerV1 {
    pub kind: String,
    pub version: String,
    pub metadata: MetadataV1,
    pub spec: SessionTrackerSpecV1,
}

impl SessionTrackerV1 {
    /// Fills static fields and validates the resource.
    pub fn check_and_set_defaults(&mut self) -> Result<()> {
        if self.kind.is_empty() {
            self.kind = KIND_SESSION_TRACKER.to_string();
        }
        if self.version.is_empty() {
            self.version = SESSION_TRACKER_V1.to_string();
        }
        if self.spec.session_id.is_empty() {
            return Err(TrackerError::bad_parameter("missing session id"));
        }
        if self.metadata.name.is_empty() {
            self.metadata.name = self.spec.session_id.clone();
        }
        Ok(())
    }
}

// ============================================================================
// Conversion traits for domain model interop
// ============================================================================

impl From<ParticipantV1> for Participant {
    fn from(dto: ParticipantV1) -> Self {
        Participant {
            id: dto.id,
            user: dto.user,
            mode: dto.mode,
            last_active: dto.last_active,
        }
    }
}

impl From<&Participant> for ParticipantV1 {
    fn from(participant: &Participant) -> Self {
        ParticipantV1 {
            id: participant.id.clone(),
            user: participant.user.clone(),
            mode: participant.mode,
            last_active: participant.last_active,
        }
    }
}

/// Convert SessionTrackerV1 DTO to domain model.
///
/// Duplicate participant IDs collapse to the last entry.
impl From<SessionTrackerV1> for SessionTracker {
    fn from(dto: SessionTrackerV1) -> Self {
        let spec = dto.spec;
        SessionTracker {
            resource_id: dto.metadata.id,
            session_id: spec.session_id,
            kind: spec.kind,
            state: spec.state,
            created: spec.created,
            expires: spec.expires,
            resource_expiry: dto.metadata.expires,
            reason: spec.reason,
            invited: spec.invited,
            hostname: spec.hostname,
            address: spec.address,
            cluster_name: spec.cluster_name,
            login: spec.login,
            participants: spec
                .participants
                .into_iter()
                .map(|p| (p.id.clone(), Participant::from(p)))
                .collect(),
            kubernetes_cluster: spec.kubernetes_cluster,
            host_user: spec.host_user,
            host_policies: spec.host_policies,
        }
    }
}

/// Convert domain model to SessionTrackerV1 DTO for persistence.
impl From<&SessionTracker> for SessionTrackerV1 {
    fn from(tracker: &SessionTracker) -> Self {
        SessionTrackerV1 {
            kind: KIND_SESSION_TRACKER.to_string(),
            version: SESSION_TRACKER_V1.to_string(),
            metadata: MetadataV1 {
                name: tracker.session_id.clone(),
                id: tracker.resource_id,
                expires: tracker.resource_expiry,
            },
            spec: SessionTrackerSpecV1 {
                session_id: tracker.session_id.clone(),
                kind: tracker.kind,
                state: tracker.state,
                created: tracker.created,
                expires: tracker.expires,
                reason: tracker.reason.clone(),
                invited: tracker.invited.clone(),
                hostname: tracker.hostname.clone(),
                address: tracker.address.clone(),
                cluster_name: tracker.cluster_name.clone(),
                login: tracker.login.clone(),
                participants: tracker.participants.values().map(ParticipantV1::from).collect(),
                kubernetes_cluster: tracker.kubernetes_cluster.clone(),
                host_user: tracker.host_user.clone(),
                host_policies: tracker.host_policies.clone(),
            },
        }
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Decodes a stored tracker.
///
/// # Errors
///
/// Returns `BadParameter` if the data is empty, is not valid JSON, names
/// another resource kind, or carries a version this build cannot decode.
pub fn unmarshal_session_tracker(bytes: &[u8], opts: MarshalOptions) -> Result<SessionTracker> {
    if bytes.is_empty() {
        return Err(TrackerError::bad_parameter("missing resource data"));
    }

    let header: ResourceHeader =
        serde_json::from_slice(bytes).map_err(|e| TrackerError::bad_parameter(e.to_string()))?;
    if !header.kind.is_empty() && header.kind != KIND_SESSION_TRACKER {
        return Err(TrackerError::bad_parameter(format!(
            "expected resource kind {}, got {}",
            KIND_SESSION_TRACKER, header.kind
        )));
    }

    // Records written without a version predate versioning and are v1.
    let mut dto: SessionTrackerV1 = match header.version.as_str() {
        "" | SESSION_TRACKER_V1 => serde_json::from_slice(bytes)
            .map_err(|e| TrackerError::bad_parameter(e.to_string()))?,
        other => {
            return Err(TrackerError::bad_parameter(format!(
                "unrecognized session version {:?}",
                other
            )));
        }
    };
    dto.check_and_set_defaults()?;

    let mut tracker = SessionTracker::from(dto);
    if opts.id != 0 {
        tracker.resource_id = opts.id;
    }
    if let Some(expires) = opts.expires {
        tracker.set_resource_expiry(expires);
    }
    Ok(tracker)
}

/// Encodes a tracker for storage.
///
/// The resource ID is zeroed unless `opts.preserve_resource_id` is set.
pub fn marshal_session_tracker(tracker: &SessionTracker, opts: MarshalOptions) -> Result<Vec<u8>> {
    tracker.check()?;

    let mut dto = SessionTrackerV1::from(tracker);
    dto.check_and_set_defaults()?;
    if !opts.preserve_resource_id {
        dto.metadata.id = 0;
    }
    Ok(serde_json::to_vec(&dto)?)
}
