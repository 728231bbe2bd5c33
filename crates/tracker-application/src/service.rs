//! Session tracker service.
//!
//! This module provides `SessionTrackerService`, the operation surface every
//! server process uses to publish and observe live sessions. The service
//! holds no state of its own beyond configuration: every record lives in the
//! shared backend and every read-modify-write goes through [`CasUpdater`].

use crate::cas::{CasUpdater, cancellable, tracker_not_found};
use crate::reconcile::{reconcile, spawn_orphan_gc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracker_core::backend::{self, Backend, Item, NO_LIMIT};
use tracker_core::capability::FeatureGate;
use tracker_core::config::TrackerConfig;
use tracker_core::error::{Result, TrackerError};
use tracker_core::session::{
    CreateSessionTrackerRequest, SessionState, SessionTracker, SessionTrackerUpdate,
    UpdateSessionTrackerRequest,
};
use tracker_infrastructure::dto::{
    MarshalOptions, marshal_session_tracker, unmarshal_session_tracker,
};
use uuid::Uuid;

/// Key namespace reserved for session trackers.
pub const SESSION_PREFIX: &str = "session_tracker";

/// Backend key of a tracker.
pub fn tracker_key(session_id: &str) -> String {
    backend::key(&[SESSION_PREFIX, session_id])
}

/// Public operations on session trackers.
///
/// # Thread Safety
///
/// The service takes `&self` everywhere and keeps no in-process locks. Any
/// number of services, in any number of processes, may share one backend.
pub struct SessionTrackerService {
    backend: Arc<dyn Backend>,
    features: Arc<dyn FeatureGate>,
    config: TrackerConfig,
    updater: CasUpdater,
}

impl SessionTrackerService {
    /// Creates a new `SessionTrackerService`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The shared key-value store
    /// * `features` - Gate consulted before creating moderated sessions
    /// * `config` - TTL, retry and validation settings
    pub fn new(
        backend: Arc<dyn Backend>,
        features: Arc<dyn FeatureGate>,
        config: TrackerConfig,
    ) -> Self {
        let updater = CasUpdater::new(backend.clone(), config.retry_delay(), config.retry_limit);
        Self {
            backend,
            features,
            config,
            updater,
        }
    }

    /// Creates a service whose feature gate is the configured feature set.
    pub fn from_config(backend: Arc<dyn Backend>, config: TrackerConfig) -> Self {
        let features = Arc::new(config.features);
        Self::new(backend, features, config)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Creates a tracker for a session that is starting.
    ///
    /// The tracker starts `Pending` with the initiator as its only
    /// participant. Without a session expiry, the resource expires after the
    /// configured default TTL.
    ///
    /// # Errors
    ///
    /// - `AccessDenied` if a host policy requires session-join approval and
    ///   moderated sessions are not licensed; nothing is written
    /// - `AlreadyExists` if the session ID is taken and overwriting is not
    ///   allowed
    pub async fn create_session_tracker(
        &self,
        cancel: &CancellationToken,
        request: CreateSessionTrackerRequest,
    ) -> Result<SessionTracker> {
        // Don't allow sessions that require moderation without the feature.
        if request.requires_moderation() && !self.features.moderated_sessions() {
            return Err(TrackerError::access_denied(
                "this cluster is not licensed for moderated sessions, please contact the cluster administrator",
            ));
        }

        let now = self.backend.clock().now();
        let session_id = if request.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request.id
        };

        let mut initiator = request.initiator;
        initiator.last_active.get_or_insert(now);
        let mut participants = BTreeMap::new();
        participants.insert(initiator.id.clone(), initiator);

        let mut tracker = SessionTracker {
            resource_id: 0,
            session_id,
            kind: request.kind,
            state: SessionState::Pending,
            created: now,
            expires: request.expires,
            resource_expiry: None,
            reason: request.reason,
            invited: request.invited,
            hostname: request.hostname,
            address: request.address,
            cluster_name: request.cluster_name,
            login: request.login,
            participants,
            kubernetes_cluster: request.kubernetes_cluster,
            host_user: request.host_user,
            host_policies: request.host_policies,
        };
        // By default, resource expiration should match session expiration.
        tracker.apply_default_expiry(self.config.default_ttl());

        let value = marshal_session_tracker(&tracker, MarshalOptions::default())?;
        let item = Item::new(
            tracker_key(&tracker.session_id),
            value,
            tracker.resource_expiry,
        );

        let stored = if self.config.allow_create_overwrite {
            cancellable(cancel, self.backend.put(item)).await?
        } else {
            cancellable(cancel, self.backend.create(item))
                .await
                .map_err(|err| {
                    if err.is_already_exists() {
                        TrackerError::already_exists(format!(
                            "session tracker {:?} already exists",
                            tracker.session_id
                        ))
                    } else {
                        err
                    }
                })?
        };
        tracker.resource_id = stored.id;

        tracing::debug!(
            session_id = %tracker.session_id,
            kind = %tracker.kind,
            "created session tracker"
        );
        Ok(tracker)
    }

    /// Returns the current state of a tracker.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no tracker is stored under `session_id`
    /// - `BadParameter` if the stored data cannot be decoded
    pub async fn get_session_tracker(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
    ) -> Result<SessionTracker> {
        let item = cancellable(cancel, self.backend.get(&tracker_key(session_id)))
            .await
            .map_err(tracker_not_found(session_id))?;
        unmarshal_session_tracker(&item.value, MarshalOptions::default().with_id(item.id))
    }

    /// Returns every live tracker.
    ///
    /// Dead trackers are omitted. Those the backend will never reclaim are
    /// deleted in the background; this call does not wait for that.
    pub async fn get_active_session_trackers(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<SessionTracker>> {
        let prefix = tracker_key("");
        let end = backend::range_end(&prefix);
        let items = cancellable(
            cancel,
            self.backend.get_range(prefix.as_bytes(), &end, NO_LIMIT),
        )
        .await?;

        let now = self.backend.clock().now();
        let reconciled = reconcile(items, now)?;
        spawn_orphan_gc(self.backend.clone(), reconciled.orphaned);

        Ok(reconciled.active)
    }

    /// Applies one update to a tracker and returns the published result.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the tracker does not exist
    /// - `BadParameter` for a forbidden transition when strict transitions
    ///   are enabled
    /// - `RetryLimitExceeded` or `Cancelled` from the compare-and-swap loop
    pub async fn update_session_tracker(
        &self,
        cancel: &CancellationToken,
        request: UpdateSessionTrackerRequest,
    ) -> Result<SessionTracker> {
        let strict = self.config.strict_state_transitions;
        let update = request.update;

        self.updater
            .update(cancel, &request.session_id, |tracker, now| {
                match &update {
                    SessionTrackerUpdate::SetState(state) => {
                        if strict && !tracker.state.can_transition_to(*state) {
                            return Err(TrackerError::bad_parameter(format!(
                                "session {} cannot move from {} to {}",
                                tracker.session_id, tracker.state, state
                            )));
                        }
                        tracker.set_state(*state);
                        if *state == SessionState::Terminated {
                            // Mark session tracker for deletion.
                            tracker.set_resource_expiry(now);
                        }
                    }
                    SessionTrackerUpdate::AddParticipant(participant) => {
                        tracker.add_participant(participant.clone());
                    }
                    SessionTrackerUpdate::RemoveParticipant(participant_id) => {
                        tracker.remove_participant(participant_id);
                    }
                    SessionTrackerUpdate::SetExpiry(expires) => {
                        tracker.set_expires(*expires);
                    }
                }
                Ok(())
            })
            .await
    }

    /// Refreshes the presence timestamp of `user` in a session.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the session does not exist or `user` is not
    /// one of its participants.
    pub async fn update_presence(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        user: &str,
    ) -> Result<SessionTracker> {
        self.updater
            .update(cancel, session_id, |tracker, now| {
                tracker.update_presence(user, now)
            })
            .await
    }

    /// Removes a tracker.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no tracker is stored under `session_id`.
    pub async fn remove_session_tracker(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
    ) -> Result<()> {
        cancellable(cancel, self.backend.delete(&tracker_key(session_id)))
            .await
            .map_err(tracker_not_found(session_id))?;
        tracing::debug!(session_id, "removed session tracker");
        Ok(())
    }
}
