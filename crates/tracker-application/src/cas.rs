//! Bounded-retry compare-and-swap updater.
//!
//! This module provides `CasUpdater`, which runs the
//! "read → transform → publish if unchanged" cycle shared by every
//! read-modify-write operation on a session tracker.

use crate::service::tracker_key;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracker_core::backend::{Backend, Item};
use tracker_core::error::{Result, TrackerError};
use tracker_core::session::SessionTracker;
use tracker_infrastructure::dto::{
    MarshalOptions, marshal_session_tracker, unmarshal_session_tracker,
};

/// Races a backend call against the caller's cancellation signal.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TrackerError::Cancelled),
        result = call => result,
    }
}

/// Maps a backend miss on a tracker key to a tracker-level `NotFound`.
pub(crate) fn tracker_not_found(
    session_id: &str,
) -> impl FnOnce(TrackerError) -> TrackerError + '_ {
    move |err| {
        if err.is_not_found() {
            TrackerError::not_found("SessionTracker", session_id)
        } else {
            err
        }
    }
}

/// Applies pure transforms to stored trackers with optimistic concurrency.
///
/// Each attempt:
/// 1. Reads the current item and decodes it
/// 2. Applies the transform to a private copy
/// 3. Publishes the result with a compare-and-swap against the item read
///
/// A stale pre-image makes the attempt wait `retry_delay` and start over
/// from a fresh read, so a transform never runs on data another writer has
/// already replaced. Any other error ends the update immediately.
pub struct CasUpdater {
    backend: Arc<dyn Backend>,
    retry_delay: Duration,
    retry_limit: u32,
}

impl CasUpdater {
    /// Creates a new `CasUpdater`.
    ///
    /// # Arguments
    ///
    /// * `backend` - The shared store holding the trackers
    /// * `retry_delay` - Wait between attempts after a lost race
    /// * `retry_limit` - Maximum number of attempts, at least one
    pub fn new(backend: Arc<dyn Backend>, retry_delay: Duration, retry_limit: u32) -> Self {
        Self {
            backend,
            retry_delay,
            retry_limit: retry_limit.max(1),
        }
    }

    /// Updates a tracker by applying `transform` until a swap succeeds.
    ///
    /// The transform receives the decoded tracker and the backend's current
    /// time. It may run several times and must not have side effects.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the tracker does not exist
    /// - `BadParameter` if the stored data cannot be decoded
    /// - any error returned by `transform`
    /// - `Cancelled` if `cancel` fires during a backend call or a retry wait
    /// - `RetryLimitExceeded` if every attempt lost its race; the stored
    ///   tracker is then exactly as another writer left it
    pub async fn update<F>(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        mut transform: F,
    ) -> Result<SessionTracker>
    where
        F: FnMut(&mut SessionTracker, DateTime<Utc>) -> Result<()>,
    {
        let key = tracker_key(session_id);

        for attempt in 1..=self.retry_limit {
            tracing::debug!(session_id, attempt, "compare-and-swap attempt");

            let current = cancellable(cancel, self.backend.get(&key))
                .await
                .map_err(tracker_not_found(session_id))?;

            let mut tracker = unmarshal_session_tracker(
                &current.value,
                MarshalOptions::default().with_id(current.id),
            )?;
            transform(&mut tracker, self.backend.clock().now())?;

            let value = marshal_session_tracker(&tracker, MarshalOptions::default())?;
            let replace = Item::new(key.clone(), value, tracker.resource_expiry);

            match cancellable(cancel, self.backend.compare_and_swap(&current, replace)).await {
                Ok(stored) => {
                    tracker.resource_id = stored.id;
                    return Ok(tracker);
                }
                Err(err) if err.is_compare_failed() => {
                    tracing::warn!(
                        session_id,
                        attempt,
                        "session tracker changed concurrently, retrying"
                    );
                    if attempt == self.retry_limit {
                        break;
                    }
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(TrackerError::Cancelled),
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
                Err(err) => return Err(tracker_not_found(session_id)(err)),
            }
        }

        Err(TrackerError::RetryLimitExceeded {
            attempts: self.retry_limit,
        })
    }
}
