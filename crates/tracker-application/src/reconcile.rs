//! Expiry reconciliation and garbage collection of orphaned trackers.
//!
//! A stored tracker carries two deadlines: the session expiry and the
//! resource expiry. A tracker is live while the later of the two is in the
//! future. Dead trackers whose backend item has an expiry are left for the
//! backend to reclaim; dead trackers without one would linger forever, so
//! they are deleted here in the background.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracker_core::backend::{Backend, Item};
use tracker_core::error::Result;
use tracker_core::session::SessionTracker;
use tracker_infrastructure::dto::{MarshalOptions, unmarshal_session_tracker};

/// The outcome of classifying a range scan.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Trackers that are still live, in scan order
    pub active: Vec<SessionTracker>,
    /// Dead items the backend will never reclaim by itself
    pub orphaned: Vec<Item>,
    /// Dead items the backend will reclaim at their expiry
    pub awaiting_reclaim: usize,
}

/// Classifies scanned items at `now`.
///
/// # Errors
///
/// Returns `BadParameter` if any item fails to decode.
pub fn reconcile(items: Vec<Item>, now: DateTime<Utc>) -> Result<Reconciliation> {
    let mut result = Reconciliation {
        active: Vec::with_capacity(items.len()),
        ..Default::default()
    };

    for item in items {
        let tracker =
            unmarshal_session_tracker(&item.value, MarshalOptions::default().with_id(item.id))?;

        // The session's own deadline, not the backend expiry in `item.expires`.
        if tracker.is_active(now) {
            result.active.push(tracker);
        } else if item.expires.is_none() {
            result.orphaned.push(item);
        } else {
            result.awaiting_reclaim += 1;
        }
    }

    Ok(result)
}

/// Deletes orphaned items in a detached task.
///
/// Failures other than `NotFound` are logged and never reach the caller
/// that triggered the collection. Returns `None` when there is nothing to
/// delete.
pub fn spawn_orphan_gc(backend: Arc<dyn Backend>, orphaned: Vec<Item>) -> Option<JoinHandle<()>> {
    if orphaned.is_empty() {
        return None;
    }

    tracing::info!(count = orphaned.len(), "removing stale session trackers");
    Some(tokio::spawn(async move {
        for item in orphaned {
            match backend.delete(&item.key).await {
                Ok(()) => tracing::debug!(key = %item.key, "removed stale session tracker"),
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    tracing::error!(
                        key = %item.key,
                        error = %err,
                        "Failed to remove stale session tracker"
                    );
                }
            }
        }
    }))
}
