//! Listing, expiry filtering and background removal of stale trackers.

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{FaultyBackend, create_request, harness, start_time, test_config};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracker_application::{SessionTrackerService, TrackerEventLayer, tracker_key};
use tracker_core::backend::{Backend, Item};
use tracker_core::capability::Features;
use tracker_core::clock::ManualClock;
use tracker_infrastructure::InMemoryBackend;
use tracker_infrastructure::dto::{
    MarshalOptions, marshal_session_tracker, unmarshal_session_tracker,
};

/// Rewrites a stored tracker in place, bypassing the service.
async fn rewrite(
    backend: &dyn Backend,
    session_id: &str,
    expires: Option<DateTime<Utc>>,
    resource_expiry: Option<DateTime<Utc>>,
    backend_expiry: Option<DateTime<Utc>>,
) {
    let item = backend.get(&tracker_key(session_id)).await.unwrap();
    let mut tracker = unmarshal_session_tracker(&item.value, MarshalOptions::default()).unwrap();
    tracker.expires = expires;
    tracker.resource_expiry = resource_expiry;
    let value = marshal_session_tracker(&tracker, MarshalOptions::default()).unwrap();
    backend
        .put(Item::new(item.key, value, backend_expiry))
        .await
        .unwrap();
}

async fn wait_until_deleted(backend: &dyn Backend, session_id: &str) {
    for _ in 0..200 {
        match backend.get(&tracker_key(session_id)).await {
            Err(err) if err.is_not_found() => return,
            _ => tokio::time::sleep(std::time::Duration::from_millis(5)).await,
        }
    }
    panic!("tracker {} was never removed", session_id);
}

fn ids(trackers: &[tracker_core::session::SessionTracker]) -> Vec<&str> {
    trackers.iter().map(|t| t.session_id.as_str()).collect()
}

#[tokio::test]
async fn test_resource_expiry_keeps_tracker_listed() {
    let h = harness();
    let cancel = CancellationToken::new();

    let mut request = create_request("s1", "alice");
    request.expires = Some(start_time() + Duration::minutes(10));
    h.service.create_session_tracker(&cancel, request).await.unwrap();

    // The session deadline has passed but the resource is still live.
    h.clock.advance(Duration::minutes(1));
    h.service
        .update_session_tracker(
            &cancel,
            tracker_core::session::UpdateSessionTrackerRequest::new(
                "s1",
                tracker_core::session::SessionTrackerUpdate::SetExpiry(start_time()),
            ),
        )
        .await
        .unwrap();

    let active = h.service.get_active_session_trackers(&cancel).await.unwrap();
    assert_eq!(ids(&active), vec!["s1"]);

    h.clock.advance(Duration::minutes(10));
    let active = h.service.get_active_session_trackers(&cancel).await.unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn test_orphans_are_hidden_and_removed() {
    let h = harness();
    let cancel = CancellationToken::new();
    for id in ["live", "orphan"] {
        h.service
            .create_session_tracker(&cancel, create_request(id, "alice"))
            .await
            .unwrap();
    }
    rewrite(
        h.backend.as_ref(),
        "orphan",
        Some(start_time() - Duration::minutes(1)),
        None,
        None,
    )
    .await;

    let active = h.service.get_active_session_trackers(&cancel).await.unwrap();
    assert_eq!(ids(&active), vec!["live"]);

    wait_until_deleted(h.backend.as_ref(), "orphan").await;
    h.backend.get(&tracker_key("live")).await.unwrap();
}

#[tokio::test]
async fn test_dead_trackers_with_backend_expiry_are_left_alone() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.service
        .create_session_tracker(&cancel, create_request("s1", "alice"))
        .await
        .unwrap();
    let past = Some(start_time() - Duration::minutes(1));
    rewrite(
        h.backend.as_ref(),
        "s1",
        past,
        past,
        Some(start_time() + Duration::minutes(30)),
    )
    .await;

    let active = h.service.get_active_session_trackers(&cancel).await.unwrap();
    assert!(active.is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    h.backend.get(&tracker_key("s1")).await.unwrap();
}

#[tokio::test]
async fn test_scan_is_limited_to_tracker_keys() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.service
        .create_session_tracker(&cancel, create_request("s1", "alice"))
        .await
        .unwrap();
    for key in ["/other/s1", "/session_trackers/s1"] {
        h.backend
            .put(Item::new(key, b"not a tracker".to_vec(), None))
            .await
            .unwrap();
    }

    let active = h.service.get_active_session_trackers(&cancel).await.unwrap();
    assert_eq!(ids(&active), vec!["s1"]);
}

#[tokio::test]
async fn test_malformed_tracker_fails_the_listing() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.backend
        .put(Item::new(tracker_key("broken"), b"{}".to_vec(), None))
        .await
        .unwrap();

    let err = h
        .service
        .get_active_session_trackers(&cancel)
        .await
        .unwrap_err();
    assert!(err.is_bad_parameter());
}

#[tokio::test]
async fn test_failed_removal_is_logged_not_returned() {
    let (layer, mut events) = TrackerEventLayer::channel(Level::ERROR);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));

    let clock = Arc::new(ManualClock::new(start_time()));
    let inner = Arc::new(InMemoryBackend::with_clock(clock));
    let mut backend = FaultyBackend::new(inner.clone());
    backend.failing_delete = true;
    let service =
        SessionTrackerService::new(Arc::new(backend), Arc::new(Features::default()), test_config());
    let cancel = CancellationToken::new();

    service
        .create_session_tracker(&cancel, create_request("orphan", "alice"))
        .await
        .unwrap();
    rewrite(
        inner.as_ref(),
        "orphan",
        Some(start_time() - Duration::minutes(1)),
        None,
        None,
    )
    .await;

    let active = service.get_active_session_trackers(&cancel).await.unwrap();
    assert!(active.is_empty());

    let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
        .await
        .expect("removal failure should be reported")
        .unwrap();
    assert_eq!(event.level, "ERROR");
    assert_eq!(event.message, "Failed to remove stale session tracker");
    assert_eq!(event.fields["key"], tracker_key("orphan"));

    inner.get(&tracker_key("orphan")).await.unwrap();
}

#[tokio::test]
async fn test_racing_removals_stay_quiet() {
    let (layer, mut events) = TrackerEventLayer::channel(Level::ERROR);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));

    let h = harness();
    let cancel = CancellationToken::new();
    h.service
        .create_session_tracker(&cancel, create_request("orphan", "alice"))
        .await
        .unwrap();
    rewrite(
        h.backend.as_ref(),
        "orphan",
        Some(start_time() - Duration::minutes(1)),
        None,
        None,
    )
    .await;

    // Both listings may schedule a removal of the same item; the loser sees
    // NotFound.
    h.service.get_active_session_trackers(&cancel).await.unwrap();
    h.service.get_active_session_trackers(&cancel).await.unwrap();
    wait_until_deleted(h.backend.as_ref(), "orphan").await;
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_unversioned_record_is_listed() {
    let h = harness();
    let cancel = CancellationToken::new();
    h.service
        .create_session_tracker(&cancel, create_request("s1", "alice"))
        .await
        .unwrap();

    let item = h.backend.get(&tracker_key("s1")).await.unwrap();
    let mut json: serde_json::Value = serde_json::from_slice(&item.value).unwrap();
    json.as_object_mut().unwrap().remove("version");
    h.backend
        .put(Item::new(item.key, json.to_string().into_bytes(), item.expires))
        .await
        .unwrap();

    let active = h.service.get_active_session_trackers(&cancel).await.unwrap();
    assert_eq!(ids(&active), vec!["s1"]);
}
