#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracker_application::SessionTrackerService;
use tracker_core::backend::{Backend, Item};
use tracker_core::capability::Features;
use tracker_core::clock::{Clock, ManualClock};
use tracker_core::config::TrackerConfig;
use tracker_core::error::{Result, TrackerError};
use tracker_core::session::{CreateSessionTrackerRequest, Participant, ParticipantMode, SessionKind};
use tracker_infrastructure::InMemoryBackend;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

/// Defaults with a short retry delay so contention tests stay fast.
pub fn test_config() -> TrackerConfig {
    TrackerConfig {
        retry_delay_ms: 5,
        ..TrackerConfig::default()
    }
}

pub fn participant(user: &str) -> Participant {
    Participant::new(format!("p-{}", user), user, ParticipantMode::Peer)
}

pub fn create_request(id: &str, initiator: &str) -> CreateSessionTrackerRequest {
    let mut request =
        CreateSessionTrackerRequest::new(id, SessionKind::Ssh, participant(initiator));
    request.hostname = "node-1".to_string();
    request.address = "10.0.0.1:3022".to_string();
    request.cluster_name = "root".to_string();
    request.login = "root".to_string();
    request.host_user = initiator.to_string();
    request
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub backend: Arc<InMemoryBackend>,
    pub service: SessionTrackerService,
}

pub fn harness_with(config: TrackerConfig, features: Features) -> Harness {
    let clock = Arc::new(ManualClock::new(start_time()));
    let backend = Arc::new(InMemoryBackend::with_clock(clock.clone()));
    let service = SessionTrackerService::new(backend.clone(), Arc::new(features), config);
    Harness {
        clock,
        backend,
        service,
    }
}

pub fn harness() -> Harness {
    harness_with(test_config(), Features::default())
}

/// Wraps the in-memory backend and injects failures.
pub struct FaultyBackend {
    pub inner: Arc<InMemoryBackend>,
    /// Every compare-and-swap reports a stale pre-image
    pub stale_cas: bool,
    /// Every delete fails with a backend error
    pub failing_delete: bool,
    pub cas_attempts: AtomicU32,
}

impl FaultyBackend {
    pub fn new(inner: Arc<InMemoryBackend>) -> Self {
        Self {
            inner,
            stale_cas: false,
            failing_delete: false,
            cas_attempts: AtomicU32::new(0),
        }
    }

    pub fn cas_attempts(&self) -> u32 {
        self.cas_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FaultyBackend {
    async fn get(&self, key: &str) -> Result<Item> {
        self.inner.get(key).await
    }

    async fn put(&self, item: Item) -> Result<Item> {
        self.inner.put(item).await
    }

    async fn create(&self, item: Item) -> Result<Item> {
        self.inner.create(item).await
    }

    async fn compare_and_swap(&self, expected: &Item, replace: Item) -> Result<Item> {
        self.cas_attempts.fetch_add(1, Ordering::SeqCst);
        if self.stale_cas {
            return Err(TrackerError::compare_failed("injected stale pre-image"));
        }
        self.inner.compare_and_swap(expected, replace).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if self.failing_delete {
            return Err(TrackerError::backend("injected delete failure"));
        }
        self.inner.delete(key).await
    }

    async fn get_range(&self, start: &[u8], end: &[u8], limit: usize) -> Result<Vec<Item>> {
        self.inner.get_range(start, end, limit).await
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock()
    }
}
