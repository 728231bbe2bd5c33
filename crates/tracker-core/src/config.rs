use crate::capability::Features;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of a tracker without a session expiry.
pub const DEFAULT_SESSION_TRACKER_TTL_SECS: u64 = 60 * 60;
/// Default wait between compare-and-swap attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
/// Default number of compare-and-swap attempts.
pub const DEFAULT_RETRY_LIMIT: u32 = 7;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Let a create with a colliding session ID replace the stored tracker.
    #[serde(default)]
    pub allow_create_overwrite: bool,
    /// Reject state changes `SessionState::can_transition_to` forbids.
    #[serde(default)]
    pub strict_state_transitions: bool,
    #[serde(default)]
    pub features: Features,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_SESSION_TRACKER_TTL_SECS
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

fn default_retry_limit() -> u32 {
    DEFAULT_RETRY_LIMIT
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: DEFAULT_SESSION_TRACKER_TTL_SECS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            retry_limit: DEFAULT_RETRY_LIMIT,
            allow_create_overwrite: false,
            strict_state_transitions: false,
            features: Features::default(),
        }
    }
}

impl TrackerConfig {
    pub fn default_ttl(&self) -> chrono::Duration {
        i64::try_from(self.default_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Parses a TOML document; absent keys take their defaults.
    pub fn from_toml_str(contents: &str) -> crate::error::Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the tracker cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.retry_limit == 0 {
            return Err(crate::error::TrackerError::config(
                "retry_limit must be at least 1",
            ));
        }
        Ok(())
    }
}
