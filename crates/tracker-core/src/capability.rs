//! Licensed capability checks.

use serde::{Deserialize, Serialize};

/// Answers whether licensed features are enabled for this cluster.
pub trait FeatureGate: Send + Sync {
    /// Whether sessions that require moderator approval may be created.
    fn moderated_sessions(&self) -> bool;
}

/// A static feature set, usually read from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub moderated_sessions: bool,
}

impl FeatureGate for Features {
    fn moderated_sessions(&self) -> bool {
        self.moderated_sessions
    }
}
