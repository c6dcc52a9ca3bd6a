//! Gateway configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_stall_threshold_secs() -> u64 {
    300
}

fn default_confirm_timeout_ms() -> u64 {
    2000
}

/// Tunables for the gateway.
///
/// Deserializable from the `[gateway]` table of the dossier config
/// file; every field has a default so a missing table works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Seconds a section may stay in flight before a stall alert.
    #[serde(default = "default_stall_threshold_secs")]
    pub stall_threshold_secs: u64,

    /// Milliseconds the confirm handshake may take.
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,

    /// Approve drafts automatically after publishing.
    ///
    /// Used by unattended pipeline runs; interactive deployments leave
    /// this off and approve through a reviewer.
    #[serde(default)]
    pub auto_approve: bool,
}

impl GatewayConfig {
    /// Stall threshold as a [`Duration`].
    #[must_use]
    pub fn stall_threshold(&self) -> Duration {
        Duration::from_secs(self.stall_threshold_secs)
    }

    /// Confirm timeout as a [`Duration`].
    #[must_use]
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            stall_threshold_secs: default_stall_threshold_secs(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            auto_approve: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.stall_threshold(), Duration::from_secs(300));
        assert_eq!(config.confirm_timeout(), Duration::from_millis(2000));
        assert!(!config.auto_approve);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: GatewayConfig = serde_json::from_str(r#"{"auto_approve": true}"#).unwrap();
        assert!(config.auto_approve);
        assert_eq!(config.stall_threshold_secs, 300);
    }
}
