//! CLI configuration.
//!
//! Configuration is loaded from a TOML document:
//!
//! ```toml
//! [gateway]
//! stall_threshold_secs = 300
//! auto_approve = true
//!
//! [[sections]]
//! section_id = "section_1"
//! title = "Case Intake & Objectives"
//! predecessors = []
//! max_reruns = 2
//! ```
//!
//! Missing tables fall back to defaults; an empty `sections` list means
//! the builtin contract set.

use anyhow::Context;
use dossier_control::{ContractSet, SectionContract};
use dossier_gateway::GatewayConfig;
use serde::Deserialize;
use std::path::Path;

/// Root of the dossier config document.
#[derive(Debug, Default, Deserialize)]
pub struct DossierConfig {
    /// Gateway tunables.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Section contracts; empty means the builtin set.
    #[serde(default)]
    pub sections: Vec<SectionContract>,
}

impl DossierConfig {
    /// Loads a config file, or defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or does not parse.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("parsing config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Builds the validated contract set from the config.
    ///
    /// # Errors
    ///
    /// Fails when the configured contracts are inconsistent (duplicate
    /// ids, unknown predecessors, cycles).
    pub fn contract_set(&self) -> anyhow::Result<ContractSet> {
        if self.sections.is_empty() {
            Ok(ContractSet::standard())
        } else {
            ContractSet::new(self.sections.clone())
                .map_err(|reason| anyhow::anyhow!("invalid section contracts: {reason}"))
        }
    }
}
