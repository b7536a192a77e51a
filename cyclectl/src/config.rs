// Configuration file handling for cyclectl

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use cycle_memory::StoreConfig;
use cycle_rl_core::AgentConfig;

/// Full cyclectl configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    pub agent: AgentConfig,
    pub store: StoreConfig,
    /// Fixed RNG seed; entropy when absent
    pub seed: Option<u64>,
}

impl CycleConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: CycleConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.agent.validate()?;
        Ok(config)
    }
}
