// Store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default wait for another process to release the data directory
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Where the store keeps its snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the snapshot; `None` keeps everything in memory
    pub data_dir: Option<PathBuf>,
    /// How long `open` waits for the directory lock
    pub lock_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Purely in-memory store
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store persisted under `dir`
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Same store, with a different lock wait
    #[must_use]
    pub fn with_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }
}
