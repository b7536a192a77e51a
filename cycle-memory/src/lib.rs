// CycleCare Memory Store
// Persistent storage for observations, notifications, Q-values and history

pub mod config;
pub mod store;
mod transaction;

pub use config::StoreConfig;
pub use store::{MemoryStore, LOCK_FILE, SNAPSHOT_FILE};
