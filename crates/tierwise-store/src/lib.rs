//! tierwise-store: Store adapters for the evaluation engine.
//!
//! Implements the `AttemptStore`, `ConfigStore` and `ProgressStore` traits
//! over an in-memory dataset, provides a call-recording wrapper for tests,
//! and loads the tool configuration file.

pub mod config;
pub mod error;
pub mod memory;
pub mod mock;

pub use config::{load_config, load_config_from, TierwiseConfig};
pub use error::StoreError;
pub use memory::{ApplySummary, MemoryStore};
pub use mock::{CountingStore, StoreCall};
