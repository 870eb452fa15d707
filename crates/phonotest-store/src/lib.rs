//! phonotest-store — Response store backends and configuration.
//!
//! Implements the `ResponseStore` trait with an append-only JSON Lines file
//! and an in-memory store, and loads `phonotest.toml`.

pub mod config;
pub mod jsonl;
pub mod memory;

pub use config::{create_store, load_config, load_config_from, PhonotestConfig, StoreConfig};
pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
