//! # Pelorus Storage
//!
//! The host configuration file: plugin directories, enabled states, display
//! order and UI id bases. JSON is always available; YAML and TOML sit behind
//! the `yaml-config` and `toml-config` features.
pub mod config;
pub mod error;

pub use config::{ConfigFormat, HostConfig};
pub use error::StorageSystemError;
