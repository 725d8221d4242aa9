//! # Pelorus Kernel Errors
//!
//! [`Error`] aggregates the typed errors of every subsystem so host-level
//! operations can use `?` across them.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::event::error::EventSystemError;
use crate::plugin_system::error::{ErrorKind, PluginSystemError};
use crate::storage::error::StorageSystemError;
use crate::ui_bridge::error::UiBridgeError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// UI Bridge system error
    #[error("UI Bridge system error: {0}")]
    UiBridge(#[from] UiBridgeError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::io(source, operation, path))
    }

    /// The plugin error classification, when this wraps one.
    pub fn plugin_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::PluginSystem(e) | Error::EventSystem(EventSystemError::Registry(e)) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;
