//! # Pelorus Plugin System Errors
//!
//! Defines error types specific to the plugin system.
//!
//! [`PluginSystemError`] covers discovery, loading, compatibility and
//! lifecycle failures. [`ErrorKind`] is the coarse taxonomy callers use to
//! decide how a failure propagates: discovery-time kinds are logged and the
//! scan continues, dispatch-time kinds are isolated to one plugin, and only
//! [`ErrorKind::BackendUnavailable`] escalates out of a full load pass.
use std::path::PathBuf;

use crate::plugin_system::version::{ApiVersion, VersionError};
use crate::plugin_system::PluginId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    OpenFailed,
    IncompatibleApi,
    Blacklisted,
    MalformedVersion,
    HandlerFault,
    UnloadInvariantViolation,
    InitFailed,
    NotFound,
    NoPluginsLoaded,
    BackendUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Failed to open plugin module '{}': {reason}", path.display())]
    OpenFailed {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Plugin '{plugin}' targets API {plugin_api}, host supports up to {host_api}")]
    IncompatibleApi {
        plugin: String,
        plugin_api: ApiVersion,
        host_api: ApiVersion,
    },

    #[error("Plugin '{plugin}' version {version} is blacklisted (hard: {hard})")]
    Blacklisted {
        plugin: String,
        version: String,
        hard: bool,
    },

    #[error("Malformed version for plugin '{plugin}': {source}")]
    MalformedVersion {
        plugin: String,
        #[source]
        source: VersionError,
    },

    #[error("Plugin '{plugin}' faulted in handler '{operation}': {message}")]
    HandlerFault {
        plugin: String,
        operation: String,
        message: String,
    },

    #[error("Refusing to release module of plugin '{plugin}' while it is still initialized")]
    UnloadInvariantViolation { plugin: String },

    #[error("Plugin '{plugin}' failed to initialize: {message}")]
    InitFailed { plugin: String, message: String },

    #[error("Plugin {0} not found in registry")]
    PluginNotFound(PluginId),

    #[error("No plugins could be loaded from '{}' ({failures} candidate(s) failed)", dir.display())]
    NoPluginsLoaded { dir: PathBuf, failures: usize },

    #[error("No module backend is available: {0}")]
    BackendUnavailable(String),

    #[error("I/O error while {operation} '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl PluginSystemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginSystemError::OpenFailed { .. } | PluginSystemError::Io { .. } => ErrorKind::OpenFailed,
            PluginSystemError::IncompatibleApi { .. } => ErrorKind::IncompatibleApi,
            PluginSystemError::Blacklisted { .. } => ErrorKind::Blacklisted,
            PluginSystemError::MalformedVersion { .. } => ErrorKind::MalformedVersion,
            PluginSystemError::HandlerFault { .. } => ErrorKind::HandlerFault,
            PluginSystemError::UnloadInvariantViolation { .. } => ErrorKind::UnloadInvariantViolation,
            PluginSystemError::InitFailed { .. } => ErrorKind::InitFailed,
            PluginSystemError::PluginNotFound(_) => ErrorKind::NotFound,
            PluginSystemError::NoPluginsLoaded { .. } => ErrorKind::NoPluginsLoaded,
            PluginSystemError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
        }
    }

    pub fn open_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PluginSystemError::OpenFailed { path: path.into(), reason: reason.into(), source: None }
    }

    pub fn handler_fault(plugin: impl Into<String>, operation: impl Into<String>, message: impl Into<String>) -> Self {
        PluginSystemError::HandlerFault {
            plugin: plugin.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Error a plugin reports from one of its own entry points.
///
/// The host turns it into a [`PluginSystemError::HandlerFault`] or
/// [`PluginSystemError::InitFailed`] tagged with the plugin identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("returned status code {0}")]
    Status(i32),
    #[error("panicked: {0}")]
    Panic(String),
    #[error("{0}")]
    Message(String),
}

pub type PluginResult<T = ()> = std::result::Result<T, PluginError>;

/// Renders the payload of a caught panic.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}

/// Runs a plugin entry point, turning a panic into [`PluginError::Panic`].
pub(crate) fn guard<T>(call: impl FnOnce() -> PluginResult<T>) -> PluginResult<T> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(PluginError::Panic(panic_message(&*payload))),
    }
}
