//! # Pelorus Plugin System
//!
//! Discovery, loading and lifecycle of plugin modules.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`abi`]**: The C-compatible function table a native module exports.
//! - **[`compat`]**: The blacklist policy and the deferred report of load
//!   problems shown to the user once per pass.
//! - **[`context`]**: [`HostContext`], the handle a plugin uses to ask the host
//!   for toolbar tools, menu items and messages.
//! - **[`loader`]**: Opens module files through a [`ModuleBackend`] and applies
//!   the API and blacklist checks.
//! - **[`registry`]**: [`PluginRegistry`], the table of discovered plugins with
//!   their enabled state, status and display order.
//! - **[`status`]**: Management states and the authority decision between
//!   duplicate copies of one plugin.
//! - **[`traits`]**: The [`Plugin`] trait every plugin implements.
//! - **[`version`]**: API and semantic versions.
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod abi;
pub mod capability;
pub mod catalog;
pub mod compat;
pub mod context;
pub mod error;
pub(crate) mod ffi;
pub mod loader;
pub mod order;
pub mod paths;
pub mod registry;
pub mod status;
pub mod traits;
pub mod version;

pub use capability::CapabilityFlags;
pub use catalog::{CatalogListing, CatalogSource, CatalogUpdate, PluginMetadata};
pub use compat::{CompatibilityPolicy, CompatibilityRule, DeferredReport, ReportKind, ScanReport, Verdict};
pub use context::{HostContext, HostRequest};
pub use error::{ErrorKind, PluginError, PluginResult, PluginSystemError};
pub use loader::{HOST_API_VERSION, LoadOutcome, ModuleBackend, ModuleCapsule, ModuleLoader, NativeBackend};
pub use paths::{DirectoryKind, PluginPaths};
pub use registry::{PluginConfigSnapshot, PluginRecord, PluginRegistry, UpdateSummary};
pub use status::{ActionVerb, AuthorityPolicy, DefaultAuthority, PluginStatus, VersionedIdentity};
pub use traits::Plugin;
pub use version::{ApiVersion, SemanticVersion, VersionError};

/// Host-assigned plugin handle. Never reused within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginId(pub u32);

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests;
