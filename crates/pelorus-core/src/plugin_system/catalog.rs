//! Catalog records and the asynchronous source that produces them.
//!
//! Fetching and installing are outside the host; it only consumes the
//! metadata a [`CatalogSource`] produces and reflects it in plugin statuses.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::plugin_system::status::PluginStatus;
use crate::plugin_system::version::{SemanticVersion, VersionError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub info_url: String,
    /// Platform the package targets, e.g. `ubuntu-x86_64`.
    #[serde(default)]
    pub target: String,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            summary: String::new(),
            info_url: String::new(),
            target: String::new(),
        }
    }

    pub fn semantic_version(&self) -> Result<SemanticVersion, VersionError> {
        SemanticVersion::parse(&self.version)
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// One row of the management listing for a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogListing {
    pub metadata: PluginMetadata,
    pub status: PluginStatus,
}

/// Result of one catalog fetch, delivered over the host's catalog channel.
#[derive(Debug, Clone)]
pub enum CatalogUpdate {
    Fetched(Vec<PluginMetadata>),
    Failed(String),
}

/// External producer of catalog metadata, e.g. a download of the plugin
/// index. Runs on the async runtime, never on the control thread.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<PluginMetadata>, String>;
}
