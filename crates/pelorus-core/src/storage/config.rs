use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::kernel::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_SYSTEM_PLUGINS};
use crate::plugin_system::registry::PluginConfigSnapshot;
use crate::storage::error::StorageSystemError;
use crate::ui_bridge::{DEFAULT_MENU_ID_BASE, DEFAULT_TOOL_ID_BASE};

type Result<T> = std::result::Result<T, StorageSystemError>;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }

    fn require(path: &Path) -> Result<Self> {
        Self::from_path(path).ok_or_else(|| StorageSystemError::UnsupportedConfigFormat(path.display().to_string()))
    }
}

/// Host settings that affect plugin management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Replaces the platform search directories when non-empty.
    pub plugin_dirs: Vec<PathBuf>,
    /// Overrides the platform user plugin directory.
    pub user_plugin_dir: Option<PathBuf>,
    /// Plugins that ship with the host.
    pub system_plugins: Vec<String>,
    /// `;`-separated display order.
    pub plugin_order: String,
    /// Whether load problems are handed to the caller for display.
    pub blacklist_dialog: bool,
    pub tool_id_base: i32,
    pub menu_id_base: i32,
    /// Persisted enabled state, keyed by lowercase common name. Kept last so
    /// it serializes as a trailing TOML table.
    pub enabled: BTreeMap<String, bool>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: Vec::new(),
            user_plugin_dir: None,
            system_plugins: DEFAULT_SYSTEM_PLUGINS.iter().map(|s| s.to_string()).collect(),
            plugin_order: String::new(),
            blacklist_dialog: true,
            tool_id_base: DEFAULT_TOOL_ID_BASE,
            menu_id_base: DEFAULT_MENU_ID_BASE,
            enabled: BTreeMap::new(),
        }
    }
}

impl HostConfig {
    /// `<home>/.pelorus/pelorus.toml`
    pub fn default_path(home: &Path) -> PathBuf {
        home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Serialize to string based on format
    pub fn serialize(&self, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| StorageSystemError::SerializationError { format: "json".into(), source: Box::new(e) }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| StorageSystemError::SerializationError { format: "yaml".into(), source: Box::new(e) }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| StorageSystemError::SerializationError { format: "toml".into(), source: Box::new(e) }),
        }
    }

    /// Deserialize from string based on format
    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Json => serde_json::from_str(data)
                .map_err(|e| StorageSystemError::DeserializationError { format: "json".into(), source: Box::new(e) }),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data)
                .map_err(|e| StorageSystemError::DeserializationError { format: "yaml".into(), source: Box::new(e) }),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data)
                .map_err(|e| StorageSystemError::DeserializationError { format: "toml".into(), source: Box::new(e) }),
        }
    }

    /// Read a config file; the format follows the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::require(path)?;
        let data = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageSystemError::FileNotFound(path.to_path_buf())
            } else {
                StorageSystemError::io(e, "read config", path.to_path_buf())
            }
        })?;
        let config = Self::deserialize(&data, format)?;
        log::debug!("Loaded host configuration from {}", path.display());
        Ok(config)
    }

    /// Like [`load`](Self::load), falling back to defaults when the file
    /// does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(StorageSystemError::FileNotFound(_)) => {
                log::info!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Write the config, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.serialize(ConfigFormat::require(path)?)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageSystemError::io(e, "create config directory", parent.to_path_buf()))?;
        }
        std::fs::write(path, data).map_err(|e| StorageSystemError::io(e, "write config", path.to_path_buf()))?;
        log::debug!("Saved host configuration to {}", path.display());
        Ok(())
    }

    /// Take over the registry's persisted state.
    pub fn apply_snapshot(&mut self, snapshot: PluginConfigSnapshot) {
        self.enabled = snapshot.enabled;
        self.plugin_order = snapshot.order;
    }
}
