use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use libloading::Library;

use crate::plugin_system::abi::{CREATE_SYMBOL, CreatePluginFn, DESTROY_SYMBOL, DestroyPluginFn};
use crate::plugin_system::compat::{CompatibilityPolicy, DeferredReport, ReportKind, Verdict};
use crate::plugin_system::error::{PluginSystemError, panic_message};
use crate::plugin_system::ffi::VTablePlugin;
use crate::plugin_system::paths::module_short_name;
use crate::plugin_system::traits::Plugin;
use crate::plugin_system::version::{ApiVersion, SemanticVersion};

/// Host plugin ABI version. Plugins built against a newer major are refused.
pub const HOST_API_VERSION: ApiVersion = ApiVersion::new(1, 17);

/// An opened module: the plugin instance plus the library that holds its
/// code.
///
/// Field order is drop order: the plugin is destroyed before its library is
/// unmapped.
pub struct ModuleCapsule {
    plugin: Box<dyn Plugin>,
    library: Option<Library>,
    path: PathBuf,
}

impl ModuleCapsule {
    /// Wraps a plugin compiled into the host or supplied by a test backend.
    pub fn from_plugin(path: impl Into<PathBuf>, plugin: Box<dyn Plugin>) -> Self {
        Self { plugin, library: None, path: path.into() }
    }

    fn native(path: &Path, plugin: Box<dyn Plugin>, library: Library) -> Self {
        Self { plugin, library: Some(library), path: path.to_path_buf() }
    }

    pub fn plugin(&self) -> &dyn Plugin {
        self.plugin.as_ref()
    }

    pub fn plugin_mut(&mut self) -> &mut dyn Plugin {
        self.plugin.as_mut()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }
}

impl fmt::Debug for ModuleCapsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCapsule")
            .field("plugin", &self.plugin.common_name())
            .field("path", &self.path)
            .field("native", &self.is_native())
            .finish()
    }
}

/// Result of asking a backend to open one file.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded { capsule: ModuleCapsule },
    Failed { reason: PluginSystemError },
}

/// Turns a file on disk into a [`ModuleCapsule`].
pub trait ModuleBackend {
    fn name(&self) -> &str;

    /// False when the platform cannot load modules at all.
    fn is_available(&self) -> bool {
        true
    }

    fn open(&self, path: &Path) -> LoadOutcome;
}

/// Loads native shared libraries with `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl NativeBackend {
    fn open_native(path: &Path) -> Result<ModuleCapsule, PluginSystemError> {
        let library = unsafe { Library::new(path) }.map_err(|e| PluginSystemError::OpenFailed {
            path: path.to_path_buf(),
            reason: "cannot load library".to_string(),
            source: Some(Box::new(e)),
        })?;

        let (create, destroy) = unsafe {
            let create = library.get::<CreatePluginFn>(CREATE_SYMBOL).map_err(|e| PluginSystemError::OpenFailed {
                path: path.to_path_buf(),
                reason: "missing symbol pelorus_create_plugin".to_string(),
                source: Some(Box::new(e)),
            })?;
            let destroy = library.get::<DestroyPluginFn>(DESTROY_SYMBOL).map_err(|e| PluginSystemError::OpenFailed {
                path: path.to_path_buf(),
                reason: "missing symbol pelorus_destroy_plugin".to_string(),
                source: Some(Box::new(e)),
            })?;
            (*create, *destroy)
        };

        let raw = panic::catch_unwind(AssertUnwindSafe(|| unsafe { create() })).map_err(|payload| {
            PluginSystemError::open_failed(path, format!("plugin factory panicked: {}", panic_message(&*payload)))
        })?;
        let vtable = NonNull::new(raw).ok_or_else(|| PluginSystemError::open_failed(path, "plugin factory returned null"))?;

        let plugin = unsafe { VTablePlugin::from_raw(vtable, destroy) }
            .map_err(|reason| PluginSystemError::open_failed(path, reason))?;
        Ok(ModuleCapsule::native(path, Box::new(plugin), library))
    }
}

impl ModuleBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn open(&self, path: &Path) -> LoadOutcome {
        match Self::open_native(path) {
            Ok(capsule) => LoadOutcome::Loaded { capsule },
            Err(reason) => LoadOutcome::Failed { reason },
        }
    }
}

/// A module that passed every load-time check.
#[derive(Debug)]
pub struct LoadedModule {
    pub capsule: ModuleCapsule,
    pub short_name: String,
    pub version: SemanticVersion,
    pub verdict: Verdict,
}

/// Opens modules and applies the API and blacklist checks.
pub struct ModuleLoader {
    backend: Box<dyn ModuleBackend>,
    host_api: ApiVersion,
    policy: CompatibilityPolicy,
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new(Box::new(NativeBackend))
    }
}

impl ModuleLoader {
    pub fn new(backend: Box<dyn ModuleBackend>) -> Self {
        Self { backend, host_api: HOST_API_VERSION, policy: CompatibilityPolicy::builtin() }
    }

    pub fn with_policy(mut self, policy: CompatibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_host_api(mut self, host_api: ApiVersion) -> Self {
        self.host_api = host_api;
        self
    }

    pub fn backend(&self) -> &dyn ModuleBackend {
        self.backend.as_ref()
    }

    pub fn host_api(&self) -> ApiVersion {
        self.host_api
    }

    pub fn policy(&self) -> &CompatibilityPolicy {
        &self.policy
    }

    /// Open, API check, version resolution, policy check. Every refusal is
    /// also recorded in `report`; a refused module is dropped here and never
    /// reaches the registry.
    pub fn load(&self, path: &Path, report: &mut DeferredReport) -> Result<LoadedModule, PluginSystemError> {
        let short_name = module_short_name(path);
        log::debug!("Opening plugin module {} with {} backend", path.display(), self.backend.name());

        let capsule = match self.backend.open(path) {
            LoadOutcome::Loaded { capsule } => capsule,
            LoadOutcome::Failed { reason } => {
                report.record(path, &short_name, ReportKind::OpenFailed, reason.to_string());
                return Err(reason);
            }
        };
        let plugin = capsule.plugin();
        let common_name = plugin.common_name().to_string();

        let plugin_api = plugin.api_version();
        if plugin_api.is_newer_major_than(&self.host_api) {
            let err = PluginSystemError::IncompatibleApi {
                plugin: common_name.clone(),
                plugin_api,
                host_api: self.host_api,
            };
            report.record(path, &common_name, ReportKind::IncompatibleApi, err.to_string());
            return Err(err);
        }
        if plugin_api < self.host_api {
            log::debug!("Plugin '{}' uses older API {} (host {})", common_name, plugin_api, self.host_api);
        }

        let version = match plugin.version_string() {
            Some(text) => match SemanticVersion::parse(text) {
                Ok(version) => version,
                Err(source) => {
                    let err = PluginSystemError::MalformedVersion { plugin: common_name.clone(), source };
                    report.record(path, &common_name, ReportKind::MalformedVersion, err.to_string());
                    SemanticVersion::lowest()
                }
            },
            None => {
                let (major, minor) = plugin.version_pair();
                SemanticVersion::from_legacy(major, minor)
            }
        };

        let verdict = self.policy.evaluate_any([short_name.as_str(), common_name.as_str()], &version);
        match verdict {
            Verdict::Reject => {
                let err = PluginSystemError::Blacklisted {
                    plugin: common_name.clone(),
                    version: version.to_string(),
                    hard: true,
                };
                report.record(path, &common_name, ReportKind::Blacklisted { hard: true }, err.to_string());
                return Err(err);
            }
            Verdict::AllowWithWarning => {
                let message = format!("{} {} is known to be unstable with this host", common_name, version);
                report.record(path, &common_name, ReportKind::Blacklisted { hard: false }, message);
            }
            Verdict::Allow => {}
        }

        log::info!("Loaded plugin '{}' {} from {}", common_name, version, path.display());
        Ok(LoadedModule { capsule, short_name, version, verdict })
    }
}
