use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::kernel::constants::DEFAULT_SYSTEM_PLUGINS;
use crate::plugin_system::PluginId;
use crate::plugin_system::capability::CapabilityFlags;
use crate::plugin_system::catalog::{CatalogListing, PluginMetadata};
use crate::plugin_system::compat::{DeferredReport, ReportKind, ScanReport};
use crate::plugin_system::context::{HostContext, SessionState};
use crate::plugin_system::error::{PluginSystemError, guard};
use crate::plugin_system::loader::{LoadedModule, ModuleCapsule, ModuleLoader};
use crate::plugin_system::order;
use crate::plugin_system::paths::{DirectoryKind, PluginPaths, discover_modules};
use crate::plugin_system::status::{
    ActionVerb, AuthorityPolicy, DefaultAuthority, PluginStatus, VersionedIdentity, managed_status,
};
use crate::plugin_system::traits::Plugin;
use crate::plugin_system::version::{ApiVersion, SemanticVersion};
use crate::ui_bridge::ContributionIds;

/// Everything the host knows about one discovered plugin file.
#[derive(Debug)]
pub struct PluginRecord {
    id: PluginId,
    file: PathBuf,
    short_name: String,
    common_name: String,
    short_description: String,
    long_description: String,
    modified: Option<SystemTime>,
    module: Option<ModuleCapsule>,
    capabilities: CapabilityFlags,
    version: SemanticVersion,
    api_version: ApiVersion,
    enabled: bool,
    initialized: bool,
    late_init_pending: bool,
    status: PluginStatus,
    managed: Option<PluginMetadata>,
    location: DirectoryKind,
    discovery_index: usize,
}

impl PluginRecord {
    pub fn id(&self) -> PluginId {
        self.id
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn short_description(&self) -> &str {
        &self.short_description
    }

    pub fn long_description(&self) -> &str {
        &self.long_description
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    pub fn version(&self) -> &SemanticVersion {
        &self.version
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_loaded(&self) -> bool {
        self.module.is_some()
    }

    /// Enabled, initialized and resident: eligible for event delivery.
    pub fn is_active(&self) -> bool {
        self.enabled && self.initialized && self.module.is_some()
    }

    pub fn status(&self) -> PluginStatus {
        self.status
    }

    pub fn action(&self) -> ActionVerb {
        self.status.action()
    }

    pub fn managed(&self) -> Option<&PluginMetadata> {
        self.managed.as_ref()
    }

    pub fn location(&self) -> DirectoryKind {
        self.location
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.common_name.eq_ignore_ascii_case(name) || self.short_name.eq_ignore_ascii_case(name)
    }

    pub(crate) fn plugin_mut(&mut self) -> Option<&mut dyn Plugin> {
        self.module.as_mut().map(ModuleCapsule::plugin_mut)
    }

    fn identity(&self) -> VersionedIdentity {
        VersionedIdentity {
            name: self.common_name.clone(),
            version: self.version.clone(),
            location: self.location,
            file: self.file.clone(),
            discovery_index: self.discovery_index,
        }
    }

    /// Runs deinit if the plugin is initialized. A failing deinit is logged
    /// and still counts as the one deinit call.
    fn deinit(&mut self) {
        if !self.initialized {
            return;
        }
        if let Some(module) = self.module.as_mut() {
            log::debug!("Deinitializing plugin '{}'", self.common_name);
            if let Err(e) = guard(|| module.plugin_mut().deinit()) {
                log::error!("Plugin '{}' ({}) failed in deinit: {}", self.common_name, self.file.display(), e);
            }
        }
        self.initialized = false;
        self.late_init_pending = false;
    }

    fn release_module(&mut self) -> Result<(), PluginSystemError> {
        if self.initialized {
            debug_assert!(!self.initialized, "module of '{}' released while initialized", self.common_name);
            return Err(PluginSystemError::UnloadInvariantViolation { plugin: self.common_name.clone() });
        }
        drop(self.module.take());
        self.status = PluginStatus::Unloaded;
        log::debug!("Released module of plugin '{}'", self.common_name);
        Ok(())
    }
}

/// Persisted plugin state: which plugins are enabled, and their order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfigSnapshot {
    pub enabled: BTreeMap<String, bool>,
    pub order: String,
}

/// Outcome of [`PluginRegistry::update_plugins`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// New ids of plugins reloaded because their file changed.
    pub reloaded: Vec<PluginId>,
    pub added: usize,
}

/// The authoritative table of discovered plugins, kept in display order.
pub struct PluginRegistry {
    records: Vec<PluginRecord>,
    next_id: u32,
    discovery_counter: usize,
    loader: ModuleLoader,
    paths: PluginPaths,
    authority: Rc<dyn AuthorityPolicy>,
    system_plugins: HashSet<String>,
    installed: HashMap<String, PluginMetadata>,
    catalog: Vec<PluginMetadata>,
    order: Vec<String>,
    enabled_states: HashMap<String, bool>,
    session: SessionState,
    report: DeferredReport,
    pending_deactivations: Vec<PluginId>,
}

impl PluginRegistry {
    /// Create a new registry loading modules through `loader` from `paths`
    pub fn new(loader: ModuleLoader, paths: PluginPaths) -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            discovery_counter: 0,
            loader,
            paths,
            authority: Rc::new(DefaultAuthority),
            system_plugins: DEFAULT_SYSTEM_PLUGINS.iter().map(|s| s.to_ascii_lowercase()).collect(),
            installed: HashMap::new(),
            catalog: Vec::new(),
            order: Vec::new(),
            enabled_states: HashMap::new(),
            session: SessionState::default(),
            report: DeferredReport::default(),
            pending_deactivations: Vec::new(),
        }
    }

    /// Replace the set of plugin names that ship with the host
    pub fn set_system_plugins<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.system_plugins = names.into_iter().map(|s| s.as_ref().to_ascii_lowercase()).collect();
    }

    pub fn set_authority_policy(&mut self, policy: Rc<dyn AuthorityPolicy>) {
        self.authority = policy;
    }

    /// Metadata the installer recorded for plugins it installed, keyed by name
    pub fn set_installed_metadata(&mut self, installed: impl IntoIterator<Item = PluginMetadata>) {
        self.installed = installed.into_iter().map(|m| (m.name.to_ascii_lowercase(), m)).collect();
    }

    /// Persisted enabled states, applied to plugins as they are discovered
    pub fn set_enabled_states(&mut self, states: impl IntoIterator<Item = (String, bool)>) {
        self.enabled_states = states.into_iter().map(|(name, on)| (name.to_ascii_lowercase(), on)).collect();
    }

    /// Share UI id counters with the host's contribution registry
    pub fn set_contribution_ids(&mut self, ids: ContributionIds) {
        self.session.set_ids(ids);
    }

    pub fn set_blacklist_dialog(&mut self, enabled: bool) {
        self.report.set_dialog_enabled(enabled);
    }

    pub fn paths(&self) -> &PluginPaths {
        &self.paths
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn report(&self) -> &DeferredReport {
        &self.report
    }

    /// Hand out the accumulated load-time warnings once
    pub fn flush_report(&mut self) -> ScanReport {
        self.report.flush()
    }

    pub(crate) fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn records(&self) -> &[PluginRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: PluginId) -> Option<&PluginRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Find the record for `name`, preferring the authoritative copy
    pub fn find_by_name(&self, name: &str) -> Option<&PluginRecord> {
        let mut matching = self.records.iter().filter(|r| r.matches_name(name));
        let first = matching.next()?;
        if first.status != PluginStatus::Ghost {
            return Some(first);
        }
        matching.find(|r| r.status != PluginStatus::Ghost).or(Some(first))
    }

    /// True when a plugin with this common name is loaded and initialized
    pub fn is_plugin_available(&self, common_name: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.initialized && r.common_name.eq_ignore_ascii_case(common_name))
    }

    pub fn catalog(&self) -> &[PluginMetadata] {
        &self.catalog
    }

    fn index_of(&self, id: PluginId) -> Result<usize, PluginSystemError> {
        self.records
            .iter()
            .position(|r| r.id == id)
            .ok_or(PluginSystemError::PluginNotFound(id))
    }

    fn allocate_id(&mut self) -> PluginId {
        let id = PluginId(self.next_id);
        self.next_id += 1;
        id
    }

    // --- Loading ---

    /// Load a single module file. New plugins start disabled unless a
    /// persisted state says otherwise.
    pub fn load(&mut self, path: &Path) -> Result<PluginId, PluginSystemError> {
        self.load_with_default(path, false)
    }

    fn load_with_default(&mut self, path: &Path, enabled_by_default: bool) -> Result<PluginId, PluginSystemError> {
        if let Some(existing) = self.records.iter().find(|r| r.file == path) {
            log::debug!("Plugin file {} is already loaded as {}", path.display(), existing.id);
            return Ok(existing.id);
        }
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
        let loaded = self.loader.load(path, &mut self.report)?;
        let id = self.insert(path, loaded, modified, enabled_by_default);
        let authority = Rc::clone(&self.authority);
        self.resolve_ghosts(authority.as_ref());
        Ok(id)
    }

    fn insert(
        &mut self,
        path: &Path,
        loaded: LoadedModule,
        modified: Option<SystemTime>,
        enabled_by_default: bool,
    ) -> PluginId {
        let id = self.allocate_id();
        let LoadedModule { capsule, short_name, version, .. } = loaded;
        let plugin = capsule.plugin();
        let common_name = plugin.common_name().to_string();
        let capabilities = plugin.capabilities();
        let api_version = plugin.api_version();
        let short_description = plugin.short_description().to_string();
        let long_description = plugin.long_description().to_string();

        let key = common_name.to_ascii_lowercase();
        let location = self.paths.directory_kind(path);
        let managed = self
            .installed
            .get(&key)
            .or_else(|| self.installed.get(&short_name.to_ascii_lowercase()))
            .cloned();
        let enabled = self
            .enabled_states
            .get(&key)
            .copied()
            .unwrap_or(enabled_by_default);

        let mut record = PluginRecord {
            id,
            file: path.to_path_buf(),
            short_name,
            common_name,
            short_description,
            long_description,
            modified,
            module: Some(capsule),
            capabilities,
            version,
            api_version,
            enabled,
            initialized: false,
            late_init_pending: false,
            status: PluginStatus::Unknown,
            managed,
            location,
            discovery_index: self.discovery_counter,
        };
        record.status = self.classify(&record);
        self.discovery_counter += 1;

        log::info!(
            "Registered plugin '{}' {} as {} [{}] caps: {}",
            record.common_name,
            record.version,
            id,
            record.status,
            record.capabilities
        );
        self.records.push(record);
        id
    }

    fn classify(&self, record: &PluginRecord) -> PluginStatus {
        if record.managed.is_some() {
            PluginStatus::Managed
        } else if record.location == DirectoryKind::System
            && (self.system_plugins.contains(&record.common_name.to_ascii_lowercase())
                || self.system_plugins.contains(&record.short_name.to_ascii_lowercase()))
        {
            PluginStatus::System
        } else {
            PluginStatus::Unmanaged
        }
    }

    /// Load every module in `dir`. Failures are logged and collected in the
    /// deferred report; the scan goes on.
    pub async fn load_directory(&mut self, dir: &Path, enabled: bool) -> Result<usize, PluginSystemError> {
        let candidates = match discover_modules(dir).await {
            Ok(candidates) => candidates,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Plugin directory {} does not exist", dir.display());
                return Ok(0);
            }
            Err(source) => {
                return Err(PluginSystemError::Io {
                    path: dir.to_path_buf(),
                    operation: "reading plugin directory".to_string(),
                    source,
                });
            }
        };

        log::info!("Scanning {} ({} candidate module(s))", dir.display(), candidates.len());
        let mut loaded = 0;
        let mut failures = 0;
        for path in candidates {
            if self.records.iter().any(|r| r.file == path) {
                continue;
            }
            match self.load_with_default(&path, enabled) {
                Ok(_) => loaded += 1,
                Err(e) => {
                    failures += 1;
                    log::warn!("Skipping plugin {}: {}", path.display(), e);
                }
            }
        }

        if loaded == 0 && failures > 0 {
            return Err(PluginSystemError::NoPluginsLoaded { dir: dir.to_path_buf(), failures });
        }
        Ok(loaded)
    }

    /// Load from every configured search directory, then apply the persisted
    /// order. Only a missing backend aborts the pass.
    pub async fn load_all(&mut self, enabled: bool) -> Result<usize, PluginSystemError> {
        let backend = self.loader.backend();
        if !backend.is_available() {
            return Err(PluginSystemError::BackendUnavailable(backend.name().to_string()));
        }
        let dirs = self.paths.libdirs().to_vec();
        let mut total = 0;
        for dir in dirs {
            match self.load_directory(&dir, enabled).await {
                Ok(count) => total += count,
                Err(e) => log::warn!("{}", e),
            }
        }
        self.apply_order();
        log::info!("Loaded {} plugin(s); registry holds {}", total, self.records.len());
        Ok(total)
    }

    /// Reload plugins whose file changed on disk and pick up new files in
    /// the search directories. Reloaded plugins keep their enabled state.
    pub async fn update_plugins(&mut self) -> Result<UpdateSummary, PluginSystemError> {
        let mut summary = UpdateSummary::default();
        self.order = self.records.iter().map(|r| r.common_name.clone()).collect();

        let snapshot: Vec<(PluginId, PathBuf, Option<SystemTime>)> = self
            .records
            .iter()
            .filter(|r| r.status != PluginStatus::PendingListRemoval)
            .map(|r| (r.id, r.file.clone(), r.modified))
            .collect();
        for (id, file, modified) in snapshot {
            let current = match tokio::fs::metadata(&file).await.and_then(|m| m.modified()) {
                Ok(time) => Some(time),
                Err(e) => {
                    log::debug!("Cannot stat {}: {}", file.display(), e);
                    continue;
                }
            };
            if current == modified {
                continue;
            }
            let Some(record) = self.get(id) else { continue };
            let (was_enabled, was_initialized) = (record.enabled, record.initialized);
            log::info!("Plugin file {} changed on disk, reloading", file.display());
            self.unload(id)?;
            match self.load_with_default(&file, was_enabled) {
                Ok(new_id) => {
                    if let Some(record) = self.records.iter_mut().find(|r| r.id == new_id) {
                        record.enabled = was_enabled;
                    }
                    if was_initialized {
                        if let Err(e) = self.initialize(new_id) {
                            log::warn!("{}", e);
                        }
                    }
                    summary.reloaded.push(new_id);
                }
                Err(e) => log::warn!("Reloading {} failed: {}", file.display(), e),
            }
        }

        let dirs = self.paths.libdirs().to_vec();
        for dir in dirs {
            match self.load_directory(&dir, false).await {
                Ok(count) => summary.added += count,
                Err(e) => log::warn!("{}", e),
            }
        }
        self.apply_order();
        Ok(summary)
    }

    // --- Lifecycle ---

    /// Enable and initialize one plugin. Failure leaves it disabled and is
    /// added to the deferred report.
    pub fn initialize(&mut self, id: PluginId) -> Result<(), PluginSystemError> {
        let index = self.index_of(id)?;
        let record = &mut self.records[index];
        if record.initialized {
            return Ok(());
        }
        if matches!(record.status, PluginStatus::Ghost | PluginStatus::PendingListRemoval) {
            record.enabled = false;
            return Err(PluginSystemError::InitFailed {
                plugin: record.common_name.clone(),
                message: format!("a {} copy cannot be initialized", record.status),
            });
        }
        let Some(module) = record.module.as_mut() else {
            return Err(PluginSystemError::InitFailed {
                plugin: record.common_name.clone(),
                message: "module is not loaded".to_string(),
            });
        };

        record.enabled = true;
        let mut host = self.session.context_for(id);
        match guard(|| module.plugin_mut().init(&mut host)) {
            Ok(()) => {
                record.initialized = true;
                record.late_init_pending = record.capabilities.contains(CapabilityFlags::LATE_INIT);
                log::info!("Initialized plugin '{}'", record.common_name);
                Ok(())
            }
            Err(e) => {
                record.enabled = false;
                let err = PluginSystemError::InitFailed { plugin: record.common_name.clone(), message: e.to_string() };
                log::error!("{} ({})", err, record.file.display());
                self.report
                    .record(record.file.clone(), record.common_name.clone(), ReportKind::InitFailed, e.to_string());
                self.session.discard_requests_from(id);
                Err(err)
            }
        }
    }

    /// Initialize every enabled plugin that is not yet initialized, in
    /// display order. Returns how many succeeded.
    pub fn initialize_enabled(&mut self) -> usize {
        let ids: Vec<PluginId> = self
            .records
            .iter()
            .filter(|r| r.enabled && !r.initialized && r.module.is_some() && r.status != PluginStatus::Ghost)
            .map(|r| r.id)
            .collect();
        ids.into_iter().filter(|id| self.initialize(*id).is_ok()).count()
    }

    /// Run the late-init hook of freshly initialized `LATE_INIT` plugins.
    /// A failing hook queues the plugin for deactivation.
    pub fn late_init(&mut self) -> usize {
        let mut called = 0;
        for record in self.records.iter_mut().filter(|r| r.late_init_pending && r.is_active()) {
            record.late_init_pending = false;
            let id = record.id;
            let Some(module) = record.module.as_mut() else { continue };
            let mut host = self.session.context_for(id);
            called += 1;
            if let Err(e) = guard(|| module.plugin_mut().late_init(&mut host)) {
                log::error!("Plugin '{}' ({}) failed in late_init: {}", record.common_name, record.file.display(), e);
                self.pending_deactivations.push(id);
            }
        }
        called
    }

    /// Deinitialize but keep the module resident.
    pub fn deactivate(&mut self, id: PluginId) -> Result<(), PluginSystemError> {
        let index = self.index_of(id)?;
        let record = &mut self.records[index];
        record.deinit();
        record.enabled = false;
        self.session.discard_requests_from(id);
        log::info!("Deactivated plugin '{}'", record.common_name);
        Ok(())
    }

    /// Switch a plugin on or off and remember the choice for the next run.
    pub fn enable(&mut self, id: PluginId, enabled: bool) -> Result<(), PluginSystemError> {
        let index = self.index_of(id)?;
        let key = self.records[index].common_name.to_ascii_lowercase();
        self.enabled_states.insert(key, enabled);
        if enabled { self.initialize(id) } else { self.deactivate(id) }
    }

    /// Deinitialize if needed, release the module, then drop the record.
    pub fn unload(&mut self, id: PluginId) -> Result<(), PluginSystemError> {
        let index = self.index_of(id)?;
        {
            let record = &mut self.records[index];
            record.deinit();
            record.enabled = false;
            record.release_module()?;
        }
        let record = self.records.remove(index);
        self.pending_deactivations.retain(|p| *p != id);
        self.session.discard_requests_from(id);
        log::info!("Unloaded plugin '{}' ({})", record.common_name, record.file.display());
        // A copy shadowed by this one may be authoritative now.
        let authority = Rc::clone(&self.authority);
        self.resolve_ghosts(authority.as_ref());
        Ok(())
    }

    /// Unload everything in reverse display order.
    pub fn unload_all(&mut self) -> usize {
        let ids: Vec<PluginId> = self.records.iter().rev().map(|r| r.id).collect();
        let mut count = 0;
        for id in ids {
            match self.unload(id) {
                Ok(()) => count += 1,
                Err(e) => log::error!("{}", e),
            }
        }
        self.session.clear();
        self.report.clear();
        count
    }

    /// Mark a plugin for removal from the list; it is deactivated now and
    /// purged by [`PluginRegistry::compact`].
    pub fn request_uninstall(&mut self, id: PluginId) -> Result<(), PluginSystemError> {
        self.deactivate(id)?;
        let index = self.index_of(id)?;
        self.records[index].status = PluginStatus::PendingListRemoval;
        Ok(())
    }

    /// Unload every record pending removal. Returns the purged ids.
    pub fn compact(&mut self) -> Vec<PluginId> {
        let ids: Vec<PluginId> = self
            .records
            .iter()
            .filter(|r| r.status == PluginStatus::PendingListRemoval)
            .map(|r| r.id)
            .collect();
        ids.into_iter().filter(|id| self.unload(*id).is_ok()).collect()
    }

    /// Queue a deactivation to run after the current pass.
    pub(crate) fn queue_deactivation(&mut self, id: PluginId) {
        if !self.pending_deactivations.contains(&id) {
            self.pending_deactivations.push(id);
        }
    }

    /// Run queued deactivations. Returns the ids that were deactivated.
    pub fn apply_pending_deactivations(&mut self) -> Vec<PluginId> {
        let pending = std::mem::take(&mut self.pending_deactivations);
        pending.into_iter().filter(|id| self.deactivate(*id).is_ok()).collect()
    }

    /// Visit active plugins in display order with a host context for each.
    pub(crate) fn for_each_active<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut PluginRecord, &mut HostContext<'_>) -> ControlFlow<()>,
    {
        for record in self.records.iter_mut().filter(|r| r.is_active()) {
            let mut host = self.session.context_for(record.id);
            if visit(record, &mut host).is_break() {
                break;
            }
        }
    }

    /// Visit one plugin, if it is active.
    pub(crate) fn with_active<T>(
        &mut self,
        id: PluginId,
        visit: impl FnOnce(&mut PluginRecord, &mut HostContext<'_>) -> T,
    ) -> Result<Option<T>, PluginSystemError> {
        let index = self.index_of(id)?;
        let record = &mut self.records[index];
        if !record.is_active() {
            return Ok(None);
        }
        let mut host = self.session.context_for(id);
        Ok(Some(visit(record, &mut host)))
    }

    // --- Authority, catalog ---

    /// Demote every non-authoritative copy of a plugin to `Ghost`,
    /// deinitializing it if needed, and restore a ghost whose shadowing copy
    /// is gone. Returns the ids that were demoted.
    pub fn resolve_ghosts(&mut self, policy: &dyn AuthorityPolicy) -> Vec<PluginId> {
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (index, record) in self.records.iter().enumerate() {
            if record.status != PluginStatus::PendingListRemoval {
                groups.entry(record.common_name.to_ascii_lowercase()).or_default().push(index);
            }
        }

        let mut demoted = Vec::new();
        for indices in groups.into_values() {
            let winner = if indices.len() == 1 {
                indices[0]
            } else {
                let candidates: Vec<VersionedIdentity> = indices.iter().map(|&i| self.records[i].identity()).collect();
                indices[policy.choose(&candidates).min(indices.len() - 1)]
            };
            for &index in &indices {
                if index == winner {
                    if self.records[index].status == PluginStatus::Ghost {
                        let status = self.classify(&self.records[index]);
                        let record = &mut self.records[index];
                        record.status = status;
                        log::info!("Plugin '{}' at {} is authoritative again [{}]", record.common_name, record.file.display(), status);
                    }
                    continue;
                }
                let record = &mut self.records[index];
                if record.status == PluginStatus::Ghost {
                    continue;
                }
                record.deinit();
                record.enabled = false;
                record.status = PluginStatus::Ghost;
                log::info!(
                    "Plugin '{}' at {} is shadowed by another copy, marked as ghost",
                    record.common_name,
                    record.file.display()
                );
                demoted.push(record.id);
            }
        }
        demoted
    }

    /// Reflect catalog contents in the status of every record.
    pub fn sync_catalog(&mut self, entries: &[PluginMetadata]) {
        self.catalog = entries.to_vec();
        for record in &mut self.records {
            if matches!(
                record.status,
                PluginStatus::Ghost | PluginStatus::PendingListRemoval | PluginStatus::System | PluginStatus::Unloaded
            ) {
                continue;
            }
            let entry = entries
                .iter()
                .find(|e| e.matches_name(&record.common_name) || e.matches_name(&record.short_name));
            record.status = match (entry, record.managed.is_some()) {
                (Some(entry), true) => match entry.semantic_version() {
                    Ok(available) => managed_status(&record.version, &available),
                    Err(e) => {
                        log::warn!("Catalog entry for '{}' has a malformed version: {}", entry.name, e);
                        PluginStatus::Managed
                    }
                },
                (Some(_), false) => PluginStatus::LegacyUpdateAvailable,
                (None, true) => PluginStatus::Managed,
                (None, false) => PluginStatus::Unmanaged,
            };
        }
    }

    /// One row per catalog entry. Entries without an installed copy show as
    /// `ManagedInstallAvailable`.
    pub fn catalog_listing(&self) -> Vec<CatalogListing> {
        self.catalog
            .iter()
            .map(|metadata| {
                let status = self
                    .find_by_name(&metadata.name)
                    .filter(|r| r.status != PluginStatus::PendingListRemoval)
                    .map(|r| r.status)
                    .unwrap_or(PluginStatus::ManagedInstallAvailable);
                CatalogListing { metadata: metadata.clone(), status }
            })
            .collect()
    }

    // --- Order, persistence ---

    pub fn plugin_order(&self) -> String {
        order::serialize_order(self.records.iter().map(|r| r.common_name.as_str()))
    }

    pub fn set_plugin_order(&mut self, serialized: &str) {
        self.order = order::parse_order(serialized);
        self.apply_order();
    }

    pub fn apply_order(&mut self) {
        order::apply_order(&mut self.records, &self.order, |r| r.common_name.as_str());
    }

    /// Swap with the previous plugin. Returns false at the top.
    pub fn move_up(&mut self, id: PluginId) -> Result<bool, PluginSystemError> {
        let index = self.index_of(id)?;
        if index == 0 {
            return Ok(false);
        }
        self.records.swap(index, index - 1);
        self.order = self.records.iter().map(|r| r.common_name.clone()).collect();
        Ok(true)
    }

    /// Swap with the next plugin. Returns false at the bottom.
    pub fn move_down(&mut self, id: PluginId) -> Result<bool, PluginSystemError> {
        let index = self.index_of(id)?;
        if index + 1 >= self.records.len() {
            return Ok(false);
        }
        self.records.swap(index, index + 1);
        self.order = self.records.iter().map(|r| r.common_name.clone()).collect();
        Ok(true)
    }

    /// Enabled states and order to persist. Ghost copies are left out so
    /// they cannot overwrite the authoritative copy's state.
    pub fn config_snapshot(&self) -> PluginConfigSnapshot {
        let mut enabled: BTreeMap<String, bool> = self.enabled_states.clone().into_iter().collect();
        for record in self.records.iter().filter(|r| r.status != PluginStatus::Ghost) {
            enabled.insert(record.common_name.to_ascii_lowercase(), record.enabled);
        }
        PluginConfigSnapshot { enabled, order: self.plugin_order() }
    }
}
