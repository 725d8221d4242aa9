use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::{
    ActiveLeg, CapabilityDispatcher, ColorScheme, DispatchReport, EventSystemError, HostEvent, KeyEvent, MouseEvent,
    PositionFix, ViewPort,
};
use crate::kernel::constants::{self, MAX_REQUEST_ROUNDS};
use crate::kernel::error::Result;
use crate::message_bus::{HostCallback, MessageBus, PluginSink, PublishReport, SubscriptionId};
use crate::plugin_system::catalog::{CatalogSource, CatalogUpdate};
use crate::plugin_system::compat::ScanReport;
use crate::plugin_system::context::HostRequest;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::{ModuleBackend, ModuleLoader};
use crate::plugin_system::paths::PluginPaths;
use crate::plugin_system::registry::{PluginRecord, PluginRegistry, UpdateSummary};
use crate::plugin_system::{CapabilityFlags, PluginId};
use crate::storage::config::HostConfig;
use crate::ui_bridge::{MenuItemId, ToolId, ToolKind, UiBridgeError, UiContributionRegistry};

/// Owns the plugin registry, the UI contributions and the message bus, and
/// is the single entry point host code uses to talk to plugins.
///
/// Every public operation that calls into plugins finishes by applying the
/// requests those plugins queued, then the deactivations of plugins that
/// faulted.
pub struct PluginHost {
    registry: PluginRegistry,
    dispatcher: CapabilityDispatcher,
    ui: UiContributionRegistry,
    bus: MessageBus,
    config: HostConfig,
    catalog_tx: mpsc::UnboundedSender<CatalogUpdate>,
    catalog_rx: mpsc::UnboundedReceiver<CatalogUpdate>,
}

/// Routes bus deliveries to plugins through the dispatcher.
struct RegistrySink<'a> {
    registry: &'a mut PluginRegistry,
    dispatcher: CapabilityDispatcher,
}

impl PluginSink for RegistrySink<'_> {
    fn deliver(&mut self, plugin: PluginId, message_id: &str, payload: &Value) -> std::result::Result<bool, PluginSystemError> {
        let event = HostEvent::JsonMessage { id: message_id.to_string(), payload: payload.clone() };
        match self.dispatcher.deliver_to(self.registry, plugin, &event) {
            Ok(report) => match report.faults.into_iter().next() {
                Some((_, fault)) => Err(fault),
                None => Ok(!report.delivered.is_empty()),
            },
            Err(EventSystemError::Registry(e)) => Err(e),
            Err(EventSystemError::NotEligible { .. } | EventSystemError::Unroutable { .. }) => Ok(false),
        }
    }
}

impl PluginHost {
    /// Host loading native modules from the directories `config` names.
    pub fn new(config: HostConfig) -> Self {
        Self::with_loader(config, ModuleLoader::default())
    }

    pub fn with_backend(config: HostConfig, backend: Box<dyn ModuleBackend>) -> Self {
        Self::with_loader(config, ModuleLoader::new(backend))
    }

    pub fn with_loader(config: HostConfig, loader: ModuleLoader) -> Self {
        log::info!("Initializing {} v{} plugin host", constants::APP_NAME, constants::APP_VERSION);
        let ui = UiContributionRegistry::new(config.tool_id_base, config.menu_id_base);
        let mut registry = PluginRegistry::new(loader, Self::paths_for(&config));
        registry.set_contribution_ids(ui.ids());
        registry.set_system_plugins(&config.system_plugins);
        registry.set_enabled_states(config.enabled.clone());
        registry.set_plugin_order(&config.plugin_order);
        registry.set_blacklist_dialog(config.blacklist_dialog);

        let (catalog_tx, catalog_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            dispatcher: CapabilityDispatcher::new(),
            ui,
            bus: MessageBus::new(),
            config,
            catalog_tx,
            catalog_rx,
        }
    }

    /// Search paths: the platform defaults, with the config's user directory
    /// and directory list taking precedence.
    fn paths_for(config: &HostConfig) -> PluginPaths {
        let platform = PluginPaths::from_env();
        let user = config
            .user_plugin_dir
            .clone()
            .unwrap_or_else(|| platform.user_libdir().to_path_buf());
        let dirs = if config.plugin_dirs.is_empty() {
            platform
                .libdirs()
                .iter()
                .map(|dir| if dir == platform.user_libdir() { user.clone() } else { dir.clone() })
                .collect()
        } else {
            config.plugin_dirs.clone()
        };
        PluginPaths::new(user, dirs)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    pub fn ui(&self) -> &UiContributionRegistry {
        &self.ui
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    // --- Loading and lifecycle ---

    /// Scan every search directory, initialize enabled plugins and run late
    /// init. Only a missing module backend is an error.
    pub async fn load_all_plugins(&mut self, enabled: bool) -> Result<usize> {
        let loaded = self.registry.load_all(enabled).await?;
        let initialized = self.registry.initialize_enabled();
        self.settle();
        self.registry.late_init();
        self.settle();
        log::info!("{} plugin(s) loaded, {} initialized", loaded, initialized);
        Ok(loaded)
    }

    /// Load one module file without initializing it. A copy it shadows
    /// loses its contributions right away.
    pub fn load_plugin(&mut self, path: &Path) -> Result<PluginId> {
        let id = self.registry.load(path)?;
        self.settle();
        Ok(id)
    }

    /// Enable or disable a plugin. Enabling runs init and late init.
    pub fn enable_plugin(&mut self, id: PluginId, enabled: bool) -> Result<()> {
        let result = self.registry.enable(id, enabled);
        if result.is_ok() && enabled {
            self.settle();
            self.registry.late_init();
        }
        self.settle();
        Ok(result?)
    }

    /// Deinitialize a plugin and drop its UI contributions and subscriptions;
    /// the module stays resident.
    pub fn deactivate_plugin(&mut self, id: PluginId) -> Result<()> {
        self.registry.deactivate(id)?;
        self.settle();
        Ok(())
    }

    pub fn unload_plugin(&mut self, id: PluginId) -> Result<()> {
        self.registry.unload(id)?;
        self.settle();
        Ok(())
    }

    /// Reload changed modules and pick up new ones.
    pub async fn update_plugins(&mut self) -> Result<UpdateSummary> {
        let summary = self.registry.update_plugins().await?;
        self.settle();
        self.registry.late_init();
        self.settle();
        Ok(summary)
    }

    pub fn request_uninstall(&mut self, id: PluginId) -> Result<()> {
        self.registry.request_uninstall(id)?;
        self.settle();
        Ok(())
    }

    /// Persist the registry state into the config, then unload everything
    /// in reverse order.
    pub fn shutdown(&mut self) -> usize {
        self.update_config();
        let unloaded = self.registry.unload_all();
        self.prune_detached();
        log::info!("Plugin host shut down, {} plugin(s) unloaded", unloaded);
        unloaded
    }

    // --- Events ---

    fn dispatch(&mut self, event: HostEvent) -> DispatchReport {
        let report = self.dispatcher.dispatch(&mut self.registry, &event);
        self.settle();
        report
    }

    pub fn send_position_fix(&mut self, fix: PositionFix) -> DispatchReport {
        self.dispatch(HostEvent::PositionFix(fix))
    }

    pub fn send_active_leg(&mut self, leg: ActiveLeg) -> DispatchReport {
        self.dispatch(HostEvent::ActiveLeg(leg))
    }

    pub fn send_nmea_sentence(&mut self, sentence: impl Into<String>) -> DispatchReport {
        self.dispatch(HostEvent::NmeaSentence(sentence.into()))
    }

    pub fn send_ais_sentence(&mut self, sentence: impl Into<String>) -> DispatchReport {
        self.dispatch(HostEvent::AisSentence(sentence.into()))
    }

    pub fn send_cursor_lat_lon(&mut self, lat: f64, lon: f64) -> DispatchReport {
        self.dispatch(HostEvent::CursorLatLon { lat, lon })
    }

    pub fn send_viewport(&mut self, viewport: ViewPort) -> DispatchReport {
        self.dispatch(HostEvent::Viewport(viewport))
    }

    pub fn send_resize_event(&mut self, width: i32, height: i32) -> DispatchReport {
        self.dispatch(HostEvent::Resize { width, height })
    }

    pub fn set_color_scheme(&mut self, scheme: ColorScheme) -> DispatchReport {
        self.dispatch(HostEvent::ColorScheme(scheme))
    }

    pub fn notify_setup_options(&mut self) -> DispatchReport {
        self.dispatch(HostEvent::SetupOptions)
    }

    /// Returns `true` if a plugin consumed the event.
    pub fn send_mouse_event(&mut self, event: MouseEvent) -> bool {
        self.dispatch(HostEvent::Mouse(event)).is_consumed()
    }

    /// Returns `true` if a plugin consumed the event.
    pub fn send_key_event(&mut self, event: KeyEvent) -> bool {
        self.dispatch(HostEvent::Key(event)).is_consumed()
    }

    /// Returns `true` if any plugin drew on the canvas.
    pub fn render_overlays(&mut self, canvas_index: u32, viewport: ViewPort) -> bool {
        self.dispatch(HostEvent::RenderOverlay { canvas_index, viewport }).is_consumed()
    }

    // --- Messages ---

    pub fn subscribe_host(&mut self, message_id: impl Into<String>, callback: HostCallback) -> SubscriptionId {
        self.bus.subscribe_host(message_id, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Publish a JSON message to host subscribers and plugins.
    ///
    /// Plugins with at least one subscription receive only the ids they
    /// subscribed to. Messaging plugins without any subscription receive
    /// every message.
    pub fn send_json_message(&mut self, message_id: &str, payload: Value) -> PublishReport {
        let report = self.publish_json(message_id, &payload);
        self.settle();
        report
    }

    /// Legacy text message: the body is parsed as JSON, and delivered as a
    /// JSON string when it does not parse.
    pub fn send_message(&mut self, message_id: &str, body: &str) -> PublishReport {
        let payload = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
        self.send_json_message(message_id, payload)
    }

    /// Number of active plugins that accept plugin messages.
    pub fn json_message_target_count(&self) -> usize {
        self.registry
            .records()
            .iter()
            .filter(|r| r.is_active() && r.capabilities().contains(CapabilityFlags::PLUGIN_MESSAGING))
            .count()
    }

    fn publish_json(&mut self, message_id: &str, payload: &Value) -> PublishReport {
        log::debug!("Publishing message '{}'", message_id);
        let mut sink = RegistrySink { registry: &mut self.registry, dispatcher: self.dispatcher };
        let mut report = self.bus.publish(message_id, payload, &mut sink);

        let bus = &self.bus;
        let event = HostEvent::JsonMessage { id: message_id.to_string(), payload: payload.clone() };
        let broadcast = self
            .dispatcher
            .dispatch_filtered(&mut self.registry, &event, |r| !bus.has_plugin_subscriptions(r.id()));
        report.plugin_deliveries.extend(broadcast.delivered);
        report.failures.extend(broadcast.faults);
        report
    }

    // --- UI contributions ---

    /// Route a toolbar click to the tool's owner. Check tools flip their
    /// toggled state once the owner has been called.
    pub fn activate_toolbar_tool(&mut self, id: ToolId) -> Result<DispatchReport> {
        let event = HostEvent::ToolbarToolActivated(id);
        let tool = self
            .ui
            .tool(id)
            .map_err(|source| EventSystemError::Unroutable { event: event.name(), source })?;
        let owner = tool.owner;
        let flipped = (tool.spec.kind == ToolKind::Check).then_some(!tool.toggled);
        let report = self.dispatcher.deliver_to(&mut self.registry, owner, &event)?;
        // Before settling, so a state the handler set explicitly wins.
        if let Some(toggled) = flipped {
            self.ui.set_toolbar_item_state(id, toggled)?;
        }
        self.settle();
        Ok(report)
    }

    pub fn activate_context_menu_item(&mut self, id: MenuItemId) -> Result<DispatchReport> {
        let event = HostEvent::ContextMenuItemActivated(id);
        let owner = self
            .ui
            .find_menu_owner(id)
            .map_err(|source| EventSystemError::Unroutable { event: event.name(), source })?;
        let report = self.dispatcher.deliver_to(&mut self.registry, owner, &event)?;
        self.settle();
        Ok(report)
    }

    /// Common name of the plugin owning a toolbar tool.
    pub fn tool_owner_common_name(&self, id: ToolId) -> Result<&str> {
        let owner = self.ui.find_tool_owner(id)?;
        let record = self.registry.get(owner).ok_or(PluginSystemError::PluginNotFound(owner))?;
        Ok(record.common_name())
    }

    // --- Request application ---

    /// Apply queued plugin requests in FIFO order, then run deferred
    /// deactivations and drop contributions of plugins that are gone.
    /// Requests queued while applying (messages triggering messages) are
    /// applied in further rounds, up to a fixed bound.
    pub fn settle(&mut self) -> usize {
        let mut applied = 0;
        for _ in 0..MAX_REQUEST_ROUNDS {
            let requests = self.registry.session_mut().take_requests();
            if requests.is_empty() {
                break;
            }
            for request in requests {
                if self.apply_request(request) {
                    applied += 1;
                }
            }
        }
        let leftover = self.registry.session_mut().pending_requests();
        if leftover > 0 {
            log::warn!("Dropping {} plugin request(s) after {} rounds", leftover, MAX_REQUEST_ROUNDS);
            self.registry.session_mut().clear();
        }

        for id in self.registry.apply_pending_deactivations() {
            log::warn!("Plugin {} was deactivated after a fault", id);
        }
        self.prune_detached();
        applied
    }

    fn apply_request(&mut self, request: HostRequest) -> bool {
        let owner = request.owner();
        if !self.registry.get(owner).is_some_and(PluginRecord::is_active) {
            log::debug!("Ignoring request from inactive plugin {}: {:?}", owner, request);
            return false;
        }

        let result: std::result::Result<(), UiBridgeError> = match request {
            HostRequest::AddToolbarTool { owner, id, spec } => self.ui.insert_toolbar_tool(id, owner, spec),
            HostRequest::RemoveToolbarTool { owner, id } => {
                self.ensure_tool_owner(id, owner).and_then(|_| self.ui.remove_toolbar_tool(id).map(drop))
            }
            HostRequest::SetToolbarToolViz { owner, id, visible } => {
                self.ensure_tool_owner(id, owner).and_then(|_| self.ui.set_toolbar_tool_viz(id, visible))
            }
            HostRequest::SetToolbarItemState { owner, id, toggled } => {
                self.ensure_tool_owner(id, owner).and_then(|_| self.ui.set_toolbar_item_state(id, toggled))
            }
            HostRequest::SetToolbarItemIcons { owner, id, icons } => {
                self.ensure_tool_owner(id, owner).and_then(|_| self.ui.set_toolbar_item_icons(id, icons))
            }
            HostRequest::AddContextMenuItem { owner, id, spec } => self.ui.insert_context_menu_item(id, owner, spec),
            HostRequest::RemoveContextMenuItem { owner, id } => {
                self.ensure_menu_owner(id, owner).and_then(|_| self.ui.remove_context_menu_item(id).map(drop))
            }
            HostRequest::SetContextMenuItemViz { owner, id, visible } => {
                self.ensure_menu_owner(id, owner).and_then(|_| self.ui.set_context_menu_item_viz(id, visible))
            }
            HostRequest::SetContextMenuItemGrey { owner, id, greyed } => {
                self.ensure_menu_owner(id, owner).and_then(|_| self.ui.set_context_menu_item_grey(id, greyed))
            }
            HostRequest::Subscribe { owner, message_id } => {
                self.bus.subscribe_plugin(message_id, owner);
                Ok(())
            }
            HostRequest::Unsubscribe { owner, message_id } => {
                self.bus.unsubscribe_plugin_from(owner, &message_id);
                Ok(())
            }
            HostRequest::SendMessage { message_id, payload, .. } => {
                self.publish_json(&message_id, &payload);
                Ok(())
            }
            HostRequest::Deactivate { owner } => {
                self.registry.queue_deactivation(owner);
                Ok(())
            }
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Ignoring request from plugin {}: {}", owner, e);
                false
            }
        }
    }

    fn ensure_tool_owner(&self, id: ToolId, requester: PluginId) -> std::result::Result<(), UiBridgeError> {
        let owner = self.ui.find_tool_owner(id)?;
        if owner != requester {
            return Err(UiBridgeError::NotOwner { id: id.0, owner, requester });
        }
        Ok(())
    }

    fn ensure_menu_owner(&self, id: MenuItemId, requester: PluginId) -> std::result::Result<(), UiBridgeError> {
        let owner = self.ui.find_menu_owner(id)?;
        if owner != requester {
            return Err(UiBridgeError::NotOwner { id: id.0, owner, requester });
        }
        Ok(())
    }

    /// Drop UI contributions and subscriptions whose owner is no longer
    /// initialized or no longer in the registry.
    fn prune_detached(&mut self) {
        let mut owners: Vec<PluginId> = self.ui.tools().iter().map(|t| t.owner).collect();
        owners.extend(self.ui.menu_items().iter().map(|m| m.owner));
        owners.extend(self.bus.subscribed_plugins());
        owners.sort();
        owners.dedup();

        for owner in owners {
            if self.registry.get(owner).is_some_and(PluginRecord::is_initialized) {
                continue;
            }
            let removed = self.ui.remove_owned_by(owner) + self.bus.unsubscribe_plugin(owner);
            log::debug!("Detached {} contribution(s) of plugin {}", removed, owner);
        }
    }

    // --- Catalog ---

    /// Sender half for external catalog producers.
    pub fn catalog_sender(&self) -> mpsc::UnboundedSender<CatalogUpdate> {
        self.catalog_tx.clone()
    }

    /// Fetch from `source` on the tokio runtime; the result arrives through
    /// [`drain_catalog_updates`](Self::drain_catalog_updates).
    pub fn spawn_catalog_fetch(&self, source: Arc<dyn CatalogSource>) -> JoinHandle<()> {
        let tx = self.catalog_tx.clone();
        tokio::spawn(async move {
            log::debug!("Fetching plugin catalog from {}", source.name());
            let update = match source.fetch().await {
                Ok(entries) => CatalogUpdate::Fetched(entries),
                Err(e) => CatalogUpdate::Failed(e),
            };
            if tx.send(update).is_err() {
                log::debug!("Catalog update from {} dropped, host is gone", source.name());
            }
        })
    }

    /// Apply every catalog update received so far. Returns how many were
    /// applied.
    pub fn drain_catalog_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.catalog_rx.try_recv() {
            match update {
                CatalogUpdate::Fetched(entries) => {
                    log::info!("Catalog update with {} entr(ies)", entries.len());
                    self.registry.sync_catalog(&entries);
                    applied += 1;
                }
                CatalogUpdate::Failed(reason) => log::warn!("Catalog fetch failed: {}", reason),
            }
        }
        applied
    }

    // --- Reports and config ---

    /// Hand out the load problems collected so far, once.
    pub fn show_deferred_messages(&mut self) -> ScanReport {
        self.registry.flush_report()
    }

    /// Copy enabled states and plugin order into the config.
    pub fn update_config(&mut self) {
        self.config.apply_snapshot(self.registry.config_snapshot());
    }

    pub fn save_config(&mut self, path: &Path) -> Result<()> {
        self.update_config();
        self.config.save(path)?;
        Ok(())
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            self.registry.unload_all();
        }
    }
}
