use std::ops::ControlFlow;

use crate::event::error::EventSystemError;
use crate::event::types::HostEvent;
use crate::plugin_system::PluginId;
use crate::plugin_system::context::HostContext;
use crate::plugin_system::error::{PluginResult, PluginSystemError, guard};
use crate::plugin_system::registry::{PluginRecord, PluginRegistry};
use crate::plugin_system::traits::Plugin;

/// What happened during one dispatch pass.
#[derive(Debug)]
pub struct DispatchReport {
    pub event: &'static str,
    /// Plugins whose handler ran to completion, in call order.
    pub delivered: Vec<PluginId>,
    /// Plugins whose handler failed or panicked. Each is queued for
    /// deactivation.
    pub faults: Vec<(PluginId, PluginSystemError)>,
    /// The plugin that consumed an input event, or drew on an overlay pass.
    pub consumed_by: Option<PluginId>,
}

impl DispatchReport {
    fn new(event: &'static str) -> Self {
        Self { event, delivered: Vec::new(), faults: Vec::new(), consumed_by: None }
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_by.is_some()
    }

    pub fn has_faults(&self) -> bool {
        !self.faults.is_empty()
    }
}

/// Routes host events to plugins in registry display order.
///
/// Only enabled, initialized plugins that declared the capability an event
/// requires are called. A failing handler never stops the pass: the fault is
/// logged, recorded and the plugin is deactivated once the pass is over.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapabilityDispatcher;

impl CapabilityDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Deliver `event` to every eligible plugin.
    pub fn dispatch(&self, registry: &mut PluginRegistry, event: &HostEvent) -> DispatchReport {
        self.dispatch_filtered(registry, event, |_| true)
    }

    /// Like [`dispatch`](Self::dispatch), restricted to records accepted by
    /// `filter`.
    pub fn dispatch_filtered(
        &self,
        registry: &mut PluginRegistry,
        event: &HostEvent,
        filter: impl Fn(&PluginRecord) -> bool,
    ) -> DispatchReport {
        let mut report = DispatchReport::new(event.name());
        let required = event.required_capability();
        let consumable = event.is_consumable();

        registry.for_each_active(|record, host| {
            if required.is_some_and(|flag| !record.capabilities().contains(flag)) || !filter(record) {
                return ControlFlow::Continue(());
            }
            match deliver(record, host, event) {
                Ok(consumed) => {
                    report.delivered.push(record.id());
                    if consumed && report.consumed_by.is_none() {
                        report.consumed_by = Some(record.id());
                        if consumable {
                            log::debug!("Event '{}' consumed by plugin '{}'", event.name(), record.common_name());
                            return ControlFlow::Break(());
                        }
                    }
                }
                Err(fault) => report.faults.push((record.id(), fault)),
            }
            ControlFlow::Continue(())
        });

        for (plugin, _) in &report.faults {
            registry.queue_deactivation(*plugin);
        }
        report
    }

    /// Deliver `event` to one plugin, e.g. the owner of an activated toolbar
    /// tool.
    pub fn deliver_to(
        &self,
        registry: &mut PluginRegistry,
        plugin: PluginId,
        event: &HostEvent,
    ) -> Result<DispatchReport, EventSystemError> {
        let mut report = DispatchReport::new(event.name());
        let required = event.required_capability();
        let outcome = registry.with_active(plugin, |record, host| {
            if required.is_some_and(|flag| !record.capabilities().contains(flag)) {
                return None;
            }
            Some(deliver(record, host, event))
        })?;

        match outcome.flatten() {
            None => return Err(EventSystemError::NotEligible { plugin, event: event.name() }),
            Some(Ok(consumed)) => {
                report.delivered.push(plugin);
                if consumed {
                    report.consumed_by = Some(plugin);
                }
            }
            Some(Err(fault)) => {
                registry.queue_deactivation(plugin);
                report.faults.push((plugin, fault));
            }
        }
        Ok(report)
    }
}

/// Calls the handler for `event` on one record, converting an error or panic
/// into a [`PluginSystemError::HandlerFault`].
fn deliver(record: &mut PluginRecord, host: &mut HostContext<'_>, event: &HostEvent) -> Result<bool, PluginSystemError> {
    let name = record.common_name().to_string();
    let file = record.file().to_path_buf();
    let Some(plugin) = record.plugin_mut() else {
        return Ok(false);
    };
    guard(|| invoke(plugin, host, event)).map_err(|e| {
        log::error!("Plugin '{}' ({}) faulted handling '{}': {}", name, file.display(), event.name(), e);
        PluginSystemError::handler_fault(name, event.name(), e.to_string())
    })
}

fn invoke(plugin: &mut dyn Plugin, host: &mut HostContext<'_>, event: &HostEvent) -> PluginResult<bool> {
    match event {
        HostEvent::PositionFix(fix) => plugin.on_position_fix(host, fix).map(|_| false),
        HostEvent::ActiveLeg(leg) => plugin.on_active_leg(host, leg).map(|_| false),
        HostEvent::NmeaSentence(sentence) => plugin.on_nmea_sentence(host, sentence).map(|_| false),
        HostEvent::AisSentence(sentence) => plugin.on_ais_sentence(host, sentence).map(|_| false),
        HostEvent::CursorLatLon { lat, lon } => plugin.on_cursor_lat_lon(host, *lat, *lon).map(|_| false),
        HostEvent::Viewport(viewport) => plugin.on_viewport(host, viewport).map(|_| false),
        HostEvent::Resize { width, height } => plugin.on_resize(host, *width, *height).map(|_| false),
        HostEvent::ColorScheme(scheme) => plugin.on_color_scheme(host, *scheme).map(|_| false),
        HostEvent::JsonMessage { id, payload } => plugin.on_plugin_message(host, id, payload).map(|_| false),
        HostEvent::ToolbarToolActivated(tool) => plugin.on_toolbar_tool(host, *tool).map(|_| false),
        HostEvent::ContextMenuItemActivated(item) => plugin.on_context_menu_item(host, *item).map(|_| false),
        HostEvent::Mouse(mouse) => plugin.on_mouse_event(host, mouse),
        HostEvent::Key(key) => plugin.on_key_event(host, key),
        HostEvent::RenderOverlay { canvas_index, viewport } => plugin.render_overlay(host, *canvas_index, viewport),
        HostEvent::SetupOptions => plugin.on_setup_options(host).map(|_| false),
    }
}
