use serde_json::Value;

use crate::event::types::{ActiveLeg, ColorScheme, KeyEvent, MouseEvent, PositionFix, ViewPort};
use crate::plugin_system::capability::CapabilityFlags;
use crate::plugin_system::context::HostContext;
use crate::plugin_system::error::PluginResult;
use crate::plugin_system::version::ApiVersion;
use crate::ui_bridge::{MenuItemId, ToolId};

/// Core trait every plugin implements, whether it is compiled into the host
/// or reached through a native module's vtable.
///
/// Handlers default to no-ops. The dispatcher only calls a handler when the
/// plugin declared the matching flag in [`Plugin::capabilities`], so a plugin
/// overrides exactly the handlers it has flags for.
pub trait Plugin {
    /// The name the plugin reports for itself
    fn common_name(&self) -> &str;

    /// One-line description for plugin lists
    fn short_description(&self) -> &str {
        ""
    }

    fn long_description(&self) -> &str {
        ""
    }

    /// The host ABI version the plugin was built against
    fn api_version(&self) -> ApiVersion;

    /// Legacy `(major, minor)` version pair
    fn version_pair(&self) -> (i32, i32);

    /// Full semantic version string, when the plugin reports one
    fn version_string(&self) -> Option<&str> {
        None
    }

    /// Event categories the plugin wants to receive
    fn capabilities(&self) -> CapabilityFlags;

    /// Initialize the plugin
    fn init(&mut self, host: &mut HostContext<'_>) -> PluginResult;

    /// Called once after every enabled plugin has been initialized, for
    /// plugins declaring `LATE_INIT`
    fn late_init(&mut self, _host: &mut HostContext<'_>) -> PluginResult {
        Ok(())
    }

    /// Shut the plugin down; always called before its module is released
    fn deinit(&mut self) -> PluginResult;

    fn on_position_fix(&mut self, _host: &mut HostContext<'_>, _fix: &PositionFix) -> PluginResult {
        Ok(())
    }

    fn on_active_leg(&mut self, _host: &mut HostContext<'_>, _leg: &ActiveLeg) -> PluginResult {
        Ok(())
    }

    fn on_nmea_sentence(&mut self, _host: &mut HostContext<'_>, _sentence: &str) -> PluginResult {
        Ok(())
    }

    fn on_ais_sentence(&mut self, _host: &mut HostContext<'_>, _sentence: &str) -> PluginResult {
        Ok(())
    }

    fn on_cursor_lat_lon(&mut self, _host: &mut HostContext<'_>, _lat: f64, _lon: f64) -> PluginResult {
        Ok(())
    }

    fn on_viewport(&mut self, _host: &mut HostContext<'_>, _viewport: &ViewPort) -> PluginResult {
        Ok(())
    }

    fn on_resize(&mut self, _host: &mut HostContext<'_>, _width: i32, _height: i32) -> PluginResult {
        Ok(())
    }

    fn on_color_scheme(&mut self, _host: &mut HostContext<'_>, _scheme: ColorScheme) -> PluginResult {
        Ok(())
    }

    fn on_plugin_message(&mut self, _host: &mut HostContext<'_>, _message_id: &str, _payload: &Value) -> PluginResult {
        Ok(())
    }

    fn on_toolbar_tool(&mut self, _host: &mut HostContext<'_>, _tool: ToolId) -> PluginResult {
        Ok(())
    }

    fn on_context_menu_item(&mut self, _host: &mut HostContext<'_>, _item: MenuItemId) -> PluginResult {
        Ok(())
    }

    /// Returns `true` when the event was consumed
    fn on_mouse_event(&mut self, _host: &mut HostContext<'_>, _event: &MouseEvent) -> PluginResult<bool> {
        Ok(false)
    }

    /// Returns `true` when the event was consumed
    fn on_key_event(&mut self, _host: &mut HostContext<'_>, _event: &KeyEvent) -> PluginResult<bool> {
        Ok(false)
    }

    /// Returns `true` when the plugin drew something
    fn render_overlay(
        &mut self,
        _host: &mut HostContext<'_>,
        _canvas_index: u32,
        _viewport: &ViewPort,
    ) -> PluginResult<bool> {
        Ok(false)
    }

    /// The options dialog is being built
    fn on_setup_options(&mut self, _host: &mut HostContext<'_>) -> PluginResult {
        Ok(())
    }
}
