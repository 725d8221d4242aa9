//! Adapter from a native [`PluginVTable`] to the [`Plugin`] trait.
//!
//! Raw pointers stay inside this module. Strings are copied out of the table
//! once at load time; every later call into the module is wrapped in
//! `catch_unwind` and its status code mapped to a [`PluginError`].
use std::ffi::{CStr, CString, c_void};
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};

use serde_json::Value;

use crate::event::types::{ActiveLeg, ColorScheme, KeyEvent, MouseEvent, PositionFix, ViewPort};
use crate::plugin_system::abi::{
    DestroyPluginFn, FfiActiveLeg, FfiHost, FfiKeyEvent, FfiMouseEvent, FfiPositionFix, FfiViewPort, PluginVTable,
    STATUS_OK,
};
use crate::plugin_system::capability::CapabilityFlags;
use crate::plugin_system::context::HostContext;
use crate::plugin_system::error::{PluginError, PluginResult, panic_message};
use crate::plugin_system::traits::Plugin;
use crate::plugin_system::version::ApiVersion;
use crate::ui_bridge::{MenuItemId, MenuSpec, ToolIcons, ToolId, ToolSpec};

/// Copies a C string out of plugin memory.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
unsafe fn opt_string_from_ptr(ptr: *const c_char) -> Result<Option<String>, String> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(|s| Some(s.to_owned()))
        .map_err(|e| format!("string is not valid UTF-8: {}", e))
}

fn to_cstring(text: &str) -> PluginResult<CString> {
    CString::new(text).map_err(|e| PluginError::Message(format!("cannot pass text to plugin: {}", e)))
}

/// Lists handlers a table must provide for the capabilities it declares.
pub(crate) fn missing_handlers(vtable: &PluginVTable) -> Vec<&'static str> {
    let caps = CapabilityFlags::from_bits(vtable.capabilities);
    let required: [(CapabilityFlags, bool, &'static str); 12] = [
        (CapabilityFlags::NMEA_EVENTS, vtable.set_position_fix.is_some(), "set_position_fix"),
        (CapabilityFlags::NMEA_SENTENCES, vtable.set_nmea_sentence.is_some(), "set_nmea_sentence"),
        (CapabilityFlags::AIS_SENTENCES, vtable.set_ais_sentence.is_some(), "set_ais_sentence"),
        (CapabilityFlags::CURSOR_LATLON, vtable.set_cursor_lat_lon.is_some(), "set_cursor_lat_lon"),
        (CapabilityFlags::ONPAINT_VIEWPORT, vtable.set_viewport.is_some(), "set_viewport"),
        (CapabilityFlags::PLUGIN_MESSAGING, vtable.set_plugin_message.is_some(), "set_plugin_message"),
        (CapabilityFlags::TOOLBAR_CALLBACK, vtable.on_toolbar_tool.is_some(), "on_toolbar_tool"),
        (CapabilityFlags::INSTALLS_CONTEXTMENU_ITEMS, vtable.on_context_menu_item.is_some(), "on_context_menu_item"),
        (CapabilityFlags::MOUSE_EVENTS, vtable.on_mouse_event.is_some(), "on_mouse_event"),
        (CapabilityFlags::KEYBOARD_EVENTS, vtable.on_key_event.is_some(), "on_key_event"),
        (CapabilityFlags::OVERLAY_CALLBACK, vtable.render_overlay.is_some(), "render_overlay"),
        (CapabilityFlags::LATE_INIT, vtable.late_init.is_some(), "late_init"),
    ];
    required
        .iter()
        .filter(|(flag, present, _)| caps.contains(*flag) && !present)
        .map(|(_, _, name)| *name)
        .collect()
}

/// Runs one call into plugin code, mapping status codes and panics.
fn guarded(call: impl FnOnce() -> c_int) -> PluginResult {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(STATUS_OK) => Ok(()),
        Ok(code) => Err(PluginError::Status(code)),
        Err(payload) => Err(PluginError::Panic(panic_message(&*payload))),
    }
}

/// A plugin living in a native module.
pub(crate) struct VTablePlugin {
    vtable: NonNull<PluginVTable>,
    destroy: DestroyPluginFn,
    common_name: String,
    short_description: String,
    long_description: String,
    version_string: Option<String>,
    api_version: ApiVersion,
    version_pair: (i32, i32),
    capabilities: CapabilityFlags,
}

impl VTablePlugin {
    /// Takes ownership of a table returned by the module's factory. On error
    /// the table has already been handed back to `destroy`.
    ///
    /// # Safety
    /// `vtable` must come from the module's create entry point, and `destroy`
    /// must be that module's matching destroy entry point. The module must
    /// stay loaded for as long as the returned value lives.
    pub(crate) unsafe fn from_raw(vtable: NonNull<PluginVTable>, destroy: DestroyPluginFn) -> Result<Self, String> {
        let table = unsafe { vtable.as_ref() };
        let read = || -> Result<Self, String> {
            let common_name = unsafe { opt_string_from_ptr(table.common_name) }?
                .filter(|name| !name.is_empty())
                .ok_or_else(|| "plugin reports no common name".to_string())?;
            let missing = missing_handlers(table);
            if !missing.is_empty() {
                return Err(format!(
                    "plugin '{}' declares capabilities without handlers: {}",
                    common_name,
                    missing.join(", ")
                ));
            }
            Ok(Self {
                vtable,
                destroy,
                short_description: unsafe { opt_string_from_ptr(table.short_description) }?.unwrap_or_default(),
                long_description: unsafe { opt_string_from_ptr(table.long_description) }?.unwrap_or_default(),
                version_string: unsafe { opt_string_from_ptr(table.version_string) }?,
                api_version: ApiVersion::new(table.api_major.max(0) as u32, table.api_minor.max(0) as u32),
                version_pair: (table.version_major, table.version_minor),
                capabilities: CapabilityFlags::from_bits(table.capabilities),
                common_name,
            })
        };
        match read() {
            Ok(plugin) => Ok(plugin),
            Err(reason) => {
                let destroyed = panic::catch_unwind(AssertUnwindSafe(|| unsafe { destroy(vtable.as_ptr()) }));
                if destroyed.is_err() {
                    log::error!("Plugin destroy entry point panicked while discarding a rejected table");
                }
                Err(reason)
            }
        }
    }

    fn table(&self) -> &PluginVTable {
        // Valid until Drop hands it back to the module.
        unsafe { self.vtable.as_ref() }
    }

    fn invoke(
        &mut self,
        host: &mut HostContext<'_>,
        call: impl FnOnce(*mut c_void, *const FfiHost) -> c_int,
    ) -> PluginResult {
        let ffi_host = host_table(host);
        let instance = self.table().instance;
        guarded(|| call(instance, &ffi_host))
    }
}

impl Drop for VTablePlugin {
    fn drop(&mut self) {
        let destroy = self.destroy;
        let table = self.vtable.as_ptr();
        if panic::catch_unwind(AssertUnwindSafe(|| unsafe { destroy(table) })).is_err() {
            log::error!("Plugin '{}' panicked in its destroy entry point", self.common_name);
        }
    }
}

fn ffi_viewport(vp: &ViewPort) -> FfiViewPort {
    FfiViewPort {
        clat: vp.clat,
        clon: vp.clon,
        view_scale_ppm: vp.view_scale_ppm,
        skew: vp.skew,
        rotation: vp.rotation,
        pix_width: vp.pix_width,
        pix_height: vp.pix_height,
    }
}

impl Plugin for VTablePlugin {
    fn common_name(&self) -> &str {
        &self.common_name
    }

    fn short_description(&self) -> &str {
        &self.short_description
    }

    fn long_description(&self) -> &str {
        &self.long_description
    }

    fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    fn version_pair(&self) -> (i32, i32) {
        self.version_pair
    }

    fn version_string(&self) -> Option<&str> {
        self.version_string.as_deref()
    }

    fn capabilities(&self) -> CapabilityFlags {
        self.capabilities
    }

    fn init(&mut self, host: &mut HostContext<'_>) -> PluginResult {
        let init = self.table().init;
        self.invoke(host, |instance, ffi_host| unsafe { init(instance, ffi_host) })
    }

    fn late_init(&mut self, host: &mut HostContext<'_>) -> PluginResult {
        let Some(late_init) = self.table().late_init else { return Ok(()) };
        self.invoke(host, |instance, ffi_host| unsafe { late_init(instance, ffi_host) })
    }

    fn deinit(&mut self) -> PluginResult {
        let deinit = self.table().deinit;
        let instance = self.table().instance;
        guarded(|| unsafe { deinit(instance) })
    }

    fn on_position_fix(&mut self, host: &mut HostContext<'_>, fix: &PositionFix) -> PluginResult {
        let Some(handler) = self.table().set_position_fix else { return Ok(()) };
        let raw = FfiPositionFix {
            lat: fix.lat,
            lon: fix.lon,
            cog: fix.cog,
            sog: fix.sog,
            var: fix.var,
            hdm: fix.hdm,
            hdt: fix.hdt,
            fix_time: fix.fix_time,
            n_sats: fix.n_sats,
        };
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, &raw) })
    }

    fn on_active_leg(&mut self, host: &mut HostContext<'_>, leg: &ActiveLeg) -> PluginResult {
        let Some(handler) = self.table().set_active_leg else { return Ok(()) };
        let wp_to = to_cstring(&leg.wp_to)?;
        let raw = FfiActiveLeg { xte: leg.xte, btw: leg.btw, dtw: leg.dtw, wp_to: wp_to.as_ptr(), arrival: leg.arrival };
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, &raw) })
    }

    fn on_nmea_sentence(&mut self, host: &mut HostContext<'_>, sentence: &str) -> PluginResult {
        let Some(handler) = self.table().set_nmea_sentence else { return Ok(()) };
        let text = to_cstring(sentence)?;
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, text.as_ptr()) })
    }

    fn on_ais_sentence(&mut self, host: &mut HostContext<'_>, sentence: &str) -> PluginResult {
        let Some(handler) = self.table().set_ais_sentence else { return Ok(()) };
        let text = to_cstring(sentence)?;
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, text.as_ptr()) })
    }

    fn on_cursor_lat_lon(&mut self, host: &mut HostContext<'_>, lat: f64, lon: f64) -> PluginResult {
        let Some(handler) = self.table().set_cursor_lat_lon else { return Ok(()) };
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, lat, lon) })
    }

    fn on_viewport(&mut self, host: &mut HostContext<'_>, viewport: &ViewPort) -> PluginResult {
        let Some(handler) = self.table().set_viewport else { return Ok(()) };
        let raw = ffi_viewport(viewport);
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, &raw) })
    }

    fn on_resize(&mut self, host: &mut HostContext<'_>, width: i32, height: i32) -> PluginResult {
        let Some(handler) = self.table().on_resize else { return Ok(()) };
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, width, height) })
    }

    fn on_color_scheme(&mut self, host: &mut HostContext<'_>, scheme: ColorScheme) -> PluginResult {
        let Some(handler) = self.table().set_color_scheme else { return Ok(()) };
        let code = scheme.code();
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, code) })
    }

    fn on_plugin_message(&mut self, host: &mut HostContext<'_>, message_id: &str, payload: &Value) -> PluginResult {
        let Some(handler) = self.table().set_plugin_message else { return Ok(()) };
        let id = to_cstring(message_id)?;
        let json = to_cstring(&payload.to_string())?;
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, id.as_ptr(), json.as_ptr()) })
    }

    fn on_toolbar_tool(&mut self, host: &mut HostContext<'_>, tool: ToolId) -> PluginResult {
        let Some(handler) = self.table().on_toolbar_tool else { return Ok(()) };
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, tool.0) })
    }

    fn on_context_menu_item(&mut self, host: &mut HostContext<'_>, item: MenuItemId) -> PluginResult {
        let Some(handler) = self.table().on_context_menu_item else { return Ok(()) };
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, item.0) })
    }

    fn on_mouse_event(&mut self, host: &mut HostContext<'_>, event: &MouseEvent) -> PluginResult<bool> {
        let Some(handler) = self.table().on_mouse_event else { return Ok(false) };
        let raw = FfiMouseEvent { x: event.x, y: event.y, buttons: event.buttons, wheel: event.wheel };
        let mut consumed = false;
        let out = ptr::addr_of_mut!(consumed);
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, &raw, out) })?;
        Ok(consumed)
    }

    fn on_key_event(&mut self, host: &mut HostContext<'_>, event: &KeyEvent) -> PluginResult<bool> {
        let Some(handler) = self.table().on_key_event else { return Ok(false) };
        let raw = FfiKeyEvent { key_code: event.key_code, modifiers: event.modifiers, pressed: event.pressed };
        let mut consumed = false;
        let out = ptr::addr_of_mut!(consumed);
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, &raw, out) })?;
        Ok(consumed)
    }

    fn render_overlay(&mut self, host: &mut HostContext<'_>, canvas_index: u32, viewport: &ViewPort) -> PluginResult<bool> {
        let Some(handler) = self.table().render_overlay else { return Ok(false) };
        let raw = ffi_viewport(viewport);
        let canvas = canvas_index as c_int;
        let mut drew = false;
        let out = ptr::addr_of_mut!(drew);
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host, canvas, &raw, out) })?;
        Ok(drew)
    }

    fn on_setup_options(&mut self, host: &mut HostContext<'_>) -> PluginResult {
        let Some(handler) = self.table().on_setup_options else { return Ok(()) };
        self.invoke(host, |instance, ffi_host| unsafe { handler(instance, ffi_host) })
    }
}

// Host callback trampolines. `ctx` is always the `HostContext` the current
// call was made with; it outlives the call.

fn host_table(host: &mut HostContext<'_>) -> FfiHost {
    FfiHost {
        ctx: host as *mut HostContext<'_> as *mut c_void,
        add_toolbar_tool: host_add_toolbar_tool,
        remove_toolbar_tool: host_remove_toolbar_tool,
        set_toolbar_tool_viz: host_set_toolbar_tool_viz,
        set_toolbar_item_state: host_set_toolbar_item_state,
        add_context_menu_item: host_add_context_menu_item,
        remove_context_menu_item: host_remove_context_menu_item,
        set_context_menu_item_viz: host_set_context_menu_item_viz,
        set_context_menu_item_grey: host_set_context_menu_item_grey,
        subscribe_message: host_subscribe_message,
        send_message: host_send_message,
    }
}

/// # Safety
/// `ctx` must be the pointer placed in the [`FfiHost`] by [`host_table`].
unsafe fn context<'a>(ctx: *mut c_void) -> &'a mut HostContext<'a> {
    unsafe { &mut *(ctx as *mut HostContext<'a>) }
}

fn lossy(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

extern "C" fn host_add_toolbar_tool(
    ctx: *mut c_void,
    label: *const c_char,
    icon_svg: *const c_char,
    short_help: *const c_char,
    position: c_int,
) -> c_int {
    let host = unsafe { context(ctx) };
    let mut spec = ToolSpec::new(lossy(label).unwrap_or_default()).at_position(position);
    spec.short_help = lossy(short_help).unwrap_or_default();
    spec.icons = ToolIcons { normal: lossy(icon_svg), ..ToolIcons::default() };
    host.add_toolbar_tool(spec).0
}

extern "C" fn host_remove_toolbar_tool(ctx: *mut c_void, id: c_int) {
    unsafe { context(ctx) }.remove_toolbar_tool(ToolId(id));
}

extern "C" fn host_set_toolbar_tool_viz(ctx: *mut c_void, id: c_int, visible: bool) {
    unsafe { context(ctx) }.set_toolbar_tool_viz(ToolId(id), visible);
}

extern "C" fn host_set_toolbar_item_state(ctx: *mut c_void, id: c_int, toggled: bool) {
    unsafe { context(ctx) }.set_toolbar_item_state(ToolId(id), toggled);
}

extern "C" fn host_add_context_menu_item(ctx: *mut c_void, label: *const c_char, menu: *const c_char) -> c_int {
    let host = unsafe { context(ctx) };
    let spec = MenuSpec { label: lossy(label).unwrap_or_default(), menu: lossy(menu) };
    host.add_context_menu_item(spec).0
}

extern "C" fn host_remove_context_menu_item(ctx: *mut c_void, id: c_int) {
    unsafe { context(ctx) }.remove_context_menu_item(MenuItemId(id));
}

extern "C" fn host_set_context_menu_item_viz(ctx: *mut c_void, id: c_int, visible: bool) {
    unsafe { context(ctx) }.set_context_menu_item_viz(MenuItemId(id), visible);
}

extern "C" fn host_set_context_menu_item_grey(ctx: *mut c_void, id: c_int, grey: bool) {
    unsafe { context(ctx) }.set_context_menu_item_grey(MenuItemId(id), grey);
}

extern "C" fn host_subscribe_message(ctx: *mut c_void, message_id: *const c_char) {
    if let Some(id) = lossy(message_id) {
        unsafe { context(ctx) }.subscribe(id);
    }
}

extern "C" fn host_send_message(ctx: *mut c_void, message_id: *const c_char, json: *const c_char) {
    let Some(id) = lossy(message_id) else { return };
    let body = lossy(json).unwrap_or_default();
    let payload = serde_json::from_str(&body).unwrap_or(Value::String(body));
    unsafe { context(ctx) }.send_message(id, payload);
}
