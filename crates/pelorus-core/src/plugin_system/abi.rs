//! # Native plugin ABI
//!
//! The C-compatible contract a dynamically loaded module must export.
//!
//! A module exports two symbols:
//!
//! - [`CREATE_SYMBOL`]: a [`CreatePluginFn`] returning a heap-allocated
//!   [`PluginVTable`] describing one plugin instance.
//! - [`DESTROY_SYMBOL`]: a [`DestroyPluginFn`] that receives the same
//!   pointer back and frees the instance and the table.
//!
//! Every string in the table is owned by the plugin and must stay valid until
//! destroy. Every handler receives an [`FfiHost`] through which the plugin
//! can request UI contributions or publish messages; the host pointer is only
//! valid for the duration of that call. Handlers return [`STATUS_OK`] on
//! success, any other value is treated as a fault.
//!
//! A capability bit set in [`PluginVTable::capabilities`] obliges the module
//! to provide the matching handler; the loader rejects tables that declare an
//! interest without the code to serve it.
use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

/// NUL-terminated name of the factory entry point.
pub const CREATE_SYMBOL: &[u8] = b"pelorus_create_plugin\0";
/// NUL-terminated name of the destroy entry point.
pub const DESTROY_SYMBOL: &[u8] = b"pelorus_destroy_plugin\0";

pub const STATUS_OK: c_int = 0;

pub type CreatePluginFn = unsafe extern "C-unwind" fn() -> *mut PluginVTable;
pub type DestroyPluginFn = unsafe extern "C-unwind" fn(table: *mut PluginVTable);

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiPositionFix {
    pub lat: f64,
    pub lon: f64,
    pub cog: f64,
    pub sog: f64,
    pub var: f64,
    pub hdm: f64,
    pub hdt: f64,
    pub fix_time: i64,
    pub n_sats: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiActiveLeg {
    pub xte: f64,
    pub btw: f64,
    pub dtw: f64,
    pub wp_to: *const c_char,
    pub arrival: bool,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiViewPort {
    pub clat: f64,
    pub clon: f64,
    pub view_scale_ppm: f64,
    pub skew: f64,
    pub rotation: f64,
    pub pix_width: c_int,
    pub pix_height: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiMouseEvent {
    pub x: c_int,
    pub y: c_int,
    pub buttons: u32,
    pub wheel: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct FfiKeyEvent {
    pub key_code: c_int,
    pub modifiers: u32,
    pub pressed: bool,
}

/// Host services callable from inside a handler.
#[repr(C)]
pub struct FfiHost {
    pub ctx: *mut c_void,
    /// Returns the new tool id. `icon_svg` and `short_help` may be null;
    /// a negative `position` appends.
    pub add_toolbar_tool: extern "C" fn(
        ctx: *mut c_void,
        label: *const c_char,
        icon_svg: *const c_char,
        short_help: *const c_char,
        position: c_int,
    ) -> c_int,
    pub remove_toolbar_tool: extern "C" fn(ctx: *mut c_void, id: c_int),
    pub set_toolbar_tool_viz: extern "C" fn(ctx: *mut c_void, id: c_int, visible: bool),
    pub set_toolbar_item_state: extern "C" fn(ctx: *mut c_void, id: c_int, toggled: bool),
    /// Returns the new menu item id. `menu` may be null for the default menu.
    pub add_context_menu_item: extern "C" fn(ctx: *mut c_void, label: *const c_char, menu: *const c_char) -> c_int,
    pub remove_context_menu_item: extern "C" fn(ctx: *mut c_void, id: c_int),
    pub set_context_menu_item_viz: extern "C" fn(ctx: *mut c_void, id: c_int, visible: bool),
    pub set_context_menu_item_grey: extern "C" fn(ctx: *mut c_void, id: c_int, grey: bool),
    pub subscribe_message: extern "C" fn(ctx: *mut c_void, message_id: *const c_char),
    /// `json` must be a JSON document; anything else is forwarded as a JSON string.
    pub send_message: extern "C" fn(ctx: *mut c_void, message_id: *const c_char, json: *const c_char),
}

pub type InstanceFn = unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost) -> c_int;

#[repr(C)]
pub struct PluginVTable {
    pub instance: *mut c_void,

    pub api_major: c_int,
    pub api_minor: c_int,
    pub version_major: c_int,
    pub version_minor: c_int,
    /// Full semantic version, or null for plugins that only report the pair.
    pub version_string: *const c_char,
    pub common_name: *const c_char,
    pub short_description: *const c_char,
    pub long_description: *const c_char,
    pub capabilities: u32,

    pub init: InstanceFn,
    pub deinit: unsafe extern "C-unwind" fn(instance: *mut c_void) -> c_int,
    pub late_init: Option<InstanceFn>,

    pub set_position_fix:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, fix: *const FfiPositionFix) -> c_int>,
    pub set_active_leg:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, leg: *const FfiActiveLeg) -> c_int>,
    pub set_nmea_sentence:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, sentence: *const c_char) -> c_int>,
    pub set_ais_sentence:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, sentence: *const c_char) -> c_int>,
    pub set_cursor_lat_lon:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, lat: f64, lon: f64) -> c_int>,
    pub set_viewport:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, vp: *const FfiViewPort) -> c_int>,
    pub on_resize:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, width: c_int, height: c_int) -> c_int>,
    pub set_color_scheme:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, scheme: c_int) -> c_int>,
    pub set_plugin_message: Option<
        unsafe extern "C-unwind" fn(
            instance: *mut c_void,
            host: *const FfiHost,
            message_id: *const c_char,
            json: *const c_char,
        ) -> c_int,
    >,
    pub on_toolbar_tool:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, tool_id: c_int) -> c_int>,
    pub on_context_menu_item:
        Option<unsafe extern "C-unwind" fn(instance: *mut c_void, host: *const FfiHost, item_id: c_int) -> c_int>,
    pub on_mouse_event: Option<
        unsafe extern "C-unwind" fn(
            instance: *mut c_void,
            host: *const FfiHost,
            event: *const FfiMouseEvent,
            consumed: *mut bool,
        ) -> c_int,
    >,
    pub on_key_event: Option<
        unsafe extern "C-unwind" fn(
            instance: *mut c_void,
            host: *const FfiHost,
            event: *const FfiKeyEvent,
            consumed: *mut bool,
        ) -> c_int,
    >,
    pub render_overlay: Option<
        unsafe extern "C-unwind" fn(
            instance: *mut c_void,
            host: *const FfiHost,
            canvas_index: c_int,
            vp: *const FfiViewPort,
            drew: *mut bool,
        ) -> c_int,
    >,
    pub on_setup_options: Option<InstanceFn>,
}
