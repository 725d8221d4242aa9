//! Native fixture: a small plugin speaking the host ABI.
//!
//! On init it adds a toolbar tool and subscribes to `echo.ping`. Every NMEA
//! sentence is echoed back as an `echo.nmea` message, and every `echo.ping`
//! message is answered with `echo.pong` carrying the same JSON. A message with
//! id `echo.fail` makes the handler return a non-zero status.
#![allow(dead_code)]

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};

#[repr(C)]
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
pub struct FfiActiveLeg {
    pub xte: f64,
    pub btw: f64,
    pub dtw: f64,
    pub wp_to: *const c_char,
    pub arrival: bool,
}

#[repr(C)]
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
pub struct FfiMouseEvent {
    pub x: c_int,
    pub y: c_int,
    pub buttons: u32,
    pub wheel: c_int,
}

#[repr(C)]
pub struct FfiKeyEvent {
    pub key_code: c_int,
    pub modifiers: u32,
    pub pressed: bool,
}

#[repr(C)]
pub struct FfiHost {
    pub ctx: *mut c_void,
    pub add_toolbar_tool: extern "C" fn(*mut c_void, *const c_char, *const c_char, *const c_char, c_int) -> c_int,
    pub remove_toolbar_tool: extern "C" fn(*mut c_void, c_int),
    pub set_toolbar_tool_viz: extern "C" fn(*mut c_void, c_int, bool),
    pub set_toolbar_item_state: extern "C" fn(*mut c_void, c_int, bool),
    pub add_context_menu_item: extern "C" fn(*mut c_void, *const c_char, *const c_char) -> c_int,
    pub remove_context_menu_item: extern "C" fn(*mut c_void, c_int),
    pub set_context_menu_item_viz: extern "C" fn(*mut c_void, c_int, bool),
    pub set_context_menu_item_grey: extern "C" fn(*mut c_void, c_int, bool),
    pub subscribe_message: extern "C" fn(*mut c_void, *const c_char),
    pub send_message: extern "C" fn(*mut c_void, *const c_char, *const c_char),
}

type InstanceFn = unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost) -> c_int;

#[repr(C)]
pub struct PluginVTable {
    pub instance: *mut c_void,
    pub api_major: c_int,
    pub api_minor: c_int,
    pub version_major: c_int,
    pub version_minor: c_int,
    pub version_string: *const c_char,
    pub common_name: *const c_char,
    pub short_description: *const c_char,
    pub long_description: *const c_char,
    pub capabilities: u32,
    pub init: InstanceFn,
    pub deinit: unsafe extern "C-unwind" fn(*mut c_void) -> c_int,
    pub late_init: Option<InstanceFn>,
    pub set_position_fix: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, *const FfiPositionFix) -> c_int>,
    pub set_active_leg: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, *const FfiActiveLeg) -> c_int>,
    pub set_nmea_sentence: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, *const c_char) -> c_int>,
    pub set_ais_sentence: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, *const c_char) -> c_int>,
    pub set_cursor_lat_lon: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, f64, f64) -> c_int>,
    pub set_viewport: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, *const FfiViewPort) -> c_int>,
    pub on_resize: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, c_int, c_int) -> c_int>,
    pub set_color_scheme: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, c_int) -> c_int>,
    pub set_plugin_message:
        Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, *const c_char, *const c_char) -> c_int>,
    pub on_toolbar_tool: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, c_int) -> c_int>,
    pub on_context_menu_item: Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, c_int) -> c_int>,
    pub on_mouse_event:
        Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, *const FfiMouseEvent, *mut bool) -> c_int>,
    pub on_key_event:
        Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, *const FfiKeyEvent, *mut bool) -> c_int>,
    pub render_overlay:
        Option<unsafe extern "C-unwind" fn(*mut c_void, *const FfiHost, c_int, *const FfiViewPort, *mut bool) -> c_int>,
    pub on_setup_options: Option<InstanceFn>,
}

const NMEA_SENTENCES: u32 = 0x0000_0080;
const TOOLBAR_CALLBACK: u32 = 0x0000_0004;
const INSTALLS_TOOLBAR_TOOL: u32 = 0x0000_0008;
const PLUGIN_MESSAGING: u32 = 0x0000_4000;

struct EchoState {
    tool_id: c_int,
    sentences: usize,
}

unsafe extern "C-unwind" fn echo_init(instance: *mut c_void, host: *const FfiHost) -> c_int {
    let state = &mut *(instance as *mut EchoState);
    let host = &*host;
    state.tool_id = (host.add_toolbar_tool)(
        host.ctx,
        c"Echo".as_ptr(),
        std::ptr::null(),
        c"Echo NMEA traffic".as_ptr(),
        -1,
    );
    (host.subscribe_message)(host.ctx, c"echo.ping".as_ptr());
    0
}

unsafe extern "C-unwind" fn echo_deinit(_instance: *mut c_void) -> c_int {
    0
}

unsafe extern "C-unwind" fn echo_nmea(instance: *mut c_void, host: *const FfiHost, sentence: *const c_char) -> c_int {
    let state = &mut *(instance as *mut EchoState);
    state.sentences += 1;
    let host = &*host;
    (host.send_message)(host.ctx, c"echo.nmea".as_ptr(), sentence);
    0
}

unsafe extern "C-unwind" fn echo_message(
    _instance: *mut c_void,
    host: *const FfiHost,
    message_id: *const c_char,
    json: *const c_char,
) -> c_int {
    let id = CStr::from_ptr(message_id).to_bytes();
    if id == b"echo.fail" {
        return 7;
    }
    if id == b"echo.ping" {
        let host = &*host;
        (host.send_message)(host.ctx, c"echo.pong".as_ptr(), json);
    }
    0
}

unsafe extern "C-unwind" fn echo_tool(instance: *mut c_void, host: *const FfiHost, tool_id: c_int) -> c_int {
    let state = &*(instance as *mut EchoState);
    if tool_id == state.tool_id {
        let host = &*host;
        (host.set_toolbar_tool_viz)(host.ctx, tool_id, false);
    }
    0
}

#[no_mangle]
pub unsafe extern "C-unwind" fn pelorus_create_plugin() -> *mut PluginVTable {
    let state = Box::into_raw(Box::new(EchoState { tool_id: -1, sentences: 0 }));
    Box::into_raw(Box::new(PluginVTable {
        instance: state as *mut c_void,
        api_major: 1,
        api_minor: 17,
        version_major: 0,
        version_minor: 3,
        version_string: c"0.3.1".as_ptr(),
        common_name: c"Echo".as_ptr(),
        short_description: c"Echoes NMEA traffic".as_ptr(),
        long_description: std::ptr::null(),
        capabilities: NMEA_SENTENCES | TOOLBAR_CALLBACK | INSTALLS_TOOLBAR_TOOL | PLUGIN_MESSAGING,
        init: echo_init,
        deinit: echo_deinit,
        late_init: None,
        set_position_fix: None,
        set_active_leg: None,
        set_nmea_sentence: Some(echo_nmea),
        set_ais_sentence: None,
        set_cursor_lat_lon: None,
        set_viewport: None,
        on_resize: None,
        set_color_scheme: None,
        set_plugin_message: Some(echo_message),
        on_toolbar_tool: Some(echo_tool),
        on_context_menu_item: None,
        on_mouse_event: None,
        on_key_event: None,
        render_overlay: None,
        on_setup_options: None,
    }))
}

#[no_mangle]
pub unsafe extern "C-unwind" fn pelorus_destroy_plugin(table: *mut PluginVTable) {
    if table.is_null() {
        return;
    }
    let table = Box::from_raw(table);
    drop(Box::from_raw(table.instance as *mut EchoState));
}
