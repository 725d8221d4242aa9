#![cfg(test)]

use std::ffi::c_void;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

use crate::event::dispatcher::CapabilityDispatcher;
use crate::event::types::HostEvent;
use crate::plugin_system::abi::{FfiHost, PluginVTable};
use crate::plugin_system::capability::CapabilityFlags;
use crate::plugin_system::compat::{DeferredReport, ReportKind};
use crate::plugin_system::context::HostRequest;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::ffi::missing_handlers;
use crate::plugin_system::loader::ModuleLoader;
use crate::plugin_system::paths::{PluginPaths, module_extension};
use crate::plugin_system::registry::PluginRegistry;

/// Builds one of the fixture crates under `tests/test_plugins` into a fresh
/// target directory and returns the path of the produced module.
fn compile_test_plugin(lib_name: &str, project_subpath: &str) -> Result<(PathBuf, TempDir), String> {
    let project = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(project_subpath);
    let target_dir = tempdir().map_err(|e| format!("Failed to create target dir: {}", e))?;

    let output = Command::new(env!("CARGO"))
        .current_dir(&project)
        .arg("build")
        .arg("--target-dir")
        .arg(target_dir.path())
        .output()
        .map_err(|e| format!("Failed to run cargo build for {}: {}", lib_name, e))?;
    if !output.status.success() {
        return Err(format!(
            "Failed to compile test plugin {}: {}\n{}",
            lib_name,
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    let file = if cfg!(windows) {
        format!("{}.{}", lib_name, module_extension())
    } else {
        format!("lib{}.{}", lib_name, module_extension())
    };
    let module = target_dir.path().join("debug").join(file);
    if !module.exists() {
        return Err(format!("Compiled plugin not found at {}", module.display()));
    }
    Ok((module, target_dir))
}

fn native_registry(dir: &Path) -> PluginRegistry {
    PluginRegistry::new(ModuleLoader::default(), PluginPaths::new(dir, vec![dir.to_path_buf()]))
}

#[test]
fn test_load_missing_symbol_plugin() {
    let (module, _target) = compile_test_plugin("missing_symbol_plugin", "tests/test_plugins/failing_ffi/missing_symbol_plugin")
        .expect("Failed to compile missing_symbol_plugin");

    let mut report = DeferredReport::default();
    let err = ModuleLoader::default().load(&module, &mut report).unwrap_err();
    match err {
        PluginSystemError::OpenFailed { ref reason, .. } => {
            assert!(reason.contains("pelorus_destroy_plugin"), "unexpected reason: {}", reason)
        }
        other => panic!("Expected OpenFailed, got {:?}", other),
    }
    assert_eq!(report.entries()[0].kind, ReportKind::OpenFailed);
    assert_eq!(report.entries()[0].name, "missing_symbol_plugin");
}

#[test]
fn test_load_null_vtable_plugin() {
    let (module, _target) = compile_test_plugin("invalid_vtable_plugin", "tests/test_plugins/failing_ffi/invalid_vtable_plugin")
        .expect("Failed to compile invalid_vtable_plugin");

    let err = ModuleLoader::default().load(&module, &mut DeferredReport::default()).unwrap_err();
    assert!(err.to_string().contains("returned null"), "unexpected error: {}", err);
}

#[test]
#[ignore = "A panic unwinding out of a separately compiled module belongs to another Rust runtime; the host's catch_unwind aborts instead of catching it."]
fn test_load_factory_panic_plugin() {
    let (module, _target) = compile_test_plugin("init_panic_plugin", "tests/test_plugins/failing_ffi/init_panic_plugin")
        .expect("Failed to compile init_panic_plugin");

    let err = ModuleLoader::default().load(&module, &mut DeferredReport::default()).unwrap_err();
    assert!(err.to_string().contains("panicked"));
}

#[test]
fn test_native_plugin_round_trip() {
    let (module, target) = compile_test_plugin("echo_plugin", "tests/test_plugins/echo_plugin")
        .expect("Failed to compile echo_plugin");
    let dir = module.parent().unwrap().to_path_buf();
    let mut registry = native_registry(&dir);

    let id = registry.load(&module).unwrap();
    let record = registry.get(id).unwrap();
    assert_eq!(record.common_name(), "Echo");
    assert_eq!(record.short_name(), "echo_plugin");
    assert_eq!(record.version().to_string(), "0.3.1");
    assert_eq!(record.short_description(), "Echoes NMEA traffic");
    assert!(record.capabilities().contains(CapabilityFlags::NMEA_SENTENCES | CapabilityFlags::PLUGIN_MESSAGING));

    registry.initialize(id).unwrap();
    let requests = registry.session_mut().take_requests();
    let tool = match &requests[0] {
        HostRequest::AddToolbarTool { owner, id: tool, spec } => {
            assert_eq!(*owner, id);
            assert_eq!(spec.label, "Echo");
            assert_eq!(spec.short_help, "Echo NMEA traffic");
            *tool
        }
        other => panic!("Expected a toolbar request, got {:?}", other),
    };
    assert!(matches!(&requests[1], HostRequest::Subscribe { message_id, .. } if message_id == "echo.ping"));

    let dispatcher = CapabilityDispatcher::new();
    let report = dispatcher.dispatch(&mut registry, &HostEvent::NmeaSentence("$GPGLL,4916.45,N".to_string()));
    assert_eq!(report.delivered, vec![id]);
    let requests = registry.session_mut().take_requests();
    assert_eq!(
        requests,
        vec![HostRequest::SendMessage {
            owner: id,
            message_id: "echo.nmea".to_string(),
            payload: Value::String("$GPGLL,4916.45,N".to_string()),
        }]
    );

    let ping = HostEvent::JsonMessage { id: "echo.ping".to_string(), payload: json!({"seq": 4}) };
    dispatcher.dispatch(&mut registry, &ping);
    let requests = registry.session_mut().take_requests();
    assert!(matches!(
        &requests[0],
        HostRequest::SendMessage { message_id, payload, .. } if message_id == "echo.pong" && *payload == json!({"seq": 4})
    ));

    dispatcher.deliver_to(&mut registry, id, &HostEvent::ToolbarToolActivated(tool)).unwrap();
    let requests = registry.session_mut().take_requests();
    assert_eq!(requests, vec![HostRequest::SetToolbarToolViz { owner: id, id: tool, visible: false }]);

    let fail = HostEvent::JsonMessage { id: "echo.fail".to_string(), payload: Value::Null };
    let report = dispatcher.dispatch(&mut registry, &fail);
    assert_eq!(report.faults.len(), 1);
    assert!(report.faults[0].1.to_string().contains("status code 7"));
    assert_eq!(registry.apply_pending_deactivations(), vec![id]);
    assert!(!registry.get(id).unwrap().is_active());

    registry.unload(id).unwrap();
    assert!(registry.is_empty());
    drop(target);
}

unsafe extern "C-unwind" fn noop_init(_instance: *mut c_void, _host: *const FfiHost) -> c_int {
    0
}

unsafe extern "C-unwind" fn noop_deinit(_instance: *mut c_void) -> c_int {
    0
}

unsafe extern "C-unwind" fn noop_nmea(
    _instance: *mut c_void,
    _host: *const FfiHost,
    _sentence: *const std::os::raw::c_char,
) -> c_int {
    0
}

fn bare_table(capabilities: CapabilityFlags) -> PluginVTable {
    PluginVTable {
        instance: std::ptr::null_mut(),
        api_major: 1,
        api_minor: 17,
        version_major: 1,
        version_minor: 0,
        version_string: std::ptr::null(),
        common_name: c"bare".as_ptr(),
        short_description: std::ptr::null(),
        long_description: std::ptr::null(),
        capabilities: capabilities.bits(),
        init: noop_init,
        deinit: noop_deinit,
        late_init: None,
        set_position_fix: None,
        set_active_leg: None,
        set_nmea_sentence: None,
        set_ais_sentence: None,
        set_cursor_lat_lon: None,
        set_viewport: None,
        on_resize: None,
        set_color_scheme: None,
        set_plugin_message: None,
        on_toolbar_tool: None,
        on_context_menu_item: None,
        on_mouse_event: None,
        on_key_event: None,
        render_overlay: None,
        on_setup_options: None,
    }
}

#[test]
fn test_declared_capabilities_need_handlers() {
    let mut table = bare_table(CapabilityFlags::NMEA_SENTENCES | CapabilityFlags::LATE_INIT);
    assert_eq!(missing_handlers(&table), vec!["set_nmea_sentence", "late_init"]);

    table.set_nmea_sentence = Some(noop_nmea);
    table.late_init = Some(noop_init);
    assert!(missing_handlers(&table).is_empty());

    // Flags without a handler of their own never require one.
    let table = bare_table(CapabilityFlags::WANTS_CONFIG | CapabilityFlags::INSTALLS_TOOLBAR_TOOL);
    assert!(missing_handlers(&table).is_empty());
}
