#![cfg(test)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::event::types::{ActiveLeg, ColorScheme, KeyEvent, MouseEvent, PositionFix, ViewPort};
use crate::plugin_system::capability::CapabilityFlags;
use crate::plugin_system::context::HostContext;
use crate::plugin_system::error::{PluginError, PluginResult, PluginSystemError};
use crate::plugin_system::PluginId;
use crate::plugin_system::loader::{HOST_API_VERSION, LoadOutcome, ModuleBackend, ModuleCapsule, ModuleLoader};
use crate::plugin_system::paths::{PluginPaths, module_extension};
use crate::plugin_system::registry::PluginRegistry;
use crate::plugin_system::traits::Plugin;
use crate::plugin_system::version::ApiVersion;
use crate::ui_bridge::{MenuItemId, ToolId};

// ===== CALL LOG =====

/// Shared, ordered record of plugin calls: `"<name>:<call>"`.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries recorded for one plugin, with the name prefix stripped.
    pub fn calls_of(&self, name: &str) -> Vec<String> {
        let prefix = format!("{}:", name);
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ===== MOCK PLUGIN =====

pub type InitScript = Rc<dyn Fn(&mut HostContext<'_>)>;
pub type MessageScript = Rc<dyn Fn(&mut HostContext<'_>, &str, &Value)>;
pub type ToolScript = Rc<dyn Fn(&mut HostContext<'_>, ToolId)>;

/// Configurable in-memory plugin. Clones share the call log; only instances
/// handed out by [`MockBackend`] log their drop.
#[derive(Clone)]
pub struct MockPlugin {
    name: String,
    api: ApiVersion,
    version_pair: (i32, i32),
    version_string: Option<String>,
    caps: CapabilityFlags,
    log: CallLog,
    fail_init: bool,
    panic_init: bool,
    fail_in: Option<&'static str>,
    panic_in: Option<&'static str>,
    consumes_input: bool,
    draws: bool,
    on_init: Option<InitScript>,
    on_message: Option<MessageScript>,
    on_tool: Option<ToolScript>,
    live: bool,
}

impl MockPlugin {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            api: HOST_API_VERSION,
            version_pair: (1, 0),
            version_string: None,
            caps: CapabilityFlags::NONE,
            log: log.clone(),
            fail_init: false,
            panic_init: false,
            fail_in: None,
            panic_in: None,
            consumes_input: false,
            draws: false,
            on_init: None,
            on_message: None,
            on_tool: None,
            live: false,
        }
    }

    pub fn with_caps(mut self, caps: CapabilityFlags) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_api(mut self, major: u32, minor: u32) -> Self {
        self.api = ApiVersion::new(major, minor);
        self
    }

    pub fn with_version_pair(mut self, major: i32, minor: i32) -> Self {
        self.version_pair = (major, minor);
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version_string = Some(version.to_string());
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn panicking_init(mut self) -> Self {
        self.panic_init = true;
        self
    }

    /// Return an error from the named handler, e.g. `"nmea"`.
    pub fn failing_in(mut self, handler: &'static str) -> Self {
        self.fail_in = Some(handler);
        self
    }

    /// Panic in the named handler.
    pub fn panicking_in(mut self, handler: &'static str) -> Self {
        self.panic_in = Some(handler);
        self
    }

    pub fn consuming_input(mut self) -> Self {
        self.consumes_input = true;
        self
    }

    pub fn drawing(mut self) -> Self {
        self.draws = true;
        self
    }

    pub fn on_init(mut self, script: impl Fn(&mut HostContext<'_>) + 'static) -> Self {
        self.on_init = Some(Rc::new(script));
        self
    }

    pub fn on_message(mut self, script: impl Fn(&mut HostContext<'_>, &str, &Value) + 'static) -> Self {
        self.on_message = Some(Rc::new(script));
        self
    }

    pub fn on_tool(mut self, script: impl Fn(&mut HostContext<'_>, ToolId) + 'static) -> Self {
        self.on_tool = Some(Rc::new(script));
        self
    }

    fn instance(&self) -> Self {
        let mut plugin = self.clone();
        plugin.live = true;
        plugin
    }

    fn record(&self, call: &str) {
        self.log.push(format!("{}:{}", self.name, call));
    }

    fn handle(&self, call: &str) -> PluginResult {
        self.record(call);
        if self.panic_in == Some(call) {
            panic!("{} exploded in {}", self.name, call);
        }
        if self.fail_in == Some(call) {
            return Err(PluginError::Message(format!("{} refused {}", self.name, call)));
        }
        Ok(())
    }
}

impl Drop for MockPlugin {
    fn drop(&mut self) {
        if self.live {
            self.record("drop");
        }
    }
}

impl Plugin for MockPlugin {
    fn common_name(&self) -> &str {
        &self.name
    }

    fn short_description(&self) -> &str {
        "Mock plugin"
    }

    fn api_version(&self) -> ApiVersion {
        self.api
    }

    fn version_pair(&self) -> (i32, i32) {
        self.version_pair
    }

    fn version_string(&self) -> Option<&str> {
        self.version_string.as_deref()
    }

    fn capabilities(&self) -> CapabilityFlags {
        self.caps
    }

    fn init(&mut self, host: &mut HostContext<'_>) -> PluginResult {
        self.record("init");
        if self.panic_init {
            panic!("{} cannot start", self.name);
        }
        if self.fail_init {
            return Err(PluginError::Status(-1));
        }
        if let Some(script) = self.on_init.clone() {
            script(host);
        }
        Ok(())
    }

    fn late_init(&mut self, _host: &mut HostContext<'_>) -> PluginResult {
        self.handle("late_init")
    }

    fn deinit(&mut self) -> PluginResult {
        self.handle("deinit")
    }

    fn on_position_fix(&mut self, _host: &mut HostContext<'_>, _fix: &PositionFix) -> PluginResult {
        self.handle("position")
    }

    fn on_active_leg(&mut self, _host: &mut HostContext<'_>, _leg: &ActiveLeg) -> PluginResult {
        self.handle("leg")
    }

    fn on_nmea_sentence(&mut self, _host: &mut HostContext<'_>, _sentence: &str) -> PluginResult {
        self.handle("nmea")
    }

    fn on_ais_sentence(&mut self, _host: &mut HostContext<'_>, _sentence: &str) -> PluginResult {
        self.handle("ais")
    }

    fn on_cursor_lat_lon(&mut self, _host: &mut HostContext<'_>, _lat: f64, _lon: f64) -> PluginResult {
        self.handle("cursor")
    }

    fn on_viewport(&mut self, _host: &mut HostContext<'_>, _viewport: &ViewPort) -> PluginResult {
        self.handle("viewport")
    }

    fn on_resize(&mut self, _host: &mut HostContext<'_>, _width: i32, _height: i32) -> PluginResult {
        self.handle("resize")
    }

    fn on_color_scheme(&mut self, _host: &mut HostContext<'_>, _scheme: ColorScheme) -> PluginResult {
        self.handle("color")
    }

    fn on_plugin_message(&mut self, host: &mut HostContext<'_>, message_id: &str, payload: &Value) -> PluginResult {
        self.record(&format!("message:{}", message_id));
        if self.panic_in == Some("message") {
            panic!("{} exploded in message", self.name);
        }
        if self.fail_in == Some("message") {
            return Err(PluginError::Message(format!("{} refused message", self.name)));
        }
        if let Some(script) = self.on_message.clone() {
            script(host, message_id, payload);
        }
        Ok(())
    }

    fn on_toolbar_tool(&mut self, host: &mut HostContext<'_>, tool: ToolId) -> PluginResult {
        self.handle("tool")?;
        if let Some(script) = self.on_tool.clone() {
            script(host, tool);
        }
        Ok(())
    }

    fn on_context_menu_item(&mut self, _host: &mut HostContext<'_>, _item: MenuItemId) -> PluginResult {
        self.handle("menu")
    }

    fn on_mouse_event(&mut self, _host: &mut HostContext<'_>, _event: &MouseEvent) -> PluginResult<bool> {
        self.handle("mouse")?;
        Ok(self.consumes_input)
    }

    fn on_key_event(&mut self, _host: &mut HostContext<'_>, _event: &KeyEvent) -> PluginResult<bool> {
        self.handle("key")?;
        Ok(self.consumes_input)
    }

    fn render_overlay(&mut self, _host: &mut HostContext<'_>, _canvas_index: u32, _viewport: &ViewPort) -> PluginResult<bool> {
        self.handle("overlay")?;
        Ok(self.draws)
    }

    fn on_setup_options(&mut self, _host: &mut HostContext<'_>) -> PluginResult {
        self.handle("setup")
    }
}

// ===== MOCK BACKEND =====

/// Maps file paths to in-memory plugins. Paths it does not know fail to
/// open, like a file that is not a plugin module.
#[derive(Clone, Default)]
pub struct MockBackend {
    plugins: Arc<Mutex<HashMap<PathBuf, MockTemplate>>>,
    opens: Arc<Mutex<HashMap<PathBuf, usize>>>,
    unavailable: bool,
}

#[derive(Clone)]
enum MockTemplate {
    Plugin(MockPlugin),
    Broken(String),
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        Self { unavailable: true, ..Self::default() }
    }

    pub fn register(&self, path: &Path, plugin: MockPlugin) {
        self.plugins.lock().unwrap().insert(path.to_path_buf(), MockTemplate::Plugin(plugin));
    }

    pub fn register_broken(&self, path: &Path, reason: &str) {
        self.plugins.lock().unwrap().insert(path.to_path_buf(), MockTemplate::Broken(reason.to_string()));
    }

    pub fn open_count(&self, path: &Path) -> usize {
        self.opens.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn boxed(&self) -> Box<dyn ModuleBackend> {
        Box::new(self.clone())
    }
}

impl ModuleBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn open(&self, path: &Path) -> LoadOutcome {
        *self.opens.lock().unwrap().entry(path.to_path_buf()).or_insert(0) += 1;
        match self.plugins.lock().unwrap().get(path) {
            Some(MockTemplate::Plugin(plugin)) => LoadOutcome::Loaded {
                capsule: ModuleCapsule::from_plugin(path, Box::new(plugin.instance())),
            },
            Some(MockTemplate::Broken(reason)) => LoadOutcome::Failed {
                reason: PluginSystemError::open_failed(path, reason.clone()),
            },
            None => LoadOutcome::Failed { reason: PluginSystemError::open_failed(path, "not a plugin module") },
        }
    }
}

// ===== FILE HELPERS =====

/// Path of a module file named after `name` inside `dir`, e.g.
/// `<dir>/libdashboard_pi.so`.
pub fn module_path(dir: &Path, name: &str) -> PathBuf {
    let file = if cfg!(windows) {
        format!("{}.{}", name, module_extension())
    } else {
        format!("lib{}.{}", name, module_extension())
    };
    dir.join(file)
}

/// Creates an empty module file and returns its path.
pub fn touch_module(dir: &Path, name: &str) -> PathBuf {
    let path = module_path(dir, name);
    fs::write(&path, b"").unwrap();
    path
}

/// Creates a module file and registers `plugin` for it.
pub fn install(backend: &MockBackend, dir: &Path, plugin: MockPlugin) -> PathBuf {
    let path = touch_module(dir, &plugin.name);
    backend.register(&path, plugin);
    path
}

/// Registry over `dir` as the only (user) search directory.
pub fn mock_registry(backend: &MockBackend, dir: &Path) -> PluginRegistry {
    PluginRegistry::new(ModuleLoader::new(backend.boxed()), PluginPaths::new(dir, vec![dir.to_path_buf()]))
}

/// Installs, loads and initializes `plugin`.
pub fn load_active(registry: &mut PluginRegistry, backend: &MockBackend, dir: &Path, plugin: MockPlugin) -> PluginId {
    let path = install(backend, dir, plugin);
    let id = registry.load(&path).unwrap();
    registry.initialize(id).unwrap();
    id
}
