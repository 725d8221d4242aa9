#![cfg(test)]

use std::fs;

use tempfile::TempDir;

use crate::kernel::host::PluginHost;
use crate::plugin_system::compat::ReportKind;
use crate::storage::config::HostConfig;
use crate::tests::integration::common::{CallLog, MockBackend, MockPlugin, install, module_path, touch_module};
use crate::ui_bridge::{MenuSpec, ToolSpec};

struct Scene {
    dir: TempDir,
    backend: MockBackend,
    log: CallLog,
}

impl Scene {
    fn new() -> Self {
        Self { dir: TempDir::new().unwrap(), backend: MockBackend::new(), log: CallLog::new() }
    }

    fn config(&self) -> HostConfig {
        HostConfig {
            plugin_dirs: vec![self.dir.path().to_path_buf()],
            user_plugin_dir: Some(self.dir.path().to_path_buf()),
            ..HostConfig::default()
        }
    }

    fn add(&self, name: &str) -> MockPlugin {
        MockPlugin::new(name, &self.log)
    }
}

#[tokio::test]
async fn test_valid_and_invalid_files_are_independent() {
    let scene = Scene::new();
    for name in ["anchor_pi", "compass_pi", "dashboard_pi", "logbook_pi"] {
        install(&scene.backend, scene.dir.path(), scene.add(name));
    }
    touch_module(scene.dir.path(), "corrupt_pi");
    scene.backend.register_broken(&touch_module(scene.dir.path(), "truncated_pi"), "unexpected end of file");
    install(&scene.backend, scene.dir.path(), scene.add("radar_pi").with_version("0.80"));
    fs::write(scene.dir.path().join("README.txt"), "not a module").unwrap();

    let mut host = PluginHost::with_backend(scene.config(), scene.backend.boxed());
    assert_eq!(host.load_all_plugins(true).await.unwrap(), 4);
    assert_eq!(host.registry().len(), 4);
    assert!(host.registry().records().iter().all(|r| r.is_active()));

    let report = host.show_deferred_messages();
    assert_eq!(report.len(), 3);
    assert_eq!(report.count(ReportKind::OpenFailed), 2);
    assert_eq!(report.count(ReportKind::Blacklisted { hard: true }), 1);
}

#[tokio::test]
async fn test_unload_deinitializes_before_release_and_cascades() {
    let scene = Scene::new();
    install(
        &scene.backend,
        scene.dir.path(),
        scene.add("route_pi").on_init(|host| {
            host.add_toolbar_tool(ToolSpec::new("Route"));
            host.add_toolbar_tool(ToolSpec::new("Waypoint"));
            host.add_context_menu_item(MenuSpec::new("Navigate to"));
            host.subscribe("route.activate");
        }),
    );
    install(
        &scene.backend,
        scene.dir.path(),
        scene.add("weather_pi").on_init(|host| {
            host.add_toolbar_tool(ToolSpec::new("Weather"));
        }),
    );
    let mut host = PluginHost::with_backend(scene.config(), scene.backend.boxed());
    host.load_all_plugins(true).await.unwrap();

    let route = host.registry().find_by_name("route_pi").unwrap().id();
    let tools: Vec<_> = host.ui().tools().iter().filter(|t| t.owner == route).map(|t| t.id).collect();
    let items: Vec<_> = host.ui().menu_items().iter().map(|m| m.id).collect();
    assert_eq!((tools.len(), items.len()), (2, 1));

    host.unload_plugin(route).unwrap();
    assert_eq!(scene.log.calls_of("route_pi"), vec!["init", "deinit", "drop"]);
    assert_eq!(scene.log.count("route_pi:deinit"), 1);
    let deinit = scene.log.position("route_pi:deinit").unwrap();
    let release = scene.log.position("route_pi:drop").unwrap();
    assert!(deinit < release);
    assert!(scene.log.position("weather_pi:deinit").is_none());
    for tool in tools {
        assert!(host.ui().find_tool_owner(tool).is_err());
    }
    for item in items {
        assert!(host.ui().find_menu_owner(item).is_err());
    }
    assert!(!host.bus().has_plugin_subscriptions(route));
    assert_eq!(host.ui().tools().len(), 1);
}

#[test]
fn test_reloaded_plugins_get_fresh_ids() {
    let scene = Scene::new();
    let path = install(&scene.backend, scene.dir.path(), scene.add("sonar_pi"));
    let mut host = PluginHost::with_backend(scene.config(), scene.backend.boxed());

    let first = host.load_plugin(&path).unwrap();
    host.unload_plugin(first).unwrap();
    let second = host.load_plugin(&path).unwrap();
    assert_ne!(first, second);
    assert!(host.registry().get(first).is_none());
}

#[tokio::test]
async fn test_order_survives_a_fresh_scan() {
    let scene = Scene::new();
    for name in ["a_pi", "b_pi", "c_pi", "d_pi"] {
        install(&scene.backend, scene.dir.path(), scene.add(name));
    }

    let mut host = PluginHost::with_backend(scene.config(), scene.backend.boxed());
    host.load_all_plugins(true).await.unwrap();
    let d = host.registry().find_by_name("d_pi").unwrap().id();
    let b = host.registry().find_by_name("b_pi").unwrap().id();
    assert!(host.registry_mut().move_up(d).unwrap());
    assert!(host.registry_mut().move_up(d).unwrap());
    assert!(host.registry_mut().move_down(b).unwrap());
    assert_eq!(host.registry().plugin_order(), "a_pi;d_pi;c_pi;b_pi");
    host.shutdown();
    let saved = host.config().clone();
    drop(host);

    // One plugin disappears, a new one shows up.
    fs::remove_file(module_path(scene.dir.path(), "b_pi")).unwrap();
    install(&scene.backend, scene.dir.path(), scene.add("aa_pi"));

    let mut host = PluginHost::with_backend(saved, scene.backend.boxed());
    host.load_all_plugins(true).await.unwrap();
    assert_eq!(host.registry().plugin_order(), "a_pi;d_pi;c_pi;aa_pi");
}
