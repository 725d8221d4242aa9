#![cfg(test)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::kernel::host::PluginHost;
use crate::plugin_system::capability::CapabilityFlags;
use crate::storage::config::HostConfig;
use crate::tests::integration::common::{CallLog, MockBackend, MockPlugin, install};

const MESSAGING: CapabilityFlags = CapabilityFlags::PLUGIN_MESSAGING;

fn host_with(plugins: Vec<MockPlugin>) -> (PluginHost, TempDir) {
    let dir = TempDir::new().unwrap();
    let backend = MockBackend::new();
    for plugin in plugins {
        install(&backend, dir.path(), plugin);
    }
    let config = HostConfig {
        plugin_dirs: vec![dir.path().to_path_buf()],
        user_plugin_dir: Some(dir.path().to_path_buf()),
        ..HostConfig::default()
    };
    (PluginHost::with_backend(config, backend.boxed()), dir)
}

#[tokio::test]
async fn test_plugin_messages_reach_host_subscribers() {
    let log = CallLog::new();
    let gps = MockPlugin::new("gps_pi", &log)
        .with_caps(CapabilityFlags::NMEA_SENTENCES | MESSAGING)
        .on_init(|host| host.send_message("gps.ready", json!({"satellites": 0})));
    let (mut host, _dir) = host_with(vec![gps]);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    host.subscribe_host("gps.ready", Box::new(move |id: &str, payload: &Value| {
        sink.borrow_mut().push((id.to_string(), payload.clone()))
    }));
    host.load_all_plugins(true).await.unwrap();

    assert_eq!(seen.borrow().as_slice(), &[("gps.ready".to_string(), json!({"satellites": 0}))]);
    // The sender has no subscriptions, so it also hears its own broadcast.
    assert_eq!(log.calls_of("gps_pi"), vec!["init", "message:gps.ready"]);
}

#[tokio::test]
async fn test_publish_follows_subscription_order() {
    let log = CallLog::new();
    let plugins = ["north_pi", "east_pi", "south_pi"]
        .into_iter()
        .map(|name| MockPlugin::new(name, &log).with_caps(MESSAGING).on_init(|host| host.subscribe("heading")))
        .collect();
    let (mut host, _dir) = host_with(plugins);
    host.load_all_plugins(true).await.unwrap();
    // Subscriptions were made at init, in discovery order.
    host.registry_mut().set_plugin_order("south_pi;north_pi;east_pi");
    log.clear();

    host.send_json_message("heading", json!(270));
    assert_eq!(
        log.entries(),
        vec!["east_pi:message:heading", "north_pi:message:heading", "south_pi:message:heading"]
    );
}

#[tokio::test]
async fn test_failing_subscriber_does_not_block_others() {
    let log = CallLog::new();
    let plugins = vec![
        MockPlugin::new("a_pi", &log).with_caps(MESSAGING).panicking_in("message").on_init(|host| host.subscribe("alarm")),
        MockPlugin::new("b_pi", &log).with_caps(MESSAGING).on_init(|host| host.subscribe("alarm")),
    ];
    let (mut host, _dir) = host_with(plugins);
    host.load_all_plugins(true).await.unwrap();

    let report = host.send_json_message("alarm", json!({"level": "high"}));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.plugin_deliveries.len(), 1);
    assert_eq!(log.count("b_pi:message:alarm"), 1);

    let a = host.registry().find_by_name("a_pi").unwrap().id();
    assert!(!host.registry().get(a).unwrap().is_active());
    assert!(!host.bus().has_plugin_subscriptions(a));

    host.send_json_message("alarm", json!({"level": "low"}));
    assert_eq!(log.count("a_pi:message:alarm"), 1);
    assert_eq!(log.count("b_pi:message:alarm"), 2);
}

#[tokio::test]
async fn test_unsubscribed_plugins_return_to_broadcast() {
    let log = CallLog::new();
    let plugin = MockPlugin::new("chart_pi", &log).with_caps(MESSAGING).on_init(|host| host.subscribe("chart.open")).on_message(
        |host, id, _| {
            if id == "chart.open" {
                host.unsubscribe("chart.open");
            }
        },
    );
    let (mut host, _dir) = host_with(vec![plugin]);
    host.load_all_plugins(true).await.unwrap();

    host.send_json_message("chart.close", Value::Null);
    host.send_json_message("chart.open", Value::Null);
    host.send_json_message("chart.close", Value::Null);
    assert_eq!(log.calls_of("chart_pi"), vec!["init", "message:chart.open", "message:chart.close"]);
}
