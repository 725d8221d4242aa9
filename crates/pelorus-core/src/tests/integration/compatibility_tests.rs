#![cfg(test)]

use tempfile::TempDir;

use crate::kernel::host::PluginHost;
use crate::plugin_system::compat::{CompatibilityPolicy, CompatibilityRule, ReportKind, Verdict};
use crate::plugin_system::error::ErrorKind;
use crate::plugin_system::loader::ModuleLoader;
use crate::plugin_system::status::PluginStatus;
use crate::plugin_system::version::SemanticVersion;
use crate::storage::config::HostConfig;
use crate::tests::integration::common::{CallLog, MockBackend, MockPlugin, install};

fn alpha_policy() -> CompatibilityPolicy {
    CompatibilityPolicy::with_rules(vec![CompatibilityRule::hard_all_lower("alpha_pi", 0, 95)])
}

fn host_over(dir: &TempDir, backend: &MockBackend) -> PluginHost {
    let config = HostConfig {
        plugin_dirs: vec![dir.path().to_path_buf()],
        user_plugin_dir: Some(dir.path().to_path_buf()),
        ..HostConfig::default()
    };
    PluginHost::with_loader(config, ModuleLoader::new(backend.boxed()).with_policy(alpha_policy()))
}

#[test]
fn test_hard_rule_covers_every_lower_version() {
    let policy = alpha_policy();
    for version in ["0.1", "0.3", "0.94.7", "0.95"] {
        let version = SemanticVersion::parse(version).unwrap();
        assert_eq!(policy.evaluate("alpha_pi", &version), Verdict::Reject, "{}", version);
    }
    for version in ["0.96", "1.0", "12.2.1"] {
        let version = SemanticVersion::parse(version).unwrap();
        assert_eq!(policy.evaluate("alpha_pi", &version), Verdict::Allow, "{}", version);
    }
}

#[test]
fn test_old_alpha_is_rejected_without_a_record() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::new();
    let backend = MockBackend::new();
    let path = install(&backend, dir.path(), MockPlugin::new("alpha_pi", &log).with_version("0.3"));
    let mut host = host_over(&dir, &backend);

    let err = host.load_plugin(&path).unwrap_err();
    assert_eq!(err.plugin_kind(), Some(ErrorKind::Blacklisted));
    assert!(host.registry().is_empty());
    assert_eq!(log.calls_of("alpha_pi"), vec!["drop"]);

    let report = host.show_deferred_messages();
    assert_eq!(report.count(ReportKind::Blacklisted { hard: true }), 1);
}

#[test]
fn test_current_alpha_loads_as_unmanaged() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::new();
    let backend = MockBackend::new();
    let path = install(&backend, dir.path(), MockPlugin::new("alpha_pi", &log).with_version("1.0"));
    let mut host = host_over(&dir, &backend);

    let id = host.load_plugin(&path).unwrap();
    let record = host.registry().get(id).unwrap();
    assert_eq!(record.status(), PluginStatus::Unmanaged);
    assert_eq!(record.version(), &SemanticVersion::new(1, 0, 0));
    assert!(host.show_deferred_messages().is_empty());
}

#[tokio::test]
async fn test_incompatible_modules_do_not_affect_siblings() {
    let dir = TempDir::new().unwrap();
    let log = CallLog::new();
    let backend = MockBackend::new();
    install(&backend, dir.path(), MockPlugin::new("alpha_pi", &log).with_version("0.5"));
    install(&backend, dir.path(), MockPlugin::new("future_pi", &log).with_api(2, 0));
    install(&backend, dir.path(), MockPlugin::new("tides_pi", &log).with_version("2.1"));
    let mut host = host_over(&dir, &backend);

    assert_eq!(host.load_all_plugins(true).await.unwrap(), 1);
    assert_eq!(host.registry().len(), 1);
    assert!(host.registry().find_by_name("tides_pi").unwrap().is_active());

    let report = host.show_deferred_messages();
    assert_eq!(report.len(), 2);
    assert_eq!(report.count(ReportKind::IncompatibleApi), 1);
}
