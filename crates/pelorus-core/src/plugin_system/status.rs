use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::plugin_system::paths::DirectoryKind;
use crate::plugin_system::version::SemanticVersion;

/// Management state of a plugin, as shown in the plugin list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PluginStatus {
    /// Discovered, not yet classified.
    Unknown,
    /// Ships with the host.
    System,
    /// Installed by the catalog installer.
    Managed,
    /// Installed by other means, e.g. a distribution package.
    Unmanaged,
    /// Shadowed by an authoritative copy of the same plugin elsewhere.
    Ghost,
    LegacyUpdateAvailable,
    /// Only in the catalog; never carried by a registry record.
    ManagedInstallAvailable,
    ManagedInstalledUpdateAvailable,
    ManagedInstalledCurrentVersion,
    ManagedInstalledDowngradeAvailable,
    /// Uninstall requested; purged by the next compaction.
    PendingListRemoval,
    /// Module released.
    Unloaded,
}

impl PluginStatus {
    pub fn is_managed(self) -> bool {
        matches!(
            self,
            PluginStatus::Managed
                | PluginStatus::ManagedInstalledUpdateAvailable
                | PluginStatus::ManagedInstalledCurrentVersion
                | PluginStatus::ManagedInstalledDowngradeAvailable
        )
    }

    /// The action the management UI offers for a plugin in this state.
    pub fn action(self) -> ActionVerb {
        match self {
            PluginStatus::LegacyUpdateAvailable => ActionVerb::UpgradeToManagedVersion,
            PluginStatus::ManagedInstalledUpdateAvailable => ActionVerb::UpgradeInstalledManagedVersion,
            PluginStatus::Managed | PluginStatus::ManagedInstalledCurrentVersion => ActionVerb::ReinstallManagedVersion,
            PluginStatus::ManagedInstalledDowngradeAvailable => ActionVerb::DowngradeInstalledManagedVersion,
            PluginStatus::ManagedInstallAvailable => ActionVerb::InstallManagedVersion,
            PluginStatus::Ghost => ActionVerb::UninstallManagedVersion,
            PluginStatus::Unknown
            | PluginStatus::System
            | PluginStatus::Unmanaged
            | PluginStatus::PendingListRemoval
            | PluginStatus::Unloaded => ActionVerb::Nop,
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PluginStatus::Unknown => "unknown",
            PluginStatus::System => "system",
            PluginStatus::Managed => "managed",
            PluginStatus::Unmanaged => "unmanaged",
            PluginStatus::Ghost => "ghost",
            PluginStatus::LegacyUpdateAvailable => "legacy, update available",
            PluginStatus::ManagedInstallAvailable => "install available",
            PluginStatus::ManagedInstalledUpdateAvailable => "update available",
            PluginStatus::ManagedInstalledCurrentVersion => "current",
            PluginStatus::ManagedInstalledDowngradeAvailable => "downgrade available",
            PluginStatus::PendingListRemoval => "pending removal",
            PluginStatus::Unloaded => "unloaded",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionVerb {
    Nop,
    UpgradeToManagedVersion,
    UpgradeInstalledManagedVersion,
    ReinstallManagedVersion,
    DowngradeInstalledManagedVersion,
    UninstallManagedVersion,
    InstallManagedVersion,
}

/// Status of a managed plugin compared with the catalog's offer.
pub fn managed_status(installed: &SemanticVersion, available: &SemanticVersion) -> PluginStatus {
    match available.cmp(installed) {
        Ordering::Greater => PluginStatus::ManagedInstalledUpdateAvailable,
        Ordering::Equal => PluginStatus::ManagedInstalledCurrentVersion,
        Ordering::Less => PluginStatus::ManagedInstalledDowngradeAvailable,
    }
}

/// What the authority decision looks at for one on-disk copy of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedIdentity {
    pub name: String,
    pub version: SemanticVersion,
    pub location: DirectoryKind,
    pub file: PathBuf,
    /// Position in discovery order.
    pub discovery_index: usize,
}

/// Picks the authoritative copy when several files carry the same plugin.
pub trait AuthorityPolicy {
    /// Index into `candidates` of the copy to keep. `candidates` is never empty.
    fn choose(&self, candidates: &[VersionedIdentity]) -> usize;
}

/// Prefers the user-writable directory, then the higher version, then the
/// copy discovered first.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAuthority;

impl AuthorityPolicy for DefaultAuthority {
    fn choose(&self, candidates: &[VersionedIdentity]) -> usize {
        let rank = |c: &VersionedIdentity| match c.location {
            DirectoryKind::User => 0,
            DirectoryKind::System => 1,
        };
        candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                rank(a)
                    .cmp(&rank(b))
                    .then_with(|| b.version.cmp(&a.version))
                    .then_with(|| a.discovery_index.cmp(&b.discovery_index))
            })
            .map(|(index, _)| index)
            .unwrap_or(0)
    }
}
