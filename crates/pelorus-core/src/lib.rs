pub mod event;
pub mod kernel;
pub mod message_bus;
pub mod plugin_system;
pub mod storage;
pub mod ui_bridge;

// Re-export key public types for the binary and for plugins compiled into
// the host.
pub use event::{CapabilityDispatcher, ColorScheme, DispatchReport, HostEvent};
pub use kernel::PluginHost;
pub use kernel::error::Error as KernelError;
pub use message_bus::MessageBus;
pub use plugin_system::{
    ApiVersion, CapabilityFlags, CompatibilityPolicy, HostContext, Plugin, PluginError, PluginId, PluginRegistry,
    PluginResult, PluginStatus, SemanticVersion, Verdict,
};
pub use storage::HostConfig;
pub use ui_bridge::UiContributionRegistry;

#[cfg(test)]
mod tests;
