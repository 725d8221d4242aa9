//! # Pelorus Event System Errors
//!
//! Defines error types specific to event delivery.
//!
//! Faults raised by plugin handlers are not errors of the event system: they
//! are isolated per plugin and reported in a
//! [`DispatchReport`](crate::event::DispatchReport). [`EventSystemError`]
//! covers the cases where an event cannot be routed at all.
use thiserror::Error;

use crate::plugin_system::PluginId;
use crate::plugin_system::error::PluginSystemError;
use crate::ui_bridge::UiBridgeError;

#[derive(Debug, Error)]
pub enum EventSystemError {
    /// The target plugin is inactive or did not declare the capability the
    /// event requires.
    #[error("Plugin {plugin} is not eligible for event '{event}'")]
    NotEligible { plugin: PluginId, event: &'static str },

    #[error("Cannot route event '{event}': {source}")]
    Unroutable {
        event: &'static str,
        #[source]
        source: UiBridgeError,
    },

    #[error(transparent)]
    Registry(#[from] PluginSystemError),
}
