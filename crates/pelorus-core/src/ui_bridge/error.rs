//! # Pelorus UI Bridge Errors
//!
//! Errors raised by the toolbar and context-menu contribution registry.
use thiserror::Error;

use crate::plugin_system::PluginId;
use crate::ui_bridge::{MenuItemId, ToolId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UiBridgeError {
    #[error("Unknown toolbar tool id {0}")]
    UnknownTool(ToolId),

    #[error("Unknown context menu item id {0}")]
    UnknownMenuItem(MenuItemId),

    #[error("Contribution id {0} is already registered")]
    DuplicateId(i32),

    #[error("Plugin {requester} does not own contribution {id} (owner: {owner})")]
    NotOwner { id: i32, owner: PluginId, requester: PluginId },
}

impl UiBridgeError {
    /// True for stale or never-issued ids.
    pub fn is_unknown_contribution(&self) -> bool {
        matches!(self, UiBridgeError::UnknownTool(_) | UiBridgeError::UnknownMenuItem(_))
    }
}
