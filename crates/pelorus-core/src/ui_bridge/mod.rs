//! # Pelorus UI Bridge
//!
//! Bookkeeping for the toolbar tools and context-menu items plugins add to
//! the host UI. Rendering is not done here; the host reads the records
//! through [`UiContributionRegistry::toolbar_layout`] and friends and routes
//! activations back to the owning plugin.
pub mod contributions;
pub mod error;

pub use contributions::{
    ContributionIds, MenuItemId, MenuItemRecord, MenuSpec, ToolIcons, ToolId, ToolKind, ToolSpec,
    ToolbarToolRecord, UiContributionRegistry, DEFAULT_MENU_ID_BASE, DEFAULT_TOOL_ID_BASE,
};
pub use error::UiBridgeError;
