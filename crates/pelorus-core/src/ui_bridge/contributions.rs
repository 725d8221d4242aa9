use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::plugin_system::PluginId;
use crate::ui_bridge::error::UiBridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolId(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MenuItemId(pub i32);

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tool#{}", self.0)
    }
}

impl fmt::Display for MenuItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "menu#{}", self.0)
    }
}

pub const DEFAULT_TOOL_ID_BASE: i32 = 1000;
pub const DEFAULT_MENU_ID_BASE: i32 = 5000;

/// Monotonic id counters for toolbar tools and menu items.
///
/// Clones share the same counters, so the plugin registry can hand ids to
/// plugins while the UI registry inserts the records later. Never reset
/// while the host lives: an id handed out once is never handed out again,
/// even after its owner is unloaded.
#[derive(Debug, Clone)]
pub struct ContributionIds {
    next_tool: Rc<Cell<i32>>,
    next_menu_item: Rc<Cell<i32>>,
}

impl Default for ContributionIds {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_ID_BASE, DEFAULT_MENU_ID_BASE)
    }
}

impl ContributionIds {
    pub fn new(tool_base: i32, menu_base: i32) -> Self {
        Self {
            next_tool: Rc::new(Cell::new(tool_base)),
            next_menu_item: Rc::new(Cell::new(menu_base)),
        }
    }

    pub fn next_tool_id(&self) -> ToolId {
        let id = self.next_tool.get();
        self.next_tool.set(id + 1);
        ToolId(id)
    }

    pub fn next_menu_item_id(&self) -> MenuItemId {
        let id = self.next_menu_item.get();
        self.next_menu_item.set(id + 1);
        MenuItemId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToolKind {
    #[default]
    Normal,
    /// Two-state tool; `toggled` tracks its state.
    Check,
}

/// Icon references (file paths or inline SVG) for a toolbar tool.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolIcons {
    pub normal: Option<String>,
    pub rollover: Option<String>,
    pub toggled: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub label: String,
    pub short_help: String,
    pub long_help: String,
    pub icons: ToolIcons,
    pub kind: ToolKind,
    /// Preferred slot on the toolbar; negative appends.
    pub position: i32,
}

impl ToolSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            short_help: String::new(),
            long_help: String::new(),
            icons: ToolIcons::default(),
            kind: ToolKind::Normal,
            position: -1,
        }
    }

    pub fn with_kind(mut self, kind: ToolKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_short_help(mut self, help: impl Into<String>) -> Self {
        self.short_help = help.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icons.normal = Some(icon.into());
        self
    }

    pub fn at_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSpec {
    pub label: String,
    /// Target menu; `None` is the chart context menu.
    pub menu: Option<String>,
}

impl MenuSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), menu: None }
    }

    pub fn in_menu(mut self, menu: impl Into<String>) -> Self {
        self.menu = Some(menu.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolbarToolRecord {
    pub id: ToolId,
    pub owner: PluginId,
    pub spec: ToolSpec,
    pub visible: bool,
    pub toggled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItemRecord {
    pub id: MenuItemId,
    pub owner: PluginId,
    pub spec: MenuSpec,
    pub visible: bool,
    pub greyed: bool,
}

/// Toolbar tools and context-menu items contributed by plugins.
///
/// Owners are recorded by [`PluginId`] only; the plugin registry removes a
/// plugin's contributions with [`UiContributionRegistry::remove_owned_by`]
/// when it deactivates or unloads that plugin.
#[derive(Debug, Default)]
pub struct UiContributionRegistry {
    ids: ContributionIds,
    tools: Vec<ToolbarToolRecord>,
    menu_items: Vec<MenuItemRecord>,
}

impl UiContributionRegistry {
    pub fn new(tool_base: i32, menu_base: i32) -> Self {
        Self { ids: ContributionIds::new(tool_base, menu_base), ..Self::default() }
    }

    /// A handle sharing this registry's id counters.
    pub fn ids(&self) -> ContributionIds {
        self.ids.clone()
    }

    pub fn add_toolbar_tool(&mut self, owner: PluginId, spec: ToolSpec) -> ToolId {
        let id = self.ids.next_tool_id();
        self.tools.push(ToolbarToolRecord { id, owner, spec, visible: true, toggled: false });
        log::debug!("Plugin {} added toolbar tool {}", owner, id);
        id
    }

    /// Inserts a tool whose id was allocated ahead of time.
    pub fn insert_toolbar_tool(&mut self, id: ToolId, owner: PluginId, spec: ToolSpec) -> Result<(), UiBridgeError> {
        if self.tools.iter().any(|t| t.id == id) {
            return Err(UiBridgeError::DuplicateId(id.0));
        }
        self.tools.push(ToolbarToolRecord { id, owner, spec, visible: true, toggled: false });
        log::debug!("Plugin {} added toolbar tool {}", owner, id);
        Ok(())
    }

    pub fn remove_toolbar_tool(&mut self, id: ToolId) -> Result<ToolbarToolRecord, UiBridgeError> {
        let index = self.tool_index(id)?;
        Ok(self.tools.remove(index))
    }

    pub fn set_toolbar_tool_viz(&mut self, id: ToolId, visible: bool) -> Result<(), UiBridgeError> {
        self.tool_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn set_toolbar_item_state(&mut self, id: ToolId, toggled: bool) -> Result<(), UiBridgeError> {
        self.tool_mut(id)?.toggled = toggled;
        Ok(())
    }

    pub fn set_toolbar_item_icons(&mut self, id: ToolId, icons: ToolIcons) -> Result<(), UiBridgeError> {
        self.tool_mut(id)?.spec.icons = icons;
        Ok(())
    }

    pub fn add_context_menu_item(&mut self, owner: PluginId, spec: MenuSpec) -> MenuItemId {
        let id = self.ids.next_menu_item_id();
        self.menu_items.push(MenuItemRecord { id, owner, spec, visible: true, greyed: false });
        log::debug!("Plugin {} added context menu item {}", owner, id);
        id
    }

    pub fn insert_context_menu_item(
        &mut self,
        id: MenuItemId,
        owner: PluginId,
        spec: MenuSpec,
    ) -> Result<(), UiBridgeError> {
        if self.menu_items.iter().any(|m| m.id == id) {
            return Err(UiBridgeError::DuplicateId(id.0));
        }
        self.menu_items.push(MenuItemRecord { id, owner, spec, visible: true, greyed: false });
        log::debug!("Plugin {} added context menu item {}", owner, id);
        Ok(())
    }

    pub fn remove_context_menu_item(&mut self, id: MenuItemId) -> Result<MenuItemRecord, UiBridgeError> {
        let index = self.menu_index(id)?;
        Ok(self.menu_items.remove(index))
    }

    pub fn set_context_menu_item_viz(&mut self, id: MenuItemId, visible: bool) -> Result<(), UiBridgeError> {
        self.menu_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn set_context_menu_item_grey(&mut self, id: MenuItemId, greyed: bool) -> Result<(), UiBridgeError> {
        self.menu_mut(id)?.greyed = greyed;
        Ok(())
    }

    pub fn find_tool_owner(&self, id: ToolId) -> Result<PluginId, UiBridgeError> {
        self.tool(id).map(|t| t.owner)
    }

    pub fn find_menu_owner(&self, id: MenuItemId) -> Result<PluginId, UiBridgeError> {
        self.menu_item(id).map(|m| m.owner)
    }

    pub fn tool(&self, id: ToolId) -> Result<&ToolbarToolRecord, UiBridgeError> {
        self.tools.iter().find(|t| t.id == id).ok_or(UiBridgeError::UnknownTool(id))
    }

    pub fn menu_item(&self, id: MenuItemId) -> Result<&MenuItemRecord, UiBridgeError> {
        self.menu_items
            .iter()
            .find(|m| m.id == id)
            .ok_or(UiBridgeError::UnknownMenuItem(id))
    }

    /// Drops every contribution owned by `owner`. Returns how many were removed.
    pub fn remove_owned_by(&mut self, owner: PluginId) -> usize {
        let before = self.tools.len() + self.menu_items.len();
        self.tools.retain(|t| t.owner != owner);
        self.menu_items.retain(|m| m.owner != owner);
        let removed = before - self.tools.len() - self.menu_items.len();
        if removed > 0 {
            log::debug!("Removed {} UI contribution(s) of plugin {}", removed, owner);
        }
        removed
    }

    pub fn tools(&self) -> &[ToolbarToolRecord] {
        &self.tools
    }

    pub fn menu_items(&self) -> &[MenuItemRecord] {
        &self.menu_items
    }

    /// Visible tools in display order: tools with a position hint first,
    /// sorted by hint, then the rest in insertion order.
    pub fn toolbar_layout(&self) -> Vec<&ToolbarToolRecord> {
        let mut visible: Vec<&ToolbarToolRecord> = self.tools.iter().filter(|t| t.visible).collect();
        visible.sort_by_key(|t| if t.spec.position < 0 { (1, 0) } else { (0, t.spec.position) });
        visible
    }

    fn tool_index(&self, id: ToolId) -> Result<usize, UiBridgeError> {
        self.tools.iter().position(|t| t.id == id).ok_or(UiBridgeError::UnknownTool(id))
    }

    fn menu_index(&self, id: MenuItemId) -> Result<usize, UiBridgeError> {
        self.menu_items
            .iter()
            .position(|m| m.id == id)
            .ok_or(UiBridgeError::UnknownMenuItem(id))
    }

    fn tool_mut(&mut self, id: ToolId) -> Result<&mut ToolbarToolRecord, UiBridgeError> {
        self.tools.iter_mut().find(|t| t.id == id).ok_or(UiBridgeError::UnknownTool(id))
    }

    fn menu_mut(&mut self, id: MenuItemId) -> Result<&mut MenuItemRecord, UiBridgeError> {
        self.menu_items
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(UiBridgeError::UnknownMenuItem(id))
    }
}
