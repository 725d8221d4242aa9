//! Host services available to a plugin while one of its entry points runs.
//!
//! Plugins never touch the registry, the UI registry or the bus directly.
//! Everything they ask for is queued as a [`HostRequest`] and applied by the
//! host after the current dispatch pass, in the order it was asked for.
use std::collections::VecDeque;

use serde_json::Value;

use crate::plugin_system::PluginId;
use crate::ui_bridge::{ContributionIds, MenuItemId, MenuSpec, ToolIcons, ToolId, ToolSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    AddToolbarTool { owner: PluginId, id: ToolId, spec: ToolSpec },
    RemoveToolbarTool { owner: PluginId, id: ToolId },
    SetToolbarToolViz { owner: PluginId, id: ToolId, visible: bool },
    SetToolbarItemState { owner: PluginId, id: ToolId, toggled: bool },
    SetToolbarItemIcons { owner: PluginId, id: ToolId, icons: ToolIcons },
    AddContextMenuItem { owner: PluginId, id: MenuItemId, spec: MenuSpec },
    RemoveContextMenuItem { owner: PluginId, id: MenuItemId },
    SetContextMenuItemViz { owner: PluginId, id: MenuItemId, visible: bool },
    SetContextMenuItemGrey { owner: PluginId, id: MenuItemId, greyed: bool },
    Subscribe { owner: PluginId, message_id: String },
    Unsubscribe { owner: PluginId, message_id: String },
    SendMessage { owner: PluginId, message_id: String, payload: Value },
    /// The plugin asks to be switched off once the pass is over.
    Deactivate { owner: PluginId },
}

impl HostRequest {
    pub fn owner(&self) -> PluginId {
        match self {
            HostRequest::AddToolbarTool { owner, .. }
            | HostRequest::RemoveToolbarTool { owner, .. }
            | HostRequest::SetToolbarToolViz { owner, .. }
            | HostRequest::SetToolbarItemState { owner, .. }
            | HostRequest::SetToolbarItemIcons { owner, .. }
            | HostRequest::AddContextMenuItem { owner, .. }
            | HostRequest::RemoveContextMenuItem { owner, .. }
            | HostRequest::SetContextMenuItemViz { owner, .. }
            | HostRequest::SetContextMenuItemGrey { owner, .. }
            | HostRequest::Subscribe { owner, .. }
            | HostRequest::Unsubscribe { owner, .. }
            | HostRequest::SendMessage { owner, .. }
            | HostRequest::Deactivate { owner } => *owner,
        }
    }
}

/// Per-host scratch state shared by every plugin call: id counters and the
/// request queue.
#[derive(Debug, Default)]
pub struct SessionState {
    ids: ContributionIds,
    requests: VecDeque<HostRequest>,
}

impl SessionState {
    pub fn new(ids: ContributionIds) -> Self {
        Self { ids, requests: VecDeque::new() }
    }

    pub fn set_ids(&mut self, ids: ContributionIds) {
        self.ids = ids;
    }

    pub fn context_for(&mut self, plugin: PluginId) -> HostContext<'_> {
        HostContext { plugin, ids: &self.ids, requests: &mut self.requests }
    }

    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        self.requests.drain(..).collect()
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn discard_requests_from(&mut self, plugin: PluginId) {
        self.requests.retain(|r| r.owner() != plugin);
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

/// Handle passed to every plugin entry point.
pub struct HostContext<'a> {
    plugin: PluginId,
    ids: &'a ContributionIds,
    requests: &'a mut VecDeque<HostRequest>,
}

impl HostContext<'_> {
    pub fn plugin_id(&self) -> PluginId {
        self.plugin
    }

    /// The id is valid immediately; the tool appears once the pass ends.
    pub fn add_toolbar_tool(&mut self, spec: ToolSpec) -> ToolId {
        let id = self.ids.next_tool_id();
        self.push(HostRequest::AddToolbarTool { owner: self.plugin, id, spec });
        id
    }

    pub fn remove_toolbar_tool(&mut self, id: ToolId) {
        self.push(HostRequest::RemoveToolbarTool { owner: self.plugin, id });
    }

    pub fn set_toolbar_tool_viz(&mut self, id: ToolId, visible: bool) {
        self.push(HostRequest::SetToolbarToolViz { owner: self.plugin, id, visible });
    }

    pub fn set_toolbar_item_state(&mut self, id: ToolId, toggled: bool) {
        self.push(HostRequest::SetToolbarItemState { owner: self.plugin, id, toggled });
    }

    pub fn set_toolbar_item_icons(&mut self, id: ToolId, icons: ToolIcons) {
        self.push(HostRequest::SetToolbarItemIcons { owner: self.plugin, id, icons });
    }

    pub fn add_context_menu_item(&mut self, spec: MenuSpec) -> MenuItemId {
        let id = self.ids.next_menu_item_id();
        self.push(HostRequest::AddContextMenuItem { owner: self.plugin, id, spec });
        id
    }

    pub fn remove_context_menu_item(&mut self, id: MenuItemId) {
        self.push(HostRequest::RemoveContextMenuItem { owner: self.plugin, id });
    }

    pub fn set_context_menu_item_viz(&mut self, id: MenuItemId, visible: bool) {
        self.push(HostRequest::SetContextMenuItemViz { owner: self.plugin, id, visible });
    }

    pub fn set_context_menu_item_grey(&mut self, id: MenuItemId, greyed: bool) {
        self.push(HostRequest::SetContextMenuItemGrey { owner: self.plugin, id, greyed });
    }

    pub fn subscribe(&mut self, message_id: impl Into<String>) {
        self.push(HostRequest::Subscribe { owner: self.plugin, message_id: message_id.into() });
    }

    pub fn unsubscribe(&mut self, message_id: impl Into<String>) {
        self.push(HostRequest::Unsubscribe { owner: self.plugin, message_id: message_id.into() });
    }

    pub fn send_message(&mut self, message_id: impl Into<String>, payload: Value) {
        self.push(HostRequest::SendMessage { owner: self.plugin, message_id: message_id.into(), payload });
    }

    pub fn request_deactivation(&mut self) {
        self.push(HostRequest::Deactivate { owner: self.plugin });
    }

    fn push(&mut self, request: HostRequest) {
        log::trace!("Plugin {} queued host request {:?}", self.plugin, request);
        self.requests.push_back(request);
    }
}
