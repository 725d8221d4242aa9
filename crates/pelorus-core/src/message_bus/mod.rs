//! # Pelorus Message Bus
//!
//! Publish/subscribe on string message ids with JSON payloads. Host code
//! subscribes with a callback; plugins subscribe by id and are reached
//! through a [`PluginSink`] supplied at publish time. Delivery is synchronous
//! and follows subscription order. Nothing is queued or replayed.
use std::fmt;

use serde_json::Value;

use crate::plugin_system::PluginId;
use crate::plugin_system::error::PluginSystemError;

/// Handle returned by the subscribe calls, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

pub type HostCallback = Box<dyn FnMut(&str, &Value)>;

/// Routes a message to a plugin subscriber.
pub trait PluginSink {
    /// Returns `Ok(false)` when the plugin is currently not eligible.
    fn deliver(&mut self, plugin: PluginId, message_id: &str, payload: &Value) -> Result<bool, PluginSystemError>;
}

enum Target {
    Host(HostCallback),
    Plugin(PluginId),
}

struct Subscription {
    id: SubscriptionId,
    message_id: String,
    target: Target,
}

/// Result of one publish.
#[derive(Debug, Default)]
pub struct PublishReport {
    pub host_deliveries: usize,
    pub plugin_deliveries: Vec<PluginId>,
    pub failures: Vec<(PluginId, PluginSystemError)>,
}

impl PublishReport {
    pub fn total(&self) -> usize {
        self.host_deliveries + self.plugin_deliveries.len()
    }
}

pub struct MessageBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self { subscriptions: Vec::new(), next_id: 1 }
    }

    fn allocate(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn subscribe_host(&mut self, message_id: impl Into<String>, callback: HostCallback) -> SubscriptionId {
        let id = self.allocate();
        self.subscriptions.push(Subscription { id, message_id: message_id.into(), target: Target::Host(callback) });
        id
    }

    /// Subscribing the same plugin twice to one id returns the existing
    /// subscription.
    pub fn subscribe_plugin(&mut self, message_id: impl Into<String>, plugin: PluginId) -> SubscriptionId {
        let message_id = message_id.into();
        let existing = self
            .subscriptions
            .iter()
            .find(|s| s.message_id == message_id && matches!(s.target, Target::Plugin(p) if p == plugin));
        if let Some(existing) = existing {
            return existing.id;
        }
        let id = self.allocate();
        log::debug!("Plugin {} subscribed to message '{}'", plugin, message_id);
        self.subscriptions.push(Subscription { id, message_id, target: Target::Plugin(plugin) });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() < before
    }

    /// Drop one plugin subscription by message id.
    pub fn unsubscribe_plugin_from(&mut self, plugin: PluginId, message_id: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|s| !(s.message_id == message_id && matches!(s.target, Target::Plugin(p) if p == plugin)));
        self.subscriptions.len() < before
    }

    /// Drop every subscription of `plugin`. Returns how many were removed.
    pub fn unsubscribe_plugin(&mut self, plugin: PluginId) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| !matches!(s.target, Target::Plugin(p) if p == plugin));
        before - self.subscriptions.len()
    }

    pub fn subscriber_count(&self, message_id: &str) -> usize {
        self.subscriptions.iter().filter(|s| s.message_id == message_id).count()
    }

    pub fn has_plugin_subscriptions(&self, plugin: PluginId) -> bool {
        self.subscriptions.iter().any(|s| matches!(s.target, Target::Plugin(p) if p == plugin))
    }

    pub fn is_plugin_subscribed(&self, plugin: PluginId, message_id: &str) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.message_id == message_id && matches!(s.target, Target::Plugin(p) if p == plugin))
    }

    /// Plugins holding at least one subscription, without duplicates.
    pub fn subscribed_plugins(&self) -> Vec<PluginId> {
        let mut plugins: Vec<PluginId> = Vec::new();
        for subscription in &self.subscriptions {
            if let Target::Plugin(p) = subscription.target {
                if !plugins.contains(&p) {
                    plugins.push(p);
                }
            }
        }
        plugins
    }

    /// Deliver to every subscriber of `message_id` in subscription order. A
    /// failing plugin delivery is recorded and the rest still run.
    pub fn publish(&mut self, message_id: &str, payload: &Value, sink: &mut dyn PluginSink) -> PublishReport {
        let mut report = PublishReport::default();
        for subscription in self.subscriptions.iter_mut().filter(|s| s.message_id == message_id) {
            match &mut subscription.target {
                Target::Host(callback) => {
                    callback(message_id, payload);
                    report.host_deliveries += 1;
                }
                Target::Plugin(plugin) => match sink.deliver(*plugin, message_id, payload) {
                    Ok(true) => report.plugin_deliveries.push(*plugin),
                    Ok(false) => log::trace!("Plugin {} skipped for message '{}'", plugin, message_id),
                    Err(e) => {
                        log::warn!("Delivering message '{}' to plugin {} failed: {}", message_id, plugin, e);
                        report.failures.push((*plugin, e));
                    }
                },
            }
        }
        report
    }
}
