//! # Plugin Registries
//!
//! Every plugin unit owns a [`PluginRegistry`] holding its event listeners
//! and help entries. It is rebuilt from scratch on each load and reload.
//! After every batch the manager merges the registries of all READY units
//! into one [`ManagerRegistry`], which is what the command layer consumes.
use std::collections::HashMap;
use std::fmt;

use crate::event::PluginEvent;
use crate::kernel::constants;
use crate::plugin_system::traits::Listener;
use crate::translation::Translator;

pub const DEFAULT_LISTENER_PRIORITY: i32 = 1000;
/// Permission floor of the host's own help entry
pub const MCDR_CONTROL_LEVEL: u32 = 3;

#[derive(Clone)]
pub struct ListenerEntry {
    pub plugin_id: String,
    pub callback: Listener,
    /// Lower runs first
    pub priority: i32,
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("plugin_id", &self.plugin_id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpMessage {
    /// `None` for the host's own entry
    pub plugin_id: Option<String>,
    pub prefix: String,
    pub message: String,
    pub permission: u32,
}

impl HelpMessage {
    // Case-insensitive on the first letter only
    fn sort_key(&self) -> String {
        let mut chars = self.prefix.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugin_id: String,
    listeners: HashMap<PluginEvent, Vec<ListenerEntry>>,
    help_messages: Vec<HelpMessage>,
}

impl PluginRegistry {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            ..Self::default()
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn register_listener(&mut self, event: PluginEvent, callback: Listener) {
        self.register_listener_with_priority(event, callback, DEFAULT_LISTENER_PRIORITY);
    }

    pub fn register_listener_with_priority(&mut self, event: PluginEvent, callback: Listener, priority: i32) {
        self.listeners.entry(event).or_default().push(ListenerEntry {
            plugin_id: self.plugin_id.clone(),
            callback,
            priority,
        });
    }

    pub fn register_help_message(&mut self, prefix: impl Into<String>, message: impl Into<String>, permission: u32) {
        self.help_messages.push(HelpMessage {
            plugin_id: Some(self.plugin_id.clone()),
            prefix: prefix.into(),
            message: message.into(),
            permission,
        });
    }

    /// Listeners for `event` in registration order
    pub fn listeners(&self, event: PluginEvent) -> &[ListenerEntry] {
        self.listeners.get(&event).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn help_messages(&self) -> &[HelpMessage] {
        &self.help_messages
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.help_messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
        self.help_messages.clear();
    }

    /// Replace every callback, e.g. to tie it to the library it came from
    pub(crate) fn map_listeners(&mut self, f: impl Fn(Listener) -> Listener) {
        for entries in self.listeners.values_mut() {
            for entry in entries.iter_mut() {
                entry.callback = f(entry.callback.clone());
            }
        }
    }
}

/// Union of every READY plugin's registry
#[derive(Debug, Default)]
pub struct ManagerRegistry {
    listeners: HashMap<PluginEvent, Vec<ListenerEntry>>,
    help_messages: Vec<HelpMessage>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
        self.help_messages.clear();
    }

    pub fn collect(&mut self, registry: &PluginRegistry) {
        for (event, entries) in &registry.listeners {
            self.listeners.entry(*event).or_default().extend(entries.iter().cloned());
        }
        self.help_messages.extend(registry.help_messages.iter().cloned());
    }

    /// Add the host help entry and sort everything into display order
    pub fn arrange(&mut self, translator: &dyn Translator) {
        self.help_messages.push(HelpMessage {
            plugin_id: None,
            prefix: constants::COMMAND_PREFIX.to_string(),
            message: translator.tr("plugin_registry.mcdr_help_message", &[]),
            permission: MCDR_CONTROL_LEVEL,
        });
        self.help_messages.sort_by_cached_key(HelpMessage::sort_key);
        for entries in self.listeners.values_mut() {
            // Stable, so registration order survives within one priority
            entries.sort_by_key(|e| e.priority);
        }
    }

    pub fn listeners(&self, event: PluginEvent) -> &[ListenerEntry] {
        self.listeners.get(&event).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn help_messages(&self) -> &[HelpMessage] {
        &self.help_messages
    }
}
