use std::fmt;

use crate::executor::TaskPriority;

/// Events produced by the host and delivered to plugin listeners.
///
/// Every event has a conventional listener name. If freshly loaded plugin
/// code exposes a callback under that name it is registered automatically
/// when the plugin becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginEvent {
    GeneralInfo,
    UserInfo,
    ServerStartup,
    ServerStop,
    PlayerJoin,
    PlayerLeft,
    PluginLoad,
    PluginUnload,
    McdrStop,
}

impl PluginEvent {
    pub const ALL: [PluginEvent; 9] = [
        PluginEvent::GeneralInfo,
        PluginEvent::UserInfo,
        PluginEvent::ServerStartup,
        PluginEvent::ServerStop,
        PluginEvent::PlayerJoin,
        PluginEvent::PlayerLeft,
        PluginEvent::PluginLoad,
        PluginEvent::PluginUnload,
        PluginEvent::McdrStop,
    ];

    /// Stable identifier
    pub fn id(&self) -> &'static str {
        match self {
            PluginEvent::GeneralInfo => "mcdr.general_info",
            PluginEvent::UserInfo => "mcdr.user_info",
            PluginEvent::ServerStartup => "mcdr.server_startup",
            PluginEvent::ServerStop => "mcdr.server_stop",
            PluginEvent::PlayerJoin => "mcdr.player_joined",
            PluginEvent::PlayerLeft => "mcdr.player_left",
            PluginEvent::PluginLoad => "mcdr.plugin_loaded",
            PluginEvent::PluginUnload => "mcdr.plugin_unloaded",
            PluginEvent::McdrStop => "mcdr.mcdr_stop",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PluginEvent::GeneralInfo => "General info",
            PluginEvent::UserInfo => "User info",
            PluginEvent::ServerStartup => "Server startup",
            PluginEvent::ServerStop => "Server stop",
            PluginEvent::PlayerJoin => "Player joined",
            PluginEvent::PlayerLeft => "Player left",
            PluginEvent::PluginLoad => "Plugin loaded",
            PluginEvent::PluginUnload => "Plugin unloaded",
            PluginEvent::McdrStop => "MCDR stop",
        }
    }

    /// Conventional callback name looked up on loaded code
    pub fn default_listener_name(&self) -> Option<&'static str> {
        Some(match self {
            PluginEvent::GeneralInfo => "on_info",
            PluginEvent::UserInfo => "on_user_info",
            PluginEvent::ServerStartup => "on_server_startup",
            PluginEvent::ServerStop => "on_server_stop",
            PluginEvent::PlayerJoin => "on_player_joined",
            PluginEvent::PlayerLeft => "on_player_left",
            PluginEvent::PluginLoad => "on_load",
            PluginEvent::PluginUnload => "on_unload",
            PluginEvent::McdrStop => "on_mcdr_stop",
        })
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.id() == id)
    }

    /// Info events are the high-volume ones coming from server output and
    /// the console; they queue behind regular work.
    pub fn task_priority(&self) -> TaskPriority {
        match self {
            PluginEvent::GeneralInfo | PluginEvent::UserInfo => TaskPriority::Info,
            _ => TaskPriority::Regular,
        }
    }
}

impl fmt::Display for PluginEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginEvent[{}]", self.id())
    }
}

/// Payload passed to listeners
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventArgs {
    #[default]
    None,
    /// A line of server output or console input
    Info {
        content: String,
        player: Option<String>,
    },
    Player {
        name: String,
    },
    ServerStop {
        return_code: Option<i32>,
    },
}

impl EventArgs {
    pub fn info(content: impl Into<String>) -> Self {
        EventArgs::Info {
            content: content.into(),
            player: None,
        }
    }

    pub fn player(name: impl Into<String>) -> Self {
        EventArgs::Player { name: name.into() }
    }

    /// The info content, if this payload carries one
    pub fn content(&self) -> Option<&str> {
        match self {
            EventArgs::Info { content, .. } => Some(content),
            _ => None,
        }
    }
}
