//! Operator console.
//!
//! Lines starting with `!!MCDR` are control commands run against the plugin
//! manager. Anything else is user input for the server.
use std::path::{Path, PathBuf};

use mcdr_core::kernel::constants;
use mcdr_core::{PluginManager, PluginOperationResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    Status,
    Stop,
    ListPlugins,
    /// Reload changed plugin files, load new ones, unload removed ones
    RefreshChanged,
    RefreshAll,
    LoadPlugin(String),
    UnloadPlugin(String),
    ReloadPlugin(String),
    EnablePlugin(String),
    DisablePlugin(String),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(ConsoleCommand),
    /// Forwarded to the server and dispatched as USER_INFO
    Text(String),
}

/// What the main loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub fn parse_line(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    let mut words = trimmed.split_whitespace();
    if words.next() != Some(constants::COMMAND_PREFIX) {
        return ConsoleInput::Text(line.trim_end_matches(['\r', '\n']).to_string());
    }
    let args: Vec<&str> = words.collect();
    let command = match args.as_slice() {
        [] | ["help"] => ConsoleCommand::Help,
        ["status"] => ConsoleCommand::Status,
        ["stop"] => ConsoleCommand::Stop,
        ["plugin", "list"] | ["plg", "list"] => ConsoleCommand::ListPlugins,
        ["reload", "plugin"] | ["r", "plg"] => ConsoleCommand::RefreshChanged,
        ["reload", "all"] | ["r", "all"] => ConsoleCommand::RefreshAll,
        ["plugin" | "plg", "load", path] => ConsoleCommand::LoadPlugin(path.to_string()),
        ["plugin" | "plg", "unload", id] => ConsoleCommand::UnloadPlugin(id.to_string()),
        ["plugin" | "plg", "reload", id] => ConsoleCommand::ReloadPlugin(id.to_string()),
        ["plugin" | "plg", "enable", file] => ConsoleCommand::EnablePlugin(file.to_string()),
        ["plugin" | "plg", "disable", file] => ConsoleCommand::DisablePlugin(file.to_string()),
        _ => ConsoleCommand::Unknown(args.join(" ")),
    };
    ConsoleInput::Command(command)
}

/// A bare file name is looked up in the plugin directories, anything with a
/// directory part is taken as given
fn resolve_plugin_file(manager: &PluginManager, name: &str) -> PathBuf {
    let given = Path::new(name);
    if given.components().count() > 1 {
        return given.to_path_buf();
    }
    manager
        .config()
        .plugin_directories
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| given.to_path_buf())
}

fn print_result(manager: &PluginManager, result: &PluginOperationResult) {
    for (phase, target) in result.failures() {
        println!("  {} failed: {}", phase, target);
    }
    println!("{}", result.summary(manager.translator(), manager.plugin_count()));
}

/// Run one command. Blocking: plugin operations load and unload code.
pub fn execute(manager: &PluginManager, command: &ConsoleCommand) -> Flow {
    let tr = manager.translator();
    match command {
        ConsoleCommand::Help => {
            manager.with_registry(|registry| {
                for help in registry.help_messages() {
                    println!("{}: {}", help.prefix, help.message);
                }
            });
            println!("{} plugin list|load|unload|reload|enable|disable", constants::COMMAND_PREFIX);
            println!("{} reload plugin|all", constants::COMMAND_PREFIX);
            println!("{} status|stop", constants::COMMAND_PREFIX);
        }
        ConsoleCommand::Status => {
            let pool = manager.worker_pool();
            println!("{} {}", constants::DISPLAY_NAME, constants::VERSION);
            println!("Plugins: {}", manager.plugin_count());
            println!(
                "Worker pool: {} workers, {} busy, {} queued",
                pool.max_workers(),
                pool.busy_workers(),
                pool.queued()
            );
            for (worker, owner) in pool.running_units() {
                println!("  {} -> {}", worker, owner.as_deref().unwrap_or("idle"));
            }
            if let Some(summary) = manager.last_operation_summary() {
                println!("Last operation: {}", summary);
            }
        }
        ConsoleCommand::Stop => return Flow::Stop,
        ConsoleCommand::ListPlugins => {
            let descriptions = manager.plugin_descriptions();
            println!("{}", tr.tr("console.plugin_list", &[&descriptions.len(), &descriptions.join(", ")]));
        }
        ConsoleCommand::RefreshChanged => print_result(manager, &manager.refresh_changed()),
        ConsoleCommand::RefreshAll => print_result(manager, &manager.refresh_all()),
        ConsoleCommand::LoadPlugin(path) => {
            let path = resolve_plugin_file(manager, path);
            print_result(manager, &manager.load_plugin(&path));
        }
        ConsoleCommand::UnloadPlugin(id) => match manager.unload_plugin(id) {
            Ok(result) => print_result(manager, &result),
            Err(_) => println!("{}", tr.tr("console.plugin_not_found", &[id])),
        },
        ConsoleCommand::ReloadPlugin(id) => match manager.reload_plugin(id) {
            Ok(result) => print_result(manager, &result),
            Err(_) => println!("{}", tr.tr("console.plugin_not_found", &[id])),
        },
        ConsoleCommand::EnablePlugin(file) => {
            let path = resolve_plugin_file(manager, file);
            match manager.enable_plugin(&path) {
                Ok(result) => print_result(manager, &result),
                Err(e) => println!("{}", e),
            }
        }
        ConsoleCommand::DisablePlugin(file) => {
            let path = resolve_plugin_file(manager, file);
            match manager.disable_plugin(&path) {
                Ok(result) => print_result(manager, &result),
                Err(e) => println!("{}", e),
            }
        }
        ConsoleCommand::Unknown(text) => println!("{}", tr.tr("console.unknown_command", &[text])),
    }
    Flow::Continue
}
