mod console;
mod logging;
mod server;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use mcdr_core::executor::{OverflowPolicy, WorkerPoolConfig};
use mcdr_core::kernel::constants;
use mcdr_core::plugin_system::PluginManagerConfig;
use mcdr_core::{CoreConfig, EventArgs, LanguageTable, LibraryCodeLoader, PluginEvent, PluginManager, WorkerPool};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use console::{ConsoleInput, Flow};
use server::{ServerExit, ServerProcess};

const SERVER_STOP_GRACE: Duration = Duration::from_secs(30);
const POOL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// MCDR: Minecraft server supervisor with hot-reloadable plugins
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Configuration file (json, yaml or toml)
    #[arg(long, default_value = constants::CONFIG_FILE)]
    config: PathBuf,

    /// Print "pong" and exit
    #[arg(long)]
    ping: bool,

    /// Manage plugins only, do not start the server process
    #[arg(long)]
    no_server: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    if args.ping {
        println!("pong");
        return ExitCode::SUCCESS;
    }

    let config = match CoreConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init(config.debug.values().any(|enabled| *enabled));

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs, config: CoreConfig) -> mcdr_core::Result<()> {
    info!("{} {} starting", constants::DISPLAY_NAME, constants::VERSION);

    let pool = WorkerPool::new(WorkerPoolConfig {
        size: config.worker_pool_size,
        poll_interval: config.worker_poll_interval(),
        overflow: OverflowPolicy::default(),
        debug: config.debug_options(),
    })?;
    let manager = Arc::new(PluginManager::new(
        PluginManagerConfig::from(&config),
        Arc::new(LibraryCodeLoader::new()),
        Arc::new(pool),
        Arc::new(LanguageTable::for_language(&config.language)),
    ));

    let loader = Arc::clone(&manager);
    blocking(move || loader.refresh_all()).await?;

    let mut server: Option<ServerProcess> = None;
    let mut server_exit: Option<ServerExit> = None;
    if args.no_server || config.server.command.is_empty() {
        info!("{}", manager.translator().tr("server.not_configured", &[]));
    } else {
        match ServerProcess::start(&config.server, Arc::clone(&manager)) {
            Ok((process, exit)) => {
                server = Some(process);
                server_exit = Some(exit);
            }
            Err(e) => error!("Failed to start server {:?}: {}", config.server.command, e),
        }
    }

    let mut lines = spawn_console_reader();
    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => match console::parse_line(&line) {
                    ConsoleInput::Command(command) => {
                        let target = Arc::clone(&manager);
                        if blocking(move || console::execute(&target, &command)).await? == Flow::Stop {
                            break;
                        }
                    }
                    ConsoleInput::Text(text) => {
                        if let Some(process) = server.as_mut() {
                            if let Err(e) = process.send_line(&text).await {
                                warn!("Failed to forward input to the server: {}", e);
                            }
                        }
                        manager.dispatch_event(PluginEvent::UserInfo, &EventArgs::info(text))?;
                    }
                },
                None => break,
            },
            code = wait_server(&mut server_exit) => {
                info!("{}", manager.translator().tr("server.stopped", &[&describe_code(code)]));
                server = None;
                server_exit = None;
                manager.dispatch_event(PluginEvent::ServerStop, &EventArgs::ServerStop { return_code: code })?;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if let (Some(process), Some(exit)) = (server.take(), server_exit.take()) {
        let code = process.stop(exit, SERVER_STOP_GRACE).await;
        info!("{}", manager.translator().tr("server.stopped", &[&describe_code(code)]));
        manager.dispatch_event(PluginEvent::ServerStop, &EventArgs::ServerStop { return_code: code })?;
    }

    manager.dispatch_event(PluginEvent::McdrStop, &EventArgs::None)?;
    let unloader = Arc::clone(&manager);
    blocking(move || unloader.unload_all()).await?;
    manager.worker_pool().shutdown(POOL_SHUTDOWN_TIMEOUT)?;
    info!("{} stopped", constants::DISPLAY_NAME);
    Ok(())
}

/// Read stdin on a plain thread. A blocking read cannot be cancelled, and
/// on the runtime's blocking pool it would hold up shutdown.
fn spawn_console_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    let spawned = std::thread::Builder::new().name("console".to_string()).spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read console input: {}", e);
                    break;
                }
            }
        }
    });
    if let Err(e) = spawned {
        error!("Failed to start console reader: {}", e);
    }
    rx
}

fn describe_code(code: Option<i32>) -> String {
    code.map_or_else(|| "-".to_string(), |c| c.to_string())
}

/// Wait for the server to exit, or forever when there is none
async fn wait_server(exit: &mut Option<ServerExit>) -> Option<i32> {
    match exit.as_mut() {
        Some(rx) => rx.await.ok().flatten(),
        None => std::future::pending().await,
    }
}

/// Run plugin manager work off the async runtime
async fn blocking<T, F>(f: F) -> mcdr_core::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| mcdr_core::Error::Other(format!("Blocking task failed: {}", e)))
}
