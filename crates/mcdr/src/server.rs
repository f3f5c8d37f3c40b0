//! Child server process supervision.
//!
//! Each line the server prints is echoed and dispatched to plugins as a
//! GENERAL_INFO event. A waiter task owns the child and reports its exit
//! code once.
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use mcdr_core::config::ServerConfig;
use mcdr_core::logging::{DebugOption, TARGET_SERVER};
use mcdr_core::{EventArgs, PluginEvent, PluginManager};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Exit code of the server, `None` if it was killed by a signal
pub type ServerExit = oneshot::Receiver<Option<i32>>;

pub struct ServerProcess {
    stdin: Option<ChildStdin>,
    kill: Option<oneshot::Sender<()>>,
}

impl ServerProcess {
    /// Spawn the configured command. Fires SERVER_STARTUP once it is running.
    pub fn start(config: &ServerConfig, manager: Arc<PluginManager>) -> io::Result<(Self, ServerExit)> {
        let Some((program, args)) = config.command.split_first() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty server command"));
        };
        if manager.config().debug.should_log(DebugOption::Process) {
            debug!(
                target: TARGET_SERVER,
                "Starting server {:?} in {}",
                config.command,
                config.working_directory.display()
            );
        }
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&config.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id().unwrap_or_default();
        info!(target: TARGET_SERVER, "{}", manager.translator().tr("server.started", &[&pid]));

        let stdin = child.stdin.take();
        if let Some(stdout) = child.stdout.take() {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => {
                            println!("{}", line);
                            if let Err(e) = manager.dispatch_event(PluginEvent::GeneralInfo, &EventArgs::info(line)) {
                                error!(target: TARGET_SERVER, "Failed to dispatch server output: {}", e);
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            // Non UTF-8 output ends the reader but not the server
                            warn!(target: TARGET_SERVER, "Stopped reading server output: {}", e);
                            break;
                        }
                    }
                }
            });
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(wait_for_exit(child, kill_rx, exit_tx));

        if let Err(e) = manager.dispatch_event(PluginEvent::ServerStartup, &EventArgs::None) {
            error!(target: TARGET_SERVER, "Failed to dispatch server startup: {}", e);
        }
        Ok((
            Self {
                stdin,
                kill: Some(kill_tx),
            },
            exit_rx,
        ))
    }

    /// Write one line to the server's stdin
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "server stdin is closed"))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await
    }

    /// Ask the server to stop, killing it if it has not exited within `grace`
    pub async fn stop(mut self, exit: ServerExit, grace: Duration) -> Option<i32> {
        if let Err(e) = self.send_line("stop").await {
            warn!(target: TARGET_SERVER, "Failed to send stop command: {}", e);
        }
        self.stdin = None;
        let mut exit = exit;
        match tokio::time::timeout(grace, &mut exit).await {
            Ok(code) => code.ok().flatten(),
            Err(_) => {
                warn!(target: TARGET_SERVER, "Server did not stop within {:?}, killing it", grace);
                if let Some(kill) = self.kill.take() {
                    let _ = kill.send(());
                }
                exit.await.ok().flatten()
            }
        }
    }
}

async fn wait_for_exit(mut child: Child, kill: oneshot::Receiver<()>, exit: oneshot::Sender<Option<i32>>) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill => {
            if let Err(e) = child.kill().await {
                error!(target: TARGET_SERVER, "Failed to kill server: {}", e);
            }
            child.wait().await
        }
    };
    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            error!(target: TARGET_SERVER, "Failed to wait for server: {}", e);
            None
        }
    };
    let _ = exit.send(code);
}
