use crate::client::remote::RootDatabase;
use crate::config::Config;
use crate::error::FlagsError;
use crate::service::handshake::{ServiceBootstrap, generate_token, parse_ready_line};
use crate::utils::shell;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

/// How long a released service gets to exit on stdin EOF before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Lifecycle of the privileged connection. Rebuilt on every process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    Uninitialized,
    Connecting,
    Ready,
}

struct Live {
    generation: u64,
    db: RootDatabase,
    pid: Option<u32>,
    // Dropping the sender releases the service.
    _release: oneshot::Sender<()>,
}

struct Shared {
    state: watch::Sender<InitializationState>,
    live: Mutex<Option<Live>>,
}

impl Shared {
    fn live(&self) -> MutexGuard<'_, Option<Live>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Disconnect callback: only the connection that died is torn down.
    fn on_service_exit(&self, generation: u64) {
        let mut live = self.live();
        if live.as_ref().is_some_and(|l| l.generation == generation) {
            *live = None;
            self.state.send_replace(InitializationState::Uninitialized);
            warn!(generation, "Privileged connection lost");
        }
    }
}

/// Holds the state at `Connecting`; falls back to `Uninitialized` unless `Ready` was published.
struct ConnectingGuard<'a> {
    shared: &'a Shared,
    ready: bool,
}

impl<'a> ConnectingGuard<'a> {
    fn enter(shared: &'a Shared) -> Self {
        shared.state.send_replace(InitializationState::Connecting);
        Self {
            shared,
            ready: false,
        }
    }

    fn ready(&mut self) {
        self.ready = true;
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.ready {
            self.shared
                .state
                .send_replace(InitializationState::Uninitialized);
        }
    }
}

struct Launched {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    db: RootDatabase,
}

/// Owns the single privileged connection of this process.
///
/// `connect` launches the service through the configured root command and
/// publishes a [`RootDatabase`]; a watcher on the child process moves the
/// state back to `Uninitialized` when the service dies. There is no automatic
/// reconnection.
pub struct RootConnector {
    cfg: Config,
    shared: Arc<Shared>,
    connect_lock: tokio::sync::Mutex<()>,
    next_generation: AtomicU64,
}

impl RootConnector {
    pub fn new(cfg: Config) -> Self {
        let (state, _) = watch::channel(InitializationState::Uninitialized);
        Self {
            cfg,
            shared: Arc::new(Shared {
                state,
                live: Mutex::new(None),
            }),
            connect_lock: tokio::sync::Mutex::new(()),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> InitializationState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<InitializationState> {
        self.shared.state.subscribe()
    }

    /// Current remote handle; fails fast unless the connection is ready.
    pub fn database(&self) -> Result<RootDatabase, FlagsError> {
        self.shared
            .live()
            .as_ref()
            .map(|live| live.db.clone())
            .ok_or(FlagsError::ConnectionLost)
    }

    /// Process id of the launched service (the elevation command when one is used).
    pub fn service_pid(&self) -> Option<u32> {
        self.shared.live().as_ref().and_then(|live| live.pid)
    }

    /// Releases the current service, if any.
    pub fn disconnect(&self) {
        let released = self.shared.live().take();
        if let Some(live) = released {
            self.shared
                .state
                .send_replace(InitializationState::Uninitialized);
            info!(generation = live.generation, "Privileged connection released");
        }
    }

    /// Launches and binds the privileged service, replacing any prior connection.
    ///
    /// Dropping the returned future before it resolves kills the half-started
    /// service and leaves the state `Uninitialized`.
    pub async fn connect(&self) -> Result<RootDatabase, FlagsError> {
        let _guard = self.connect_lock.lock().await;

        self.disconnect();
        let mut pending = ConnectingGuard::enter(&self.shared);

        let timeout = self.cfg.root.timeout();
        let launched = match tokio::time::timeout(timeout, self.launch()).await {
            Ok(Ok(launched)) => launched,
            Ok(Err(e)) => {
                warn!(error = %e, "Privileged service failed to start");
                return Err(e);
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Root acquisition timed out");
                return Err(FlagsError::RootDenied(format!(
                    "no response from the privileged service within {}s",
                    timeout.as_secs()
                )));
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (release_tx, release_rx) = oneshot::channel();
        let db = launched.db.clone();
        let pid = launched.child.id();

        {
            let mut live = self.shared.live();
            *live = Some(Live {
                generation,
                db: db.clone(),
                pid,
                _release: release_tx,
            });
            self.shared.state.send_replace(InitializationState::Ready);
            pending.ready();
        }

        spawn_watcher(self.shared.clone(), generation, launched, release_rx);
        info!(generation, pid, url = %db.base_url(), "Privileged connection ready");
        Ok(db)
    }

    async fn launch(&self) -> Result<Launched, FlagsError> {
        let token = generate_token();
        let bootstrap = ServiceBootstrap::from_config(&self.cfg, token.clone());

        let mut child = self.service_command()?.spawn().map_err(|e| {
            FlagsError::RootDenied(format!("failed to launch privileged service: {e}"))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| FlagsError::RootDenied("service stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FlagsError::RootDenied("service stdout unavailable".to_string()))?;

        let mut line = serde_json::to_string(&bootstrap)?;
        line.push('\n');
        // A closed pipe here means the elevation command already gave up.
        if let Err(e) = write_line(&mut stdin, &line).await {
            let status = child.wait().await.ok();
            return Err(FlagsError::RootDenied(format!(
                "privileged service refused bootstrap ({e}; exit: {status:?})"
            )));
        }

        let mut stdout = BufReader::new(stdout).lines();
        let addr = loop {
            match stdout.next_line().await? {
                Some(line) => match parse_ready_line(&line) {
                    Some(addr) => break addr,
                    None => debug!(line = %line, "Ignoring output before READY"),
                },
                None => {
                    let status = child.wait().await.ok();
                    return Err(FlagsError::RootDenied(format!(
                        "privileged service exited before it was ready (exit: {status:?})"
                    )));
                }
            }
        };

        let db = RootDatabase::new(addr, Arc::from(token))?;
        let health = db
            .health()
            .await
            .map_err(|e| FlagsError::RootDenied(format!("health probe failed: {e}")))?;
        debug!(%addr, service_pid = health.pid, "Privileged service answered health probe");

        Ok(Launched {
            child,
            stdin,
            stdout,
            db,
        })
    }

    fn service_command(&self) -> Result<Command, FlagsError> {
        let binary = match &self.cfg.root.service_binary {
            Some(path) => path.clone(),
            None => std::env::current_exe()?,
        };

        let mut command = match self.cfg.root.elevate_command.split_first() {
            Some((program, args)) => {
                let mut command = Command::new(program);
                command
                    .args(args)
                    .arg(shell::command_line(&binary, &["serve"]));
                command
            }
            None => {
                let mut command = Command::new(&binary);
                command.arg("serve");
                command
            }
        };

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        Ok(command)
    }
}

impl Drop for RootConnector {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

fn spawn_watcher(
    shared: Arc<Shared>,
    generation: u64,
    launched: Launched,
    release: oneshot::Receiver<()>,
) {
    let Launched {
        mut child,
        stdin,
        stdout,
        ..
    } = launched;

    tokio::spawn(async move {
        // Held so the service keeps its stdout open; nothing is read after READY.
        let _stdout = stdout;

        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = release => None,
        };

        match exited {
            Some(status) => {
                match status {
                    Ok(status) => warn!(generation, %status, "Privileged service exited"),
                    Err(e) => warn!(generation, error = %e, "Privileged service wait failed"),
                }
                shared.on_service_exit(generation);
            }
            None => {
                // EOF on stdin is the shutdown request; a root child behind `su`
                // cannot be signalled from here.
                drop(stdin);
                if tokio::time::timeout(SHUTDOWN_GRACE, child.wait())
                    .await
                    .is_err()
                {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
                debug!(generation, "Privileged service released");
            }
        }
    });
}
