//! The session registry: single owner of every live terminal session.
//!
//! The registry runs as one tokio task with exclusive ownership of the
//! session map. All operations — caller commands and backend event
//! callbacks alike — arrive on one unbounded channel and run to
//! completion one at a time, so no locking is needed and no two
//! callbacks ever interleave. Each backend's event stream is forwarded
//! verbatim to the transport, tagged with the session id, which makes
//! the per-session ordering guarantee fall out of channel FIFO order.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, oneshot};

use tabmux_pty::{Backend, BackendEvent, BackendKind, SpawnConfig};

use crate::proto::HostMessage;
use crate::session::{generate_session_id, Geometry, Session, SessionId};

/// Errors surfaced to a caller of `create`. Every other registry fault
/// is absorbed internally.
#[derive(Debug)]
pub enum RegistryError {
    /// The backend could not be spawned (no executable, permission
    /// denied, no PTY). The session was never registered.
    BackendUnavailable(String),
    /// The registry task has shut down.
    Shutdown,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::BackendUnavailable(msg) => {
                write!(f, "backend unavailable: {msg}")
            }
            RegistryError::Shutdown => write!(f, "registry has shut down"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Process-wide registry configuration, fixed at startup.
pub struct RegistryConfig {
    /// Backend variant for every session (probed once, not per session).
    pub kind: BackendKind,
    /// Shell override and working directory for spawned backends.
    pub spawn: SpawnConfig,
}

enum Command {
    Create {
        geometry: Option<Geometry>,
        announce: bool,
        reply: oneshot::Sender<Result<SessionId, RegistryError>>,
    },
    Write {
        id: SessionId,
        data: Vec<u8>,
    },
    Resize {
        id: SessionId,
        cols: u16,
        rows: u16,
    },
    Close {
        id: SessionId,
    },
    /// Backend event forwarded by a per-session subscription task.
    Backend {
        id: SessionId,
        event: BackendEvent,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable handle for talking to the registry task.
///
/// `write`/`resize`/`close` are fire-and-forget and never suspend: they
/// enqueue onto an unbounded channel and return. Only `create` awaits a
/// response.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RegistryHandle {
    /// Create a session on behalf of the presentation process.
    pub async fn create(&self, geometry: Option<Geometry>) -> Result<SessionId, RegistryError> {
        self.create_inner(geometry, false).await
    }

    /// Create a session proactively on the host's initiative, announcing
    /// it with a `session.created` notification.
    pub async fn create_announced(
        &self,
        geometry: Option<Geometry>,
    ) -> Result<SessionId, RegistryError> {
        self.create_inner(geometry, true).await
    }

    async fn create_inner(
        &self,
        geometry: Option<Geometry>,
        announce: bool,
    ) -> Result<SessionId, RegistryError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Create {
                geometry,
                announce,
                reply,
            })
            .map_err(|_| RegistryError::Shutdown)?;
        response.await.map_err(|_| RegistryError::Shutdown)?
    }

    /// Forward input bytes to a session. Unknown ids are ignored.
    pub fn write(&self, id: &str, data: Vec<u8>) {
        let _ = self.tx.send(Command::Write {
            id: id.to_string(),
            data,
        });
    }

    /// Resize a session. Unknown ids are ignored; last write wins.
    pub fn resize(&self, id: &str, cols: u16, rows: u16) {
        let _ = self.tx.send(Command::Resize {
            id: id.to_string(),
            cols,
            rows,
        });
    }

    /// Close a session. Unknown ids are ignored.
    pub fn close(&self, id: &str) {
        let _ = self.tx.send(Command::Close { id: id.to_string() });
    }

    /// Kill every still-active backend and stop the registry task.
    /// Resolves once the sweep has run; never waits on the backends
    /// themselves.
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();
        if self.tx.send(Command::Shutdown { done }).is_ok() {
            let _ = finished.await;
        }
    }
}

/// Start the registry task. Host-to-presentation notifications are
/// emitted on `events`.
pub fn spawn_registry(
    config: RegistryConfig,
    events: mpsc::UnboundedSender<HostMessage>,
) -> RegistryHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let registry = Registry {
        config,
        events,
        sessions: HashMap::new(),
        closing: HashSet::new(),
        tx: tx.clone(),
    };
    tokio::spawn(registry.run(rx));
    RegistryHandle { tx }
}

struct Registry {
    config: RegistryConfig,
    events: mpsc::UnboundedSender<HostMessage>,
    /// Every id in here has exactly one live backend bound to it.
    sessions: HashMap<SessionId, Session>,
    /// Ids removed by an explicit close, still owed their backend exit.
    closing: HashSet<SessionId>,
    /// Clone of the command sender, handed to per-session forwarders.
    tx: mpsc::UnboundedSender<Command>,
}

impl Registry {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Create {
                    geometry,
                    announce,
                    reply,
                } => {
                    let _ = reply.send(self.handle_create(geometry, announce));
                }
                Command::Write { id, data } => {
                    if let Some(session) = self.sessions.get_mut(&id) {
                        session.write(&data);
                    }
                }
                Command::Resize { id, cols, rows } => {
                    if let Some(session) = self.sessions.get_mut(&id) {
                        session.resize(cols, rows);
                    }
                }
                Command::Close { id } => self.handle_close(id),
                Command::Backend { id, event } => self.handle_backend_event(id, event),
                Command::Shutdown { done } => {
                    self.kill_all();
                    let _ = done.send(());
                    return;
                }
            }
        }
        // All handles dropped without an explicit shutdown; still sweep.
        self.kill_all();
    }

    fn handle_create(
        &mut self,
        geometry: Option<Geometry>,
        announce: bool,
    ) -> Result<SessionId, RegistryError> {
        let geometry = geometry.unwrap_or_default();

        let mut id = generate_session_id();
        while self.sessions.contains_key(&id) {
            id = generate_session_id();
        }

        let (backend_tx, backend_rx) = mpsc::unbounded_channel();
        let backend = Backend::spawn(
            self.config.kind,
            &self.config.spawn,
            &id,
            geometry.cols,
            geometry.rows,
            backend_tx,
        )
        .map_err(|e| {
            log::warn!("session spawn failed: {e}");
            RegistryError::BackendUnavailable(e.to_string())
        })?;

        self.subscribe(id.clone(), backend_rx);
        self.sessions
            .insert(id.clone(), Session::new(id.clone(), backend, geometry));
        log::info!("session {id} created ({}x{})", geometry.cols, geometry.rows);

        if announce {
            self.emit(HostMessage::SessionCreated { id: id.clone() });
        }
        Ok(id)
    }

    /// Subscribe once to a backend's event stream, forwarding each event
    /// back onto the registry's control flow tagged with the session id.
    /// The stream is finite: the task ends after forwarding `Exit`.
    fn subscribe(&self, id: SessionId, mut backend_rx: mpsc::UnboundedReceiver<BackendEvent>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = backend_rx.recv().await {
                let last = event == BackendEvent::Exit;
                if tx
                    .send(Command::Backend {
                        id: id.clone(),
                        event,
                    })
                    .is_err()
                    || last
                {
                    return;
                }
            }
        });
    }

    fn handle_close(&mut self, id: SessionId) {
        if let Some(mut session) = self.sessions.remove(&id) {
            session.kill();
            // The backend still owes its exit event; remember the id so
            // that exactly one terminal.exit goes out when it lands.
            self.closing.insert(id);
        }
    }

    fn handle_backend_event(&mut self, id: SessionId, event: BackendEvent) {
        match event {
            BackendEvent::Data(data) => {
                // Output still in flight when a close lands is forwarded;
                // the presentation side ignores ids it has torn down.
                // Nothing flows for ids that were never registered.
                if self.sessions.contains_key(&id) || self.closing.contains(&id) {
                    self.emit(HostMessage::TerminalData { id, data });
                }
            }
            BackendEvent::Exit => {
                let was_closing = self.closing.remove(&id);
                let was_active = self.sessions.remove(&id).is_some();
                if was_closing || was_active {
                    log::info!("session {id} exited");
                    self.emit(HostMessage::TerminalExit { id });
                }
            }
        }
    }

    /// Best-effort shutdown sweep: kill every remaining backend without
    /// waiting for any of them.
    fn kill_all(&mut self) {
        for (id, mut session) in self.sessions.drain() {
            log::debug!("killing session {id} at shutdown");
            session.kill();
        }
        self.closing.clear();
    }

    fn emit(&self, message: HostMessage) {
        // Transport gone means the presentation side went away; nothing
        // useful to do with the notification.
        let _ = self.events.send(message);
    }
}
