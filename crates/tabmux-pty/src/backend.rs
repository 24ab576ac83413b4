use std::path::{Path, PathBuf};

use portable_pty::{native_pty_system, PtySize};
use tokio::sync::mpsc;

use crate::echo::EchoBackend;
use crate::pty::{PtyBackend, PtyError};

/// An event produced by a backend for its session.
///
/// Every backend emits an ordered stream of `Data` events terminated by
/// exactly one `Exit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Data(Vec<u8>),
    Exit,
}

/// Channel on which a backend delivers its event stream.
pub type EventSender = mpsc::UnboundedSender<BackendEvent>;

/// Which backend variant the host uses for every session.
///
/// Decided once at startup via [`BackendKind::detect`]; never re-probed
/// per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Real pseudo-terminal attached to a spawned shell.
    Pty,
    /// Software echo emulator (degraded mode).
    Echo,
}

impl BackendKind {
    /// Probe for a working PTY driver by opening and discarding one pair.
    pub fn detect() -> Self {
        match native_pty_system().openpty(PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        }) {
            Ok(_) => BackendKind::Pty,
            Err(e) => {
                log::warn!("no PTY driver available, falling back to echo mode: {e}");
                BackendKind::Echo
            }
        }
    }
}

/// What the host hands a backend at spawn time: an optional shell
/// override and a working directory. The environment snapshot is
/// inherited from the host process.
#[derive(Debug, Clone, Default)]
pub struct SpawnConfig {
    /// Shell command to run; `None` means the platform default.
    pub shell: Option<String>,
    /// Working directory for the spawned shell.
    pub working_dir: Option<PathBuf>,
}

impl SpawnConfig {
    /// Build from the environment: `TABMUX_SHELL` overrides the shell,
    /// the host's current directory becomes the working directory.
    pub fn from_env() -> Self {
        Self {
            shell: std::env::var("TABMUX_SHELL").ok(),
            working_dir: std::env::current_dir().ok(),
        }
    }

    pub fn shell(&self) -> Option<&str> {
        self.shell.as_deref()
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }
}

/// A session's backend: real PTY or echo emulator, behind one capability
/// contract (`write`, `resize`, `kill`, ordered `data`/`exit` events).
pub enum Backend {
    Pty(PtyBackend),
    Echo(EchoBackend),
}

impl Backend {
    /// Spawn a backend of the given kind.
    ///
    /// `label` names the driver's I/O thread for diagnostics; callers
    /// pass the session id. Events are delivered on `events` from the
    /// moment this returns.
    pub fn spawn(
        kind: BackendKind,
        config: &SpawnConfig,
        label: &str,
        cols: u16,
        rows: u16,
        events: EventSender,
    ) -> Result<Self, PtyError> {
        match kind {
            BackendKind::Pty => PtyBackend::spawn(
                config.shell(),
                config.working_dir(),
                label,
                cols,
                rows,
                events,
            )
            .map(Backend::Pty),
            BackendKind::Echo => Ok(Backend::Echo(EchoBackend::start(events))),
        }
    }

    /// Forward input bytes to the backend.
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        match self {
            Backend::Pty(pty) => pty.write(data),
            Backend::Echo(echo) => {
                echo.write(data);
                Ok(())
            }
        }
    }

    /// Apply new dimensions. A no-op for the echo emulator and for a
    /// terminated PTY.
    pub fn resize(&mut self, cols: u16, rows: u16) -> Result<(), PtyError> {
        match self {
            Backend::Pty(pty) => pty.resize(cols, rows),
            Backend::Echo(_) => Ok(()),
        }
    }

    /// Terminate the backend. Idempotent; the terminal `Exit` event
    /// arrives on the event channel, not synchronously.
    pub fn kill(&mut self) {
        match self {
            Backend::Pty(pty) => pty.kill(),
            Backend::Echo(echo) => echo.kill(),
        }
    }
}
