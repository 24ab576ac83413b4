use std::io::{Read, Write};
use std::path::Path;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};

use crate::backend::{BackendEvent, EventSender};

/// Errors from PTY operations.
#[derive(Debug)]
pub enum PtyError {
    SpawnFailed(String),
    IoError(std::io::Error),
    ResizeFailed(String),
}

impl std::fmt::Display for PtyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PtyError::SpawnFailed(msg) => write!(f, "PTY spawn failed: {msg}"),
            PtyError::IoError(err) => write!(f, "PTY I/O error: {err}"),
            PtyError::ResizeFailed(msg) => write!(f, "PTY resize failed: {msg}"),
        }
    }
}

impl std::error::Error for PtyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PtyError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PtyError {
    fn from(err: std::io::Error) -> Self {
        PtyError::IoError(err)
    }
}

/// Owns a portable-pty child process, master pair, reader, and writer.
pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
}

impl PtyHandle {
    /// Spawn a new PTY with the given shell command and dimensions.
    ///
    /// If `shell` is `None`, uses the platform default shell (`$SHELL` or
    /// `/bin/bash` on unix, `%COMSPEC%` or `cmd.exe` on windows). The
    /// child inherits the host's environment snapshot plus `TERM`.
    pub fn spawn(
        shell: Option<&str>,
        working_dir: Option<&Path>,
        cols: u16,
        rows: u16,
    ) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let shell_path = match shell {
            Some(s) => s.to_string(),
            None => default_shell(),
        };
        let mut cmd = CommandBuilder::new(shell_path);
        cmd.env("TERM", "xterm-color");
        if let Some(dir) = working_dir {
            cmd.cwd(dir);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn command: {e}")))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone reader: {e}")))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take writer: {e}")))?;

        Ok(Self {
            master: pair.master,
            reader: Some(reader),
            writer,
            child,
        })
    }

    /// Extract the PTY output reader.
    ///
    /// The reader is blocking, so it is handed to a dedicated I/O thread
    /// rather than read from the control flow that owns the handle.
    /// Returns `None` if it has already been taken.
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    /// Resize the PTY to new dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(format!("{e}")))
    }

    /// Write bytes to the PTY master (user input -> shell).
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Signal the child process to terminate. Does not wait for it.
    ///
    /// Killing an already-dead child is a no-op.
    pub fn kill(&mut self) {
        if self.child.try_wait().ok().flatten().is_some() {
            return;
        }
        if let Err(e) = self.child.kill() {
            log::debug!("kill on exited child ignored: {e}");
        }
    }

    /// Get the child process exit status if it has exited.
    ///
    /// Returns `None` if the process is still running.
    pub fn try_wait(&mut self) -> Option<u32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code()),
            _ => None,
        }
    }
}

/// A real-PTY backend: a [`PtyHandle`] plus the dedicated reader thread
/// that turns shell output into an ordered event stream.
///
/// The reader thread sends [`BackendEvent::Data`] chunks as the shell
/// produces output and exactly one [`BackendEvent::Exit`] when the PTY
/// reaches EOF (the child ended, normally or via signal).
pub struct PtyBackend {
    handle: PtyHandle,
}

impl PtyBackend {
    /// Spawn a shell on a fresh PTY and start its reader thread.
    ///
    /// `label` names the reader thread for diagnostics; callers pass the
    /// session id.
    pub fn spawn(
        shell: Option<&str>,
        working_dir: Option<&Path>,
        label: &str,
        cols: u16,
        rows: u16,
        events: EventSender,
    ) -> Result<Self, PtyError> {
        let mut handle = PtyHandle::spawn(shell, working_dir, cols, rows)?;

        // spawn() always leaves the reader in place, so this cannot fail.
        let reader = handle
            .take_reader()
            .ok_or_else(|| PtyError::SpawnFailed("PTY reader already taken".to_string()))?;

        start_reader_thread(label, reader, events);

        Ok(Self { handle })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.handle.write(data)
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.handle.resize(cols, rows)
    }

    /// Signal the shell to terminate. The `Exit` event is emitted by the
    /// reader thread once the PTY drains, not here.
    pub fn kill(&mut self) {
        self.handle.kill();
    }
}

impl Drop for PtyBackend {
    fn drop(&mut self) {
        // No shell may outlive its session.
        self.handle.kill();
        let _ = self.handle.try_wait();
    }
}

/// Start the blocking read loop on a dedicated OS thread.
///
/// PTY reads block, so they get their own thread; events are pushed onto
/// the unbounded channel without ever waiting on the consumer. The thread
/// ends on EOF, read error, or when the receiving side goes away.
fn start_reader_thread(label: &str, mut reader: Box<dyn Read + Send>, events: EventSender) {
    let name = format!("pty-io-{label}");
    let exit_tx = events.clone();
    let spawned = std::thread::Builder::new().name(name).spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break, // EOF or error: PTY closed
                Ok(n) => {
                    if events.send(BackendEvent::Data(buf[..n].to_vec())).is_err() {
                        // Consumer gone; stop reading.
                        return;
                    }
                }
            }
        }
        let _ = events.send(BackendEvent::Exit);
    });
    if let Err(e) = spawned {
        log::error!("failed to spawn PTY reader thread: {e}");
        let _ = exit_tx.send(BackendEvent::Exit);
    }
}

/// Returns the platform default interactive shell.
pub(crate) fn default_shell() -> String {
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
    #[cfg(not(windows))]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_spawn_pty() {
        let handle = PtyHandle::spawn(Some("/bin/sh"), None, 80, 24);
        assert!(handle.is_ok(), "Failed to spawn PTY: {:?}", handle.err());
        let mut handle = handle.unwrap();
        assert!(handle.try_wait().is_none());
    }

    #[test]
    fn test_resize() {
        let handle = PtyHandle::spawn(Some("/bin/sh"), None, 80, 24).unwrap();
        let result = handle.resize(120, 40);
        assert!(result.is_ok(), "Resize failed: {:?}", result.err());
    }

    #[test]
    fn test_kill_twice_is_noop() {
        let mut handle = PtyHandle::spawn(Some("/bin/sh"), None, 80, 24).unwrap();
        handle.kill();
        handle.kill();
    }

    #[test]
    fn test_backend_streams_output_then_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend =
            PtyBackend::spawn(Some("/bin/sh"), None, "test", 80, 24, tx).unwrap();

        backend.write(b"echo TABMUX_PTY_OK\nexit 0\n").unwrap();

        let mut output = Vec::new();
        let mut exited = false;
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            match rx.try_recv() {
                Ok(BackendEvent::Data(bytes)) => output.extend_from_slice(&bytes),
                Ok(BackendEvent::Exit) => {
                    exited = true;
                    break;
                }
                Err(_) => std::thread::sleep(std::time::Duration::from_millis(20)),
            }
        }

        let text = String::from_utf8_lossy(&output);
        assert!(
            text.contains("TABMUX_PTY_OK"),
            "Expected echoed marker in output, got: {text}"
        );
        assert!(exited, "Expected an Exit event after the shell ended");
        // No events after Exit.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_backend_kill_produces_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend =
            PtyBackend::spawn(Some("/bin/sh"), None, "test-kill", 80, 24, tx).unwrap();

        backend.kill();

        let mut exited = false;
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            match rx.try_recv() {
                Ok(BackendEvent::Data(_)) => {}
                Ok(BackendEvent::Exit) => {
                    exited = true;
                    break;
                }
                Err(_) => std::thread::sleep(std::time::Duration::from_millis(20)),
            }
        }
        assert!(exited, "Expected an Exit event after kill");
    }

    #[test]
    fn test_default_shell_detection() {
        let shell = default_shell();
        assert!(!shell.is_empty(), "Default shell should not be empty");
    }
}
