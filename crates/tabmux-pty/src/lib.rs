//! tabmux-pty: terminal backend drivers for tabmux.
//!
//! A backend is whatever produces and consumes terminal bytes for one
//! session. Two drivers share the same capability contract (`write`,
//! `resize`, `kill`, plus an ordered `data`/`exit` event stream):
//!
//! - [`PtyBackend`] — a real pseudo-terminal attached to a spawned shell.
//! - [`EchoBackend`] — a software echo emulator used when the host has no
//!   working pseudo-terminal driver (degraded mode).
//!
//! Which driver a host uses is decided once at startup via
//! [`BackendKind::detect`], not per session.

pub mod backend;
pub mod echo;
pub mod pty;

pub use backend::{Backend, BackendEvent, BackendKind, EventSender, SpawnConfig};
pub use echo::EchoBackend;
pub use pty::{PtyBackend, PtyError, PtyHandle};
