use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tabmux_pty::Backend;

/// Opaque session identifier, the sole key for all cross-boundary
/// addressing. Never reused, never parsed for meaning.
pub type SessionId = String;

/// Generate a fresh session id: millisecond timestamp plus a random
/// suffix. Unguessable enough to avoid collision under rapid creation;
/// the channel is trusted, so cryptographic strength is not a goal.
pub fn generate_session_id() -> SessionId {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let random = Uuid::new_v4().simple().to_string();
    format!("{millis}-{}", &random[..8])
}

/// Terminal display size in character cells.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Default for Geometry {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// One live terminal session: an id bound to exactly one backend and the
/// most recently requested geometry.
pub struct Session {
    id: SessionId,
    backend: Backend,
    geometry: Geometry,
}

impl Session {
    pub fn new(id: SessionId, backend: Backend, geometry: Geometry) -> Self {
        Self {
            id,
            backend,
            geometry,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Forward input to the backend. A write that fails because the
    /// backend just died is benign; it is logged and discarded.
    pub fn write(&mut self, data: &[u8]) {
        if let Err(e) = self.backend.write(data) {
            log::debug!("write to session {} dropped: {e}", self.id);
        }
    }

    /// Apply new dimensions, keeping the most recently requested values.
    ///
    /// Resize is advisory: a backend fault (e.g. the OS rejecting an
    /// already-dead handle) is caught and discarded, never escalated.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.geometry = Geometry { cols, rows };
        if let Err(e) = self.backend.resize(cols, rows) {
            log::debug!("resize of session {} ignored: {e}", self.id);
        }
    }

    /// Terminate the backend. The terminal `Exit` event arrives on the
    /// backend's event channel.
    pub fn kill(&mut self) {
        self.backend.kill();
    }
}
