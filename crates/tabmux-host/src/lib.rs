//! tabmux-host: session registry, transport protocol, and layout
//! persistence for the tabmux terminal host.
//!
//! The host process owns every live terminal session and exposes them to
//! a presentation surface over an asynchronous message channel:
//!
//! - [`registry`] — the single owner of all sessions; routes each
//!   backend's event stream to the transport, tagged with the session id.
//! - [`proto`] — the wire messages exchanged with the presentation side.
//! - [`router`] — presentation-side demultiplexing of `terminal.data` /
//!   `terminal.exit` by session id.
//! - [`layout`] — best-effort persistence of the tab layout document.

pub mod layout;
pub mod proto;
pub mod registry;
pub mod router;
pub mod session;

pub use layout::{LayoutDocument, LayoutStore, TabEntry};
pub use proto::{ClientMessage, HostMessage};
pub use registry::{spawn_registry, RegistryConfig, RegistryError, RegistryHandle};
pub use session::{Geometry, Session, SessionId};
