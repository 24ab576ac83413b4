//! Presentation-side routing of host notifications to tabs.
//!
//! Every `terminal.data` / `terminal.exit` is routed by session id to
//! the channel of the tab that owns it. Messages for unknown ids are
//! dropped silently: during tab teardown the host may still be flushing
//! output for a session the presentation side has already let go of.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::proto::HostMessage;
use crate::session::SessionId;

/// What a single tab receives from the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    Data(Vec<u8>),
    Exit,
}

/// Demultiplexes host messages onto per-tab channels.
#[derive(Default)]
pub struct TabRouter {
    tabs: HashMap<SessionId, mpsc::UnboundedSender<TabEvent>>,
}

impl TabRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tab for a session id and get its event stream.
    ///
    /// Attaching the same id again replaces the previous stream.
    pub fn attach(&mut self, id: &str) -> mpsc::UnboundedReceiver<TabEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tabs.insert(id.to_string(), tx);
        rx
    }

    /// Drop a tab's stream without waiting for its exit notification.
    pub fn detach(&mut self, id: &str) {
        self.tabs.remove(id);
    }

    /// Route one host message.
    ///
    /// Terminal notifications are consumed (delivered to the owning tab,
    /// or dropped if no tab claims the id); anything else is handed back
    /// to the caller.
    pub fn route(&mut self, message: HostMessage) -> Option<HostMessage> {
        match message {
            HostMessage::TerminalData { id, data } => {
                if let Some(tab) = self.tabs.get(&id) {
                    let _ = tab.send(TabEvent::Data(data));
                } else {
                    log::trace!("dropping data for unknown session {id}");
                }
                None
            }
            HostMessage::TerminalExit { id } => {
                // Exit is terminal: deliver it and forget the tab.
                if let Some(tab) = self.tabs.remove(&id) {
                    let _ = tab.send(TabEvent::Exit);
                } else {
                    log::trace!("dropping exit for unknown session {id}");
                }
                None
            }
            other => Some(other),
        }
    }
}
