//! Wire messages exchanged between the host and the presentation process.
//!
//! Serialized as tagged JSON; the `type` tag carries the message kind
//! names from the protocol contract. Delivery guarantees (per-session,
//! in-order `terminal.data` terminated by exactly one `terminal.exit`)
//! are enforced by the registry, not by these types.

use serde::{Deserialize, Serialize};

use crate::layout::LayoutDocument;
use crate::session::{Geometry, SessionId};

/// Messages sent by the presentation process to the host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Request a new session. `seq` correlates the eventual
    /// `session.create.reply`; geometry defaults to 80x24 when absent.
    #[serde(rename = "session.create")]
    CreateSession {
        seq: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        geometry: Option<Geometry>,
    },
    /// Fire-and-forget input bytes for a session.
    #[serde(rename = "session.write")]
    WriteSession { id: SessionId, data: Vec<u8> },
    /// Fire-and-forget resize; last write wins.
    #[serde(rename = "session.resize")]
    ResizeSession { id: SessionId, cols: u16, rows: u16 },
    /// Fire-and-forget close.
    #[serde(rename = "session.close")]
    CloseSession { id: SessionId },
    /// Request the persisted tab layout.
    #[serde(rename = "layout.load")]
    LoadLayout { seq: u64 },
    /// Best-effort save of the tab layout; never answered.
    #[serde(rename = "layout.save")]
    SaveLayout { layout: LayoutDocument },
}

/// Messages sent by the host to the presentation process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum HostMessage {
    /// Response to `session.create`. A missing `id` means the spawn
    /// failed; no separate error message kind crosses the transport.
    #[serde(rename = "session.create.reply")]
    CreateReply {
        seq: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<SessionId>,
    },
    /// A session the host created proactively (not one the presentation
    /// requested).
    #[serde(rename = "session.created")]
    SessionCreated { id: SessionId },
    /// Output bytes from a session's backend. Ordered per id; no
    /// ordering across ids.
    #[serde(rename = "terminal.data")]
    TerminalData { id: SessionId, data: Vec<u8> },
    /// The session ended. Delivered exactly once per session, after its
    /// last `terminal.data`.
    #[serde(rename = "terminal.exit")]
    TerminalExit { id: SessionId },
    /// Response to `layout.load`.
    #[serde(rename = "layout.loaded")]
    LayoutLoaded { seq: u64, layout: LayoutDocument },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind_tags() {
        let json = serde_json::to_string(&HostMessage::TerminalData {
            id: "abc".to_string(),
            data: b"ls".to_vec(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"terminal.data\""), "got: {json}");

        let json = serde_json::to_string(&HostMessage::TerminalExit {
            id: "abc".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"terminal.exit\""), "got: {json}");

        let json = serde_json::to_string(&ClientMessage::CloseSession {
            id: "abc".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"session.close\""), "got: {json}");
    }

    #[test]
    fn test_create_request_geometry_is_optional() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"session.create","seq":1}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateSession {
                seq: 1,
                geometry: None
            }
        );

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"session.create","seq":2,"geometry":{"cols":100,"rows":30}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::CreateSession {
                seq: 2,
                geometry: Some(g),
            } => assert_eq!((g.cols, g.rows), (100, 30)),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_failed_create_reply_omits_id() {
        let json = serde_json::to_string(&HostMessage::CreateReply { seq: 7, id: None }).unwrap();
        assert!(!json.contains("\"id\""), "failed reply must omit id: {json}");
    }
}
