//! tabmuxd: the terminal host process.
//!
//! Speaks the transport protocol with a presentation process over
//! stdin/stdout, one JSON-encoded message per line. Requests come in on
//! stdin; replies and notifications go out on stdout. When stdin closes,
//! every remaining backend is killed before the process exits.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use tabmux_host::layout::LayoutStore;
use tabmux_host::proto::{ClientMessage, HostMessage};
use tabmux_host::registry::{spawn_registry, RegistryConfig, RegistryHandle};
use tabmux_pty::{BackendKind, SpawnConfig};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Probe once; every session uses the same backend variant.
    let kind = BackendKind::detect();
    if kind == BackendKind::Echo {
        log::warn!("no PTY driver detected; all sessions will run in echo mode");
    }

    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<HostMessage>();
    let registry = spawn_registry(
        RegistryConfig {
            kind,
            spawn: SpawnConfig::from_env(),
        },
        events_tx.clone(),
    );

    let store = LayoutStore::new(LayoutStore::default_path());
    let layout = store.load();
    if layout.tabs.is_empty() {
        // Nothing persisted: open one session so the UI has a tab to show.
        match registry.create_announced(None).await {
            Ok(id) => log::info!("created initial session {id}"),
            Err(e) => log::warn!("could not create initial session: {e}"),
        }
    } else {
        log::info!("loaded layout with {} tabs", layout.tabs.len());
    }

    // Outbound pump: host messages to stdout, one JSON object per line.
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = events_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(mut line) => {
                    line.push('\n');
                    if stdout.write_all(line.as_bytes()).await.is_err() {
                        return;
                    }
                    let _ = stdout.flush().await;
                }
                Err(e) => log::error!("unserializable host message: {e}"),
            }
        }
    });

    // Inbound pump: stdin lines to client messages.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ClientMessage>(&line) {
                    Ok(message) => dispatch(&registry, &events_tx, &store, message).await,
                    Err(e) => log::warn!("ignoring malformed client message: {e}"),
                }
            }
            Ok(None) => break, // presentation side hung up
            Err(e) => {
                log::warn!("stdin read error: {e}");
                break;
            }
        }
    }

    // No shell may outlive the host process.
    registry.shutdown().await;
    drop(events_tx);
    let _ = writer.await;
}

async fn dispatch(
    registry: &RegistryHandle,
    events: &mpsc::UnboundedSender<HostMessage>,
    store: &LayoutStore,
    message: ClientMessage,
) {
    match message {
        ClientMessage::CreateSession { seq, geometry } => {
            // Spawn failure is the one fault surfaced to the caller: the
            // reply simply carries no id.
            let reply = match registry.create(geometry).await {
                Ok(id) => HostMessage::CreateReply { seq, id: Some(id) },
                Err(e) => {
                    log::warn!("session.create failed: {e}");
                    HostMessage::CreateReply { seq, id: None }
                }
            };
            let _ = events.send(reply);
        }
        ClientMessage::WriteSession { id, data } => registry.write(&id, data),
        ClientMessage::ResizeSession { id, cols, rows } => registry.resize(&id, cols, rows),
        ClientMessage::CloseSession { id } => registry.close(&id),
        ClientMessage::LoadLayout { seq } => {
            let _ = events.send(HostMessage::LayoutLoaded {
                seq,
                layout: store.load(),
            });
        }
        ClientMessage::SaveLayout { layout } => store.save(&layout),
    }
}
