use std::time::Duration;

use crate::backend::{BackendEvent, EventSender};

/// Banner sent once shortly after a degraded-mode session starts.
const ECHO_MODE_NOTICE: &str = "No PTY driver available. Running in echo mode.\r\n";

/// Delay before the banner, so it lands after the session-created
/// notification rather than racing it.
const NOTICE_DELAY: Duration = Duration::from_millis(50);

/// Software echo emulator, used when the host has no working PTY driver.
///
/// Not a shell: `write` just reflects the input back as a `Data` event
/// with carriage returns stripped. `resize` is a no-op. `kill` emits
/// exactly one `Exit` event.
pub struct EchoBackend {
    events: EventSender,
    exited: bool,
}

impl EchoBackend {
    /// Create an echo backend and schedule its informational banner.
    ///
    /// Must be called from within a tokio runtime (the banner is a
    /// delayed task).
    pub fn start(events: EventSender) -> Self {
        let notice_tx = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(NOTICE_DELAY).await;
            let _ = notice_tx.send(BackendEvent::Data(ECHO_MODE_NOTICE.as_bytes().to_vec()));
        });

        Self {
            events,
            exited: false,
        }
    }

    /// Echo the input back, minus carriage returns.
    pub fn write(&mut self, data: &[u8]) {
        if self.exited {
            return;
        }
        let echoed: Vec<u8> = data.iter().copied().filter(|&b| b != b'\r').collect();
        let _ = self.events.send(BackendEvent::Data(echoed));
    }

    /// Emit the terminal `Exit` event. Safe to call more than once.
    pub fn kill(&mut self) {
        if self.exited {
            return;
        }
        self.exited = true;
        let _ = self.events.send(BackendEvent::Exit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_write_strips_carriage_returns() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut echo = EchoBackend::start(tx);

        echo.write(b"hello\r");

        match rx.recv().await {
            Some(BackendEvent::Data(bytes)) => assert_eq!(bytes, b"hello"),
            other => panic!("expected echoed data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_banner_arrives_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _echo = EchoBackend::start(tx);

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("banner should arrive within a second");
        match event {
            Some(BackendEvent::Data(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                assert!(text.contains("echo mode"), "unexpected banner: {text}");
            }
            other => panic!("expected banner data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_kill_emits_exit_exactly_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut echo = EchoBackend::start(tx);

        echo.kill();
        echo.kill();

        match rx.recv().await {
            Some(BackendEvent::Exit) => {}
            other => panic!("expected exit, got {other:?}"),
        }
        // A second kill produced nothing; only the delayed banner may follow.
        match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            Ok(Some(BackendEvent::Exit)) => panic!("duplicate exit event"),
            _ => {}
        }
    }

    #[tokio::test]
    async fn test_write_after_kill_is_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut echo = EchoBackend::start(tx);

        echo.kill();
        echo.write(b"late\r");

        assert!(matches!(rx.recv().await, Some(BackendEvent::Exit)));
        match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
            Ok(Some(BackendEvent::Data(bytes))) => {
                let text = String::from_utf8_lossy(&bytes);
                assert!(
                    text.contains("echo mode"),
                    "only the banner may follow exit, got: {text}"
                );
            }
            _ => {}
        }
    }
}
