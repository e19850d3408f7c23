//! Test helpers for session integration tests:
//! - a scripted fake analysis proxy (single-connection WebSocket server)
//! - recording notifier / null event sink collaborators
//! - engine input fixtures on disk

use engine_core::config::ProxyConfig;
use engine_core::notify::{EventSink, Notifier, SinkError};

use std::path::PathBuf;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const WAIT_LIMIT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Scripted fake proxy: records what the session sends, pushes whatever a
/// test scripts back to it.
pub struct FakeProxy {
    pub port: u16,
    received: mpsc::UnboundedReceiver<Value>,
    replies: mpsc::UnboundedSender<Value>,
}

impl FakeProxy {
    /// Bind a loopback port and serve a single WebSocket connection.
    pub async fn start() -> FakeProxy {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake proxy");
        let port = listener.local_addr().expect("local addr").port();

        let (received_tx, received_rx) = mpsc::unbounded_channel();
        let (replies_tx, mut replies_rx) = mpsc::unbounded_channel::<Value>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept connection");
            let ws = accept_async(stream).await.expect("websocket handshake");
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    frame = read.next() => match frame {
                        Some(Ok(Message::Text(raw))) => {
                            let value: Value =
                                serde_json::from_str(raw.as_str()).expect("session sends JSON");
                            if received_tx.send(value).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    },
                    reply = replies_rx.recv() => match reply {
                        Some(value) => {
                            if write.send(Message::Text(value.to_string().into())).await.is_err() {
                                break;
                            }
                        }
                        // Test dropped the reply handle: close the connection.
                        None => break,
                    },
                }
            }
        });

        FakeProxy {
            port,
            received: received_rx,
            replies: replies_tx,
        }
    }

    /// Session config pointing at this proxy.
    pub fn config(&self) -> ProxyConfig {
        ProxyConfig {
            endpoint: Url::parse(&format!("ws://127.0.0.1:{}", self.port)).expect("valid url"),
            traffic_log: false,
        }
    }

    /// Next message the session sent, within the wait limit.
    pub async fn next_sent(&mut self) -> Value {
        tokio::time::timeout(WAIT_LIMIT, self.received.recv())
            .await
            .expect("timed out waiting for an outbound message")
            .expect("proxy connection ended")
    }

    /// Push a scripted engine reply to the session.
    pub fn reply(&self, value: Value) {
        self.replies.send(value).expect("proxy connection ended");
    }

    /// Drop the connection from the proxy side.
    pub fn disconnect(self) {
        drop(self.replies);
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    alerts: StdMutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().expect("not poisoned").clone()
    }

    /// Poll until an alert containing `needle` shows up.
    pub async fn wait_for_alert(&self, needle: &str) -> String {
        tokio::time::timeout(WAIT_LIMIT, async {
            loop {
                if let Some(alert) = self.alerts().iter().find(|a| a.contains(needle)) {
                    return alert.clone();
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .expect("timed out waiting for an alert")
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts
            .lock()
            .expect("not poisoned")
            .push(message.to_string());
    }
}

/// Event sink that discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn deliver(&self, _event: &Value) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Three existing engine input files inside a temp directory.
///
/// The directory must outlive the returned paths, so it is handed back too.
pub fn engine_fixture() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let engine = dir.path().join("engine-binary");
    let config = dir.path().join("engine.cfg");
    let weights = dir.path().join("weights.bin.gz");
    for path in [&engine, &config, &weights] {
        std::fs::write(path, b"fixture").expect("write fixture");
    }
    (dir, engine, config, weights)
}

/// Poll `probe` until it returns true, within the wait limit.
pub async fn wait_until<F>(mut probe: F)
where
    F: AsyncFnMut() -> bool,
{
    tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            if probe().await {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .expect("timed out waiting for condition")
}
