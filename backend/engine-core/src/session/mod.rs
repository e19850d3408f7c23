//! The engine session: public handle, connection lifecycle, and the
//! reader/writer tasks bridging the socket to the state machine.
//!
//! # Concurrency
//!
//! One `tokio::sync::Mutex` guards the whole session state. Every entry
//! point - public calls and transport events alike - takes the lock and
//! runs to completion, so handlers never interleave and the state machine
//! itself needs no locking. The single-flight guarantee ("at most one
//! query running") comes from the desired/running reconciliation in
//! [`state`], not from OS-level synchronization.

pub(crate) mod state;
pub(crate) mod wire;

pub use state::{QueryPhase, SessionStatus};

use crate::config::ProxyConfig;
use crate::error::session::SessionError;
use crate::notify::{EventSink, Notifier};
use crate::query::AnalyseParams;
use crate::session::state::SessionState;
use crate::session::wire::SocketWire;
use crate::version::EngineVersion;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to one engine session.
///
/// Single-use: once shut down (explicitly or by a transport failure) the
/// session is permanently inert and a fresh one must be constructed.
/// Collaborators are injected here; the core holds no ambient globals.
pub struct EngineSession {
    config: ProxyConfig,
    state: Arc<Mutex<SessionState>>,
}

impl EngineSession {
    /// Create a disconnected session with its injected collaborators.
    pub fn new(config: ProxyConfig, notifier: Arc<dyn Notifier>, sink: Arc<dyn EventSink>) -> Self {
        let traffic_log = config.traffic_log;
        Self {
            config,
            state: Arc::new(Mutex::new(SessionState::new(notifier, sink, traffic_log))),
        }
    }

    /// Validate the engine inputs and open the proxy connection.
    ///
    /// If any of the three files is missing, the session stays disconnected
    /// (no connection attempted) and [`status`](Self::status) reports which
    /// one. On open, queued messages flush strictly FIFO before the two
    /// startup probes are sent.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Reuse`] when already connected or shut down (the
    ///   session is single-use); no connection is attempted.
    /// - [`SessionError::Connect`] when the proxy is unreachable; the user
    ///   has already been notified and the session shut down.
    pub async fn setup(
        &self,
        engine_path: &Path,
        engine_config_path: &Path,
        weights_path: &Path,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;

        if state.connected || state.quit {
            return Err(SessionError::Reuse {
                message: "setup on a session that is already connected or has shut down"
                    .to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Some(missing) = first_missing([engine_path, engine_config_path, weights_path]) {
            warn!("engine input missing: {}", missing.display());
            state.missing_file = Some(missing);
            return Ok(());
        }
        state.missing_file = None;

        info!("connecting to analysis proxy at {}", self.config.endpoint);
        let socket: Socket = match connect_async(self.config.endpoint.as_str()).await {
            Ok((socket, _)) => socket,
            Err(e) => {
                state.handle_error(&e.to_string());
                return Err(SessionError::Connect {
                    message: format!("{}: {e}", self.config.endpoint),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let (sink_half, stream_half) = socket.split();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        state.wire = Some(Box::new(SocketWire { frames: frames_tx }));

        tokio::spawn(writer_task(frames_rx, sink_half, Arc::clone(&self.state)));
        tokio::spawn(reader_task(stream_half, Arc::clone(&self.state)));

        // Still under the lock: the flush and probes go out before any
        // inbound frame can be handled.
        state.handle_open();
        Ok(())
    }

    /// Submit a raw outbound message through the send primitive.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidMessage`] for payloads without a non-empty
    /// string `id`, [`SessionError::Reuse`] after shutdown. Transport
    /// failures do not surface here; they notify the user and shut the
    /// session down.
    pub async fn send(&self, message: Value) -> Result<(), SessionError> {
        self.state.lock().await.send(message)
    }

    /// Request analysis of a position.
    ///
    /// Idempotent for requests equivalent to the current desired query.
    /// When a different query is already running, a single termination is
    /// sent and this request is withheld until the engine settles the old
    /// one.
    pub async fn analyse(&self, params: &AnalyseParams) {
        self.state.lock().await.analyse(params);
    }

    /// Stop analysing: clears intent and asks a running query to stop.
    pub async fn halt(&self) {
        self.state.lock().await.halt();
    }

    /// Idempotent, terminal teardown.
    pub async fn shutdown(&self) {
        self.state.lock().await.shutdown();
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.status()
    }

    pub async fn phase(&self) -> QueryPhase {
        self.state.lock().await.phase()
    }

    /// Negotiated engine version, once the engine has reported one.
    pub async fn version(&self) -> Option<EngineVersion> {
        self.state.lock().await.version
    }

    /// Whether the engine has answered the identification probe yet.
    pub async fn version_received(&self) -> bool {
        self.state.lock().await.version_received
    }
}

fn first_missing<const N: usize>(paths: [&Path; N]) -> Option<PathBuf> {
    paths
        .iter()
        .find(|path| !path.exists())
        .map(|path| path.to_path_buf())
}

/// Drains outbound frames into the socket. A send failure is a transport
/// failure: the session gets notified and shut down.
async fn writer_task(
    mut frames: UnboundedReceiver<Message>,
    mut sink: SplitSink<Socket, Message>,
    state: Arc<Mutex<SessionState>>,
) {
    while let Some(frame) = frames.recv().await {
        let closing = matches!(frame, Message::Close(_));
        if let Err(e) = sink.send(frame).await {
            state.lock().await.handle_error(&format!("send failed: {e}"));
            break;
        }
        if closing {
            debug!("writer closed the connection");
            break;
        }
    }
}

/// Feeds socket events into the state machine, one at a time.
async fn reader_task(mut stream: SplitStream<Socket>, state: Arc<Mutex<SessionState>>) {
    while let Some(event) = stream.next().await {
        match event {
            Ok(Message::Text(raw)) => state.lock().await.handle_message(raw.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => debug!("ignoring non-text frame from proxy"),
            Err(e) => {
                state.lock().await.handle_error(&e.to_string());
                return;
            }
        }
    }

    // Stream ended, by close frame or otherwise. No-op if we quit first.
    state.lock().await.handle_close();
}
