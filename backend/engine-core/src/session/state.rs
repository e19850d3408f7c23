//! The session state machine: desired/running reconciliation, the
//! termination handshake, version negotiation routing and shutdown.
//!
//! Every entry point here runs to completion under the session mutex (see
//! [`crate::session::EngineSession`]), so the fields need no further
//! locking. Cancellation is cooperative: a running query is only ever
//! *asked* to stop, and a replacement is withheld until the engine settles
//! the old one.

use crate::error::session::SessionError;
use crate::notify::{EventSink, Notifier};
use crate::query::{AnalyseParams, Query, TERMINATE_ACTION};
use crate::session::wire::Wire;
use crate::traffic;
use crate::version::{
    CAPABILITY_PROBE_ID, EngineVersion, VERSION_PROBE_ID, capability_probe, version_probe,
};

use common::ErrorLocation;

use std::collections::VecDeque;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;

/// Reconciliation phase derived from the desired/running pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryPhase {
    /// Nothing desired, nothing running.
    Idle,
    /// A query is desired and nothing is running yet.
    Pending,
    /// The running query is the desired one.
    Active,
    /// The running query awaits termination settlement; current intent is a
    /// different query, or none.
    Superseded,
}

/// User-facing session status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    /// `setup` found a missing input file; no connection was attempted.
    MissingFile(PathBuf),
    Disconnected,
    Connected,
    /// Shut down; the session is permanently inert.
    Quit,
}

impl Display for SessionStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            SessionStatus::MissingFile(path) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                write!(formatter, "missing file: {name}")
            }
            SessionStatus::Disconnected => write!(formatter, "disconnected"),
            SessionStatus::Connected => write!(formatter, "connected"),
            SessionStatus::Quit => write!(formatter, "shut down"),
        }
    }
}

pub(crate) struct SessionState {
    pub(crate) version: Option<EngineVersion>,
    pub(crate) version_received: bool,
    pub(crate) connected: bool,
    pub(crate) quit: bool,
    pub(crate) desired: Option<Query>,
    pub(crate) running: Option<Query>,
    /// A termination referencing `running` was sent and has not settled.
    pub(crate) stop_pending: bool,
    pub(crate) queue: VecDeque<Value>,
    pub(crate) wire: Option<Box<dyn Wire>>,
    pub(crate) missing_file: Option<PathBuf>,
    pub(crate) traffic_log: bool,
    notifier: Arc<dyn Notifier>,
    sink: Arc<dyn EventSink>,
}

impl SessionState {
    pub(crate) fn new(
        notifier: Arc<dyn Notifier>,
        sink: Arc<dyn EventSink>,
        traffic_log: bool,
    ) -> Self {
        Self {
            version: None,
            version_received: false,
            connected: false,
            quit: false,
            desired: None,
            running: None,
            stop_pending: false,
            queue: VecDeque::new(),
            wire: None,
            missing_file: None,
            traffic_log,
            notifier,
            sink,
        }
    }

    pub(crate) fn status(&self) -> SessionStatus {
        if self.quit {
            SessionStatus::Quit
        } else if self.connected {
            SessionStatus::Connected
        } else if let Some(path) = &self.missing_file {
            SessionStatus::MissingFile(path.clone())
        } else {
            SessionStatus::Disconnected
        }
    }

    pub(crate) fn phase(&self) -> QueryPhase {
        match (&self.desired, &self.running) {
            (None, None) => QueryPhase::Idle,
            (Some(_), None) => QueryPhase::Pending,
            (Some(desired), Some(running)) if desired.id == running.id => QueryPhase::Active,
            (_, Some(_)) => QueryPhase::Superseded,
        }
    }

    // ============================================
    // SEND PRIMITIVE AND QUEUE
    // ============================================

    /// Validate and send one outbound message.
    ///
    /// Misuse - a non-object payload, a missing or empty `id`, a session
    /// that has shut down - is the caller's bug and propagates. Transport
    /// failures are fatal to the session and handled here: the user is
    /// notified and the session shut down; they do not propagate.
    ///
    /// While disconnected, messages are appended to the outbound queue (and
    /// traffic-logged as if sent) for the FIFO flush on open.
    pub(crate) fn send(&mut self, message: Value) -> Result<(), SessionError> {
        if self.quit {
            return Err(SessionError::Reuse {
                message: "send on a session that has shut down".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let well_formed = message.as_object().is_some_and(|object| {
            object
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| !id.is_empty())
        });
        if !well_formed {
            return Err(SessionError::InvalidMessage {
                message: format!(
                    "outbound message must be an object with a non-empty string id: {message}"
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        traffic::log_outbound(self.traffic_log, &message);

        if !self.connected {
            self.queue.push_back(message);
            return Ok(());
        }

        self.transmit_now(&message);
        Ok(())
    }

    /// Serialize and hand a message to the wire; any failure is fatal to
    /// the session.
    fn transmit_now(&mut self, message: &Value) {
        let Some(wire) = self.wire.as_mut() else {
            warn!("connected without a wire; dropping outbound message");
            return;
        };

        if let Err(e) = wire.transmit(message.to_string()) {
            self.notifier
                .alert(&format!("Failed to send to the analysis engine: {e}"));
            self.shutdown();
        }
    }

    // ============================================
    // TRANSPORT EVENTS
    // ============================================

    /// Connection established: flush the queue strictly FIFO, then send the
    /// two startup probes.
    pub(crate) fn handle_open(&mut self) {
        self.connected = true;
        info!("connected to analysis proxy");

        let queued: Vec<Value> = self.queue.drain(..).collect();
        for message in queued {
            if self.quit {
                // A flush failure already shut us down.
                return;
            }
            // Traffic-logged when queued; transmit raw here.
            self.transmit_now(&message);
        }

        if self.quit {
            return;
        }
        if let Err(e) = self.send(version_probe()) {
            error!("version probe rejected: {e}");
        }
        if self.quit {
            return;
        }
        if let Err(e) = self.send(capability_probe()) {
            error!("capability probe rejected: {e}");
        }
    }

    pub(crate) fn handle_close(&mut self) {
        if self.quit {
            return;
        }
        self.notifier
            .alert("Connection to the analysis engine closed unexpectedly");
        self.shutdown();
    }

    pub(crate) fn handle_error(&mut self, detail: &str) {
        if self.quit {
            return;
        }
        self.notifier
            .alert(&format!("Analysis engine connection error: {detail}"));
        self.shutdown();
    }

    /// One inbound frame: parse, log, negotiate, reconcile, forward.
    ///
    /// An unparseable payload notifies the user and is dropped; the
    /// connection stays open.
    pub(crate) fn handle_message(&mut self, raw: &str) {
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => {
                self.notifier
                    .alert(&format!("Unreadable message from the analysis engine: {raw}"));
                return;
            }
        };

        traffic::log_inbound(self.traffic_log, &parsed);

        if let Some(warning) = parsed.get("warning").and_then(Value::as_str) {
            warn!("engine warning: {warning}");
        }

        self.negotiate(&parsed);
        self.reconcile(&parsed);

        if let Err(e) = self.sink.deliver(&parsed) {
            // Downstream problems must never tear down the connection.
            error!("downstream consumer rejected message: {e}");
        }
    }

    // ============================================
    // VERSION NEGOTIATION
    // ============================================

    /// Startup probe responses: the version report and the capability probe.
    fn negotiate(&mut self, message: &Value) {
        let id = message.get("id").and_then(Value::as_str);

        if id == Some(VERSION_PROBE_ID) {
            if let Some(reported) = message.get("version").and_then(Value::as_str) {
                self.version_received = true;
                match reported.parse::<EngineVersion>() {
                    Ok(version) => {
                        info!("engine version {version}");
                        if version.is_known_bad() {
                            self.notifier.alert(&format!(
                                "Engine version {version} has known defects; consider upgrading"
                            ));
                        }
                        self.version = Some(version);
                    }
                    Err(e) => warn!("{e}"),
                }
            }
        }

        if id == Some(CAPABILITY_PROBE_ID) {
            if message.get("error").is_none() {
                self.notifier.alert(
                    "This engine build accepts oversized boards and will analyse noticeably slower",
                );
            } else {
                debug!("capability probe rejected by the engine, as expected");
            }
        }
    }

    // ============================================
    // RECONCILIATION
    // ============================================

    /// Reconcile a new analysis request against the current state.
    ///
    /// No-op while disconnected, and for requests equivalent to the current
    /// desired query. Otherwise the request becomes the desired query: it
    /// dispatches immediately when nothing runs, or a single termination is
    /// sent for the running query and the request is withheld until
    /// settlement.
    pub(crate) fn analyse(&mut self, params: &AnalyseParams) {
        if self.quit || !self.connected {
            debug!("analyse ignored while disconnected");
            return;
        }

        let candidate = Query::build(params, self.version.as_ref());
        if self
            .desired
            .as_ref()
            .is_some_and(|desired| desired.equivalent(&candidate))
        {
            debug!("analyse request equivalent to the desired query; ignored");
            return;
        }

        self.desired = Some(candidate.clone());
        match self.running.clone() {
            None => self.dispatch(candidate),
            Some(running) => self.request_stop(&running),
        }
    }

    /// Clear intent; if something runs, ask it to stop. No replacement is
    /// sent.
    pub(crate) fn halt(&mut self) {
        if self.quit {
            return;
        }
        self.desired = None;
        if let Some(running) = self.running.clone() {
            self.request_stop(&running);
        }
    }

    /// Send a query and mark it running.
    fn dispatch(&mut self, query: Query) {
        match self.send(query.to_message()) {
            Ok(()) if !self.quit => self.running = Some(query),
            Ok(()) => {}
            Err(e) => error!("dispatch rejected: {e}"),
        }
    }

    /// At most one termination is ever outstanding per running query;
    /// repeated replacements and halts only update intent.
    fn request_stop(&mut self, running: &Query) {
        if self.stop_pending {
            return;
        }
        if let Err(e) = self.send(running.termination()) {
            error!("termination request rejected: {e}");
            return;
        }
        if !self.quit {
            self.stop_pending = true;
        }
    }

    /// Engine-reported errors and termination settlement.
    ///
    /// An inbound message settles the running query when it carries the
    /// termination action targeting its identifier, or an error field under
    /// the same identifier. On settlement a differing desired query is
    /// dispatched immediately.
    fn reconcile(&mut self, message: &Value) {
        let id = message.get("id").and_then(Value::as_str);
        let error_field = message.get("error");

        if let Some(detail) = error_field {
            // The capability probe is expected to error; stay silent there.
            if id != Some(CAPABILITY_PROBE_ID) {
                self.notifier
                    .alert(&format!("Analysis engine reported an error: {detail}"));
            }
        }

        let Some(running) = self.running.clone() else {
            return;
        };

        let terminated = message.get("action").and_then(Value::as_str) == Some(TERMINATE_ACTION)
            && message.get("terminateId").and_then(Value::as_str) == Some(running.id.as_str());
        let errored = error_field.is_some() && id == Some(running.id.as_str());

        if !(terminated || errored) {
            return;
        }

        debug!("query {} settled", running.id);
        if self
            .desired
            .as_ref()
            .is_some_and(|desired| desired.id == running.id)
        {
            self.desired = None;
        }
        self.running = None;
        self.stop_pending = false;

        if let Some(next) = self.desired.clone() {
            self.dispatch(next);
        }
    }

    // ============================================
    // SHUTDOWN
    // ============================================

    /// Idempotent, terminal teardown shared by every failure path.
    ///
    /// Closes the wire best-effort and clears the queue and both query
    /// slots. `setup` fails with a reuse error forever after.
    pub(crate) fn shutdown(&mut self) {
        if self.quit {
            return;
        }
        info!("session shutting down");
        self.quit = true;
        self.connected = false;
        if let Some(mut wire) = self.wire.take() {
            wire.close();
        }
        self.queue.clear();
        self.desired = None;
        self.running = None;
        self.stop_pending = false;
    }
}
