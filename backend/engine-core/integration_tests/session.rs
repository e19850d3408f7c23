//! End-to-end session tests against the scripted fake proxy.

use crate::helpers::{FakeProxy, NullSink, RecordingNotifier, engine_fixture, wait_until};

use engine_core::error::session::SessionError;
use engine_core::query::AnalyseParams;
use engine_core::session::{EngineSession, QueryPhase, SessionStatus};
use engine_core::version::{CAPABILITY_PROBE_ID, VERSION_PROBE_ID};

use std::sync::Arc;

use serde_json::json;

fn params(max_visits: u32) -> AnalyseParams {
    AnalyseParams {
        rules: "Chinese".to_string(),
        board_x_size: 19,
        board_y_size: 19,
        max_visits,
        moves: vec![("B".to_string(), "D4".to_string())],
        avoid: None,
    }
}

fn session_with(proxy: &FakeProxy) -> (EngineSession, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let session = EngineSession::new(proxy.config(), notifier.clone(), Arc::new(NullSink));
    (session, notifier)
}

/// Messages queued while disconnected flush FIFO on connect, ahead of the
/// identification and capability probes.
#[tokio::test]
async fn queued_messages_flush_before_startup_probes() {
    let mut proxy = FakeProxy::start().await;
    let (session, _notifier) = session_with(&proxy);
    let (_dir, engine, config, weights) = engine_fixture();

    session
        .send(json!({"id": "early", "action": "custom"}))
        .await
        .expect("queued while disconnected");

    session
        .setup(&engine, &config, &weights)
        .await
        .expect("setup succeeds");
    assert_eq!(session.status().await, SessionStatus::Connected);

    assert_eq!(proxy.next_sent().await["id"], "early");
    assert_eq!(proxy.next_sent().await["id"], VERSION_PROBE_ID);
    assert_eq!(proxy.next_sent().await["id"], CAPABILITY_PROBE_ID);
}

/// A missing input file leaves the session disconnected with the problem
/// queryable; no connection is attempted.
#[tokio::test]
async fn missing_weights_file_skips_connection() {
    let proxy = FakeProxy::start().await;
    let (session, notifier) = session_with(&proxy);
    let (_dir, engine, config, _weights) = engine_fixture();
    let absent = _dir.path().join("no-such-weights.bin.gz");

    session
        .setup(&engine, &config, &absent)
        .await
        .expect("missing file is not an error");

    let status = session.status().await;
    assert_eq!(status, SessionStatus::MissingFile(absent));
    assert_eq!(status.to_string(), "missing file: no-such-weights.bin.gz");
    assert!(notifier.alerts().is_empty());
}

/// The session is single-use: a second setup, and any setup after
/// shutdown, is a reuse error.
#[tokio::test]
async fn setup_twice_and_after_shutdown_fails_with_reuse() {
    let mut proxy = FakeProxy::start().await;
    let (session, _notifier) = session_with(&proxy);
    let (_dir, engine, config, weights) = engine_fixture();

    session
        .setup(&engine, &config, &weights)
        .await
        .expect("first setup succeeds");
    proxy.next_sent().await; // version probe
    proxy.next_sent().await; // capability probe

    let again = session.setup(&engine, &config, &weights).await;
    assert!(matches!(again, Err(SessionError::Reuse { .. })));

    session.shutdown().await;
    assert_eq!(session.status().await, SessionStatus::Quit);

    let after_shutdown = session.setup(&engine, &config, &weights).await;
    assert!(matches!(after_shutdown, Err(SessionError::Reuse { .. })));
}

/// The full cancel/replace handshake: query, replacement request, one
/// termination, settlement, replacement dispatch.
#[tokio::test]
async fn replacement_waits_for_termination_settlement() {
    let mut proxy = FakeProxy::start().await;
    let (session, _notifier) = session_with(&proxy);
    let (_dir, engine, config, weights) = engine_fixture();

    session
        .setup(&engine, &config, &weights)
        .await
        .expect("setup succeeds");
    proxy.next_sent().await;
    proxy.next_sent().await;

    session.analyse(&params(500)).await;
    let first = proxy.next_sent().await;
    assert_eq!(first["maxVisits"], 500);
    let first_id = first["id"].as_str().expect("query id").to_string();
    assert_eq!(session.phase().await, QueryPhase::Active);

    session.analyse(&params(800)).await;
    let stop = proxy.next_sent().await;
    assert_eq!(stop["id"], format!("stop!{first_id}"));
    assert_eq!(stop["terminateId"], first_id);
    assert_eq!(session.phase().await, QueryPhase::Superseded);

    proxy.reply(json!({
        "id": format!("stop!{first_id}"),
        "action": "terminate",
        "terminateId": first_id,
    }));

    let replacement = proxy.next_sent().await;
    assert_eq!(replacement["maxVisits"], 800);
    assert_ne!(replacement["id"], first_id.as_str());
    wait_until(async || session.phase().await == QueryPhase::Active).await;
}

/// A denylisted engine version produces a non-fatal warning.
#[tokio::test]
async fn denylisted_version_report_warns_but_connection_survives() {
    let mut proxy = FakeProxy::start().await;
    let (session, notifier) = session_with(&proxy);
    let (_dir, engine, config, weights) = engine_fixture();

    session
        .setup(&engine, &config, &weights)
        .await
        .expect("setup succeeds");
    proxy.next_sent().await;
    proxy.next_sent().await;

    proxy.reply(json!({
        "id": VERSION_PROBE_ID,
        "action": VERSION_PROBE_ID,
        "version": "1.9.0",
    }));

    notifier.wait_for_alert("1.9.0").await;
    assert_eq!(session.status().await, SessionStatus::Connected);
}

/// The proxy dropping the connection notifies the user and shuts the
/// session down for good.
#[tokio::test]
async fn proxy_disconnect_triggers_full_shutdown() {
    let mut proxy = FakeProxy::start().await;
    let (session, notifier) = session_with(&proxy);
    let (_dir, engine, config, weights) = engine_fixture();

    session
        .setup(&engine, &config, &weights)
        .await
        .expect("setup succeeds");
    proxy.next_sent().await;
    proxy.next_sent().await;

    proxy.disconnect();

    // Depending on how the peer vanishes this surfaces as a close or a
    // read error; both alerts name the engine.
    notifier.wait_for_alert("engine").await;
    wait_until(async || session.status().await == SessionStatus::Quit).await;
}

/// An unreachable proxy notifies, shuts down, and surfaces a connect
/// error.
#[tokio::test]
async fn unreachable_proxy_fails_setup() {
    // Grab a port nothing listens on: bind, read it back, release it.
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        listener.local_addr().expect("local addr").port()
    };
    let config = engine_core::config::ProxyConfig {
        endpoint: url::Url::parse(&format!("ws://127.0.0.1:{port}")).expect("valid url"),
        traffic_log: false,
    };

    let notifier = Arc::new(RecordingNotifier::default());
    let session = EngineSession::new(config, notifier.clone(), Arc::new(NullSink));
    let (_dir, engine, engine_config, weights) = engine_fixture();

    let result = session.setup(&engine, &engine_config, &weights).await;

    assert!(matches!(result, Err(SessionError::Connect { .. })));
    assert_eq!(session.status().await, SessionStatus::Quit);
    assert!(!notifier.alerts().is_empty());
}
