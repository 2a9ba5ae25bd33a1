use crate::sse_connection::{Connection, ConnectionState, Next, ReconnectReason};
use crate::sse_core::error::{SdkError, TransportError};
use crate::sse_core::mock_transport::{data, headers, status, MockTransport};
use crate::sse_core::transport::{SignalKind, SignalReceiver};
use crate::sse_core::ClientConfig;
use crate::sse_types::Target;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn setup(config: ClientConfig) -> (Arc<MockTransport>, Connection<Arc<MockTransport>>, SignalReceiver) {
    let mock = MockTransport::new();
    let (tx, rx) = mpsc::channel(16);
    let conn = Connection::new(Arc::clone(&mock), &config, tx).expect("valid config");
    (mock, conn, rx)
}

async fn feed(
    mock: &MockTransport,
    conn: &mut Connection<Arc<MockTransport>>,
    rx: &mut SignalReceiver,
    kind: SignalKind,
) -> crate::sse_connection::Outcome {
    let id = conn.request_id().expect("active request");
    mock.send(id, kind).await;
    let signal = rx.recv().await.expect("signal");
    conn.handle_signal(signal)
}

#[test]
fn new_requires_target() {
    let (tx, _rx) = mpsc::channel(1);
    match Connection::new(MockTransport::new(), &ClientConfig::default(), tx) {
        Err(SdkError::InvalidArgument { message }) => assert!(message.contains("target")),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("connection without target must fail"),
    }
}

#[tokio::test]
async fn connect_sends_accept_header_first_and_request_path() {
    let config = ClientConfig::new("http://stream.test:8080/events?topic=a")
        .header("Authorization", "Bearer t")
        .header("X-Trace", "1");
    let (mock, mut conn, mut rx) = setup(config);

    conn.connect().await.expect("connect");

    assert_eq!(conn.state(), ConnectionState::Connecting);
    assert_eq!(conn.current_url(), Some("http://stream.test:8080/events?topic=a"));
    assert_eq!(conn.connected_url(), None);
    feed(&mock, &mut conn, &mut rx, status(200)).await;
    assert_eq!(conn.connected_url(), Some("http://stream.test:8080/events?topic=a"));
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/events?topic=a");
    assert_eq!(req.endpoint.host, "stream.test");
    assert_eq!(req.endpoint.port, 8080);
    assert_eq!(
        req.headers,
        vec![
            ("Accept".to_string(), "text/event-stream".to_string()),
            ("Authorization".to_string(), "Bearer t".to_string()),
            ("X-Trace".to_string(), "1".to_string()),
        ]
    );
}

#[tokio::test]
async fn data_after_ok_status_yields_events_in_order() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();

    let out = feed(&mock, &mut conn, &mut rx, status(200)).await;
    assert!(out.accepted);
    assert_eq!(conn.state(), ConnectionState::Connected);

    let out = feed(&mock, &mut conn, &mut rx, data("event: a\ndata: 1\n\nevent: b\nda")).await;
    let names: Vec<_> = out.events.iter().map(|e| e.event_name().to_string()).collect();
    assert_eq!(names, vec!["a"]);
    assert_eq!(conn.buffered_len(), "event: b\nda".len());

    let out = feed(&mock, &mut conn, &mut rx, data("ta: 2\n\n")).await;
    assert_eq!(out.events.len(), 1);
    assert_eq!(out.events[0].event_name(), "b");
    assert_eq!(out.events[0].data(), "2\n");
    assert_eq!(out.next, Next::Stay);
}

#[tokio::test]
async fn stream_end_reconnects_and_resets_buffer() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    let first = conn.request_id().unwrap();
    feed(&mock, &mut conn, &mut rx, status(200)).await;
    feed(&mock, &mut conn, &mut rx, data("data: partial")).await;
    assert!(conn.buffered_len() > 0);

    let out = feed(&mock, &mut conn, &mut rx, SignalKind::Done).await;
    assert_eq!(out.next, Next::Reconnect(ReconnectReason::StreamEnded));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(!conn.is_active());
    assert_eq!(conn.buffered_len(), 0);
    assert_eq!(mock.closed(), vec![first]);

    conn.follow(out.next).await.unwrap();
    assert_eq!(mock.request_count(), 2);
    assert_ne!(conn.request_id(), Some(first));
    assert_eq!(conn.state(), ConnectionState::Connecting);
}

#[tokio::test]
async fn cr_terminated_block_is_delivered_before_stream_end() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    feed(&mock, &mut conn, &mut rx, status(200)).await;

    let out = feed(&mock, &mut conn, &mut rx, data("data: a\r\r")).await;
    assert_eq!(out.events.len(), 1);
    assert_eq!(out.events[0].data(), "a\n");
    assert_eq!(conn.buffered_len(), 0);

    let out = feed(&mock, &mut conn, &mut rx, SignalKind::Done).await;
    assert!(out.events.is_empty());
    assert_eq!(out.next, Next::Reconnect(ReconnectReason::StreamEnded));
}

#[tokio::test]
async fn redirect_discards_body_and_follows_location() {
    let config = ClientConfig::new("http://a.test/old").header("X-Key", "k");
    let (mock, mut conn, mut rx) = setup(config);
    conn.connect().await.unwrap();
    let first = conn.request_id().unwrap();

    feed(&mock, &mut conn, &mut rx, status(307)).await;
    assert!(conn.redirecting());
    assert_eq!(conn.state(), ConnectionState::Redirecting);

    let out = feed(&mock, &mut conn, &mut rx, data("data: from-a\n\n")).await;
    assert!(out.events.is_empty());

    let out = feed(
        &mock,
        &mut conn,
        &mut rx,
        headers(&[("content-type", "text/plain"), ("Location", "http://b.test:81/new")]),
    )
    .await;
    assert_eq!(out.next, Next::Redirect("http://b.test:81/new".to_string()));
    assert!(!conn.redirecting());
    assert_eq!(mock.closed(), vec![first]);

    conn.follow(out.next).await.unwrap();
    let requests = mock.requests();
    let last = requests.last().unwrap();
    assert_eq!(last.endpoint.host, "b.test");
    assert_eq!(last.endpoint.port, 81);
    assert_eq!(last.path, "/new");
    assert!(last.headers.contains(&("X-Key".to_string(), "k".to_string())));
    assert_eq!(conn.connected_url(), None);
    feed(&mock, &mut conn, &mut rx, status(200)).await;
    assert_eq!(conn.connected_url(), Some("http://b.test:81/new"));
}

#[tokio::test]
async fn relative_location_resolves_against_current_url() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test:9000/v1/stream"));
    conn.connect().await.unwrap();
    feed(&mock, &mut conn, &mut rx, status(302)).await;
    let out = feed(&mock, &mut conn, &mut rx, headers(&[("location", "/v2/stream?x=1")])).await;
    assert_eq!(
        out.next,
        Next::Redirect("http://a.test:9000/v2/stream?x=1".to_string())
    );
}

#[tokio::test]
async fn redirect_without_location_reconnects_to_target() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    feed(&mock, &mut conn, &mut rx, status(301)).await;
    feed(&mock, &mut conn, &mut rx, headers(&[("content-length", "0")])).await;
    assert!(conn.redirecting());
    let out = feed(&mock, &mut conn, &mut rx, SignalKind::Done).await;
    assert_eq!(out.next, Next::Reconnect(ReconnectReason::MissingLocation));
}

#[tokio::test]
async fn connected_url_tracks_last_successful_response() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    feed(&mock, &mut conn, &mut rx, status(200)).await;
    assert_eq!(conn.connected_url(), Some("http://a.test/"));

    conn.follow(Next::Redirect("http://b.test/".to_string()))
        .await
        .unwrap();
    feed(&mock, &mut conn, &mut rx, status(502)).await;
    assert_eq!(conn.connected_url(), Some("http://a.test/"));
}

#[tokio::test]
async fn unexpected_status_reconnects() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    let out = feed(&mock, &mut conn, &mut rx, status(503)).await;
    assert_eq!(out.next, Next::Reconnect(ReconnectReason::UnexpectedStatus(503)));
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(mock.closed().len(), 1);
}

#[tokio::test]
async fn transport_error_reconnects() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    feed(&mock, &mut conn, &mut rx, status(200)).await;
    let out = feed(
        &mock,
        &mut conn,
        &mut rx,
        SignalKind::Error(TransportError::BodyRead("connection reset".into())),
    )
    .await;
    match out.next {
        Next::Reconnect(ReconnectReason::TransportError(message)) => {
            assert!(message.contains("connection reset"))
        }
        other => panic!("unexpected next step: {other:?}"),
    }
    assert!(!conn.is_active());
}

#[tokio::test]
async fn signals_from_superseded_request_are_dropped() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    let old = conn.request_id().unwrap();
    feed(&mock, &mut conn, &mut rx, status(200)).await;

    let next = conn.refresh();
    conn.follow(next).await.unwrap();
    let current = conn.request_id().unwrap();
    assert_ne!(old, current);

    mock.send(old, data("data: late\n\n")).await;
    let out = conn.handle_signal(rx.recv().await.unwrap());
    assert!(!out.accepted);
    assert!(out.events.is_empty());
    assert_eq!(out.next, Next::Stay);

    mock.send(old, SignalKind::Done).await;
    let out = conn.handle_signal(rx.recv().await.unwrap());
    assert!(!out.accepted);
    assert_eq!(conn.request_id(), Some(current));
    assert_eq!(conn.state(), ConnectionState::Connecting);
}

#[tokio::test]
async fn refresh_closes_handle_before_reconnecting_even_mid_redirect() {
    let (mock, mut conn, mut rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    let first = conn.request_id().unwrap();
    feed(&mock, &mut conn, &mut rx, status(307)).await;

    let next = conn.refresh();
    assert_eq!(next, Next::Reconnect(ReconnectReason::Refresh));
    assert_eq!(mock.closed(), vec![first]);
    assert!(!conn.redirecting());

    conn.follow(next).await.unwrap();
    assert_eq!(mock.request_count(), 2);
    assert!(conn.is_open_for_read());
}

#[tokio::test]
async fn idle_deadline_from_old_generation_is_ignored() {
    let config = ClientConfig::new("http://a.test/").idle_timeout(Duration::from_secs(5));
    let (mock, mut conn, mut rx) = setup(config);
    assert_eq!(conn.idle_deadline(), None);

    conn.connect().await.unwrap();
    assert_eq!(conn.idle_deadline(), Some(Duration::from_secs(5)));
    let armed = conn.generation();
    feed(&mock, &mut conn, &mut rx, status(200)).await;

    let next = conn.refresh();
    conn.follow(next).await.unwrap();
    assert_eq!(conn.on_idle_timeout(armed), Next::Stay);
    assert!(conn.is_active());

    let current = conn.generation();
    assert_eq!(
        conn.on_idle_timeout(current),
        Next::Reconnect(ReconnectReason::IdleTimeout)
    );
    assert!(!conn.is_active());
    assert_eq!(conn.on_idle_timeout(current), Next::Stay);
}

#[tokio::test]
async fn resolver_runs_on_every_connect() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let target = Target::resolver(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("http://node-{n}.test/events"))
    });
    let (mock, mut conn, _rx) = setup(ClientConfig::default().target(target));

    conn.connect().await.unwrap();
    conn.follow(Next::Reconnect(ReconnectReason::StreamEnded))
        .await
        .unwrap();

    let hosts: Vec<_> = mock
        .requests()
        .into_iter()
        .map(|r| r.endpoint.host)
        .collect();
    assert_eq!(hosts, vec!["node-0.test", "node-1.test"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn resolver_failure_is_reported() {
    let target = Target::resolver(|| Err("registry unavailable".into()));
    let (mock, mut conn, _rx) = setup(ClientConfig::default().target(target));
    match conn.connect().await {
        Err(SdkError::Resolve(message)) => assert!(message.contains("registry unavailable")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(mock.connect_count(), 0);
    assert!(!conn.is_active());
}

#[tokio::test]
async fn connect_failure_leaves_connection_disconnected() {
    let (mock, mut conn, _rx) = setup(ClientConfig::new("http://down.test/"));
    mock.fail_connects("down.test", 1);

    match conn.connect().await {
        Err(SdkError::Transport(TransportError::Network(_))) => {}
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(conn.request_id().is_none());

    conn.connect().await.expect("second attempt succeeds");
    assert!(conn.is_active());
}

#[tokio::test]
async fn dropping_connection_closes_transport() {
    let (mock, mut conn, _rx) = setup(ClientConfig::new("http://a.test/"));
    conn.connect().await.unwrap();
    let id = conn.request_id().unwrap();
    drop(conn);
    assert_eq!(mock.closed(), vec![id]);
}
