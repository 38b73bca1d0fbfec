//! Pipelining integration tests.
//!
//! Each test drives a `Connection` over an in-memory duplex stream and
//! plays the server by hand: reading the exact request bytes expected and
//! writing canned responses.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_test::{assert_pending, assert_ready, task};
use wireline_http::{
    Connection, ConnectionConfig, ConnectionStatus, HttpError, ReadType, RequestHandle, Version,
    VersionPolicy,
};

// ── Helpers ─────────────────────────────────────────────────────────────

const EXACT: VersionPolicy = VersionPolicy::RequestVersionExact;

fn connect() -> (Connection<DuplexStream>, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    (Connection::new(client, Version::Http11), server)
}

async fn create(conn: &Connection<DuplexStream>) -> RequestHandle<DuplexStream> {
    conn.create_request(Version::Http11, EXACT)
        .await
        .unwrap()
        .expect("connection is open")
}

/// Write a bodiless GET and complete it.
async fn get(request: &mut RequestHandle<DuplexStream>, path: &str) {
    request.configure_request(true, false).unwrap();
    request
        .write_request_start(b"GET", b"h", path.as_bytes())
        .unwrap();
    request.complete_request().await.unwrap();
}

fn get_bytes(path: &str) -> Vec<u8> {
    format!("GET {path} HTTP/1.1\r\nHost: h\r\n\r\n").into_bytes()
}

async fn expect_received(server: &mut DuplexStream, expected: &[u8]) {
    let mut buf = vec![0; expected.len()];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(
        String::from_utf8_lossy(&buf),
        String::from_utf8_lossy(expected)
    );
}

async fn body(request: &mut RequestHandle<DuplexStream>) -> Vec<u8> {
    assert!(request.read_to_content().await.unwrap());
    let mut body = Vec::new();
    request.read_content_to_end(&mut body).await.unwrap();
    body
}

fn ok(body: &str) -> String {
    format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}", body.len())
}

// ── Turn order ──────────────────────────────────────────────────────────

#[tokio::test]
async fn writers_are_admitted_in_order() {
    let (conn, mut server) = connect();

    let mut first = create(&conn).await;
    let mut second = task::spawn(conn.create_request(Version::Http11, EXACT));
    let mut third = task::spawn(conn.create_request(Version::Http11, EXACT));
    assert_pending!(second.poll());
    assert_pending!(third.poll());
    assert_eq!(conn.active_requests(), 3);

    get(&mut first, "/1").await;
    assert!(matches!(
        first.write_header(b"A", b"b"),
        Err(HttpError::Misuse(_))
    ));
    assert!(second.is_woken());
    let mut second = assert_ready!(second.poll()).unwrap().unwrap();
    assert_pending!(third.poll());

    get(&mut second, "/2").await;
    assert!(third.is_woken());
    let mut third = assert_ready!(third.poll()).unwrap().unwrap();
    get(&mut third, "/3").await;

    let mut expected = get_bytes("/1");
    expected.extend(get_bytes("/2"));
    expected.extend(get_bytes("/3"));
    expect_received(&mut server, &expected).await;
}

#[tokio::test]
async fn readers_wait_for_earlier_responses() {
    let (conn, mut server) = connect();

    let mut first = create(&conn).await;
    get(&mut first, "/1").await;
    let mut second = create(&conn).await;
    get(&mut second, "/2").await;

    server
        .write_all(format!("{}{}", ok("one"), ok("two")).as_bytes())
        .await
        .unwrap();

    {
        let mut read = task::spawn(second.read());
        assert_pending!(read.poll());

        assert_eq!(body(&mut first).await, b"one");
        assert_eq!(first.read().await.unwrap(), ReadType::EndOfStream);
        first.dispose().await;
        assert!(read.is_woken());
    }

    assert_eq!(body(&mut second).await, b"two");
    assert_eq!(second.status_code().unwrap(), 200);
    second.dispose().await;
    assert_eq!(conn.active_requests(), 0);
    assert_eq!(conn.status(), ConnectionStatus::Open);
}

#[tokio::test]
async fn writes_overlap_reads() {
    let (conn, mut server) = connect();

    let mut first = create(&conn).await;
    get(&mut first, "/1").await;
    server.write_all(ok("one").as_bytes()).await.unwrap();

    // the second request writes while the first still holds the read turn
    let mut second = create(&conn).await;
    assert!(first.read_to_final_response().await.unwrap());
    get(&mut second, "/2").await;

    let mut expected = get_bytes("/1");
    expected.extend(get_bytes("/2"));
    expect_received(&mut server, &expected).await;

    assert_eq!(body(&mut first).await, b"one");
    first.dispose().await;
    server.write_all(ok("two").as_bytes()).await.unwrap();
    assert_eq!(body(&mut second).await, b"two");
    second.dispose().await;
}

#[tokio::test]
async fn dispose_drains_unread_responses() {
    let (conn, mut server) = connect();

    let mut first = create(&conn).await;
    get(&mut first, "/1").await;
    let mut second = create(&conn).await;
    get(&mut second, "/2").await;

    server
        .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\nX-T: 1\r\n\r\n")
        .await
        .unwrap();
    server.write_all(ok("two").as_bytes()).await.unwrap();

    first.dispose().await;
    assert_eq!(body(&mut second).await, b"two");
    second.dispose().await;
    assert_eq!(conn.status(), ConnectionStatus::Open);
}

#[tokio::test]
async fn slots_are_recycled() {
    let (conn, mut server) = connect();

    for i in 0..4 {
        let mut request = create(&conn).await;
        get(&mut request, "/").await;
        server.write_all(ok(&i.to_string()).as_bytes()).await.unwrap();
        assert_eq!(body(&mut request).await, i.to_string().as_bytes());
        request.dispose().await;
        expect_received(&mut server, &get_bytes("/")).await;
    }
    assert_eq!(conn.active_requests(), 0);
}

// ── Closing ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn connection_close_fails_queued_readers() {
    let (conn, mut server) = connect();

    let mut first = create(&conn).await;
    get(&mut first, "/1").await;
    let mut second = create(&conn).await;
    get(&mut second, "/2").await;

    server
        .write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 2\r\n\r\nok")
        .await
        .unwrap();

    assert_eq!(body(&mut first).await, b"ok");
    first.dispose().await;

    assert!(matches!(second.read().await, Err(HttpError::ConnectionClosed)));
    assert!(matches!(second.read().await, Err(HttpError::ConnectionClosed)));
    assert!(
        conn.create_request(Version::Http11, EXACT)
            .await
            .unwrap()
            .is_none()
    );

    second.dispose().await;
    assert_eq!(conn.status(), ConnectionStatus::Closed);
    assert!(conn.failure().is_none());
}

#[tokio::test]
async fn close_before_write_shuts_down_the_transport() {
    let (conn, mut server) = connect();

    let mut first = create(&conn).await;
    get(&mut first, "/1").await;
    let mut second = create(&conn).await;

    server
        .write_all(b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 0\r\n\r\n")
        .await
        .unwrap();
    assert!(first.read_to_content().await.unwrap());

    // the write already in progress still goes out, followed by shutdown
    get(&mut second, "/2").await;
    assert_eq!(conn.status(), ConnectionStatus::Closing);

    let mut received = Vec::new();
    server.read_to_end(&mut received).await.unwrap();
    let mut expected = get_bytes("/1");
    expected.extend(get_bytes("/2"));
    assert_eq!(received, expected);

    first.dispose().await;
    assert!(matches!(second.read().await, Err(HttpError::ConnectionClosed)));
}

#[tokio::test]
async fn oversized_drain_closes_the_connection() {
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let conn = Connection::with_config(
        client,
        ConnectionConfig {
            max_drain_size: Some(4),
            drain_buffer_size: 2,
            ..ConnectionConfig::default()
        },
    );

    let mut first = create(&conn).await;
    get(&mut first, "/1").await;
    let mut second = create(&conn).await;
    get(&mut second, "/2").await;
    server.write_all(ok("0123456789").as_bytes()).await.unwrap();

    first.dispose().await;
    assert!(matches!(second.read().await, Err(HttpError::ConnectionClosed)));
}

#[tokio::test]
async fn drain_limit_holds_after_reaching_content() {
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let conn = Connection::with_config(
        client,
        ConnectionConfig {
            max_drain_size: Some(4),
            drain_buffer_size: 2,
            ..ConnectionConfig::default()
        },
    );

    let mut first = create(&conn).await;
    get(&mut first, "/1").await;
    let mut second = create(&conn).await;
    get(&mut second, "/2").await;
    server
        .write_all(ok("0123456789abcdefghij").as_bytes())
        .await
        .unwrap();

    assert!(first.read_to_content().await.unwrap());
    assert!(!first.drain(4).await.unwrap());
    first.dispose().await;
    assert!(matches!(second.read().await, Err(HttpError::ConnectionClosed)));
}

// ── Failure latch ───────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_response_fails_everyone() {
    let (conn, mut server) = connect();

    let mut first = create(&conn).await;
    get(&mut first, "/1").await;
    let mut second = create(&conn).await;
    get(&mut second, "/2").await;
    let third = conn.create_request(Version::Http11, EXACT);

    server.write_all(b"HTTP/1.1 2x0 OK\r\n\r\n").await.unwrap();

    let Err(HttpError::ConnectionFailed(root)) = first.read().await else {
        panic!("expected a connection failure");
    };
    assert!(matches!(root.as_ref(), HttpError::Parse(_)));
    assert!(Arc::ptr_eq(&root, &conn.failure().unwrap()));
    assert_eq!(conn.status(), ConnectionStatus::Closed);

    let Err(HttpError::ConnectionFailed(again)) = second.read().await else {
        panic!("expected the latched failure");
    };
    assert!(Arc::ptr_eq(&root, &again));
    assert!(matches!(
        first.read().await,
        Err(HttpError::ConnectionFailed(_))
    ));
    assert!(matches!(third.await, Err(HttpError::ConnectionFailed(_))));

    first.dispose().await;
    second.dispose().await;
    assert_eq!(conn.active_requests(), 0);
}

#[tokio::test]
async fn premature_eof_fails_the_connection() {
    let (conn, mut server) = connect();

    let mut request = create(&conn).await;
    get(&mut request, "/").await;
    server
        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc")
        .await
        .unwrap();
    drop(server);

    assert!(request.read_to_content().await.unwrap());
    let mut dst = [0u8; 16];
    assert_eq!(request.read_content(&mut dst).await.unwrap(), 3);
    let err = request.read_content(&mut dst).await.unwrap_err();
    assert!(matches!(err.root(), HttpError::UnexpectedEof));
    assert!(conn.failure().is_some());
}

// ── Abandoning ──────────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_admission_is_skipped() {
    let (conn, mut server) = connect();

    let mut first = create(&conn).await;
    {
        let mut skipped = task::spawn(conn.create_request(Version::Http11, EXACT));
        assert_pending!(skipped.poll());
        assert_eq!(conn.active_requests(), 2);
    }
    assert_eq!(conn.active_requests(), 1);

    let mut third = task::spawn(conn.create_request(Version::Http11, EXACT));
    assert_pending!(third.poll());
    get(&mut first, "/1").await;
    let mut third = assert_ready!(third.poll()).unwrap().unwrap();
    get(&mut third, "/3").await;

    server
        .write_all(format!("{}{}", ok("one"), ok("three")).as_bytes())
        .await
        .unwrap();
    assert_eq!(body(&mut first).await, b"one");
    first.dispose().await;
    assert_eq!(body(&mut third).await, b"three");
    third.dispose().await;
}

#[tokio::test]
async fn unstarted_request_is_skipped() {
    let (conn, mut server) = connect();

    let unused = create(&conn).await;
    let mut next = task::spawn(conn.create_request(Version::Http11, EXACT));
    assert_pending!(next.poll());

    drop(unused);
    assert!(next.is_woken());
    let mut next = assert_ready!(next.poll()).unwrap().unwrap();
    get(&mut next, "/").await;
    expect_received(&mut server, &get_bytes("/")).await;

    server.write_all(ok("x").as_bytes()).await.unwrap();
    assert_eq!(body(&mut next).await, b"x");
    next.dispose().await;
    assert!(conn.failure().is_none());
}

#[tokio::test]
async fn dropping_a_started_request_fails_the_connection() {
    let (conn, _server) = connect();

    let mut request = create(&conn).await;
    request.write_request_start(b"POST", b"h", b"/").unwrap();
    drop(request);

    assert!(matches!(
        conn.failure().as_deref(),
        Some(HttpError::Abandoned)
    ));
    assert!(matches!(
        conn.create_request(Version::Http11, EXACT).await,
        Err(HttpError::ConnectionFailed(_))
    ));
}

#[tokio::test]
async fn dropping_a_finished_request_keeps_the_connection() {
    let (conn, mut server) = connect();

    let mut request = create(&conn).await;
    get(&mut request, "/").await;
    server.write_all(ok("x").as_bytes()).await.unwrap();
    assert_eq!(body(&mut request).await, b"x");
    assert_eq!(request.read().await.unwrap(), ReadType::EndOfStream);
    drop(request);

    assert!(conn.failure().is_none());
    assert_eq!(conn.active_requests(), 0);
    let _next = create(&conn).await;
}
