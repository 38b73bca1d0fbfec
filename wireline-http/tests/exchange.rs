//! Single request/response exchanges over an in-memory transport.
//!
//! These cover the request encodings as they reach the wire and the
//! response shapes a client has to walk: informational responses,
//! chunked bodies with trailers, HEAD and EOF-delimited content.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use wireline_http::{
    Connection, ConnectionStatus, HttpError, PreparedHeader, PreparedHeaderName,
    PreparedHeaderSet, ReadType, RequestHandle, Version, VersionPolicy,
};

// ── Helpers ─────────────────────────────────────────────────────────────

fn connect(version: Version) -> (Connection<DuplexStream>, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    (Connection::new(client, version), server)
}

async fn create(conn: &Connection<DuplexStream>) -> RequestHandle<DuplexStream> {
    conn.create_request(conn.version(), VersionPolicy::default())
        .await
        .unwrap()
        .expect("connection is open")
}

async fn create_or_none(conn: &Connection<DuplexStream>) -> Option<RequestHandle<DuplexStream>> {
    conn.create_request(Version::Http11, VersionPolicy::default())
        .await
        .unwrap()
}

async fn expect_received(server: &mut DuplexStream, expected: &[u8]) {
    let mut buf = vec![0; expected.len()];
    server.read_exact(&mut buf).await.unwrap();
    assert_eq!(
        String::from_utf8_lossy(&buf),
        String::from_utf8_lossy(expected)
    );
}

type Headers = Vec<(String, String)>;

fn header(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

async fn headers(request: &mut RequestHandle<DuplexStream>) -> Headers {
    let mut out = Headers::new();
    let mut sink = |name: &[u8], value: &[u8]| {
        out.push((
            String::from_utf8_lossy(name).into_owned(),
            String::from_utf8_lossy(value).into_owned(),
        ))
    };
    request.read_headers(&mut sink).await.unwrap();
    out
}

async fn body(request: &mut RequestHandle<DuplexStream>) -> Vec<u8> {
    assert!(request.read_to_content().await.unwrap());
    let mut body = Vec::new();
    request.read_content_to_end(&mut body).await.unwrap();
    body
}

// ── Requests on the wire ────────────────────────────────────────────────

#[tokio::test]
async fn chunked_post_with_trailers() {
    let (conn, mut server) = connect(Version::Http11);
    let mut request = create(&conn).await;

    request.configure_request(false, true).unwrap();
    request
        .write_request_start(b"POST", b"example.com", b"/upload")
        .unwrap();
    request.write_header(b"Content-Type", b"text/plain").unwrap();
    request.write_content(b"Wiki").await.unwrap();
    request.write_content_vectored(&[b"pe", b"dia"]).await.unwrap();
    request.write_trailing_header(b"X-Checksum", b"42").unwrap();
    request.complete_request().await.unwrap();
    request.complete_request().await.unwrap();

    expect_received(
        &mut server,
        b"POST /upload HTTP/1.1\r\nHost: example.com\r\nTransfer-Encoding: chunked\r\n\
          Content-Type: text/plain\r\n\r\n\
          4\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Checksum: 42\r\n\r\n",
    )
    .await;
}

#[tokio::test]
async fn prepared_headers() {
    let (conn, mut server) = connect(Version::Http11);
    let mut request = create(&conn).await;

    let common = PreparedHeaderSet::new();
    common.add(PreparedHeader::new("User-Agent", "wireline")).unwrap();
    common.add(PreparedHeader::new("Accept-Encoding", "gzip, deflate")).unwrap();
    let trace = PreparedHeaderName::new("X-Trace");

    request.configure_request(true, false).unwrap();
    request
        .write_request_start_uri(b"GET", "::1", Some(8080), b"/")
        .unwrap();
    request.write_prepared_headers(&common).unwrap();
    request
        .write_prepared_header(&PreparedHeader::new("Cache-Control", "no-cache"))
        .unwrap();
    request.write_header_with_name(&trace, b"abc").unwrap();
    request
        .write_header_values(b"Accept", &["text/html", "*/*"], b", ")
        .unwrap();
    request.complete_request().await.unwrap();

    expect_received(
        &mut server,
        b"GET / HTTP/1.1\r\nHost: [::1]:8080\r\n\
          User-Agent: wireline\r\nAccept-Encoding: gzip, deflate\r\n\
          Cache-Control: no-cache\r\nX-Trace: abc\r\nAccept: text/html, */*\r\n\r\n",
    )
    .await;
    assert!(common.is_frozen());
    assert!(matches!(
        common.add(PreparedHeader::new("X", "y")),
        Err(HttpError::Misuse(_))
    ));
}

#[tokio::test]
async fn http10_request() {
    let (conn, mut server) = connect(Version::Http10);
    let mut request = create(&conn).await;

    assert!(matches!(
        request.configure_request(false, true),
        Err(HttpError::Misuse(_))
    ));
    request.write_request_start(b"GET", b"h", b"/").unwrap();
    request.complete_request().await.unwrap();
    expect_received(&mut server, b"GET / HTTP/1.0\r\nHost: h\r\n\r\n").await;
    assert!(conn.failure().is_none());
}

#[tokio::test]
async fn connect_request() {
    let (conn, mut server) = connect(Version::Http11);
    let mut request = create(&conn).await;

    request.write_connect_request(b"example.com:443").unwrap();
    assert!(matches!(
        request.write_header(b"A", b"b"),
        Err(HttpError::Misuse(_))
    ));
    request.complete_request().await.unwrap();
    expect_received(&mut server, b"CONNECT example.com:443 HTTP/1.1\r\n\r\n").await;

    server
        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
        .await
        .unwrap();
    assert!(request.read_to_final_response().await.unwrap());
    assert_eq!(request.status_code().unwrap(), 200);
}

// ── Responses ───────────────────────────────────────────────────────────

#[tokio::test]
async fn chunked_response_with_trailers() {
    let (conn, mut server) = connect(Version::Http11);
    let mut request = create(&conn).await;
    request.write_request_start(b"GET", b"h", b"/").unwrap();
    request.complete_request().await.unwrap();

    server
        .write_all(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nX-Fold: a\r\n b\r\n\r\n\
              4\r\nWiki\r\n5;ext=1\r\npedia\r\n0\r\nX-Digest: abc\r\n\r\n",
        )
        .await
        .unwrap();

    assert!(request.read_to_headers().await.unwrap());
    assert_eq!(request.version().unwrap(), Some(Version::Http11));
    assert_eq!(
        headers(&mut request).await,
        [header("Transfer-Encoding", "chunked"), header("X-Fold", "a   b")]
    );
    assert_eq!(body(&mut request).await, b"Wikipedia");
    assert!(request.read_to_trailing_headers().await.unwrap());
    assert_eq!(
        headers(&mut request).await,
        [header("X-Digest", "abc")]
    );
    assert_eq!(request.read().await.unwrap(), ReadType::EndOfStream);
    assert_eq!(request.read_type().unwrap(), Some(ReadType::EndOfStream));
    request.dispose().await;
    assert_eq!(conn.status(), ConnectionStatus::Open);
}

#[tokio::test]
async fn expect_continue() {
    let (conn, mut server) = connect(Version::Http11);
    let mut request = create(&conn).await;

    request.configure_request(true, false).unwrap();
    request.write_request_start(b"PUT", b"h", b"/f").unwrap();
    request.write_header(b"Content-Length", b"4").unwrap();
    request.write_header(b"Expect", b"100-continue").unwrap();
    request.flush_headers().await.unwrap();
    expect_received(
        &mut server,
        b"PUT /f HTTP/1.1\r\nHost: h\r\nContent-Length: 4\r\nExpect: 100-continue\r\n\r\n",
    )
    .await;

    server.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.unwrap();
    assert_eq!(
        request.read().await.unwrap(),
        ReadType::InformationalResponse
    );
    assert_eq!(request.status_code().unwrap(), 100);

    request.write_content(b"data").await.unwrap();
    request.complete_request().await.unwrap();
    expect_received(&mut server, b"data").await;

    server
        .write_all(b"HTTP/1.1 201 Created\r\nContent-Length: 2\r\n\r\nok")
        .await
        .unwrap();
    assert!(request.read_to_final_response().await.unwrap());
    assert_eq!(request.status_code().unwrap(), 201);
    assert_eq!(body(&mut request).await, b"ok");
    request.dispose().await;
}

#[tokio::test]
async fn head_then_get() {
    let (conn, mut server) = connect(Version::Http11);

    let mut head = create(&conn).await;
    head.configure_request(true, false).unwrap();
    head.write_request_start(b"HEAD", b"h", b"/").unwrap();
    head.complete_request().await.unwrap();

    let mut get = create(&conn).await;
    get.configure_request(true, false).unwrap();
    get.write_request_start(b"GET", b"h", b"/").unwrap();
    get.complete_request().await.unwrap();

    // the HEAD response advertises a length but carries no content
    server
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n\
              HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello",
        )
        .await
        .unwrap();

    assert!(head.read_to_content().await.unwrap());
    let mut dst = [0u8; 8];
    assert_eq!(head.read_content(&mut dst).await.unwrap(), 0);
    head.dispose().await;

    assert_eq!(body(&mut get).await, b"hello");
    get.dispose().await;
    assert!(conn.failure().is_none());
}

#[tokio::test]
async fn eof_delimited_response() {
    let (conn, mut server) = connect(Version::Http11);
    let mut request = create(&conn).await;
    request.write_request_start(b"GET", b"h", b"/").unwrap();
    request.complete_request().await.unwrap();

    server.write_all(b"HTTP/1.0 200 OK\r\n\r\nbo").await.unwrap();
    server.write_all(b"dy").await.unwrap();
    drop(server);

    assert_eq!(body(&mut request).await, b"body");
    assert_eq!(request.version().unwrap(), Some(Version::Http10));
    request.dispose().await;

    assert_eq!(conn.status(), ConnectionStatus::Closed);
    assert!(conn.failure().is_none());
    assert!(
        create_or_none(&conn).await.is_none(),
        "a closing connection admits nothing"
    );
}

#[tokio::test]
async fn drain_with_limit() {
    let (conn, mut server) = connect(Version::Http11);
    let mut request = create(&conn).await;
    request.write_request_start(b"GET", b"h", b"/").unwrap();
    request.complete_request().await.unwrap();
    server
        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc")
        .await
        .unwrap();

    assert!(request.drain(3).await.unwrap());
    assert_eq!(request.read_type().unwrap(), Some(ReadType::EndOfStream));
    request.dispose().await;
}

// ── Errors ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn version_policies() {
    let (conn, _server) = connect(Version::Http11);
    assert!(matches!(
        conn.create_request(Version::Http10, VersionPolicy::RequestVersionExact)
            .await,
        Err(HttpError::VersionMismatch {
            requested: Version::Http10,
            connection: Version::Http11,
        })
    ));
    assert!(matches!(
        conn.create_request(Version::Http10, VersionPolicy::RequestVersionOrLower)
            .await,
        Err(HttpError::VersionMismatch { .. })
    ));
    let request = conn
        .create_request(Version::Http10, VersionPolicy::RequestVersionOrHigher)
        .await
        .unwrap();
    assert!(request.is_some());

    let (conn, _server) = connect(Version::Http10);
    let request = conn
        .create_request(Version::Http11, VersionPolicy::RequestVersionOrLower)
        .await
        .unwrap();
    assert!(request.is_some());
    assert!(conn.failure().is_none());
}

#[tokio::test]
async fn misuse_leaves_the_connection_usable() {
    let (conn, mut server) = connect(Version::Http11);
    let mut request = create(&conn).await;

    assert!(matches!(
        request.write_header(b"A", b"b"),
        Err(HttpError::Misuse(_))
    ));
    assert!(matches!(
        request.flush_content().await,
        Err(HttpError::Misuse(_))
    ));
    assert!(conn.failure().is_none());

    request.configure_request(true, false).unwrap();
    request.write_request_start(b"GET", b"h", b"/").unwrap();
    assert!(matches!(
        request.write_request_start(b"GET", b"h", b"/"),
        Err(HttpError::Misuse(_))
    ));
    request.complete_request().await.unwrap();
    expect_received(&mut server, b"GET / HTTP/1.1\r\nHost: h\r\n\r\n").await;

    server
        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
        .await
        .unwrap();
    assert!(body(&mut request).await.is_empty());
    assert_eq!(request.status_code().unwrap(), 404);
    request.dispose().await;
    assert_eq!(conn.status(), ConnectionStatus::Open);
}
