use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::client_async;
use tokio_tungstenite::tungstenite::Message;

use deadline_http::config::{ServerConfig, ServerConfigBuilder};
use deadline_http::connection::OnUpgrade;
use deadline_http::handler::make_handler;
use deadline_http::protocol::body::ReqBody;
use deadline_http::server::Server;
use deadline_http::websocket::handshake_response;

const GET_1: &str = "GET /1 HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n";

const GET_WS1: &str = concat!(
    "GET /ws1 HTTP/1.1\r\n",
    "Host: 127.0.0.1\r\n",
    "Upgrade: websocket\r\n",
    "Connection: upgrade\r\n",
    "Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n",
    "Sec-WebSocket-Version: 13\r\n",
    "\r\n",
);

async fn route(mut request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match request.uri().path() {
        "/1" => Response::new(Full::new(Bytes::from_static(b"OK"))),

        "/slow" => {
            sleep(Duration::from_secs(2)).await;
            Response::new(Full::new(Bytes::from_static(b"late")))
        }

        "/ws1" => {
            let builder = handshake_response(&request).unwrap();
            let on_upgrade = OnUpgrade::on(&mut request).unwrap();
            tokio::spawn(async move {
                let mut ws = on_upgrade.await.unwrap().into_websocket().await;
                ws.send(Message::text("OK")).await.unwrap();
                ws.close(None).await.unwrap();
            });
            builder.body(Full::new(Bytes::new())).unwrap()
        }

        _ => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        }
    };
    Ok(response)
}

async fn start_server(config: ServerConfigBuilder) -> SocketAddr {
    let server = Server::builder().address("127.0.0.1:0").handler(make_handler(route)).config(config).build().unwrap();
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

struct RawResponse {
    status: u16,
    head: String,
    body: String,
}

impl RawResponse {
    fn parse(raw: &[u8]) -> Self {
        let raw = String::from_utf8_lossy(raw);
        let (head, body) = raw.split_once("\r\n\r\n").expect("incomplete response");
        let status = head.split(' ').nth(1).and_then(|code| code.parse().ok()).expect("no status code");
        Self { status, head: head.to_owned(), body: body.to_owned() }
    }
}

/// Connects, holds the request back for `delay` and then sends it.
///
/// Whatever the server sends meanwhile is kept; if it closes the connection
/// during the delay the request is never sent.
async fn delayed_request(addr: SocketAddr, delay: Duration, request: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut buf = Vec::new();

    if timeout(delay, stream.read_to_end(&mut buf)).await.is_err() {
        stream.write_all(request.as_bytes()).await.unwrap();
        stream.read_to_end(&mut buf).await.unwrap();
    }

    RawResponse::parse(&buf)
}

/// Reads one `OK` response off a kept-alive connection.
async fn read_ok(stream: &mut TcpStream) -> RawResponse {
    let mut buf = Vec::new();
    while !buf.ends_with(b"\r\n\r\nOK") {
        let n = stream.read_buf(&mut buf).await.unwrap();
        assert_ne!(n, 0, "connection closed early: {}", String::from_utf8_lossy(&buf));
    }
    RawResponse::parse(&buf)
}

fn fast_timeout() -> ServerConfigBuilder {
    ServerConfig::builder().request_timeout_secs(0.6)
}

#[tokio::test]
async fn slow_client_gets_request_timeout() {
    let addr = start_server(fast_timeout()).await;

    let response = delayed_request(addr, Duration::from_secs(2), GET_1).await;
    assert_eq!(response.status, 408);
    assert_eq!(response.body, "Error: Request Timeout");
    assert!(response.head.contains("connection: close"));
}

#[tokio::test]
async fn client_in_time_is_served() {
    let addr = start_server(fast_timeout()).await;

    let response = delayed_request(addr, Duration::from_millis(200), GET_1).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "OK");
}

#[tokio::test]
async fn servers_are_configured_independently() {
    let timed = start_server(fast_timeout()).await;
    let untimed = start_server(ServerConfig::builder().request_timeout_secs(0.0)).await;

    let (timed, untimed) = tokio::join!(
        delayed_request(timed, Duration::from_secs(1), GET_1),
        delayed_request(untimed, Duration::from_secs(1), GET_1),
    );
    assert_eq!(timed.status, 408);
    assert_eq!(untimed.status, 200);
    assert_eq!(untimed.body, "OK");
}

#[tokio::test]
async fn slow_websocket_handshake_gets_request_timeout() {
    let addr = start_server(fast_timeout()).await;

    let response = delayed_request(addr, Duration::from_secs(2), GET_WS1).await;
    assert_eq!(response.status, 408);
    assert_eq!(response.body, "Error: Request Timeout");
}

#[tokio::test]
async fn completed_handshake_is_not_timed_out() {
    let addr = start_server(fast_timeout()).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut ws, response) = client_async(format!("ws://{addr}/ws1"), stream).await.unwrap();
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    // well past the request deadline
    sleep(Duration::from_secs(1)).await;

    let message = ws.next().await.unwrap().unwrap();
    assert_eq!(message.to_text().unwrap(), "OK");
}

#[tokio::test]
async fn keep_alive_idle_time_is_not_a_request_timeout() {
    let addr = start_server(fast_timeout().keep_alive_timeout_secs(5.0)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /1 HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").await.unwrap();
    assert_eq!(read_ok(&mut stream).await.status, 200);

    sleep(Duration::from_secs(1)).await;

    stream.write_all(b"GET /1 HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").await.unwrap();
    assert_eq!(read_ok(&mut stream).await.status, 200);
}

#[tokio::test]
async fn idle_keep_alive_connection_is_closed_silently() {
    let addr = start_server(fast_timeout().keep_alive_timeout_secs(0.3)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GET /1 HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").await.unwrap();

    let mut buf = Vec::new();
    timeout(Duration::from_secs(2), stream.read_to_end(&mut buf)).await.unwrap().unwrap();

    let response = RawResponse::parse(&buf);
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "OK");
}

#[tokio::test]
async fn slow_handler_gets_response_timeout() {
    let addr = start_server(fast_timeout().response_timeout_secs(0.5)).await;

    let response = delayed_request(addr, Duration::ZERO, "GET /slow HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").await;
    assert_eq!(response.status, 503);
    assert_eq!(response.body, "Error: Response Timeout");
}
