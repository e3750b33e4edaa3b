//! An asynchronous HTTP/1.1 server that enforces request deadlines
//!
//! Every connection must deliver a complete request within the configured
//! request timeout. A client that is too slow, whether it sends nothing,
//! a partial head, a partial body or an unfinished WebSocket handshake, is
//! answered with `408 Request Timeout` and the body `Error: Request Timeout`,
//! and the connection is closed. Handlers only ever see complete requests.
//!
//! # Features
//!
//! - Request deadline per request cycle, re-armed on kept-alive connections
//! - Response deadline for slow handlers (`503`)
//! - Keep-alive idle timeout
//! - WebSocket upgrade hand-off, with `tokio-tungstenite` on top
//! - Chunked and content-length request bodies
//! - Per-server configuration, no process wide state
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use deadline_http::config::ServerConfig;
//! use deadline_http::handler::make_handler;
//! use deadline_http::protocol::body::ReqBody;
//! use deadline_http::server::Server;
//! use http::{Request, Response};
//! use http_body_util::Full;
//! use std::convert::Infallible;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::builder()
//!         .address("127.0.0.1:8080")
//!         .handler(make_handler(hello_world))
//!         .config(ServerConfig::builder().request_timeout_secs(0.6))
//!         .build()
//!         .expect("invalid server config");
//!
//!     server.start().await;
//! }
//!
//! async fn hello_world(_request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
//!     Ok(Response::new(Full::new(Bytes::from_static(b"OK"))))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`timeout`]: deadline timer, request assembly tracking and the supervisor
//!   deciding what a fired deadline means
//! - [`connection`]: the per-connection task that reads, supervises, dispatches
//!   and writes
//! - [`codec`]: request decoding and response encoding
//! - [`protocol`]: protocol types and errors
//! - [`handler`]: request handler trait and utilities
//! - [`config`]: validated timeout configuration
//! - [`server`]: the accept loop
//! - [`websocket`]: handshake helpers
//!
//! # Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type of a connection
//! - [`protocol::ParseError`]: Request parsing errors, answered with `400`
//! - [`protocol::SendError`]: Response sending errors
//! - [`protocol::TimeoutError`]: Missed deadlines, already answered on the wire
//! - [`config::ConfigError`]: Invalid timeouts, raised when the server is built
//!
//! # Limitations
//!
//! - HTTP/1.1 only
//! - No TLS support
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod timeout;
pub mod websocket;

mod utils;
pub(crate) use utils::ensure;
