//! WebSocket opening handshake helpers.
//!
//! The connection detects the handshake and keeps it under the request
//! deadline until its head is complete. Answering it is up to the handler:
//! build the `101` with [`handshake_response`], take the [`OnUpgrade`] out of
//! the request and await it for the upgraded connection.
//!
//! [`OnUpgrade`]: crate::connection::OnUpgrade

use http::response::Builder;
use http::{Request, Response, StatusCode, header};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use crate::protocol::RequestHeader;

/// Whether `request` asks to switch to the WebSocket protocol.
pub fn is_upgrade_request<B>(request: &Request<B>) -> bool {
    let mut header = Request::new(());
    *header.method_mut() = request.method().clone();
    *header.version_mut() = request.version();
    *header.headers_mut() = request.headers().clone();
    RequestHeader::from(header).is_websocket_upgrade()
}

/// Starts the `101 Switching Protocols` answer to a WebSocket handshake.
///
/// Returns `None` when the request carries no `Sec-WebSocket-Key`.
pub fn handshake_response<B>(request: &Request<B>) -> Option<Builder> {
    let key = request.headers().get(header::SEC_WEBSOCKET_KEY)?;
    let accept = derive_accept_key(key.as_bytes());

    Some(
        Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_ACCEPT, accept),
    )
}
