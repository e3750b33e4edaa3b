//! HTTP request header handling.
//!
//! [`RequestHeader`] wraps `http::Request<()>` and adds the inspections the
//! connection needs before dispatch: whether a body follows, whether the
//! connection may be kept alive, and whether the request is a WebSocket
//! upgrade handshake.

use http::request::Parts;
use http::{HeaderMap, HeaderValue, Method, Request, Uri, Version, header};

/// The only WebSocket protocol version a handshake may ask for (RFC 6455).
const WEBSOCKET_VERSION: &[u8] = b"13";

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Returns false for methods that carry no body: GET, HEAD, DELETE, OPTIONS and CONNECT.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Whether the connection stays open after this request has been answered.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is sent,
    /// HTTP/1.0 only keeps the connection with an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get(header::CONNECTION);
        if has_token(connection, b"close") {
            return false;
        }

        match self.version() {
            Version::HTTP_11 => true,
            _ => has_token(connection, b"keep-alive"),
        }
    }

    /// Whether the header forms a valid WebSocket opening handshake.
    ///
    /// Checked fields: method `GET`, `Upgrade: websocket`, `Connection` listing
    /// `upgrade`, a `Sec-WebSocket-Key` and `Sec-WebSocket-Version: 13`.
    pub fn is_websocket_upgrade(&self) -> bool {
        if self.method() != Method::GET || self.version() != Version::HTTP_11 {
            return false;
        }

        let headers = self.headers();
        has_token(headers.get(header::UPGRADE), b"websocket")
            && has_token(headers.get(header::CONNECTION), b"upgrade")
            && headers.contains_key(header::SEC_WEBSOCKET_KEY)
            && headers.get(header::SEC_WEBSOCKET_VERSION).is_some_and(|v| v.as_bytes().trim_ascii() == WEBSOCKET_VERSION)
    }
}

/// Checks a comma separated header value for `token`, ignoring ASCII case.
fn has_token(value: Option<&HeaderValue>, token: &[u8]) -> bool {
    value.is_some_and(|value| value.as_bytes().split(|b| *b == b',').any(|item| item.trim_ascii().eq_ignore_ascii_case(token)))
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: Version, headers: &[(&str, &str)]) -> RequestHeader {
        let mut builder = Request::builder().method(Method::GET).uri("/ws1").version(version);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        RequestHeader::from(builder.body(()).unwrap())
    }

    const HANDSHAKE: [(&str, &str); 4] = [
        ("Upgrade", "websocket"),
        ("Connection", "upgrade"),
        ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
        ("Sec-WebSocket-Version", "13"),
    ];

    #[test]
    fn websocket_handshake() {
        assert!(header(Version::HTTP_11, &HANDSHAKE).is_websocket_upgrade());
    }

    #[test]
    fn websocket_handshake_with_token_list() {
        let headers = [
            ("Upgrade", "WebSocket"),
            ("Connection", "keep-alive, Upgrade"),
            ("Sec-WebSocket-Key", "dGhlIHNhbXBsZSBub25jZQ=="),
            ("Sec-WebSocket-Version", "13"),
        ];
        assert!(header(Version::HTTP_11, &headers).is_websocket_upgrade());
    }

    #[test]
    fn websocket_handshake_missing_key() {
        assert!(!header(Version::HTTP_11, &HANDSHAKE[..2]).is_websocket_upgrade());
    }

    #[test]
    fn websocket_handshake_wrong_version() {
        let mut headers = HANDSHAKE;
        headers[3] = ("Sec-WebSocket-Version", "8");
        assert!(!header(Version::HTTP_11, &headers).is_websocket_upgrade());
    }

    #[test]
    fn keep_alive_defaults() {
        assert!(header(Version::HTTP_11, &[]).keep_alive());
        assert!(!header(Version::HTTP_11, &[("Connection", "close")]).keep_alive());
        assert!(!header(Version::HTTP_10, &[]).keep_alive());
        assert!(header(Version::HTTP_10, &[("Connection", "Keep-Alive")]).keep_alive());
    }
}
