//! Hands the raw connection over to application code after a `101 Switching Protocols`.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use bytes::BytesMut;
use http::Request;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Role;

/// Byte stream of an upgraded connection.
pub trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

#[derive(Error, Debug)]
pub enum UpgradeError {
    #[error("connection closed without switching protocols")]
    Canceled,

    #[error("upgrade was already taken")]
    AlreadyTaken,
}

/// The connection after the `101` response has been written.
///
/// `read_buf` holds bytes the client sent right behind the handshake; they
/// belong to the new protocol and must be read before `io`.
pub struct Upgraded {
    io: Box<dyn Io>,
    read_buf: BytesMut,
}

impl Upgraded {
    pub(crate) fn new(io: Box<dyn Io>, read_buf: BytesMut) -> Self {
        Self { io, read_buf }
    }

    pub fn into_parts(self) -> (Box<dyn Io>, BytesMut) {
        (self.io, self.read_buf)
    }

    /// Continues the connection as the server side of a WebSocket.
    pub async fn into_websocket(self) -> WebSocketStream<Box<dyn Io>> {
        WebSocketStream::from_partially_read(self.io, self.read_buf.to_vec(), Role::Server, None).await
    }
}

impl fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgraded").field("buffered", &self.read_buf.len()).finish_non_exhaustive()
    }
}

/// A future of the [`Upgraded`] connection, found in the extensions of
/// requests that carry a WebSocket handshake.
///
/// It resolves once the handler's `101` response has been written; if the
/// handler answers anything else the future fails with [`UpgradeError::Canceled`].
#[derive(Clone)]
pub struct OnUpgrade {
    rx: Arc<Mutex<Option<oneshot::Receiver<Upgraded>>>>,
}

impl OnUpgrade {
    pub(crate) fn pair() -> (oneshot::Sender<Upgraded>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx: Arc::new(Mutex::new(Some(rx))) })
    }

    /// Removes the pending upgrade from `request`, if it has one.
    pub fn on<B>(request: &mut Request<B>) -> Option<Self> {
        request.extensions_mut().remove::<Self>()
    }

    fn take(&self) -> Option<oneshot::Receiver<Upgraded>> {
        self.rx.lock().ok().and_then(|mut rx| rx.take())
    }
}

impl IntoFuture for OnUpgrade {
    type Output = Result<Upgraded, UpgradeError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        let rx = self.take();
        Box::pin(async move {
            let rx = rx.ok_or(UpgradeError::AlreadyTaken)?;
            rx.await.map_err(|_canceled| UpgradeError::Canceled)
        })
    }
}

impl fmt::Debug for OnUpgrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnUpgrade").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[tokio::test]
    async fn delivers_io_and_leftover() {
        let (tx, on_upgrade) = OnUpgrade::pair();
        let mut request = Request::new(());
        request.extensions_mut().insert(on_upgrade);

        let on_upgrade = OnUpgrade::on(&mut request).unwrap();
        assert!(OnUpgrade::on(&mut request).is_none());

        let (server, mut client) = duplex(64);
        tx.send(Upgraded::new(Box::new(server), BytesMut::from("early"))).unwrap();

        let (mut io, read_buf) = on_upgrade.await.unwrap().into_parts();
        assert_eq!(&read_buf[..], b"early");

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        io.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }

    #[tokio::test]
    async fn dropped_sender_cancels() {
        let (tx, on_upgrade) = OnUpgrade::pair();
        drop(tx);
        assert!(matches!(on_upgrade.await, Err(UpgradeError::Canceled)));
    }

    #[tokio::test]
    async fn clones_share_one_upgrade() {
        let (_tx, on_upgrade) = OnUpgrade::pair();
        let other = on_upgrade.clone();
        drop(on_upgrade.into_future());
        assert!(matches!(other.await, Err(UpgradeError::AlreadyTaken)));
    }
}
