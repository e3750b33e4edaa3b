//! TCP accept loop that runs every connection under the server's timeouts.

use std::fmt::{self, Display};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use http_body::Body;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::{ConfigError, ServerConfig, ServerConfigBuilder};
use crate::connection::{ConnectionId, HttpConnection};
use crate::handler::Handler;
use crate::protocol::HttpError;

pub struct ServerBuilder<H> {
    handler: Option<H>,
    address: Option<io::Result<Vec<SocketAddr>>>,
    config: ServerConfigBuilder,
}

impl<H> fmt::Debug for ServerBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("has_handler", &self.handler.is_some())
            .field("address", &self.address)
            .field("config", &self.config)
            .finish()
    }
}

impl<H> ServerBuilder<H> {
    fn new() -> Self {
        Self { handler: None, address: None, config: ServerConfig::builder() }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Timeouts for this server only; validated by [`ServerBuilder::build`].
    pub fn config(mut self, config: ServerConfigBuilder) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Server<H>, ServerBuildError> {
        let handler = self.handler.ok_or(ServerBuildError::MissingHandler)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(|source| ServerBuildError::InvalidAddress { source })?;
        let config = self.config.build()?;

        Ok(Server { handler: Arc::new(handler), address, config: Arc::new(config), next_id: AtomicU64::new(0) })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("handler must be set")]
    MissingHandler,

    #[error("address must be set")]
    MissingAddress,

    #[error("invalid address: {source}")]
    InvalidAddress { source: io::Error },

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
}

/// An HTTP/1.1 server with its own timeout configuration.
///
/// Connection ids are unique per server instance.
pub struct Server<H> {
    handler: Arc<H>,
    address: Vec<SocketAddr>,
    config: Arc<ServerConfig>,
    next_id: AtomicU64,
}

impl<H> fmt::Debug for Server<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("address", &self.address).field("config", &self.config).finish_non_exhaustive()
    }
}

impl<H> Server<H>
where
    H: Handler + Send + 'static,
    H::RespBody: Body<Data = Bytes> + Send + Unpin,
    <H::RespBody as Body>::Error: Display + Send,
{
    pub fn builder() -> ServerBuilder<H> {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub async fn bind(&self) -> io::Result<TcpListener> {
        TcpListener::bind(self.address.as_slice()).await
    }

    /// Binds the configured address and serves until the task is dropped.
    pub async fn start(self) {
        let tcp_listener = match self.bind().await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, address = ?self.address, "bind server error");
                return;
            }
        };

        self.serve(tcp_listener).await;
    }

    /// Accepts connections from `tcp_listener`, each one on its own task.
    pub async fn serve(self, tcp_listener: TcpListener) {
        info!(address = ?tcp_listener.local_addr().ok(), config = ?self.config, "start listening");

        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
            let handler = Arc::clone(&self.handler);
            let config = Arc::clone(&self.config);

            tokio::spawn(async move {
                info!(connection_id = %id, %remote_addr, "connection accepted");
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::new(id, reader, writer, config);
                match connection.process(handler).await {
                    Ok(()) => {
                        info!(connection_id = %id, "finished process, connection shutdown");
                    }
                    Err(HttpError::TimeoutError { source }) => {
                        info!(connection_id = %id, cause = %source, "connection closed on timeout");
                    }
                    Err(e) => {
                        error!(connection_id = %id, cause = %e, "service has error, connection shutdown");
                    }
                }
            });
        }
    }
}
