//! HTTP connection handling module
//!
//! One [`HttpConnection`] drives one client connection on its own task:
//!
//! - reads bytes and feeds them to the request assembler
//! - enforces the request, response and keep-alive deadlines
//! - dispatches complete requests to the handler and writes the responses
//! - hands the raw IO over through [`OnUpgrade`] after a `101` response

mod http_connection;
mod upgrade;

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

pub use http_connection::HttpConnection;
pub use upgrade::Io;
pub use upgrade::OnUpgrade;
pub use upgrade::UpgradeError;
pub use upgrade::Upgraded;

/// Identifies a connection within one server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    /// request/response exchanges, the request deadline applies
    PlainRequest,
    /// switched protocols; the connection now belongs to application code
    UpgradedStream,
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub mode: ProtocolMode,
    pub created_at: Instant,
}

impl ConnectionInfo {
    pub fn new(id: ConnectionId) -> Self {
        Self { id, mode: ProtocolMode::PlainRequest, created_at: Instant::now() }
    }

    /// Time since the connection was accepted.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
