//! Tracks how far the current request has been received.

use bytes::BytesMut;
use http::Request;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use crate::codec::RequestDecoder;
use crate::protocol::body::ReqBody;
use crate::protocol::{Message, ParseError, PayloadItem, RequestHeader};

/// Progress of the request currently being received on a connection.
///
/// `Waiting -> InProgress` on the first byte, `InProgress -> Complete` once
/// head and body are decoded, `InProgress -> Upgraded` once a valid WebSocket
/// handshake head is decoded. `Complete` and `Upgraded` are final for the
/// request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    Waiting,
    InProgress,
    Complete,
    Upgraded,
}

impl AssemblyState {
    /// Whether the request is fully in hand, so the request deadline no longer applies.
    #[inline]
    pub fn is_assembled(&self) -> bool {
        matches!(self, AssemblyState::Complete | AssemblyState::Upgraded)
    }
}

/// Assembles one request at a time out of the connection's read buffer.
#[derive(Debug)]
pub struct RequestAssembler {
    decoder: RequestDecoder,
    state: AssemblyState,
    header: Option<RequestHeader>,
    body: ReqBody,
    request: Option<Request<ReqBody>>,
}

impl RequestAssembler {
    pub fn new() -> Self {
        Self { decoder: RequestDecoder::new(), state: AssemblyState::Waiting, header: None, body: ReqBody::empty(), request: None }
    }

    pub fn current_state(&self) -> AssemblyState {
        self.state
    }

    /// Feeds the buffered bytes through the decoder and returns the new state.
    ///
    /// Consumes at most one request from `src`; bytes of a pipelined next
    /// request stay in the buffer until [`RequestAssembler::reset`].
    pub fn observe(&mut self, src: &mut BytesMut) -> Result<AssemblyState, ParseError> {
        if self.state.is_assembled() {
            return Ok(self.state);
        }

        if self.state == AssemblyState::Waiting && !src.is_empty() {
            trace!(buffered = src.len(), "first request bytes arrived");
            self.state = AssemblyState::InProgress;
        }

        while let Some(message) = self.decoder.decode(src)? {
            match message {
                Message::Header((header, payload_size)) => {
                    trace!(method = %header.method(), uri = %header.uri(), ?payload_size, "request head decoded");
                    if header.is_websocket_upgrade() {
                        debug!(uri = %header.uri(), "websocket handshake received");
                        // a handshake carries no body, the decoder yields its eof right away
                        let _ = self.decoder.decode(src)?;
                        self.request = Some(header.body(ReqBody::empty()));
                        self.state = AssemblyState::Upgraded;
                        return Ok(self.state);
                    }
                    self.header = Some(header);
                }

                Message::Payload(PayloadItem::Chunk(bytes)) => self.body.push(bytes),

                Message::Payload(PayloadItem::Eof) => {
                    let header = self.header.take().ok_or_else(|| ParseError::invalid_body("payload without request head"))?;
                    let body = std::mem::take(&mut self.body);
                    self.request = Some(header.body(body));
                    self.state = AssemblyState::Complete;
                    return Ok(self.state);
                }
            }
        }

        Ok(self.state)
    }

    /// Hands out the assembled request, once.
    pub fn take_request(&mut self) -> Option<Request<ReqBody>> {
        self.request.take()
    }

    /// Starts the next request cycle of a kept-alive connection.
    pub fn reset(&mut self) {
        self.state = AssemblyState::Waiting;
        self.header = None;
        self.body = ReqBody::empty();
        self.request = None;
    }
}

impl Default for RequestAssembler {
    fn default() -> Self {
        Self::new()
    }
}
