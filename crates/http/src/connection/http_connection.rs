use std::error::Error;
use std::fmt::{self, Display};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{FutureExt, SinkExt};
use http::{HeaderValue, Request, Response, StatusCode, header};
use http_body::Body;
use http_body_util::{BodyExt, Empty};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::sync::oneshot;
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info, warn};

use crate::codec::ResponseEncoder;
use crate::config::ServerConfig;
use crate::connection::upgrade::{OnUpgrade, Upgraded};
use crate::connection::{ConnectionId, ConnectionInfo, ProtocolMode};
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError, TimeoutError};
use crate::timeout::{
    Abort, AssemblyState, DeadlineTimer, RequestAssembler, SupervisorPhase, TimeoutSupervisor, TimeoutVerdict, TimerHandle,
};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Upper bound of non-blocking reads when a request deadline fires.
const MAX_DRAIN_READS: usize = 16;

/// An HTTP connection that receives requests under a deadline and writes the responses.
///
/// The connection runs on a single task. Socket reads, the request deadline,
/// the keep-alive deadline and the response deadline are all polled from that
/// task, so a deadline and a read never interleave.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    reader: R,
    framed_write: FramedWrite<W, ResponseEncoder>,
    read_buf: BytesMut,
    assembler: RequestAssembler,
    supervisor: TimeoutSupervisor,
    keep_alive_timer: DeadlineTimer,
    keep_alive_handle: Option<TimerHandle>,
    response_timer: DeadlineTimer,
    config: Arc<ServerConfig>,
    info: ConnectionInfo,
}

impl<R, W> fmt::Debug for HttpConnection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection")
            .field("info", &self.info)
            .field("assembler", &self.assembler)
            .field("supervisor", &self.supervisor)
            .field("buffered", &self.read_buf.len())
            .finish_non_exhaustive()
    }
}

enum Received {
    Request(Request<ReqBody>),
    Closed,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(id: ConnectionId, reader: R, writer: W, config: Arc<ServerConfig>) -> Self {
        Self {
            reader,
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            read_buf: BytesMut::with_capacity(READ_BUFFER_SIZE),
            assembler: RequestAssembler::new(),
            supervisor: TimeoutSupervisor::new(id, config.request_timeout()),
            keep_alive_timer: DeadlineTimer::new(),
            keep_alive_handle: None,
            response_timer: DeadlineTimer::new(),
            config,
            info: ConnectionInfo::new(id),
        }
    }

    /// Serves requests until the client leaves, a deadline ends the
    /// connection, or the protocol is switched.
    ///
    /// A missed request or response deadline is answered on the wire and then
    /// reported as [`HttpError::TimeoutError`].
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Send + Unpin,
        <H::RespBody as Body>::Error: Display + Send,
    {
        // the first request is timed from accept
        self.supervisor.begin_request();

        loop {
            let mut request = match self.receive_request().await? {
                Received::Request(request) => request,
                Received::Closed => return Ok(()),
            };

            let upgrade = (self.assembler.current_state() == AssemblyState::Upgraded).then(|| {
                let (tx, on_upgrade) = OnUpgrade::pair();
                request.extensions_mut().insert(on_upgrade);
                tx
            });

            let (parts, body) = request.into_parts();
            let header = RequestHeader::from(parts);
            let keep_alive = header.keep_alive();

            let switching = self.dispatch(handler.as_ref(), header.body(body)).await?;

            if let Some(tx) = upgrade
                && switching
            {
                self.hand_off(tx);
                return Ok(());
            }

            if !keep_alive {
                debug!(connection_id = %self.info.id, age_ms = self.info.age().as_millis(), "client asked to close, connection shutdown");
                self.shutdown().await?;
                return Ok(());
            }

            self.assembler.reset();
            self.supervisor.end_request();
            self.keep_alive_handle = self.keep_alive_timer.arm(self.config.keep_alive_timeout());
        }
    }

    /// Reads until the current request is assembled.
    async fn receive_request(&mut self) -> Result<Received, HttpError> {
        loop {
            let state = match self.assembler.observe(&mut self.read_buf) {
                Ok(state) => state,
                Err(e) => return Err(self.reject(e).await),
            };
            self.track(state);

            if state.is_assembled() {
                let request = self.assembler.take_request().ok_or_else(|| ParseError::invalid_body("assembled request already taken"))?;
                return Ok(Received::Request(request));
            }

            if self.read_buf.len() == self.read_buf.capacity() {
                self.read_buf.reserve(READ_BUFFER_SIZE);
            }

            select! {
                read = self.reader.read_buf(&mut self.read_buf) => match read {
                    Ok(0) => return self.on_eof(state),
                    Ok(_) => {}
                    Err(e) => return Err(ParseError::io(e).into()),
                },

                expired = self.supervisor.expired() => {
                    // bytes that arrived together with the deadline still count
                    self.drain_readable()?;
                    let state = match self.assembler.observe(&mut self.read_buf) {
                        Ok(state) => state,
                        Err(e) => return Err(self.reject(e).await),
                    };

                    if let TimeoutVerdict::Abort(abort) = self.supervisor.on_fired(expired, state) {
                        self.emit_abort(abort).await?;
                        return Err(TimeoutError::RequestTimeout { elapsed: expired.elapsed() }.into());
                    }
                }

                _ = self.keep_alive_timer.expired() => {
                    let age_ms = self.info.age().as_millis();
                    info!(connection_id = %self.info.id, age_ms, "keep-alive timeout, closing idle connection");
                    if let Err(e) = self.shutdown().await {
                        debug!(connection_id = %self.info.id, cause = %e, "shutdown of idle connection failed");
                    }
                    return Ok(Received::Closed);
                }
            }
        }
    }

    /// Moves the deadlines along with the assembly state.
    fn track(&mut self, state: AssemblyState) {
        if state == AssemblyState::Waiting {
            return;
        }

        if let Some(handle) = self.keep_alive_handle.take() {
            self.keep_alive_timer.cancel(handle);
        }

        // kept-alive connections time the next request from its first byte
        if self.supervisor.phase() == SupervisorPhase::Idle {
            self.supervisor.begin_request();
        }
        self.supervisor.observe(state);
    }

    fn drain_readable(&mut self) -> Result<(), ParseError> {
        for _ in 0..MAX_DRAIN_READS {
            match self.reader.read_buf(&mut self.read_buf).now_or_never() {
                Some(Ok(0)) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ParseError::io(e)),
            }
        }
        Ok(())
    }

    fn on_eof(&self, state: AssemblyState) -> Result<Received, HttpError> {
        if state == AssemblyState::Waiting {
            let age_ms = self.info.age().as_millis();
            info!(connection_id = %self.info.id, age_ms, "cant read more request, break this connection down");
            return Ok(Received::Closed);
        }
        Err(ParseError::Incomplete.into())
    }

    /// Answers a malformed request with `400` and hands the cause back.
    async fn reject(&mut self, e: ParseError) -> HttpError {
        error!(connection_id = %self.info.id, cause = %e, "can't receive next request");
        if let Err(send_error) = self.do_send_response(build_error_response(StatusCode::BAD_REQUEST)).await {
            warn!(connection_id = %self.info.id, cause = %send_error, "failed to send bad request response");
        }
        e.into()
    }

    /// Runs the handler under the response deadline and writes its response.
    ///
    /// Returns whether the written response switched protocols.
    async fn dispatch<H>(&mut self, handler: &H, request: Request<ReqBody>) -> Result<bool, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Send + Unpin,
        <H::RespBody as Body>::Error: Display + Send,
    {
        let handle = self.response_timer.arm(self.config.response_timeout());

        let result = select! {
            result = handler.call(request) => result,
            expired = self.response_timer.expired() => {
                info!(connection_id = %self.info.id, elapsed_ms = expired.elapsed().as_millis(), "response timeout");
                self.emit_abort(Abort::response_timeout()).await?;
                return Err(TimeoutError::ResponseTimeout { elapsed: expired.elapsed() }.into());
            }
        };

        if let Some(handle) = handle {
            self.response_timer.cancel(handle);
        }

        match result {
            Ok(response) => {
                let switching = response.status() == StatusCode::SWITCHING_PROTOCOLS;
                self.do_send_response(response).await?;
                Ok(switching)
            }
            Err(e) => {
                let cause: Box<dyn Error + Send + Sync> = e.into();
                error!(connection_id = %self.info.id, cause = %cause, "handle response error");
                self.do_send_response(build_error_response(StatusCode::INTERNAL_SERVER_ERROR)).await?;
                Ok(false)
            }
        }
    }

    /// Writes the timeout response and closes; a failed write is not retried.
    async fn emit_abort(&mut self, abort: Abort) -> Result<(), TimeoutError> {
        if let Err(e) = self.do_send_response(abort.into_response()).await {
            warn!(connection_id = %self.info.id, status = %abort.status, cause = %e, "failed to emit timeout response");
            return Err(TimeoutError::emit_failure(e));
        }

        if let Err(e) = self.shutdown().await {
            debug!(connection_id = %self.info.id, cause = %e, "shutdown after timeout response failed");
        }
        Ok(())
    }

    async fn do_send_response<T>(&mut self, response: Response<T>) -> Result<(), SendError>
    where
        T: Body + Unpin,
        T::Error: Display + Send,
    {
        let (header_parts, mut body) = response.into_parts();

        let payload_size = match body.size_hint().exact() {
            Some(length) => PayloadSize::new_length(length),
            None => PayloadSize::new_chunked(),
        };

        let header = Message::<_, T::Data>::Header((ResponseHead::from_parts(header_parts, ()), payload_size));
        self.framed_write.feed(header).await?;

        while let Some(frame) = body.frame().await {
            let frame = frame.map_err(|e| SendError::invalid_body(format!("resolve response body error: {e}")))?;
            // trailers are not written
            if let Ok(data) = frame.into_data() {
                self.framed_write.send(Message::Payload(PayloadItem::Chunk(data))).await?;
            }
        }

        // flushes the head of empty responses as well
        self.framed_write.send(Message::Payload(PayloadItem::<T::Data>::Eof)).await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), SendError> {
        self.framed_write.get_mut().shutdown().await.map_err(SendError::io)
    }

    /// Gives the raw connection to whoever awaits the [`OnUpgrade`].
    fn hand_off(self, tx: oneshot::Sender<Upgraded>) {
        let Self { reader, framed_write, read_buf, mut info, .. } = self;
        info.mode = ProtocolMode::UpgradedStream;

        let io = tokio::io::join(reader, framed_write.into_inner());
        match tx.send(Upgraded::new(Box::new(io), read_buf)) {
            Ok(()) => info!(connection_id = %info.id, mode = ?info.mode, age_ms = info.age().as_millis(), "switched protocols"),
            Err(_unclaimed) => debug!(connection_id = %info.id, "upgrade not awaited, connection dropped"),
        }
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::<Bytes>::new());
    *response.status_mut() = status_code;
    response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
