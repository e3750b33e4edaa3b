use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header};
use http_body_util::Full;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::connection::ConnectionId;
use crate::timeout::assembly::AssemblyState;
use crate::timeout::timer::{DeadlineTimer, Expired, TimerHandle};

/// Body of the response sent when a request is not received in time.
pub const REQUEST_TIMEOUT_BODY: &str = "Error: Request Timeout";

/// Body of the response sent when a handler does not answer in time.
pub const RESPONSE_TIMEOUT_BODY: &str = "Error: Response Timeout";

/// Why a connection has to be aborted with an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    RequestTimeout,
    ResponseTimeout,
}

/// Signal to the response writer: answer with this error, then close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort {
    pub kind: AbortKind,
    pub status: StatusCode,
}

impl Abort {
    pub fn request_timeout() -> Self {
        Self { kind: AbortKind::RequestTimeout, status: StatusCode::REQUEST_TIMEOUT }
    }

    pub fn response_timeout() -> Self {
        Self { kind: AbortKind::ResponseTimeout, status: StatusCode::SERVICE_UNAVAILABLE }
    }

    pub fn body(&self) -> &'static str {
        match self.kind {
            AbortKind::RequestTimeout => REQUEST_TIMEOUT_BODY,
            AbortKind::ResponseTimeout => RESPONSE_TIMEOUT_BODY,
        }
    }

    /// The plain text response announcing the abort; the connection closes after it.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from_static(self.body().as_bytes())));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        response
    }
}

/// A request deadline fired, together with what had been received at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutEvent {
    pub connection_id: ConnectionId,
    pub armed_at: Instant,
    pub fired_at: Instant,
    pub state_at_fire: AssemblyState,
}

impl TimeoutEvent {
    pub fn elapsed(&self) -> Duration {
        self.fired_at.saturating_duration_since(self.armed_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutVerdict {
    /// The request is still incomplete: answer with the abort and close.
    Abort(Abort),
    /// The request completed right before the deadline; carry on.
    Ignore,
}

/// Decides what a fired request deadline means.
///
/// Only a request that is still `Waiting` or `InProgress` is timed out. A
/// request that completed in the window between the firing and this check
/// wins the race.
pub fn resolve(event: &TimeoutEvent) -> TimeoutVerdict {
    match event.state_at_fire {
        AssemblyState::Waiting | AssemblyState::InProgress => TimeoutVerdict::Abort(Abort::request_timeout()),
        AssemblyState::Complete | AssemblyState::Upgraded => TimeoutVerdict::Ignore,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    /// no request cycle started yet
    Idle,
    /// no request timeout configured, nothing is enforced
    Disabled,
    Armed,
    Cancelled,
    Fired,
}

/// Owns the request deadline of one connection.
///
/// Each request cycle goes `Idle -> Armed -> Cancelled | Fired`; a kept-alive
/// connection starts a new cycle with [`TimeoutSupervisor::begin_request`].
#[derive(Debug)]
pub struct TimeoutSupervisor {
    connection_id: ConnectionId,
    request_timeout: Option<Duration>,
    timer: DeadlineTimer,
    handle: Option<TimerHandle>,
    phase: SupervisorPhase,
}

impl TimeoutSupervisor {
    pub fn new(connection_id: ConnectionId, request_timeout: Option<Duration>) -> Self {
        Self { connection_id, request_timeout, timer: DeadlineTimer::new(), handle: None, phase: SupervisorPhase::Idle }
    }

    pub fn phase(&self) -> SupervisorPhase {
        self.phase
    }

    /// Arms the request deadline for a new request cycle.
    pub fn begin_request(&mut self) {
        // never two armed deadlines for one connection
        if let Some(handle) = self.handle.take() {
            self.timer.cancel(handle);
        }

        self.handle = self.timer.arm(self.request_timeout);
        self.phase = if self.handle.is_some() { SupervisorPhase::Armed } else { SupervisorPhase::Disabled };
    }

    /// Drops any pending deadline and waits for the next [`TimeoutSupervisor::begin_request`].
    pub fn end_request(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.timer.cancel(handle);
        }
        self.phase = SupervisorPhase::Idle;
    }

    /// Reports assembly progress; a fully received request cancels the deadline.
    pub fn observe(&mut self, state: AssemblyState) {
        if self.phase != SupervisorPhase::Armed || !state.is_assembled() {
            return;
        }

        if let Some(handle) = self.handle.take() {
            self.timer.cancel(handle);
        }
        self.phase = SupervisorPhase::Cancelled;
        debug!(connection_id = %self.connection_id, ?state, "request received in time, deadline cancelled");
    }

    /// Resolves when the request deadline fires; pending while nothing is armed.
    pub async fn expired(&mut self) -> Expired {
        self.timer.expired().await
    }

    /// Turns a firing into a verdict, given the assembly state re-read at firing time.
    pub fn on_fired(&mut self, expired: Expired, state: AssemblyState) -> TimeoutVerdict {
        self.handle = None;
        self.phase = SupervisorPhase::Fired;

        let event = TimeoutEvent {
            connection_id: self.connection_id,
            armed_at: expired.armed_at,
            fired_at: expired.fired_at,
            state_at_fire: state,
        };

        let verdict = resolve(&event);
        match verdict {
            TimeoutVerdict::Abort(_) => {
                info!(connection_id = %event.connection_id, elapsed_ms = event.elapsed().as_millis(), state = ?state, "request timeout");
            }
            TimeoutVerdict::Ignore => {
                debug!(connection_id = %event.connection_id, state = ?state, "request completed as the deadline fired");
            }
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use http_body_util::BodyExt;
    use tokio::time::advance;

    fn event(state_at_fire: AssemblyState) -> TimeoutEvent {
        let now = Instant::now();
        TimeoutEvent { connection_id: ConnectionId::new(1), armed_at: now, fired_at: now, state_at_fire }
    }

    #[test]
    fn resolve_incomplete_request_aborts() {
        assert_eq!(resolve(&event(AssemblyState::Waiting)), TimeoutVerdict::Abort(Abort::request_timeout()));
        assert_eq!(resolve(&event(AssemblyState::InProgress)), TimeoutVerdict::Abort(Abort::request_timeout()));
    }

    #[test]
    fn resolve_finished_request_is_ignored() {
        assert_eq!(resolve(&event(AssemblyState::Complete)), TimeoutVerdict::Ignore);
        assert_eq!(resolve(&event(AssemblyState::Upgraded)), TimeoutVerdict::Ignore);
    }

    #[tokio::test]
    async fn request_timeout_response() {
        let response = Abort::request_timeout().into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(response.headers().get(header::CONNECTION).unwrap(), "close");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Error: Request Timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn fires_while_waiting() {
        let mut supervisor = TimeoutSupervisor::new(ConnectionId::new(7), Some(Duration::from_millis(600)));
        supervisor.begin_request();
        assert_eq!(supervisor.phase(), SupervisorPhase::Armed);

        supervisor.observe(AssemblyState::InProgress);
        assert_eq!(supervisor.phase(), SupervisorPhase::Armed);

        advance(Duration::from_millis(600)).await;
        let expired = supervisor.expired().now_or_never().unwrap();

        let verdict = supervisor.on_fired(expired, AssemblyState::InProgress);
        assert_eq!(verdict, TimeoutVerdict::Abort(Abort::request_timeout()));
        assert_eq!(supervisor.phase(), SupervisorPhase::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn complete_request_cancels() {
        let mut supervisor = TimeoutSupervisor::new(ConnectionId::new(7), Some(Duration::from_millis(600)));
        supervisor.begin_request();

        advance(Duration::from_millis(200)).await;
        supervisor.observe(AssemblyState::Complete);
        assert_eq!(supervisor.phase(), SupervisorPhase::Cancelled);

        advance(Duration::from_secs(2)).await;
        assert!(supervisor.expired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn upgraded_request_cancels() {
        let mut supervisor = TimeoutSupervisor::new(ConnectionId::new(7), Some(Duration::from_millis(600)));
        supervisor.begin_request();
        supervisor.observe(AssemblyState::Upgraded);

        advance(Duration::from_secs(2)).await;
        assert!(supervisor.expired().now_or_never().is_none());
        assert_eq!(supervisor.phase(), SupervisorPhase::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_never_fires() {
        let mut supervisor = TimeoutSupervisor::new(ConnectionId::new(7), None);
        supervisor.begin_request();
        assert_eq!(supervisor.phase(), SupervisorPhase::Disabled);

        advance(Duration::from_secs(3600)).await;
        assert!(supervisor.expired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ended_cycle_is_idle() {
        let mut supervisor = TimeoutSupervisor::new(ConnectionId::new(7), Some(Duration::from_millis(600)));
        supervisor.begin_request();
        supervisor.end_request();
        assert_eq!(supervisor.phase(), SupervisorPhase::Idle);

        advance(Duration::from_secs(1)).await;
        assert!(supervisor.expired().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_cycle_rearms() {
        let mut supervisor = TimeoutSupervisor::new(ConnectionId::new(7), Some(Duration::from_millis(600)));
        supervisor.begin_request();
        supervisor.observe(AssemblyState::Complete);

        advance(Duration::from_secs(5)).await;
        supervisor.begin_request();
        assert_eq!(supervisor.phase(), SupervisorPhase::Armed);

        advance(Duration::from_millis(600)).await;
        let expired = supervisor.expired().now_or_never().unwrap();
        assert_eq!(expired.fired_at.duration_since(expired.armed_at), Duration::from_millis(600));
    }
}
