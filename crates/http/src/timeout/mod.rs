//! Request deadline supervision.
//!
//! A connection must deliver a complete request (or a complete WebSocket
//! handshake) within the configured request timeout. The pieces:
//!
//! - [`DeadlineTimer`]: a one-shot countdown polled on the connection task
//! - [`RequestAssembler`]: drives the request decoder and reports [`AssemblyState`]
//! - [`TimeoutSupervisor`]: arms the deadline per request cycle, cancels it once
//!   the request is in hand, and turns a firing into a [`TimeoutVerdict`]
//!
//! A verdict of [`TimeoutVerdict::Abort`] carries the [`Abort`] the connection
//! writes before closing: `408` with the body `Error: Request Timeout`.

mod assembly;
mod supervisor;
mod timer;

pub use assembly::AssemblyState;
pub use assembly::RequestAssembler;
pub use supervisor::Abort;
pub use supervisor::AbortKind;
pub use supervisor::REQUEST_TIMEOUT_BODY;
pub use supervisor::RESPONSE_TIMEOUT_BODY;
pub use supervisor::SupervisorPhase;
pub use supervisor::TimeoutEvent;
pub use supervisor::TimeoutSupervisor;
pub use supervisor::TimeoutVerdict;
pub use supervisor::resolve;
pub use timer::DeadlineTimer;
pub use timer::Expired;
pub use timer::TimerHandle;
