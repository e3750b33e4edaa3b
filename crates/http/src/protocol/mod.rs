//! Core HTTP protocol types.
//!
//! - **Message Handling** (`message`): [`Message`], [`PayloadItem`] and [`PayloadSize`]
//!   shared by the request decoder and the response encoder
//! - **Request Processing** (`request`): [`RequestHeader`], including keep-alive
//!   and WebSocket handshake inspection
//! - **Response Processing** (`response`): [`ResponseHead`]
//! - **Body** ([`body`]): [`body::ReqBody`], the assembled request payload
//! - **Error Handling** (`error`): [`HttpError`], [`ParseError`], [`SendError`]
//!   and [`TimeoutError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::TimeoutError;

pub mod body;
