//! HTTP/1.1 codecs.
//!
//! - [`RequestDecoder`]: request head and body decoding, one [`Message`](crate::protocol::Message) at a time
//! - [`ResponseEncoder`]: response head and body encoding
//!
//! Both plug into `tokio_util::codec`; the connection drives the decoder by
//! hand so it can observe every read, and writes through a `FramedWrite`.

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
