//! Request body decoding and response body encoding.
//!
//! - [`PayloadDecoder`]: content-length or chunked request bodies
//! - [`PayloadEncoder`]: content-length, chunked or empty response bodies

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
