//! Request head decoding and response head encoding.
//!
//! - [`HeaderDecoder`]: parses request heads, enforcing size and count limits
//! - [`HeaderEncoder`]: serializes response heads and the framing headers

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
pub(crate) use header_encoder::BufWriter;
