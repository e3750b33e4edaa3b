//! HTTP response header handling.
//!
//! The response head is `http::Response<()>`: the body is streamed separately
//! by the connection after the head has been encoded.

use http::Response;

pub type ResponseHead = Response<()>;
