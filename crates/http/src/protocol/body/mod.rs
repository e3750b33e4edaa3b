//! HTTP request body handling.
//!
//! A request is only dispatched once it is fully assembled, so the body
//! handed to handlers is the complete payload. [`ReqBody`] exposes it through
//! the `http_body::Body` trait so handlers can use `http_body_util` as usual.

mod req_body;

pub use req_body::ReqBody;
