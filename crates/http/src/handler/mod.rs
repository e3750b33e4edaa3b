//! Request handler trait and the adapter for plain async functions.

use std::error::Error;
use std::fmt;

use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

/// Turns a fully received request into a response.
///
/// Handlers only ever see complete requests: a request that misses its
/// deadline is answered by the connection and never dispatched.
#[trait_variant::make(Send)]
pub trait Handler: Sync {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>> + Send;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

pub struct HandlerFn<F> {
    f: F,
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body,
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<ReqBody>) -> Ret,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};
    use std::convert::Infallible;

    async fn upper(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Infallible> {
        let body = request.into_body().collect().await.map(|collected| collected.to_bytes()).unwrap_or_default();
        Ok(Response::new(Full::new(Bytes::from(body.to_ascii_uppercase()))))
    }

    #[tokio::test]
    async fn function_handler() {
        let handler = make_handler(upper);
        let request = Request::new(ReqBody::from(Bytes::from_static(b"ok")));

        let response = handler.call(request).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    fn assert_send<T: Send>(_value: &T) {}

    #[test]
    fn function_handler_is_send() {
        let handler = make_handler(upper);
        assert_send(&handler);
        assert_send(&handler.call(Request::new(ReqBody::default())));
    }
}
