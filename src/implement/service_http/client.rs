use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use tower::Service;

use crate::error::LoadResult;

/// reqwest client as a [`tower::Service`], buffering the whole response body.
#[derive(Debug, Clone, Default)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}
impl DefaultHttpClient {
    pub fn new(user_agent: &str) -> LoadResult<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

impl Service<http::Request<Bytes>> for DefaultHttpClient {
    type Response = http::Response<Bytes>;
    type Error = reqwest::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.client.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<Bytes>) -> Self::Future {
        match request.try_into() {
            Ok(req) => {
                let fut = self.client.call(req);
                Box::pin(async {
                    let res = fut.await?;
                    let mut builder = http::Response::builder().status(res.status()).version(res.version());
                    if let Some(headers) = builder.headers_mut() {
                        headers.extend(res.headers().iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    let body = res.bytes().await?;
                    // status, version and headers all come from a valid response
                    Ok(builder.body(body).unwrap_or_else(|_| unreachable!()))
                })
            }
            Err(e) => Box::pin(async { Err(e) }),
        }
    }
}
