use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::SystemTime,
};

use tokio::time::Instant;
use tower::{timeout::error::Elapsed, BoxError, Layer, Service};

use crate::assault::{
    measure::metrics::{MeasuredResponse, Received},
    metrics::{RequestError, RequestResult},
};

/// Times every request of the inner service and classifies its failures.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct MeasureLayer;

impl<S> Layer<S> for MeasureLayer {
    type Service = MeasureService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MeasureService { inner }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct MeasureService<S> {
    inner: S,
}

impl<S, Req> Service<Req> for MeasureService<S>
where
    S: Service<Req>,
    S::Response: Received + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
{
    type Response = MeasuredResponse<S::Response>;
    type Error = RequestError;
    type Future = Pin<Box<dyn Future<Output = RequestResult<S::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(|e| RequestError::NoReady(e.into()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let (timestamp, start) = (SystemTime::now(), Instant::now());
        let fut = self.inner.call(req);
        Box::pin(async move {
            let result = fut.await;
            let latency = start.elapsed();

            let response = result.map_err(|error| {
                let boxed: BoxError = error.into();
                if boxed.is::<Elapsed>() {
                    RequestError::Timeout(latency)
                } else {
                    RequestError::InnerServiceError(boxed)
                }
            })?;
            Ok(MeasuredResponse::new(response, timestamp, latency))
        })
    }
}
