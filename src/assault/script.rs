use std::time::Duration;

use bytes::Bytes;
use http::{StatusCode, Uri};
use tower::{timeout::TimeoutLayer, BoxError, Service, ServiceBuilder, ServiceExt};

use super::{
    measure::recorder::Recorder,
    metrics::RequestResult,
    service::measure::{MeasureLayer, MeasureService},
};

pub const TARGET_URL: &str = "https://www.blibli.com/backend/content-api/pages/home2023/sections/main_section/blocks/NEW_USER_ZONE/vouchers?display=normal&page=1&item_per_page=200";

pub const CHECK_NAME: &str = "is status 200";

/// Pause at the end of every iteration.
pub const THINK_TIME: Duration = Duration::from_secs(1);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The unit of work every virtual user repeats: GET the new user zone vouchers, check the
/// status, then sleep.
#[derive(Debug, Clone)]
pub struct Dashboard<S> {
    service: MeasureService<tower::timeout::Timeout<S>>,
}

impl<S> Dashboard<S>
where
    S: Service<http::Request<Bytes>, Response = http::Response<Bytes>>,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    pub fn new(client: S) -> Self {
        Self::with_timeout(client, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(client: S, timeout: Duration) -> Self {
        let service = ServiceBuilder::new().layer(MeasureLayer).layer(TimeoutLayer::new(timeout)).service(client);
        Self { service }
    }

    /// One iteration. Network errors, timeouts and unexpected statuses only fail the check.
    pub async fn iterate(&mut self, vu: &mut Recorder) {
        let result = self.get().await;
        vu.request(&result);
        vu.check(CHECK_NAME, is_status_200(&result));

        tokio::time::sleep(THINK_TIME).await;
    }

    pub async fn get(&mut self) -> RequestResult<http::Response<Bytes>> {
        let request = Self::request();
        match self.service.ready().await {
            Ok(service) => service.call(request).await,
            Err(err) => Err(err),
        }
    }

    pub fn request() -> http::Request<Bytes> {
        let mut request = http::Request::new(Bytes::new());
        *request.uri_mut() = Uri::from_static(TARGET_URL);
        request
    }
}

pub fn is_status_200(result: &RequestResult<http::Response<Bytes>>) -> bool {
    matches!(result, Ok(measured) if measured.response().status() == StatusCode::OK)
}
