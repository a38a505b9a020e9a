use std::{collections::BTreeMap, time::Duration};

use bytes::Bytes;
use http::StatusCode;

use crate::assault::metrics::RequestResult;

use super::aggregate::{Aggregator, BytesAggregate, CountAggregate, LatencyAggregate, PassAggregate};

/// Metrics collected by one virtual user. Each virtual user owns its recorder; recorders are
/// merged once their virtual users finish.
#[derive(Debug, Clone)]
pub struct Recorder {
    pub checks: BTreeMap<String, PassAggregate>,
    pub http_reqs: CountAggregate,
    pub http_req_failed: PassAggregate,
    pub http_req_duration: LatencyAggregate,
    pub data_received: BytesAggregate,
    pub iterations: CountAggregate,
    pub iteration_duration: LatencyAggregate,
    pub interrupted: CountAggregate,
}

impl Recorder {
    pub fn new<I: IntoIterator<Item = f64> + Clone>(quantile: I) -> Result<Self, hdrhistogram::CreationError> {
        Ok(Self {
            checks: BTreeMap::new(),
            http_reqs: CountAggregate::new(),
            http_req_failed: PassAggregate::new(),
            http_req_duration: LatencyAggregate::new(quantile.clone())?,
            data_received: BytesAggregate::new(),
            iterations: CountAggregate::new(),
            iteration_duration: LatencyAggregate::new(quantile)?,
            interrupted: CountAggregate::new(),
        })
    }

    pub fn check(&mut self, name: &str, pass: bool) {
        self.checks.entry(name.to_string()).or_default().add(&pass);
    }

    /// A request counts as failed when it got no response or its status is outside `200..=399`.
    pub fn request(&mut self, result: &RequestResult<http::Response<Bytes>>) {
        self.http_reqs.add(&());
        match result {
            Ok(measured) => {
                let status = measured.response().status();
                self.http_req_failed.add(&!Self::expected_status(status));
                self.http_req_duration.add(&measured.metrics().latency());
                self.data_received.add(&measured.metrics().bytes());
            }
            Err(err) => {
                tracing::trace!("request failed: {}", err);
                self.http_req_failed.add(&true);
            }
        }
    }

    pub fn iteration(&mut self, elapsed: Duration) {
        self.iterations.add(&());
        self.iteration_duration.add(&elapsed);
    }

    pub fn interrupted(&mut self) {
        self.interrupted.add(&());
    }

    pub fn merge(&mut self, other: &Self) {
        for (name, pass) in &other.checks {
            self.checks.entry(name.clone()).or_default().merge(pass);
        }
        self.http_reqs.merge(&other.http_reqs);
        self.http_req_failed.merge(&other.http_req_failed);
        self.http_req_duration.merge(&other.http_req_duration);
        self.data_received.merge(&other.data_received);
        self.iterations.merge(&other.iterations);
        self.iteration_duration.merge(&other.iteration_duration);
        self.interrupted.merge(&other.interrupted);
    }

    pub fn checks(&self) -> &BTreeMap<String, PassAggregate> {
        &self.checks
    }
    pub fn all_checks(&self) -> PassAggregate {
        self.checks.values().fold(PassAggregate::new(), |mut acc, p| {
            acc.merge(p);
            acc
        })
    }

    fn expected_status(status: StatusCode) -> bool {
        status.is_success() || status.is_redirection()
    }
}
