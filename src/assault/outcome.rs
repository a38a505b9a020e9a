use std::time::Duration;

use crate::interface::options::Options;

use super::{
    measure::{
        aggregate::{Aggregator, LatencyAggregate},
        recorder::Recorder,
    },
    threshold::{Aggregation, Metric, Observe, ThresholdOutcome},
};

/// Everything a finished test run produced: the merged metrics of all virtual users.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub options: Options,
    pub recorder: Recorder,
    pub vus: u64,
    pub elapsed: Duration,
}

impl Outcome {
    pub fn new(options: Options, recorder: Recorder, vus: u64, elapsed: Duration) -> Self {
        Self { options, recorder, vus, elapsed }
    }

    pub fn thresholds(&self) -> Vec<ThresholdOutcome> {
        self.options.execution().thresholds.evaluate(self)
    }

    /// Per second over the whole run.
    pub fn per_second(&self, count: u64) -> f64 {
        count as f64 / self.elapsed.as_secs_f64()
    }

    fn trend(latency: &LatencyAggregate, aggregation: Aggregation) -> f64 {
        if latency.is_empty() {
            return f64::NAN;
        }
        let millis = |d: Duration| d.as_secs_f64() * 1e3;
        match aggregation {
            Aggregation::Avg => millis(latency.mean()),
            Aggregation::Min => millis(latency.min()),
            Aggregation::Med => millis(latency.value_at_quantile(0.5)),
            Aggregation::Max => millis(latency.max()),
            Aggregation::Percentile(p) => millis(latency.value_at_quantile(p / 100.)),
            _ => f64::NAN,
        }
    }
}

impl Observe for Outcome {
    fn observe(&self, metric: Metric, aggregation: Aggregation) -> f64 {
        let Recorder { http_reqs, http_req_failed, http_req_duration, data_received, iterations, iteration_duration, .. } =
            &self.recorder;
        let counter = |count: u64| match aggregation {
            Aggregation::Count => count as f64,
            Aggregation::Rate => self.per_second(count),
            _ => f64::NAN,
        };
        match metric {
            Metric::Checks => self.recorder.all_checks().ratio(),
            Metric::HttpReqFailed => http_req_failed.ratio(),
            Metric::HttpReqs => counter(http_reqs.aggregate()),
            Metric::Iterations => counter(iterations.aggregate()),
            Metric::DataReceived => counter(data_received.aggregate()),
            Metric::HttpReqDuration => Self::trend(http_req_duration, aggregation),
            Metric::IterationDuration => Self::trend(iteration_duration, aggregation),
            Metric::Vus => self.vus as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use bytes::Bytes;

    use crate::assault::{measure::metrics::MeasuredResponse, metrics::RequestError};

    use super::*;

    fn outcome(options: &str) -> Outcome {
        let mut recorder = Recorder::new([0.9]).unwrap();
        for (status, latency) in [(200, 100), (200, 200), (503, 300)] {
            let response = http::Response::builder().status(status).body(Bytes::from_static(b"0123456789")).unwrap();
            let result = Ok(MeasuredResponse::new(response, SystemTime::now(), Duration::from_millis(latency)));
            recorder.request(&result);
            recorder.check("is status 200", status == 200);
            recorder.iteration(Duration::from_millis(latency) + Duration::from_secs(1));
        }
        recorder.request(&Err(RequestError::Timeout(Duration::from_secs(60))));
        recorder.check("is status 200", false);
        recorder.iteration(Duration::from_secs(61));

        Outcome::new(options.parse().unwrap(), recorder, 2, Duration::from_secs(4))
    }

    #[test]
    fn test_observe() {
        let outcome = outcome("{}");
        let tolerance = 1.;
        assert_eq!(outcome.observe(Metric::Checks, Aggregation::Rate), 0.5);
        assert_eq!(outcome.observe(Metric::HttpReqFailed, Aggregation::Rate), 0.5);
        assert_eq!(outcome.observe(Metric::HttpReqs, Aggregation::Count), 4.);
        assert_eq!(outcome.observe(Metric::HttpReqs, Aggregation::Rate), 1.);
        assert_eq!(outcome.observe(Metric::DataReceived, Aggregation::Count), 30.);
        assert!((outcome.observe(Metric::HttpReqDuration, Aggregation::Max) - 300.).abs() < tolerance);
        assert!((outcome.observe(Metric::HttpReqDuration, Aggregation::Avg) - 200.).abs() < tolerance);
        assert!((outcome.observe(Metric::HttpReqDuration, Aggregation::Min) - 100.).abs() < tolerance);
        assert_eq!(outcome.observe(Metric::Vus, Aggregation::Value), 2.);
    }

    #[test]
    fn test_thresholds() {
        let outcome = outcome(r#"{"thresholds": {"checks": ["rate>0.9"], "http_req_duration": ["max<1000"]}}"#);
        let thresholds = outcome.thresholds();
        assert_eq!(thresholds.len(), 2);
        let checks = thresholds.iter().find(|t| t.metric == Metric::Checks).unwrap();
        assert!(!checks.ok);
        let duration = thresholds.iter().find(|t| t.metric == Metric::HttpReqDuration).unwrap();
        assert!(duration.ok);
    }

    #[test]
    fn test_slow_request_crosses_duration_threshold() {
        let mut recorder = Recorder::new([]).unwrap();
        for latency in [Duration::from_millis(300), Duration::from_secs(5)] {
            let response = http::Response::builder().status(200).body(Bytes::new()).unwrap();
            recorder.request(&Ok(MeasuredResponse::new(response, SystemTime::now(), latency)));
        }
        let options = r#"{"thresholds": {"http_req_duration": ["p(95)<2000"]}}"#.parse().unwrap();
        let outcome = Outcome::new(options, recorder, 1, Duration::from_secs(6));

        let thresholds = outcome.thresholds();
        assert_eq!(thresholds.len(), 1);
        assert!((thresholds[0].actual - 5000.).abs() < 5.);
        assert!(!thresholds[0].ok);
    }

    #[test]
    fn test_empty_trend_is_nan() {
        let outcome = Outcome::new("{}".parse().unwrap(), Recorder::new([]).unwrap(), 1, Duration::from_secs(1));
        assert!(outcome.observe(Metric::HttpReqDuration, Aggregation::Avg).is_nan());
        assert!(outcome.observe(Metric::Checks, Aggregation::Rate).is_nan());
    }
}
