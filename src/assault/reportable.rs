use std::{
    collections::BTreeMap,
    fmt::Write as FmtWrite,
    io::Write as IoWrite,
    process::ExitCode,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    measure::aggregate::{Aggregator, LatencyAggregate, Pass},
    outcome::Outcome,
    threshold::{ThresholdOutcome, UnobservedThreshold},
};

pub const THRESHOLDS_CROSSED_EXIT_CODE: u8 = 99;

/// End of test summary: what the run measured and whether its thresholds held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Summary {
    pub options: Value,
    pub vus: u64,
    #[serde(with = "millis")]
    pub elapsed: Duration,
    pub checks: BTreeMap<String, Pass>,
    pub metrics: SummaryMetrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thresholds: Vec<ThresholdOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unobserved_thresholds: Vec<UnobservedThreshold>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub checks: Pass,
    pub http_reqs: Counter,
    pub http_req_failed: Pass,
    pub http_req_duration: Trend,
    pub iterations: Counter,
    pub iteration_duration: Trend,
    pub data_received: Counter,
    pub interrupted_iterations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub count: u64,
    #[serde(with = "crate::interface::helper::nullable")]
    pub rate: f64,
}

/// Durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub percentiles: Vec<Percentile>,
}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentile {
    pub percentile: f64,
    pub value: f64,
}

impl Summary {
    pub fn new(outcome: &Outcome, percentiles: &[f64]) -> Self {
        let recorder = &outcome.recorder;
        let counter = |count: u64| Counter { count, rate: outcome.per_second(count) };
        let trend = |latency: &LatencyAggregate| Trend::new(latency, percentiles);
        let metrics = SummaryMetrics {
            checks: recorder.all_checks().aggregate(),
            http_reqs: counter(recorder.http_reqs.aggregate()),
            http_req_failed: recorder.http_req_failed.aggregate(),
            http_req_duration: trend(&recorder.http_req_duration),
            iterations: counter(recorder.iterations.aggregate()),
            iteration_duration: trend(&recorder.iteration_duration),
            data_received: counter(recorder.data_received.aggregate()),
            interrupted_iterations: recorder.interrupted.aggregate(),
        };
        Self {
            options: outcome.options.exported().clone(),
            vus: outcome.vus,
            elapsed: outcome.elapsed,
            checks: recorder.checks().iter().map(|(name, pass)| (name.clone(), pass.aggregate())).collect(),
            metrics,
            thresholds: outcome.thresholds(),
            unobserved_thresholds: outcome.options.execution().thresholds.unobserved().to_vec(),
        }
    }

    pub fn pass(&self) -> bool {
        self.thresholds.iter().all(|t| t.ok)
    }

    pub fn code(&self) -> u8 {
        if self.pass() {
            0
        } else {
            THRESHOLDS_CROSSED_EXIT_CODE
        }
    }
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}

impl Trend {
    pub fn new(latency: &LatencyAggregate, percentiles: &[f64]) -> Self {
        let millis = |d: Duration| d.as_secs_f64() * 1e3;
        let aggregate = latency.aggregate();
        Self {
            avg: millis(aggregate.mean),
            min: millis(aggregate.min),
            med: millis(aggregate.median),
            max: millis(aggregate.max),
            percentiles: percentiles
                .iter()
                .map(|&percentile| Percentile { percentile, value: millis(latency.value_at_quantile(percentile / 100.)) })
                .collect(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1e3)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(millis / 1e3).map_err(serde::de::Error::custom)
    }
}

pub struct ReportWriter<W> {
    pub indent: usize,
    pub buf: W,
    pub at_start_line: bool,
}
impl<W> ReportWriter<W> {
    pub fn new(indent: usize, buf: W) -> Self {
        let at_start_line = true;
        Self { indent, buf, at_start_line }
    }
    pub fn indent(&self) -> String {
        "  ".repeat(self.indent)
    }
    pub fn scope<F, R, E>(&mut self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Self) -> Result<R, E>,
    {
        self.indent += 1;
        let ret = f(self);
        self.indent -= 1;
        ret
    }
}
impl<W: IoWrite> FmtWrite for ReportWriter<W> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        for (i, line) in s.split('\n').enumerate() {
            if i > 0 {
                writeln!(self.buf).map_err(|_| std::fmt::Error)?;
                self.at_start_line = true;
            }
            if line.is_empty() {
                continue;
            }
            if self.at_start_line {
                write!(self.buf, "{}", self.indent()).map_err(|_| std::fmt::Error)?;
                self.at_start_line = false;
            }
            write!(self.buf, "{}", line).map_err(|_| std::fmt::Error)?;
        }
        Ok(())
    }
}
