use std::time::Duration;

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

pub trait Aggregator {
    type Add;
    type Aggregate;
    fn add(&mut self, add: &Self::Add);
    fn merge(&mut self, other: &Self);
    fn aggregate(&self) -> Self::Aggregate;
}

#[derive(Debug, Clone, Default)]
pub struct CountAggregate {
    count: Count,
}
pub type Count = u64;
impl Aggregator for CountAggregate {
    type Add = ();
    type Aggregate = Count;
    fn add(&mut self, (): &Self::Add) {
        self.count += 1;
    }
    fn merge(&mut self, other: &Self) {
        self.count += other.count;
    }
    fn aggregate(&self) -> Self::Aggregate {
        self.count
    }
}
impl CountAggregate {
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PassAggregate {
    pass: CountAggregate,
    count: CountAggregate,
}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pass {
    pub pass: Count,
    pub fail: Count,
    #[serde(with = "crate::interface::helper::nullable")]
    pub rate: f64,
}
impl Aggregator for PassAggregate {
    type Add = bool;
    type Aggregate = Pass;
    fn add(&mut self, pass: &Self::Add) {
        if *pass {
            self.pass.add(&());
        }
        self.count.add(&());
    }
    fn merge(&mut self, other: &Self) {
        self.pass.merge(&other.pass);
        self.count.merge(&other.count);
    }
    fn aggregate(&self) -> Self::Aggregate {
        Pass { pass: self.passed(), fail: self.count() - self.passed(), rate: self.ratio() }
    }
}
impl PassAggregate {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn count(&self) -> Count {
        self.count.aggregate()
    }
    pub fn passed(&self) -> Count {
        self.pass.aggregate()
    }
    /// NaN when nothing was recorded.
    pub fn ratio(&self) -> f64 {
        self.passed() as f64 / self.count() as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct BytesAggregate {
    bytes: u64,
}
impl Aggregator for BytesAggregate {
    type Add = usize;
    type Aggregate = u64;
    fn add(&mut self, bytes: &Self::Add) {
        self.bytes = self.bytes.saturating_add(*bytes as u64);
    }
    fn merge(&mut self, other: &Self) {
        self.bytes = self.bytes.saturating_add(other.bytes);
    }
    fn aggregate(&self) -> Self::Aggregate {
        self.bytes
    }
}
impl BytesAggregate {
    pub fn new() -> Self {
        Default::default()
    }
}

#[derive(Debug, Clone)]
pub struct LatencyAggregate {
    quantile: Vec<f64>,
    hist: Histogram<u64>,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    pub min: Duration,
    pub mean: Duration,
    pub median: Duration,
    pub quantile: Vec<Duration>,
    pub max: Duration,
}
impl Aggregator for LatencyAggregate {
    type Add = Duration;
    type Aggregate = Latency;
    fn add(&mut self, latency: &Self::Add) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        if let Err(err) = self.hist.record(nanos) {
            tracing::warn!("latency {:?} is out of histogram range: {:?}", latency, err);
            self.hist.saturating_record(nanos);
        }
    }
    fn merge(&mut self, other: &Self) {
        if let Err(err) = self.hist.add(&other.hist) {
            tracing::warn!("{} latencies are dropped while merging: {:?}", other.len(), err);
        }
    }
    fn aggregate(&self) -> Self::Aggregate {
        Latency {
            min: self.min(),
            mean: self.mean(),
            median: self.value_at_quantile(0.5),
            quantile: self.quantile(),
            max: self.max(),
        }
    }
}
impl LatencyAggregate {
    pub fn new<I: IntoIterator<Item = f64>>(quantile: I) -> Result<Self, hdrhistogram::CreationError> {
        let quantile = quantile.into_iter().collect();
        let hist = Histogram::new(3)?;
        Ok(Self { quantile, hist })
    }

    pub fn len(&self) -> u64 {
        self.hist.len()
    }
    pub fn is_empty(&self) -> bool {
        self.hist.is_empty()
    }

    pub fn min(&self) -> Duration {
        Duration::from_nanos(self.hist.min())
    }
    pub fn mean(&self) -> Duration {
        Duration::from_nanos(self.hist.mean() as u64)
    }
    pub fn quantile(&self) -> Vec<Duration> {
        self.quantile.iter().map(|q| self.value_at_quantile(*q)).collect()
    }
    pub fn value_at_quantile(&self, quantile: f64) -> Duration {
        Duration::from_nanos(self.hist.value_at_quantile(quantile))
    }
    pub fn max(&self) -> Duration {
        Duration::from_nanos(self.hist.max())
    }
}
