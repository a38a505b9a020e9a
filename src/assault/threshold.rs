use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::multispace0,
    combinator::{all_consuming, map, value},
    number::complete::double,
    sequence::{delimited, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::ThresholdError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Checks,
    HttpReqFailed,
    HttpReqs,
    Iterations,
    DataReceived,
    HttpReqDuration,
    IterationDuration,
    Vus,
}
impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Checks,
        Metric::HttpReqFailed,
        Metric::HttpReqs,
        Metric::Iterations,
        Metric::DataReceived,
        Metric::HttpReqDuration,
        Metric::IterationDuration,
        Metric::Vus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Checks => "checks",
            Metric::HttpReqFailed => "http_req_failed",
            Metric::HttpReqs => "http_reqs",
            Metric::Iterations => "iterations",
            Metric::DataReceived => "data_received",
            Metric::HttpReqDuration => "http_req_duration",
            Metric::IterationDuration => "iteration_duration",
            Metric::Vus => "vus",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Checks | Metric::HttpReqFailed => MetricKind::Rate,
            Metric::HttpReqs | Metric::Iterations | Metric::DataReceived => MetricKind::Counter,
            Metric::HttpReqDuration | Metric::IterationDuration => MetricKind::Trend,
            Metric::Vus => MetricKind::Gauge,
        }
    }
}
impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
impl FromStr for Metric {
    type Err = ThresholdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL.into_iter().find(|m| m.name() == s).ok_or_else(|| ThresholdError::UnknownMetric(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Rate,
    Counter,
    Trend,
    Gauge,
}
impl MetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Rate => "rate",
            MetricKind::Counter => "counter",
            MetricKind::Trend => "trend",
            MetricKind::Gauge => "gauge",
        }
    }

    pub fn supports(&self, aggregation: &Aggregation) -> bool {
        match self {
            MetricKind::Rate => matches!(aggregation, Aggregation::Rate),
            MetricKind::Counter => matches!(aggregation, Aggregation::Count | Aggregation::Rate),
            MetricKind::Trend => matches!(
                aggregation,
                Aggregation::Avg | Aggregation::Min | Aggregation::Med | Aggregation::Max | Aggregation::Percentile(_)
            ),
            MetricKind::Gauge => matches!(aggregation, Aggregation::Value | Aggregation::Min | Aggregation::Max),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Rate,
    Count,
    Value,
    Avg,
    Min,
    Med,
    Max,
    Percentile(f64),
}
impl Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Count => write!(f, "count"),
            Aggregation::Value => write!(f, "value"),
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Percentile(p) => write!(f, "p({})", p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}
impl Operator {
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expression {
    pub aggregation: Aggregation,
    pub operator: Operator,
    pub value: f64,
}
impl FromStr for Expression {
    type Err = ThresholdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, expression) =
            all_consuming(Self::parse)(s).map_err(|_| ThresholdError::InvalidExpression(s.to_string()))?;
        match expression.aggregation {
            Aggregation::Percentile(p) if !(0. ..=100.).contains(&p) => {
                Err(ThresholdError::PercentileOutOfRange(p.to_string()))
            }
            _ => Ok(expression),
        }
    }
}
impl Expression {
    fn parse(input: &str) -> IResult<&str, Self> {
        map(
            tuple((
                delimited(multispace0, Self::parse_aggregation, multispace0),
                Self::parse_operator,
                delimited(multispace0, double, multispace0),
            )),
            |(aggregation, operator, value)| Self { aggregation, operator, value },
        )(input)
    }

    fn parse_aggregation(input: &str) -> IResult<&str, Aggregation> {
        alt((
            map(delimited(tag("p("), delimited(multispace0, double, multispace0), tag(")")), Aggregation::Percentile),
            value(Aggregation::Rate, tag("rate")),
            value(Aggregation::Count, tag("count")),
            value(Aggregation::Value, tag("value")),
            value(Aggregation::Avg, tag("avg")),
            value(Aggregation::Min, tag("min")),
            value(Aggregation::Med, tag("med")),
            value(Aggregation::Max, tag("max")),
        ))(input)
    }

    fn parse_operator(input: &str) -> IResult<&str, Operator> {
        alt((
            value(Operator::Le, tag("<=")),
            value(Operator::Ge, tag(">=")),
            value(Operator::Eq, tag("===")),
            value(Operator::Eq, tag("==")),
            value(Operator::Ne, tag("!=")),
            value(Operator::Lt, tag("<")),
            value(Operator::Gt, tag(">")),
        ))(input)
    }
}

/// A pass/fail criterion on one aggregated metric, such as `p(95)<500` on `http_req_duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub source: String,
    pub expression: Expression,
}
impl Threshold {
    pub fn parse(metric: &str, source: &str) -> Result<Self, ThresholdError> {
        let metric: Metric = metric.parse()?;
        let expression: Expression = source.parse()?;
        if !metric.kind().supports(&expression.aggregation) {
            return Err(ThresholdError::UnsupportedAggregation {
                metric: metric.to_string(),
                kind: metric.kind().name(),
                aggregation: expression.aggregation.to_string(),
            });
        }
        Ok(Self { metric, source: source.to_string(), expression })
    }

    pub fn evaluate<O: Observe + ?Sized>(&self, observed: &O) -> ThresholdOutcome {
        let Expression { aggregation, operator, value } = self.expression;
        let actual = observed.observe(self.metric, aggregation);
        let ok = !actual.is_nan() && operator.apply(actual, value);
        ThresholdOutcome { metric: self.metric, expression: self.source.clone(), actual, ok }
    }
}

/// One entry of a metric's threshold list: either `"p(95)<500"` or
/// `{"threshold": "p(95)<500", "abortOnFail": true, "delayAbortEval": "10s"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSource {
    Expression(String),
    #[serde(rename_all = "camelCase")]
    Object {
        threshold: String,
        #[serde(default)]
        abort_on_fail: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay_abort_eval: Option<String>,
    },
}
impl ThresholdSource {
    pub fn expression(&self) -> &str {
        match self {
            ThresholdSource::Expression(e) => e,
            ThresholdSource::Object { threshold, .. } => threshold,
        }
    }
    pub fn abort_on_fail(&self) -> bool {
        matches!(self, ThresholdSource::Object { abort_on_fail: true, .. })
    }
}
impl From<&str> for ThresholdSource {
    fn from(expression: &str) -> Self {
        ThresholdSource::Expression(expression.to_string())
    }
}

/// A threshold on a metric this runner does not record, such as `http_req_waiting` or a tagged
/// sub-metric like `http_req_duration{expected_response:true}`. It is reported but never evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnobservedThreshold {
    pub metric: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Thresholds {
    observed: Vec<Threshold>,
    unobserved: Vec<UnobservedThreshold>,
}
impl Thresholds {
    pub fn parse(source: &BTreeMap<String, Vec<ThresholdSource>>) -> Result<Self, ThresholdError> {
        let mut thresholds = Self::default();
        for (metric, sources) in source {
            for source in sources {
                let expression = source.expression();
                if source.abort_on_fail() {
                    tracing::warn!("abortOnFail of `{}` on `{}` is ignored", expression, metric);
                }
                match Threshold::parse(metric, expression) {
                    Ok(threshold) => thresholds.observed.push(threshold),
                    Err(ThresholdError::UnknownMetric(_)) => {
                        expression.parse::<Expression>()?;
                        tracing::warn!("threshold `{}` on `{}` is not evaluated, the metric is not recorded", expression, metric);
                        let (metric, expression) = (metric.clone(), expression.to_string());
                        thresholds.unobserved.push(UnobservedThreshold { metric, expression });
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(thresholds)
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty() && self.unobserved.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Threshold> {
        self.observed.iter()
    }
    pub fn unobserved(&self) -> &[UnobservedThreshold] {
        &self.unobserved
    }

    pub fn evaluate<O: Observe + ?Sized>(&self, observed: &O) -> Vec<ThresholdOutcome> {
        self.observed.iter().map(|t| t.evaluate(observed)).collect()
    }
}

/// Source of aggregated metric values, in the unit thresholds are written in
/// (milliseconds for trends, bytes for `data_received`, per second for counter rates).
pub trait Observe {
    fn observe(&self, metric: Metric, aggregation: Aggregation) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub metric: Metric,
    pub expression: String,
    #[serde(with = "crate::interface::helper::nullable")]
    pub actual: f64,
    pub ok: bool,
}
