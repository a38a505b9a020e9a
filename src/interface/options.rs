use std::{collections::BTreeMap, fs::read_to_string, path::Path, str::FromStr, time::Duration};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    assault::threshold::{ThresholdSource, Thresholds},
    error::{LoadResult, OptionsError},
};

use super::{duration::parse_duration, helper::coalesce::Coalesce};

/// Where the execution options live, relative to the working directory.
pub const DEFAULT_OPTIONS_PATH: &str = "config/dashboard/options.json";

pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Execution options loaded once before the test starts.
///
/// The document is kept verbatim and handed out by [`Options::exported`]; the keys the
/// runner understands are additionally parsed into [`ExecutionOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    raw: Value,
    execution: ExecutionOptions,
}

impl Options {
    pub fn read<A: AsRef<Path>>(path: A) -> LoadResult<Self> {
        let path = path.as_ref();
        let content =
            read_to_string(path).map_err(|source| OptionsError::CannotRead { path: path.to_path_buf(), source })?;
        let options = content.parse()?;
        tracing::debug!("loaded options from {}", path.display());
        Ok(options)
    }

    pub fn exported(&self) -> &Value {
        &self.raw
    }
    pub fn execution(&self) -> &ExecutionOptions {
        &self.execution
    }

    pub fn with_overrides(self, overrides: &Overrides) -> LoadResult<Self> {
        let Self { raw, execution } = self;
        let execution = execution.coalesce(overrides);
        execution.validate()?;
        Ok(Self { raw, execution })
    }
}

impl FromStr for Options {
    type Err = crate::error::LoadError;
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let raw: Value = serde_json::from_str(content).map_err(OptionsError::InvalidJson)?;
        let Value::Object(map) = &raw else {
            return Err(OptionsError::NotAnObject(raw.to_string()).into());
        };
        for key in map.keys().filter(|k| !ExecutionOptions::KNOWN_KEYS.contains(&k.as_str())) {
            tracing::debug!("option `{}` is not used by the runner", key);
        }

        let schema = RawExecutionOptions::deserialize(&raw).map_err(OptionsError::InvalidSchema)?;
        let execution = ExecutionOptions::try_from(schema)?;
        execution.validate()?;
        Ok(Self { raw, execution })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExecutionOptions {
    #[serde(default)]
    vus: Option<u64>,
    #[serde(default)]
    duration: Option<RawDuration>,
    #[serde(default)]
    iterations: Option<u64>,
    #[serde(default)]
    graceful_stop: Option<RawDuration>,
    #[serde(default)]
    thresholds: BTreeMap<String, Vec<ThresholdSource>>,
    #[serde(default)]
    user_agent: Option<String>,
}

/// Either `"30s"` or a number of milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Text(String),
    Millis(f64),
}
impl RawDuration {
    fn parse(&self) -> Result<Duration, String> {
        match self {
            RawDuration::Text(s) => parse_duration(s).map_err(|e| e.to_string()),
            RawDuration::Millis(ms) => Duration::try_from_secs_f64(ms / 1e3).map_err(|e| e.to_string()),
        }
    }
}

/// The load profile understood by the runner.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionOptions {
    pub vus: Option<u64>,
    pub duration: Option<Duration>,
    pub iterations: Option<u64>,
    pub graceful_stop: Option<Duration>,
    pub thresholds: Thresholds,
    pub user_agent: Option<String>,
}

impl TryFrom<RawExecutionOptions> for ExecutionOptions {
    type Error = crate::error::LoadError;
    fn try_from(raw: RawExecutionOptions) -> Result<Self, Self::Error> {
        let RawExecutionOptions { vus, duration, iterations, graceful_stop, thresholds, user_agent } = raw;
        let parse = |key, value: Option<RawDuration>| {
            value.map(|d| d.parse()).transpose().map_err(|reason| OptionsError::InvalidValue { key, reason })
        };
        Ok(Self {
            vus,
            duration: parse("duration", duration)?,
            iterations,
            graceful_stop: parse("gracefulStop", graceful_stop)?,
            thresholds: Thresholds::parse(&thresholds)?,
            user_agent,
        })
    }
}

impl ExecutionOptions {
    pub const KNOWN_KEYS: [&'static str; 6] =
        ["vus", "duration", "iterations", "gracefulStop", "thresholds", "userAgent"];

    pub fn validate(&self) -> Result<(), OptionsError> {
        let invalid = |key, reason: &str| Err(OptionsError::InvalidValue { key, reason: reason.to_string() });
        if self.vus == Some(0) {
            return invalid("vus", "must be at least 1");
        }
        if self.iterations == Some(0) {
            return invalid("iterations", "must be at least 1");
        }
        if self.duration == Some(Duration::ZERO) {
            return invalid("duration", "must be longer than zero");
        }
        Ok(())
    }

    /// Number of virtual users to spawn; never more than the iterations there are to run.
    pub fn vus(&self) -> u64 {
        let vus = self.vus.unwrap_or(1);
        self.iterations_budget().map_or(vus, |budget| vus.min(budget))
    }

    /// Total iterations shared by all virtual users. Without duration and iterations, one iteration runs.
    pub fn iterations_budget(&self) -> Option<u64> {
        match (self.duration, self.iterations) {
            (None, None) => Some(1),
            (_, iterations) => iterations,
        }
    }

    pub fn graceful_stop(&self) -> Duration {
        self.graceful_stop.unwrap_or(DEFAULT_GRACEFUL_STOP)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(crate::APP_USER_AGENT)
    }
}

/// Load profile values given on the command line, preferred over the options file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Overrides {
    pub vus: Option<u64>,
    pub duration: Option<Duration>,
    pub iterations: Option<u64>,
}
impl Coalesce<Overrides> for ExecutionOptions {
    fn coalesce(self, other: &Overrides) -> Self {
        Self {
            vus: self.vus.coalesce(&other.vus),
            duration: self.duration.coalesce(&other.duration),
            iterations: self.iterations.coalesce(&other.iterations),
            ..self
        }
    }
}
