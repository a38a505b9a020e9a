use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    time::Duration,
};

use bytes::Bytes;
#[cfg(feature = "cli")]
use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tower::{BoxError, Service};

#[cfg(feature = "default-http-client")]
use crate::implement::service_http::client::DefaultHttpClient;
#[cfg(feature = "console-report")]
use crate::{assault::reportable::ReportWriter, interface::report::console::ConsoleReport};
use crate::{
    assault::{reportable::Summary, worker::Control},
    error::{LoadResult, ReportError},
};

#[cfg(feature = "cli")]
use super::duration::parse_duration;
use super::{
    options::{Options, Overrides, DEFAULT_OPTIONS_PATH},
    report::json::JsonReport,
};

#[cfg(feature = "cli")]
pub async fn execute() -> Result<std::process::ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    let cmd = LoadTest::parse();
    cmd.init_tracing();

    let summary = cmd.assault().await?;
    cmd.report(&summary)?;
    Ok(summary.exit_code())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", clap(version, about))]
pub struct LoadTest {
    /// execution options file
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub options: Option<PathBuf>,

    /// override number of virtual users
    #[cfg_attr(feature = "cli", arg(long))]
    pub vus: Option<u64>,

    /// override test duration, such as `10s` or `1m30s`
    #[cfg_attr(feature = "cli", arg(short, long, value_parser = parse_duration))]
    pub duration: Option<Duration>,

    /// override total iterations shared by all virtual users
    #[cfg_attr(feature = "cli", arg(short, long))]
    pub iterations: Option<u64>,

    /// without colorize output
    #[cfg_attr(feature = "cli", arg(long))]
    pub no_color: bool,

    /// format of report
    #[cfg_attr(feature = "cli", arg(short, long), clap(value_enum, default_value_t))]
    pub report_format: ReportFormat,

    /// percentiles of trend metrics to report
    #[cfg_attr(feature = "cli", arg(short, long, num_args=0.., value_delimiter = ' ', value_parser = parse_percentile))]
    pub percentile: Option<Vec<f64>>,

    /// also write the json summary to this file
    #[cfg_attr(feature = "cli", arg(long))]
    pub summary_export: Option<PathBuf>,

    /// more verbose logs to stderr, repeatable
    #[cfg_attr(feature = "cli", arg(short, long, action = ArgAction::Count))]
    pub verbose: u8,
}
#[cfg_attr(feature = "cli", derive(ValueEnum))]
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum ReportFormat {
    /// without report
    #[cfg_attr(not(feature = "console-report"), default)]
    NullDevice,

    /// report to console
    #[cfg(feature = "console-report")]
    #[cfg_attr(feature = "console-report", default)]
    Console,

    /// report summary as json
    Json,
}

impl LoadTest {
    pub const DEFAULT_PERCENTILE: [f64; 2] = [90., 95.];

    pub fn init_tracing(&self) {
        let level = match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_ansi(!self.no_color)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!("global tracing subscriber is already set");
        }
    }

    pub fn options_path(&self) -> PathBuf {
        self.options.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_OPTIONS_PATH))
    }

    pub fn overrides(&self) -> Overrides {
        let Self { vus, duration, iterations, .. } = self;
        Overrides { vus: *vus, duration: *duration, iterations: *iterations }
    }

    /// Loaded once before anything runs; an unreadable file stops here, before any request.
    pub fn read_options(&self) -> LoadResult<Options> {
        Options::read(self.options_path())?.with_overrides(&self.overrides())
    }

    pub fn percentile_set(&self) -> Vec<f64> {
        let mut v = self.percentile.clone().unwrap_or_else(|| Self::DEFAULT_PERCENTILE.to_vec());
        v.sort_by(f64::total_cmp);
        v.dedup();
        v
    }
    pub fn quantile_set(&self) -> Vec<f64> {
        self.percentile_set().iter().map(|p| p / 100.).collect()
    }

    pub fn control<S>(&self, client: S) -> Control<S>
    where
        S: Service<http::Request<Bytes>, Response = http::Response<Bytes>> + Clone + Send + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
    {
        Control::new(client).with_quantile(self.quantile_set())
    }

    #[cfg(feature = "default-http-client")]
    pub async fn assault(&self) -> LoadResult<Summary> {
        let options = self.read_options()?;
        let control = self.control(DefaultHttpClient::new(options.execution().user_agent())?);
        control.shutdown_handle().listen_ctrl_c();
        self.assault_with(&control, options).await
    }
    pub async fn assault_with<S>(&self, control: &Control<S>, options: Options) -> LoadResult<Summary>
    where
        S: Service<http::Request<Bytes>, Response = http::Response<Bytes>> + Clone + Send + 'static,
        S::Error: Into<BoxError>,
        S::Future: Send + 'static,
    {
        let outcome = control.assault(options).await?;
        Ok(Summary::new(&outcome, &self.percentile_set()))
    }

    pub fn report(&self, summary: &Summary) -> LoadResult<()> {
        self.report_with(summary, std::io::stdout().lock())?;
        if let Some(path) = &self.summary_export {
            let mut file = BufWriter::new(File::create(path).map_err(ReportError::from)?);
            summary.json_report(&mut file)?;
            file.flush().map_err(ReportError::from)?;
            tracing::info!("summary exported to {}", path.display());
        }
        Ok(())
    }
    pub fn report_with<W: Write>(&self, summary: &Summary, mut write: W) -> LoadResult<()> {
        let Self { no_color, report_format, .. } = self;
        #[cfg(feature = "console-report")]
        console::set_colors_enabled(!no_color);
        #[cfg(not(feature = "console-report"))]
        let _ = no_color;

        match report_format {
            ReportFormat::NullDevice => (),
            #[cfg(feature = "console-report")]
            ReportFormat::Console => summary.console_report(&mut ReportWriter::new(0, &mut write))?,
            ReportFormat::Json => summary.json_report(&mut write)?,
        };
        write.flush().map_err(ReportError::from)?;
        Ok(())
    }
}

pub fn parse_percentile(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(p) if (0. ..=100.).contains(&p) => Ok(p),
        Ok(p) => Err(format!("percentile must be between 0 and 100, but got {}", p)),
        Err(e) => Err(e.to_string()),
    }
}
