use std::fmt::Write as _;

use crate::{
    assault::{
        measure::aggregate::Pass,
        reportable::{Counter, ReportWriter, Summary, Trend},
        threshold::{ThresholdOutcome, UnobservedThreshold},
    },
    error::ReportError,
};

pub fn style_pass(pass: bool) -> console::Style {
    if pass {
        console::Style::new().green()
    } else {
        console::Style::new().red()
    }
}

pub trait ConsoleReport {
    fn console_report<W: std::io::Write>(&self, w: &mut ReportWriter<W>) -> Result<(), ReportError>;
}

pub enum SummaryConsoleReport {}
impl SummaryConsoleReport {
    pub const PASS_EMOJI: console::Emoji<'_, '_> = console::Emoji("✓", "PASS");
    pub const FAIL_EMOJI: console::Emoji<'_, '_> = console::Emoji("✗", "FAIL");
    pub const SKIP_EMOJI: console::Emoji<'_, '_> = console::Emoji("-", "SKIP");
    pub const SCENARIO_EMOJI: console::Emoji<'_, '_> = console::Emoji("🚀", "");
    pub const THRESHOLD_EMOJI: console::Emoji<'_, '_> = console::Emoji("🎯", "");
    pub const SUMMARY_EMOJI: console::Emoji<'_, '_> = console::Emoji("💥", "");

    /// Metric names are padded with dots up to this width.
    pub const NAME_WIDTH: usize = 28;

    fn side(pass: bool) -> console::StyledObject<console::Emoji<'static, 'static>> {
        if pass {
            style_pass(true).apply_to(Self::PASS_EMOJI)
        } else {
            style_pass(false).apply_to(Self::FAIL_EMOJI)
        }
    }

    fn name<W: std::io::Write>(w: &mut ReportWriter<W>, name: &str) -> std::fmt::Result {
        let dots = Self::NAME_WIDTH.saturating_sub(name.len());
        write!(w, "{}{}: ", name, console::style(".".repeat(dots)).dim())
    }

    fn pass<W: std::io::Write>(w: &mut ReportWriter<W>, name: &str, pass: &Pass) -> std::fmt::Result {
        Self::name(w, name)?;
        writeln!(w, "{:.2}% {} {} {} {}", pass.rate * 100., Self::PASS_EMOJI, pass.pass, Self::FAIL_EMOJI, pass.fail)
    }

    fn counter<W: std::io::Write>(w: &mut ReportWriter<W>, name: &str, counter: &Counter) -> std::fmt::Result {
        Self::name(w, name)?;
        writeln!(w, "{} {:.2}/s", counter.count, counter.rate)
    }

    fn trend<W: std::io::Write>(w: &mut ReportWriter<W>, name: &str, trend: &Trend) -> std::fmt::Result {
        Self::name(w, name)?;
        write!(w, "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms", trend.avg, trend.min, trend.med, trend.max)?;
        for p in &trend.percentiles {
            write!(w, " p({})={:.2}ms", p.percentile, p.value)?;
        }
        writeln!(w)
    }

    fn threshold<W: std::io::Write>(w: &mut ReportWriter<W>, threshold: &ThresholdOutcome) -> std::fmt::Result {
        let ThresholdOutcome { metric, expression, actual, ok } = threshold;
        writeln!(
            w,
            "{} {}: {} {}",
            Self::side(*ok),
            metric,
            style_pass(*ok).apply_to(expression),
            console::style(format!("(actual {:.4})", actual)).dim()
        )
    }

    fn unobserved<W: std::io::Write>(w: &mut ReportWriter<W>, threshold: &UnobservedThreshold) -> std::fmt::Result {
        let UnobservedThreshold { metric, expression } = threshold;
        writeln!(w, "{} {}: {} {}", Self::SKIP_EMOJI, metric, expression, console::style("(not evaluated)").dim())
    }
}

impl ConsoleReport for Summary {
    fn console_report<W: std::io::Write>(&self, w: &mut ReportWriter<W>) -> Result<(), ReportError> {
        let Self { vus, elapsed, checks, metrics, thresholds, unobserved_thresholds, .. } = self;

        writeln!(
            w,
            "{} {} {}",
            SummaryConsoleReport::SCENARIO_EMOJI,
            console::style(format!("{} vus, finished in {:.2?}", vus, elapsed)).bold(),
            SummaryConsoleReport::SCENARIO_EMOJI,
        )?;
        w.scope(|w| {
            for (name, pass) in checks {
                let ok = pass.fail == 0;
                write!(w, "{} {}", SummaryConsoleReport::side(ok), style_pass(ok).apply_to(name))?;
                if !ok {
                    let ratio = format!("{}% {} / {}", (pass.rate * 100.).round(), pass.pass, pass.pass + pass.fail);
                    write!(w, " {}", console::style(ratio).dim())?;
                }
                writeln!(w)?;
            }
            Ok::<_, std::fmt::Error>(())
        })?;
        writeln!(w)?;

        writeln!(w, "{} {}", SummaryConsoleReport::SUMMARY_EMOJI, console::style("summary of all iterations").bold())?;
        w.scope(|w| {
            SummaryConsoleReport::pass(w, "checks", &metrics.checks)?;
            SummaryConsoleReport::counter(w, "data_received", &metrics.data_received)?;
            SummaryConsoleReport::trend(w, "http_req_duration", &metrics.http_req_duration)?;
            SummaryConsoleReport::pass(w, "http_req_failed", &metrics.http_req_failed)?;
            SummaryConsoleReport::counter(w, "http_reqs", &metrics.http_reqs)?;
            SummaryConsoleReport::trend(w, "iteration_duration", &metrics.iteration_duration)?;
            SummaryConsoleReport::counter(w, "iterations", &metrics.iterations)?;
            if metrics.interrupted_iterations > 0 {
                SummaryConsoleReport::name(w, "interrupted_iterations")?;
                writeln!(w, "{}", console::style(metrics.interrupted_iterations).yellow())?;
            }
            SummaryConsoleReport::name(w, "vus")?;
            writeln!(w, "{}", vus)
        })?;

        if !thresholds.is_empty() || !unobserved_thresholds.is_empty() {
            writeln!(w)?;
            writeln!(w, "{} {}", SummaryConsoleReport::THRESHOLD_EMOJI, console::style("thresholds").bold())?;
            w.scope(|w| {
                thresholds.iter().try_for_each(|t| SummaryConsoleReport::threshold(w, t))?;
                unobserved_thresholds.iter().try_for_each(|t| SummaryConsoleReport::unobserved(w, t))
            })?;
        }

        Ok(())
    }
}
