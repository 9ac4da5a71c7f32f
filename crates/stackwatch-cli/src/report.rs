//! Pipeline result reporting.
//!
//! Diagnostics always go through `tracing` (stderr). Stdout carries what
//! the pipeline host consumes: a plain result line, or Azure DevOps
//! logging commands.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::ValueEnum;
use stackwatch_monitor::{EventSink, MonitorEvent, Outcome, TracingSink, Verdict};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// `result: <outcome>: <message>`
    Plain,
    /// `##vso[...]` logging commands.
    AzureDevops,
}

/// Exit status for a verdict. Issues alone do not fail the step.
pub fn exit_code(outcome: Outcome) -> ExitCode {
    match outcome {
        Outcome::Success | Outcome::SuccessWithIssues => ExitCode::SUCCESS,
        Outcome::Failure => ExitCode::FAILURE,
    }
}

/// Write the final result line for the pipeline host.
pub fn write_verdict(format: ReportFormat, verdict: &Verdict, out: &mut impl Write) -> io::Result<()> {
    match format {
        ReportFormat::Plain => writeln!(out, "result: {verdict}"),
        ReportFormat::AzureDevops => {
            let result = match verdict.outcome {
                Outcome::Success => "Succeeded",
                Outcome::SuccessWithIssues => "SucceededWithIssues",
                Outcome::Failure => "Failed",
            };
            writeln!(
                out,
                "##vso[task.complete result={result};]{}",
                escape_data(&verdict.message)
            )
        }
    }
}

/// Escape a logging command message body.
fn escape_data(s: &str) -> String {
    s.replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Event sink for the binary: traces every event and, for Azure DevOps,
/// raises task failures and anomalies as pipeline issues.
pub struct PipelineSink<W> {
    format: ReportFormat,
    out: W,
    tracing: TracingSink,
}

impl<W: Write> PipelineSink<W> {
    pub fn new(format: ReportFormat, out: W) -> Self {
        Self {
            format,
            out,
            tracing: TracingSink,
        }
    }

    fn issue(&mut self, kind: &str, message: &str) {
        if let Err(e) = writeln!(
            self.out,
            "##vso[task.logissue type={kind}]{}",
            escape_data(message)
        ) {
            warn!(error = %e, "failed to write pipeline issue");
        }
    }
}

impl<W: Write> EventSink for PipelineSink<W> {
    fn emit(&mut self, event: MonitorEvent) {
        if self.format == ReportFormat::AzureDevops {
            match &event {
                MonitorEvent::TaskError {
                    service,
                    task,
                    error: Some(err),
                } => self.issue("error", &format!("{service}: task {task} failed: {err}")),
                MonitorEvent::Anomaly {
                    service,
                    previous,
                    reported,
                } => self.issue(
                    "warning",
                    &format!("{service}: reported {reported} after reaching {previous}"),
                ),
                _ => {}
            }
        }
        self.tracing.emit(event);
    }
}
