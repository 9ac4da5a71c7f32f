//! stackwatch — watch a stack rollout from a pipeline step.
//!
//! Reads the stack's services, polls their update status until every one
//! of them has completed, paused, or rolled back, and reports a single
//! verdict to the pipeline.
//!
//! # Usage
//!
//! ```text
//! stackwatch --stack shop --host tcp://swarm.internal:2376 --tls-cert-dir /etc/docker/certs
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use stackwatch_monitor::{ConvergenceMonitor, TokioDelay, Verdict};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod report;

use config::{FileConfig, Inputs, Settings};
use report::{PipelineSink, ReportFormat};

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(
    name = "stackwatch",
    about = "Watch a stack rollout until every service converges",
    version
)]
struct Cli {
    /// Name of the stack to watch.
    #[arg(short, long, env = "STACKWATCH_STACK")]
    stack: String,

    /// Engine address (e.g. tcp://swarm.internal:2376). Local engine if unset.
    #[arg(long, env = "DOCKER_HOST")]
    host: Option<String>,

    /// CA certificate PEM contents.
    #[arg(long, env = "STACKWATCH_TLS_CA", hide_env_values = true)]
    tls_ca: Option<String>,

    /// Client certificate PEM contents.
    #[arg(long, env = "STACKWATCH_TLS_CERT", hide_env_values = true)]
    tls_cert: Option<String>,

    /// Client key PEM contents.
    #[arg(long, env = "STACKWATCH_TLS_KEY", hide_env_values = true)]
    tls_key: Option<String>,

    /// Directory holding ca.pem, cert.pem and key.pem.
    #[arg(long, env = "DOCKER_CERT_PATH")]
    tls_cert_dir: Option<PathBuf>,

    /// Docker CLI to run (default: `docker` on PATH).
    #[arg(long, env = "STACKWATCH_DOCKER")]
    docker: Option<PathBuf>,

    /// Delay between poll cycles in milliseconds (default: 100).
    #[arg(long, env = "STACKWATCH_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Give up after this many seconds. Unlimited if unset or 0.
    #[arg(long, env = "STACKWATCH_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// How to report the result on stdout.
    #[arg(long, value_enum, default_value = "plain", env = "STACKWATCH_REPORT")]
    report: ReportFormat,

    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Optional stackwatch.toml.
    #[arg(short, long, env = "STACKWATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn inputs(&self) -> Inputs {
        Inputs {
            stack: self.stack.clone(),
            host: self.host.clone(),
            tls_ca: self.tls_ca.clone(),
            tls_cert: self.tls_cert.clone(),
            tls_key: self.tls_key.clone(),
            tls_cert_dir: self.tls_cert_dir.clone(),
            docker: self.docker.clone(),
            poll_interval_ms: self.poll_interval_ms,
            timeout_secs: self.timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let file = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(cli.inputs(), file)?;

    // Staged credentials are removed when dropped at the end of main.
    let (transport, _staged) = settings.transport()?;

    info!(
        stack = %settings.stack,
        poll_interval_ms = settings.poll_interval.as_millis() as u64,
        "watching rollout"
    );

    let sink = PipelineSink::new(cli.report, std::io::stdout());
    let mut monitor = ConvergenceMonitor::new(transport, TokioDelay, sink, &settings.stack)
        .with_poll_interval(settings.poll_interval);

    let verdict = match settings.timeout {
        Some(limit) => match tokio::time::timeout(limit, monitor.run()).await {
            Ok(outcome) => outcome.verdict,
            Err(_) => timed_out(limit),
        },
        None => monitor.run().await.verdict,
    };

    report::write_verdict(cli.report, &verdict, &mut std::io::stdout())?;
    Ok(report::exit_code(verdict.outcome))
}

fn timed_out(limit: Duration) -> Verdict {
    let verdict = Verdict::failure(format!(
        "rollout did not converge within {}s",
        limit.as_secs()
    ));
    error!(message = %verdict.message, "rollout failed");
    verdict
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
