//! stackwatch.toml parsing and settings resolution.
//!
//! Flags and environment variables win over the config file; the file
//! wins over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use stackwatch_monitor::DEFAULT_POLL_INTERVAL;
use stackwatch_transport::{DockerCli, Endpoint, StagedCredentials, TlsPaths};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<EndpointConfig>,
    pub monitor: Option<MonitorConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    pub host: Option<String>,
    pub cert_dir: Option<PathBuf>,
    pub docker: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    pub stack: String,
    pub host: Option<String>,
    pub tls_ca: Option<String>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub tls_cert_dir: Option<PathBuf>,
    pub docker: Option<PathBuf>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

/// Where mutual TLS material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsSource {
    None,
    /// PEM contents to stage into a temp directory.
    Pem { ca: String, cert: String, key: String },
    /// A directory already holding `ca.pem`, `cert.pem`, `key.pem`.
    Dir(PathBuf),
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub stack: String,
    pub host: Option<String>,
    pub tls: TlsSource,
    pub docker: PathBuf,
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
}

impl Settings {
    pub fn resolve(inputs: Inputs, file: FileConfig) -> anyhow::Result<Self> {
        let stack = inputs.stack.trim().to_string();
        if stack.is_empty() {
            bail!("stack name must not be empty");
        }

        let endpoint = file.endpoint.unwrap_or_default();
        let monitor = file.monitor.unwrap_or_default();

        let host = inputs
            .host
            .filter(|h| !h.trim().is_empty())
            .or(endpoint.host);

        let tls = match (inputs.tls_ca, inputs.tls_cert, inputs.tls_key) {
            (Some(ca), Some(cert), Some(key)) => TlsSource::Pem { ca, cert, key },
            (None, None, None) => match inputs.tls_cert_dir.or(endpoint.cert_dir) {
                Some(dir) => TlsSource::Dir(dir),
                None => TlsSource::None,
            },
            _ => bail!("--tls-ca, --tls-cert and --tls-key must be given together"),
        };

        if tls != TlsSource::None && host.is_none() {
            bail!("TLS material was provided but no remote host is set");
        }

        let poll_interval = inputs
            .poll_interval_ms
            .or(monitor.poll_interval_ms)
            .map_or(DEFAULT_POLL_INTERVAL, Duration::from_millis);

        let timeout = inputs
            .timeout_secs
            .or(monitor.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            stack,
            host,
            tls,
            docker: inputs
                .docker
                .or(endpoint.docker)
                .unwrap_or_else(|| PathBuf::from("docker")),
            poll_interval,
            timeout,
        })
    }

    /// Build the docker transport, staging PEM material if needed.
    ///
    /// The staged credentials must outlive every command the transport runs.
    pub fn transport(&self) -> anyhow::Result<(DockerCli, Option<StagedCredentials>)> {
        let (endpoint, staged) = match &self.host {
            None => (Endpoint::Local, None),
            Some(host) => {
                let (tls, staged) = match &self.tls {
                    TlsSource::None => (None, None),
                    TlsSource::Dir(dir) => (Some(TlsPaths::in_dir(dir)), None),
                    TlsSource::Pem { ca, cert, key } => {
                        let staged = StagedCredentials::stage(ca, cert, key)
                            .context("failed to stage TLS credentials")?;
                        (Some(staged.paths().clone()), Some(staged))
                    }
                };
                info!(%host, tls = tls.is_some(), "using remote engine");
                (
                    Endpoint::Remote {
                        host: host.clone(),
                        tls,
                    },
                    staged,
                )
            }
        };

        Ok((DockerCli::new(endpoint).with_program(&self.docker), staged))
    }
}
