//! Docker CLI transport.
//!
//! Each call spawns the docker program once, prefixed with the endpoint
//! flags, and waits for it to exit. Stdout is split into lines; blank
//! lines are dropped. A non-zero exit becomes `TransportError::Exit`
//! carrying the captured stderr lines.

use std::path::PathBuf;
use std::process::Stdio;

use stackwatch_core::TransportError;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::credentials::TlsPaths;
use crate::transport::CommandTransport;

/// Which engine the CLI talks to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Endpoint {
    /// Whatever the CLI's own environment points at.
    #[default]
    Local,
    /// An explicit engine address, optionally with mutual TLS.
    Remote {
        host: String,
        tls: Option<TlsPaths>,
    },
}

impl Endpoint {
    /// Global CLI flags selecting this endpoint.
    pub fn cli_args(&self) -> Vec<String> {
        match self {
            Self::Local => Vec::new(),
            Self::Remote { host, tls } => {
                let mut args = vec!["--host".to_string(), host.clone()];
                if let Some(tls) = tls {
                    args.push("--tlsverify".to_string());
                    for (flag, path) in [
                        ("--tlscacert", &tls.ca),
                        ("--tlscert", &tls.cert),
                        ("--tlskey", &tls.key),
                    ] {
                        args.push(flag.to_string());
                        args.push(path.display().to_string());
                    }
                }
                args
            }
        }
    }
}

/// Transport that shells out to the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
    endpoint: Endpoint,
}

impl DockerCli {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            program: PathBuf::from("docker"),
            endpoint,
        }
    }

    /// Use a specific docker binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl CommandTransport for DockerCli {
    async fn execute(&self, args: &[String]) -> Result<Vec<String>, TransportError> {
        let program = self.program.display().to_string();
        let command_line = format!("{program} {}", args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(self.endpoint.cli_args())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %command_line, "executing");

        let output = cmd.output().await.map_err(|source| TransportError::Spawn {
            program: program.clone(),
            source,
        })?;

        let stderr = split_lines(&output.stderr);
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command_line, code, "command failed");
            return Err(TransportError::Exit {
                command: command_line,
                code,
                stderr,
            });
        }

        for line in &stderr {
            debug!(command = %command_line, %line, "stderr");
        }

        Ok(split_lines(&output.stdout))
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
