//! stackwatch-transport — runs orchestrator commands and returns their output.
//!
//! # Components
//!
//! - **`transport`** — the `CommandTransport` contract the readers consume
//! - **`docker`** — `DockerCli`, a transport that spawns the docker CLI
//!   against a local or remote (mutual TLS) engine
//! - **`credentials`** — stages PEM material into a private temp directory

pub mod credentials;
pub mod docker;
pub mod transport;

pub use credentials::{StagedCredentials, TlsPaths};
pub use docker::{DockerCli, Endpoint};
pub use transport::CommandTransport;
