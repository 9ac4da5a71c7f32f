//! The command execution contract.

use std::future::Future;

use stackwatch_core::TransportError;

/// Executes one orchestrator command and yields its stdout as lines.
///
/// Implementations own endpoint selection and credentials. Callers pass
/// only the command arguments (no program name) and never see either.
pub trait CommandTransport {
    fn execute(
        &self,
        args: &[String],
    ) -> impl Future<Output = Result<Vec<String>, TransportError>> + Send;
}

impl<T: CommandTransport + Sync> CommandTransport for &T {
    fn execute(
        &self,
        args: &[String],
    ) -> impl Future<Output = Result<Vec<String>, TransportError>> + Send {
        (**self).execute(args)
    }
}
