//! stackwatch-monitor — watches a stack rollout until it converges.
//!
//! The orchestrator updates services asynchronously and never pushes
//! progress, so the monitor polls. Each cycle reads the update status of
//! every tracked service in one batched call, records state transitions,
//! looks up the failing task when a service pauses or rolls back, and
//! checks whether every service has reached a terminal state. Once they
//! have, the services are bucketed into completed / rolled back / paused
//! and a single verdict is rendered.
//!
//! # Components
//!
//! - **`readers`** — inventory, status, and task-error queries over a `CommandTransport`
//! - **`task_ref`** — extracts the failing task identifier from a status message
//! - **`events`** — the diagnostic event stream and its sinks
//! - **`verdict`** — bucketing and the final verdict policy
//! - **`monitor`** — the poll loop and per-service state machine

pub mod events;
pub mod monitor;
pub mod readers;
pub mod task_ref;
pub mod verdict;

pub use events::{EventSink, MonitorEvent, TracingSink};
pub use monitor::{ConvergenceMonitor, PollDelay, RunOutcome, TokioDelay, DEFAULT_POLL_INTERVAL};
pub use verdict::{BucketKind, Buckets, Outcome, Verdict};
