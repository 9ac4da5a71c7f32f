//! Diagnostic events emitted by the convergence monitor.
//!
//! The monitor never reports to a host directly. It hands every
//! observation to an [`EventSink`]; the binary renders them through
//! `tracing`, tests collect them into a `Vec`.

use stackwatch_core::UpdateState;
use tracing::{debug, error, info, warn};

use crate::verdict::{BucketKind, Outcome, Verdict};

/// One observation made while watching a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Inventory was read; `services` lists their names in order.
    Inventory { stack: String, services: Vec<String> },
    /// A service's reported state changed (or was reported for the first time).
    Transition {
        service: String,
        from: Option<UpdateState>,
        to: UpdateState,
        message: String,
    },
    /// Failure detail of the task that paused or rolled back a service.
    TaskError {
        service: String,
        task: String,
        error: Option<String>,
    },
    /// The task error lookup itself failed. Diagnostic only.
    TaskErrorLookupFailed {
        service: String,
        task: String,
        error: String,
    },
    /// The orchestrator reported a change away from a terminal state.
    Anomaly {
        service: String,
        previous: UpdateState,
        reported: UpdateState,
    },
    /// A poll cycle finished; `pending` services are still non-terminal.
    CycleCompleted { cycle: u32, pending: usize },
    /// One service's place in the final summary.
    Bucket {
        kind: BucketKind,
        service: String,
        detail: String,
    },
    Verdict(Verdict),
}

/// Receiver of monitor events.
pub trait EventSink {
    fn emit(&mut self, event: MonitorEvent);
}

impl EventSink for Vec<MonitorEvent> {
    fn emit(&mut self, event: MonitorEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: MonitorEvent) {
        (**self).emit(event);
    }
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Inventory { stack, services } => {
                info!(%stack, count = services.len(), services = ?services, "watching stack");
            }
            MonitorEvent::Transition {
                service,
                from,
                to,
                message,
            } => {
                let from = from.map_or("none", UpdateState::as_str);
                info!(%service, %from, %to, %message, "state transition");
            }
            MonitorEvent::TaskError {
                service,
                task,
                error: Some(err),
            } => {
                error!(%service, %task, error = %err, "task failed");
            }
            MonitorEvent::TaskError {
                service,
                task,
                error: None,
            } => {
                warn!(%service, %task, "task terminated without a recorded error");
            }
            MonitorEvent::TaskErrorLookupFailed {
                service,
                task,
                error,
            } => {
                warn!(%service, %task, %error, "could not read task error");
            }
            MonitorEvent::Anomaly {
                service,
                previous,
                reported,
            } => {
                warn!(%service, %previous, %reported, "state changed after reaching a terminal state");
            }
            MonitorEvent::CycleCompleted { cycle, pending } => {
                debug!(cycle, pending, "poll cycle complete");
            }
            MonitorEvent::Bucket {
                kind,
                service,
                detail,
            } => match kind {
                BucketKind::Completed => info!(%service, image = %detail, "updated"),
                BucketKind::RolledBack => warn!(%service, message = %detail, "rolled back"),
                BucketKind::Paused => warn!(%service, message = %detail, "paused"),
            },
            MonitorEvent::Verdict(verdict) => match verdict.outcome {
                Outcome::Success => info!(message = %verdict.message, "rollout succeeded"),
                Outcome::SuccessWithIssues => {
                    warn!(message = %verdict.message, "rollout succeeded with issues")
                }
                Outcome::Failure => error!(message = %verdict.message, "rollout failed"),
            },
        }
    }
}
