//! Convergence monitor — drives the poll loop to a verdict.
//!
//! The tracked set is seeded once from inventory and never changes
//! afterwards. Each cycle issues one batched status read, applies the
//! results in inventory order, and then checks whether every service is
//! terminal. Only one cycle is ever in flight; the delay between cycles is
//! injected so tests can run the loop without real time passing.

use std::future::Future;
use std::time::Duration;

use stackwatch_core::{TrackedService, UpdateState, UpdateStatus, WatchError, WatchResult};
use stackwatch_transport::CommandTransport;
use tracing::{debug, info, warn};

use crate::events::{EventSink, MonitorEvent};
use crate::readers::{read_inventory, read_statuses, read_task_errors};
use crate::task_ref::extract_task_id;
use crate::verdict::{Buckets, Verdict};

/// Pause between the end of one poll cycle and the start of the next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Suspends the monitor between poll cycles.
pub trait PollDelay {
    fn wait(&mut self, interval: Duration) -> impl Future<Output = ()> + Send;
}

impl<D: PollDelay> PollDelay for &mut D {
    fn wait(&mut self, interval: Duration) -> impl Future<Output = ()> + Send {
        (**self).wait(interval)
    }
}

/// Real-time delay backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

impl PollDelay for TokioDelay {
    async fn wait(&mut self, interval: Duration) {
        tokio::time::sleep(interval).await;
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub verdict: Verdict,
    /// Poll cycles started, including a failed one.
    pub cycles: u32,
    /// The error that ended the run early, if any.
    pub error: Option<WatchError>,
}

/// Watches the services of one stack until all of them are terminal.
pub struct ConvergenceMonitor<T, D, S> {
    transport: T,
    delay: D,
    sink: S,
    stack: String,
    poll_interval: Duration,
    /// Tracked services in inventory order.
    services: Vec<TrackedService>,
    /// Last post-terminal state flagged per service, parallel to `services`.
    flagged: Vec<Option<UpdateState>>,
    seeded: bool,
    cycles: u32,
}

impl<T, D, S> ConvergenceMonitor<T, D, S>
where
    T: CommandTransport,
    D: PollDelay,
    S: EventSink,
{
    pub fn new(transport: T, delay: D, sink: S, stack: impl Into<String>) -> Self {
        Self {
            transport,
            delay,
            sink,
            stack: stack.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            services: Vec::new(),
            flagged: Vec::new(),
            seeded: false,
            cycles: 0,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn services(&self) -> &[TrackedService] {
        &self.services
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run from inventory to verdict.
    ///
    /// Any reader failure ends the run immediately with a failure verdict;
    /// no buckets are reported in that case.
    pub async fn run(&mut self) -> RunOutcome {
        match self.seed().await {
            Ok(0) => {
                info!(stack = %self.stack, "stack has no services");
                return self.finish(Verdict::empty_stack(&self.stack), None);
            }
            Ok(_) => {}
            Err(e) => return self.abort(e),
        }

        loop {
            match self.poll_once().await {
                Ok(true) => break,
                Ok(false) => self.delay.wait(self.poll_interval).await,
                Err(e) => return self.abort(e),
            }
        }

        let verdict = self.summarize();
        self.finish(verdict, None)
    }

    /// Read the inventory and start tracking every listed service.
    ///
    /// Returns the number of tracked services. Later calls do not re-read.
    pub async fn seed(&mut self) -> WatchResult<usize> {
        if self.seeded {
            return Ok(self.services.len());
        }

        let descriptors = read_inventory(&self.transport, &self.stack).await?;
        self.services = descriptors.into_iter().map(TrackedService::new).collect();
        self.flagged = vec![None; self.services.len()];
        self.seeded = true;

        self.sink.emit(MonitorEvent::Inventory {
            stack: self.stack.clone(),
            services: self.services.iter().map(|s| s.name().to_string()).collect(),
        });

        Ok(self.services.len())
    }

    /// Run a single poll cycle. Returns whether every service is now terminal.
    pub async fn poll_once(&mut self) -> WatchResult<bool> {
        self.cycles += 1;

        let ids: Vec<&str> = self
            .services
            .iter()
            .map(|s| s.descriptor.id.as_str())
            .collect();
        let mut statuses = read_statuses(&self.transport, &ids).await?;

        for pos in 0..self.services.len() {
            let key = self.services[pos].descriptor.short_id().to_string();
            let Some(status) = statuses.remove(&key) else {
                continue;
            };
            if let Some(task) = self.apply_status(pos, status) {
                self.report_task_error(pos, &task).await;
            }
        }

        for id in statuses.keys() {
            debug!(%id, "status for untracked service ignored");
        }

        let pending = self.services.iter().filter(|s| !s.is_terminal()).count();
        self.sink.emit(MonitorEvent::CycleCompleted {
            cycle: self.cycles,
            pending,
        });

        Ok(pending == 0)
    }

    /// Record a freshly read status.
    ///
    /// Returns the task to look up when the service has just moved into a
    /// paused or rollback state whose message names one.
    fn apply_status(&mut self, pos: usize, status: UpdateStatus) -> Option<String> {
        let svc = &mut self.services[pos];
        let previous = svc.state();

        if let Some(prev) = previous.filter(|p| p.is_terminal()) {
            let flagged = &mut self.flagged[pos];
            if prev != status.state && *flagged != Some(status.state) {
                *flagged = Some(status.state);
                self.sink.emit(MonitorEvent::Anomaly {
                    service: svc.name().to_string(),
                    previous: prev,
                    reported: status.state,
                });
            }
            if !status.state.is_terminal() {
                return None;
            }
        }

        let transitioning = previous != Some(status.state);
        let to = status.state;
        let task = (transitioning && to.reports_task_failure())
            .then(|| extract_task_id(&status.message).map(str::to_string))
            .flatten();

        if transitioning {
            self.flagged[pos] = None;
            self.sink.emit(MonitorEvent::Transition {
                service: svc.name().to_string(),
                from: previous,
                to,
                message: status.message.clone(),
            });
        }
        svc.status = Some(status);

        task
    }

    /// Look up and surface why `task` terminated. Failures here are diagnostic only.
    async fn report_task_error(&mut self, pos: usize, task: &str) {
        let service = self.services[pos].name().to_string();
        let key = self.services[pos].descriptor.short_id().to_string();

        match read_task_errors(&self.transport, &[task]).await {
            Ok(mut errors) => {
                let error = match errors.remove(&key) {
                    Some(error) => error,
                    None => errors.into_values().next().flatten(),
                };
                self.sink.emit(MonitorEvent::TaskError {
                    service,
                    task: task.to_string(),
                    error,
                });
            }
            Err(e) => {
                warn!(%service, %task, error = %e, "task error lookup failed");
                self.sink.emit(MonitorEvent::TaskErrorLookupFailed {
                    service,
                    task: task.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Emit the bucket summary and compute the verdict.
    fn summarize(&mut self) -> Verdict {
        let buckets = Buckets::partition(&self.services);
        for (kind, service, detail) in buckets.entries() {
            self.sink.emit(MonitorEvent::Bucket {
                kind,
                service: service.to_string(),
                detail: detail.to_string(),
            });
        }
        buckets.verdict()
    }

    fn abort(&mut self, error: WatchError) -> RunOutcome {
        warn!(stack = %self.stack, cycles = self.cycles, error = %error, "watch aborted");
        self.finish(Verdict::failure(error.to_string()), Some(error))
    }

    fn finish(&mut self, verdict: Verdict, error: Option<WatchError>) -> RunOutcome {
        self.sink.emit(MonitorEvent::Verdict(verdict.clone()));
        RunOutcome {
            verdict,
            cycles: self.cycles,
            error,
        }
    }
}
