//! Final verdict policy.
//!
//! Once every service is terminal, services with a status fall into one
//! of three buckets by final state. Services without a status had nothing
//! to update and land in none of them.

use std::fmt;

use stackwatch_core::{TrackedService, UpdateState};

/// Tri-state result handed back to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    SuccessWithIssues,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("succeeded"),
            Self::SuccessWithIssues => f.write_str("succeeded-with-issues"),
            Self::Failure => f.write_str("failed"),
        }
    }
}

/// Outcome plus a one-line summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: Outcome,
    pub message: String,
}

impl Verdict {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Success,
            message: message.into(),
        }
    }

    pub fn with_issues(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::SuccessWithIssues,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure,
            message: message.into(),
        }
    }

    /// Verdict for a stack with no services at all.
    pub fn empty_stack(stack: &str) -> Self {
        Self::with_issues(format!("no service found in stack `{stack}`"))
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.outcome, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    Completed,
    RolledBack,
    Paused,
}

impl BucketKind {
    /// Bucket for a final state, if it has one.
    pub fn for_state(state: UpdateState) -> Option<Self> {
        match state {
            UpdateState::Completed => Some(Self::Completed),
            UpdateState::RollbackCompleted => Some(Self::RolledBack),
            UpdateState::Paused | UpdateState::RollbackPaused => Some(Self::Paused),
            UpdateState::NotStarted | UpdateState::Updating | UpdateState::RollbackStarted => {
                None
            }
        }
    }
}

/// Services partitioned by final state, in tracking order.
#[derive(Debug, Default)]
pub struct Buckets<'a> {
    pub completed: Vec<&'a TrackedService>,
    pub rolled_back: Vec<&'a TrackedService>,
    pub paused: Vec<&'a TrackedService>,
}

impl<'a> Buckets<'a> {
    pub fn partition(services: impl IntoIterator<Item = &'a TrackedService>) -> Self {
        let mut buckets = Self::default();
        for svc in services {
            match svc.state().and_then(BucketKind::for_state) {
                Some(BucketKind::Completed) => buckets.completed.push(svc),
                Some(BucketKind::RolledBack) => buckets.rolled_back.push(svc),
                Some(BucketKind::Paused) => buckets.paused.push(svc),
                None => {}
            }
        }
        buckets
    }

    pub fn verdict(&self) -> Verdict {
        let updated = self.completed.len();
        if self.rolled_back.is_empty() && self.paused.is_empty() {
            if updated == 0 {
                Verdict::success("nothing to do")
            } else {
                Verdict::success(format!("{updated} service(s) updated."))
            }
        } else {
            Verdict::failure(format!(
                "{updated} service(s) updated, {} rolled back, {} paused.",
                self.rolled_back.len(),
                self.paused.len()
            ))
        }
    }

    /// `(kind, service name, detail)` for every bucketed service, grouped by bucket.
    ///
    /// Completed services report their image; the others their status message.
    pub fn entries(&self) -> Vec<(BucketKind, &'a str, &'a str)> {
        let message = |svc: &'a TrackedService| svc.status.as_ref().map_or("", |s| s.message.as_str());

        let completed = self
            .completed
            .iter()
            .map(|&svc| (BucketKind::Completed, svc.name(), svc.descriptor.image.as_str()));
        let rolled_back = self
            .rolled_back
            .iter()
            .map(|&svc| (BucketKind::RolledBack, svc.name(), message(svc)));
        let paused = self
            .paused
            .iter()
            .map(|&svc| (BucketKind::Paused, svc.name(), message(svc)));

        completed.chain(rolled_back).chain(paused).collect()
    }
}
