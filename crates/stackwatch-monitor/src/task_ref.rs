//! Task identifier extraction from update status messages.
//!
//! When a rollout pauses or rolls back because a task failed, the
//! orchestrator says so in free text, e.g.
//! `update paused due to failure or early termination of task 9p7frxeuqlvz`.
//! Only that phrase is recognized, and only an ASCII alphanumeric
//! identifier directly after it.

use std::sync::LazyLock;

use regex::Regex;

static TASK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)early termination of task ([a-z0-9]+)").expect("task pattern is valid")
});

/// The task named by an "early termination of task <id>" phrase, if any.
pub fn extract_task_id(message: &str) -> Option<&str> {
    TASK_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
