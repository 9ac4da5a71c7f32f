//! End-to-end convergence scenarios against a scripted transport.
//!
//! The transport answers each command kind from its own queue, so a test
//! reads as "inventory returns X, then polls return Y, Z".

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use stackwatch_core::{TransportError, UpdateState};
use stackwatch_monitor::{
    BucketKind, ConvergenceMonitor, MonitorEvent, Outcome, PollDelay, Verdict,
};
use stackwatch_transport::CommandTransport;

type Reply = Result<Vec<String>, TransportError>;

#[derive(Default)]
struct ScriptedTransport {
    inventory: Mutex<VecDeque<Reply>>,
    status: Mutex<VecDeque<Reply>>,
    tasks: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedTransport {
    fn inventory(self, lines: Vec<String>) -> Self {
        self.inventory.lock().unwrap().push_back(Ok(lines));
        self
    }

    fn poll(self, lines: Vec<String>) -> Self {
        self.status.lock().unwrap().push_back(Ok(lines));
        self
    }

    fn poll_fails(self, stderr: &str) -> Self {
        self.status.lock().unwrap().push_back(Err(exit_error(stderr)));
        self
    }

    fn task(self, lines: Vec<String>) -> Self {
        self.tasks.lock().unwrap().push_back(Ok(lines));
        self
    }

    fn task_fails(self, stderr: &str) -> Self {
        self.tasks.lock().unwrap().push_back(Err(exit_error(stderr)));
        self
    }

    fn calls_of(&self, kind: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|args| command_kind(args) == kind)
            .cloned()
            .collect()
    }
}

fn command_kind(args: &[String]) -> &'static str {
    match (args[0].as_str(), args[1].as_str()) {
        ("service", "ls") => "inventory",
        ("service", "inspect") => "status",
        ("inspect", _) => "task",
        _ => "unknown",
    }
}

fn exit_error(stderr: &str) -> TransportError {
    TransportError::Exit {
        command: "docker".to_string(),
        code: 1,
        stderr: vec![stderr.to_string()],
    }
}

impl CommandTransport for ScriptedTransport {
    async fn execute(&self, args: &[String]) -> Reply {
        self.calls.lock().unwrap().push(args.to_vec());
        let queue = match command_kind(args) {
            "inventory" => &self.inventory,
            "status" => &self.status,
            "task" => &self.tasks,
            other => panic!("unexpected command kind {other}: {args:?}"),
        };
        // An exhausted queue means "nothing reported".
        queue.lock().unwrap().pop_front().unwrap_or(Ok(Vec::new()))
    }
}

#[derive(Default)]
struct CountingDelay {
    waits: u32,
}

impl PollDelay for CountingDelay {
    async fn wait(&mut self, _interval: Duration) {
        self.waits += 1;
    }
}

// ── Fixtures ───────────────────────────────────────────────────────

const API: &str = "apiapiapiapi1111111111111";
const WEB: &str = "webwebwebweb2222222222222";
const DB: &str = "dbdbdbdbdbdb3333333333333";

fn service(id: &str, name: &str) -> String {
    format!(
        r#"{{"ID":"{id}","Image":"registry.local/{name}:2","Mode":"replicated","Name":"{name}","Ports":"","Replicas":"2/2"}}"#
    )
}

fn status(id: &str, state: &str, message: &str) -> String {
    format!(
        r#"{{"{}":{{"State":"{state}","StartedAt":"2024-05-01T10:00:00Z","Message":"{message}"}}}}"#,
        &id[..12]
    )
}

fn no_update(id: &str) -> String {
    format!(r#"{{"{}":null}}"#, &id[..12])
}

fn task_error(service_id: &str, err: &str) -> String {
    format!(r#"{{"{}":"{err}"}}"#, &service_id[..12])
}

fn transitions(events: &[MonitorEvent]) -> Vec<(String, Option<UpdateState>, UpdateState)> {
    events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::Transition {
                service, from, to, ..
            } => Some((service.clone(), *from, *to)),
            _ => None,
        })
        .collect()
}

fn buckets(events: &[MonitorEvent]) -> Vec<(BucketKind, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            MonitorEvent::Bucket { kind, service, .. } => Some((*kind, service.clone())),
            _ => None,
        })
        .collect()
}

type Monitor<'a> = ConvergenceMonitor<&'a ScriptedTransport, CountingDelay, Vec<MonitorEvent>>;

fn watch(transport: &ScriptedTransport) -> Monitor<'_> {
    ConvergenceMonitor::new(transport, CountingDelay::default(), Vec::new(), "shop")
}

// ── Scenarios ──────────────────────────────────────────────────────

#[tokio::test]
async fn empty_stack_succeeds_with_issues() {
    let transport = ScriptedTransport::default().inventory(Vec::new());
    let mut events: Vec<MonitorEvent> = Vec::new();
    let mut monitor =
        ConvergenceMonitor::new(&transport, CountingDelay::default(), &mut events, "shop");

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict.outcome, Outcome::SuccessWithIssues);
    assert!(outcome.verdict.message.contains("shop"));
    assert_eq!(outcome.cycles, 0);
    assert!(transport.calls_of("status").is_empty());
    drop(monitor);
    assert_eq!(
        events.last(),
        Some(&MonitorEvent::Verdict(Verdict::empty_stack("shop")))
    );
}

#[tokio::test]
async fn all_services_complete_in_first_cycle() {
    let transport = ScriptedTransport::default()
        .inventory(vec![
            service(API, "shop_api"),
            service(WEB, "shop_web"),
            service(DB, "shop_db"),
        ])
        .poll(vec![
            status(API, "completed", "update completed"),
            status(WEB, "completed", "update completed"),
            status(DB, "completed", "update completed"),
        ]);
    let mut delay = CountingDelay::default();
    let mut monitor =
        ConvergenceMonitor::new(&transport, &mut delay, Vec::<MonitorEvent>::new(), "shop");

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict, Verdict::success("3 service(s) updated."));
    assert_eq!(outcome.cycles, 1);
    assert!(outcome.error.is_none());

    let events = monitor.into_sink();
    assert_eq!(
        buckets(&events),
        vec![
            (BucketKind::Completed, "shop_api".to_string()),
            (BucketKind::Completed, "shop_web".to_string()),
            (BucketKind::Completed, "shop_db".to_string()),
        ]
    );
    assert_eq!(delay.waits, 0);
}

#[tokio::test]
async fn paused_service_reports_task_error_and_fails() {
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api"), service(WEB, "shop_web")])
        .poll(vec![
            status(API, "updating", "update in progress"),
            no_update(WEB),
        ])
        .poll(vec![
            status(
                API,
                "paused",
                "update paused due to failure or early termination of task abc123def456",
            ),
            no_update(WEB),
        ])
        .task(vec![task_error(API, "task: non-zero exit (1)")]);
    let mut monitor = watch(&transport);

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict.outcome, Outcome::Failure);
    assert_eq!(
        outcome.verdict.message,
        "0 service(s) updated, 0 rolled back, 1 paused."
    );

    let task_calls = transport.calls_of("task");
    assert_eq!(task_calls.len(), 1);
    assert_eq!(task_calls[0].last().map(String::as_str), Some("abc123def456"));

    let events = monitor.into_sink();
    assert!(events.contains(&MonitorEvent::TaskError {
        service: "shop_api".to_string(),
        task: "abc123def456".to_string(),
        error: Some("task: non-zero exit (1)".to_string()),
    }));
    assert_eq!(buckets(&events), vec![(BucketKind::Paused, "shop_api".to_string())]);

    // The task error is reported before the cycle closes.
    let error_at = events
        .iter()
        .position(|e| matches!(e, MonitorEvent::TaskError { .. }))
        .unwrap();
    let second_cycle_at = events
        .iter()
        .position(|e| matches!(e, MonitorEvent::CycleCompleted { cycle: 2, .. }))
        .unwrap();
    assert!(error_at < second_cycle_at);
}

#[tokio::test]
async fn service_without_status_is_excluded_from_buckets() {
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api"), service(WEB, "shop_web")])
        .poll(vec![status(API, "updating", "update in progress")])
        .poll(vec![status(API, "updating", "update in progress")])
        .poll(vec![status(API, "completed", "update completed")]);
    let mut monitor = watch(&transport);

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict, Verdict::success("1 service(s) updated."));
    assert_eq!(outcome.cycles, 3);
    assert!(monitor.services()[1].status.is_none());
    assert_eq!(
        buckets(monitor.sink()),
        vec![(BucketKind::Completed, "shop_api".to_string())]
    );
}

#[tokio::test]
async fn status_transport_failure_aborts_without_buckets() {
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api")])
        .poll(vec![status(API, "updating", "update in progress")])
        .poll_fails("error during connect: connection refused");
    let mut monitor = watch(&transport);

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict.outcome, Outcome::Failure);
    assert!(outcome.verdict.message.contains("connection refused"));
    assert_eq!(outcome.cycles, 2);
    assert!(matches!(
        outcome.error,
        Some(stackwatch_core::WatchError::Transport(TransportError::Exit { .. }))
    ));
    assert!(buckets(monitor.sink()).is_empty());
}

#[tokio::test]
async fn inventory_failure_aborts_before_polling() {
    let transport = ScriptedTransport::default();
    transport
        .inventory
        .lock()
        .unwrap()
        .push_back(Err(exit_error("Cannot connect to the Docker daemon")));
    let mut monitor = watch(&transport);

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict.outcome, Outcome::Failure);
    assert_eq!(outcome.cycles, 0);
    assert!(transport.calls_of("status").is_empty());
}

#[tokio::test]
async fn undecodable_status_line_aborts() {
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api")])
        .poll(vec!["Error: No such service".to_string()]);
    let mut monitor = watch(&transport);

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict.outcome, Outcome::Failure);
    assert!(matches!(
        outcome.error,
        Some(stackwatch_core::WatchError::Decode { .. })
    ));
}

#[tokio::test]
async fn task_error_lookup_failure_does_not_change_verdict() {
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api")])
        .poll(vec![status(
            API,
            "rollback_started",
            "update rolled back due to failure or early termination of task zz9plural0",
        )])
        .task_fails("no such task")
        .poll(vec![status(API, "rollback_completed", "rollback completed")]);
    let mut monitor = watch(&transport);

    let outcome = monitor.run().await;

    assert_eq!(
        outcome.verdict,
        Verdict::failure("0 service(s) updated, 1 rolled back, 0 paused.")
    );
    assert!(outcome.error.is_none());
    assert!(monitor.sink().iter().any(|e| matches!(
        e,
        MonitorEvent::TaskErrorLookupFailed { task, .. } if task == "zz9plural0"
    )));
}

#[tokio::test]
async fn message_without_task_skips_lookup() {
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api")])
        .poll(vec![status(API, "paused", "update paused by operator")]);
    let mut monitor = watch(&transport);

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict.outcome, Outcome::Failure);
    assert!(transport.calls_of("task").is_empty());
}

#[tokio::test]
async fn no_updates_anywhere_is_nothing_to_do() {
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api"), service(WEB, "shop_web")])
        .poll(vec![no_update(API), no_update(WEB)]);
    let mut monitor = watch(&transport);

    let outcome = monitor.run().await;

    assert_eq!(outcome.verdict, Verdict::success("nothing to do"));
    assert_eq!(outcome.cycles, 1);
}

// ── Properties ─────────────────────────────────────────────────────

#[tokio::test]
async fn identical_polls_emit_no_new_transitions() {
    let line = status(API, "updating", "update in progress");
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api")])
        .poll(vec![line.clone()])
        .poll(vec![line]);
    let mut monitor = watch(&transport);

    monitor.seed().await.unwrap();
    assert!(!monitor.poll_once().await.unwrap());
    let after_first = monitor.services().to_vec();
    let transitions_after_first = transitions(monitor.sink()).len();

    assert!(!monitor.poll_once().await.unwrap());

    assert_eq!(monitor.services(), after_first.as_slice());
    assert_eq!(transitions(monitor.sink()).len(), transitions_after_first);
    assert_eq!(transitions_after_first, 1);
}

#[tokio::test]
async fn omitted_service_keeps_previous_status() {
    let transport = ScriptedTransport::default()
        .inventory(vec![service(API, "shop_api"), service(WEB, "shop_web")])
        .poll(vec![
            status(API, "updating", "update in progress"),
            status(WEB, "completed", "update completed"),
        ])
        .poll(vec![status(API, "completed", "update completed")]);
    let mut monitor = watch(&transport);

    monitor.seed().await.unwrap();
    assert!(!monitor.poll_once().await.unwrap());
    assert!(monitor.poll_once().await.unwrap());

    assert_eq!(monitor.services()[1].state(), Some(UpdateState::Completed));
    assert_eq!(
        transitions(monitor.sink()),
        vec![
            ("shop_api".to_string(), None, UpdateState::Updating),
            ("shop_web".to_string(), None, UpdateState::Completed),
            (
                "shop_api".to_string(),
                Some(UpdateState::Updating),
                UpdateState::Completed
            ),
        ]
    );
}

#[tokio::test]
async fn one_status_call_per_cycle_regardless_of_service_count() {
    let transport = ScriptedTransport::default()
        .inventory(vec![
            service(API, "shop_api"),
            service(WEB, "shop_web"),
            service(DB, "shop_db"),
        ])
        .poll(vec![status(API, "updating", "")])
        .poll(vec![
            status(API, "completed", ""),
            status(WEB, "completed", ""),
            status(DB, "rollback_completed", ""),
        ]);
    let mut delay = CountingDelay::default();
    let mut monitor =
        ConvergenceMonitor::new(&transport, &mut delay, Vec::<MonitorEvent>::new(), "shop");

    let outcome = monitor.run().await;
    drop(monitor);

    let status_calls = transport.calls_of("status");
    assert_eq!(status_calls.len(), 2);
    assert!(status_calls[0].ends_with(&[API.to_string(), WEB.to_string(), DB.to_string()]));
    assert_eq!(delay.waits, 1);
    assert_eq!(
        outcome.verdict.message,
        "2 service(s) updated, 1 rolled back, 0 paused."
    );
}

#[tokio::test]
async fn rollback_paused_and_rollback_completed_bucket_separately() {
    let transport = ScriptedTransport::default()
        .inventory(vec![
            service(API, "shop_api"),
            service(WEB, "shop_web"),
            service(DB, "shop_db"),
        ])
        .poll(vec![
            status(API, "rollback_paused", "rollback paused"),
            status(WEB, "rollback_completed", "rollback completed"),
            status(DB, "completed", "update completed"),
        ]);
    let mut monitor = watch(&transport);

    monitor.run().await;

    assert_eq!(
        buckets(monitor.sink()),
        vec![
            (BucketKind::Completed, "shop_db".to_string()),
            (BucketKind::RolledBack, "shop_web".to_string()),
            (BucketKind::Paused, "shop_api".to_string()),
        ]
    );
}
