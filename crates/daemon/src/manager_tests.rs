// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-manager tests: the end-to-end scenarios of the scheduler, driven
//! through a scripted RPC port standing in for broker and workers.

use super::*;
use crate::rpc_client::RpcPort;
use async_trait::async_trait;
use atlas_core::{Rect, RpcRecord, RpcStatus, ScenarioId, TaskInput};
use atlas_scenario::ScenarioProvider;
use atlas_worker::{HandlerCatalog, HandlerDescriptor, JobContext, JobError, JobHandler};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

const SCENARIO_UUID: &str = "7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01";

struct NoopHandler;

#[async_trait]
impl JobHandler for NoopHandler {
    async fn run(&self, _input: &TaskInput, _ctx: &JobContext) -> Result<String, JobError> {
        Ok("done".into())
    }
}

fn catalog() -> Arc<HandlerCatalog> {
    let mut builder = HandlerCatalog::builder();
    for key in ["consumer_A", "consumer_B", "consumer_C"] {
        builder = builder
            .register(HandlerDescriptor {
                routing_key: key,
                factory: || Arc::new(NoopHandler),
                heartbeat_timeout: Duration::from_secs(2),
                raise_on_close: true,
                validator: None,
            })
            .unwrap();
    }
    Arc::new(builder.build())
}

/// Scripted RPC port: registers requests against the real correlation
/// registry and records every control publish.
struct FakeRpc {
    registry: Arc<CorrelationRegistry>,
    reject: HashSet<String>,
    issued: Mutex<Vec<(String, RequestId)>>,
    closes: Mutex<Vec<(RequestId, String, bool)>>,
    notified: Mutex<Vec<RequestId>>,
}

impl FakeRpc {
    fn new(registry: Arc<CorrelationRegistry>) -> Self {
        Self {
            registry,
            reject: HashSet::new(),
            issued: Mutex::new(Vec::new()),
            closes: Mutex::new(Vec::new()),
            notified: Mutex::new(Vec::new()),
        }
    }

    fn issued_request(&self, index: usize) -> RequestId {
        self.issued.lock()[index].1
    }
}

#[async_trait]
impl RpcPort for FakeRpc {
    async fn request(
        &self,
        task_id: TaskId,
        routing_key: &str,
        _input: &TaskInput,
    ) -> (RpcRecord, Option<mpsc::UnboundedReceiver<Reply>>) {
        let request_id = RequestId::new();
        if self.reject.contains(routing_key) {
            return (
                RpcRecord::new(request_id, routing_key, RpcStatus::Failed, "unknown routing key"),
                None,
            );
        }
        let rx = self.registry.register(request_id, task_id);
        self.issued.lock().push((routing_key.to_string(), request_id));
        (
            RpcRecord::new(
                request_id,
                routing_key,
                RpcStatus::Waiting,
                "the request has been sent",
            ),
            Some(rx),
        )
    }

    async fn close(&self, request_id: RequestId, username: &str, terminate: bool) {
        self.closes.lock().push((request_id, username.to_string(), terminate));
    }

    async fn notify_closed(&self, request_id: RequestId, _username: &str) {
        self.notified.lock().push(request_id);
    }
}

struct Harness {
    manager: TaskManager,
    rpc: Arc<FakeRpc>,
    registry: Arc<CorrelationRegistry>,
    scenario_id: ScenarioId,
    events_rx: mpsc::UnboundedReceiver<String>,
    seen: Vec<Value>,
}

fn harness(doc: &str) -> Harness {
    harness_with(doc, HashSet::new())
}

fn harness_with(doc: &str, reject: HashSet<String>) -> Harness {
    let catalog = catalog();
    let provider = ScenarioProvider::from_document(doc, catalog.as_ref()).unwrap();
    let registry = Arc::new(CorrelationRegistry::new());
    let mut fake = FakeRpc::new(Arc::clone(&registry));
    fake.reject = reject;
    let rpc = Arc::new(fake);
    let events = EventLog::in_memory();
    let events_rx = events.subscribe();
    // Lazy pool: lockless scenarios never touch it
    let pool = sqlx::PgPool::connect_lazy("postgres://localhost/landscape_test").unwrap();

    let manager = TaskManager::new(
        atlas_core::Timeouts {
            start: Duration::from_secs(5),
            close: Duration::from_secs(3),
            terminate: Duration::from_secs(2),
        },
        provider,
        catalog,
        rpc.clone() as Arc<dyn RpcPort>,
        registry.clone(),
        atlas_locks::EditLockManager::new(pool),
        events,
    );

    Harness {
        manager,
        rpc,
        registry,
        scenario_id: ScenarioId::parse(SCENARIO_UUID).unwrap(),
        events_rx,
        seen: Vec::new(),
    }
}

impl Harness {
    fn start(&self) -> TaskId {
        let payload = TaskPayload::new("user1").with_rect(Rect {
            lon_min: 53.0,
            lon_max: 53.1,
            lat_min: 27.0,
            lat_max: 27.1,
        });
        self.manager.start_task(self.scenario_id, payload).unwrap()
    }

    /// Consume event documents until `pred` holds over everything seen.
    async fn wait_until(&mut self, what: &str, pred: impl Fn(&[Value]) -> bool) {
        loop {
            if pred(&self.seen) {
                return;
            }
            let next = tokio::time::timeout(Duration::from_secs(600), self.events_rx.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for: {what}"))
                .unwrap_or_else(|| panic!("event stream ended waiting for: {what}"));
            self.seen.push(serde_json::from_str(&next).unwrap());
        }
    }

    /// Wait until the step at `index` exists in the task document.
    async fn wait_for_step(&mut self, index: usize) -> RequestId {
        self.wait_until("step issuance", |seen| {
            seen.iter().any(|doc| {
                doc["type"] == 1
                    && doc["steps"].as_array().map(|s| s.len() > index).unwrap_or(false)
            })
        })
        .await;
        self.rpc.issued_request(index)
    }

    async fn wait_for_task_status(&mut self, status: RpcStatus) {
        self.wait_until(&format!("task status {status}"), |seen| {
            seen.iter().any(|doc| doc["type"] == 1 && doc["status"] == status.code())
        })
        .await;
    }

    async fn wait_for_close_status(&mut self, status: RpcStatus) {
        self.wait_until(&format!("close-request status {status}"), |seen| {
            seen.iter().any(|doc| doc["type"] == 2 && doc["status"] == status.code())
        })
        .await;
    }

    /// Wait for the task entry to be dropped by `notify_task_closed`.
    async fn wait_gone(&self, task_id: TaskId) {
        for _ in 0..10_000 {
            if self.manager.task_status(task_id).is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("task {task_id} was never dropped");
    }

    fn route(&self, reply: Reply) {
        assert_eq!(self.registry.route(&reply), RouteOutcome::Routed);
    }
}

const ONE_STEP: &str = r#"
<config>
  <scenario name="one_step" uuid="7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01">
    <input type="rect"/>
    <consequent><run>consumer_A</run></consequent>
  </scenario>
</config>
"#;

const TWO_STEPS: &str = r#"
<config>
  <scenario name="two_steps" uuid="7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01">
    <input type="rect"/>
    <consequent>
      <run>consumer_A</run>
      <run>consumer_B</run>
    </consequent>
  </scenario>
</config>
"#;

const CONCURRENT: &str = r#"
<config>
  <scenario name="concurrent_pair" uuid="7a1e9f6e-3a43-4f92-8c7e-2f1f6f2d5a01">
    <input type="rect"/>
    <concurrent>
      <run>consumer_A</run>
      <run>consumer_B</run>
    </concurrent>
  </scenario>
</config>
"#;

#[tokio::test(start_paused = true)]
async fn happy_path_completes_the_task() {
    let mut h = harness(TWO_STEPS);
    let task_id = h.start();

    let first = h.wait_for_step(0).await;
    for step in 1..=10 {
        h.route(Reply::in_progress(first, step as f64 / 10.0, "working"));
    }
    h.route(Reply::completed(first, "step one done"));

    let second = h.wait_for_step(1).await;
    h.route(Reply::completed(second, "step two done"));

    h.wait_for_task_status(RpcStatus::Completed).await;
    h.wait_gone(task_id).await;

    // Status walked inactive → waiting → in progress → completed
    let statuses: Vec<u8> = h
        .seen
        .iter()
        .filter(|doc| doc["type"] == 1)
        .map(|doc| doc["status"].as_u64().unwrap() as u8)
        .collect();
    assert_eq!(statuses.first(), Some(&RpcStatus::Inactive.code()));
    assert!(statuses.contains(&RpcStatus::Waiting.code()));
    assert!(statuses.contains(&RpcStatus::InProgress.code()));
    assert_eq!(statuses.last(), Some(&RpcStatus::Completed.code()));

    // Both steps went terminal, nothing was cancelled
    assert!(h.rpc.closes.lock().is_empty());
    assert!(h.rpc.notified.lock().is_empty());
    assert!(h.registry.is_empty());
    assert_eq!(h.rpc.issued.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn progress_is_monotone_in_task_documents() {
    let mut h = harness(ONE_STEP);
    let task_id = h.start();
    let request = h.wait_for_step(0).await;

    h.route(Reply::in_progress(request, 0.5, "half"));
    // A stale lower progress must not move the bar backwards
    h.route(Reply::in_progress(request, 0.2, "stale"));
    h.route(Reply::completed(request, "done"));
    h.wait_for_task_status(RpcStatus::Completed).await;
    h.wait_gone(task_id).await;

    let mut last = 0.0;
    for doc in h.seen.iter().filter(|d| d["type"] == 1) {
        if let Some(step) = doc["steps"].as_array().and_then(|s| s.first()) {
            let progress = step["progress"].as_f64().unwrap();
            assert!(progress + 1e-9 >= last, "progress went backwards: {progress} < {last}");
            last = progress;
        }
    }
    assert_eq!(last, 1.0);
}

#[tokio::test(start_paused = true)]
async fn step_failure_fails_the_task_and_skips_the_rest() {
    let mut h = harness(TWO_STEPS);
    let task_id = h.start();

    let first = h.wait_for_step(0).await;
    h.route(Reply::failed(first, "generator exploded"));

    h.wait_for_task_status(RpcStatus::Failed).await;
    h.wait_gone(task_id).await;

    assert_eq!(h.rpc.issued.lock().len(), 1, "second step must not be issued");
    // The failed record was already terminal: no close request for it
    assert!(h.rpc.closes.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_sibling_is_cancelled_after_a_failure() {
    let mut h = harness(CONCURRENT);
    let _task_id = h.start();

    let first = h.wait_for_step(0).await;
    let second = h.wait_for_step(1).await;
    assert_eq!(h.rpc.issued.lock()[0].0, "consumer_A");

    h.route(Reply::in_progress(second, 0.2, "working"));
    h.route(Reply::failed(first, "generator exploded"));

    // The sibling gets a graceful close
    h.wait_for_close_status(RpcStatus::Waiting).await;
    {
        let closes = h.rpc.closes.lock();
        assert!(!closes.is_empty());
        assert_eq!(closes[0].0, second);
        assert!(!closes[0].2, "first escalation step is graceful");
    }

    // The worker acknowledges by failing the interrupted step
    h.route(Reply::failed(second, "interrupted by user1"));
    h.wait_for_close_status(RpcStatus::Completed).await;
    h.wait_for_task_status(RpcStatus::Failed).await;

    assert_eq!(h.rpc.notified.lock().as_slice(), [second]);
}

#[tokio::test(start_paused = true)]
async fn graceful_cancel_completes_the_close_request() {
    let mut h = harness(TWO_STEPS);
    let task_id = h.start();

    let first = h.wait_for_step(0).await;
    h.route(Reply::in_progress(first, 0.3, "working"));
    h.wait_for_task_status(RpcStatus::InProgress).await;

    h.manager.request_stop_task(task_id, "user1").await.unwrap();
    h.wait_for_close_status(RpcStatus::Waiting).await;
    assert_eq!(h.rpc.closes.lock().as_slice(), [(first, "user1".to_string(), false)]);

    // Within the close window the worker reports the interruption
    h.route(Reply::failed(first, "interrupted by user1"));

    h.wait_for_close_status(RpcStatus::Completed).await;
    h.wait_for_task_status(RpcStatus::Failed).await;
    h.wait_gone(task_id).await;

    assert_eq!(h.rpc.issued.lock().len(), 1, "closing task must not issue new steps");
    assert_eq!(h.rpc.notified.lock().as_slice(), [first]);
}

#[tokio::test(start_paused = true)]
async fn ignored_close_escalates_to_terminate_and_tear_down() {
    let mut h = harness(ONE_STEP);
    let task_id = h.start();

    let first = h.wait_for_step(0).await;
    h.route(Reply::in_progress(first, 0.3, "working"));
    h.wait_for_task_status(RpcStatus::InProgress).await;

    h.manager.request_stop_task(task_id, "user1").await.unwrap();

    // Close window (3s) elapses silently → terminate; terminate window
    // (2s) elapses too → tear-down with a synthetic failed reply
    h.wait_for_close_status(RpcStatus::Failed).await;
    h.wait_for_task_status(RpcStatus::Failed).await;
    h.wait_gone(task_id).await;

    let closes = h.rpc.closes.lock().clone();
    assert_eq!(closes.len(), 2);
    assert!(!closes[0].2, "first close is graceful");
    assert!(closes[1].2, "second close is the forced terminate");
    assert_eq!(h.rpc.notified.lock().as_slice(), [first]);
}

#[tokio::test(start_paused = true)]
async fn heartbeat_timeout_fails_the_step_and_stops_the_task() {
    let mut h = harness(ONE_STEP);
    let task_id = h.start();

    let first = h.wait_for_step(0).await;
    h.route(Reply::in_progress(first, 0.1, "one heartbeat, then silence"));

    // Nothing more arrives: heartbeat (2s) fires, the step is failed and
    // the cancellation machinery runs to tear-down
    h.wait_for_task_status(RpcStatus::Failed).await;
    h.wait_for_close_status(RpcStatus::Failed).await;
    h.wait_gone(task_id).await;

    let failed_step = h
        .seen
        .iter()
        .filter(|doc| doc["type"] == 1)
        .filter_map(|doc| doc["steps"].as_array().and_then(|s| s.first()).cloned())
        .find(|step| step["status"] == RpcStatus::Failed.code())
        .unwrap();
    assert!(
        failed_step["msg"].as_str().unwrap().contains("heartbeat timeout"),
        "step failure must name the heartbeat timeout"
    );
    assert!(h.rpc.closes.lock().iter().any(|(_, _, terminate)| *terminate));
}

#[tokio::test(start_paused = true)]
async fn unissuable_step_fails_the_task() {
    let mut h = harness_with(ONE_STEP, HashSet::from(["consumer_A".to_string()]));
    let task_id = h.start();

    h.wait_for_task_status(RpcStatus::Failed).await;
    h.wait_gone(task_id).await;
    assert!(h.rpc.issued.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn malformed_reply_is_terminated_defensively() {
    let mut h = harness(ONE_STEP);
    let stray = RequestId::new();

    h.manager.dispatch_reply(b"Hello", Some(&stray.to_string())).await;

    h.wait_until("malformed-reply event", |seen| {
        seen.iter().any(|doc| {
            doc["type"] == 0 && doc["msg"].as_str().unwrap_or("").contains("malformed reply")
        })
    })
    .await;
    assert_eq!(h.rpc.closes.lock().as_slice(), [(stray, SCHEDULER_USER.to_string(), true)]);
}

#[tokio::test(start_paused = true)]
async fn unknown_request_id_is_terminated_defensively() {
    let mut h = harness(ONE_STEP);
    let stray = RequestId::new();

    let reply = Reply::in_progress(stray, 0.4, "who am I");
    h.manager.dispatch_reply(&reply.encode(), Some(&stray.to_string())).await;

    h.wait_until("unknown-request event", |seen| {
        seen.iter().any(|doc| {
            doc["type"] == 0 && doc["msg"].as_str().unwrap_or("").contains("unknown RPC request")
        })
    })
    .await;
    assert_eq!(h.rpc.closes.lock().as_slice(), [(stray, SCHEDULER_USER.to_string(), true)]);
}

#[tokio::test(start_paused = true)]
async fn invalid_payload_never_starts_a_task() {
    let h = harness(ONE_STEP);

    // Rect scenario, payload without a rect
    let result = h.manager.start_task(h.scenario_id, TaskPayload::new("user1"));
    assert!(matches!(result, Err(SchedulerError::StartRejected(_))));
    assert_eq!(h.manager.active_tasks(), 0);
    assert!(h.rpc.issued.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_scenario_is_rejected() {
    let h = harness(ONE_STEP);
    let result = h.manager.start_task(ScenarioId::new(), TaskPayload::new("user1"));
    assert!(matches!(
        result,
        Err(SchedulerError::Scenario(atlas_scenario::ScenarioError::UnknownScenario(_)))
    ));
}
