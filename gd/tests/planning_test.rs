//! Integration tests for GoalDaemon
//!
//! These exercise the full pipeline: queue -> processor -> orchestrator
//! -> approval gate -> tree execution, with mock decomposer/executor
//! capabilities.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use goaldaemon::daemon::{Daemon, ResponseSink};
use goaldaemon::domain::{CostKind, Goal, GoalType, Outcome, Plan, Priority, Task};
use goaldaemon::interaction::{ExecutionMode, InteractionGate};
use goaldaemon::planning::{
    Decomposer, Decomposition, DecomposedStep, FilePatternLibrary, GoalExecutor, GoalPlanner, PlanContext,
    PlanningConfig, PlanningOrchestrator,
};
use goaldaemon::scheduler::{SchedulerConfig, SelfTaskGenerator, TaskQueue};
use planstore::Store;

// =============================================================================
// Mock capabilities
// =============================================================================

struct FixedDecomposer {
    steps: usize,
}

#[async_trait]
impl Decomposer for FixedDecomposer {
    async fn decompose(&self, _request: &str, _capabilities: &str) -> eyre::Result<Decomposition> {
        Ok(Decomposition {
            goal_type: GoalType::Linear,
            steps: (1..=self.steps)
                .map(|i| DecomposedStep {
                    description: format!("step {}", i),
                    step_type: GoalType::OneShot,
                    estimated_time_seconds: Some(5.0),
                })
                .collect(),
            risks: Vec::new(),
            missing_info: Vec::new(),
            reasoning: None,
        })
    }
}

struct CountingExecutor {
    invoked: StdMutex<Vec<String>>,
}

impl CountingExecutor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            invoked: StdMutex::new(Vec::new()),
        })
    }

    fn count(&self) -> usize {
        self.invoked.lock().unwrap().len()
    }
}

#[async_trait]
impl GoalExecutor for CountingExecutor {
    async fn execute(&self, goal: &Goal, _ctx: &PlanContext) -> Outcome {
        self.invoked.lock().unwrap().push(goal.description.clone());
        Outcome::success(serde_json::json!({"result": format!("ok: {}", goal.description)}), 0.9)
    }
}

struct NoopGenerator;

#[async_trait]
impl SelfTaskGenerator for NoopGenerator {
    async fn generate(&self, _recent: &[String], _last: Option<&str>) -> eyre::Result<String> {
        Ok("idle housekeeping".to_string())
    }
}

#[derive(Clone)]
struct RecordingSink {
    messages: Arc<StdMutex<Vec<(String, String)>>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            messages: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|(_, m)| m.contains(needle))
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn deliver(&self, source_id: &str, message: &str) {
        self.messages.lock().unwrap().push((source_id.to_string(), message.to_string()));
    }
}

struct TestDaemon {
    daemon: Arc<Daemon>,
    executor: Arc<CountingExecutor>,
    sink: RecordingSink,
    _dir: TempDir,
}

fn build_daemon(decomposer_steps: usize, idle_delay_secs: u64) -> TestDaemon {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path()).unwrap();

    let library = Arc::new(FilePatternLibrary::open(store.clone()).unwrap());
    let planner = GoalPlanner::new(library, store.clone());
    let executor = CountingExecutor::new();
    let gate = Arc::new(InteractionGate::new(ExecutionMode::Interactive));
    let sink = RecordingSink::new();

    let orchestrator = Arc::new(PlanningOrchestrator::new(
        planner,
        Arc::new(FixedDecomposer {
            steps: decomposer_steps,
        }),
        Arc::clone(&executor) as Arc<dyn GoalExecutor>,
        Arc::clone(&gate),
        PlanningConfig::default(),
    ));

    let daemon = Daemon::with_components(
        store,
        orchestrator,
        Arc::clone(&executor) as Arc<dyn GoalExecutor>,
        Arc::new(NoopGenerator),
        Arc::new(sink.clone()),
        gate,
        SchedulerConfig {
            idle_delay_secs,
            persist_interval: 100,
            history_limit: 50,
        },
    );

    TestDaemon {
        daemon: Arc::new(daemon),
        executor,
        sink,
        _dir: dir,
    }
}

async fn wait_for(sink: &RecordingSink, needle: &str) -> bool {
    for _ in 0..100 {
        if sink.contains(needle) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

// =============================================================================
// End-to-end flows
// =============================================================================

#[tokio::test]
async fn test_low_risk_request_executes_end_to_end() {
    let t = build_daemon(3, 60);

    let run = {
        let daemon = Arc::clone(&t.daemon);
        tokio::spawn(async move { daemon.run_until_shutdown().await })
    };

    t.daemon.submit("find the best mechanical keyboard", "user-1", Priority::User).await;

    assert!(wait_for(&t.sink, "Completed: find the best mechanical keyboard").await);
    assert_eq!(t.executor.count(), 3);

    t.daemon.shutdown().await;
    run.await.unwrap();
}

#[tokio::test]
async fn test_high_risk_request_waits_for_approval_then_executes() {
    let t = build_daemon(6, 60);

    let run = {
        let daemon = Arc::clone(&t.daemon);
        tokio::spawn(async move { daemon.run_until_shutdown().await })
    };

    t.daemon.submit("research and compare all the options", "user-2", Priority::User).await;

    // The approval prompt goes out; nothing executes yet
    assert!(wait_for(&t.sink, "Reply 'yes' to proceed").await);
    assert_eq!(t.executor.count(), 0);

    // The user approves from the same source
    t.daemon.submit("yes", "user-2", Priority::User).await;

    assert!(wait_for(&t.sink, "Completed: research and compare all the options").await);
    assert_eq!(t.executor.count(), 6);

    t.daemon.shutdown().await;
    run.await.unwrap();
}

#[tokio::test]
async fn test_high_risk_request_declined() {
    let t = build_daemon(6, 60);

    let run = {
        let daemon = Arc::clone(&t.daemon);
        tokio::spawn(async move { daemon.run_until_shutdown().await })
    };

    t.daemon.submit("research and compare all the options", "user-3", Priority::User).await;
    assert!(wait_for(&t.sink, "Reply 'yes' to proceed").await);

    t.daemon.submit("no", "user-3", Priority::User).await;

    assert!(wait_for(&t.sink, "cancelled").await);
    assert_eq!(t.executor.count(), 0);

    t.daemon.shutdown().await;
    run.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_approval_timeout_defaults_to_cancel() {
    // Long idle delay keeps the loop from spinning self-tasks while the
    // virtual clock advances through the 120s approval timeout
    let t = build_daemon(6, 3600);

    let run = {
        let daemon = Arc::clone(&t.daemon);
        tokio::spawn(async move { daemon.run_until_shutdown().await })
    };

    t.daemon.submit("research and compare all the options", "user-4", Priority::User).await;
    assert!(wait_for(&t.sink, "Reply 'yes' to proceed").await);

    // Nobody answers; advance the clock past the 120s approval timeout
    // and the plan-approval default (cancel) applies
    tokio::time::advance(Duration::from_secs(121)).await;
    assert!(wait_for(&t.sink, "cancelled").await);
    assert_eq!(t.executor.count(), 0);

    t.daemon.shutdown().await;
    run.await.unwrap();
}

#[tokio::test]
async fn test_conversational_input_handled_directly() {
    let t = build_daemon(3, 60);

    let run = {
        let daemon = Arc::clone(&t.daemon);
        tokio::spawn(async move { daemon.run_until_shutdown().await })
    };

    t.daemon.submit("hello there", "user-5", Priority::User).await;

    assert!(wait_for(&t.sink, "ok: hello there").await);
    // One direct executor call, no plan
    assert_eq!(t.executor.count(), 1);

    t.daemon.shutdown().await;
    run.await.unwrap();
}

// =============================================================================
// Property-style checks over the domain model
// =============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn completed_plan(estimated: f64, actual: f64, side_effects: usize) -> Plan {
        let root = Goal::new("root", GoalType::Linear);
        let root_id = root.id.clone();
        let mut plan = Plan::new("property plan", root);

        let child = Goal::new("child", GoalType::OneShot);
        let child_id = plan.add_child(&root_id, child).unwrap();

        {
            let goal = plan.get_goal_mut(&child_id).unwrap();
            goal.estimate_cost(CostKind::Tokens, estimated);
            goal.record_cost(CostKind::Tokens, actual);

            let mut outcome = Outcome::success(serde_json::json!({}), 1.0);
            outcome.side_effects = (0..side_effects).map(|i| format!("effect-{}", i)).collect();
            goal.mark_finished(outcome);
        }

        plan.aggregate_costs();
        plan.mark_started();
        plan.mark_finished(true);
        plan
    }

    proptest! {
        #[test]
        fn evaluation_score_always_in_bounds(
            estimated in 0.0f64..10_000.0,
            actual in 0.0f64..1_000_000.0,
            side_effects in 0usize..100,
        ) {
            let mut plan = completed_plan(estimated, actual, side_effects);
            let score = plan.evaluate_performance();
            prop_assert!((0.0..=1.0).contains(&score), "score {} out of bounds", score);
        }

        #[test]
        fn signature_depends_only_on_shape(
            descriptions in proptest::collection::vec("[a-z ]{1,24}", 1..6),
        ) {
            let build = |descs: &[String]| {
                let root = Goal::new("anything", GoalType::Linear);
                let root_id = root.id.clone();
                let mut plan = Plan::new("anything", root);
                for d in descs {
                    plan.add_child(&root_id, Goal::new(d.clone(), GoalType::OneShot));
                }
                plan
            };

            let fixed: Vec<String> = (0..descriptions.len()).map(|i| format!("fixed-{}", i)).collect();

            let mut a = build(&descriptions);
            let mut b = build(&fixed);
            prop_assert_eq!(a.compute_signature(), b.compute_signature());

            // One more child changes the signature
            let root_id = b.root_goal_id.clone();
            b.add_child(&root_id, Goal::new("extra", GoalType::OneShot));
            prop_assert_ne!(a.compute_signature(), b.compute_signature());
        }
    }
}

// =============================================================================
// Queue ordering (priority invariant at the integration surface)
// =============================================================================

#[tokio::test]
async fn test_priority_invariant_across_bands() {
    let queue = TaskQueue::new();

    queue.enqueue(Task::new("background job", "t", Priority::Background)).await;
    queue.enqueue(Task::new("scheduled job", "t", Priority::Scheduled)).await;
    queue.enqueue(Task::new("user one", "t", Priority::User)).await;
    queue.enqueue(Task::new("user two", "t", Priority::User)).await;
    queue.enqueue(Task::new("emergency", "t", Priority::Interrupt)).await;

    let order: Vec<String> = {
        let mut out = Vec::new();
        while let Some(task) = queue.dequeue().await {
            out.push(task.content);
        }
        out
    };

    assert_eq!(
        order,
        vec!["emergency", "user one", "user two", "scheduled job", "background job"]
    );
}
