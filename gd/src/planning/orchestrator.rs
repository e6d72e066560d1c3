//! Planning orchestrator
//!
//! Drives the per-request state machine: should-plan decision, plan
//! construction (pattern reuse or decomposition), risk estimation, the
//! approval handoff for high-risk plans, and goal tree execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use eyre::Result;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{CostKind, Goal, GoalType, Outcome, Plan, Task};
use crate::interaction::{Answer, InteractionGate, Resolution, ResolutionHandle};

use super::decomposer::Decomposer;
use super::executor::{GoalExecutor, PlanContext};
use super::planner::{GoalPlanner, MIN_PATTERN_SCORE};

/// Keywords that strongly suggest planning
const PLANNING_KEYWORDS: &[&str] = &[
    "plan",
    "organize",
    "prepare",
    "schedule",
    "help me",
    "how should i",
    "how do i",
    "how can i",
    "what's the best way",
    "but how",
    "how to",
    "figure out",
    "work out",
    "find a way to",
];

/// Research/comparison queries that need multi-step investigation
const RESEARCH_INDICATORS: &[&str] = &[
    "find the best",
    "what's the best",
    "best",
    "compare",
    "recommend",
    "recommendation",
    "vs",
    "versus",
    "should i buy",
    "should i get",
    "find a",
    "find good",
    "find some",
];

/// References to stored personal data route to lookup, not research
const STORED_DATA_WORDS: &[&str] = &["my", "contact", "calendar", "note"];

/// Intents whose "and" is conversational, not multi-step
const TRIVIAL_INTENTS: &[&str] = &["conversation", "crud_read", "query"];

/// Orchestrator tunables
#[derive(Debug, Clone)]
pub struct PlanningConfig {
    /// OneShot count above which a plan is high-risk
    pub max_steps: usize,

    /// Fixed per-call token estimate
    pub tokens_per_call: usize,

    /// Estimated token total above which a plan is high-risk
    pub token_budget: usize,

    /// Score threshold for pattern matching and promotion
    pub min_pattern_score: f64,

    /// Capability description handed to the decomposer and executor
    pub capabilities: String,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            tokens_per_call: 500,
            token_budget: 5000,
            min_pattern_score: MIN_PATTERN_SCORE,
            capabilities: default_capabilities(),
        }
    }
}

fn default_capabilities() -> String {
    [
        "- LLM: Generate responses, analyze data, make decisions",
        "- Planning: Break down complex tasks into steps",
        "- Execution: Execute multi-step plans with error handling",
    ]
    .join("\n")
}

/// Cost estimate for a plan; the sole approval trigger
#[derive(Debug, Clone)]
pub struct CostEstimate {
    pub api_calls: usize,
    pub tokens: usize,
    pub steps: usize,
    pub high_risk: bool,
    pub summary: String,
}

/// Result of handling a request through planning
#[derive(Debug, Clone)]
pub enum PlanningReply {
    /// Plan executed successfully
    Completed { plan_id: String, message: String },

    /// Plan executed but failed
    Failed { plan_id: String, message: String },

    /// High-risk plan awaiting approval; the caller must route a yes/no
    /// answer back via [`PlanningOrchestrator::submit_approval_answer`]
    NeedsApproval {
        plan_id: String,
        interaction_id: String,
        message: String,
    },
}

impl PlanningReply {
    /// The user-facing message for this reply
    pub fn message(&self) -> &str {
        match self {
            Self::Completed { message, .. } | Self::Failed { message, .. } | Self::NeedsApproval { message, .. } => {
                message
            }
        }
    }
}

/// Execution statistics
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    pub plans_created: AtomicU64,
    pub plans_executed: AtomicU64,
    pub plans_succeeded: AtomicU64,
    pub plans_failed: AtomicU64,
    pub patterns_applied: AtomicU64,
    pub approvals_requested: AtomicU64,
}

impl OrchestratorStats {
    /// Fraction of executed plans that succeeded
    pub fn success_rate(&self) -> f64 {
        let executed = self.plans_executed.load(Ordering::Relaxed);
        if executed == 0 {
            return 0.0;
        }
        self.plans_succeeded.load(Ordering::Relaxed) as f64 / executed as f64
    }
}

/// A high-risk plan parked until its approval resolves
struct PendingApproval {
    plan: Plan,
    task_id: String,
    source_id: String,
    interaction_id: String,
    handle: Option<ResolutionHandle>,
}

/// Orchestrates the planning and execution workflow
pub struct PlanningOrchestrator {
    planner: GoalPlanner,
    decomposer: Arc<dyn Decomposer>,
    executor: Arc<dyn GoalExecutor>,
    gate: Arc<InteractionGate>,
    config: PlanningConfig,
    stats: OrchestratorStats,
    pending_approvals: Mutex<HashMap<String, PendingApproval>>,
}

impl PlanningOrchestrator {
    pub fn new(
        planner: GoalPlanner,
        decomposer: Arc<dyn Decomposer>,
        executor: Arc<dyn GoalExecutor>,
        gate: Arc<InteractionGate>,
        config: PlanningConfig,
    ) -> Self {
        Self {
            planner,
            decomposer,
            executor,
            gate,
            config,
            stats: OrchestratorStats::default(),
            pending_approvals: Mutex::new(HashMap::new()),
        }
    }

    /// Execution statistics
    pub fn stats(&self) -> &OrchestratorStats {
        &self.stats
    }

    // ==================== PLANNING DECISION ====================

    /// Heuristic gate: does this request need hierarchical planning?
    ///
    /// Recall-oriented: false negatives fall through to direct handling,
    /// false positives cost one extra decomposition call.
    pub fn should_plan(&self, intent: &str, text: &str) -> bool {
        let lower = text.to_lowercase();

        if PLANNING_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            debug!("Planning keyword detected");
            return true;
        }

        for indicator in RESEARCH_INDICATORS {
            if lower.contains(indicator) {
                // Requests about stored personal data route to lookup instead
                if !STORED_DATA_WORDS.iter().any(|w| lower.contains(w)) {
                    debug!(indicator, "Research indicator detected");
                    return true;
                }
            }
        }

        if lower.contains(" and ") && !TRIVIAL_INTENTS.contains(&intent) {
            debug!("Multi-step request detected");
            return true;
        }

        false
    }

    // ==================== PLAN CREATION ====================

    /// Handle a request through goal planning
    pub async fn handle_with_planning(&self, task: &Task, _intent: &str) -> Result<PlanningReply> {
        info!(task_id = %task.id, "Creating plan for: {}", task.content);
        self.stats.plans_created.fetch_add(1, Ordering::Relaxed);

        // Minimal skeleton just to compute the signature for matching
        let mut skeleton = Plan::new(&task.content, Goal::new(&task.content, GoalType::Linear));
        let matches = self
            .planner
            .find_similar_patterns(&mut skeleton, self.config.min_pattern_score);

        let (plan, plan_source) = match matches.first() {
            Some(m) => {
                info!(
                    pattern_id = %m.pattern.id,
                    score = m.score,
                    "Found matching pattern, skipping decomposition"
                );
                self.stats.patterns_applied.fetch_add(1, Ordering::Relaxed);

                let root = Goal::new(&task.content, GoalType::Linear);
                let mut plan = self.planner.create_plan(&task.content, root);
                if self.planner.apply_pattern(&mut plan, &m.pattern) {
                    let source = format!("using proven pattern (score: {:.0}%)", m.score * 100.0);
                    (plan, source)
                } else {
                    (self.build_plan_from_scratch(task).await, "new plan".to_string())
                }
            }
            None => (self.build_plan_from_scratch(task).await, "new plan".to_string()),
        };

        let estimate = self.estimate_cost(&plan);

        if estimate.high_risk {
            // "decline" rather than "cancel": the summary is classified
            // by keyword, and destructive verbs outrank approval phrasing
            let message = format!(
                "I can help with that ({}). The plan involves:\n{}\n\nEstimated: {}\nReply 'yes' to proceed or 'no' to decline.",
                plan_source,
                format_plan_summary(&plan),
                estimate.summary
            );

            let (interaction_id, handle) = self.gate.open(&plan.id, &task.source_id, &message).await;
            self.stats.approvals_requested.fetch_add(1, Ordering::Relaxed);

            let plan_id = plan.id.clone();
            self.pending_approvals.lock().await.insert(
                plan_id.clone(),
                PendingApproval {
                    plan,
                    task_id: task.id.clone(),
                    source_id: task.source_id.clone(),
                    interaction_id: interaction_id.clone(),
                    handle: Some(handle),
                },
            );

            return Ok(PlanningReply::NeedsApproval {
                plan_id,
                interaction_id,
                message,
            });
        }

        let plan_id = plan.id.clone();
        let (plan, success) = self.execute_plan(plan).await;

        Ok(if success {
            PlanningReply::Completed {
                plan_id,
                message: render_success(&plan),
            }
        } else {
            PlanningReply::Failed {
                plan_id,
                message: format!("Could not complete: {}", plan.description),
            }
        })
    }

    /// Build a plan by calling the decomposer, degrading to a single
    /// OneShot goal on failure or malformed output
    async fn build_plan_from_scratch(&self, task: &Task) -> Plan {
        match self.decomposer.decompose(&task.content, &self.config.capabilities).await {
            Ok(decomposition) => {
                if let Some(reasoning) = &decomposition.reasoning {
                    debug!(%reasoning, "Decomposition reasoning");
                }
                if !decomposition.missing_info.is_empty() {
                    info!(missing = ?decomposition.missing_info, "Decomposer reported missing info");
                }

                let root = Goal::new(&task.content, decomposition.goal_type)
                    .with_target_outcome("Task completed successfully");
                let root_id = root.id.clone();
                let mut plan = self.planner.create_plan(&task.content, root);

                for step in &decomposition.steps {
                    let mut child =
                        Goal::new(&step.description, step.step_type).with_prompt_template(&step.description);
                    if let Some(secs) = step.estimated_time_seconds {
                        child.estimate_cost(CostKind::Time, secs);
                    }
                    plan.add_child(&root_id, child);
                }

                if !decomposition.risks.is_empty()
                    && let Some(root) = plan.get_goal_mut(&root_id)
                {
                    root.cost_analysis.risks = decomposition.risks.clone();
                }

                plan
            }
            Err(e) => {
                warn!(error = %e, "Decomposition failed, degrading to single goal");
                let root = Goal::new(&task.content, GoalType::OneShot).with_prompt_template(&task.content);
                self.planner.create_plan(&task.content, root)
            }
        }
    }

    // ==================== COST ESTIMATION ====================

    /// Estimate plan cost; the two-factor OR policy is the sole approval
    /// trigger
    pub fn estimate_cost(&self, plan: &Plan) -> CostEstimate {
        let api_calls = plan
            .goals
            .values()
            .filter(|g| g.goal_type == GoalType::OneShot)
            .count();
        let tokens = api_calls * self.config.tokens_per_call;
        let high_risk = api_calls > self.config.max_steps || tokens > self.config.token_budget;

        CostEstimate {
            api_calls,
            tokens,
            steps: api_calls,
            high_risk,
            summary: format!("{} steps, ~{} API calls", api_calls, api_calls),
        }
    }

    // ==================== APPROVAL HANDOFF ====================

    /// The pending-approval plan id for a source, if any
    pub async fn pending_for_source(&self, source_id: &str) -> Option<String> {
        self.pending_approvals
            .lock()
            .await
            .values()
            .find(|p| p.source_id == source_id)
            .map(|p| p.plan.id.clone())
    }

    /// Route a host-layer answer to the pending approval's interaction
    pub async fn submit_approval_answer(&self, plan_id: &str, answer: Answer) -> bool {
        let interaction_id = self
            .pending_approvals
            .lock()
            .await
            .get(plan_id)
            .map(|p| p.interaction_id.clone());

        match interaction_id {
            Some(id) => self.gate.submit(&id, answer).await,
            None => false,
        }
    }

    /// Wait for an approval to resolve (explicit answer or timeout
    /// default), then execute or cancel the parked plan.
    ///
    /// Returns the source to notify and the resulting message, or None if
    /// the approval was already being awaited or is unknown.
    pub async fn await_approval(&self, plan_id: &str) -> Option<(String, String)> {
        let handle = self.pending_approvals.lock().await.get_mut(plan_id)?.handle.take()?;

        let resolution = handle.wait().await;
        if matches!(resolution, Resolution::TimedOut(_)) {
            warn!(%plan_id, "Approval timed out, applying default action");
        }
        let approved = resolution.is_affirmative();

        self.resolve_approval(plan_id, approved).await
    }

    /// Execute or discard a parked plan
    pub async fn resolve_approval(&self, plan_id: &str, approved: bool) -> Option<(String, String)> {
        let entry = self.pending_approvals.lock().await.remove(plan_id)?;
        let description = entry.plan.description.clone();
        debug!(%plan_id, task_id = %entry.task_id, approved, "Resolving approval");

        let message = if approved {
            let (plan, success) = self.execute_plan(entry.plan).await;
            if success {
                render_success(&plan)
            } else {
                format!("Could not complete: {}", plan.description)
            }
        } else {
            format!("Understood, cancelled: {}", description)
        };

        Some((entry.source_id, message))
    }

    // ==================== PLAN EXECUTION ====================

    /// Execute a plan from its root, evaluate it, persist it, and promote
    /// it into the pattern library if it earned it
    pub async fn execute_plan(&self, mut plan: Plan) -> (Plan, bool) {
        info!(plan_id = %plan.id, "Executing plan: {}", plan.description);
        self.stats.plans_executed.fetch_add(1, Ordering::Relaxed);

        plan.mark_started();
        let root_id = plan.root_goal_id.clone();
        let shared = Arc::new(Mutex::new(plan));

        let success = self.execute_goal_tree(Arc::clone(&shared), root_id).await;

        let mut plan = match Arc::try_unwrap(shared) {
            Ok(mutex) => mutex.into_inner(),
            // All tree futures have completed, but be defensive
            Err(arc) => arc.lock().await.clone(),
        };

        plan.mark_finished(success);
        if success {
            self.stats.plans_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.plans_failed.fetch_add(1, Ordering::Relaxed);
        }

        plan.aggregate_costs();
        let score = plan.evaluate_performance();
        info!(plan_id = %plan.id, success, score, "Plan finished");

        if let Err(e) = self.planner.save_plan(&plan) {
            warn!(plan_id = %plan.id, error = %e, "Failed to persist plan");
        }

        if success && score >= self.config.min_pattern_score {
            if let Err(e) = self.planner.save_as_pattern(&mut plan, Vec::new()) {
                warn!(plan_id = %plan.id, error = %e, "Failed to save pattern");
            }
        }

        (plan, success)
    }

    /// Recursively execute the goal tree
    ///
    /// Linear: children in order, short-circuit on failure. Branching:
    /// children in order, first success wins. Parallel: all children run
    /// concurrently, all are awaited, success iff every child succeeds.
    fn execute_goal_tree(&self, plan: Arc<Mutex<Plan>>, goal_id: String) -> BoxFuture<'_, bool> {
        async move {
            let (goal_type, children) = {
                let locked = plan.lock().await;
                match locked.get_goal(&goal_id) {
                    Some(goal) => (goal.goal_type, goal.children.clone()),
                    None => {
                        warn!(%goal_id, "Unknown goal id in tree walk");
                        return false;
                    }
                }
            };

            match goal_type {
                GoalType::Stop => true,
                GoalType::Abort => false,
                GoalType::OneShot => self.execute_leaf(&plan, &goal_id).await,
                GoalType::Linear => {
                    for child_id in children {
                        if !self.execute_goal_tree(Arc::clone(&plan), child_id).await {
                            return false;
                        }
                    }
                    true
                }
                GoalType::Branching => {
                    for child_id in children {
                        if self.execute_goal_tree(Arc::clone(&plan), child_id).await {
                            return true;
                        }
                    }
                    false
                }
                GoalType::Parallel => {
                    let futures: Vec<_> = children
                        .into_iter()
                        .map(|child_id| self.execute_goal_tree(Arc::clone(&plan), child_id))
                        .collect();
                    // All children run to completion; a failure does not
                    // cancel its siblings
                    join_all(futures).await.into_iter().all(|ok| ok)
                }
            }
        }
        .boxed()
    }

    /// Execute one OneShot goal through the executor
    async fn execute_leaf(&self, plan: &Arc<Mutex<Plan>>, goal_id: &str) -> bool {
        let (goal_snapshot, ctx) = {
            let mut locked = plan.lock().await;

            let original_request = locked.root_goal().map(|g| g.description.clone()).unwrap_or_default();
            let plan_description = locked.description.clone();
            let parent_goal = locked
                .get_goal(goal_id)
                .and_then(|g| g.parent_id.clone())
                .and_then(|pid| locked.get_goal(&pid))
                .map(|p| p.description.clone());

            let Some(goal) = locked.get_goal_mut(goal_id) else {
                warn!(%goal_id, "Unknown goal id at leaf execution");
                return false;
            };

            if !goal.is_ready() {
                goal.mark_finished(Outcome::failure("Prerequisites not met"));
                return false;
            }

            goal.mark_started();
            debug!(%goal_id, "Executing: {}", goal.description);

            (
                goal.clone(),
                PlanContext {
                    original_request,
                    plan_description,
                    parent_goal,
                },
            )
        };

        // The lock is released across the executor await
        let started = Instant::now();
        let outcome = self.executor.execute(&goal_snapshot, &ctx).await;
        let success = outcome.success;

        {
            let mut locked = plan.lock().await;
            if let Some(goal) = locked.get_goal_mut(goal_id) {
                goal.mark_finished(outcome);
                goal.record_cost(CostKind::Time, started.elapsed().as_secs_f64());
                goal.record_cost(CostKind::ApiCalls, 1.0);
            }
        }

        success
    }
}

/// Format a plan's direct children for the approval prompt
fn format_plan_summary(plan: &Plan) -> String {
    let Some(root) = plan.root_goal() else {
        return "  (No steps defined)".to_string();
    };

    let lines: Vec<String> = root
        .children
        .iter()
        .filter_map(|cid| plan.get_goal(cid))
        .enumerate()
        .map(|(i, child)| format!("  {}. {}", i + 1, child.description))
        .collect();

    if lines.is_empty() {
        format!("  1. {}", root.description)
    } else {
        lines.join("\n")
    }
}

/// Render a successful plan's per-step results for the caller
fn render_success(plan: &Plan) -> String {
    let mut lines = vec![format!("Completed: {}", plan.description)];

    if let Some(score) = plan.evaluation_score {
        lines.push(format!("Evaluation score: {:.0}%", score * 100.0));
    }

    let Some(root) = plan.root_goal() else {
        return lines.join("\n");
    };

    let steps: Vec<(usize, &Goal)> = root
        .children
        .iter()
        .filter_map(|cid| plan.get_goal(cid))
        .filter(|g| g.actual_outcome.is_some())
        .enumerate()
        .collect();

    if !steps.is_empty() {
        lines.push(String::new());
        lines.push("Here's what I found:".to_string());
        lines.push(String::new());

        for (i, child) in steps {
            lines.push(format!("{}. {}", i + 1, child.description));
            if let Some(data) = child.actual_outcome.as_ref().and_then(|o| o.result_data.as_ref()) {
                let body = render_result_value(data.get("result").unwrap_or(&serde_json::Value::Null));
                if !body.is_empty() {
                    lines.push(body);
                } else if let Some(action) = data.get("action").and_then(|a| a.as_str())
                    && !action.is_empty()
                {
                    lines.push(format!("   {}", action));
                }
            }
            lines.push(String::new());
        }
    }

    lines.join("\n").trim_end().to_string()
}

/// Render a result value (string, object, or list) indented for display
fn render_result_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => format!("   {}", s),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(key, val)| match val {
                serde_json::Value::Array(items) => {
                    let rendered: Vec<String> = items.iter().map(|v| format!("     - {}", flatten(v))).collect();
                    format!("   {}:\n{}", display_key(key), rendered.join("\n"))
                }
                other => format!("   {}: {}", display_key(key), flatten(other)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| format!("   - {}", flatten(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Convert snake_case keys to Title Case for display
fn display_key(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn flatten(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::ExecutionMode;
    use crate::planning::decomposer::{DecomposedStep, Decomposition};
    use crate::planning::library::FilePatternLibrary;
    use async_trait::async_trait;
    use planstore::Store;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Executor that records invocation order and fails on demand
    struct MockExecutor {
        invoked: StdMutex<Vec<String>>,
        fail_on: Vec<String>,
    }

    impl MockExecutor {
        fn new(fail_on: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                invoked: StdMutex::new(Vec::new()),
                fail_on: fail_on.iter().map(|s| s.to_string()).collect(),
            })
        }

        fn invocations(&self) -> Vec<String> {
            self.invoked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GoalExecutor for MockExecutor {
        async fn execute(&self, goal: &Goal, _ctx: &PlanContext) -> Outcome {
            self.invoked.lock().unwrap().push(goal.description.clone());
            if self.fail_on.contains(&goal.description) {
                Outcome::failure("mock failure")
            } else {
                Outcome::success(serde_json::json!({"result": format!("did {}", goal.description)}), 0.9)
            }
        }
    }

    /// Decomposer returning a fixed decomposition, or an error
    struct MockDecomposer {
        steps: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl Decomposer for MockDecomposer {
        async fn decompose(&self, _request: &str, _capabilities: &str) -> Result<Decomposition> {
            if self.fail {
                eyre::bail!("decomposer unavailable");
            }
            Ok(Decomposition {
                goal_type: GoalType::Linear,
                steps: self
                    .steps
                    .iter()
                    .map(|s| DecomposedStep {
                        description: s.clone(),
                        step_type: GoalType::OneShot,
                        estimated_time_seconds: Some(10.0),
                    })
                    .collect(),
                risks: Vec::new(),
                missing_info: Vec::new(),
                reasoning: None,
            })
        }
    }

    struct Harness {
        orchestrator: PlanningOrchestrator,
        executor: Arc<MockExecutor>,
        _dir: TempDir,
    }

    fn harness(steps: &[&str], fail_on: &[&str], decomposer_fails: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let library = Arc::new(FilePatternLibrary::open(store.clone()).unwrap());
        let planner = GoalPlanner::new(library, store);
        let executor = MockExecutor::new(fail_on);
        let decomposer = Arc::new(MockDecomposer {
            steps: steps.iter().map(|s| s.to_string()).collect(),
            fail: decomposer_fails,
        });
        let gate = Arc::new(InteractionGate::new(ExecutionMode::Interactive));

        Harness {
            orchestrator: PlanningOrchestrator::new(
                planner,
                decomposer,
                Arc::clone(&executor) as Arc<dyn GoalExecutor>,
                gate,
                PlanningConfig::default(),
            ),
            executor,
            _dir: dir,
        }
    }

    fn plan_with_root(root_type: GoalType, children: &[&str]) -> Plan {
        let root = Goal::new("root", root_type);
        let root_id = root.id.clone();
        let mut plan = Plan::new("test plan", root);
        for desc in children {
            plan.add_child(&root_id, Goal::new(*desc, GoalType::OneShot));
        }
        plan
    }

    #[tokio::test]
    async fn test_linear_short_circuit() {
        let h = harness(&[], &["B"], false);
        let plan = plan_with_root(GoalType::Linear, &["A", "B", "C"]);

        let (_, success) = h.orchestrator.execute_plan(plan).await;

        assert!(!success);
        // C is never invoked after B fails
        assert_eq!(h.executor.invocations(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_branching_first_success_wins() {
        let h = harness(&[], &["A"], false);
        let plan = plan_with_root(GoalType::Branching, &["A", "B", "C"]);

        let (_, success) = h.orchestrator.execute_plan(plan).await;

        assert!(success);
        // C is never invoked after B succeeds
        assert_eq!(h.executor.invocations(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_branching_all_fail() {
        let h = harness(&[], &["A", "B"], false);
        let plan = plan_with_root(GoalType::Branching, &["A", "B"]);

        let (_, success) = h.orchestrator.execute_plan(plan).await;
        assert!(!success);
        assert_eq!(h.executor.invocations(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_parallel_all_required() {
        let h = harness(&[], &["B"], false);
        let plan = plan_with_root(GoalType::Parallel, &["A", "B"]);

        let (_, success) = h.orchestrator.execute_plan(plan).await;

        assert!(!success);
        // Both children run; the failure does not cancel its sibling
        let mut invoked = h.executor.invocations();
        invoked.sort();
        assert_eq!(invoked, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_parallel_all_succeed() {
        let h = harness(&[], &[], false);
        let plan = plan_with_root(GoalType::Parallel, &["A", "B", "C"]);

        let (_, success) = h.orchestrator.execute_plan(plan).await;
        assert!(success);
        assert_eq!(h.executor.invocations().len(), 3);
    }

    #[tokio::test]
    async fn test_stop_and_abort_terminals() {
        let h = harness(&[], &[], false);

        let stop_plan = Plan::new("stops", Goal::new("stop here", GoalType::Stop));
        let (_, success) = h.orchestrator.execute_plan(stop_plan).await;
        assert!(success);

        let abort_plan = Plan::new("aborts", Goal::new("abort here", GoalType::Abort));
        let (_, success) = h.orchestrator.execute_plan(abort_plan).await;
        assert!(!success);

        // Terminal nodes have no side effects
        assert!(h.executor.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_goal_id_is_local_failure() {
        let h = harness(&[], &[], false);
        let mut plan = plan_with_root(GoalType::Linear, &["A"]);
        plan.root_goal_id = "missing".to_string();

        let (_, success) = h.orchestrator.execute_plan(plan).await;
        assert!(!success);
    }

    #[tokio::test]
    async fn test_risk_gate_six_oneshot_children() {
        let h = harness(&[], &[], false);
        let plan = plan_with_root(GoalType::Linear, &["a", "b", "c", "d", "e", "f"]);

        let estimate = h.orchestrator.estimate_cost(&plan);
        assert_eq!(estimate.api_calls, 6);
        assert!(estimate.high_risk);
    }

    #[tokio::test]
    async fn test_risk_gate_three_oneshot_children() {
        let h = harness(&[], &[], false);
        let plan = plan_with_root(GoalType::Linear, &["a", "b", "c"]);

        let estimate = h.orchestrator.estimate_cost(&plan);
        assert_eq!(estimate.api_calls, 3);
        assert!(!estimate.high_risk);
        assert_eq!(estimate.summary, "3 steps, ~3 API calls");
    }

    #[tokio::test]
    async fn test_handle_with_planning_executes_low_risk() {
        let h = harness(&["research options", "compare prices"], &[], false);
        let task = Task::new("find the best laptop", "user-1", crate::domain::Priority::User);

        let reply = h.orchestrator.handle_with_planning(&task, "request").await.unwrap();

        match reply {
            PlanningReply::Completed { message, .. } => {
                assert!(message.contains("Completed: find the best laptop"));
                assert!(message.contains("research options"));
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
        assert_eq!(h.executor.invocations().len(), 2);
    }

    #[tokio::test]
    async fn test_handle_with_planning_high_risk_awaits_approval() {
        let h = harness(&["s1", "s2", "s3", "s4", "s5", "s6"], &[], false);
        let task = Task::new("do many things", "user-1", crate::domain::Priority::User);

        let reply = h.orchestrator.handle_with_planning(&task, "request").await.unwrap();

        match &reply {
            PlanningReply::NeedsApproval { plan_id, message, .. } => {
                assert!(message.contains("6 steps"));
                assert!(message.contains("Reply 'yes' to proceed"));
                assert_eq!(
                    h.orchestrator.pending_for_source("user-1").await.as_deref(),
                    Some(plan_id.as_str())
                );
            }
            other => panic!("Expected NeedsApproval, got {:?}", other),
        }

        // Nothing executed yet
        assert!(h.executor.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_approval_yes_executes_plan() {
        let h = harness(&["s1", "s2", "s3", "s4", "s5", "s6"], &[], false);
        let task = Task::new("do many things", "user-1", crate::domain::Priority::User);

        let reply = h.orchestrator.handle_with_planning(&task, "request").await.unwrap();
        let PlanningReply::NeedsApproval { plan_id, .. } = reply else {
            panic!("Expected NeedsApproval");
        };

        assert!(h.orchestrator.submit_approval_answer(&plan_id, Answer::yes()).await);
        let (source, message) = h.orchestrator.await_approval(&plan_id).await.unwrap();

        assert_eq!(source, "user-1");
        assert!(message.contains("Completed"));
        assert_eq!(h.executor.invocations().len(), 6);
        assert!(h.orchestrator.pending_for_source("user-1").await.is_none());
    }

    #[tokio::test]
    async fn test_approval_no_cancels_plan() {
        let h = harness(&["s1", "s2", "s3", "s4", "s5", "s6"], &[], false);
        let task = Task::new("do many things", "user-1", crate::domain::Priority::User);

        let reply = h.orchestrator.handle_with_planning(&task, "request").await.unwrap();
        let PlanningReply::NeedsApproval { plan_id, .. } = reply else {
            panic!("Expected NeedsApproval");
        };

        assert!(h.orchestrator.submit_approval_answer(&plan_id, Answer::no()).await);
        let (_, message) = h.orchestrator.await_approval(&plan_id).await.unwrap();

        assert!(message.contains("cancelled"));
        assert!(h.executor.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_decomposer_failure_degrades_to_single_goal() {
        let h = harness(&[], &[], true);
        let task = Task::new("help me do the thing", "user-1", crate::domain::Priority::User);

        let reply = h.orchestrator.handle_with_planning(&task, "request").await.unwrap();

        // The request still completes through a single OneShot goal
        assert!(matches!(reply, PlanningReply::Completed { .. }));
        assert_eq!(h.executor.invocations(), vec!["help me do the thing"]);
    }

    #[tokio::test]
    async fn test_successful_plan_promoted_to_pattern() {
        let h = harness(&["step one", "step two"], &[], false);
        let task = Task::new("organize the meeting", "user-1", crate::domain::Priority::User);

        let reply = h.orchestrator.handle_with_planning(&task, "request").await.unwrap();
        assert!(matches!(reply, PlanningReply::Completed { .. }));

        // Executed, scored >= 0.70, promoted
        assert_eq!(h.orchestrator.planner.library().len(), 1);
    }

    #[tokio::test]
    async fn test_pattern_reuse_skips_decomposer() {
        // Decomposer configured to fail: only the reuse path can build
        // a working plan
        let h = harness(&[], &[], true);

        // Store a pattern whose shape matches the request skeleton
        let mut pattern = Plan::new("proven approach", Goal::new("proven approach", GoalType::Linear));
        pattern.compute_signature();
        pattern.success = true;
        pattern.evaluation_score = Some(0.9);
        h.orchestrator.planner.library().save(&pattern).unwrap();

        let task = Task::new("a fresh request", "user-1", crate::domain::Priority::User);
        let reply = h.orchestrator.handle_with_planning(&task, "request").await.unwrap();

        assert!(matches!(reply, PlanningReply::Completed { .. }));
        assert_eq!(h.orchestrator.stats().patterns_applied.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_should_plan_keywords() {
        let h = harness(&[], &[], false);
        let o = &h.orchestrator;

        assert!(o.should_plan("request", "Help me organize a dinner party"));
        assert!(o.should_plan("request", "How do I fix my sleep schedule"));
        assert!(o.should_plan("request", "find the best espresso machine"));
        assert!(o.should_plan("request", "Book a flight and reserve a hotel"));

        // Stored personal data routes to lookup, not research
        assert!(!o.should_plan("request", "what's the best contact for this?"));

        // Conversational "and" is not multi-step
        assert!(!o.should_plan("conversation", "I like tea and biscuits"));

        assert!(!o.should_plan("request", "hello there"));
    }

    #[test]
    fn test_render_success_formats_steps() {
        let mut plan = plan_with_root(GoalType::Linear, &["look things up"]);
        let child_id = plan.root_goal().unwrap().children[0].clone();
        plan.get_goal_mut(&child_id).unwrap().mark_finished(Outcome::success(
            serde_json::json!({"result": {"top_pick": "model X", "runners_up": ["Y", "Z"]}}),
            0.9,
        ));
        plan.mark_started();
        plan.mark_finished(true);
        plan.evaluate_performance();

        let rendered = render_success(&plan);
        assert!(rendered.contains("1. look things up"));
        assert!(rendered.contains("Top Pick: model X"));
        assert!(rendered.contains("- Y"));
    }
}
