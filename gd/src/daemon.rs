//! Daemon wiring
//!
//! Builds the store, pattern library, planner, interaction gate,
//! orchestrator, and scheduler, and implements the task processing
//! pipeline that routes each dequeued task to planning, direct
//! execution, or approval resolution.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use tracing::{debug, info};

use planstore::Store;

use crate::config::Config;
use crate::domain::{Goal, GoalType, Outcome, Priority, Task};
use crate::interaction::{Answer, ExecutionMode, InteractionGate};
use crate::llm;
use crate::planning::{
    FilePatternLibrary, GoalExecutor, GoalPlanner, LlmDecomposer, LlmExecutor, PlanContext, PlanningConfig,
    PlanningOrchestrator, PlanningReply,
};
use crate::prompts::PromptLoader;
use crate::scheduler::{LlmSelfTaskGenerator, Scheduler, SelfTaskGenerator, TaskHandler, TaskQueue};

/// Where responses go; chat transports implement this at the boundary
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn deliver(&self, source_id: &str, message: &str);
}

/// Default sink: responses go to the log
pub struct LogSink;

#[async_trait]
impl ResponseSink for LogSink {
    async fn deliver(&self, source_id: &str, message: &str) {
        info!(source = %source_id, "{}", message);
    }
}

/// Stand-in for the external intent classifier
fn infer_intent(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    const CONVERSATIONAL: &[&str] = &["hello", "hi ", "hey", "thanks", "thank you", "good morning", "good night"];
    if CONVERSATIONAL.iter().any(|g| lower.starts_with(g)) {
        "conversation"
    } else {
        "request"
    }
}

/// Render a direct (non-planned) execution outcome for the caller
fn direct_reply(outcome: &Outcome) -> String {
    if !outcome.success {
        return format!(
            "Sorry, I couldn't do that: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    outcome
        .result_data
        .as_ref()
        .and_then(|data| {
            data.get("response")
                .or_else(|| data.get("result"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "Done.".to_string())
}

/// Routes each dequeued task: approval replies first, then the
/// plan-or-direct decision
struct Processor {
    orchestrator: Arc<PlanningOrchestrator>,
    executor: Arc<dyn GoalExecutor>,
    sink: Arc<dyn ResponseSink>,
}

#[async_trait]
impl TaskHandler for Processor {
    async fn process(&self, task: &mut Task) -> Result<Option<String>> {
        let text = task.content.trim().to_string();

        // A yes/no from a source with a parked plan resolves that approval
        if let Some(plan_id) = self.orchestrator.pending_for_source(&task.source_id).await {
            let answer = Answer::from_text(&text);
            if answer.action == "yes" || answer.action == "no" {
                let accepted = self.orchestrator.submit_approval_answer(&plan_id, answer.clone()).await;
                let reply = if !accepted {
                    "That approval was already resolved.".to_string()
                } else if answer.is_affirmative() {
                    "Understood, executing the plan.".to_string()
                } else {
                    "Understood.".to_string()
                };
                self.sink.deliver(&task.source_id, &reply).await;
                return Ok(Some(reply));
            }
        }

        let intent = infer_intent(&text);

        if self.orchestrator.should_plan(intent, &text) {
            let reply = self.orchestrator.handle_with_planning(task, intent).await?;

            if let PlanningReply::NeedsApproval { plan_id, .. } = &reply {
                // Watch for the resolution (explicit or timeout default)
                // and deliver the eventual result
                let orchestrator = Arc::clone(&self.orchestrator);
                let sink = Arc::clone(&self.sink);
                let plan_id = plan_id.clone();
                tokio::spawn(async move {
                    if let Some((source_id, message)) = orchestrator.await_approval(&plan_id).await {
                        sink.deliver(&source_id, &message).await;
                    }
                });
            }

            let message = reply.message().to_string();
            self.sink.deliver(&task.source_id, &message).await;
            return Ok(Some(message));
        }

        // Direct single-step handling
        debug!(task_id = %task.id, "Handling directly");
        let goal = Goal::new(&text, GoalType::OneShot);
        let ctx = PlanContext {
            original_request: text.clone(),
            plan_description: text,
            parent_goal: None,
        };
        let outcome = self.executor.execute(&goal, &ctx).await;
        let message = direct_reply(&outcome);
        self.sink.deliver(&task.source_id, &message).await;
        Ok(Some(message))
    }
}

/// The assembled daemon
pub struct Daemon {
    scheduler: Arc<Scheduler>,
    orchestrator: Arc<PlanningOrchestrator>,
    gate: Arc<InteractionGate>,
}

impl Daemon {
    /// Build a daemon from configuration (LLM-backed adapters)
    pub fn new(config: Config) -> Result<Self> {
        let store = Store::open(&config.storage.data_dir).context("Failed to open data directory")?;

        let llm_client = llm::create_client(&config.llm).map_err(|e| eyre::eyre!("{}", e))?;
        let prompts_dir = dirs::config_dir()
            .map(|d| d.join("goaldaemon").join("prompts"))
            .unwrap_or_default();
        let prompts = Arc::new(PromptLoader::new(prompts_dir));

        let planning_config = PlanningConfig {
            max_steps: config.planning.max_steps,
            tokens_per_call: config.planning.tokens_per_call,
            token_budget: config.planning.token_budget,
            min_pattern_score: config.planning.min_pattern_score,
            ..Default::default()
        };

        let decomposer = Arc::new(LlmDecomposer::new(Arc::clone(&llm_client), Arc::clone(&prompts)));
        let executor: Arc<dyn GoalExecutor> = Arc::new(LlmExecutor::new(
            Arc::clone(&llm_client),
            Arc::clone(&prompts),
            planning_config.capabilities.clone(),
        ));
        let self_tasks: Arc<dyn SelfTaskGenerator> =
            Arc::new(LlmSelfTaskGenerator::new(Arc::clone(&llm_client), Arc::clone(&prompts)));

        let default_mode: ExecutionMode = config.interaction.default_mode.parse().unwrap_or_default();
        let gate = Arc::new(InteractionGate::new(default_mode));

        let library = Arc::new(FilePatternLibrary::open(store.clone())?);
        let planner = GoalPlanner::new(library, store.clone());

        let orchestrator = Arc::new(PlanningOrchestrator::new(
            planner,
            decomposer,
            Arc::clone(&executor),
            Arc::clone(&gate),
            planning_config,
        ));

        let sink: Arc<dyn ResponseSink> = Arc::new(LogSink);

        Ok(Self::with_components(
            store,
            orchestrator,
            executor,
            self_tasks,
            sink,
            gate,
            config.scheduler,
        ))
    }

    /// Assemble a daemon from pre-built components (tests, embedding)
    pub fn with_components(
        store: Store,
        orchestrator: Arc<PlanningOrchestrator>,
        executor: Arc<dyn GoalExecutor>,
        self_tasks: Arc<dyn SelfTaskGenerator>,
        sink: Arc<dyn ResponseSink>,
        gate: Arc<InteractionGate>,
        scheduler_config: crate::scheduler::SchedulerConfig,
    ) -> Self {
        let processor = Arc::new(Processor {
            orchestrator: Arc::clone(&orchestrator),
            executor,
            sink,
        });

        let scheduler = Arc::new(Scheduler::new(processor, self_tasks, store, scheduler_config));

        Self {
            scheduler,
            orchestrator,
            gate,
        }
    }

    /// The task queue, for ingestion from transports
    pub fn queue(&self) -> Arc<TaskQueue> {
        self.scheduler.queue()
    }

    /// The orchestrator, for one-shot embedding (CLI `plan`)
    pub fn orchestrator(&self) -> &Arc<PlanningOrchestrator> {
        &self.orchestrator
    }

    /// Enqueue a request
    pub async fn submit(&self, content: impl Into<String>, source_id: impl Into<String>, priority: Priority) {
        self.queue().enqueue(Task::new(content, source_id, priority)).await;
    }

    /// Run the scheduler loop until a shutdown request
    ///
    /// Signal handling is up to the caller; [`Daemon::run`] wires Ctrl-C.
    pub async fn run_until_shutdown(&self) {
        self.scheduler.run().await;
    }

    /// Run until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        info!("GoalDaemon online");

        let scheduler = Arc::clone(&self.scheduler);
        let run = tokio::spawn(async move { scheduler.run().await });

        tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
        self.shutdown().await;

        run.await.context("Scheduler task panicked")?;
        info!("GoalDaemon stopped");
        Ok(())
    }

    /// Cancel pending interactions and stop the scheduler loop
    pub async fn shutdown(&self) {
        self.gate.cancel_all().await;
        self.scheduler.request_shutdown();
    }
}
