//! Scheduler loop
//!
//! A single logical consumer drains the queue: one task in flight at a
//! time, which serializes plan creation and execution globally. Waiting
//! on an empty queue is bounded by the idle timeout; on expiry the
//! scheduler synthesizes one background task from the self-task
//! generator. The full queue and per-source contexts are persisted every
//! N processed tasks and on shutdown so a restart resumes with the same
//! backlog.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use planstore::{Store, now_ms};

use crate::domain::{Priority, Task};

use super::queue::TaskQueue;
use super::selftask::{FALLBACK_SELF_TASK, SelfTaskGenerator};

/// Source id used for self-generated tasks
pub const SELF_SOURCE: &str = "self";

/// Store key for the queue snapshot
const QUEUE_LIST: &str = "queue";

/// Store collection for per-source contexts
const CONTEXTS: &str = "contexts";

/// Cap on recent thoughts kept for the self-task generator
const RECENT_THOUGHTS_LIMIT: usize = 10;

/// Scheduler tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds to wait on an empty queue before self-generating work
    #[serde(rename = "idle-delay-secs")]
    pub idle_delay_secs: u64,

    /// Persist state every N processed tasks
    #[serde(rename = "persist-interval")]
    pub persist_interval: u64,

    /// Per-source history entries to retain
    #[serde(rename = "history-limit")]
    pub history_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_delay_secs: 5,
            persist_interval: 100,
            history_limit: 50,
        }
    }
}

/// Processes one task at a time; errors are isolated per task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Process a task, optionally producing a response for its source
    async fn process(&self, task: &mut Task) -> eyre::Result<Option<String>>;
}

/// One input/response exchange kept in a source's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub input: String,
    pub response: Option<String>,
    pub timestamp: i64,
}

/// Long-lived per-source context, persisted across restarts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceContext {
    pub source_id: String,

    #[serde(default)]
    pub history: Vec<ExchangeRecord>,

    #[serde(default)]
    pub recent_thoughts: Vec<String>,

    #[serde(default)]
    pub last_self_task: Option<String>,
}

impl planstore::Record for SourceContext {
    fn id(&self) -> &str {
        &self.source_id
    }

    fn updated_at(&self) -> i64 {
        self.history.last().map(|e| e.timestamp).unwrap_or(0)
    }

    fn collection_name() -> &'static str {
        CONTEXTS
    }
}

/// The scheduler: queue, consumer loop, idle behavior, persistence
pub struct Scheduler {
    queue: Arc<TaskQueue>,
    handler: Arc<dyn TaskHandler>,
    self_tasks: Arc<dyn SelfTaskGenerator>,
    store: Store,
    config: SchedulerConfig,
    contexts: Mutex<HashMap<String, SourceContext>>,
    shutdown: AtomicBool,
}

impl Scheduler {
    pub fn new(
        handler: Arc<dyn TaskHandler>,
        self_tasks: Arc<dyn SelfTaskGenerator>,
        store: Store,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            queue: Arc::new(TaskQueue::new()),
            handler,
            self_tasks,
            store,
            config,
            contexts: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// The queue, for external task ingestion
    pub fn queue(&self) -> Arc<TaskQueue> {
        Arc::clone(&self.queue)
    }

    /// Ask the loop to stop after the current task
    pub fn request_shutdown(&self) {
        info!("Shutdown requested");
        self.shutdown.store(true, Ordering::SeqCst);
        self.queue.wake();
    }

    /// Run the consumer loop until shutdown
    pub async fn run(&self) {
        self.restore_state().await;

        let mut processed: u64 = 0;

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.queue.dequeue().await {
                Some(mut task) => {
                    task.record_attempt();
                    debug!(task_id = %task.id, attempts = task.attempts, "Processing: {}", task.content);

                    match self.handler.process(&mut task).await {
                        Ok(response) => {
                            self.record_exchange(&task, response).await;
                        }
                        Err(e) => {
                            // A failing task is not fatal to the scheduler
                            error!(task_id = %task.id, error = %e, "Task processing failed");
                        }
                    }

                    processed += 1;
                    if processed % self.config.persist_interval == 0 {
                        self.persist_state().await;
                    }
                }
                None => {
                    let wake = self.queue.wake_signal().notified();
                    let idle = Duration::from_secs(self.config.idle_delay_secs);
                    debug!(idle_secs = self.config.idle_delay_secs, "Queue empty, waiting");

                    match tokio::time::timeout(idle, wake).await {
                        Ok(_) => continue,
                        Err(_) => self.generate_self_task().await,
                    }
                }
            }
        }

        self.persist_state().await;
        info!(processed, "Scheduler stopped");
    }

    /// Record a processed exchange in the source's history
    async fn record_exchange(&self, task: &Task, response: Option<String>) {
        let mut contexts = self.contexts.lock().await;
        let context = contexts
            .entry(task.source_id.clone())
            .or_insert_with(|| SourceContext {
                source_id: task.source_id.clone(),
                ..Default::default()
            });

        context.history.push(ExchangeRecord {
            input: task.content.clone(),
            response,
            timestamp: now_ms(),
        });

        let limit = self.config.history_limit;
        if context.history.len() > limit {
            let excess = context.history.len() - limit;
            context.history.drain(..excess);
        }
    }

    /// Synthesize one background task after an idle timeout
    async fn generate_self_task(&self) {
        let (recent, last) = {
            let contexts = self.contexts.lock().await;
            match contexts.get(SELF_SOURCE) {
                Some(ctx) => {
                    let recent: Vec<String> = ctx.recent_thoughts.iter().rev().take(3).rev().cloned().collect();
                    (recent, ctx.last_self_task.clone())
                }
                None => (Vec::new(), None),
            }
        };

        let thought = match self.self_tasks.generate(&recent, last.as_deref()).await {
            Ok(thought) => thought,
            Err(e) => {
                warn!(error = %e, "Self-task generation failed, using fallback");
                FALLBACK_SELF_TASK.to_string()
            }
        };

        info!("Self-task: {}", thought);

        {
            let mut contexts = self.contexts.lock().await;
            let context = contexts.entry(SELF_SOURCE.to_string()).or_insert_with(|| SourceContext {
                source_id: SELF_SOURCE.to_string(),
                ..Default::default()
            });
            context.recent_thoughts.push(thought.clone());
            if context.recent_thoughts.len() > RECENT_THOUGHTS_LIMIT {
                let excess = context.recent_thoughts.len() - RECENT_THOUGHTS_LIMIT;
                context.recent_thoughts.drain(..excess);
            }
            context.last_self_task = Some(thought.clone());
        }

        self.queue
            .enqueue(
                Task::new(thought, SELF_SOURCE, Priority::Background)
                    .with_context(serde_json::json!({"kind": "self_reflection"})),
            )
            .await;
    }

    /// Persist the queue snapshot and per-source contexts
    ///
    /// Storage errors are logged and skipped; persistence must never
    /// abort the loop.
    async fn persist_state(&self) {
        let snapshot = self.queue.snapshot().await;
        if let Err(e) = self.store.save_list(QUEUE_LIST, &snapshot) {
            warn!(error = %e, "Failed to persist queue");
        }

        let contexts = self.contexts.lock().await;
        for context in contexts.values() {
            if let Err(e) = self.store.put(context) {
                warn!(source = %context.source_id, error = %e, "Failed to persist context");
            }
        }

        debug!(queued = snapshot.len(), sources = contexts.len(), "State persisted");
    }

    /// Reload the queue and contexts from a previous run
    async fn restore_state(&self) {
        match self.store.load_list::<Task>(QUEUE_LIST) {
            Ok(tasks) if !tasks.is_empty() => {
                info!(count = tasks.len(), "Restored queued tasks");
                self.queue.restore(tasks).await;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to restore queue"),
        }

        match self.store.list::<SourceContext>() {
            Ok(loaded) => {
                let mut contexts = self.contexts.lock().await;
                for context in loaded {
                    contexts.insert(context.source_id.clone(), context);
                }
            }
            Err(e) => warn!(error = %e, "Failed to restore contexts"),
        }
    }

    /// Recent history for a source (most recent last)
    pub async fn source_history(&self, source_id: &str) -> Vec<ExchangeRecord> {
        self.contexts
            .lock()
            .await
            .get(source_id)
            .map(|c| c.history.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Handler that records what it processed and can fail on demand
    struct RecordingHandler {
        processed: StdMutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl RecordingHandler {
        fn new(fail_on: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                processed: StdMutex::new(Vec::new()),
                fail_on: fail_on.map(|s| s.to_string()),
            })
        }
    }

    #[async_trait]
    impl TaskHandler for RecordingHandler {
        async fn process(&self, task: &mut Task) -> eyre::Result<Option<String>> {
            self.processed.lock().unwrap().push(task.content.clone());
            if self.fail_on.as_deref() == Some(task.content.as_str()) {
                eyre::bail!("handler exploded");
            }
            Ok(Some(format!("done: {}", task.content)))
        }
    }

    struct FixedGenerator(String);

    #[async_trait]
    impl SelfTaskGenerator for FixedGenerator {
        async fn generate(&self, _recent: &[String], _last: Option<&str>) -> eyre::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl SelfTaskGenerator for FailingGenerator {
        async fn generate(&self, _recent: &[String], _last: Option<&str>) -> eyre::Result<String> {
            eyre::bail!("generator down")
        }
    }

    fn scheduler(dir: &TempDir, handler: Arc<dyn TaskHandler>, generator: Arc<dyn SelfTaskGenerator>) -> Scheduler {
        Scheduler::new(
            handler,
            generator,
            Store::open(dir.path()).unwrap(),
            SchedulerConfig {
                idle_delay_secs: 1,
                persist_interval: 2,
                history_limit: 3,
            },
        )
    }

    #[tokio::test]
    async fn test_processes_queued_tasks_in_priority_order() {
        let dir = TempDir::new().unwrap();
        let handler = RecordingHandler::new(None);
        let sched = scheduler(&dir, handler.clone(), Arc::new(FixedGenerator("noop".to_string())));

        let queue = sched.queue();
        queue.enqueue(Task::new("low", "t", Priority::Background)).await;
        queue.enqueue(Task::new("high", "t", Priority::User)).await;

        // Run the loop until both tasks are processed, then stop it
        let sched = Arc::new(sched);
        let run = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.run().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        sched.request_shutdown();
        run.await.unwrap();

        let processed = handler.processed.lock().unwrap().clone();
        assert_eq!(processed, vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_loop() {
        let dir = TempDir::new().unwrap();
        let handler = RecordingHandler::new(Some("boom"));
        let sched = scheduler(&dir, handler.clone(), Arc::new(FixedGenerator("noop".to_string())));

        let queue = sched.queue();
        queue.enqueue(Task::new("boom", "t", Priority::User)).await;
        queue.enqueue(Task::new("after", "t", Priority::User)).await;

        let sched = Arc::new(sched);
        let run = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.run().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        sched.request_shutdown();
        run.await.unwrap();

        let processed = handler.processed.lock().unwrap().clone();
        assert_eq!(processed, vec!["boom", "after"]);
    }

    #[tokio::test]
    async fn test_idle_timeout_generates_self_task() {
        let dir = TempDir::new().unwrap();
        let handler = RecordingHandler::new(None);
        let sched = scheduler(
            &dir,
            handler.clone(),
            Arc::new(FixedGenerator("reflect on the day".to_string())),
        );

        let sched = Arc::new(sched);
        let run = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.run().await })
        };

        // Idle delay is 1s; wait past it so a self-task is generated
        tokio::time::sleep(Duration::from_millis(1400)).await;
        sched.request_shutdown();
        run.await.unwrap();

        let processed = handler.processed.lock().unwrap().clone();
        assert!(processed.contains(&"reflect on the day".to_string()));
    }

    #[tokio::test]
    async fn test_generator_failure_uses_fallback() {
        let dir = TempDir::new().unwrap();
        let handler = RecordingHandler::new(None);
        let sched = scheduler(&dir, handler.clone(), Arc::new(FailingGenerator));

        let sched = Arc::new(sched);
        let run = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.run().await })
        };

        tokio::time::sleep(Duration::from_millis(1400)).await;
        sched.request_shutdown();
        run.await.unwrap();

        let processed = handler.processed.lock().unwrap().clone();
        assert!(processed.contains(&FALLBACK_SELF_TASK.to_string()));
    }

    #[tokio::test]
    async fn test_state_persists_across_restarts() {
        let dir = TempDir::new().unwrap();
        let handler = RecordingHandler::new(None);

        {
            let sched = scheduler(&dir, handler.clone(), Arc::new(FixedGenerator("noop".to_string())));
            let queue = sched.queue();
            queue.enqueue(Task::new("unprocessed", "t", Priority::User)).await;

            // Shut down before processing anything
            sched.request_shutdown();
            sched.run().await;
        }

        // A new scheduler over the same store resumes with the backlog
        let handler2 = RecordingHandler::new(None);
        let sched = scheduler(&dir, handler2.clone(), Arc::new(FixedGenerator("noop".to_string())));

        let sched = Arc::new(sched);
        let run = {
            let sched = Arc::clone(&sched);
            tokio::spawn(async move { sched.run().await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        sched.request_shutdown();
        run.await.unwrap();

        let processed = handler2.processed.lock().unwrap().clone();
        assert_eq!(processed, vec!["unprocessed"]);
    }

    #[tokio::test]
    async fn test_history_capped_per_source() {
        let dir = TempDir::new().unwrap();
        let handler = RecordingHandler::new(None);
        let sched = scheduler(&dir, handler, Arc::new(FixedGenerator("noop".to_string())));

        for i in 0..6 {
            let task = Task::new(format!("msg-{}", i), "chat", Priority::User);
            sched.record_exchange(&task, Some("ok".to_string())).await;
        }

        // history_limit is 3: only the most recent three survive
        let history = sched.source_history("chat").await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].input, "msg-3");
        assert_eq!(history[2].input, "msg-5");
    }
}
