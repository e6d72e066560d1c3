//! Task domain type
//!
//! A Task is one unit of work in the scheduler queue, created on ingestion
//! from a source (terminal, sensor, or the daemon itself when idle).

use serde::{Deserialize, Serialize};

use planstore::now_ms;

use super::id::generate_id;
use super::priority::Priority;

/// A unit of work in the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier (e.g., "019635-task-book-a-flight")
    pub id: String,

    /// Raw request text
    pub content: String,

    /// Identifier of the originating source
    pub source_id: String,

    /// Priority band for queue ordering
    pub priority: Priority,

    /// Additional source-specific context data
    #[serde(default)]
    pub context: serde_json::Value,

    /// Optional deadline (Unix milliseconds)
    pub deadline: Option<i64>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Number of processing attempts so far
    #[serde(default)]
    pub attempts: u32,
}

impl Task {
    /// Create a new Task with generated ID
    pub fn new(content: impl Into<String>, source_id: impl Into<String>, priority: Priority) -> Self {
        let content = content.into();
        Self {
            id: generate_id("task", &content),
            content,
            source_id: source_id.into(),
            priority,
            context: serde_json::Value::Null,
            deadline: None,
            created_at: now_ms(),
            attempts: 0,
        }
    }

    /// Set a deadline
    pub fn with_deadline(mut self, deadline_ms: i64) -> Self {
        self.deadline = Some(deadline_ms);
        self
    }

    /// Set context data
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Record a processing attempt
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }
}
