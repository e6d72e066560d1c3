//! Self-task generation
//!
//! When the queue idles out, the scheduler asks a generator for one
//! low-priority background task so the daemon keeps learning instead of
//! sleeping.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{PromptLoader, SelfTaskContext};

/// Task used when the generator is unavailable or returns garbage
pub const FALLBACK_SELF_TASK: &str = "Review recent interactions for patterns";

/// Generates background work from recent activity
#[async_trait]
pub trait SelfTaskGenerator: Send + Sync {
    /// Produce one task description from recent history
    async fn generate(&self, recent: &[String], last_self_task: Option<&str>) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct SelfTaskReply {
    task: String,
    #[serde(default)]
    reasoning: String,
}

/// LLM-backed self-task generator
pub struct LlmSelfTaskGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
}

impl LlmSelfTaskGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl SelfTaskGenerator for LlmSelfTaskGenerator {
    async fn generate(&self, recent: &[String], last_self_task: Option<&str>) -> Result<String> {
        let recent_summary = if recent.is_empty() {
            "Just started".to_string()
        } else {
            recent.join("; ")
        };

        let prompt = self.prompts.self_task(&SelfTaskContext {
            recent_summary,
            last_self_task: last_self_task.unwrap_or("none").to_string(),
        })?;

        let request = CompletionRequest {
            system_prompt: prompt,
            messages: vec![Message::user("What should I work on?")],
            tools: vec![],
            max_tokens: 256,
        };

        let response = self.llm.complete(request).await.context("Self-task LLM call failed")?;
        let content = response
            .content
            .ok_or_else(|| eyre::eyre!("Self-task generator returned no content"))?;

        let reply: SelfTaskReply =
            serde_json::from_str(content.trim()).context("Failed to parse self-task reply")?;

        if !reply.reasoning.is_empty() {
            debug!(reasoning = %reply.reasoning, "Self-task reasoning");
        }

        Ok(reply.task)
    }
}
