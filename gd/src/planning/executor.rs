//! GoalExecutor - carrying out one leaf goal
//!
//! The executor is the second narrow capability boundary. It must always
//! return an Outcome; failures become `Outcome { success: false, .. }`
//! rather than errors crossing the boundary.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::{Goal, Outcome};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{ExecuteContext, PromptLoader};

/// Context handed to the executor alongside the goal
#[derive(Debug, Clone)]
pub struct PlanContext {
    /// The original user request (root goal description)
    pub original_request: String,

    /// What the overall plan is for
    pub plan_description: String,

    /// The parent goal's description, if the goal has a parent
    pub parent_goal: Option<String>,
}

/// The external per-goal execution capability
#[async_trait]
pub trait GoalExecutor: Send + Sync {
    /// Execute one goal; never errors past this boundary
    async fn execute(&self, goal: &Goal, ctx: &PlanContext) -> Outcome;
}

/// Reply shape expected from the execution prompt
#[derive(Debug, Deserialize)]
struct ExecutionReply {
    #[serde(default)]
    action_taken: String,

    #[serde(default)]
    result: serde_json::Value,

    #[serde(default = "default_true")]
    success: bool,

    #[serde(default)]
    next_steps: String,
}

fn default_true() -> bool {
    true
}

/// LLM-backed goal executor
pub struct LlmExecutor {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    capabilities: String,
    max_tokens: u32,
}

impl LlmExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>, capabilities: impl Into<String>) -> Self {
        Self {
            llm,
            prompts,
            capabilities: capabilities.into(),
            max_tokens: 512,
        }
    }

    fn outcome_from_content(content: &str) -> Outcome {
        match serde_json::from_str::<ExecutionReply>(content.trim()) {
            Ok(reply) => {
                debug!(action = %reply.action_taken, success = reply.success, "Goal executed");
                let success = reply.success;
                let mut outcome = Outcome::success(
                    serde_json::json!({
                        "action": reply.action_taken,
                        "result": reply.result,
                        "next_steps": reply.next_steps,
                    }),
                    0.8,
                );
                outcome.success = success;
                if !success {
                    outcome.error = Some("Executor reported failure".to_string());
                }
                outcome
            }
            Err(_) => {
                // Lenient fallback: keep the raw response at reduced confidence
                Outcome::success(serde_json::json!({ "response": content }), 0.6)
            }
        }
    }
}

#[async_trait]
impl GoalExecutor for LlmExecutor {
    async fn execute(&self, goal: &Goal, ctx: &PlanContext) -> Outcome {
        let goal_text = goal.prompt_template.as_deref().unwrap_or(&goal.description);

        let prompt = match self.prompts.execute_goal(&ExecuteContext {
            original_request: ctx.original_request.clone(),
            goal: goal_text.to_string(),
            plan_description: ctx.plan_description.clone(),
            parent_goal: ctx
                .parent_goal
                .clone()
                .unwrap_or_else(|| "This is the root goal".to_string()),
            capabilities: self.capabilities.clone(),
        }) {
            Ok(p) => p,
            Err(e) => return Outcome::failure(format!("Prompt rendering failed: {}", e)),
        };

        let request = CompletionRequest {
            system_prompt: prompt,
            messages: vec![Message::user(format!("Execute: {}", goal_text))],
            tools: vec![],
            max_tokens: self.max_tokens,
        };

        match self.llm.complete(request).await {
            Ok(response) => match response.content {
                Some(content) => Self::outcome_from_content(&content),
                None => Outcome::failure("Executor returned no content"),
            },
            Err(e) => {
                warn!(goal_id = %goal.id, error = %e, "Executor LLM call failed");
                Outcome::failure(format!("Executor call failed: {}", e))
            }
        }
    }
}
