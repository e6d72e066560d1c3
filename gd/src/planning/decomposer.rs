//! Decomposer - turning a request into executable steps
//!
//! The decomposer is a narrow capability boundary: given a request and a
//! description of available capabilities, produce a typed decomposition.
//! The LLM-backed implementation forces a tool call for structured output
//! and treats the payload as untrusted; any validation failure is an
//! error the orchestrator absorbs into a single-goal fallback.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::GoalType;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, Message, ToolDefinition};
use crate::prompts::{DecomposeContext, PromptLoader};

/// One step of a decomposition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecomposedStep {
    /// What this step should accomplish
    pub description: String,

    /// Goal type for the step (usually one_shot)
    #[serde(rename = "type", default)]
    pub step_type: GoalType,

    /// Rough duration estimate
    #[serde(default)]
    pub estimated_time_seconds: Option<f64>,
}

/// Typed decomposition payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    /// Composition type for the root goal
    #[serde(default = "default_goal_type")]
    pub goal_type: GoalType,

    /// Ordered steps
    pub steps: Vec<DecomposedStep>,

    /// What could go wrong
    #[serde(default)]
    pub risks: Vec<String>,

    /// Information the decomposer lacked
    #[serde(default)]
    pub missing_info: Vec<String>,

    /// Why this structure was chosen
    #[serde(default)]
    pub reasoning: Option<String>,
}

fn default_goal_type() -> GoalType {
    GoalType::Linear
}

/// The external decomposition capability
#[async_trait]
pub trait Decomposer: Send + Sync {
    /// Decompose a request into steps
    async fn decompose(&self, request: &str, capabilities: &str) -> Result<Decomposition>;
}

/// LLM-backed decomposer
pub struct LlmDecomposer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    max_tokens: u32,
}

impl LlmDecomposer {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptLoader>) -> Self {
        Self {
            llm,
            prompts,
            max_tokens: 1024,
        }
    }

    fn build_tool() -> ToolDefinition {
        ToolDefinition::new(
            "submit_decomposition",
            "Submit the decomposition. Call this once with all steps.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "goal_type": {
                        "type": "string",
                        "enum": ["linear", "branching", "parallel"],
                        "description": "How the steps compose"
                    },
                    "steps": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "description": { "type": "string" },
                                "type": {
                                    "type": "string",
                                    "enum": ["one_shot", "linear", "branching", "parallel"]
                                },
                                "estimated_time_seconds": { "type": "number" }
                            },
                            "required": ["description"]
                        }
                    },
                    "risks": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "missing_info": {
                        "type": "array",
                        "items": { "type": "string" }
                    },
                    "reasoning": { "type": "string" }
                },
                "required": ["goal_type", "steps"]
            }),
        )
    }

    fn parse_response(&self, response: CompletionResponse) -> Result<Decomposition> {
        // Preferred path: the forced tool call
        for tool_call in &response.tool_calls {
            if tool_call.name == "submit_decomposition" {
                return parse_decomposition(tool_call.input.clone());
            }
        }

        // Fallback: plain JSON in the content
        if let Some(content) = &response.content
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(content)
        {
            return parse_decomposition(value);
        }

        bail!("Decomposer did not produce a valid decomposition")
    }
}

/// Validate an untrusted decomposition payload
fn parse_decomposition(value: serde_json::Value) -> Result<Decomposition> {
    let decomposition: Decomposition =
        serde_json::from_value(value).context("Failed to parse decomposition payload")?;

    if decomposition.steps.is_empty() {
        bail!("Decomposition produced zero steps");
    }

    if !decomposition.goal_type.is_composite() {
        bail!("Decomposition root must be a composite goal type");
    }

    Ok(decomposition)
}

#[async_trait]
impl Decomposer for LlmDecomposer {
    async fn decompose(&self, request: &str, capabilities: &str) -> Result<Decomposition> {
        let prompt = self.prompts.decompose(&DecomposeContext {
            user_request: request.to_string(),
            capabilities: capabilities.to_string(),
        })?;

        let completion = CompletionRequest {
            system_prompt: prompt,
            messages: vec![Message::user(format!("Decompose this request: {}", request))],
            tools: vec![Self::build_tool()],
            max_tokens: self.max_tokens,
        };

        let response = self
            .llm
            .complete(completion)
            .await
            .context("Decomposer LLM call failed")?;

        let decomposition = self.parse_response(response)?;
        debug!(
            steps = decomposition.steps.len(),
            goal_type = %decomposition.goal_type,
            "Request decomposed"
        );
        Ok(decomposition)
    }
}
