//! LLM client module
//!
//! Single-turn completion requests against a provider. The decomposer,
//! executor, and self-task generator all go through the [`LlmClient`]
//! trait so tests can substitute deterministic fakes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::LlmConfig;

mod anthropic;
mod error;
mod types;

pub use anthropic::AnthropicClient;
pub use error::LlmError;
pub use types::{
    CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage, ToolCall, ToolDefinition,
};

/// A provider-agnostic completion client
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion request to completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Create an LLM client for the provider named in config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown LLM provider: '{}'. Supported: anthropic",
            other
        ))),
    }
}
