//! Prompt loader
//!
//! Loads prompt templates from a user override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;

/// Context for rendering the decomposition prompt
#[derive(Debug, Clone, Serialize)]
pub struct DecomposeContext {
    pub user_request: String,
    pub capabilities: String,
}

/// Context for rendering the goal execution prompt
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteContext {
    pub original_request: String,
    pub goal: String,
    pub plan_description: String,
    pub parent_goal: String,
    pub capabilities: String,
}

/// Context for rendering the self-task prompt
#[derive(Debug, Clone, Serialize)]
pub struct SelfTaskContext {
    pub recent_summary: String,
    pub last_self_task: String,
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `~/.config/goaldaemon/prompts/`)
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader with an override directory
    pub fn new(override_dir: impl AsRef<Path>) -> Self {
        let dir = override_dir.as_ref().to_path_buf();
        Self {
            hbs: Handlebars::new(),
            override_dir: if dir.exists() { Some(dir) } else { None },
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self {
            hbs: Handlebars::new(),
            override_dir: None,
        }
    }

    /// Load a template by name: user override first, then embedded
    fn load_template(&self, name: &str) -> Result<String> {
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(path = %path.display(), "Loading prompt override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt override {}: {}", path.display(), e));
            }
        }

        embedded::get_embedded(name)
            .map(|s| s.to_string())
            .ok_or_else(|| eyre!("Prompt template not found: {}", name))
    }

    fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        let template = self.load_template(name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", name, e))
    }

    /// Render the decomposition prompt
    pub fn decompose(&self, context: &DecomposeContext) -> Result<String> {
        self.render("decompose", context)
    }

    /// Render the goal execution prompt
    pub fn execute_goal(&self, context: &ExecuteContext) -> Result<String> {
        self.render("execute-goal", context)
    }

    /// Render the self-task prompt
    pub fn self_task(&self, context: &SelfTaskContext) -> Result<String> {
        self.render("self-task", context)
    }
}
