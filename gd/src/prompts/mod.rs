//! Prompt templates
//!
//! Embedded handlebars templates for decomposition, goal execution, and
//! self-task generation, with an optional user override directory.

mod embedded;
mod loader;

pub use loader::{DecomposeContext, ExecuteContext, PromptLoader, SelfTaskContext};
