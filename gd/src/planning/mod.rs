//! Planning: decomposition, pattern reuse, and tree execution
//!
//! - [`GoalPlanner`] creates plans and manages the pattern library
//! - [`Decomposer`] turns a request into steps (LLM-backed by default)
//! - [`GoalExecutor`] carries out one leaf goal
//! - [`PlanningOrchestrator`] ties it together: plan-or-direct decision,
//!   risk estimation, approval handoff, and goal tree execution

mod decomposer;
mod executor;
mod library;
mod orchestrator;
mod planner;

pub use decomposer::{Decomposer, Decomposition, DecomposedStep, LlmDecomposer};
pub use executor::{GoalExecutor, LlmExecutor, PlanContext};
pub use library::{FilePatternLibrary, PatternLibrary};
pub use orchestrator::{CostEstimate, OrchestratorStats, PlanningConfig, PlanningOrchestrator, PlanningReply};
pub use planner::{GoalPlanner, PatternMatch};
