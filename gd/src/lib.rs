//! GoalDaemon - hierarchical goal planning and execution engine
//!
//! Given a high-level request, GoalDaemon produces a tree of sub-goals,
//! executes that tree under defined composition semantics (sequential,
//! branching, parallel, terminal), gates risky plans behind human
//! approval with bounded-timeout defaults, and learns from past
//! successful trees via structural pattern matching.
//!
//! # Core Concepts
//!
//! - **Goal trees, not call stacks**: plans own an id-keyed arena of
//!   goals, so trees serialize trivially and never form ownership cycles
//! - **One consumer**: a priority queue feeds a single processing loop;
//!   plan execution is serialized globally
//! - **Learn by shape**: successful plans are stored under a structural
//!   signature and reapplied with proven costs as new estimates
//! - **Settle once**: every pending approval resolves exactly once, by
//!   explicit answer or timeout default, never both
//!
//! # Modules
//!
//! - [`domain`] - Task, Goal, Plan, and cost model
//! - [`scheduler`] - priority queue and the consumer loop
//! - [`planning`] - planner, pattern library, decomposer/executor
//!   boundaries, and the orchestrator
//! - [`interaction`] - question classification and the approval gate
//! - [`llm`] - completion client backing the capability adapters
//! - [`config`] - configuration types and loading
//! - [`daemon`] - wiring and the task processing pipeline

pub mod cli;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod interaction;
pub mod llm;
pub mod planning;
pub mod prompts;
pub mod scheduler;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use daemon::{Daemon, LogSink, ResponseSink};
pub use domain::{
    CostAnalysis, CostKind, Goal, GoalStatus, GoalType, Outcome, Plan, Prerequisite, Priority, Task,
};
pub use interaction::{
    Answer, Classification, DefaultAction, ExecutionMode, InteractionClassifier, InteractionGate, QuestionType,
    Resolution, RiskLevel,
};
pub use planning::{
    CostEstimate, Decomposer, Decomposition, FilePatternLibrary, GoalExecutor, GoalPlanner, LlmDecomposer,
    LlmExecutor, PatternLibrary, PlanContext, PlanningConfig, PlanningOrchestrator, PlanningReply,
};
pub use scheduler::{Scheduler, SchedulerConfig, SelfTaskGenerator, TaskHandler, TaskQueue};
