//! Domain types for GoalDaemon
//!
//! Task, Goal, and Plan are the core model: Tasks feed the scheduler,
//! Plans own trees of Goals keyed by id (an arena, no direct pointers).

mod goal;
mod id;
mod plan;
mod priority;
mod task;

pub use goal::{CostAnalysis, CostKind, Goal, GoalStatus, GoalType, Outcome, Prerequisite, PrereqKind};
pub use id::generate_id;
pub use plan::Plan;
pub use priority::Priority;
pub use task::Task;
