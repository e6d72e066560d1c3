//! Goal domain type
//!
//! A Goal is one node of a decomposition tree: a leaf (OneShot), a
//! composite (Linear/Branching/Parallel), or a terminal marker
//! (Stop/Abort). Goals reference children by id; the owning Plan holds
//! the arena.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use planstore::now_ms;

use super::id::generate_id;

/// Composition type of a goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    /// Single executor invocation
    #[default]
    OneShot,
    /// Sequential children, short-circuit on failure
    Linear,
    /// Children tried in order, first success wins
    Branching,
    /// All children run concurrently, all must succeed
    Parallel,
    /// Terminal success node
    Stop,
    /// Terminal failure node
    Abort,
}

impl GoalType {
    /// Composite types may carry children; leaves and terminals may not
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Linear | Self::Branching | Self::Parallel)
    }
}

impl std::fmt::Display for GoalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneShot => write!(f, "one_shot"),
            Self::Linear => write!(f, "linear"),
            Self::Branching => write!(f, "branching"),
            Self::Parallel => write!(f, "parallel"),
            Self::Stop => write!(f, "stop"),
            Self::Abort => write!(f, "abort"),
        }
    }
}

/// Execution status of a goal or plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// Not started
    #[default]
    Pending,
    /// Currently executing
    InProgress,
    /// Successfully finished
    Completed,
    /// Failed to achieve
    Failed,
    /// Deliberately stopped
    Aborted,
    /// Waiting on prerequisites
    Blocked,
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Aborted => write!(f, "aborted"),
            Self::Blocked => write!(f, "blocked"),
        }
    }
}

/// Cost dimensions tracked per goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostKind {
    Time,
    Tokens,
    ApiCalls,
    Money,
    Risk,
}

/// Kind of prerequisite check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrereqKind {
    #[default]
    State,
    Data,
    External,
    Permission,
}

/// A condition that must hold before a goal executes
///
/// Prerequisites are carried through serialization and pattern
/// application; evaluation itself is not wired up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prerequisite {
    pub id: String,
    pub description: String,
    pub check_kind: PrereqKind,
    /// If false, an unmet prerequisite is only a warning
    pub blocking: bool,
}

/// Result of executing one goal, set exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub result_data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Confidence in this result, 0.0-1.0
    pub confidence: f64,
    #[serde(default)]
    pub side_effects: Vec<String>,
    #[serde(default)]
    pub observations: Vec<String>,
}

impl Outcome {
    /// A successful outcome carrying result data
    pub fn success(result_data: serde_json::Value, confidence: f64) -> Self {
        Self {
            success: true,
            result_data: Some(result_data),
            error: None,
            confidence,
            side_effects: Vec::new(),
            observations: Vec::new(),
        }
    }

    /// A failed outcome with an error message
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result_data: None,
            error: Some(error.into()),
            confidence: 1.0,
            side_effects: Vec::new(),
            observations: Vec::new(),
        }
    }
}

/// Cost-benefit tracking, estimated vs. actual per dimension
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostAnalysis {
    #[serde(default)]
    pub estimated_costs: HashMap<CostKind, f64>,
    #[serde(default)]
    pub actual_costs: HashMap<CostKind, f64>,
    #[serde(default)]
    pub estimated_benefits: HashMap<CostKind, f64>,
    #[serde(default)]
    pub actual_benefits: HashMap<CostKind, f64>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub risk_mitigation: Vec<String>,
}

impl CostAnalysis {
    /// Estimated net benefit (benefits - costs)
    pub fn net_benefit_estimated(&self) -> f64 {
        self.estimated_benefits.values().sum::<f64>() - self.estimated_costs.values().sum::<f64>()
    }

    /// Actual net benefit
    pub fn net_benefit_actual(&self) -> f64 {
        self.actual_benefits.values().sum::<f64>() - self.actual_costs.values().sum::<f64>()
    }

    /// Total of estimated costs across dimensions
    pub fn total_estimated(&self) -> f64 {
        self.estimated_costs.values().sum()
    }

    /// Total of actual costs across dimensions
    pub fn total_actual(&self) -> f64 {
        self.actual_costs.values().sum()
    }
}

/// A goal in the planning hierarchy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier
    pub id: String,

    /// Parent goal id (None for roots)
    pub parent_id: Option<String>,

    /// Owning plan id; a goal belongs to exactly one plan
    pub plan_id: Option<String>,

    /// What this goal should accomplish
    pub description: String,

    /// Composition type
    pub goal_type: GoalType,

    /// Prompt override for the executor (defaults to the description)
    pub prompt_template: Option<String>,

    /// Child goal ids, in execution order
    #[serde(default)]
    pub children: Vec<String>,

    /// Conditions that must hold before execution
    #[serde(default)]
    pub prerequisites: Vec<Prerequisite>,

    /// Execution status
    pub status: GoalStatus,

    /// What a successful outcome should look like
    pub target_outcome: Option<String>,

    /// Recorded result, set once when execution finishes
    pub actual_outcome: Option<Outcome>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Execution start timestamp
    pub started_at: Option<i64>,

    /// Execution end timestamp
    pub completed_at: Option<i64>,

    /// Cost-benefit tracking
    #[serde(default)]
    pub cost_analysis: CostAnalysis,

    /// Pattern this goal was copied from, if any
    pub success_pattern_id: Option<String>,

    /// Retry bookkeeping; defined but not consulted during execution
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

impl Goal {
    /// Create a new goal with generated ID
    pub fn new(description: impl Into<String>, goal_type: GoalType) -> Self {
        let description = description.into();
        Self {
            id: generate_id("goal", &description),
            parent_id: None,
            plan_id: None,
            description,
            goal_type,
            prompt_template: None,
            children: Vec::new(),
            prerequisites: Vec::new(),
            status: GoalStatus::Pending,
            target_outcome: None,
            actual_outcome: None,
            created_at: now_ms(),
            started_at: None,
            completed_at: None,
            cost_analysis: CostAnalysis::default(),
            success_pattern_id: None,
            retry_count: 0,
            max_retries: default_max_retries(),
        }
    }

    /// Create a goal with a specific ID (for testing or recovery)
    pub fn with_id(id: impl Into<String>, description: impl Into<String>, goal_type: GoalType) -> Self {
        let mut goal = Self::new(description, goal_type);
        goal.id = id.into();
        goal
    }

    /// Set the target outcome
    pub fn with_target_outcome(mut self, target: impl Into<String>) -> Self {
        self.target_outcome = Some(target.into());
        self
    }

    /// Set the prompt template
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    /// Check if this is a terminal node (Stop/Abort)
    pub fn is_terminal(&self) -> bool {
        matches!(self.goal_type, GoalType::Stop | GoalType::Abort)
    }

    /// A Blocked goal refuses execution; blocking prerequisites are
    /// otherwise not evaluated
    pub fn is_ready(&self) -> bool {
        self.status != GoalStatus::Blocked
    }

    /// Add an estimated cost
    pub fn estimate_cost(&mut self, kind: CostKind, amount: f64) {
        self.cost_analysis.estimated_costs.insert(kind, amount);
    }

    /// Record an actual cost
    pub fn record_cost(&mut self, kind: CostKind, amount: f64) {
        self.cost_analysis.actual_costs.insert(kind, amount);
    }

    /// Mark execution started
    pub fn mark_started(&mut self) {
        self.status = GoalStatus::InProgress;
        self.started_at = Some(now_ms());
    }

    /// Record the outcome and final status
    pub fn mark_finished(&mut self, outcome: Outcome) {
        self.status = if outcome.success {
            GoalStatus::Completed
        } else {
            GoalStatus::Failed
        };
        self.actual_outcome = Some(outcome);
        self.completed_at = Some(now_ms());
    }
}
