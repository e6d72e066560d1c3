//! Plan domain type
//!
//! A Plan owns a complete goal tree for one request: goals are stored in
//! an id-keyed arena and reference each other only by id, so the tree
//! serializes trivially and never forms ownership cycles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use planstore::{Record, now_ms};

use super::goal::{CostAnalysis, Goal, GoalStatus, Outcome};
use super::id::generate_id;

/// Signature length in hex characters
const SIGNATURE_LEN: usize = 16;

/// Weights for the evaluation score
const WEIGHT_SUCCESS: f64 = 0.6;
const WEIGHT_COST: f64 = 0.2;
const WEIGHT_SPEED: f64 = 0.1;
const WEIGHT_SIDE_EFFECTS: f64 = 0.1;

/// Node of the normalized shape tree fed to the signature hash.
/// Field order is fixed by the struct, so serialization is deterministic.
#[derive(Serialize)]
struct ShapeNode {
    r#type: String,
    children: Vec<ShapeNode>,
}

/// Complete execution plan with evaluation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier
    pub id: String,

    /// Root of the goal tree; must key into `goals`
    pub root_goal_id: String,

    /// Human-readable description (the original request)
    pub description: String,

    /// All goals in this plan, keyed by goal id
    #[serde(default)]
    pub goals: HashMap<String, Goal>,

    /// Execution status
    pub status: GoalStatus,

    /// Execution start timestamp (Unix milliseconds)
    pub started_at: Option<i64>,

    /// Execution end timestamp
    pub completed_at: Option<i64>,

    /// Did the plan achieve its goal
    #[serde(default)]
    pub success: bool,

    /// Overall outcome, if one was recorded
    pub final_outcome: Option<Outcome>,

    /// Structural signature of the goal tree
    pub pattern_signature: Option<String>,

    /// Free-form tags for the pattern library
    #[serde(default)]
    pub tags: Vec<String>,

    /// Aggregated costs across all goals
    #[serde(default)]
    pub total_cost: CostAnalysis,

    /// Evaluation score 0.0-1.0, set after execution
    pub evaluation_score: Option<f64>,

    /// Notes recorded for future planning
    #[serde(default)]
    pub lessons_learned: Vec<String>,

    /// Creation timestamp
    pub created_at: i64,

    /// Last update timestamp
    pub updated_at: i64,
}

impl Plan {
    /// Create a plan around a root goal
    pub fn new(description: impl Into<String>, mut root_goal: Goal) -> Self {
        let description = description.into();
        let id = generate_id("plan", &description);
        let now = now_ms();

        root_goal.plan_id = Some(id.clone());
        let root_goal_id = root_goal.id.clone();

        let mut goals = HashMap::new();
        goals.insert(root_goal_id.clone(), root_goal);

        Self {
            id,
            root_goal_id,
            description,
            goals,
            status: GoalStatus::Pending,
            started_at: None,
            completed_at: None,
            success: false,
            final_outcome: None,
            pattern_signature: None,
            tags: Vec::new(),
            total_cost: CostAnalysis::default(),
            evaluation_score: None,
            lessons_learned: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a goal to the arena, claiming it for this plan
    pub fn add_goal(&mut self, mut goal: Goal) -> String {
        goal.plan_id = Some(self.id.clone());
        let id = goal.id.clone();
        self.goals.insert(id.clone(), goal);
        self.updated_at = now_ms();
        id
    }

    /// Add a goal as a child of an existing goal
    ///
    /// Returns the child id, or None if the parent is unknown.
    pub fn add_child(&mut self, parent_id: &str, mut child: Goal) -> Option<String> {
        if !self.goals.contains_key(parent_id) {
            return None;
        }
        child.parent_id = Some(parent_id.to_string());
        let child_id = self.add_goal(child);
        if let Some(parent) = self.goals.get_mut(parent_id) {
            parent.children.push(child_id.clone());
        }
        Some(child_id)
    }

    /// Retrieve a goal by id
    pub fn get_goal(&self, goal_id: &str) -> Option<&Goal> {
        self.goals.get(goal_id)
    }

    /// Retrieve a goal mutably
    pub fn get_goal_mut(&mut self, goal_id: &str) -> Option<&mut Goal> {
        self.goals.get_mut(goal_id)
    }

    /// The root goal
    pub fn root_goal(&self) -> Option<&Goal> {
        self.goals.get(&self.root_goal_id)
    }

    /// Child goals of a goal, in execution order
    pub fn children_of(&self, goal_id: &str) -> Vec<&Goal> {
        let Some(goal) = self.goals.get(goal_id) else {
            return Vec::new();
        };
        goal.children.iter().filter_map(|cid| self.goals.get(cid)).collect()
    }

    /// Compute the structural signature of the goal tree
    ///
    /// The signature hashes goal types and tree shape only; descriptions
    /// and every other field are ignored. Two plans with identical
    /// signatures are structurally interchangeable. The signature is also
    /// stored on the plan.
    pub fn compute_signature(&mut self) -> String {
        let tree = self.build_shape(&self.root_goal_id);
        // ShapeNode serialization cannot fail: no maps, no non-string keys
        let tree_json = serde_json::to_string(&tree).unwrap_or_default();

        let digest = Sha256::digest(tree_json.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        let signature: String = hex.chars().take(SIGNATURE_LEN).collect();

        self.pattern_signature = Some(signature.clone());
        signature
    }

    fn build_shape(&self, goal_id: &str) -> ShapeNode {
        match self.goals.get(goal_id) {
            Some(goal) => ShapeNode {
                r#type: goal.goal_type.to_string(),
                children: goal.children.iter().map(|cid| self.build_shape(cid)).collect(),
            },
            None => ShapeNode {
                r#type: String::new(),
                children: Vec::new(),
            },
        }
    }

    /// Aggregate estimated/actual costs and risks from all goals
    pub fn aggregate_costs(&mut self) {
        let mut total = CostAnalysis::default();

        for goal in self.goals.values() {
            for (kind, amount) in &goal.cost_analysis.estimated_costs {
                *total.estimated_costs.entry(*kind).or_insert(0.0) += amount;
            }
            for (kind, amount) in &goal.cost_analysis.actual_costs {
                *total.actual_costs.entry(*kind).or_insert(0.0) += amount;
            }
            total.risks.extend(goal.cost_analysis.risks.iter().cloned());
        }

        self.total_cost = total;
        self.updated_at = now_ms();
    }

    /// Evaluate overall plan performance, returning a score in [0, 1]
    ///
    /// Weighted: success 60%, cost efficiency 20%, speed 10% (reserved,
    /// always 1.0), side effects 10%. A plan that never completed scores 0.
    pub fn evaluate_performance(&mut self) -> f64 {
        if self.status != GoalStatus::Completed {
            self.evaluation_score = Some(0.0);
            return 0.0;
        }

        let success_score = if self.success { 1.0 } else { 0.0 };

        // Only penalize cost when significantly over budget (>1.5x)
        let estimated_total = {
            let total = self.total_cost.total_estimated();
            if total == 0.0 { 1.0 } else { total }
        };
        let actual_total = self.total_cost.total_actual();
        let cost_score = if actual_total > estimated_total * 1.5 {
            (1.0 - ((actual_total - estimated_total) / estimated_total)).max(0.0)
        } else {
            1.0
        };

        // Reserved for a future time-based penalty
        let speed_score = 1.0;

        let side_effect_count: usize = self
            .goals
            .values()
            .filter_map(|g| g.actual_outcome.as_ref())
            .map(|o| o.side_effects.len())
            .sum();
        let side_effect_score = (1.0 - side_effect_count as f64 * 0.1).max(0.0);

        let score = (success_score * WEIGHT_SUCCESS
            + cost_score * WEIGHT_COST
            + speed_score * WEIGHT_SPEED
            + side_effect_score * WEIGHT_SIDE_EFFECTS)
            .clamp(0.0, 1.0);

        self.evaluation_score = Some(score);
        score
    }

    /// Mark execution started
    pub fn mark_started(&mut self) {
        self.status = GoalStatus::InProgress;
        self.started_at = Some(now_ms());
        self.updated_at = now_ms();
    }

    /// Mark execution finished
    pub fn mark_finished(&mut self, success: bool) {
        self.status = if success { GoalStatus::Completed } else { GoalStatus::Failed };
        self.success = success;
        self.completed_at = Some(now_ms());
        self.updated_at = now_ms();
    }
}

impl Record for Plan {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "plans"
    }
}
