//! GoalPlanner - plan creation, pattern matching, and promotion
//!
//! The planner owns the learning loop: it computes structural signatures,
//! matches new plans against the pattern library, applies proven patterns
//! with fresh goal ids, and promotes successful plans back into the
//! library.

use std::sync::Arc;

use eyre::Result;
use tracing::{debug, info, warn};

use planstore::Store;

use crate::domain::{Goal, Plan};

use super::library::PatternLibrary;

/// Minimum evaluation score for a plan to become a pattern
pub const MIN_PATTERN_SCORE: f64 = 0.70;

/// A pattern that structurally matches a plan
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub pattern: Plan,
    /// Exact shape equality is the only match, so always 1.0
    pub similarity: f64,
    /// The pattern's historical evaluation score
    pub score: f64,
}

/// Creates plans and manages the pattern library
pub struct GoalPlanner {
    library: Arc<dyn PatternLibrary>,
    store: Store,
}

impl GoalPlanner {
    pub fn new(library: Arc<dyn PatternLibrary>, store: Store) -> Self {
        Self { library, store }
    }

    /// Create a new plan wrapping a root goal
    pub fn create_plan(&self, description: impl Into<String>, root_goal: Goal) -> Plan {
        let plan = Plan::new(description, root_goal);
        debug!(plan_id = %plan.id, "Created plan: {}", plan.description);
        plan
    }

    /// Find historically successful plans with the same tree structure
    ///
    /// Only exact shape equality counts as a match; results are sorted by
    /// descending historical evaluation score.
    pub fn find_similar_patterns(&self, plan: &mut Plan, min_score: f64) -> Vec<PatternMatch> {
        let signature = plan.compute_signature();

        let mut matches: Vec<PatternMatch> = self
            .library
            .all()
            .into_iter()
            .filter(|p| p.pattern_signature.as_deref() == Some(signature.as_str()))
            .map(|p| {
                let score = p.evaluation_score.unwrap_or(0.0);
                PatternMatch {
                    pattern: p,
                    similarity: 1.0,
                    score,
                }
            })
            .filter(|m| m.score >= min_score)
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches
    }

    /// Apply a proven pattern to a plan
    ///
    /// Deep-copies the pattern's goal tree with freshly generated ids,
    /// preserving descriptions, prompt templates, target outcomes, and
    /// prerequisites, and seeding each new goal's estimated costs from
    /// the pattern goal's actual (proven) costs. Returns false if the
    /// pattern has no root.
    pub fn apply_pattern(&self, plan: &mut Plan, pattern: &Plan) -> bool {
        debug!(plan_id = %plan.id, pattern_id = %pattern.id, "Applying pattern");

        let Some(new_root_id) = copy_tree(plan, pattern, &pattern.root_goal_id, None) else {
            warn!(pattern_id = %pattern.id, "Pattern has no root goal");
            return false;
        };

        plan.root_goal_id = new_root_id;
        plan.pattern_signature = pattern.pattern_signature.clone();
        true
    }

    /// Save a successful plan as a reusable pattern
    ///
    /// Refuses plans that did not succeed or scored below
    /// [`MIN_PATTERN_SCORE`].
    pub fn save_as_pattern(&self, plan: &mut Plan, tags: Vec<String>) -> Result<bool> {
        if !plan.success {
            info!(plan_id = %plan.id, "Not saving pattern: plan not successful");
            return Ok(false);
        }

        let score = plan.evaluation_score.unwrap_or(0.0);
        if score < MIN_PATTERN_SCORE {
            info!(plan_id = %plan.id, score, "Not saving pattern: score too low");
            return Ok(false);
        }

        plan.compute_signature();
        plan.tags = tags;

        self.library.save(plan)?;
        info!(plan_id = %plan.id, score, "Saved pattern");
        Ok(true)
    }

    /// Persist a completed plan record
    pub fn save_plan(&self, plan: &Plan) -> Result<()> {
        self.store.put(plan)?;
        Ok(())
    }

    /// The injected pattern library
    pub fn library(&self) -> &Arc<dyn PatternLibrary> {
        &self.library
    }
}

/// Recursively copy the pattern subtree rooted at `src_id` into `plan`,
/// returning the id of the newly created goal.
fn copy_tree(plan: &mut Plan, pattern: &Plan, src_id: &str, parent_id: Option<&str>) -> Option<String> {
    let src = pattern.get_goal(src_id)?;

    let mut new_goal = Goal::new(&src.description, src.goal_type);
    new_goal.parent_id = parent_id.map(|s| s.to_string());
    new_goal.prompt_template = src.prompt_template.clone();
    new_goal.target_outcome = src.target_outcome.clone();
    new_goal.prerequisites = src.prerequisites.clone();
    new_goal.success_pattern_id = Some(pattern.id.clone());
    // The pattern's proven costs become the new estimate
    new_goal.cost_analysis.estimated_costs = src.cost_analysis.actual_costs.clone();

    let new_id = plan.add_goal(new_goal);

    for child_id in &src.children {
        if let Some(new_child_id) = copy_tree(plan, pattern, child_id, Some(&new_id))
            && let Some(goal) = plan.get_goal_mut(&new_id)
        {
            goal.children.push(new_child_id);
        }
    }

    Some(new_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CostKind, GoalType};
    use crate::planning::library::FilePatternLibrary;
    use tempfile::TempDir;

    fn planner(dir: &TempDir) -> GoalPlanner {
        let store = Store::open(dir.path()).unwrap();
        let library = Arc::new(FilePatternLibrary::open(store.clone()).unwrap());
        GoalPlanner::new(library, store)
    }

    fn two_step_plan(planner: &GoalPlanner, description: &str) -> Plan {
        let root = Goal::new(description, GoalType::Linear);
        let root_id = root.id.clone();
        let mut plan = planner.create_plan(description, root);
        plan.add_child(&root_id, Goal::new("first step", GoalType::OneShot));
        plan.add_child(&root_id, Goal::new("second step", GoalType::OneShot));
        plan
    }

    fn promoted_pattern(planner: &GoalPlanner, description: &str, score: f64) -> Plan {
        let mut plan = two_step_plan(planner, description);
        plan.success = true;
        plan.evaluation_score = Some(score);
        planner.save_as_pattern(&mut plan, vec![]).unwrap();
        plan
    }

    #[test]
    fn test_promotion_gate_rejects_failures() {
        let dir = TempDir::new().unwrap();
        let planner = planner(&dir);

        let mut failed = two_step_plan(&planner, "failed plan");
        failed.success = false;
        failed.evaluation_score = Some(0.9);
        assert!(!planner.save_as_pattern(&mut failed, vec![]).unwrap());

        let mut low_score = two_step_plan(&planner, "low score plan");
        low_score.success = true;
        low_score.evaluation_score = Some(0.65);
        assert!(!planner.save_as_pattern(&mut low_score, vec![]).unwrap());

        assert!(planner.library().is_empty());
    }

    #[test]
    fn test_promotion_gate_accepts_good_plans() {
        let dir = TempDir::new().unwrap();
        let planner = planner(&dir);

        let mut plan = two_step_plan(&planner, "good plan");
        plan.success = true;
        plan.evaluation_score = Some(0.71);
        assert!(planner.save_as_pattern(&mut plan, vec!["test".to_string()]).unwrap());

        assert_eq!(planner.library().len(), 1);
    }

    #[test]
    fn test_find_similar_patterns_exact_shape_only() {
        let dir = TempDir::new().unwrap();
        let planner = planner(&dir);

        promoted_pattern(&planner, "organize a meeting", 0.9);

        // Same shape, different descriptions: matches
        let mut same_shape = two_step_plan(&planner, "research laptops");
        let matches = planner.find_similar_patterns(&mut same_shape, 0.7);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].similarity, 1.0);

        // Different shape: no match
        let root = Goal::new("one step", GoalType::Linear);
        let root_id = root.id.clone();
        let mut different = planner.create_plan("one step", root);
        different.add_child(&root_id, Goal::new("only step", GoalType::OneShot));
        assert!(planner.find_similar_patterns(&mut different, 0.7).is_empty());
    }

    #[test]
    fn test_find_similar_patterns_sorted_by_score() {
        let dir = TempDir::new().unwrap();
        let planner = planner(&dir);

        promoted_pattern(&planner, "plan a", 0.75);
        promoted_pattern(&planner, "plan b", 0.95);

        let mut probe = two_step_plan(&planner, "probe");
        let matches = planner.find_similar_patterns(&mut probe, 0.7);

        assert_eq!(matches.len(), 2);
        assert!(matches[0].score >= matches[1].score);
        assert_eq!(matches[0].score, 0.95);
    }

    #[test]
    fn test_apply_pattern_generates_fresh_ids() {
        let dir = TempDir::new().unwrap();
        let planner = planner(&dir);

        let mut pattern = two_step_plan(&planner, "pattern");
        let child_id = pattern.root_goal().unwrap().children[0].clone();
        pattern
            .get_goal_mut(&child_id)
            .unwrap()
            .record_cost(CostKind::Time, 12.0);
        pattern.compute_signature();

        let root = Goal::new("new request", GoalType::Linear);
        let mut plan = planner.create_plan("new request", root);
        assert!(planner.apply_pattern(&mut plan, &pattern));

        // Tree copied: root + 2 children (plus the discarded original root)
        let new_root = plan.root_goal().unwrap();
        assert_eq!(new_root.children.len(), 2);
        assert_eq!(new_root.description, "pattern");

        // Ids are fresh, never reused from the pattern
        for goal in plan.goals.values() {
            assert!(!pattern.goals.contains_key(&goal.id));
        }

        // Proven actual costs became the new estimates
        let copied_child = plan.get_goal(&new_root.children[0]).unwrap();
        assert_eq!(copied_child.cost_analysis.estimated_costs[&CostKind::Time], 12.0);
        assert_eq!(copied_child.success_pattern_id.as_deref(), Some(pattern.id.as_str()));

        // Signature carried over
        assert_eq!(plan.pattern_signature, pattern.pattern_signature);
    }

    #[test]
    fn test_apply_pattern_without_root_fails() {
        let dir = TempDir::new().unwrap();
        let planner = planner(&dir);

        let mut pattern = two_step_plan(&planner, "broken pattern");
        pattern.root_goal_id = "missing".to_string();

        let root = Goal::new("request", GoalType::Linear);
        let mut plan = planner.create_plan("request", root);
        assert!(!planner.apply_pattern(&mut plan, &pattern));
    }

    #[test]
    fn test_save_plan_persists_record() {
        let dir = TempDir::new().unwrap();
        let planner = planner(&dir);

        let plan = two_step_plan(&planner, "persist me");
        planner.save_plan(&plan).unwrap();

        let store = Store::open(dir.path()).unwrap();
        let loaded: Option<Plan> = store.get(&plan.id).unwrap();
        assert!(loaded.is_some());
    }
}
