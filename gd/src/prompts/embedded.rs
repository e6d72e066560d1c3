//! Embedded default prompt templates

/// Look up an embedded template by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "decompose" => Some(DECOMPOSE),
        "execute-goal" => Some(EXECUTE_GOAL),
        "self-task" => Some(SELF_TASK),
        _ => None,
    }
}

/// Decomposition: break a request into executable steps
pub const DECOMPOSE: &str = r#"You are a planning assistant decomposing a user request into executable steps.

USER REQUEST: "{{user_request}}"

AVAILABLE CAPABILITIES:
{{capabilities}}

Break the request into 2-5 concrete steps. Each step should be achievable
with a single capability invocation. Order matters for linear plans.

Call submit_decomposition once with:
- goal_type: one of "linear", "branching", "parallel"
- steps: array of {description, type, estimated_time_seconds}
  where type is usually "one_shot"
- risks: array of strings describing what could go wrong
- missing_info: array of strings for information you would need but lack
- reasoning: one sentence on why you chose this structure
"#;

/// Goal execution: carry out one step of a plan
pub const EXECUTE_GOAL: &str = r#"You are executing one goal of a larger plan.

ORIGINAL REQUEST: "{{original_request}}"

CURRENT GOAL: "{{goal}}"

CONTEXT:
- This is part of a larger plan to: {{plan_description}}
- Parent goal: {{parent_goal}}

YOUR AVAILABLE CAPABILITIES:
{{capabilities}}

Execute this specific goal using the information available above. Be
specific. Only report failure if the goal is impossible or makes no sense.

Respond with JSON:
{
  "action_taken": "What you did",
  "result": "The specific outcome with details",
  "success": true,
  "next_steps": "What should happen next, if anything"
}
"#;

/// Self-task generation: produce background work when idle
pub const SELF_TASK: &str = r#"You are an autonomous assistant with an empty work queue.

Recent activity: {{recent_summary}}
Last self-task: {{last_self_task}}

Propose one useful background task: reviewing recent interactions for
patterns, consolidating notes, or preparing for likely upcoming requests.
Do not repeat the last self-task.

Respond with JSON:
{"task": "description of the task", "reasoning": "why this matters now"}
"#;
