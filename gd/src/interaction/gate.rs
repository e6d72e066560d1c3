//! Interaction gate
//!
//! Owns pending interactions and per-plan execution modes. Every pending
//! interaction is settled exactly once: the oneshot sender lives in a
//! mutex-guarded map, and whichever of {explicit submit, timer expiry,
//! cancel} removes it first wins; the others find the entry gone and
//! no-op.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use planstore::now_ms;

use super::classifier::{Classification, DefaultAction, ExecutionMode, InteractionClassifier, RiskLevel};
use crate::domain::generate_id;

/// A user's (or default) answer to an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub action: String,
    pub value: serde_json::Value,
}

impl Answer {
    pub fn yes() -> Self {
        Self {
            action: "yes".to_string(),
            value: serde_json::Value::Bool(true),
        }
    }

    pub fn no() -> Self {
        Self {
            action: "no".to_string(),
            value: serde_json::Value::Bool(false),
        }
    }

    /// Map free text from the host layer to an answer
    pub fn from_text(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "yes" | "y" | "ok" | "sure" | "approve" => Self::yes(),
            "no" | "n" | "cancel" | "stop" => Self::no(),
            other => Self {
                action: "response".to_string(),
                value: serde_json::Value::String(other.to_string()),
            },
        }
    }

    /// Build the answer a default action resolves to
    pub fn from_default(action: DefaultAction, suggested: &[String]) -> Self {
        match action {
            DefaultAction::Yes => Self::yes(),
            DefaultAction::No => Self::no(),
            DefaultAction::Skip => Self {
                action: "skip".to_string(),
                value: serde_json::Value::Null,
            },
            DefaultAction::Cancel => Self {
                action: "cancel".to_string(),
                value: serde_json::Value::Null,
            },
            DefaultAction::First => match suggested.first() {
                Some(choice) => Self {
                    action: "choice".to_string(),
                    value: serde_json::Value::String(choice.clone()),
                },
                None => Self {
                    action: "skip".to_string(),
                    value: serde_json::Value::Null,
                },
            },
            DefaultAction::Continue => Self {
                action: "continue".to_string(),
                value: serde_json::Value::Null,
            },
        }
    }

    /// Does this answer mean "go ahead"
    pub fn is_affirmative(&self) -> bool {
        self.action == "yes" || self.value == serde_json::Value::Bool(true)
    }
}

/// How a pending interaction was settled
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Explicit response (or mode auto-resolution)
    Answered(Answer),
    /// Timer expired; carries the classification's default answer
    TimedOut(Answer),
    /// Caller shut down or withdrew the question
    Cancelled,
}

impl Resolution {
    /// Does this resolution mean "go ahead"
    pub fn is_affirmative(&self) -> bool {
        match self {
            Resolution::Answered(a) | Resolution::TimedOut(a) => a.is_affirmative(),
            Resolution::Cancelled => false,
        }
    }
}

/// Await the resolution of one pending interaction
pub struct ResolutionHandle {
    rx: oneshot::Receiver<Resolution>,
}

impl ResolutionHandle {
    /// Wait for the single resolution event
    pub async fn wait(self) -> Resolution {
        // A dropped sender means the gate was torn down
        self.rx.await.unwrap_or(Resolution::Cancelled)
    }
}

/// Metadata for a question awaiting resolution
#[derive(Debug, Clone)]
pub struct PendingInteraction {
    pub id: String,
    pub plan_id: String,
    pub requester_id: String,
    pub question_text: String,
    pub classification: Classification,
    pub created_at: i64,
}

struct PendingEntry {
    interaction: PendingInteraction,
    tx: oneshot::Sender<Resolution>,
    timer: Option<JoinHandle<()>>,
}

/// The interaction/approval gate
pub struct InteractionGate {
    classifier: InteractionClassifier,
    pending: Arc<Mutex<HashMap<String, PendingEntry>>>,
    modes: Mutex<HashMap<String, ExecutionMode>>,
    default_mode: ExecutionMode,
}

impl InteractionGate {
    pub fn new(default_mode: ExecutionMode) -> Self {
        Self {
            classifier: InteractionClassifier::new(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            modes: Mutex::new(HashMap::new()),
            default_mode,
        }
    }

    /// Set the execution mode for a plan
    pub async fn set_mode(&self, plan_id: &str, mode: ExecutionMode) {
        self.modes.lock().await.insert(plan_id.to_string(), mode);
        debug!(%plan_id, ?mode, "Execution mode set");
    }

    async fn mode_for(&self, plan_id: &str) -> ExecutionMode {
        self.modes.lock().await.get(plan_id).copied().unwrap_or(self.default_mode)
    }

    /// Classify a question without opening an interaction
    pub fn classify(&self, text: &str) -> Classification {
        self.classifier.classify(text)
    }

    /// Open an interaction for a question, returning its id and a handle
    /// that resolves exactly once.
    ///
    /// Depending on the plan's execution mode, the question may be
    /// auto-resolved with its default action immediately; no pending
    /// interaction is created in that case.
    pub async fn open(&self, plan_id: &str, requester_id: &str, question: &str) -> (String, ResolutionHandle) {
        let classification = self.classifier.classify(question);
        let mode = self.mode_for(plan_id).await;

        info!(
            %plan_id,
            question_type = ?classification.question_type,
            risk = ?classification.risk,
            ?mode,
            "Question classified"
        );

        let auto_resolve = match mode {
            ExecutionMode::Autonomous => classification.risk != RiskLevel::Critical,
            ExecutionMode::Supervised => matches!(classification.risk, RiskLevel::Low | RiskLevel::Medium),
            ExecutionMode::Interactive | ExecutionMode::ApprovalRequired => false,
        };

        let id = generate_id("interaction", question);
        let (tx, rx) = oneshot::channel();

        if auto_resolve {
            let action = classification.default_action.unwrap_or(DefaultAction::Continue);
            let answer = Answer::from_default(action, &classification.suggested_actions);
            debug!(%plan_id, ?action, "Auto-resolving with default");
            let _ = tx.send(Resolution::Answered(answer));
            return (id, ResolutionHandle { rx });
        }

        let interaction = PendingInteraction {
            id: id.clone(),
            plan_id: plan_id.to_string(),
            requester_id: requester_id.to_string(),
            question_text: question.to_string(),
            classification: classification.clone(),
            created_at: now_ms(),
        };

        let timer = classification.timeout_ms.map(|timeout_ms| {
            let pending = Arc::clone(&self.pending);
            let interaction_id = id.clone();
            let action = classification.default_action.unwrap_or(DefaultAction::Cancel);
            let suggested = classification.suggested_actions.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                // No-op if an explicit response already took the entry
                let entry = pending.lock().await.remove(&interaction_id);
                if let Some(entry) = entry {
                    let answer = Answer::from_default(action, &suggested);
                    warn!(
                        id = %interaction_id,
                        action = %answer.action,
                        "Interaction timed out, using default"
                    );
                    let _ = entry.tx.send(Resolution::TimedOut(answer));
                }
            })
        });

        self.pending.lock().await.insert(
            id.clone(),
            PendingEntry {
                interaction,
                tx,
                timer,
            },
        );

        (id, ResolutionHandle { rx })
    }

    /// Open and wait for resolution in one call
    pub async fn ask(&self, plan_id: &str, requester_id: &str, question: &str) -> Resolution {
        let (_, handle) = self.open(plan_id, requester_id, question).await;
        handle.wait().await
    }

    /// Submit an explicit response to a pending interaction
    ///
    /// Returns false if the interaction is unknown or already resolved.
    pub async fn submit(&self, interaction_id: &str, answer: Answer) -> bool {
        let entry = self.pending.lock().await.remove(interaction_id);
        match entry {
            Some(entry) => {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                debug!(id = %interaction_id, action = %answer.action, "Interaction answered");
                let _ = entry.tx.send(Resolution::Answered(answer));
                true
            }
            None => {
                debug!(id = %interaction_id, "Submit ignored: interaction already resolved");
                false
            }
        }
    }

    /// Cancel a pending interaction (e.g., caller shutdown)
    pub async fn cancel(&self, interaction_id: &str) -> bool {
        let entry = self.pending.lock().await.remove(interaction_id);
        match entry {
            Some(entry) => {
                if let Some(timer) = entry.timer {
                    timer.abort();
                }
                let _ = entry.tx.send(Resolution::Cancelled);
                true
            }
            None => false,
        }
    }

    /// Cancel every pending interaction
    pub async fn cancel_all(&self) {
        let entries: Vec<PendingEntry> = {
            let mut pending = self.pending.lock().await;
            pending.drain().map(|(_, e)| e).collect()
        };
        for entry in entries {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            let _ = entry.tx.send(Resolution::Cancelled);
        }
    }

    /// Number of interactions currently pending
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// The pending interaction for a plan, if any
    pub async fn pending_for_plan(&self, plan_id: &str) -> Option<PendingInteraction> {
        self.pending
            .lock()
            .await
            .values()
            .find(|e| e.interaction.plan_id == plan_id)
            .map(|e| e.interaction.clone())
    }
}
