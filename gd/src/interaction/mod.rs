//! Interaction and approval gating
//!
//! Any question or approval request raised during planning goes through
//! classification (risk level, interaction type, timeout behavior) and
//! then, depending on the plan's execution mode, is either auto-resolved
//! with the classification's default action or surfaced as a pending
//! interaction that exactly one of {explicit answer, timeout, cancel}
//! will ever settle.

mod classifier;
mod gate;

pub use classifier::{
    Classification, DefaultAction, ExecutionMode, InteractionClassifier, QuestionType, RiskLevel,
};
pub use gate::{Answer, InteractionGate, PendingInteraction, Resolution, ResolutionHandle};
