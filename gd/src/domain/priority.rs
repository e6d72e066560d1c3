//! Priority levels for task scheduling
//!
//! Lower value = more urgent; the queue dequeues ascending.

use serde::{Deserialize, Serialize};

/// Priority band for queued tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Emergency, safety critical
    Interrupt,
    /// Active human interaction
    #[default]
    User,
    /// Time-sensitive tasks
    Scheduled,
    /// Sensor/device triggers
    Event,
    /// Self-generated queries
    SystemTask,
    /// Housekeeping, learning, research
    Background,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupt => write!(f, "interrupt"),
            Self::User => write!(f, "user"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Event => write!(f, "event"),
            Self::SystemTask => write!(f, "system_task"),
            Self::Background => write!(f, "background"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "interrupt" => Ok(Self::Interrupt),
            "user" => Ok(Self::User),
            "scheduled" => Ok(Self::Scheduled),
            "event" => Ok(Self::Event),
            "system_task" | "system" => Ok(Self::SystemTask),
            "background" => Ok(Self::Background),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}
