//! Question classification
//!
//! Classifies free text (a proposed plan summary, or any executor-raised
//! question) by interaction type and risk level, using ordered keyword
//! checks: medical and financial and legal domains first, then
//! destructive actions, then generic approval/information/choice
//! patterns, with open-ended as the fallback.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Risk level of a question/decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Preferences, non-critical info
    Low,
    /// Dates, names, clarifications
    Medium,
    /// Purchases, deletions, significant actions
    High,
    /// Medical, financial, legal decisions
    Critical,
}

/// Type of interaction needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Yes/No decision
    Approval,
    /// Need specific data
    Information,
    /// Multiple options
    Choice,
    /// Confirm understanding
    Confirmation,
    /// Free-form response
    OpenEnded,
}

/// How autonomous execution should be, per plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Just do it; only Critical risk is surfaced
    Autonomous,
    /// Ask for major decisions only (High/Critical)
    Supervised,
    /// Ask for everything
    #[default]
    Interactive,
    /// Every step needs approval
    ApprovalRequired,
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "autonomous" => Ok(Self::Autonomous),
            "supervised" => Ok(Self::Supervised),
            "interactive" => Ok(Self::Interactive),
            "approval" | "approval_required" => Ok(Self::ApprovalRequired),
            _ => Err(format!("Unknown execution mode: {}", s)),
        }
    }
}

/// Action taken when a timed interaction expires unanswered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultAction {
    Yes,
    No,
    Skip,
    Cancel,
    /// First suggested action
    First,
    Continue,
}

/// Result of classifying a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub question_type: QuestionType,
    pub risk: RiskLevel,
    /// None means no timeout: an explicit response is required
    pub timeout_ms: Option<u64>,
    pub default_action: Option<DefaultAction>,
    pub require_explicit: bool,
    pub suggested_actions: Vec<String>,
    pub disclaimer: Option<String>,
    /// Extracted dollar amount, for financial questions
    pub amount: Option<f64>,
    /// Detected domain ("medical", "financial", ...) or input kind
    pub domain: Option<String>,
}

const TIMEOUT_SHORT_MS: u64 = 30_000;
const TIMEOUT_DEFAULT_MS: u64 = 60_000;
const TIMEOUT_LONG_MS: u64 = 120_000;

const FINANCIAL_KEYWORDS: &[&str] = &[
    r"\$\d+", "invest", "purchase", "buy", "spend", "cost", "payment", "transaction", "transfer", "stock", "bond",
    "account", "withdraw", "deposit",
];

const MEDICAL_KEYWORDS: &[&str] = &[
    "medication", "surgery", "treatment", "doctor", "hospital", "prescription", "diagnosis", "symptom", "disease",
    "medical", "health", "therapy", "procedure",
];

const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "delete", "remove", "cancel", "terminate", "destroy", "erase", "wipe", "drop", "purge",
];

const LEGAL_KEYWORDS: &[&str] = &[
    "contract", "agreement", "legal", "lawsuit", "court", "attorney", "liability", "compliance", "regulation",
];

const APPROVAL_PATTERNS: &[&str] = &[
    r#"reply ['"]?yes['"]? to proceed"#,
    r#"reply ['"]?yes['"]? to confirm"#,
    r"approve|confirm",
    r"proceed\?",
    r"continue\?",
];

const INFORMATION_PATTERNS: &[&str] = &[
    r"what (date|time|when|where|who)",
    r"which (option|choice|one)",
    r"how (many|much|long)",
    r"please (provide|specify|enter|give)",
];

/// Classifies questions and determines interaction requirements
pub struct InteractionClassifier {
    financial: Vec<Regex>,
    medical: Vec<Regex>,
    destructive: Vec<Regex>,
    legal: Vec<Regex>,
    approval: Vec<Regex>,
    information: Vec<Regex>,
    numbered_list: Regex,
    bulleted_list: Regex,
    either_or: Regex,
    plan_steps: Regex,
    api_calls: Regex,
    amount: Regex,
    numbered_item: Regex,
    bulleted_item: Regex,
}

impl Default for InteractionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionClassifier {
    pub fn new() -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(&format!("(?i){}", p)).expect("static pattern compiles"))
                .collect()
        };

        Self {
            financial: compile(FINANCIAL_KEYWORDS),
            medical: compile(MEDICAL_KEYWORDS),
            destructive: compile(DESTRUCTIVE_KEYWORDS),
            legal: compile(LEGAL_KEYWORDS),
            approval: compile(APPROVAL_PATTERNS),
            information: compile(INFORMATION_PATTERNS),
            numbered_list: Regex::new(r"(?s)\d+\.\s+\w+.*\d+\.\s+\w+").expect("static pattern compiles"),
            bulleted_list: Regex::new(r"(?s)[•\-\*]\s+\w+.*[•\-\*]\s+\w+").expect("static pattern compiles"),
            either_or: Regex::new(r"(?i)\w+\s+or\s+\w+").expect("static pattern compiles"),
            plan_steps: Regex::new(r"(?i)(\d+)\s+steps?").expect("static pattern compiles"),
            api_calls: Regex::new(r"(?i)(\d+)\s+api\s+calls?").expect("static pattern compiles"),
            amount: Regex::new(r"\$\s*([0-9,]+(?:\.\d{2})?)").expect("static pattern compiles"),
            numbered_item: Regex::new(r"\d+\.\s+([^\n\r]+)").expect("static pattern compiles"),
            bulleted_item: Regex::new(r"[•\-\*]\s+([^\n\r]+)").expect("static pattern compiles"),
        }
    }

    /// Classify a question. Checks run in fixed priority order; the first
    /// matching category wins.
    pub fn classify(&self, text: &str) -> Classification {
        if self.matches_any(&self.medical, text) {
            return self.classify_medical();
        }
        if self.matches_any(&self.financial, text) {
            return self.classify_financial(text);
        }
        if self.matches_any(&self.legal, text) {
            return self.classify_legal();
        }
        if self.matches_any(&self.destructive, text) {
            return self.classify_destructive();
        }
        if self.matches_any(&self.approval, text) {
            return self.classify_approval(text);
        }
        if self.matches_any(&self.information, text) {
            return self.classify_information(text);
        }
        if self.is_choice(text) {
            return self.classify_choice(text);
        }
        self.classify_open_ended()
    }

    fn matches_any(&self, patterns: &[Regex], text: &str) -> bool {
        patterns.iter().any(|p| p.is_match(text))
    }

    fn is_choice(&self, text: &str) -> bool {
        self.numbered_list.is_match(text) || self.bulleted_list.is_match(text) || self.either_or.is_match(text)
    }

    fn classify_medical(&self) -> Classification {
        Classification {
            question_type: QuestionType::Confirmation,
            risk: RiskLevel::Critical,
            timeout_ms: None,
            default_action: None,
            require_explicit: true,
            suggested_actions: vec![
                "I understand and want to continue".to_string(),
                "Cancel this request".to_string(),
            ],
            disclaimer: Some(
                "MEDICAL DISCLAIMER: This is AI-generated information only. Always consult with a licensed \
                 medical professional before making any health-related decisions."
                    .to_string(),
            ),
            amount: None,
            domain: Some("medical".to_string()),
        }
    }

    fn classify_financial(&self, text: &str) -> Classification {
        let amount = self.extract_amount(text);

        let (risk, timeout_ms, require_explicit, disclaimer) = match amount {
            Some(a) if a >= 1000.0 => (
                RiskLevel::Critical,
                None,
                true,
                Some(format!(
                    "FINANCIAL DECISION: This involves ${:.2}. Please review carefully.",
                    a
                )),
            ),
            Some(a) if a >= 100.0 => (RiskLevel::High, None, true, None),
            _ => (RiskLevel::Medium, Some(TIMEOUT_LONG_MS), false, None),
        };

        Classification {
            question_type: QuestionType::Approval,
            risk,
            timeout_ms,
            default_action: Some(DefaultAction::Cancel),
            require_explicit,
            suggested_actions: vec!["Approve".to_string(), "Cancel".to_string(), "Tell me more".to_string()],
            disclaimer,
            amount,
            domain: Some("financial".to_string()),
        }
    }

    fn classify_legal(&self) -> Classification {
        Classification {
            question_type: QuestionType::Confirmation,
            risk: RiskLevel::Critical,
            timeout_ms: None,
            default_action: None,
            require_explicit: true,
            suggested_actions: vec![
                "I understand and proceed".to_string(),
                "Cancel".to_string(),
                "Consult attorney".to_string(),
            ],
            disclaimer: Some(
                "LEGAL MATTER: This involves legal considerations. Consider consulting with a licensed attorney."
                    .to_string(),
            ),
            amount: None,
            domain: Some("legal".to_string()),
        }
    }

    fn classify_destructive(&self) -> Classification {
        Classification {
            question_type: QuestionType::Confirmation,
            risk: RiskLevel::High,
            timeout_ms: None,
            default_action: None,
            require_explicit: true,
            suggested_actions: vec!["Yes, I'm sure".to_string(), "No, cancel".to_string()],
            disclaimer: Some("This action may be irreversible. Please confirm.".to_string()),
            amount: None,
            domain: None,
        }
    }

    fn classify_approval(&self, text: &str) -> Classification {
        let mentions_plan = self.plan_steps.is_match(text) || self.api_calls.is_match(text);

        if mentions_plan {
            // Plan execution approval
            Classification {
                question_type: QuestionType::Approval,
                risk: RiskLevel::Medium,
                timeout_ms: Some(TIMEOUT_LONG_MS),
                default_action: Some(DefaultAction::Cancel),
                require_explicit: false,
                suggested_actions: vec![
                    "Yes, proceed".to_string(),
                    "No, cancel".to_string(),
                    "Modify plan".to_string(),
                ],
                disclaimer: None,
                amount: None,
                domain: None,
            }
        } else {
            Classification {
                question_type: QuestionType::Approval,
                risk: RiskLevel::Low,
                timeout_ms: Some(TIMEOUT_DEFAULT_MS),
                default_action: Some(DefaultAction::Yes),
                require_explicit: false,
                suggested_actions: vec!["Yes".to_string(), "No".to_string()],
                disclaimer: None,
                amount: None,
                domain: None,
            }
        }
    }

    fn classify_information(&self, text: &str) -> Classification {
        let lower = text.to_lowercase();
        let input_kind = if lower.contains("date") || lower.contains("when") {
            "date"
        } else if lower.contains("how many") || lower.contains("how much") {
            "number"
        } else {
            "text"
        };

        Classification {
            question_type: QuestionType::Information,
            risk: RiskLevel::Low,
            timeout_ms: Some(TIMEOUT_SHORT_MS),
            default_action: Some(DefaultAction::Skip),
            require_explicit: false,
            suggested_actions: vec!["Submit".to_string(), "Skip".to_string()],
            disclaimer: None,
            amount: None,
            domain: Some(input_kind.to_string()),
        }
    }

    fn classify_choice(&self, text: &str) -> Classification {
        let choices = self.extract_choices(text);

        Classification {
            question_type: QuestionType::Choice,
            risk: RiskLevel::Low,
            timeout_ms: Some(TIMEOUT_DEFAULT_MS),
            default_action: Some(DefaultAction::First),
            require_explicit: false,
            suggested_actions: if choices.is_empty() {
                vec!["Option 1".to_string(), "Option 2".to_string(), "Other".to_string()]
            } else {
                choices
            },
            disclaimer: None,
            amount: None,
            domain: None,
        }
    }

    fn classify_open_ended(&self) -> Classification {
        Classification {
            question_type: QuestionType::OpenEnded,
            risk: RiskLevel::Medium,
            timeout_ms: Some(TIMEOUT_LONG_MS),
            default_action: Some(DefaultAction::Skip),
            require_explicit: false,
            suggested_actions: vec!["Submit".to_string(), "Skip".to_string()],
            disclaimer: None,
            amount: None,
            domain: None,
        }
    }

    /// Extract a dollar amount from text ("$1,500.00" -> 1500.0)
    fn extract_amount(&self, text: &str) -> Option<f64> {
        let captures = self.amount.captures(text)?;
        captures.get(1)?.as_str().replace(',', "").parse().ok()
    }

    /// Extract up to 5 choices from numbered/bulleted lists or "X or Y"
    fn extract_choices(&self, text: &str) -> Vec<String> {
        let numbered: Vec<String> = self
            .numbered_item
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
            .take(5)
            .collect();
        if !numbered.is_empty() {
            return numbered;
        }

        let bulleted: Vec<String> = self
            .bulleted_item
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
            .take(5)
            .collect();
        if !bulleted.is_empty() {
            return bulleted;
        }

        Vec::new()
    }
}
