use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::kernel::contracts::CorrectionFeedback;
use crate::retrieval::EvidenceBundle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Upstream intent label. Set once before the turn starts, read-only afterwards.
/// Wire labels match the classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentTag {
    #[serde(rename = "greet")]
    Greet,
    #[serde(rename = "investment_related_question")]
    TopicQuestion,
    #[serde(rename = "general_question")]
    GeneralQuestion,
    #[serde(rename = "out_of_scope")]
    OutOfScope,
}

impl IntentTag {
    pub fn as_label(&self) -> &'static str {
        match self {
            IntentTag::Greet => "greet",
            IntentTag::TopicQuestion => "investment_related_question",
            IntentTag::GeneralQuestion => "general_question",
            IntentTag::OutOfScope => "out_of_scope",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "greet" => Some(IntentTag::Greet),
            "investment_related_question" | "topic_question" => Some(IntentTag::TopicQuestion),
            "general_question" => Some(IntentTag::GeneralQuestion),
            "out_of_scope" => Some(IntentTag::OutOfScope),
            _ => None,
        }
    }

    /// Only topic questions must be answered from retrieved evidence.
    pub fn requires_grounding(&self) -> bool {
        matches!(self, IntentTag::TopicQuestion)
    }
}

/// Controller states. Logged on every transition, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    Generating,
    Validating,
    Retrying,
    Accepted,
    Escalated,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnPhase::Generating => "generating",
            TurnPhase::Validating => "validating",
            TurnPhase::Retrying => "retrying",
            TurnPhase::Accepted => "accepted",
            TurnPhase::Escalated => "escalated",
        }
    }
}

/// One user message travelling through the retry loop.
///
/// Turn-scoped: owned by a single controller invocation and dropped when it concludes.
/// Nothing here is shared between turns.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub id: TurnId,
    user_query: String,
    intent: IntentTag,
    attempt: u32,
    prior_feedback: Option<CorrectionFeedback>,
    /// Bundle used by the most recent attempt. Offered to the next attempt for reuse.
    evidence: Option<EvidenceBundle>,
    /// Every rejection of this turn, oldest first. Audit only: the Responder sees
    /// `prior_feedback` and nothing else.
    feedback_history: Vec<CorrectionFeedback>,
}

impl ConversationTurn {
    pub fn new(user_query: impl Into<String>, intent: IntentTag) -> Self {
        Self {
            id: TurnId::new(),
            user_query: user_query.into(),
            intent,
            attempt: 0,
            prior_feedback: None,
            evidence: None,
            feedback_history: Vec::new(),
        }
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    pub fn intent(&self) -> IntentTag {
        self.intent
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn prior_feedback(&self) -> Option<&CorrectionFeedback> {
        self.prior_feedback.as_ref()
    }

    pub fn evidence(&self) -> Option<&EvidenceBundle> {
        self.evidence.as_ref()
    }

    pub fn feedback_history(&self) -> &[CorrectionFeedback] {
        &self.feedback_history
    }

    /// True when a rejection now exhausts the budget.
    pub fn is_final_attempt(&self, max_attempts: u32) -> bool {
        self.attempt + 1 >= max_attempts
    }

    pub(crate) fn set_evidence(&mut self, evidence: Option<EvidenceBundle>) {
        self.evidence = evidence;
    }

    /// Logs a rejection without moving to the next attempt.
    pub(crate) fn record_rejection(&mut self, feedback: CorrectionFeedback) {
        self.feedback_history.push(feedback);
    }

    /// Moves to the next attempt. The latest rejection replaces any older feedback.
    pub(crate) fn advance(&mut self) {
        self.attempt += 1;
        self.prior_feedback = self.feedback_history.last().cloned();
    }
}
