use serde::{Deserialize, Serialize};

use crate::kernel::contracts::CorrectionFeedback;
use crate::kernel::error::CallError;
use crate::kernel::turn::{IntentTag, TurnId};
use crate::retrieval::{EvidenceBundle, EvidenceStatus};

// Allowed: IDs, attempt numbers, verdict flags, counts, search queries, validator feedback
// Forbidden: evidence item text, candidate response text

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    TurnStarted {
        turn_id: TurnId,
        intent: IntentTag,
        max_attempts: u32,
    },

    AttemptJudged {
        turn_id: TurnId,
        attempt: u32,
        result: AttemptResult,
        traceability_ok: bool,
        consistency_ok: bool,
        /// Recorded for review only. It never drives a transition.
        should_escalate: bool,
        evidence: EvidenceSummary,
        feedback: Option<String>,
    },

    TurnAccepted {
        turn_id: TurnId,
        attempt: u32,
        /// Evidence the accepted answer was judged against.
        evidence: EvidenceSummary,
    },

    TurnEscalated(EscalationRecord),

    TurnCancelled {
        turn_id: TurnId,
        attempt: u32,
    },
}

impl AuditEvent {
    pub fn turn_id(&self) -> TurnId {
        match self {
            AuditEvent::TurnStarted { turn_id, .. }
            | AuditEvent::AttemptJudged { turn_id, .. }
            | AuditEvent::TurnAccepted { turn_id, .. }
            | AuditEvent::TurnCancelled { turn_id, .. } => *turn_id,
            AuditEvent::TurnEscalated(record) => record.turn_id,
        }
    }

    pub fn attempt_judged(
        turn_id: TurnId,
        attempt: u32,
        result: AttemptResult,
        feedback: &CorrectionFeedback,
        evidence: Option<&EvidenceBundle>,
    ) -> Self {
        AuditEvent::AttemptJudged {
            turn_id,
            attempt,
            result,
            traceability_ok: feedback.traceability_ok,
            consistency_ok: feedback.consistency_ok,
            should_escalate: feedback.should_escalate,
            evidence: evidence.map(EvidenceSummary::from).unwrap_or_default(),
            feedback: if feedback.is_valid { None } else { Some(feedback.message.clone()) },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptResult {
    Valid,
    Rejected,
    /// Validator skipped.
    ResponderFailed(CallFailure),
    ValidatorFailed(CallFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallFailure {
    Schema,
    Timeout,
    Backend,
}

impl From<&CallError> for CallFailure {
    fn from(err: &CallError) -> Self {
        match err {
            CallError::Schema(_) => CallFailure::Schema, // Detail STRIPPED
            CallError::Timeout(_) => CallFailure::Timeout,
            CallError::Backend(_) => CallFailure::Backend,
        }
    }
}

/// The search query may differ from the user query when the Responder refined it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub query: String,
    pub status: EvidenceStatus,
    pub items: usize,
}

impl Default for EvidenceSummary {
    fn default() -> Self {
        Self { query: String::new(), status: EvidenceStatus::NotRequested, items: 0 }
    }
}

impl From<&EvidenceBundle> for EvidenceSummary {
    fn from(bundle: &EvidenceBundle) -> Self {
        Self {
            query: bundle.query().to_string(),
            status: bundle.status(),
            items: bundle.items().len(), // Content STRIPPED
        }
    }
}

/// Emitted once per escalated turn for compliance review. Never returned to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub turn_id: TurnId,
    pub user_query: String,
    pub attempts: u32,
    pub last_feedback: String,
    /// One message per rejected attempt, oldest first.
    pub feedback_history: Vec<String>,
    /// Evidence held by the turn when it ran out of attempts.
    pub evidence: EvidenceSummary,
}
