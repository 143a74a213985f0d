use std::sync::Arc;

use tracing::{error, info};

use crate::kernel::contracts::CandidateResponse;
use crate::kernel::telemetry::{AuditEvent, AuditSink, EscalationRecord, EvidenceSummary};
use crate::kernel::turn::ConversationTurn;

const FALLBACK_VOICE: &str =
    "I want to make sure you get the right answer, so let me connect you with one of our specialists.";
const FALLBACK_DISPLAY: &str = "## Connecting You With a Specialist\n\n\
I wasn't able to give you a complete answer to this question right now. \
One of our specialists can review it with you and provide the detailed guidance you need.\n\n\
Thank you for your patience.";

/// Terminal safety net once the attempt budget is spent.
///
/// Always returns the safe response, even when the audit record cannot be written.
pub struct FallbackHandler {
    audit: Arc<dyn AuditSink>,
}

impl FallbackHandler {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { audit }
    }

    /// Fixed-shape handoff response. Plain text, no markup in the voice line.
    pub fn fallback_response() -> CandidateResponse {
        CandidateResponse {
            voice_text: FALLBACK_VOICE.to_string(),
            display_text: FALLBACK_DISPLAY.to_string(),
            surface_in_ui: true,
            follow_ups: Vec::new(),
        }
    }

    pub fn escalate(&self, turn: &ConversationTurn) -> CandidateResponse {
        let history: Vec<String> = turn.feedback_history().iter().map(|f| f.message.clone()).collect();
        let record = EscalationRecord {
            turn_id: turn.id,
            user_query: turn.user_query().to_string(),
            attempts: turn.attempt() + 1,
            last_feedback: history.last().cloned().unwrap_or_default(),
            feedback_history: history,
            evidence: turn.evidence().map(EvidenceSummary::from).unwrap_or_default(),
        };

        info!(turn_id = %turn.id, attempts = record.attempts, "Turn escalated to specialist");

        if let Err(e) = self.audit.record(&AuditEvent::TurnEscalated(record)) {
            // Sink down: the user still gets the safe response.
            error!(turn_id = %turn.id, "Escalation audit record lost: {}", e);
        }

        Self::fallback_response()
    }
}
