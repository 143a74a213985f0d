//! Data contracts between the controller and the reasoning steps.
//!
//! Wire field names follow the structured-output schemas the reasoning backend is
//! prompted with (`voice_str`, `traceability_check`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kernel::error::CallError;
use crate::kernel::turn::IntentTag;
use crate::retrieval::EvidenceBundle;

pub const MAX_VOICE_WORDS: usize = 30;
pub const MAX_FOLLOW_UPS: usize = 3;
const VOICE_MARKUP: &[char] = &['#', '*', '`', '|', '[', ']'];

/// Prefix of the synthetic feedback used when the Responder output breaks its contract.
pub const MALFORMED_OUTPUT: &str = "malformed output";

/// Structured output of the Responder.
///
/// Voice/display consistency is not structural: it is what the Validator judges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResponse {
    #[serde(rename = "voice_str")]
    pub voice_text: String,
    #[serde(rename = "text")]
    pub display_text: String,
    #[serde(rename = "send_to_ui")]
    pub surface_in_ui: bool,
    #[serde(rename = "follow_up_questions", default)]
    pub follow_ups: Vec<String>,
}

impl CandidateResponse {
    /// Builds a response and checks its schema invariants.
    pub fn new(
        voice_text: impl Into<String>,
        display_text: impl Into<String>,
        surface_in_ui: bool,
        follow_ups: Vec<String>,
    ) -> Result<Self, CallError> {
        let response = Self {
            voice_text: voice_text.into(),
            display_text: display_text.into(),
            surface_in_ui,
            follow_ups,
        };
        response.check_schema()?;
        Ok(response)
    }

    /// Parses raw backend JSON. Missing or mistyped fields are schema failures.
    pub fn from_json(value: &Value) -> Result<Self, CallError> {
        let response: Self = serde_json::from_value(value.clone())
            .map_err(|e| CallError::Schema(e.to_string()))?;
        response.check_schema()?;
        Ok(response)
    }

    pub fn check_schema(&self) -> Result<(), CallError> {
        let voice = self.voice_text.trim();
        if voice.is_empty() {
            return Err(CallError::Schema("voice_str is empty".to_string()));
        }

        let words = word_count(voice);
        if words > MAX_VOICE_WORDS {
            return Err(CallError::Schema(format!(
                "voice_str has {} words, limit is {}",
                words, MAX_VOICE_WORDS
            )));
        }

        if let Some(c) = voice.chars().find(|c| VOICE_MARKUP.contains(c)) {
            return Err(CallError::Schema(format!(
                "voice_str contains markup character {:?}",
                c
            )));
        }

        if self.follow_ups.len() > MAX_FOLLOW_UPS {
            return Err(CallError::Schema(format!(
                "{} follow-up questions, limit is {}",
                self.follow_ups.len(),
                MAX_FOLLOW_UPS
            )));
        }

        if self.follow_ups.iter().any(|q| q.trim().is_empty()) {
            return Err(CallError::Schema("blank follow-up question".to_string()));
        }

        Ok(())
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Verdict of the Validator. A fresh one is produced per attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionFeedback {
    #[serde(rename = "traceability_check")]
    pub traceability_ok: bool,
    #[serde(rename = "consistency_check")]
    pub consistency_ok: bool,
    pub is_valid: bool,
    #[serde(rename = "feedback", default)]
    pub message: String,
    #[serde(rename = "escalate", default)]
    pub should_escalate: bool,
}

impl CorrectionFeedback {
    pub fn accept() -> Self {
        Self {
            traceability_ok: true,
            consistency_ok: true,
            is_valid: true,
            message: String::new(),
            should_escalate: false,
        }
    }

    pub fn reject(traceability_ok: bool, consistency_ok: bool, message: impl Into<String>) -> Self {
        Self {
            traceability_ok,
            consistency_ok,
            is_valid: traceability_ok && consistency_ok,
            message: message.into(),
            should_escalate: false,
        }
    }

    /// Rejection produced by the controller itself when a step could not deliver a verdict.
    pub fn synthetic(message: impl Into<String>) -> Self {
        Self::reject(false, false, message)
    }

    pub fn malformed_output(detail: &str) -> Self {
        Self::synthetic(format!("{}: {}", MALFORMED_OUTPUT, detail))
    }

    pub fn from_json(value: &Value) -> Result<Self, CallError> {
        let feedback: Self = serde_json::from_value(value.clone())
            .map_err(|e| CallError::Schema(e.to_string()))?;
        feedback.check_schema()?;
        Ok(feedback.normalized())
    }

    /// A rejection always names its defect. Blank messages get the generic one for the failed checks.
    pub fn normalized(mut self) -> Self {
        if !self.is_valid && self.message.trim().is_empty() {
            self.message = self.default_message();
        }
        self
    }

    /// `is_valid` must be exactly `traceability && consistency`.
    pub fn check_schema(&self) -> Result<(), CallError> {
        let expected = self.traceability_ok && self.consistency_ok;
        if self.is_valid != expected {
            return Err(CallError::Schema(format!(
                "is_valid={} contradicts traceability_check={} and consistency_check={}",
                self.is_valid, self.traceability_ok, self.consistency_ok
            )));
        }
        Ok(())
    }

    fn default_message(&self) -> String {
        match (self.traceability_ok, self.consistency_ok) {
            (false, false) => "claims are not supported by the evidence and voice and text disagree".to_string(),
            (false, true) => "claims are not supported by the evidence".to_string(),
            (true, false) => "voice and text do not cover the same topic".to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Everything the Responder sees for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponderInput {
    pub user_query: String,
    pub intent: IntentTag,
    /// Latest rejection only. `None` on attempt 0.
    pub prior_feedback: Option<CorrectionFeedback>,
    /// Bundle used by the previous attempt, if any.
    pub evidence: Option<EvidenceBundle>,
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Context passed next to the candidate so intent-specific grounding rules can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationContext {
    pub intent: IntentTag,
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Terminal result of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    Accepted { response: CandidateResponse, attempt: u32 },
    Escalated { fallback: CandidateResponse, attempts: u32 },
}

impl RetryOutcome {
    /// The response owed to the user, whichever way the turn ended.
    pub fn response(&self) -> &CandidateResponse {
        match self {
            RetryOutcome::Accepted { response, .. } => response,
            RetryOutcome::Escalated { fallback, .. } => fallback,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, RetryOutcome::Accepted { .. })
    }
}
