use async_trait::async_trait;

use super::client::LlmService;
use super::prompts::{validator_system_prompt, validator_user_prompt};
use crate::kernel::contracts::{CandidateResponse, CorrectionFeedback, ValidationContext};
use crate::kernel::error::CallError;
use crate::kernel::steps::Validator;
use crate::retrieval::EvidenceBundle;

/// Model-backed Validator. The prompt carries the intent so grounding rules match the question type.
pub struct LlmValidator {
    service: LlmService,
}

impl LlmValidator {
    pub fn new(service: LlmService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Validator for LlmValidator {
    async fn validate(
        &self,
        candidate: &CandidateResponse,
        evidence: &EvidenceBundle,
        context: &ValidationContext,
    ) -> Result<CorrectionFeedback, CallError> {
        let system = validator_system_prompt(context.intent);
        let prompt = validator_user_prompt(candidate, evidence, context);
        let raw = self.service.complete_json(&system, &prompt).await?;
        CorrectionFeedback::from_json(&raw)
    }
}
