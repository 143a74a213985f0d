use async_trait::async_trait;
use tracing::debug;

use super::client::LlmService;
use super::prompts::{responder_system_prompt, responder_user_prompt};
use crate::kernel::contracts::{CandidateResponse, ResponderInput};
use crate::kernel::error::CallError;
use crate::kernel::steps::Responder;
use crate::retrieval::EvidenceScope;

/// Model-backed Responder. Topic questions are always searched before the model is asked.
pub struct LlmResponder {
    service: LlmService,
    system_prompt: String,
}

impl LlmResponder {
    pub fn new(service: LlmService) -> Self {
        Self { service, system_prompt: responder_system_prompt() }
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn respond(
        &self,
        input: &ResponderInput,
        evidence: &mut EvidenceScope<'_>,
    ) -> Result<CandidateResponse, CallError> {
        let bundle = if input.intent.requires_grounding() {
            Some(evidence.fetch(&input.user_query).await)
        } else {
            None
        };

        debug!(
            attempt = input.attempt,
            evidence_items = bundle.as_ref().map(|b| b.items().len()).unwrap_or(0),
            "Generating response"
        );

        let prompt = responder_user_prompt(input, bundle.as_ref());
        let raw = self.service.complete_json(&self.system_prompt, &prompt).await?;
        CandidateResponse::from_json(&raw)
    }
}
