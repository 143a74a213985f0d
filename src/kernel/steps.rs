//! Capability boundary around the two reasoning steps.
//!
//! The controller only knows these two methods. Live implementations call a model,
//! tests plug in scripted ones.

use async_trait::async_trait;

use crate::kernel::contracts::{CandidateResponse, CorrectionFeedback, ResponderInput, ValidationContext};
use crate::kernel::error::CallError;
use crate::retrieval::{EvidenceBundle, EvidenceScope};

#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a candidate for this attempt.
    ///
    /// Evidence must be obtained through `evidence`: whatever it captured is what the
    /// Validator checks the candidate against.
    async fn respond(
        &self,
        input: &ResponderInput,
        evidence: &mut EvidenceScope<'_>,
    ) -> Result<CandidateResponse, CallError>;
}

#[async_trait]
pub trait Validator: Send + Sync {
    /// Judge traceability and consistency of `candidate` against exactly `evidence`.
    async fn validate(
        &self,
        candidate: &CandidateResponse,
        evidence: &EvidenceBundle,
        context: &ValidationContext,
    ) -> Result<CorrectionFeedback, CallError>;
}
