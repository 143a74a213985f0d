#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use concierge::kernel::config::ControllerConfig;
use concierge::kernel::contracts::{CandidateResponse, CorrectionFeedback, ResponderInput, ValidationContext};
use concierge::kernel::error::{CallError, RetrievalError};
use concierge::kernel::steps::{Responder, Validator};
use concierge::kernel::telemetry::{AuditSink, InMemoryAuditLog};
use concierge::retrieval::{EvidenceBundle, EvidenceScope, InMemoryKnowledgeBase, KnowledgeSearch};
use concierge::RetryController;

pub const GII_QUERY: &str = "GII top countries";
pub const GII_DOC: &str = "\
Switzerland ranks first in the Global Innovation Index for the thirteenth year.\n\n\
Sweden and the United States follow Switzerland among the GII top countries.\n\n\
Fixed income markets expect further rate cuts.";

pub fn gii_knowledge() -> InMemoryKnowledgeBase {
    let mut kb = InMemoryKnowledgeBase::new();
    kb.ingest("gii_2024.md", GII_DOC);
    kb
}

pub fn gii_answer() -> CandidateResponse {
    CandidateResponse {
        voice_text: "Switzerland leads the Global Innovation Index, followed by Sweden and the United States.".to_string(),
        display_text: "## GII Top Countries\n\n### 1. Switzerland\n- Ranked **first**\n\n### 2. Sweden and the United States\n- Next in the ranking".to_string(),
        surface_in_ui: true,
        follow_ups: vec!["What drives Switzerland's lead?".to_string()],
    }
}

pub fn no_information_answer() -> CandidateResponse {
    CandidateResponse {
        voice_text: "I don't have that specific information in our current document library.".to_string(),
        display_text: "No information on this topic was found in our research documents.".to_string(),
        surface_in_ui: false,
        follow_ups: vec![],
    }
}

pub fn accept() -> CorrectionFeedback {
    CorrectionFeedback::accept()
}

pub fn inconsistent(message: &str) -> CorrectionFeedback {
    CorrectionFeedback::reject(true, false, message)
}

pub fn untraceable(message: &str) -> CorrectionFeedback {
    CorrectionFeedback::reject(false, true, message)
}

pub enum ResponderStep {
    /// Answer without touching the knowledge base.
    Respond(CandidateResponse),
    /// Search `query` first, then answer.
    Grounded(String, CandidateResponse),
    /// Raw backend JSON that has to pass the schema check.
    Raw(Value),
    Fail(CallError),
    /// Never finishes.
    Hang,
}

#[derive(Default)]
pub struct ScriptedResponder {
    steps: Mutex<VecDeque<ResponderStep>>,
    inputs: Mutex<Vec<ResponderInput>>,
}

impl ScriptedResponder {
    pub fn new(steps: Vec<ResponderStep>) -> Arc<Self> {
        Arc::new(Self { steps: Mutex::new(steps.into()), inputs: Mutex::new(Vec::new()) })
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn inputs(&self) -> Vec<ResponderInput> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn respond(
        &self,
        input: &ResponderInput,
        evidence: &mut EvidenceScope<'_>,
    ) -> Result<CandidateResponse, CallError> {
        self.inputs.lock().unwrap().push(input.clone());
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            Some(ResponderStep::Respond(r)) => Ok(r),
            Some(ResponderStep::Grounded(query, r)) => {
                evidence.fetch(&query).await;
                Ok(r)
            }
            Some(ResponderStep::Raw(value)) => CandidateResponse::from_json(&value),
            Some(ResponderStep::Fail(err)) => Err(err),
            Some(ResponderStep::Hang) => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(CallError::Backend("woke up".to_string()))
            }
            None => Err(CallError::Backend("responder script exhausted".to_string())),
        }
    }
}

pub enum ValidatorStep {
    Verdict(CorrectionFeedback),
    Fail(CallError),
    Hang,
}

#[derive(Debug, Clone)]
pub struct ValidatorCall {
    pub candidate: CandidateResponse,
    pub evidence: EvidenceBundle,
    pub context: ValidationContext,
}

#[derive(Default)]
pub struct ScriptedValidator {
    steps: Mutex<VecDeque<ValidatorStep>>,
    seen: Mutex<Vec<ValidatorCall>>,
}

impl ScriptedValidator {
    pub fn new(steps: Vec<ValidatorStep>) -> Arc<Self> {
        Arc::new(Self { steps: Mutex::new(steps.into()), seen: Mutex::new(Vec::new()) })
    }

    pub fn verdicts(verdicts: Vec<CorrectionFeedback>) -> Arc<Self> {
        Self::new(verdicts.into_iter().map(ValidatorStep::Verdict).collect())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<ValidatorCall> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    async fn validate(
        &self,
        candidate: &CandidateResponse,
        evidence: &EvidenceBundle,
        context: &ValidationContext,
    ) -> Result<CorrectionFeedback, CallError> {
        self.seen.lock().unwrap().push(ValidatorCall {
            candidate: candidate.clone(),
            evidence: evidence.clone(),
            context: *context,
        });
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            Some(ValidatorStep::Verdict(fb)) => Ok(fb),
            Some(ValidatorStep::Fail(err)) => Err(err),
            Some(ValidatorStep::Hang) => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(CallError::Backend("woke up".to_string()))
            }
            None => Err(CallError::Backend("validator script exhausted".to_string())),
        }
    }
}

/// Counts backend searches.
pub struct CountingKnowledge {
    inner: InMemoryKnowledgeBase,
    searches: AtomicUsize,
}

impl CountingKnowledge {
    pub fn new(inner: InMemoryKnowledgeBase) -> Arc<Self> {
        Arc::new(Self { inner, searches: AtomicUsize::new(0) })
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeSearch for CountingKnowledge {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, RetrievalError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query, limit).await
    }
}

pub struct DownKnowledge;

#[async_trait]
impl KnowledgeSearch for DownKnowledge {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>, RetrievalError> {
        Err(RetrievalError::Unavailable("connection refused".to_string()))
    }
}

pub struct SlowKnowledge;

#[async_trait]
impl KnowledgeSearch for SlowKnowledge {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>, RetrievalError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec!["too late".to_string()])
    }
}

pub struct Harness {
    pub controller: RetryController,
    pub audit: Arc<InMemoryAuditLog>,
}

pub fn harness(
    responder: Arc<dyn Responder>,
    validator: Arc<dyn Validator>,
    knowledge: Arc<dyn KnowledgeSearch>,
) -> Harness {
    harness_with(responder, validator, knowledge, ControllerConfig::default())
}

pub fn harness_with(
    responder: Arc<dyn Responder>,
    validator: Arc<dyn Validator>,
    knowledge: Arc<dyn KnowledgeSearch>,
    config: ControllerConfig,
) -> Harness {
    let audit = Arc::new(InMemoryAuditLog::new());
    let sink: Arc<dyn AuditSink> = audit.clone();
    let controller = RetryController::new(responder, validator, knowledge, sink, config)
        .expect("valid config");
    Harness { controller, audit }
}
