//! The retry controller: a bounded generate-validate-retry state machine.
//!
//! ```text
//! Generating -> Validating -> Accepted
//!     ^             |
//!     |             +------> Retrying --+
//!     |             |                   |
//!     +-------------|-------------------+
//!                   +------> Escalated  (attempt == max_attempts - 1)
//! ```
//!
//! A Responder failure (schema, timeout, backend) skips Validating and is decided as a rejection.
//!
//! **KERNEL LAW**: given the same query, intent and the same sequence of step answers, the
//! controller takes the same transitions and returns the same outcome. It holds no state
//! between turns; everything turn-scoped lives in `ConversationTurn`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::kernel::config::ControllerConfig;
use crate::kernel::contracts::{
    CandidateResponse, CorrectionFeedback, ResponderInput, RetryOutcome, ValidationContext,
};
use crate::kernel::error::{CallError, ConfigError, TurnError};
use crate::kernel::fallback::FallbackHandler;
use crate::kernel::steps::{Responder, Validator};
use crate::kernel::telemetry::{AttemptResult, AuditEvent, AuditSink, CallFailure, EvidenceSummary};
use crate::kernel::turn::{ConversationTurn, IntentTag, TurnPhase};
use crate::retrieval::{EvidenceBundle, EvidenceFetcher, KnowledgeSearch};

enum Phase {
    Generating,
    Validating {
        candidate: CandidateResponse,
        evidence: EvidenceBundle,
    },
    Retrying,
    Accepted(CandidateResponse),
    Escalated,
}

impl Phase {
    fn kind(&self) -> TurnPhase {
        match self {
            Phase::Generating => TurnPhase::Generating,
            Phase::Validating { .. } => TurnPhase::Validating,
            Phase::Retrying => TurnPhase::Retrying,
            Phase::Accepted(_) => TurnPhase::Accepted,
            Phase::Escalated => TurnPhase::Escalated,
        }
    }
}

/// What one Responder call produced, plus the evidence it captured on the way.
struct Generated {
    result: Result<CandidateResponse, CallError>,
    evidence: Option<EvidenceBundle>,
}

pub struct RetryController {
    responder: Arc<dyn Responder>,
    validator: Arc<dyn Validator>,
    fetcher: EvidenceFetcher,
    fallback: FallbackHandler,
    audit: Arc<dyn AuditSink>,
    config: ControllerConfig,
}

impl RetryController {
    pub fn new(
        responder: Arc<dyn Responder>,
        validator: Arc<dyn Validator>,
        knowledge: Arc<dyn KnowledgeSearch>,
        audit: Arc<dyn AuditSink>,
        config: ControllerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            responder,
            validator,
            fetcher: EvidenceFetcher::new(knowledge, config.retrieval_limit, config.retrieval_timeout),
            fallback: FallbackHandler::new(audit.clone()),
            audit,
            config,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Runs one turn to completion. Always yields a response for the user.
    pub async fn process_turn(&self, user_query: &str, intent: IntentTag) -> RetryOutcome {
        let token = CancellationToken::new();
        match self.process_turn_cancellable(user_query, intent, &token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Nobody else holds the token, so this is never hit. Stay on the safe side anyway.
                warn!("Uncancellable turn reported cancellation: {}", e);
                RetryOutcome::Escalated { fallback: FallbackHandler::fallback_response(), attempts: 0 }
            }
        }
    }

    /// Like `process_turn`, but stops at the next state boundary once `cancel` fires.
    /// A cancelled turn owes no response and never reaches the fallback.
    pub async fn process_turn_cancellable(
        &self,
        user_query: &str,
        intent: IntentTag,
        cancel: &CancellationToken,
    ) -> Result<RetryOutcome, TurnError> {
        let mut turn = ConversationTurn::new(user_query, intent);
        info!(turn_id = %turn.id, intent = intent.as_label(), "Turn started");
        self.record(AuditEvent::TurnStarted {
            turn_id: turn.id,
            intent,
            max_attempts: self.config.max_attempts,
        });

        let result = self.drive(&mut turn, cancel).await;

        if let Err(TurnError::Cancelled { turn_id, attempt }) = &result {
            info!(turn_id = %turn_id, attempt, "Turn cancelled");
            self.record(AuditEvent::TurnCancelled { turn_id: *turn_id, attempt: *attempt });
        }
        result
    }

    async fn drive(&self, turn: &mut ConversationTurn, cancel: &CancellationToken) -> Result<RetryOutcome, TurnError> {
        let mut phase = Phase::Generating;

        loop {
            if cancel.is_cancelled() {
                return Err(Self::cancelled(turn));
            }
            debug!(turn_id = %turn.id, attempt = turn.attempt(), phase = phase.kind().as_str(), "Transition");

            phase = match phase {
                Phase::Generating => {
                    let generated = self.generate(turn, cancel).await?;
                    match generated.result {
                        Ok(candidate) => Phase::Validating {
                            candidate,
                            evidence: generated
                                .evidence
                                .unwrap_or_else(|| EvidenceBundle::not_requested(turn.user_query())),
                        },
                        Err(err) => {
                            warn!(turn_id = %turn.id, attempt = turn.attempt(), "Responder failed: {}", err);
                            let feedback = responder_feedback(&err);
                            self.record(AuditEvent::attempt_judged(
                                turn.id,
                                turn.attempt(),
                                AttemptResult::ResponderFailed(CallFailure::from(&err)),
                                &feedback,
                                generated.evidence.as_ref(),
                            ));
                            if generated.evidence.is_some() {
                                turn.set_evidence(generated.evidence);
                            }
                            self.reject(turn, feedback)
                        }
                    }
                }

                Phase::Validating { candidate, evidence } => {
                    let verdict = self.validate(turn, &candidate, &evidence, cancel).await?;
                    let (result, feedback) = match verdict {
                        Ok(feedback) if feedback.is_valid => (AttemptResult::Valid, feedback),
                        Ok(feedback) => (AttemptResult::Rejected, feedback),
                        Err(err) => {
                            warn!(turn_id = %turn.id, attempt = turn.attempt(), "Validator failed: {}", err);
                            (AttemptResult::ValidatorFailed(CallFailure::from(&err)), validator_feedback(&err))
                        }
                    };
                    self.record(AuditEvent::attempt_judged(turn.id, turn.attempt(), result, &feedback, Some(&evidence)));
                    turn.set_evidence(Some(evidence));

                    if result == AttemptResult::Valid {
                        Phase::Accepted(candidate)
                    } else {
                        self.reject(turn, feedback)
                    }
                }

                Phase::Retrying => {
                    turn.advance();
                    Phase::Generating
                }

                Phase::Accepted(response) => {
                    info!(turn_id = %turn.id, attempt = turn.attempt(), "Response accepted");
                    self.record(AuditEvent::TurnAccepted {
                        turn_id: turn.id,
                        attempt: turn.attempt(),
                        evidence: turn.evidence().map(EvidenceSummary::from).unwrap_or_default(),
                    });
                    return Ok(RetryOutcome::Accepted { response, attempt: turn.attempt() });
                }

                Phase::Escalated => {
                    let fallback = self.fallback.escalate(turn);
                    return Ok(RetryOutcome::Escalated { fallback, attempts: turn.attempt() + 1 });
                }
            };
        }
    }

    /// The attempt budget decides, never the Validator's own escalate flag.
    fn reject(&self, turn: &mut ConversationTurn, feedback: CorrectionFeedback) -> Phase {
        debug!(turn_id = %turn.id, attempt = turn.attempt(), "Rejected: {}", feedback.message);
        turn.record_rejection(feedback);
        if turn.is_final_attempt(self.config.max_attempts) {
            Phase::Escalated
        } else {
            Phase::Retrying
        }
    }

    async fn generate(&self, turn: &ConversationTurn, cancel: &CancellationToken) -> Result<Generated, TurnError> {
        let input = ResponderInput {
            user_query: turn.user_query().to_string(),
            intent: turn.intent(),
            prior_feedback: turn.prior_feedback().cloned(),
            evidence: turn.evidence().cloned(),
            attempt: turn.attempt(),
            max_attempts: self.config.max_attempts,
        };
        let mut scope = self.fetcher.scope(turn.evidence().cloned());

        let outcome = {
            let call = tokio::time::timeout(self.config.responder_timeout, self.responder.respond(&input, &mut scope));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = call => Some(r),
            }
        };

        let result = match outcome {
            None => return Err(Self::cancelled(turn)),
            Some(Ok(r)) => r.and_then(|candidate| candidate.check_schema().map(|_| candidate)),
            Some(Err(_)) => Err(CallError::Timeout(self.config.responder_timeout)),
        };

        Ok(Generated { result, evidence: scope.into_captured() })
    }

    async fn validate(
        &self,
        turn: &ConversationTurn,
        candidate: &CandidateResponse,
        evidence: &EvidenceBundle,
        cancel: &CancellationToken,
    ) -> Result<Result<CorrectionFeedback, CallError>, TurnError> {
        let context = ValidationContext {
            intent: turn.intent(),
            attempt: turn.attempt(),
            max_attempts: self.config.max_attempts,
        };

        let outcome = {
            let call = tokio::time::timeout(
                self.config.validator_timeout,
                self.validator.validate(candidate, evidence, &context),
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = call => Some(r),
            }
        };

        match outcome {
            None => Err(Self::cancelled(turn)),
            Some(Ok(r)) => Ok(r.and_then(|feedback| feedback.check_schema().map(|_| feedback.normalized()))),
            Some(Err(_)) => Ok(Err(CallError::Timeout(self.config.validator_timeout))),
        }
    }

    fn cancelled(turn: &ConversationTurn) -> TurnError {
        TurnError::Cancelled { turn_id: turn.id, attempt: turn.attempt() }
    }

    /// Best effort: a broken sink is logged and otherwise ignored.
    fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(&event) {
            warn!(turn_id = %event.turn_id(), "Audit record dropped: {}", e);
        }
    }
}

fn responder_feedback(err: &CallError) -> CorrectionFeedback {
    match err {
        CallError::Schema(detail) => CorrectionFeedback::malformed_output(detail),
        CallError::Timeout(_) => CorrectionFeedback::synthetic("response generation timed out"),
        CallError::Backend(detail) => CorrectionFeedback::synthetic(format!("response generation failed: {}", detail)),
    }
}

fn validator_feedback(err: &CallError) -> CorrectionFeedback {
    match err {
        CallError::Schema(_) => CorrectionFeedback::synthetic("validation output was malformed, response could not be verified"),
        CallError::Timeout(_) => CorrectionFeedback::synthetic("validation timed out, response could not be verified"),
        CallError::Backend(_) => CorrectionFeedback::synthetic("validation unavailable, response could not be verified"),
    }
}
