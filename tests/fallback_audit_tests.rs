mod common;

use std::sync::Arc;

use common::*;
use concierge::kernel::config::ControllerConfig;
use concierge::kernel::contracts::{word_count, MAX_VOICE_WORDS};
use concierge::kernel::error::AuditError;
use concierge::kernel::fallback::FallbackHandler;
use concierge::kernel::telemetry::{AuditEvent, AuditSink, JsonlAuditSink};
use concierge::kernel::steps::{Responder, Validator};
use concierge::{IntentTag, RetryController, RetryOutcome};

struct BrokenSink;

impl AuditSink for BrokenSink {
    fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("disk full".to_string()))
    }
}

fn always_rejecting() -> (Arc<ScriptedResponder>, Arc<ScriptedValidator>) {
    let responder = ScriptedResponder::new(vec![
        ResponderStep::Grounded(GII_QUERY.to_string(), gii_answer()),
        ResponderStep::Grounded(GII_QUERY.to_string(), gii_answer()),
        ResponderStep::Grounded(GII_QUERY.to_string(), gii_answer()),
    ]);
    let validator = ScriptedValidator::verdicts(vec![
        untraceable("Sweden's rank is not in the evidence."),
        inconsistent("Text covers bonds, voice covers GII."),
        untraceable("The 2023 figure is not in the evidence."),
    ]);
    (responder, validator)
}

#[test]
fn test_fallback_response_shape() {
    let fallback = FallbackHandler::fallback_response();

    assert!(fallback.check_schema().is_ok());
    assert!(word_count(&fallback.voice_text) <= MAX_VOICE_WORDS);
    assert!(fallback.surface_in_ui);
    assert!(fallback.follow_ups.is_empty());
    assert!(fallback.voice_text.contains("specialist"));
}

#[tokio::test]
async fn test_fallback_survives_broken_audit_sink() {
    let (responder, validator) = always_rejecting();
    let responder: Arc<dyn Responder> = responder;
    let validator: Arc<dyn Validator> = validator;
    let controller = RetryController::new(
        responder,
        validator,
        Arc::new(gii_knowledge()),
        Arc::new(BrokenSink),
        ControllerConfig::default(),
    )
    .unwrap();

    let outcome = controller.process_turn(GII_QUERY, IntentTag::TopicQuestion).await;

    assert_eq!(
        outcome,
        RetryOutcome::Escalated { fallback: FallbackHandler::fallback_response(), attempts: 3 }
    );
}

#[tokio::test]
async fn test_audit_never_holds_evidence_or_response_text() {
    let (responder, validator) = always_rejecting();
    let h = harness(responder, validator, Arc::new(gii_knowledge()));

    h.controller.process_turn(GII_QUERY, IntentTag::TopicQuestion).await;

    let dump = serde_json::to_string(&h.audit.events()).unwrap();
    assert!(!dump.contains("Sweden and the United States follow"), "Evidence text leaked");
    assert!(!dump.contains(&gii_answer().voice_text), "Candidate text leaked");
    assert!(dump.contains("turn_escalated"));
}

#[tokio::test]
async fn test_snapshot_counts() {
    let audit_h = {
        let (responder, validator) = always_rejecting();
        harness(responder, validator, Arc::new(gii_knowledge()))
    };
    audit_h.controller.process_turn(GII_QUERY, IntentTag::TopicQuestion).await;

    let snap = audit_h.audit.snapshot();
    assert_eq!(snap.turn_stats.started, 1);
    assert_eq!(snap.turn_stats.escalated, 1);
    assert_eq!(snap.turn_stats.accepted, 0);
    assert_eq!(snap.attempt_stats.judged, 3);
    assert_eq!(snap.attempt_stats.rejected, 3);
    assert_eq!(snap.turn_stats.avg_attempts, 3.0);

    let responder = ScriptedResponder::new(vec![ResponderStep::Respond(gii_answer()), ResponderStep::Respond(gii_answer())]);
    let validator = ScriptedValidator::verdicts(vec![inconsistent("mismatch"), accept()]);
    let h = harness(responder, validator, Arc::new(gii_knowledge()));
    h.controller.process_turn(GII_QUERY, IntentTag::TopicQuestion).await;

    let snap = h.audit.snapshot();
    assert_eq!(snap.turn_stats.accepted, 1);
    assert_eq!(snap.turn_stats.accepted_by_attempt.get(&1), Some(&1));
    assert_eq!(snap.attempt_stats.valid, 1);
    assert_eq!(snap.turn_stats.avg_attempts, 2.0);
}

#[tokio::test]
async fn test_events_grouped_by_turn() {
    let responder = ScriptedResponder::new(vec![ResponderStep::Respond(gii_answer()), ResponderStep::Respond(gii_answer())]);
    let validator = ScriptedValidator::verdicts(vec![accept(), accept()]);
    let h = harness(responder, validator, Arc::new(gii_knowledge()));

    h.controller.process_turn(GII_QUERY, IntentTag::TopicQuestion).await;
    h.controller.process_turn("Hello", IntentTag::Greet).await;

    let events = h.audit.events();
    let first_turn = events[0].turn_id();
    let per_turn = h.audit.events_for(first_turn);
    assert_eq!(per_turn.len(), 3, "started, judged, accepted");
    assert!(matches!(per_turn[0], AuditEvent::TurnStarted { intent: IntentTag::TopicQuestion, .. }));
    assert!(matches!(per_turn[2], AuditEvent::TurnAccepted { attempt: 0, .. }));

    h.audit.clear();
    assert!(h.audit.events().is_empty());
}

#[tokio::test]
async fn test_jsonl_sink_appends_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let sink = Arc::new(JsonlAuditSink::open(&path).unwrap());

    let (responder, validator) = always_rejecting();
    let responder: Arc<dyn Responder> = responder;
    let validator: Arc<dyn Validator> = validator;
    let controller = RetryController::new(
        responder,
        validator,
        Arc::new(gii_knowledge()),
        sink,
        ControllerConfig::default(),
    )
    .unwrap();
    controller.process_turn(GII_QUERY, IntentTag::TopicQuestion).await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    // started + 3 judged + escalated
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["kind"], "turn_started");
    assert!(lines[0]["recorded_at"].is_string());
    assert_eq!(lines[4]["kind"], "turn_escalated");
    assert_eq!(lines[4]["attempts"], 3);
    assert_eq!(lines[4]["feedback_history"].as_array().map(|a| a.len()), Some(3));
}
