use std::collections::{BTreeMap, VecDeque};

use super::event::{AttemptResult, AuditEvent, CallFailure};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditSnapshot {
    pub turn_stats: TurnStats,
    pub attempt_stats: AttemptStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnStats {
    pub started: u64,
    pub accepted: u64,
    pub escalated: u64,
    pub cancelled: u64,
    /// Accepted turns keyed by the attempt index that was accepted.
    pub accepted_by_attempt: BTreeMap<u32, u64>,
    /// Average Responder calls per accepted or escalated turn.
    pub avg_attempts: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptStats {
    pub judged: u64,
    pub valid: u64,
    pub rejected: u64,
    pub schema_failures: u64,
    pub timeouts: u64,
    pub backend_failures: u64,
    pub validator_skipped: u64,
}

pub fn compute_snapshot(events: &VecDeque<AuditEvent>) -> AuditSnapshot {
    let mut snap = AuditSnapshot::default();
    let mut concluded = 0u64;
    let mut total_attempts = 0u64;

    for event in events {
        match event {
            AuditEvent::TurnStarted { .. } => snap.turn_stats.started += 1,
            AuditEvent::AttemptJudged { result, .. } => {
                snap.attempt_stats.judged += 1;
                let failure = match result {
                    AttemptResult::Valid => {
                        snap.attempt_stats.valid += 1;
                        None
                    }
                    AttemptResult::Rejected => {
                        snap.attempt_stats.rejected += 1;
                        None
                    }
                    AttemptResult::ResponderFailed(f) => {
                        snap.attempt_stats.validator_skipped += 1;
                        Some(f)
                    }
                    AttemptResult::ValidatorFailed(f) => Some(f),
                };
                match failure {
                    Some(CallFailure::Schema) => snap.attempt_stats.schema_failures += 1,
                    Some(CallFailure::Timeout) => snap.attempt_stats.timeouts += 1,
                    Some(CallFailure::Backend) => snap.attempt_stats.backend_failures += 1,
                    None => {}
                }
            }
            AuditEvent::TurnAccepted { attempt, .. } => {
                snap.turn_stats.accepted += 1;
                *snap.turn_stats.accepted_by_attempt.entry(*attempt).or_insert(0) += 1;
                concluded += 1;
                total_attempts += u64::from(*attempt) + 1;
            }
            AuditEvent::TurnEscalated(record) => {
                snap.turn_stats.escalated += 1;
                concluded += 1;
                total_attempts += u64::from(record.attempts);
            }
            AuditEvent::TurnCancelled { .. } => snap.turn_stats.cancelled += 1,
        }
    }

    if concluded > 0 {
        snap.turn_stats.avg_attempts = total_attempts as f64 / concluded as f64;
    }

    snap
}
