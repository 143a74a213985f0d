use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::event::AuditEvent;
use super::metrics::{compute_snapshot, AuditSnapshot};
use crate::kernel::error::AuditError;
use crate::kernel::turn::TurnId;

const MAX_EVENTS: usize = 10_000;

/// Destination of audit events. Shared by all turns, so implementations synchronise internally.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Bounded ring buffer. Oldest events are dropped first.
#[derive(Debug)]
pub struct InMemoryAuditLog {
    buffer: Mutex<VecDeque<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(1024)),
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.iter().cloned().collect()
    }

    pub fn events_for(&self, turn_id: TurnId) -> Vec<AuditEvent> {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.iter().filter(|e| e.turn_id() == turn_id).cloned().collect()
    }

    pub fn snapshot(&self) -> AuditSnapshot {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        compute_snapshot(&buffer)
    }

    pub fn clear(&self) {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.clear();
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| AuditError::Unavailable("audit buffer poisoned".to_string()))?;
        if buffer.len() >= MAX_EVENTS {
            buffer.pop_front();
        }
        buffer.push_back(event.clone());
        Ok(())
    }
}

/// Emits events on the `audit` tracing target. Default sink of the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let payload = serde_json::to_string(event)?;
        info!(target: "audit", turn_id = %event.turn_id(), "{}", payload);
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonlLine<'a> {
    recorded_at: chrono::DateTime<Utc>,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

/// Appends one JSON object per line.
#[derive(Debug)]
pub struct JsonlAuditSink {
    file: Mutex<File>,
}

impl JsonlAuditSink {
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(&JsonlLine { recorded_at: Utc::now(), event })?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|_| AuditError::Unavailable("audit file poisoned".to_string()))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
