use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Hands out one cancellation token per session.
///
/// Tokens are children of a root token, so `shutdown` reaches every session.
/// Only the token map is shared: turn state itself never leaves the controller.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    root: CancellationToken,
    sessions: Mutex<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for `session`. A session that was cancelled gets a fresh token on its next turn.
    pub fn register(&self, session: &str) -> CancellationToken {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let token = sessions
            .entry(session.to_string())
            .or_insert_with(|| self.root.child_token());
        if token.is_cancelled() && !self.root.is_cancelled() {
            *token = self.root.child_token();
        }
        token.clone()
    }

    /// User disconnected: stop the session's in-flight turn at its next state boundary.
    pub fn cancel(&self, session: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.remove(session) {
            Some(token) => {
                debug!(session, "Session cancelled");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Session ended normally.
    pub fn release(&self, session: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session);
    }

    pub fn active_sessions(&self) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Resolves once `shutdown` has been called.
    pub async fn shutdown_requested(&self) {
        self.root.cancelled().await
    }

    pub fn shutdown(&self) {
        self.root.cancel();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.clear();
    }
}
