use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::kernel::error::RetrievalError;
use crate::retrieval::store::KnowledgeSearch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceStatus {
    /// Search ran. Items may still be empty.
    Retrieved,
    /// The Responder answered without searching.
    NotRequested,
    /// Transport or backend failure. Valid grounding only for an "unavailable" answer.
    Unavailable,
}

/// Result of one retrieval call. Immutable once built: a new fetch makes a new bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    query: String,
    items: Vec<String>,
    status: EvidenceStatus,
}

impl EvidenceBundle {
    pub fn retrieved(query: impl Into<String>, items: Vec<String>) -> Self {
        Self { query: query.into(), items, status: EvidenceStatus::Retrieved }
    }

    pub fn unavailable(query: impl Into<String>) -> Self {
        Self { query: query.into(), items: Vec::new(), status: EvidenceStatus::Unavailable }
    }

    pub fn not_requested(query: impl Into<String>) -> Self {
        Self { query: query.into(), items: Vec::new(), status: EvidenceStatus::NotRequested }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn status(&self) -> EvidenceStatus {
        self.status
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_unavailable(&self) -> bool {
        self.status == EvidenceStatus::Unavailable
    }
}

/// Wraps the retrieval service. Never fails: errors and timeouts become `Unavailable` bundles.
#[derive(Clone)]
pub struct EvidenceFetcher {
    backend: Arc<dyn KnowledgeSearch>,
    limit: usize,
    timeout: Duration,
}

impl EvidenceFetcher {
    pub fn new(backend: Arc<dyn KnowledgeSearch>, limit: usize, timeout: Duration) -> Self {
        Self { backend, limit, timeout }
    }

    pub async fn fetch(&self, query: &str) -> EvidenceBundle {
        let result = match tokio::time::timeout(self.timeout, self.backend.search(query, self.limit)).await {
            Ok(r) => r,
            Err(_) => Err(RetrievalError::Timeout(self.timeout)),
        };

        match result {
            Ok(mut items) => {
                items.truncate(self.limit);
                debug!(items = items.len(), "Evidence retrieved");
                EvidenceBundle::retrieved(query, items)
            }
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                EvidenceBundle::unavailable(query)
            }
        }
    }

    /// Per-attempt handle given to the Responder.
    pub fn scope(&self, carried: Option<EvidenceBundle>) -> EvidenceScope<'_> {
        EvidenceScope { fetcher: self, carried, captured: None, fetches: 0 }
    }
}

/// Evidence access for one Responder attempt.
///
/// Whatever bundle the Responder last obtained here is what the Validator judges against.
pub struct EvidenceScope<'a> {
    fetcher: &'a EvidenceFetcher,
    carried: Option<EvidenceBundle>,
    captured: Option<EvidenceBundle>,
    fetches: u32,
}

impl<'a> EvidenceScope<'a> {
    /// Reuses a bundle for the same query when one was retrieved, otherwise hits the backend.
    pub async fn fetch(&mut self, query: &str) -> EvidenceBundle {
        let reusable = |b: &EvidenceBundle| b.query == query && b.status == EvidenceStatus::Retrieved;

        if let Some(bundle) = self.captured.as_ref().filter(|b| reusable(*b)) {
            return bundle.clone();
        }

        let bundle = match self.carried.take() {
            Some(prev) if reusable(&prev) => {
                debug!("Reusing evidence from previous attempt");
                prev
            }
            other => {
                self.carried = other;
                self.fetches += 1;
                self.fetcher.fetch(query).await
            }
        };

        self.captured = Some(bundle.clone());
        bundle
    }

    /// Backend calls made through this scope.
    pub fn fetch_count(&self) -> u32 {
        self.fetches
    }

    pub fn into_captured(self) -> Option<EvidenceBundle> {
        self.captured
    }
}
