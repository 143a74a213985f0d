use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::kernel::error::RetrievalError;
use crate::retrieval::store::KnowledgeSearch;

/// Remote search service: `POST {endpoint}/search`.
#[derive(Clone)]
pub struct HttpKnowledgeSearch {
    client: Client,
    endpoint: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    content: String,
}

impl HttpKnowledgeSearch {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout) // Network-level backstop, the fetcher enforces its own
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl KnowledgeSearch for HttpKnowledgeSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, RetrievalError> {
        let response = self
            .client
            .post(format!("{}/search", self.endpoint))
            .json(&SearchRequest { query, limit })
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Unavailable(format!("search server error: {}", response.status())));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Unavailable(format!("bad search response: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .map(|hit| hit.content)
            .filter(|c| !c.trim().is_empty())
            .take(limit)
            .collect())
    }
}
