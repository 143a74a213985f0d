use std::collections::HashSet;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::kernel::error::RetrievalError;

/// Read-only search over the knowledge base.
/// An empty result is a normal answer, `Err` means the backend itself failed.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, RetrievalError>;
}

const INGEST_EXTENSIONS: &[&str] = &["txt", "md"];
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "about", "for", "from", "how", "in", "is", "it", "me", "of", "on",
    "or", "the", "to", "what", "which", "who", "with", "does", "do", "tell", "show",
];

#[derive(Debug, Clone)]
struct Chunk {
    source: String,
    text: String,
    terms: HashSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: Vec<String>,
}

/// Paragraph-chunked keyword index.
///
/// Built once, then shared read-only across turns. Ranking: number of distinct query
/// terms present in a chunk, ties broken by ingestion order.
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeBase {
    chunks: Vec<Chunk>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one document. Returns the number of chunks created.
    pub fn ingest(&mut self, source: &str, text: &str) -> usize {
        let before = self.chunks.len();
        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            self.chunks.push(Chunk {
                source: source.to_string(),
                text: paragraph.to_string(),
                terms: tokenize(paragraph).collect(),
            });
        }
        self.chunks.len() - before
    }

    /// Ingests every `.txt`/`.md` file under `dir`. Unreadable files are skipped and reported.
    pub fn ingest_dir(&mut self, dir: &Path) -> std::io::Result<IngestReport> {
        if !dir.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", dir.display()),
            ));
        }

        let mut report = IngestReport::default();
        let mut paths: Vec<_> = WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| INGEST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        // Stable chunk order regardless of directory iteration order.
        paths.sort();

        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match fs::read_to_string(&path) {
                Ok(text) => {
                    report.chunks += self.ingest(&name, &text);
                    report.documents += 1;
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.skipped.push(name);
                }
            }
        }

        info!(documents = report.documents, chunks = report.chunks, "Knowledge base ingested");
        Ok(report)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn sources(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for chunk in &self.chunks {
            if !seen.contains(&chunk.source.as_str()) {
                seen.push(chunk.source.as_str());
            }
        }
        seen
    }

    pub fn rank(&self, query: &str, limit: usize) -> Vec<String> {
        let query_terms: HashSet<String> = tokenize(query).collect();
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(idx, chunk)| (idx, query_terms.intersection(&chunk.terms).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // sort_by is stable, so equal scores keep ingestion order
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        scored
            .into_iter()
            .take(limit)
            .map(|(idx, _)| self.chunks[idx].text.clone())
            .collect()
    }
}

#[async_trait]
impl KnowledgeSearch for InMemoryKnowledgeBase {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(self.rank(query, limit))
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}
