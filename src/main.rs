use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use concierge::kernel::cancel::CancellationRegistry;
use concierge::kernel::config::ControllerConfig;
use concierge::kernel::telemetry::{AuditSink, JsonlAuditSink, TracingAuditSink};
use concierge::retrieval::{HttpKnowledgeSearch, InMemoryKnowledgeBase, KnowledgeSearch};
use concierge::services::llm::{IntentClassifier, LlmConfig, LlmIntentClassifier, LlmResponder, LlmService, LlmValidator};
use concierge::{IntentTag, RetryController, RetryOutcome};

const SESSION: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    tracing::info!("Concierge Booting...");

    // 2. Configuration
    let config = ControllerConfig::from_env().context("invalid controller configuration")?;
    let llm = LlmService::new(LlmConfig::from_env());
    tracing::info!(model = %llm.config().model, endpoint = %llm.config().endpoint, "LLM backend configured");

    // 3. Knowledge Base
    let knowledge: Arc<dyn KnowledgeSearch> = match std::env::var("CONCIERGE_SEARCH_ENDPOINT") {
        Ok(endpoint) => Arc::new(HttpKnowledgeSearch::new(endpoint, config.retrieval_timeout)),
        Err(_) => {
            let dir = PathBuf::from(std::env::var("CONCIERGE_DOCS_DIR").unwrap_or_else(|_| "documents".to_string()));
            let mut kb = InMemoryKnowledgeBase::new();
            if let Err(e) = kb.ingest_dir(&dir) {
                tracing::warn!("No documents ingested from {}: {}", dir.display(), e);
            }
            Arc::new(kb)
        }
    };

    // 4. Audit Sink
    let audit: Arc<dyn AuditSink> = match std::env::var("CONCIERGE_AUDIT_PATH") {
        Ok(path) => Arc::new(JsonlAuditSink::open(&PathBuf::from(path)).context("opening audit log")?),
        Err(_) => Arc::new(TracingAuditSink),
    };

    let controller = RetryController::new(
        Arc::new(LlmResponder::new(llm.clone())),
        Arc::new(LlmValidator::new(llm.clone())),
        knowledge,
        audit,
        config,
    )?;
    let classifier = LlmIntentClassifier::new(llm);

    let registry = Arc::new(CancellationRegistry::new());
    let shutdown = registry.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            shutdown.shutdown();
        }
    });

    // 5. Console Loop
    println!("Ask a question about our research. Ctrl+D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            biased;
            _ = registry.shutdown_requested() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if registry.is_shut_down() {
            break;
        }

        let intent = match classifier.classify(query).await {
            Ok(tag) => tag,
            Err(e) => {
                tracing::warn!("Intent classification failed, treating as general question: {}", e);
                IntentTag::GeneralQuestion
            }
        };

        let token = registry.register(SESSION);
        match controller.process_turn_cancellable(query, intent, &token).await {
            Ok(outcome) => render(&outcome),
            Err(e) => {
                tracing::info!("{}", e);
                break;
            }
        }
    }

    registry.release(SESSION);
    tracing::info!("Concierge stopped.");
    Ok(())
}

fn render(outcome: &RetryOutcome) {
    let response = outcome.response();
    println!("\n[VOICE] {}", response.voice_text);
    if response.surface_in_ui {
        println!("\n{}", response.display_text);
    }
    for question in &response.follow_ups {
        println!("  -> {}", question);
    }
    println!();
}
