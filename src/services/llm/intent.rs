use async_trait::async_trait;
use tracing::debug;

use super::client::LlmService;
use super::prompts::intent_system_prompt;
use crate::kernel::error::CallError;
use crate::kernel::turn::IntentTag;

/// Single-shot message categoriser run before a turn starts.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, message: &str) -> Result<IntentTag, CallError>;
}

pub struct LlmIntentClassifier {
    service: LlmService,
    system_prompt: String,
}

impl LlmIntentClassifier {
    pub fn new(service: LlmService) -> Self {
        Self { service, system_prompt: intent_system_prompt() }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, message: &str) -> Result<IntentTag, CallError> {
        let raw = self.service.complete_json(&self.system_prompt, message).await?;
        let label = raw
            .get("intent")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CallError::Schema("missing field `intent`".to_string()))?;
        let tag = IntentTag::from_label(label)
            .ok_or_else(|| CallError::Schema(format!("unknown intent label {:?}", label)))?;
        debug!(intent = tag.as_label(), "Message classified");
        Ok(tag)
    }
}
