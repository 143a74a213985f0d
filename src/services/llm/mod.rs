pub mod client;
pub mod intent;
pub mod prompts;
pub mod responder;
pub mod validator;

pub use client::{LlmConfig, LlmError, LlmService};
pub use intent::{IntentClassifier, LlmIntentClassifier};
pub use responder::LlmResponder;
pub use validator::LlmValidator;
