pub mod kernel;
pub mod retrieval;
pub mod services;

// Re-export specific items if needed for convenient access
pub use kernel::controller::RetryController;
pub use kernel::contracts::{CandidateResponse, CorrectionFeedback, RetryOutcome};
pub use kernel::turn::IntentTag;
