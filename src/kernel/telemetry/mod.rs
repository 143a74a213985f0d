//! Compliance audit trail for the retry loop.
//!
//! # SAFETY INVARIANT
//! Audit is a WRITE-ONLY side channel.
//! The controller never reads it back to make a decision, and a failing sink never fails a turn.
//!
//! # PRIVACY INVARIANT
//! Audit events must **NEVER** contain raw evidence text.
//! Evidence is summarised as search query + status + item count. The user query appears
//! only in the escalation record, where compliance review needs it. None of this is shown to the end user.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::*;
pub use metrics::*;
pub use recorder::*;
