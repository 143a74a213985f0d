//! Turn kernel: the bounded generate-validate-retry loop and everything it enforces.
//!
//! The controller owns no shared mutable state. Everything a turn needs lives in its
//! `ConversationTurn`, which is created when the turn starts and dropped when it ends.

pub mod cancel;
pub mod config;
pub mod contracts;
pub mod controller;
pub mod error;
pub mod fallback;
pub mod steps;
pub mod telemetry;
pub mod turn;
