//! A running generated model and typed access to its parameters and signals.
//!
//! A [`ModelSession`] owns an [`crate::mapping::ExecutionContract`] and walks the
//! lifecycle Uninitialized → Ready ⇄ Stepping → Terminated, re-entering Ready through
//! [`ModelSession::reset`].
//! Every reset rediscovers the model hierarchy and drops all cached lookups.
//!
//! The session is single threaded: every lookup mutates its caches, and generated
//! models usually keep their state in process-wide globals.

mod config;
mod runtime;

#[cfg(test)]
mod tests;

pub use config::{SessionConfig, Traversal, DEFAULT_MODEL_NAME};
pub use runtime::{ModelSession, SessionState};
