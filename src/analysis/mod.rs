//! URL analysis orchestration.
//!
//! [`RequestOrchestrator`] decides per URL whether to reuse a stored
//! analysis or request a fresh one; [`sequence`] guards displayed state
//! against stale responses.

pub mod orchestrator;
pub mod sequence;

pub use orchestrator::{dedup_key, RequestOrchestrator};
pub use sequence::Latest;
