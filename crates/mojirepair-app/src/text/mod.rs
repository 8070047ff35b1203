//! Text utilities kept pure for reuse across services.
//!
//! Functions and types exposed here must remain side-effect free so they can
//! be composed from the repair orchestrator without introducing hidden IO or
//! mutable state.

pub mod corrections;

pub use corrections::{CorrectionMap, CorrectionRule, has_residual_markers};
