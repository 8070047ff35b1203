//! Orchestration layer for IO-bound repair services.
//!
//! Modules exposed here coordinate external systems (the record store, the
//! repair oracle, rate limiting) and must avoid embedding pure transforms.
//! Keep stateless helpers in `crate::text` so the network-facing pieces stay
//! small and swappable behind their traits.

pub mod context;
pub mod cooldown;
pub mod oracle;
pub mod repair;
pub mod sanitizer;

pub use context::{build_repairer, build_sanitizer, build_store};
pub use cooldown::{Cooldown, FixedCooldown};
pub use oracle::{GeminiOracle, OracleError, RepairOracle, accept_candidate, repair_prompt};
pub use repair::{Field, RepairEvent, RepairOptions, Repairer, RunSummary, StopReason};
pub use sanitizer::{Resolution, Sanitized, Sanitizer};
