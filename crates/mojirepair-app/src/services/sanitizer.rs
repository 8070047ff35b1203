use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::services::cooldown::Cooldown;
use crate::services::oracle::{OracleError, RepairOracle};
use crate::text::{CorrectionMap, has_residual_markers};

const PREVIEW_CHARS: usize = 30;

/// How a sanitized value was arrived at.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// No known corruption and no residual markers.
    Clean,
    /// The dictionary resolved every marker.
    Dictionary,
    /// The oracle supplied a different value.
    Oracle,
    /// The oracle answered with the text it was given.
    OracleDeclined,
    /// The oracle failed; the value carries dictionary corrections only.
    OracleFailed(OracleError),
    /// Markers remain and no oracle is configured.
    Unresolved,
}

impl Resolution {
    pub fn consulted_oracle(&self) -> bool {
        matches!(
            self,
            Resolution::Oracle | Resolution::OracleDeclined | Resolution::OracleFailed(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Clean => "clean",
            Resolution::Dictionary => "dictionary",
            Resolution::Oracle => "oracle",
            Resolution::OracleDeclined => "oracle-declined",
            Resolution::OracleFailed(_) => "oracle-failed",
            Resolution::Unresolved => "unresolved",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sanitized {
    pub text: String,
    pub resolution: Resolution,
}

impl Sanitized {
    fn clean(text: &str) -> Self {
        Self {
            text: text.to_owned(),
            resolution: Resolution::Clean,
        }
    }

    pub fn differs_from(&self, original: &str) -> bool {
        self.text != original
    }
}

/// Dictionary pass followed by a gated oracle call.
#[derive(Clone)]
pub struct Sanitizer {
    corrections: Arc<CorrectionMap>,
    oracle: Option<Arc<dyn RepairOracle>>,
    cooldown: Arc<dyn Cooldown>,
}

impl Sanitizer {
    pub fn new(
        corrections: Arc<CorrectionMap>,
        oracle: Option<Arc<dyn RepairOracle>>,
        cooldown: Arc<dyn Cooldown>,
    ) -> Self {
        Self {
            corrections,
            oracle,
            cooldown,
        }
    }

    pub fn corrections(&self) -> &CorrectionMap {
        &self.corrections
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub async fn sanitize(&self, text: &str) -> Sanitized {
        if text.is_empty() {
            return Sanitized::clean(text);
        }

        let corrected = self.corrections.apply(text);
        if !has_residual_markers(&corrected) {
            let resolution = if corrected == text {
                Resolution::Clean
            } else {
                Resolution::Dictionary
            };
            return Sanitized {
                text: corrected,
                resolution,
            };
        }

        let Some(oracle) = &self.oracle else {
            debug!(value = %preview(&corrected), "residual markers remain; oracle disabled");
            return Sanitized {
                text: corrected,
                resolution: Resolution::Unresolved,
            };
        };

        info!(value = %preview(&corrected), "querying oracle");
        let outcome = oracle.repair(&corrected).await;
        self.cooldown.pause().await;

        match outcome {
            Ok(repaired) if repaired == corrected => Sanitized {
                text: corrected,
                resolution: Resolution::OracleDeclined,
            },
            Ok(repaired) => Sanitized {
                text: repaired,
                resolution: Resolution::Oracle,
            },
            Err(err) => {
                warn!(value = %preview(&corrected), error = %err, "oracle repair failed");
                Sanitized {
                    text: corrected,
                    resolution: Resolution::OracleFailed(err),
                }
            }
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
