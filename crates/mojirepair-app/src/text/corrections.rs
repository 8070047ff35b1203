use serde::Deserialize;

use crate::constants::RESIDUAL_MARKERS;

/// Known corruptions seen in the places catalogue, applied in this order.
const BUILTIN_RULES: &[(&str, &str)] = &[
    ("Gro?njan", "Grožnjan"),
    ("V?rsar", "Vrsar"),
    ("Pore?", "Poreč"),
    ("Rovin?", "Rovinj"),
    ("Motov?n", "Motovun"),
    ("Ã¨", "è"),
    ("Ã©", "é"),
    ("â€™", "’"),
    ("Ã ", "à"),
    ("Ã¹", "ù"),
    ("Ã¬", "ì"),
    ("Ã²", "ò"),
    ("Caf?", "Café"),
    ("Fa?ade", "Façade"),
    ("Entr?e", "Entrée"),
    ("Pi?a", "Piña"),
];

/// A single substring substitution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CorrectionRule {
    pub pattern: String,
    pub replacement: String,
}

impl CorrectionRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// Ordered substitution rules.
///
/// Rules run in sequence over the output of the previous rule, so a later
/// rule may match text produced by an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionMap {
    rules: Vec<CorrectionRule>,
}

impl Default for CorrectionMap {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CorrectionMap {
    /// The built-in catalogue of known corruptions.
    pub fn builtin() -> Self {
        Self::from_rules(
            BUILTIN_RULES
                .iter()
                .map(|(pattern, replacement)| CorrectionRule::new(*pattern, *replacement)),
        )
    }

    /// Builds a map from arbitrary rules. Rules with an empty pattern are dropped.
    pub fn from_rules(rules: impl IntoIterator<Item = CorrectionRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .filter(|rule| !rule.pattern.is_empty())
                .collect(),
        }
    }

    /// Appends operator-supplied rules after the existing ones.
    pub fn with_extra(mut self, extra: impl IntoIterator<Item = CorrectionRule>) -> Self {
        self.rules
            .extend(extra.into_iter().filter(|rule| !rule.pattern.is_empty()));
        self
    }

    pub fn rules(&self) -> &[CorrectionRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Replaces every occurrence of every known pattern.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_owned();
        for rule in &self.rules {
            if out.contains(rule.pattern.as_str()) {
                out = out.replace(rule.pattern.as_str(), &rule.replacement);
            }
        }
        out
    }
}

/// True when `text` still carries a `?`, a Latin-1 decoded UTF-8 lead byte, or U+FFFD.
pub fn has_residual_markers(text: &str) -> bool {
    text.contains(RESIDUAL_MARKERS)
}
