use serde::{Deserialize, Serialize};

use super::types::PiiType;

/// An operator-supplied detection rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPattern {
    /// snake_case kind name; the placeholder is its uppercase form
    pub name: String,
    /// Regular expression in `regex` crate syntax
    pub pattern: String,
}

/// Which kinds a [`PatternMatcher`](super::PatternMatcher) detects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiiDetectionConfig {
    pub enabled_types: Vec<PiiType>,
    pub custom_patterns: Vec<CustomPattern>,
}

impl Default for PiiDetectionConfig {
    fn default() -> Self {
        Self { enabled_types: PiiType::BUILT_IN.to_vec(), custom_patterns: Vec::new() }
    }
}

impl PiiDetectionConfig {
    pub fn with_types(types: impl IntoIterator<Item = PiiType>) -> Self {
        Self { enabled_types: types.into_iter().collect(), custom_patterns: Vec::new() }
    }

    pub fn custom(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.custom_patterns.push(CustomPattern { name: name.into(), pattern: pattern.into() });
        self
    }
}
