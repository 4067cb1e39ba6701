// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Analysis configuration.

use serde::{Deserialize, Serialize};

use crate::AnalysisError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Owner prefixes whose procedures are never inspected and never suspend
    /// (platform libraries that cannot call back into woven code).
    pub opaque_prefixes: Vec<String>,
    /// Report calls that resolve nowhere as errors instead of assuming
    /// they do not suspend.
    pub strict_resolution: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            opaque_prefixes: vec!["std.".to_string()],
            strict_resolution: false,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(text: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(text).map_err(|e| AnalysisError::Metadata(e.to_string()))
    }

    pub fn is_opaque(&self, owner: &str) -> bool {
        self.opaque_prefixes.iter().any(|p| owner.starts_with(p.as_str()))
    }
}
