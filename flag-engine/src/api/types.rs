use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::flags::flag_match_reason::EvaluationReason;

/// Outcome of evaluating one flag for one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub enabled: bool,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub reason: EvaluationReason,
    pub flag_key: String,
}

impl EvaluationResult {
    pub fn enabled(flag_key: &str, value: Value, reason: EvaluationReason) -> Self {
        Self {
            enabled: true,
            value,
            variant: None,
            reason,
            flag_key: flag_key.to_string(),
        }
    }

    /// A disabled result. `fallback` is what the caller should use instead.
    pub fn disabled(flag_key: &str, fallback: Value, reason: EvaluationReason) -> Self {
        Self {
            enabled: false,
            value: fallback,
            variant: None,
            reason,
            flag_key: flag_key.to_string(),
        }
    }

    pub fn with_variant(mut self, variant: String) -> Self {
        self.variant = Some(variant);
        self
    }
}
