/* Test Helpers specifically for the flags module */

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::flags::flag_models::{FlagDefinition, FlagScope, FlagType, RolloutState};

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn test_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A boolean, globally scoped, fully rolled out flag. The key's segments fill
/// namespace/area/feature/variant so the definition validates.
pub fn create_test_flag(key: &str) -> FlagDefinition {
    let segments: Vec<&str> = key.split('.').collect();
    let segment = |i: usize| segments.get(i).copied().unwrap_or_default().to_string();
    FlagDefinition {
        key: key.to_string(),
        namespace: segment(0),
        area: segment(1),
        feature: segment(2),
        variant: segments.get(3).map(|v| v.to_string()),
        flag_type: FlagType::Boolean,
        scope: FlagScope::Global,
        default_value: json!(false),
        rollout_state: RolloutState::On,
        enabled_for_roles: None,
        enabled_for_users: None,
        enabled_for_spaces: None,
        enabled_for_countries: None,
        enabled_for_pincodes: None,
        percentage_rollout: None,
        variants: None,
        variant_weights: None,
        config_value: None,
        created_at: test_timestamp(),
        updated_at: test_timestamp(),
        expires_at: None,
    }
}

pub fn create_percentage_flag(key: &str, percentage_rollout: f64) -> FlagDefinition {
    FlagDefinition {
        flag_type: FlagType::Percentage,
        percentage_rollout: Some(percentage_rollout),
        ..create_test_flag(key)
    }
}

pub fn create_multivariate_flag(key: &str, weights: &[(&str, f64)]) -> FlagDefinition {
    let variants: BTreeMap<String, Value> = weights
        .iter()
        .map(|(name, _)| (name.to_string(), json!({ "layout": name })))
        .collect();
    let variant_weights: BTreeMap<String, f64> = weights
        .iter()
        .map(|(name, weight)| (name.to_string(), *weight))
        .collect();
    FlagDefinition {
        flag_type: FlagType::Multivariate,
        default_value: json!({ "layout": "classic" }),
        variants: Some(variants),
        variant_weights: Some(variant_weights),
        ..create_test_flag(key)
    }
}
