use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::errors::FlagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    Boolean,
    Percentage,
    Multivariate,
    Config,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagScope {
    Global,
    Role,
    Audience,
    Space,
    User,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutState {
    Off,
    Internal,
    Beta,
    On,
    Remove,
    #[serde(other)]
    Unknown,
}

/// The segments of a flag key: `namespace.area.feature[.variant]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagKeyParts<'a> {
    pub namespace: &'a str,
    pub area: &'a str,
    pub feature: &'a str,
    pub variant: Option<&'a str>,
}

impl<'a> FlagKeyParts<'a> {
    pub fn parse(key: &'a str) -> Result<Self, FlagError> {
        let segments: Vec<&str> = key.split('.').collect();
        if !(3..=4).contains(&segments.len()) || segments.iter().any(|s| s.is_empty()) {
            return Err(FlagError::InvalidFlagKey(key.to_string()));
        }
        Ok(FlagKeyParts {
            namespace: segments[0],
            area: segments[1],
            feature: segments[2],
            variant: segments.get(3).copied(),
        })
    }
}

/// A flag as delivered by the flag source. Definitions are immutable once
/// loaded; updates publish a new copy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDefinition {
    pub key: String,
    pub namespace: String,
    pub area: String,
    pub feature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub scope: FlagScope,
    #[serde(default)]
    pub default_value: Value,
    pub rollout_state: RolloutState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_for_roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_for_users: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_for_spaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_for_countries: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_for_pincodes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_rollout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_weights: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_value: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl FlagDefinition {
    /// Checks the structural rules a definition must satisfy before it can be
    /// published to the registry.
    pub fn validate(&self) -> Result<(), FlagError> {
        let parts = FlagKeyParts::parse(&self.key)?;
        if parts.namespace != self.namespace
            || parts.area != self.area
            || parts.feature != self.feature
            || parts.variant != self.variant.as_deref()
        {
            return Err(FlagError::invalid_definition(
                &self.key,
                "key does not agree with namespace/area/feature/variant",
            ));
        }

        if let Some(rollout) = self.percentage_rollout {
            if !(0.0..=100.0).contains(&rollout) {
                return Err(FlagError::invalid_definition(
                    &self.key,
                    format!("percentageRollout {rollout} outside 0..=100"),
                ));
            }
        }

        if let Some(weights) = &self.variant_weights {
            if let Some((name, weight)) = weights
                .iter()
                .find(|(_, w)| !w.is_finite() || **w < 0.0)
            {
                return Err(FlagError::invalid_definition(
                    &self.key,
                    format!("variant weight for {name} is {weight}"),
                ));
            }
        }

        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// The defined variants, or an empty map for flags without any.
    pub fn get_variants(&self) -> &BTreeMap<String, Value> {
        static EMPTY: BTreeMap<String, Value> = BTreeMap::new();
        self.variants.as_ref().unwrap_or(&EMPTY)
    }

    /// Applies a partial update, returning the new definition. The key is never
    /// changed and `updated_at` is bumped to `now`.
    pub fn patched(&self, patch: FlagPatch, now: DateTime<Utc>) -> FlagDefinition {
        let mut flag = self.clone();
        if let Some(flag_type) = patch.flag_type {
            flag.flag_type = flag_type;
        }
        if let Some(scope) = patch.scope {
            flag.scope = scope;
        }
        if let Some(default_value) = patch.default_value {
            flag.default_value = default_value;
        }
        if let Some(rollout_state) = patch.rollout_state {
            flag.rollout_state = rollout_state;
        }
        if patch.enabled_for_roles.is_some() {
            flag.enabled_for_roles = patch.enabled_for_roles;
        }
        if patch.enabled_for_users.is_some() {
            flag.enabled_for_users = patch.enabled_for_users;
        }
        if patch.enabled_for_spaces.is_some() {
            flag.enabled_for_spaces = patch.enabled_for_spaces;
        }
        if patch.enabled_for_countries.is_some() {
            flag.enabled_for_countries = patch.enabled_for_countries;
        }
        if patch.enabled_for_pincodes.is_some() {
            flag.enabled_for_pincodes = patch.enabled_for_pincodes;
        }
        if patch.percentage_rollout.is_some() {
            flag.percentage_rollout = patch.percentage_rollout;
        }
        if patch.variants.is_some() {
            flag.variants = patch.variants;
        }
        if patch.variant_weights.is_some() {
            flag.variant_weights = patch.variant_weights;
        }
        if patch.config_value.is_some() {
            flag.config_value = patch.config_value;
        }
        if patch.expires_at.is_some() {
            flag.expires_at = patch.expires_at;
        }
        flag.updated_at = now;
        flag
    }
}

/// Partial update for `update_flag`. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagPatch {
    #[serde(default, rename = "type")]
    pub flag_type: Option<FlagType>,
    #[serde(default)]
    pub scope: Option<FlagScope>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub rollout_state: Option<RolloutState>,
    #[serde(default)]
    pub enabled_for_roles: Option<Vec<String>>,
    #[serde(default)]
    pub enabled_for_users: Option<Vec<String>>,
    #[serde(default)]
    pub enabled_for_spaces: Option<Vec<String>>,
    #[serde(default)]
    pub enabled_for_countries: Option<Vec<String>>,
    #[serde(default)]
    pub enabled_for_pincodes: Option<Vec<String>>,
    #[serde(default)]
    pub percentage_rollout: Option<f64>,
    #[serde(default)]
    pub variants: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub variant_weights: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub config_value: Option<Value>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl FlagPatch {
    pub fn rollout_state(rollout_state: RolloutState) -> Self {
        FlagPatch {
            rollout_state: Some(rollout_state),
            ..Default::default()
        }
    }
}
