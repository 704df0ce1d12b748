use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// Per-call description of who is asking. The engine trusts these values;
/// authentication happens before a context is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagContext {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub makerspace_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub completed_jobs: Option<u32>,
}

impl FlagContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        FlagContext {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_makerspace(mut self, makerspace_id: impl Into<String>) -> Self {
        self.makerspace_id = Some(makerspace_id.into());
        self
    }

    /// The identifier used for bucketing: user, then session, then a shared
    /// anonymous bucket. Empty ids count as missing.
    pub fn bucketing_identifier(&self) -> &str {
        non_empty(&self.user_id)
            .or_else(|| non_empty(&self.session_id))
            .unwrap_or(ANONYMOUS_IDENTIFIER)
    }

    pub fn has_any_role<'a, I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        roles.into_iter().any(|role| self.roles.contains(role))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Cache-key view of a context, built only from fields that can change an
/// evaluation outcome. Fields are kept apart so distinct contexts never share
/// a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextFingerprint {
    user_id: Option<String>,
    session_id: Option<String>,
    roles: BTreeSet<String>,
    makerspace_id: Option<String>,
    country: Option<String>,
    pincode: Option<String>,
    cohort_member: Option<bool>,
}

impl ContextFingerprint {
    /// `cohort_member` is `Some` only for cohort-gated flags, whose outcome
    /// also depends on the caller's cohort membership.
    pub fn new(context: &FlagContext, cohort_member: Option<bool>) -> Self {
        ContextFingerprint {
            user_id: context.user_id.clone(),
            session_id: context.session_id.clone(),
            roles: context.roles.clone(),
            makerspace_id: context.makerspace_id.clone(),
            country: context.country.clone(),
            pincode: context.pincode.clone(),
            cohort_member,
        }
    }
}
