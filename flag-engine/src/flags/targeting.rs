use crate::flags::flag_context::FlagContext;
use crate::flags::flag_match_reason::EvaluationReason;
use crate::flags::flag_models::{FlagDefinition, FlagScope};

/// Cohorts a flag key can opt into by carrying the cohort name as one of its
/// segments, e.g. `jobs.board.qualified` or `jobs.qualified.priority_queue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cohort {
    /// Callers with a track record of completed jobs.
    Qualified,
}

impl Cohort {
    pub fn for_flag_key(flag_key: &str) -> Option<Cohort> {
        flag_key
            .split('.')
            .any(|segment| segment == "qualified")
            .then_some(Cohort::Qualified)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetingMatch {
    pub matches: bool,
    pub reason: EvaluationReason,
}

impl TargetingMatch {
    fn matched(reason: EvaluationReason) -> Self {
        TargetingMatch {
            matches: true,
            reason,
        }
    }

    fn not_matched(reason: EvaluationReason) -> Self {
        TargetingMatch {
            matches: false,
            reason,
        }
    }

    fn from_check(is_match: bool, matched: EvaluationReason, not_matched: EvaluationReason) -> Self {
        if is_match {
            Self::matched(matched)
        } else {
            Self::not_matched(not_matched)
        }
    }
}

/// Resolves a flag's scope rules against a caller context. Rollout-state
/// gating is the engine's job and happens before this runs.
#[derive(Debug, Clone)]
pub struct TargetingEvaluator {
    qualified_min_completed_jobs: u32,
}

impl TargetingEvaluator {
    pub fn new(qualified_min_completed_jobs: u32) -> Self {
        TargetingEvaluator {
            qualified_min_completed_jobs,
        }
    }

    pub fn is_cohort_member(&self, cohort: Cohort, context: &FlagContext) -> bool {
        match cohort {
            Cohort::Qualified => {
                context.completed_jobs.unwrap_or(0) >= self.qualified_min_completed_jobs
            }
        }
    }

    pub fn evaluate(&self, flag: &FlagDefinition, context: &FlagContext) -> TargetingMatch {
        match flag.scope {
            FlagScope::Global => TargetingMatch::matched(EvaluationReason::GlobalScope),
            FlagScope::Role => TargetingMatch::from_check(
                flag.enabled_for_roles
                    .as_ref()
                    .is_some_and(|roles| context.has_any_role(roles)),
                EvaluationReason::RoleMatched,
                EvaluationReason::RoleNotMatched,
            ),
            FlagScope::User => TargetingMatch::from_check(
                contains(&flag.enabled_for_users, context.user_id.as_deref()),
                EvaluationReason::UserMatched,
                EvaluationReason::UserNotMatched,
            ),
            FlagScope::Space => TargetingMatch::from_check(
                contains(&flag.enabled_for_spaces, context.makerspace_id.as_deref()),
                EvaluationReason::SpaceMatched,
                EvaluationReason::SpaceNotMatched,
            ),
            FlagScope::Audience => self.evaluate_audience(flag, context),
            FlagScope::Unknown => TargetingMatch::not_matched(EvaluationReason::UnknownScope),
        }
    }

    /// Every configured sub-condition must pass; the first failure decides the reason.
    fn evaluate_audience(&self, flag: &FlagDefinition, context: &FlagContext) -> TargetingMatch {
        if let Some(countries) = configured(&flag.enabled_for_countries) {
            let country_matches = context.country.as_deref().is_some_and(|country| {
                countries
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(country))
            });
            if !country_matches {
                return TargetingMatch::not_matched(EvaluationReason::CountryNotMatched);
            }
        }

        if let Some(pincodes) = configured(&flag.enabled_for_pincodes) {
            let pincode_matches = context
                .pincode
                .as_deref()
                .is_some_and(|pincode| pincodes.iter().any(|allowed| allowed == pincode));
            if !pincode_matches {
                return TargetingMatch::not_matched(EvaluationReason::PincodeNotMatched);
            }
        }

        if let Some(cohort) = Cohort::for_flag_key(&flag.key) {
            if !self.is_cohort_member(cohort, context) {
                return TargetingMatch::not_matched(EvaluationReason::CohortNotMatched);
            }
        }

        TargetingMatch::matched(EvaluationReason::AudienceMatched)
    }
}

fn contains(allow_list: &Option<Vec<String>>, value: Option<&str>) -> bool {
    match (allow_list, value) {
        (Some(allowed), Some(value)) => allowed.iter().any(|a| a == value),
        _ => false,
    }
}

fn configured(allow_list: &Option<Vec<String>>) -> Option<&Vec<String>> {
    allow_list.as_ref().filter(|list| !list.is_empty())
}
