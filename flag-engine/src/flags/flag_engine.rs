use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::api::errors::FlagError;
use crate::api::types::EvaluationResult;
use crate::config::Config;
use crate::flags::bucketing::{assign_variant, is_in_rollout};
use crate::flags::evaluation_cache::{EvaluationCache, EvaluationCacheKey};
use crate::flags::flag_analytics::{ExposureEvent, ExposureSink, NoopExposureSink};
use crate::flags::flag_context::{ContextFingerprint, FlagContext};
use crate::flags::flag_match_reason::EvaluationReason;
use crate::flags::flag_models::{FlagDefinition, FlagPatch, FlagType, RolloutState};
use crate::flags::flag_source::FlagSource;
use crate::flags::flag_store::{FlagRegistry, FlagStore};
use crate::flags::targeting::{Cohort, TargetingEvaluator};
use crate::metrics::consts::{
    FLAG_EVALUATION_COUNTER, FLAG_EXPOSURE_COUNTER, REGISTRY_REFRESH_ERRORS_COUNTER,
};

/// Evaluates feature flags against caller contexts.
///
/// The engine owns its registry and result cache; nothing is global, so
/// several engines (per tenant, per test) can live side by side. Share one
/// engine between threads behind an `Arc`.
///
/// Evaluation is synchronous and in-memory. Apart from populating the cache
/// and emitting exposure events it has no side effects, and the only error it
/// can return is `FlagError::RegistryNotInitialized`. Every other outcome
/// (unknown key, expired flag, rollout gate, targeting mismatch, malformed
/// definition) is a disabled `EvaluationResult` with a reason.
pub struct FlagEngine {
    store: FlagStore,
    cache: Arc<EvaluationCache>,
    targeting: TargetingEvaluator,
    /// Roles allowed to see flags in the `internal` rollout state.
    internal_roles: BTreeSet<String>,
    exposure_sink: Arc<dyn ExposureSink>,
}

impl FlagEngine {
    pub fn new(config: &Config) -> Self {
        let cache = Arc::new(EvaluationCache::new(
            config.flag_cache_max_entries,
            config.flag_cache_ttl(),
        ));
        FlagEngine {
            store: FlagStore::new(cache.clone()),
            cache,
            targeting: TargetingEvaluator::new(config.qualified_min_completed_jobs),
            internal_roles: config.internal_roles.0.clone(),
            exposure_sink: Arc::new(NoopExposureSink),
        }
    }

    pub fn with_exposure_sink(mut self, exposure_sink: Arc<dyn ExposureSink>) -> Self {
        self.exposure_sink = exposure_sink;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    /// Atomically replaces every definition and clears the cache. Returns the
    /// generation of the new registry.
    pub fn load_flags(&self, flags: Vec<FlagDefinition>) -> Result<u64, FlagError> {
        self.store.load(flags)
    }

    /// Pulls the full set from `source` and publishes it if it differs from
    /// the current registry. Returns whether a new registry was published.
    /// On any error the current registry stays in place.
    #[instrument(skip_all)]
    pub async fn refresh(&self, source: &dyn FlagSource) -> Result<bool, FlagError> {
        let mut flags = source.fetch().await?;
        flags.sort_by(|a, b| a.key.cmp(&b.key));

        if let Ok(current) = self.store.list() {
            let unchanged = current.len() == flags.len()
                && current.iter().zip(&flags).all(|(a, b)| a.as_ref() == b);
            if unchanged {
                debug!("flag set unchanged, keeping registry");
                return Ok(false);
            }
        }

        self.store.load(flags)?;
        Ok(true)
    }

    /// Refreshes from `source` every `interval`, forever. Failures are logged
    /// and counted; the engine keeps serving the last good registry.
    pub async fn run_refresh_loop(self: Arc<Self>, source: Arc<dyn FlagSource>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);

        info!("Starting flag refresh loop (interval: {:?})", interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh(source.as_ref()).await {
                metrics::counter!(REGISTRY_REFRESH_ERRORS_COUNTER, "error" => e.error_code())
                    .increment(1);
                warn!("flag refresh failed, keeping current registry: {}", e);
            }
        }
    }

    /// Evaluates one flag. `default_value` is only used when the key is
    /// unknown; it defaults to `false`.
    pub fn evaluate(
        &self,
        flag_key: &str,
        context: &FlagContext,
        default_value: Option<Value>,
    ) -> Result<EvaluationResult, FlagError> {
        let registry = self.store.snapshot()?;
        Ok(self.evaluate_in(&registry, flag_key, context, default_value))
    }

    /// Evaluates several flags against the same registry snapshot.
    pub fn evaluate_multiple<I, S>(
        &self,
        flag_keys: I,
        context: &FlagContext,
    ) -> Result<HashMap<String, EvaluationResult>, FlagError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = self.store.snapshot()?;
        Ok(flag_keys
            .into_iter()
            .map(|key| {
                let key = key.as_ref();
                (key.to_string(), self.evaluate_in(&registry, key, context, None))
            })
            .collect())
    }

    /// Evaluates every flag whose namespace is `namespace`.
    pub fn get_flags_for_namespace(
        &self,
        namespace: &str,
        context: &FlagContext,
    ) -> Result<HashMap<String, EvaluationResult>, FlagError> {
        let registry = self.store.snapshot()?;
        Ok(registry
            .keys_in_namespace(namespace)
            .into_iter()
            .map(|key| (key.to_string(), self.evaluate_in(&registry, key, context, None)))
            .collect())
    }

    pub fn add_flag(&self, flag: FlagDefinition) -> Result<(), FlagError> {
        info!(flag_key = %flag.key, "adding flag");
        self.store.add(flag)
    }

    pub fn update_flag(
        &self,
        flag_key: &str,
        patch: FlagPatch,
    ) -> Result<Arc<FlagDefinition>, FlagError> {
        info!(flag_key, "updating flag");
        self.store.update(flag_key, patch)
    }

    pub fn remove_flag(&self, flag_key: &str) -> Result<Arc<FlagDefinition>, FlagError> {
        info!(flag_key, "removing flag");
        self.store.remove(flag_key)
    }

    pub fn get_all_flags(&self) -> Result<Vec<Arc<FlagDefinition>>, FlagError> {
        self.store.list()
    }

    pub fn get_flag(&self, flag_key: &str) -> Result<Option<Arc<FlagDefinition>>, FlagError> {
        self.store.get(flag_key)
    }

    fn evaluate_in(
        &self,
        registry: &FlagRegistry,
        flag_key: &str,
        context: &FlagContext,
        default_value: Option<Value>,
    ) -> EvaluationResult {
        let result = self.resolve(registry, flag_key, context, default_value);

        metrics::counter!(FLAG_EVALUATION_COUNTER, "reason" => result.reason.as_ref().to_string())
            .increment(1);

        if let Some(variant) = &result.variant {
            metrics::counter!(FLAG_EXPOSURE_COUNTER).increment(1);
            self.exposure_sink.record_exposure(ExposureEvent {
                flag_key: flag_key.to_string(),
                variant: variant.clone(),
                identifier: context.bucketing_identifier().to_string(),
            });
        }

        result
    }

    /// Unknown and expired flags are answered before the cache is consulted:
    /// the first depends on the caller's default, the second on the clock.
    fn resolve(
        &self,
        registry: &FlagRegistry,
        flag_key: &str,
        context: &FlagContext,
        default_value: Option<Value>,
    ) -> EvaluationResult {
        let Some(flag) = registry.get(flag_key) else {
            debug!(flag_key, "flag not found");
            return EvaluationResult::disabled(
                flag_key,
                default_value.unwrap_or(Value::Bool(false)),
                EvaluationReason::FlagNotFound,
            );
        };

        if flag.is_expired(Utc::now()) {
            return EvaluationResult::disabled(
                flag_key,
                flag.default_value.clone(),
                EvaluationReason::FlagExpired,
            );
        }

        let cohort_member = Cohort::for_flag_key(flag_key)
            .map(|cohort| self.targeting.is_cohort_member(cohort, context));
        let cache_key = EvaluationCacheKey::new(
            registry.generation(),
            flag_key,
            ContextFingerprint::new(context, cohort_member),
        );
        if let Some(cached) = self.cache.get(&cache_key) {
            return cached;
        }

        let result = self.evaluate_flag(flag, context);
        self.cache.insert(cache_key, result.clone());
        result
    }

    fn evaluate_flag(&self, flag: &FlagDefinition, context: &FlagContext) -> EvaluationResult {
        let disabled =
            |reason| EvaluationResult::disabled(&flag.key, flag.default_value.clone(), reason);

        if let Some(reason) = self.rollout_gate(flag, context) {
            return disabled(reason);
        }

        let targeting = self.targeting.evaluate(flag, context);
        if !targeting.matches {
            return disabled(targeting.reason);
        }

        let identifier = context.bucketing_identifier();
        match flag.flag_type {
            FlagType::Boolean => {
                EvaluationResult::enabled(&flag.key, Value::Bool(true), targeting.reason)
            }
            FlagType::Percentage => match flag.percentage_rollout {
                None => disabled(EvaluationReason::NoRolloutPercentage),
                Some(percentage) if is_in_rollout(&flag.key, identifier, percentage) => {
                    EvaluationResult::enabled(
                        &flag.key,
                        Value::Bool(true),
                        EvaluationReason::InRolloutBound,
                    )
                }
                Some(_) => disabled(EvaluationReason::OutOfRolloutBound),
            },
            FlagType::Multivariate => {
                let variants = flag.get_variants();
                match assign_variant(
                    &flag.key,
                    identifier,
                    variants,
                    flag.variant_weights.as_ref(),
                ) {
                    Some(variant) => EvaluationResult::enabled(
                        &flag.key,
                        variants.get(variant).cloned().unwrap_or(Value::Null),
                        EvaluationReason::VariantAssigned,
                    )
                    .with_variant(variant.to_string()),
                    None => disabled(EvaluationReason::NoVariants),
                }
            }
            FlagType::Config => EvaluationResult::enabled(
                &flag.key,
                flag.config_value
                    .clone()
                    .unwrap_or_else(|| flag.default_value.clone()),
                targeting.reason,
            ),
            FlagType::Unknown => disabled(EvaluationReason::UnknownType),
        }
    }

    /// Lifecycle gate applied before targeting.
    fn rollout_gate(&self, flag: &FlagDefinition, context: &FlagContext) -> Option<EvaluationReason> {
        match flag.rollout_state {
            RolloutState::Off => Some(EvaluationReason::RolloutOff),
            RolloutState::Internal if !context.has_any_role(&self.internal_roles) => {
                Some(EvaluationReason::InternalOnly)
            }
            RolloutState::Internal | RolloutState::Beta | RolloutState::On | RolloutState::Remove => {
                None
            }
            RolloutState::Unknown => Some(EvaluationReason::UnknownRolloutState),
        }
    }
}
