use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, instrument, warn};

use crate::api::errors::FlagError;
use crate::flags::evaluation_cache::EvaluationCache;
use crate::flags::flag_models::{FlagDefinition, FlagPatch};
use crate::metrics::consts::{REGISTRY_LOAD_COUNTER, REGISTRY_MUTATION_COUNTER};

/// An immutable, published set of flag definitions.
#[derive(Debug, Default)]
pub struct FlagRegistry {
    generation: u64,
    flags: HashMap<String, Arc<FlagDefinition>>,
}

impl FlagRegistry {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, key: &str) -> Option<&Arc<FlagDefinition>> {
        self.flags.get(key)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// All definitions, sorted by key.
    pub fn list(&self) -> Vec<Arc<FlagDefinition>> {
        let mut flags: Vec<_> = self.flags.values().cloned().collect();
        flags.sort_by(|a, b| a.key.cmp(&b.key));
        flags
    }

    /// Keys of every flag whose namespace equals `namespace`, sorted.
    pub fn keys_in_namespace(&self, namespace: &str) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .flags
            .values()
            .filter(|flag| flag.namespace == namespace)
            .map(|flag| flag.key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }
}

/// Registry of flag definitions shared by every evaluation.
///
/// Writers never modify a published registry. Each mutation builds a new map,
/// swaps the `Arc` under the write lock and clears the evaluation cache before
/// releasing it, so readers see either the whole old set or the whole new one.
/// The registry starts uninitialized; `load` must run before any read.
pub struct FlagStore {
    registry: RwLock<Option<Arc<FlagRegistry>>>,
    cache: Arc<EvaluationCache>,
}

impl FlagStore {
    pub fn new(cache: Arc<EvaluationCache>) -> Self {
        FlagStore {
            registry: RwLock::new(None),
            cache,
        }
    }

    /// The current registry. Callers hold on to the snapshot for the length of
    /// one logical operation so that bulk evaluations see a single generation.
    pub fn snapshot(&self) -> Result<Arc<FlagRegistry>, FlagError> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(FlagError::RegistryNotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Replaces the entire definition set. Nothing is published if any
    /// definition is invalid or a key appears twice.
    #[instrument(skip_all, fields(flag_count = flags.len()))]
    pub fn load(&self, flags: Vec<FlagDefinition>) -> Result<u64, FlagError> {
        let mut map = HashMap::with_capacity(flags.len());
        for flag in flags {
            if let Err(e) = flag.validate() {
                warn!("rejecting flag set: {}", e);
                return Err(e);
            }
            if map.contains_key(&flag.key) {
                warn!("rejecting flag set: duplicate key {}", flag.key);
                return Err(FlagError::DuplicateFlagKey(flag.key));
            }
            map.insert(flag.key.clone(), Arc::new(flag));
        }

        let generation = self.publish("load", |_| Ok(map))?;
        metrics::counter!(REGISTRY_LOAD_COUNTER).increment(1);
        info!(generation, "loaded flag registry");
        Ok(generation)
    }

    pub fn get(&self, key: &str) -> Result<Option<Arc<FlagDefinition>>, FlagError> {
        Ok(self.snapshot()?.get(key).cloned())
    }

    pub fn list(&self) -> Result<Vec<Arc<FlagDefinition>>, FlagError> {
        Ok(self.snapshot()?.list())
    }

    pub fn add(&self, flag: FlagDefinition) -> Result<(), FlagError> {
        flag.validate()?;
        self.publish("add", |current| {
            let current = current.ok_or(FlagError::RegistryNotInitialized)?;
            if current.flags.contains_key(&flag.key) {
                return Err(FlagError::FlagAlreadyExists(flag.key));
            }
            let mut map = current.flags.clone();
            map.insert(flag.key.clone(), Arc::new(flag));
            Ok(map)
        })?;
        Ok(())
    }

    /// Applies `patch` to the flag stored under `key`, bumping `updated_at`.
    pub fn update(&self, key: &str, patch: FlagPatch) -> Result<Arc<FlagDefinition>, FlagError> {
        let mut updated = None;
        self.publish("update", |current| {
            let current = current.ok_or(FlagError::RegistryNotInitialized)?;
            let existing = current
                .flags
                .get(key)
                .ok_or_else(|| FlagError::FlagNotFound(key.to_string()))?;
            let flag = Arc::new(existing.patched(patch, Utc::now()));
            flag.validate()?;

            let mut map = current.flags.clone();
            map.insert(key.to_string(), flag.clone());
            updated = Some(flag);
            Ok(map)
        })?;
        updated.ok_or_else(|| FlagError::FlagNotFound(key.to_string()))
    }

    pub fn remove(&self, key: &str) -> Result<Arc<FlagDefinition>, FlagError> {
        let mut removed = None;
        self.publish("remove", |current| {
            let current = current.ok_or(FlagError::RegistryNotInitialized)?;
            let mut map = current.flags.clone();
            removed = Some(
                map.remove(key)
                    .ok_or_else(|| FlagError::FlagNotFound(key.to_string()))?,
            );
            Ok(map)
        })?;
        removed.ok_or_else(|| FlagError::FlagNotFound(key.to_string()))
    }

    /// Builds the next registry from the current one and publishes it.
    /// The cache is cleared while the write lock is still held.
    fn publish<F>(&self, operation: &'static str, build: F) -> Result<u64, FlagError>
    where
        F: FnOnce(Option<&FlagRegistry>) -> Result<HashMap<String, Arc<FlagDefinition>>, FlagError>,
    {
        let mut guard = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let flags = build(guard.as_deref())?;
        let generation = guard.as_ref().map_or(0, |r| r.generation) + 1;
        *guard = Some(Arc::new(FlagRegistry { generation, flags }));
        self.cache.clear();

        metrics::counter!(REGISTRY_MUTATION_COUNTER, "operation" => operation).increment(1);
        Ok(generation)
    }
}
