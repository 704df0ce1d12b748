use serde_json::Value;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// 2^32, the size of the hash space used for variant assignment.
const HASH_SPACE: f64 = 4_294_967_296.0;

/// Pinned bucketing hash: SHA-1 over the UTF-8 bytes of `input`, first four
/// digest bytes read as a big-endian u32.
///
/// Any service that needs to agree with this engine on a caller's bucket must
/// use this exact construction, including the `"{flag_key}:{identifier}"` and
/// `"{flag_key}:multivariate:{identifier}"` input layouts below.
pub fn bucketing_hash(input: &str) -> u32 {
    let digest = Sha1::digest(input.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Bucket in `0..100` for percentage rollouts.
pub fn percentage_bucket(flag_key: &str, identifier: &str) -> u32 {
    bucketing_hash(&format!("{flag_key}:{identifier}")) % 100
}

/// A caller is in the rollout iff its bucket is strictly below the rollout
/// percentage. Raising the percentage therefore never removes anyone.
pub fn is_in_rollout(flag_key: &str, identifier: &str, percentage_rollout: f64) -> bool {
    f64::from(percentage_bucket(flag_key, identifier)) < percentage_rollout
}

/// Uniformly distributed value in `[0, 1)` used to pick a variant. Salted so
/// that variant assignment is independent of percentage bucketing.
pub fn variant_hash(flag_key: &str, identifier: &str) -> f64 {
    f64::from(bucketing_hash(&format!(
        "{flag_key}:multivariate:{identifier}"
    ))) / HASH_SPACE
}

/// Picks a variant name from `variants`.
///
/// Weights are walked in key order, accumulating; the first variant whose
/// cumulative weight reaches the caller's hash wins. Weight entries naming
/// variants that don't exist are ignored. If the weights fall short of the
/// hash, the first variant is returned, so the result is always one of the
/// defined variants. Without weights every variant gets an equal share.
///
/// Returns `None` only when `variants` is empty.
pub fn assign_variant<'a>(
    flag_key: &str,
    identifier: &str,
    variants: &'a BTreeMap<String, Value>,
    variant_weights: Option<&BTreeMap<String, f64>>,
) -> Option<&'a str> {
    let first = variants.keys().next()?;
    let hash = variant_hash(flag_key, identifier);

    let selected = match variant_weights.filter(|weights| !weights.is_empty()) {
        Some(weights) => select_weighted(hash, variants, weights),
        None => select_uniform(hash, variants),
    };

    Some(selected.unwrap_or(first.as_str()))
}

fn select_weighted<'a>(
    hash: f64,
    variants: &'a BTreeMap<String, Value>,
    weights: &BTreeMap<String, f64>,
) -> Option<&'a str> {
    let mut cumulative = 0.0;
    for (name, weight) in weights {
        let Some((variant, _)) = variants.get_key_value(name) else {
            continue;
        };
        cumulative += weight;
        if cumulative >= hash {
            return Some(variant.as_str());
        }
    }
    None
}

fn select_uniform(hash: f64, variants: &BTreeMap<String, Value>) -> Option<&str> {
    let share = 1.0 / variants.len() as f64;
    let mut cumulative = 0.0;
    for name in variants.keys() {
        cumulative += share;
        if cumulative >= hash {
            return Some(name.as_str());
        }
    }
    None
}
