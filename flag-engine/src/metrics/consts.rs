// Evaluation counters
pub const FLAG_EVALUATION_COUNTER: &str = "flags_evaluation_total";
pub const FLAG_CACHE_HIT_COUNTER: &str = "flags_evaluation_cache_hit_total";
pub const FLAG_CACHE_MISS_COUNTER: &str = "flags_evaluation_cache_miss_total";
pub const FLAG_EXPOSURE_COUNTER: &str = "flags_exposure_total";

// Registry lifecycle
pub const REGISTRY_LOAD_COUNTER: &str = "flags_registry_load_total";
pub const REGISTRY_MUTATION_COUNTER: &str = "flags_registry_mutation_total";
pub const REGISTRY_REFRESH_ERRORS_COUNTER: &str = "flags_registry_refresh_errors_total";
