pub mod bucketing;
pub mod evaluation_cache;
pub mod flag_analytics;
pub mod flag_context;
pub mod flag_engine;
pub mod flag_match_reason;
pub mod flag_models;
pub mod flag_source;
pub mod flag_store;
pub mod targeting;

#[cfg(test)]
pub mod test_helpers;
