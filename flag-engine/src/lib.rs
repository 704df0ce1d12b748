pub mod api;
pub mod config;
pub mod flags;
pub mod metrics;

pub use api::errors::FlagError;
pub use api::types::EvaluationResult;
pub use flags::flag_context::FlagContext;
pub use flags::flag_engine::FlagEngine;
pub use flags::flag_match_reason::EvaluationReason;
pub use flags::flag_models::{FlagDefinition, FlagPatch};
