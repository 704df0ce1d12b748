use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlagError {
    /// Raised when `evaluate` (or an admin call) runs before the first `load_flags`.
    /// This is the only error an evaluation can produce; every other failure
    /// resolves to a disabled `EvaluationResult` with a reason code.
    #[error("flag registry has not been initialized")]
    RegistryNotInitialized,
    #[error("flag {0} not found")]
    FlagNotFound(String),
    #[error("flag {0} already exists")]
    FlagAlreadyExists(String),
    #[error("duplicate flag key {0} in definition set")]
    DuplicateFlagKey(String),
    #[error("invalid flag key {0}: expected namespace.area.feature[.variant]")]
    InvalidFlagKey(String),
    #[error("invalid definition for flag {key}: {reason}")]
    InvalidDefinition { key: String, reason: String },
    #[error("failed to parse flag data: {0}")]
    DataParsingError(#[from] serde_json::Error),
    #[error("flag source unavailable: {0}")]
    SourceUnavailable(String),
}

impl FlagError {
    pub fn invalid_definition(key: &str, reason: impl Into<String>) -> Self {
        FlagError::InvalidDefinition {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Short, stable label for metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            FlagError::RegistryNotInitialized => "registry_not_initialized",
            FlagError::FlagNotFound(_) => "flag_not_found",
            FlagError::FlagAlreadyExists(_) => "flag_already_exists",
            FlagError::DuplicateFlagKey(_) => "duplicate_flag_key",
            FlagError::InvalidFlagKey(_) => "invalid_flag_key",
            FlagError::InvalidDefinition { .. } => "invalid_definition",
            FlagError::DataParsingError(_) => "data_parsing_error",
            FlagError::SourceUnavailable(_) => "source_unavailable",
        }
    }
}
