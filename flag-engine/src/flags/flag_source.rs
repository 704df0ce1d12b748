use async_trait::async_trait;
use std::path::PathBuf;
use tracing::instrument;

use crate::api::errors::FlagError;
use crate::flags::flag_models::FlagDefinition;

/// Supplies the complete set of flag definitions. Fetching happens outside
/// the evaluation path; the engine only ever sees the finished array.
#[async_trait]
pub trait FlagSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<FlagDefinition>, FlagError>;
}

/// Reads a JSON array of definitions from a file.
#[derive(Debug, Clone)]
pub struct FileFlagSource {
    path: PathBuf,
}

impl FileFlagSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileFlagSource { path: path.into() }
    }
}

#[async_trait]
impl FlagSource for FileFlagSource {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn fetch(&self) -> Result<Vec<FlagDefinition>, FlagError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            tracing::error!("failed to read flag file: {}", e);
            FlagError::SourceUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let flags: Vec<FlagDefinition> = serde_json::from_str(&raw).map_err(|e| {
            tracing::error!("failed to parse flag file: {}", e);
            FlagError::DataParsingError(e)
        })?;
        Ok(flags)
    }
}

/// A fixed set of definitions, e.g. compiled-in defaults.
#[derive(Debug, Clone, Default)]
pub struct StaticFlagSource {
    flags: Vec<FlagDefinition>,
}

impl StaticFlagSource {
    pub fn new(flags: Vec<FlagDefinition>) -> Self {
        StaticFlagSource { flags }
    }
}

#[async_trait]
impl FlagSource for StaticFlagSource {
    async fn fetch(&self) -> Result<Vec<FlagDefinition>, FlagError> {
        Ok(self.flags.clone())
    }
}
