use thiserror::Error;
use tripweave_core::CoreError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u64, found: u64 },

    #[error("revision already recorded for version {version}")]
    RevisionExists { version: u64 },

    #[error("core error: {0}")]
    Core(#[from] CoreError),
}
