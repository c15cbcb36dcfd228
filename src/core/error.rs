use std::path::PathBuf;

/// Errors raised by the detection pipeline.
///
/// Application glue (startup, config) stays on `anyhow`; the pipeline uses
/// this type so the worker can tell contained failures from fatal ones.
#[derive(Debug, thiserror::Error)]
pub enum PlateError {
    #[error("video source unavailable: {source_id}: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("failed to load cascade model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("plate detection failed: {0}")]
    Detection(String),

    #[error("text recognition failed: {0}")]
    Ocr(String),

    #[error("failed to write plate ledger {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("failed to save snapshot {path}: {reason}")]
    Snapshot { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlateError {
    pub fn source_unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type PlateResult<T> = Result<T, PlateError>;
