//! Batch error types.

use std::path::PathBuf;

use thiserror::Error;

use clipcycle_media::MediaError;

pub type BatchResult<T> = Result<T, BatchError>;

/// Pipeline stage used for folder-failure context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    OverlayTint,
    Look,
    ZoomSpeed,
    Banner,
    Intro,
    Cta,
    Outro,
    Assemble,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::OverlayTint => "overlay_tint",
            Stage::Look => "look",
            Stage::ZoomSpeed => "zoom_speed",
            Stage::Banner => "banner",
            Stage::Intro => "intro",
            Stage::Cta => "cta",
            Stage::Outro => "outro",
            Stage::Assemble => "assemble",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    /// Directory contract violated or a required asset is missing. Fatal;
    /// aborts the run before any folder is touched.
    #[error("Configuration error: {0}")]
    Config(String),

    /// State file exists but cannot be parsed. Fatal; requires manual state
    /// reset, never a silent one.
    #[error("State file corrupted: {path}: {source}")]
    StateCorruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Another process holds the run lock for the same state file.
    #[error("Another run is already in progress (lock file: {0})")]
    Locked(PathBuf),

    /// A media operation failed while processing one folder. Recoverable at
    /// folder granularity.
    #[error("Stage {stage} failed for folder '{folder_id}': {source}")]
    Stage {
        stage: Stage,
        folder_id: String,
        #[source]
        source: MediaError,
    },

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BatchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Attach folder and stage context to a media failure.
    pub fn stage(stage: Stage, folder_id: impl Into<String>, source: MediaError) -> Self {
        Self::Stage {
            stage,
            folder_id: folder_id.into(),
            source,
        }
    }

    /// Whether the error aborts only the current folder, not the run.
    pub fn is_folder_fatal(&self) -> bool {
        matches!(self, BatchError::Stage { .. } | BatchError::Media(_))
    }
}
