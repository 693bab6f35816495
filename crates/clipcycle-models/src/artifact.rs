//! Output variants and produced artifacts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The two outputs produced per folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Short-form cut with the intro segment
    Social,
    /// Same cut without the intro
    Production,
}

impl Variant {
    /// The variant name as used in output paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Social => "social",
            Variant::Production => "production",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal status of one output artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Produced,
    Skipped,
    Failed,
}

/// One produced (or attempted) output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub variant: Variant,
    pub path: PathBuf,
    pub status: ArtifactStatus,
}

impl OutputArtifact {
    pub fn produced(variant: Variant, path: impl Into<PathBuf>) -> Self {
        Self {
            variant,
            path: path.into(),
            status: ArtifactStatus::Produced,
        }
    }
}
