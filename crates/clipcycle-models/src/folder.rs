//! Folders, clip selection plans, and the folder-level state machine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Read-only view of one drama folder for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Stable identifier (the directory name)
    pub id: String,
    /// Absolute path to the directory
    pub path: PathBuf,
    /// Video clip files, sorted case-insensitively by file name
    pub clip_files: Vec<PathBuf>,
    /// Per-folder overlay image, if present
    pub overlay: Option<PathBuf>,
}

impl Folder {
    /// Whether the folder has any clips to process.
    pub fn has_clips(&self) -> bool {
        !self.clip_files.is_empty()
    }
}

/// Deterministic clip selection for one folder within one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPlan {
    /// Folder the plan was built for
    pub folder_id: String,
    /// Chosen clips in playback order (shuffled, then truncated)
    pub clips: Vec<PathBuf>,
}

impl SelectionPlan {
    /// Empty plan for a folder with no clips.
    pub fn empty(folder_id: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            clips: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

/// Processing phase of one folder within a run.
///
/// `Failed` folders are not marked done; they stay eligible for the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FolderPhase {
    /// Not yet picked up in this pass
    #[default]
    Pending,
    /// Clips chosen, pipeline not started
    Selected,
    /// Per-clip normalization in flight
    Normalizing,
    /// Variants being concatenated
    Assembling,
    /// Both variants produced, folder marked done
    Done,
    /// Engine error; folder left pending for a future run
    Failed,
}

impl FolderPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FolderPhase::Pending => "pending",
            FolderPhase::Selected => "selected",
            FolderPhase::Normalizing => "normalizing",
            FolderPhase::Assembling => "assembling",
            FolderPhase::Done => "done",
            FolderPhase::Failed => "failed",
        }
    }

    /// Whether no more transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FolderPhase::Done | FolderPhase::Failed)
    }

    /// Valid forward transitions of the folder state machine.
    ///
    /// Any in-progress phase may transition to `Failed`; only `Assembling`
    /// reaches `Done`.
    pub fn can_transition_to(&self, next: FolderPhase) -> bool {
        use FolderPhase::*;
        match (self, next) {
            (Pending, Selected) => true,
            (Selected, Normalizing) => true,
            (Normalizing, Assembling) => true,
            (Assembling, Done) => true,
            (Selected | Normalizing | Assembling, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for FolderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use FolderPhase::*;
        let path = [Pending, Selected, Normalizing, Assembling, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failure_reachable_from_in_progress_only() {
        use FolderPhase::*;
        assert!(Selected.can_transition_to(Failed));
        assert!(Normalizing.can_transition_to(Failed));
        assert!(Assembling.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Done.can_transition_to(Failed));
    }

    #[test]
    fn test_no_shortcuts_to_done() {
        use FolderPhase::*;
        assert!(!Pending.can_transition_to(Done));
        assert!(!Normalizing.can_transition_to(Done));
        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
    }
}
