//! Folder discovery and run-asset resolution.
//!
//! The directory contract: a root with one sub-folder per drama (clip files
//! plus an optional `overlay.png`), a required outro video, a required intro
//! audio source (fallback file or a voices directory), and optional banner
//! and CTA audio assets. Missing required assets abort the run before any
//! folder is touched; missing optional assets silently disable their stage.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use clipcycle_models::Folder;

use crate::config::BatchConfig;
use crate::error::{BatchError, BatchResult};

/// Recognized video clip extensions.
pub const VIDEO_EXTS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v"];
/// Recognized audio extensions.
pub const AUDIO_EXTS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg"];
/// Per-folder overlay image file name.
pub const OVERLAY_FILE: &str = "overlay.png";

/// Assets shared by every folder in one run.
#[derive(Debug, Clone)]
pub struct RunAssets {
    /// Fixed outro video (required)
    pub outro: PathBuf,
    /// Intro audio for the social variant (required)
    pub intro_audio: PathBuf,
    /// Global banner image (optional)
    pub banner: Option<PathBuf>,
    /// Call-to-action audio (optional)
    pub cta_audio: Option<PathBuf>,
}

/// List every drama folder under the root, sorted lexicographically by id.
///
/// Every sub-directory is a known folder, including ones with no clips;
/// those count as trivially done so a pass can still complete.
pub fn discover_folders(root: &Path) -> BatchResult<Vec<Folder>> {
    if !root.is_dir() {
        return Err(BatchError::config(format!(
            "Root directory not found: {}",
            root.display()
        )));
    }

    let mut folders = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        folders.push(read_folder(&path)?);
    }

    folders.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(folders)
}

/// Build the read-only view of one drama folder.
pub fn read_folder(path: &Path) -> BatchResult<Folder> {
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| BatchError::config(format!("Invalid folder path: {}", path.display())))?;

    let overlay_path = path.join(OVERLAY_FILE);
    Ok(Folder {
        id,
        path: path.to_path_buf(),
        clip_files: list_media_files(path, VIDEO_EXTS)?,
        overlay: overlay_path.is_file().then_some(overlay_path),
    })
}

/// Files in `dir` with one of `exts`, sorted case-insensitively by name.
pub fn list_media_files(dir: &Path, exts: &[&str]) -> BatchResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|e| exts.contains(&e.as_str()));
        if matches {
            files.push(path);
        }
    }

    files.sort_by_key(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    Ok(files)
}

/// Resolve the run's shared assets for a pass.
///
/// The intro audio rotates through the voices directory by pass index when
/// one is populated, otherwise the fallback file is used.
pub fn resolve_assets(config: &BatchConfig, pass_index: u32) -> BatchResult<RunAssets> {
    if !config.outro.is_file() {
        return Err(BatchError::config(format!(
            "Outro video not found: {}",
            config.outro.display()
        )));
    }

    let intro_audio = pick_intro_audio(config, pass_index)?;

    let banner = config.banner.is_file().then(|| config.banner.clone());
    if banner.is_none() {
        info!(path = %config.banner.display(), "No banner image; banner stage disabled");
    }

    let cta_audio = config.cta_audio.is_file().then(|| config.cta_audio.clone());
    if cta_audio.is_none() {
        info!(path = %config.cta_audio.display(), "No CTA audio; CTA stage disabled");
    }

    Ok(RunAssets {
        outro: config.outro.clone(),
        intro_audio,
        banner,
        cta_audio,
    })
}

fn pick_intro_audio(config: &BatchConfig, pass_index: u32) -> BatchResult<PathBuf> {
    let voices = list_media_files(&config.intro_voices_dir, AUDIO_EXTS)?;
    if !voices.is_empty() {
        let chosen = voices[pass_index as usize % voices.len()].clone();
        info!(voice = %chosen.display(), "Using rotating intro voice");
        return Ok(chosen);
    }

    if config.intro_audio.is_file() {
        return Ok(config.intro_audio.clone());
    }

    if config.intro_voices_dir.is_dir() {
        warn!(
            dir = %config.intro_voices_dir.display(),
            "Intro voices directory has no audio files"
        );
    }
    Err(BatchError::config(format!(
        "Intro audio not found: {}",
        config.intro_audio.display()
    )))
}
