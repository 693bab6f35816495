//! Batch run configuration.
//!
//! One explicit struct passed into the orchestrator at construction; every
//! field has a default and a `CLIPCYCLE_*` environment override.

use std::path::{Path, PathBuf};

use clipcycle_media::{RenderTarget, ScaleMode};
use clipcycle_models::{EncodingConfig, Variant};

/// Batch configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Root directory containing one sub-folder per drama
    pub root_dir: PathBuf,
    /// Fixed outro video appended to every variant (required)
    pub outro: PathBuf,
    /// Intro audio fallback file (required unless the voices dir has audio)
    pub intro_audio: PathBuf,
    /// Directory of rotating intro voice tracks, picked by pass index
    pub intro_voices_dir: PathBuf,
    /// Global banner image (optional; disables banner stage when absent)
    pub banner: PathBuf,
    /// Call-to-action audio (optional; disables CTA stage when absent)
    pub cta_audio: PathBuf,
    /// Output root; variants land in `social/` and `production/` below it
    pub output_dir: PathBuf,
    /// Resumable state file
    pub state_file: PathBuf,
    /// Folders processed per run
    pub folders_per_run: usize,
    /// Maximum clips selected per folder
    pub max_clips_per_folder: usize,
    /// Base seed for the deterministic clip shuffle
    pub base_seed: u64,
    /// Output width in pixels
    pub target_width: u32,
    /// Output height in pixels
    pub target_height: u32,
    /// Output frame rate
    pub target_fps: f64,
    /// Fit or fill scaling
    pub scale_mode: ScaleMode,
    /// Overlay tint blend strength (0.0..=1.0)
    pub tint_strength: f64,
    /// Concurrent normalization tasks per folder
    pub max_parallel_normalize: usize,
    /// Per-invocation FFmpeg timeout in seconds (0 disables)
    pub ffmpeg_timeout_secs: u64,
    /// Encoding settings for every produced segment
    pub encoding: EncodingConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./dramas"),
            outro: PathBuf::from("./outro.mp4"),
            intro_audio: PathBuf::from("./intro.mp3"),
            intro_voices_dir: PathBuf::from("./intro_voices"),
            banner: PathBuf::from("./banner.png"),
            cta_audio: PathBuf::from("./cta_audio.mp3"),
            output_dir: PathBuf::from("./outputs"),
            state_file: PathBuf::from(".clipcycle_state.json"),
            folders_per_run: 6,
            max_clips_per_folder: 3,
            base_seed: 42,
            target_width: 1080,
            target_height: 1920,
            target_fps: 30.0,
            scale_mode: ScaleMode::Fit,
            tint_strength: 0.85,
            max_parallel_normalize: 2,
            ffmpeg_timeout_secs: 1800,
            encoding: EncodingConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root_dir: env_path("CLIPCYCLE_ROOT_DIR", defaults.root_dir),
            outro: env_path("CLIPCYCLE_OUTRO", defaults.outro),
            intro_audio: env_path("CLIPCYCLE_INTRO_AUDIO", defaults.intro_audio),
            intro_voices_dir: env_path("CLIPCYCLE_INTRO_VOICES_DIR", defaults.intro_voices_dir),
            banner: env_path("CLIPCYCLE_BANNER", defaults.banner),
            cta_audio: env_path("CLIPCYCLE_CTA_AUDIO", defaults.cta_audio),
            output_dir: env_path("CLIPCYCLE_OUTPUT_DIR", defaults.output_dir),
            state_file: env_path("CLIPCYCLE_STATE_FILE", defaults.state_file),
            folders_per_run: env_parse("CLIPCYCLE_FOLDERS_PER_RUN", defaults.folders_per_run),
            max_clips_per_folder: env_parse(
                "CLIPCYCLE_MAX_CLIPS_PER_FOLDER",
                defaults.max_clips_per_folder,
            ),
            base_seed: env_parse("CLIPCYCLE_BASE_SEED", defaults.base_seed),
            target_width: env_parse("CLIPCYCLE_TARGET_WIDTH", defaults.target_width),
            target_height: env_parse("CLIPCYCLE_TARGET_HEIGHT", defaults.target_height),
            target_fps: env_parse("CLIPCYCLE_TARGET_FPS", defaults.target_fps),
            scale_mode: env_parse("CLIPCYCLE_SCALE_MODE", defaults.scale_mode),
            tint_strength: env_parse("CLIPCYCLE_TINT_STRENGTH", defaults.tint_strength)
                .clamp(0.0, 1.0),
            max_parallel_normalize: env_parse(
                "CLIPCYCLE_MAX_PARALLEL_NORMALIZE",
                defaults.max_parallel_normalize,
            ),
            ffmpeg_timeout_secs: env_parse(
                "CLIPCYCLE_FFMPEG_TIMEOUT_SECS",
                defaults.ffmpeg_timeout_secs,
            ),
            encoding: defaults.encoding,
        }
    }

    /// Target geometry for the media engine.
    pub fn render_target(&self) -> RenderTarget {
        RenderTarget {
            width: self.target_width,
            height: self.target_height,
            fps: self.target_fps,
            scale_mode: self.scale_mode,
        }
    }

    /// Fixed output path for a variant in a given run slot (1-based).
    ///
    /// Paths are stable across runs; a rerun overwrites the previous output.
    pub fn output_path(&self, variant: Variant, slot: usize) -> PathBuf {
        self.output_dir
            .join(variant.as_str())
            .join(format!("v{}_{}.mp4", slot, variant.as_str()))
    }

    /// Lock file guarding the state file against concurrent runs.
    pub fn lock_file(&self) -> PathBuf {
        let mut name = self
            .state_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());
        name.push_str(".lock");
        match self.state_file.parent() {
            Some(parent) if parent != Path::new("") => parent.join(name),
            _ => PathBuf::from(name),
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.folders_per_run, 6);
        assert_eq!(config.max_clips_per_folder, 3);
        assert_eq!(config.base_seed, 42);
        assert_eq!(config.scale_mode, ScaleMode::Fit);
    }

    #[test]
    fn test_output_paths_per_variant() {
        let config = BatchConfig::default();
        assert_eq!(
            config.output_path(Variant::Social, 1),
            PathBuf::from("./outputs/social/v1_social.mp4")
        );
        assert_eq!(
            config.output_path(Variant::Production, 3),
            PathBuf::from("./outputs/production/v3_production.mp4")
        );
    }

    #[test]
    fn test_lock_file_sits_next_to_state_file() {
        let mut config = BatchConfig::default();
        config.state_file = PathBuf::from("/var/lib/clipcycle/state.json");
        assert_eq!(
            config.lock_file(),
            PathBuf::from("/var/lib/clipcycle/state.json.lock")
        );
    }
}
