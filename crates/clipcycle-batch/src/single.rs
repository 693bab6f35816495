//! Single-folder debug mode.
//!
//! Processes one folder directly with explicit parameters, bypassing the
//! state machine, run lock, and output slots. Produces the social variant
//! only.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use clipcycle_media::MediaEngine;
use clipcycle_models::{OutputArtifact, StylePack};

use crate::config::BatchConfig;
use crate::discover::{self, RunAssets};
use crate::error::{BatchError, BatchResult};
use crate::pipeline::{self, PipelineJob, VariantOutputs};
use crate::select;

/// Explicit parameters for a single-folder run.
#[derive(Debug, Clone)]
pub struct SingleRun {
    /// Folder of clips to process
    pub folder: PathBuf,
    /// Intro audio track
    pub intro_audio: PathBuf,
    /// Outro video
    pub outro: PathBuf,
    /// Where the produced variant lands
    pub output: PathBuf,
    /// Shuffle seed
    pub seed: u64,
    /// Maximum clips to select
    pub max_clips: usize,
    /// Pass index to resolve the style from
    pub pass_index: u32,
}

/// Run one folder directly.
pub async fn run_single(
    engine: Arc<dyn MediaEngine>,
    config: &BatchConfig,
    run: SingleRun,
) -> BatchResult<OutputArtifact> {
    if !run.outro.is_file() {
        return Err(BatchError::config(format!(
            "Outro video not found: {}",
            run.outro.display()
        )));
    }
    if !run.intro_audio.is_file() {
        return Err(BatchError::config(format!(
            "Intro audio not found: {}",
            run.intro_audio.display()
        )));
    }

    let folder = discover::read_folder(&run.folder)?;
    if !folder.has_clips() {
        return Err(BatchError::config(format!(
            "No video clips in: {}",
            run.folder.display()
        )));
    }

    let plan = select::select_clips(&folder, run.seed, run.pass_index, run.max_clips);
    let style = StylePack::for_pass(run.pass_index);
    info!(folder = %folder.id, clips = plan.clips.len(), %style, "Single-folder run");

    let assets = RunAssets {
        outro: run.outro.clone(),
        intro_audio: run.intro_audio.clone(),
        banner: config.banner.is_file().then(|| config.banner.clone()),
        cta_audio: config.cta_audio.is_file().then(|| config.cta_audio.clone()),
    };

    let job = PipelineJob {
        folder,
        style,
        plan,
        assets,
        outputs: VariantOutputs::social_only(&run.output),
    };

    let mut artifacts = pipeline::process_folder(engine, config, job).await?;
    artifacts
        .pop()
        .ok_or_else(|| BatchError::internal("Single run produced no artifact"))
}
