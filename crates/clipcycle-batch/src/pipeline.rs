//! Per-folder processing pipeline.
//!
//! One shared normalization pass per selected clip feeds both output
//! variants; the social cut prepends an intro segment, and both share the
//! CTA + outro suffix. Scratch files live in a `TempDir` that is cleaned up
//! on every exit path, including failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use clipcycle_media::MediaEngine;
use clipcycle_models::{
    Folder, FolderPhase, OutputArtifact, SelectionPlan, StylePack, Variant,
};

use crate::config::BatchConfig;
use crate::discover::RunAssets;
use crate::error::{BatchError, BatchResult, Stage};

/// Where each variant should land; `None` disables the variant.
#[derive(Debug, Clone, Default)]
pub struct VariantOutputs {
    pub social: Option<PathBuf>,
    pub production: Option<PathBuf>,
}

impl VariantOutputs {
    pub fn both(social: impl Into<PathBuf>, production: impl Into<PathBuf>) -> Self {
        Self {
            social: Some(social.into()),
            production: Some(production.into()),
        }
    }

    pub fn social_only(social: impl Into<PathBuf>) -> Self {
        Self {
            social: Some(social.into()),
            production: None,
        }
    }
}

/// Everything needed to process one folder. Lives for one folder within one
/// run; discarded after success or failure.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub folder: Folder,
    pub style: StylePack,
    pub plan: SelectionPlan,
    pub assets: RunAssets,
    pub outputs: VariantOutputs,
}

/// Run one folder through the full stage graph.
///
/// Returns the produced artifacts on success. Any engine failure is wrapped
/// with folder and stage context and is fatal to this folder only.
pub async fn process_folder(
    engine: Arc<dyn MediaEngine>,
    config: &BatchConfig,
    job: PipelineJob,
) -> BatchResult<Vec<OutputArtifact>> {
    let folder_id = job.folder.id.clone();
    let mut phase = FolderPhase::Pending;
    set_phase(&folder_id, &mut phase, FolderPhase::Selected);

    let result = run_stages(engine, config, &job, &mut phase).await;
    match result {
        Ok(artifacts) => {
            set_phase(&folder_id, &mut phase, FolderPhase::Done);
            Ok(artifacts)
        }
        Err(e) => {
            set_phase(&folder_id, &mut phase, FolderPhase::Failed);
            Err(e)
        }
    }
}

async fn run_stages(
    engine: Arc<dyn MediaEngine>,
    config: &BatchConfig,
    job: &PipelineJob,
    phase: &mut FolderPhase,
) -> BatchResult<Vec<OutputArtifact>> {
    let folder_id = &job.folder.id;
    if job.plan.is_empty() {
        return Err(BatchError::internal(format!(
            "Pipeline invoked with an empty selection for '{folder_id}'"
        )));
    }

    let scratch = TempDir::with_prefix(format!("clipcycle_{folder_id}_"))?;
    info!(
        folder = %folder_id,
        clips = job.plan.clips.len(),
        style = %job.style,
        "Processing folder"
    );

    set_phase(folder_id, phase, FolderPhase::Normalizing);
    let normalized = normalize_clips(engine.clone(), config, job, scratch.path()).await?;

    // Intro (social variant only): first normalized clip dubbed with the
    // intro audio.
    let intro = if job.outputs.social.is_some() {
        let path = scratch.path().join("intro.mp4");
        engine
            .dub_audio(&normalized[0], &job.assets.intro_audio, &path)
            .await
            .map_err(|e| BatchError::stage(Stage::Intro, folder_id, e))?;
        Some(path)
    } else {
        None
    };

    // CTA segment: last frame of the last clip + CTA audio. Skipped without
    // the audio asset.
    let cta = match &job.assets.cta_audio {
        Some(audio) => {
            let frame = scratch.path().join("cta_frame.png");
            let last = normalized.last().expect("selection is non-empty");
            engine
                .extract_last_frame(last, &frame)
                .await
                .map_err(|e| BatchError::stage(Stage::Cta, folder_id, e))?;

            let segment = scratch.path().join("cta.mp4");
            engine
                .compose_image_audio(&frame, audio, &segment)
                .await
                .map_err(|e| BatchError::stage(Stage::Cta, folder_id, e))?;
            Some(segment)
        }
        None => {
            debug!(folder = %folder_id, "No CTA audio, skipping CTA segment");
            None
        }
    };

    // The outro is normalized plain: no look, tint, or motion.
    let outro = scratch.path().join("outro.mp4");
    engine
        .normalize(&job.assets.outro, &outro)
        .await
        .map_err(|e| BatchError::stage(Stage::Outro, folder_id, e))?;

    set_phase(folder_id, phase, FolderPhase::Assembling);
    let mut artifacts = Vec::new();

    // Both variants share the normalized clips + CTA + outro suffix; the
    // social cut only adds the intro up front.
    let suffix: Vec<PathBuf> = normalized
        .iter()
        .cloned()
        .chain(cta.clone())
        .chain(std::iter::once(outro))
        .collect();

    if let (Some(intro), Some(social_out)) = (&intro, &job.outputs.social) {
        let mut parts = Vec::with_capacity(suffix.len() + 1);
        parts.push(intro.clone());
        parts.extend(suffix.iter().cloned());
        assemble(&engine, folder_id, &parts, social_out).await?;
        artifacts.push(OutputArtifact::produced(Variant::Social, social_out));
    }

    if let Some(production_out) = &job.outputs.production {
        assemble(&engine, folder_id, &suffix, production_out).await?;
        artifacts.push(OutputArtifact::produced(Variant::Production, production_out));
    }

    Ok(artifacts)
}

/// Normalize every selected clip, bounded by the configured concurrency.
///
/// Tasks may finish in any order; results are joined in selection order so
/// the final concatenation order never depends on scheduling. On the first
/// failure the remaining tasks are aborted and drained, so no normalization
/// work outlives the folder or writes into its removed scratch directory.
async fn normalize_clips(
    engine: Arc<dyn MediaEngine>,
    config: &BatchConfig,
    job: &PipelineJob,
    scratch: &Path,
) -> BatchResult<Vec<PathBuf>> {
    let semaphore = Arc::new(Semaphore::new(config.max_parallel_normalize.max(1)));
    let mut handles = Vec::with_capacity(job.plan.clips.len());

    for (index, clip) in job.plan.clips.iter().enumerate() {
        let engine = engine.clone();
        let semaphore = semaphore.clone();
        let clip = clip.clone();
        let scratch = scratch.to_path_buf();
        let folder_id = job.folder.id.clone();
        let style = job.style;
        let overlay = job.folder.overlay.clone();
        // Banner on every clip except the first.
        let banner = (index > 0)
            .then(|| job.assets.banner.clone())
            .flatten();
        let tint_strength = config.tint_strength;

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| BatchError::internal("Normalization semaphore closed"))?;
            normalize_one(
                engine.as_ref(),
                &scratch,
                &folder_id,
                &clip,
                index,
                style,
                overlay.as_deref(),
                banner.as_deref(),
                tint_strength,
            )
            .await
        }));
    }

    let mut normalized = Vec::with_capacity(handles.len());
    let mut failure: Option<BatchError> = None;
    for handle in handles {
        if failure.is_some() {
            handle.abort();
        }
        match handle.await {
            Ok(Ok(path)) => normalized.push(path),
            Ok(Err(e)) => {
                if failure.is_none() {
                    failure = Some(e);
                }
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                if failure.is_none() {
                    failure = Some(BatchError::internal(format!(
                        "Normalization task panicked: {e}"
                    )));
                }
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(normalized),
    }
}

/// Run one clip through the normalization chain:
/// normalize → overlay tint → look → zoom/speed → banner.
#[allow(clippy::too_many_arguments)]
async fn normalize_one(
    engine: &dyn MediaEngine,
    scratch: &Path,
    folder_id: &str,
    clip: &Path,
    index: usize,
    style: StylePack,
    overlay: Option<&Path>,
    banner: Option<&Path>,
    tint_strength: f64,
) -> BatchResult<PathBuf> {
    let step = |suffix: &str| scratch.join(format!("norm_{index:02}_{suffix}.mp4"));

    let base = step("base");
    engine
        .normalize(clip, &base)
        .await
        .map_err(|e| BatchError::stage(Stage::Normalize, folder_id, e))?;
    let mut current = base;

    if let Some(overlay) = overlay {
        let tinted = step("tint");
        engine
            .apply_overlay_tint(&current, overlay, style.tint, tint_strength, &tinted)
            .await
            .map_err(|e| BatchError::stage(Stage::OverlayTint, folder_id, e))?;
        current = tinted;
    }

    let looked = step("look");
    engine
        .apply_look(&current, style.look, &looked)
        .await
        .map_err(|e| BatchError::stage(Stage::Look, folder_id, e))?;
    current = looked;

    let motion = step("motion");
    engine
        .apply_zoom_speed(&current, style.motion.zoom, style.motion.speed, &motion)
        .await
        .map_err(|e| BatchError::stage(Stage::ZoomSpeed, folder_id, e))?;
    current = motion;

    if let Some(banner) = banner {
        let bannered = step("banner");
        engine
            .insert_banner(&current, banner, &bannered)
            .await
            .map_err(|e| BatchError::stage(Stage::Banner, folder_id, e))?;
        current = bannered;
    }

    Ok(current)
}

async fn assemble(
    engine: &Arc<dyn MediaEngine>,
    folder_id: &str,
    parts: &[PathBuf],
    output: &Path,
) -> BatchResult<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    engine
        .concatenate(parts, output)
        .await
        .map_err(|e| BatchError::stage(Stage::Assemble, folder_id, e))
}

fn set_phase(folder_id: &str, phase: &mut FolderPhase, next: FolderPhase) {
    debug_assert!(
        phase.can_transition_to(next),
        "invalid transition {phase} -> {next}"
    );
    debug!(folder = %folder_id, from = %phase, to = %next, "Folder phase");
    *phase = next;
}
