//! End-to-end orchestrator tests against an in-memory fake engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use clipcycle_batch::orchestrator::{BatchOrchestrator, RunOutcome};
use clipcycle_batch::{BatchConfig, BatchError, StateStore};
use clipcycle_media::{MediaError, MediaResult, MediaEngine, VideoInfo};
use clipcycle_models::{LookFilter, TintColor, Variant};

/// Records every operation and writes empty placeholder outputs.
#[derive(Default)]
struct FakeEngine {
    /// Operation names in call order
    calls: Mutex<Vec<String>>,
    /// Concatenations: (parts, output)
    concats: Mutex<Vec<(Vec<PathBuf>, PathBuf)>>,
    /// Source paths handed to `normalize`
    normalize_inputs: Mutex<Vec<PathBuf>>,
    /// Fail `normalize` for inputs whose path contains this marker
    fail_normalize_on: Option<String>,
    /// Sleep this long inside each successful `normalize`
    normalize_delay: Option<Duration>,
    /// Number of `normalize` calls that ran to completion
    completed_normalizes: Mutex<usize>,
}

impl FakeEngine {
    fn failing_on(marker: &str) -> Self {
        Self {
            fail_normalize_on: Some(marker.to_string()),
            ..Default::default()
        }
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }

    fn ops(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn completed(&self) -> usize {
        *self.completed_normalizes.lock().unwrap()
    }

    fn touch(output: &Path) -> MediaResult<()> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, b"")?;
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn probe(&self, _clip: &Path) -> MediaResult<VideoInfo> {
        self.record("probe");
        Ok(VideoInfo {
            duration: 10.0,
            width: 1920,
            height: 1080,
            fps: 30.0,
            has_audio: true,
        })
    }

    async fn normalize(&self, clip: &Path, output: &Path) -> MediaResult<()> {
        self.record("normalize");
        self.normalize_inputs
            .lock()
            .unwrap()
            .push(clip.to_path_buf());
        if let Some(marker) = &self.fail_normalize_on {
            if clip.to_string_lossy().contains(marker.as_str()) {
                return Err(MediaError::invalid_video(format!(
                    "injected failure for {}",
                    clip.display()
                )));
            }
        }
        if let Some(delay) = self.normalize_delay {
            tokio::time::sleep(delay).await;
        }
        *self.completed_normalizes.lock().unwrap() += 1;
        Self::touch(output)
    }

    async fn apply_overlay_tint(
        &self,
        _clip: &Path,
        _image: &Path,
        _color: TintColor,
        _strength: f64,
        output: &Path,
    ) -> MediaResult<()> {
        self.record("apply_overlay_tint");
        Self::touch(output)
    }

    async fn apply_look(&self, _clip: &Path, _look: LookFilter, output: &Path) -> MediaResult<()> {
        self.record("apply_look");
        Self::touch(output)
    }

    async fn apply_zoom_speed(
        &self,
        _clip: &Path,
        _zoom: f64,
        _speed: f64,
        output: &Path,
    ) -> MediaResult<()> {
        self.record("apply_zoom_speed");
        Self::touch(output)
    }

    async fn insert_banner(&self, _clip: &Path, _image: &Path, output: &Path) -> MediaResult<()> {
        self.record("insert_banner");
        Self::touch(output)
    }

    async fn extract_last_frame(&self, _clip: &Path, output: &Path) -> MediaResult<()> {
        self.record("extract_last_frame");
        Self::touch(output)
    }

    async fn compose_image_audio(
        &self,
        _image: &Path,
        _audio: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        self.record("compose_image_audio");
        Self::touch(output)
    }

    async fn dub_audio(&self, _clip: &Path, _audio: &Path, output: &Path) -> MediaResult<()> {
        self.record("dub_audio");
        Self::touch(output)
    }

    async fn concatenate(&self, parts: &[PathBuf], output: &Path) -> MediaResult<()> {
        self.record("concatenate");
        self.concats
            .lock()
            .unwrap()
            .push((parts.to_vec(), output.to_path_buf()));
        Self::touch(output)
    }
}

/// Filesystem fixture: root with drama folders plus the shared assets.
struct Fixture {
    _dir: TempDir,
    config: BatchConfig,
}

impl Fixture {
    fn new(folders: &[(&str, usize)]) -> Self {
        Self::build(folders, true, true)
    }

    fn build(folders: &[(&str, usize)], banner: bool, cta: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("dramas");
        fs::create_dir(&root).unwrap();

        for (name, clips) in folders {
            let folder = root.join(name);
            fs::create_dir(&folder).unwrap();
            for i in 1..=*clips {
                fs::write(folder.join(format!("clip_{i:02}.mp4")), b"").unwrap();
            }
        }

        let mut config = BatchConfig::default();
        config.root_dir = root;
        config.outro = dir.path().join("outro.mp4");
        config.intro_audio = dir.path().join("intro.mp3");
        config.intro_voices_dir = dir.path().join("intro_voices");
        config.banner = dir.path().join("banner.png");
        config.cta_audio = dir.path().join("cta_audio.mp3");
        config.output_dir = dir.path().join("outputs");
        config.state_file = dir.path().join("state.json");

        fs::write(&config.outro, b"").unwrap();
        fs::write(&config.intro_audio, b"").unwrap();
        if banner {
            fs::write(&config.banner, b"").unwrap();
        }
        if cta {
            fs::write(&config.cta_audio, b"").unwrap();
        }

        Self { _dir: dir, config }
    }

    fn state(&self) -> clipcycle_models::BatchState {
        StateStore::new(&self.config.state_file).load().unwrap()
    }
}

#[tokio::test]
async fn full_pass_marks_all_done_and_advances() {
    // Scenario A: 3 folders, pick-count 6, pass 0.
    let fixture = Fixture::new(&[("ep_1", 2), ("ep_2", 2), ("ep_3", 2)]);
    let engine = Arc::new(FakeEngine::default());
    let orchestrator = BatchOrchestrator::new(engine.clone(), fixture.config.clone());

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.pass_index, 0);
    assert_eq!(report.succeeded, vec!["ep_1", "ep_2", "ep_3"]);
    assert!(report.failed.is_empty());
    assert_eq!(report.outcome(), RunOutcome::Success);
    assert!(report.pass_completed);

    // Done was reset and the pass advanced as the run's final act.
    let state = fixture.state();
    assert_eq!(state.pass_index, 1);
    assert!(state.done.is_empty());

    // Two variants per folder.
    assert_eq!(report.artifacts.len(), 6);
    for artifact in &report.artifacts {
        assert!(artifact.path.exists());
    }
}

#[tokio::test]
async fn failed_folder_stays_pending_and_retries_next_run() {
    // Scenario D: folder 2 of 3 fails during normalization.
    let fixture = Fixture::new(&[("ep_1", 2), ("ep_2", 2), ("ep_3", 2)]);

    let engine = Arc::new(FakeEngine::failing_on("ep_2"));
    let orchestrator = BatchOrchestrator::new(engine, fixture.config.clone());
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.succeeded, vec!["ep_1", "ep_3"]);
    assert_eq!(report.failed, vec!["ep_2"]);
    assert_eq!(report.outcome(), RunOutcome::PartialSuccess);
    assert!(!report.pass_completed);

    let state = fixture.state();
    assert_eq!(state.pass_index, 0);
    assert!(!state.done.contains("ep_2"));

    // Next run retries only the failed folder, then completes the pass.
    let engine = Arc::new(FakeEngine::default());
    let orchestrator = BatchOrchestrator::new(engine, fixture.config.clone());
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.succeeded, vec!["ep_2"]);
    assert!(report.pass_completed);
    assert_eq!(fixture.state().pass_index, 1);
}

#[tokio::test]
async fn no_normalization_work_survives_a_failed_folder() {
    // One clip fails instantly while its siblings are still normalizing;
    // by the time the run returns, none of them may still be in flight.
    let fixture = Fixture::new(&[("ep_1", 3)]);
    let engine = Arc::new(FakeEngine {
        fail_normalize_on: Some("clip_01".to_string()),
        normalize_delay: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    let orchestrator = BatchOrchestrator::new(engine.clone(), fixture.config.clone());

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.failed, vec!["ep_1"]);

    let at_return = engine.completed();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(
        engine.completed(),
        at_return,
        "normalization tasks must not keep running after the folder failed"
    );
}

#[tokio::test]
async fn all_folders_failing_is_a_failed_run() {
    let fixture = Fixture::new(&[("ep_1", 1), ("ep_2", 1)]);
    let engine = Arc::new(FakeEngine::failing_on("clip_"));
    let orchestrator = BatchOrchestrator::new(engine, fixture.config.clone());

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.outcome(), RunOutcome::Failure);
    assert!(fixture.state().done.is_empty());
}

#[tokio::test]
async fn production_variant_is_social_without_intro() {
    let fixture = Fixture::new(&[("ep_1", 3)]);
    let engine = Arc::new(FakeEngine::default());
    let orchestrator = BatchOrchestrator::new(engine.clone(), fixture.config.clone());

    orchestrator.run().await.unwrap();

    let concats = engine.concats.lock().unwrap().clone();
    assert_eq!(concats.len(), 2);

    let social = concats
        .iter()
        .find(|(_, out)| out.to_string_lossy().contains(Variant::Social.as_str()))
        .unwrap();
    let production = concats
        .iter()
        .find(|(_, out)| out.to_string_lossy().contains(Variant::Production.as_str()))
        .unwrap();

    // Identical suffix, intro only at the front of the social cut.
    assert_eq!(social.0[1..], production.0[..]);
    // normalized clips + CTA + outro
    assert_eq!(production.0.len(), 3 + 1 + 1);
}

#[tokio::test]
async fn missing_banner_skips_banner_stage() {
    // Scenario C: no banner asset, no error.
    let fixture = Fixture::build(&[("ep_1", 3)], false, true);
    let engine = Arc::new(FakeEngine::default());
    let orchestrator = BatchOrchestrator::new(engine.clone(), fixture.config.clone());

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.outcome(), RunOutcome::Success);
    assert!(!engine.ops().iter().any(|op| op == "insert_banner"));
}

#[tokio::test]
async fn missing_cta_audio_skips_cta_segment() {
    let fixture = Fixture::build(&[("ep_1", 2)], true, false);
    let engine = Arc::new(FakeEngine::default());
    let orchestrator = BatchOrchestrator::new(engine.clone(), fixture.config.clone());

    orchestrator.run().await.unwrap();

    let ops = engine.ops();
    assert!(!ops.iter().any(|op| op == "extract_last_frame"));
    assert!(!ops.iter().any(|op| op == "compose_image_audio"));

    let concats = engine.concats.lock().unwrap().clone();
    // normalized clips + outro, no CTA
    let production = concats
        .iter()
        .find(|(_, out)| out.to_string_lossy().contains("production"))
        .unwrap();
    assert_eq!(production.0.len(), 2 + 1);
}

#[tokio::test]
async fn banner_goes_on_every_clip_except_the_first() {
    let fixture = Fixture::new(&[("ep_1", 3)]);
    let engine = Arc::new(FakeEngine::default());
    let orchestrator = BatchOrchestrator::new(engine.clone(), fixture.config.clone());

    orchestrator.run().await.unwrap();

    let banner_count = engine.ops().iter().filter(|op| *op == "insert_banner").count();
    assert_eq!(banner_count, 2);
}

#[tokio::test]
async fn empty_folder_counts_as_done_without_engine_work() {
    let fixture = Fixture::new(&[("empty_show", 0), ("ep_1", 1)]);
    let engine = Arc::new(FakeEngine::default());
    let orchestrator = BatchOrchestrator::new(engine.clone(), fixture.config.clone());

    let report = orchestrator.run().await.unwrap();
    assert_eq!(report.skipped, vec!["empty_show"]);
    assert_eq!(report.succeeded, vec!["ep_1"]);
    assert!(report.pass_completed);
}

#[tokio::test]
async fn missing_outro_aborts_before_any_folder() {
    let fixture = Fixture::new(&[("ep_1", 2)]);
    fs::remove_file(&fixture.config.outro).unwrap();

    let engine = Arc::new(FakeEngine::default());
    let orchestrator = BatchOrchestrator::new(engine.clone(), fixture.config.clone());

    let err = orchestrator.run().await.unwrap_err();
    assert!(matches!(err, BatchError::Config(_)));
    assert!(engine.ops().is_empty());
}

#[tokio::test]
async fn selection_is_identical_across_repeated_runs_of_the_same_pass() {
    // Same pass, same folder, same seed: the clips chosen for a folder must
    // not change between an initial run and a later rerun of the same pass.
    let fixture = Fixture::new(&[("ep_1", 5), ("ep_2", 5)]);

    let engine = Arc::new(FakeEngine::default());
    BatchOrchestrator::new(engine.clone(), fixture.config.clone())
        .run()
        .await
        .unwrap();
    let first = selected_clips(&engine, "ep_1");
    assert_eq!(first.len(), 3);

    // Reset state to replay pass 0 from scratch.
    fs::remove_file(&fixture.config.state_file).unwrap();
    let engine = Arc::new(FakeEngine::default());
    BatchOrchestrator::new(engine.clone(), fixture.config.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(first, selected_clips(&engine, "ep_1"));
}

/// Clip file names from a folder that reached normalization, sorted because
/// bounded-parallel tasks record in completion order.
fn selected_clips(engine: &FakeEngine, folder_id: &str) -> Vec<String> {
    let mut names: Vec<String> = engine
        .normalize_inputs
        .lock()
        .unwrap()
        .iter()
        .filter(|p| p.to_string_lossy().contains(folder_id))
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
