//! Batch-level orchestration.
//!
//! One run: load state, discover folders, pick the next unfinished batch,
//! process each folder through the pipeline, and advance the pass when the
//! whole folder set is done. Folder failures never abort the run; the run as
//! a whole fails only when nothing succeeded.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use clipcycle_media::MediaEngine;
use clipcycle_models::{Folder, OutputArtifact, StylePack, Variant};

use crate::config::BatchConfig;
use crate::discover;
use crate::error::{BatchError, BatchResult};
use crate::pipeline::{self, PipelineJob, VariantOutputs};
use crate::select;
use crate::state_store::{RunLock, StateStore};

/// Overall result of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every attempted folder succeeded
    Success,
    /// Some folders succeeded, some failed
    PartialSuccess,
    /// Folders were attempted and none succeeded
    Failure,
}

/// What one run did, for logging and the process exit code.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Pass the run executed in
    pub pass_index: u32,
    /// Folders fully processed and marked done
    pub succeeded: Vec<String>,
    /// Folders that hit an engine error; left pending for the next run
    pub failed: Vec<String>,
    /// Folders with no clips, counted as done without engine work
    pub skipped: Vec<String>,
    /// Artifacts produced this run
    pub artifacts: Vec<OutputArtifact>,
    /// Whether this run completed the pass
    pub pass_completed: bool,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if self.failed.is_empty() {
            RunOutcome::Success
        } else if self.succeeded.is_empty() && self.skipped.is_empty() {
            RunOutcome::Failure
        } else {
            RunOutcome::PartialSuccess
        }
    }
}

/// Drives full batch runs against an injected media engine.
pub struct BatchOrchestrator {
    engine: Arc<dyn MediaEngine>,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(engine: Arc<dyn MediaEngine>, config: BatchConfig) -> Self {
        Self { engine, config }
    }

    /// Execute one run.
    pub async fn run(&self) -> BatchResult<RunReport> {
        let config = &self.config;

        let folders = discover::discover_folders(&config.root_dir)?;
        if folders.is_empty() {
            return Err(BatchError::config(format!(
                "No drama folders under: {}",
                config.root_dir.display()
            )));
        }
        let all_ids: Vec<String> = folders.iter().map(|f| f.id.clone()).collect();

        // Single writer for the whole run; released on drop.
        let _lock = RunLock::acquire(config.lock_file())?;

        let store = StateStore::new(&config.state_file);
        let mut state = store.load()?;
        store.reconcile(&mut state, all_ids.iter().map(String::as_str))?;
        // A previous run may have finished the pass as its final act.
        store.advance_pass_if_complete(&mut state, all_ids.iter().map(String::as_str))?;

        // Required assets are checked before any folder is touched.
        let assets = discover::resolve_assets(config, state.pass_index)?;
        let style = StylePack::for_pass(state.pass_index);
        info!(pass_index = state.pass_index, %style, "Starting run");

        let done: BTreeSet<String> = state.done.clone();
        let picked = select::select_next(&all_ids, &done, config.folders_per_run);

        let mut report = RunReport {
            pass_index: state.pass_index,
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            artifacts: Vec::new(),
            pass_completed: false,
        };

        for (slot, folder_id) in picked.iter().enumerate() {
            let folder = folders
                .iter()
                .find(|f| &f.id == folder_id)
                .expect("picked ids come from the discovered set");

            if !folder.has_clips() {
                info!(folder = %folder_id, "No clips; counting as done");
                store.mark_done(&mut state, folder_id)?;
                report.skipped.push(folder_id.clone());
                continue;
            }

            match self
                .process_one(folder, style, &assets, state.pass_index, slot + 1)
                .await
            {
                Ok(artifacts) => {
                    // Done is persisted only after both variants exist.
                    store.mark_done(&mut state, folder_id)?;
                    info!(folder = %folder_id, "Folder done");
                    report.succeeded.push(folder_id.clone());
                    report.artifacts.extend(artifacts);
                }
                Err(e) if e.is_folder_fatal() => {
                    error!(folder = %folder_id, error = %e, "Folder failed; will retry next run");
                    report.failed.push(folder_id.clone());
                }
                Err(e) => return Err(e),
            }
        }

        report.pass_completed =
            store.advance_pass_if_complete(&mut state, all_ids.iter().map(String::as_str))?;

        match report.outcome() {
            RunOutcome::Success => info!(
                succeeded = report.succeeded.len(),
                skipped = report.skipped.len(),
                "Run complete"
            ),
            RunOutcome::PartialSuccess => warn!(
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Run partially succeeded"
            ),
            RunOutcome::Failure => error!(failed = report.failed.len(), "Run failed"),
        }

        Ok(report)
    }

    async fn process_one(
        &self,
        folder: &Folder,
        style: StylePack,
        assets: &discover::RunAssets,
        pass_index: u32,
        slot: usize,
    ) -> BatchResult<Vec<OutputArtifact>> {
        let plan = select::select_clips(
            folder,
            self.config.base_seed,
            pass_index,
            self.config.max_clips_per_folder,
        );

        let job = PipelineJob {
            folder: folder.clone(),
            style,
            plan,
            assets: assets.clone(),
            outputs: VariantOutputs::both(
                self.config.output_path(Variant::Social, slot),
                self.config.output_path(Variant::Production, slot),
            ),
        };

        pipeline::process_folder(self.engine.clone(), &self.config, job).await
    }
}
