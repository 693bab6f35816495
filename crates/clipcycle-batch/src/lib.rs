//! Batch cycle orchestrator for clipcycle.
//!
//! Drives the full run: resumable state, folder discovery, deterministic
//! selection, pass-derived styles, and the per-folder pipeline producing the
//! social and production variants.

pub mod config;
pub mod discover;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod select;
pub mod single;
pub mod state_store;

pub use config::BatchConfig;
pub use discover::RunAssets;
pub use error::{BatchError, BatchResult, Stage};
pub use orchestrator::{BatchOrchestrator, RunOutcome, RunReport};
pub use pipeline::{PipelineJob, VariantOutputs};
pub use state_store::{RunLock, StateStore};
