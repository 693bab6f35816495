//! Shared data models for the clipcycle batch pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Resumable batch state (pass counter + done set)
//! - Visual style packs rotated per pass
//! - Folders, clip selection plans, and the folder state machine
//! - Output variants and artifacts
//! - Encoding configuration

pub mod artifact;
pub mod encoding;
pub mod folder;
pub mod state;
pub mod style;

// Re-export common types
pub use artifact::{ArtifactStatus, OutputArtifact, Variant};
pub use encoding::EncodingConfig;
pub use folder::{Folder, FolderPhase, SelectionPlan};
pub use state::BatchState;
pub use style::{LookFilter, MotionPreset, StylePack, TintColor};
