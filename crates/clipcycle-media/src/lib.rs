#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the clipcycle pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multi-input support
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeout support via tokio
//! - ffprobe-based media inspection
//! - The `MediaEngine` capability trait and its `FfmpegEngine` implementation

pub mod command;
pub mod engine;
pub mod error;
pub mod filters;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use engine::{FfmpegEngine, MediaEngine, RenderTarget};
pub use error::{MediaError, MediaResult};
pub use filters::ScaleMode;
pub use probe::{probe_duration, probe_video, VideoInfo};
pub use progress::FfmpegProgress;
