//! The media engine capability trait and its FFmpeg implementation.
//!
//! The batch orchestrator only ever talks to `MediaEngine`, so the state
//! machine and selection logic are testable against an in-memory fake while
//! production runs drive real FFmpeg processes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use clipcycle_models::{EncodingConfig, LookFilter, TintColor};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{
    atempo_filter, audio_format, concat_filter, normalize_chain, overlay_prep_chain,
    silent_audio_source, speed_filter, tint_chains, zoom_chain, ScaleMode,
};
use crate::probe::{probe_duration, probe_video, VideoInfo};

/// Target geometry shared by every operation of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Output frame rate
    pub fps: f64,
    /// Fit or fill scaling
    pub scale_mode: ScaleMode,
}

impl Default for RenderTarget {
    fn default() -> Self {
        // 9:16 short-form portrait at 30 fps
        Self {
            width: 1080,
            height: 1920,
            fps: 30.0,
            scale_mode: ScaleMode::Fit,
        }
    }
}

/// Transcode and composition operations the pipeline requires.
///
/// Every operation is blocking and resource-intensive in the real
/// implementation; failures are fatal to the folder being processed, never to
/// the whole run.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Inspect a video file.
    async fn probe(&self, clip: &Path) -> MediaResult<VideoInfo>;

    /// Scale/pad to the target geometry, force the target frame rate, and
    /// conform audio (injecting silence when the source has none).
    async fn normalize(&self, clip: &Path, output: &Path) -> MediaResult<()>;

    /// Composite a tinted overlay image across the whole frame.
    async fn apply_overlay_tint(
        &self,
        clip: &Path,
        image: &Path,
        color: TintColor,
        strength: f64,
        output: &Path,
    ) -> MediaResult<()>;

    /// Apply a look filter.
    async fn apply_look(&self, clip: &Path, look: LookFilter, output: &Path) -> MediaResult<()>;

    /// Apply zoom and playback-speed factors.
    async fn apply_zoom_speed(
        &self,
        clip: &Path,
        zoom: f64,
        speed: f64,
        output: &Path,
    ) -> MediaResult<()>;

    /// Composite a banner image over the clip.
    async fn insert_banner(&self, clip: &Path, image: &Path, output: &Path) -> MediaResult<()>;

    /// Extract the last frame of a clip as a still image.
    async fn extract_last_frame(&self, clip: &Path, output: &Path) -> MediaResult<()>;

    /// Build a segment from a still image and an audio track.
    async fn compose_image_audio(
        &self,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> MediaResult<()>;

    /// Replace a clip's audio with the given track, trimming the clip to the
    /// track's duration.
    async fn dub_audio(&self, clip: &Path, audio: &Path, output: &Path) -> MediaResult<()>;

    /// Concatenate segments in order into one clip.
    async fn concatenate(&self, parts: &[PathBuf], output: &Path) -> MediaResult<()>;
}

/// `MediaEngine` backed by ffmpeg/ffprobe subprocesses.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    target: RenderTarget,
    encoding: EncodingConfig,
    timeout_secs: Option<u64>,
}

impl FfmpegEngine {
    pub fn new(target: RenderTarget, encoding: EncodingConfig) -> Self {
        Self {
            target,
            encoding,
            timeout_secs: None,
        }
    }

    /// Kill any single FFmpeg invocation running longer than `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn target(&self) -> RenderTarget {
        self.target
    }

    fn runner(&self) -> FfmpegRunner {
        match self.timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        }
    }

    fn conform_audio(&self) -> String {
        audio_format(self.encoding.audio_rate, self.encoding.audio_channels)
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe(&self, clip: &Path) -> MediaResult<VideoInfo> {
        probe_video(clip).await
    }

    async fn normalize(&self, clip: &Path, output: &Path) -> MediaResult<()> {
        let info = probe_video(clip).await?;
        let t = self.target;

        let mut cmd = FfmpegCommand::new(output).input(clip);
        let audio_index = if info.has_audio {
            0
        } else {
            // Silent source is unbounded; -shortest trims it to the video.
            cmd = cmd.lavfi_input(silent_audio_source(
                self.encoding.audio_rate,
                self.encoding.audio_channels,
            ));
            1
        };

        let graph = format!(
            "[0:v]{},format=yuv420p[v];[{}:a]{}[a]",
            normalize_chain(t.scale_mode, t.width, t.height, t.fps),
            audio_index,
            self.conform_audio(),
        );

        let cmd = cmd
            .filter_complex(graph)
            .map("[v]")
            .map("[a]")
            .shortest()
            .encode(&self.encoding);

        self.runner().run(&cmd).await
    }

    async fn apply_overlay_tint(
        &self,
        clip: &Path,
        image: &Path,
        color: TintColor,
        strength: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let t = self.target;
        let mut chains = tint_chains("1:v", "ov", t.width, t.height, color.rgb(), strength, "t_");
        chains.push("[0:v][ov]overlay=0:0:format=auto,format=yuv420p[v]".to_string());
        chains.push(format!("[0:a]{}[a]", self.conform_audio()));

        let cmd = FfmpegCommand::new(output)
            .input(clip)
            .looped_image_input(image)
            .filter_complex(chains.join(";"))
            .map("[v]")
            .map("[a]")
            .shortest()
            .encode(&self.encoding);

        debug!(image = %image.display(), strength, "Applying tinted overlay");
        self.runner().run(&cmd).await
    }

    async fn apply_look(&self, clip: &Path, look: LookFilter, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(output)
            .input(clip)
            .video_filter(format!("{},format=yuv420p", look.ffmpeg_expr()))
            .encode(&self.encoding);

        self.runner().run(&cmd).await
    }

    async fn apply_zoom_speed(
        &self,
        clip: &Path,
        zoom: f64,
        speed: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let t = self.target;
        let video_parts: Vec<String> = [speed_filter(speed), zoom_chain(zoom, t.width, t.height)]
            .into_iter()
            .flatten()
            .collect();

        if video_parts.is_empty() {
            // Unity zoom and speed: nothing to do
            tokio::fs::copy(clip, output).await?;
            return Ok(());
        }

        let audio_parts: Vec<String> = [atempo_filter(speed), Some(self.conform_audio())]
            .into_iter()
            .flatten()
            .collect();

        let graph = format!(
            "[0:v]{},format=yuv420p[v];[0:a]{}[a]",
            video_parts.join(","),
            audio_parts.join(","),
        );

        let cmd = FfmpegCommand::new(output)
            .input(clip)
            .filter_complex(graph)
            .map("[v]")
            .map("[a]")
            .encode(&self.encoding);

        self.runner().run(&cmd).await
    }

    async fn insert_banner(&self, clip: &Path, image: &Path, output: &Path) -> MediaResult<()> {
        let t = self.target;
        let graph = format!(
            "[1:v]{}[banner];[0:v][banner]overlay=0:0:format=auto,format=yuv420p[v];[0:a]{}[a]",
            overlay_prep_chain(t.width, t.height),
            self.conform_audio(),
        );

        let cmd = FfmpegCommand::new(output)
            .input(clip)
            .looped_image_input(image)
            .filter_complex(graph)
            .map("[v]")
            .map("[a]")
            .shortest()
            .encode(&self.encoding);

        self.runner().run(&cmd).await
    }

    async fn extract_last_frame(&self, clip: &Path, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(output)
            .input_with_args(["-sseof", "-0.1"], clip)
            .single_frame();

        self.runner().run(&cmd).await
    }

    async fn compose_image_audio(
        &self,
        image: &Path,
        audio: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        let t = self.target;
        let graph = format!(
            "[0:v]{},format=yuv420p[v];[1:a]{}[a]",
            normalize_chain(t.scale_mode, t.width, t.height, t.fps),
            self.conform_audio(),
        );

        let cmd = FfmpegCommand::new(output)
            .looped_image_input(image)
            .input(audio)
            .filter_complex(graph)
            .map("[v]")
            .map("[a]")
            .shortest()
            .encode(&self.encoding);

        self.runner().run(&cmd).await
    }

    async fn dub_audio(&self, clip: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        let mut duration = probe_duration(audio).await?;
        if duration <= 0.05 {
            duration = 3.0;
        }

        // Skip the first tenth of a second of the clip; some sources open on
        // a black frame.
        let graph = format!(
            "[0:v]setpts=PTS-STARTPTS,format=yuv420p[v];[1:a]{}[a]",
            self.conform_audio()
        );

        let cmd = FfmpegCommand::new(output)
            .input_with_args(
                ["-ss".to_string(), "0.1".to_string(), "-t".to_string(), format!("{duration:.3}")],
                clip,
            )
            .input(audio)
            .filter_complex(graph)
            .map("[v]")
            .map("[a]")
            .shortest()
            .encode(&self.encoding);

        self.runner().run(&cmd).await
    }

    async fn concatenate(&self, parts: &[PathBuf], output: &Path) -> MediaResult<()> {
        if parts.is_empty() {
            return Err(MediaError::invalid_video(
                "Cannot concatenate zero segments",
            ));
        }

        let mut cmd = FfmpegCommand::new(output);
        for part in parts {
            cmd = cmd.input(part);
        }

        let cmd = cmd
            .filter_complex(concat_filter(parts.len()))
            .map("[v]")
            .map("[a]")
            .encode(&self.encoding);

        debug!(segments = parts.len(), output = %output.display(), "Concatenating");
        self.runner().run(&cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_is_portrait() {
        let t = RenderTarget::default();
        assert_eq!((t.width, t.height), (1080, 1920));
        assert_eq!(t.scale_mode, ScaleMode::Fit);
    }

    #[test]
    fn test_engine_runner_timeout() {
        let engine =
            FfmpegEngine::new(RenderTarget::default(), EncodingConfig::default()).with_timeout(600);
        assert_eq!(engine.timeout_secs, Some(600));
    }

    #[test]
    fn test_conform_audio_uses_encoding_config() {
        let engine = FfmpegEngine::new(RenderTarget::default(), EncodingConfig::default());
        assert_eq!(
            engine.conform_audio(),
            "aformat=sample_rates=48000:channel_layouts=stereo"
        );
    }
}
