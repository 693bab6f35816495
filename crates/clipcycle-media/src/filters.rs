//! FFmpeg video filter construction.
//!
//! Every produced segment goes through the same normalization geometry, so
//! the chains built here are the single source of truth for scaling, frame
//! rate, tinting, and motion filters.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Colorkey similarity used to knock out black overlay backgrounds.
pub const BLACK_KEY_SIMILARITY: f64 = 0.08;
/// Colorkey edge blend.
pub const BLACK_KEY_BLEND: f64 = 0.0;

/// Speed factors closer to 1.0 than this are treated as unity.
pub const SPEED_EPSILON: f64 = 1e-6;
/// Zoom factors at or below this are treated as no zoom.
pub const ZOOM_THRESHOLD: f64 = 1.0001;

/// How source material is fitted to the target frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMode {
    /// Letterbox: scale down to fit, pad to target
    #[default]
    Fit,
    /// Cover: scale up to cover, crop to target
    Fill,
}

impl ScaleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleMode::Fit => "fit",
            ScaleMode::Fill => "fill",
        }
    }
}

impl fmt::Display for ScaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScaleMode {
    type Err = ScaleModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fit" => Ok(ScaleMode::Fit),
            "fill" => Ok(ScaleMode::Fill),
            _ => Err(ScaleModeParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown scale mode: {0}")]
pub struct ScaleModeParseError(String);

/// Scale/pad (or scale/crop) chain bringing a frame to the target size.
pub fn scale_chain(mode: ScaleMode, width: u32, height: u32) -> String {
    match mode {
        ScaleMode::Fill => format!(
            "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
            w = width,
            h = height
        ),
        ScaleMode::Fit => format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1",
            w = width,
            h = height
        ),
    }
}

/// Full normalization chain: fit to target, reset timestamps, force fps.
pub fn normalize_chain(mode: ScaleMode, width: u32, height: u32, fps: f64) -> String {
    format!(
        "{},setpts=PTS-STARTPTS,fps={}",
        scale_chain(mode, width, height),
        fps
    )
}

/// Video speed-up filter, or `None` at unity speed.
pub fn speed_filter(speed: f64) -> Option<String> {
    if (speed - 1.0).abs() > SPEED_EPSILON {
        Some(format!("setpts=PTS/{}", speed))
    } else {
        None
    }
}

/// Audio tempo filter matching `speed_filter`, or `None` at unity speed.
pub fn atempo_filter(speed: f64) -> Option<String> {
    if (speed - 1.0).abs() > SPEED_EPSILON {
        Some(format!("atempo={}", speed))
    } else {
        None
    }
}

/// Zoom-and-recrop chain, or `None` when the zoom is negligible.
pub fn zoom_chain(zoom: f64, width: u32, height: u32) -> Option<String> {
    if zoom > ZOOM_THRESHOLD {
        Some(format!(
            "scale=iw*{z}:ih*{z},crop={w}:{h}",
            z = zoom,
            w = width,
            h = height
        ))
    } else {
        None
    }
}

/// Prepare an overlay image: stretch to the full frame, make black
/// transparent.
pub fn overlay_prep_chain(width: u32, height: u32) -> String {
    format!(
        "scale={}:{}:force_original_aspect_ratio=disable,format=rgba,\
         colorkey=0x000000:{}:{}",
        width, height, BLACK_KEY_SIMILARITY, BLACK_KEY_BLEND
    )
}

/// Tint chains blending an overlay toward an RGB color at `strength`.
///
/// Produces filtergraph statements from `[input_label]` to `[out_label]`;
/// intermediate labels are prefixed to keep multi-overlay graphs unambiguous.
pub fn tint_chains(
    input_label: &str,
    out_label: &str,
    width: u32,
    height: u32,
    rgb: (f64, f64, f64),
    strength: f64,
    prefix: &str,
) -> Vec<String> {
    let mut chains = Vec::new();
    let raw = format!("{prefix}raw");
    chains.push(format!(
        "[{input_label}]{}[{raw}]",
        overlay_prep_chain(width, height)
    ));

    let s = strength.clamp(0.0, 1.0);
    let (r, g, b) = rgb;
    let mixer = format!("colorchannelmixer=rr={r}:gg={g}:bb={b}:aa=1");

    if s >= 0.999 {
        chains.push(format!("[{raw}]{mixer}[{out_label}]"));
        return chains;
    }

    let (a, tinted, blended) = (
        format!("{prefix}a"),
        format!("{prefix}b"),
        format!("{prefix}b2"),
    );
    chains.push(format!("[{raw}]split=2[{a}][{tinted}]"));
    chains.push(format!("[{tinted}]{mixer}[{blended}]"));
    chains.push(format!(
        "[{a}][{blended}]blend=all_mode=normal:all_opacity={s}[{out_label}]"
    ));
    chains
}

/// Audio conform filter for a sample rate and channel count.
pub fn audio_format(rate: u32, channels: u8) -> String {
    let layout = if channels == 1 { "mono" } else { "stereo" };
    format!("aformat=sample_rates={}:channel_layouts={}", rate, layout)
}

/// Silent-audio lavfi source matching the conform format.
pub fn silent_audio_source(rate: u32, channels: u8) -> String {
    let layout = if channels == 1 { "mono" } else { "stereo" };
    format!("anullsrc=channel_layout={}:sample_rate={}", layout, rate)
}

/// Concat filter joining `n` inputs with both video and audio.
pub fn concat_filter(n: usize) -> String {
    let inputs: String = (0..n).map(|i| format!("[{i}:v][{i}:a]")).collect();
    format!("{inputs}concat=n={n}:v=1:a=1[v][a]")
}
