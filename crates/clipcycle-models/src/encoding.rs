//! Video encoding configuration.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "veryfast";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 18;
/// Default audio sample rate
pub const DEFAULT_AUDIO_RATE: u32 = 48_000;
/// Default audio channel count (stereo)
pub const DEFAULT_AUDIO_CHANNELS: u8 = 2;
/// Default keyframe interval
pub const DEFAULT_GOP: u32 = 30;

/// Encoding settings applied to every produced segment.
///
/// B-frames are disabled (`-bf 0`): segments are concatenated back to back
/// and a leading B-frame shows up as a black first frame on some players.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "veryfast", "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio sample rate in Hz
    #[serde(default = "default_audio_rate")]
    pub audio_rate: u32,

    /// Audio channel count
    #[serde(default = "default_audio_channels")]
    pub audio_channels: u8,

    /// Keyframe interval (`-g`)
    #[serde(default = "default_gop")]
    pub gop: u32,

    /// Move the moov atom up front for streaming (`-movflags +faststart`)
    #[serde(default = "default_true")]
    pub faststart: bool,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_rate() -> u32 {
    DEFAULT_AUDIO_RATE
}
fn default_audio_channels() -> u8 {
    DEFAULT_AUDIO_CHANNELS
}
fn default_gop() -> u32 {
    DEFAULT_GOP
}
fn default_true() -> bool {
    true
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: DEFAULT_CRF,
            audio_codec: default_audio_codec(),
            audio_rate: DEFAULT_AUDIO_RATE,
            audio_channels: DEFAULT_AUDIO_CHANNELS,
            gop: DEFAULT_GOP,
            faststart: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, 18);
        assert_eq!(config.audio_rate, 48_000);
        assert!(config.faststart);
    }

    #[test]
    fn test_deserialize_empty_object_uses_defaults() {
        let config: EncodingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EncodingConfig::default());
    }
}
