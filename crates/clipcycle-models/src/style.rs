//! Visual style rotation.
//!
//! Each full pass over the folder set runs with one `StylePack`: a look
//! filter, an overlay tint color, and a zoom/speed motion preset. The pack is
//! derived from the pass index and never stored; re-running a pass always
//! resolves the same pack.
//!
//! The three tables happen to share length 7, so the full tuple repeats every
//! 7 passes, but each component is indexed by `pass_index mod its own table
//! length` — the tables may grow independently.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Available look filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookFilter {
    /// Punchy contrast and saturation
    Clean,
    /// Warm color balance
    Warm,
    /// Cool color balance
    Cool,
    /// Gentle gaussian blur
    Soft,
    /// Unsharp-mask sharpening
    Crisp,
    /// Lifted blacks, muted saturation
    Matte,
    /// Temporal film grain
    Grain,
}

impl LookFilter {
    /// Rotation table, indexed by `pass_index % TABLE.len()`.
    pub const TABLE: &'static [LookFilter] = &[
        LookFilter::Clean,
        LookFilter::Warm,
        LookFilter::Cool,
        LookFilter::Soft,
        LookFilter::Crisp,
        LookFilter::Matte,
        LookFilter::Grain,
    ];

    /// FFmpeg filter expression for this look.
    pub fn ffmpeg_expr(&self) -> &'static str {
        match self {
            LookFilter::Clean => "eq=contrast=1.15:saturation=1.2:brightness=0.03",
            LookFilter::Warm => "colorbalance=rs=0.05:gs=0.03:bs=-0.06",
            LookFilter::Cool => "colorbalance=rs=-0.05:gs=-0.02:bs=0.06",
            LookFilter::Soft => "gblur=sigma=1.5",
            LookFilter::Crisp => "unsharp=5:5:1.5:5:5:0.0",
            LookFilter::Matte => "eq=contrast=0.9:saturation=0.85:gamma=1.1",
            LookFilter::Grain => "noise=alls=8:allf=t",
        }
    }

    /// The look name as used in filenames and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LookFilter::Clean => "clean",
            LookFilter::Warm => "warm",
            LookFilter::Cool => "cool",
            LookFilter::Soft => "soft",
            LookFilter::Crisp => "crisp",
            LookFilter::Matte => "matte",
            LookFilter::Grain => "grain",
        }
    }
}

impl fmt::Display for LookFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LookFilter {
    type Err = LookParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clean" => Ok(LookFilter::Clean),
            "warm" => Ok(LookFilter::Warm),
            "cool" => Ok(LookFilter::Cool),
            "soft" => Ok(LookFilter::Soft),
            "crisp" => Ok(LookFilter::Crisp),
            "matte" => Ok(LookFilter::Matte),
            "grain" => Ok(LookFilter::Grain),
            _ => Err(LookParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown look filter: {0}")]
pub struct LookParseError(String);

/// Overlay tint color, stored as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TintColor {
    hex: &'static str,
}

impl TintColor {
    /// Rotation palette, indexed by `pass_index % PALETTE.len()`.
    pub const PALETTE: &'static [TintColor] = &[
        TintColor { hex: "#00C2FF" },
        TintColor { hex: "#FF4D6D" },
        TintColor { hex: "#22C55E" },
        TintColor { hex: "#F59E0B" },
        TintColor { hex: "#A855F7" },
        TintColor { hex: "#14B8A6" },
        TintColor { hex: "#EF4444" },
    ];

    /// Hex form including the leading `#`.
    pub fn hex(&self) -> &'static str {
        self.hex
    }

    /// Normalized RGB components in `0.0..=1.0`.
    pub fn rgb(&self) -> (f64, f64, f64) {
        let s = &self.hex[1..];
        let byte = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).unwrap_or(0) as f64 / 255.0;
        (byte(0), byte(2), byte(4))
    }
}

impl fmt::Display for TintColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Zoom and playback-speed preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionPreset {
    /// Preset name as used in logs
    pub name: &'static str,
    /// Uniform scale factor applied before recropping to target size
    pub zoom: f64,
    /// Playback speed multiplier (video setpts + audio atempo)
    pub speed: f64,
}

impl MotionPreset {
    /// Rotation table, indexed by `pass_index % TABLE.len()`.
    pub const TABLE: &'static [MotionPreset] = &[
        MotionPreset { name: "A", zoom: 1.08, speed: 1.03 },
        MotionPreset { name: "B", zoom: 1.10, speed: 1.05 },
        MotionPreset { name: "C", zoom: 1.06, speed: 1.07 },
        MotionPreset { name: "D", zoom: 1.12, speed: 1.02 },
        MotionPreset { name: "E", zoom: 1.09, speed: 1.06 },
        MotionPreset { name: "F", zoom: 1.07, speed: 1.04 },
        MotionPreset { name: "G", zoom: 1.11, speed: 1.03 },
    ];
}

/// The style tuple active for one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StylePack {
    pub look: LookFilter,
    pub tint: TintColor,
    pub motion: MotionPreset,
}

impl StylePack {
    /// Resolve the style pack for a pass. Pure: no state, no randomness.
    pub fn for_pass(pass_index: u32) -> Self {
        let p = pass_index as usize;
        Self {
            look: LookFilter::TABLE[p % LookFilter::TABLE.len()],
            tint: TintColor::PALETTE[p % TintColor::PALETTE.len()],
            motion: MotionPreset::TABLE[p % MotionPreset::TABLE.len()],
        }
    }
}

impl fmt::Display for StylePack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "look={} tint={} preset={}",
            self.look, self.tint, self.motion.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_period_matches_table_length() {
        let l = LookFilter::TABLE.len() as u32;
        for p in 0..l * 3 {
            assert_eq!(StylePack::for_pass(p), StylePack::for_pass(p + l));
        }
    }

    #[test]
    fn test_components_cycle_independently() {
        // Components are indexed by their own table length, so each repeats
        // with its own period even if the tables diverge in size.
        for p in 0..50u32 {
            let pack = StylePack::for_pass(p);
            let look_len = LookFilter::TABLE.len();
            let tint_len = TintColor::PALETTE.len();
            let motion_len = MotionPreset::TABLE.len();
            assert_eq!(pack.look, LookFilter::TABLE[p as usize % look_len]);
            assert_eq!(pack.tint, TintColor::PALETTE[p as usize % tint_len]);
            assert_eq!(pack.motion, MotionPreset::TABLE[p as usize % motion_len]);
        }
    }

    #[test]
    fn test_pass_zero_style() {
        let pack = StylePack::for_pass(0);
        assert_eq!(pack.look, LookFilter::Clean);
        assert_eq!(pack.tint.hex(), "#00C2FF");
        assert_eq!(pack.motion.name, "A");
    }

    #[test]
    fn test_tint_rgb_parse() {
        let (r, g, b) = TintColor::PALETTE[0].rgb();
        assert!((r - 0.0).abs() < 1e-9);
        assert!((g - 0xC2 as f64 / 255.0).abs() < 1e-9);
        assert!((b - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_look_round_trip() {
        for look in LookFilter::TABLE {
            assert_eq!(look.as_str().parse::<LookFilter>().unwrap(), *look);
        }
        assert!("vhs".parse::<LookFilter>().is_err());
    }
}
