//! Video encoding configuration.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 23;
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";
/// H.264 profile for broad playback compatibility
pub const DEFAULT_H264_PROFILE: &str = "main";
/// H.264 level for broad playback compatibility
pub const DEFAULT_H264_LEVEL: &str = "3.1";

/// Web-delivery encoding profile.
///
/// Used whenever a stream-copy path fails and the pipeline has to
/// re-encode: segment cuts, concat fallback, and the multi-asset combine
/// fallback all share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// H.264 profile
    #[serde(default = "default_profile")]
    pub profile: String,

    /// H.264 level
    #[serde(default = "default_level")]
    pub level: String,
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
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_profile() -> String {
    DEFAULT_H264_PROFILE.to_string()
}
fn default_level() -> String {
    DEFAULT_H264_LEVEL.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            profile: default_profile(),
            level: default_level(),
        }
    }
}

impl EncodingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("ENCODE_PRESET") {
            cfg.preset = v;
        }
        if let Ok(v) = std::env::var("ENCODE_CRF") {
            if let Ok(crf) = v.parse() {
                cfg.crf = crf;
            }
        }
        if let Ok(v) = std::env::var("ENCODE_AUDIO_BITRATE") {
            cfg.audio_bitrate = v;
        }
        cfg
    }

    /// Convert to FFmpeg output arguments.
    ///
    /// Always includes `+faststart` so the moov atom sits at the front of
    /// the file and playback can begin before the download finishes.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-profile:v".to_string(),
            self.profile.clone(),
            "-level".to_string(),
            self.level.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.preset, "medium");
        assert_eq!(config.crf, 23);
        assert_eq!(config.profile, "main");
        assert_eq!(config.level, "3.1");
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = EncodingConfig::default().to_ffmpeg_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"23".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
        let profile_idx = args.iter().position(|a| a == "-profile:v").unwrap();
        assert_eq!(args[profile_idx + 1], "main");
    }
}
