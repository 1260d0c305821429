use crate::constants::{CONFIG_DIR_NAME, DEFAULT_AUDIO_BITRATE, DEFAULT_VBR_QUALITY};
use crate::conversion::settings::{
    AudioFormat, AudioQuality, AudioSettings, Bitrate, ConversionSettings, Destination, EnginePaths, FrameRate,
    MediaMode, QualityLevel, Resolution, SettingsError, VideoCodec, VideoFormat, VideoSettings,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine the configuration directory")]
    NoConfigDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted user preferences. Values are stored the way the front end shows
/// them and only validated when a job snapshot is taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: String,
    pub join_audio: bool,
    pub join_video: bool,

    pub audio_format: String,
    pub audio_bitrate: String,
    pub audio_vbr: bool,
    pub audio_quality: u8,

    pub video_format: String,
    pub video_codec: String,
    pub resolution: String,
    pub frame_rate: String,
    pub hardware_acceleration: bool,

    pub keep_metadata: bool,
    pub normalize_audio: bool,
    pub show_full_path: bool,

    pub dest_path: Option<PathBuf>,
    pub always_ask_destination: bool,

    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub ffplay_path: Option<PathBuf>,

    pub window_width: f32,
    pub window_height: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: MediaMode::Audio.as_str().to_string(),
            join_audio: false,
            join_video: false,
            audio_format: AudioFormat::Mp3.as_str().to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            audio_vbr: false,
            audio_quality: DEFAULT_VBR_QUALITY,
            video_format: VideoFormat::Mp4.as_str().to_string(),
            video_codec: "libx265".to_string(),
            resolution: Resolution::KeepOriginal.label().to_string(),
            frame_rate: FrameRate::KeepOriginal.label(),
            hardware_acceleration: false,
            keep_metadata: true,
            normalize_audio: false,
            show_full_path: true,
            dest_path: None,
            always_ask_destination: false,
            ffmpeg_path: None,
            ffprobe_path: None,
            ffplay_path: None,
            window_width: 900.0,
            window_height: 680.0,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join("config.json"))
    }

    /// Loads the stored configuration; a missing or unreadable file yields defaults.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("Could not determine config directory, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("Config file doesn't exist, using defaults");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Config loaded from: {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file, using defaults: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config file, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("Config saved to: {:?}", path);
        Ok(())
    }

    pub fn destination(&self) -> Destination {
        match &self.dest_path {
            Some(dir) if !self.always_ask_destination => Destination::Directory(dir.clone()),
            _ => Destination::AskEveryTime,
        }
    }

    pub fn engine_paths(&self) -> EnginePaths {
        EnginePaths {
            ffmpeg: find_executable(self.ffmpeg_path.as_deref(), "ffmpeg").unwrap_or_else(|| PathBuf::from("ffmpeg")),
            ffprobe: find_executable(self.ffprobe_path.as_deref(), "ffprobe"),
            ffplay: find_executable(self.ffplay_path.as_deref(), "ffplay"),
        }
    }

    /// Validates every stored option and freezes them into a job snapshot.
    pub fn to_settings(&self) -> Result<ConversionSettings, SettingsError> {
        let audio_format: AudioFormat = self.audio_format.parse()?;
        let quality = if self.audio_vbr {
            AudioQuality::Variable(QualityLevel::new(self.audio_quality)?)
        } else {
            AudioQuality::Constant(Bitrate::parse(&self.audio_bitrate)?)
        };

        Ok(ConversionSettings {
            mode: self.mode.parse()?,
            join_audio: self.join_audio,
            join_video: self.join_video,
            audio: AudioSettings::new(audio_format, quality)?,
            video: VideoSettings {
                format: self.video_format.parse()?,
                codec: VideoCodec::parse(&self.video_codec)?,
                resolution: self.resolution.parse()?,
                frame_rate: self.frame_rate.parse()?,
            },
            preserve_metadata: self.keep_metadata,
            normalize_audio: self.normalize_audio,
            destination: self.destination(),
            engine: self.engine_paths(),
        })
    }
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Locates a tool: the configured path, then next to the running program,
/// then on `PATH`.
pub fn find_executable(configured: Option<&Path>, name: &str) -> Option<PathBuf> {
    if let Some(path) = configured.filter(|p| p.exists()) {
        return Some(path.to_path_buf());
    }

    let local = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(executable_name(name))))
        .filter(|path| path.exists());
    if local.is_some() {
        return local;
    }

    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fresh_install() {
        let config = AppConfig::default();
        let settings = config.to_settings().unwrap();
        assert_eq!(settings.mode, MediaMode::Audio);
        assert_eq!(settings.audio.format(), AudioFormat::Mp3);
        assert_eq!(
            settings.audio.quality(),
            &AudioQuality::Constant(Bitrate::parse("192k").unwrap())
        );
        assert_eq!(settings.video.codec.as_str(), "libx265");
        assert!(settings.preserve_metadata);
        assert_eq!(settings.destination, Destination::AskEveryTime);
    }

    #[test]
    fn malformed_values_are_rejected_at_snapshot_time() {
        let config = AppConfig {
            audio_format: "flac".to_string(),
            audio_vbr: true,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.to_settings(),
            Err(SettingsError::VbrUnsupported { format: AudioFormat::Flac })
        ));

        let config = AppConfig {
            frame_rate: "29.97".to_string(),
            ..AppConfig::default()
        };
        assert!(config.to_settings().is_err());
    }

    #[test]
    fn fixed_destination_unless_always_ask() {
        let mut config = AppConfig {
            dest_path: Some(PathBuf::from("/out")),
            ..AppConfig::default()
        };
        assert_eq!(config.destination(), Destination::Directory(PathBuf::from("/out")));
        config.always_ask_destination = true;
        assert_eq!(config.destination(), Destination::AskEveryTime);
    }

    #[test]
    fn save_and_load_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = AppConfig {
            mode: "Video".to_string(),
            resolution: "720p (HD)".to_string(),
            ..AppConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path), config);
    }

    #[test]
    fn partial_or_broken_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"normalize_audio": true}"#).unwrap();
        let loaded = AppConfig::load_from(&path);
        assert!(loaded.normalize_audio);
        assert_eq!(loaded.audio_bitrate, "192k");

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn configured_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("my-ffmpeg");
        std::fs::write(&tool, b"").unwrap();
        assert_eq!(find_executable(Some(&tool), "ffmpeg"), Some(tool));
    }
}
