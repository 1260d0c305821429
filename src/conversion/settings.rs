use crate::constants::{AUDIO_BITRATES, FRAME_RATES, MAX_VBR_QUALITY};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
    #[error("Unknown audio format: {0}")]
    UnknownAudioFormat(String),
    #[error("Unknown video format: {0}")]
    UnknownVideoFormat(String),
    #[error("Invalid audio bitrate: {0}")]
    InvalidBitrate(String),
    #[error("VBR quality {0} is out of range (0-9)")]
    InvalidQuality(u8),
    #[error("{format} output does not support variable bitrate")]
    VbrUnsupported { format: AudioFormat },
    #[error("Invalid video codec: {0:?}")]
    InvalidVideoCodec(String),
    #[error("Unknown resolution: {0}")]
    UnknownResolution(String),
    #[error("Unsupported frame rate: {0}")]
    UnsupportedFrameRate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaMode {
    #[default]
    Audio,
    Video,
}

impl MediaMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaMode::Audio => "Audio",
            MediaMode::Video => "Video",
        }
    }
}

impl FromStr for MediaMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Audio" | "audio" => Ok(MediaMode::Audio),
            "Video" | "video" => Ok(MediaMode::Video),
            other => Err(SettingsError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Aac,
    Flac,
    Aiff,
    Ogg,
    Alac,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 7] = [
        AudioFormat::Mp3,
        AudioFormat::Wav,
        AudioFormat::Aac,
        AudioFormat::Flac,
        AudioFormat::Aiff,
        AudioFormat::Ogg,
        AudioFormat::Alac,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
            AudioFormat::Aiff => "aiff",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Alac => "alac",
        }
    }

    /// Muxer name passed to the engine's `-f` option.
    pub fn muxer(&self) -> &'static str {
        match self {
            AudioFormat::Aac => "adts",
            AudioFormat::Alac => "ipod",
            other => other.as_str(),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Alac => "m4a",
            other => other.as_str(),
        }
    }

    /// Codec the container needs spelled out because the muxer default differs.
    pub fn forced_codec(&self) -> Option<&'static str> {
        match self {
            AudioFormat::Alac => Some("alac"),
            _ => None,
        }
    }

    pub fn supports_vbr(&self) -> bool {
        matches!(self, AudioFormat::Mp3 | AudioFormat::Ogg)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        AudioFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == lower)
            .ok_or_else(|| SettingsError::UnknownAudioFormat(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    Mp4,
    Mkv,
    Avi,
    Mov,
    Webm,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 5] = [
        VideoFormat::Mp4,
        VideoFormat::Mkv,
        VideoFormat::Avi,
        VideoFormat::Mov,
        VideoFormat::Webm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mkv => "mkv",
            VideoFormat::Avi => "avi",
            VideoFormat::Mov => "mov",
            VideoFormat::Webm => "webm",
        }
    }

    pub fn muxer(&self) -> &'static str {
        match self {
            VideoFormat::Mkv => "matroska",
            other => other.as_str(),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        VideoFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == lower)
            .ok_or_else(|| SettingsError::UnknownVideoFormat(s.to_string()))
    }
}

/// Constant audio bitrate, restricted to the offered presets (e.g. `192k`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitrate(String);

impl Bitrate {
    pub fn parse(value: &str) -> Result<Self, SettingsError> {
        let value = value.trim();
        if AUDIO_BITRATES.contains(&value) {
            Ok(Self(value.to_string()))
        } else {
            Err(SettingsError::InvalidBitrate(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// VBR quality level, 0 (best) to 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityLevel(u8);

impl QualityLevel {
    pub fn new(level: u8) -> Result<Self, SettingsError> {
        if level <= MAX_VBR_QUALITY {
            Ok(Self(level))
        } else {
            Err(SettingsError::InvalidQuality(level))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioQuality {
    Constant(Bitrate),
    Variable(QualityLevel),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    format: AudioFormat,
    quality: AudioQuality,
}

impl AudioSettings {
    pub fn new(format: AudioFormat, quality: AudioQuality) -> Result<Self, SettingsError> {
        if matches!(quality, AudioQuality::Variable(_)) && !format.supports_vbr() {
            return Err(SettingsError::VbrUnsupported { format });
        }
        Ok(Self { format, quality })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn quality(&self) -> &AudioQuality {
        &self.quality
    }
}

/// Video encoder identifier as understood by the engine (`libx264`, `h264_qsv`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCodec(String);

impl VideoCodec {
    pub fn parse(value: &str) -> Result<Self, SettingsError> {
        let value = value.trim();
        let valid = !value.is_empty()
            && !value.starts_with('-')
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(SettingsError::InvalidVideoCodec(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    #[default]
    KeepOriginal,
    P4320,
    P2160,
    P1440,
    P1080,
    P720,
    P480,
    P360,
    P240,
}

impl Resolution {
    pub const ALL: [Resolution; 9] = [
        Resolution::KeepOriginal,
        Resolution::P4320,
        Resolution::P2160,
        Resolution::P1440,
        Resolution::P1080,
        Resolution::P720,
        Resolution::P480,
        Resolution::P360,
        Resolution::P240,
    ];

    pub fn height(&self) -> Option<u32> {
        match self {
            Resolution::KeepOriginal => None,
            Resolution::P4320 => Some(4320),
            Resolution::P2160 => Some(2160),
            Resolution::P1440 => Some(1440),
            Resolution::P1080 => Some(1080),
            Resolution::P720 => Some(720),
            Resolution::P480 => Some(480),
            Resolution::P360 => Some(360),
            Resolution::P240 => Some(240),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Resolution::KeepOriginal => "Keep Original",
            Resolution::P4320 => "4320p (8K)",
            Resolution::P2160 => "2160p (4K)",
            Resolution::P1440 => "1440p (2K)",
            Resolution::P1080 => "1080p (Full HD)",
            Resolution::P720 => "720p (HD)",
            Resolution::P480 => "480p",
            Resolution::P360 => "360p",
            Resolution::P240 => "240p",
        }
    }
}

impl FromStr for Resolution {
    type Err = SettingsError;

    /// Accepts both the display label (`1080p (Full HD)`) and the bare form (`1080p`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("keep original") {
            return Ok(Resolution::KeepOriginal);
        }
        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        let height: u32 = digits
            .parse()
            .map_err(|_| SettingsError::UnknownResolution(s.to_string()))?;
        Resolution::ALL
            .into_iter()
            .find(|resolution| resolution.height() == Some(height))
            .ok_or_else(|| SettingsError::UnknownResolution(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameRate {
    #[default]
    KeepOriginal,
    Fixed(u32),
}

impl FrameRate {
    pub fn label(&self) -> String {
        match self {
            FrameRate::KeepOriginal => "Keep Original".to_string(),
            FrameRate::Fixed(fps) => fps.to_string(),
        }
    }
}

impl FromStr for FrameRate {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("keep original") {
            return Ok(FrameRate::KeepOriginal);
        }
        match trimmed.parse::<u32>() {
            Ok(fps) if FRAME_RATES.contains(&fps) => Ok(FrameRate::Fixed(fps)),
            _ => Err(SettingsError::UnsupportedFrameRate(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    pub format: VideoFormat,
    pub codec: VideoCodec,
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Directory(PathBuf),
    AskEveryTime,
}

impl Destination {
    pub fn directory(&self) -> Option<&Path> {
        match self {
            Destination::Directory(dir) => Some(dir),
            Destination::AskEveryTime => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: Option<PathBuf>,
    pub ffplay: Option<PathBuf>,
}

impl EnginePaths {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: None,
            ffplay: None,
        }
    }

    /// The probing tool, only when it exists on disk.
    pub fn usable_ffprobe(&self) -> Option<&Path> {
        self.ffprobe.as_deref().filter(|path| path.exists())
    }
}

/// Immutable snapshot of every option that shapes one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSettings {
    pub mode: MediaMode,
    pub join_audio: bool,
    pub join_video: bool,
    pub audio: AudioSettings,
    pub video: VideoSettings,
    pub preserve_metadata: bool,
    pub normalize_audio: bool,
    pub destination: Destination,
    pub engine: EnginePaths,
}

impl ConversionSettings {
    /// Join flag of the active mode.
    pub fn join_requested(&self) -> bool {
        match self.mode {
            MediaMode::Audio => self.join_audio,
            MediaMode::Video => self.join_video,
        }
    }

    pub fn output_extension(&self) -> &'static str {
        match self.mode {
            MediaMode::Audio => self.audio.format().extension(),
            MediaMode::Video => self.video.format.extension(),
        }
    }

    pub fn output_format_name(&self) -> &'static str {
        match self.mode {
            MediaMode::Audio => self.audio.format().as_str(),
            MediaMode::Video => self.video.format.as_str(),
        }
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            mode: MediaMode::Audio,
            join_audio: false,
            join_video: false,
            audio: AudioSettings {
                format: AudioFormat::Mp3,
                quality: AudioQuality::Constant(Bitrate("192k".to_string())),
            },
            video: VideoSettings {
                format: VideoFormat::Mp4,
                codec: VideoCodec("libx265".to_string()),
                resolution: Resolution::KeepOriginal,
                frame_rate: FrameRate::KeepOriginal,
            },
            preserve_metadata: true,
            normalize_audio: false,
            destination: Destination::AskEveryTime,
            engine: EnginePaths::new("ffmpeg"),
        }
    }
}
