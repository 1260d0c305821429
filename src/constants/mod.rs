// App Constants
pub const APP_NAME: &str = "Media Converter and Joiner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CONFIG_DIR_NAME: &str = "media-converter";

// FFmpeg Constants
pub const CANCELLATION_CHECK_INTERVAL_MS: u64 = 100;
pub const MAX_LOG_LINES: usize = 1000;
pub const FFMPEG_DOWNLOAD_URL: &str = "https://ffmpeg.org/download.html";

// Loudness normalization targets (EBU R128 style)
pub const LOUDNORM_TARGET_LUFS: f32 = -16.0;
pub const LOUDNORM_TRUE_PEAK_DB: f32 = -1.5;
pub const LOUDNORM_LOUDNESS_RANGE_LU: f32 = 11.0;

// Join staging
pub const INTERMEDIATE_MUXER: &str = "mpegts";
pub const INTERMEDIATE_AUDIO_CODEC: &str = "aac";
pub const INTERMEDIATE_VIDEO_CODEC: &str = "libx264";

// File handling
pub const MAX_BATCH_FILES: usize = 20;

pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "aac", "m4a", "ogg", "wav", "flac", "alac", "aiff", "wma",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "webm", "wmv", "flv", "mkv", "mts", "mpeg-4", "avchd",
];

// Audio options
pub const AUDIO_BITRATES: &[&str] = &[
    "320k", "256k", "192k", "160k", "128k", "112k", "96k", "64k", "32k", "16k",
];
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
pub const MAX_VBR_QUALITY: u8 = 9;
pub const DEFAULT_VBR_QUALITY: u8 = 4;

// Video options
pub const BASE_VIDEO_CODECS: &[&str] = &["libx265", "libx264", "mpeg4"];

// Hardware encoders that are detected but not offered in the codec list
pub const HIDDEN_HW_ENCODERS: &[&str] = &["h264_nvenc", "hevc_amf", "hevc_nvenc"];

pub const FRAME_RATES: &[u32] = &[60, 30, 25, 24];

// Encoder table substrings that identify hardware-accelerated encoders
pub const HW_ENCODER_PATTERNS: &[&str] = &[
    "h264_nvenc",
    "hevc_nvenc",
    "h264_amf",
    "hevc_amf",
    "h264_qsv",
    "hevc_qsv",
    "h264_videotoolbox",
    "hevc_videotoolbox",
];

// Player window sizes
pub const PLAYER_VIDEO_SIZE: (u32, u32) = (1280, 720);
pub const PLAYER_AUDIO_SIZE: (u32, u32) = (720, 200);
