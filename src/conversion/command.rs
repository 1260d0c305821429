use crate::constants::{
    INTERMEDIATE_AUDIO_CODEC, INTERMEDIATE_MUXER, INTERMEDIATE_VIDEO_CODEC,
    LOUDNORM_LOUDNESS_RANGE_LU, LOUDNORM_TARGET_LUFS, LOUDNORM_TRUE_PEAK_DB,
};
use crate::conversion::settings::{AudioQuality, ConversionSettings, FrameRate, MediaMode};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// What the engine reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSpec {
    File(PathBuf),
    /// Transport-stream intermediates joined through the engine's `concat:` protocol.
    Concat(Vec<PathBuf>),
}

/// Staging profile for the first pass of a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingKind {
    Audio,
    Video,
}

/// Ordered argument vector for one engine invocation (program name excluded).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineArgs(Vec<OsString>);

impl EngineArgs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.0.push(arg.as_ref().to_os_string());
        self
    }

    pub fn push_pair(&mut self, flag: &str, value: impl AsRef<OsStr>) -> &mut Self {
        self.push(flag).push(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OsStr> {
        self.0.iter().map(|arg| arg.as_os_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, arg: &str) -> bool {
        self.0.iter().any(|a| a == arg)
    }

    /// Value following the first occurrence of `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&OsStr> {
        self.0
            .iter()
            .position(|a| a == flag)
            .and_then(|idx| self.0.get(idx + 1))
            .map(|value| value.as_os_str())
    }

    pub fn last(&self) -> Option<&OsStr> {
        self.0.last().map(|arg| arg.as_os_str())
    }

    /// Human-readable command line for logs.
    pub fn display(&self) -> String {
        self.0
            .iter()
            .map(|arg| {
                let text = arg.to_string_lossy();
                if text.contains(' ') {
                    format!("\"{}\"", text)
                } else {
                    text.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<T: Into<OsString>> FromIterator<T> for EngineArgs {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for EngineArgs {
    type Item = OsString;
    type IntoIter = std::vec::IntoIter<OsString>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

pub fn loudnorm_filter() -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}",
        LOUDNORM_TARGET_LUFS, LOUDNORM_TRUE_PEAK_DB, LOUDNORM_LOUDNESS_RANGE_LU
    )
}

pub fn scale_filter(height: u32) -> String {
    // -2 keeps the aspect ratio and rounds the width to an even value
    format!("scale=-2:{}", height)
}

pub fn concat_input(parts: &[PathBuf]) -> OsString {
    let mut input = OsString::from("concat:");
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            input.push("|");
        }
        input.push(part.as_os_str());
    }
    input
}

fn prologue() -> EngineArgs {
    let mut args = EngineArgs::new();
    args.push("-hide_banner").push("-nostdin").push("-y");
    args
}

fn push_input(args: &mut EngineArgs, input: &InputSpec) {
    match input {
        InputSpec::File(path) => {
            args.push_pair("-i", path);
        }
        InputSpec::Concat(parts) => {
            args.push_pair("-f", INTERMEDIATE_MUXER);
            args.push_pair("-i", concat_input(parts));
        }
    }
}

/// Builds the engine arguments for a final encode. Pure: no I/O, no validation
/// beyond what the typed settings already guarantee.
pub fn build_arguments(settings: &ConversionSettings, input: &InputSpec, output: &Path) -> EngineArgs {
    let mut args = prologue();
    push_input(&mut args, input);

    if settings.preserve_metadata {
        args.push_pair("-map", "0");
    } else {
        args.push_pair("-map_metadata", "-1");
    }

    if settings.normalize_audio {
        args.push_pair("-af", loudnorm_filter());
    }

    match settings.mode {
        MediaMode::Video => {
            let video = &settings.video;
            args.push_pair("-c:v", video.codec.as_str());
            args.push_pair("-f", video.format.muxer());

            if let Some(height) = video.resolution.height() {
                args.push_pair("-vf", scale_filter(height));
            }
            if let FrameRate::Fixed(fps) = video.frame_rate {
                args.push_pair("-r", fps.to_string());
            }
        }
        MediaMode::Audio => {
            let audio = &settings.audio;
            args.push_pair("-f", audio.format().muxer());
            if let Some(codec) = audio.format().forced_codec() {
                args.push_pair("-c:a", codec);
            }

            match audio.quality() {
                AudioQuality::Variable(level) => {
                    args.push_pair("-q:a", level.value().to_string());
                }
                AudioQuality::Constant(bitrate) => {
                    args.push_pair("-b:a", bitrate.as_str());
                }
            }
            args.push("-vn");
        }
    }

    args.push(output);
    args
}

/// Builds the first-pass arguments that bring one join input into the shared
/// transport-stream intermediate.
pub fn build_intermediate_arguments(kind: StagingKind, input: &Path, output: &Path) -> EngineArgs {
    let mut args = prologue();
    args.push_pair("-i", input);

    match kind {
        StagingKind::Audio => {
            args.push_pair("-c:a", INTERMEDIATE_AUDIO_CODEC);
            args.push("-vn");
        }
        StagingKind::Video => {
            args.push_pair("-c:v", INTERMEDIATE_VIDEO_CODEC);
            args.push_pair("-c:a", INTERMEDIATE_AUDIO_CODEC);
        }
    }

    args.push_pair("-f", INTERMEDIATE_MUXER);
    args.push(output);
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::settings::{
        AudioFormat, AudioSettings, Bitrate, QualityLevel, Resolution, VideoCodec,
    };

    fn audio_settings(quality: AudioQuality) -> ConversionSettings {
        ConversionSettings {
            audio: AudioSettings::new(AudioFormat::Mp3, quality).unwrap(),
            ..ConversionSettings::default()
        }
    }

    fn build(settings: &ConversionSettings) -> EngineArgs {
        build_arguments(
            settings,
            &InputSpec::File(PathBuf::from("/music/in.wav")),
            Path::new("/out/in.mp3"),
        )
    }

    #[test]
    fn identical_settings_give_identical_arguments() {
        let settings = ConversionSettings {
            normalize_audio: true,
            ..ConversionSettings::default()
        };
        assert_eq!(build(&settings), build(&settings.clone()));
    }

    #[test]
    fn metadata_markers_are_mutually_exclusive() {
        for preserve in [true, false] {
            let settings = ConversionSettings {
                preserve_metadata: preserve,
                ..ConversionSettings::default()
            };
            let args = build(&settings);
            let strip = args.value_of("-map_metadata").is_some();
            let map_all = args.value_of("-map") == Some(OsStr::new("0"));
            assert!(strip ^ map_all, "exactly one marker expected: {}", args.display());
            assert_eq!(map_all, preserve);
        }
    }

    #[test]
    fn audio_mode_uses_either_quality_or_bitrate() {
        let vbr = build(&audio_settings(AudioQuality::Variable(QualityLevel::new(0).unwrap())));
        assert_eq!(vbr.value_of("-q:a"), Some(OsStr::new("0")));
        assert!(!vbr.contains("-b:a"));
        assert!(vbr.contains("-vn"));

        let cbr = build(&audio_settings(AudioQuality::Constant(Bitrate::parse("128k").unwrap())));
        assert_eq!(cbr.value_of("-b:a"), Some(OsStr::new("128k")));
        assert!(!cbr.contains("-q:a"));
        assert!(cbr.contains("-vn"));
    }

    #[test]
    fn normalization_appends_fixed_loudnorm_filter() {
        let settings = ConversionSettings {
            normalize_audio: true,
            ..ConversionSettings::default()
        };
        assert_eq!(
            build(&settings).value_of("-af"),
            Some(OsStr::new("loudnorm=I=-16:TP=-1.5:LRA=11"))
        );
        assert!(!build(&ConversionSettings::default()).contains("-af"));
    }

    #[test]
    fn video_mode_scales_to_height_and_overrides_frame_rate() {
        let mut settings = ConversionSettings {
            mode: MediaMode::Video,
            ..ConversionSettings::default()
        };
        settings.video.codec = VideoCodec::parse("libx264").unwrap();
        settings.video.resolution = Resolution::P1080;
        settings.video.frame_rate = FrameRate::Fixed(30);

        let args = build(&settings);
        assert_eq!(args.value_of("-vf"), Some(OsStr::new("scale=-2:1080")));
        assert_eq!(args.value_of("-r"), Some(OsStr::new("30")));
        assert_eq!(args.value_of("-c:v"), Some(OsStr::new("libx264")));
        assert_eq!(args.value_of("-f"), Some(OsStr::new("mp4")));
        assert!(!args.contains("-vn"));
    }

    #[test]
    fn keep_original_emits_no_scale_or_rate() {
        let settings = ConversionSettings {
            mode: MediaMode::Video,
            ..ConversionSettings::default()
        };
        let args = build(&settings);
        assert!(!args.contains("-vf"));
        assert!(!args.contains("-r"));
    }

    #[test]
    fn output_path_is_last() {
        let args = build(&ConversionSettings::default());
        assert_eq!(args.last(), Some(OsStr::new("/out/in.mp3")));
        assert_eq!(args.iter().take(3).collect::<Vec<_>>(), ["-hide_banner", "-nostdin", "-y"]);
    }

    #[test]
    fn concat_input_reads_transport_stream() {
        let input = InputSpec::Concat(vec![PathBuf::from("/tmp/0.ts"), PathBuf::from("/tmp/1.ts")]);
        let args = build_arguments(&ConversionSettings::default(), &input, Path::new("/out/joined.mp3"));
        assert_eq!(args.value_of("-i"), Some(OsStr::new("concat:/tmp/0.ts|/tmp/1.ts")));
        assert_eq!(args.value_of("-f"), Some(OsStr::new("mpegts")));
    }

    #[test]
    fn video_staging_forces_common_codec() {
        let args = build_intermediate_arguments(StagingKind::Video, Path::new("a.mov"), Path::new("0.ts"));
        assert_eq!(args.value_of("-c:v"), Some(OsStr::new("libx264")));
        assert_eq!(args.value_of("-c:a"), Some(OsStr::new("aac")));
        assert_eq!(args.value_of("-f"), Some(OsStr::new("mpegts")));

        let audio = build_intermediate_arguments(StagingKind::Audio, Path::new("a.mp3"), Path::new("0.ts"));
        assert!(audio.contains("-vn"));
        assert!(!audio.contains("-c:v"));
    }
}
