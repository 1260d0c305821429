use super::{run_query, ProbeError};
use crate::constants::{PLAYER_AUDIO_SIZE, PLAYER_VIDEO_SIZE};
use crate::conversion::batch::is_video_extension;
use crate::conversion::command::EngineArgs;
use crate::conversion::progress::format_hms;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

const TAG_ORDER: &[&str] = &[
    "title",
    "artist",
    "album_artist",
    "album",
    "genre",
    "date",
    "creation_time",
    "track",
    "synopsis",
    "comment",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeFormat {
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bit_rate: Option<String>,
    pub format_long_name: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub codec_long_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub avg_frame_rate: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ProbeStream {
    fn is(&self, kind: &str) -> bool {
        self.codec_type.as_deref() == Some(kind)
    }

    fn track_label(&self, idx: usize) -> String {
        let title = self
            .tags
            .get("title")
            .cloned()
            .unwrap_or_else(|| format!("Track {}", idx + 1));
        let lang = self.tags.get("language").map(String::as_str).unwrap_or("unknown");
        format!("{} ({})", title, lang)
    }
}

/// Probing-tool JSON output (`-show_format -show_streams`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeOutput {
    pub format: Option<ProbeFormat>,
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

impl ProbeOutput {
    pub fn parse(json: &str) -> Result<Self, ProbeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.format
            .as_ref()?
            .duration
            .as_deref()?
            .parse::<f64>()
            .ok()
            .filter(|d| *d > 0.0)
    }

    pub fn has_video_stream(&self) -> bool {
        self.streams.iter().any(|s| s.is("video"))
    }
}

fn parse_fraction(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Probe result for one file, rendered for the information dialog.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub file_name: String,
    pub probe: ProbeOutput,
}

impl MediaInfo {
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- File Information for: {} ---\n", self.file_name);

        if let Some(format) = &self.probe.format {
            let number = |v: &Option<String>| v.as_deref().and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0);
            let duration = number(&format.duration);
            let hundredths = ((duration % 1.0) * 100.0) as u32;
            let _ = writeln!(
                out,
                "Duration: {}.{}",
                format_hms(Duration::from_secs_f64(duration.max(0.0))),
                hundredths
            );
            let _ = writeln!(out, "Size: {:.2} MB", number(&format.size) / 1_048_576.0);
            let _ = writeln!(out, "Bitrate: {:.0} kb/s", number(&format.bit_rate) / 1000.0);
            let _ = writeln!(
                out,
                "Format: {}",
                format.format_long_name.as_deref().unwrap_or("N/A")
            );
        }

        for stream in &self.probe.streams {
            let kind = stream.codec_type.as_deref().unwrap_or("N/A");
            let _ = writeln!(out, "\n--- {} Stream ---", capitalize(kind));
            let _ = writeln!(
                out,
                "  Codec: {}",
                stream.codec_long_name.as_deref().unwrap_or("N/A")
            );
            match kind {
                "video" => {
                    if let (Some(w), Some(h)) = (stream.width, stream.height) {
                        let _ = writeln!(out, "  Resolution: {}x{}", w, h);
                    }
                    if let Some(fps) = stream.avg_frame_rate.as_deref().and_then(parse_fraction) {
                        let _ = writeln!(out, "  Frame Rate: {:.2} fps", fps);
                    }
                }
                "audio" => {
                    if let Some(rate) = &stream.sample_rate {
                        let _ = writeln!(out, "  Sample Rate: {} Hz", rate);
                    }
                    if let Some(channels) = stream.channels {
                        let _ = writeln!(out, "  Channels: {}", channels);
                    }
                    let _ = writeln!(
                        out,
                        "  Channel Layout: {}",
                        stream.channel_layout.as_deref().unwrap_or("N/A")
                    );
                }
                _ => {}
            }
        }

        if let Some(tags) = self.probe.format.as_ref().map(|f| &f.tags).filter(|t| !t.is_empty()) {
            out.push_str("\n--- Metadata Tags ---\n");
            for key in TAG_ORDER {
                if let Some(value) = tags.get(*key) {
                    let _ = writeln!(out, "  {}: {}", capitalize(&key.replace('_', " ")), value);
                }
            }
            for (key, value) in tags {
                if !TAG_ORDER.contains(&key.to_lowercase().as_str()) {
                    let _ = writeln!(out, "  {}: {}", capitalize(key), value);
                }
            }
        }

        let subtitles: Vec<&ProbeStream> = self.probe.streams.iter().filter(|s| s.is("subtitle")).collect();
        if !subtitles.is_empty() {
            out.push_str("\n--- Subtitle Tracks ---\n");
            for (idx, stream) in subtitles.iter().enumerate() {
                let _ = writeln!(out, "  {}", stream.track_label(idx));
            }
        }

        let audio: Vec<&ProbeStream> = self.probe.streams.iter().filter(|s| s.is("audio")).collect();
        if audio.len() > 1 {
            out.push_str("\n--- Audio Tracks ---\n");
            for (idx, stream) in audio.iter().enumerate() {
                let _ = writeln!(out, "  {}", stream.track_label(idx));
            }
        }

        out
    }
}

async fn query(ffprobe: &Path, file: &Path) -> Result<ProbeOutput, ProbeError> {
    let args: [&OsStr; 7] = [
        OsStr::new("-v"),
        OsStr::new("quiet"),
        OsStr::new("-print_format"),
        OsStr::new("json"),
        OsStr::new("-show_format"),
        OsStr::new("-show_streams"),
        file.as_os_str(),
    ];
    let output = run_query(ffprobe, args).await?;
    ProbeOutput::parse(&output.stdout)
}

/// Best-effort source duration in seconds; any failure just means no ETA.
pub async fn probe_duration(ffprobe: &Path, file: &Path) -> Option<f64> {
    match query(ffprobe, file).await {
        Ok(probe) => probe.duration_seconds(),
        Err(e) => {
            tracing::warn!("Duration probe failed for {}: {}", file.display(), e);
            None
        }
    }
}

pub async fn probe_media_info(ffprobe: Option<&Path>, file: &Path) -> Result<MediaInfo, ProbeError> {
    let ffprobe = ffprobe
        .filter(|p| p.exists())
        .ok_or(ProbeError::ToolMissing { tool: "ffprobe" })?;
    let probe = query(ffprobe, file).await?;
    Ok(MediaInfo {
        file_name: file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        probe,
    })
}

/// Whether `file` should get a video window. Uses the probing tool when
/// available and falls back to the file extension.
pub async fn has_video(ffprobe: Option<&Path>, file: &Path) -> bool {
    if let Some(ffprobe) = ffprobe.filter(|p| p.exists()) {
        match query(ffprobe, file).await {
            Ok(probe) => return probe.has_video_stream(),
            Err(e) => tracing::warn!("Could not probe {}: {}", file.display(), e),
        }
    }
    is_video_extension(file)
}

pub fn build_player_arguments(file: &Path, has_video: bool) -> EngineArgs {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut args = EngineArgs::new();
    args.push("-autoexit");
    if has_video {
        let (w, h) = PLAYER_VIDEO_SIZE;
        args.push_pair("-x", w.to_string()).push_pair("-y", h.to_string());
        args.push_pair("-window_title", format!("Video Player - {}", name));
    } else {
        let (w, h) = PLAYER_AUDIO_SIZE;
        args.push_pair("-x", w.to_string()).push_pair("-y", h.to_string());
        args.push_pair("-window_title", format!("Audio Player - {}", name));
        args.push_pair("-showmode", "1");
    }
    args.push(file);
    args
}

/// Starts the player in its own window and returns without waiting for it.
pub async fn launch_player(ffplay: Option<&Path>, ffprobe: Option<&Path>, file: &Path) -> Result<(), ProbeError> {
    let ffplay = ffplay
        .filter(|p| p.exists())
        .ok_or(ProbeError::ToolMissing { tool: "ffplay" })?;

    let video = has_video(ffprobe, file).await;
    let args = build_player_arguments(file, video);

    let mut cmd = tokio::process::Command::new(ffplay);
    cmd.args(args.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    cmd.spawn().map_err(|source| ProbeError::Spawn {
        program: ffplay.display().to_string(),
        source,
    })?;
    tracing::info!("Playing {}", file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_long_name": "H.264 / AVC", "width": 1920, "height": 1080, "avg_frame_rate": "30000/1001"},
            {"codec_type": "audio", "codec_long_name": "AAC", "sample_rate": "48000", "channels": 2, "channel_layout": "stereo", "tags": {"language": "eng"}},
            {"codec_type": "audio", "codec_long_name": "AAC", "sample_rate": "48000", "channels": 6, "tags": {"language": "fra", "title": "Commentary"}},
            {"codec_type": "subtitle", "codec_long_name": "SubRip"}
        ],
        "format": {
            "duration": "62.500000",
            "size": "2097152",
            "bit_rate": "268435",
            "format_long_name": "QuickTime / MOV",
            "tags": {"encoder": "Lavf60", "title": "Holiday", "album_artist": "Us"}
        }
    }"#;

    #[test]
    fn reads_duration_and_video_presence() {
        let probe = ProbeOutput::parse(SAMPLE).unwrap();
        assert_eq!(probe.duration_seconds(), Some(62.5));
        assert!(probe.has_video_stream());

        let empty = ProbeOutput::parse(r#"{"format": {"duration": "N/A"}}"#).unwrap();
        assert_eq!(empty.duration_seconds(), None);
        assert!(!empty.has_video_stream());
        assert!(ProbeOutput::parse("not json").is_err());
    }

    #[test]
    fn report_lists_tags_in_priority_order() {
        let info = MediaInfo {
            file_name: "holiday.mov".to_string(),
            probe: ProbeOutput::parse(SAMPLE).unwrap(),
        };
        let report = info.report();
        assert!(report.starts_with("--- File Information for: holiday.mov ---"));
        assert!(report.contains("Duration: 00:01:02.50"));
        assert!(report.contains("Size: 2.00 MB"));
        assert!(report.contains("Frame Rate: 29.97 fps"));

        let title = report.find("Title: Holiday").unwrap();
        let album_artist = report.find("Album artist: Us").unwrap();
        let encoder = report.find("Encoder: Lavf60").unwrap();
        assert!(title < album_artist && album_artist < encoder);

        assert!(report.contains("--- Subtitle Tracks ---\n  Track 1 (unknown)"));
        assert!(report.contains("  Commentary (fra)"));
    }

    #[test]
    fn player_window_depends_on_content() {
        let video = build_player_arguments(Path::new("/v/clip.mkv"), true);
        assert_eq!(video.value_of("-x"), Some(OsStr::new("1280")));
        assert_eq!(video.value_of("-window_title"), Some(OsStr::new("Video Player - clip.mkv")));
        assert!(!video.contains("-showmode"));

        let audio = build_player_arguments(Path::new("/a/song.flac"), false);
        assert_eq!(audio.value_of("-y"), Some(OsStr::new("200")));
        assert_eq!(audio.value_of("-showmode"), Some(OsStr::new("1")));
        assert_eq!(audio.last(), Some(OsStr::new("/a/song.flac")));
    }

    #[tokio::test]
    async fn extension_fallback_without_probe_tool() {
        assert!(has_video(None, Path::new("/v/clip.MP4")).await);
        assert!(!has_video(Some(Path::new("/no/ffprobe")), Path::new("/a/song.mp3")).await);
    }

    #[tokio::test]
    async fn missing_tools_are_reported() {
        assert!(matches!(
            probe_media_info(None, Path::new("/a/song.mp3")).await,
            Err(ProbeError::ToolMissing { tool: "ffprobe" })
        ));
        assert!(matches!(
            launch_player(None, None, Path::new("/a/song.mp3")).await,
            Err(ProbeError::ToolMissing { tool: "ffplay" })
        ));
    }
}
