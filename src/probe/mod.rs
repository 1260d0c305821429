pub mod media;

use crate::constants::{BASE_VIDEO_CODECS, HIDDEN_HW_ENCODERS, HW_ENCODER_PATTERNS};
use crate::conversion::settings::{AudioFormat, EnginePaths, VideoFormat};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{tool} executable not found")]
    ToolMissing { tool: &'static str },
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with an error:\n{output}")]
    Failed { program: String, output: String },
    #[error("Could not parse probe output: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ProbeError {
    pub fn title(&self) -> &'static str {
        match self {
            ProbeError::ToolMissing { .. } => "Error",
            ProbeError::Failed { .. } | ProbeError::Spawn { .. } => "ffprobe Error",
            ProbeError::Parse(_) => "Error",
        }
    }
}

/// Captured output of a short query run.
pub(crate) struct QueryOutput {
    pub stdout: String,
    pub stderr: String,
}

impl QueryOutput {
    /// Both streams, the way a terminal would show them.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Runs a tool to completion and captures its output; a non-zero exit is an error.
pub(crate) async fn run_query<I, S>(program: &Path, args: I) -> Result<QueryOutput, ProbeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let output = cmd.output().await.map_err(|source| ProbeError::Spawn {
        program: program.display().to_string(),
        source,
    })?;

    let result = QueryOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if output.status.success() {
        Ok(result)
    } else {
        Err(ProbeError::Failed {
            program: program.display().to_string(),
            output: result.combined(),
        })
    }
}

fn encoder_row_regex() -> &'static Regex {
    static ENCODER_ROW: OnceLock<Regex> = OnceLock::new();
    ENCODER_ROW.get_or_init(|| Regex::new(r"^\s*V.....\s+([a-zA-Z0-9_]+)").expect("valid encoder regex"))
}

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| Regex::new(r"version\s+([^\s]+)").expect("valid version regex"))
}

/// Picks hardware video encoders out of an `-encoders` table. Sorted, no duplicates.
pub fn parse_hardware_encoders(table: &str) -> Vec<String> {
    let found: BTreeSet<String> = table
        .lines()
        .filter_map(|line| encoder_row_regex().captures(line))
        .map(|caps| caps[1].to_string())
        .filter(|encoder| HW_ENCODER_PATTERNS.iter().any(|pattern| encoder.contains(pattern)))
        .collect();
    found.into_iter().collect()
}

pub async fn detect_hardware_encoders(engine: &Path) -> Result<Vec<String>, ProbeError> {
    let output = run_query(engine, ["-hide_banner", "-encoders"]).await?;
    let encoders = parse_hardware_encoders(&output.combined());
    tracing::info!("Detected {} hardware encoder(s)", encoders.len());
    Ok(encoders)
}

/// Codec choices offered to the user: the software encoders, then any
/// detected hardware encoders not on the hidden list.
pub fn available_video_codecs(hardware_enabled: bool, hardware_encoders: &[String]) -> Vec<String> {
    let mut codecs: Vec<String> = BASE_VIDEO_CODECS.iter().map(|c| c.to_string()).collect();
    if hardware_enabled {
        for encoder in hardware_encoders {
            if !HIDDEN_HW_ENCODERS.contains(&encoder.as_str()) && !codecs.contains(encoder) {
                codecs.push(encoder.clone());
            }
        }
    }
    codecs
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorStatus {
    Detected,
    NotDetected,
    Failed,
}

impl VendorStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VendorStatus::Detected => "Detected",
            VendorStatus::NotDetected => "Not Detected",
            VendorStatus::Failed => "Failed",
        }
    }

    fn for_suffix(encoders: &[String], suffix: &str) -> Self {
        if encoders.iter().any(|e| e.contains(suffix)) {
            VendorStatus::Detected
        } else {
            VendorStatus::NotDetected
        }
    }
}

/// Result of the manual hardware codec test.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecTestReport {
    pub status_message: String,
    pub nvidia: VendorStatus,
    pub amd: VendorStatus,
    pub intel: VendorStatus,
    pub successful: bool,
    pub encoders: Vec<String>,
}

impl CodecTestReport {
    pub fn from_encoders(encoders: Vec<String>) -> Self {
        let nvidia = VendorStatus::for_suffix(&encoders, "_nvenc");
        let amd = VendorStatus::for_suffix(&encoders, "_amf");
        let intel = VendorStatus::for_suffix(&encoders, "_qsv");
        let successful = [nvidia, amd, intel].contains(&VendorStatus::Detected);
        let status_message = if successful {
            "Status: Test Complete"
        } else {
            "Status: No Supported GPU Detected"
        };
        Self {
            status_message: status_message.to_string(),
            nvidia,
            amd,
            intel,
            successful,
            encoders,
        }
    }

    pub fn failed() -> Self {
        Self {
            status_message: "Status: Test Failed".to_string(),
            nvidia: VendorStatus::Failed,
            amd: VendorStatus::Failed,
            intel: VendorStatus::Failed,
            successful: false,
            encoders: Vec::new(),
        }
    }

    /// The engine could not be queried at all.
    pub fn test_failed(&self) -> bool {
        [self.nvidia, self.amd, self.intel].contains(&VendorStatus::Failed)
    }
}

pub async fn run_codec_test(engine: &Path) -> CodecTestReport {
    match detect_hardware_encoders(engine).await {
        Ok(encoders) => CodecTestReport::from_encoders(encoders),
        Err(e) => {
            tracing::warn!("Codec test failed: {}", e);
            CodecTestReport::failed()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Checked,
    WrongFile,
    Error,
    NotDetected,
}

impl ToolStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ToolStatus::Checked => "Checked",
            ToolStatus::WrongFile => "Wrong File",
            ToolStatus::Error => "Error",
            ToolStatus::NotDetected => "Not Detected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCheck {
    pub status: ToolStatus,
    pub version: Option<String>,
}

impl ToolCheck {
    fn not_detected() -> Self {
        Self {
            status: ToolStatus::NotDetected,
            version: None,
        }
    }

    fn report_line(&self, name: &str) -> String {
        match &self.version {
            Some(version) => format!("{}: {} - Version {}", name, self.status.label(), version),
            None => format!("{}: {}", name, self.status.label()),
        }
    }
}

pub fn parse_version(output: &str) -> Option<String> {
    version_regex().captures(output).map(|caps| caps[1].to_string())
}

/// Whether the `-formats` table lists `muxer` as writable.
pub fn muxer_supported(formats_table: &str, muxer: &str) -> bool {
    let pattern = format!(r"(?m)^\s.E\s+.*?\b{}\b", regex::escape(muxer));
    Regex::new(&pattern)
        .map(|re| re.is_match(formats_table))
        .unwrap_or(false)
}

/// Checks one tool: it must exist, its file name must mention `name`, and
/// `-version` must succeed.
pub async fn check_tool(name: &str, path: Option<&Path>) -> ToolCheck {
    let Some(path) = path.filter(|p| p.exists()) else {
        return ToolCheck::not_detected();
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !file_name.contains(name) {
        return ToolCheck {
            status: ToolStatus::WrongFile,
            version: None,
        };
    }

    match run_query(path, ["-version"]).await {
        Ok(output) => ToolCheck {
            status: ToolStatus::Checked,
            version: parse_version(&output.combined()),
        },
        Err(e) => {
            tracing::warn!("{} check failed: {}", name, e);
            ToolCheck {
                status: ToolStatus::Error,
                version: None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSupport {
    pub name: String,
    pub detected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableReport {
    pub ffmpeg: ToolCheck,
    pub ffprobe: ToolCheck,
    pub ffplay: ToolCheck,
    pub audio_formats: Vec<FormatSupport>,
    pub video_formats: Vec<FormatSupport>,
    pub report: String,
}

pub async fn validate_executables(paths: &EnginePaths) -> ExecutableReport {
    let ffmpeg = check_tool("ffmpeg", Some(paths.ffmpeg.as_path())).await;
    let ffprobe = check_tool("ffprobe", paths.ffprobe.as_deref()).await;
    let ffplay = check_tool("ffplay", paths.ffplay.as_deref()).await;

    let mut lines = vec![
        ffmpeg.report_line("Ffmpeg"),
        ffprobe.report_line("Ffprobe"),
        ffplay.report_line("Ffplay"),
        "\n--- Format Support ---".to_string(),
    ];

    let mut audio_formats = Vec::new();
    let mut video_formats = Vec::new();

    if ffmpeg.status == ToolStatus::Checked {
        match run_query(&paths.ffmpeg, ["-hide_banner", "-formats"]).await {
            Ok(output) => {
                let table = output.combined();
                audio_formats = AudioFormat::ALL
                    .iter()
                    .map(|f| FormatSupport {
                        name: f.as_str().to_string(),
                        detected: muxer_supported(&table, f.muxer()),
                    })
                    .collect();
                video_formats = VideoFormat::ALL
                    .iter()
                    .map(|f| FormatSupport {
                        name: f.as_str().to_string(),
                        detected: muxer_supported(&table, f.muxer()),
                    })
                    .collect();

                lines.push("\nAudio Formats:".to_string());
                lines.extend(audio_formats.iter().map(format_support_line));
                lines.push("\nVideo Formats:".to_string());
                lines.extend(video_formats.iter().map(format_support_line));
            }
            Err(e) => lines.push(format!("\nCould not check formats: {}", e)),
        }
    } else {
        lines.push("\nFFmpeg not detected or incorrect file. Cannot check format support.".to_string());
    }

    ExecutableReport {
        ffmpeg,
        ffprobe,
        ffplay,
        audio_formats,
        video_formats,
        report: lines.join("\n"),
    }
}

fn format_support_line(support: &FormatSupport) -> String {
    let state = if support.detected { "Detected" } else { "Not Detected" };
    format!("  {} - {}", support.name.to_uppercase(), state)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODERS: &str = "Encoders:
 V..... = Video
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D hevc_nvenc           NVIDIA NVENC hevc encoder (codec hevc)
 V....D h264_qsv             H.264 / AVC (Intel Quick Sync Video acceleration) (codec h264)
 V....D h264_nvenc           duplicate row
 A....D aac                  AAC (Advanced Audio Coding)
";

    #[test]
    fn keeps_only_hardware_encoders() {
        assert_eq!(
            parse_hardware_encoders(ENCODERS),
            vec!["h264_nvenc", "h264_qsv", "hevc_nvenc"]
        );
    }

    #[test]
    fn codec_test_reports_each_vendor() {
        let report = CodecTestReport::from_encoders(parse_hardware_encoders(ENCODERS));
        assert_eq!(report.nvidia, VendorStatus::Detected);
        assert_eq!(report.amd, VendorStatus::NotDetected);
        assert_eq!(report.intel, VendorStatus::Detected);
        assert!(report.successful);

        let none = CodecTestReport::from_encoders(Vec::new());
        assert!(!none.successful);
        assert_eq!(none.status_message, "Status: No Supported GPU Detected");
    }

    #[test]
    fn hidden_encoders_are_not_offered() {
        let detected = parse_hardware_encoders(ENCODERS);
        let offered = available_video_codecs(true, &detected);
        assert_eq!(offered, vec!["libx265", "libx264", "mpeg4", "h264_qsv"]);
        assert_eq!(available_video_codecs(false, &detected).len(), 3);
    }

    #[test]
    fn reads_version_token() {
        let out = "ffmpeg version 6.1.1-full_build-www.gyan.dev Copyright (c) 2000-2023";
        assert_eq!(parse_version(out).as_deref(), Some("6.1.1-full_build-www.gyan.dev"));
        assert_eq!(parse_version("no match here"), None);
    }

    #[test]
    fn muxer_support_requires_encode_flag() {
        let table = " D  aac             raw ADTS AAC (Advanced Audio Coding)
  E adts            ADTS AAC (Advanced Audio Coding)
 DE matroska,webm   Matroska / WebM
 DE mp3             MP3 (MPEG audio layer 3)
";
        assert!(muxer_supported(table, "adts"));
        assert!(muxer_supported(table, "matroska"));
        assert!(muxer_supported(table, "mp3"));
        assert!(!muxer_supported(table, "aac"));
        assert!(!muxer_supported(table, "ipod"));
    }

    #[tokio::test]
    async fn missing_or_misnamed_tools_are_flagged() {
        assert_eq!(
            check_tool("ffprobe", Some(Path::new("/no/such/ffprobe"))).await.status,
            ToolStatus::NotDetected
        );
        assert_eq!(check_tool("ffplay", None).await.status, ToolStatus::NotDetected);

        let dir = tempfile::tempdir().unwrap();
        let wrong = dir.path().join("notepad.exe");
        std::fs::write(&wrong, b"").unwrap();
        assert_eq!(check_tool("ffmpeg", Some(&wrong)).await.status, ToolStatus::WrongFile);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn validates_engine_and_reports_formats() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("ffmpeg");
        std::fs::write(
            &engine,
            "#!/bin/sh\n\
             case \"$*\" in\n\
             *-version*) echo 'ffmpeg version 7.0 Copyright' ;;\n\
             *-formats*) printf ' DE mp3   MP3\\n  E mp4   MP4\\n' ;;\n\
             esac\n",
        )
        .unwrap();
        std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755)).unwrap();

        let report = validate_executables(&EnginePaths::new(&engine)).await;
        assert_eq!(report.ffmpeg.status, ToolStatus::Checked);
        assert_eq!(report.ffmpeg.version.as_deref(), Some("7.0"));
        assert_eq!(report.ffprobe.status, ToolStatus::NotDetected);

        let mp3 = report.audio_formats.iter().find(|f| f.name == "mp3").unwrap();
        assert!(mp3.detected);
        let flac = report.audio_formats.iter().find(|f| f.name == "flac").unwrap();
        assert!(!flac.detected);
        assert!(report.report.contains("Ffmpeg: Checked - Version 7.0"));
        assert!(report.report.contains("MP4 - Detected"));
    }
}
