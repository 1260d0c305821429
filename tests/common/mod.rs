#![allow(dead_code)]

use async_trait::async_trait;
use media_converter::config::AppConfig;
use media_converter::conversion::{ConversionSettings, DestinationPrompt, EnginePaths};
use media_converter::events::{AppEvent, EventReceiver, ProgressMode};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Marker that makes the fake engine fail for any argument list containing it.
pub const FAILING_MARKER: &str = "corrupt-input";

/// Writes an executable stand-in for ffmpeg. It appends its argument line to
/// `calls.log` next to itself, touches its last argument (the output path)
/// and fails when any argument contains `FAILING_MARKER`.
pub fn fake_engine(dir: &Path) -> PathBuf {
    let log = dir.join("calls.log");
    write_script(
        dir,
        "ffmpeg",
        &format!(
            "#!/bin/sh\n\
             echo \"$*\" >> '{}'\n\
             for last; do :; done\n\
             case \"$*\" in *{}*) echo 'Invalid data found when processing input' >&2; exit 1;; esac\n\
             : > \"$last\"\n\
             exit 0\n",
            log.display(),
            FAILING_MARKER
        ),
    )
}

/// Argument lines the fake engine in `dir` was called with, in order.
pub fn recorded_calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("calls.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// A stand-in probing tool that reports every file as 60 seconds long.
pub fn fake_probe(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffprobe",
        "#!/bin/sh\nprintf '{\"format\":{\"duration\":\"60.0\"},\"streams\":[]}'\n",
    )
}

/// A stand-in engine that never finishes on its own.
pub fn slow_engine(dir: &Path) -> PathBuf {
    write_script(dir, "ffmpeg-slow", "#!/bin/sh\nexec sleep 30\n")
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Creates empty input files; the fake engine never reads them.
pub fn media_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, b"").unwrap();
            path
        })
        .collect()
}

pub fn settings(config: AppConfig, engine: &Path) -> ConversionSettings {
    let mut settings = config.to_settings().unwrap();
    settings.engine = EnginePaths::new(engine);
    settings
}

pub struct FixedPrompt {
    pub directory: Option<PathBuf>,
    pub save_file: Option<PathBuf>,
}

#[async_trait]
impl DestinationPrompt for FixedPrompt {
    async fn pick_directory(&self) -> Option<PathBuf> {
        self.directory.clone()
    }

    async fn pick_save_file(&self, _suggested_dir: Option<&Path>, _extension: &str) -> Option<PathBuf> {
        self.save_file.clone()
    }
}

pub fn drain(rx: &mut EventReceiver) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn progress_modes(events: &[AppEvent]) -> Vec<ProgressMode> {
    events
        .iter()
        .filter_map(|event| match event {
            AppEvent::ProgressMode(mode) => Some(*mode),
            _ => None,
        })
        .collect()
}

pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}
