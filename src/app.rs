use media_converter::config::AppConfig;
use media_converter::constants::{AUDIO_EXTENSIONS, FFMPEG_DOWNLOAD_URL, MAX_BATCH_FILES, VIDEO_EXTENSIONS};
use media_converter::conversion::{CancellationToken, DestinationPrompt, FileBatch};
use media_converter::events::{create_event_channel, AppEvent, EventReceiver};
use media_converter::probe::available_video_codecs;
use media_converter::services::ServiceManager;
use media_converter::state::{AppData, DialogKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Native dialogs used when a job needs to ask where its output goes.
pub struct NativeDialogPrompt;

#[async_trait::async_trait]
impl DestinationPrompt for NativeDialogPrompt {
    async fn pick_directory(&self) -> Option<PathBuf> {
        rfd::AsyncFileDialog::new()
            .set_title("Select Destination Folder")
            .pick_folder()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    async fn pick_save_file(&self, suggested_dir: Option<&Path>, extension: &str) -> Option<PathBuf> {
        let mut dialog = rfd::AsyncFileDialog::new()
            .set_title("Save Joined File")
            .set_file_name(format!("joined.{}", extension))
            .add_filter(extension.to_uppercase(), &[extension]);
        if let Some(dir) = suggested_dir {
            dialog = dialog.set_directory(dir);
        }
        let mut path = dialog.save_file().await?.path().to_path_buf();
        if path.extension().is_none() {
            path.set_extension(extension);
        }
        Some(path)
    }
}

pub struct MediaConverterApp {
    pub config: AppConfig,
    pub batch: FileBatch,
    pub selected: Option<usize>,
    pub data: AppData,
    pub show_library: bool,
    pub confirm_cancel: bool,
    job_token: Option<CancellationToken>,
    services: ServiceManager,
    events: EventReceiver,
    runtime: Handle,
}

impl MediaConverterApp {
    pub fn new(runtime: Handle) -> Self {
        let config = AppConfig::load();
        let (event_sender, events) = create_event_channel();
        let services = ServiceManager::new(event_sender);

        let init = services.clone();
        runtime.spawn(async move {
            if let Err(e) = init.initialize().await {
                tracing::error!("Service initialization failed: {}", e);
            }
        });

        let app = Self {
            config,
            batch: FileBatch::new(),
            selected: None,
            data: AppData::new(),
            show_library: false,
            confirm_cancel: false,
            job_token: None,
            services,
            events,
            runtime,
        };
        app.detect_encoders();
        app
    }

    /// Drains pending job and probe events into the render state.
    pub fn poll_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if event == AppEvent::ProcessingDone {
                self.job_token = None;
            }
            self.data.apply_event(event);
        }
    }

    pub fn save_config(&self) {
        if let Err(e) = self.config.save() {
            tracing::warn!("Failed to save config: {}", e);
        }
    }

    pub fn video_codecs(&self) -> Vec<String> {
        available_video_codecs(self.config.hardware_acceleration, &self.data.hardware_encoders)
    }

    pub fn add_files(&mut self) {
        let extensions: Vec<&str> = AUDIO_EXTENSIONS.iter().chain(VIDEO_EXTENSIONS).copied().collect();
        let Some(paths) = rfd::FileDialog::new()
            .set_title("Select Media Files")
            .add_filter("Media Files", &extensions[..])
            .add_filter("Audio Files", AUDIO_EXTENSIONS)
            .add_filter("Video Files", VIDEO_EXTENSIONS)
            .pick_files()
        else {
            return;
        };

        let report = self.batch.add_many(paths);
        tracing::info!("Added {} file(s) to the batch", report.added);
        if report.limit_reached {
            self.data.push_dialog(
                DialogKind::Info,
                "File Limit Reached",
                format!("You can only add up to {} files.", MAX_BATCH_FILES),
            );
        }
        if !report.unsupported.is_empty() {
            let names: Vec<String> = report.unsupported.iter().map(|p| p.display().to_string()).collect();
            self.data.push_dialog(
                DialogKind::Error,
                "Unsupported Format",
                format!("These files were skipped:\n{}", names.join("\n")),
            );
        }
    }

    pub fn remove_selected(&mut self) {
        let Some(index) = self.selected else { return };
        if self.batch.remove(index).is_ok() {
            self.selected = match self.batch.len() {
                0 => None,
                len => Some(index.min(len - 1)),
            };
        }
    }

    pub fn clear_files(&mut self) {
        self.batch.clear();
        self.selected = None;
    }

    pub fn move_selected(&mut self, up: bool) {
        let Some(index) = self.selected else { return };
        let target = if up {
            match index.checked_sub(1) {
                Some(t) => t,
                None => return,
            }
        } else {
            index + 1
        };
        if self.batch.move_item(index, target).is_ok() {
            self.selected = Some(target);
        }
    }

    pub fn display_name(&self, path: &Path) -> String {
        if self.config.show_full_path {
            path.display().to_string()
        } else {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        }
    }

    pub fn browse_destination(&mut self) {
        if let Some(dir) = rfd::FileDialog::new().set_title("Select Destination Folder").pick_folder() {
            self.config.dest_path = Some(dir);
            self.save_config();
        }
    }

    pub fn browse_tool(&mut self, tool: &str) {
        let Some(path) = rfd::FileDialog::new()
            .set_title(format!("Locate {}", tool))
            .pick_file()
        else {
            return;
        };
        match tool {
            "ffmpeg" => self.config.ffmpeg_path = Some(path),
            "ffprobe" => self.config.ffprobe_path = Some(path),
            "ffplay" => self.config.ffplay_path = Some(path),
            _ => return,
        }
        self.save_config();
        self.check_executables();
    }

    /// Snapshots the current options and hands the batch to the conversion service.
    pub fn start_processing(&mut self) {
        let settings = match self.config.to_settings() {
            Ok(settings) => settings,
            Err(e) => {
                self.data.push_dialog(DialogKind::Error, "Invalid Settings", e.to_string());
                return;
            }
        };
        if !self.data.start_processing() {
            return;
        }
        self.save_config();

        let token = CancellationToken::new();
        self.job_token = Some(token.clone());

        let files = self.batch.paths().to_vec();
        let services = self.services.clone();
        self.runtime.spawn(async move {
            let prompt: Arc<dyn DestinationPrompt> = Arc::new(NativeDialogPrompt);
            if let Err(e) = services
                .conversion
                .start_job_with_token(files, settings, prompt, token)
                .await
            {
                tracing::warn!("Could not start job: {}", e);
                services.send_event(AppEvent::error("Busy", e.to_string()));
                services.send_event(AppEvent::ProcessingDone);
            }
        });
    }

    pub fn cancel_processing(&mut self) {
        self.confirm_cancel = false;
        if !self.data.request_cancel() {
            return;
        }
        self.data.status = "Cancelling...".to_string();
        match &self.job_token {
            Some(token) => {
                tracing::info!("Cancellation requested");
                token.cancel();
            }
            None => tracing::debug!("Cancel requested with no job token"),
        }
    }

    pub fn show_media_info(&mut self) {
        let Some(file) = self.selected_file() else { return };
        let _guard = self.runtime.enter();
        let ffprobe = self.config.engine_paths().ffprobe;
        self.services.probe.show_media_info(ffprobe, file);
    }

    pub fn play_selected(&mut self) {
        let Some(file) = self.selected_file() else { return };
        let _guard = self.runtime.enter();
        let paths = self.config.engine_paths();
        self.services.probe.play(paths.ffplay, paths.ffprobe, file);
    }

    pub fn detect_encoders(&self) {
        let _guard = self.runtime.enter();
        self.services.probe.detect_encoders(self.config.engine_paths().ffmpeg);
    }

    pub fn run_codec_test(&mut self) {
        self.data.codec_test = None;
        let _guard = self.runtime.enter();
        self.services.probe.run_codec_test(self.config.engine_paths().ffmpeg);
    }

    pub fn check_executables(&mut self) {
        self.data.executable_report = None;
        let _guard = self.runtime.enter();
        self.services.probe.check_executables(self.config.engine_paths());
    }

    pub fn open_download_page(&mut self) {
        if let Err(e) = webbrowser::open(FFMPEG_DOWNLOAD_URL) {
            tracing::warn!("Could not open browser: {}", e);
            self.data.push_dialog(
                DialogKind::Error,
                "Error",
                format!("Could not open {}:\n{}", FFMPEG_DOWNLOAD_URL, e),
            );
        }
    }

    /// Hardware toggles change the codec list, so the choice is re-validated.
    pub fn on_hardware_toggled(&mut self) {
        if self.config.hardware_acceleration {
            self.detect_encoders();
        }
        let codecs = self.video_codecs();
        if !codecs.contains(&self.config.video_codec) {
            if let Some(first) = codecs.first() {
                self.config.video_codec = first.clone();
            }
        }
        self.save_config();
    }

    pub fn shutdown(&self) {
        if let Some(token) = &self.job_token {
            token.cancel();
        }
        self.save_config();
        let services = self.services.clone();
        self.runtime.spawn(async move {
            if let Err(e) = services.shutdown().await {
                tracing::warn!("Service shutdown failed: {}", e);
            }
        });
    }

    fn selected_file(&self) -> Option<PathBuf> {
        self.selected
            .and_then(|index| self.batch.paths().get(index))
            .cloned()
    }
}
