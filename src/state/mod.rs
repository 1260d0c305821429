use crate::events::{AppEvent, ProgressMode};
use crate::probe::{CodecTestReport, ExecutableReport};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const COMPLETION_TITLE: &str = "Processing Complete";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Processing {
        start_time: Instant,
        cancel_requested: bool,
    },
}

impl JobState {
    pub fn is_idle(&self) -> bool {
        matches!(self, JobState::Idle)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, JobState::Processing { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub kind: DialogKind,
    pub title: String,
    pub message: String,
}

/// Everything the front end renders, updated only from the event channel and
/// from the user's own actions.
#[derive(Debug, Clone)]
pub struct AppData {
    pub state: JobState,
    pub status: String,
    pub progress: f32,
    pub progress_mode: ProgressMode,
    pub dialogs: VecDeque<Dialog>,
    pub hardware_encoders: Vec<String>,
    pub codec_test: Option<CodecTestReport>,
    pub executable_report: Option<ExecutableReport>,
    pending_completion: Option<Dialog>,
    last_total_time: Option<Duration>,
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            state: JobState::Idle,
            status: "Ready.".to_string(),
            progress: 0.0,
            progress_mode: ProgressMode::Determinate,
            dialogs: VecDeque::new(),
            hardware_encoders: Vec::new(),
            codec_test: None,
            executable_report: None,
            pending_completion: None,
            last_total_time: None,
        }
    }
}

impl AppData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processing(&self) -> bool {
        self.state.is_processing()
    }

    /// Enters the processing state; refused while a job is already running.
    pub fn start_processing(&mut self) -> bool {
        if self.state.is_processing() {
            return false;
        }
        self.state = JobState::Processing {
            start_time: Instant::now(),
            cancel_requested: false,
        };
        self.progress = 0.0;
        self.progress_mode = ProgressMode::Determinate;
        self.last_total_time = None;
        self.pending_completion = None;
        true
    }

    /// Marks the running job as cancel-requested; false when nothing is running.
    pub fn request_cancel(&mut self) -> bool {
        match &mut self.state {
            JobState::Processing { cancel_requested, .. } => {
                *cancel_requested = true;
                true
            }
            JobState::Idle => false,
        }
    }

    pub fn cancel_requested(&self) -> bool {
        matches!(
            self.state,
            JobState::Processing {
                cancel_requested: true,
                ..
            }
        )
    }

    pub fn elapsed(&self) -> Option<Duration> {
        match &self.state {
            JobState::Processing { start_time, .. } => Some(start_time.elapsed()),
            JobState::Idle => None,
        }
    }

    pub fn last_total_time(&self) -> Option<Duration> {
        self.last_total_time
    }

    pub fn push_dialog(&mut self, kind: DialogKind, title: impl Into<String>, message: impl Into<String>) {
        self.dialogs.push_back(Dialog {
            kind,
            title: title.into(),
            message: message.into(),
        });
    }

    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Status(text) => self.status = text,
            AppEvent::Progress(pct) => self.progress = pct.clamp(0.0, 100.0),
            AppEvent::ProgressMode(mode) => self.progress_mode = mode,
            AppEvent::TotalTime(elapsed) => {
                self.last_total_time = Some(elapsed);
                if let Some(mut dialog) = self.pending_completion.take() {
                    dialog
                        .message
                        .push_str(&format!("\n\nTotal time: {:.2} seconds", elapsed.as_secs_f64()));
                    self.dialogs.push_back(dialog);
                }
            }
            AppEvent::ProcessingDone => {
                if let Some(dialog) = self.pending_completion.take() {
                    self.dialogs.push_back(dialog);
                }
                self.state = JobState::Idle;
                self.progress = 0.0;
                self.progress_mode = ProgressMode::Determinate;
                self.status = "Ready.".to_string();
            }
            AppEvent::ShowInfo { title, message } => {
                let dialog = Dialog {
                    kind: DialogKind::Info,
                    title,
                    message,
                };
                // the job's total time arrives right after its summary
                if dialog.title == COMPLETION_TITLE && self.state.is_processing() {
                    self.pending_completion = Some(dialog);
                } else {
                    self.dialogs.push_back(dialog);
                }
            }
            AppEvent::ShowError { title, message } => self.push_dialog(DialogKind::Error, title, message),
            AppEvent::CodecsUpdated(encoders) => self.hardware_encoders = encoders,
            AppEvent::CodecTestFinished(report) => self.codec_test = Some(report),
            AppEvent::ExecutablesChecked(report) => self.executable_report = Some(report),
        }
    }
}
