use crate::probe::{CodecTestReport, ExecutableReport};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Determinate,
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    // Job events
    Status(String),
    Progress(f32),
    ProgressMode(ProgressMode),
    TotalTime(Duration),
    ProcessingDone,

    // Dialog requests
    ShowInfo { title: String, message: String },
    ShowError { title: String, message: String },

    // Capability probe events
    CodecsUpdated(Vec<String>),
    CodecTestFinished(CodecTestReport),
    ExecutablesChecked(ExecutableReport),
}

impl AppEvent {
    pub fn status(message: impl Into<String>) -> Self {
        AppEvent::Status(message.into())
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        AppEvent::ShowInfo {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        AppEvent::ShowError {
            title: title.into(),
            message: message.into(),
        }
    }
}

pub type EventSender = tokio::sync::mpsc::UnboundedSender<AppEvent>;
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Sends an event, logging instead of failing when the receiving side is gone.
pub fn send_event(sender: &EventSender, event: AppEvent) {
    if let Err(e) = sender.send(event) {
        tracing::debug!("Event dropped, receiver closed: {:?}", e.0);
    }
}
