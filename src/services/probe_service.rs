use crate::conversion::settings::EnginePaths;
use crate::events::{send_event, AppEvent, EventSender};
use crate::probe::{self, media};
use crate::services::Service;
use std::path::PathBuf;
use tokio::task::JoinHandle;

/// Runs short probing-tool queries in the background and reports each result
/// as an event; nothing here touches job state.
#[derive(Clone)]
pub struct ProbeService {
    event_sender: EventSender,
}

impl ProbeService {
    pub fn new(event_sender: EventSender) -> Self {
        Self { event_sender }
    }

    /// Refreshes the hardware encoder list; failures yield an empty list.
    pub fn detect_encoders(&self, engine: PathBuf) -> JoinHandle<()> {
        let events = self.event_sender.clone();
        tokio::spawn(async move {
            let encoders = match probe::detect_hardware_encoders(&engine).await {
                Ok(encoders) => encoders,
                Err(e) => {
                    tracing::warn!("Hardware encoder detection failed: {}", e);
                    Vec::new()
                }
            };
            send_event(&events, AppEvent::CodecsUpdated(encoders));
        })
    }

    pub fn run_codec_test(&self, engine: PathBuf) -> JoinHandle<()> {
        let events = self.event_sender.clone();
        tokio::spawn(async move {
            let report = probe::run_codec_test(&engine).await;
            if report.test_failed() {
                send_event(&events, AppEvent::CodecsUpdated(Vec::new()));
            }
            send_event(&events, AppEvent::CodecTestFinished(report));
        })
    }

    pub fn check_executables(&self, paths: EnginePaths) -> JoinHandle<()> {
        let events = self.event_sender.clone();
        tokio::spawn(async move {
            let report = probe::validate_executables(&paths).await;
            send_event(&events, AppEvent::ExecutablesChecked(report));
        })
    }

    pub fn show_media_info(&self, ffprobe: Option<PathBuf>, file: PathBuf) -> JoinHandle<()> {
        let events = self.event_sender.clone();
        tokio::spawn(async move {
            match media::probe_media_info(ffprobe.as_deref(), &file).await {
                Ok(info) => send_event(&events, AppEvent::info("Media File Information", info.report())),
                Err(e) => {
                    tracing::warn!("Media info for {} failed: {}", file.display(), e);
                    send_event(
                        &events,
                        AppEvent::error(e.title(), format!("Could not get file information:\n{}", e)),
                    );
                }
            }
        })
    }

    pub fn play(&self, ffplay: Option<PathBuf>, ffprobe: Option<PathBuf>, file: PathBuf) -> JoinHandle<()> {
        let events = self.event_sender.clone();
        tokio::spawn(async move {
            if let Err(e) = media::launch_player(ffplay.as_deref(), ffprobe.as_deref(), &file).await {
                send_event(&events, AppEvent::error("Error", format!("Could not play file:\n{}", e)));
            }
        })
    }
}

#[async_trait::async_trait]
impl Service for ProbeService {
    async fn initialize(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("Probe service initialized");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::create_event_channel;

    #[tokio::test]
    async fn failed_detection_reports_empty_codec_list() {
        let (tx, mut rx) = create_event_channel();
        let service = ProbeService::new(tx);
        service
            .detect_encoders(PathBuf::from("/no/such/ffmpeg"))
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(AppEvent::CodecsUpdated(Vec::new())));
    }

    #[tokio::test]
    async fn failed_codec_test_reports_failure_payload() {
        let (tx, mut rx) = create_event_channel();
        let service = ProbeService::new(tx);
        service.run_codec_test(PathBuf::from("/no/such/ffmpeg")).await.unwrap();

        assert_eq!(rx.recv().await, Some(AppEvent::CodecsUpdated(Vec::new())));
        match rx.recv().await {
            Some(AppEvent::CodecTestFinished(report)) => {
                assert!(!report.successful);
                assert_eq!(report.nvidia, probe::VendorStatus::Failed);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn media_info_without_probe_tool_is_an_error_event() {
        let (tx, mut rx) = create_event_channel();
        ProbeService::new(tx)
            .show_media_info(None, PathBuf::from("/a/song.mp3"))
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(AppEvent::ShowError { .. })));
    }
}
