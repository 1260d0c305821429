use crate::events::{send_event, AppEvent, EventSender};

pub mod conversion_service;
pub mod probe_service;

pub use conversion_service::{ConversionService, ConversionServiceError, JobStatus};
pub use probe_service::ProbeService;

#[derive(Clone)]
pub struct ServiceManager {
    pub conversion: ConversionService,
    pub probe: ProbeService,
    event_sender: EventSender,
}

impl ServiceManager {
    pub fn new(event_sender: EventSender) -> Self {
        Self {
            conversion: ConversionService::new(event_sender.clone()),
            probe: ProbeService::new(event_sender.clone()),
            event_sender,
        }
    }

    pub async fn initialize(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.conversion.initialize().await?;
        self.probe.initialize().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.conversion.shutdown().await?;
        self.probe.shutdown().await?;
        Ok(())
    }

    pub fn send_event(&self, event: AppEvent) {
        send_event(&self.event_sender, event);
    }
}

#[async_trait::async_trait]
pub trait Service {
    async fn initialize(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    async fn shutdown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
