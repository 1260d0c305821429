use crate::conversion::pipeline::{DestinationPrompt, JobOutcome, JobPipeline};
use crate::conversion::runner::{CancellationToken, ProcessRunner};
use crate::conversion::settings::ConversionSettings;
use crate::events::EventSender;
use crate::services::Service;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionServiceError {
    #[error("A job is already running: {job_id}")]
    AlreadyRunning { job_id: Uuid },
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: Uuid },
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Running,
    Finished(JobOutcome),
    /// The job was rejected or aborted; the message was already sent as an error event.
    Failed(String),
}

struct ManagedJob {
    token: CancellationToken,
    status: JobStatus,
    started_at: Instant,
    handle: Option<JoinHandle<()>>,
}

/// Owns the lifecycle of conversion jobs: one at a time, each with its own
/// cancellation token, running as a background task.
#[derive(Clone)]
pub struct ConversionService {
    jobs: Arc<RwLock<HashMap<Uuid, ManagedJob>>>,
    event_sender: EventSender,
    staging_root: Option<PathBuf>,
}

impl ConversionService {
    pub fn new(event_sender: EventSender) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            event_sender,
            staging_root: None,
        }
    }

    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    pub async fn start_job(
        &self,
        files: Vec<PathBuf>,
        settings: ConversionSettings,
        prompt: Arc<dyn DestinationPrompt>,
    ) -> Result<Uuid, ConversionServiceError> {
        self.start_job_with_token(files, settings, prompt, CancellationToken::new())
            .await
    }

    /// Starts a job driven by a token the caller already holds, so a cancel
    /// issued before the job is registered still takes effect.
    pub async fn start_job_with_token(
        &self,
        files: Vec<PathBuf>,
        settings: ConversionSettings,
        prompt: Arc<dyn DestinationPrompt>,
        token: CancellationToken,
    ) -> Result<Uuid, ConversionServiceError> {
        let mut jobs = self.jobs.write().await;
        if let Some((job_id, _)) = jobs.iter().find(|(_, job)| job.status == JobStatus::Running) {
            return Err(ConversionServiceError::AlreadyRunning { job_id: *job_id });
        }

        let job_id = Uuid::new_v4();

        let mut pipeline = JobPipeline::new(settings, ProcessRunner::new(self.event_sender.clone()), prompt);
        if let Some(root) = &self.staging_root {
            pipeline = pipeline.with_staging_root(root.clone());
        }

        tracing::info!("Starting job {} with {} file(s)", job_id, files.len());

        let jobs_handle = self.jobs.clone();
        let job_token = token.clone();
        let handle = tokio::spawn(async move {
            let status = match pipeline.run(&files, &job_token).await {
                Ok(outcome) => JobStatus::Finished(outcome),
                Err(e) => JobStatus::Failed(e.to_string()),
            };
            if let Some(job) = jobs_handle.write().await.get_mut(&job_id) {
                job.status = status;
            }
            tracing::info!("Job {} ended", job_id);
        });

        jobs.insert(
            job_id,
            ManagedJob {
                token,
                status: JobStatus::Running,
                started_at: Instant::now(),
                handle: Some(handle),
            },
        );

        Ok(job_id)
    }

    /// Requests cancellation. Idempotent; the job reports its own end.
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<(), ConversionServiceError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&job_id).ok_or(ConversionServiceError::JobNotFound { job_id })?;
        job.token.cancel();
        tracing::info!("Cancellation requested for job {}", job_id);
        Ok(())
    }

    pub async fn cancel_active(&self) -> Option<Uuid> {
        let job_id = self.active_job().await?;
        self.cancel_job(job_id).await.ok()?;
        Some(job_id)
    }

    pub async fn active_job(&self) -> Option<Uuid> {
        let jobs = self.jobs.read().await;
        jobs.iter()
            .find(|(_, job)| job.status == JobStatus::Running)
            .map(|(id, _)| *id)
    }

    pub async fn job_status(&self, job_id: Uuid) -> Option<JobStatus> {
        self.jobs.read().await.get(&job_id).map(|job| job.status.clone())
    }

    pub async fn elapsed(&self, job_id: Uuid) -> Option<Duration> {
        self.jobs.read().await.get(&job_id).map(|job| job.started_at.elapsed())
    }

    /// Waits for the job's task to end and returns its final status.
    pub async fn wait(&self, job_id: Uuid) -> Option<JobStatus> {
        let handle = self.jobs.write().await.get_mut(&job_id)?.handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Job {} task ended abnormally: {}", job_id, e);
                if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
                    job.status = JobStatus::Failed(e.to_string());
                }
            }
        }
        self.job_status(job_id).await
    }

    pub async fn cleanup_finished(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.status == JobStatus::Running);
        before - jobs.len()
    }
}

#[async_trait::async_trait]
impl Service for ConversionService {
    async fn initialize(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!("Conversion service initialized");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(job_id) = self.cancel_active().await {
            self.wait(job_id).await;
        }
        tracing::info!("Conversion service shutdown");
        Ok(())
    }
}
