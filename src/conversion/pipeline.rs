use crate::conversion::command::{build_arguments, build_intermediate_arguments, InputSpec, StagingKind};
use crate::conversion::runner::{CancellationToken, EngineFailure, ProcessRunner, RunOutcome, RunnerError};
use crate::conversion::settings::{ConversionSettings, MediaMode};
use crate::events::{send_event, AppEvent, ProgressMode};
use crate::probe::media::probe_duration;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Interactive destination picker. The desktop front end backs this with
/// native dialogs; `None` means the user dismissed the prompt.
#[async_trait]
pub trait DestinationPrompt: Send + Sync {
    async fn pick_directory(&self) -> Option<PathBuf>;

    async fn pick_save_file(&self, suggested_dir: Option<&Path>, extension: &str) -> Option<PathBuf>;
}

/// Which of the three strategies a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStrategy {
    Individual,
    JoinedAudio,
    JoinedVideo,
}

impl JobStrategy {
    pub fn select(settings: &ConversionSettings) -> Self {
        match (settings.mode, settings.join_requested()) {
            (MediaMode::Audio, true) => JobStrategy::JoinedAudio,
            (MediaMode::Video, true) => JobStrategy::JoinedVideo,
            (_, false) => JobStrategy::Individual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub input: PathBuf,
    /// Output path on success, failure reason otherwise.
    pub result: Result<PathBuf, String>,
}

impl FileResult {
    pub fn file_name(&self) -> String {
        self.input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Individual(Vec<FileResult>),
    Joined { output: PathBuf },
    Failed(EngineFailure),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub elapsed: Duration,
    pub result: JobResult,
}

impl JobOutcome {
    pub fn succeeded(&self) -> usize {
        match &self.result {
            JobResult::Individual(results) => results.iter().filter(|r| r.result.is_ok()).count(),
            JobResult::Joined { .. } => 1,
            _ => 0,
        }
    }

    pub fn failed_files(&self) -> Vec<String> {
        match &self.result {
            JobResult::Individual(results) => results
                .iter()
                .filter(|r| r.result.is_err())
                .map(FileResult::file_name)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.result == JobResult::Cancelled
    }
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("No files selected")]
    EmptyBatch,
    #[error("FFmpeg executable not found: {}", .0.display())]
    EngineNotFound(PathBuf),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error("Failed to create staging directory: {0}")]
    Staging(#[source] std::io::Error),
}

impl JobError {
    pub fn title(&self) -> &'static str {
        match self {
            JobError::EmptyBatch => "No Files",
            JobError::EngineNotFound(_) => "FFmpeg Not Found",
            JobError::Runner(_) | JobError::Staging(_) => "FFmpeg Error",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            JobError::EmptyBatch => "Please add files to the list before starting.".to_string(),
            JobError::EngineNotFound(path) => format!(
                "FFmpeg could not be found at '{}'.\n\nSet its location in the FFmpeg Library window.",
                path.display()
            ),
            JobError::Runner(e) => format!("An unexpected error occurred: {}", e),
            JobError::Staging(e) => format!("An unexpected error occurred: {}", e),
        }
    }
}

/// An engine reference is usable when it is an existing file, or a bare
/// program name that resolves on `PATH`.
pub fn engine_available(program: &Path) -> bool {
    if program.components().count() > 1 || program.is_absolute() {
        program.is_file()
    } else {
        which::which(program).is_ok()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Sequences one job over a file batch with an immutable settings snapshot.
pub struct JobPipeline {
    settings: ConversionSettings,
    runner: ProcessRunner,
    prompt: Arc<dyn DestinationPrompt>,
    staging_root: Option<PathBuf>,
}

impl JobPipeline {
    pub fn new(settings: ConversionSettings, runner: ProcessRunner, prompt: Arc<dyn DestinationPrompt>) -> Self {
        Self {
            settings,
            runner,
            prompt,
            staging_root: None,
        }
    }

    /// Creates join staging directories under `root` instead of the system temp dir.
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    fn emit(&self, event: AppEvent) {
        send_event(self.runner.events(), event);
    }

    fn status(&self, message: impl Into<String>) {
        self.emit(AppEvent::status(message));
    }

    /// Runs the job to completion. Whatever happens, the last two events are
    /// `TotalTime` and `ProcessingDone`; errors are also reported as dialog events.
    pub async fn run(&self, files: &[PathBuf], token: &CancellationToken) -> Result<JobOutcome, JobError> {
        let started = Instant::now();
        let result = self.execute(files, token).await;

        match &result {
            Ok(JobResult::Failed(failure)) => {
                tracing::error!("Job failed: {}", failure);
                self.emit(AppEvent::error(failure.title(), failure.user_message()));
                self.status("Error during processing.");
            }
            Err(e) => {
                tracing::error!("Job aborted: {}", e);
                self.emit(AppEvent::error(e.title(), e.user_message()));
                self.status("Error during processing.");
            }
            Ok(_) => {}
        }

        let elapsed = started.elapsed();
        tracing::info!("Job finished in {:.1}s", elapsed.as_secs_f64());
        self.emit(AppEvent::TotalTime(elapsed));
        self.emit(AppEvent::ProcessingDone);

        result.map(|result| JobOutcome { elapsed, result })
    }

    async fn execute(&self, files: &[PathBuf], token: &CancellationToken) -> Result<JobResult, JobError> {
        if files.is_empty() {
            return Err(JobError::EmptyBatch);
        }
        let engine = &self.settings.engine.ffmpeg;
        if !engine_available(engine) {
            return Err(JobError::EngineNotFound(engine.clone()));
        }

        let strategy = JobStrategy::select(&self.settings);
        tracing::info!("Starting {:?} job over {} file(s)", strategy, files.len());

        match strategy {
            JobStrategy::Individual => self.process_individual(files, token).await,
            JobStrategy::JoinedAudio => self.process_joined(files, StagingKind::Audio, token).await,
            JobStrategy::JoinedVideo => self.process_joined(files, StagingKind::Video, token).await,
        }
    }

    async fn expected_duration(&self, file: &Path) -> Option<f64> {
        let ffprobe = self.settings.engine.usable_ffprobe()?;
        probe_duration(ffprobe, file).await
    }

    async fn process_individual(&self, files: &[PathBuf], token: &CancellationToken) -> Result<JobResult, JobError> {
        let output_dir = match self.settings.destination.directory() {
            Some(dir) => Some(dir.to_path_buf()),
            None => self.prompt.pick_directory().await,
        };
        let Some(output_dir) = output_dir else {
            self.status("Operation cancelled.");
            return Ok(JobResult::Cancelled);
        };

        let total = files.len();
        let mut results = Vec::with_capacity(total);

        for (idx, input) in files.iter().enumerate() {
            if token.is_cancelled() {
                self.status("Conversion process cancelled.");
                return Ok(JobResult::Cancelled);
            }

            let name = display_name(input);
            let stem = input
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.clone());
            let output = output_dir.join(format!("{}.{}", stem, self.settings.output_extension()));

            self.status(format!("Converting ({}/{}): {}", idx + 1, total, name));

            let expected = self.expected_duration(input).await;
            match expected {
                Some(_) => {
                    self.emit(AppEvent::ProgressMode(ProgressMode::Determinate));
                    self.emit(AppEvent::Progress(0.0));
                }
                None => {
                    self.emit(AppEvent::ProgressMode(ProgressMode::Indeterminate));
                    self.status(format!("Converting ({}/{}): {} (ETA not available)", idx + 1, total, name));
                }
            }

            let args = build_arguments(&self.settings, &InputSpec::File(input.clone()), &output);
            match self.runner.run(&self.settings.engine.ffmpeg, &args, token, expected).await? {
                RunOutcome::Success => {
                    tracing::info!("Converted {} -> {}", input.display(), output.display());
                    results.push(FileResult {
                        input: input.clone(),
                        result: Ok(output),
                    });
                }
                RunOutcome::Failed(failure) => {
                    tracing::warn!("Conversion of {} failed: {}", input.display(), failure);
                    results.push(FileResult {
                        input: input.clone(),
                        result: Err(failure.to_string()),
                    });
                }
                RunOutcome::Cancelled => {
                    self.status("Conversion process cancelled.");
                    return Ok(JobResult::Cancelled);
                }
            }
        }

        self.emit(AppEvent::ProgressMode(ProgressMode::Determinate));

        let failed: Vec<String> = results
            .iter()
            .filter(|r| r.result.is_err())
            .map(FileResult::file_name)
            .collect();
        let mut summary = format!(
            "Finished processing.\n\nSuccessfully converted: {}\nFailed: {}",
            total - failed.len(),
            failed.len()
        );
        if !failed.is_empty() {
            summary.push_str("\n\nFailed files:\n");
            summary.push_str(&failed.join("\n"));
        }
        self.emit(AppEvent::info("Processing Complete", summary));
        self.status("Individual conversion complete.");

        Ok(JobResult::Individual(results))
    }

    async fn process_joined(
        &self,
        files: &[PathBuf],
        kind: StagingKind,
        token: &CancellationToken,
    ) -> Result<JobResult, JobError> {
        self.status(match kind {
            StagingKind::Audio => "Joining audio files...",
            StagingKind::Video => "Joining video files...",
        });
        self.emit(AppEvent::ProgressMode(ProgressMode::Indeterminate));

        let output = self
            .prompt
            .pick_save_file(self.settings.destination.directory(), self.settings.output_extension())
            .await;
        let Some(output) = output else {
            self.status("Save cancelled.");
            self.emit(AppEvent::ProgressMode(ProgressMode::Determinate));
            return Ok(JobResult::Cancelled);
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix("media-join-");
        let staging = match &self.staging_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        let staging = match staging {
            Ok(dir) => dir,
            Err(e) => {
                self.emit(AppEvent::ProgressMode(ProgressMode::Determinate));
                return Err(JobError::Staging(e));
            }
        };
        tracing::debug!("Join staging in {}", staging.path().display());

        let result = self.join_stages(files, kind, staging.path(), &output, token).await;

        if let Err(e) = staging.close() {
            tracing::warn!("Failed to remove join staging directory: {}", e);
        }
        self.emit(AppEvent::ProgressMode(ProgressMode::Determinate));
        result
    }

    async fn join_stages(
        &self,
        files: &[PathBuf],
        kind: StagingKind,
        staging: &Path,
        output: &Path,
        token: &CancellationToken,
    ) -> Result<JobResult, JobError> {
        let engine = &self.settings.engine.ffmpeg;
        let mut parts = Vec::with_capacity(files.len());
        let mut total_duration = Some(0.0);

        for (idx, input) in files.iter().enumerate() {
            if token.is_cancelled() {
                self.status("Join process cancelled.");
                return Ok(JobResult::Cancelled);
            }
            self.status(format!("Preparing file {}/{} for joining...", idx + 1, files.len()));

            let duration = self.expected_duration(input).await;
            total_duration = total_duration.zip(duration).map(|(sum, d)| sum + d);

            let part = staging.join(format!("{}.ts", idx));
            let args = build_intermediate_arguments(kind, input, &part);
            match self.runner.run(engine, &args, token, None).await? {
                RunOutcome::Success => parts.push(part),
                RunOutcome::Failed(failure) => return Ok(JobResult::Failed(failure)),
                RunOutcome::Cancelled => {
                    self.status("Join process cancelled.");
                    return Ok(JobResult::Cancelled);
                }
            }
        }

        if token.is_cancelled() {
            self.status("Join process cancelled.");
            return Ok(JobResult::Cancelled);
        }

        self.status("Concatenating files...");
        let args = build_arguments(&self.settings, &InputSpec::Concat(parts), output);

        self.status(format!("Exporting to {}...", display_name(output)));
        if total_duration.is_some() {
            self.emit(AppEvent::ProgressMode(ProgressMode::Determinate));
            self.emit(AppEvent::Progress(0.0));
        }

        match self.runner.run(engine, &args, token, total_duration).await? {
            RunOutcome::Success => {
                tracing::info!("Joined {} file(s) into {}", files.len(), output.display());
                self.emit(AppEvent::info(
                    "Processing Complete",
                    format!("Successfully joined and saved to {}", output.display()),
                ));
                self.status("Join complete.");
                Ok(JobResult::Joined {
                    output: output.to_path_buf(),
                })
            }
            RunOutcome::Failed(failure) => Ok(JobResult::Failed(failure)),
            RunOutcome::Cancelled => {
                self.status("Join process cancelled.");
                Ok(JobResult::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::settings::Destination;
    use crate::events::create_event_channel;

    struct NoPrompt;

    #[async_trait]
    impl DestinationPrompt for NoPrompt {
        async fn pick_directory(&self) -> Option<PathBuf> {
            None
        }

        async fn pick_save_file(&self, _suggested_dir: Option<&Path>, _extension: &str) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn strategy_follows_join_flag_of_active_mode() {
        let mut settings = ConversionSettings {
            join_video: true,
            ..ConversionSettings::default()
        };
        assert_eq!(JobStrategy::select(&settings), JobStrategy::Individual);
        settings.mode = MediaMode::Video;
        assert_eq!(JobStrategy::select(&settings), JobStrategy::JoinedVideo);
        settings.mode = MediaMode::Audio;
        settings.join_audio = true;
        assert_eq!(JobStrategy::select(&settings), JobStrategy::JoinedAudio);
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_and_still_finishes() {
        let (tx, mut rx) = create_event_channel();
        let pipeline = JobPipeline::new(ConversionSettings::default(), ProcessRunner::new(tx), Arc::new(NoPrompt));

        let result = pipeline.run(&[], &CancellationToken::new()).await;
        assert!(matches!(result, Err(JobError::EmptyBatch)));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(AppEvent::ShowError { .. })));
        assert_eq!(events.last(), Some(&AppEvent::ProcessingDone));
        assert!(matches!(events[events.len() - 2], AppEvent::TotalTime(_)));
    }

    #[tokio::test]
    async fn missing_engine_is_rejected_before_prompting() {
        let (tx, _rx) = create_event_channel();
        let settings = ConversionSettings {
            engine: crate::conversion::settings::EnginePaths::new("/no/such/dir/ffmpeg"),
            destination: Destination::AskEveryTime,
            ..ConversionSettings::default()
        };
        let pipeline = JobPipeline::new(settings, ProcessRunner::new(tx), Arc::new(NoPrompt));
        let result = pipeline
            .run(&[PathBuf::from("/music/a.mp3")], &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(JobError::EngineNotFound(_))));
    }

    #[test]
    fn outcome_counts_failures_by_file_name() {
        let outcome = JobOutcome {
            elapsed: Duration::from_secs(1),
            result: JobResult::Individual(vec![
                FileResult {
                    input: PathBuf::from("/m/a.wav"),
                    result: Ok(PathBuf::from("/o/a.mp3")),
                },
                FileResult {
                    input: PathBuf::from("/m/b.wav"),
                    result: Err("FFmpeg Error (exit code 1)".to_string()),
                },
            ]),
        };
        assert_eq!(outcome.succeeded(), 1);
        assert_eq!(outcome.failed_files(), vec!["b.wav".to_string()]);
        assert!(!outcome.is_cancelled());
    }
}
