pub mod batch;
pub mod command;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod settings;

pub use batch::{AddReport, BatchError, FileBatch};
pub use command::{build_arguments, build_intermediate_arguments, EngineArgs, InputSpec, StagingKind};
pub use pipeline::{DestinationPrompt, FileResult, JobError, JobOutcome, JobPipeline, JobResult, JobStrategy};
pub use progress::{format_hms, parse_timestamp, ProgressTracker, ProgressUpdate};
pub use runner::{CancellationToken, EngineFailure, FailureKind, ProcessRunner, RunOutcome, RunnerError};
pub use settings::{
    AudioFormat, AudioQuality, AudioSettings, Bitrate, ConversionSettings, Destination, EnginePaths,
    FrameRate, MediaMode, QualityLevel, Resolution, SettingsError, VideoCodec, VideoFormat, VideoSettings,
};
