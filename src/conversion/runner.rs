use crate::constants::{CANCELLATION_CHECK_INTERVAL_MS, MAX_LOG_LINES};
use crate::conversion::command::EngineArgs;
use crate::conversion::progress::{format_hms, ProgressTracker};
use crate::events::{send_event, AppEvent, EventSender};
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Job-scoped cancellation flag. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    UnsupportedCodec,
    Engine,
}

/// A run that ended with a non-zero exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub kind: FailureKind,
    pub exit_code: Option<i32>,
    pub diagnostics: String,
}

impl EngineFailure {
    pub fn classify(exit_code: Option<i32>, diagnostics: String) -> Self {
        let kind = if diagnostics.contains("Unknown encoder") || diagnostics.contains("Unknown decoder") {
            FailureKind::UnsupportedCodec
        } else {
            FailureKind::Engine
        };
        Self {
            kind,
            exit_code,
            diagnostics,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            FailureKind::UnsupportedCodec => "Unsupported Codec",
            FailureKind::Engine => "FFmpeg Error",
        }
    }

    pub fn user_message(&self) -> String {
        match self.kind {
            FailureKind::UnsupportedCodec => "FFmpeg could not process the file because a required audio or video \
                 codec is not supported by your current FFmpeg build.\n\n\
                 What you can do:\n\
                 1. Try converting to a different output format.\n\
                 2. Use a full build of FFmpeg, which includes more codecs.\n\
                 3. Check the FFmpeg Library window to see which formats your build supports."
                .to_string(),
            FailureKind::Engine => format!("An error occurred with FFmpeg:\n{}", self.diagnostics),
        }
    }
}

impl std::fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} (exit code {})", self.title(), code),
            None => write!(f, "{} (terminated)", self.title()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed(EngineFailure),
    Cancelled,
}

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for engine process: {0}")]
    Wait(#[from] std::io::Error),
}

/// Supervises one engine process at a time: spawns it, drains its diagnostic
/// stream into progress events and enforces cancellation.
#[derive(Clone)]
pub struct ProcessRunner {
    events: EventSender,
    poll_interval: Duration,
}

impl ProcessRunner {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            poll_interval: Duration::from_millis(CANCELLATION_CHECK_INTERVAL_MS),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    pub async fn run(
        &self,
        program: &Path,
        args: &EngineArgs,
        token: &CancellationToken,
        expected_seconds: Option<f64>,
    ) -> Result<RunOutcome, RunnerError> {
        if token.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }

        let mut cmd = Command::new(program);
        cmd.args(args.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        tracing::debug!("Running {} {}", program.display(), args.display());

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: program.display().to_string(),
            source,
        })?;
        let started = Instant::now();

        let tracker = ProgressTracker::new(expected_seconds);
        let events = self.events.clone();
        let stderr = child.stderr.take();
        let mut drain = tokio::spawn(async move {
            match stderr {
                Some(stderr) => drain_diagnostics(stderr, tracker, events, started).await,
                None => String::new(),
            }
        });

        let mut cancelled = false;
        let wait_result = loop {
            match tokio::time::timeout(self.poll_interval, child.wait()).await {
                Ok(status) => break status,
                Err(_) => {
                    if token.is_cancelled() {
                        cancelled = true;
                        if let Err(e) = child.start_kill() {
                            tracing::warn!("Failed to kill engine process: {}", e);
                        }
                        break child.wait().await;
                    }
                }
            }
        };

        // A forked grandchild can hold stderr open after the kill; a cancelled
        // run does not wait on it beyond one poll interval.
        let joined = if cancelled {
            match tokio::time::timeout(self.poll_interval, &mut drain).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::debug!("Diagnostic stream still open after cancel, abandoning it");
                    drain.abort();
                    let _ = (&mut drain).await;
                    Ok(String::new())
                }
            }
        } else {
            drain.await
        };
        let diagnostics = match joined {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Diagnostic reader ended abnormally: {}", e);
                String::new()
            }
        };
        let status = wait_result?;

        if cancelled || token.is_cancelled() {
            tracing::info!("Engine process cancelled after {:?}", started.elapsed());
            return Ok(RunOutcome::Cancelled);
        }

        if status.success() {
            Ok(RunOutcome::Success)
        } else {
            tracing::warn!("Engine exited with {}", status);
            Ok(RunOutcome::Failed(EngineFailure::classify(status.code(), diagnostics)))
        }
    }
}

/// Splits a byte stream on both `\n` and `\r`; the engine rewrites its stats
/// line with carriage returns.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            Some(line)
        }
    }
}

async fn drain_diagnostics<R>(
    mut stream: R,
    tracker: ProgressTracker,
    events: EventSender,
    started: Instant,
) -> String
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut tail: VecDeque<String> = VecDeque::new();
    let mut buf = [0u8; 4096];

    let handle_line = |line: String, tail: &mut VecDeque<String>| {
        if let Some(update) = tracker.observe(&line, started.elapsed()) {
            if let Some(eta) = update.eta {
                send_event(
                    &events,
                    AppEvent::status(format!("Processing... ETA: {}", format_hms(eta))),
                );
            }
            send_event(&events, AppEvent::Progress(update.percentage));
        }
        if tail.len() == MAX_LOG_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    };

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.feed(&buf[..n]) {
                    handle_line(line, &mut tail);
                }
            }
            Err(e) => {
                tracing::debug!("Stopped reading engine diagnostics: {}", e);
                break;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        handle_line(line, &mut tail);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::create_event_channel;

    #[test]
    fn splitter_handles_carriage_returns_and_partial_chunks() {
        let mut splitter = LineSplitter::default();
        assert_eq!(splitter.feed(b"frame=1 time=00:00:01.00\rframe=2 ti"), vec!["frame=1 time=00:00:01.00"]);
        assert_eq!(splitter.feed(b"me=00:00:02.00\r\n"), vec!["frame=2 time=00:00:02.00"]);
        assert_eq!(splitter.feed(b"tail"), Vec::<String>::new());
        assert_eq!(splitter.finish(), Some("tail".to_string()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn unknown_encoder_is_classified_as_unsupported_codec() {
        let failure = EngineFailure::classify(Some(1), "Unknown encoder 'libfoo'".to_string());
        assert_eq!(failure.kind, FailureKind::UnsupportedCodec);
        assert_eq!(failure.title(), "Unsupported Codec");

        let failure = EngineFailure::classify(Some(1), "No such file or directory".to_string());
        assert_eq!(failure.kind, FailureKind::Engine);
        assert!(failure.user_message().contains("No such file or directory"));
    }

    #[test]
    fn cancellation_token_is_sticky_and_shared() {
        let token = CancellationToken::new();
        let ui_side = token.clone();
        assert!(!token.is_cancelled());
        ui_side.cancel();
        ui_side.cancel();
        assert!(token.is_cancelled());
    }

    #[cfg(unix)]
    fn sh(script: &str) -> EngineArgs {
        ["-c", script].into_iter().collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_progress_from_diagnostic_stream() {
        let (tx, mut rx) = create_event_channel();
        let runner = ProcessRunner::new(tx);
        let outcome = runner
            .run(
                Path::new("/bin/sh"),
                &sh("printf 'size=N/A time=00:00:30.00 bitrate=N/A\\r' >&2"),
                &CancellationToken::new(),
                Some(60.0),
            )
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Success);
        let mut progress = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let AppEvent::Progress(pct) = event {
                progress.push(pct);
            }
        }
        assert_eq!(progress, vec![50.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_diagnostics() {
        let (tx, _rx) = create_event_channel();
        let outcome = ProcessRunner::new(tx)
            .run(
                Path::new("/bin/sh"),
                &sh("echo 'Unknown encoder libnope' >&2; exit 3"),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        match outcome {
            RunOutcome::Failed(failure) => {
                assert_eq!(failure.exit_code, Some(3));
                assert_eq!(failure.kind, FailureKind::UnsupportedCodec);
                assert!(failure.diagnostics.contains("libnope"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_kills_child_within_poll_bound() {
        let (tx, _rx) = create_event_channel();
        let runner = ProcessRunner::new(tx);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let outcome = runner
            .run(Path::new("/bin/sh"), &sh("exec sleep 10"), &token, None)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_millis(700), "took {:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_does_not_wait_for_forked_children() {
        let (tx, _rx) = create_event_channel();
        let runner = ProcessRunner::new(tx);
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        // without exec the shell forks sleep, which keeps stderr open
        let started = Instant::now();
        let outcome = runner
            .run(Path::new("/bin/sh"), &sh("sleep 5; true"), &token, None)
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_millis(700), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn pre_cancelled_token_spawns_nothing() {
        let (tx, _rx) = create_event_channel();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = ProcessRunner::new(tx)
            .run(Path::new("/definitely/not/an/engine"), &EngineArgs::new(), &token, None)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
    }

    #[tokio::test]
    async fn missing_engine_is_a_spawn_error() {
        let (tx, _rx) = create_event_channel();
        let result = ProcessRunner::new(tx)
            .run(
                Path::new("/definitely/not/an/engine"),
                &EngineArgs::new(),
                &CancellationToken::new(),
                None,
            )
            .await;
        assert!(matches!(result, Err(RunnerError::Spawn { .. })));
    }
}
