use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

fn time_regex() -> &'static Regex {
    static TIME_REGEX: OnceLock<Regex> = OnceLock::new();
    TIME_REGEX.get_or_init(|| {
        Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("valid progress regex")
    })
}

/// Extracts the processing position, in seconds, from an engine diagnostic line.
pub fn parse_timestamp(line: &str) -> Option<f64> {
    let caps = time_regex().captures(line)?;
    let hours: f64 = caps[1].parse().ok()?;
    let minutes: f64 = caps[2].parse().ok()?;
    let seconds: f64 = caps[3].parse().ok()?;
    let hundredths: f64 = caps[4].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds + hundredths / 100.0)
}

/// Formats a duration as `HH:MM:SS`, wrapping at 24 hours like a clock.
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs() % 86_400;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub percentage: f32,
    pub eta: Option<Duration>,
}

/// Turns engine timestamps into percentage and ETA for one run.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    expected_seconds: Option<f64>,
}

impl ProgressTracker {
    pub fn new(expected_seconds: Option<f64>) -> Self {
        Self {
            expected_seconds: expected_seconds.filter(|secs| *secs > 0.0),
        }
    }

    pub fn is_determinate(&self) -> bool {
        self.expected_seconds.is_some()
    }

    /// `elapsed` is the wall-clock time since the engine was started.
    pub fn observe(&self, line: &str, elapsed: Duration) -> Option<ProgressUpdate> {
        let expected = self.expected_seconds?;
        let current = parse_timestamp(line)?;

        let percentage = (100.0 * current / expected).min(100.0) as f32;

        let wall = elapsed.as_secs_f64();
        let eta = if current > 0.0 && wall > 1.0 {
            let speed = current / wall;
            let remaining = ((expected - current) / speed).max(0.0);
            Some(Duration::from_secs_f64(remaining))
        } else {
            None
        };

        Some(ProgressUpdate { percentage, eta })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_engine_stats_line() {
        let line = "frame=  750 fps=25 q=28.0 size=    1024kB time=00:01:02.50 bitrate= 134.2kbits/s speed=2.1x";
        assert_eq!(parse_timestamp(line), Some(62.5));
        assert_eq!(parse_timestamp("Stream mapping:"), None);
    }

    #[test]
    fn half_way_is_fifty_percent() {
        let tracker = ProgressTracker::new(Some(60.0));
        let update = tracker
            .observe("size=N/A time=00:00:30.00 bitrate=N/A", Duration::from_millis(500))
            .unwrap();
        assert_eq!(update.percentage, 50.0);
        // under a second of wall time: no ETA yet
        assert_eq!(update.eta, None);
    }

    #[test]
    fn eta_uses_observed_speed() {
        let tracker = ProgressTracker::new(Some(60.0));
        let update = tracker
            .observe("time=00:00:20.00", Duration::from_secs(10))
            .unwrap();
        // 2x speed, 40 s of media left
        assert_eq!(update.eta, Some(Duration::from_secs(20)));
    }

    #[test]
    fn percentage_is_capped() {
        let tracker = ProgressTracker::new(Some(10.0));
        let update = tracker.observe("time=00:00:12.00", Duration::from_secs(3)).unwrap();
        assert_eq!(update.percentage, 100.0);
        assert_eq!(update.eta, Some(Duration::ZERO));
    }

    #[test]
    fn unknown_duration_yields_nothing() {
        assert!(!ProgressTracker::new(None).is_determinate());
        assert!(!ProgressTracker::new(Some(0.0)).is_determinate());
        assert_eq!(
            ProgressTracker::new(None).observe("time=00:00:01.00", Duration::from_secs(5)),
            None
        );
    }

    #[test]
    fn formats_clock_style() {
        assert_eq!(format_hms(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_hms(Duration::ZERO), "00:00:00");
    }
}
