//! Ingest progress reporting.
//!
//! Reports what the pipeline is doing so users see how far along a large
//! tree is. Progress goes to **stderr** so stdout carries only the summary
//! line.

use serde::Serialize;
use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// Walking the source roots. Total unknown.
    Discovering { root: String },
    /// Extracting and classifying: n documents done out of total.
    Processing { n: u64, total: u64 },
    /// Writing artifacts to the output directory.
    Writing { out: String },
}

impl ProgressEvent {
    /// The line [`StderrProgress`] prints, without the newline.
    pub fn human_line(&self) -> String {
        match self {
            ProgressEvent::Discovering { root } => format!("keepsake  scanning {}", root),
            ProgressEvent::Processing { n, total } => format!(
                "keepsake  {} of {} documents",
                group_thousands(*n),
                group_thousands(*total)
            ),
            ProgressEvent::Writing { out } => format!("keepsake  writing artifacts to {}", out),
        }
    }

    /// One JSON object tagged `"event": "progress"` and the event's phase.
    pub fn json_line(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Line<'a> {
            event: &'static str,
            #[serde(flatten)]
            progress: &'a ProgressEvent,
        }
        serde_json::to_string(&Line {
            event: "progress",
            progress: self,
        })
    }
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

fn emit(line: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", line);
    let _ = stderr.flush();
}

/// Human-friendly progress on stderr: "keepsake  1,234 of 5,000 documents".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        emit(&event.human_line());
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        match event.json_line() {
            Ok(line) => emit(&line),
            Err(e) => tracing::debug!(error = %e, "progress event not serializable"),
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// `12345` as `12,345`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut groups: Vec<&str> = Vec::new();
    if head > 0 {
        groups.push(&digits[..head]);
    }
    for i in (head..digits.len()).step_by(3) {
        groups.push(&digits[i..i + 3]);
    }
    groups.join(",")
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn human_lines_group_counts() {
        let line = ProgressEvent::Processing {
            n: 12_345,
            total: 1_000_000,
        }
        .human_line();
        assert_eq!(line, "keepsake  12,345 of 1,000,000 documents");
        assert_eq!(group_thousands(7), "7");
        assert_eq!(group_thousands(100), "100");
    }

    #[test]
    fn json_lines_carry_the_phase() {
        let value: serde_json::Value = serde_json::from_str(
            &ProgressEvent::Writing {
                out: "data".to_string(),
            }
            .json_line()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({"event": "progress", "phase": "writing", "out": "data"})
        );

        let processing = ProgressEvent::Processing { n: 3, total: 9 }
            .json_line()
            .unwrap();
        assert!(processing.contains("\"phase\":\"processing\""));
        assert!(processing.contains("\"total\":9"));
    }

    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn reporters_are_object_safe() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let reporter: &dyn ProgressReporter = &recorder;
        reporter.report(ProgressEvent::Processing { n: 1, total: 2 });
        assert_eq!(
            recorder.0.lock().unwrap().as_slice(),
            &[ProgressEvent::Processing { n: 1, total: 2 }]
        );
    }
}
