use super::EventHandler;
use crate::error::SinkError;
use crate::probe::{ProbeRequest, ProbeResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Appends one CSV record per completed probe to a file.
///
/// The file is opened for each record and closed again right after the
/// write. Write failures are logged and counted, the engine never sees them.
#[derive(Debug)]
pub struct ResultsToFile {
    path: PathBuf,
    delimiter: char,
    failures: AtomicU64,
}

impl ResultsToFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_delimiter(path, ',')
    }

    pub fn with_delimiter(path: impl Into<PathBuf>, delimiter: char) -> Self {
        Self {
            path: path.into(),
            delimiter,
            failures: AtomicU64::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn write_record(&self, result: &ProbeResult) -> Result<(), SinkError> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", result.to_csv(self.delimiter))?;
        file.flush()?;
        Ok(())
    }
}

impl EventHandler for ResultsToFile {
    fn on_probe_finished(&self, request: &ProbeRequest, result: &ProbeResult) {
        match self.write_record(result) {
            Ok(()) => tracing::debug!(path = %self.path.display(), url = %request.url, "probe result saved"),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(path = %self.path.display(), error = %e, "failed to save probe result");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{Direction, ProbeState};
    use std::time::Duration;
    use tempfile::TempDir;

    fn request() -> ProbeRequest {
        ProbeRequest {
            direction: Direction::Upload,
            url: "http://localhost/up".into(),
            size_bytes: 1_000,
        }
    }

    #[test]
    fn test_appends_one_line_per_probe() {
        let dir = TempDir::new().unwrap();
        let sink = ResultsToFile::with_delimiter(dir.path().join("results.csv"), ';');

        let first = ProbeResult::measured(ProbeState::Finished, Direction::Upload, 1_000, Duration::from_millis(10));
        let second = ProbeResult::measured(ProbeState::Error, Direction::Upload, 0, Duration::from_millis(3));
        sink.on_probe_finished(&request(), &first);
        sink.on_probe_finished(&request(), &second);

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(ProbeResult::from_csv(lines[0], ';').unwrap(), first);
        assert_eq!(ProbeResult::from_csv(lines[1], ';').unwrap(), second);
        assert_eq!(sink.failures(), 0);
    }

    #[test]
    fn test_write_failure_is_counted_not_raised() {
        let dir = TempDir::new().unwrap();
        let sink = ResultsToFile::new(dir.path().join("missing").join("results.csv"));

        sink.on_probe_finished(&request(), &ProbeResult::undefined());
        sink.on_probe_finished(&request(), &ProbeResult::undefined());

        assert_eq!(sink.failures(), 2);
        assert!(matches!(sink.write_record(&ProbeResult::undefined()), Err(SinkError::Io(_))));
    }
}
