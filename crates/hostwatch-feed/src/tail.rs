//! Follow a plain-text log file like `tail -f`.
//!
//! Reading starts at the end of the file. Each new non-empty line becomes an
//! event: `critical` when it matches one of the error patterns, `info`
//! otherwise. A `notify` watcher on the parent directory wakes the reader as
//! soon as the file changes; the poll interval is the fallback when the
//! watcher cannot be set up or misses an event. Truncation and rotation
//! (inode change) restart from the beginning of the new file.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hostwatch_core::{ConnectionState, Event, Level, Source};
use notify::RecursiveMode;
use notify_debouncer_full::{DebounceEventResult, new_debouncer};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};
use crate::source::{EventSource, FeedHandle, FeedSink};

/// Substrings that make a line critical (case-insensitive).
pub const ERROR_PATTERNS: &[&str] = &["host down", "error", "critical", "failure", "exception"];

/// Shortest accepted poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Debounce for file system wake-ups.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(100);

/// Classify a raw log line.
pub fn classify_line(line: &str) -> Level {
    let lower = line.to_lowercase();
    if ERROR_PATTERNS.iter().any(|p| lower.contains(p)) {
        Level::Critical
    } else {
        Level::Info
    }
}

/// Incremental line reader tracking position and inode.
#[derive(Debug)]
pub struct LineTailer {
    path: PathBuf,
    position: Option<u64>,
    #[cfg(unix)]
    inode: Option<u64>,
}

impl LineTailer {
    /// Create a tailer; the first read positions at the current end.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            position: None,
            #[cfg(unix)]
            inode: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read complete lines appended since the last call.
    pub fn read_new_lines(&mut self) -> FeedResult<Vec<String>> {
        let open_err = |source| FeedError::OpenFile {
            path: self.path.clone(),
            source,
        };
        let file = File::open(&self.path).map_err(open_err)?;
        let metadata = file.metadata().map_err(|source| FeedError::OpenFile {
            path: self.path.clone(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            let inode = metadata.ino();
            if self.inode.is_some_and(|prev| prev != inode) {
                debug!(path = %self.path.display(), "log file rotated");
                self.position = Some(0);
            }
            self.inode = Some(inode);
        }

        let len = metadata.len();
        let Some(mut position) = self.position else {
            self.position = Some(len);
            return Ok(Vec::new());
        };
        if len < position {
            debug!(path = %self.path.display(), len, position, "log file truncated");
            position = 0;
        }

        let read_err = |source| FeedError::Read {
            feed: self.path.display().to_string(),
            source,
        };
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(position)).map_err(read_err)?;

        let mut lines = Vec::new();
        let mut raw = Vec::new();
        loop {
            raw.clear();
            let n = reader.read_until(b'\n', &mut raw).map_err(|source| FeedError::Read {
                feed: self.path.display().to_string(),
                source,
            })?;
            // Stop at EOF or at a partial line still being written.
            if n == 0 || raw.last() != Some(&b'\n') {
                break;
            }
            position += n as u64;
            // Log files are not guaranteed UTF-8; stray bytes become U+FFFD.
            let line = String::from_utf8_lossy(&raw);
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }

        self.position = Some(position);
        Ok(lines)
    }
}

/// [`EventSource`] following a log file.
#[derive(Debug, Clone)]
pub struct TailFeed {
    path: PathBuf,
    poll_interval: Duration,
}

impl TailFeed {
    /// Follow `path`, polling at least every `poll_interval` (raised to
    /// [`MIN_POLL_INTERVAL`] if shorter).
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Run one read on the blocking pool, handing the tailer back.
async fn read_off_runtime(mut tailer: LineTailer) -> (LineTailer, FeedResult<Vec<String>>) {
    let path = tailer.path().to_path_buf();
    match tokio::task::spawn_blocking(move || {
        let result = tailer.read_new_lines();
        (tailer, result)
    })
    .await
    {
        Ok(done) => done,
        Err(e) => {
            let source = std::io::Error::other(format!("tail read task failed: {e}"));
            let err = FeedError::Read {
                feed: path.display().to_string(),
                source,
            };
            (LineTailer::new(path), Err(err))
        }
    }
}

impl EventSource for TailFeed {
    fn label(&self) -> String {
        format!("tail:{}", self.path.display())
    }

    fn attach(&mut self, sink: FeedSink) -> FeedHandle {
        let mut handle = FeedHandle::new(self.label(), sink.clone());
        let path = self.path.clone();
        let poll_interval = self.poll_interval;
        let label = self.label();

        handle.track(tokio::spawn(async move {
            let (mut tailer, opened) = read_off_runtime(LineTailer::new(&path)).await;
            if let Err(e) = opened {
                warn!(feed = %label, error = %e, "cannot open tailed file");
                sink.status(ConnectionState::Error);
                return;
            }
            sink.status(ConnectionState::Connected);

            let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
            let watch_dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let _debouncer = match new_debouncer(WATCH_DEBOUNCE, None, move |result: DebounceEventResult| {
                if result.is_ok() {
                    let _ = wake_tx.try_send(());
                }
            }) {
                Ok(mut debouncer) => match debouncer.watch(&watch_dir, RecursiveMode::NonRecursive) {
                    Ok(()) => Some(debouncer),
                    Err(e) => {
                        debug!(dir = %watch_dir.display(), error = %e, "watch failed, polling only");
                        None
                    }
                },
                Err(e) => {
                    debug!(error = %e, "file watcher unavailable, polling only");
                    None
                }
            };

            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    Some(()) = wake_rx.recv() => {}
                }
                let (next, result) = read_off_runtime(tailer).await;
                tailer = next;
                match result {
                    Ok(lines) => {
                        for line in lines {
                            let event = Event::new(classify_line(&line), line).with_source(Source::System);
                            if !sink.event(event) {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(feed = %label, error = %e, "tailed file became unreadable");
                        sink.status(ConnectionState::Error);
                        return;
                    }
                }
            }
        }));

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line("router-7 HOST DOWN"), Level::Critical);
        assert_eq!(classify_line("Unhandled Exception in worker"), Level::Critical);
        assert_eq!(classify_line("link flap recovered"), Level::Info);
    }

    #[test]
    fn test_tailer_starts_at_end() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "old line").unwrap();

        let mut tailer = LineTailer::new(file.path());
        assert!(tailer.read_new_lines().unwrap().is_empty());

        writeln!(file, "new line").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "second").unwrap();
        assert_eq!(tailer.read_new_lines().unwrap(), vec!["new line", "second"]);
        assert!(tailer.read_new_lines().unwrap().is_empty());
    }

    #[test]
    fn test_tailer_waits_for_complete_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut tailer = LineTailer::new(file.path());
        tailer.read_new_lines().unwrap();

        write!(file, "partial").unwrap();
        file.flush().unwrap();
        assert!(tailer.read_new_lines().unwrap().is_empty());

        writeln!(file, " done").unwrap();
        assert_eq!(tailer.read_new_lines().unwrap(), vec!["partial done"]);
    }

    #[test]
    fn test_tailer_handles_truncation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a fairly long line that will be truncated away").unwrap();
        let mut tailer = LineTailer::new(file.path());
        tailer.read_new_lines().unwrap();

        file.as_file().set_len(0).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        writeln!(file, "fresh").unwrap();
        assert_eq!(tailer.read_new_lines().unwrap(), vec!["fresh"]);
    }

    #[test]
    fn test_tailer_decodes_invalid_utf8_lossily() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut tailer = LineTailer::new(file.path());
        tailer.read_new_lines().unwrap();

        file.write_all(b"router \xff\xfe host down\n").unwrap();
        file.write_all(b"next line\n").unwrap();
        let lines = tailer.read_new_lines().unwrap();
        assert_eq!(lines, vec!["router \u{fffd}\u{fffd} host down", "next line"]);
        assert_eq!(classify_line(&lines[0]), Level::Critical);
    }

    #[test]
    fn test_zero_poll_interval_is_raised() {
        let feed = TailFeed::new("/var/log/mylog.log", Duration::ZERO);
        assert_eq!(feed.poll_interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_tailer_missing_file() {
        let mut tailer = LineTailer::new("/nonexistent/hostwatch/mylog.log");
        assert!(matches!(tailer.read_new_lines(), Err(FeedError::OpenFile { .. })));
    }
}
