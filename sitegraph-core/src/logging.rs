// Run log: every crawl writes its tracing output to a file, never to stdout

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const DEFAULT_LOG_FILE: &str = "sitegraph.log";

const DEFAULT_FILTER: &str = "debug";

/// Holds the subscriber installed for the current run. Dropping it restores
/// whatever subscriber was active before.
///
/// The subscriber is thread-local. Background tasks must be started with
/// [`spawn_logged`] for their events to reach the run log.
pub struct RunLog {
    path: Option<PathBuf>,
    _guard: DefaultGuard,
}

impl RunLog {
    /// Appends to `path`. If the file can't be opened the run continues with
    /// logging discarded and a single warning on stderr.
    pub fn open(path: &Path) -> Self {
        let (writer, path) = match open_append(path) {
            Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), Some(path.to_path_buf())),
            Err(e) => {
                eprintln!(
                    "Warning: cannot open log file {}: {}, logging disabled",
                    path.display(),
                    e
                );
                (BoxMakeWriter::new(io::sink), None)
            }
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .finish();

        Self {
            path,
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }

    /// The file being written, `None` when logging fell back to a sink.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// `tokio::spawn` carrying the caller's subscriber into the task.
pub fn spawn_logged<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future.with_current_subscriber())
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_log_writes_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("run.log");

        {
            let log = RunLog::open(&path);
            assert_eq!(log.path(), Some(path.as_path()));
            tracing::info!("first run");
        }
        {
            let _log = RunLog::open(&path);
            tracing::info!("second run");
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("first run"));
        assert!(contents.contains("second run"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawned_task_logs_to_run_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.log");

        {
            let _log = RunLog::open(&path);
            spawn_logged(async {
                tracing::debug!("event from a worker task");
            })
            .await
            .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("event from a worker task"));
    }

    #[test]
    fn test_unwritable_log_falls_back() {
        let dir = TempDir::new().unwrap();
        // A directory can't be opened for appending
        let log = RunLog::open(dir.path());
        assert!(log.path().is_none());
        tracing::info!("discarded");
    }
}
