//! Local file transport.
//!
//! Serves `file://` URLs and plain filesystem paths from a worker thread per
//! job. The worker holds the only strong reference to the job while it runs,
//! so the job lives exactly as long as the work does.

use super::{Request, Response, Transport, TransportError};
use crate::request::Completion;
use crate::sync::Job;
use crate::tracing_compat::{trace, warn};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

struct FileJob {
    url: String,
    cancelled: AtomicBool,
}

impl FileJob {
    fn new(url: &str) -> Arc<Self> {
        Arc::new(Self {
            url: url.to_string(),
            cancelled: AtomicBool::new(false),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Sleeps for `latency`, waking early on cancel. Returns false if cancelled.
    fn wait(&self, latency: Option<Duration>) -> bool {
        if let Some(latency) = latency {
            let deadline = Instant::now() + latency;
            while !self.is_cancelled() {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::sleep(CANCEL_POLL_INTERVAL.min(deadline - now));
            }
        }
        !self.is_cancelled()
    }
}

impl Job for FileJob {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            trace!(url = %self.url, "file job cancelled");
        }
    }
}

/// Serves local files as if they were fetched.
#[derive(Debug, Clone)]
pub struct FileTransport {
    latency: Option<Duration>,
    temp_dir: PathBuf,
}

impl FileTransport {
    /// A transport with no artificial latency, staging downloads in the
    /// system temporary directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            latency: None,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Delays every job by `latency`. Cancellation interrupts the delay.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Stages downloads in `dir` instead of the system temporary directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    fn run<T, W, D>(
        &self,
        request: &Request,
        completion: Completion<T>,
        work: W,
        discard: D,
    ) -> Arc<dyn Job>
    where
        T: Send + 'static,
        W: FnOnce(&Path) -> Result<T, TransportError> + Send + 'static,
        D: FnOnce(T) + Send + 'static,
    {
        let job = FileJob::new(&request.url);
        let path = match validate(request) {
            Ok(path) => path,
            Err(err) => {
                completion.fail(err);
                return job;
            }
        };

        // Shared so a failed thread spawn can still report through it.
        let slot = Arc::new(Mutex::new(Some(completion)));
        let worker_slot = Arc::clone(&slot);
        let worker_job = Arc::clone(&job);
        let latency = self.latency;
        let spawned = thread::Builder::new()
            .name("cancel-bridge-file".to_string())
            .spawn(move || {
                let job = worker_job;
                let Some(completion) = worker_slot.lock().take() else {
                    return;
                };
                if !job.wait(latency) {
                    completion.fail(TransportError::Cancelled { url: job.url.clone() });
                    return;
                }
                match work(&path) {
                    Ok(value) if job.is_cancelled() => {
                        discard(value);
                        completion.fail(TransportError::Cancelled { url: job.url.clone() });
                    }
                    Ok(value) => {
                        if let Err(unread) = completion.try_succeed(value) {
                            trace!(url = %job.url, "payload had no reader");
                            discard(unread);
                        }
                    }
                    Err(err) => completion.fail(err),
                }
            });
        if let Err(source) = spawned {
            report_spawn_failure(&slot, &request.url, source);
        }
        job
    }
}

impl Default for FileTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for FileTransport {
    fn start_request(
        &self,
        request: &Request,
        completion: Completion<(Vec<u8>, Response)>,
    ) -> Arc<dyn Job> {
        let url = request.url.clone();
        self.run(
            request,
            completion,
            move |path| {
                let bytes = fs::read(path).map_err(|e| TransportError::from_io(&url, e))?;
                let response = response_for(&url, path, bytes.len() as u64);
                Ok((bytes, response))
            },
            drop,
        )
    }

    fn start_download(
        &self,
        request: &Request,
        completion: Completion<(PathBuf, Response)>,
    ) -> Arc<dyn Job> {
        let url = request.url.clone();
        let staged = self
            .temp_dir
            .join(format!("cancel-bridge-{}.tmp", Uuid::new_v4()));
        self.run(
            request,
            completion,
            move |path| {
                let len = fs::copy(path, &staged).map_err(|e| TransportError::from_io(&url, e))?;
                let response = response_for(&url, path, len);
                Ok((staged, response))
            },
            |(staged, _)| remove_staged(&staged),
        )
    }
}

/// Fails the completion still parked in `slot` with the spawn error.
fn report_spawn_failure<T>(slot: &Mutex<Option<Completion<T>>>, url: &str, source: io::Error) {
    warn!(url = %url, error = %source, "failed to start file worker");
    if let Some(completion) = slot.lock().take() {
        completion.fail(TransportError::Io {
            url: url.to_string(),
            source,
        });
    }
}

/// Deletes a staged download nobody will relocate.
#[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
pub(crate) fn remove_staged(staged: &Path) {
    if let Err(err) = fs::remove_file(staged) {
        warn!(path = %staged.display(), error = %err, "failed to remove staged download");
    } else {
        trace!(path = %staged.display(), "staged download removed");
    }
}

/// Maps a URL to a local path, rejecting anything this transport can't serve.
pub(crate) fn local_path(url: &str) -> Result<PathBuf, TransportError> {
    if let Some(rest) = url.strip_prefix("file://") {
        let rest = rest.strip_prefix("localhost").unwrap_or(rest);
        return Ok(PathBuf::from(rest));
    }
    if url.contains("://") {
        return Err(TransportError::UnsupportedScheme {
            url: url.to_string(),
        });
    }
    Ok(PathBuf::from(url))
}

fn validate(request: &Request) -> Result<PathBuf, TransportError> {
    if !request.method.eq_ignore_ascii_case("GET") {
        return Err(TransportError::UnsupportedMethod {
            method: request.method.clone(),
            url: request.url.clone(),
        });
    }
    local_path(&request.url)
}

fn response_for(url: &str, path: &Path, len: u64) -> Response {
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("html" | "htm") => "text/html",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    };
    Response {
        url: url.to_string(),
        status: 200,
        headers: vec![
            ("Content-Type".to_string(), content_type.to_string()),
            ("Content-Length".to_string(), len.to_string()),
        ],
        content_length: Some(len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::pending_result;

    #[test]
    fn local_path_forms() {
        assert_eq!(local_path("file:///tmp/a.txt").ok(), Some(PathBuf::from("/tmp/a.txt")));
        assert_eq!(
            local_path("file://localhost/tmp/a.txt").ok(),
            Some(PathBuf::from("/tmp/a.txt"))
        );
        assert_eq!(local_path("/tmp/a.txt").ok(), Some(PathBuf::from("/tmp/a.txt")));
        let err = local_path("https://example.com/a.txt").unwrap_err();
        assert_eq!(err.url(), "https://example.com/a.txt");
    }

    #[test]
    fn response_metadata() {
        let response = response_for("file:///x/data.json", Path::new("/x/data.json"), 12);
        assert_eq!(response.status, 200);
        assert_eq!(response.content_length, Some(12));
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("CONTENT-LENGTH"), Some("12"));
    }

    #[test]
    fn spawn_failure_reports_io_error_with_url() {
        let (resolver, pending) = pending_result();
        let slot = Mutex::new(Some(Completion::<Vec<u8>>::new(resolver)));
        report_spawn_failure(&slot, "file:///tmp/a.txt", io::Error::other("no threads left"));
        assert!(slot.lock().is_none());

        let err = futures_lite::future::block_on(pending)
            .expect("completion resolved")
            .unwrap_err();
        let transport = err.upstream_ref::<TransportError>().expect("transport error");
        assert!(matches!(transport, TransportError::Io { .. }));
        assert_eq!(transport.url(), "file:///tmp/a.txt");
        assert!(err.to_string().contains("no threads left"));
    }

    #[test]
    fn remove_staged_deletes_only_the_staged_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("src.bin");
        fs::write(&source, b"bytes").expect("write");
        let staged = dir.path().join("staged.tmp");
        fs::write(&staged, b"bytes").expect("write");
        remove_staged(&staged);
        assert!(!staged.exists());
        assert!(source.exists());
        // A second removal only logs.
        remove_staged(&staged);
    }

    #[test]
    fn job_wait_is_interrupted_by_cancel() {
        let job = FileJob::new("file:///never");
        job.cancel();
        let started = Instant::now();
        assert!(!job.wait(Some(Duration::from_secs(5))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
