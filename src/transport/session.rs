//! Awaitable fetch and download conveniences over a [`Transport`].

use super::file::remove_staged;
use super::{Request, Response, Transport};
use crate::config::BridgeConfig;
use crate::cx::Cx;
use crate::request::{self, RequestThen};
use crate::tracing_compat::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Fetches through a transport, one awaitable result per call.
///
/// Every call goes through the one-shot request adapter, so cancelling the
/// caller's [`Cx`] or dropping the returned future cancels the transport job.
#[derive(Debug, Clone)]
pub struct Session<T> {
    transport: Arc<T>,
    download_dir: PathBuf,
}

impl<T: Transport + 'static> Session<T> {
    /// A session relocating downloads into the system temporary directory.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, &BridgeConfig::default())
    }

    /// A session relocating downloads into the configured directory.
    pub fn with_config(transport: T, config: &BridgeConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            download_dir: config.resolved_download_dir(),
        }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the directory downloads are moved into.
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Fetches `url` into memory.
    pub fn data(&self, cx: &Cx, url: &str) -> request::Request<(Vec<u8>, Response)> {
        self.data_for(cx, Request::get(url))
    }

    /// Fetches `request` into memory.
    pub fn data_for(&self, cx: &Cx, req: Request) -> request::Request<(Vec<u8>, Response)> {
        let transport = Arc::clone(&self.transport);
        request::request(cx, move |done| transport.start_request(&req, done))
    }

    /// Downloads `url` and moves the result to a uniquely named file.
    pub fn download(&self, cx: &Cx, url: &str) -> RequestThen<(PathBuf, Response), (PathBuf, Response)> {
        self.download_with(cx, Request::get(url))
    }

    /// Downloads `request` and moves the result to a uniquely named file in
    /// the session's download directory, keeping the URL's extension.
    ///
    /// A failed move resolves as
    /// [`Error::PostProcessing`](crate::Error::PostProcessing). The staged
    /// file is deleted whenever it will not be moved: on a failed move, on
    /// cancellation, or when the future is dropped.
    pub fn download_with(
        &self,
        cx: &Cx,
        req: Request,
    ) -> RequestThen<(PathBuf, Response), (PathBuf, Response)> {
        let transport = Arc::clone(&self.transport);
        let dir = self.download_dir.clone();
        request::request_then(
            cx,
            move |done| transport.start_download(&req, done),
            move |(staged, response)| match relocate(&staged, &dir, &response.url) {
                Ok(dest) => Ok((dest, response)),
                Err(err) => {
                    remove_staged(&staged);
                    Err(err)
                }
            },
        )
        .on_discard(|(staged, _)| remove_staged(&staged))
    }
}

/// Moves `staged` to `<dir>/<uuid>[.<ext>]`, where `ext` comes from the URL.
pub(crate) fn relocate(staged: &Path, dir: &Path, url: &str) -> io::Result<PathBuf> {
    let mut name = Uuid::new_v4().to_string();
    if let Some(ext) = url_extension(url) {
        name.push('.');
        name.push_str(ext);
    }
    let dest = dir.join(name);
    if fs::rename(staged, &dest).is_err() {
        // Cross-device moves need a copy.
        fs::copy(staged, &dest)?;
        fs::remove_file(staged)?;
    }
    debug!(from = %staged.display(), to = %dest.display(), "download relocated");
    Ok(dest)
}

fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_url() {
        assert_eq!(url_extension("file:///tmp/report.pdf"), Some("pdf"));
        assert_eq!(url_extension("https://h/a/b.tar.gz?x=1#frag"), Some("gz"));
        assert_eq!(url_extension("https://h/a/README"), None);
        assert_eq!(url_extension("https://h/a/.hidden"), None);
        assert_eq!(url_extension("https://h/dir.d/"), None);
    }

    #[test]
    fn relocate_moves_and_keeps_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staged = dir.path().join("staged.tmp");
        fs::write(&staged, b"payload").expect("write");
        let dest_dir = dir.path().join("out");
        fs::create_dir(&dest_dir).expect("mkdir");

        let dest = relocate(&staged, &dest_dir, "file:///src/data.bin").expect("relocate");
        assert_eq!(dest.parent(), Some(dest_dir.as_path()));
        assert_eq!(dest.extension().and_then(|e| e.to_str()), Some("bin"));
        assert!(!staged.exists());
        assert_eq!(fs::read(&dest).expect("read"), b"payload");
    }

    #[test]
    fn relocate_into_missing_dir_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staged = dir.path().join("staged.tmp");
        fs::write(&staged, b"x").expect("write");
        let err = relocate(&staged, &dir.path().join("nope"), "file:///a.txt").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
