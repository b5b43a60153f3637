//! Transport surface for one-shot fetches.
//!
//! A [`Transport`] starts callback-driven fetch and download jobs. It owns
//! each [`Job`] it returns and reports through the supplied [`Completion`].
//! [`Session`] turns those jobs into awaitable results through the one-shot
//! request adapter, and [`FileTransport`] serves local files so the whole
//! path can run without a network.

mod error;
mod file;
mod session;

pub use error::TransportError;
pub use file::FileTransport;
pub use session::Session;

use crate::request::Completion;
use crate::sync::Job;
use std::path::PathBuf;
use std::sync::Arc;

/// Starts cancellable fetch and download jobs.
pub trait Transport: Send + Sync {
    /// Starts fetching `request` into memory.
    fn start_request(
        &self,
        request: &Request,
        completion: Completion<(Vec<u8>, Response)>,
    ) -> Arc<dyn Job>;

    /// Starts downloading `request` into a temporary file owned by the
    /// transport. The session relocates it on success.
    fn start_download(
        &self,
        request: &Request,
        completion: Completion<(PathBuf, Response)>,
    ) -> Arc<dyn Job>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn start_request(
        &self,
        request: &Request,
        completion: Completion<(Vec<u8>, Response)>,
    ) -> Arc<dyn Job> {
        (**self).start_request(request, completion)
    }

    fn start_download(
        &self,
        request: &Request,
        completion: Completion<(PathBuf, Response)>,
    ) -> Arc<dyn Job> {
        (**self).start_download(request, completion)
    }
}

/// A fetch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Target URL.
    pub url: String,
    /// Method name, `GET` by default.
    pub method: String,
    /// Request headers in insertion order.
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// A `GET` request for `url`.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Metadata describing a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The URL that was served.
    pub url: String,
    /// Status code.
    pub status: u16,
    /// Response headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// Body length in bytes, if known.
    pub content_length: Option<u64>,
}

impl Response {
    /// Returns the first header named `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
