//! Transport layer errors.

use std::io;
use thiserror::Error;

/// Errors reported by [`FileTransport`](super::FileTransport).
///
/// Every variant names the URL it concerns.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The resource does not exist.
    #[error("resource not found: {url}")]
    NotFound {
        /// The requested URL.
        url: String,
        /// The source I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading the resource failed.
    #[error("I/O error reading {url}: {source}")]
    Io {
        /// The requested URL.
        url: String,
        /// The source I/O error.
        #[source]
        source: io::Error,
    },

    /// The URL scheme is not served by this transport.
    #[error("unsupported URL scheme: {url}")]
    UnsupportedScheme {
        /// The requested URL.
        url: String,
    },

    /// Only `GET` is served.
    #[error("unsupported method {method} for {url}")]
    UnsupportedMethod {
        /// The requested method.
        method: String,
        /// The requested URL.
        url: String,
    },

    /// The job was cancelled before it finished.
    #[error("request cancelled: {url}")]
    Cancelled {
        /// The requested URL.
        url: String,
    },
}

impl TransportError {
    pub(crate) fn from_io(url: &str, source: io::Error) -> Self {
        let url = url.to_string();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { url, source }
        } else {
            Self::Io { url, source }
        }
    }

    /// Returns the URL this error concerns.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::NotFound { url, .. }
            | Self::Io { url, .. }
            | Self::UnsupportedScheme { url }
            | Self::UnsupportedMethod { url, .. }
            | Self::Cancelled { url } => url,
        }
    }
}
