//! Error taxonomy for the data-access layer

use crate::core::models::Platform;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by adapters, the query cache and hooks.
///
/// `Clone` so one de-duplicated fetch can hand the same error to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{platform} request failed: {status_code} {status_text}")]
    Upstream {
        platform: Platform,
        status_code: u16,
        status_text: String,
    },

    #[error("Server request failed: {status_code} {status_text}")]
    Backend { status_code: u16, status_text: String },

    #[error("Unknown avatar source: {0}")]
    UnknownSource(String),

    #[error("{0} is not initialized yet")]
    NotInitialized(&'static str),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("{operation} is not supported by {platform}")]
    Unsupported {
        platform: Platform,
        operation: &'static str,
    },

    #[error("Cached value for {0} has an unexpected type")]
    CacheType(String),
}

/// Which side of the platform/backend split a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Platform(Platform),
    Backend,
}

impl Error {
    pub fn status(source: Source, status_code: u16, status_text: impl Into<String>) -> Self {
        let status_text = status_text.into();
        match source {
            Source::Platform(platform) => Error::Upstream {
                platform,
                status_code,
                status_text,
            },
            Source::Backend => Error::Backend {
                status_code,
                status_text,
            },
        }
    }

    /// Status code carried by HTTP-derived errors. `Some(0)` marks a request
    /// that never produced a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Upstream { status_code, .. } | Error::Backend { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend { .. })
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Error::Upstream { .. })
    }

    /// Backend rejected our credentials; callers prompt for re-auth instead
    /// of retrying.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Backend { status_code: 401 | 403, .. })
    }
}
