//! Error types shared by the registry and its sample sources.

use thiserror::Error;

/// Shared result type for registration and rendering.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registration-time and render-time failures.
///
/// Registration errors are fatal at startup: a process should refuse to
/// serve with an incomplete collector set.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate metric name: {0}")]
    DuplicateName(String),
    #[error("invalid metric name: {0:?}")]
    InvalidName(String),
    #[error("invalid label name: {0:?}")]
    InvalidLabel(String),
    #[error("invalid histogram buckets: {0}")]
    InvalidBuckets(String),
    #[error("render failed: {0}")]
    Render(#[from] std::fmt::Error),
}

/// Scrape-time failure of a single sample source.
///
/// Never propagated past the registry; the offending metric is skipped.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Parse(String),
    #[error("unavailable: {0}")]
    Unavailable(&'static str),
    #[error("invalid label name: {0:?}")]
    InvalidLabel(String),
    #[error("malformed sample: {0}")]
    Malformed(String),
    #[error("sample source panicked: {0}")]
    Panicked(String),
}

impl RegistryError {
    /// Stable short code, used in HTTP error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::DuplicateName(_) => "DUPLICATE_NAME",
            RegistryError::InvalidName(_) => "INVALID_NAME",
            RegistryError::InvalidLabel(_) => "INVALID_LABEL",
            RegistryError::InvalidBuckets(_) => "INVALID_BUCKETS",
            RegistryError::Render(_) => "RENDER",
        }
    }
}
