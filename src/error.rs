//! Custom error types for the application.
//!
//! This module defines the primary error type, `WatcherError`, for the whole crate.
//! Using the `thiserror` crate, it gives a single place to describe everything that
//! can go wrong while watching a folder: configuration problems, filesystem access,
//! malformed LIF containers and metadata queries.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically parse or type errors in the
//!   TOML file or environment overrides.
//! - **`Configuration`**: Semantic errors in values that parsed fine (zero interval,
//!   empty file pattern, ...). Raised by `WatcherConfig::validate`.
//! - **`FileSystem`**: The watched directory is missing or unreadable. The watch loop
//!   treats this as transient and retries on the next poll.
//! - **`Io`**: Wraps `std::io::Error` from reading a container file.
//! - **`Container`**: The file was read but is not a well-formed LIF container (bad
//!   magic, truncated block, missing memory block). Usually a file caught mid-write.
//! - **`Xml`**: The embedded XML header could not be parsed.
//! - **`Render`**: The view model could not be built from the selected frames.
//!
//! By using `#[from]`, `WatcherError` can be created from the underlying error types,
//! so the `?` operator works throughout the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, WatcherError>;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum WatcherError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Cannot read directory {path}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed container {path}: {reason}")]
    Container { path: PathBuf, reason: String },

    #[error("XML header error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Render error: {0}")]
    Render(String),
}

impl From<figment::Error> for WatcherError {
    fn from(err: figment::Error) -> Self {
        WatcherError::Config(Box::new(err))
    }
}

impl WatcherError {
    /// Shorthand for a `Container` error.
    pub fn container(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        WatcherError::Container {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the watch loop should log this error and try again next cycle.
    ///
    /// Everything raised while scanning or reading a file is recoverable; only
    /// configuration errors are fatal, and those are raised before the loop starts.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            WatcherError::Config(_) | WatcherError::Configuration(_)
        )
    }
}
