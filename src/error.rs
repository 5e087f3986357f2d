//! Error types for the figma-backup library.

use thiserror::Error;

/// Errors that can occur while discovering, downloading or reporting files.
#[derive(Error, Debug)]
pub enum Error {
    /// A catalog call failed on every attempt.
    #[error("catalog unavailable after {attempts} attempts: {url}")]
    CatalogUnavailable {
        /// Endpoint that kept failing.
        url: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// A UI element did not show up within its timeout.
    #[error("element not found: {selector}")]
    ElementNotFound {
        /// CSS selector that was waited for.
        selector: String,
    },

    /// An element handle went stale between lookup and use.
    #[error("stale element reference: {0}")]
    StaleReference(String),

    /// The saved file never showed up in the staging directory.
    #[error("file did not appear in staging: {title}")]
    FileNotAppeared {
        /// Title (without extension) that was polled for.
        title: String,
    },

    /// Logging into the web application failed.
    #[error("login failed for {login}: {reason}")]
    LoginFailed {
        /// Account login.
        login: String,
        /// What went wrong.
        reason: String,
    },

    /// Any other WebDriver protocol error.
    #[error("WebDriver error: {0}")]
    WebDriver(String),

    /// Configuration is present but invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Report delivery failed.
    #[error("notification failed: {0}")]
    Notify(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON payload error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for figma-backup operations.
pub type Result<T> = std::result::Result<T, Error>;
