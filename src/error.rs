//! Error types and result handling for Hondana operations.
//!
//! This module defines the error taxonomy used throughout the engine.
//! All operations return a [`Result<T>`] which is a type alias for `std::result::Result<T, Error>`.
//!
//! # Error Categories
//!
//! Errors fall into two groups depending on how far they travel:
//!
//! - **Request-level errors** fail the whole operation and reach the caller:
//!   [`Error::Fetch`], [`Error::InvalidConfig`], [`Error::UnsupportedOperation`].
//! - **Item-level errors** are absorbed inside the pipelines and only shrink the
//!   result: [`Error::RequiredFieldMissing`] skips one listing item or chapter,
//!   [`Error::PageDecode`] drops one page.
//!
//! # Examples
//!
//! ```rust
//! use hondana::Error;
//!
//! let error = Error::fetch("https://example.com/manga", Some(503), "HTTP 503");
//! assert!(error.is_retriable());
//!
//! let error = Error::fetch("https://example.com/manga", Some(404), "HTTP 404");
//! assert!(!error.is_retriable());
//! ```

use thiserror::Error;

/// Type alias for Results with Hondana errors.
///
/// # Examples
///
/// ```rust
/// use hondana::{Result, Error};
///
/// fn example_operation() -> Result<String> {
///     Ok("Success".to_string())
/// }
///
/// fn example_with_error() -> Result<()> {
///     Err(Error::parse("Something went wrong"))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Hondana operations.
///
/// # Variants
///
/// * [`Fetch`](Error::Fetch) - Network failure or non-2xx status
/// * [`RequiredFieldMissing`](Error::RequiredFieldMissing) - Mandatory selector matched nothing
/// * [`PageDecode`](Error::PageDecode) - A single page image URL could not be derived
/// * [`InvalidConfig`](Error::InvalidConfig) - Source configuration rejected at registration
/// * [`UnsupportedOperation`](Error::UnsupportedOperation) - Capability not provided by a source
/// * [`Parse`](Error::Parse) - Data parsing and format errors
/// * [`Source`](Error::Source) - Source-specific errors with context
/// * [`NotFound`](Error::NotFound) - Missing resources
/// * [`Io`](Error::Io) - File system and IO errors
/// * [`Json`](Error::Json) - JSON serialization errors
/// * [`Toml`](Error::Toml) - Catalog decoding errors
/// * [`Other`](Error::Other) - Generic error messages
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP status failure for a single request.
    ///
    /// `status` is `None` when no response was received (timeouts, connection
    /// resets, DNS). `retriable` is true for timeouts, connection failures,
    /// `429` and `5xx`; every other `4xx` is surfaced immediately.
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        retriable: bool,
        message: String,
    },

    /// A selector marked mandatory yielded no value for one item.
    ///
    /// Listing and chapter pipelines turn this into "skip the item"; it only
    /// reaches the caller when the whole document lacks a mandatory field.
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    /// A page image URL could not be derived from its node.
    ///
    /// The page is dropped and remaining pages are re-indexed.
    #[error("Page {index} could not be decoded: {reason}")]
    PageDecode { index: usize, reason: String },

    /// Source configuration rejected at registration time.
    #[error("Invalid configuration for source [{src}]: {message}")]
    InvalidConfig { src: String, message: String },

    /// The source does not implement the requested capability.
    #[error("Source [{src}] does not support {operation}")]
    UnsupportedOperation { src: String, operation: String },

    /// HTML/JSON parsing and data format errors.
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let error = Error::parse("Invalid manga ID format");
    /// let error = Error::parse("Missing title field in response");
    /// ```
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source-specific errors with contextual information.
    #[error("Source error [{src}]: {message}")]
    Source { src: String, message: String },

    /// Resource not found errors.
    #[error("Not found: {0}")]
    NotFound(String),

    /// File system and IO operation errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization and deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog file decoding errors.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error messages.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Creates a source-specific error with source ID and message.
    pub fn source(src: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::Source {
            src: src.into(),
            message: msg.into(),
        }
    }

    /// Creates a not found error with the given message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Creates a fetch error, deriving `retriable` from the status code.
    ///
    /// `None` stands for a transport failure and is always retriable; `429`
    /// and every `5xx` are retriable; all other statuses are not.
    pub fn fetch(url: impl Into<String>, status: Option<u16>, msg: impl Into<String>) -> Self {
        let retriable = match status {
            None => true,
            Some(code) => code == 429 || (500..600).contains(&code),
        };
        Error::Fetch {
            url: url.into(),
            status,
            retriable,
            message: msg.into(),
        }
    }

    /// Creates a required field error for the given field name.
    pub fn required_field(field: impl Into<String>) -> Self {
        Error::RequiredFieldMissing {
            field: field.into(),
        }
    }

    /// Creates a page decode error for the page at `index`.
    pub fn page_decode(index: usize, reason: impl Into<String>) -> Self {
        Error::PageDecode {
            index,
            reason: reason.into(),
        }
    }

    /// Creates a configuration error for the given source.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hondana::Error;
    ///
    /// let error = Error::invalid_config("madara-site", "missing popular URL template");
    /// assert!(error.to_string().contains("madara-site"));
    /// ```
    pub fn invalid_config(src: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::InvalidConfig {
            src: src.into(),
            message: msg.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(src: impl Into<String>, operation: impl Into<String>) -> Self {
        Error::UnsupportedOperation {
            src: src.into(),
            operation: operation.into(),
        }
    }

    /// Returns `true` when the error is a transient fetch failure.
    ///
    /// Only [`Error::Fetch`] can be retriable; every other variant is final.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Fetch { retriable: true, .. })
    }

    /// Clears the retriable flag of a fetch error.
    pub fn non_retriable(mut self) -> Self {
        if let Error::Fetch { retriable, .. } = &mut self {
            *retriable = false;
        }
        self
    }

    /// Returns the HTTP status carried by a fetch error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        let status = err.status().map(|s| s.as_u16());
        let error = Error::fetch(url, status, err.to_string());
        // Builder and redirect-loop failures will not improve on retry.
        if err.is_builder() || err.is_redirect() {
            error.non_retriable()
        } else {
            error
        }
    }
}
