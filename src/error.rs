//! Error types and result handling for Tsunagi operations.
//!
//! All fallible operations return a [`Result<T>`], a type alias for
//! `std::result::Result<T, Error>`.
//!
//! # Error Categories
//!
//! - **Relay Errors**: no proxy available for a provider's category
//! - **Upstream Errors**: non-200 responses and unexpected content types
//! - **Transport Errors**: connection failures and timeouts
//! - **Decode Errors**: malformed JSON bodies and unparseable URLs
//! - **Local Errors**: relay list files, configuration and cancellation
//!
//! A work that cannot be found, or a candidate that fails the matching
//! thresholds, is *not* an error. Those are reported through
//! [`MappingOutcome`](crate::mapping::MappingOutcome) and debug logs.
//!
//! # Examples
//!
//! ```rust
//! use tsunagi::Error;
//!
//! let error = Error::no_proxy("mangadex");
//! assert!(error.is_recoverable());
//! assert_eq!(error.to_string(), "No proxy available for provider: mangadex");
//! ```

use thiserror::Error;

/// Type alias for Results with Tsunagi errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Tsunagi operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No relay address exists in the provider's proxy category.
    ///
    /// Only the single dispatch that asked for a relay fails. Callers may
    /// retry in direct mode or skip the provider.
    #[error("No proxy available for provider: {provider}")]
    NoProxyAvailable { provider: String },

    /// The upstream answered with a status other than 200.
    #[error("Upstream error [{provider}]: HTTP {status}")]
    UpstreamStatus { provider: String, status: u16 },

    /// The upstream answered 200 with a body that is not JSON.
    #[error("Unexpected content type [{provider}]: {content_type}")]
    UnexpectedContentType {
        provider: String,
        content_type: String,
    },

    /// The request did not complete within the client timeout.
    #[error("Request timed out [{provider}]")]
    Timeout { provider: String },

    /// Network-related errors from HTTP operations.
    ///
    /// Wraps transport errors from reqwest: connection refused, DNS
    /// resolution, TLS failures and broken bodies.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Data format errors that are not plain JSON syntax errors, such as
    /// an unparseable URL or a missing required field.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The invocation was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// File system and IO operation errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization and deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration extraction errors.
    #[error("Config error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl Error {
    /// Creates a parse error with the given message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tsunagi::Error;
    ///
    /// let error = Error::parse("Invalid MangaDex id");
    /// assert!(error.to_string().contains("Invalid MangaDex id"));
    /// ```
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Creates a no-proxy error for the given provider.
    pub fn no_proxy(provider: impl Into<String>) -> Self {
        Error::NoProxyAvailable {
            provider: provider.into(),
        }
    }

    /// Creates an upstream status error.
    pub fn upstream(provider: impl Into<String>, status: u16) -> Self {
        Error::UpstreamStatus {
            provider: provider.into(),
            status,
        }
    }

    /// Maps a transport error for a provider, surfacing timeouts as
    /// [`Error::Timeout`].
    pub fn transport(provider: impl Into<String>, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout {
                provider: provider.into(),
            }
        } else {
            Error::Network(err)
        }
    }

    /// Returns `true` when the failure is local to one dispatch and the
    /// caller can reasonably retry or fall back to another mode.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NoProxyAvailable { .. } | Error::Timeout { .. } | Error::Network(_)
        )
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}
