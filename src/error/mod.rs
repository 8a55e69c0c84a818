//! Error types for the typing coach.
//!
//! Every failure inside the pipeline is tagged with a [`FailureKind`] at the
//! point it is raised:
//! - [`ProviderError`]: the language-model provider failed (network, auth,
//!   rate limit, timeout). Counted by the failure tracker, answered with a
//!   fallback.
//! - [`FormatError`]: the provider answered but the payload was unusable.
//!   Retried with a corrective instruction, never counted.
//! - [`LogicError`]: the caller broke a contract. Propagated, never masked.
//!
//! [`CoachError`] unifies the three; [`AppError`] is the top-level error of
//! the binary. All errors implement `Send + Sync`.

use thiserror::Error;

/// Classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Provider outage: network, timeout, rate limit, auth, quota.
    Provider,
    /// Unusable provider output: no payload, malformed payload, bad schema.
    Format,
    /// Programming or contract error on the calling side.
    Logic,
}

impl FailureKind {
    /// Classify an untyped error message.
    ///
    /// Only used for errors that reach the pipeline without a type, such as
    /// [`ProviderError::Untyped`]. Anything unrecognised is treated as a
    /// logic error so that it surfaces instead of being retried.
    #[must_use]
    pub fn classify_message(message: &str) -> Self {
        const PROVIDER_PATTERNS: &[&str] = &[
            "timeout",
            "timed out",
            "rate limit",
            "rate-limit",
            "too many requests",
            "429",
            "quota",
            "unauthorized",
            "401",
            "403",
            "api key",
            "authentication",
            "network",
            "connection",
            "econnrefused",
            "econnreset",
            "fetch failed",
            "dns",
            "overloaded",
            "unavailable",
            "502",
            "503",
            "529",
        ];
        const FORMAT_PATTERNS: &[&str] = &[
            "json",
            "parse",
            "unexpected token",
            "unexpected end",
            "payload",
            "schema",
            "extract",
        ];

        let lowered = message.to_lowercase();
        if PROVIDER_PATTERNS.iter().any(|p| lowered.contains(p)) {
            Self::Provider
        } else if FORMAT_PATTERNS.iter().any(|p| lowered.contains(p)) {
            Self::Format
        } else {
            Self::Logic
        }
    }
}

/// Top-level application error.
///
/// Returned by the binary's setup and serving functions.
#[derive(Debug, Error)]
pub enum AppError {
    /// Provider client error (e.g. the HTTP client could not be built).
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Pipeline error that escaped to the top level.
    #[error("Coach error: {0}")]
    Coach(#[from] CoachError),

    /// Serving surface error.
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised at the language-model provider boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Authentication failed due to invalid API key.
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Request was rate limited.
    #[error("Rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_seconds: u64,
    },

    /// The requested model is overloaded.
    #[error("Model overloaded: {model}")]
    ModelOverloaded {
        /// The model that is overloaded.
        model: String,
    },

    /// Request timed out.
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The request was rejected before it left the process.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what's invalid.
        message: String,
    },

    /// Network communication error.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Unexpected response from the provider.
    #[error("Unexpected response: {message}")]
    UnexpectedResponse {
        /// Description of what was unexpected.
        message: String,
    },

    /// The caller cancelled the invocation while the provider was pending.
    #[error("Provider call cancelled")]
    Cancelled,

    /// An error that arrived without a type from a third-party layer.
    #[error("{message}")]
    Untyped {
        /// The raw error message.
        message: String,
    },
}

impl ProviderError {
    /// Failure class of this error.
    ///
    /// `InvalidRequest` is raised by local validation of our own arguments,
    /// so it is a logic error rather than an outage.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest { .. } => FailureKind::Logic,
            Self::Untyped { message } => FailureKind::classify_message(message),
            _ => FailureKind::Provider,
        }
    }

    /// Whether this failure should move the failure tracker.
    ///
    /// Caller cancellation says nothing about provider health.
    #[must_use]
    pub fn counts_toward_breaker(&self) -> bool {
        !matches!(self, Self::Cancelled) && self.kind() == FailureKind::Provider
    }
}

/// Errors raised while turning provider text into a structured payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// No balanced payload could be located in the text.
    #[error("No structured payload found in response: {preview}")]
    NoPayload {
        /// Truncated preview of the raw text.
        preview: String,
    },

    /// A payload was found but could not be parsed, even after repair.
    #[error("Malformed payload: {message}")]
    Malformed {
        /// Parser error description.
        message: String,
    },

    /// The payload parsed but violates the response schema.
    #[error("Schema violation on {field}: {reason}")]
    Schema {
        /// Offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Contract errors on the calling side.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogicError {
    /// The performance snapshot holds impossible values.
    #[error("Invalid performance snapshot: {field} {reason}")]
    InvalidSnapshot {
        /// Offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An argument to the pipeline was invalid.
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument {
        /// Argument name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Unified pipeline error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoachError {
    /// Provider-class failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Format-class failure.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Logic-class failure.
    #[error(transparent)]
    Logic(#[from] LogicError),
}

impl CoachError {
    /// Failure class of this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Provider(e) => e.kind(),
            Self::Format(_) => FailureKind::Format,
            Self::Logic(_) => FailureKind::Logic,
        }
    }
}

/// Errors raised by the stdio serving surface and its collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Reading or writing the transport failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
    },

    /// A request line could not be decoded.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what's invalid.
        message: String,
    },

    /// The performance snapshot source could not be read.
    #[error("Snapshot source {path}: {message}")]
    Snapshot {
        /// Path of the snapshot document.
        path: String,
        /// Description of the failure.
        message: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required configuration is missing.
    #[error("Missing required: {var}")]
    MissingRequired {
        /// The missing variable name.
        var: String,
    },

    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}
