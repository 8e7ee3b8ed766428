//! Error types for courier.
//!
//! Every failure surfaced by [`Pipeline::execute`](crate::Pipeline::execute)
//! is an [`Error`]. Use [`Error::kind`] to classify it without matching on
//! every variant.

use std::fmt;

use derive_more::{Display, Error, From};

use crate::pinning::PinningDenied;

/// Boxed error type carried as an opaque stage payload.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Stage Error
// ============================================================================

/// Error raised by a request or response stage.
///
/// The engine never inspects the payload; it only wraps it in
/// [`Error::Stage`] with the position of the failing stage.
#[derive(Debug)]
pub struct StageError {
    message: String,
    source: Option<BoxError>,
}

impl StageError {
    /// Create a stage error with a message only.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a stage error carrying an underlying error.
    #[must_use]
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Wrap an error, using its display output as the message.
    #[must_use]
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// The stage-provided message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Downcast the payload to a concrete error type.
    #[must_use]
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref().and_then(|source| source.downcast_ref())
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

/// Which stage chain a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StagePhase {
    /// Stages run before dispatch.
    #[display("request")]
    Request,
    /// Stages run after dispatch.
    #[display("response")]
    Response,
}

// ============================================================================
// Error Kind
// ============================================================================

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// A request or response stage failed.
    #[display("stage")]
    Stage,
    /// The request could not be turned into its wire form.
    #[display("preparation")]
    Preparation,
    /// The transport failed to deliver the request or read the response.
    #[display("dispatch")]
    Dispatch,
    /// The TLS handshake was rejected by a pinning rule.
    #[display("pinning denied")]
    PinningDenied,
}

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for courier operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// A stage returned an error.
    #[display("{phase} stage #{index} (`{stage}`) failed: {source}")]
    #[from(skip)]
    Stage {
        /// Chain the stage belongs to.
        phase: StagePhase,
        /// Position of the stage in its chain.
        index: usize,
        /// Stage name.
        stage: String,
        /// Stage payload.
        source: StageError,
    },

    /// JSON body serialization failed.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// Query string serialization failed.
    #[display("query serialization error: {_0}")]
    #[from]
    QuerySerialization(serde_html_form::ser::Error),

    /// The resolved URL is not valid.
    #[display("invalid URL `{url}`: {source}")]
    #[from(skip)]
    InvalidUrl {
        /// The URL string that failed to parse.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },

    /// The request could not be built.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS errors other than a pinning denial.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request or resource timeout elapsed.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The transport returned something that is not a usable HTTP response.
    #[display("invalid response: {_0}")]
    #[from(skip)]
    InvalidResponse(#[error(not(source))] String),

    /// The caller cancelled the call while it was being dispatched.
    #[display("request cancelled")]
    #[from(skip)]
    Cancelled,

    /// The server certificate did not match the pinned fingerprints.
    #[display("{_0}")]
    #[from]
    PinningDenied(PinningDenied),

    /// An error with context attached by a stage.
    #[display("{message}: {source}")]
    #[from(skip)]
    Context {
        /// Context message.
        message: String,
        /// Wrapped error.
        source: Box<Error>,
    },
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a stage error at a given position.
    #[must_use]
    pub fn stage(
        phase: StagePhase,
        index: usize,
        stage: impl Into<String>,
        source: StageError,
    ) -> Self {
        Self::Stage {
            phase,
            index,
            stage: stage.into(),
            source,
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Wrap this error with a context message, keeping its kind.
    #[must_use]
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Stage { .. } => ErrorKind::Stage,
            Self::JsonSerialization(_)
            | Self::QuerySerialization(_)
            | Self::InvalidUrl { .. }
            | Self::InvalidRequest(_) => ErrorKind::Preparation,
            Self::Connection(_)
            | Self::Tls(_)
            | Self::Timeout
            | Self::InvalidResponse(_)
            | Self::Cancelled => ErrorKind::Dispatch,
            Self::PinningDenied(_) => ErrorKind::PinningDenied,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, skipping any [`Error::Context`] wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage payload if this is a stage error.
    #[must_use]
    pub fn stage_error(&self) -> Option<&StageError> {
        match self.root() {
            Self::Stage { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self.root(), Self::Connection(_))
    }

    /// Returns `true` if the handshake was rejected by a pinning rule.
    #[must_use]
    pub fn is_pinning_denied(&self) -> bool {
        matches!(self.root(), Self::PinningDenied(_))
    }
}
