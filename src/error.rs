// Error handling module
// Defines the client error type and its classification

use thiserror::Error;

use crate::store::StoreError;

/// Broad classification of a client error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed configuration / credential payload. Never retried.
    Configuration,
    /// HTTP 401 from the service, or no token available to authenticate with
    Authentication,
    /// Any other non-success HTTP status
    Http,
    /// Network-level failure reported by the transport
    Transport,
    /// Response body was not the JSON we expected
    Decode,
    /// Credential store I/O failure
    Store,
}

/// Errors returned by the Simple In/Out client
#[derive(Error, Debug)]
pub enum Error {
    /// Required construction or call parameter was not supplied
    #[error("Missing required parameter '{0}'")]
    MissingParameter(&'static str),

    /// Credential payload lacks one of its two fields
    #[error("Missing required credential '{0}'")]
    MissingCredential(&'static str),

    /// No access token held and no store to load one from
    #[error("No access token.")]
    NoAccessToken,

    /// No refresh token held and no store to load one from
    #[error("No refresh token.")]
    NoRefreshToken,

    /// Non-success response from the service
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Transport failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON decoding failure
    #[error("Invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    /// Credential store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An error annotated with the operation that was being performed
    #[error("{operation}: {source}")]
    Context {
        operation: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the name of the failing operation
    pub fn context(self, operation: impl Into<String>) -> Self {
        Error::Context {
            operation: operation.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through any context layers
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingParameter(_) | Error::MissingCredential(_) => ErrorKind::Configuration,
            Error::NoAccessToken | Error::NoRefreshToken => ErrorKind::Authentication,
            Error::Http { status: 401, .. } => ErrorKind::Authentication,
            Error::Http { .. } => ErrorKind::Http,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Decode(_) => ErrorKind::Decode,
            Error::Store(_) => ErrorKind::Store,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            Error::Http { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for an HTTP 401 response
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Operation names from outermost to innermost
    pub fn operations(&self) -> Vec<&str> {
        let mut ops = Vec::new();
        let mut current = self;
        while let Error::Context { operation, source } = current {
            ops.push(operation.as_str());
            current = source.as_ref();
        }
        ops
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;
