//! Watch Engine Error Hierarchy
//!
//! Errors are grouped by the layer that produced them. The grouping drives the
//! retry decision made by the stream session: stream failures are classified by
//! their status code, protocol and invariant violations are always terminal.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;
use tonic::Code;
use tonic::Status;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Status codes after which a listen stream is re-opened.
const RETRYABLE_CODES: [Code; 8] = [
    Code::Cancelled,
    Code::Unknown,
    Code::DeadlineExceeded,
    Code::ResourceExhausted,
    Code::Internal,
    Code::Unavailable,
    Code::Aborted,
    Code::Unauthenticated,
];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Listen stream failures (transport status, end-of-stream, idle, server revocation)
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Server sent something the Listen protocol does not allow
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Internal bookkeeping went out of sync; indicates a defect, never retried
    #[error(transparent)]
    Internal(#[from] InvariantError),

    /// Channel and endpoint level failures
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Settings validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The transport reported a gRPC status
    #[error("Listen stream failed with {code:?}: {message}")]
    Status { code: Code, message: String },

    /// The transport failed without a status code
    #[error("Listen stream failed: {0}")]
    Uncoded(String),

    /// The server closed the response stream
    #[error("Listen stream ended unexpectedly")]
    Ended,

    /// No message arrived within the idle threshold
    #[error("Listen stream idle for {0:?}")]
    Idle(Duration),

    /// The server revoked the watch target
    #[error("Target {target_id} removed by server ({code:?}): {message}")]
    TargetRemoved {
        target_id: i32,
        code: Code,
        message: String,
    },

    /// Retry policy exhaustion
    #[error("Exceeded maximum number of retries ({0})")]
    RetriesExhausted(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unexpected target ID sent by server (expected: {expected}, received: {received:?})")]
    UnexpectedTargetId { expected: i32, received: Option<i32> },

    #[error("Unknown target change type: {0}")]
    UnknownTargetChangeType(i32),

    #[error("Unknown listen response type")]
    UnknownResponseType,

    #[error("Missing required field `{field}` in {message}")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },

    #[error("Invalid document name: {0}")]
    InvalidDocumentName(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InvariantError {
    /// The ordered tree and the lookup index disagree on cardinality
    #[error("Document tree and index diverged (tree: {tree}, index: {index})")]
    SizeMismatch { tree: usize, index: usize },

    /// A removal or modification referenced a key with no prior state
    #[error("Document {0} does not exist")]
    MissingDocument(String),

    /// An addition referenced a key that is already present
    #[error("Document {0} already exists")]
    DuplicateDocument(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Endpoint unavailable (HTTP 503 equivalent)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Malformed endpoint addresses
    #[error("Invalid URI format: {0}")]
    InvalidURI(String),

    /// Request metadata could not be encoded
    #[error("Invalid request metadata: {0}")]
    InvalidMetadata(String),

    /// gRPC transport layer errors
    #[error(transparent)]
    TonicError(#[from] Box<tonic::transport::Error>),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

impl StreamError {
    /// Status code of the failure, if the failure carries one.
    pub fn code(&self) -> Option<Code> {
        match self {
            StreamError::Status { code, .. } => Some(*code),
            StreamError::TargetRemoved { code, .. } => Some(*code),
            StreamError::Ended | StreamError::Idle(_) => Some(Code::Unknown),
            StreamError::Uncoded(_) | StreamError::RetriesExhausted(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            StreamError::Status { code, .. } => is_retryable_code(*code),
            StreamError::Uncoded(_) | StreamError::Ended | StreamError::Idle(_) => true,
            StreamError::TargetRemoved { .. } | StreamError::RetriesExhausted(_) => false,
        }
    }
}

impl Error {
    /// Whether the stream session may recover from this error by reconnecting.
    ///
    /// Stream failures without a status code are treated as retryable.
    /// Protocol violations, invariant violations and server-side target
    /// removals are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Stream(e) => e.is_retryable(),
            Error::Network(e) => !matches!(e, NetworkError::InvalidURI(_) | NetworkError::InvalidMetadata(_)),
            Error::Protocol(_) | Error::Internal(_) | Error::Config(_) | Error::Fatal(_) => false,
        }
    }

    /// Whether the server signalled overload, in which case reconnects back off to the ceiling.
    pub fn is_resource_exhausted(&self) -> bool {
        self.code() == Some(Code::ResourceExhausted)
    }

    pub fn code(&self) -> Option<Code> {
        match self {
            Error::Stream(e) => e.code(),
            _ => None,
        }
    }

    /// True for the programming-defect class of failures.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

pub(crate) fn is_retryable_code(code: Code) -> bool {
    RETRYABLE_CODES.contains(&code)
}

// ============== Conversion Implementations ============== //
impl From<Status> for Error {
    fn from(status: Status) -> Self {
        StreamError::Status {
            code: status.code(),
            message: status.message().to_string(),
        }
        .into()
    }
}

impl From<tonic::transport::Error> for Error {
    fn from(err: tonic::transport::Error) -> Self {
        NetworkError::TonicError(Box::new(err)).into()
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        NetworkError::TaskFailed(err).into()
    }
}
