use reqwest::StatusCode;
use thiserror::Error;

use crate::adapters::TransportError;

pub type Result<T> = std::result::Result<T, Error>;

/// A non-2xx response from the service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("HTTP {code}: {message}")]
pub struct ServiceError {
    pub code: StatusCode,
    /// Message from the JSON error envelope, or the raw body if there was none.
    pub message: String,
    pub body: String,
}

/// A field of an object resource that could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("decoding {field} field: {source}")]
    Timestamp {
        field: &'static str,
        #[source]
        source: time::error::Parse,
    },
    #[error("decoding {field} field: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    #[error("wrong length for decoded crc32c field: {0}")]
    Crc32cLength(usize),
    #[error("decoding {field} field: {value:?} is not a valid integer")]
    Integer { field: &'static str, value: String },
}

impl DecodeError {
    /// Wire name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            DecodeError::Timestamp { field, .. }
            | DecodeError::Base64 { field, .. }
            | DecodeError::Integer { field, .. } => field,
            DecodeError::Crc32cLength(_) => "crc32c",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The object or generation does not exist. Wraps the underlying error.
    #[error("not found: {0}")]
    NotFound(#[source] Box<Error>),

    /// A generation precondition was not met. Wraps the underlying error.
    #[error("precondition failed: {0}")]
    Precondition(#[source] Box<Error>),

    /// Rejected locally before anything was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The service answered in a way the upload protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }

    /// The wrapped cause of a typed error, or `self` for everything else.
    pub fn cause(&self) -> &Error {
        match self {
            Error::NotFound(inner) | Error::Precondition(inner) => inner,
            other => other,
        }
    }
}
