//! Error types for segkv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Directory Errors ===
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Conflicting put on key: {0}")]
    Conflict(String),

    #[error("Insufficient capacity: need {need} bytes x {replicas} replicas")]
    InsufficientCapacity { need: u64, replicas: u32 },

    // === Segment Errors ===
    #[error("Duplicate segment: {0}")]
    DuplicateSegment(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    // === Metadata Store Errors ===
    #[error("Store error: {0}")]
    Store(String),

    #[error("Store backend unavailable: {0}")]
    Unavailable(String),

    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Corrupted store entry: {0}")]
    Corrupted(String),

    // === Handshake Errors ===
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Handshake rejected by peer: status {0}")]
    HandshakeRejected(u32),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this a transient error the caller should retry with backoff?
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Timeout(_))
    }

    /// Convert to HTTP status code for the operation surface
    pub fn to_http_status(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Error::NotFound(_) | Error::SegmentNotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) | Error::DuplicateSegment(_) => StatusCode::CONFLICT,
            Error::InsufficientCapacity { .. } => StatusCode::INSUFFICIENT_STORAGE,
            Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Error::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Corrupted(e.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
            Error::Unavailable(e.to_string())
        } else {
            Error::Store(e.to_string())
        }
    }
}
