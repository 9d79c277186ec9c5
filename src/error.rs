//! Crate-wide error type and the HTTP-status mapping used by the optional
//! control surface.

use thiserror::Error;

/// Convenience alias for this crate's `Result`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can arise anywhere in the coordinator.
#[derive(Error, Debug)]
pub enum Error {
    /// The store could not be opened, migrated, or queried.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// A raw `sqlx` failure that didn't fit a more specific variant.
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The seedbox collaborator returned an error.
    #[error("seedbox error: {0}")]
    Seedbox(#[from] SeedboxError),

    /// The file handler collaborator failed to upload.
    #[error("file handler error: {0}")]
    FileHandler(String),

    /// Torrent content hash could not be derived from a URL.
    #[error("hash computation failed: {0}")]
    Hash(#[from] HashError),

    /// A required configuration value was missing or malformed.
    #[error("configuration error for '{key}': {message}")]
    Config {
        /// The offending configuration key.
        key: String,
        /// Human-readable description of the problem.
        message: String,
    },

    /// The referenced entity does not exist.
    #[error("not found")]
    NotFound,

    /// The process is shutting down and is no longer accepting new work.
    #[error("shutting down")]
    ShuttingDown,

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP failure (RSS polling, the default HTTP-based collaborators).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else, carried as a message.
    #[error("{0}")]
    Other(String),
}

/// Database-specific failure detail.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open or connect to the SQLite file.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// A schema migration failed partway through and was rolled back.
    #[error("migration failed: {0}")]
    MigrationFailed(String),
    /// A query failed to execute.
    #[error("query failed: {0}")]
    QueryFailed(String),
    /// A row that was expected to exist was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Seedbox-collaborator failure detail (spec §6, §7).
#[derive(Error, Debug)]
pub enum SeedboxError {
    /// The seedbox rejected the torrent for exceeding a size limit.
    #[error("torrent too large: {0}")]
    TooLarge(String),
    /// Authentication with the seedbox failed and could not be refreshed.
    /// Per §7, this is the one error that is re-raised to kill the worker.
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    /// The echoed submit URI did not match what was sent.
    #[error("submit echo mismatch for {0}")]
    EchoMismatch(String),
    /// Transient failure (disconnect, timeout) — safe to retry.
    #[error("transient seedbox failure: {0}")]
    Transient(String),
    /// Any other seedbox-reported failure.
    #[error("{0}")]
    Other(String),
}

/// Torrent hash computation failure (spec §6).
#[derive(Error, Debug)]
pub enum HashError {
    /// A magnet URI had no `xt=urn:btih:` parameter.
    #[error("magnet URI missing btih parameter")]
    MissingBtih,
    /// A `.torrent` payload was not valid bencode.
    #[error("invalid bencode: {0}")]
    InvalidBencode(String),
    /// A `.torrent` payload had no `info` dictionary.
    #[error("torrent missing info dictionary")]
    MissingInfoDict,
    /// The URI scheme was neither `magnet:` nor `http(s)://`.
    #[error("unsupported URI scheme: {0}")]
    UnsupportedScheme(String),
}

impl SeedboxError {
    /// Transient failures are retried locally by the submit helper (§7);
    /// everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SeedboxError::Transient(_))
    }
}

/// Structured error body for the optional control surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// JSON error envelope returned by the control surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiError {
    /// HTTP status code, duplicated in the body for clients that don't
    /// inspect headers.
    pub status: u16,
    /// The error detail.
    pub error: ErrorDetail,
}

/// Maps an [`Error`] to the HTTP status/code pair the control surface emits.
pub trait ToHttpStatus {
    /// The HTTP status code this error should be reported as.
    fn status_code(&self) -> u16;
    /// A short machine-readable error code, stable across releases.
    fn error_code(&self) -> &'static str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::NotFound => 404,
            Error::Config { .. } => 400,
            Error::ShuttingDown => 503,
            Error::Database(_) | Error::Sqlx(_) | Error::Io(_) | Error::Other(_) => 500,
            Error::Seedbox(_) | Error::FileHandler(_) | Error::Hash(_) => 502,
            Error::Network(_) => 502,
            Error::Serialization(_) => 400,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Seedbox(_) => "seedbox_error",
            Error::FileHandler(_) => "file_handler_error",
            Error::Hash(_) => "hash_error",
            Error::Config { .. } => "config_error",
            Error::NotFound => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError {
            status: err.status_code(),
            error: ErrorDetail {
                code: err.error_code().to_string(),
                message: err.to_string(),
            },
        }
    }
}
