//! Core entity identifiers and status enums shared across the store, the
//! entity state machines, and the orchestrator.

use serde::{Deserialize, Serialize};

/// Unique identifier for a [`crate::download::Download`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(pub i64);

impl DownloadId {
    /// Create a new `DownloadId`.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner `i64` value.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for DownloadId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<DownloadId> for i64 {
    fn from(id: DownloadId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for DownloadId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DownloadId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl sqlx::Type<sqlx::Sqlite> for DownloadId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for DownloadId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for DownloadId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Random alphanumeric token identifying a worker process. Generated once at
/// process start and carried everywhere a `locked_by` column is compared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    /// Generate a new random worker id, matching the original's
    /// alphanumeric-only alphabet.
    pub fn generate() -> Self {
        use rand::Rng;
        const ALPHABET: &[u8] = b"0123456789abcdef";
        let mut rng = rand::thread_rng();
        let s: String = (0..21)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(s)
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Status of a [`crate::download::Download`].
///
/// `Pending` is the only state from which work is claimed; the rest are
/// either in-flight (`Processing`) or terminal-with-expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Claimed, submitted to an account, awaiting remote completion.
    Processing,
    /// Retry limit exhausted.
    Error,
    /// The in-flight deadline elapsed before completion.
    Timeout,
    /// The seedbox rejected the torrent for being too large.
    TooLarge,
    /// The content hash could not be derived from the URL.
    InvalidTorrent,
}

impl DownloadStatus {
    /// Convert the integer status code stored in SQLite to a `DownloadStatus`.
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => DownloadStatus::Pending,
            1 => DownloadStatus::Processing,
            2 => DownloadStatus::Error,
            3 => DownloadStatus::Timeout,
            4 => DownloadStatus::TooLarge,
            5 => DownloadStatus::InvalidTorrent,
            _ => DownloadStatus::Error,
        }
    }

    /// Convert a `DownloadStatus` to the integer code stored in SQLite.
    pub fn to_i32(self) -> i32 {
        match self {
            DownloadStatus::Pending => 0,
            DownloadStatus::Processing => 1,
            DownloadStatus::Error => 2,
            DownloadStatus::Timeout => 3,
            DownloadStatus::TooLarge => 4,
            DownloadStatus::InvalidTorrent => 5,
        }
    }

    /// Terminal statuses carry an `expire_at` (I5); non-terminal ones do not.
    pub fn is_terminal(self) -> bool {
        !matches!(self, DownloadStatus::Pending | DownloadStatus::Processing)
    }
}

/// Status of an [`crate::account::Account`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Unclaimed, available for new work.
    Idle,
    /// Claimed by a worker, not yet submitted to the seedbox.
    Processing,
    /// Submitted, awaiting remote completion.
    Downloading,
    /// A worker currently holds this account to poll it.
    Locked,
    /// A worker currently holds this account to upload completed files.
    Uploading,
}

impl AccountStatus {
    /// Convert the integer status code stored in SQLite to an `AccountStatus`.
    pub fn from_i32(status: i32) -> Self {
        match status {
            0 => AccountStatus::Idle,
            1 => AccountStatus::Processing,
            2 => AccountStatus::Downloading,
            3 => AccountStatus::Locked,
            4 => AccountStatus::Uploading,
            _ => AccountStatus::Idle,
        }
    }

    /// Convert an `AccountStatus` to the integer code stored in SQLite.
    pub fn to_i32(self) -> i32 {
        match self {
            AccountStatus::Idle => 0,
            AccountStatus::Processing => 1,
            AccountStatus::Downloading => 2,
            AccountStatus::Locked => 3,
            AccountStatus::Uploading => 4,
        }
    }
}
