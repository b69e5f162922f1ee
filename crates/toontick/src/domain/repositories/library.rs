use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::library::{LibraryItem, ManhwaId, NewLibraryItem};

// primary sqlite result codes
const SQLITE_PERM: i32 = 3;
const SQLITE_READONLY: i32 = 8;
const SQLITE_AUTH: i32 = 23;

#[derive(Debug, Error)]
pub enum LibraryRepositoryError {
    #[error("entry already exists for this user")]
    Duplicate,
    #[error("library table does not exist: {0}")]
    MissingTable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("value rejected by constraint: {0}")]
    ConstraintViolation(String),
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("database error: {0}")]
    DbError(sqlx::Error),
}

impl From<sqlx::Error> for LibraryRepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                let code = db
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);

                if db.is_unique_violation() {
                    Self::Duplicate
                } else if db.is_check_violation() {
                    Self::ConstraintViolation(message)
                } else if message.contains("no such table") {
                    Self::MissingTable(message)
                } else if matches!(code, Some(SQLITE_PERM | SQLITE_READONLY | SQLITE_AUTH)) {
                    Self::PermissionDenied(message)
                } else {
                    Self::DbError(sqlx::Error::Database(db))
                }
            }
            sqlx::Error::Io(e) => Self::Unreachable(e.to_string()),
            sqlx::Error::PoolTimedOut => Self::Unreachable("connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Unreachable("connection pool closed".to_string()),
            sqlx::Error::WorkerCrashed => Self::Unreachable("database worker crashed".to_string()),
            e => Self::DbError(e),
        }
    }
}

/// Account libraries, one row per `(user_id, manhwa_id)`.
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Newest first.
    async fn get_library(&self, user_id: &str) -> Result<Vec<LibraryItem>, LibraryRepositoryError>;

    async fn get_by_manhwa_id(
        &self,
        user_id: &str,
        manhwa_id: &ManhwaId,
    ) -> Result<Option<LibraryItem>, LibraryRepositoryError>;

    /// Exact match on `title_key`, so case folding covers non-ascii titles.
    async fn get_by_title(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<Vec<LibraryItem>, LibraryRepositoryError>;

    async fn insert(&self, item: &NewLibraryItem) -> Result<LibraryItem, LibraryRepositoryError>;

    /// Inserts every item, updating rows that already exist for the same key.
    async fn upsert(
        &self,
        items: &[NewLibraryItem],
    ) -> Result<Vec<LibraryItem>, LibraryRepositoryError>;

    /// Writes every mutable column of `item`, matched on `(user_id, manhwa_id)`.
    async fn update(&self, item: &LibraryItem)
    -> Result<Option<LibraryItem>, LibraryRepositoryError>;

    async fn delete(&self, user_id: &str, manhwa_id: &ManhwaId)
    -> Result<(), LibraryRepositoryError>;

    /// Deletes by row identity. Returns whether a row was removed.
    async fn delete_by_id(&self, user_id: &str, id: i64) -> Result<bool, LibraryRepositoryError>;
}
