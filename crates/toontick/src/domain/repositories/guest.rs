use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::library::GuestEntry;

#[derive(Debug, Error)]
pub enum GuestLibraryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The single slot holding the library of a visitor who has not signed in.
#[async_trait]
pub trait GuestLibraryRepository: Send + Sync {
    async fn load(&self) -> Result<Vec<GuestEntry>, GuestLibraryError>;

    async fn save(&self, entries: &[GuestEntry]) -> Result<(), GuestLibraryError>;

    async fn clear(&self) -> Result<(), GuestLibraryError>;
}
