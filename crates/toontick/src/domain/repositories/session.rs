use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::session::Session;

#[derive(Debug, Error)]
pub enum SessionRepositoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, SessionRepositoryError>;

    async fn save(&self, session: &Session) -> Result<(), SessionRepositoryError>;

    async fn delete(&self) -> Result<(), SessionRepositoryError>;
}
