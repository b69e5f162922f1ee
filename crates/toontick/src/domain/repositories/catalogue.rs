use async_trait::async_trait;
use thiserror::Error;
use toontick_catalogue::{CatalogueEntry, SearchFilters};

#[derive(Debug, Error)]
pub enum CatalogueRepositoryError {
    #[error("catalogue error: {0}")]
    Catalogue(#[from] toontick_catalogue::Error),
    #[error("manhwa {0} not found")]
    NotFound(i64),
}

#[async_trait]
pub trait CatalogueRepository: Send + Sync {
    async fn list(
        &self,
        start_page: i64,
        page_count: i64,
    ) -> Result<Vec<CatalogueEntry>, CatalogueRepositoryError>;

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<CatalogueEntry>, CatalogueRepositoryError>;

    async fn get_by_id(&self, id: i64) -> Result<CatalogueEntry, CatalogueRepositoryError>;

    /// Whether requests are being served from the offline dataset.
    fn is_offline(&self) -> bool;

    fn reset_fallback(&self);
}
