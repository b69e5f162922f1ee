use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use toontick_catalogue::{Catalogue, CatalogueEntry, Error, SearchFilters, offline};

use crate::domain::repositories::catalogue::{CatalogueRepository, CatalogueRepositoryError};

/// Live catalogue with the bundled dataset behind it. Once the live source
/// is unavailable, or the first listing page fails or comes back empty,
/// every request is served offline until `reset_fallback`.
pub struct CatalogueRepositoryImpl {
    client: Box<dyn Catalogue>,
    per_page: i64,
    offline: AtomicBool,
}

impl CatalogueRepositoryImpl {
    pub fn new<C: Catalogue + 'static>(client: C, per_page: i64) -> Self {
        Self {
            client: Box::new(client),
            per_page: per_page.max(1),
            offline: AtomicBool::new(false),
        }
    }

    fn degrade(&self, e: &Error) {
        if e.is_unavailable() && !self.offline.swap(true, Ordering::SeqCst) {
            warn!("catalogue unavailable ({e}), serving offline dataset");
        }
    }
}

#[async_trait]
impl CatalogueRepository for CatalogueRepositoryImpl {
    async fn list(
        &self,
        start_page: i64,
        page_count: i64,
    ) -> Result<Vec<CatalogueEntry>, CatalogueRepositoryError> {
        if self.is_offline() {
            return Ok(offline::page(start_page, page_count));
        }

        let mut entries = vec![];
        for page in start_page..start_page.saturating_add(page_count) {
            match self.client.popular(page, self.per_page).await {
                Ok(media) if media.is_empty() && page == start_page => {
                    warn!("catalogue returned no titles for page {page}, serving offline dataset");
                    self.offline.store(true, Ordering::SeqCst);
                    return Ok(offline::page(start_page, page_count));
                }
                Ok(media) if media.is_empty() => break,
                Ok(media) => entries.extend(media.into_iter().map(CatalogueEntry::from)),
                Err(e) if page == start_page => {
                    error!("failed to fetch page {page}: {e}, serving offline dataset");
                    self.offline.store(true, Ordering::SeqCst);
                    return Ok(offline::page(start_page, page_count));
                }
                Err(e) => {
                    warn!("stopped paging at page {page}: {e}");
                    self.degrade(&e);
                    break;
                }
            }
        }

        Ok(entries)
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<CatalogueEntry>, CatalogueRepositoryError> {
        if self.is_offline() {
            return Ok(offline::search(query, filters));
        }

        let query = Some(query.trim()).filter(|query| !query.is_empty());
        match self
            .client
            .search(query, &filters.genres, &filters.sort())
            .await
        {
            Ok(media) => Ok(filters.retain_year_range(
                media.into_iter().map(CatalogueEntry::from).collect(),
            )),
            Err(e) if e.is_unavailable() => {
                self.degrade(&e);
                Ok(offline::search(query.unwrap_or_default(), filters))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<CatalogueEntry, CatalogueRepositoryError> {
        if self.is_offline() {
            return offline::find(id).ok_or(CatalogueRepositoryError::NotFound(id));
        }

        match self.client.media(id).await {
            Ok(media) => Ok(media.into()),
            Err(Error::NoData) => Err(CatalogueRepositoryError::NotFound(id)),
            Err(e) if e.is_unavailable() => {
                self.degrade(&e);
                offline::find(id).ok_or(CatalogueRepositoryError::NotFound(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn reset_fallback(&self) {
        self.offline.store(false, Ordering::SeqCst);
    }
}
