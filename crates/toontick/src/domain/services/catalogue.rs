use thiserror::Error;
use toontick_catalogue::{CatalogueEntry, SearchFilters};

use crate::domain::repositories::catalogue::{CatalogueRepository, CatalogueRepositoryError};

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("manhwa {0} not found")]
    NotFound(i64),
    #[error("search failed, please try again")]
    SearchFailed(#[source] CatalogueRepositoryError),
    #[error("failed to load manhwa details, please try again")]
    DetailsFailed(#[source] CatalogueRepositoryError),
    #[error("failed to load manhwa, please try again")]
    ListFailed(#[source] CatalogueRepositoryError),
}

/// Upper bound on pages fetched by one `list` call.
pub const MAX_PAGE_COUNT: i64 = 20;

pub struct CatalogueService<R>
where
    R: CatalogueRepository,
{
    repo: R,
}

impl<R> CatalogueService<R>
where
    R: CatalogueRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub async fn list(
        &self,
        start_page: i64,
        page_count: i64,
    ) -> Result<Vec<CatalogueEntry>, CatalogueError> {
        self.repo
            .list(start_page.max(1), page_count.clamp(1, MAX_PAGE_COUNT))
            .await
            .map_err(CatalogueError::ListFailed)
    }

    /// An empty query without genres matches nothing and sends no request.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<CatalogueEntry>, CatalogueError> {
        if query.trim().is_empty() && filters.genres.is_empty() {
            return Ok(vec![]);
        }

        self.repo.search(query, filters).await.map_err(|e| {
            error!("failed to search manhwa: {e}");
            CatalogueError::SearchFailed(e)
        })
    }

    pub async fn get_by_id(&self, id: i64) -> Result<CatalogueEntry, CatalogueError> {
        match self.repo.get_by_id(id).await {
            Ok(entry) => Ok(entry),
            Err(CatalogueRepositoryError::NotFound(id)) => Err(CatalogueError::NotFound(id)),
            Err(e) => {
                error!("failed to fetch manhwa details: {e}");
                Err(CatalogueError::DetailsFailed(e))
            }
        }
    }

    pub fn is_offline(&self) -> bool {
        self.repo.is_offline()
    }

    /// Go back to the live source on the next request.
    pub fn reset_fallback(&self) {
        self.repo.reset_fallback();
        info!("catalogue reset, will try the live source on next request");
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct FakeCatalogueRepository {
        calls: AtomicUsize,
        offline: AtomicBool,
        pages: std::sync::Mutex<Vec<(i64, i64)>>,
    }

    fn entry(id: i64, title: &str) -> CatalogueEntry {
        CatalogueEntry {
            id,
            title: title.to_string(),
            image: None,
            status: "releasing".to_string(),
            chapters: None,
            average_score: None,
            popularity: None,
            genres: vec![],
            description: None,
            year: None,
        }
    }

    #[async_trait]
    impl CatalogueRepository for FakeCatalogueRepository {
        async fn list(
            &self,
            start_page: i64,
            page_count: i64,
        ) -> Result<Vec<CatalogueEntry>, CatalogueRepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.lock().unwrap().push((start_page, page_count));
            Ok(vec![entry(1, "Solo Leveling")])
        }

        async fn search(
            &self,
            query: &str,
            _filters: &SearchFilters,
        ) -> Result<Vec<CatalogueEntry>, CatalogueRepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query == "boom" {
                return Err(toontick_catalogue::Error::Server(502).into());
            }
            Ok(vec![entry(2, query)])
        }

        async fn get_by_id(&self, id: i64) -> Result<CatalogueEntry, CatalogueRepositoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match id {
                1 => Ok(entry(1, "Solo Leveling")),
                500 => Err(toontick_catalogue::Error::Graphql("bad".to_string()).into()),
                id => Err(CatalogueRepositoryError::NotFound(id)),
            }
        }

        fn is_offline(&self) -> bool {
            self.offline.load(Ordering::SeqCst)
        }

        fn reset_fallback(&self) {
            self.offline.store(false, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_empty_search_sends_no_request() {
        let svc = CatalogueService::new(FakeCatalogueRepository::default());

        let results = svc.search("   ", &SearchFilters::default()).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(svc.repo.calls.load(Ordering::SeqCst), 0);

        let filters = SearchFilters {
            genres: vec!["Action".to_string()],
            ..Default::default()
        };
        svc.search("", &filters).await.unwrap();
        assert_eq!(svc.repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_failure() {
        let svc = CatalogueService::new(FakeCatalogueRepository::default());

        let err = svc.search("boom", &SearchFilters::default()).await.unwrap_err();
        assert!(matches!(err, CatalogueError::SearchFailed(_)));
        assert_eq!(err.to_string(), "search failed, please try again");
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let svc = CatalogueService::new(FakeCatalogueRepository::default());

        assert_eq!(svc.get_by_id(1).await.unwrap().title, "Solo Leveling");
        assert!(matches!(
            svc.get_by_id(7).await,
            Err(CatalogueError::NotFound(7))
        ));
        assert!(matches!(
            svc.get_by_id(500).await,
            Err(CatalogueError::DetailsFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_list_clamps_pages() {
        let svc = CatalogueService::new(FakeCatalogueRepository::default());

        svc.list(0, -2).await.unwrap();
        svc.list(3, 2).await.unwrap();
        svc.list(i64::MAX, i64::MAX).await.unwrap();
        assert_eq!(
            *svc.repo.pages.lock().unwrap(),
            vec![(1, 1), (3, 2), (i64::MAX, MAX_PAGE_COUNT)]
        );
    }

    #[test]
    fn test_reset_fallback() {
        let svc = CatalogueService::new(FakeCatalogueRepository::default());
        svc.repo.offline.store(true, Ordering::SeqCst);

        assert!(svc.is_offline());
        svc.reset_fallback();
        assert!(!svc.is_offline());
    }
}
