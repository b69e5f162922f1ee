//! Static dataset served when the live catalogue cannot be reached.

use once_cell::sync::Lazy;

use crate::{CatalogueEntry, Media, SearchFilters};

pub const PAGE_SIZE: usize = 16;

static DATASET: Lazy<Vec<CatalogueEntry>> = Lazy::new(|| {
    match serde_json::from_str::<Vec<Media>>(include_str!("../data/offline.json")) {
        Ok(media) => media.into_iter().map(CatalogueEntry::from).collect(),
        Err(e) => {
            error!("failed to parse offline dataset: {e}");
            vec![]
        }
    }
});

pub fn entries() -> Vec<CatalogueEntry> {
    DATASET.clone()
}

/// Pages are 1-based, `PAGE_SIZE` entries each.
pub fn page(start_page: i64, page_count: i64) -> Vec<CatalogueEntry> {
    let skip = usize::try_from(start_page.max(1) - 1).unwrap_or(usize::MAX);
    let take = usize::try_from(page_count.max(0)).unwrap_or(usize::MAX);

    DATASET
        .iter()
        .skip(skip.saturating_mul(PAGE_SIZE))
        .take(take.saturating_mul(PAGE_SIZE))
        .cloned()
        .collect()
}

pub fn search(query: &str, filters: &SearchFilters) -> Vec<CatalogueEntry> {
    let query = query.trim().to_lowercase();

    let results = DATASET
        .iter()
        .filter(|entry| query.is_empty() || entry.title.to_lowercase().contains(&query))
        .filter(|entry| {
            filters.genres.is_empty()
                || entry.genres.iter().any(|genre| filters.genres.contains(genre))
        })
        .cloned()
        .collect();

    filters.retain_year_range(results)
}

pub fn find(id: i64) -> Option<CatalogueEntry> {
    DATASET.iter().find(|entry| entry.id == id).cloned()
}
