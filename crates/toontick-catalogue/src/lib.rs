#[macro_use]
extern crate log;

pub mod anilist;
pub use anilist::AniList;

pub mod offline;

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by catalogue")]
    RateLimited,
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned status {0}")]
    Server(u16),
    #[error("graphql error: {0}")]
    Graphql(String),
    #[error("no data returned from catalogue")]
    NoData,
    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the live source should be abandoned for the offline dataset.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::Timeout | Error::RateLimited | Error::Network(_))
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub extra_large: Option<String>,
    pub large: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<i32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: i64,
    pub title: Option<MediaTitle>,
    pub description: Option<String>,
    pub cover_image: Option<CoverImage>,
    pub status: Option<String>,
    pub chapters: Option<i64>,
    pub start_date: Option<FuzzyDate>,
    pub average_score: Option<i64>,
    pub popularity: Option<i64>,
    pub genres: Option<Vec<String>>,
}

/// A catalogue title in the shape the library works with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueEntry {
    pub id: i64,
    pub title: String,
    pub image: Option<String>,
    pub status: String,
    pub chapters: Option<i64>,
    pub average_score: Option<i64>,
    pub popularity: Option<i64>,
    pub genres: Vec<String>,
    pub description: Option<String>,
    pub year: Option<i32>,
}

impl From<Media> for CatalogueEntry {
    fn from(media: Media) -> Self {
        let title = media
            .title
            .and_then(|t| t.english.or(t.romaji))
            .unwrap_or_default();
        let image = media
            .cover_image
            .and_then(|c| c.extra_large.or(c.large).or(c.medium));

        CatalogueEntry {
            id: media.id,
            title,
            image,
            status: media
                .status
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| "unknown".to_string()),
            // 0 from the api means the count is not known yet
            chapters: media.chapters.filter(|c| *c > 0),
            average_score: media.average_score,
            popularity: media.popularity,
            genres: media.genres.unwrap_or_default(),
            description: media.description,
            year: media.start_date.and_then(|d| d.year),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    ReleaseDate,
    Rating,
    Popularity,
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "releasedate" | "release" | "date" => Ok(SortBy::ReleaseDate),
            "rating" | "score" => Ok(SortBy::Rating),
            "popularity" | "popular" => Ok(SortBy::Popularity),
            _ => Err(format!("unknown sort field {s}")),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("unknown sort order {s}")),
        }
    }
}

pub const EARLIEST_YEAR: i32 = 2000;

pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub from: i32,
    pub to: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            from: EARLIEST_YEAR,
            to: current_year(),
        }
    }
}

impl YearRange {
    pub fn is_narrowed(&self) -> bool {
        self.from > EARLIEST_YEAR || self.to < current_year()
    }

    /// Titles without a known year always pass.
    pub fn contains(&self, year: Option<i32>) -> bool {
        year.is_none_or(|year| year >= self.from && year <= self.to)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchFilters {
    pub genres: Vec<String>,
    pub year_range: YearRange,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl SearchFilters {
    /// AniList `MediaSort` values for this filter set.
    pub fn sort(&self) -> Vec<&'static str> {
        let value = match (self.sort_by, self.sort_order) {
            (SortBy::ReleaseDate, SortOrder::Asc) => "START_DATE",
            (SortBy::ReleaseDate, SortOrder::Desc) => "START_DATE_DESC",
            (SortBy::Rating, SortOrder::Asc) => "SCORE",
            (SortBy::Rating, SortOrder::Desc) => "SCORE_DESC",
            (SortBy::Popularity, _) => "POPULARITY_DESC",
        };
        vec![value]
    }

    /// Year filtering is done client side and only when the range was narrowed.
    pub fn retain_year_range(&self, entries: Vec<CatalogueEntry>) -> Vec<CatalogueEntry> {
        if !self.year_range.is_narrowed() {
            return entries;
        }

        entries
            .into_iter()
            .filter(|entry| self.year_range.contains(entry.year))
            .collect()
    }
}

#[async_trait]
pub trait Catalogue: Send + Sync {
    async fn popular(&self, page: i64, per_page: i64) -> Result<Vec<Media>, Error>;

    async fn search(
        &self,
        search: Option<&str>,
        genres: &[String],
        sort: &[&'static str],
    ) -> Result<Vec<Media>, Error>;

    async fn media(&self, id: i64) -> Result<Media, Error>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_media_into_entry_prefers_english_title() {
        let media: Media = serde_json::from_value(serde_json::json!({
            "id": 105398,
            "title": { "english": "Solo Leveling", "romaji": "Na Honjaman Level Up" },
            "coverImage": { "large": "large.jpg", "extraLarge": "xl.jpg" },
            "status": "FINISHED",
            "chapters": 201,
            "startDate": { "year": 2018 },
            "genres": ["Action"]
        }))
        .unwrap();

        let entry = CatalogueEntry::from(media);
        assert_eq!(entry.title, "Solo Leveling");
        assert_eq!(entry.image.as_deref(), Some("xl.jpg"));
        assert_eq!(entry.status, "finished");
        assert_eq!(entry.chapters, Some(201));
        assert_eq!(entry.year, Some(2018));
    }

    #[test]
    fn test_media_into_entry_fallbacks() {
        let media: Media = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": { "english": null, "romaji": "Jeonjijeok Dokja Sijeom" },
            "coverImage": { "medium": "medium.jpg" },
            "chapters": 0
        }))
        .unwrap();

        let entry = CatalogueEntry::from(media);
        assert_eq!(entry.title, "Jeonjijeok Dokja Sijeom");
        assert_eq!(entry.image.as_deref(), Some("medium.jpg"));
        assert_eq!(entry.status, "unknown");
        assert_eq!(entry.chapters, None);
        assert!(entry.genres.is_empty());
    }

    #[test]
    fn test_sort_parameters() {
        let mut filters = SearchFilters::default();
        assert_eq!(filters.sort(), vec!["START_DATE_DESC"]);

        filters.sort_by = SortBy::Rating;
        filters.sort_order = SortOrder::Asc;
        assert_eq!(filters.sort(), vec!["SCORE"]);

        filters.sort_by = SortBy::Popularity;
        assert_eq!(filters.sort(), vec!["POPULARITY_DESC"]);
    }

    #[test]
    fn test_year_range() {
        let range = YearRange::default();
        assert!(!range.is_narrowed());

        let range = YearRange {
            from: 2015,
            to: 2018,
        };
        assert!(range.is_narrowed());
        assert!(range.contains(Some(2016)));
        assert!(!range.contains(Some(2020)));
        assert!(range.contains(None));
    }

    #[test]
    fn test_parse_sort() {
        assert_eq!("releaseDate".parse::<SortBy>(), Ok(SortBy::ReleaseDate));
        assert_eq!("rating".parse::<SortBy>(), Ok(SortBy::Rating));
        assert!("newest".parse::<SortBy>().is_err());
        assert_eq!("ASC".parse::<SortOrder>(), Ok(SortOrder::Asc));
    }

    #[test]
    fn test_unavailable_errors() {
        assert!(Error::Timeout.is_unavailable());
        assert!(Error::RateLimited.is_unavailable());
        assert!(Error::Network("connection refused".to_string()).is_unavailable());
        assert!(!Error::Server(500).is_unavailable());
        assert!(!Error::Graphql("bad query".to_string()).is_unavailable());
    }
}
