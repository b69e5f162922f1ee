use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tokio::{sync::Mutex, time::Instant};

use crate::{Catalogue, Error, Media};

pub const ENDPOINT: &str = "https://graphql.anilist.co";

const SEARCH_PAGE_SIZE: i64 = 50;

const SEARCH_QUERY: &str = "
query SearchManhwa($search: String, $genres: [String], $sort: [MediaSort], $perPage: Int) {
    Page(page: 1, perPage: $perPage) {
      media(
        search: $search,
        type: MANGA,
        countryOfOrigin: \"KR\",
        sort: $sort,
        isAdult: false,
        genre_in: $genres,
        status_in: [FINISHED, RELEASING]
      ) {
        id
        title {
          romaji
          english
        }
        coverImage {
          large
          extraLarge
        }
        chapters
        status
        startDate {
          year
        }
        averageScore
        popularity
        genres
      }
    }
  }
";

const POPULAR_QUERY: &str = "
query PopularManhwa($page: Int, $perPage: Int) {
    Page(page: $page, perPage: $perPage) {
      media(
        type: MANGA,
        countryOfOrigin: \"KR\",
        sort: POPULARITY_DESC,
        status_in: [FINISHED, RELEASING],
        isAdult: false
      ) {
        id
        title {
          romaji
          english
        }
        coverImage {
          large
        }
        averageScore
        popularity
        chapters
        status
        startDate {
          year
        }
        genres
      }
    }
  }
";

const DETAILS_QUERY: &str = "
query GetManhwa($id: Int) {
    Media(id: $id, type: MANGA) {
      id
      title {
        romaji
        english
      }
      description(asHtml: false)
      coverImage {
        extraLarge
      }
      status
      startDate {
        year
      }
      chapters
      averageScore
      popularity
      genres
    }
  }
";

/// AniList GraphQL client. Requests are spaced by `min_interval` and bounded by `timeout`.
pub struct AniList {
    client: reqwest::Client,
    endpoint: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl AniList {
    pub fn new(endpoint: &str, timeout: Duration, min_interval: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("{e}"))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            min_interval,
            last_request: Mutex::new(None),
        })
    }

    async fn rate_limit(&self) {
        // the lock is held through the sleep so callers queue up behind each other
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last_request = Some(Instant::now());
    }

    async fn post_graphql(&self, body: &serde_json::Value) -> Result<serde_json::Value, Error> {
        self.rate_limit().await;

        let res = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            return Err(Error::Server(status.as_u16()));
        }

        let body = res
            .json::<serde_json::Value>()
            .await
            .map_err(classify_request_error)?;

        extract_data(body)
    }

    async fn fetch_page(&self, query: &str, variables: serde_json::Value) -> Result<Vec<Media>, Error> {
        let data = self
            .post_graphql(&json!({
                "query": query,
                "variables": variables
            }))
            .await?;

        let media = data
            .get("Page")
            .and_then(|page| page.get("media"))
            .map(|media| media.to_owned())
            .ok_or(Error::NoData)?;

        Ok(serde_json::from_value(media).map_err(|e| anyhow!("{e}"))?)
    }
}

#[async_trait]
impl Catalogue for AniList {
    async fn popular(&self, page: i64, per_page: i64) -> Result<Vec<Media>, Error> {
        self.fetch_page(POPULAR_QUERY, json!({ "page": page, "perPage": per_page }))
            .await
    }

    async fn search(
        &self,
        search: Option<&str>,
        genres: &[String],
        sort: &[&'static str],
    ) -> Result<Vec<Media>, Error> {
        let mut variables = serde_json::Map::new();
        variables.insert("perPage".to_string(), json!(SEARCH_PAGE_SIZE));
        variables.insert("sort".to_string(), json!(sort));
        if let Some(search) = search {
            variables.insert("search".to_string(), json!(search));
        }
        if !genres.is_empty() {
            variables.insert("genres".to_string(), json!(genres));
        }

        debug!("search variables: {variables:?}");

        self.fetch_page(SEARCH_QUERY, serde_json::Value::Object(variables))
            .await
    }

    async fn media(&self, id: i64) -> Result<Media, Error> {
        let data = self
            .post_graphql(&json!({
                "query": DETAILS_QUERY,
                "variables": {
                    "id": id
                }
            }))
            .await?;

        let media = data
            .get("Media")
            .filter(|media| !media.is_null())
            .map(|media| media.to_owned())
            .ok_or(Error::NoData)?;

        Ok(serde_json::from_value(media).map_err(|e| anyhow!("{e}"))?)
    }
}

fn classify_request_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else if e.status() == Some(StatusCode::TOO_MANY_REQUESTS) {
        Error::RateLimited
    } else if e.is_connect() || e.is_request() {
        Error::Network(e.to_string())
    } else {
        Error::Other(anyhow!("{e}"))
    }
}

/// Unwraps a GraphQL response body, surfacing the first reported error.
fn extract_data(body: serde_json::Value) -> Result<serde_json::Value, Error> {
    if let Some(errors) = body.get("errors").and_then(|errors| errors.as_array()) {
        if let Some(first) = errors.first() {
            let message = first
                .get("message")
                .and_then(|message| message.as_str())
                .unwrap_or("GraphQL query failed");
            error!("graphql errors: {errors:?}");
            return Err(Error::Graphql(message.to_string()));
        }
    }

    match body.get("data") {
        Some(data) if !data.is_null() => Ok(data.to_owned()),
        _ => Err(Error::NoData),
    }
}
