use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::cached;
use crate::db::redis::{Cache, CacheKey};
use crate::error::{AppError, AppResult};
use crate::stores::MoreLikeSearch;

const MORELIKE_CACHE_TTL: u64 = 86400; // 1 day

/// HTTP client for the full-text search backend's "more-like" queries
///
/// Results for a given title change slowly, so they are cached through the
/// write-behind Redis cache.
#[derive(Clone)]
pub struct CirrusSearch {
    http_client: HttpClient,
    base_url: String,
    cache: Cache,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

impl CirrusSearch {
    pub fn new(cache: Cache, base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url,
            cache,
        }
    }
}

#[async_trait]
impl MoreLikeSearch for CirrusSearch {
    async fn more_like(&self, lang: &str, title: &str, limit: usize) -> AppResult<Vec<String>> {
        cached!(
            self.cache,
            CacheKey::MoreLike(lang.to_string(), title.to_string()),
            MORELIKE_CACHE_TTL,
            async move {
                let url = format!("{}/{}/search", self.base_url, lang);
                let limit_param = limit.to_string();

                let response = self
                    .http_client
                    .get(&url)
                    .query(&[("morelike", title), ("limit", limit_param.as_str())])
                    .send()
                    .await?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    tracing::error!(
                        title = %title,
                        status = %status,
                        body = %body,
                        "Search backend request failed"
                    );
                    return Err(AppError::SearchBackend(format!(
                        "search backend returned status {}: {}",
                        status, body
                    )));
                }

                let parsed: SearchResponse = response.json().await?;
                let titles: Vec<String> = parsed.results.into_iter().map(|h| h.title).collect();

                tracing::debug!(
                    title = %title,
                    matches = titles.len(),
                    "More-like query completed"
                );

                Ok(titles)
            }
        )
    }
}
