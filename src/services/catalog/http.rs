/// HTTP book catalog
///
/// API Flow:
/// 1. Search: GET {base}/search?q=... → `{"ids": [...]}` in relevance order
/// 2. Details: GET {base}/books/{id} → book record, 404 when unknown
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{Book, BookId},
    services::catalog::CatalogClient,
};
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const BOOK_CACHE_TTL: u64 = 604800; // 1 week

#[derive(Debug, Serialize, Deserialize)]
struct SearchResponse {
    ids: Vec<BookId>,
}

#[derive(Clone)]
pub struct HttpCatalog {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: Url,
    cache: Option<Cache>,
}

impl HttpCatalog {
    /// Every request, body included, must finish within `timeout`
    pub fn new(
        cache: Option<Cache>,
        api_key: Option<String>,
        api_url: &str,
        timeout: Duration,
    ) -> AppResult<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| AppError::InvalidInput(format!("Invalid catalog URL: {}", e)))?;
        if api_url.cannot_be_a_base() {
            return Err(AppError::InvalidInput(format!(
                "Catalog URL cannot be a base: {}",
                api_url
            )));
        }

        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            cache,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Appends percent-encoded path segments to the base URL
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn search_url(&self) -> Url {
        self.endpoint(&["search"])
    }

    fn book_url(&self, id: &str) -> Url {
        self.endpoint(&["books", id])
    }
}

#[async_trait::async_trait]
impl CatalogClient for HttpCatalog {
    async fn search(&self, query: &str) -> AppResult<Vec<BookId>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let ids: Vec<BookId> = cached!(
            self.cache.as_ref(),
            CacheKey::BookSearch(query.to_string()),
            SEARCH_CACHE_TTL,
            async move {
                let response = self
                    .authorized(self.http_client.get(self.search_url()))
                    .query(&[("q", query)])
                    .send()
                    .await?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::ExternalApi(format!(
                        "Catalog returned status {}: {}",
                        status, body
                    )));
                }

                let results: SearchResponse = response.json().await?;

                tracing::info!(
                    query = %query,
                    results = results.ids.len(),
                    catalog = "http",
                    "Book search completed"
                );

                Ok::<_, AppError>(results.ids)
            }
        )?;

        Ok(ids)
    }

    async fn get_item(&self, id: &str) -> AppResult<Option<Book>> {
        if id.is_empty() {
            return Ok(None);
        }

        cached!(
            self.cache.as_ref(),
            CacheKey::Book(id.to_string()),
            BOOK_CACHE_TTL,
            async move {
                let response = self
                    .authorized(self.http_client.get(self.book_url(id)))
                    .send()
                    .await?;

                if response.status() == StatusCode::NOT_FOUND {
                    tracing::debug!(item_id = %id, "Book not found in catalog");
                    return Ok(None);
                }

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::ExternalApi(format!(
                        "Catalog returned status {}: {}",
                        status, body
                    )));
                }

                let response_text = response.text().await?;
                let book: Book = serde_json::from_str(&response_text).map_err(|e| {
                    tracing::error!(
                        error = %e,
                        response = %response_text,
                        "Failed to deserialize catalog book"
                    );
                    AppError::ExternalApi(format!("Failed to parse catalog book: {}", e))
                })?;

                tracing::debug!(item_id = %book.id, similar = book.similar_item_ids.len(), "Book fetched");

                Ok(Some(book))
            }
        )
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
