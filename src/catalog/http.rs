//! HTTP adapter for the catalog admin API
//!
//! Listing pages through `/api/v1/updates` with a server-issued cursor and
//! yields records as each page arrives, so the whole catalog is never held
//! in memory at once.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::*;
use crate::config::CatalogConfig;

/// One page of a listing (or a relation lookup, which is never paged)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePage {
    updates: Vec<UpdateRecord>,
    #[serde(default, rename = "next_cursor", alias = "nextCursor")]
    next_cursor: Option<String>,
}

/// Catalog reached over HTTP
pub struct HttpRepository {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
    page_size: u32,
}

impl HttpRepository {
    /// Build a client from the `[catalog]` configuration section
    pub fn new(config: &CatalogConfig) -> Result<Self, RepositoryError> {
        let base_url = Url::parse(&config.url).map_err(|e| {
            RepositoryError::Unavailable(format!("invalid catalog url {}: {}", config.url, e))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RepositoryError::Unavailable(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
            page_size: config.page_size.max(1),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RepositoryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RepositoryError::Unavailable(format!("catalog url {} cannot be a base", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_page(
        &self,
        scope: ScopeFilter,
        cursor: Option<&str>,
    ) -> Result<UpdatePage, RepositoryError> {
        let url = self.endpoint(&["api", "v1", "updates"])?;

        let mut query = vec![
            ("scope", scope.as_query().to_string()),
            ("limit", self.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        debug!(%url, ?scope, cursor, "Fetching update page");

        let response = self
            .authorize(self.client.get(url).query(&query))
            .send()
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        read_json(response).await
    }
}

async fn read_json(response: Response) -> Result<UpdatePage, RepositoryError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(RepositoryError::Unavailable(format!(
            "catalog returned {}: {}",
            status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RepositoryError::Unavailable(format!("malformed catalog response: {}", e)))
}

#[async_trait]
impl UpdateRepository for HttpRepository {
    fn name(&self) -> &str {
        self.base_url.as_str()
    }

    fn list_updates(&self, scope: ScopeFilter) -> UpdateStream<'_> {
        // None = done, Some(None) = first page, Some(Some(c)) = page at cursor c
        let start = (Some(None::<String>), HashSet::<String>::new());
        let pages = stream::try_unfold(start, move |(cursor, mut seen)| async move {
            let Some(cursor) = cursor else {
                return Ok::<_, RepositoryError>(None);
            };

            let page = self.fetch_page(scope, cursor.as_deref()).await?;
            let next = match page.next_cursor {
                Some(next) if !seen.insert(next.clone()) => {
                    return Err(RepositoryError::Unavailable(format!(
                        "catalog repeated cursor {}",
                        next
                    )));
                }
                Some(next) => Some(Some(next)),
                None => None,
            };
            let records = stream::iter(page.updates.into_iter().map(Ok::<_, RepositoryError>));

            Ok(Some((records, (next, seen))))
        });

        pages.try_flatten().boxed()
    }

    async fn decline(&self, record: &UpdateRecord) -> Result<(), RepositoryError> {
        let url = self.endpoint(&["api", "v1", "updates", record.id.as_str(), "decline"])?;

        let response = self
            .authorize(self.client.post(url))
            .send()
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(RepositoryError::DeclineRejected {
                    id: record.id.clone(),
                    reason: if body.is_empty() {
                        status.to_string()
                    } else {
                        body
                    },
                })
            }
            _ => Err(RepositoryError::Unavailable(format!(
                "decline of {} returned {}: {}",
                record.id, status, body
            ))),
        }
    }

    async fn related_updates(
        &self,
        record: &UpdateRecord,
        relation: RelationKind,
    ) -> Result<Vec<UpdateRecord>, RepositoryError> {
        let url = self.endpoint(&["api", "v1", "updates", record.id.as_str(), "related"])?;

        let response = self
            .authorize(
                self.client
                    .get(url)
                    .query(&[("relation", relation.as_query())]),
            )
            .send()
            .await
            .map_err(|e| RepositoryError::Unavailable(e.to_string()))?;

        Ok(read_json(response).await?.updates)
    }
}
