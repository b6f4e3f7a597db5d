use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::quote::QuoteMatches;
use crate::email::email_domain;
use crate::retrieval::{
    retain_matching, with_timeout, RetrievalResult, RetrievalStrategy, SearchSource,
};

/// Single request against the upstream search endpoint.
///
/// The upstream search is a free-text match, so its hits go through the same
/// exact email filter as the paged walk.
pub struct SearchFilterFetcher<S> {
    source: S,
    request_timeout: Duration,
}

impl<S: SearchSource> SearchFilterFetcher<S> {
    pub fn new(source: S, request_timeout: Duration) -> Self {
        Self { source, request_timeout }
    }

    pub async fn fetch(&self, email: &str) -> RetrievalResult {
        let hits = with_timeout(self.request_timeout, self.source.search(email)).await.map_err(
            |error| {
                warn!(
                    event_name = "retrieval.search.failed",
                    email_domain = email_domain(email),
                    failure_kind = ?error.kind(),
                    error = %error,
                    "quote search request failed"
                );
                error
            },
        )?;

        let received = hits.len();
        let records = retain_matching(hits, email);
        debug!(
            event_name = "retrieval.search.completed",
            received,
            matched = records.len(),
            "quote search processed"
        );

        Ok(QuoteMatches { records, pages_fetched: 1 })
    }
}

#[async_trait]
impl<S: SearchSource> RetrievalStrategy for SearchFilterFetcher<S> {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn fetch_all_matching(&self, email: &str) -> RetrievalResult {
        self.fetch(email).await
    }
}
