//! Retrieval strategies that turn one email query into a filtered quote list.
//!
//! Transports sit behind [`PageSource`] and [`SearchSource`] so the loop and
//! filtering logic never see HTTP. The server crate supplies the reqwest
//! implementations; tests supply scripted ones.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::quote::{Page, PageCursor, QuoteMatches, QuoteRecord, EMAIL_FIELD};
use crate::errors::RetrievalError;

pub mod export;
pub mod paged;
pub mod search;

pub type RetrievalResult = Result<QuoteMatches, RetrievalError>;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_MAX_PAGES: u32 = 50;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchSettings {
    pub page_size: u32,
    /// Hard ceiling on page requests per call. Reaching it ends the walk
    /// successfully with whatever has been accumulated.
    pub max_pages: u32,
    /// Applied to each upstream request independently.
    pub request_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: u32,
    pub cursor: Option<PageCursor>,
}

/// One request against the paginated quote listing.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, request: PageRequest) -> Result<Page, RetrievalError>;
}

/// Two-step spreadsheet export: request a workbook, then download and read it.
#[async_trait]
pub trait ExportSource: Send + Sync {
    /// Returns the raw export reply, expected to be a workbook file name.
    async fn request_export(&self) -> Result<String, RetrievalError>;

    /// Downloads `file_name` and returns the rows of its first sheet.
    async fn download_export(&self, file_name: &str) -> Result<Vec<QuoteRecord>, RetrievalError>;
}

/// One request against the upstream free-text search.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<QuoteRecord>, RetrievalError>;
}

#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_all_matching(&self, email: &str) -> RetrievalResult;
}

/// Keeps records whose `email` equals `email` ignoring case, in input order.
pub fn retain_matching(records: Vec<QuoteRecord>, email: &str) -> Vec<QuoteRecord> {
    retain_matching_on(records, EMAIL_FIELD, email)
}

pub fn retain_matching_on(
    records: Vec<QuoteRecord>,
    field: &str,
    email: &str,
) -> Vec<QuoteRecord> {
    let query = email.to_lowercase();
    records.into_iter().filter(|record| record.belongs_to_on(field, &query)).collect()
}

async fn with_timeout<T, F>(timeout: Duration, request: F) -> Result<T, RetrievalError>
where
    F: std::future::Future<Output = Result<T, RetrievalError>>,
{
    match tokio::time::timeout(timeout, request).await {
        Ok(result) => result,
        Err(_) => Err(RetrievalError::unreachable(format!(
            "upstream request timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{retain_matching, FetchSettings};
    use crate::domain::quote::QuoteRecord;

    #[test]
    fn defaults_match_documented_limits() {
        let settings = FetchSettings::default();
        assert_eq!(settings.page_size, 100);
        assert_eq!(settings.max_pages, 50);
    }

    #[test]
    fn retain_matching_keeps_order_and_duplicates() {
        let records = vec![
            QuoteRecord::from(json!({ "email": "a@x.com", "id": 1 })),
            QuoteRecord::from(json!({ "email": "b@x.com", "id": 2 })),
            QuoteRecord::from(json!({ "email": "A@X.COM", "id": 3 })),
            QuoteRecord::from(json!({ "email": "a@x.com", "id": 1 })),
        ];

        let kept = retain_matching(records, "a@X.com");
        let ids: Vec<_> = kept.iter().map(|record| record.as_value()["id"].clone()).collect();

        assert_eq!(ids, vec![json!(1), json!(3), json!(1)]);
    }
}
