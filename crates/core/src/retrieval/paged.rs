use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::quote::{PageCursor, QuoteMatches};
use crate::email::email_domain;
use crate::errors::RetrievalError;
use crate::retrieval::{
    retain_matching, with_timeout, FetchSettings, PageRequest, PageSource, RetrievalResult,
    RetrievalStrategy,
};

/// Walks the paginated quote listing and keeps the records for one email.
///
/// The walk stops when the upstream reports no further cursor, when
/// `max_pages` requests have been issued, or on the first failed page. A
/// failed page discards everything accumulated so far.
pub struct PagedFilterFetcher<S> {
    source: S,
    settings: FetchSettings,
}

impl<S: PageSource> PagedFilterFetcher<S> {
    pub fn new(source: S, settings: FetchSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub async fn fetch(&self, email: &str) -> RetrievalResult {
        let mut cursor: Option<PageCursor> = None;
        let mut pages_fetched: u32 = 0;
        let mut records = Vec::new();

        loop {
            if pages_fetched >= self.settings.max_pages {
                warn!(
                    event_name = "retrieval.paged.ceiling_reached",
                    email_domain = email_domain(email),
                    pages_fetched,
                    matched = records.len(),
                    "page ceiling reached before upstream exhaustion; returning accumulated matches"
                );
                break;
            }

            let request = PageRequest { page_size: self.settings.page_size, cursor: cursor.take() };
            let page = with_timeout(self.settings.request_timeout, self.source.fetch_page(request))
                .await
                .map_err(|error| {
                    log_failure(&error, email, pages_fetched + 1);
                    error
                })?;

            let received = page.records.len();
            let matched = retain_matching(page.records, email);
            let matched_on_page = matched.len();
            records.extend(matched);
            pages_fetched += 1;

            debug!(
                event_name = "retrieval.paged.page_received",
                page = pages_fetched,
                received,
                matched = matched_on_page,
                has_next = page.next_page.is_some(),
                "quote page processed"
            );

            match page.next_page {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(QuoteMatches { records, pages_fetched })
    }
}

fn log_failure(error: &RetrievalError, email: &str, page: u32) {
    warn!(
        event_name = "retrieval.paged.failed",
        email_domain = email_domain(email),
        page,
        failure_kind = ?error.kind(),
        error = %error,
        "quote page request failed; discarding accumulated matches"
    );
}

#[async_trait]
impl<S: PageSource> RetrievalStrategy for PagedFilterFetcher<S> {
    fn name(&self) -> &'static str {
        "paged"
    }

    async fn fetch_all_matching(&self, email: &str) -> RetrievalResult {
        self.fetch(email).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::PagedFilterFetcher;
    use crate::domain::quote::{Page, PageCursor, QuoteRecord};
    use crate::errors::{FailureKind, RetrievalError};
    use crate::retrieval::{FetchSettings, PageRequest, PageSource, RetrievalStrategy};

    enum Step {
        Page(Vec<Value>, Option<&'static str>),
        Fail(RetrievalError),
        Hang,
    }

    /// Replays a fixed list of steps and records every request it receives.
    struct ScriptedPages {
        steps: Mutex<Vec<Step>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl ScriptedPages {
        fn new(steps: Vec<Step>) -> Self {
            Self { steps: Mutex::new(steps), requests: Mutex::new(Vec::new()) }
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    #[async_trait]
    impl PageSource for ScriptedPages {
        async fn fetch_page(&self, request: PageRequest) -> Result<Page, RetrievalError> {
            self.requests.lock().expect("requests lock").push(request);
            let step = {
                let mut steps = self.steps.lock().expect("steps lock");
                if steps.is_empty() {
                    panic!("scripted source ran out of pages");
                }
                steps.remove(0)
            };

            match step {
                Step::Page(records, next) => Ok(Page {
                    records: records.into_iter().map(QuoteRecord::from).collect(),
                    next_page: next.map(|token| PageCursor(token.to_string())),
                }),
                Step::Fail(error) => Err(error),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(Page { records: Vec::new(), next_page: None })
                }
            }
        }
    }

    /// Never signals the end of the listing.
    struct EndlessPages {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl PageSource for EndlessPages {
        async fn fetch_page(&self, _request: PageRequest) -> Result<Page, RetrievalError> {
            let mut calls = self.calls.lock().expect("calls lock");
            *calls += 1;
            Ok(Page {
                records: vec![QuoteRecord::from(json!({ "email": "loop@x.com", "n": *calls }))],
                next_page: Some(PageCursor("same-token".to_string())),
            })
        }
    }

    fn settings(max_pages: u32) -> FetchSettings {
        FetchSettings { page_size: 2, max_pages, request_timeout: Duration::from_millis(200) }
    }

    #[tokio::test]
    async fn two_page_walk_keeps_case_insensitive_matches_in_page_order() {
        let source = ScriptedPages::new(vec![
            Step::Page(vec![json!({ "email": "a@x.com" }), json!({ "email": "B@X.com" })], Some("p2")),
            Step::Page(vec![json!({ "email": "a@X.com" })], None),
        ]);
        let fetcher = PagedFilterFetcher::new(source, settings(50));

        let matches = fetcher.fetch("a@x.com").await.expect("walk should succeed");

        let records: Vec<Value> =
            matches.records.iter().map(|record| record.as_value().clone()).collect();
        assert_eq!(records, vec![json!({ "email": "a@x.com" }), json!({ "email": "a@X.com" })]);
        assert_eq!(matches.pages_fetched, 2);
    }

    #[tokio::test]
    async fn exhaustion_issues_one_request_per_page_with_cursor_chain() {
        let source = ScriptedPages::new(vec![
            Step::Page(vec![], Some("c1")),
            Step::Page(vec![], Some("c2")),
            Step::Page(vec![], None),
        ]);
        let fetcher = PagedFilterFetcher::new(source, settings(50));

        let matches = fetcher.fetch("a@x.com").await.expect("walk should succeed");
        let requests = fetcher.source.requests();

        assert_eq!(matches.pages_fetched, 3);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], PageRequest { page_size: 2, cursor: None });
        assert_eq!(requests[1].cursor, Some(PageCursor("c1".to_string())));
        assert_eq!(requests[2].cursor, Some(PageCursor("c2".to_string())));
    }

    #[tokio::test]
    async fn exhaustion_exactly_at_ceiling_is_not_truncation() {
        let source = ScriptedPages::new(vec![
            Step::Page(vec![json!({ "email": "a@x.com" })], Some("c1")),
            Step::Page(vec![json!({ "email": "a@x.com" })], None),
        ]);
        let fetcher = PagedFilterFetcher::new(source, settings(2));

        let matches = fetcher.fetch("a@x.com").await.expect("walk should succeed");

        assert_eq!(matches.records.len(), 2);
        assert_eq!(fetcher.source.requests().len(), 2);
    }

    #[tokio::test]
    async fn endless_cursor_stops_at_ceiling_without_error() {
        let fetcher = PagedFilterFetcher::new(EndlessPages { calls: Mutex::new(0) }, settings(7));

        let matches = fetcher.fetch("loop@x.com").await.expect("ceiling is not an error");

        assert_eq!(*fetcher.source.calls.lock().expect("calls lock"), 7);
        assert_eq!(matches.pages_fetched, 7);
        assert_eq!(matches.records.len(), 7);
    }

    #[tokio::test]
    async fn zero_page_ceiling_issues_no_requests() {
        let fetcher = PagedFilterFetcher::new(EndlessPages { calls: Mutex::new(0) }, settings(0));

        let matches = fetcher.fetch("loop@x.com").await.expect("empty walk succeeds");

        assert_eq!(*fetcher.source.calls.lock().expect("calls lock"), 0);
        assert!(matches.records.is_empty());
    }

    #[tokio::test]
    async fn no_matches_after_exhaustion_is_empty_success() {
        let source = ScriptedPages::new(vec![
            Step::Page(vec![json!({ "email": "b@x.com" })], Some("c1")),
            Step::Page(vec![json!({ "name": "no email" })], None),
        ]);
        let fetcher = PagedFilterFetcher::new(source, settings(50));

        let matches = fetcher.fetch("a@x.com").await.expect("empty match set is success");

        assert!(matches.records.is_empty());
        assert_eq!(matches.pages_fetched, 2);
    }

    #[tokio::test]
    async fn duplicates_across_pages_are_kept() {
        let record = json!({ "email": "a@x.com", "id": "Q-1" });
        let source = ScriptedPages::new(vec![
            Step::Page(vec![record.clone()], Some("c1")),
            Step::Page(vec![record.clone()], None),
        ]);
        let fetcher = PagedFilterFetcher::new(source, settings(50));

        let matches = fetcher.fetch("a@x.com").await.expect("walk should succeed");

        assert_eq!(matches.records.len(), 2);
    }

    #[tokio::test]
    async fn timeout_on_third_page_discards_earlier_matches() {
        let source = ScriptedPages::new(vec![
            Step::Page(vec![json!({ "email": "a@x.com" })], Some("c1")),
            Step::Page(vec![json!({ "email": "a@x.com" })], Some("c2")),
            Step::Hang,
            Step::Page(vec![], Some("c4")),
            Step::Page(vec![], None),
        ]);
        let fetcher = PagedFilterFetcher::new(source, settings(50));

        let error = fetcher.fetch("a@x.com").await.expect_err("timeout must fail the call");

        assert_eq!(error.kind(), FailureKind::Unreachable);
        assert_eq!(fetcher.source.requests().len(), 3);
    }

    #[tokio::test]
    async fn transport_error_mid_walk_is_unreachable() {
        let source = ScriptedPages::new(vec![
            Step::Page(vec![json!({ "email": "a@x.com" })], Some("c1")),
            Step::Fail(RetrievalError::unreachable("connection reset")),
        ]);
        let fetcher = PagedFilterFetcher::new(source, settings(50));

        let error = fetcher.fetch("a@x.com").await.expect_err("transport error must fail");

        assert_eq!(error, RetrievalError::unreachable("connection reset"));
    }

    #[tokio::test]
    async fn malformed_page_stops_walk_with_protocol_error() {
        let source = ScriptedPages::new(vec![
            Step::Page(vec![json!({ "email": "a@x.com" })], Some("c1")),
            Step::Fail(RetrievalError::malformed(200, "`Data` is null")),
            Step::Page(vec![], None),
        ]);
        let fetcher = PagedFilterFetcher::new(source, settings(50));

        let error = fetcher.fetch("a@x.com").await.expect_err("malformed page must fail");

        assert_eq!(error.kind(), FailureKind::UpstreamProtocolError);
        assert_eq!(fetcher.source.requests().len(), 2);
    }

    #[tokio::test]
    async fn bad_status_on_first_page_is_protocol_error() {
        let source = ScriptedPages::new(vec![Step::Fail(RetrievalError::UpstreamStatus {
            status: 401,
        })]);
        let fetcher = PagedFilterFetcher::new(source, settings(50));

        let error = fetcher.fetch_all_matching("a@x.com").await.expect_err("401 must fail");

        assert_eq!(error.status(), Some(401));
        assert_eq!(fetcher.name(), "paged");
    }
}
