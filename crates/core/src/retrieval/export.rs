use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::quote::{QuoteMatches, QuoteRecord, EXPORT_EMAIL_FIELD};
use crate::email::email_domain;
use crate::errors::RetrievalError;
use crate::retrieval::{
    retain_matching_on, with_timeout, ExportSource, RetrievalResult, RetrievalStrategy,
};

const WORKBOOK_EXTENSION: &str = ".xlsx";

/// Exports every quote as a workbook and keeps the rows for one email.
///
/// Each of the two upstream requests gets its own timeout. Rows are matched
/// on the `Email` column.
pub struct ExportFilterFetcher<S> {
    source: S,
    request_timeout: Duration,
}

impl<S: ExportSource> ExportFilterFetcher<S> {
    pub fn new(source: S, request_timeout: Duration) -> Self {
        Self { source, request_timeout }
    }

    pub async fn fetch(&self, email: &str) -> RetrievalResult {
        let rows = self.export_rows().await.map_err(|error| {
            warn!(
                event_name = "retrieval.export.failed",
                email_domain = email_domain(email),
                failure_kind = ?error.kind(),
                error = %error,
                "quote export failed"
            );
            error
        })?;

        let received = rows.len();
        let records = retain_matching_on(rows, EXPORT_EMAIL_FIELD, email);
        debug!(
            event_name = "retrieval.export.completed",
            received,
            matched = records.len(),
            "quote export processed"
        );

        Ok(QuoteMatches { records, pages_fetched: 1 })
    }

    async fn export_rows(&self) -> Result<Vec<QuoteRecord>, RetrievalError> {
        let reply = with_timeout(self.request_timeout, self.source.request_export()).await?;
        let file_name = workbook_file_name(&reply)?;
        with_timeout(self.request_timeout, self.source.download_export(file_name)).await
    }
}

/// The export reply is a bare file name; anything else is a protocol error.
pub fn workbook_file_name(reply: &str) -> Result<&str, RetrievalError> {
    let file_name = reply.trim();
    let plain = !file_name.contains(['/', '\\', '?', '#']);
    let named = file_name.len() > WORKBOOK_EXTENSION.len();

    if named && plain && file_name.ends_with(WORKBOOK_EXTENSION) {
        Ok(file_name)
    } else {
        Err(RetrievalError::malformed(
            200,
            format!("export reply `{file_name}` is not a workbook name"),
        ))
    }
}

#[async_trait]
impl<S: ExportSource> RetrievalStrategy for ExportFilterFetcher<S> {
    fn name(&self) -> &'static str {
        "export"
    }

    async fn fetch_all_matching(&self, email: &str) -> RetrievalResult {
        self.fetch(email).await
    }
}
