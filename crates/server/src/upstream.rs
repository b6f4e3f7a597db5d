//! reqwest transport for the upstream quoting API.
//!
//! The base URL and credential are fixed at construction; the retrieval
//! strategies only ever see [`PageSource`], [`SearchSource`] and
//! [`ExportSource`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quotesearch_core::config::{StrategyKind, UpstreamConfig};
use quotesearch_core::domain::quote::{take_records, Page, QuoteRecord};
use quotesearch_core::{
    ExportFilterFetcher, ExportSource, PageRequest, PageSource, PagedFilterFetcher,
    RetrievalError, RetrievalStrategy, SearchFilterFetcher, SearchSource,
};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};

use crate::workbook::first_sheet_records;

pub const AUTH_HEADER: &str = "x-api-auth-token";
const LIST_PATH: &str = "/v3/quotes";
const SEARCH_PATH: &str = "/v3/quotes/search/1";
const EXPORT_PATH: &str = "/v3/quotes/export/";
const EXPORT_DOWNLOAD_PATH: &str = "/v3/quotes/export/download";

#[derive(Clone)]
pub struct HttpQuotesApi {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct SearchPayload<'a> {
    #[serde(rename = "searchString")]
    search_string: &'a str,
    #[serde(rename = "searchFilters")]
    search_filters: Vec<Value>,
    #[serde(rename = "UserID")]
    user_id: Option<String>,
}

impl HttpQuotesApi {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url, api_key })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.base_url.clone(), config.api_key.clone(), config.request_timeout())
    }

    async fn read_json(response: Response) -> Result<(u16, Value), RetrievalError> {
        let status = successful_status(&response)?;
        let body = response.json::<Value>().await.map_err(|error| body_error(status, error))?;
        Ok((status.as_u16(), body))
    }
}

fn successful_status(response: &Response) -> Result<StatusCode, RetrievalError> {
    let status = response.status();
    if status.is_success() {
        Ok(status)
    } else {
        Err(RetrievalError::UpstreamStatus { status: status.as_u16() })
    }
}

fn transport_error(error: reqwest::Error) -> RetrievalError {
    RetrievalError::unreachable(error.to_string())
}

fn body_error(status: StatusCode, error: reqwest::Error) -> RetrievalError {
    if error.is_decode() {
        RetrievalError::malformed(status.as_u16(), format!("body is not valid JSON: {error}"))
    } else {
        RetrievalError::unreachable(format!("failed to read response body: {error}"))
    }
}

#[async_trait]
impl PageSource for HttpQuotesApi {
    async fn fetch_page(&self, request: PageRequest) -> Result<Page, RetrievalError> {
        let mut query = vec![("pageSize", request.page_size.to_string())];
        if let Some(cursor) = request.cursor {
            query.push(("page", cursor.0));
        }

        let response = self
            .client
            .get(format!("{}{LIST_PATH}", self.base_url))
            .header(AUTH_HEADER, self.api_key.expose_secret())
            .query(&query)
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = Self::read_json(response).await?;
        Page::from_body(status, body)
    }
}

#[async_trait]
impl SearchSource for HttpQuotesApi {
    async fn search(&self, query: &str) -> Result<Vec<QuoteRecord>, RetrievalError> {
        let payload =
            SearchPayload { search_string: query, search_filters: Vec::new(), user_id: None };

        let response = self
            .client
            .post(format!("{}{SEARCH_PATH}", self.base_url))
            .header(AUTH_HEADER, self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = Self::read_json(response).await?;
        match body {
            Value::Object(mut object) => take_records(status, &mut object),
            _ => Err(RetrievalError::malformed(status, "search body is not an object")),
        }
    }
}

#[async_trait]
impl ExportSource for HttpQuotesApi {
    async fn request_export(&self) -> Result<String, RetrievalError> {
        let payload = json!({
            "Type": "all",
            "SearchObj": { "searchString": "", "searchFilters": [] }
        });

        let response = self
            .client
            .post(format!("{}{EXPORT_PATH}", self.base_url))
            .header(AUTH_HEADER, self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        successful_status(&response)?;
        response.text().await.map_err(|error| {
            RetrievalError::unreachable(format!("failed to read export reply: {error}"))
        })
    }

    async fn download_export(&self, file_name: &str) -> Result<Vec<QuoteRecord>, RetrievalError> {
        let response = self
            .client
            .get(format!("{}{EXPORT_DOWNLOAD_PATH}/{file_name}", self.base_url))
            .header(AUTH_HEADER, self.api_key.expose_secret())
            .send()
            .await
            .map_err(transport_error)?;

        let status = successful_status(&response)?;
        let bytes = response.bytes().await.map_err(|error| {
            RetrievalError::unreachable(format!("failed to read export download: {error}"))
        })?;
        first_sheet_records(status.as_u16(), &bytes)
    }
}

/// Builds the strategy named by `upstream.strategy` over one shared client.
pub fn build_strategy(
    config: &UpstreamConfig,
) -> Result<Arc<dyn RetrievalStrategy>, reqwest::Error> {
    let api = HttpQuotesApi::from_config(config)?;
    let strategy: Arc<dyn RetrievalStrategy> = match config.strategy {
        StrategyKind::Paged => Arc::new(PagedFilterFetcher::new(api, config.fetch_settings())),
        StrategyKind::Search => Arc::new(SearchFilterFetcher::new(api, config.request_timeout())),
        StrategyKind::Export => Arc::new(ExportFilterFetcher::new(api, config.request_timeout())),
    };
    Ok(strategy)
}
