use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use quotesearch_core::config::{AppConfig, ConfigError, LoadOptions};
use quotesearch_core::RetrievalStrategy;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::{health, search, upstream};

pub struct Application {
    pub config: AppConfig,
    pub strategy: Arc<dyn RetrievalStrategy>,
    cors: CorsLayer,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("upstream http client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("server.allowed_origin is not a valid header value: `{0}`")]
    AllowedOrigin(String),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let strategy = upstream::build_strategy(&config.upstream).map_err(BootstrapError::HttpClient)?;
    let cors = cors_layer(&config.server.allowed_origin)?;

    info!(
        event_name = "system.bootstrap.strategy_ready",
        correlation_id = "bootstrap",
        strategy = strategy.name(),
        page_size = config.upstream.page_size,
        max_pages = config.upstream.max_pages,
        timeout_secs = config.upstream.timeout_secs,
        "upstream retrieval strategy initialized"
    );

    Ok(Application { config, strategy, cors })
}

impl Application {
    pub fn router(&self) -> Router {
        Router::new()
            .merge(search::router(self.strategy.clone()))
            .merge(health::router(self.strategy.name()))
            .layer(self.cors.clone())
    }
}

fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, BootstrapError> {
    let layer = CorsLayer::new()
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origin.trim() == "*" {
        return Ok(layer.allow_origin(Any));
    }

    let origin = HeaderValue::from_str(allowed_origin.trim())
        .map_err(|_| BootstrapError::AllowedOrigin(allowed_origin.to_string()))?;
    Ok(layer.allow_origin(origin))
}
