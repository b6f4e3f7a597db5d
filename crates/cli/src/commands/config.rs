use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quotesearch_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = [
        Field {
            key_path: "upstream.base_url",
            value: config.upstream.base_url.clone(),
            env_keys: &["QUOTESEARCH_UPSTREAM_BASE_URL"],
        },
        Field {
            key_path: "upstream.api_key",
            value: redact_secret(config.upstream.api_key.expose_secret()),
            env_keys: &["QUOTESEARCH_UPSTREAM_API_KEY", "API_KEY"],
        },
        Field {
            key_path: "upstream.strategy",
            value: config.upstream.strategy.as_str().to_string(),
            env_keys: &["QUOTESEARCH_UPSTREAM_STRATEGY"],
        },
        Field {
            key_path: "upstream.page_size",
            value: config.upstream.page_size.to_string(),
            env_keys: &["QUOTESEARCH_UPSTREAM_PAGE_SIZE"],
        },
        Field {
            key_path: "upstream.max_pages",
            value: config.upstream.max_pages.to_string(),
            env_keys: &["QUOTESEARCH_UPSTREAM_MAX_PAGES"],
        },
        Field {
            key_path: "upstream.timeout_secs",
            value: config.upstream.timeout_secs.to_string(),
            env_keys: &["QUOTESEARCH_UPSTREAM_TIMEOUT_SECS"],
        },
        Field {
            key_path: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["QUOTESEARCH_SERVER_BIND_ADDRESS"],
        },
        Field {
            key_path: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["QUOTESEARCH_SERVER_PORT", "PORT"],
        },
        Field {
            key_path: "server.allowed_origin",
            value: config.server.allowed_origin.clone(),
            env_keys: &["QUOTESEARCH_SERVER_ALLOWED_ORIGIN"],
        },
        Field {
            key_path: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["QUOTESEARCH_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["QUOTESEARCH_LOGGING_LEVEL", "QUOTESEARCH_LOG_LEVEL"],
        },
        Field {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            env_keys: &["QUOTESEARCH_LOGGING_FORMAT", "QUOTESEARCH_LOG_FORMAT"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let from_env = env_keys.iter().find(|key| {
        env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false)
    });
    if let Some(env_key) = from_env {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first four characters so operators can tell keys apart.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if trimmed.chars().count() <= 8 {
        return "<redacted>".to_string();
    }
    let prefix: String = trimmed.chars().take(4).collect();
    format!("{prefix}***")
}
