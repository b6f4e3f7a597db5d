use quotesearch_core::config::{AppConfig, LoadOptions};
use quotesearch_core::{is_valid_email, FailureKind};
use quotesearch_server::upstream::build_strategy;
use serde_json::json;

use crate::commands::{
    current_thread_runtime, CommandResult, EXIT_CONFIG, EXIT_INVALID_INPUT, EXIT_UNREACHABLE,
    EXIT_UPSTREAM_PROTOCOL,
};

const COMMAND: &str = "search";

pub fn run(email: &str) -> CommandResult {
    if !is_valid_email(email) {
        return CommandResult::failure(
            COMMAND,
            "invalid_email",
            format!("`{email}` is not a valid email address"),
            EXIT_INVALID_INPUT,
        );
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let strategy = match build_strategy(&config.upstream) {
        Ok(strategy) => strategy,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "http_client",
                format!("failed to build upstream client: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                EXIT_CONFIG,
            )
        }
    };

    match runtime.block_on(strategy.fetch_all_matching(email)) {
        Ok(matches) => CommandResult::success(
            COMMAND,
            format!(
                "{} matching quote(s) via {} strategy ({} page request(s))",
                matches.records.len(),
                strategy.name(),
                matches.pages_fetched
            ),
            Some(json!({ "Data": matches.records })),
        ),
        Err(error) => {
            let (error_class, exit_code) = match error.kind() {
                FailureKind::Unreachable => ("unreachable", EXIT_UNREACHABLE),
                FailureKind::UpstreamProtocolError => {
                    ("upstream_protocol_error", EXIT_UPSTREAM_PROTOCOL)
                }
            };
            CommandResult::failure(COMMAND, error_class, error.to_string(), exit_code)
        }
    }
}
