pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "quotesearch",
    about = "Quote search operator CLI",
    long_about = "Inspect configuration, check upstream readiness, and run one-off quote searches.",
    after_help = "Examples:\n  quotesearch doctor --json\n  quotesearch config\n  quotesearch search --email jane@example.com"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and check that the quotes upstream answers")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run the configured retrieval strategy once and print matching quotes")]
    Search {
        #[arg(long, help = "Email address whose quotes should be returned")]
        email: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Search { email } => commands::search::run(&email),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
