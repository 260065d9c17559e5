//! `commerce` entry point.

use std::process::ExitCode;

use app::cli::Cli;
use app::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(err.exit_code());
        }
    };
    app::init_tracing(&config);

    match app::run(cli.command, &config).await {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, kind = %err.kind(), "Command failed");
            let body = serde_json::json!({ "error": err.to_string(), "kind": err.kind().as_str() });
            eprintln!("{body}");
            ExitCode::from(err.exit_code())
        }
    }
}
