//! POSTEASE CLI - fetch content and send mail through the POSTEASE API
//!
//! Prints decoded JSON on stdout. Failures print the structured error
//! payload and exit with status 1.

use std::process::ExitCode;

use clap::Parser;
use serde_json::{json, Value};
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use postease::cache::{CacheStore, StorageError};
use postease::cli::{CacheAction, Cli, Command};
use postease::error::{ClientError, RequestContext};
use postease::PostEaseClient;

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(Level::WARN.into())
            .from_env_lossy()
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

/// Reports the cache directory without contacting the server
fn cache_status(store: &CacheStore) -> Result<Value, StorageError> {
    let version = store.read_local_version()?;
    let entries = store.entry_count()?;
    Ok(json!({
        "root": store.config().root().display().to_string(),
        "version": version.as_ref().map(|v| v.as_str()),
        "version_time": version
            .as_ref()
            .and_then(|v| v.as_datetime())
            .map(|dt| dt.to_rfc3339()),
        "entries": entries,
    }))
}

fn run(cli: &Cli) -> Result<Value, ClientError> {
    let config = cli.client_config();

    match &cli.command {
        Command::Get(args) => {
            let mut client = PostEaseClient::new(config)?;
            let payload = client.get(&args.to_request())?;
            Ok(payload.into_value())
        }
        Command::SendMail(args) => {
            // Mail never uses the cache; skip the version handshake
            let client = PostEaseClient::new(config.without_cache())?;
            let payload = client.send(args.action(), &args.to_mail_request())?;
            Ok(payload.into_value())
        }
        Command::Cache { action } => {
            let Some(cache_config) = config.cache else {
                return Err(ClientError::InvalidRequest {
                    context: RequestContext::get(""),
                    message: "Cache disabled".to_string(),
                });
            };
            let store = CacheStore::new(cache_config);
            match action {
                CacheAction::Status => Ok(cache_status(&store)?),
                CacheAction::Clear => {
                    let removed = store.clear_all_entries()?;
                    Ok(json!({ "removed": removed }))
                }
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "request failed");
            let response = serde_json::to_string_pretty(&e.to_response()).unwrap_or_default();
            println!("{}", response);
            ExitCode::FAILURE
        }
    }
}
