//! Command-line interface parsing for the POSTEASE client
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into a `ClientConfig` and the request values the client takes.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;

use crate::cache::CACHE_DIR_ENV;
use crate::client::{GetRequest, MailAction, MailRequest, ResponseShape};
use crate::config::{ClientConfig, API_KEY_ENV, ENDPOINT_ENV};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// A `--param` value is not of the form `name=value`
    #[error("Invalid param: '{0}'. Expected NAME=VALUE")]
    InvalidParam(String),

    /// A JSON-valued flag did not parse
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// POSTEASE client - fetch content and send mail through the POSTEASE API
#[derive(Parser, Debug)]
#[command(name = "postease")]
#[command(about = "Client for the POSTEASE content API")]
#[command(version)]
pub struct Cli {
    /// Base URL of the POSTEASE API
    #[arg(long, global = true, env = ENDPOINT_ENV)]
    pub endpoint: Option<String>,

    /// Root directory of the response cache
    #[arg(long, global = true, env = CACHE_DIR_ENV, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Do not read or write the response cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,

    /// Log debug output to stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a resource (posts, tags, ...)
    Get(GetArgs),
    /// Send a mail through the API
    SendMail(MailArgs),
    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Resource name
    pub resource: String,

    /// API key for the request
    #[arg(long, env = API_KEY_ENV)]
    pub key: Option<String>,

    /// Query param, repeatable. Comma-separate list values
    ///
    /// Examples:
    ///   postease get posts --param limit=10 --param tags=news,tech
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_param_arg)]
    pub params: Vec<(String, String)>,

    /// Decode the response as a document or as a list of records
    #[arg(long, value_enum, default_value_t = ResponseShape::Object)]
    pub shape: ResponseShape,
}

#[derive(Args, Debug)]
pub struct MailArgs {
    /// Store the submission as a contact entry before mailing
    #[arg(long)]
    pub contact: bool,

    /// Recipients (JSON)
    #[arg(long, value_name = "JSON", value_parser = parse_json_arg)]
    pub contact_target: Option<Value>,

    /// Submitted form values (JSON)
    #[arg(long, value_name = "JSON", value_parser = parse_json_arg)]
    pub contact_data: Option<Value>,

    /// Form item definitions (JSON)
    #[arg(long, value_name = "JSON", value_parser = parse_json_arg)]
    pub contact_items: Option<Value>,

    /// Mail settings (JSON)
    #[arg(long, value_name = "JSON", value_parser = parse_json_arg)]
    pub config_mail: Option<Value>,

    /// SMTP settings (JSON)
    #[arg(long, value_name = "JSON", value_parser = parse_json_arg)]
    pub config_smtp: Option<Value>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    /// Show the cache location, version and entry count
    Status,
    /// Delete every cached response
    Clear,
}

/// Parses a `name=value` argument. The value may be empty.
pub fn parse_param_arg(s: &str) -> Result<(String, String), CliError> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidParam(s.to_string())),
    }
}

/// Parses a JSON argument
pub fn parse_json_arg(s: &str) -> Result<Value, CliError> {
    Ok(serde_json::from_str(s)?)
}

impl Cli {
    /// Builds the client configuration from the environment, then applies
    /// global flags on top
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env().with_timeout(Duration::from_secs(self.timeout));
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        if let Some(dir) = &self.cache_dir {
            config = config.with_cache_dir(dir.clone());
        }
        if self.no_cache {
            config = config.without_cache();
        }
        config
    }
}

impl GetArgs {
    pub fn to_request(&self) -> GetRequest {
        let mut request = GetRequest::new(self.resource.clone()).with_shape(self.shape);
        if let Some(key) = &self.key {
            request = request.with_key(key.clone());
        }
        for (name, value) in &self.params {
            request = request.with_param(name.clone(), value.clone());
        }
        request
    }
}

impl MailArgs {
    pub fn action(&self) -> MailAction {
        if self.contact {
            MailAction::PostContactSendMail
        } else {
            MailAction::SendMail
        }
    }

    pub fn to_mail_request(&self) -> MailRequest {
        let mut mail = MailRequest::new();
        if let Some(value) = &self.contact_target {
            mail = mail.with_contact_target(value.clone());
        }
        if let Some(value) = &self.contact_data {
            mail = mail.with_contact_data(value.clone());
        }
        if let Some(value) = &self.contact_items {
            mail = mail.with_contact_items(value.clone());
        }
        if let Some(value) = &self.config_mail {
            mail = mail.with_config_mail(value.clone());
        }
        if let Some(value) = &self.config_smtp {
            mail = mail.with_config_smtp(value.clone());
        }
        mail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param_arg() {
        assert_eq!(
            parse_param_arg("limit=10").unwrap(),
            ("limit".to_string(), "10".to_string())
        );
        assert_eq!(
            parse_param_arg("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_param_arg("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
    }

    #[test]
    fn test_parse_param_arg_invalid() {
        let err = parse_param_arg("novalue").unwrap_err();
        assert!(err.to_string().contains("Invalid param"));
        assert!(parse_param_arg("=x").is_err());
    }

    #[test]
    fn test_parse_json_arg() {
        assert_eq!(parse_json_arg(r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert!(parse_json_arg("{oops").is_err());
    }

    #[test]
    fn test_cli_parse_get() {
        let cli = Cli::parse_from([
            "postease",
            "--endpoint",
            "http://localhost/api",
            "get",
            "posts",
            "--key",
            "k",
            "--param",
            "limit=5",
            "--param",
            "tags=a, b",
            "--shape",
            "array",
        ]);

        let Command::Get(args) = &cli.command else {
            panic!("expected get command");
        };
        let request = args.to_request();

        assert_eq!(request.resource(), Some("posts"));
        assert_eq!(request.api_key(), Some("k"));
        assert_eq!(request.shape(), ResponseShape::Array);
        assert_eq!(
            request.signature().canonical(),
            "?ssr=1&resource=posts&key=k&params[limit]=5&params[tags]=a,b"
        );
    }

    #[test]
    fn test_client_config_from_flags() {
        let cli = Cli::parse_from([
            "postease",
            "--endpoint",
            "http://localhost/api",
            "--cache-dir",
            "/tmp/pe-cache",
            "--timeout",
            "5",
            "cache",
            "status",
        ]);

        let config = cli.client_config();

        assert_eq!(config.endpoint.as_deref(), Some("http://localhost/api"));
        assert_eq!(
            config.cache.map(|c| c.root().to_path_buf()),
            Some(PathBuf::from("/tmp/pe-cache"))
        );
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(matches!(
            cli.command,
            Command::Cache {
                action: CacheAction::Status
            }
        ));
    }

    #[test]
    fn test_no_cache_flag() {
        let cli = Cli::parse_from(["postease", "--no-cache", "get", "tags"]);
        assert!(cli.client_config().cache.is_none());
    }

    #[test]
    fn test_send_mail_args() {
        let cli = Cli::parse_from([
            "postease",
            "send-mail",
            "--contact",
            "--contact-data",
            r#"{"name":"Ann"}"#,
        ]);

        let Command::SendMail(args) = &cli.command else {
            panic!("expected send-mail command");
        };

        assert_eq!(args.action(), MailAction::PostContactSendMail);
        let fields = args.to_mail_request().form_fields(args.action());
        assert!(fields.contains(&("contact_data[name]".to_string(), "Ann".to_string())));
    }

    #[test]
    fn test_cli_rejects_bad_param() {
        let result = Cli::try_parse_from(["postease", "get", "posts", "--param", "oops"]);
        assert!(result.is_err());
    }
}
