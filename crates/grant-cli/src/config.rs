//! Configuration for the grants CLI
//!
//! CLI arguments and environment variable handling using clap.

use crate::commands::Command;
use clap::Parser;
use grant_sdk::{ApiConfig, SdkConfig};

/// grants - browse research grants, recipients and popular searches
#[derive(Parser, Debug, Clone)]
#[command(name = "grants")]
#[command(about = "Browse research grants from the command line")]
pub struct Args {
    /// Base URL of the grants API
    #[arg(long, env = "GRANTS_API_URL", default_value = "http://localhost:4000")]
    pub api_url: String,

    /// Bearer token sent with every request
    #[arg(long, env = "GRANTS_API_KEY")]
    pub api_key: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "GRANTS_TIMEOUT_MS", default_value = "10000")]
    pub timeout_ms: u64,

    /// Signed-in user; required for bookmarks
    #[arg(long, env = "GRANTS_USER_ID")]
    pub user_id: Option<i64>,

    /// Wait before retrying a transient conflict, in milliseconds
    #[arg(long, env = "GRANTS_RETRY_BACKOFF_MS", default_value = "500")]
    pub retry_backoff_ms: u64,

    /// Grants per search page
    #[arg(long, env = "GRANTS_PAGE_SIZE", default_value = "10")]
    pub page_size: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Build the SDK configuration from the parsed arguments
    pub fn sdk_config(&self) -> SdkConfig {
        SdkConfig {
            api: ApiConfig {
                base_url: self.api_url.clone(),
                api_key: self.api_key.clone(),
                timeout_ms: self.timeout_ms,
            },
            retry_backoff_ms: self.retry_backoff_ms,
            search_page_size: self.page_size,
            ..SdkConfig::for_interactive()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err("GRANTS_API_URL must start with http:// or https://".to_string());
        }
        if self.page_size == 0 {
            return Err("GRANTS_PAGE_SIZE must be positive".to_string());
        }
        if matches!(self.user_id, Some(id) if id <= 0) {
            return Err("GRANTS_USER_ID must be a positive id".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build_valid_config() {
        let args = Args::try_parse_from(["grants", "filters"]).unwrap();
        assert!(args.validate().is_ok());

        let config = args.sdk_config();
        assert_eq!(config.api.timeout_ms, 10_000);
        assert_eq!(config.search_page_size, 10);
        assert_eq!(config.recipients_page_size, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let args = Args::try_parse_from(["grants", "--api-url", "localhost:4000", "filters"]).unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from(["grants", "--user-id", "0", "filters"]).unwrap();
        assert!(args.validate().is_err());

        let args = Args::try_parse_from(["grants", "--page-size", "0", "filters"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_institutes_subcommand_pages() {
        let args = Args::try_parse_from(["grants", "institutes", "--pages", "3"]).unwrap();
        assert!(matches!(args.command, Command::Institutes { pages: 3 }));
        assert_eq!(args.sdk_config().institutes_page_size, 20);

        assert!(Args::try_parse_from(["grants", "institutes", "--pages", "0"]).is_err());
    }
}
