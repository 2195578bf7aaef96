//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap. Every flag is
//! optional and most are backed by an environment variable, so a bare
//! `reviewpulse` invocation runs the whole pipeline from `.env` /
//! `.reviewpulse.toml` settings.

use crate::config::LlmProvider;
use clap::Parser;
use std::path::PathBuf;

/// ReviewPulse - weekly app-store review insights
///
/// Fetches recent Play Store and App Store reviews, summarizes them with
/// an LLM, writes a report and emails it.
///
/// Examples:
///   reviewpulse
///   reviewpulse --android-app-id com.example.app --ios-app-id 123456789
///   reviewpulse --weeks 4 --max-themes 3 --no-email
///   reviewpulse --dry-run
///   reviewpulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Play Store package identifier
    #[arg(long, value_name = "PACKAGE", env = "ANDROID_APP_ID")]
    pub android_app_id: Option<String>,

    /// Numeric App Store identifier
    #[arg(long, value_name = "ID", env = "IOS_APP_ID")]
    pub ios_app_id: Option<String>,

    /// Store country code
    #[arg(long, value_name = "CC", env = "STORE_COUNTRY")]
    pub country: Option<String>,

    /// Review language (Play Store only)
    #[arg(long, value_name = "LANG", env = "STORE_LANGUAGE")]
    pub language: Option<String>,

    /// Lookback window in weeks
    #[arg(long, value_name = "WEEKS", env = "WEEKS_TO_ANALYZE")]
    pub weeks: Option<u32>,

    /// Maximum number of themes in the report
    #[arg(long, value_name = "COUNT", env = "MAX_THEMES")]
    pub max_themes: Option<usize>,

    /// Store feed request timeout in seconds
    #[arg(long, value_name = "SECS", env = "FETCH_TIMEOUT")]
    pub fetch_timeout: Option<u64>,

    /// Text-generation provider
    #[arg(long, value_name = "PROVIDER", env = "LLM_PROVIDER")]
    pub provider: Option<LlmProvider>,

    /// Model name for the provider
    #[arg(long, value_name = "MODEL", env = "LLM_MODEL")]
    pub model: Option<String>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Directory for CSV and report files
    #[arg(short, long, value_name = "DIR", env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also write the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write a fixed-width print document
    #[arg(long)]
    pub print: bool,

    /// Transactional mail endpoint
    #[arg(long, value_name = "URL", env = "MAIL_API_URL")]
    pub mail_api_url: Option<String>,

    /// Transactional mail API key
    #[arg(long, env = "MAIL_API_KEY", hide_env_values = true)]
    pub mail_api_key: Option<String>,

    /// Sender address
    #[arg(long, value_name = "EMAIL", env = "MAIL_FROM")]
    pub mail_from: Option<String>,

    /// Recipient addresses (comma-separated)
    #[arg(long, value_name = "EMAILS", env = "MAIL_TO", value_delimiter = ',')]
    pub mail_to: Option<Vec<String>>,

    /// Skip sending the email
    #[arg(long)]
    pub no_email: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .reviewpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: fetch and aggregate reviews without calling the LLM
    ///
    /// Prints review totals and exits. No files are written.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .reviewpulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.fetch_timeout {
            if timeout == 0 {
                return Err("Fetch timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
