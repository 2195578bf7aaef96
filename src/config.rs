//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.reviewpulse.toml` files, environment variables and CLI flags.
//! Every recognized option and its default lives here.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".reviewpulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Store app identifiers.
    #[serde(default)]
    pub apps: AppsConfig,

    /// Lookback window.
    #[serde(default)]
    pub window: WindowConfig,

    /// Store feed settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Text-generation service settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Insight extraction settings.
    #[serde(default)]
    pub insights: InsightsConfig,

    /// Report generation settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Outbound mail settings.
    #[serde(default)]
    pub mail: MailConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// App identifiers per store. A missing identifier skips that store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppsConfig {
    /// Play Store package name, e.g. `com.example.app`.
    #[serde(default)]
    pub android_app_id: Option<String>,

    /// Numeric App Store identifier.
    #[serde(default)]
    pub ios_app_id: Option<String>,

    /// Two-letter store country code.
    #[serde(default = "default_country")]
    pub country: String,

    /// Review language (Play Store only).
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            android_app_id: None,
            ios_app_id: None,
            country: default_country(),
            language: default_language(),
        }
    }
}

fn default_country() -> String {
    "in".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Lookback window size in weeks.
    #[serde(default = "default_weeks")]
    pub weeks_to_analyze: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            weeks_to_analyze: default_weeks(),
        }
    }
}

fn default_weeks() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: u64,

    /// Maximum pages read per store.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Reviews requested per Play Store page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout(),
            max_pages: default_max_pages(),
            page_size: default_page_size(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_max_pages() -> usize {
    10
}

fn default_page_size() -> u32 {
    200
}

/// Which text-generation backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Google Gemini (hosted, needs an API key)
    #[default]
    Gemini,
    /// Ollama (local)
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// API key for hosted providers.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Gemini API base URL.
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            api_key: None,
            gemini_url: default_gemini_url(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_llm_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Upper bound on reported themes.
    #[serde(default = "default_max_themes")]
    pub max_themes: usize,

    /// Upper bound on reported quotes.
    #[serde(default = "default_max_quotes")]
    pub max_quotes: usize,

    /// Maximum characters of review text per request.
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Maximum theme-extraction requests per run.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Review text is truncated to this many characters.
    #[serde(default = "default_max_review_chars")]
    pub max_review_chars: usize,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            max_themes: default_max_themes(),
            max_quotes: default_max_quotes(),
            chunk_chars: default_chunk_chars(),
            max_chunks: default_max_chunks(),
            max_review_chars: default_max_review_chars(),
        }
    }
}

fn default_max_themes() -> usize {
    5
}

fn default_max_quotes() -> usize {
    3
}

fn default_chunk_chars() -> usize {
    12_000
}

fn default_max_chunks() -> usize {
    4
}

fn default_max_review_chars() -> usize {
    300
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Directory receiving the per-run files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Also write the report as JSON.
    #[serde(default)]
    pub json: bool,

    /// Also write a fixed-width print document.
    #[serde(default)]
    pub print_document: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            json: false,
            print_document: false,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Transactional mail endpoint.
    #[serde(default = "default_mail_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Sender address.
    #[serde(default)]
    pub sender: Option<String>,

    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Recipient addresses.
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: default_mail_api_url(),
            api_key: None,
            sender: None,
            sender_name: default_sender_name(),
            recipients: Vec::new(),
        }
    }
}

fn default_mail_api_url() -> String {
    "https://api.brevo.com/v3/smtp/email".to_string()
}

fn default_sender_name() -> String {
    "Review Insights".to_string()
}

impl MailConfig {
    /// Mail goes out only with a key, a sender and at least one recipient.
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some() && self.sender.is_some() && !self.recipients.is_empty()
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and the environment variables backing them) take
    /// precedence over config file settings, but only when provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref id) = args.android_app_id {
            self.apps.android_app_id = Some(id.clone());
        }
        if let Some(ref id) = args.ios_app_id {
            self.apps.ios_app_id = Some(id.clone());
        }
        if let Some(ref country) = args.country {
            self.apps.country = country.clone();
        }
        if let Some(ref language) = args.language {
            self.apps.language = language.clone();
        }
        if let Some(weeks) = args.weeks {
            self.window.weeks_to_analyze = weeks;
        }
        if let Some(max_themes) = args.max_themes {
            self.insights.max_themes = max_themes;
        }
        if let Some(timeout) = args.fetch_timeout {
            self.fetch.timeout_seconds = timeout;
        }

        if let Some(provider) = args.provider {
            self.llm.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.llm.model = model.clone();
        }
        if let Some(ref key) = args.gemini_api_key {
            self.llm.api_key = Some(key.clone());
        }
        if let Some(ref url) = args.ollama_url {
            self.llm.ollama_url = url.clone();
        }

        if let Some(ref dir) = args.output_dir {
            self.report.output_dir = dir.clone();
        }
        if args.json {
            self.report.json = true;
        }
        if args.print {
            self.report.print_document = true;
        }

        if let Some(ref url) = args.mail_api_url {
            self.mail.api_url = url.clone();
        }
        if let Some(ref key) = args.mail_api_key {
            self.mail.api_key = Some(key.clone());
        }
        if let Some(ref sender) = args.mail_from {
            self.mail.sender = Some(sender.clone());
        }
        if let Some(ref recipients) = args.mail_to {
            self.mail.recipients = recipients
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check the merged configuration before any network call.
    pub fn validate(&self) -> Result<()> {
        let android = self.apps.android_app_id.as_deref().unwrap_or("").trim();
        let ios = self.apps.ios_app_id.as_deref().unwrap_or("").trim();

        if android.is_empty() && ios.is_empty() {
            bail!("No app configured: set ANDROID_APP_ID and/or IOS_APP_ID");
        }

        if !ios.is_empty() && !ios.chars().all(|c| c.is_ascii_digit()) {
            bail!("IOS_APP_ID must be the numeric App Store identifier, got '{}'", ios);
        }

        if self.window.weeks_to_analyze == 0 {
            bail!("weeks_to_analyze must be at least 1");
        }

        if self.insights.max_themes == 0 {
            bail!("max_themes must be at least 1");
        }

        if self.insights.chunk_chars == 0 || self.insights.max_chunks == 0 {
            bail!("chunk_chars and max_chunks must be at least 1");
        }

        if self.llm.provider == LlmProvider::Gemini && self.llm.api_key.is_none() {
            bail!("GEMINI_API_KEY is required when the provider is gemini");
        }

        if !(0.0..=1.0).contains(&self.llm.temperature) {
            bail!("Temperature must be between 0.0 and 1.0");
        }

        Ok(())
    }

    /// Configured Android id, ignoring blanks.
    pub fn android_app_id(&self) -> Option<&str> {
        non_blank(self.apps.android_app_id.as_deref())
    }

    /// Configured iOS id, ignoring blanks.
    pub fn ios_app_id(&self) -> Option<&str> {
        non_blank(self.apps.ios_app_id.as_deref())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
