//! ReviewPulse - weekly app-store review insights
//!
//! A batch CLI that fetches recent Play Store and App Store reviews,
//! summarizes them with an LLM, writes a report and emails it.
//!
//! Exit codes:
//!   0 - Report produced (even if one store or the mail delivery failed)
//!   1 - Configuration error, no reviews from any store, or report write failure

mod analysis;
mod artifacts;
mod cli;
mod config;
mod error;
mod fetch;
mod insights;
mod mailer;
mod models;
mod pipeline;
mod report;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use fetch::{AppStoreFeed, PlayStoreFeed, ReviewFeed};
use mailer::{BrevoMailer, Mailer};
use models::Sentiment;
use pipeline::{Feeds, MailOutcome};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets usually come from a local .env file
    dotenvy::dotenv().ok();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("ReviewPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .reviewpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Secrets (GEMINI_API_KEY, MAIL_API_KEY) belong in .env, not in this file.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the configured pipeline. Returns the process exit code.
async fn run_report(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    let today = Local::now().date_naive();
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("reviewpulse/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(config.fetch.timeout_seconds))
        .build()
        .context("Failed to create HTTP client")?;

    let play_store = config.android_app_id().map(|id| {
        PlayStoreFeed::new(
            http_client.clone(),
            id,
            &config.apps.language,
            &config.apps.country,
            config.fetch.page_size,
            config.fetch.timeout_seconds,
        )
    });
    let app_store = config.ios_app_id().map(|id| {
        AppStoreFeed::new(
            http_client.clone(),
            id,
            &config.apps.country,
            config.fetch.timeout_seconds,
        )
    });
    let feeds = Feeds {
        android: play_store.as_ref().map(|f| f as &dyn ReviewFeed),
        ios: app_store.as_ref().map(|f| f as &dyn ReviewFeed),
    };

    println!("📥 Fetching reviews ({} weeks)...", config.window.weeks_to_analyze);
    if let Some(id) = config.android_app_id() {
        println!("   Play Store: {}", id);
    }
    if let Some(id) = config.ios_app_id() {
        println!("   App Store: {}", id);
    }

    if args.dry_run {
        return handle_dry_run(&config, feeds, today).await;
    }

    let service = insights::build_service(&config.llm)?;
    println!("🤖 Model: {}", service.model_name());

    let mailer = if args.no_email {
        info!("Mail disabled by --no-email");
        None
    } else {
        let mailer = BrevoMailer::from_config(&config.mail, http_client.clone());
        if mailer.is_none() {
            info!("Mail not configured (needs MAIL_API_KEY, MAIL_FROM and MAIL_TO), skipping");
        }
        mailer
    };

    let show_progress = !args.quiet;
    let outcome = match pipeline::run(
        &config,
        feeds,
        service,
        mailer.as_ref().map(|m| m as &dyn Mailer),
        today,
        Utc::now(),
        show_progress,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{}", e);
            eprintln!("\n❌ Error: {}", e);
            return Ok(1);
        }
    };

    let report = &outcome.report;
    let totals = &report.totals;

    println!("\n📊 Review Summary ({}):", report.period);
    println!(
        "   Reviews: {} (Android {} | iOS {})",
        totals.review_count, totals.by_platform.android, totals.by_platform.ios
    );
    println!("   Average rating: {:.2}/5", totals.average_rating);
    println!(
        "   😊 {:.1}% | 😐 {:.1}% | 😞 {:.1}%",
        totals.sentiment.percent(Sentiment::Positive),
        totals.sentiment.percent(Sentiment::Neutral),
        totals.sentiment.percent(Sentiment::Negative)
    );
    println!(
        "   Themes: {} | Quotes: {} | Recommendations: {}",
        report.themes.items.len(),
        report.quotes.items.len(),
        report.recommendations.items.len()
    );
    for source in pipeline::unavailable_sources(&outcome.meta) {
        println!("   ⚠️  {}: {}", source.platform, source.status);
    }
    println!("   Duration: {:.1}s", outcome.meta.duration_seconds);

    if let Some(ref csv) = outcome.artifacts.reviews_csv {
        println!("\n📄 Reviews saved to: {}", csv.display());
    }
    for document in &outcome.artifacts.documents {
        println!("📄 Report saved to: {}", document.display());
    }

    match outcome.mail {
        MailOutcome::Sent => println!("📧 Report emailed to {}", config.mail.recipients.join(", ")),
        MailOutcome::Skipped => {}
        MailOutcome::Failed(reason) => {
            warn!("Report was not emailed: {}", reason);
            println!("⚠️  Email not sent: {}", reason);
        }
    }

    println!("\n✅ Report complete!");
    Ok(0)
}

/// Handle --dry-run: fetch and aggregate, print totals, exit.
async fn handle_dry_run(config: &Config, feeds: Feeds<'_>, today: chrono::NaiveDate) -> Result<i32> {
    println!("\n🔍 Dry run: fetching reviews only (no LLM call, no files)...\n");

    let collected = match pipeline::collect(config, feeds, today).await {
        Ok(collected) => collected,
        Err(e) => {
            eprintln!("\n❌ Error: {}", e);
            return Ok(1);
        }
    };

    for source in &collected.sources {
        println!("   {}: {}", source.platform, source.status);
    }

    let totals = &collected.totals;
    println!("\n   Window: {}", collected.window.period());
    println!("   Reviews in window: {}", totals.review_count);
    if !totals.no_data {
        println!("   Average rating: {:.2}/5", totals.average_rating);
        for (stars, count) in totals.rating_distribution.iter().enumerate().rev() {
            println!("     {}★ {}", stars + 1, count);
        }
    }

    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
