//! Insight extraction.
//!
//! Turns the review window into themes, quotes, recommendations and
//! executive highlights by prompting a [`TextService`]. Each field is
//! validated on its own; a bad response degrades that field only.

pub mod client;
pub mod prompts;
pub mod schema;

pub use client::{build_service, TextService};

use crate::analysis::compute_totals;
use crate::config::InsightsConfig;
use crate::error::SchemaViolation;
use crate::models::{Extracted, Quote, Recommendation, Review, Theme, Totals};
use indicatif::{ProgressBar, ProgressStyle};
use prompts::ReviewChunk;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything the model contributes to a report.
#[derive(Debug, Clone, PartialEq)]
pub struct Insights {
    pub themes: Extracted<Theme>,
    pub quotes: Extracted<Quote>,
    pub recommendations: Extracted<Recommendation>,
    pub highlights: Extracted<String>,
}

impl Insights {
    /// Result for an empty window: populated, with nothing in it.
    pub fn empty() -> Self {
        Self {
            themes: Extracted::populated(Vec::new()),
            quotes: Extracted::populated(Vec::new()),
            recommendations: Extracted::populated(Vec::new()),
            highlights: Extracted::populated(Vec::new()),
        }
    }
}

pub struct InsightExtractor {
    service: Arc<dyn TextService>,
    settings: InsightsConfig,
    show_progress: bool,
}

impl InsightExtractor {
    pub fn new(service: Arc<dyn TextService>, settings: InsightsConfig, show_progress: bool) -> Self {
        Self {
            service,
            settings,
            show_progress,
        }
    }

    /// Run theme, quote and recommendation requests over `reviews`.
    pub async fn extract(&self, reviews: &[Review], max_themes: usize) -> Insights {
        if reviews.is_empty() {
            info!("No reviews in window, skipping insight extraction");
            return Insights::empty();
        }

        let chunks = prompts::chunk_reviews(
            reviews,
            self.settings.chunk_chars,
            self.settings.max_chunks,
            self.settings.max_review_chars,
        );
        let Some(first_chunk) = chunks.first() else {
            warn!("Insight stage: chunk limit is zero, nothing to analyze");
            return Insights::empty();
        };
        let sent: usize = chunks.iter().map(|c| c.review_count).sum();
        if sent < reviews.len() {
            info!(
                "Sending {} of {} reviews in {} chunks (chunk cap reached)",
                sent,
                reviews.len(),
                chunks.len()
            );
        } else {
            debug!("Sending {} reviews in {} chunks", sent, chunks.len());
        }

        let totals = compute_totals(reviews);
        let spinner = self.spinner();

        spinner.set_message("Extracting themes...");
        let themes = self.extract_themes(&chunks, max_themes).await;

        spinner.set_message("Selecting quotes...");
        let theme_names: Vec<String> = themes.items.iter().map(|t| t.name.clone()).collect();
        let quotes = self.select_quotes(first_chunk, &theme_names, reviews).await;

        spinner.set_message("Drafting recommendations...");
        let (recommendations, highlights) = self
            .recommend(&themes.items, &totals, first_chunk)
            .await;

        spinner.finish_and_clear();

        Insights {
            themes,
            quotes,
            recommendations,
            highlights,
        }
    }

    fn spinner(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    async fn extract_themes(&self, chunks: &[ReviewChunk], max_themes: usize) -> Extracted<Theme> {
        let mut results = Vec::with_capacity(chunks.len());
        let mut last_error: Option<SchemaViolation> = None;

        for (i, chunk) in chunks.iter().enumerate() {
            let prompt = prompts::theme_prompt(chunk, max_themes);
            let parsed = match self.service.generate(prompts::SYSTEM_PROMPT, &prompt).await {
                Ok(text) => schema::parse_themes(&text),
                Err(e) => Err(SchemaViolation::from(e)),
            };

            match parsed {
                Ok(themes) => {
                    debug!("Chunk {}/{}: {} themes", i + 1, chunks.len(), themes.len());
                    results.push((themes, chunk.review_count));
                }
                Err(e) => {
                    warn!(
                        "Insight stage: themes chunk {}/{} rejected: {}",
                        i + 1,
                        chunks.len(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        if results.is_empty() {
            let reason = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no chunks to analyze".to_string());
            warn!("Insight stage: themes degraded: {}", reason);
            return Extracted::degraded(reason);
        }

        let merged = merge_chunk_themes(results);
        let themes = limit_themes(merged, max_themes);
        if themes.len() < max_themes {
            debug!(
                "Model returned {} themes, fewer than the {} requested",
                themes.len(),
                max_themes
            );
        }
        Extracted::populated(themes)
    }

    async fn select_quotes(
        &self,
        chunk: &ReviewChunk,
        theme_names: &[String],
        reviews: &[Review],
    ) -> Extracted<Quote> {
        let prompt = prompts::quote_prompt(chunk, theme_names, self.settings.max_quotes);
        let parsed = match self.service.generate(prompts::SYSTEM_PROMPT, &prompt).await {
            Ok(text) => schema::parse_quotes(&text, reviews, self.settings.max_quotes),
            Err(e) => Err(SchemaViolation::from(e)),
        };

        match parsed {
            Ok(quotes) => Extracted::populated(quotes),
            Err(e) => {
                warn!("Insight stage: quotes degraded: {}", e);
                Extracted::degraded(e.to_string())
            }
        }
    }

    async fn recommend(
        &self,
        themes: &[Theme],
        totals: &Totals,
        fallback: &ReviewChunk,
    ) -> (Extracted<Recommendation>, Extracted<String>) {
        let prompt = prompts::recommendation_prompt(themes, totals, Some(fallback));
        let response = match self.service.generate(prompts::SYSTEM_PROMPT, &prompt).await {
            Ok(text) => schema::parse_recommendation_response(&text),
            Err(e) => {
                let e = SchemaViolation::from(e);
                schema::RecommendationResponse {
                    recommendations: Err(e.clone()),
                    highlights: Err(e),
                }
            }
        };

        let recommendations = match response.recommendations {
            Ok(recs) => Extracted::populated(recs),
            Err(e) => {
                warn!("Insight stage: recommendations degraded: {}", e);
                Extracted::degraded(e.to_string())
            }
        };
        let highlights = match response.highlights {
            Ok(bullets) => Extracted::populated(bullets),
            Err(e) => {
                warn!("Insight stage: highlights degraded: {}", e);
                Extracted::degraded(e.to_string())
            }
        };

        (recommendations, highlights)
    }
}

/// Merge per-chunk themes by case-insensitive name.
///
/// Shares are weighted by each chunk's review count over all chunks that
/// answered; a theme absent from a chunk counts as zero there.
pub fn merge_chunk_themes(results: Vec<(Vec<Theme>, usize)>) -> Vec<Theme> {
    let total: usize = results.iter().map(|(_, count)| count).sum();
    if results.len() == 1 {
        return results.into_iter().next().map(|(t, _)| t).unwrap_or_default();
    }

    let mut merged: Vec<Theme> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (themes, count) in results {
        let weight = if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        };

        for theme in themes {
            let key = theme.name.to_lowercase();
            match index.get(&key).copied() {
                Some(i) => {
                    let existing = &mut merged[i];
                    existing.share += theme.share * weight;
                    existing.severity = existing.severity.max(theme.severity);
                    existing.business_risk.extend(theme.business_risk);
                    if existing.description.is_empty() {
                        existing.description = theme.description;
                    }
                }
                None => {
                    index.insert(key, merged.len());
                    merged.push(Theme {
                        share: theme.share * weight,
                        ..theme
                    });
                }
            }
        }
    }

    for theme in &mut merged {
        theme.share = theme.share.clamp(0.0, 1.0);
    }
    merged
}

/// Keep the `max_themes` strongest themes: share desc, then severity
/// desc, then name.
pub fn limit_themes(mut themes: Vec<Theme>, max_themes: usize) -> Vec<Theme> {
    if themes.len() > max_themes {
        debug!(
            "Dropping {} themes beyond the limit of {}",
            themes.len() - max_themes,
            max_themes
        );
        crate::report::assembler::rank_themes(&mut themes);
        themes.truncate(max_themes);
    }
    themes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldStatus, Platform, Severity};
    use crate::testing::{day, review, theme, ScriptedService};

    fn window() -> Vec<Review> {
        vec![
            review(Platform::Android, 1, "App crashes every time I log in", day(2)),
            review(Platform::Ios, 5, "Great app for beginners", day(3)),
            review(Platform::Android, 3, "Withdrawals take a week", day(4)),
        ]
    }

    const THEMES: &str = r#"{"themes": [
        {"name": "Login Crashes", "share": 0.4, "severity": "High", "business_risk": ["Trust"], "description": "Crash on login"},
        {"name": "Slow Withdrawals", "share": 0.3, "severity": "Medium", "business_risk": "Revenue"}
    ]}"#;
    const QUOTES: &str = r#"[{"quote": "App crashes every time I log in", "theme": "Login Crashes"}]"#;
    const RECS: &str = r#"{"summary": ["Crashes dominate"], "recommendations": [
        {"priority": "P1", "text": "Speed up withdrawals", "impact": "Less churn"},
        {"priority": "P0", "text": "Fix login crash", "impact": "Restores trust"}
    ]}"#;

    fn settings() -> InsightsConfig {
        InsightsConfig::default()
    }

    #[tokio::test]
    async fn test_extract_happy_path() {
        let service = Arc::new(
            ScriptedService::new()
                .with_themes(THEMES)
                .with_quotes(QUOTES)
                .with_recommendations(RECS),
        );
        let extractor = InsightExtractor::new(service.clone(), settings(), false);

        let insights = extractor.extract(&window(), 5).await;

        assert_eq!(insights.themes.status, FieldStatus::Populated);
        assert_eq!(insights.themes.items.len(), 2);
        assert_eq!(insights.quotes.items.len(), 1);
        assert_eq!(insights.recommendations.items.len(), 2);
        assert_eq!(insights.highlights.items, vec!["Crashes dominate".to_string()]);
        assert_eq!(service.requests(), 3);
    }

    #[tokio::test]
    async fn test_empty_window_makes_no_requests() {
        let service = Arc::new(ScriptedService::new());
        let extractor = InsightExtractor::new(service.clone(), settings(), false);

        let insights = extractor.extract(&[], 5).await;
        assert_eq!(insights, Insights::empty());
        assert_eq!(service.requests(), 0);
    }

    #[tokio::test]
    async fn test_bad_themes_degrade_only_themes() {
        let service = Arc::new(
            ScriptedService::new()
                .with_themes(r#"[{"name": "Login", "share": "most", "severity": "High"}]"#)
                .with_quotes(QUOTES)
                .with_recommendations(RECS),
        );
        let extractor = InsightExtractor::new(service.clone(), settings(), false);

        let insights = extractor.extract(&window(), 5).await;

        assert!(insights.themes.is_degraded());
        assert!(insights.themes.items.is_empty());
        assert!(insights
            .themes
            .degraded_reason()
            .unwrap()
            .contains("share is not numeric"));
        assert!(!insights.quotes.is_degraded());
        assert!(!insights.recommendations.is_degraded());

        // Quote prompt falls back to unconditioned selection.
        let prompts = service.prompts();
        assert!(prompts[1].contains("overall user sentiment"));
    }

    #[tokio::test]
    async fn test_service_failure_degrades_every_field() {
        let service = Arc::new(ScriptedService::new());
        let extractor = InsightExtractor::new(service, settings(), false);

        let insights = extractor.extract(&window(), 5).await;
        assert!(insights.themes.is_degraded());
        assert!(insights.quotes.is_degraded());
        assert!(insights.recommendations.is_degraded());
        assert!(insights.highlights.is_degraded());
    }

    #[tokio::test]
    async fn test_too_many_themes_keeps_highest_shares() {
        let service = Arc::new(
            ScriptedService::new()
                .with_themes(
                    r#"[{"name": "A", "share": 0.1, "severity": "Low"},
                        {"name": "B", "share": 0.5, "severity": "Low"},
                        {"name": "C", "share": 0.3, "severity": "Low"},
                        {"name": "D", "share": 0.2, "severity": "Low"}]"#,
                )
                .with_quotes("[]")
                .with_recommendations(RECS),
        );
        let extractor = InsightExtractor::new(service, settings(), false);

        let insights = extractor.extract(&window(), 2).await;
        let names: Vec<&str> = insights.themes.items.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(insights.quotes.status, FieldStatus::Populated);
    }

    #[tokio::test]
    async fn test_one_failed_chunk_is_skipped() {
        let mut config = settings();
        config.chunk_chars = 60;
        let service = Arc::new(
            ScriptedService::new()
                .with_themes("not json at all")
                .with_themes(THEMES)
                .with_themes(THEMES)
                .with_quotes(QUOTES)
                .with_recommendations(RECS),
        );
        let extractor = InsightExtractor::new(service.clone(), config, false);

        let insights = extractor.extract(&window(), 5).await;
        assert!(!insights.themes.is_degraded());
        assert_eq!(insights.themes.items.len(), 2);
        assert_eq!(service.requests(), 5);
    }

    #[test]
    fn test_merge_weights_by_chunk_size() {
        let first = vec![
            theme("Login", 0.5, Severity::Medium),
            theme("Fees", 0.2, Severity::Low),
        ];
        let mut second_login = theme("login", 0.1, Severity::High);
        second_login.description = "later".to_string();
        let second = vec![second_login];

        let merged = merge_chunk_themes(vec![(first, 30), (second, 10)]);
        assert_eq!(merged.len(), 2);

        let login = &merged[0];
        assert_eq!(login.name, "Login");
        assert!((login.share - (0.5 * 0.75 + 0.1 * 0.25)).abs() < 1e-9);
        assert_eq!(login.severity, Severity::High);
        assert_eq!(login.description, "later");

        let fees = &merged[1];
        assert!((fees.share - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_limit_themes_tie_breaks() {
        let themes = vec![
            theme("Zeta", 0.2, Severity::Low),
            theme("Alpha", 0.2, Severity::Low),
            theme("Mid", 0.2, Severity::High),
            theme("Top", 0.6, Severity::Low),
        ];
        let limited = limit_themes(themes, 3);
        let names: Vec<&str> = limited.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Top", "Mid", "Alpha"]);
    }
}
