//! One end-to-end report run.
//!
//! Fetch both platforms concurrently, aggregate, extract insights, assemble,
//! write artifacts and mail. Only a run with no fetched platform, an
//! assembly error or an artifact write failure is fatal.

use crate::analysis::{aggregate, LookbackWindow};
use crate::artifacts::{write_documents, write_reviews_csv, WrittenArtifacts};
use crate::config::Config;
use crate::error::PipelineError;
use crate::fetch::{fetch_platform, ReviewFeed};
use crate::insights::{InsightExtractor, TextService};
use crate::mailer::{email_subject, MailMessage, Mailer};
use crate::models::{
    Platform, PlatformSource, Report, ReviewWindow, RunMetadata, SourceStatus, Totals,
};
use crate::report::{assemble, generate_email_html};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Store feeds for one run; `None` marks an unconfigured platform.
#[derive(Clone, Copy, Default)]
pub struct Feeds<'a> {
    pub android: Option<&'a dyn ReviewFeed>,
    pub ios: Option<&'a dyn ReviewFeed>,
}

/// Windowed reviews and their totals, before any model call.
#[derive(Debug, Clone)]
pub struct Collected {
    pub window: ReviewWindow,
    pub totals: Totals,
    pub sources: Vec<PlatformSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailOutcome {
    Sent,
    Skipped,
    Failed(String),
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub report: Report,
    pub meta: RunMetadata,
    pub artifacts: WrittenArtifacts,
    pub mail: MailOutcome,
}

/// Fetch every configured platform and aggregate the lookback window.
pub async fn collect(
    config: &Config,
    feeds: Feeds<'_>,
    today: NaiveDate,
) -> Result<Collected, PipelineError> {
    let lookback = LookbackWindow::ending(today, config.window.weeks_to_analyze);
    let max_pages = config.fetch.max_pages;

    info!("Fetching reviews from {} to {}", lookback.start, lookback.end);
    let ((android_reviews, android), (ios_reviews, ios)) = tokio::join!(
        fetch_platform(
            feeds.android,
            Platform::Android,
            config.android_app_id(),
            lookback.start,
            today,
            max_pages,
        ),
        fetch_platform(
            feeds.ios,
            Platform::Ios,
            config.ios_app_id(),
            lookback.start,
            today,
            max_pages,
        ),
    );

    let sources = vec![android, ios];
    if !sources.iter().any(|s| s.status.is_fetched()) {
        let reasons = sources
            .iter()
            .map(|s| format!("{} {}", s.platform, s.status))
            .collect::<Vec<_>>()
            .join("; ");
        error!("Fetch stage: no platform returned reviews ({})", reasons);
        return Err(PipelineError::TotalDataLoss(reasons));
    }

    let mut reviews = android_reviews;
    reviews.extend(ios_reviews);

    let (window, totals) = aggregate(reviews, lookback.start, lookback.end);
    info!(
        "Aggregated {} reviews, average rating {:.2}",
        totals.review_count, totals.average_rating
    );

    Ok(Collected {
        window,
        totals,
        sources,
    })
}

/// Run the full pipeline.
pub async fn run(
    config: &Config,
    feeds: Feeds<'_>,
    service: Arc<dyn TextService>,
    mailer: Option<&dyn Mailer>,
    today: NaiveDate,
    generated_at: DateTime<Utc>,
    show_progress: bool,
) -> Result<RunOutcome, PipelineError> {
    let started = Instant::now();

    let collected = collect(config, feeds, today).await?;
    let model_used = service.model_name().to_string();

    let extractor = InsightExtractor::new(service, config.insights.clone(), show_progress);
    let insights = extractor
        .extract(&collected.window.reviews, config.insights.max_themes)
        .await;

    let report = assemble(
        collected.totals,
        insights.themes,
        insights.quotes,
        insights.recommendations,
        collected.window.period(),
    )?
    .with_highlights(insights.highlights);

    let meta = RunMetadata {
        generated_at,
        model_used,
        sources: collected.sources,
        duration_seconds: started.elapsed().as_secs_f64(),
    };

    let output_dir = &config.report.output_dir;
    let reviews_csv = write_reviews_csv(output_dir, &collected.window.reviews, generated_at)?;
    let documents = write_documents(&config.report, &report, &meta)?;

    let mail = match mailer {
        Some(mailer) => {
            let message = MailMessage {
                subject: email_subject(&report),
                html: generate_email_html(&report, &meta),
                attachments: documents.clone(),
            };
            match mailer.send(&message).await {
                Ok(()) => MailOutcome::Sent,
                Err(e) => {
                    warn!("Mail stage: delivery failed: {}", e);
                    MailOutcome::Failed(e.to_string())
                }
            }
        }
        None => {
            info!("Mail stage: no mailer configured, skipping delivery");
            MailOutcome::Skipped
        }
    };

    Ok(RunOutcome {
        report,
        meta,
        artifacts: WrittenArtifacts {
            reviews_csv: Some(reviews_csv),
            documents,
        },
        mail,
    })
}

/// Platforms that could not be fetched, for the run summary.
pub fn unavailable_sources(meta: &RunMetadata) -> Vec<&PlatformSource> {
    meta.sources
        .iter()
        .filter(|s| matches!(s.status, SourceStatus::Unavailable { .. }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailError;
    use crate::models::Review;
    use crate::testing::{day, review, ScriptedFeed, ScriptedService};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    const THEMES: &str = r#"{"themes": [
        {"name": "Login Crashes", "share": 0.4, "severity": "High", "business_risk": ["Trust"]},
        {"name": "Fees", "share": 0.2, "severity": "Medium", "business_risk": "Revenue"}
    ]}"#;
    const QUOTES: &str = r#"[{"quote": "review number 7", "theme": "Login Crashes"}]"#;
    const RECS: &str = r#"{"summary": ["Crashes dominate"], "recommendations": [
        {"priority": "P2", "text": "Explain fees", "impact": "Fewer tickets"},
        {"priority": "P0", "text": "Fix login crash", "impact": "Restores trust"}
    ]}"#;

    fn android_reviews(count: usize) -> Vec<Review> {
        (0..count)
            .map(|i| {
                let rating = (i % 5) as i64 + 1;
                let date = day(1 + (i % 28) as u32);
                review(Platform::Android, rating, &format!("review number {}", i), date)
            })
            .collect()
    }

    fn config(output_dir: &Path) -> Config {
        let mut config = Config::default();
        config.apps.android_app_id = Some("com.example.app".to_string());
        config.apps.ios_app_id = Some("123456".to_string());
        config.report.output_dir = output_dir.to_path_buf();
        config
    }

    fn service() -> Arc<ScriptedService> {
        Arc::new(
            ScriptedService::new()
                .with_themes(THEMES)
                .with_quotes(QUOTES)
                .with_recommendations(RECS),
        )
    }

    #[derive(Default)]
    struct RecordingMailer {
        fail: bool,
        sent: Mutex<Vec<MailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(message.clone());
            if self.fail {
                Err(MailError::Api {
                    status: 401,
                    body: "unauthorized".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_one_platform_down_still_reports() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let android = ScriptedFeed::new(Platform::Android, vec![Ok(android_reviews(100))]);
        let ios = ScriptedFeed::failing(Platform::Ios, "HTTP 503");
        let mailer = RecordingMailer::default();

        let outcome = run(
            &config,
            Feeds {
                android: Some(&android),
                ios: Some(&ios),
            },
            service(),
            Some(&mailer),
            day(28),
            Utc::now(),
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome.report.totals.review_count, 100);
        assert_eq!(outcome.report.totals.by_platform.ios, 0);
        assert_eq!(
            outcome.meta.sources[0].status,
            SourceStatus::Fetched { count: 100 }
        );
        assert_eq!(unavailable_sources(&outcome.meta).len(), 1);

        assert_eq!(outcome.report.themes.items[0].name, "Login Crashes");
        assert_eq!(outcome.report.recommendations.items[0].text, "Fix login crash");
        assert_eq!(outcome.report.highlights.items, vec!["Crashes dominate".to_string()]);

        assert!(outcome.artifacts.reviews_csv.as_ref().unwrap().exists());
        assert_eq!(outcome.artifacts.documents.len(), 1);
        assert_eq!(outcome.mail, MailOutcome::Sent);

        let sent = mailer.sent.lock().unwrap();
        assert!(sent[0].subject.starts_with("App Review Insights: 2026-03-28"));
        assert_eq!(sent[0].attachments, outcome.artifacts.documents);
    }

    #[tokio::test]
    async fn test_both_platforms_down_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("reports"));
        let android = ScriptedFeed::failing(Platform::Android, "HTTP 500");
        let ios = ScriptedFeed::failing(Platform::Ios, "HTTP 503");
        let service = service();

        let result = run(
            &config,
            Feeds {
                android: Some(&android),
                ios: Some(&ios),
            },
            service.clone(),
            None,
            day(28),
            Utc::now(),
            false,
        )
        .await;

        assert!(matches!(result, Err(PipelineError::TotalDataLoss(_))));
        assert_eq!(service.requests(), 0);
        assert!(!dir.path().join("reports").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_platform_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let ios = ScriptedFeed::failing(Platform::Ios, "HTTP 503");

        let result = collect(
            &config,
            Feeds {
                android: None,
                ios: Some(&ios),
            },
            day(28),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::TotalDataLoss(_))));
    }

    #[tokio::test]
    async fn test_mail_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let android = ScriptedFeed::new(Platform::Android, vec![Ok(android_reviews(10))]);
        let mailer = RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        };

        let outcome = run(
            &config,
            Feeds {
                android: Some(&android),
                ios: None,
            },
            service(),
            Some(&mailer),
            day(28),
            Utc::now(),
            false,
        )
        .await
        .unwrap();

        assert!(matches!(outcome.mail, MailOutcome::Failed(ref reason) if reason.contains("401")));
        assert_eq!(outcome.meta.sources[1].status, SourceStatus::NotConfigured);
    }

    #[tokio::test]
    async fn test_degraded_service_still_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let android = ScriptedFeed::new(Platform::Android, vec![Ok(android_reviews(5))]);

        let outcome = run(
            &config,
            Feeds {
                android: Some(&android),
                ios: None,
            },
            Arc::new(ScriptedService::new()),
            None,
            day(28),
            Utc::now(),
            false,
        )
        .await
        .unwrap();

        assert!(outcome.report.themes.is_degraded());
        assert!(outcome.report.recommendations.is_degraded());
        assert_eq!(outcome.mail, MailOutcome::Skipped);

        let markdown = std::fs::read_to_string(&outcome.artifacts.documents[0]).unwrap();
        assert!(markdown.contains("_Unavailable: service error:"));
    }

    #[tokio::test]
    async fn test_empty_window_reports_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let android = ScriptedFeed::new(Platform::Android, vec![Ok(vec![])]);
        let service = Arc::new(ScriptedService::new());

        let outcome = run(
            &config,
            Feeds {
                android: Some(&android),
                ios: None,
            },
            service.clone(),
            None,
            day(28),
            Utc::now(),
            false,
        )
        .await
        .unwrap();

        assert!(outcome.report.totals.no_data);
        assert!(!outcome.report.themes.is_degraded());
        assert_eq!(service.requests(), 0);
    }
}
