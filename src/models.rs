//! Data models for the review insights pipeline.
//!
//! This module contains the core data structures passed between the
//! pipeline stages: reviews, aggregated totals, extracted insights and
//! the final report.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// App distribution channel a review originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    Android,
    #[serde(rename = "iOS")]
    Ios,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => write!(f, "Android"),
            Platform::Ios => write!(f, "iOS"),
        }
    }
}

/// Sentiment bucket derived from a star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Fixed bucketing policy: 4-5 positive, 3 neutral, 1-2 negative.
    pub fn from_rating(rating: u8) -> Self {
        match rating {
            4.. => Sentiment::Positive,
            3 => Sentiment::Neutral,
            _ => Sentiment::Negative,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Sentiment::Positive => "😊",
            Sentiment::Neutral => "😐",
            Sentiment::Negative => "😞",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positive"),
            Sentiment::Neutral => write!(f, "neutral"),
            Sentiment::Negative => write!(f, "negative"),
        }
    }
}

/// One user-submitted rating and text pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Store the review came from.
    pub platform: Platform,
    /// Star rating, always within 1..=5.
    pub rating: u8,
    /// Review body, may be empty.
    pub text: String,
    /// Day the review was posted or last updated.
    pub timestamp: NaiveDate,
    /// Review headline (only the App Store feed provides one).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Identity of a review for deduplication across overlapping pages.
pub type ReviewKey = (Platform, u8, String, NaiveDate);

impl Review {
    /// Creates a review, rejecting ratings outside 1..=5.
    pub fn new(
        platform: Platform,
        rating: i64,
        text: impl Into<String>,
        timestamp: NaiveDate,
    ) -> Option<Self> {
        if !(1..=5).contains(&rating) {
            return None;
        }

        Some(Self {
            platform,
            rating: rating as u8,
            text: text.into(),
            timestamp,
            title: None,
        })
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = if title.trim().is_empty() {
            None
        } else {
            Some(title)
        };
        self
    }

    pub fn sentiment(&self) -> Sentiment {
        Sentiment::from_rating(self.rating)
    }

    pub fn key(&self) -> ReviewKey {
        (self.platform, self.rating, self.text.clone(), self.timestamp)
    }
}

/// The filtered set of reviews used for one report run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewWindow {
    /// Inclusive lower bound.
    pub start_date: NaiveDate,
    /// Inclusive upper bound.
    pub end_date: NaiveDate,
    /// Reviews in fetch order.
    pub reviews: Vec<Review>,
}

impl ReviewWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn period(&self) -> Period {
        Period {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

/// Inclusive reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Review counts per sentiment bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentBreakdown {
    pub fn record(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }

    /// Share of a bucket in percent, 0 when there are no reviews.
    pub fn percent(&self, sentiment: Sentiment) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let count = match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Neutral => self.neutral,
            Sentiment::Negative => self.negative,
        };
        count as f64 * 100.0 / total as f64
    }
}

/// Review counts per platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCounts {
    pub android: usize,
    pub ios: usize,
}

impl PlatformCounts {
    pub fn record(&mut self, platform: Platform) {
        match platform {
            Platform::Android => self.android += 1,
            Platform::Ios => self.ios += 1,
        }
    }
}

/// Summary statistics over a review window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Number of reviews in the window.
    pub review_count: usize,
    /// Mean star rating, 0 when `no_data` is set.
    pub average_rating: f64,
    /// Set when the window holds no reviews.
    pub no_data: bool,
    /// Sentiment bucket counts.
    pub sentiment: SentimentBreakdown,
    /// Review counts per platform.
    pub by_platform: PlatformCounts,
    /// Review counts per star rating, 1★ first.
    pub rating_distribution: [usize; 5],
}

/// Qualitative impact tag assigned to a theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🔴",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" | "med" | "moderate" => Some(Severity::Medium),
            "high" | "critical" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Business risk tag attached to a theme.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BusinessRisk {
    Trust,
    Revenue,
    Churn,
    Onboarding,
    Experience,
    Other(String),
}

impl fmt::Display for BusinessRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessRisk::Trust => write!(f, "Trust"),
            BusinessRisk::Revenue => write!(f, "Revenue"),
            BusinessRisk::Churn => write!(f, "Churn"),
            BusinessRisk::Onboarding => write!(f, "Onboarding"),
            BusinessRisk::Experience => write!(f, "Experience"),
            BusinessRisk::Other(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for BusinessRisk {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trust" => BusinessRisk::Trust,
            "revenue" => BusinessRisk::Revenue,
            "churn" | "retention" => BusinessRisk::Churn,
            "onboarding" => BusinessRisk::Onboarding,
            "experience" | "ux" => BusinessRisk::Experience,
            _ => BusinessRisk::Other(s.trim().to_string()),
        }
    }
}

/// One topical cluster identified in the reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// Short theme name, unique within a run.
    pub name: String,
    /// Fraction of reviews attributed to the theme (0..=1, multi-label).
    pub share: f64,
    pub severity: Severity,
    pub business_risk: BTreeSet<BusinessRisk>,
    pub description: String,
}

impl Theme {
    /// Estimated number of reviews behind this theme.
    pub fn estimated_reviews(&self, review_count: usize) -> usize {
        (self.share * review_count as f64).round() as usize
    }

    pub fn risk_label(&self) -> String {
        if self.business_risk.is_empty() {
            return "-".to_string();
        }
        self.business_risk
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A verbatim review excerpt tagged by theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub theme: String,
    /// Sentiment of the review the quote was taken from.
    pub sentiment: Sentiment,
}

/// Urgency tier for a recommendation, P0 most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::P0 => write!(f, "P0"),
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
        }
    }
}

impl Priority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "P0" | "0" => Some(Priority::P0),
            "P1" | "1" => Some(Priority::P1),
            "P2" | "2" => Some(Priority::P2),
            _ => None,
        }
    }
}

/// An actionable recommendation derived from the themes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Priority,
    /// The action to take.
    pub text: String,
    /// Why it matters.
    pub impact: String,
    /// Names of the themes this addresses (loose association).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub themes: Vec<String>,
}

/// Whether an extracted field holds model output or a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FieldStatus {
    Populated,
    Degraded { reason: String },
}

/// An extracted field plus its provenance.
///
/// A degraded field always holds no items, so it can be told apart from a
/// field the service legitimately returned empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extracted<T> {
    pub items: Vec<T>,
    pub status: FieldStatus,
}

impl<T> Extracted<T> {
    pub fn populated(items: Vec<T>) -> Self {
        Self {
            items,
            status: FieldStatus::Populated,
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            status: FieldStatus::Degraded {
                reason: reason.into(),
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, FieldStatus::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match &self.status {
            FieldStatus::Degraded { reason } => Some(reason),
            FieldStatus::Populated => None,
        }
    }
}

/// The final deliverable for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub period: Period,
    pub totals: Totals,
    /// Ranked by share, descending.
    pub themes: Extracted<Theme>,
    pub quotes: Extracted<Quote>,
    /// Ranked by priority, P0 first.
    pub recommendations: Extracted<Recommendation>,
    /// Executive summary bullets.
    pub highlights: Extracted<String>,
}

impl Report {
    pub fn with_highlights(mut self, highlights: Extracted<String>) -> Self {
        self.highlights = highlights;
        self
    }
}

/// Outcome of fetching one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Fetched { count: usize },
    Unavailable { reason: String },
    NotConfigured,
}

impl SourceStatus {
    pub fn is_fetched(&self) -> bool {
        matches!(self, SourceStatus::Fetched { .. })
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Fetched { count } => write!(f, "{} reviews fetched", count),
            SourceStatus::Unavailable { reason } => write!(f, "unavailable ({})", reason),
            SourceStatus::NotConfigured => write!(f, "not configured"),
        }
    }
}

/// Per-platform fetch record shown in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformSource {
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    pub status: SourceStatus,
}

/// Run details rendered alongside the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    pub sources: Vec<PlatformSource>,
    pub duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_sentiment_bucketing() {
        assert_eq!(Sentiment::from_rating(5), Sentiment::Positive);
        assert_eq!(Sentiment::from_rating(4), Sentiment::Positive);
        assert_eq!(Sentiment::from_rating(3), Sentiment::Neutral);
        assert_eq!(Sentiment::from_rating(2), Sentiment::Negative);
        assert_eq!(Sentiment::from_rating(1), Sentiment::Negative);
    }

    #[test]
    fn test_review_rejects_out_of_range_rating() {
        assert!(Review::new(Platform::Android, 0, "meh", date(1)).is_none());
        assert!(Review::new(Platform::Android, 6, "wow", date(1)).is_none());
        assert!(Review::new(Platform::Ios, 5, "", date(1)).is_some());
    }

    #[test]
    fn test_review_title_blank_is_dropped() {
        let review = Review::new(Platform::Ios, 4, "ok", date(2))
            .unwrap()
            .with_title("   ");
        assert_eq!(review.title, None);
    }

    #[test]
    fn test_severity_ordering_and_parse() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse(" medium "), Some(Severity::Medium));
        assert_eq!(Severity::parse("urgent"), None);
    }

    #[test]
    fn test_priority_ordering_and_parse() {
        assert!(Priority::P0 < Priority::P1);
        assert!(Priority::P1 < Priority::P2);
        assert_eq!(Priority::parse("p1"), Some(Priority::P1));
        assert_eq!(Priority::parse("P3"), None);
    }

    #[test]
    fn test_business_risk_from_str() {
        assert_eq!(BusinessRisk::from("trust"), BusinessRisk::Trust);
        assert_eq!(BusinessRisk::from("Retention"), BusinessRisk::Churn);
        assert_eq!(
            BusinessRisk::from("Compliance"),
            BusinessRisk::Other("Compliance".to_string())
        );
    }

    #[test]
    fn test_sentiment_percent_zero_safe() {
        let breakdown = SentimentBreakdown::default();
        assert_eq!(breakdown.percent(Sentiment::Positive), 0.0);

        let breakdown = SentimentBreakdown {
            positive: 3,
            neutral: 1,
            negative: 0,
        };
        assert_eq!(breakdown.percent(Sentiment::Positive), 75.0);
    }

    #[test]
    fn test_extracted_degraded_is_distinguishable() {
        let empty: Extracted<Theme> = Extracted::populated(vec![]);
        let degraded: Extracted<Theme> = Extracted::degraded("bad json");

        assert!(!empty.is_degraded());
        assert!(degraded.is_degraded());
        assert_eq!(empty.items.len(), degraded.items.len());
        assert_eq!(degraded.degraded_reason(), Some("bad json"));
    }

    #[test]
    fn test_platform_serializes_store_names() {
        assert_eq!(serde_json::to_string(&Platform::Ios).unwrap(), "\"iOS\"");
        assert_eq!(
            serde_json::to_string(&Platform::Android).unwrap(),
            "\"Android\""
        );
    }

    #[test]
    fn test_theme_estimated_reviews() {
        let theme = Theme {
            name: "Login".to_string(),
            share: 0.25,
            severity: Severity::High,
            business_risk: BTreeSet::new(),
            description: String::new(),
        };
        assert_eq!(theme.estimated_reviews(200), 50);
        assert_eq!(theme.risk_label(), "-");
    }
}
