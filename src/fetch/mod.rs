//! Review fetching from the public store feeds.
//!
//! Each store is a [`ReviewFeed`] that serves one page at a time; [`fetch`]
//! drives the pagination, applies the lookback cutoff and removes
//! duplicates caused by overlapping pages.

pub mod app_store;
pub mod play_store;

pub use app_store::AppStoreFeed;
pub use play_store::PlayStoreFeed;

use crate::error::FetchError;
use crate::models::{Platform, PlatformSource, Review, ReviewKey, SourceStatus};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// One page of raw reviews plus the cursor for the next page.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub reviews: Vec<Review>,
    /// `None` when the feed has no further pages.
    pub next: Option<String>,
}

/// A paginated source of reviews for one platform.
#[async_trait]
pub trait ReviewFeed: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetch the page at `cursor`, or the first page when `None`.
    async fn page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError>;
}

/// Fetch all reviews posted on or after `since`.
///
/// Stops when the feed runs out, when a whole page predates `since`, or
/// after `max_pages`. A failure on the first page fails the platform; a
/// failure on a later page keeps what was already collected.
pub async fn fetch<F: ReviewFeed + ?Sized>(
    feed: &F,
    since: NaiveDate,
    today: NaiveDate,
    max_pages: usize,
) -> Result<Vec<Review>, FetchError> {
    if since > today {
        return Err(FetchError::InvalidWindow { since, today });
    }

    let platform = feed.platform();
    let mut seen: HashSet<ReviewKey> = HashSet::new();
    let mut reviews = Vec::new();
    let mut cursor: Option<String> = None;

    for page_number in 1..=max_pages {
        let page = match feed.page(cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) if page_number == 1 => return Err(e),
            Err(e) => {
                warn!(
                    "{} feed failed on page {}, keeping {} reviews: {}",
                    platform,
                    page_number,
                    reviews.len(),
                    e
                );
                break;
            }
        };

        if page.reviews.is_empty() {
            debug!("{} feed exhausted at page {}", platform, page_number);
            break;
        }

        let mut recent_on_page = 0;
        let mut duplicates = 0;
        for review in page.reviews {
            if review.timestamp < since {
                continue;
            }
            recent_on_page += 1;
            if seen.insert(review.key()) {
                reviews.push(review);
            } else {
                duplicates += 1;
            }
        }

        debug!(
            "{} page {}: {} in window, {} duplicates",
            platform, page_number, recent_on_page, duplicates
        );

        if recent_on_page == 0 {
            debug!("{} page {} predates {}, stopping", platform, page_number, since);
            break;
        }

        match page.next {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    info!("Collected {} {} reviews since {}", reviews.len(), platform, since);
    Ok(reviews)
}

/// Fetch one platform, converting failure into an empty contribution.
///
/// Returns the reviews together with the status recorded in the report.
pub async fn fetch_platform(
    feed: Option<&dyn ReviewFeed>,
    platform: Platform,
    app_id: Option<&str>,
    since: NaiveDate,
    today: NaiveDate,
    max_pages: usize,
) -> (Vec<Review>, PlatformSource) {
    let source = |status| PlatformSource {
        platform,
        app_id: app_id.map(str::to_string),
        status,
    };

    let Some(feed) = feed else {
        info!("{} not configured, skipping", platform);
        return (Vec::new(), source(SourceStatus::NotConfigured));
    };

    match fetch(feed, since, today, max_pages).await {
        Ok(reviews) => {
            let count = reviews.len();
            (reviews, source(SourceStatus::Fetched { count }))
        }
        Err(e) => {
            warn!("Fetch stage: {}; continuing without {} reviews", e, platform);
            let reason = match e {
                FetchError::SourceUnavailable { reason, .. } => reason,
                other => other.to_string(),
            };
            (Vec::new(), source(SourceStatus::Unavailable { reason }))
        }
    }
}

/// Map a reqwest failure onto a platform outage.
pub(crate) fn transport_error(
    platform: Platform,
    timeout_seconds: u64,
    e: reqwest::Error,
) -> FetchError {
    let reason = if e.is_timeout() {
        format!("request timed out after {}s", timeout_seconds)
    } else if e.is_connect() {
        "cannot connect to store".to_string()
    } else {
        format!("request failed: {}", e)
    };
    FetchError::unavailable(platform, reason)
}
