//! Review windowing and summary statistics.
//!
//! This module trims fetched reviews to the reporting window and computes
//! the totals shown in every report.

use crate::models::{PlatformCounts, Review, ReviewWindow, SentimentBreakdown, Totals};
use chrono::{Duration, NaiveDate};
use tracing::debug;

/// The inclusive `[start, end]` lookback period of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl LookbackWindow {
    /// The `weeks`-week window ending today.
    pub fn ending(today: NaiveDate, weeks: u32) -> Self {
        Self {
            start: today - Duration::days(7 * i64::from(weeks)),
            end: today,
        }
    }
}

/// Keep reviews dated within `[start_date, end_date]` and summarize them.
///
/// Input order is preserved in the window; the totals do not depend on it.
pub fn aggregate(
    reviews: Vec<Review>,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> (ReviewWindow, Totals) {
    let before = reviews.len();
    let in_window: Vec<Review> = reviews
        .into_iter()
        .filter(|r| start_date <= r.timestamp && r.timestamp <= end_date)
        .collect();

    if in_window.len() < before {
        debug!(
            "Dropped {} reviews outside {} to {}",
            before - in_window.len(),
            start_date,
            end_date
        );
    }

    let totals = compute_totals(&in_window);
    let window = ReviewWindow {
        start_date,
        end_date,
        reviews: in_window,
    };
    (window, totals)
}

/// Summary statistics over a set of reviews.
pub fn compute_totals(reviews: &[Review]) -> Totals {
    let mut sentiment = SentimentBreakdown::default();
    let mut by_platform = PlatformCounts::default();
    let mut rating_sum: u64 = 0;

    for review in reviews {
        sentiment.record(review.sentiment());
        by_platform.record(review.platform);
        rating_sum += u64::from(review.rating);
    }

    let review_count = reviews.len();
    let average_rating = if review_count == 0 {
        0.0
    } else {
        rating_sum as f64 / review_count as f64
    };

    Totals {
        review_count,
        average_rating,
        no_data: review_count == 0,
        sentiment,
        by_platform,
        rating_distribution: rating_distribution(reviews),
    }
}

/// Review counts per star rating; index 0 holds 1★.
pub fn rating_distribution(reviews: &[Review]) -> [usize; 5] {
    let mut dist = [0usize; 5];
    for review in reviews {
        dist[usize::from(review.rating.clamp(1, 5)) - 1] += 1;
    }
    dist
}
