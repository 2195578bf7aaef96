//! App Store reviews via the iTunes customer-reviews RSS feed.

use super::{transport_error, FeedPage, ReviewFeed};
use crate::error::FetchError;
use crate::models::{Platform, Review};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const RSS_BASE_URL: &str = "https://itunes.apple.com";

/// The RSS feed serves at most this many pages.
pub const RSS_MAX_PAGE: u32 = 10;

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";

#[derive(Debug, Deserialize)]
struct RssResponse {
    feed: RssFeed,
}

#[derive(Debug, Deserialize)]
struct RssFeed {
    #[serde(default)]
    entry: Option<OneOrMany<RssEntry>>,
}

/// The feed collapses a single entry into an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

#[derive(Debug, Deserialize)]
struct Label {
    label: String,
}

#[derive(Debug, Deserialize)]
struct RssEntry {
    #[serde(rename = "im:rating")]
    rating: Option<Label>,
    title: Option<Label>,
    content: Option<Label>,
    updated: Option<Label>,
}

pub struct AppStoreFeed {
    client: Client,
    app_id: String,
    country: String,
    base_url: String,
    timeout_seconds: u64,
}

impl AppStoreFeed {
    pub fn new(client: Client, app_id: &str, country: &str, timeout_seconds: u64) -> Self {
        Self {
            client,
            app_id: app_id.to_string(),
            country: country.to_string(),
            base_url: RSS_BASE_URL.to_string(),
            timeout_seconds,
        }
    }

    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/{}/rss/customerreviews/page={}/id={}/sortby=mostrecent/json",
            self.base_url, self.country, page, self.app_id
        )
    }
}

#[async_trait]
impl ReviewFeed for AppStoreFeed {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    async fn page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        let page: u32 = cursor.and_then(|c| c.parse().ok()).unwrap_or(1);
        let url = self.page_url(page);
        debug!("Fetching App Store page {}: {}", page, url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(Platform::Ios, self.timeout_seconds, e))?;

        if !response.status().is_success() {
            return Err(FetchError::unavailable(
                Platform::Ios,
                format!("HTTP {} for page {}", response.status(), page),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Platform::Ios, self.timeout_seconds, e))?;

        let reviews = parse_rss_page(&body)
            .map_err(|reason| FetchError::unavailable(Platform::Ios, reason))?;

        let next = (page < RSS_MAX_PAGE && !reviews.is_empty()).then(|| (page + 1).to_string());
        Ok(FeedPage { reviews, next })
    }
}

/// Parse one RSS JSON page into reviews.
///
/// Entries without a rating (the app metadata entry) or with an
/// unreadable date are skipped. A body that is not the RSS shape is an error.
pub fn parse_rss_page(body: &str) -> Result<Vec<Review>, String> {
    let response: RssResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed RSS JSON: {}", e))?;

    let entries = match response.feed.entry {
        Some(entries) => entries.into_vec(),
        None => return Ok(Vec::new()),
    };

    let mut reviews = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(rating) = entry.rating.and_then(|r| r.label.trim().parse::<i64>().ok()) else {
            continue;
        };
        let Some(date) = entry.updated.as_ref().and_then(|u| parse_feed_date(&u.label)) else {
            debug!("Skipping App Store entry with unreadable date");
            continue;
        };
        let text = entry.content.map(|c| c.label).unwrap_or_default();

        match Review::new(Platform::Ios, rating, text, date) {
            Some(review) => {
                let title = entry.title.map(|t| t.label).unwrap_or_default();
                reviews.push(review.with_title(title));
            }
            None => debug!("Skipping App Store entry with rating {}", rating),
        }
    }

    Ok(reviews)
}

/// `updated` is RFC 3339 with the store's offset; fall back to the date part.
fn parse_feed_date(label: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(label.trim()) {
        return Some(dt.date_naive());
    }
    let date_part = label.trim().split('T').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
