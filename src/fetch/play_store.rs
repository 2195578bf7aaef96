//! Play Store reviews via the store's `batchexecute` review RPC.
//!
//! The endpoint answers with an anti-XSSI prefix followed by a JSON
//! envelope whose payload is itself a JSON-encoded string. Reviews are
//! positional arrays: score at index 2, text at 4, `[seconds, nanos]` at 5.

use super::{transport_error, FeedPage, ReviewFeed};
use crate::error::FetchError;
use crate::models::{Platform, Review};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

const BATCH_URL: &str = "https://play.google.com/_/PlayStoreUi/data/batchexecute";
const REVIEWS_RPC: &str = "UsvDTd";
const SORT_NEWEST: u8 = 2;

pub struct PlayStoreFeed {
    client: Client,
    app_id: String,
    language: String,
    country: String,
    page_size: u32,
    timeout_seconds: u64,
}

impl PlayStoreFeed {
    pub fn new(
        client: Client,
        app_id: &str,
        language: &str,
        country: &str,
        page_size: u32,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            client,
            app_id: app_id.to_string(),
            language: language.to_string(),
            country: country.to_string(),
            page_size,
            timeout_seconds,
        }
    }
}

#[async_trait]
impl ReviewFeed for PlayStoreFeed {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    async fn page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        let freq = request_payload(&self.app_id, self.page_size, cursor);
        debug!(
            "Fetching Play Store page for {} (token: {})",
            self.app_id,
            cursor.unwrap_or("-")
        );

        let response = self
            .client
            .post(BATCH_URL)
            .query(&[("hl", self.language.as_str()), ("gl", self.country.as_str())])
            .form(&[("f.req", freq)])
            .send()
            .await
            .map_err(|e| transport_error(Platform::Android, self.timeout_seconds, e))?;

        if !response.status().is_success() {
            return Err(FetchError::unavailable(
                Platform::Android,
                format!("HTTP {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Platform::Android, self.timeout_seconds, e))?;

        parse_batch_response(&body).map_err(|reason| FetchError::unavailable(Platform::Android, reason))
    }
}

/// Build the `f.req` form value for one page.
pub fn request_payload(app_id: &str, page_size: u32, token: Option<&str>) -> String {
    let token = match token {
        Some(t) => Value::String(t.to_string()),
        None => Value::Null,
    };
    let inner = json!([
        null,
        null,
        [2, SORT_NEWEST, [page_size, null, token], null, []],
        [app_id, 7]
    ]);
    json!([[[REVIEWS_RPC, inner.to_string(), null, "generic"]]]).to_string()
}

/// Parse a `batchexecute` response into a page of reviews.
pub fn parse_batch_response(body: &str) -> Result<FeedPage, String> {
    let json_start = body
        .find('[')
        .ok_or_else(|| "response has no JSON envelope".to_string())?;
    let envelope: Value = serde_json::from_str(body[json_start..].trim())
        .map_err(|e| format!("malformed envelope: {}", e))?;

    let payload = envelope
        .get(0)
        .and_then(|v| v.get(2))
        .and_then(Value::as_str);

    // A null payload means the app has no (more) reviews.
    let Some(payload) = payload else {
        if envelope.get(0).and_then(|v| v.get(0)).and_then(Value::as_str) == Some("wrb.fr") {
            return Ok(FeedPage::default());
        }
        return Err("unexpected envelope shape".to_string());
    };

    let data: Value =
        serde_json::from_str(payload).map_err(|e| format!("malformed payload: {}", e))?;

    let mut reviews = Vec::new();
    if let Some(raw_reviews) = data.get(0).and_then(Value::as_array) {
        for raw in raw_reviews {
            match review_from_array(raw) {
                Some(review) => reviews.push(review),
                None => debug!("Skipping malformed Play Store review entry"),
            }
        }
    }

    let next = data.as_array().and_then(|parts| {
        parts
            .iter()
            .skip(1)
            .rev()
            .find_map(|part| part.as_array()?.last()?.as_str().map(str::to_string))
    });

    Ok(FeedPage { reviews, next })
}

fn review_from_array(raw: &Value) -> Option<Review> {
    let rating = raw.get(2)?.as_i64()?;
    let text = raw.get(4).and_then(Value::as_str).unwrap_or_default();
    let seconds = raw.get(5)?.get(0)?.as_i64()?;
    let date = DateTime::from_timestamp(seconds, 0)?.date_naive();
    Review::new(Platform::Android, rating, text, date)
}
