//! In-memory fakes and fixtures shared by unit tests.

use crate::error::{FetchError, ServiceError};
use crate::fetch::{FeedPage, ReviewFeed};
use crate::insights::prompts::{QUOTES_TASK, RECOMMENDATIONS_TASK, THEMES_TASK};
use crate::insights::TextService;
use crate::models::{Platform, Review, Severity, Theme};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A day in March 2026.
pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

pub fn review(platform: Platform, rating: i64, text: &str, date: NaiveDate) -> Review {
    Review::new(platform, rating, text, date).unwrap()
}

pub fn theme(name: &str, share: f64, severity: Severity) -> Theme {
    Theme {
        name: name.to_string(),
        share,
        severity,
        business_risk: BTreeSet::new(),
        description: String::new(),
    }
}

/// A feed that serves pre-baked pages. The cursor is the page index.
pub struct ScriptedFeed {
    platform: Platform,
    pages: Vec<Result<Vec<Review>, String>>,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new(platform: Platform, pages: Vec<Result<Vec<Review>, String>>) -> Self {
        Self {
            platform,
            pages,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(platform: Platform, reason: &str) -> Self {
        Self::new(platform, vec![Err(reason.to_string())])
    }

    pub fn requests(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReviewFeed for ScriptedFeed {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn page(&self, cursor: Option<&str>) -> Result<FeedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);

        match self.pages.get(index) {
            None => Ok(FeedPage::default()),
            Some(Err(reason)) => Err(FetchError::unavailable(self.platform, reason.clone())),
            Some(Ok(reviews)) => Ok(FeedPage {
                reviews: reviews.clone(),
                next: (index + 1 < self.pages.len()).then(|| (index + 1).to_string()),
            }),
        }
    }
}

/// A text service answering by task marker. Unscripted requests fail.
#[derive(Default)]
pub struct ScriptedService {
    themes: Mutex<VecDeque<String>>,
    quotes: Option<String>,
    recommendations: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one theme response; each chunk consumes one.
    pub fn with_themes(self, response: &str) -> Self {
        if let Ok(mut queue) = self.themes.lock() {
            queue.push_back(response.to_string());
        }
        self
    }

    pub fn with_quotes(mut self, response: &str) -> Self {
        self.quotes = Some(response.to_string());
        self
    }

    pub fn with_recommendations(mut self, response: &str) -> Self {
        self.recommendations = Some(response.to_string());
        self
    }

    pub fn requests(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextService for ScriptedService {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _system: &str, prompt: &str) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        let response = if prompt.starts_with(THEMES_TASK) {
            self.themes.lock().unwrap().pop_front()
        } else if prompt.starts_with(QUOTES_TASK) {
            self.quotes.clone()
        } else if prompt.starts_with(RECOMMENDATIONS_TASK) {
            self.recommendations.clone()
        } else {
            None
        };

        response.ok_or(ServiceError::Api {
            status: 503,
            body: "no scripted response".to_string(),
        })
    }
}
