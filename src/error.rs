//! Error types for each pipeline stage.
//!
//! Recoverable conditions (one platform down, a malformed model field,
//! a failed mail delivery) are handled where they occur; only
//! [`PipelineError`] aborts a run.

use crate::models::Platform;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("{platform} source unavailable: {reason}")]
    SourceUnavailable { platform: Platform, reason: String },

    #[error("lookback start {since} is after today ({today})")]
    InvalidWindow { since: NaiveDate, today: NaiveDate },
}

impl FetchError {
    pub fn unavailable(platform: Platform, reason: impl Into<String>) -> Self {
        FetchError::SourceUnavailable {
            platform,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("response contained no text")]
    EmptyResponse,
}

/// A model response that does not match the expected schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("no JSON value found in response")]
    NoJson,

    #[error("expected a list under '{0}'")]
    MissingList(&'static str),

    #[error("entry {index}: missing field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("entry {index}: malformed entry ({detail})")]
    Malformed { index: usize, detail: String },

    #[error("entry {index}: share is not numeric")]
    NonNumericShare { index: usize },

    #[error("entry {index}: share {value} outside 0..=1")]
    ShareOutOfRange { index: usize, value: f64 },

    #[error("entry {index}: unknown {field} '{value}'")]
    UnknownValue {
        index: usize,
        field: &'static str,
        value: String,
    },

    #[error("duplicate theme '{0}'")]
    DuplicateTheme(String),

    #[error("'{0}' list is empty")]
    Empty(&'static str),

    #[error("no quote matched a review in the window")]
    UnverifiedQuotes,

    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssemblyError {
    #[error("report period starts {start} after it ends {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    #[error("theme '{0}' appears more than once")]
    DuplicateTheme(String),
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to create output directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("mail API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to read attachment '{path}': {source}")]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no reviews could be fetched from any platform: {0}")]
    TotalDataLoss(String),

    #[error("report assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("writing artifacts failed: {0}")]
    Artifact(#[from] ArtifactError),
}
