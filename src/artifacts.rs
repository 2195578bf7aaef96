//! Per-run output files.
//!
//! Every run writes the windowed reviews as CSV and the rendered report as
//! Markdown, plus JSON and a print document when enabled.

use crate::config::ReportConfig;
use crate::error::ArtifactError;
use crate::models::{Report, Review, RunMetadata};
use crate::report::{generate_json_report, generate_markdown_report, generate_print_report};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths written by one run.
#[derive(Debug, Clone, Default)]
pub struct WrittenArtifacts {
    pub reviews_csv: Option<PathBuf>,
    /// Rendered report documents, Markdown first.
    pub documents: Vec<PathBuf>,
}

fn ensure_dir(dir: &Path) -> Result<(), ArtifactError> {
    std::fs::create_dir_all(dir).map_err(|source| ArtifactError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: PathBuf, content: &str) -> Result<PathBuf, ArtifactError> {
    std::fs::write(&path, content).map_err(|source| ArtifactError::Write {
        path: path.clone(),
        source,
    })?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Write the windowed reviews to `reviews_{YYYYMMDD_HHMMSS}.csv`.
pub fn write_reviews_csv(
    dir: &Path,
    reviews: &[Review],
    now: DateTime<Utc>,
) -> Result<PathBuf, ArtifactError> {
    ensure_dir(dir)?;
    let path = dir.join(format!("reviews_{}.csv", now.format("%Y%m%d_%H%M%S")));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(["platform", "rating", "text", "timestamp"])?;
    for review in reviews {
        writer.write_record([
            review.platform.to_string(),
            review.rating.to_string(),
            review.text.clone(),
            review.timestamp.format("%Y-%m-%d").to_string(),
        ])?;
    }
    writer.flush().map_err(|source| ArtifactError::Write {
        path: path.clone(),
        source,
    })?;

    info!("Wrote {} reviews to {}", reviews.len(), path.display());
    Ok(path)
}

/// Render and write the report documents enabled in `config`.
pub fn write_documents(
    config: &ReportConfig,
    report: &Report,
    meta: &RunMetadata,
) -> Result<Vec<PathBuf>, ArtifactError> {
    let dir = &config.output_dir;
    ensure_dir(dir)?;
    let stem = format!("review_report_{}", meta.generated_at.format("%Y%m%d"));

    let mut written = vec![write_file(
        dir.join(format!("{}.md", stem)),
        &generate_markdown_report(report, meta),
    )?];

    if config.json {
        let json = generate_json_report(report, meta)?;
        written.push(write_file(dir.join(format!("{}.json", stem)), &json)?);
    }

    if config.print_document {
        written.push(write_file(
            dir.join(format!("{}.txt", stem)),
            &generate_print_report(report, meta),
        )?);
    }

    Ok(written)
}
