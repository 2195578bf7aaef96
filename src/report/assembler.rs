//! Report assembly.
//!
//! Combines totals and extracted insights into a ranked [`Report`]. No
//! I/O happens here; rendering lives in [`super::generator`].

use crate::error::AssemblyError;
use crate::models::{Extracted, Period, Quote, Recommendation, Report, Theme, Totals};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Build a report from aggregation and extraction results.
pub fn assemble(
    totals: Totals,
    mut themes: Extracted<Theme>,
    quotes: Extracted<Quote>,
    mut recommendations: Extracted<Recommendation>,
    period: Period,
) -> Result<Report, AssemblyError> {
    if period.start > period.end {
        return Err(AssemblyError::InvalidPeriod {
            start: period.start,
            end: period.end,
        });
    }

    let mut seen = HashSet::new();
    for theme in &themes.items {
        if !seen.insert(theme.name.to_lowercase()) {
            return Err(AssemblyError::DuplicateTheme(theme.name.clone()));
        }
    }

    rank_themes(&mut themes.items);
    rank_recommendations(&mut recommendations.items);

    Ok(Report {
        period,
        totals,
        themes,
        quotes,
        recommendations,
        highlights: Extracted::populated(Vec::new()),
    })
}

/// Order themes by share desc, then severity High first, then name.
pub fn rank_themes(themes: &mut [Theme]) {
    themes.sort_by(|a, b| {
        b.share
            .partial_cmp(&a.share)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.severity.cmp(&a.severity))
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Stable sort by priority, P0 first.
pub fn rank_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by_key(|r| r.priority);
}
