//! Prompt construction and review batching.

use crate::models::{Review, Sentiment, Theme, Totals};

/// System prompt shared by every request.
pub const SYSTEM_PROMPT: &str = r#"You are a Group Product Manager turning raw app-store reviews into decision-ready product insights.
Answer with a single JSON value that follows the requested structure exactly.
Do not wrap the JSON in markdown and do not add commentary."#;

/// Marker lines that identify each request type.
pub const THEMES_TASK: &str = "## Task: theme extraction";
pub const QUOTES_TASK: &str = "## Task: quote selection";
pub const RECOMMENDATIONS_TASK: &str = "## Task: recommendations";

/// A batch of rendered review lines sent in one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewChunk {
    pub text: String,
    pub review_count: usize,
}

/// Render one review as `[Platform | N★ | date] text`.
pub fn review_line(review: &Review, max_chars: usize) -> String {
    let text: String = review.text.split_whitespace().collect::<Vec<_>>().join(" ");
    let text = if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    } else {
        text
    };

    format!(
        "[{} | {}★ | {}] {}",
        review.platform,
        review.rating,
        review.timestamp.format("%Y-%m-%d"),
        text
    )
}

/// Split reviews into chunks of at most `chunk_chars` characters.
///
/// A single line longer than `chunk_chars` gets a chunk of its own. Lines
/// that would open chunk number `max_chunks + 1` are dropped.
pub fn chunk_reviews(
    reviews: &[Review],
    chunk_chars: usize,
    max_chunks: usize,
    max_review_chars: usize,
) -> Vec<ReviewChunk> {
    let mut chunks: Vec<ReviewChunk> = Vec::new();
    let mut current = ReviewChunk {
        text: String::new(),
        review_count: 0,
    };
    let mut current_chars = 0;

    for review in reviews {
        let line = review_line(review, max_review_chars);
        let line_chars = line.chars().count() + 1;

        if current.review_count > 0 && current_chars + line_chars > chunk_chars {
            chunks.push(std::mem::replace(
                &mut current,
                ReviewChunk {
                    text: String::new(),
                    review_count: 0,
                },
            ));
            current_chars = 0;
            if chunks.len() == max_chunks {
                return chunks;
            }
        }

        current.text.push_str(&line);
        current.text.push('\n');
        current.review_count += 1;
        current_chars += line_chars;
    }

    if current.review_count > 0 && chunks.len() < max_chunks {
        chunks.push(current);
    }
    chunks
}

fn totals_block(totals: &Totals) -> String {
    let s = &totals.sentiment;
    format!(
        "- Total reviews: {}\n- Average rating: {:.2}/5\n- Positive (4-5★): {:.1}%\n- Neutral (3★): {:.1}%\n- Negative (1-2★): {:.1}%\n",
        totals.review_count,
        totals.average_rating,
        s.percent(Sentiment::Positive),
        s.percent(Sentiment::Neutral),
        s.percent(Sentiment::Negative),
    )
}

pub fn theme_prompt(chunk: &ReviewChunk, max_themes: usize) -> String {
    format!(
        r#"{THEMES_TASK}

Identify the top {max_themes} themes users discuss in the {count} reviews below.
Rank by business impact, not just volume. A review may belong to several themes.

For each theme give:
- name: 2-4 words
- share: fraction of these reviews discussing it, between 0 and 1
- severity: High, Medium or Low
- business_risk: list drawn from Trust, Revenue, Churn, Onboarding, Experience
- description: one sentence

Reviews:
{reviews}
Return JSON:
{{"themes": [{{"name": "Theme Name", "share": 0.25, "severity": "High", "business_risk": ["Trust"], "description": "Brief description"}}]}}"#,
        count = chunk.review_count,
        reviews = chunk.text,
    )
}

pub fn quote_prompt(chunk: &ReviewChunk, theme_names: &[String], max_quotes: usize) -> String {
    let conditioning = if theme_names.is_empty() {
        "Pick quotes that best represent overall user sentiment.".to_string()
    } else {
        format!(
            "Pick quotes that illustrate these themes: {}.",
            theme_names.join(", ")
        )
    };

    format!(
        r#"{QUOTES_TASK}

Select up to {max_quotes} short quotes copied verbatim from the reviews below.
{conditioning}
Copy the words exactly as written; do not paraphrase, translate or fix typos.
Leave out quotes containing names, emails or phone numbers.

Reviews:
{reviews}
Return JSON:
{{"quotes": [{{"quote": "exact words from one review", "theme": "Theme Name"}}]}}"#,
        reviews = chunk.text,
    )
}

/// Recommendations are conditioned on themes; without themes the review
/// sample is sent instead.
pub fn recommendation_prompt(themes: &[Theme], totals: &Totals, fallback: Option<&ReviewChunk>) -> String {
    let mut context = String::new();
    if themes.is_empty() {
        if let Some(chunk) = fallback {
            context.push_str("Reviews:\n");
            context.push_str(&chunk.text);
        }
    } else {
        context.push_str("Top themes:\n");
        for theme in themes {
            context.push_str(&format!(
                "- {} ({:.0}% of reviews, {} severity, risk: {}): {}\n",
                theme.name,
                theme.share * 100.0,
                theme.severity,
                theme.risk_label(),
                theme.description
            ));
        }
    }

    format!(
        r#"{RECOMMENDATIONS_TASK}

Input data:
{totals}
{context}
Produce:
1. summary: 3-5 executive bullets. Call out trust- or money-related risks explicitly and end with a clear leadership takeaway.
2. recommendations: 3-5 concrete actions the product and engineering team can take, each with its priority (P0, P1 or P2), the expected impact and the theme names it addresses.

Return JSON:
{{"summary": ["bullet"], "recommendations": [{{"priority": "P0", "text": "Specific action", "impact": "Expected user and business impact", "themes": ["Theme Name"]}}]}}"#,
        totals = totals_block(totals),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, Severity};
    use crate::testing::{day, review};
    use std::collections::BTreeSet;

    #[test]
    fn test_review_line_format_and_truncation() {
        let r = review(Platform::Android, 4, "Great  app\nfor beginners", day(3));
        assert_eq!(
            review_line(&r, 300),
            "[Android | 4★ | 2026-03-03] Great app for beginners"
        );

        let r = review(Platform::Ios, 1, "abcdefghij", day(3));
        assert_eq!(review_line(&r, 4), "[iOS | 1★ | 2026-03-03] abcd…");
    }

    #[test]
    fn test_chunking_respects_size() {
        let reviews: Vec<Review> = (0..10)
            .map(|i| review(Platform::Android, 3, &format!("review number {}", i), day(5)))
            .collect();
        let line_len = review_line(&reviews[0], 300).chars().count() + 1;

        let chunks = chunk_reviews(&reviews, line_len * 3, 10, 300);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].review_count, 3);
        assert_eq!(chunks[3].review_count, 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= line_len * 3));
    }

    #[test]
    fn test_chunking_caps_chunk_count() {
        let reviews: Vec<Review> = (0..10)
            .map(|i| review(Platform::Android, 3, &format!("review number {}", i), day(5)))
            .collect();
        let line_len = review_line(&reviews[0], 300).chars().count() + 1;

        let chunks = chunk_reviews(&reviews, line_len * 3, 2, 300);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.iter().map(|c| c.review_count).sum::<usize>(), 6);
    }

    #[test]
    fn test_oversized_line_gets_own_chunk() {
        let reviews = vec![
            review(Platform::Ios, 2, &"x".repeat(200), day(5)),
            review(Platform::Ios, 2, "short", day(5)),
        ];
        let chunks = chunk_reviews(&reviews, 50, 4, 300);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].review_count, 1);
    }

    #[test]
    fn test_prompts_carry_task_markers() {
        let chunk = ReviewChunk {
            text: "[Android | 1★ | 2026-03-01] crash\n".to_string(),
            review_count: 1,
        };
        assert!(theme_prompt(&chunk, 5).starts_with(THEMES_TASK));
        assert!(quote_prompt(&chunk, &[], 3).starts_with(QUOTES_TASK));

        let totals = crate::analysis::compute_totals(&[]);
        let theme = Theme {
            name: "Login Failures".to_string(),
            share: 0.4,
            severity: Severity::High,
            business_risk: BTreeSet::new(),
            description: "Cannot sign in".to_string(),
        };
        let prompt = recommendation_prompt(&[theme], &totals, Some(&chunk));
        assert!(prompt.starts_with(RECOMMENDATIONS_TASK));
        assert!(prompt.contains("Login Failures (40% of reviews"));
        assert!(!prompt.contains("crash"));

        let prompt = recommendation_prompt(&[], &totals, Some(&chunk));
        assert!(prompt.contains("crash"));
    }
}
