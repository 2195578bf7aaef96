//! Report rendering.
//!
//! This module renders an assembled [`Report`] as Markdown, JSON, a
//! fixed-width print document and the HTML body of the notification mail.
//! A degraded field is always rendered as an explicit "unavailable" line so
//! readers can tell it apart from a field that is simply empty.

use crate::models::{
    Extracted, FieldStatus, Priority, Report, RunMetadata, Sentiment, SourceStatus,
};
use serde::Serialize;

/// Width of the print document.
pub const PRINT_WIDTH: usize = 80;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, meta: &RunMetadata) -> String {
    let mut output = String::new();

    output.push_str("# 📊 App Review Insights\n\n");
    output.push_str(&generate_metadata_section(report, meta));
    output.push_str(&generate_summary_section(&report.highlights));
    output.push_str(&generate_ratings_section(report));
    output.push_str(&generate_themes_section(report));
    output.push_str(&generate_quotes_section(report));
    output.push_str(&generate_recommendations_section(report));
    output.push_str(&generate_footer(meta));

    output
}

/// Line to render instead of items for degraded or empty fields.
fn placeholder<T>(field: &Extracted<T>) -> Option<String> {
    match &field.status {
        FieldStatus::Degraded { reason } => Some(format!("_Unavailable: {}_", reason)),
        FieldStatus::Populated if field.items.is_empty() => Some("_None_".to_string()),
        FieldStatus::Populated => None,
    }
}

fn sentiment_line(report: &Report) -> String {
    let s = &report.totals.sentiment;
    format!(
        "{} {:.1}% Positive | {} {:.1}% Neutral | {} {:.1}% Negative",
        Sentiment::Positive.emoji(),
        s.percent(Sentiment::Positive),
        Sentiment::Neutral.emoji(),
        s.percent(Sentiment::Neutral),
        Sentiment::Negative.emoji(),
        s.percent(Sentiment::Negative),
    )
}

fn source_line(meta: &RunMetadata) -> Vec<String> {
    meta.sources
        .iter()
        .map(|source| match &source.app_id {
            Some(id) => format!("{} (`{}`): {}", source.platform, id, source.status),
            None => format!("{}: {}", source.platform, source.status),
        })
        .collect()
}

/// Generate the metadata section.
fn generate_metadata_section(report: &Report, meta: &RunMetadata) -> String {
    let totals = &report.totals;
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Report Period:** {}\n", report.period));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", meta.model_used));
    section.push_str(&format!(
        "- **Total Reviews:** {} (Android {} | iOS {})\n",
        totals.review_count, totals.by_platform.android, totals.by_platform.ios
    ));
    section.push_str(&format!(
        "- **Average Rating:** {:.2}/5 ⭐\n",
        totals.average_rating
    ));
    section.push_str(&format!("- **Sentiment:** {}\n", sentiment_line(report)));
    section.push_str("- **Sources:**\n");
    for line in source_line(meta) {
        section.push_str(&format!("  - {}\n", line));
    }
    section.push_str(&format!(
        "- **Run Duration:** {:.1}s\n",
        meta.duration_seconds
    ));
    section.push('\n');

    if totals.no_data {
        section.push_str("> ℹ️ No reviews were posted in this period.\n\n");
    }

    section
}

fn generate_summary_section(highlights: &Extracted<String>) -> String {
    let mut section = String::from("## 🎯 Executive Summary\n\n");

    match placeholder(highlights) {
        Some(line) => section.push_str(&format!("{}\n", line)),
        None => {
            for bullet in &highlights.items {
                section.push_str(&format!("- {}\n", bullet));
            }
        }
    }
    section.push('\n');
    section
}

fn generate_ratings_section(report: &Report) -> String {
    if report.totals.no_data {
        return String::new();
    }

    let dist = &report.totals.rating_distribution;
    let mut section = String::from("## ⭐ Rating Distribution\n\n");
    section.push_str("| 5★ | 4★ | 3★ | 2★ | 1★ |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        dist[4], dist[3], dist[2], dist[1], dist[0]
    ));
    section
}

/// Escape characters that would break a Markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn generate_themes_section(report: &Report) -> String {
    let mut section = String::from("## 📊 Top Themes\n\n");

    if let Some(line) = placeholder(&report.themes) {
        section.push_str(&format!("{}\n\n", line));
        return section;
    }

    section.push_str(
        "| # | Theme | Share | Est. Reviews | Severity | Business Risk | Description |\n",
    );
    section.push_str("|:---:|:---|:---:|:---:|:---|:---|:---|\n");

    for (i, theme) in report.themes.items.iter().enumerate() {
        section.push_str(&format!(
            "| {} | **{}** | {:.0}% | {} | {} {} | {} | {} |\n",
            i + 1,
            cell(&theme.name),
            theme.share * 100.0,
            theme.estimated_reviews(report.totals.review_count),
            theme.severity.emoji(),
            theme.severity,
            cell(&theme.risk_label()),
            cell(&theme.description),
        ));
    }
    section.push('\n');
    section
}

fn generate_quotes_section(report: &Report) -> String {
    let mut section = String::from("## 💬 User Voices\n\n");

    if let Some(line) = placeholder(&report.quotes) {
        section.push_str(&format!("{}\n\n", line));
        return section;
    }

    for quote in &report.quotes.items {
        section.push_str(&format!("> \"{}\"\n>\n", quote.text.replace('\n', " ")));
        section.push_str(&format!(
            "> - *{}* · {} {}\n\n",
            quote.theme,
            quote.sentiment.emoji(),
            quote.sentiment
        ));
    }
    section
}

fn generate_recommendations_section(report: &Report) -> String {
    let mut section = String::from("## 💡 Recommendations\n\n");

    if let Some(line) = placeholder(&report.recommendations) {
        section.push_str(&format!("{}\n\n", line));
        return section;
    }

    for priority in [Priority::P0, Priority::P1, Priority::P2] {
        let group: Vec<_> = report
            .recommendations
            .items
            .iter()
            .filter(|r| r.priority == priority)
            .collect();
        if group.is_empty() {
            continue;
        }

        section.push_str(&format!("### {}\n\n", priority));
        for rec in group {
            section.push_str(&format!("- **{}**\n", rec.text));
            if !rec.impact.is_empty() {
                section.push_str(&format!("  - Impact: {}\n", rec.impact));
            }
            if !rec.themes.is_empty() {
                section.push_str(&format!("  - Themes: {}\n", rec.themes.join(", ")));
            }
        }
        section.push('\n');
    }
    section
}

fn generate_footer(meta: &RunMetadata) -> String {
    format!(
        "---\n\n*Report generated by ReviewPulse v{} on {}*\n",
        env!("CARGO_PKG_VERSION"),
        meta.generated_at.format("%B %d, %Y at %H:%M UTC")
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a RunMetadata,
    report: &'a Report,
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report, meta: &RunMetadata) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        metadata: meta,
        report,
    })
}

/// Greedy word wrap to `width` columns with a hanging `indent`.
fn wrap(text: &str, width: usize, indent: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let current = line.chars().count();
        if current > 0 && current + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
            line.push_str(indent);
        }
        if !line.is_empty() && !line.ends_with(' ') {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.trim().is_empty() {
        lines.push(line);
    }
    lines
}

fn print_heading(out: &mut String, title: &str) {
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    out.push_str(&"-".repeat(title.chars().count().min(PRINT_WIDTH)));
    out.push('\n');
}

fn print_placeholder<T>(out: &mut String, field: &Extracted<T>) -> bool {
    match &field.status {
        FieldStatus::Degraded { reason } => {
            for line in wrap(&format!("Unavailable: {}", reason), PRINT_WIDTH, "  ") {
                out.push_str(&line);
                out.push('\n');
            }
            true
        }
        FieldStatus::Populated if field.items.is_empty() => {
            out.push_str("None\n");
            true
        }
        FieldStatus::Populated => false,
    }
}

/// Generate a fixed-width plain-text document for printing.
pub fn generate_print_report(report: &Report, meta: &RunMetadata) -> String {
    let totals = &report.totals;
    let mut out = String::new();

    out.push_str(&"=".repeat(PRINT_WIDTH));
    out.push('\n');
    out.push_str(&format!("{:^width$}\n", "APP REVIEW INSIGHTS", width = PRINT_WIDTH));
    out.push_str(&format!(
        "{:^width$}\n",
        report.period.to_string(),
        width = PRINT_WIDTH
    ));
    out.push_str(&"=".repeat(PRINT_WIDTH));
    out.push('\n');

    out.push_str(&format!(
        "Reviews: {} (Android {}, iOS {})   Average rating: {:.2}/5\n",
        totals.review_count, totals.by_platform.android, totals.by_platform.ios, totals.average_rating
    ));
    let s = &totals.sentiment;
    out.push_str(&format!(
        "Sentiment: {:.1}% positive, {:.1}% neutral, {:.1}% negative\n",
        s.percent(Sentiment::Positive),
        s.percent(Sentiment::Neutral),
        s.percent(Sentiment::Negative)
    ));
    for source in &meta.sources {
        out.push_str(&format!("{}: {}\n", source.platform, source.status));
    }
    if totals.no_data {
        out.push_str("No reviews were posted in this period.\n");
    }

    print_heading(&mut out, "EXECUTIVE SUMMARY");
    if !print_placeholder(&mut out, &report.highlights) {
        for bullet in &report.highlights.items {
            for line in wrap(&format!("* {}", bullet), PRINT_WIDTH, "  ") {
                out.push_str(&line);
                out.push('\n');
            }
        }
    }

    print_heading(&mut out, "TOP THEMES");
    if !print_placeholder(&mut out, &report.themes) {
        for (i, theme) in report.themes.items.iter().enumerate() {
            let header = format!(
                "{}. {} ({:.0}%, ~{} reviews, {} severity, risk: {})",
                i + 1,
                theme.name,
                theme.share * 100.0,
                theme.estimated_reviews(totals.review_count),
                theme.severity,
                theme.risk_label()
            );
            for line in wrap(&header, PRINT_WIDTH, "   ") {
                out.push_str(&line);
                out.push('\n');
            }
            if !theme.description.is_empty() {
                for line in wrap(&theme.description, PRINT_WIDTH - 3, "") {
                    out.push_str("   ");
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }
    }

    print_heading(&mut out, "USER VOICES");
    if !print_placeholder(&mut out, &report.quotes) {
        for quote in &report.quotes.items {
            let text = format!("\"{}\" ({}, {})", quote.text, quote.theme, quote.sentiment);
            for line in wrap(&text, PRINT_WIDTH, "  ") {
                out.push_str(&line);
                out.push('\n');
            }
        }
    }

    print_heading(&mut out, "RECOMMENDATIONS");
    if !print_placeholder(&mut out, &report.recommendations) {
        for rec in &report.recommendations.items {
            for line in wrap(&format!("[{}] {}", rec.priority, rec.text), PRINT_WIDTH, "     ") {
                out.push_str(&line);
                out.push('\n');
            }
            if !rec.impact.is_empty() {
                for line in wrap(&format!("     Impact: {}", rec.impact), PRINT_WIDTH, "     ") {
                    out.push_str(&line);
                    out.push('\n');
                }
            }
        }
    }

    out.push('\n');
    out.push_str(&"=".repeat(PRINT_WIDTH));
    out.push('\n');
    out.push_str(&format!(
        "Generated {} with {}\n",
        meta.generated_at.format("%Y-%m-%d %H:%M UTC"),
        meta.model_used
    ));
    out
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_placeholder<T>(field: &Extracted<T>) -> Option<String> {
    match &field.status {
        FieldStatus::Degraded { reason } => Some(format!(
            "<p style=\"color:#b3261e\"><em>Unavailable: {}</em></p>",
            html_escape(reason)
        )),
        FieldStatus::Populated if field.items.is_empty() => {
            Some("<p><em>None</em></p>".to_string())
        }
        FieldStatus::Populated => None,
    }
}

/// Generate the HTML body of the notification mail.
pub fn generate_email_html(report: &Report, meta: &RunMetadata) -> String {
    let totals = &report.totals;
    let mut html = String::new();

    html.push_str("<html><body style=\"font-family:Arial,sans-serif;color:#202124;max-width:720px\">\n");
    html.push_str("<h2 style=\"color:#1a73e8\">📊 App Review Insights</h2>\n");
    html.push_str(&format!(
        "<p><strong>Period:</strong> {}<br>\n<strong>Reviews:</strong> {} (Android {} | iOS {})<br>\n<strong>Average rating:</strong> {:.2}/5 ⭐<br>\n<strong>Sentiment:</strong> {}</p>\n",
        report.period,
        totals.review_count,
        totals.by_platform.android,
        totals.by_platform.ios,
        totals.average_rating,
        html_escape(&sentiment_line(report))
    ));

    let unavailable: Vec<String> = meta
        .sources
        .iter()
        .filter_map(|s| match &s.status {
            SourceStatus::Unavailable { reason } => {
                Some(format!("{}: {}", s.platform, html_escape(reason)))
            }
            _ => None,
        })
        .collect();
    if !unavailable.is_empty() {
        html.push_str(&format!(
            "<p style=\"color:#b3261e\">⚠️ Partial data. Unavailable sources: {}</p>\n",
            unavailable.join("; ")
        ));
    }

    html.push_str("<h3>🎯 Executive Summary</h3>\n");
    match html_placeholder(&report.highlights) {
        Some(p) => html.push_str(&p),
        None => {
            html.push_str("<ul>\n");
            for bullet in &report.highlights.items {
                html.push_str(&format!("<li>{}</li>\n", html_escape(bullet)));
            }
            html.push_str("</ul>\n");
        }
    }

    html.push_str("<h3>📊 Top Themes</h3>\n");
    match html_placeholder(&report.themes) {
        Some(p) => html.push_str(&p),
        None => {
            html.push_str("<table cellpadding=\"6\" style=\"border-collapse:collapse\" border=\"1\">\n");
            html.push_str("<tr style=\"background:#1a73e8;color:#fff\"><th>Theme</th><th>Share</th><th>Severity</th><th>Risk</th></tr>\n");
            for theme in &report.themes.items {
                html.push_str(&format!(
                    "<tr><td>{}</td><td>{:.0}%</td><td>{} {}</td><td>{}</td></tr>\n",
                    html_escape(&theme.name),
                    theme.share * 100.0,
                    theme.severity.emoji(),
                    theme.severity,
                    html_escape(&theme.risk_label())
                ));
            }
            html.push_str("</table>\n");
        }
    }

    html.push_str("<h3>💬 User Voices</h3>\n");
    match html_placeholder(&report.quotes) {
        Some(p) => html.push_str(&p),
        None => {
            for quote in &report.quotes.items {
                html.push_str(&format!(
                    "<blockquote style=\"border-left:3px solid #dadce0;margin:8px 0;padding-left:10px\">\"{}\"<br><small>{} · {} {}</small></blockquote>\n",
                    html_escape(&quote.text),
                    html_escape(&quote.theme),
                    quote.sentiment.emoji(),
                    quote.sentiment
                ));
            }
        }
    }

    html.push_str("<h3>💡 Recommendations</h3>\n");
    match html_placeholder(&report.recommendations) {
        Some(p) => html.push_str(&p),
        None => {
            html.push_str("<ol>\n");
            for rec in &report.recommendations.items {
                html.push_str(&format!(
                    "<li><strong>[{}]</strong> {}",
                    rec.priority,
                    html_escape(&rec.text)
                ));
                if !rec.impact.is_empty() {
                    html.push_str(&format!("<br><small>Impact: {}</small>", html_escape(&rec.impact)));
                }
                html.push_str("</li>\n");
            }
            html.push_str("</ol>\n");
        }
    }

    html.push_str(&format!(
        "<p style=\"color:#5f6368;font-size:12px\">Full report attached. Generated {} with {}.</p>\n",
        meta.generated_at.format("%Y-%m-%d %H:%M UTC"),
        html_escape(&meta.model_used)
    ));
    html.push_str("</body></html>\n");
    html
}
