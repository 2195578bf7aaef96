//! Validation of model responses.
//!
//! Model output is untrusted text. Everything the extractor keeps passes
//! through the parsers here, which either return typed values or a
//! [`SchemaViolation`] explaining what was wrong.

use crate::error::SchemaViolation;
use crate::models::{BusinessRisk, Priority, Quote, Recommendation, Review, Severity, Theme};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Find the first JSON value in a model response.
///
/// Handles bare JSON, markdown code fences and JSON surrounded by prose.
pub fn extract_json(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }

    let re = regex::Regex::new(r"```(?:json|JSON)?\s*\n?([\s\S]*?)\n?```").ok()?;
    for cap in re.captures_iter(s) {
        let Some(body) = cap.get(1) else { continue };
        if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
            return Some(value);
        }
    }

    // Scan for a balanced object or array, skipping brackets inside strings.
    let mut search_from = 0;
    while let Some(offset) = s[search_from..].find(['{', '[']) {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&s[start..]) {
            if let Ok(value) = serde_json::from_str::<Value>(&s[start..start + end]) {
                return Some(value);
            }
        }
        search_from = start + 1;
    }

    None
}

fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// A bare array, or the array under `key` in an object.
fn list_under<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(list) = value.as_array() {
        return Some(list);
    }
    keys.iter().find_map(|key| value.get(*key)?.as_array())
}

fn parse_list(text: &str, field: &'static str, keys: &[&str]) -> Result<Vec<Value>, SchemaViolation> {
    let value = extract_json(text).ok_or(SchemaViolation::NoJson)?;
    list_under(&value, keys)
        .cloned()
        .ok_or(SchemaViolation::MissingList(field))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => s
                .split([',', '/'])
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            StringOrList::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTheme {
    #[serde(alias = "theme")]
    name: Option<String>,
    share: Option<Value>,
    percentage: Option<Value>,
    severity: Option<String>,
    business_risk: Option<StringOrList>,
    description: Option<String>,
}

/// Parse and validate a theme extraction response.
pub fn parse_themes(text: &str) -> Result<Vec<Theme>, SchemaViolation> {
    let entries = parse_list(text, "themes", &["themes"])?;
    if entries.is_empty() {
        return Err(SchemaViolation::Empty("themes"));
    }

    let mut seen = HashSet::new();
    let mut themes = Vec::with_capacity(entries.len());

    for (index, entry) in entries.into_iter().enumerate() {
        let raw: RawTheme = serde_json::from_value(entry).map_err(|e| SchemaViolation::Malformed {
            index,
            detail: e.to_string(),
        })?;

        let name = raw
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(SchemaViolation::MissingField { index, field: "name" })?;

        let share = match (raw.share, raw.percentage) {
            (Some(share), _) => {
                let value = share
                    .as_f64()
                    .ok_or(SchemaViolation::NonNumericShare { index })?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(SchemaViolation::ShareOutOfRange { index, value });
                }
                value
            }
            (None, Some(percentage)) => {
                let value = percentage
                    .as_f64()
                    .ok_or(SchemaViolation::NonNumericShare { index })?;
                if !(0.0..=100.0).contains(&value) {
                    return Err(SchemaViolation::ShareOutOfRange { index, value });
                }
                value / 100.0
            }
            (None, None) => return Err(SchemaViolation::MissingField { index, field: "share" }),
        };

        let severity_raw = raw
            .severity
            .ok_or(SchemaViolation::MissingField { index, field: "severity" })?;
        let severity = Severity::parse(&severity_raw).ok_or(SchemaViolation::UnknownValue {
            index,
            field: "severity",
            value: severity_raw,
        })?;

        let business_risk: BTreeSet<BusinessRisk> = raw
            .business_risk
            .map(StringOrList::into_vec)
            .unwrap_or_default()
            .iter()
            .map(|r| BusinessRisk::from(r.as_str()))
            .collect();

        if !seen.insert(name.to_lowercase()) {
            return Err(SchemaViolation::DuplicateTheme(name));
        }

        themes.push(Theme {
            name,
            share,
            severity,
            business_risk,
            description: raw.description.unwrap_or_default().trim().to_string(),
        });
    }

    Ok(themes)
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(alias = "text")]
    quote: Option<String>,
    theme: Option<String>,
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn strip_quote_marks(s: &str) -> &str {
    s.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '‘' | '’'))
        .trim()
}

/// Parse a quote selection response and keep only verbatim quotes.
///
/// A quote survives when it is a case- and whitespace-insensitive
/// substring of some review; its sentiment comes from that review.
pub fn parse_quotes(
    text: &str,
    reviews: &[Review],
    max_quotes: usize,
) -> Result<Vec<Quote>, SchemaViolation> {
    let entries = parse_list(text, "quotes", &["quotes"])?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let haystacks: Vec<String> = reviews.iter().map(|r| normalize(&r.text)).collect();
    let mut seen = HashSet::new();
    let mut quotes = Vec::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let raw: RawQuote = serde_json::from_value(entry).map_err(|e| SchemaViolation::Malformed {
            index,
            detail: e.to_string(),
        })?;

        let quote_text = raw
            .quote
            .as_deref()
            .map(strip_quote_marks)
            .filter(|q| !q.is_empty())
            .ok_or(SchemaViolation::MissingField { index, field: "quote" })?
            .to_string();
        let theme = raw
            .theme
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(SchemaViolation::MissingField { index, field: "theme" })?;

        let needle = normalize(&quote_text);
        let Some(source) = haystacks.iter().position(|h| h.contains(&needle)) else {
            debug!("Discarding quote {} with no matching review", index);
            continue;
        };

        if quotes.len() < max_quotes && seen.insert(needle) {
            quotes.push(Quote {
                text: quote_text,
                theme,
                sentiment: reviews[source].sentiment(),
            });
        }
    }

    if quotes.is_empty() {
        return Err(SchemaViolation::UnverifiedQuotes);
    }
    Ok(quotes)
}

#[derive(Debug, Deserialize)]
struct RawRecommendation {
    priority: Option<Value>,
    #[serde(alias = "action")]
    text: Option<String>,
    impact: Option<String>,
    user_impact: Option<String>,
    business_impact: Option<String>,
    #[serde(alias = "theme")]
    themes: Option<StringOrList>,
}

fn parse_recommendation(index: usize, entry: Value) -> Result<Recommendation, SchemaViolation> {
    let raw: RawRecommendation =
        serde_json::from_value(entry).map_err(|e| SchemaViolation::Malformed {
            index,
            detail: e.to_string(),
        })?;

    let priority_raw = match raw.priority {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
        None => {
            return Err(SchemaViolation::MissingField {
                index,
                field: "priority",
            })
        }
    };
    let priority = Priority::parse(&priority_raw).ok_or(SchemaViolation::UnknownValue {
        index,
        field: "priority",
        value: priority_raw,
    })?;

    let text = raw
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(SchemaViolation::MissingField { index, field: "text" })?;

    let impact = match raw.impact.filter(|i| !i.trim().is_empty()) {
        Some(impact) => impact.trim().to_string(),
        None => [
            raw.user_impact.map(|u| format!("Users: {}", u.trim())),
            raw.business_impact.map(|b| format!("Business: {}", b.trim())),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("; "),
    };

    Ok(Recommendation {
        priority,
        text,
        impact,
        themes: raw.themes.map(StringOrList::into_vec).unwrap_or_default(),
    })
}

/// Recommendations and executive highlights come back in one response
/// but are validated independently.
pub struct RecommendationResponse {
    pub recommendations: Result<Vec<Recommendation>, SchemaViolation>,
    pub highlights: Result<Vec<String>, SchemaViolation>,
}

pub fn parse_recommendation_response(text: &str) -> RecommendationResponse {
    let Some(value) = extract_json(text) else {
        return RecommendationResponse {
            recommendations: Err(SchemaViolation::NoJson),
            highlights: Err(SchemaViolation::NoJson),
        };
    };

    let recommendations = match list_under(&value, &["recommendations", "actions"]) {
        None => Err(SchemaViolation::MissingList("recommendations")),
        Some(list) if list.is_empty() => Err(SchemaViolation::Empty("recommendations")),
        Some(list) => list
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, entry)| parse_recommendation(index, entry))
            .collect(),
    };

    let highlights = if value.is_array() {
        Err(SchemaViolation::MissingList("summary"))
    } else {
        match list_under(&value, &["summary", "executive_summary", "highlights"]) {
            None => Err(SchemaViolation::MissingList("summary")),
            Some(list) => list
                .iter()
                .enumerate()
                .map(|(index, v)| {
                    v.as_str()
                        .map(|s| s.trim().to_string())
                        .ok_or(SchemaViolation::Malformed {
                            index,
                            detail: "summary bullet is not a string".to_string(),
                        })
                })
                .filter(|r| !matches!(r, Ok(s) if s.is_empty()))
                .collect(),
        }
    };

    RecommendationResponse {
        recommendations,
        highlights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Platform, Sentiment};
    use crate::testing::{day, review};

    #[test]
    fn test_extract_json_variants() {
        assert!(extract_json(r#"[{"a": 1}]"#).unwrap().is_array());

        let fenced = "Here you go:\n```json\n{\"themes\": []}\n```\nThanks";
        assert!(extract_json(fenced).unwrap().get("themes").is_some());

        let prose = "Sure! {\"themes\": [{\"name\": \"a [b]\"}]} hope that helps";
        let value = extract_json(prose).unwrap();
        assert_eq!(value["themes"][0]["name"], "a [b]");

        assert!(extract_json("I cannot help with that.").is_none());
        assert!(extract_json("[unclosed").is_none());
    }

    #[test]
    fn test_parse_themes_object_and_array_shapes() {
        let obj = r#"{"themes": [{"name": "Login", "share": 0.3, "severity": "High",
            "business_risk": ["Trust", "Churn"], "description": "Cannot log in"}]}"#;
        let themes = parse_themes(obj).unwrap();
        assert_eq!(themes.len(), 1);
        assert_eq!(themes[0].severity, Severity::High);
        assert_eq!(themes[0].business_risk.len(), 2);

        let arr = r#"[{"theme": "Payments", "percentage": 25, "severity": "medium", "business_risk": "Revenue"}]"#;
        let themes = parse_themes(arr).unwrap();
        assert_eq!(themes[0].name, "Payments");
        assert!((themes[0].share - 0.25).abs() < 1e-9);
        assert!(themes[0].business_risk.contains(&BusinessRisk::Revenue));
        assert_eq!(themes[0].description, "");
    }

    #[test]
    fn test_parse_themes_rejections() {
        assert_eq!(
            parse_themes(r#"[{"name": "A", "share": "lots", "severity": "High"}]"#),
            Err(SchemaViolation::NonNumericShare { index: 0 })
        );
        assert_eq!(
            parse_themes(r#"[{"name": "A", "share": 1.5, "severity": "High"}]"#),
            Err(SchemaViolation::ShareOutOfRange {
                index: 0,
                value: 1.5
            })
        );
        assert!(matches!(
            parse_themes(r#"[{"name": "A", "share": 0.2, "severity": "Urgent"}]"#),
            Err(SchemaViolation::UnknownValue {
                field: "severity",
                ..
            })
        ));
        assert_eq!(
            parse_themes(r#"[{"share": 0.2, "severity": "Low"}]"#),
            Err(SchemaViolation::MissingField {
                index: 0,
                field: "name"
            })
        );
        assert_eq!(
            parse_themes(r#"{"themes": []}"#),
            Err(SchemaViolation::Empty("themes"))
        );
        assert_eq!(
            parse_themes(r#"{"topics": []}"#),
            Err(SchemaViolation::MissingList("themes"))
        );
        assert_eq!(parse_themes("no json here"), Err(SchemaViolation::NoJson));
        assert_eq!(
            parse_themes(
                r#"[{"name": "Login", "share": 0.2, "severity": "Low"},
                    {"name": "login", "share": 0.1, "severity": "Low"}]"#
            ),
            Err(SchemaViolation::DuplicateTheme("login".to_string()))
        );
    }

    #[test]
    fn test_parse_quotes_verifies_against_reviews() {
        let reviews = vec![
            review(Platform::Android, 1, "Withdrawal is stuck,  customer support not responding!", day(2)),
            review(Platform::Ios, 5, "Great app for beginners", day(3)),
        ];
        let response = r#"{"quotes": [
            {"quote": "\"withdrawal is stuck, customer support not responding\"", "theme": "Payments"},
            {"quote": "Best broker ever made", "theme": "Praise"},
            {"text": "great app for beginners", "theme": "UX"}
        ]}"#;

        let quotes = parse_quotes(response, &reviews, 3).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].sentiment, Sentiment::Negative);
        assert_eq!(quotes[0].theme, "Payments");
        assert_eq!(quotes[1].sentiment, Sentiment::Positive);

        let capped = parse_quotes(response, &reviews, 1).unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn test_parse_quotes_all_fabricated() {
        let reviews = vec![review(Platform::Android, 2, "slow", day(2))];
        assert_eq!(
            parse_quotes(r#"[{"quote": "totally invented", "theme": "X"}]"#, &reviews, 3),
            Err(SchemaViolation::UnverifiedQuotes)
        );
        assert_eq!(parse_quotes("[]", &reviews, 3), Ok(Vec::new()));
    }

    #[test]
    fn test_parse_recommendation_response() {
        let response = r#"```json
{"summary": ["Ratings fell", "  "],
 "recommendations": [
   {"priority": "p1", "text": "Add withdrawal tracking", "impact": "Fewer tickets", "themes": ["Payments"]},
   {"priority": "P0", "action": "Fix login crash", "user_impact": "Can sign in", "business_impact": "Less churn", "theme": "Login"}
 ]}
```"#;
        let parsed = parse_recommendation_response(response);
        let recs = parsed.recommendations.unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].priority, Priority::P1);
        assert_eq!(recs[1].text, "Fix login crash");
        assert_eq!(recs[1].impact, "Users: Can sign in; Business: Less churn");
        assert_eq!(recs[1].themes, vec!["Login".to_string()]);
        assert_eq!(parsed.highlights.unwrap(), vec!["Ratings fell".to_string()]);
    }

    #[test]
    fn test_recommendation_fields_degrade_independently() {
        let parsed = parse_recommendation_response(
            r#"{"summary": ["Ok"], "recommendations": [{"priority": "P7", "text": "x"}]}"#,
        );
        assert!(matches!(
            parsed.recommendations,
            Err(SchemaViolation::UnknownValue {
                field: "priority",
                ..
            })
        ));
        assert!(parsed.highlights.is_ok());

        let parsed = parse_recommendation_response(r#"{"recommendations": []}"#);
        assert_eq!(
            parsed.recommendations,
            Err(SchemaViolation::Empty("recommendations"))
        );
        assert_eq!(
            parsed.highlights,
            Err(SchemaViolation::MissingList("summary"))
        );
    }
}
