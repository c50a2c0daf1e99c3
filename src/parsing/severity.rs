//! Severity assessment parsing

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::sections::normalize_response;
use super::ResponseParser;

/// Severity used when the response states none.
pub const DEFAULT_SEVERITY: i32 = 5;

/// Structured content of a severity assessment response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityFindings {
    pub severity_level: i32,
    #[serde(default)]
    pub medical_considerations: Vec<String>,
}

/// Line-based parser for free-form severity assessments.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSeverityParser;

impl ResponseParser for HeuristicSeverityParser {
    type Output = SeverityFindings;

    fn parse(&self, text: &str) -> SeverityFindings {
        let text = normalize_response(text);
        SeverityFindings {
            severity_level: extract_severity(&text),
            medical_considerations: extract_considerations(&text),
        }
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

fn level_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(10|[1-9])\b").expect("static regex"))
}

/// First standalone 1-9 or 10 after the first occurrence of "severity".
///
/// Returns [`DEFAULT_SEVERITY`] when the word is absent or no such number
/// follows it. Digits that are part of longer numbers ("85", "120") are
/// not standalone and never match.
pub fn extract_severity(text: &str) -> i32 {
    let lower = text.to_ascii_lowercase();
    let Some(pos) = lower.find("severity") else {
        return DEFAULT_SEVERITY;
    };
    let rest = &text[pos + "severity".len()..];
    level_regex()
        .captures(rest)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_SEVERITY)
}

/// Lines starting with `-`, in order, with the marker removed.
pub fn extract_considerations(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('-'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
