//! Resource allocation parsing
//!
//! The parser only reads what the text says. Matching mentioned ids and names
//! against actual catalog candidates is the allocation stage's job.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::sections::{extract_section, normalize_response, strip_list_marker};
use super::ResponseParser;

const ALLOCATION_SECTIONS: &[&str] = &["ambulance", "hospital", "additional"];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocationFindings {
    /// Number of ambulances the response asks for
    pub ambulance_count: Option<usize>,
    /// Ambulance ids named explicitly (structured responses only)
    pub ambulance_ids: Vec<String>,
    /// Hospital id named explicitly (structured responses only)
    pub hospital_id: Option<String>,
    pub additional_resources: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAllocationParser;

impl ResponseParser for HeuristicAllocationParser {
    type Output = AllocationFindings;

    fn parse(&self, text: &str) -> AllocationFindings {
        let text = normalize_response(text);
        AllocationFindings {
            ambulance_count: extract_ambulance_count(&text),
            ambulance_ids: Vec::new(),
            hospital_id: None,
            additional_resources: extract_additional_resources(&text),
        }
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

fn count_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2})\s+(?:[a-z-]+\s+)?ambulances?\b").expect("static regex")
    })
}

/// First "N ambulance(s)" phrase, allowing one qualifier ("2 ALS ambulances").
pub fn extract_ambulance_count(text: &str) -> Option<usize> {
    count_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Items listed under an "Additional ..." heading.
pub fn extract_additional_resources(text: &str) -> Vec<String> {
    extract_section(text, "additional", ALLOCATION_SECTIONS)
        .into_iter()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}

/// Byte offset of the first whole-token occurrence of `needle` (case-insensitive).
///
/// Used to find which catalog ids or names a response mentions and where,
/// so the earliest mention can be preferred.
pub fn find_mention(haystack: &str, needle: &str) -> Option<usize> {
    if needle.trim().is_empty() {
        return None;
    }
    let hay = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';

    let mut from = 0;
    while let Some(offset) = hay[from..].find(&needle) {
        let start = from + offset;
        let end = start + needle.len();
        let before_ok = hay[..start].chars().next_back().map_or(true, |c| !is_word(c));
        let after_ok = hay[end..].chars().next().map_or(true, |c| !is_word(c));
        if before_ok && after_ok {
            return Some(start);
        }
        from = start + needle.len().max(1);
        if from >= hay.len() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambulance_count() {
        assert_eq!(extract_ambulance_count("Dispatch 2 ambulances immediately"), Some(2));
        assert_eq!(extract_ambulance_count("Send 1 ALS ambulance"), Some(1));
        assert_eq!(extract_ambulance_count("3 advanced-life-support ambulances"), Some(3));
        assert_eq!(extract_ambulance_count("Send the nearest ambulance"), None);
        assert_eq!(extract_ambulance_count("Ambulances: 2"), None);
    }

    #[test]
    fn test_additional_resources() {
        let text = "Ambulances: 2\n\nAdditional Resources:\n- Fire department for extrication\n- Police traffic control\n\nNotes";
        assert_eq!(
            extract_additional_resources(text),
            vec!["Fire department for extrication", "Police traffic control"]
        );
        assert!(extract_additional_resources("Additional resources:\n- None").is_empty());
        assert!(extract_additional_resources("nothing here").is_empty());
    }

    #[test]
    fn test_find_mention_whole_token() {
        let text = "Dispatch AMB-002 and amb-010; avoid AMB-0021";
        assert_eq!(find_mention(text, "AMB-002"), Some(9));
        assert!(find_mention(text, "AMB-010").is_some());
        assert_eq!(find_mention("AMB-0021 only", "AMB-002"), None);
        assert_eq!(find_mention(text, ""), None);
    }

    #[test]
    fn test_find_mention_names() {
        let text = "Transport to St. Mary Medical Center for PCI.";
        assert!(find_mention(text, "St. Mary Medical Center").is_some());
        assert!(find_mention(text, "Mary Medical").is_some());
        assert!(find_mention(text, "Medical Cent").is_none());
    }
}
