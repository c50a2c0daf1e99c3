//! Response Parsing
//!
//! Turns free-text reasoning responses into structured stage findings.
//!
//! ## Strategies
//!
//! Every stage parses through the [`ResponseParser`] trait, so the strategy
//! can be swapped without touching the stage:
//!
//! - heuristic parsers ([`HeuristicSeverityParser`], [`HeuristicAllocationParser`],
//!   [`HeuristicGuidanceParser`]) read headed sections and bullet lines
//! - [`JsonFirst`] accepts a response that is a single JSON object matching
//!   the findings schema (optionally fenced) and falls back to a heuristic
//!   parser for anything else, including prose that merely contains braces
//!
//! Parsing never fails. Text that matches nothing yields defaults and empty
//! collections.

pub mod allocation;
pub mod guidance;
pub mod sections;
pub mod severity;

pub use allocation::{AllocationFindings, HeuristicAllocationParser};
pub use guidance::{GuidanceFindings, HeuristicGuidanceParser};
pub use severity::{HeuristicSeverityParser, SeverityFindings, DEFAULT_SEVERITY};

use serde::de::DeserializeOwned;

/// A parsing strategy for one stage's response.
pub trait ResponseParser: Send + Sync {
    type Output;

    /// Parse a response. Must not panic and must not fail.
    fn parse(&self, text: &str) -> Self::Output;

    fn name(&self) -> &'static str;
}

/// Try the response as a JSON object first, then fall back to `inner`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFirst<P> {
    inner: P,
}

impl<P> JsonFirst<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

impl<P> ResponseParser for JsonFirst<P>
where
    P: ResponseParser,
    P::Output: DeserializeOwned,
{
    type Output = P::Output;

    fn parse(&self, text: &str) -> P::Output {
        match structured_body(text).and_then(|json| serde_json::from_str(json).ok()) {
            Some(parsed) => parsed,
            None => self.inner.parse(text),
        }
    }

    fn name(&self) -> &'static str {
        "json_first"
    }
}

/// The response body when the whole response is one `{ ... }` object,
/// ignoring a reasoning preamble and a surrounding code fence.
fn structured_body(text: &str) -> Option<&str> {
    let text = match text.rfind("</think>") {
        Some(end) => &text[end + "</think>".len()..],
        None => text,
    };
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .trim_end()
            .strip_suffix("```")?
            .trim();
    }
    (body.starts_with('{') && body.ends_with('}')).then_some(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_first_accepts_structured_response() {
        let parser = JsonFirst::new(HeuristicSeverityParser);
        let text = "```json\n{\"severity_level\": 9, \"medical_considerations\": [\"STEMI suspected\"]}\n```";
        let findings = parser.parse(text);
        assert_eq!(findings.severity_level, 9);
        assert_eq!(findings.medical_considerations, vec!["STEMI suspected"]);
    }

    #[test]
    fn test_json_first_falls_back_on_text() {
        let parser = JsonFirst::new(HeuristicSeverityParser);
        let findings = parser.parse("Severity: 6\n- Dehydration");
        assert_eq!(findings.severity_level, 6);
        assert_eq!(findings.medical_considerations, vec!["Dehydration"]);
    }

    #[test]
    fn test_json_first_falls_back_on_schema_mismatch() {
        let parser = JsonFirst::new(HeuristicSeverityParser);
        // braces present but not a severity object
        let findings = parser.parse("Severity 4 {\"unrelated\": true}");
        assert_eq!(findings.severity_level, 4);
    }

    #[test]
    fn test_json_first_allocation_ids() {
        let parser = JsonFirst::new(HeuristicAllocationParser);
        let findings = parser.parse(r#"{"ambulance_ids": ["AMB-2"], "hospital_id": "H-1"}"#);
        assert_eq!(findings.ambulance_ids, vec!["AMB-2"]);
        assert_eq!(findings.hospital_id.as_deref(), Some("H-1"));
        assert_eq!(findings.ambulance_count, None);
    }

    #[test]
    fn test_stray_braces_in_prose_use_heuristics() {
        let text = "Immediate Interventions:\n1. Give oxygen\n\nProtocols:\nCardiac:\nUse template {}";
        let findings = JsonFirst::new(HeuristicGuidanceParser).parse(text);
        assert_eq!(findings, HeuristicGuidanceParser.parse(text));
        assert_eq!(findings.immediate_interventions, vec!["Give oxygen"]);
        assert_eq!(findings.medical_protocols.len(), 1);
    }

    #[test]
    fn test_embedded_object_in_allocation_prose_uses_heuristics() {
        let text = "Dispatch 2 ambulances.\nAdditional Resources:\n- Fire engine {\"priority\": 1}";
        let findings = JsonFirst::new(HeuristicAllocationParser).parse(text);
        assert_eq!(findings, HeuristicAllocationParser.parse(text));
        assert_eq!(findings.ambulance_count, Some(2));
    }

    #[test]
    fn test_structured_body() {
        assert_eq!(structured_body(" {\"a\":1} "), Some("{\"a\":1}"));
        assert_eq!(structured_body("```json\n{\"a\":1}\n```"), Some("{\"a\":1}"));
        assert_eq!(structured_body("<think>plan</think>\n{}"), Some("{}"));
        assert_eq!(structured_body("x {\"a\":1} y"), None);
        assert_eq!(structured_body("```json\n{\"a\":1}"), None);
        assert_eq!(structured_body("none"), None);
    }
}
