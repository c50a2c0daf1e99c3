//! Text helpers shared by the heuristic parsers
//!
//! All matching is ASCII case-insensitive. `to_ascii_lowercase` keeps byte
//! offsets stable, so positions found in the lowered text index the original.

/// Clean up common LLM output artifacts before parsing.
///
/// Removes `<think>...</think>` reasoning blocks, unescapes literal `\n`
/// sequences and strips surrounding code fences.
pub fn normalize_response(text: &str) -> String {
    let mut text = text.replace("\r\n", "\n").replace("\\n", "\n");

    let lower = text.to_ascii_lowercase();
    if let Some(end) = lower.find("</think>") {
        text = text[end + "</think>".len()..].to_string();
    } else if let Some(start) = lower.find("<think>") {
        // Unclosed block: keep whatever came before it, else drop the tag
        let before = text[..start].trim();
        text = if before.is_empty() {
            text[start + "<think>".len()..].to_string()
        } else {
            before.to_string()
        };
    }

    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```")
        .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed);
    trimmed.trim().to_string()
}

/// Lines following the first heading that contains `keyword`.
///
/// Collection stops at the first blank line or at a line containing any of
/// `section_keywords`, except keywords that are part of `keyword` itself.
/// The heading line is not included. Returned lines are trimmed.
pub fn extract_section<'a>(text: &'a str, keyword: &str, section_keywords: &[&str]) -> Vec<&'a str> {
    let keyword = keyword.to_ascii_lowercase();
    let stops: Vec<&str> = section_keywords
        .iter()
        .copied()
        .filter(|k| !keyword.contains(&k.to_ascii_lowercase()))
        .collect();

    let mut lines = text.lines();
    if !lines.by_ref().any(|l| l.to_ascii_lowercase().contains(&keyword)) {
        return Vec::new();
    }

    let mut section = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        let lower = trimmed.to_ascii_lowercase();
        if stops.iter().any(|k| lower.contains(k)) {
            break;
        }
        section.push(trimmed);
    }
    section
}

/// Remove a leading bullet (`-`, `*`, `•`) or enumerator (`1.`, `2)`).
pub fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))
        .or_else(|| line.strip_prefix('•'))
    {
        return rest.trim_start();
    }

    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim_start();
        }
    }
    line
}

/// Text after the first `": "`, or the whole line when there is none.
pub fn value_after_colon(line: &str) -> &str {
    line.split_once(": ").map_or(line, |(_, v)| v).trim()
}

pub fn contains_any(line: &str, words: &[&str]) -> bool {
    let lower = line.to_ascii_lowercase();
    words.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_think_and_fences() {
        let text = "<think>reasoning here</think>\n```text\nSeverity: 4\n```";
        assert_eq!(normalize_response(text), "Severity: 4");
        assert_eq!(normalize_response("Severity: 4\\n- a"), "Severity: 4\n- a");
        assert_eq!(normalize_response("answer <think> unfinished"), "answer");
    }

    #[test]
    fn test_extract_section_stops_at_blank_and_keywords() {
        let text = "Intro\nTransport Considerations:\nPosition: supine\nMonitor ECG\n\nMonitor later";
        let keywords = ["immediate", "transport", "preparation", "protocol"];
        assert_eq!(
            extract_section(text, "transport", &keywords),
            vec!["Position: supine", "Monitor ECG"]
        );

        let text = "Transport:\nKeep warm\nHospital Preparation:\nCall cath lab";
        assert_eq!(extract_section(text, "transport", &keywords), vec!["Keep warm"]);
    }

    #[test]
    fn test_extract_section_own_keyword_does_not_stop() {
        let text = "Protocols:\nCardiac protocol:\nStep one";
        let keywords = ["immediate", "transport", "preparation", "protocol"];
        assert_eq!(
            extract_section(text, "protocol", &keywords),
            vec!["Cardiac protocol:", "Step one"]
        );
    }

    #[test]
    fn test_extract_section_missing() {
        assert!(extract_section("nothing relevant", "protocol", &[]).is_empty());
        assert!(extract_section("", "protocol", &[]).is_empty());
    }

    #[test]
    fn test_strip_list_marker() {
        assert_eq!(strip_list_marker("- Airway"), "Airway");
        assert_eq!(strip_list_marker("  * Breathing"), "Breathing");
        assert_eq!(strip_list_marker("12. Circulation"), "Circulation");
        assert_eq!(strip_list_marker("3) Disability"), "Disability");
        assert_eq!(strip_list_marker("2023 was a year"), "2023 was a year");
        assert_eq!(strip_list_marker("-"), "");
    }

    #[test]
    fn test_value_after_colon() {
        assert_eq!(value_after_colon("Position: semi-upright"), "semi-upright");
        assert_eq!(value_after_colon("Keep supine"), "Keep supine");
    }
}
