//! Config linting: unknown-key detection with Levenshtein suggestions
//! and suspicious-value warnings.
//!
//! The raw TOML is walked as a `toml::Value` before serde sees it, so a
//! misspelt key (which serde would silently ignore and replace with a
//! default) is reported with a "did you mean?" suggestion. Warnings never
//! stop a config from loading; hard errors live in [`SystemConfig::validate`].

use std::collections::HashSet;

use super::SystemConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of [`SystemConfig`].
///
/// Kept in step with the section structs in `system_config.rs`.
pub fn known_config_keys() -> HashSet<&'static str> {
    [
        "server",
        "server.addr",
        "server.cors_origins",
        "llm",
        "llm.provider",
        "llm.model",
        "llm.base_url",
        "llm.api_key_env",
        "llm.temperature",
        "llm.max_tokens",
        "llm.request_timeout_secs",
        "pipeline",
        "pipeline.stage_timeout_secs",
        "allocation",
        "allocation.max_distance_km",
        "allocation.candidate_limit",
        "allocation.critical_severity",
        "catalog",
        "catalog.data_dir",
        "catalog.watch",
        "catalog.poll_interval_secs",
        "maps",
        "maps.provider",
        "maps.api_key_env",
        "maps.search_radius_m",
        "maps.request_timeout_secs",
        "reports",
        "reports.dir",
        "audit",
        "audit.log_dir",
        "logging",
        "logging.json",
    ]
    .into_iter()
    .collect()
}

/// Dotted paths of every key and table in a TOML document.
fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let toml::Value::Table(table) = value {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3. Ties go to the
/// alphabetically first key.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut candidates: Vec<&str> = known.iter().copied().collect();
    candidates.sort_unstable();
    candidates
        .into_iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(k, _)| k.to_string())
}

/// Warnings for every key in `raw_toml` that no config section defines.
///
/// Unparseable input yields no warnings; the serde pass reports it.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Suspicious Values
// ============================================================================

/// Values that are legal but probably not what the operator meant.
pub fn check_suspicious_values(config: &SystemConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut warn = |field: &str, message: String| {
        warnings.push(ValidationWarning {
            field: field.to_string(),
            message,
            suggestion: None,
        });
    };

    let critical = config.allocation.critical_severity;
    if !(1..=10).contains(&critical) {
        warn(
            "allocation.critical_severity",
            format!(
                "allocation.critical_severity = {critical} is outside the 1-10 scale; \
                 the two-ambulance default will never or always apply"
            ),
        );
    }

    if let Some(max) = config.allocation.max_distance_km {
        if max > 200.0 {
            warn(
                "allocation.max_distance_km",
                format!("allocation.max_distance_km = {max} is larger than any dispatch area"),
            );
        }
    }

    if let Some(stage) = config.pipeline.stage_timeout() {
        if stage.as_secs() <= config.llm.request_timeout_secs {
            warn(
                "pipeline.stage_timeout_secs",
                format!(
                    "pipeline.stage_timeout_secs = {} does not exceed llm.request_timeout_secs = {}; \
                     stages will time out before the provider does",
                    stage.as_secs(),
                    config.llm.request_timeout_secs
                ),
            );
        }
    }

    if config.llm.provider == "openai" && std::env::var(&config.llm.api_key_env).is_err() {
        warn(
            "llm.api_key_env",
            format!(
                "{} is not set; the template backend will be used instead",
                config.llm.api_key_env
            ),
        );
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================
