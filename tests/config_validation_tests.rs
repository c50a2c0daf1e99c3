//! Config Validation Tests
//!
//! Exercises unknown-key detection, suspicious-value warnings and the hard
//! validation errors independently from the rest of the service.

use std::io::Write;

use emergency_response::config::validation::{known_config_keys, suggest_correction};
use emergency_response::config::{
    check_suspicious_values, validate_unknown_keys, ConfigError, SystemConfig,
};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_llm_section_warns_with_suggestion() {
    let toml_str = r#"
[llm]
temprature = 0.4
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "llm.temprature");
    assert_eq!(warnings[0].suggestion.as_deref(), Some("llm.temperature"));
    assert!(warnings[0].to_string().contains("did you mean 'llm.temperature'"));
}

#[test]
fn typo_in_section_name_warns() {
    let toml_str = r#"
[alocation]
candidate_limit = 3
"#;
    let warnings = validate_unknown_keys(toml_str);
    let fields: Vec<_> = warnings.iter().map(|w| w.field.as_str()).collect();
    assert!(fields.contains(&"alocation"));
    assert!(fields.contains(&"alocation.candidate_limit"));
    let section = warnings.iter().find(|w| w.field == "alocation").unwrap();
    assert_eq!(section.suggestion.as_deref(), Some("allocation"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[server]
addr = "127.0.0.1:9000"
cors_origins = ["http://localhost:3000"]

[llm]
provider = "template"
model = "gpt-4o-mini"
temperature = 0.2

[allocation]
max_distance_km = 30.0
critical_severity = 8

[catalog]
data_dir = "data"
watch = true

[maps]
provider = "none"

[audit]
log_dir = "logs"

[logging]
json = true
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn unrelated_key_gets_no_suggestion() {
    let warnings = validate_unknown_keys("completely_unrelated_setting = 1");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].suggestion.is_none());
}

#[test]
fn unparseable_toml_produces_no_warnings() {
    assert!(validate_unknown_keys("[llm\nprovider = ").is_empty());
}

#[test]
fn suggest_correction_prefers_closest() {
    let known = known_config_keys();
    assert_eq!(
        suggest_correction("maps.search_radius", &known).as_deref(),
        Some("maps.search_radius_m")
    );
    assert_eq!(suggest_correction("reports.dirs", &known).as_deref(), Some("reports.dir"));
}

// ============================================================================
// Suspicious Values
// ============================================================================

#[test]
fn default_template_config_has_no_suspicious_values() {
    let mut config = SystemConfig::default();
    config.llm.provider = "template".to_string();
    assert!(check_suspicious_values(&config).is_empty());
}

#[test]
fn huge_max_distance_warns() {
    let mut config = SystemConfig::default();
    config.llm.provider = "template".to_string();
    config.allocation.max_distance_km = Some(5_000.0);
    let warnings = check_suspicious_values(&config);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "allocation.max_distance_km");
}

// ============================================================================
// Hard Validation
// ============================================================================

#[test]
fn load_from_file_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[llm]\nprovider = \"claude\"\nmax_tokens = 0").unwrap();

    match SystemConfig::load_from_file(file.path()) {
        Err(ConfigError::Validation(errors)) => {
            assert_eq!(errors.len(), 2, "got {errors:?}");
            assert!(errors.iter().any(|e| e.contains("llm.provider")));
            assert!(errors.iter().any(|e| e.contains("llm.max_tokens")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn load_from_file_reports_parse_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[allocation]\ncandidate_limit = \"five\"").unwrap();
    assert!(matches!(
        SystemConfig::load_from_file(file.path()),
        Err(ConfigError::Parse(..))
    ));
}

#[test]
fn load_from_file_tolerates_unknown_keys() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[llm]\nprovider = \"template\"\nmodle = \"typo\"\n\n[reports]\ndir = \"out\""
    )
    .unwrap();
    let config = SystemConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.llm.provider, "template");
    assert_eq!(config.reports.dir, std::path::PathBuf::from("out"));
}

#[test]
fn watch_requires_poll_interval() {
    let mut config = SystemConfig::default();
    config.catalog.watch = true;
    config.catalog.poll_interval_secs = 0;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("catalog.poll_interval_secs"));
}
