//! System configuration loaded from TOML

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "EMS_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "ems_config.toml";

const LLM_PROVIDERS: &[&str] = &["openai", "template"];
const MAPS_PROVIDERS: &[&str] = &["none", "google"];

/// Complete coordinator configuration.
///
/// Every field has a default, so an empty TOML file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub maps: MapsConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SystemConfig {
    /// Load configuration using the standard search order:
    /// 1. `$EMS_CONFIG` environment variable
    /// 2. `./ems_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        Self::load_with_source().0
    }

    /// Like [`SystemConfig::load`], also returning the file the config came
    /// from (`None` for built-in defaults).
    pub fn load_with_source() -> (Self, Option<PathBuf>) {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from EMS_CONFIG");
                        return (config, Some(p));
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from EMS_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "EMS_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./ems_config.toml");
                    return (config, Some(local));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./ems_config.toml, using defaults");
                }
            }
        }

        info!("No ems_config.toml found, using built-in defaults");
        (Self::default(), None)
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        for warning in super::validate_unknown_keys(&contents) {
            warn!(path = %path.display(), field = %warning.field, "{warning}");
        }
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.server.addr.trim().is_empty() {
            errors.push("server.addr must not be empty".to_string());
        }

        if !LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            errors.push(format!(
                "llm.provider: unknown provider '{}' (expected one of {:?})",
                self.llm.provider, LLM_PROVIDERS
            ));
        }
        if !self.llm.temperature.is_finite() || !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push(format!(
                "llm.temperature must be within [0, 2] (got {})",
                self.llm.temperature
            ));
        }
        if self.llm.max_tokens == 0 {
            errors.push("llm.max_tokens must be > 0".to_string());
        }
        if self.llm.request_timeout_secs == 0 {
            errors.push("llm.request_timeout_secs must be > 0".to_string());
        }
        if self.llm.model.trim().is_empty() {
            errors.push("llm.model must not be empty".to_string());
        }

        if let Some(max) = self.allocation.max_distance_km {
            if !max.is_finite() || max <= 0.0 {
                errors.push(format!("allocation.max_distance_km must be > 0 (got {max})"));
            }
        }
        if self.allocation.candidate_limit == 0 {
            errors.push("allocation.candidate_limit must be > 0".to_string());
        }

        if self.catalog.watch && self.catalog.poll_interval_secs == 0 {
            errors.push("catalog.poll_interval_secs must be > 0 when catalog.watch is enabled".to_string());
        }

        if !MAPS_PROVIDERS.contains(&self.maps.provider.as_str()) {
            errors.push(format!(
                "maps.provider: unknown provider '{}' (expected one of {:?})",
                self.maps.provider, MAPS_PROVIDERS
            ));
        }
        if self.maps.search_radius_m == 0 {
            errors.push("maps.search_radius_m must be > 0".to_string());
        }
        if self.maps.request_timeout_secs == 0 {
            errors.push("maps.request_timeout_secs must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address. Can be overridden by `--addr`.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            cors_origins: Vec::new(),
        }
    }
}

// ============================================================================
// LLM
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// `openai` or `template`
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f64,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_model() -> String { defaults::LLM_MODEL.to_string() }
fn default_llm_base_url() -> String { defaults::LLM_BASE_URL.to_string() }
fn default_llm_api_key_env() -> String { defaults::LLM_API_KEY_ENV.to_string() }
fn default_llm_temperature() -> f64 { defaults::LLM_TEMPERATURE }
fn default_llm_max_tokens() -> u32 { defaults::LLM_MAX_TOKENS }
fn default_llm_request_timeout() -> u64 { defaults::LLM_REQUEST_TIMEOUT_SECS }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: default_llm_api_key_env(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            request_timeout_secs: default_llm_request_timeout(),
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-stage timeout in seconds; 0 disables the timeout.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,
}

fn default_stage_timeout() -> u64 { defaults::STAGE_TIMEOUT_SECS }

impl PipelineConfig {
    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_secs > 0).then(|| Duration::from_secs(self.stage_timeout_secs))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
        }
    }
}

// ============================================================================
// Allocation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Exclude resources farther than this from the incident. Unbounded when unset.
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    #[serde(default = "default_critical_severity")]
    pub critical_severity: i32,
}

fn default_candidate_limit() -> usize { defaults::CANDIDATE_LIMIT }
fn default_critical_severity() -> i32 { defaults::CRITICAL_SEVERITY }

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_distance_km: None,
            candidate_limit: default_candidate_limit(),
            critical_severity: default_critical_severity(),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Reload datasets automatically when their files change
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_data_dir() -> PathBuf { PathBuf::from(defaults::DATA_DIR) }
fn default_poll_interval() -> u64 { defaults::CATALOG_POLL_INTERVAL_SECS }

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            watch: false,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

// ============================================================================
// Maps
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapsConfig {
    /// `none` or `google`
    #[serde(default = "default_maps_provider")]
    pub provider: String,
    #[serde(default = "default_maps_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_radius")]
    pub search_radius_m: u32,
    #[serde(default = "default_maps_timeout")]
    pub request_timeout_secs: u64,
}

fn default_maps_provider() -> String { "none".to_string() }
fn default_maps_api_key_env() -> String { defaults::MAPS_API_KEY_ENV.to_string() }
fn default_search_radius() -> u32 { defaults::MAPS_SEARCH_RADIUS_M }
fn default_maps_timeout() -> u64 { defaults::MAPS_REQUEST_TIMEOUT_SECS }

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            provider: default_maps_provider(),
            api_key_env: default_maps_api_key_env(),
            search_radius_m: default_search_radius(),
            request_timeout_secs: default_maps_timeout(),
        }
    }
}

// ============================================================================
// Reports, Audit, Logging
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_reports_dir")]
    pub dir: PathBuf,
}

fn default_reports_dir() -> PathBuf { PathBuf::from(defaults::REPORTS_DIR) }

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: default_reports_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Directory for JSONL audit logs. Audit entries only go to tracing when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: SystemConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.server.addr, "0.0.0.0:8000");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pipeline.stage_timeout_secs, defaults::STAGE_TIMEOUT_SECS);
        assert_eq!(config.allocation.max_distance_km, None);
        assert_eq!(config.maps.provider, "none");
        assert_eq!(config.reports.dir, PathBuf::from("reports"));
        assert!(config.audit.log_dir.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: SystemConfig = toml::from_str(
            r#"
            [allocation]
            max_distance_km = 25.0

            [llm]
            provider = "template"
            "#,
        )
        .unwrap();
        assert_eq!(config.allocation.max_distance_km, Some(25.0));
        assert_eq!(config.allocation.candidate_limit, defaults::CANDIDATE_LIMIT);
        assert_eq!(config.llm.provider, "template");
        assert_eq!(config.llm.model, defaults::LLM_MODEL);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = SystemConfig::default();
        config.server.addr = " ".to_string();
        config.llm.temperature = 3.5;
        config.allocation.candidate_limit = 0;
        config.allocation.max_distance_km = Some(-1.0);
        config.maps.provider = "bing".to_string();

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 5, "got {errors:?}");
                assert!(errors.iter().any(|e| e.contains("maps.provider")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_stage_timeout_disables() {
        let config = PipelineConfig { stage_timeout_secs: 0 };
        assert!(config.stage_timeout().is_none());
        assert_eq!(
            PipelineConfig::default().stage_timeout(),
            Some(Duration::from_secs(defaults::STAGE_TIMEOUT_SECS))
        );
    }

    #[test]
    fn test_toml_round_trips() {
        let config = SystemConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: SystemConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.addr, config.server.addr);
    }
}
