//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Server
// ============================================================================

pub const SERVER_ADDR: &str = "0.0.0.0:8000";

/// Maximum accepted request body (bytes).
pub const MAX_BODY_BYTES: usize = 64 * 1024;

// ============================================================================
// LLM
// ============================================================================

pub const LLM_MODEL: &str = "gpt-4o-mini";
pub const LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const LLM_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const LLM_TEMPERATURE: f64 = 0.2;
pub const LLM_MAX_TOKENS: u32 = 800;
pub const LLM_REQUEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Pipeline
// ============================================================================

/// Per-stage timeout. Slightly longer than the LLM request timeout so that
/// the HTTP client reports its own timeout first.
pub const STAGE_TIMEOUT_SECS: u64 = 45;

// ============================================================================
// Allocation
// ============================================================================

/// Ranked candidates of each kind included in the allocation prompt.
pub const CANDIDATE_LIMIT: usize = 5;

/// Severity at or above which two ambulances are dispatched by default.
pub const CRITICAL_SEVERITY: i32 = 8;

// ============================================================================
// Catalog
// ============================================================================

pub const DATA_DIR: &str = "data";
pub const AMBULANCES_FILE: &str = "ambulances.json";
pub const HOSPITALS_FILE: &str = "hospitals.json";
pub const PERSONNEL_FILE: &str = "medical_personnel.json";

/// How often dataset mtimes are checked when watching is enabled (seconds).
pub const CATALOG_POLL_INTERVAL_SECS: u64 = 2;

/// Quiet period after a detected change before reloading (milliseconds).
pub const CATALOG_DEBOUNCE_MS: u64 = 500;

// ============================================================================
// Maps
// ============================================================================

pub const MAPS_API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";
pub const MAPS_SEARCH_RADIUS_M: u32 = 5_000;
pub const MAPS_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Reports
// ============================================================================

pub const REPORTS_DIR: &str = "reports";
