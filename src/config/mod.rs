//! Configuration Module
//!
//! Runtime configuration loaded from a TOML file. Every section is passed
//! explicitly to the component that needs it; there is no global config.
//!
//! ## Loading Order
//!
//! 1. `EMS_CONFIG` environment variable (path to TOML file)
//! 2. `ems_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! CLI flags in `main` override individual values after loading.
//!
//! Unknown keys are reported as warnings with a suggested spelling (see
//! [`validation`]); they never stop the service from starting.

pub mod defaults;
mod system_config;
pub mod validation;

pub use system_config::*;
pub use validation::{check_suspicious_values, validate_unknown_keys, ValidationWarning};
