//! LLM Backend Module
//!
//! Provides a unified interface for the external reasoning call used by every
//! advisory stage: a free-text prompt goes in, free text comes out.
//!
//! ## Backends
//!
//! - [`OpenAiBackend`]: chat completions over HTTP (OpenAI-compatible APIs)
//! - [`TemplateBackend`]: deterministic offline responses, used when no API
//!   key is configured
//! - [`mock`]: scripted and failing backends for tests and simulations
//!
//! Any error returned by a backend is treated as a call-level failure by the
//! calling stage. Response content is never validated here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::LlmConfig;

pub mod mock;
mod openai;
mod template;

pub use mock::{FailingBackend, StaticBackend};
pub use openai::OpenAiBackend;
pub use template::TemplateBackend;

/// Unified trait for LLM backends
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response from the LLM given a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Factory for creating LLM backends
pub struct LlmFactory;

impl LlmFactory {
    /// Create the configured backend.
    ///
    /// `openai` without an API key in the environment falls back to the
    /// template backend with a warning, so the service still starts offline.
    pub fn create(config: &LlmConfig) -> Arc<dyn LlmBackend> {
        match config.provider.as_str() {
            "openai" => match std::env::var(&config.api_key_env) {
                Ok(key) if !key.trim().is_empty() => {
                    let backend = OpenAiBackend::new(
                        key,
                        &config.model,
                        config.temperature,
                        config.max_tokens,
                        Duration::from_secs(config.request_timeout_secs),
                    )
                    .with_base_url(&config.base_url);
                    tracing::info!(
                        backend = backend.backend_name(),
                        model = %config.model,
                        "LLM backend initialised"
                    );
                    Arc::new(backend)
                }
                _ => {
                    tracing::warn!(
                        env = %config.api_key_env,
                        "OpenAI provider selected but API key is not set, using template backend"
                    );
                    Arc::new(TemplateBackend::new())
                }
            },
            other => {
                if other != "template" {
                    tracing::warn!(provider = %other, "Unknown LLM provider, using template backend");
                }
                tracing::info!(backend = "template", "LLM backend initialised");
                Arc::new(TemplateBackend::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_falls_back_without_key() {
        let config = LlmConfig {
            api_key_env: "EMS_TEST_LLM_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(LlmFactory::create(&config).backend_name(), "template");
    }

    #[test]
    fn test_factory_template_provider() {
        let config = LlmConfig {
            provider: "template".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(LlmFactory::create(&config).backend_name(), "template");
    }
}
