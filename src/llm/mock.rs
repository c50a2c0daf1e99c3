//! Scripted backends for tests and offline runs
//!
//! [`StaticBackend`] returns fixed text, optionally chosen by a needle found
//! in the prompt, so a single backend can serve all three stages.
//! [`FailingBackend`] fails every call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::LlmBackend;

#[derive(Debug, Default)]
pub struct StaticBackend {
    fallback: String,
    keyed: Vec<(String, String)>,
    failing_on: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticBackend {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            fallback: response.into(),
            ..Self::default()
        }
    }

    /// Return `response` for any prompt containing `needle`. Earlier keys win.
    #[must_use]
    pub fn keyed(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.keyed.push((needle.into(), response.into()));
        self
    }

    /// Fail any prompt containing `needle`.
    #[must_use]
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.failing_on.push(needle.into());
        self
    }

    /// Sleep before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for StaticBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(needle) = self.failing_on.iter().find(|n| prompt.contains(n.as_str())) {
            return Err(anyhow!("scripted failure for prompt containing '{needle}'"));
        }
        let response = self
            .keyed
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map_or(&self.fallback, |(_, response)| response);
        Ok(response.clone())
    }

    fn backend_name(&self) -> &'static str {
        "static"
    }
}

#[derive(Debug)]
pub struct FailingBackend {
    message: String,
}

impl FailingBackend {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl LlmBackend for FailingBackend {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("{}", self.message))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyed_responses() {
        let backend = StaticBackend::new("default")
            .keyed("severity", "Severity Level: 3")
            .keyed("dispatch", "Dispatch 1 ambulance");

        assert_eq!(backend.generate("assess severity").await.unwrap(), "Severity Level: 3");
        assert_eq!(backend.generate("dispatch now").await.unwrap(), "Dispatch 1 ambulance");
        assert_eq!(backend.generate("other").await.unwrap(), "default");
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_on_needle() {
        let backend = StaticBackend::new("ok").failing_on("guidance");
        assert!(backend.generate("medical guidance").await.is_err());
        assert_eq!(backend.generate("severity").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_failing_backend() {
        let err = FailingBackend::new("quota exceeded").generate("x").await.unwrap_err();
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
