use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::catalog::ResourceCatalog;
use crate::notify::{LogNotifier, Notifier};
use crate::pipeline::IncidentPipeline;
use crate::report::TextReportWriter;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IncidentPipeline>,
    pub catalog: Arc<ResourceCatalog>,
    pub reports: TextReportWriter,
    pub notifier: Arc<dyn Notifier>,
    /// Fires on shutdown; in-flight runs stop at their next stage boundary.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        pipeline: Arc<IncidentPipeline>,
        catalog: Arc<ResourceCatalog>,
        reports: TextReportWriter,
    ) -> Self {
        Self {
            pipeline,
            catalog,
            reports,
            notifier: Arc::new(LogNotifier),
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}
