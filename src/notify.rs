//! Notification delivery
//!
//! After a successful run the coordinator tells dispatch, the receiving
//! hospital and any status subscribers. Delivery failures are reported to
//! the caller, which logs them; they never fail the incident.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::types::{DecisionBundle, Incident, RankedResource};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Alert dispatch with the incident and the recommended units.
    async fn notify_emergency_services(
        &self,
        incident: &Incident,
        bundle: &DecisionBundle,
    ) -> Result<(), NotifyError>;

    /// Pre-alert the receiving hospital.
    async fn notify_hospital(
        &self,
        hospital: &RankedResource,
        incident: &Incident,
        bundle: &DecisionBundle,
    ) -> Result<(), NotifyError>;

    async fn send_status_update(&self, incident: &Incident, status: &str) -> Result<(), NotifyError>;

    fn notifier_name(&self) -> &'static str;
}

/// Notifier that writes each notification to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_emergency_services(
        &self,
        incident: &Incident,
        bundle: &DecisionBundle,
    ) -> Result<(), NotifyError> {
        let units = bundle.resource_allocation.recommended_resources.assigned_ids();
        info!(
            target: "notify",
            incident_id = %incident.id,
            severity = bundle.severity_analysis.severity_level,
            location = %incident.location.display_name(),
            units = %units.join(","),
            "Emergency services notified"
        );
        Ok(())
    }

    async fn notify_hospital(
        &self,
        hospital: &RankedResource,
        incident: &Incident,
        bundle: &DecisionBundle,
    ) -> Result<(), NotifyError> {
        info!(
            target: "notify",
            incident_id = %incident.id,
            hospital = %hospital.resource.label(),
            distance_km = hospital.distance_km,
            preparations = bundle.medical_guidance.hospital_preparations.immediate_needs.len(),
            "Hospital notified"
        );
        Ok(())
    }

    async fn send_status_update(&self, incident: &Incident, status: &str) -> Result<(), NotifyError> {
        info!(target: "notify", incident_id = %incident.id, status, "Status update sent");
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "log"
    }
}

/// Send every notification for a finished run, returning how many failed.
pub async fn dispatch_notifications(
    notifier: &dyn Notifier,
    incident: &Incident,
    bundle: &DecisionBundle,
) -> usize {
    let mut results = vec![notifier.notify_emergency_services(incident, bundle).await];
    if let Some(hospital) = &bundle.resource_allocation.recommended_resources.hospital {
        results.push(notifier.notify_hospital(hospital, incident, bundle).await);
    }
    results.push(notifier.send_status_update(incident, "resources_recommended").await);

    let mut failed = 0;
    for err in results.into_iter().filter_map(Result::err) {
        failed += 1;
        tracing::warn!(
            incident_id = %incident.id,
            notifier = notifier.notifier_name(),
            error = %err,
            "Notification failed"
        );
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DownNotifier;

    #[async_trait]
    impl Notifier for DownNotifier {
        async fn notify_emergency_services(&self, _: &Incident, _: &DecisionBundle) -> Result<(), NotifyError> {
            Err(NotifyError::Unavailable("pager gateway down".into()))
        }
        async fn notify_hospital(
            &self,
            _: &RankedResource,
            _: &Incident,
            _: &DecisionBundle,
        ) -> Result<(), NotifyError> {
            Ok(())
        }
        async fn send_status_update(&self, _: &Incident, _: &str) -> Result<(), NotifyError> {
            Err(NotifyError::Unavailable("sms gateway down".into()))
        }
        fn notifier_name(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_raised() {
        let (incident, bundle) = crate::report::tests::sample();
        assert_eq!(dispatch_notifications(&DownNotifier, &incident, &bundle).await, 2);
        assert_eq!(dispatch_notifications(&LogNotifier, &incident, &bundle).await, 0);
    }
}
