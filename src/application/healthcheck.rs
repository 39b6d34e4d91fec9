//! Operational health reporting.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

/// A dependency whose availability is part of the service health.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn component(&self) -> &'static str;

    async fn check(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub component: &'static str,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: Vec<ComponentHealth>,
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
}

#[derive(Clone, Default)]
pub struct HealthcheckService {
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl HealthcheckService {
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self { probes }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Run every probe concurrently. The overall status is degraded when any
    /// probe fails; an empty probe set reports ok.
    pub async fn healthcheck(&self) -> HealthReport {
        let checks = join_all(self.probes.iter().map(|probe| async move {
            match probe.check().await {
                Ok(()) => ComponentHealth {
                    component: probe.component(),
                    status: HealthStatus::Ok,
                    detail: None,
                },
                Err(detail) => {
                    warn!(
                        target = "tenancy::health",
                        component = probe.component(),
                        detail = %detail,
                        "health probe failed"
                    );
                    ComponentHealth {
                        component: probe.component(),
                        status: HealthStatus::Degraded,
                        detail: Some(detail),
                    }
                }
            }
        }))
        .await;

        let status = if checks.iter().all(|check| check.status == HealthStatus::Ok) {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            checks,
            checked_at: OffsetDateTime::now_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProbe {
        name: &'static str,
        outcome: Result<(), &'static str>,
    }

    #[async_trait]
    impl HealthProbe for StaticProbe {
        fn component(&self) -> &'static str {
            self.name
        }

        async fn check(&self) -> Result<(), String> {
            self.outcome.map_err(str::to_string)
        }
    }

    #[tokio::test]
    async fn all_probes_ok() {
        let service = HealthcheckService::default().with_probe(Arc::new(StaticProbe {
            name: "database",
            outcome: Ok(()),
        }));
        let report = service.healthcheck().await;
        assert_eq!(report.status, HealthStatus::Ok);
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks[0].detail, None);
    }

    #[tokio::test]
    async fn failing_probe_degrades_report() {
        let service = HealthcheckService::new(vec![
            Arc::new(StaticProbe {
                name: "database",
                outcome: Err("connection refused"),
            }),
            Arc::new(StaticProbe {
                name: "cache",
                outcome: Ok(()),
            }),
        ]);
        let report = service.healthcheck().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.checks[0].component, "database");
        assert_eq!(report.checks[0].detail.as_deref(), Some("connection refused"));
        assert_eq!(report.checks[1].status, HealthStatus::Ok);
    }

    #[tokio::test]
    async fn report_serializes_with_rfc3339_timestamp() {
        let report = HealthcheckService::default().healthcheck().await;
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "ok");
        assert!(value["checked_at"].as_str().unwrap().contains('T'));
        assert_eq!(value["checks"], serde_json::json!([]));
    }
}
