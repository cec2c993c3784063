//! Composite health of the gateway's dependent subsystems.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::warn;

use crate::{Error, Result};

/// Default bound on a single probe call.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Unhealthy,
}

impl From<bool> for ComponentStatus {
    fn from(healthy: bool) -> Self {
        if healthy {
            ComponentStatus::Healthy
        } else {
            ComponentStatus::Unhealthy
        }
    }
}

/// Health response payload. Always computed fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: ComponentStatus,
    pub timestamp: DateTime<Utc>,
    pub components: BTreeMap<String, ComponentStatus>,
}

impl HealthSnapshot {
    /// Snapshot reported when the aggregation itself could not run.
    pub fn unavailable() -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            timestamp: Utc::now(),
            components: BTreeMap::new(),
        }
    }
}

/// Availability check for one dependent subsystem.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Component name used as the key in the snapshot.
    fn name(&self) -> &str;

    async fn health_check(&self) -> Result<bool>;
}

/// Anything that can produce a [`HealthSnapshot`].
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<HealthSnapshot>;
}

/// Polls every probe concurrently, each under its own timeout.
pub struct HealthAggregator {
    probes: Vec<Arc<dyn HealthProbe>>,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self {
            probes,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }
}

#[async_trait]
impl HealthCheck for HealthAggregator {
    /// Every configured probe appears in the snapshot. A probe that errors,
    /// times out or panics is marked unhealthy without affecting the others.
    async fn check(&self) -> Result<HealthSnapshot> {
        let mut components = BTreeMap::new();
        let mut tasks = Vec::with_capacity(self.probes.len());

        for probe in &self.probes {
            let name = probe.name().to_string();
            components.insert(name.clone(), ComponentStatus::Unhealthy);

            let probe = Arc::clone(probe);
            let probe_timeout = self.probe_timeout;
            let task = tokio::spawn(async move { run_probe(probe, probe_timeout).await });
            tasks.push((name, task));
        }

        for (name, task) in tasks {
            match task.await {
                Ok(status) => {
                    components.insert(name, status);
                }
                Err(e) => warn!(component = %name, error = %e, "health probe task failed"),
            }
        }

        let status = ComponentStatus::from(
            components
                .values()
                .all(|status| *status == ComponentStatus::Healthy),
        );

        Ok(HealthSnapshot {
            status,
            timestamp: Utc::now(),
            components,
        })
    }
}

async fn run_probe(probe: Arc<dyn HealthProbe>, probe_timeout: Duration) -> ComponentStatus {
    match timeout(probe_timeout, probe.health_check()).await {
        Ok(Ok(healthy)) => ComponentStatus::from(healthy),
        Ok(Err(e)) => {
            warn!(component = probe.name(), error = %e, "health probe failed");
            ComponentStatus::Unhealthy
        }
        Err(_) => {
            warn!(
                component = probe.name(),
                timeout_ms = probe_timeout.as_millis() as u64,
                "health probe timed out"
            );
            ComponentStatus::Unhealthy
        }
    }
}

/// Probe that treats any 2xx from `GET url` as healthy.
pub struct HttpHealthProbe {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| {
                Error::Collaborator(format!("{} health request failed: {}", self.name, e))
            })?;

        Ok(response.status().is_success())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub enum Behaviour {
        Healthy,
        Unhealthy,
        Fails,
        Hangs,
        Panics,
    }

    pub struct StubProbe {
        pub name: &'static str,
        pub behaviour: Behaviour,
        pub calls: AtomicUsize,
    }

    impl StubProbe {
        pub fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthProbe for StubProbe {
        fn name(&self) -> &str {
            self.name
        }

        async fn health_check(&self) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Healthy => Ok(true),
                Behaviour::Unhealthy => Ok(false),
                Behaviour::Fails => Err(Error::Collaborator("connection refused".to_string())),
                Behaviour::Hangs => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(true)
                }
                Behaviour::Panics => panic!("probe exploded"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{Behaviour, StubProbe};
    use super::*;

    fn aggregator(probes: Vec<Arc<StubProbe>>) -> HealthAggregator {
        let probes = probes
            .into_iter()
            .map(|p| p as Arc<dyn HealthProbe>)
            .collect();
        HealthAggregator::new(probes).with_probe_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let snapshot = aggregator(vec![
            StubProbe::new("data_pipeline", Behaviour::Healthy),
            StubProbe::new("sentiment_analyzer", Behaviour::Healthy),
            StubProbe::new("prediction_engine", Behaviour::Healthy),
        ])
        .check()
        .await
        .unwrap();

        assert_eq!(snapshot.status, ComponentStatus::Healthy);
        assert_eq!(snapshot.components.len(), 3);
    }

    #[tokio::test]
    async fn test_one_unhealthy_does_not_short_circuit() {
        let first = StubProbe::new("data_pipeline", Behaviour::Unhealthy);
        let second = StubProbe::new("sentiment_analyzer", Behaviour::Healthy);
        let third = StubProbe::new("prediction_engine", Behaviour::Healthy);

        let snapshot = aggregator(vec![first.clone(), second.clone(), third.clone()])
            .check()
            .await
            .unwrap();

        assert_eq!(snapshot.status, ComponentStatus::Unhealthy);
        assert_eq!(snapshot.components["data_pipeline"], ComponentStatus::Unhealthy);
        assert_eq!(snapshot.components["sentiment_analyzer"], ComponentStatus::Healthy);
        assert_eq!(snapshot.components["prediction_engine"], ComponentStatus::Healthy);
        assert_eq!(first.calls() + second.calls() + third.calls(), 3);
    }

    #[tokio::test]
    async fn test_probe_error_and_timeout_marked_unhealthy() {
        let snapshot = aggregator(vec![
            StubProbe::new("data_pipeline", Behaviour::Fails),
            StubProbe::new("sentiment_analyzer", Behaviour::Hangs),
            StubProbe::new("prediction_engine", Behaviour::Healthy),
        ])
        .check()
        .await
        .unwrap();

        assert_eq!(snapshot.status, ComponentStatus::Unhealthy);
        assert_eq!(snapshot.components["data_pipeline"], ComponentStatus::Unhealthy);
        assert_eq!(snapshot.components["sentiment_analyzer"], ComponentStatus::Unhealthy);
        assert_eq!(snapshot.components["prediction_engine"], ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_panicking_probe_only_marks_itself_unhealthy() {
        let snapshot = aggregator(vec![
            StubProbe::new("data_pipeline", Behaviour::Panics),
            StubProbe::new("sentiment_analyzer", Behaviour::Healthy),
            StubProbe::new("prediction_engine", Behaviour::Unhealthy),
        ])
        .check()
        .await
        .unwrap();

        assert_eq!(snapshot.status, ComponentStatus::Unhealthy);
        assert_eq!(snapshot.components.len(), 3);
        assert_eq!(snapshot.components["data_pipeline"], ComponentStatus::Unhealthy);
        assert_eq!(snapshot.components["sentiment_analyzer"], ComponentStatus::Healthy);
        assert_eq!(snapshot.components["prediction_engine"], ComponentStatus::Unhealthy);
    }

    #[test]
    fn test_snapshot_wire_format() {
        let snapshot = HealthSnapshot::unavailable();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert!(json["components"].as_object().unwrap().is_empty());
        assert!(json["timestamp"].is_string());
    }
}
