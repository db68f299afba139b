//! Component health tracking for the metastore service.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// Component name of the catalog backend.
pub const METASTORE_COMPONENT: &str = "metastore";
/// Component name of the query planner.
pub const PLANNER_COMPONENT: &str = "planner";

/// Health status of a component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Healthy,
    /// Component works with reduced capability
    Degraded(String),
    /// Component is unusable
    Unhealthy(String),
    /// Component has not reported yet
    Unknown,
}

/// Overall service health status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Snapshot returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub ready: bool,
    pub uptime_seconds: u64,
    pub components: BTreeMap<String, ComponentStatus>,
}

/// Tracks component health and whether the service is accepting requests.
pub struct HealthCheck {
    components: RwLock<BTreeMap<String, ComponentStatus>>,
    started_at: Instant,
    serving: RwLock<bool>,
}

impl HealthCheck {
    pub fn new() -> Self {
        Self {
            components: RwLock::new(BTreeMap::new()),
            started_at: Instant::now(),
            serving: RwLock::new(false),
        }
    }

    /// Health check tracking the metastore and planner components.
    pub fn for_service() -> Self {
        let health = Self::new();
        health.register_component(METASTORE_COMPONENT);
        health.register_component(PLANNER_COMPONENT);
        health
    }

    pub fn register_component(&self, name: &str) {
        self.components
            .write()
            .insert(name.to_string(), ComponentStatus::Unknown);
    }

    pub fn mark_healthy(&self, name: &str) {
        self.components
            .write()
            .insert(name.to_string(), ComponentStatus::Healthy);
    }

    pub fn mark_degraded(&self, name: &str, reason: &str) {
        self.components.write().insert(
            name.to_string(),
            ComponentStatus::Degraded(reason.to_string()),
        );
    }

    pub fn mark_unhealthy(&self, name: &str, reason: &str) {
        self.components.write().insert(
            name.to_string(),
            ComponentStatus::Unhealthy(reason.to_string()),
        );
    }

    pub fn get_component_status(&self, name: &str) -> Option<ComponentStatus> {
        self.components.read().get(name).cloned()
    }

    /// Worst status across components; unknown components count as healthy.
    pub fn overall_status(&self) -> HealthStatus {
        let components = self.components.read();
        let mut has_degraded = false;
        for status in components.values() {
            match status {
                ComponentStatus::Unhealthy(_) => return HealthStatus::Unhealthy,
                ComponentStatus::Degraded(_) => has_degraded = true,
                _ => {}
            }
        }
        if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn is_operational(&self) -> bool {
        self.overall_status() != HealthStatus::Unhealthy
    }

    pub fn set_serving(&self, serving: bool) {
        *self.serving.write() = serving;
    }

    /// Ready once serving and every component has reported and is operational.
    pub fn is_ready(&self) -> bool {
        *self.serving.read()
            && self.is_operational()
            && !self
                .components
                .read()
                .values()
                .any(|s| *s == ComponentStatus::Unknown)
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: self.overall_status(),
            ready: self.is_ready(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            components: self.components.read().clone(),
        }
    }
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self::new()
    }
}
