//! Service and event entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cached health indicator for a service. Not a real probe result: the
/// stored value is only refreshed by deployments, and a stale value is
/// resimulated by the configured probe on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    /// Parse a stored status string; anything unrecognized is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "healthy" => HealthStatus::Healthy,
            "unhealthy" => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered service. Timestamps are RFC3339 UTC strings and compare
/// lexicographically. `deployed_at` is set iff `deployed_version` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub language: String,
    pub repo: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub deployed_version: Option<String>,
    #[serde(default)]
    pub deployed_at: Option<String>,
    #[serde(default)]
    pub health_status: HealthStatus,
    #[serde(default)]
    pub last_health_check: Option<String>,
}

impl Service {
    /// Create a new undeployed service with a fresh id and timestamps.
    pub fn new(
        name: String,
        owner: String,
        language: String,
        repo: String,
        description: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            owner,
            language,
            repo,
            description,
            tags,
            created_at: now.clone(),
            updated_at: now,
            deployed_version: None,
            deployed_at: None,
            health_status: HealthStatus::Unknown,
            last_health_check: None,
        }
    }

    /// Record a deployment: version, deploy/update timestamps, and the
    /// implicit healthy signal with a fresh health-check timestamp.
    pub fn record_deployment(&mut self, version: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        self.deployed_version = Some(version.to_string());
        self.deployed_at = Some(now.clone());
        self.updated_at = now.clone();
        self.health_status = HealthStatus::Healthy;
        self.last_health_check = Some(now);
    }
}

/// Append-only audit record of a state change to a service. Never updated
/// or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEvent {
    pub id: String,
    pub service_id: String,
    /// Free-form type: "created", "deployed", "updated", "health_check".
    pub event_type: String,
    #[serde(default)]
    pub event_data: Option<serde_json::Value>,
    pub created_at: String,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl ServiceEvent {
    /// Build a new event with a fresh id and timestamp.
    pub fn log(
        service_id: &str,
        event_type: &str,
        event_data: Option<serde_json::Value>,
        created_by: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            service_id: service_id.to_string(),
            event_type: event_type.to_string(),
            event_data,
            created_at: chrono::Utc::now().to_rfc3339(),
            created_by,
        }
    }
}
