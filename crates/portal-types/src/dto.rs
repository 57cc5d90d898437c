//! Request and response DTOs for the registry API.

use crate::{HealthStatus, Service, ServiceEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Register-service request body. Required fields default to empty so a
/// missing field surfaces as a validation error, not a decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Deploy request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(default)]
    pub version: String,
}

/// Query parameters for listing services.
#[derive(Debug, Clone, Deserialize)]
pub struct ListServicesQuery {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Computed-status filter, applied after the page is fetched.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_services_per_page")]
    pub per_page: u32,
}

impl Default for ListServicesQuery {
    fn default() -> Self {
        Self {
            owner: None,
            language: None,
            status: None,
            page: default_page(),
            per_page: default_services_per_page(),
        }
    }
}

/// Query parameters for listing a service's events.
#[derive(Debug, Clone, Deserialize)]
pub struct ListEventsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_events_per_page")]
    pub per_page: u32,
}

impl Default for ListEventsQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_events_per_page(),
        }
    }
}

/// Query parameters for the analytics overview.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default = "default_analytics_days")]
    pub days: u32,
}

impl Default for AnalyticsQuery {
    fn default() -> Self {
        Self {
            days: default_analytics_days(),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_services_per_page() -> u32 {
    50
}

fn default_events_per_page() -> u32 {
    20
}

fn default_analytics_days() -> u32 {
    30
}

/// A service as returned by the API: entity fields plus the computed
/// `status` (cache hit or probe result), without the raw health columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceView {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub language: String,
    pub repo: String,
    pub created_at: String,
    pub updated_at: String,
    pub deployed_version: Option<String>,
    pub deployed_at: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub status: HealthStatus,
}

impl ServiceView {
    pub fn new(service: &Service, status: HealthStatus) -> Self {
        Self {
            id: service.id.clone(),
            name: service.name.clone(),
            owner: service.owner.clone(),
            language: service.language.clone(),
            repo: service.repo.clone(),
            created_at: service.created_at.clone(),
            updated_at: service.updated_at.clone(),
            deployed_version: service.deployed_version.clone(),
            deployed_at: service.deployed_at.clone(),
            description: service.description.clone(),
            tags: service.tags.clone(),
            status,
        }
    }
}

/// Paginated service listing. `total` and the page counts describe the
/// storage-level result set, before the post-fetch status filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListResponse {
    pub services: Vec<ServiceView>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Successful registration payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub service_id: String,
    pub message: String,
    pub service: ServiceView,
}

/// Successful deployment payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub message: String,
    pub service: ServiceView,
}

/// Paginated event listing for one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventListResponse {
    pub service_name: String,
    pub events: Vec<ServiceEvent>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub pages: u32,
}

/// Service counts split by deployment state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStats {
    pub total_services: u64,
    pub deployed_services: u64,
    pub undeployed_services: u64,
}

/// Summary block of the status overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total_services: u64,
    pub deployed_services: u64,
    pub undeployed_services: u64,
    pub healthy: u64,
    pub unhealthy: u64,
}

/// One entry of the recent-deployments list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentDeployment {
    pub name: String,
    pub version: String,
    pub deployed_at: String,
    pub owner: String,
}

/// Status overview of all services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusOverview {
    pub summary: StatusSummary,
    pub recent_deployments: Vec<RecentDeployment>,
}

/// Aggregate analytics over a trailing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsOverview {
    pub period_days: u32,
    pub deployment_stats: DeploymentStats,
    pub activity_stats: BTreeMap<String, u64>,
    pub language_distribution: BTreeMap<String, u64>,
    pub team_distribution: BTreeMap<String, u64>,
    pub recent_activity: Vec<ServiceEvent>,
}

/// Distinct filter values currently present across all services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersResponse {
    pub owners: Vec<String>,
    pub languages: Vec<String>,
}

/// Service details echoed back with the next-steps advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub owner: String,
    pub language: String,
    pub deployed_version: Option<String>,
    pub deployed_at: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

/// Advisory payload: derived content only, nothing persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextSteps {
    pub service_name: String,
    pub next_steps: Vec<String>,
    pub templates: BTreeMap<String, String>,
    pub service_info: ServiceInfo,
}
