//! Storage and health-probe seams.

use crate::{HealthStatus, Service, ServiceEvent};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Equality filters pushed down to storage for service listing.
#[derive(Debug, Clone, Default)]
pub struct ServiceFilter {
    pub owner: Option<String>,
    pub language: Option<String>,
}

/// One page of rows plus the total matching the filter.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Data-access layer over the services and service_events tables.
///
/// Multi-step mutations (`create_service`, `update_deployment`) write the
/// entity row and its audit event in one transaction, so an event never
/// references a row that failed to commit.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Insert a new service and its "created" event atomically.
    /// A duplicate name yields `StoreError::Conflict`.
    async fn create_service(
        &self,
        service: &Service,
        event: &ServiceEvent,
    ) -> Result<(), StoreError>;

    /// Persist updated deployment/health fields and the "deployed" event
    /// atomically.
    async fn update_deployment(
        &self,
        service: &Service,
        event: &ServiceEvent,
    ) -> Result<(), StoreError>;

    /// Append a single immutable event.
    async fn append_event(&self, event: &ServiceEvent) -> Result<(), StoreError>;

    async fn get_service_by_name(&self, name: &str) -> Result<Option<Service>, StoreError>;

    /// List services matching the filter, newest-created first.
    async fn list_services(
        &self,
        filter: &ServiceFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Page<Service>, StoreError>;

    /// Deployed services, most recently deployed first.
    async fn recent_deployments(&self, limit: u64) -> Result<Vec<Service>, StoreError>;

    async fn count_services(&self) -> Result<u64, StoreError>;

    async fn count_deployed(&self) -> Result<u64, StoreError>;

    /// Distinct owners, sorted ascending.
    async fn distinct_owners(&self) -> Result<Vec<String>, StoreError>;

    /// Distinct languages, sorted ascending.
    async fn distinct_languages(&self) -> Result<Vec<String>, StoreError>;

    async fn owner_distribution(&self) -> Result<BTreeMap<String, u64>, StoreError>;

    async fn language_distribution(&self) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Events for one service, newest first.
    async fn events_for_service(
        &self,
        service_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Page<ServiceEvent>, StoreError>;

    /// Most recent events across all services.
    async fn recent_events(&self, limit: u64) -> Result<Vec<ServiceEvent>, StoreError>;

    /// Event counts per type with `created_at >= since` (RFC3339).
    async fn activity_summary(&self, since: &str) -> Result<BTreeMap<String, u64>, StoreError>;

    /// Cheap connectivity check for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Reclaim space and refresh query-planner statistics.
    async fn compact(&self) -> Result<(), StoreError>;
}

/// Health-check capability. The production wiring simulates; tests inject
/// a deterministic implementation.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, service: &Service) -> HealthStatus;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Other(String),
}

/// Domain-level error; the HTTP layer maps each variant to a status code.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("storage: {0}")]
    Storage(#[from] StoreError),
}
