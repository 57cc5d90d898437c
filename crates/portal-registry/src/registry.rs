//! Registry operations over the store and probe seams.

use crate::advice;
use portal_types::{
    AnalyticsOverview, AnalyticsQuery, DeployRequest, DeploymentStats, EventListResponse,
    FiltersResponse, HealthProbe, HealthStatus, ListEventsQuery, ListServicesQuery, NextSteps,
    RecentDeployment, RegisterRequest, RegistryError, RegistryStore, Service, ServiceEvent,
    ServiceFilter, ServiceListResponse, ServiceView, StatusOverview, StatusSummary, StoreError,
};
use std::sync::Arc;

/// Cached health status older than this is resimulated on read.
const HEALTH_TTL_SECONDS: i64 = 300;

const MAX_SERVICES_PER_PAGE: u32 = 100;
const MAX_EVENTS_PER_PAGE: u32 = 50;
const MAX_ANALYTICS_DAYS: u32 = 365;

/// Orchestration layer: validates input, runs store operations, logs audit
/// events, and resolves computed health status.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn RegistryStore + Send + Sync>,
    probe: Arc<dyn HealthProbe + Send + Sync>,
}

impl Registry {
    pub fn new(
        store: Arc<dyn RegistryStore + Send + Sync>,
        probe: Arc<dyn HealthProbe + Send + Sync>,
    ) -> Self {
        Self { store, probe }
    }

    /// Build the API view of a service: entity fields plus the computed
    /// status (TTL cache hit, or probe result when stale). Probe results
    /// are not written back; only deployments persist health fields.
    pub async fn view(&self, service: &Service) -> ServiceView {
        let status = self.resolve_status(service).await;
        ServiceView::new(service, status)
    }

    async fn resolve_status(&self, service: &Service) -> HealthStatus {
        if let Some(ref checked) = service.last_health_check {
            if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(checked) {
                let age = chrono::Utc::now().signed_duration_since(ts.with_timezone(&chrono::Utc));
                if age.num_seconds() < HEALTH_TTL_SECONDS {
                    return service.health_status;
                }
            }
        }
        self.probe.probe(service).await
    }

    /// List services with storage-level owner/language filters and a
    /// post-fetch status filter. `total` and the page counts describe the
    /// pre-status-filter result set; the status filter is best effort and
    /// can shrink a page below `per_page`.
    pub async fn list_services(
        &self,
        query: &ListServicesQuery,
    ) -> Result<ServiceListResponse, RegistryError> {
        let page = query.page.max(1);
        let per_page = query.per_page.clamp(1, MAX_SERVICES_PER_PAGE);
        let filter = ServiceFilter {
            owner: query.owner.clone(),
            language: query.language.clone(),
        };
        let offset = (page as u64 - 1) * per_page as u64;
        let fetched = self
            .store
            .list_services(&filter, offset, per_page as u64)
            .await?;

        let mut services = Vec::with_capacity(fetched.items.len());
        for service in &fetched.items {
            let view = self.view(service).await;
            if let Some(ref wanted) = query.status {
                if view.status.as_str() != wanted {
                    continue;
                }
            }
            services.push(view);
        }

        let pages = total_pages(fetched.total, per_page);
        Ok(ServiceListResponse {
            services,
            total: fetched.total,
            page,
            per_page,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        })
    }

    /// Register a new service and log its "created" event atomically.
    pub async fn register(
        &self,
        req: &RegisterRequest,
        actor: &str,
    ) -> Result<Service, RegistryError> {
        for (field, value) in [
            ("name", &req.name),
            ("owner", &req.owner),
            ("language", &req.language),
            ("repo", &req.repo),
        ] {
            if value.trim().is_empty() {
                return Err(RegistryError::Validation(format!(
                    "Missing required field: {}",
                    field
                )));
            }
        }

        let name = req.name.trim();
        if name.chars().count() > 100 {
            return Err(RegistryError::Validation(
                "Service name must be 1-100 characters".to_string(),
            ));
        }

        if self.store.get_service_by_name(name).await?.is_some() {
            return Err(RegistryError::Conflict(
                "Service name already exists".to_string(),
            ));
        }

        let description = req
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let service = Service::new(
            name.to_string(),
            req.owner.trim().to_string(),
            req.language.trim().to_lowercase(),
            req.repo.trim().to_string(),
            description,
            req.tags.clone(),
        );
        let event = ServiceEvent::log(
            &service.id,
            "created",
            Some(serde_json::json!({
                "name": service.name,
                "owner": service.owner,
                "language": service.language,
                "repo": service.repo,
            })),
            Some(actor.to_string()),
        );

        match self.store.create_service(&service, &event).await {
            Ok(()) => {
                tracing::info!(service = %service.name, owner = %service.owner, "service registered");
                Ok(service)
            }
            // The unique index is the authority; the pre-check only makes
            // the common case cheap.
            Err(StoreError::Conflict(_)) => Err(RegistryError::Conflict(
                "Service name already exists".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Record a deployment and log its "deployed" event atomically.
    pub async fn deploy(
        &self,
        name: &str,
        req: &DeployRequest,
        actor: &str,
    ) -> Result<Service, RegistryError> {
        let version = req.version.trim();
        if version.is_empty() {
            return Err(RegistryError::Validation("Version is required".to_string()));
        }
        if version.chars().count() > 50 {
            return Err(RegistryError::Validation(
                "Version must be 50 characters or less".to_string(),
            ));
        }

        let mut service = self
            .store
            .get_service_by_name(name)
            .await?
            .ok_or_else(|| RegistryError::NotFound("Service not found".to_string()))?;

        let previous_version = service.deployed_version.clone();
        service.record_deployment(version);
        let event = ServiceEvent::log(
            &service.id,
            "deployed",
            Some(serde_json::json!({
                "version": version,
                "previous_version": previous_version,
                "deployed_at": service.deployed_at,
            })),
            Some(actor.to_string()),
        );
        self.store.update_deployment(&service, &event).await?;
        tracing::info!(service = %service.name, version = %version, "service deployed");
        Ok(service)
    }

    /// Advisory next steps for an existing service. Pure derived content.
    pub async fn next_steps(&self, name: &str) -> Result<NextSteps, RegistryError> {
        let service = self
            .store
            .get_service_by_name(name)
            .await?
            .ok_or_else(|| RegistryError::NotFound("Service not found".to_string()))?;
        Ok(advice::next_steps_for(&service))
    }

    /// Paginated event history for an existing service, newest first.
    pub async fn service_events(
        &self,
        name: &str,
        query: &ListEventsQuery,
    ) -> Result<EventListResponse, RegistryError> {
        let service = self
            .store
            .get_service_by_name(name)
            .await?
            .ok_or_else(|| RegistryError::NotFound("Service not found".to_string()))?;

        let page = query.page.max(1);
        let per_page = query.per_page.clamp(1, MAX_EVENTS_PER_PAGE);
        let offset = (page as u64 - 1) * per_page as u64;
        let fetched = self
            .store
            .events_for_service(&service.id, offset, per_page as u64)
            .await?;

        Ok(EventListResponse {
            service_name: service.name,
            events: fetched.items,
            total: fetched.total,
            page,
            per_page,
            pages: total_pages(fetched.total, per_page),
        })
    }

    /// Distinct owners and languages currently present.
    pub async fn filters(&self) -> Result<FiltersResponse, RegistryError> {
        Ok(FiltersResponse {
            owners: self.store.distinct_owners().await?,
            languages: self.store.distinct_languages().await?,
        })
    }

    /// Summary counts and the five most recent deployments. The
    /// healthy/unhealthy split is a fixed 70/30 simulation, not an
    /// aggregation of per-service status.
    pub async fn status_overview(&self) -> Result<StatusOverview, RegistryError> {
        let total = self.store.count_services().await?;
        let deployed = self.store.count_deployed().await?;
        let healthy = (total as f64 * 0.7) as u64;

        let recent = self.store.recent_deployments(5).await?;
        let recent_deployments = recent
            .into_iter()
            .filter_map(|s| {
                // Both set together by the deploy path.
                match (s.deployed_version, s.deployed_at) {
                    (Some(version), Some(deployed_at)) => Some(RecentDeployment {
                        name: s.name,
                        version,
                        deployed_at,
                        owner: s.owner,
                    }),
                    _ => None,
                }
            })
            .collect();

        Ok(StatusOverview {
            summary: StatusSummary {
                total_services: total,
                deployed_services: deployed,
                undeployed_services: total - deployed,
                healthy,
                unhealthy: total - healthy,
            },
            recent_deployments,
        })
    }

    /// Aggregate analytics over the trailing window (default 30 days,
    /// capped at 365).
    pub async fn analytics(
        &self,
        query: &AnalyticsQuery,
    ) -> Result<AnalyticsOverview, RegistryError> {
        let days = query.days.min(MAX_ANALYTICS_DAYS);
        let since = (chrono::Utc::now() - chrono::Duration::days(days as i64)).to_rfc3339();

        let total = self.store.count_services().await?;
        let deployed = self.store.count_deployed().await?;

        Ok(AnalyticsOverview {
            period_days: days,
            deployment_stats: DeploymentStats {
                total_services: total,
                deployed_services: deployed,
                undeployed_services: total - deployed,
            },
            activity_stats: self.store.activity_summary(&since).await?,
            language_distribution: self.store.language_distribution().await?,
            team_distribution: self.store.owner_distribution().await?,
            recent_activity: self.store.recent_events(10).await?,
        })
    }

    /// Storage connectivity check; returns the current service count.
    pub async fn health(&self) -> Result<u64, RegistryError> {
        self.store.ping().await?;
        Ok(self.store.count_services().await?)
    }

    /// Reclaim space and refresh storage statistics.
    pub async fn compact(&self) -> Result<(), RegistryError> {
        self.store.compact().await?;
        Ok(())
    }
}

fn total_pages(total: u64, per_page: u32) -> u32 {
    if total == 0 {
        0
    } else {
        ((total + per_page as u64 - 1) / per_page as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::FixedProbe;
    use portal_store::InMemoryRegistryStore;

    fn registry() -> Registry {
        registry_with_probe(FixedProbe(HealthStatus::Healthy))
    }

    fn registry_with_probe(probe: FixedProbe) -> Registry {
        Registry::new(
            Arc::new(InMemoryRegistryStore::new()),
            Arc::new(probe),
        )
    }

    fn register_request(name: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            owner: "identity-team".to_string(),
            language: "Python".to_string(),
            repo: "https://github.com/example/x".to_string(),
            description: Some("  ".to_string()),
            tags: vec!["core".to_string()],
        }
    }

    #[tokio::test]
    async fn register_normalizes_and_stamps() {
        let registry = registry();
        let service = registry
            .register(&register_request("auth-service"), "alice")
            .await
            .unwrap();

        assert_eq!(service.language, "python");
        assert!(service.description.is_none());
        assert!(service.created_at <= service.updated_at);
        assert!(service.deployed_version.is_none());
        assert!(service.deployed_at.is_none());
        assert_eq!(service.health_status, HealthStatus::Unknown);

        let events = registry
            .service_events("auth-service", &ListEventsQuery::default())
            .await
            .unwrap();
        assert_eq!(events.total, 1);
        assert_eq!(events.events[0].event_type, "created");
        assert_eq!(events.events[0].created_by.as_deref(), Some("alice"));
        assert_eq!(
            events.events[0].event_data.as_ref().unwrap()["language"],
            "python"
        );
    }

    #[tokio::test]
    async fn register_rejects_missing_fields_in_order() {
        let registry = registry();

        let mut req = register_request("auth-service");
        req.repo = String::new();
        let err = registry.register(&req, "alice").await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ref msg)
            if msg == "Missing required field: repo"));

        let mut req = register_request("auth-service");
        req.name = "   ".to_string();
        let err = registry.register(&req, "alice").await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ref msg)
            if msg == "Missing required field: name"));

        let req = register_request(&"x".repeat(101));
        let err = registry.register(&req, "alice").await.unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ref msg)
            if msg == "Service name must be 1-100 characters"));

        // Nothing persisted by any of the rejected requests.
        assert_eq!(registry.health().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_regardless_of_fields() {
        let registry = registry();
        registry
            .register(&register_request("auth-service"), "alice")
            .await
            .unwrap();

        let mut other = register_request("auth-service");
        other.owner = "platform-team".to_string();
        other.language = "go".to_string();
        let err = registry.register(&other, "bob").await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[tokio::test]
    async fn deploy_twice_keeps_latest_version_and_both_events() {
        let registry = registry();
        let created = registry
            .register(&register_request("auth-service"), "alice")
            .await
            .unwrap();

        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        let first = registry
            .deploy(
                "auth-service",
                &DeployRequest {
                    version: "1.0".to_string(),
                },
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(first.deployed_version.as_deref(), Some("1.0"));
        assert_eq!(first.health_status, HealthStatus::Healthy);
        assert!(first.updated_at > created.updated_at);
        assert!(first.deployed_at.is_some());

        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        let second = registry
            .deploy(
                "auth-service",
                &DeployRequest {
                    version: "2.0".to_string(),
                },
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(second.deployed_version.as_deref(), Some("2.0"));
        assert!(second.updated_at > first.updated_at);

        let events = registry
            .service_events("auth-service", &ListEventsQuery::default())
            .await
            .unwrap();
        let deploys: Vec<_> = events
            .events
            .iter()
            .filter(|e| e.event_type == "deployed")
            .collect();
        assert_eq!(deploys.len(), 2);
        assert_eq!(deploys[0].event_data.as_ref().unwrap()["version"], "2.0");
        assert_eq!(
            deploys[0].event_data.as_ref().unwrap()["previous_version"],
            "1.0"
        );
    }

    #[tokio::test]
    async fn deploy_validation_and_not_found() {
        let registry = registry();
        registry
            .register(&register_request("auth-service"), "alice")
            .await
            .unwrap();

        let err = registry
            .deploy(
                "auth-service",
                &DeployRequest {
                    version: "  ".to_string(),
                },
                "alice",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ref msg)
            if msg == "Version is required"));

        let err = registry
            .deploy(
                "auth-service",
                &DeployRequest {
                    version: "v".repeat(51),
                },
                "alice",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));

        let err = registry
            .deploy(
                "ghost",
                &DeployRequest {
                    version: "1.0".to_string(),
                },
                "alice",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));

        // Failed deploys log nothing.
        let events = registry
            .service_events("auth-service", &ListEventsQuery::default())
            .await
            .unwrap();
        assert_eq!(events.total, 1);
    }

    #[tokio::test]
    async fn fresh_cache_wins_over_probe_and_stale_cache_loses() {
        let registry = registry_with_probe(FixedProbe(HealthStatus::Unhealthy));
        registry
            .register(&register_request("auth-service"), "alice")
            .await
            .unwrap();

        // No health check yet: stale, probe decides.
        let listed = registry
            .list_services(&ListServicesQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.services[0].status, HealthStatus::Unhealthy);

        // Deploying refreshes the cache; within the TTL the cached healthy
        // value is served even though the probe says unhealthy.
        registry
            .deploy(
                "auth-service",
                &DeployRequest {
                    version: "1.0".to_string(),
                },
                "alice",
            )
            .await
            .unwrap();
        let listed = registry
            .list_services(&ListServicesQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.services[0].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn status_filter_is_post_fetch_and_total_is_pre_filter() {
        let registry = registry_with_probe(FixedProbe(HealthStatus::Healthy));
        registry
            .register(&register_request("auth-service"), "alice")
            .await
            .unwrap();

        let query = ListServicesQuery {
            status: Some("unhealthy".to_string()),
            ..Default::default()
        };
        let listed = registry.list_services(&query).await.unwrap();
        assert!(listed.services.is_empty());
        assert_eq!(listed.total, 1);
        assert_eq!(listed.pages, 1);
    }

    #[tokio::test]
    async fn list_clamps_per_page() {
        let registry = registry();
        registry
            .register(&register_request("auth-service"), "alice")
            .await
            .unwrap();

        let query = ListServicesQuery {
            per_page: 1000,
            ..Default::default()
        };
        let listed = registry.list_services(&query).await.unwrap();
        assert_eq!(listed.per_page, 100);

        let query = ListServicesQuery {
            page: 0,
            ..Default::default()
        };
        let listed = registry.list_services(&query).await.unwrap();
        assert_eq!(listed.page, 1);
    }

    #[tokio::test]
    async fn overview_and_analytics_aggregate() {
        let registry = registry();
        for name in ["a", "b", "c"] {
            let mut req = register_request(name);
            if name == "c" {
                req.owner = "data-team".to_string();
                req.language = "go".to_string();
            }
            registry.register(&req, "alice").await.unwrap();
        }
        registry
            .deploy(
                "a",
                &DeployRequest {
                    version: "1.0".to_string(),
                },
                "alice",
            )
            .await
            .unwrap();

        let overview = registry.status_overview().await.unwrap();
        assert_eq!(overview.summary.total_services, 3);
        assert_eq!(overview.summary.deployed_services, 1);
        assert_eq!(overview.summary.undeployed_services, 2);
        assert_eq!(overview.summary.healthy + overview.summary.unhealthy, 3);
        assert_eq!(overview.recent_deployments.len(), 1);
        assert_eq!(overview.recent_deployments[0].name, "a");
        assert_eq!(overview.recent_deployments[0].version, "1.0");

        let analytics = registry
            .analytics(&AnalyticsQuery { days: 9999 })
            .await
            .unwrap();
        assert_eq!(analytics.period_days, 365);
        assert_eq!(analytics.activity_stats.get("created"), Some(&3));
        assert_eq!(analytics.activity_stats.get("deployed"), Some(&1));
        assert_eq!(analytics.language_distribution.get("python"), Some(&2));
        assert_eq!(analytics.team_distribution.get("identity-team"), Some(&2));
        assert_eq!(analytics.recent_activity.len(), 4);
        assert_eq!(analytics.recent_activity[0].event_type, "deployed");

        let filters = registry.filters().await.unwrap();
        assert_eq!(filters.owners, vec!["data-team", "identity-team"]);
        assert_eq!(filters.languages, vec!["go", "python"]);
    }

    #[tokio::test]
    async fn events_pagination_newest_first() {
        let registry = registry();
        registry
            .register(&register_request("auth-service"), "alice")
            .await
            .unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        registry
            .deploy(
                "auth-service",
                &DeployRequest {
                    version: "1.0".to_string(),
                },
                "alice",
            )
            .await
            .unwrap();

        let query = ListEventsQuery {
            page: 1,
            per_page: 1,
        };
        let page1 = registry
            .service_events("auth-service", &query)
            .await
            .unwrap();
        assert_eq!(page1.events.len(), 1);
        assert_eq!(page1.events[0].event_type, "deployed");
        assert_eq!(page1.total, 2);
        assert_eq!(page1.pages, 2);

        let query = ListEventsQuery {
            page: 1,
            per_page: 1000,
        };
        let clamped = registry
            .service_events("auth-service", &query)
            .await
            .unwrap();
        assert_eq!(clamped.per_page, 50);

        let err = registry
            .service_events("ghost", &ListEventsQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }
}
