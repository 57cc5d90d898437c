//! In-memory registry store for tests and local experiments.

use async_trait::async_trait;
use portal_types::{
    Page, RegistryStore, Service, ServiceEvent, ServiceFilter, StoreError,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of RegistryStore.
/// Services are keyed by id with a name index for the unique-name check;
/// events are kept in insertion order so newest-first listing is stable.
pub struct InMemoryRegistryStore {
    /// service_id -> service.
    services: Arc<RwLock<HashMap<String, Service>>>,
    /// name -> service_id.
    name_index: Arc<RwLock<HashMap<String, String>>>,
    /// append-only, insertion order.
    events: Arc<RwLock<Vec<ServiceEvent>>>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
            name_index: Arc::new(RwLock::new(HashMap::new())),
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn matches(filter: &ServiceFilter, service: &Service) -> bool {
        if let Some(ref owner) = filter.owner {
            if &service.owner != owner {
                return false;
            }
        }
        if let Some(ref language) = filter.language {
            if &service.language != language {
                return false;
            }
        }
        true
    }
}

impl Default for InMemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn create_service(
        &self,
        service: &Service,
        event: &ServiceEvent,
    ) -> Result<(), StoreError> {
        let mut services = self.services.write().await;
        let mut names = self.name_index.write().await;
        if names.contains_key(&service.name) {
            return Err(StoreError::Conflict(format!(
                "service name already exists: {}",
                service.name
            )));
        }
        names.insert(service.name.clone(), service.id.clone());
        services.insert(service.id.clone(), service.clone());
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn update_deployment(
        &self,
        service: &Service,
        event: &ServiceEvent,
    ) -> Result<(), StoreError> {
        let mut services = self.services.write().await;
        if !services.contains_key(&service.id) {
            return Err(StoreError::Other(format!(
                "no service with id {}",
                service.id
            )));
        }
        services.insert(service.id.clone(), service.clone());
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn append_event(&self, event: &ServiceEvent) -> Result<(), StoreError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn get_service_by_name(&self, name: &str) -> Result<Option<Service>, StoreError> {
        let names = self.name_index.read().await;
        let services = self.services.read().await;
        Ok(names.get(name).and_then(|id| services.get(id)).cloned())
    }

    async fn list_services(
        &self,
        filter: &ServiceFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Page<Service>, StoreError> {
        let services = self.services.read().await;
        let mut matched: Vec<&Service> = services
            .values()
            .filter(|s| Self::matches(filter, s))
            .collect();
        // Newest-created first; id as tiebreak so paging is deterministic.
        matched.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn recent_deployments(&self, limit: u64) -> Result<Vec<Service>, StoreError> {
        let services = self.services.read().await;
        let mut deployed: Vec<&Service> = services
            .values()
            .filter(|s| s.deployed_at.is_some())
            .collect();
        deployed.sort_by(|a, b| b.deployed_at.cmp(&a.deployed_at));
        Ok(deployed
            .into_iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_services(&self) -> Result<u64, StoreError> {
        Ok(self.services.read().await.len() as u64)
    }

    async fn count_deployed(&self) -> Result<u64, StoreError> {
        Ok(self
            .services
            .read()
            .await
            .values()
            .filter(|s| s.deployed_version.is_some())
            .count() as u64)
    }

    async fn distinct_owners(&self) -> Result<Vec<String>, StoreError> {
        let services = self.services.read().await;
        let mut owners: Vec<String> = services.values().map(|s| s.owner.clone()).collect();
        owners.sort();
        owners.dedup();
        Ok(owners)
    }

    async fn distinct_languages(&self) -> Result<Vec<String>, StoreError> {
        let services = self.services.read().await;
        let mut languages: Vec<String> =
            services.values().map(|s| s.language.clone()).collect();
        languages.sort();
        languages.dedup();
        Ok(languages)
    }

    async fn owner_distribution(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let services = self.services.read().await;
        let mut counts = BTreeMap::new();
        for s in services.values() {
            *counts.entry(s.owner.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn language_distribution(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        let services = self.services.read().await;
        let mut counts = BTreeMap::new();
        for s in services.values() {
            *counts.entry(s.language.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn events_for_service(
        &self,
        service_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Page<ServiceEvent>, StoreError> {
        let events = self.events.read().await;
        // Insertion order is chronological for an append-only log, so
        // reverse iteration gives newest first with a stable tiebreak.
        let matched: Vec<&ServiceEvent> = events
            .iter()
            .rev()
            .filter(|e| e.service_id == service_id)
            .collect();
        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn recent_events(&self, limit: u64) -> Result<Vec<ServiceEvent>, StoreError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn activity_summary(&self, since: &str) -> Result<BTreeMap<String, u64>, StoreError> {
        let events = self.events.read().await;
        let mut counts = BTreeMap::new();
        for e in events.iter().filter(|e| e.created_at.as_str() >= since) {
            *counts.entry(e.event_type.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn compact(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
