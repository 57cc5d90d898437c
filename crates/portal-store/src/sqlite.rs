//! SQLite-backed registry store.
//!
//! Uses WAL journaling so readers are not blocked by writers; writes are
//! serialized behind the connection mutex. Register and deploy write the
//! service row and its event in one transaction.

use async_trait::async_trait;
use portal_types::{
    HealthStatus, Page, RegistryStore, Service, ServiceEvent, ServiceFilter, StoreError,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

const SERVICE_COLUMNS: &str = "id, name, owner, language, repo, description, tags, \
     created_at, updated_at, deployed_version, deployed_at, health_status, last_health_check";

const EVENT_COLUMNS: &str = "id, service_id, event_type, event_data, created_at, created_by";

/// SQLite-backed registry store.
pub struct SqliteRegistryStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteRegistryStore {
    /// Open (or create) the database at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path).map_err(map_store_err)?;
        Self::init(conn)
    }

    /// Open a private in-memory database (used by tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(map_store_err)?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(20))
            .map_err(map_store_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(map_store_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(map_store_err)?;
        conn.pragma_update(None, "cache_size", 10000)
            .map_err(map_store_err)?;
        conn.pragma_update(None, "temp_store", "memory")
            .map_err(map_store_err)?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                owner TEXT NOT NULL,
                language TEXT NOT NULL,
                repo TEXT NOT NULL,
                description TEXT,
                tags TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deployed_version TEXT,
                deployed_at TEXT,
                health_status TEXT NOT NULL DEFAULT 'unknown',
                last_health_check TEXT
            );

            CREATE TABLE IF NOT EXISTS service_events (
                id TEXT PRIMARY KEY,
                service_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                event_data TEXT,
                created_at TEXT NOT NULL,
                created_by TEXT,
                FOREIGN KEY (service_id) REFERENCES services(id)
            );

            CREATE INDEX IF NOT EXISTS idx_services_owner ON services(owner);
            CREATE INDEX IF NOT EXISTS idx_services_language ON services(language);
            CREATE INDEX IF NOT EXISTS idx_services_created ON services(created_at);
            CREATE INDEX IF NOT EXISTS idx_services_deployed_at ON services(deployed_at);
            CREATE INDEX IF NOT EXISTS idx_owner_language ON services(owner, language);
            CREATE INDEX IF NOT EXISTS idx_language_created ON services(language, created_at);
            CREATE INDEX IF NOT EXISTS idx_owner_created ON services(owner, created_at);
            CREATE INDEX IF NOT EXISTS idx_deployment_status ON services(deployed_version, deployed_at);
            CREATE INDEX IF NOT EXISTS idx_service_events ON service_events(service_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_event_type_date ON service_events(event_type, created_at);
            "#,
        )
        .map_err(map_store_err)?;

        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(map_store_err)
    }
}

fn map_store_err(e: rusqlite::Error) -> StoreError {
    if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
        StoreError::Conflict(e.to_string())
    } else {
        StoreError::Other(e.to_string())
    }
}

fn to_json_param<T: serde::Serialize>(value: &T) -> Result<String, rusqlite::Error> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn insert_service(conn: &rusqlite::Connection, service: &Service) -> Result<(), rusqlite::Error> {
    let tags_json = if service.tags.is_empty() {
        None
    } else {
        Some(to_json_param(&service.tags)?)
    };
    conn.execute(
        "INSERT INTO services (id, name, owner, language, repo, description, tags, \
         created_at, updated_at, deployed_version, deployed_at, health_status, last_health_check) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            service.id,
            service.name,
            service.owner,
            service.language,
            service.repo,
            service.description,
            tags_json,
            service.created_at,
            service.updated_at,
            service.deployed_version,
            service.deployed_at,
            service.health_status.as_str(),
            service.last_health_check,
        ],
    )?;
    Ok(())
}

fn insert_event(conn: &rusqlite::Connection, event: &ServiceEvent) -> Result<(), rusqlite::Error> {
    let data_json = match event.event_data {
        Some(ref v) => Some(to_json_param(v)?),
        None => None,
    };
    conn.execute(
        "INSERT INTO service_events (id, service_id, event_type, event_data, created_at, created_by) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            event.id,
            event.service_id,
            event.event_type,
            data_json,
            event.created_at,
            event.created_by,
        ],
    )?;
    Ok(())
}

fn service_from_row(row: &rusqlite::Row) -> Result<Service, rusqlite::Error> {
    let tags_json: Option<String> = row.get(6)?;
    let status: String = row.get(11)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        owner: row.get(2)?,
        language: row.get(3)?,
        repo: row.get(4)?,
        description: row.get(5)?,
        // Malformed stored tags read as empty, never an error.
        tags: tags_json
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_default(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deployed_version: row.get(9)?,
        deployed_at: row.get(10)?,
        health_status: HealthStatus::parse(&status),
        last_health_check: row.get(12)?,
    })
}

fn event_from_row(row: &rusqlite::Row) -> Result<ServiceEvent, rusqlite::Error> {
    let data_json: Option<String> = row.get(3)?;
    Ok(ServiceEvent {
        id: row.get(0)?,
        service_id: row.get(1)?,
        event_type: row.get(2)?,
        // Malformed stored payloads read as absent, never an error.
        event_data: data_json.and_then(|d| serde_json::from_str(&d).ok()),
        created_at: row.get(4)?,
        created_by: row.get(5)?,
    })
}

#[async_trait]
impl RegistryStore for SqliteRegistryStore {
    async fn create_service(
        &self,
        service: &Service,
        event: &ServiceEvent,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            insert_service(&tx, service)?;
            insert_event(&tx, event)?;
            tx.commit()
        })
    }

    async fn update_deployment(
        &self,
        service: &Service,
        event: &ServiceEvent,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let updated = tx.execute(
                "UPDATE services SET deployed_version = ?1, deployed_at = ?2, updated_at = ?3, \
                 health_status = ?4, last_health_check = ?5 WHERE id = ?6",
                rusqlite::params![
                    service.deployed_version,
                    service.deployed_at,
                    service.updated_at,
                    service.health_status.as_str(),
                    service.last_health_check,
                    service.id,
                ],
            )?;
            if updated == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            insert_event(&tx, event)?;
            tx.commit()
        })
    }

    async fn append_event(&self, event: &ServiceEvent) -> Result<(), StoreError> {
        self.with_conn(|conn| insert_event(conn, event))
    }

    async fn get_service_by_name(&self, name: &str) -> Result<Option<Service>, StoreError> {
        let name = name.to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM services WHERE name = ?1",
                SERVICE_COLUMNS
            ))?;
            match stmt.query_row([&name], service_from_row) {
                Ok(service) => Ok(Some(service)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    async fn list_services(
        &self,
        filter: &ServiceFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Page<Service>, StoreError> {
        let owner = filter.owner.clone();
        let language = filter.language.clone();
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM services \
                 WHERE (owner = ?1 OR ?1 IS NULL) AND (language = ?2 OR ?2 IS NULL)",
                rusqlite::params![owner, language],
                |row| row.get(0),
            )?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM services \
                 WHERE (owner = ?1 OR ?1 IS NULL) AND (language = ?2 OR ?2 IS NULL) \
                 ORDER BY created_at DESC, id DESC LIMIT ?3 OFFSET ?4",
                SERVICE_COLUMNS
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![owner, language, limit as i64, offset as i64],
                service_from_row,
            )?;
            let items = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(Page {
                items,
                total: total as u64,
            })
        })
    }

    async fn recent_deployments(&self, limit: u64) -> Result<Vec<Service>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM services WHERE deployed_at IS NOT NULL \
                 ORDER BY deployed_at DESC LIMIT ?1",
                SERVICE_COLUMNS
            ))?;
            let rows = stmt.query_map([limit as i64], service_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
    }

    async fn count_services(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM services", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
        })
    }

    async fn count_deployed(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM services WHERE deployed_version IS NOT NULL",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
        })
    }

    async fn distinct_owners(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT DISTINCT owner FROM services ORDER BY owner")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
    }

    async fn distinct_languages(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT language FROM services ORDER BY language")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
    }

    async fn owner_distribution(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT owner, COUNT(id) FROM services GROUP BY owner")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut counts = BTreeMap::new();
            for row in rows {
                let (owner, count) = row?;
                counts.insert(owner, count as u64);
            }
            Ok(counts)
        })
    }

    async fn language_distribution(&self) -> Result<BTreeMap<String, u64>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT language, COUNT(id) FROM services GROUP BY language")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut counts = BTreeMap::new();
            for row in rows {
                let (language, count) = row?;
                counts.insert(language, count as u64);
            }
            Ok(counts)
        })
    }

    async fn events_for_service(
        &self,
        service_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Page<ServiceEvent>, StoreError> {
        let service_id = service_id.to_string();
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM service_events WHERE service_id = ?1",
                [&service_id],
                |row| row.get(0),
            )?;
            // rowid as tiebreak keeps newest-first stable for same-instant events.
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM service_events WHERE service_id = ?1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
                EVENT_COLUMNS
            ))?;
            let rows = stmt.query_map(
                rusqlite::params![service_id, limit as i64, offset as i64],
                event_from_row,
            )?;
            let items = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(Page {
                items,
                total: total as u64,
            })
        })
    }

    async fn recent_events(&self, limit: u64) -> Result<Vec<ServiceEvent>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM service_events ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                EVENT_COLUMNS
            ))?;
            let rows = stmt.query_map([limit as i64], event_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
    }

    async fn activity_summary(&self, since: &str) -> Result<BTreeMap<String, u64>, StoreError> {
        let since = since.to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT event_type, COUNT(id) FROM service_events \
                 WHERE created_at >= ?1 GROUP BY event_type",
            )?;
            let rows = stmt.query_map([&since], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut counts = BTreeMap::new();
            for row in rows {
                let (event_type, count) = row?;
                counts.insert(event_type, count as u64);
            }
            Ok(counts)
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))?;
        Ok(())
    }

    async fn compact(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.execute_batch("VACUUM; ANALYZE;"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_types::Service;

    fn store() -> SqliteRegistryStore {
        SqliteRegistryStore::open_in_memory().unwrap()
    }

    fn service(name: &str, owner: &str, language: &str) -> Service {
        Service::new(
            name.to_string(),
            owner.to_string(),
            language.to_string(),
            format!("https://github.com/example/{}", name),
            Some("a test service".to_string()),
            vec!["core".to_string(), "test".to_string()],
        )
    }

    fn created_event(service: &Service) -> ServiceEvent {
        ServiceEvent::log(
            &service.id,
            "created",
            Some(serde_json::json!({ "name": service.name })),
            Some("tester".to_string()),
        )
    }

    #[tokio::test]
    async fn create_roundtrips_all_fields() {
        let store = store();
        let svc = service("auth-service", "identity-team", "python");
        store
            .create_service(&svc, &created_event(&svc))
            .await
            .unwrap();

        let found = store
            .get_service_by_name("auth-service")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, svc.id);
        assert_eq!(found.owner, "identity-team");
        assert_eq!(found.tags, vec!["core", "test"]);
        assert_eq!(found.description.as_deref(), Some("a test service"));
        assert_eq!(found.health_status, HealthStatus::Unknown);
        assert!(found.deployed_version.is_none());
        assert!(found.deployed_at.is_none());
    }

    #[tokio::test]
    async fn duplicate_name_rolls_back_event_too() {
        let store = store();
        let a = service("auth-service", "identity-team", "python");
        store.create_service(&a, &created_event(&a)).await.unwrap();

        let b = service("auth-service", "platform-team", "go");
        let err = store
            .create_service(&b, &created_event(&b))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(store.count_services().await.unwrap(), 1);
        let events = store.events_for_service(&b.id, 0, 10).await.unwrap();
        assert_eq!(events.total, 0);
    }

    #[tokio::test]
    async fn update_deployment_persists_fields_and_event() {
        let store = store();
        let mut svc = service("auth-service", "identity-team", "python");
        store
            .create_service(&svc, &created_event(&svc))
            .await
            .unwrap();

        svc.record_deployment("v1.0.0");
        let event = ServiceEvent::log(
            &svc.id,
            "deployed",
            Some(serde_json::json!({ "version": "v1.0.0" })),
            Some("tester".to_string()),
        );
        store.update_deployment(&svc, &event).await.unwrap();

        let found = store
            .get_service_by_name("auth-service")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.deployed_version.as_deref(), Some("v1.0.0"));
        assert!(found.deployed_at.is_some());
        assert_eq!(found.health_status, HealthStatus::Healthy);
        assert_eq!(store.count_deployed().await.unwrap(), 1);

        let events = store.events_for_service(&svc.id, 0, 10).await.unwrap();
        assert_eq!(events.total, 2);
        assert_eq!(events.items[0].event_type, "deployed");
        assert_eq!(
            events.items[0].event_data.as_ref().unwrap()["version"],
            "v1.0.0"
        );
    }

    #[tokio::test]
    async fn update_unknown_service_fails_without_event() {
        let store = store();
        let mut svc = service("ghost", "nobody", "go");
        svc.record_deployment("v1");
        let event = ServiceEvent::log(&svc.id, "deployed", None, None);
        let err = store.update_deployment(&svc, &event).await.unwrap_err();
        assert!(matches!(err, StoreError::Other(_)));
        let events = store.events_for_service(&svc.id, 0, 10).await.unwrap();
        assert_eq!(events.total, 0);
    }

    #[tokio::test]
    async fn malformed_stored_json_degrades_to_empty() {
        let store = store();
        let svc = service("auth-service", "identity-team", "python");
        store
            .create_service(&svc, &created_event(&svc))
            .await
            .unwrap();

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE services SET tags = 'not-json' WHERE id = ?1",
                [&svc.id],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO service_events (id, service_id, event_type, event_data, created_at) \
                 VALUES ('bad-ev', ?1, 'updated', '{broken', ?2)",
                rusqlite::params![svc.id, chrono::Utc::now().to_rfc3339()],
            )
            .unwrap();
        }

        let found = store
            .get_service_by_name("auth-service")
            .await
            .unwrap()
            .unwrap();
        assert!(found.tags.is_empty());

        let events = store.events_for_service(&svc.id, 0, 10).await.unwrap();
        let bad = events.items.iter().find(|e| e.id == "bad-ev").unwrap();
        assert!(bad.event_data.is_none());
    }

    #[tokio::test]
    async fn listing_filters_and_orders() {
        let store = store();
        for (name, owner, lang) in [
            ("a", "t1", "python"),
            ("b", "t1", "go"),
            ("c", "t2", "python"),
        ] {
            let svc = service(name, owner, lang);
            store
                .create_service(&svc, &created_event(&svc))
                .await
                .unwrap();
            tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
        }

        let all = store
            .list_services(&ServiceFilter::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(all.items[0].name, "c");

        let filtered = store
            .list_services(
                &ServiceFilter {
                    owner: Some("t1".to_string()),
                    language: Some("python".to_string()),
                },
                0,
                10,
            )
            .await
            .unwrap();
        assert_eq!(filtered.total, 1);
        assert_eq!(filtered.items[0].name, "a");

        let limited = store
            .list_services(&ServiceFilter::default(), 1, 1)
            .await
            .unwrap();
        assert_eq!(limited.items.len(), 1);
        assert_eq!(limited.items[0].name, "b");
    }

    #[tokio::test]
    async fn aggregates_and_maintenance() {
        let store = store();
        for (name, owner, lang) in [
            ("a", "zeta", "python"),
            ("b", "alpha", "go"),
            ("c", "alpha", "python"),
        ] {
            let svc = service(name, owner, lang);
            store
                .create_service(&svc, &created_event(&svc))
                .await
                .unwrap();
        }
        let mut deployed = store.get_service_by_name("a").await.unwrap().unwrap();
        deployed.record_deployment("v2");
        store
            .update_deployment(
                &deployed,
                &ServiceEvent::log(&deployed.id, "deployed", None, None),
            )
            .await
            .unwrap();

        assert_eq!(store.distinct_owners().await.unwrap(), vec!["alpha", "zeta"]);
        assert_eq!(
            store.distinct_languages().await.unwrap(),
            vec!["go", "python"]
        );
        assert_eq!(
            store.language_distribution().await.unwrap().get("python"),
            Some(&2)
        );
        assert_eq!(
            store.owner_distribution().await.unwrap().get("alpha"),
            Some(&2)
        );

        let recent = store.recent_deployments(5).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].name, "a");

        let since = (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339();
        let summary = store.activity_summary(&since).await.unwrap();
        assert_eq!(summary.get("created"), Some(&3));
        assert_eq!(summary.get("deployed"), Some(&1));

        let recent_events = store.recent_events(2).await.unwrap();
        assert_eq!(recent_events.len(), 2);
        assert_eq!(recent_events[0].event_type, "deployed");

        store.ping().await.unwrap();
        store.compact().await.unwrap();
    }
}
