//! SQLite implementation of the AlertStore trait

use super::{AlertStore, PersistenceError};
use crate::models::{EnrichmentResult, NewAlert, Severity, StoredAlert};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed alert storage
///
/// Connection access is serialized through a mutex; callers in async
/// code offload through `spawn_blocking`.
pub struct SqliteAlertStore {
    conn: Mutex<Connection>,
}

impl SqliteAlertStore {
    /// Create a store at the specified path, initializing the schema if
    /// the database does not exist yet.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteAlertStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (useful for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteAlertStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn row_to_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, String, String, String, String)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    }

    fn decode_alert(
        (id, alert_type, source_ip, severity, enrichment, payload, triggered_at): (
            i64,
            String,
            String,
            String,
            String,
            String,
            String,
        ),
    ) -> Result<StoredAlert, PersistenceError> {
        let enrichment: EnrichmentResult = serde_json::from_str(&enrichment)
            .map_err(|e| PersistenceError::InvalidData(format!("enrichment column: {}", e)))?;
        let payload: serde_json::Value = serde_json::from_str(&payload)
            .map_err(|e| PersistenceError::InvalidData(format!("payload column: {}", e)))?;
        let triggered_at = DateTime::parse_from_rfc3339(&triggered_at)
            .map_err(|e| PersistenceError::InvalidData(format!("triggered_at column: {}", e)))?
            .with_timezone(&Utc);

        Ok(StoredAlert {
            id,
            alert_type,
            source_ip,
            severity: Severity::parse(&severity),
            enrichment,
            payload,
            triggered_at,
        })
    }
}

impl AlertStore for SqliteAlertStore {
    fn create_alert(&self, alert: &NewAlert) -> Result<StoredAlert, PersistenceError> {
        let enrichment = serde_json::to_string(&alert.enrichment)
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;
        let payload = serde_json::to_string(&alert.payload)
            .map_err(|e| PersistenceError::InvalidData(e.to_string()))?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO alerts (alert_type, source_ip, severity, enrichment, payload, triggered_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                alert.alert_type,
                alert.source_ip,
                alert.severity.as_str(),
                enrichment,
                payload,
                alert.triggered_at.to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        Ok(StoredAlert {
            id,
            alert_type: alert.alert_type.clone(),
            source_ip: alert.source_ip.clone(),
            severity: alert.severity,
            enrichment: alert.enrichment.clone(),
            payload: alert.payload.clone(),
            triggered_at: alert.triggered_at,
        })
    }

    fn create_processing_error(
        &self,
        source_ip: &str,
        error: &str,
        original_payload: &serde_json::Value,
    ) -> Result<(), PersistenceError> {
        let payload = serde_json::json!({
            "error": error,
            "original_data": original_payload,
        });
        let record = NewAlert {
            alert_type: "Honeypot Processing Error".to_string(),
            source_ip: source_ip.to_string(),
            severity: Severity::High,
            enrichment: EnrichmentResult::default(),
            payload,
            triggered_at: Utc::now(),
        };
        self.create_alert(&record)?;
        Ok(())
    }

    fn recent_alerts(&self, limit: usize) -> Result<Vec<StoredAlert>, PersistenceError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, alert_type, source_ip, severity, enrichment, payload, triggered_at
             FROM alerts ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map(params![limit as i64], Self::row_to_alert)?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(Self::decode_alert(row?)?);
        }
        Ok(alerts)
    }

    fn clear_all(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM alerts", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoInfo;

    fn sample_alert(ip: &str) -> NewAlert {
        NewAlert {
            alert_type: "Honeypot Triggered".to_string(),
            source_ip: ip.to_string(),
            severity: Severity::Medium,
            enrichment: EnrichmentResult {
                geo: Some(GeoInfo {
                    country_iso: Some("US".to_string()),
                    country: Some("United States".to_string()),
                    city: None,
                    latitude: Some(37.75),
                    longitude: Some(-97.82),
                    timezone: None,
                }),
                reputation_score: Some(42),
            },
            payload: serde_json::json!({"uri": "/admin", "httpMethod": "GET"}),
            triggered_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_read_back() {
        let store = SqliteAlertStore::in_memory().unwrap();

        let created = store.create_alert(&sample_alert("203.0.113.7")).unwrap();
        assert!(created.id > 0);

        let alerts = store.recent_alerts(10).unwrap();
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.source_ip, "203.0.113.7");
        assert_eq!(alert.severity, Severity::Medium);
        assert_eq!(alert.enrichment.reputation_score, Some(42));
        assert_eq!(
            alert.enrichment.geo.as_ref().and_then(|g| g.country_iso.as_deref()),
            Some("US")
        );
        assert_eq!(alert.payload["uri"], "/admin");
    }

    #[test]
    fn test_recent_alerts_newest_first_and_limited() {
        let store = SqliteAlertStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .create_alert(&sample_alert(&format!("198.51.100.{}", i)))
                .unwrap();
        }

        let alerts = store.recent_alerts(3).unwrap();
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[0].source_ip, "198.51.100.4");
        assert_eq!(alerts[2].source_ip, "198.51.100.2");
    }

    #[test]
    fn test_processing_error_record() {
        let store = SqliteAlertStore::in_memory().unwrap();
        store
            .create_processing_error(
                "203.0.113.9",
                "persistence unavailable",
                &serde_json::json!({"sourceIp": "203.0.113.9"}),
            )
            .unwrap();

        let alerts = store.recent_alerts(1).unwrap();
        assert_eq!(alerts[0].alert_type, "Honeypot Processing Error");
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].payload["error"], "persistence unavailable");
    }

    #[test]
    fn test_clear_all() {
        let store = SqliteAlertStore::in_memory().unwrap();
        store.create_alert(&sample_alert("203.0.113.7")).unwrap();
        store.clear_all().unwrap();
        assert!(store.recent_alerts(10).unwrap().is_empty());
    }

    #[test]
    fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.db");

        {
            let store = SqliteAlertStore::new(&path).unwrap();
            store.create_alert(&sample_alert("203.0.113.7")).unwrap();
        }

        let store = SqliteAlertStore::new(&path).unwrap();
        assert_eq!(store.recent_alerts(10).unwrap().len(), 1);
    }
}
