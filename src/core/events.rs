/// Append-only event log backed by SQLite
///
/// Every desk mutation is published here so other processes (a second
/// dashboard, the API server) can follow along by polling for newer ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::error::Result;
use crate::core::referral::Status;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Accepted,
    Enroute,
    ArriveDest,
    Handover,
    Rejected,
    Vitals,
    Interventions,
    IcuUpdated,
    DaySeeded,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Accepted => "ACCEPTED",
            EventKind::Enroute => "ENROUTE",
            EventKind::ArriveDest => "ARRIVE_DEST",
            EventKind::Handover => "HANDOVER",
            EventKind::Rejected => "REJECTED",
            EventKind::Vitals => "VITALS",
            EventKind::Interventions => "INTERVENTIONS",
            EventKind::IcuUpdated => "ICU_UPDATED",
            EventKind::DaySeeded => "DAY_SEEDED",
        }
    }

    /// Event published when a referral enters `status`
    pub fn for_status(status: Status) -> Option<Self> {
        match status {
            Status::Accepted => Some(EventKind::Accepted),
            Status::Enroute => Some(EventKind::Enroute),
            Status::ArriveDest => Some(EventKind::ArriveDest),
            Status::Handover => Some(EventKind::Handover),
            Status::Rejected => Some(EventKind::Rejected),
            Status::Prealert => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub case_id: String,
    pub actor: String,
    pub payload: serde_json::Value,
}

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS events(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts REAL,
        type TEXT,
        case_id TEXT,
        actor TEXT,
        payload TEXT
    )";

#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Open (creating if needed) the log at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    /// Private in-memory log; a single connection so every query sees the same database
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Append an event, returns its id
    pub async fn publish_event(
        &self,
        kind: EventKind,
        case_id: &str,
        actor: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<i64> {
        let payload = payload.unwrap_or_else(|| serde_json::json!({}));
        let ts = Utc::now().timestamp_millis() as f64 / 1000.0;

        let result = sqlx::query(
            "INSERT INTO events(ts,type,case_id,actor,payload) VALUES(?,?,?,?,?)",
        )
        .bind(ts)
        .bind(kind.as_str())
        .bind(case_id)
        .bind(actor)
        .bind(serde_json::to_string(&payload)?)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(id, kind = %kind, case_id, actor, "event published");
        Ok(id)
    }

    /// Events with id greater than `last_id`, oldest first, optionally for one case
    pub async fn poll_events_since(
        &self,
        last_id: i64,
        case_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Event>> {
        let rows = match case_id {
            Some(case_id) => {
                sqlx::query(
                    "SELECT id,ts,type,case_id,actor,payload
                     FROM events WHERE id>? AND case_id=? ORDER BY id ASC LIMIT ?",
                )
                .bind(last_id)
                .bind(case_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id,ts,type,case_id,actor,payload
                     FROM events WHERE id>? ORDER BY id ASC LIMIT ?",
                )
                .bind(last_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let ts: f64 = row.try_get("ts")?;
            let payload: Option<String> = row.try_get("payload")?;
            // A payload we cannot decode comes back empty rather than failing the poll
            let payload = payload
                .and_then(|p| serde_json::from_str(&p).ok())
                .unwrap_or_else(|| serde_json::json!({}));

            events.push(Event {
                id: row.try_get("id")?,
                ts: seconds_to_utc(ts),
                kind: row.try_get::<Option<String>, _>("type")?.unwrap_or_default(),
                case_id: row.try_get::<Option<String>, _>("case_id")?.unwrap_or_default(),
                actor: row.try_get::<Option<String>, _>("actor")?.unwrap_or_default(),
                payload,
            });
        }
        Ok(events)
    }

    /// Most recent `limit` events, oldest first
    pub async fn recent(&self, limit: i64) -> Result<Vec<Event>> {
        let last = self.last_id().await?;
        self.poll_events_since((last - limit).max(0), None, limit).await
    }

    /// Highest id in the log, 0 when empty
    pub async fn last_id(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(id), 0) AS last FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("last")?)
    }
}

fn seconds_to_utc(ts: f64) -> DateTime<Utc> {
    let millis = (ts * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_and_poll() {
        let store = EventStore::in_memory().await.unwrap();
        let first = store
            .publish_event(EventKind::Accepted, "AAA", "desk", None)
            .await
            .unwrap();
        let second = store
            .publish_event(EventKind::Vitals, "BBB", "desk", Some(json!({"hr": 90})))
            .await
            .unwrap();
        assert!(second > first);

        let all = store.poll_events_since(0, None, 200).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, "ACCEPTED");
        assert_eq!(all[0].payload, json!({}));
        assert_eq!(all[1].payload["hr"], 90);

        let newer = store.poll_events_since(first, None, 200).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].case_id, "BBB");
    }

    #[tokio::test]
    async fn test_poll_by_case_and_limit() {
        let store = EventStore::in_memory().await.unwrap();
        for i in 0..5 {
            let case = if i % 2 == 0 { "EVEN" } else { "ODD" };
            store
                .publish_event(EventKind::Interventions, case, "desk", None)
                .await
                .unwrap();
        }

        let even = store.poll_events_since(0, Some("EVEN"), 200).await.unwrap();
        assert_eq!(even.len(), 3);
        assert!(even.windows(2).all(|w| w[0].id < w[1].id));

        let limited = store.poll_events_since(0, None, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, 1);
    }

    #[tokio::test]
    async fn test_bad_payload_reads_as_empty() {
        let store = EventStore::in_memory().await.unwrap();
        sqlx::query("INSERT INTO events(ts,type,case_id,actor,payload) VALUES(1.5,'VITALS','X','y','not json')")
            .execute(&store.pool)
            .await
            .unwrap();

        let events = store.poll_events_since(0, None, 10).await.unwrap();
        assert_eq!(events[0].payload, json!({}));
        assert_eq!(events[0].ts.timestamp_millis(), 1500);
    }

    #[tokio::test]
    async fn test_recent_and_last_id() {
        let store = EventStore::in_memory().await.unwrap();
        assert_eq!(store.last_id().await.unwrap(), 0);
        for _ in 0..4 {
            store.publish_event(EventKind::IcuUpdated, "", "desk", None).await.unwrap();
        }
        assert_eq!(store.last_id().await.unwrap(), 4);

        let recent = store.recent(2).await.unwrap();
        let ids: Vec<i64> = recent.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_file_backed_log_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.db");
        {
            let store = EventStore::open(&path).await.unwrap();
            store.publish_event(EventKind::DaySeeded, "", "desk", None).await.unwrap();
        }
        let reopened = EventStore::open(&path).await.unwrap();
        assert_eq!(reopened.last_id().await.unwrap(), 1);
    }
}
