//! SQLite persistence for controllers, schedules, tasks and history

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::sqlite::SqliteClient;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;
use utility_modbus::ControllerConfig;

use crate::error::{Result, ScheduleError};
use crate::store::{ControllerConfigProvider, HistorySink, ScheduleStore};
use crate::types::{HistoryRecord, Schedule, ScheduleTask, SessionSettings};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS plc_connections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ip_address TEXT NOT NULL,
        port INTEGER NOT NULL DEFAULT 502
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedule_groups (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        is_active BOOLEAN NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedule_tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        schedule_group_id INTEGER NOT NULL REFERENCES schedule_groups(id) ON DELETE CASCADE,
        tag_name TEXT NOT NULL,
        tag_value TEXT NOT NULL,
        status BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedule_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        schedule_group_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        status BOOLEAN NOT NULL,
        succeeded BOOLEAN NOT NULL DEFAULT 1,
        user TEXT,
        recorded_at TIMESTAMP NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_schedule_tags_group ON schedule_tags(schedule_group_id)",
    "CREATE INDEX IF NOT EXISTS idx_schedule_history_group ON schedule_history(schedule_group_id)",
];

/// Store backed by one SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    settings: SessionSettings,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool, settings: SessionSettings) -> Self {
        Self { pool, settings }
    }

    pub fn from_client(client: &SqliteClient, settings: SessionSettings) -> Self {
        Self::new(client.pool().clone(), settings)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Create tables if they do not exist
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Schedule schema ready");
        Ok(())
    }

    /// Add a controller row and return its id
    pub async fn insert_controller(&self, ip_address: &str, port: u16) -> Result<i64> {
        let result = sqlx::query("INSERT INTO plc_connections (ip_address, port) VALUES (?, ?)")
            .bind(ip_address)
            .bind(i64::from(port))
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Insert or update a schedule by id
    pub async fn upsert_schedule(&self, schedule: &Schedule) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedule_groups (id, name, is_active)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                is_active = excluded.is_active
            "#,
        )
        .bind(schedule.id)
        .bind(&schedule.name)
        .bind(schedule.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Add a task to a schedule and return its id
    pub async fn insert_task(
        &self,
        schedule_id: i64,
        name: &str,
        tag_value: &str,
        status: bool,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO schedule_tags (schedule_group_id, tag_name, tag_value, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(schedule_id)
        .bind(name)
        .bind(tag_value)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_task(&self, id: i64) -> Result<ScheduleTask> {
        let row = sqlx::query(
            r#"
            SELECT id, schedule_group_id, tag_name, tag_value, status
            FROM schedule_tags
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => hydrate_task(row),
            None => Err(ScheduleError::TaskNotFound(id)),
        }
    }

    /// History of one schedule, oldest first
    pub async fn list_history(&self, schedule_id: i64) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT schedule_group_id, tag_id, status, succeeded, user, recorded_at
            FROM schedule_history
            WHERE schedule_group_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(hydrate_history(row)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl ControllerConfigProvider for SqliteRepository {
    async fn fetch_config(&self) -> Result<Option<ControllerConfig>> {
        let row = sqlx::query(
            "SELECT ip_address, port FROM plc_connections ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let ip_address: String = row.try_get("ip_address")?;
        let port: i64 = row.try_get("port")?;
        let port = u16::try_from(port)
            .map_err(|_| ScheduleError::InvalidConfig(format!("port {port} out of range")))?;

        Ok(Some(self.settings.controller(ip_address, port)))
    }
}

#[async_trait]
impl ScheduleStore for SqliteRepository {
    async fn fetch_schedule(&self, id: i64) -> Result<Option<Schedule>> {
        let row = sqlx::query("SELECT id, name, is_active FROM schedule_groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Schedule {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                is_active: row.try_get("is_active")?,
            })),
            None => Ok(None),
        }
    }

    async fn list_tasks(&self, schedule: &Schedule) -> Result<Vec<ScheduleTask>> {
        let rows = sqlx::query(
            r#"
            SELECT id, schedule_group_id, tag_name, tag_value, status
            FROM schedule_tags
            WHERE schedule_group_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(schedule.id)
        .fetch_all(&self.pool)
        .await?;

        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            tasks.push(hydrate_task(row)?);
        }
        Ok(tasks)
    }

    async fn save_task_status(&self, task: &ScheduleTask, status: bool) -> Result<()> {
        let result = sqlx::query("UPDATE schedule_tags SET status = ? WHERE id = ?")
            .bind(status)
            .bind(task.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ScheduleError::TaskNotFound(task.id));
        }
        Ok(())
    }
}

#[async_trait]
impl HistorySink for SqliteRepository {
    async fn record(&self, record: &HistoryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedule_history
                (schedule_group_id, tag_id, status, succeeded, user, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.schedule_id)
        .bind(record.task_id)
        .bind(record.status)
        .bind(record.succeeded)
        .bind(&record.actor)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn hydrate_task(row: SqliteRow) -> Result<ScheduleTask> {
    Ok(ScheduleTask {
        id: row.try_get("id")?,
        schedule_id: row.try_get("schedule_group_id")?,
        name: row.try_get("tag_name")?,
        tag_value: row.try_get("tag_value")?,
        status: row.try_get("status")?,
    })
}

fn hydrate_history(row: SqliteRow) -> Result<HistoryRecord> {
    let recorded_at: DateTime<Utc> = row.try_get("recorded_at")?;
    Ok(HistoryRecord {
        schedule_id: row.try_get("schedule_group_id")?,
        task_id: row.try_get("tag_id")?,
        status: row.try_get("status")?,
        succeeded: row.try_get("succeeded")?,
        actor: row.try_get("user")?,
        recorded_at,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::time::Duration;

    async fn repo() -> SqliteRepository {
        let client = SqliteClient::in_memory().await.unwrap();
        let repo = SqliteRepository::from_client(&client, SessionSettings::default());
        repo.init_schema().await.unwrap();
        repo
    }

    fn schedule(id: i64, is_active: bool) -> Schedule {
        Schedule {
            id,
            name: format!("schedule-{id}"),
            is_active,
        }
    }

    #[tokio::test]
    async fn test_init_schema_is_repeatable() {
        let repo = repo().await;
        repo.init_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_config_absent_then_first_row() {
        let repo = repo().await;
        assert!(repo.fetch_config().await.unwrap().is_none());

        repo.insert_controller("10.0.0.5", 502).await.unwrap();
        repo.insert_controller("10.0.0.6", 1502).await.unwrap();

        let config = repo.fetch_config().await.unwrap().unwrap();
        assert_eq!(config.endpoint(), "10.0.0.5:502");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retries, 3);
    }

    #[tokio::test]
    async fn test_fetch_config_rejects_out_of_range_port() {
        let repo = repo().await;
        sqlx::query("INSERT INTO plc_connections (ip_address, port) VALUES ('10.0.0.5', 70000)")
            .execute(repo.pool())
            .await
            .unwrap();

        assert!(matches!(
            repo.fetch_config().await,
            Err(ScheduleError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_tasks_listed_in_id_order() {
        let repo = repo().await;
        repo.upsert_schedule(&schedule(7, true)).await.unwrap();
        let pump = repo.insert_task(7, "Pump1", "5", false).await.unwrap();
        let valve = repo.insert_task(7, "Valve2", "9", true).await.unwrap();

        let tasks = repo.list_tasks(&schedule(7, true)).await.unwrap();
        let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![pump, valve]);
        assert_eq!(tasks[0].name, "Pump1");
        assert_eq!(tasks[1].tag_value, "9");
        assert!(tasks[1].status);
    }

    #[tokio::test]
    async fn test_fetch_schedule_and_upsert_updates() {
        let repo = repo().await;
        assert!(repo.fetch_schedule(7).await.unwrap().is_none());

        repo.upsert_schedule(&schedule(7, true)).await.unwrap();
        repo.upsert_schedule(&schedule(7, false)).await.unwrap();

        let fetched = repo.fetch_schedule(7).await.unwrap().unwrap();
        assert!(!fetched.is_active);
        assert_eq!(fetched.name, "schedule-7");
    }

    #[tokio::test]
    async fn test_save_task_status() {
        let repo = repo().await;
        repo.upsert_schedule(&schedule(1, true)).await.unwrap();
        let id = repo.insert_task(1, "Pump1", "5", false).await.unwrap();
        let task = repo.get_task(id).await.unwrap();

        repo.save_task_status(&task, true).await.unwrap();
        assert!(repo.get_task(id).await.unwrap().status);

        let ghost = ScheduleTask { id: 999, ..task };
        assert!(matches!(
            repo.save_task_status(&ghost, true).await,
            Err(ScheduleError::TaskNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_history_is_appended() {
        let repo = repo().await;
        repo.upsert_schedule(&schedule(1, true)).await.unwrap();
        let id = repo.insert_task(1, "Pump1", "5", false).await.unwrap();
        let task = repo.get_task(id).await.unwrap();

        repo.record(&HistoryRecord::automated(1, &task, true, true))
            .await
            .unwrap();
        repo.record(&HistoryRecord::automated(1, &task, false, false))
            .await
            .unwrap();

        let history = repo.list_history(1).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].status && history[0].succeeded);
        assert!(!history[1].succeeded);
        assert_eq!(history[1].actor, None);
        assert!(repo.list_history(2).await.unwrap().is_empty());
    }
}
