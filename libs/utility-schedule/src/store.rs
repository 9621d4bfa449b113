//! Storage seams consumed by the executor

use async_trait::async_trait;
use utility_modbus::ControllerConfig;

use crate::error::Result;
use crate::types::{HistoryRecord, Schedule, ScheduleTask};

/// Source of the single controller connection
#[async_trait]
pub trait ControllerConfigProvider: Send + Sync {
    /// `None` when no controller is configured
    async fn fetch_config(&self) -> Result<Option<ControllerConfig>>;
}

/// Schedules and their points
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn fetch_schedule(&self, id: i64) -> Result<Option<Schedule>>;

    /// Tasks of `schedule`, ordered by task id
    async fn list_tasks(&self, schedule: &Schedule) -> Result<Vec<ScheduleTask>>;

    /// Persist the last written state of one task
    async fn save_task_status(&self, task: &ScheduleTask, status: bool) -> Result<()>;
}

/// Append-only audit log
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, record: &HistoryRecord) -> Result<()>;
}
