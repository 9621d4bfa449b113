//! Schedule Executor - drives every point of a schedule to the desired coil state
//!
//! One run owns at most one Modbus session. Point failures are isolated and the
//! session is closed exactly once however the write fold ends, including a panic.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use utility_modbus::{Connector, ModbusSession};

use crate::error::{Result, ScheduleError};
use crate::store::{ControllerConfigProvider, HistorySink, ScheduleStore};
use crate::types::{
    ExecutionReport, HistoryPolicy, HistoryRecord, PointOutcome, RunOutcome, Schedule,
    ScheduleTask,
};

/// Schedule executor
pub struct ScheduleExecutor<K: Connector> {
    connector: K,
    configs: Arc<dyn ControllerConfigProvider>,
    schedules: Arc<dyn ScheduleStore>,
    history: Arc<dyn HistorySink>,
    policy: HistoryPolicy,
}

impl<K: Connector> ScheduleExecutor<K> {
    pub fn new(
        connector: K,
        configs: Arc<dyn ControllerConfigProvider>,
        schedules: Arc<dyn ScheduleStore>,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            connector,
            configs,
            schedules,
            history,
            policy: HistoryPolicy::default(),
        }
    }

    /// Executor whose three stores are the same backend
    pub fn from_store<S>(connector: K, store: Arc<S>) -> Self
    where
        S: ControllerConfigProvider + ScheduleStore + HistorySink + 'static,
    {
        Self::new(connector, store.clone(), store.clone(), store)
    }

    pub fn with_history_policy(mut self, policy: HistoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one schedule. Never fails: every terminal state is in the report.
    pub async fn execute(&self, schedule_id: i64, desired_status: bool) -> ExecutionReport {
        let mut report = ExecutionReport::new(
            schedule_id,
            desired_status,
            RunOutcome::Completed {
                written: 0,
                failed: 0,
            },
        );

        let result = AssertUnwindSafe(self.run(&mut report)).catch_unwind().await;
        report.outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => outcome_for_error(&mut report, e),
            Err(panic) => RunOutcome::UnexpectedFailure {
                cause: panic_message(panic.as_ref()),
            },
        };

        log_outcome(&report);
        report
    }

    async fn run(&self, report: &mut ExecutionReport) -> Result<RunOutcome> {
        let schedule_id = report.schedule_id;
        let desired = report.desired_status;

        let schedule = self
            .schedules
            .fetch_schedule(schedule_id)
            .await?
            .ok_or(ScheduleError::ScheduleNotFound(schedule_id))?;

        if !schedule.is_active {
            return Ok(RunOutcome::ScheduleInactive);
        }

        let tasks = self.schedules.list_tasks(&schedule).await?;
        let config = self
            .configs
            .fetch_config()
            .await?
            .ok_or(ScheduleError::NoConfigFound)?;

        let mut session = ModbusSession::open(&self.connector, &config).await?;
        report.connect_attempts = session.attempts();
        debug!(
            "Schedule {} writing {} points as {}",
            schedule.id,
            tasks.len(),
            desired
        );

        let fold = AssertUnwindSafe(self.write_points(
            &mut session,
            &schedule,
            &tasks,
            desired,
            &mut report.points,
        ))
        .catch_unwind()
        .await;

        session.close().await;

        match fold {
            Ok(()) => Ok(RunOutcome::Completed {
                written: report.written(),
                failed: report.failed(),
            }),
            Err(panic) => Ok(RunOutcome::UnexpectedFailure {
                cause: panic_message(panic.as_ref()),
            }),
        }
    }

    /// Attempt every point in order; one point's failure never stops the next
    async fn write_points(
        &self,
        session: &mut ModbusSession<K::Channel>,
        schedule: &Schedule,
        tasks: &[ScheduleTask],
        desired: bool,
        points: &mut Vec<PointOutcome>,
    ) {
        for task in tasks {
            match self.write_point(session, task, desired).await {
                Ok(address) => {
                    debug!("Point {} (coil {}) set to {}", task.name, address, desired);
                    self.append_history(HistoryRecord::automated(schedule.id, task, desired, true))
                        .await;
                    points.push(PointOutcome::Written {
                        task_id: task.id,
                        name: task.name.clone(),
                        address,
                    });
                },
                Err(e) => {
                    error!(
                        "Failed to write point {} (tag value {:?}) in schedule {}: {}",
                        task.name, task.tag_value, schedule.id, e
                    );
                    if self.policy == HistoryPolicy::AllAttempts {
                        self.append_history(HistoryRecord::automated(
                            schedule.id,
                            task,
                            task.status,
                            false,
                        ))
                        .await;
                    }
                    points.push(PointOutcome::Failed {
                        task_id: task.id,
                        name: task.name.clone(),
                        tag_value: task.tag_value.clone(),
                        cause: e.to_string(),
                    });
                },
            }
        }
    }

    async fn write_point(
        &self,
        session: &mut ModbusSession<K::Channel>,
        task: &ScheduleTask,
        desired: bool,
    ) -> Result<u16> {
        let address = task.address()?;
        session.write_coil(address, desired).await?;
        self.schedules.save_task_status(task, desired).await?;
        Ok(address)
    }

    async fn append_history(&self, record: HistoryRecord) {
        if let Err(e) = self.history.record(&record).await {
            warn!(
                "History record for task {} in schedule {} not saved: {}",
                record.task_id, record.schedule_id, e
            );
        }
    }
}

fn outcome_for_error(report: &mut ExecutionReport, err: ScheduleError) -> RunOutcome {
    match err {
        ScheduleError::ScheduleNotFound(_) => RunOutcome::ScheduleNotFound,
        ScheduleError::NoConfigFound => RunOutcome::NoConfigFound,
        ScheduleError::Connection { endpoint, attempts } => {
            report.connect_attempts = attempts;
            RunOutcome::ConnectionFailed { endpoint, attempts }
        },
        other => RunOutcome::UnexpectedFailure {
            cause: other.to_string(),
        },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}

fn log_outcome(report: &ExecutionReport) {
    let id = report.schedule_id;
    match &report.outcome {
        RunOutcome::Completed { written, failed: 0 } => {
            info!("Schedule {} completed: {} points written", id, written)
        },
        RunOutcome::Completed { written, failed } => warn!(
            "Schedule {} completed with errors: {} written, {} failed",
            id, written, failed
        ),
        RunOutcome::ScheduleInactive => info!("Schedule {} is inactive, skipping", id),
        RunOutcome::ScheduleNotFound => warn!("Schedule with ID {} does not exist", id),
        RunOutcome::NoConfigFound => error!("No PLC connection found for schedule {}", id),
        RunOutcome::ConnectionFailed { endpoint, attempts } => error!(
            "Schedule {} aborted: no connection to {} after {} attempts",
            id, endpoint, attempts
        ),
        RunOutcome::UnexpectedFailure { cause } => {
            error!("Unexpected error executing schedule {}: {}", id, cause)
        },
    }
}

/// Run one schedule against a store that serves config, schedules and history
pub async fn execute_schedule<K, S>(
    connector: K,
    store: Arc<S>,
    policy: HistoryPolicy,
    schedule_id: i64,
    desired_status: bool,
) -> ExecutionReport
where
    K: Connector,
    S: ControllerConfigProvider + ScheduleStore + HistorySink + 'static,
{
    ScheduleExecutor::from_store(connector, store)
        .with_history_policy(policy)
        .execute(schedule_id, desired_status)
        .await
}
