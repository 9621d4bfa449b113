//! Schedule domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use utility_modbus::{
    ControllerConfig, DEFAULT_RETRIES, DEFAULT_RETRY_INTERVAL, DEFAULT_TIMEOUT, DEFAULT_UNIT_ID,
};

use crate::error::{Result, ScheduleError};

/// A named group of points driven to one target state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

/// One coil point belonging to a schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTask {
    pub id: i64,
    pub schedule_id: i64,
    pub name: String,
    /// Stored tag value; parsed as the coil address
    pub tag_value: String,
    /// Last successfully written state
    pub status: bool,
}

impl ScheduleTask {
    /// Coil address parsed from the stored tag value
    pub fn address(&self) -> Result<u16> {
        let raw = self.tag_value.trim();
        let value: i64 = raw.parse().map_err(|e: std::num::ParseIntError| {
            ScheduleError::InvalidAddress {
                tag_value: self.tag_value.clone(),
                reason: e.to_string(),
            }
        })?;

        u16::try_from(value).map_err(|_| ScheduleError::InvalidAddress {
            tag_value: self.tag_value.clone(),
            reason: "outside coil address range 0..=65535".to_string(),
        })
    }
}

/// Append-only audit fact for one coil write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub schedule_id: i64,
    pub task_id: i64,
    /// Coil state after the attempt
    pub status: bool,
    /// False only under [`HistoryPolicy::AllAttempts`] for a rejected write
    pub succeeded: bool,
    /// `None` for automated runs
    pub actor: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Record for an automated run
    pub fn automated(schedule_id: i64, task: &ScheduleTask, status: bool, succeeded: bool) -> Self {
        Self {
            schedule_id,
            task_id: task.id,
            status,
            succeeded,
            actor: None,
            recorded_at: Utc::now(),
        }
    }
}

/// Which write attempts produce a history record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Only acknowledged writes
    #[default]
    SuccessOnly,
    /// Every attempt, failures recorded with the unchanged status
    AllAttempts,
}

/// Retry and framing settings applied to the stored controller address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub timeout: Duration,
    pub retries: u32,
    pub retry_interval: Duration,
    pub unit_id: u8,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            unit_id: DEFAULT_UNIT_ID,
        }
    }
}

impl SessionSettings {
    pub fn controller(&self, host: impl Into<String>, port: u16) -> ControllerConfig {
        ControllerConfig::new(host, port)
            .with_timeout(self.timeout)
            .with_retries(self.retries)
            .with_retry_interval(self.retry_interval)
            .with_unit_id(self.unit_id)
    }
}

/// Result of one point in the write fold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PointOutcome {
    Written {
        task_id: i64,
        name: String,
        address: u16,
    },
    Failed {
        task_id: i64,
        name: String,
        tag_value: String,
        cause: String,
    },
}

impl PointOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, PointOutcome::Written { .. })
    }

    pub fn task_id(&self) -> i64 {
        match self {
            PointOutcome::Written { task_id, .. } | PointOutcome::Failed { task_id, .. } => {
                *task_id
            },
        }
    }
}

/// Terminal state of one schedule run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// Every point was attempted
    Completed { written: usize, failed: usize },
    /// Deliberate skip, not an error
    ScheduleInactive,
    ScheduleNotFound,
    NoConfigFound,
    ConnectionFailed { endpoint: String, attempts: u32 },
    UnexpectedFailure { cause: String },
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed { written, failed } => {
                write!(f, "completed ({} written, {} failed)", written, failed)
            },
            RunOutcome::ScheduleInactive => write!(f, "skipped (inactive)"),
            RunOutcome::ScheduleNotFound => write!(f, "schedule not found"),
            RunOutcome::NoConfigFound => write!(f, "no PLC connection configured"),
            RunOutcome::ConnectionFailed { endpoint, attempts } => {
                write!(f, "connection to {} failed after {} attempts", endpoint, attempts)
            },
            RunOutcome::UnexpectedFailure { cause } => write!(f, "unexpected failure: {}", cause),
        }
    }
}

/// Everything one `execute` call did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub schedule_id: i64,
    pub desired_status: bool,
    pub outcome: RunOutcome,
    /// In task order; empty when the run stopped before writing
    pub points: Vec<PointOutcome>,
    /// Connect attempts made; zero when no session was opened
    pub connect_attempts: u32,
}

impl ExecutionReport {
    pub fn new(schedule_id: i64, desired_status: bool, outcome: RunOutcome) -> Self {
        Self {
            schedule_id,
            desired_status,
            outcome,
            points: Vec::new(),
            connect_attempts: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.points.iter().filter(|p| p.is_written()).count()
    }

    pub fn failed(&self) -> usize {
        self.points.len() - self.written()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn task(tag_value: &str) -> ScheduleTask {
        ScheduleTask {
            id: 1,
            schedule_id: 7,
            name: "Pump1".to_string(),
            tag_value: tag_value.to_string(),
            status: false,
        }
    }

    #[test]
    fn test_address_parses_stored_value() {
        assert_eq!(task("5").address().unwrap(), 5);
        assert_eq!(task(" 9 ").address().unwrap(), 9);
        assert_eq!(task("65535").address().unwrap(), 65535);
    }

    #[test]
    fn test_address_rejects_non_numeric_and_out_of_range() {
        for bad in ["", "abc", "5.0", "-1", "65536"] {
            assert!(
                matches!(task(bad).address(), Err(ScheduleError::InvalidAddress { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_history_policy_deserialises_snake_case() {
        let policy: HistoryPolicy = serde_json::from_str("\"all_attempts\"").unwrap();
        assert_eq!(policy, HistoryPolicy::AllAttempts);
        assert_eq!(HistoryPolicy::default(), HistoryPolicy::SuccessOnly);
    }

    #[test]
    fn test_session_settings_build_controller() {
        let settings = SessionSettings {
            timeout: Duration::from_secs(2),
            retries: 1,
            retry_interval: Duration::from_millis(250),
            unit_id: 3,
        };
        let cfg = settings.controller("10.0.0.5", 502);

        assert_eq!(cfg.endpoint(), "10.0.0.5:502");
        assert_eq!(cfg.timeout, Duration::from_secs(2));
        assert_eq!(cfg.max_attempts(), 2);
        assert_eq!(cfg.retry_interval, Duration::from_millis(250));
        assert_eq!(cfg.unit_id, 3);
    }

    #[test]
    fn test_report_counts() {
        let mut report = ExecutionReport::new(7, true, RunOutcome::ScheduleInactive);
        report.points.push(PointOutcome::Written {
            task_id: 1,
            name: "A".to_string(),
            address: 1,
        });
        report.points.push(PointOutcome::Failed {
            task_id: 2,
            name: "B".to_string(),
            tag_value: "x".to_string(),
            cause: "bad".to_string(),
        });

        assert_eq!(report.written(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.points[1].task_id(), 2);
    }
}
