//! Utility Schedule - coil schedule execution
//!
//! Fetches a schedule and the controller address, opens one Modbus session, writes
//! every point with per-point fault isolation and always closes the session.

pub mod error;
pub mod executor;
pub mod repository;
pub mod store;
pub mod types;

pub use error::{Result, ScheduleError};
pub use executor::{execute_schedule, ScheduleExecutor};
pub use repository::SqliteRepository;
pub use store::{ControllerConfigProvider, HistorySink, ScheduleStore};
pub use types::{
    ExecutionReport, HistoryPolicy, HistoryRecord, PointOutcome, RunOutcome, Schedule,
    ScheduleTask, SessionSettings,
};
