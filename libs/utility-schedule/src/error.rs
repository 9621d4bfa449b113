//! Schedule execution error types

use thiserror::Error;
use utility_modbus::ModbusError;

/// Result type for schedule operations
pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Schedule execution errors
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// No schedule with this id
    #[error("Schedule with ID {0} does not exist")]
    ScheduleNotFound(i64),

    /// No task with this id
    #[error("Schedule tag with ID {0} does not exist")]
    TaskNotFound(i64),

    /// No controller row configured
    #[error("No PLC connection found in the database")]
    NoConfigFound,

    /// Stored controller row cannot be used
    #[error("Invalid controller configuration: {0}")]
    InvalidConfig(String),

    /// Every connect attempt failed
    #[error("Failed to connect to Modbus server at {endpoint} after {attempts} attempts")]
    Connection { endpoint: String, attempts: u32 },

    /// Stored tag value is not a coil address
    #[error("Invalid coil address {tag_value:?}: {reason}")]
    InvalidAddress { tag_value: String, reason: String },

    /// Modbus failure other than connect exhaustion
    #[error("Modbus error: {0}")]
    Modbus(ModbusError),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for ScheduleError {
    fn from(err: sqlx::Error) -> Self {
        ScheduleError::Database(err.to_string())
    }
}

impl From<ModbusError> for ScheduleError {
    fn from(err: ModbusError) -> Self {
        match err {
            ModbusError::RetriesExhausted { endpoint, attempts } => {
                ScheduleError::Connection { endpoint, attempts }
            },
            other => ScheduleError::Modbus(other),
        }
    }
}
