//! Modbus error types

use thiserror::Error;

/// Result type for Modbus operations
pub type Result<T> = std::result::Result<T, ModbusError>;

/// Modbus session and wire errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModbusError {
    /// Connection refused or handshake rejected
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Connect or response timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Socket-level failure after the connection was established
    #[error("IO error: {0}")]
    Io(String),

    /// Malformed or mismatched frame
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Exception response from the controller
    #[error("Modbus exception {code:#04X} for FC{function:02X}: {description}")]
    Exception {
        function: u8,
        code: u8,
        description: &'static str,
    },

    /// Operation attempted on a closed session
    #[error("Not connected")]
    NotConnected,

    /// Session parameters rejected before any attempt
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every connect attempt failed
    #[error("Failed to connect to Modbus server at {endpoint} after {attempts} attempts")]
    RetriesExhausted { endpoint: String, attempts: u32 },
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        ModbusError::Io(err.to_string())
    }
}
