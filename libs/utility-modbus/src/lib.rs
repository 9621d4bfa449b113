//! Modbus TCP coil session for the utility scheduler
//!
//! ```text
//! utility-modbus
//!     ├── ModbusSession (connect-with-retry, idempotent close)
//!     ├── TcpConnector / TcpChannel (MBAP framing over tokio TcpStream)
//!     ├── FrameCodec (transaction ids, header validation)
//!     └── ModbusPdu (FC01 / FC05 encode and decode)
//! ```
//!
//! Only the coil function codes are implemented; register access is out of scope.

mod channel;
mod connection;
pub mod constants;
mod error;
mod frame;
mod pdu;
mod session;

pub use channel::{CoilChannel, Connector};
pub use connection::{TcpChannel, TcpConnector};
pub use error::{ModbusError, Result};
pub use frame::{FrameCodec, MbapHeader};
pub use pdu::{exception_description, function_name, ModbusPdu};
pub use session::{
    ControllerConfig, ModbusSession, DEFAULT_RETRIES, DEFAULT_RETRY_INTERVAL, DEFAULT_TIMEOUT,
    DEFAULT_UNIT_ID,
};
