//! Transport seams for the coil session
//!
//! `Connector` performs one connection attempt; `ModbusSession` owns the retry policy
//! around it. `CoilChannel` is the open connection.

use async_trait::async_trait;

use crate::error::Result;
use crate::session::ControllerConfig;

/// An open channel to the controller
#[async_trait]
pub trait CoilChannel: Send {
    /// FC05 write; `Ok` only when the controller acknowledged the write
    async fn write_single_coil(&mut self, address: u16, value: bool) -> Result<()>;

    /// FC01 read of `quantity` coils starting at `address`
    async fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<bool>>;

    /// Release the underlying connection
    async fn close(&mut self) -> Result<()>;
}

/// A single connection attempt against the configured controller
#[async_trait]
pub trait Connector: Send + Sync {
    type Channel: CoilChannel;

    async fn connect(&self, config: &ControllerConfig) -> Result<Self::Channel>;
}
