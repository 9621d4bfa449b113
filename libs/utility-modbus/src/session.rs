//! Modbus session with bounded connect retry
//!
//! A session is owned by exactly one execution. `close` is idempotent, and dropping
//! a session that is still open releases the channel as well.

use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::channel::{CoilChannel, Connector};
use crate::error::{ModbusError, Result};

/// Default Modbus unit identifier
pub const DEFAULT_UNIT_ID: u8 = 1;

/// Default connect/response timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of retries after the first attempt
pub const DEFAULT_RETRIES: u32 = 3;

/// Fixed pause between connect attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Connection parameters for the single configured controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub host: String,
    pub port: u16,
    /// Connect and per-request response timeout
    pub timeout: Duration,
    /// Retries after the first attempt; `retries + 1` attempts in total
    pub retries: u32,
    pub retry_interval: Duration,
    pub unit_id: u8,
}

impl ControllerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            unit_id: DEFAULT_UNIT_ID,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Total connect attempts allowed by the retry policy
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ModbusError::InvalidConfig(
                "controller host is empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ModbusError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// One connection to the controller, open or closed
pub struct ModbusSession<C: CoilChannel> {
    endpoint: ControllerConfig,
    channel: Option<C>,
    attempts: u32,
}

impl<C: CoilChannel> fmt::Debug for ModbusSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModbusSession")
            .field("endpoint", &self.endpoint.endpoint())
            .field("is_open", &self.is_open())
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl<C: CoilChannel> ModbusSession<C> {
    /// A session that has not been connected yet
    pub fn new(endpoint: ControllerConfig) -> Self {
        Self {
            endpoint,
            channel: None,
            attempts: 0,
        }
    }

    /// Connect with retry and return the open session
    pub async fn open<K>(connector: &K, config: &ControllerConfig) -> Result<Self>
    where
        K: Connector<Channel = C> + ?Sized,
    {
        let mut session = Self::new(config.clone());
        session.connect(connector).await?;
        Ok(session)
    }

    /// Attempt the handshake up to `retries + 1` times, pausing `retry_interval`
    /// between attempts but not after the last one.
    pub async fn connect<K>(&mut self, connector: &K) -> Result<()>
    where
        K: Connector<Channel = C> + ?Sized,
    {
        self.endpoint.validate()?;
        // Reconnecting an open session replaces its channel
        self.close().await;

        let endpoint = self.endpoint.endpoint();
        let max_attempts = self.endpoint.max_attempts();

        for attempt in 1..=max_attempts {
            self.attempts = attempt;
            match connector.connect(&self.endpoint).await {
                Ok(channel) => {
                    info!(
                        "Connected to Modbus server at {} on attempt {}",
                        endpoint, attempt
                    );
                    self.channel = Some(channel);
                    return Ok(());
                },
                Err(ModbusError::Connection(reason)) => {
                    warn!(
                        "Connection attempt {} failed for {}: {}",
                        attempt, endpoint, reason
                    );
                },
                Err(e) => {
                    warn!("Connection attempt {} error for {}: {}", attempt, endpoint, e);
                },
            }

            if attempt < max_attempts {
                sleep(self.endpoint.retry_interval).await;
            }
        }

        error!(
            "Failed to connect to Modbus server at {} after {} attempts",
            endpoint, max_attempts
        );
        Err(ModbusError::RetriesExhausted {
            endpoint,
            attempts: max_attempts,
        })
    }

    /// FC05 write of one coil
    pub async fn write_coil(&mut self, address: u16, value: bool) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(ModbusError::NotConnected)?;
        channel.write_single_coil(address, value).await
    }

    /// FC01 read of `quantity` coils
    pub async fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<bool>> {
        let channel = self.channel.as_mut().ok_or(ModbusError::NotConnected)?;
        channel.read_coils(address, quantity).await
    }

    /// Release the channel. Closing a closed session is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                debug!("Channel shutdown for {}: {}", self.endpoint.endpoint(), e);
            }
            info!("Modbus connection to {} closed", self.endpoint.endpoint());
        }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    pub fn endpoint(&self) -> &ControllerConfig {
        &self.endpoint
    }

    /// Attempts used by the last `connect`
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl<C: CoilChannel> Drop for ModbusSession<C> {
    fn drop(&mut self) {
        if self.channel.take().is_some() {
            warn!(
                "Modbus session to {} dropped while open, channel released",
                self.endpoint.endpoint()
            );
        }
    }
}
