//! Modbus TCP connection
//!
//! One request/response pair in flight at a time; every read is bounded by the
//! configured timeout.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::channel::{CoilChannel, Connector};
use crate::constants::MBAP_HEADER_LEN;
use crate::error::{ModbusError, Result};
use crate::frame::{FrameCodec, MbapHeader};
use crate::pdu::{function_name, ModbusPdu};
use crate::session::ControllerConfig;

/// Open TCP channel to a Modbus server
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
    codec: FrameCodec,
    timeout: Duration,
    peer: String,
}

impl TcpChannel {
    /// Create a TCP connection
    pub async fn connect(
        host: &str,
        port: u16,
        unit_id: u8,
        timeout_duration: Duration,
    ) -> Result<Self> {
        let addr = format!("{host}:{port}");
        debug!("TCP connecting: {}", addr);

        match timeout(timeout_duration, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("TCP_NODELAY: {}", e);
                }

                info!("TCP connected: {}", addr);
                Ok(Self {
                    stream,
                    codec: FrameCodec::new(unit_id),
                    timeout: timeout_duration,
                    peer: addr,
                })
            },
            Ok(Err(e)) => {
                debug!("TCP err: {} - {}", addr, e);
                Err(ModbusError::Connection(format!(
                    "Failed to connect to {addr}: {e}"
                )))
            },
            Err(_) => {
                debug!("TCP timeout: {}", addr);
                Err(ModbusError::Timeout(format!(
                    "Connection to {addr} timed out"
                )))
            },
        }
    }

    /// Send one request PDU and read back the matching response PDU
    async fn request(&mut self, pdu: &ModbusPdu) -> Result<ModbusPdu> {
        let (sent, frame) = self.codec.encode(pdu);
        let fc = pdu.function_code().unwrap_or(0);

        debug!(
            "TX tid={} unit={} FC{:02X} ({}): {:02X?}",
            sent.transaction_id,
            sent.unit_id,
            fc,
            function_name(fc),
            frame
        );

        self.stream.write_all(&frame).await.map_err(|e| {
            error!("TCP TX: {}", e);
            ModbusError::Io(format!("TCP send error: {e}"))
        })?;

        // Frames left over from an earlier timed-out request carry an older
        // transaction id; skip them until our reply arrives or the deadline passes.
        let deadline = Instant::now() + self.timeout;
        loop {
            let mut header_bytes = [0u8; MBAP_HEADER_LEN];
            self.read_exact_until(&mut header_bytes, deadline, "header")
                .await?;
            let received = MbapHeader::parse(&header_bytes)?;

            let mut body = vec![0u8; received.pdu_len()];
            self.read_exact_until(&mut body, deadline, "PDU").await?;

            debug!(
                "RX tid={} unit={}: {:02X?}",
                received.transaction_id, received.unit_id, body
            );

            if received.transaction_id != sent.transaction_id {
                warn!(
                    "Discarding stale response tid={} from {} (awaiting tid={})",
                    received.transaction_id, self.peer, sent.transaction_id
                );
                continue;
            }

            FrameCodec::check_response(&sent, &received)?;
            return ModbusPdu::from_slice(&body)?.check_exception();
        }
    }

    async fn read_exact_until(
        &mut self,
        buf: &mut [u8],
        deadline: Instant,
        what: &str,
    ) -> Result<()> {
        match timeout_at(deadline, self.stream.read_exact(buf)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                error!("TCP {} RX: {}", what, e);
                Err(ModbusError::Io(format!("TCP {what} read error: {e}")))
            },
            Err(_) => {
                warn!("TCP {} timeout from {}", what, self.peer);
                Err(ModbusError::Timeout(format!("TCP {what} read timeout")))
            },
        }
    }
}

#[async_trait]
impl CoilChannel for TcpChannel {
    async fn write_single_coil(&mut self, address: u16, value: bool) -> Result<()> {
        let request = ModbusPdu::write_single_coil(address, value);
        let response = self.request(&request).await?;
        response.expect_echo_of(&request)
    }

    async fn read_coils(&mut self, address: u16, quantity: u16) -> Result<Vec<bool>> {
        let request = ModbusPdu::read_coils(address, quantity)?;
        let response = self.request(&request).await?;
        response.decode_read_coils(quantity)
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        debug!("TCP closed: {}", self.peer);
        Ok(())
    }
}

/// Connects over plain TCP using the controller's host, port, unit id and timeout
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Channel = TcpChannel;

    async fn connect(&self, config: &ControllerConfig) -> Result<TcpChannel> {
        TcpChannel::connect(&config.host, config.port, config.unit_id, config.timeout).await
    }
}
