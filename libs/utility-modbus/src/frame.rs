//! Modbus TCP framing (MBAP header)
//!
//! Frame layout: `[Transaction ID(2)][Protocol ID(2)][Length(2)][Unit ID(1)][PDU(N)]`

use crate::constants::{MAX_MBAP_LENGTH, MBAP_HEADER_LEN};
use crate::error::{ModbusError, Result};
use crate::pdu::ModbusPdu;

/// Modbus TCP MBAP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Transaction identifier
    pub transaction_id: u16,
    /// Protocol identifier (fixed to 0)
    pub protocol_id: u16,
    /// Length field: unit id + PDU bytes
    pub length: u16,
    /// Unit identifier (slave ID)
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn to_bytes(&self) -> [u8; MBAP_HEADER_LEN] {
        let [t0, t1] = self.transaction_id.to_be_bytes();
        let [p0, p1] = self.protocol_id.to_be_bytes();
        let [l0, l1] = self.length.to_be_bytes();
        [t0, t1, p0, p1, l0, l1, self.unit_id]
    }

    /// Parse and validate a received header
    pub fn parse(bytes: &[u8; MBAP_HEADER_LEN]) -> Result<Self> {
        let header = Self {
            transaction_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            protocol_id: u16::from_be_bytes([bytes[2], bytes[3]]),
            length: u16::from_be_bytes([bytes[4], bytes[5]]),
            unit_id: bytes[6],
        };

        if header.protocol_id != 0 {
            return Err(ModbusError::Protocol(format!(
                "Invalid protocol id: {}",
                header.protocol_id
            )));
        }

        // Length covers the unit id, so it can never be below 2 for a valid PDU
        let length = header.length as usize;
        if length < 2 || length > MAX_MBAP_LENGTH {
            return Err(ModbusError::Protocol(format!(
                "Invalid TCP frame length: {}",
                length
            )));
        }

        Ok(header)
    }

    /// Number of PDU bytes that follow the header
    pub fn pdu_len(&self) -> usize {
        self.length as usize - 1
    }
}

/// Builds request frames and checks response headers for one TCP channel
#[derive(Debug)]
pub struct FrameCodec {
    unit_id: u8,
    next_transaction_id: u16,
}

impl FrameCodec {
    pub fn new(unit_id: u8) -> Self {
        Self {
            unit_id,
            next_transaction_id: 1,
        }
    }

    /// Get next transaction ID, wrapping from 0xFFFF to 0x0000
    fn next_transaction_id(&mut self) -> u16 {
        let id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);
        id
    }

    /// Build a complete frame; returns the header sent alongside the bytes
    pub fn encode(&mut self, pdu: &ModbusPdu) -> (MbapHeader, Vec<u8>) {
        let header = MbapHeader {
            transaction_id: self.next_transaction_id(),
            protocol_id: 0,
            length: (pdu.len() + 1) as u16,
            unit_id: self.unit_id,
        };

        let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + pdu.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(pdu.as_slice());
        (header, frame)
    }

    /// Response must answer the request that was just sent
    pub fn check_response(request: &MbapHeader, response: &MbapHeader) -> Result<()> {
        if response.transaction_id != request.transaction_id {
            return Err(ModbusError::Protocol(format!(
                "Transaction id mismatch: sent {}, got {}",
                request.transaction_id, response.transaction_id
            )));
        }
        if response.unit_id != request.unit_id {
            return Err(ModbusError::Protocol(format!(
                "Unit id mismatch: sent {}, got {}",
                request.unit_id, response.unit_id
            )));
        }
        Ok(())
    }
}
