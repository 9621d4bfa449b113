//! Modbus PDU for the coil function codes
//!
//! Only FC01 (Read Coils) and FC05 (Write Single Coil) are built here; anything else
//! the controller sends back is treated as a protocol error.

use tracing::trace;

use crate::constants::{
    COIL_OFF, COIL_ON, EXCEPTION_FLAG, FC_READ_COILS, FC_WRITE_SINGLE_COIL, MAX_PDU_SIZE,
    MODBUS_MAX_READ_COILS,
};
use crate::error::{ModbusError, Result};

/// PDU with a stack-allocated fixed buffer
#[derive(Debug, Clone)]
pub struct ModbusPdu {
    data: [u8; MAX_PDU_SIZE],
    len: usize,
}

impl ModbusPdu {
    /// Create an empty PDU
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PDU_SIZE],
            len: 0,
        }
    }

    /// Create a PDU from a byte slice
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_PDU_SIZE {
            return Err(ModbusError::Protocol(format!(
                "PDU too large: {} bytes (max {})",
                data.len(),
                MAX_PDU_SIZE
            )));
        }

        let mut pdu = Self::new();
        pdu.data[..data.len()].copy_from_slice(data);
        pdu.len = data.len();
        Ok(pdu)
    }

    /// FC05 request: `[0x05, addr_hi, addr_lo, 0xFF|0x00, 0x00]`
    pub fn write_single_coil(address: u16, value: bool) -> Self {
        let mut pdu = Self::new();
        pdu.push(FC_WRITE_SINGLE_COIL);
        pdu.push_u16(address);
        pdu.push_u16(if value { COIL_ON } else { COIL_OFF });
        trace!("PDU built: FC05 addr={} value={}", address, value);
        pdu
    }

    /// FC01 request: `[0x01, addr_hi, addr_lo, qty_hi, qty_lo]`
    pub fn read_coils(address: u16, quantity: u16) -> Result<Self> {
        if quantity == 0 || quantity > MODBUS_MAX_READ_COILS {
            return Err(ModbusError::Protocol(format!(
                "Invalid coil count for FC01: {} (1..={})",
                quantity, MODBUS_MAX_READ_COILS
            )));
        }

        let mut pdu = Self::new();
        pdu.push(FC_READ_COILS);
        pdu.push_u16(address);
        pdu.push_u16(quantity);
        trace!("PDU built: FC01 addr={} qty={}", address, quantity);
        Ok(pdu)
    }

    // Callers never exceed 5 bytes; the buffer is MAX_PDU_SIZE.
    #[inline]
    fn push(&mut self, byte: u8) {
        self.data[self.len] = byte;
        self.len += 1;
    }

    #[inline]
    fn push_u16(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.push(hi);
        self.push(lo);
    }

    /// Get immutable data slice
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Get current length
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get function code (first byte)
    #[inline]
    pub fn function_code(&self) -> Option<u8> {
        self.as_slice().first().copied()
    }

    /// Check if exception response
    #[inline]
    pub fn is_exception(&self) -> bool {
        self.function_code()
            .map(|fc| fc & EXCEPTION_FLAG != 0)
            .unwrap_or(false)
    }

    /// Get exception code
    #[inline]
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() {
            self.as_slice().get(1).copied()
        } else {
            None
        }
    }

    /// Turn an exception response into an error, pass anything else through
    pub fn check_exception(self) -> Result<Self> {
        match (self.function_code(), self.exception_code()) {
            (Some(fc), Some(code)) if self.is_exception() => Err(ModbusError::Exception {
                function: fc & !EXCEPTION_FLAG,
                code,
                description: exception_description(code),
            }),
            (Some(_), None) if self.is_exception() => Err(ModbusError::Protocol(
                "Exception response without exception code".to_string(),
            )),
            _ => Ok(self),
        }
    }

    /// FC05 responses echo the request verbatim
    pub fn expect_echo_of(&self, request: &ModbusPdu) -> Result<()> {
        if self.as_slice() == request.as_slice() {
            Ok(())
        } else {
            Err(ModbusError::Protocol(format!(
                "FC05 response does not echo request: sent {:02X?}, got {:02X?}",
                request.as_slice(),
                self.as_slice()
            )))
        }
    }

    /// Decode an FC01 response `[0x01, byte_count, bits...]` into `quantity` coil states
    pub fn decode_read_coils(&self, quantity: u16) -> Result<Vec<bool>> {
        let data = self.as_slice();
        if data.first() != Some(&FC_READ_COILS) {
            return Err(ModbusError::Protocol(format!(
                "Expected FC01 response, got {:02X?}",
                data.first()
            )));
        }

        let expected_bytes = (quantity as usize).div_ceil(8);
        let byte_count = data.get(1).copied().unwrap_or(0) as usize;
        if byte_count != expected_bytes || data.len() != 2 + byte_count {
            return Err(ModbusError::Protocol(format!(
                "FC01 byte count mismatch: expected {}, header {}, payload {}",
                expected_bytes,
                byte_count,
                data.len().saturating_sub(2)
            )));
        }

        let bits = &data[2..];
        Ok((0..quantity as usize)
            .map(|i| bits[i / 8] & (1 << (i % 8)) != 0)
            .collect())
    }
}

impl Default for ModbusPdu {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-readable name for a function code (exception bit ignored)
pub fn function_name(fc: u8) -> &'static str {
    match fc & !EXCEPTION_FLAG {
        FC_READ_COILS => "Read Coils",
        FC_WRITE_SINGLE_COIL => "Write Single Coil",
        _ => "Unsupported Function",
    }
}

/// Get exception description
pub fn exception_description(exception_code: u8) -> &'static str {
    match exception_code {
        0x01 => "Illegal Function",
        0x02 => "Illegal Data Address",
        0x03 => "Illegal Data Value",
        0x04 => "Slave Device Failure",
        0x05 => "Acknowledge",
        0x06 => "Slave Device Busy",
        0x08 => "Memory Parity Error",
        0x0A => "Gateway Path Unavailable",
        0x0B => "Gateway Target Device Failed to Respond",
        _ => "Unknown Exception",
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    // ---------- FC05 single-coil write ----------

    #[test]
    fn test_write_single_coil_on() {
        let pdu = ModbusPdu::write_single_coil(0x0100, true);

        // FC05 format: [FC, Address_Hi, Address_Lo, Value_Hi, Value_Lo]
        assert_eq!(pdu.as_slice(), &[0x05, 0x01, 0x00, 0xFF, 0x00]);
        assert_eq!(pdu.function_code(), Some(0x05));
    }

    #[test]
    fn test_write_single_coil_off() {
        let pdu = ModbusPdu::write_single_coil(9, false);
        assert_eq!(pdu.as_slice(), &[0x05, 0x00, 0x09, 0x00, 0x00]);
    }

    #[test]
    fn test_echo_accepts_identical_response() {
        let request = ModbusPdu::write_single_coil(5, true);
        let response = ModbusPdu::from_slice(&[0x05, 0x00, 0x05, 0xFF, 0x00]).unwrap();
        assert!(response.expect_echo_of(&request).is_ok());
    }

    #[test]
    fn test_echo_rejects_different_value() {
        let request = ModbusPdu::write_single_coil(5, true);
        let response = ModbusPdu::from_slice(&[0x05, 0x00, 0x05, 0x00, 0x00]).unwrap();
        assert!(matches!(
            response.expect_echo_of(&request),
            Err(ModbusError::Protocol(_))
        ));
    }

    // ---------- Exceptions ----------

    #[test]
    fn test_exception_response_maps_to_error() {
        let response = ModbusPdu::from_slice(&[0x85, 0x02]).unwrap();
        assert!(response.is_exception());
        assert_eq!(response.exception_code(), Some(0x02));

        match response.check_exception() {
            Err(ModbusError::Exception {
                function,
                code,
                description,
            }) => {
                assert_eq!(function, 0x05);
                assert_eq!(code, 0x02);
                assert_eq!(description, "Illegal Data Address");
            },
            other => panic!("Expected exception error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_exception_is_protocol_error() {
        let response = ModbusPdu::from_slice(&[0x85]).unwrap();
        assert!(matches!(
            response.check_exception(),
            Err(ModbusError::Protocol(_))
        ));
    }

    #[test]
    fn test_normal_response_passes_exception_check() {
        let response = ModbusPdu::from_slice(&[0x05, 0x00, 0x01, 0xFF, 0x00]).unwrap();
        assert!(response.check_exception().is_ok());
    }

    // ---------- FC01 read coils ----------

    #[test]
    fn test_read_coils_request() {
        let pdu = ModbusPdu::read_coils(0x0013, 10).unwrap();
        assert_eq!(pdu.as_slice(), &[0x01, 0x00, 0x13, 0x00, 0x0A]);
    }

    #[test]
    fn test_read_coils_rejects_zero_and_oversized() {
        assert!(ModbusPdu::read_coils(0, 0).is_err());
        assert!(ModbusPdu::read_coils(0, MODBUS_MAX_READ_COILS + 1).is_err());
    }

    #[test]
    fn test_decode_read_coils_lsb_first() {
        // 10 coils: 0b1100_1101, 0b0000_0001
        let response = ModbusPdu::from_slice(&[0x01, 0x02, 0xCD, 0x01]).unwrap();
        let coils = response.decode_read_coils(10).unwrap();
        assert_eq!(
            coils,
            vec![true, false, true, true, false, false, true, true, true, false]
        );
    }

    #[test]
    fn test_decode_read_coils_byte_count_mismatch() {
        let response = ModbusPdu::from_slice(&[0x01, 0x01, 0xCD]).unwrap();
        assert!(response.decode_read_coils(10).is_err());
    }

    #[test]
    fn test_from_slice_too_large() {
        let data = vec![0u8; MAX_PDU_SIZE + 1];
        assert!(ModbusPdu::from_slice(&data).is_err());
    }

    #[test]
    fn test_function_name_ignores_exception_bit() {
        assert_eq!(function_name(0x05), "Write Single Coil");
        assert_eq!(function_name(0x85), "Write Single Coil");
        assert_eq!(function_name(0x03), "Unsupported Function");
    }
}
