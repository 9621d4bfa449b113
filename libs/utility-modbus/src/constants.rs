//! Modbus TCP protocol constants

/// MBAP header length: TID(2) + Proto(2) + Len(2) + Unit(1)
pub const MBAP_HEADER_LEN: usize = 7;

/// Largest MBAP length field: 1 (unit id) + 253 (PDU)
pub const MAX_MBAP_LENGTH: usize = 254;

/// Maximum PDU size
pub const MAX_PDU_SIZE: usize = 253;

/// FC01 quantity limit
pub const MODBUS_MAX_READ_COILS: u16 = 2000;

/// Read Coils
pub const FC_READ_COILS: u8 = 0x01;

/// Write Single Coil
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Exception responses set the high bit of the function code
pub const EXCEPTION_FLAG: u8 = 0x80;

/// FC05 payload for ON
pub const COIL_ON: u16 = 0xFF00;

/// FC05 payload for OFF
pub const COIL_OFF: u16 = 0x0000;
