//! Frame validation and little-endian field readers shared by every
//! response decoder.

use bytes::{Buf, Bytes};

use crate::constants::*;

/// Compute the frame checksum over `data[0..len)`.
///
/// Callers pass `len = total - 1` so the checksum covers everything except
/// its own storage slot. 16-bit byte sum folded to one byte.
pub fn get_crc(data: &[u8], len: usize) -> u8 {
    let mut sum: u16 = 0;
    for &b in &data[..len] {
        sum = sum.wrapping_add(u16::from(b));
    }
    ((sum >> 8) as u8) ^ (sum as u8)
}

/// Validate a received frame. Returns one of the `DEFECT_*` codes.
///
/// Check order is fixed: length before SOP, SOP before CRC. A buffer with a
/// correct SOP but wrong length reports `DEFECT_LENGTH`, not `DEFECT_SOP`.
pub fn defect(data: &[u8]) -> u8 {
    let expected_sop = match data.len() {
        MSG_LEN => SOP,
        MSG_LEN_BIG => SOP_BIG,
        _ => return DEFECT_LENGTH,
    };
    if data[0] != expected_sop {
        return DEFECT_SOP;
    }
    let crc_loc = data.len() - 1;
    if data[crc_loc] != get_crc(data, crc_loc) {
        return DEFECT_CRC;
    }
    DEFECT_NONE
}

/// Human-readable name for a `DEFECT_*` code, for diagnostics only.
pub fn defect_reason(code: u8) -> &'static str {
    match code {
        DEFECT_NONE => "ok",
        DEFECT_LENGTH => "length not 20 or 182",
        DEFECT_SOP => "SOP does not match frame length",
        DEFECT_CRC => "CRC mismatch",
        _ => "unknown defect",
    }
}

/// Return a read cursor positioned at the first payload byte (offset 4).
///
/// Only call on frames that already passed [`defect`]; the cursor utilities
/// below assume in-bounds reads.
pub fn prefix_decode(data: &[u8]) -> Bytes {
    let mut buf = Bytes::copy_from_slice(data);
    buf.advance(BT_MSG_DATA_LOC);
    buf
}

/// Read one byte as an unsigned integer, advancing the cursor.
pub fn get_byte_to_int(buf: &mut Bytes) -> u32 {
    u32::from(buf.get_u8())
}

/// Read two bytes as an unsigned little-endian integer, advancing the cursor.
///
/// Unsigned widening is mandatory: pump fields routinely exceed 32767.
pub fn get_short_to_int(buf: &mut Bytes) -> u32 {
    u32::from(buf.get_u16_le())
}

/// Read four bytes as an unsigned little-endian integer, advancing the cursor.
pub fn get_int_to_int(buf: &mut Bytes) -> u32 {
    buf.get_u32_le()
}

/// Space-separated uppercase hex, for log output.
pub fn to_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Concatenated lowercase hex.
pub fn to_narrow_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string to bytes. Case-insensitive; empty input yields an
/// empty array.
pub fn hex_string_to_byte_array(s: &str) -> Result<Vec<u8>, crate::error::PumpError> {
    Ok(hex::decode(s)?)
}
