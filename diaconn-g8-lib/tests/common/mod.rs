//! Common test utilities and shared imports

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use diaconn_g8_lib::codec::{defect, get_crc, prefix_decode, to_narrow_hex};
#[allow(unused_imports)]
pub use diaconn_g8_lib::constants::*;
#[allow(unused_imports)]
pub use diaconn_g8_lib::error::PumpError;
#[allow(unused_imports)]
pub use diaconn_g8_lib::packet::{MsgType, ResultCode};
#[allow(unused_imports)]
pub use diaconn_g8_lib::response::Response;
#[allow(unused_imports)]
pub use diaconn_g8_lib::state::PumpState;
#[allow(unused_imports)]
pub use num_enum::FromPrimitive;

/// Build a 20-byte response frame: header, payload at offset 4, pad, CRC.
#[allow(dead_code)]
pub fn short_frame(msg_type: u8, seq: u8, payload: &[u8]) -> Vec<u8> {
    sized_frame(MSG_LEN, SOP, msg_type, seq, MSG_CON_END, payload)
}

/// Build a 182-byte response frame.
#[allow(dead_code)]
pub fn big_frame(msg_type: u8, seq: u8, payload: &[u8]) -> Vec<u8> {
    sized_frame(MSG_LEN_BIG, SOP_BIG, msg_type, seq, MSG_CON_END, payload)
}

#[allow(dead_code)]
pub fn sized_frame(
    len: usize,
    sop: u8,
    msg_type: u8,
    seq: u8,
    con_end: u8,
    payload: &[u8],
) -> Vec<u8> {
    assert!(payload.len() <= len - BT_MSG_DATA_LOC - 1);
    let mut frame = vec![MSG_PAD; len];
    frame[0] = sop;
    frame[1] = msg_type;
    frame[2] = seq;
    frame[3] = con_end;
    frame[BT_MSG_DATA_LOC..BT_MSG_DATA_LOC + payload.len()].copy_from_slice(payload);
    let crc_loc = len - 1;
    frame[crc_loc] = get_crc(&frame, crc_loc);
    frame
}
