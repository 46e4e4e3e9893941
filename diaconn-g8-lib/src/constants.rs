// Protocol constants for the Diaconn G8 serial link

/// Total length of a short frame (bytes)
pub const MSG_LEN: usize = 20;

/// Total length of a big frame (bytes)
pub const MSG_LEN_BIG: usize = 182;

/// Start-of-packet marker for short frames
pub const SOP: u8 = 0xEF;

/// Start-of-packet marker for big frames
pub const SOP_BIG: u8 = 0xED;

/// Offset of the first payload byte in either frame size
pub const BT_MSG_DATA_LOC: usize = 4;

/// Continuation flag: last frame of a logical sequence
pub const MSG_CON_END: u8 = 0x00;

/// Continuation flag: more frames follow
pub const MSG_CON_CONTINUE: u8 = 0x01;

/// Padding byte for unused payload space
pub const MSG_PAD: u8 = 0xFF;

/// defect(): frame is valid
pub const DEFECT_NONE: u8 = 0;

/// defect(): total length is neither 20 nor 182
pub const DEFECT_LENGTH: u8 = 97;

/// defect(): SOP byte does not match the length-implied marker
pub const DEFECT_SOP: u8 = 98;

/// defect(): stored CRC does not match the computed one
pub const DEFECT_CRC: u8 = 99;

/// Result-code success sentinel for inquire responses
pub const RESULT_INQUIRE_OK: u8 = 16;

/// Result-code success sentinel for setting and confirm responses
pub const RESULT_SETTING_OK: u8 = 0;

/// Payload capacity of a short frame (offsets 4..19)
pub const SHORT_PAYLOAD_LEN: usize = MSG_LEN - BT_MSG_DATA_LOC - 1;

/// Payload capacity of a big frame (offsets 4..181)
pub const BIG_PAYLOAD_LEN: usize = MSG_LEN_BIG - BT_MSG_DATA_LOC - 1;

/// Fixed width of one history log record (bytes)
pub const LOG_RECORD_SIZE: usize = 12;

/// Temp-basal ratio values at or above this encode percent-of-profile
pub const TB_RATIO_PERCENT_BASE: u32 = 50000;
