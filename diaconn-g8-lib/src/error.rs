use std::array::TryFromSliceError;
use thiserror::Error;

/// The primary error type for the `diaconn-g8-lib` library.
///
/// Framing defects and device-reported result codes are the only two error
/// kinds this core produces; both are terminal for the single packet and
/// carry the numeric code unchanged for the caller to translate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PumpError {
    #[error("framing defect {code}: {reason}")]
    Framing { code: u8, reason: &'static str },

    #[error("device rejected command, result code {code}")]
    Rejected { code: u8 },

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("unexpected message type 0x{0:02X}")]
    UnexpectedMsgType(u8),

    #[error("invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("log record too short: expected at least {expected} bytes, got {actual}")]
    ShortLogRecord { expected: usize, actual: usize },

    #[error("command field out of range: {0}")]
    FieldOutOfRange(String),
}

impl From<TryFromSliceError> for PumpError {
    fn from(_: TryFromSliceError) -> Self {
        PumpError::InvalidPacket("Failed to convert slice to array".to_string())
    }
}
