//! Historical log decoder.
//!
//! Each history entry is a fixed 12-byte record: a 4-byte little-endian
//! device timestamp, one discriminator byte (2-bit type, 6-bit kind), then
//! kind-specific fields at fixed offsets. Amounts arrive pre-scaled by 100
//! (hundredths of a unit) and every multi-byte field is read unsigned.
//! This path is stateless and independent of the command/response codec;
//! only the primitive byte utilities are shared.

use std::fmt;

use chrono::DateTime;
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;
use strum_macros::Display;

use crate::codec::hex_string_to_byte_array;
use crate::constants::LOG_RECORD_SIZE;
use crate::error::PumpError;
use crate::state::BasalPattern;

/// Unix time of the device counter's reference epoch, 2000-01-01T00:00:00.
/// Not verified against hardware; tests pin only the output format.
const DEVICE_EPOCH_UNIX: i64 = 946_684_800;

/// The log discriminator byte: kind in bits 0..=5, type in bits 6..=7.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeKindByte {
    pub kind: B6,
    pub log_type: B2,
}

/// Extract the 2-bit type. Total over all byte values; no error path.
pub fn get_type(b: u8) -> u8 {
    TypeKindByte::from_bytes([b]).log_type()
}

/// Extract the 6-bit kind. Total over all byte values; no error path.
pub fn get_kind(b: u8) -> u8 {
    TypeKindByte::from_bytes([b]).kind()
}

/// Format a device timestamp counter as `yyyy-MM-dd HH:mm:ss`.
pub fn get_dttm(counter: u32) -> String {
    match DateTime::from_timestamp(DEVICE_EPOCH_UNIX + i64::from(counter), 0) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}

/// Read a 4-byte little-endian counter from the front of a hex string and
/// format it.
pub fn get_dttm_from_hex(hex_str: &str) -> Result<String, PumpError> {
    let bytes = hex_string_to_byte_array(hex_str)?;
    if bytes.len() < 4 {
        return Err(PumpError::ShortLogRecord {
            expected: 4,
            actual: bytes.len(),
        });
    }
    let counter = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    Ok(get_dttm(counter))
}

/// Lenient firmware-version comparison: takes the first two digit runs of
/// the string (so `"v2.63"` and `"version 3.50"` both work), compares
/// major then minor.
pub fn is_pump_version_ge(version: &str, major: u32, minor: u32) -> bool {
    let mut runs = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().unwrap_or(0));
    let v_major = runs.next().unwrap_or(0);
    let v_minor = runs.next().unwrap_or(0);
    (v_major, v_minor) >= (major, minor)
}

/// The 6-bit record kind. Unlisted values decode as `Unknown`; the device
/// defines more kinds than we have observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum LogKind {
    InjectNormalSuccess = 0x01,
    InjectNormalFail = 0x02,
    InjectSquareStart = 0x03,
    InjectSquareSuccess = 0x04,
    InjectSquareFail = 0x05,
    InjectSquareCancel = 0x06,
    InjectDualSuccess = 0x07,
    InjectDualFail = 0x08,
    InjectDualCancel = 0x09,
    Basal1Hour = 0x0A,
    Basal1Day = 0x0B,
    Total1Day = 0x0C,
    TempBasalStart = 0x0D,
    TempBasalStop = 0x0E,
    Suspend = 0x0F,
    SuspendRelease = 0x10,
    ChangeInjectorSuccess = 0x11,
    ChangeTubeSuccess = 0x12,
    ChangeNeedleSuccess = 0x13,
    AlarmBattery = 0x14,
    AlarmInsulinShortage = 0x15,
    AlarmInjectionBlock = 0x16,
    ResetSystem = 0x17,
    TimeChange = 0x18,
    BatteryReplace = 0x19,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Why a bolus stopped short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum InjectFailReason {
    None = 0,
    UserStop = 1,
    Occlusion = 2,
    LowBattery = 3,
    InsulinShortage = 4,

    #[num_enum(catch_all)]
    Other(u8),
}

/// Kind-specific decoded fields. Amounts are in units (already divided by
/// 100), durations in minutes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LogDetail {
    InjectNormalSuccess {
        amount: f64,
        speed: u8,
    },
    InjectNormalFail {
        amount: f64,
        reason: InjectFailReason,
    },
    InjectSquareStart {
        set_amount: f64,
        minutes: u32,
    },
    InjectSquareSuccess {
        amount: f64,
        minutes: u32,
    },
    InjectSquareFail {
        amount: f64,
        minutes: u32,
        reason: InjectFailReason,
    },
    InjectSquareCancel {
        injected_amount: f64,
        minutes: u32,
    },
    InjectDualSuccess {
        normal_amount: f64,
        square_amount: f64,
        minutes: u32,
    },
    InjectDualFail {
        normal_amount: f64,
        square_amount: f64,
        reason: InjectFailReason,
    },
    InjectDualCancel {
        normal_amount: f64,
        square_amount: f64,
    },
    Basal1Hour {
        amount: f64,
    },
    Basal1Day {
        amount: f64,
    },
    Total1Day {
        bolus_amount: f64,
        basal_amount: f64,
    },
    TempBasalStart {
        tb_time: u8,
        ratio: u32,
    },
    TempBasalStop,
    Suspend {
        pattern: BasalPattern,
    },
    SuspendRelease {
        pattern: BasalPattern,
    },
    ChangeInjectorSuccess {
        prime_amount: f64,
        remain_amount: f64,
    },
    ChangeTubeSuccess {
        prime_amount: f64,
        remain_amount: f64,
    },
    ChangeNeedleSuccess {
        prime_amount: f64,
        remain_amount: f64,
    },
    AlarmBattery {
        battery_remain: u8,
    },
    AlarmInsulinShortage {
        remain: u8,
        grade: u8,
        process: u8,
    },
    AlarmInjectionBlock {
        grade: u8,
        process: u8,
        block_kind: u8,
    },
    ResetSystem {
        reason: u8,
    },
    TimeChange {
        old_dttm: u32,
    },
    BatteryReplace,
    Unknown {
        body: [u8; 7],
    },
}

/// One decoded history entry. Created by [`LogRecord::parse`], consumed
/// immediately by the history pipeline; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Raw device timestamp counter.
    pub dttm: u32,
    /// 2-bit record class from the discriminator byte.
    pub log_type: u8,
    pub kind: LogKind,
    pub detail: LogDetail,
}

fn body_u16(body: &[u8; 7], offset: usize) -> u32 {
    u32::from(u16::from_le_bytes([body[offset], body[offset + 1]]))
}

fn body_amount(body: &[u8; 7], offset: usize) -> f64 {
    f64::from(body_u16(body, offset)) / 100.0
}

impl LogRecord {
    /// Decode one record from its hex form, e.g. straight out of a big-log
    /// response dump.
    pub fn parse(hex_str: &str) -> Result<LogRecord, PumpError> {
        let bytes = hex_string_to_byte_array(hex_str)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(data: &[u8]) -> Result<LogRecord, PumpError> {
        if data.len() < LOG_RECORD_SIZE {
            return Err(PumpError::ShortLogRecord {
                expected: LOG_RECORD_SIZE,
                actual: data.len(),
            });
        }
        let dttm = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let tk = TypeKindByte::from_bytes([data[4]]);
        let kind = LogKind::from_primitive(tk.kind());
        let body: [u8; 7] = data[5..LOG_RECORD_SIZE].try_into()?;

        let detail = match kind {
            LogKind::InjectNormalSuccess => LogDetail::InjectNormalSuccess {
                amount: body_amount(&body, 0),
                speed: body[2],
            },
            LogKind::InjectNormalFail => LogDetail::InjectNormalFail {
                amount: body_amount(&body, 0),
                reason: InjectFailReason::from_primitive(body[2]),
            },
            LogKind::InjectSquareStart => LogDetail::InjectSquareStart {
                set_amount: body_amount(&body, 0),
                minutes: body_u16(&body, 2),
            },
            LogKind::InjectSquareSuccess => LogDetail::InjectSquareSuccess {
                amount: body_amount(&body, 0),
                minutes: body_u16(&body, 2),
            },
            LogKind::InjectSquareFail => LogDetail::InjectSquareFail {
                amount: body_amount(&body, 0),
                minutes: body_u16(&body, 2),
                reason: InjectFailReason::from_primitive(body[4]),
            },
            LogKind::InjectSquareCancel => LogDetail::InjectSquareCancel {
                injected_amount: body_amount(&body, 0),
                minutes: body_u16(&body, 2),
            },
            LogKind::InjectDualSuccess => LogDetail::InjectDualSuccess {
                normal_amount: body_amount(&body, 0),
                square_amount: body_amount(&body, 2),
                minutes: body_u16(&body, 4),
            },
            LogKind::InjectDualFail => LogDetail::InjectDualFail {
                normal_amount: body_amount(&body, 0),
                square_amount: body_amount(&body, 2),
                reason: InjectFailReason::from_primitive(body[4]),
            },
            LogKind::InjectDualCancel => LogDetail::InjectDualCancel {
                normal_amount: body_amount(&body, 0),
                square_amount: body_amount(&body, 2),
            },
            LogKind::Basal1Hour => LogDetail::Basal1Hour {
                amount: body_amount(&body, 0),
            },
            LogKind::Basal1Day => LogDetail::Basal1Day {
                amount: body_amount(&body, 0),
            },
            LogKind::Total1Day => LogDetail::Total1Day {
                bolus_amount: body_amount(&body, 0),
                basal_amount: body_amount(&body, 2),
            },
            LogKind::TempBasalStart => LogDetail::TempBasalStart {
                tb_time: body[0],
                ratio: body_u16(&body, 1),
            },
            LogKind::TempBasalStop => LogDetail::TempBasalStop,
            LogKind::Suspend => LogDetail::Suspend {
                pattern: BasalPattern::from_primitive(body[0]),
            },
            LogKind::SuspendRelease => LogDetail::SuspendRelease {
                pattern: BasalPattern::from_primitive(body[0]),
            },
            LogKind::ChangeInjectorSuccess => LogDetail::ChangeInjectorSuccess {
                prime_amount: body_amount(&body, 0),
                remain_amount: body_amount(&body, 2),
            },
            LogKind::ChangeTubeSuccess => LogDetail::ChangeTubeSuccess {
                prime_amount: body_amount(&body, 0),
                remain_amount: body_amount(&body, 2),
            },
            LogKind::ChangeNeedleSuccess => LogDetail::ChangeNeedleSuccess {
                prime_amount: body_amount(&body, 0),
                remain_amount: body_amount(&body, 2),
            },
            LogKind::AlarmBattery => LogDetail::AlarmBattery {
                battery_remain: body[0],
            },
            LogKind::AlarmInsulinShortage => LogDetail::AlarmInsulinShortage {
                remain: body[0],
                grade: body[1],
                process: body[2],
            },
            LogKind::AlarmInjectionBlock => LogDetail::AlarmInjectionBlock {
                grade: body[0],
                process: body[1],
                block_kind: body[2],
            },
            LogKind::ResetSystem => LogDetail::ResetSystem { reason: body[0] },
            LogKind::TimeChange => LogDetail::TimeChange {
                old_dttm: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
            },
            LogKind::BatteryReplace => LogDetail::BatteryReplace,
            LogKind::Unknown(_) => LogDetail::Unknown { body },
        };

        Ok(LogRecord {
            dttm,
            log_type: tk.log_type(),
            kind,
            detail,
        })
    }

    /// Formatted device timestamp.
    pub fn timestamp(&self) -> String {
        get_dttm(self.dttm)
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] type={} {:?}",
            self.timestamp(),
            self.kind,
            self.log_type,
            self.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TempBasalRate;

    #[test]
    fn type_and_kind_partition_every_byte() {
        for b in 0u8..=255 {
            let t = get_type(b);
            let k = get_kind(b);
            assert!(t <= 3);
            assert!(k <= 63);
            assert_eq!(t * 64 + k, b);
        }
    }

    #[test]
    fn type_kind_examples() {
        assert_eq!(get_type(0x3F), 0);
        assert_eq!(get_kind(0x3F), 63);
        assert_eq!(get_type(0xC8), 3);
        assert_eq!(get_kind(0xC8), 8);
    }

    #[test]
    fn version_compare_is_lenient() {
        assert!(is_pump_version_ge("v2.63", 2, 63));
        assert!(!is_pump_version_ge("2.62", 2, 63));
        assert!(is_pump_version_ge("3.50", 2, 63));
        assert!(is_pump_version_ge("version 3.50", 3, 0));
        assert!(!is_pump_version_ge("garbage", 1, 0));
    }

    #[test]
    fn dttm_format() {
        // Counter 0 is the reference epoch itself.
        assert_eq!(get_dttm(0), "2000-01-01 00:00:00");
        assert_eq!(get_dttm(86_400 + 3_661), "2000-01-02 01:01:01");
    }

    #[test]
    fn dttm_from_hex_reads_little_endian() {
        // 0x00000E10 = 3600 seconds past the epoch.
        assert_eq!(get_dttm_from_hex("100e0000").unwrap(), "2000-01-01 01:00:00");
        assert!(get_dttm_from_hex("1234").is_err());
    }

    #[test]
    fn parse_normal_bolus_success() {
        // ts=0x04000000, kind=0x01, amount=0x9C40 (40000 -> 400.00 U,
        // exercises the unsigned read), speed=4
        let rec = LogRecord::parse("0400000001409c04ffffff00").unwrap();
        assert_eq!(rec.dttm, 4);
        assert_eq!(rec.log_type, 0);
        assert_eq!(rec.kind, LogKind::InjectNormalSuccess);
        assert_eq!(
            rec.detail,
            LogDetail::InjectNormalSuccess {
                amount: 400.0,
                speed: 4
            }
        );
    }

    #[test]
    fn parse_temp_basal_start_percent_ratio() {
        // kind=0x0D, tb_time=6, ratio=0xC3A8 (50088 -> 88%)
        let rec = LogRecord::parse("1000000a4d06a8c3ffffff00").unwrap();
        assert_eq!(rec.kind, LogKind::TempBasalStart);
        // type bits ride above the kind
        assert_eq!(rec.log_type, 1);
        match rec.detail {
            LogDetail::TempBasalStart { tb_time, ratio } => {
                assert_eq!(tb_time, 6);
                assert_eq!(TempBasalRate::from_ratio(ratio), TempBasalRate::Percent(88));
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn parse_suspend_maps_pattern_name() {
        // kind=0x0F, pattern=2 -> Life1
        let rec = LogRecord::parse("000000000f02ffffffffff00").unwrap();
        match rec.detail {
            LogDetail::Suspend { pattern } => assert_eq!(pattern.to_string(), "Life1"),
            other => panic!("unexpected detail {other:?}"),
        }
        // Out-of-range pattern falls back to "No Pattern"
        let rec = LogRecord::parse("000000000f09ffffffffff00").unwrap();
        match rec.detail {
            LogDetail::Suspend { pattern } => assert_eq!(pattern.to_string(), "No Pattern"),
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn parse_alarm_block() {
        // kind=0x16, grade=2, process=1, block_kind=3
        let rec = LogRecord::parse("0a00000016020103ffffff00").unwrap();
        assert_eq!(
            rec.detail,
            LogDetail::AlarmInjectionBlock {
                grade: 2,
                process: 1,
                block_kind: 3
            }
        );
    }

    #[test]
    fn unrecognized_kind_is_not_an_error() {
        // kind=0x3F is unassigned; record decodes as Unknown with raw body.
        let rec = LogRecord::parse("000000003f0102030405060700").unwrap();
        assert!(matches!(rec.kind, LogKind::Unknown(0x3F)));
        assert_eq!(
            rec.detail,
            LogDetail::Unknown {
                body: [1, 2, 3, 4, 5, 6, 7]
            }
        );
    }

    #[test]
    fn short_record_is_rejected() {
        let err = LogRecord::parse("00010203").unwrap_err();
        assert!(matches!(err, PumpError::ShortLogRecord { .. }));
    }

    #[test]
    fn record_serializes_to_json() {
        let rec = LogRecord::parse("0400000001409c04ffffff00").unwrap();
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["kind"], "InjectNormalSuccess");
        assert_eq!(v["detail"]["InjectNormalSuccess"]["amount"], 400.0);
        assert_eq!(v["detail"]["InjectNormalSuccess"]["speed"], 4);
    }

    #[test]
    fn record_display_carries_timestamp_and_kind() {
        let rec = LogRecord::parse("0400000001409c04ffffff00").unwrap();
        let s = rec.to_string();
        assert!(s.contains("2000-01-01 00:00:04"));
        assert!(s.contains("InjectNormalSuccess"));
    }
}
