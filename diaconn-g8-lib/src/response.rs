//! Response and report packets received from the pump.
//!
//! A single dispatch on `(frame size, msg_type)` replaces per-type
//! polymorphism. `Response::handle` is the only entry point: it gates on
//! `defect()` before reading any field, checks the family's success
//! sentinel, then decodes and applies the packet's writes to `PumpState`.
//! A framing defect leaves the state untouched; a device rejection copies
//! the result code into `state.result_error_code` and decodes nothing.

use bytes::Bytes;
use num_enum::FromPrimitive;
use serde::Serialize;
use tracing::{debug, warn};
use zerocopy::FromBytes;

use crate::biginfo::{ApsMainInfo, ApsMainInfoRaw, MainInfo, MainInfoRaw};
use crate::codec::{
    defect, defect_reason, get_byte_to_int, get_int_to_int, get_short_to_int, prefix_decode,
    to_narrow_hex,
};
use crate::constants::*;
use crate::error::PumpError;
use crate::logs::LogRecord;
use crate::packet::{MsgType, ResultCode};
use crate::state::{BasalPattern, BolusProgress, PumpState};

/// Pump wall-clock time from `TimeInquireResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PumpTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Identity block from `SerialNumInquireResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SerialInfo {
    pub country: u8,
    pub product_type: u8,
    pub make_year: u16,
    pub make_month: u8,
    pub make_day: u8,
    pub lot_no: u32,
    pub serial_no: u32,
    pub major_version: u8,
    pub minor_version: u8,
}

/// Temp-basal status from `TempBasalInquireResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TempBasalStatus {
    /// 0 = none, 1 = running.
    pub tb_status: u8,
    /// Duration in 15-minute slots.
    pub tb_time: u8,
    pub tb_inject_rate_ratio: u32,
    pub tb_elapsed_minutes: u32,
}

/// A history record paired with its device-side sequence number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberedLogRecord {
    pub log_no: u16,
    pub record: LogRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Response {
    TimeInquire(PumpTime),
    SerialNumInquire(SerialInfo),
    BasalLimitInquire {
        /// Hundredths of a U/h, before the firmware multiplier.
        max_basal_per_hours: u32,
    },
    SnackLimitInquire {
        /// Units.
        max_bolus_per_day: f64,
    },
    BigMainInfo(MainInfo),
    BigApsMainInfo(ApsMainInfo),
    BigLog {
        records: Vec<NumberedLogRecord>,
    },
    LogStatus {
        start_no: u16,
        end_no: u16,
        wrap_count: u8,
    },
    TempBasal(TempBasalStatus),
    BolusSpeed {
        speed: u8,
    },
    /// Plain acknowledgment of a setting, correlated to its request type.
    SettingAck {
        request: MsgType,
    },
    /// OTP-gated settings answer with the number the confirm/cancel
    /// follow-up must echo.
    OtpIssued {
        request: MsgType,
        otp: u32,
    },
    InjectionProgress {
        set_amount: f64,
        injected_amount: f64,
        speed: u8,
    },
    BatteryWarning {
        battery_remain: u8,
    },
    InsulinLack {
        grade: u8,
        process: u8,
        remain: u8,
    },
    InjectionBlock {
        grade: u8,
        process: u8,
        block_kind: u8,
    },
}

impl Response {
    /// Validate, decode and apply one received frame.
    ///
    /// `now_ms` stamps `last_connection` on success; it never influences
    /// field decoding.
    pub fn handle(
        data: &[u8],
        state: &mut PumpState,
        now_ms: i64,
    ) -> Result<Response, PumpError> {
        let code = defect(data);
        if code != DEFECT_NONE {
            warn!(code, frame = %to_narrow_hex(data), "frame rejected");
            return Err(PumpError::Framing {
                code,
                reason: defect_reason(code),
            });
        }

        let msg_type = MsgType::from_primitive(data[1]);
        if msg_type.is_big() != (data.len() == MSG_LEN_BIG) {
            return Err(PumpError::InvalidPacket(format!(
                "{msg_type} in a {}-byte frame",
                data.len()
            )));
        }

        let mut buf = prefix_decode(data);

        if !msg_type.is_report() {
            let sentinel = if msg_type.is_inquire_response() {
                RESULT_INQUIRE_OK
            } else if msg_type.is_setting_response() {
                RESULT_SETTING_OK
            } else {
                return Err(PumpError::UnexpectedMsgType(data[1]));
            };
            let raw_code = get_byte_to_int(&mut buf) as u8;
            if raw_code != sentinel {
                let result = ResultCode::from_primitive(raw_code);
                state.result_error_code = result;
                debug!(%msg_type, code = raw_code, "device rejected command");
                return Err(PumpError::Rejected { code: raw_code });
            }
        }

        let response = Self::decode(msg_type, data, &mut buf, state, now_ms)?;
        state.last_connection_ms = now_ms;
        Ok(response)
    }

    fn decode(
        msg_type: MsgType,
        data: &[u8],
        buf: &mut Bytes,
        state: &mut PumpState,
        now_ms: i64,
    ) -> Result<Response, PumpError> {
        let response = match msg_type {
            MsgType::TimeInquireResponse => Response::TimeInquire(PumpTime {
                year: 2000 + get_byte_to_int(buf) as u16,
                month: get_byte_to_int(buf) as u8,
                day: get_byte_to_int(buf) as u8,
                hour: get_byte_to_int(buf) as u8,
                minute: get_byte_to_int(buf) as u8,
                second: get_byte_to_int(buf) as u8,
            }),

            MsgType::SerialNumInquireResponse => {
                let info = SerialInfo {
                    country: get_byte_to_int(buf) as u8,
                    product_type: get_byte_to_int(buf) as u8,
                    make_year: 2000 + get_byte_to_int(buf) as u16,
                    make_month: get_byte_to_int(buf) as u8,
                    make_day: get_byte_to_int(buf) as u8,
                    lot_no: get_short_to_int(buf),
                    serial_no: get_int_to_int(buf),
                    major_version: get_byte_to_int(buf) as u8,
                    minor_version: get_byte_to_int(buf) as u8,
                };
                state.country = info.country;
                state.product_type = info.product_type;
                state.make_year = info.make_year;
                state.make_month = info.make_month;
                state.make_day = info.make_day;
                state.lot_no = info.lot_no;
                state.serial_no = info.serial_no;
                state.set_firmware_version(info.major_version, info.minor_version);
                Response::SerialNumInquire(info)
            }

            MsgType::BasalLimitInquireResponse => {
                let max_basal_per_hours = get_short_to_int(buf);
                state.apply_max_basal_per_hours(max_basal_per_hours);
                Response::BasalLimitInquire {
                    max_basal_per_hours,
                }
            }

            MsgType::SnackLimitInquireResponse => {
                let max_bolus_per_day = f64::from(get_short_to_int(buf)) / 100.0;
                state.max_bolus_per_day = max_bolus_per_day;
                Response::SnackLimitInquire { max_bolus_per_day }
            }

            MsgType::BigMainInfoInquireResponse => {
                let raw = MainInfoRaw::ref_from_bytes(&data[BT_MSG_DATA_LOC..MSG_LEN_BIG - 1])
                    .map_err(|_| {
                        PumpError::InvalidPacket("main info payload size mismatch".to_string())
                    })?;
                let info = MainInfo::from(raw);
                state.country = info.country;
                state.product_type = info.product_type;
                state.make_year = info.make_year;
                state.make_month = info.make_month;
                state.make_day = info.make_day;
                state.lot_no = info.lot_no;
                state.serial_no = info.serial_no;
                state.set_firmware_version(info.major_version, info.minor_version);
                state.battery_remain = info.battery_remain;
                state.insulin_remain = info.insulin_remain;
                state.bolus_speed = info.bolus_speed;
                state.selected_pattern = info.selected_pattern;
                state.apply_max_basal_per_hours((info.max_basal_per_hours * 100.0).round() as u32);
                state.max_bolus_per_day = info.max_bolus_per_day;
                state.tb_status = info.tb_status;
                state.tb_time = info.tb_time;
                state.tb_inject_rate_ratio = info.tb_inject_rate_ratio;
                state.tb_elapsed_minutes = info.tb_elapsed_minutes;
                state.last_settings_read_ms = now_ms;
                Response::BigMainInfo(info)
            }

            MsgType::BigApsMainInfoInquireResponse => {
                let raw = ApsMainInfoRaw::ref_from_bytes(&data[BT_MSG_DATA_LOC..MSG_LEN_BIG - 1])
                    .map_err(|_| {
                        PumpError::InvalidPacket("APS main info payload size mismatch".to_string())
                    })?;
                let info = ApsMainInfo::from(raw);
                state.selected_pattern = info.selected_pattern;
                state.current_basal_rate = info.current_basal_rate;
                state.tb_status = info.tb_status;
                state.tb_time = info.tb_time;
                state.tb_inject_rate_ratio = info.tb_inject_rate_ratio;
                state.battery_remain = info.battery_remain;
                state.insulin_remain = info.insulin_remain;
                Response::BigApsMainInfo(info)
            }

            MsgType::BigLogInquireResponse => {
                let count = get_byte_to_int(buf) as usize;
                let per_entry = 2 + LOG_RECORD_SIZE;
                if count * per_entry > buf.len() {
                    return Err(PumpError::InvalidPacket(format!(
                        "log count {count} exceeds payload"
                    )));
                }
                let mut records = Vec::with_capacity(count);
                for _ in 0..count {
                    let log_no = get_short_to_int(buf) as u16;
                    let raw = buf.split_to(LOG_RECORD_SIZE);
                    records.push(NumberedLogRecord {
                        log_no,
                        record: LogRecord::from_bytes(&raw)?,
                    });
                }
                Response::BigLog { records }
            }

            MsgType::LogStatusInquireResponse => Response::LogStatus {
                start_no: get_short_to_int(buf) as u16,
                end_no: get_short_to_int(buf) as u16,
                wrap_count: get_byte_to_int(buf) as u8,
            },

            MsgType::TempBasalInquireResponse => {
                let status = TempBasalStatus {
                    tb_status: get_byte_to_int(buf) as u8,
                    tb_time: get_byte_to_int(buf) as u8,
                    tb_inject_rate_ratio: get_short_to_int(buf),
                    tb_elapsed_minutes: get_short_to_int(buf),
                };
                state.tb_status = status.tb_status;
                state.tb_time = status.tb_time;
                state.tb_inject_rate_ratio = status.tb_inject_rate_ratio;
                state.tb_elapsed_minutes = status.tb_elapsed_minutes;
                Response::TempBasal(status)
            }

            MsgType::BolusSpeedInquireResponse => {
                let speed = get_byte_to_int(buf) as u8;
                state.bolus_speed = speed;
                Response::BolusSpeed { speed }
            }

            // OTP-gated dosing settings answer with the one-time number.
            MsgType::TempBasalSettingResponse | MsgType::BolusSpeedSettingResponse => {
                let otp = get_int_to_int(buf);
                state.otp_number = otp;
                Response::OtpIssued {
                    request: request_of(msg_type),
                    otp,
                }
            }

            MsgType::TimeSettingResponse
            | MsgType::InjectionSnackSettingResponse
            | MsgType::InjectionExtendedBolusSettingResponse
            | MsgType::InjectionBasalSettingResponse
            | MsgType::BasalSettingResponse
            | MsgType::InjectionCancelSettingResponse
            | MsgType::BasalPauseSettingResponse
            | MsgType::AppConfirmSettingResponse
            | MsgType::AppCancelSettingResponse => Response::SettingAck {
                request: request_of(msg_type),
            },

            MsgType::InjectionProgressReport => {
                let set_amount = f64::from(get_short_to_int(buf)) / 100.0;
                let injected_amount = f64::from(get_short_to_int(buf)) / 100.0;
                let speed = get_byte_to_int(buf) as u8;
                state.bolus_progress = BolusProgress {
                    set_amount,
                    injected_amount,
                    speed,
                };
                Response::InjectionProgress {
                    set_amount,
                    injected_amount,
                    speed,
                }
            }

            MsgType::BatteryWarningReport => {
                let battery_remain = get_byte_to_int(buf) as u8;
                state.battery_remain = battery_remain;
                Response::BatteryWarning { battery_remain }
            }

            MsgType::InsulinLackReport => {
                let grade = get_byte_to_int(buf) as u8;
                let process = get_byte_to_int(buf) as u8;
                let remain = get_byte_to_int(buf) as u8;
                state.shortage_grade = grade;
                state.shortage_process = process;
                state.shortage_remain = remain;
                Response::InsulinLack {
                    grade,
                    process,
                    remain,
                }
            }

            MsgType::InjectionBlockReport => {
                let grade = get_byte_to_int(buf) as u8;
                let process = get_byte_to_int(buf) as u8;
                let block_kind = get_byte_to_int(buf) as u8;
                state.block_grade = grade;
                state.block_process = process;
                state.block_kind = block_kind;
                Response::InjectionBlock {
                    grade,
                    process,
                    block_kind,
                }
            }

            other => return Err(PumpError::UnexpectedMsgType(u8::from(other))),
        };
        Ok(response)
    }
}

/// Map a response type back to the request it answers (`raw - 0x80`).
fn request_of(response: MsgType) -> MsgType {
    MsgType::from_primitive(u8::from(response).wrapping_sub(0x80))
}

/// Pattern code helper for callers rendering the selected slot.
pub fn pattern_of(code: u8) -> BasalPattern {
    BasalPattern::from_primitive(code)
}
