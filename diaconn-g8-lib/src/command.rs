//! Command packets sent to the pump.
//!
//! One closed enum instead of a class per wire type: every member knows its
//! `MsgType` and how to pack its fields at offset 4+ in little-endian
//! order. `encode` always produces a frame that passes `defect()`.

use crate::constants::*;
use crate::error::PumpError;
use crate::packet::{FrameBuilder, MsgType};
use crate::state::TempBasalRate;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Inquiries (empty payload unless noted)
    TimeInquire,
    SerialNumInquire,
    BasalLimitInquire,
    SnackLimitInquire,
    BigMainInfoInquire,
    BigApsMainInfoInquire,
    /// Request history records `start_no..=end_no`.
    BigLogInquire { start_no: u16, end_no: u16 },
    LogStatusInquire,
    TempBasalInquire,
    BolusSpeedInquire,

    // Settings
    TimeSetting {
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    },
    /// Start a temp basal; duration in 15-minute slots. OTP-gated.
    TempBasalStart { tb_time: u8, rate: TempBasalRate },
    /// Stop the running temp basal. OTP-gated.
    TempBasalStop,
    /// Normal (snack) bolus, units.
    InjectionSnack { amount: f64 },
    /// Extended (square) bolus: total units over `minutes`.
    InjectionExtendedBolus { minutes: u16, amount: f64 },
    /// Select the active basal pattern slot (1..=6).
    InjectionBasal { pattern: u8 },
    /// One group of a 24-hour profile upload: pattern slot 1..=6, group
    /// 1..=4, six hourly U/h rates. Groups 1-3 carry the CONTINUE flag,
    /// group 4 carries END, regardless of pattern. The device applies
    /// groups incrementally with no partial-commit acknowledgment, so any
    /// failure means re-sending all four groups from group 1.
    BasalSetting {
        pattern: u8,
        group: u8,
        rates: [f64; 6],
    },
    /// Cancel the in-progress bolus.
    InjectionCancel,
    /// Suspend or release basal delivery.
    BasalPause { suspend: bool },
    /// Bolus injection speed index (1..=8). OTP-gated.
    BolusSpeedSetting { speed: u8 },

    /// Confirm an OTP-gated setting: echoes the original request's
    /// `MsgType` as a correlation field plus the OTP from its response.
    AppConfirm { request: MsgType, otp: u32 },
    /// Cancel an OTP-gated setting, same correlation fields.
    AppCancel { request: MsgType, otp: u32 },
}

/// Scale units to the wire's hundredths, rejecting out-of-range values.
fn to_hundredths(units: f64, what: &str) -> Result<u16, PumpError> {
    if !(0.0..=655.35).contains(&units) {
        return Err(PumpError::FieldOutOfRange(format!("{what}: {units}")));
    }
    Ok((units * 100.0).round() as u16)
}

impl Command {
    pub fn msg_type(&self) -> MsgType {
        match self {
            Command::TimeInquire => MsgType::TimeInquire,
            Command::SerialNumInquire => MsgType::SerialNumInquire,
            Command::BasalLimitInquire => MsgType::BasalLimitInquire,
            Command::SnackLimitInquire => MsgType::SnackLimitInquire,
            Command::BigMainInfoInquire => MsgType::BigMainInfoInquire,
            Command::BigApsMainInfoInquire => MsgType::BigApsMainInfoInquire,
            Command::BigLogInquire { .. } => MsgType::BigLogInquire,
            Command::LogStatusInquire => MsgType::LogStatusInquire,
            Command::TempBasalInquire => MsgType::TempBasalInquire,
            Command::BolusSpeedInquire => MsgType::BolusSpeedInquire,
            Command::TimeSetting { .. } => MsgType::TimeSetting,
            Command::TempBasalStart { .. } | Command::TempBasalStop => MsgType::TempBasalSetting,
            Command::InjectionSnack { .. } => MsgType::InjectionSnackSetting,
            Command::InjectionExtendedBolus { .. } => MsgType::InjectionExtendedBolusSetting,
            Command::InjectionBasal { .. } => MsgType::InjectionBasalSetting,
            Command::BasalSetting { .. } => MsgType::BasalSetting,
            Command::InjectionCancel => MsgType::InjectionCancelSetting,
            Command::BasalPause { .. } => MsgType::BasalPauseSetting,
            Command::BolusSpeedSetting { .. } => MsgType::BolusSpeedSetting,
            Command::AppConfirm { .. } => MsgType::AppConfirmSetting,
            Command::AppCancel { .. } => MsgType::AppCancelSetting,
        }
    }

    /// Continuation flag. Only profile-upload groups 1-3 continue; every
    /// other command is a single-frame sequence.
    pub fn con_end(&self) -> u8 {
        match self {
            Command::BasalSetting { group, .. } if *group < 4 => MSG_CON_CONTINUE,
            _ => MSG_CON_END,
        }
    }

    /// Build the 20-byte wire frame for this command.
    pub fn encode(&self, seq: u8) -> Result<Vec<u8>, PumpError> {
        let mut frame = FrameBuilder::short(self.msg_type(), seq, self.con_end());
        match self {
            Command::TimeInquire
            | Command::SerialNumInquire
            | Command::BasalLimitInquire
            | Command::SnackLimitInquire
            | Command::BigMainInfoInquire
            | Command::BigApsMainInfoInquire
            | Command::LogStatusInquire
            | Command::TempBasalInquire
            | Command::BolusSpeedInquire
            | Command::InjectionCancel => {}

            Command::BigLogInquire { start_no, end_no } => {
                frame.put_u16_le(*start_no).put_u16_le(*end_no);
            }

            Command::TimeSetting {
                year,
                month,
                day,
                hour,
                minute,
                second,
            } => {
                let y = year.checked_sub(2000).filter(|y| *y <= 255).ok_or_else(|| {
                    PumpError::FieldOutOfRange(format!("year: {year}"))
                })?;
                frame
                    .put_u8(y as u8)
                    .put_u8(*month)
                    .put_u8(*day)
                    .put_u8(*hour)
                    .put_u8(*minute)
                    .put_u8(*second);
            }

            Command::TempBasalStart { tb_time, rate } => {
                let ratio = rate.to_ratio();
                if ratio > u32::from(u16::MAX) {
                    return Err(PumpError::FieldOutOfRange(format!("tb ratio: {ratio}")));
                }
                frame.put_u8(1).put_u8(*tb_time).put_u16_le(ratio as u16);
            }
            Command::TempBasalStop => {
                frame.put_u8(2);
            }

            Command::InjectionSnack { amount } => {
                frame.put_u16_le(to_hundredths(*amount, "snack amount")?);
            }

            Command::InjectionExtendedBolus { minutes, amount } => {
                frame
                    .put_u16_le(*minutes)
                    .put_u16_le(to_hundredths(*amount, "extended amount")?);
            }

            Command::InjectionBasal { pattern } => {
                check_pattern(*pattern)?;
                frame.put_u8(*pattern);
            }

            Command::BasalSetting {
                pattern,
                group,
                rates,
            } => {
                check_pattern(*pattern)?;
                if !(1..=4).contains(group) {
                    return Err(PumpError::FieldOutOfRange(format!("group: {group}")));
                }
                frame.put_u8(*pattern).put_u8(*group);
                for rate in rates {
                    frame.put_u16_le(to_hundredths(*rate, "basal rate")?);
                }
            }

            Command::BasalPause { suspend } => {
                frame.put_u8(if *suspend { 1 } else { 2 });
            }

            Command::BolusSpeedSetting { speed } => {
                if !(1..=8).contains(speed) {
                    return Err(PumpError::FieldOutOfRange(format!("speed: {speed}")));
                }
                frame.put_u8(*speed);
            }

            Command::AppConfirm { request, otp } | Command::AppCancel { request, otp } => {
                frame.put_u8(u8::from(*request)).put_u32_le(*otp);
            }
        }
        Ok(frame.finish())
    }
}

/// Split a 24-hour profile into the 4-group upload sequence for one
/// pattern slot. The whole sequence is one logical transaction: on any
/// failure the caller must retry from group 1.
pub fn profile_upload_commands(pattern: u8, rates: &[f64; 24]) -> Result<Vec<Command>, PumpError> {
    check_pattern(pattern)?;
    let mut commands = Vec::with_capacity(4);
    for group in 1u8..=4 {
        let base = usize::from(group - 1) * 6;
        let mut chunk = [0.0f64; 6];
        chunk.copy_from_slice(&rates[base..base + 6]);
        commands.push(Command::BasalSetting {
            pattern,
            group,
            rates: chunk,
        });
    }
    Ok(commands)
}

fn check_pattern(pattern: u8) -> Result<(), PumpError> {
    if (1..=6).contains(&pattern) {
        Ok(())
    } else {
        Err(PumpError::FieldOutOfRange(format!("pattern: {pattern}")))
    }
}
