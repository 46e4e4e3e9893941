use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;
use strum_macros::Display;

use crate::constants::*;
use crate::codec::get_crc;

/// Wire message types.
///
/// Requests live below 0x80, their responses at `request | 0x80`. The four
/// report types (0xE1..) are pushed by the pump without a matching request.
/// 0x09 is unassigned on the wire; the pump skips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum MsgType {
    TimeInquire = 0x01,
    SerialNumInquire = 0x02,
    BasalLimitInquire = 0x03,
    SnackLimitInquire = 0x04,
    BigMainInfoInquire = 0x05,
    BigApsMainInfoInquire = 0x06,
    BigLogInquire = 0x07,
    LogStatusInquire = 0x08,
    TempBasalInquire = 0x0A,
    BolusSpeedInquire = 0x0B,

    TimeSetting = 0x11,
    TempBasalSetting = 0x12,
    InjectionSnackSetting = 0x13,
    InjectionExtendedBolusSetting = 0x14,
    InjectionBasalSetting = 0x15,
    BasalSetting = 0x16,
    InjectionCancelSetting = 0x17,
    BasalPauseSetting = 0x18,
    BolusSpeedSetting = 0x19,
    AppConfirmSetting = 0x37,
    AppCancelSetting = 0x38,

    TimeInquireResponse = 0x81,
    SerialNumInquireResponse = 0x82,
    BasalLimitInquireResponse = 0x83,
    SnackLimitInquireResponse = 0x84,
    BigMainInfoInquireResponse = 0x85,
    BigApsMainInfoInquireResponse = 0x86,
    BigLogInquireResponse = 0x87,
    LogStatusInquireResponse = 0x88,
    TempBasalInquireResponse = 0x8A,
    BolusSpeedInquireResponse = 0x8B,

    TimeSettingResponse = 0x91,
    TempBasalSettingResponse = 0x92,
    InjectionSnackSettingResponse = 0x93,
    InjectionExtendedBolusSettingResponse = 0x94,
    InjectionBasalSettingResponse = 0x95,
    BasalSettingResponse = 0x96,
    InjectionCancelSettingResponse = 0x97,
    BasalPauseSettingResponse = 0x98,
    BolusSpeedSettingResponse = 0x99,
    AppConfirmSettingResponse = 0xB7,
    AppCancelSettingResponse = 0xB8,

    InjectionProgressReport = 0xE1,
    BatteryWarningReport = 0xE2,
    InsulinLackReport = 0xE3,
    InjectionBlockReport = 0xE4,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl MsgType {
    /// Diagnostic name, never used for decoding.
    pub fn friendly_name(&self) -> String {
        self.to_string()
    }

    /// Inquire responses use success sentinel 16.
    pub fn is_inquire_response(&self) -> bool {
        matches!(
            self,
            MsgType::TimeInquireResponse
                | MsgType::SerialNumInquireResponse
                | MsgType::BasalLimitInquireResponse
                | MsgType::SnackLimitInquireResponse
                | MsgType::BigMainInfoInquireResponse
                | MsgType::BigApsMainInfoInquireResponse
                | MsgType::BigLogInquireResponse
                | MsgType::LogStatusInquireResponse
                | MsgType::TempBasalInquireResponse
                | MsgType::BolusSpeedInquireResponse
        )
    }

    /// Setting and confirm/cancel responses use success sentinel 0.
    pub fn is_setting_response(&self) -> bool {
        matches!(
            self,
            MsgType::TimeSettingResponse
                | MsgType::TempBasalSettingResponse
                | MsgType::InjectionSnackSettingResponse
                | MsgType::InjectionExtendedBolusSettingResponse
                | MsgType::InjectionBasalSettingResponse
                | MsgType::BasalSettingResponse
                | MsgType::InjectionCancelSettingResponse
                | MsgType::BasalPauseSettingResponse
                | MsgType::BolusSpeedSettingResponse
                | MsgType::AppConfirmSettingResponse
                | MsgType::AppCancelSettingResponse
        )
    }

    /// Reports are pushed by the pump and carry no result code.
    pub fn is_report(&self) -> bool {
        matches!(
            self,
            MsgType::InjectionProgressReport
                | MsgType::BatteryWarningReport
                | MsgType::InsulinLackReport
                | MsgType::InjectionBlockReport
        )
    }

    /// Big-frame (182 byte) message types; everything else uses 20 bytes.
    pub fn is_big(&self) -> bool {
        matches!(
            self,
            MsgType::BigMainInfoInquireResponse
                | MsgType::BigApsMainInfoInquireResponse
                | MsgType::BigLogInquireResponse
        )
    }
}

/// Result code carried as the first payload byte of most responses.
///
/// Success differs by family: `InquireSuccess` (16) for inquire responses,
/// `SettingSuccess` (0) for setting/confirm responses. The taxonomy is not
/// exhaustive; unlisted codes pass through verbatim as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum ResultCode {
    SettingSuccess = 0,
    InquireSuccess = 16,
    CrcError = 17,
    ParameterError = 18,
    SystemReserved = 19,
    IncompatibleState = 35,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Default for ResultCode {
    fn default() -> Self {
        ResultCode::SettingSuccess
    }
}

/// Builds an outgoing frame: header, little-endian payload fields at
/// offset 4+, `0xFF` padding, trailing CRC.
pub(crate) struct FrameBuilder {
    buf: Vec<u8>,
    pos: usize,
}

impl FrameBuilder {
    /// Commands always fit the 20-byte frame; only the pump sends big ones.
    pub fn short(msg_type: MsgType, seq: u8, con_end: u8) -> Self {
        let mut buf = vec![MSG_PAD; MSG_LEN];
        buf[0] = SOP;
        buf[1] = msg_type.into();
        buf[2] = seq;
        buf[3] = con_end;
        Self {
            buf,
            pos: BT_MSG_DATA_LOC,
        }
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf[self.pos] = v;
        self.pos += 1;
        self
    }

    pub fn put_u16_le(&mut self, v: u16) -> &mut Self {
        self.buf[self.pos..self.pos + 2].copy_from_slice(&v.to_le_bytes());
        self.pos += 2;
        self
    }

    pub fn put_u32_le(&mut self, v: u32) -> &mut Self {
        self.buf[self.pos..self.pos + 4].copy_from_slice(&v.to_le_bytes());
        self.pos += 4;
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        let crc_loc = self.buf.len() - 1;
        self.buf[crc_loc] = get_crc(&self.buf, crc_loc);
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::defect;

    #[test]
    fn msg_type_round_trips_through_primitive() {
        let mt = MsgType::from_primitive(0x8A);
        assert_eq!(mt, MsgType::TempBasalInquireResponse);
        assert_eq!(u8::from(mt), 0x8A);
        assert!(matches!(MsgType::from_primitive(0x7E), MsgType::Unknown(0x7E)));
    }

    #[test]
    fn response_families_do_not_overlap() {
        for raw in 0u8..=255 {
            let mt = MsgType::from_primitive(raw);
            let classes = [mt.is_inquire_response(), mt.is_setting_response(), mt.is_report()];
            assert!(classes.iter().filter(|c| **c).count() <= 1, "0x{raw:02X}");
        }
    }

    #[test]
    fn result_code_preserves_unknown_values() {
        assert_eq!(ResultCode::from_primitive(35), ResultCode::IncompatibleState);
        assert!(matches!(ResultCode::from_primitive(42), ResultCode::Other(42)));
        assert_eq!(u8::from(ResultCode::Other(42)), 42);
    }

    #[test]
    fn frame_builder_emits_valid_frames() {
        let mut b = FrameBuilder::short(MsgType::TempBasalSetting, 3, MSG_CON_END);
        b.put_u8(1).put_u8(6).put_u16_le(50088);
        let frame = b.finish();
        assert_eq!(frame.len(), MSG_LEN);
        assert_eq!(frame[0], SOP);
        assert_eq!(frame[1], 0x12);
        assert_eq!(frame[2], 3);
        assert_eq!(frame[3], MSG_CON_END);
        assert_eq!(&frame[4..8], &[1, 6, 0xA8, 0xC3]);
        assert_eq!(frame[8], MSG_PAD);
        assert_eq!(defect(&frame), 0);
    }
}
