//! Fixed-layout bodies of the 182-byte big-frame responses.
//!
//! The 177-byte payload of each big frame has a rigid field layout, so it
//! is read through `zerocopy` views and then converted to friendly types
//! with real units.

use serde::Serialize;
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::state::BasalPattern;

/// Body of `BigMainInfoInquireResponse`. Amount fields are hundredths of a
/// unit; the leading result byte is validated by the dispatcher before
/// this view is taken.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct MainInfoRaw {
    pub result: u8,
    pub country: u8,
    pub product_type: u8,
    pub make_year: u8, // years since 2000
    pub make_month: u8,
    pub make_day: u8,
    pub lot_no: U16,
    pub serial_no: U32,
    pub major_version: u8,
    pub minor_version: u8,
    pub cur_year: u8, // years since 2000
    pub cur_month: u8,
    pub cur_day: u8,
    pub cur_hour: u8,
    pub cur_minute: u8,
    pub cur_second: u8,
    pub battery_remain: u8,
    pub insulin_remain: U16,
    pub bolus_speed: u8,
    pub selected_pattern: u8,
    pub max_basal_per_hours: U16,
    pub max_bolus_per_day: U16,
    pub tb_status: u8,
    pub tb_time: u8,
    pub tb_inject_rate_ratio: U16,
    pub tb_elapsed_minutes: U16,
    pub eb_status: u8,
    pub eb_minutes: U16,
    pub eb_amount: U16,
    pub eb_injected: U16,
    pub eb_elapsed_minutes: U16,
    pub hourly_rates: [U16; 24],
    pub reserved: [u8; 85],
}

/// Body of `BigApsMainInfoInquireResponse`: the slimmer status snapshot
/// polled by a closed-loop caller.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ApsMainInfoRaw {
    pub result: u8,
    /// Bit 0: basal suspended.
    pub status: u8,
    pub selected_pattern: u8,
    pub current_basal_rate: U16,
    pub tb_status: u8,
    pub tb_time: u8,
    pub tb_inject_rate_ratio: U16,
    pub eb_status: u8,
    pub eb_minutes: U16,
    pub eb_amount: U16,
    pub eb_injected: U16,
    pub last_bolus_year: u8, // years since 2000
    pub last_bolus_month: u8,
    pub last_bolus_day: u8,
    pub last_bolus_hour: u8,
    pub last_bolus_minute: u8,
    pub last_bolus_second: u8,
    pub last_bolus_amount: U16,
    pub today_bolus_amount: U16,
    pub today_basal_amount: U16,
    pub battery_remain: u8,
    pub insulin_remain: U16,
    pub reserved: [u8; 146],
}

/// `MainInfoRaw` converted to real units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainInfo {
    pub country: u8,
    pub product_type: u8,
    pub make_year: u16,
    pub make_month: u8,
    pub make_day: u8,
    pub lot_no: u32,
    pub serial_no: u32,
    pub major_version: u8,
    pub minor_version: u8,
    pub battery_remain: u8,
    /// Units
    pub insulin_remain: f64,
    pub bolus_speed: u8,
    pub selected_pattern: BasalPattern,
    /// U/h, before the firmware multiplier
    pub max_basal_per_hours: f64,
    /// Units
    pub max_bolus_per_day: f64,
    pub tb_status: u8,
    pub tb_time: u8,
    pub tb_inject_rate_ratio: u32,
    pub tb_elapsed_minutes: u32,
    pub eb_status: u8,
    pub eb_minutes: u32,
    /// Units
    pub eb_amount: f64,
    /// Units
    pub eb_injected: f64,
    pub eb_elapsed_minutes: u32,
    /// U/h per hour slot
    pub hourly_rates: [f64; 24],
}

impl From<&MainInfoRaw> for MainInfo {
    fn from(raw: &MainInfoRaw) -> Self {
        let mut hourly_rates = [0.0f64; 24];
        for (slot, rate) in hourly_rates.iter_mut().zip(raw.hourly_rates.iter()) {
            *slot = f64::from(rate.get()) / 100.0;
        }
        MainInfo {
            country: raw.country,
            product_type: raw.product_type,
            make_year: 2000 + u16::from(raw.make_year),
            make_month: raw.make_month,
            make_day: raw.make_day,
            lot_no: u32::from(raw.lot_no.get()),
            serial_no: raw.serial_no.get(),
            major_version: raw.major_version,
            minor_version: raw.minor_version,
            battery_remain: raw.battery_remain,
            insulin_remain: f64::from(raw.insulin_remain.get()) / 100.0,
            bolus_speed: raw.bolus_speed,
            selected_pattern: BasalPattern::from(raw.selected_pattern),
            max_basal_per_hours: f64::from(raw.max_basal_per_hours.get()) / 100.0,
            max_bolus_per_day: f64::from(raw.max_bolus_per_day.get()) / 100.0,
            tb_status: raw.tb_status,
            tb_time: raw.tb_time,
            tb_inject_rate_ratio: u32::from(raw.tb_inject_rate_ratio.get()),
            tb_elapsed_minutes: u32::from(raw.tb_elapsed_minutes.get()),
            eb_status: raw.eb_status,
            eb_minutes: u32::from(raw.eb_minutes.get()),
            eb_amount: f64::from(raw.eb_amount.get()) / 100.0,
            eb_injected: f64::from(raw.eb_injected.get()) / 100.0,
            eb_elapsed_minutes: u32::from(raw.eb_elapsed_minutes.get()),
            hourly_rates,
        }
    }
}

/// `ApsMainInfoRaw` converted to real units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApsMainInfo {
    pub suspended: bool,
    pub selected_pattern: BasalPattern,
    /// U/h
    pub current_basal_rate: f64,
    pub tb_status: u8,
    pub tb_time: u8,
    pub tb_inject_rate_ratio: u32,
    pub eb_status: u8,
    pub eb_minutes: u32,
    /// Units
    pub eb_amount: f64,
    /// Units
    pub eb_injected: f64,
    /// Units
    pub last_bolus_amount: f64,
    /// Units
    pub today_bolus_amount: f64,
    /// Units
    pub today_basal_amount: f64,
    pub battery_remain: u8,
    /// Units
    pub insulin_remain: f64,
}

impl From<&ApsMainInfoRaw> for ApsMainInfo {
    fn from(raw: &ApsMainInfoRaw) -> Self {
        ApsMainInfo {
            suspended: raw.status & 0x01 != 0,
            selected_pattern: BasalPattern::from(raw.selected_pattern),
            current_basal_rate: f64::from(raw.current_basal_rate.get()) / 100.0,
            tb_status: raw.tb_status,
            tb_time: raw.tb_time,
            tb_inject_rate_ratio: u32::from(raw.tb_inject_rate_ratio.get()),
            eb_status: raw.eb_status,
            eb_minutes: u32::from(raw.eb_minutes.get()),
            eb_amount: f64::from(raw.eb_amount.get()) / 100.0,
            eb_injected: f64::from(raw.eb_injected.get()) / 100.0,
            last_bolus_amount: f64::from(raw.last_bolus_amount.get()) / 100.0,
            today_bolus_amount: f64::from(raw.today_bolus_amount.get()) / 100.0,
            today_basal_amount: f64::from(raw.today_basal_amount.get()) / 100.0,
            battery_remain: raw.battery_remain,
            insulin_remain: f64::from(raw.insulin_remain.get()) / 100.0,
        }
    }
}
