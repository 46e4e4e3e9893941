//! Mutable pump-state projection.
//!
//! `PumpState` is written only by response decoders and read by the caller
//! (UI, dosing logic). It carries no locking: the owning driver must
//! serialize all decoding on one execution context. Every derived value
//! here is a pure computation over stored fields and a caller-supplied
//! `now` in epoch milliseconds.

use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;
use strum_macros::Display;

use crate::constants::TB_RATIO_PERCENT_BASE;
use crate::logs::is_pump_version_ge;
use crate::packet::ResultCode;

/// A connection older than this no longer counts as initialized.
const CONNECTION_FRESH_MS: i64 = 60 * 60 * 1000;

/// Temp-basal rate encoding shared by packets and history logs: ratios at
/// or above 50000 carry percent-of-profile, anything below carries an
/// absolute rate in hundredths of a U/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TempBasalRate {
    Percent(u32),
    /// U/h
    Absolute(f64),
}

impl TempBasalRate {
    pub fn from_ratio(ratio: u32) -> Self {
        if ratio >= TB_RATIO_PERCENT_BASE {
            TempBasalRate::Percent(ratio - TB_RATIO_PERCENT_BASE)
        } else {
            TempBasalRate::Absolute(f64::from(ratio as u16) / 100.0)
        }
    }

    /// Saturates for out-of-range percents; the encoder rejects anything
    /// that does not fit the wire's 16 bits.
    pub fn to_ratio(&self) -> u32 {
        match self {
            TempBasalRate::Percent(p) => TB_RATIO_PERCENT_BASE.saturating_add(*p),
            TempBasalRate::Absolute(rate) => (rate * 100.0).round() as u32,
        }
    }
}

/// Basal pattern slot names as shown on the pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize)]
#[repr(u8)]
pub enum BasalPattern {
    Base = 1,
    Life1 = 2,
    Life2 = 3,
    Life3 = 4,
    Dr1 = 5,
    Dr2 = 6,

    #[num_enum(catch_all)]
    #[strum(to_string = "No Pattern")]
    NoPattern(u8),
}

impl Default for BasalPattern {
    fn default() -> Self {
        BasalPattern::NoPattern(0)
    }
}

/// `remaining = ceil((start + duration - now) / 1 minute)`, floored at 0.
pub fn remaining_minutes(start_ms: i64, duration_ms: i64, now_ms: i64) -> i64 {
    let end_ms = start_ms + duration_ms;
    if now_ms >= end_ms {
        0
    } else {
        (end_ms - now_ms + 59_999) / 60_000
    }
}

/// In-progress window is inclusive at `start`, exclusive at `start + duration`.
pub fn is_in_progress(start_ms: i64, duration_ms: i64, now_ms: i64) -> bool {
    duration_ms > 0 && now_ms >= start_ms && now_ms < start_ms + duration_ms
}

/// Canonical temp-basal record owned by an external synchronized store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempBasalRecord {
    pub start_ms: i64,
    pub duration_ms: i64,
    pub rate: TempBasalRate,
}

/// Canonical extended-bolus record owned by an external synchronized store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtendedBolusRecord {
    pub start_ms: i64,
    pub duration_ms: i64,
    /// Total units over the duration.
    pub amount: f64,
}

/// Local mirror of the running temp basal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TempBasalState {
    pub start_ms: i64,
    pub duration_ms: i64,
    pub ratio: u32,
}

impl TempBasalState {
    pub fn rate(&self) -> TempBasalRate {
        TempBasalRate::from_ratio(self.ratio)
    }

    pub fn is_in_progress(&self, now_ms: i64) -> bool {
        is_in_progress(self.start_ms, self.duration_ms, now_ms)
    }

    pub fn remaining_minutes(&self, now_ms: i64) -> i64 {
        remaining_minutes(self.start_ms, self.duration_ms, now_ms)
    }
}

/// Local mirror of the running extended bolus. The rate is derived at read
/// time; setting a rate back-computes the stored amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExtendedBolusState {
    pub start_ms: i64,
    pub duration_ms: i64,
    /// Total units over the duration.
    pub amount: f64,
}

impl ExtendedBolusState {
    /// U/h over the programmed duration; 0 when no duration is set.
    pub fn absolute_rate(&self) -> f64 {
        if self.duration_ms <= 0 {
            return 0.0;
        }
        self.amount / (self.duration_ms as f64 / 3_600_000.0)
    }

    /// Back-compute `amount` from a U/h rate over the current duration.
    pub fn set_absolute_rate(&mut self, rate: f64) {
        self.amount = rate * (self.duration_ms as f64 / 3_600_000.0);
    }

    pub fn is_in_progress(&self, now_ms: i64) -> bool {
        is_in_progress(self.start_ms, self.duration_ms, now_ms)
    }

    pub fn remaining_minutes(&self, now_ms: i64) -> i64 {
        remaining_minutes(self.start_ms, self.duration_ms, now_ms)
    }
}

/// Progress of the bolus currently being injected, fed by
/// `InjectionProgressReport` packets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BolusProgress {
    /// Units requested.
    pub set_amount: f64,
    /// Units delivered so far.
    pub injected_amount: f64,
    /// Device speed index.
    pub speed: u8,
}

impl BolusProgress {
    pub fn percent(&self) -> u8 {
        if self.set_amount <= 0.0 {
            return 0;
        }
        let pct = (self.injected_amount / self.set_amount * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.set_amount > 0.0 && self.injected_amount >= self.set_amount
    }
}

/// Capability snapshot resolved once from the firmware version at connect
/// time, instead of re-parsing the version string per packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PumpCapabilities {
    pub max_basal_multiplier: f64,
}

impl Default for PumpCapabilities {
    fn default() -> Self {
        Self {
            max_basal_multiplier: 2.0,
        }
    }
}

impl PumpCapabilities {
    pub fn from_version(major: u8, minor: u8) -> Self {
        let multiplier = if (major, minor) >= (3, 0) { 2.5 } else { 2.0 };
        Self {
            max_basal_multiplier: multiplier,
        }
    }

    /// Lenient parse for version strings persisted by collaborators,
    /// e.g. `"v2.63"` or `"version 3.50"`.
    pub fn from_version_string(version: &str) -> Self {
        if is_pump_version_ge(version, 3, 0) {
            Self {
                max_basal_multiplier: 2.5,
            }
        } else {
            Self {
                max_basal_multiplier: 2.0,
            }
        }
    }
}

/// Explicit per-delivery accumulator, passed by reference to whoever
/// handles bolus completion. Replaces a process-wide counter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeliverySession {
    pub delivered_units: f64,
}

impl DeliverySession {
    pub fn record_delivery(&mut self, units: f64) {
        self.delivered_units += units;
    }
}

/// Typed keys for the collaborator key-value preferences store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SettingKey {
    FirmwareVersion,
    BolusSpeed,
    BasalPattern,
}

/// Small persisted settings live outside this core; collaborators provide
/// the storage.
pub trait SettingsStore {
    fn get(&self, key: SettingKey) -> Option<String>;
    fn put(&mut self, key: SettingKey, value: String);
}

/// The single long-lived projection of everything the pump has told us.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PumpState {
    // Identity and version
    pub country: u8,
    pub product_type: u8,
    pub make_year: u16,
    pub make_month: u8,
    pub make_day: u8,
    pub lot_no: u32,
    pub serial_no: u32,
    pub major_version: u8,
    pub minor_version: u8,
    pub capabilities: PumpCapabilities,

    // Connection bookkeeping (epoch ms; 0 = never)
    pub last_connection_ms: i64,
    pub last_settings_read_ms: i64,

    // Limits, scaled to U/h and U
    pub max_basal: f64,
    pub max_bolus_per_day: f64,

    // Raw temp-basal mirror from the last inquire response
    pub tb_status: u8,
    pub tb_time: u8,
    pub tb_inject_rate_ratio: u32,
    pub tb_elapsed_minutes: u32,

    pub temp_basal: TempBasalState,
    pub extended_bolus: ExtendedBolusState,
    pub bolus_progress: BolusProgress,

    // Alarms and consumables
    pub battery_remain: u8,
    pub insulin_remain: f64,
    pub block_grade: u8,
    pub block_process: u8,
    pub block_kind: u8,
    pub shortage_grade: u8,
    pub shortage_process: u8,
    pub shortage_remain: u8,

    pub selected_pattern: BasalPattern,
    pub bolus_speed: u8,
    pub current_basal_rate: f64,

    /// Pending OTP from the last dosing setting response, echoed back by
    /// the confirm/cancel follow-up.
    pub otp_number: u32,

    /// Device error code copied verbatim from a rejected response.
    pub result_error_code: ResultCode,
}

impl PumpState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_temp_basal_in_progress(&self, now_ms: i64) -> bool {
        self.temp_basal.is_in_progress(now_ms)
    }

    pub fn is_extended_bolus_in_progress(&self, now_ms: i64) -> bool {
        self.extended_bolus.is_in_progress(now_ms)
    }

    /// Fresh connection plus a usable basal limit.
    pub fn is_initialized(&self, now_ms: i64) -> bool {
        self.last_connection_ms > 0
            && now_ms - self.last_connection_ms < CONNECTION_FRESH_MS
            && self.max_basal > 0.0
    }

    /// Project the canonical temp-basal record into the local mirror.
    /// One-directional; `None` zeroes the mirror.
    pub fn from_temporary_basal(&mut self, record: Option<&TempBasalRecord>) {
        match record {
            Some(r) => {
                self.temp_basal = TempBasalState {
                    start_ms: r.start_ms,
                    duration_ms: r.duration_ms,
                    ratio: r.rate.to_ratio(),
                };
            }
            None => self.temp_basal = TempBasalState::default(),
        }
    }

    /// Project the canonical extended-bolus record into the local mirror.
    /// One-directional; `None` zeroes the mirror.
    pub fn from_extended_bolus(&mut self, record: Option<&ExtendedBolusRecord>) {
        match record {
            Some(r) => {
                self.extended_bolus = ExtendedBolusState {
                    start_ms: r.start_ms,
                    duration_ms: r.duration_ms,
                    amount: r.amount,
                };
            }
            None => self.extended_bolus = ExtendedBolusState::default(),
        }
    }

    /// Resolve the firmware version into the capability snapshot.
    pub fn set_firmware_version(&mut self, major: u8, minor: u8) {
        self.major_version = major;
        self.minor_version = minor;
        self.capabilities = PumpCapabilities::from_version(major, minor);
    }

    pub fn version_string(&self) -> String {
        format!("{}.{}", self.major_version, self.minor_version)
    }

    /// Apply a device-reported basal-per-hour limit (hundredths of U/h)
    /// through the firmware multiplier.
    pub fn apply_max_basal_per_hours(&mut self, max_basal_per_hours: u32) {
        self.max_basal =
            f64::from(max_basal_per_hours) / 100.0 * self.capabilities.max_basal_multiplier;
    }

    /// Forget connection state after a pump swap.
    pub fn reset(&mut self) {
        self.last_connection_ms = 0;
        self.last_settings_read_ms = 0;
    }
}

/// One profile entry: the rate takes effect at `start_hour` and holds until
/// the next entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileEntry {
    pub start_hour: u8,
    /// U/h
    pub rate: f64,
}

/// Map a basal profile into 24 hourly U/h values for upload. Entries must
/// be sorted by `start_hour`; hours before the first entry and negative
/// rates map to 0.0, so every value is non-negative.
pub fn build_profile_record(entries: &[ProfileEntry]) -> [f64; 24] {
    let mut rates = [0.0f64; 24];
    let mut current = 0.0f64;
    let mut next = entries.iter().peekable();
    for (hour, slot) in rates.iter_mut().enumerate() {
        while let Some(e) = next.peek() {
            if usize::from(e.start_hour) <= hour {
                current = e.rate.max(0.0);
                next.next();
            } else {
                break;
            }
        }
        *slot = current;
    }
    rates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_percent_branch() {
        assert_eq!(TempBasalRate::from_ratio(50120), TempBasalRate::Percent(120));
        assert_eq!(TempBasalRate::Percent(120).to_ratio(), 50120);
    }

    #[test]
    fn ratio_absolute_branch() {
        assert_eq!(TempBasalRate::from_ratio(250), TempBasalRate::Absolute(2.5));
        assert_eq!(TempBasalRate::Absolute(2.5).to_ratio(), 250);
        assert_eq!(TempBasalRate::from_ratio(1250), TempBasalRate::Absolute(12.5));
    }

    #[test]
    fn ratio_saturates_on_huge_percent() {
        assert_eq!(TempBasalRate::Percent(u32::MAX).to_ratio(), u32::MAX);
        assert_eq!(
            TempBasalRate::Percent(u32::MAX - TB_RATIO_PERCENT_BASE).to_ratio(),
            u32::MAX
        );
    }

    #[test]
    fn ratio_round_trips_percent_range() {
        for p in 0u32..1000 {
            assert_eq!(
                TempBasalRate::from_ratio(50000 + p),
                TempBasalRate::Percent(p)
            );
        }
    }

    #[test]
    fn in_progress_boundaries() {
        let start = 1_000_000;
        let dur = 30 * 60_000;
        assert!(is_in_progress(start, dur, start));
        assert!(is_in_progress(start, dur, start + dur - 1));
        assert!(!is_in_progress(start, dur, start + dur));
        assert!(!is_in_progress(start, 0, start));
    }

    #[test]
    fn remaining_minutes_rounds_up() {
        let start = 0;
        let dur = 30 * 60_000;
        assert_eq!(remaining_minutes(start, dur, 0), 30);
        assert_eq!(remaining_minutes(start, dur, 60_000), 29);
        assert_eq!(remaining_minutes(start, dur, 60_001), 29);
        assert_eq!(remaining_minutes(start, dur, dur), 0);
        assert_eq!(remaining_minutes(start, dur, dur + 5), 0);
    }

    #[test]
    fn from_temporary_basal_none_zeroes_mirror() {
        let mut state = PumpState::new();
        state.from_temporary_basal(Some(&TempBasalRecord {
            start_ms: 123,
            duration_ms: 456,
            rate: TempBasalRate::Percent(50),
        }));
        assert_eq!(state.temp_basal.ratio, 50050);
        state.from_temporary_basal(None);
        assert_eq!(state.temp_basal.start_ms, 0);
        assert_eq!(state.temp_basal.duration_ms, 0);
        assert_eq!(state.temp_basal.ratio, 0);
    }

    #[test]
    fn extended_bolus_rate_is_derived() {
        let mut eb = ExtendedBolusState {
            start_ms: 0,
            duration_ms: 2 * 3_600_000,
            amount: 3.0,
        };
        assert_eq!(eb.absolute_rate(), 1.5);
        eb.set_absolute_rate(2.0);
        assert_eq!(eb.amount, 4.0);
    }

    #[test]
    fn bolus_progress_percent() {
        let p = BolusProgress {
            set_amount: 4.0,
            injected_amount: 1.0,
            speed: 4,
        };
        assert_eq!(p.percent(), 25);
        assert!(!p.is_complete());
        assert_eq!(BolusProgress::default().percent(), 0);
    }

    #[test]
    fn capabilities_follow_firmware_version() {
        assert_eq!(PumpCapabilities::from_version(2, 63).max_basal_multiplier, 2.0);
        assert_eq!(PumpCapabilities::from_version(3, 0).max_basal_multiplier, 2.5);
        assert_eq!(
            PumpCapabilities::from_version_string("v3.50").max_basal_multiplier,
            2.5
        );
    }

    #[test]
    fn max_basal_applies_multiplier() {
        let mut state = PumpState::new();
        state.set_firmware_version(2, 63);
        state.apply_max_basal_per_hours(300);
        assert_eq!(state.max_basal, 6.0);
        state.set_firmware_version(3, 10);
        state.apply_max_basal_per_hours(300);
        assert_eq!(state.max_basal, 7.5);
    }

    #[test]
    fn initialized_needs_fresh_connection_and_limit() {
        let mut state = PumpState::new();
        let now = 10 * CONNECTION_FRESH_MS;
        assert!(!state.is_initialized(now));
        state.last_connection_ms = now - 1000;
        assert!(!state.is_initialized(now));
        state.max_basal = 2.0;
        assert!(state.is_initialized(now));
        state.reset();
        assert!(!state.is_initialized(now));
    }

    #[test]
    fn profile_record_fills_forward_and_clamps() {
        let entries = [
            ProfileEntry {
                start_hour: 0,
                rate: 0.8,
            },
            ProfileEntry {
                start_hour: 6,
                rate: 1.2,
            },
            ProfileEntry {
                start_hour: 22,
                rate: -1.0,
            },
        ];
        let rates = build_profile_record(&entries);
        assert_eq!(rates[0], 0.8);
        assert_eq!(rates[5], 0.8);
        assert_eq!(rates[6], 1.2);
        assert_eq!(rates[21], 1.2);
        assert_eq!(rates[22], 0.0);
        assert!(rates.iter().all(|r| *r >= 0.0));
    }

    #[test]
    fn delivery_session_accumulates_per_session() {
        let mut session = DeliverySession::default();
        session.record_delivery(1.5);
        session.record_delivery(0.5);
        assert_eq!(session.delivered_units, 2.0);
        // A new session starts from zero; nothing is process-wide.
        assert_eq!(DeliverySession::default().delivered_units, 0.0);
    }

    #[test]
    fn settings_store_round_trip() {
        use std::collections::HashMap;

        #[derive(Default)]
        struct MapStore(HashMap<SettingKey, String>);
        impl SettingsStore for MapStore {
            fn get(&self, key: SettingKey) -> Option<String> {
                self.0.get(&key).cloned()
            }
            fn put(&mut self, key: SettingKey, value: String) {
                self.0.insert(key, value);
            }
        }

        let mut store = MapStore::default();
        store.put(SettingKey::FirmwareVersion, "2.63".to_string());
        assert_eq!(store.get(SettingKey::FirmwareVersion).as_deref(), Some("2.63"));
        assert_eq!(store.get(SettingKey::BolusSpeed), None);
        assert_eq!(
            PumpCapabilities::from_version_string(&store.get(SettingKey::FirmwareVersion).unwrap())
                .max_basal_multiplier,
            2.0
        );
    }

    #[test]
    fn pattern_names() {
        assert_eq!(BasalPattern::from_primitive(1).to_string(), "Base");
        assert_eq!(BasalPattern::from_primitive(5).to_string(), "Dr1");
        assert_eq!(BasalPattern::from_primitive(9).to_string(), "No Pattern");
    }
}
