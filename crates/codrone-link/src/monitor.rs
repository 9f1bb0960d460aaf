//! Named predicates over the latest fault flags and battery level.

use std::sync::Arc;

use codrone_packet::{ErrorFlags, SensorFaults, State, StateFaults};
use serde::Serialize;

use crate::cache::StatusCache;
use crate::config::MonitorThresholds;

/// Battery classification against [`MonitorThresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryLevel {
    /// No State packet received yet.
    Unknown,
    Critical,
    Risky,
    Nominal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Nominal,
    Warning,
    Critical,
}

/// Everything the monitor knows, captured at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub battery: Option<u8>,
    pub battery_level: BatteryLevel,
    pub sensor_faults: SensorFaults,
    pub state_faults: StateFaults,
    pub critical_faults: StateFaults,
    pub calibrating: bool,
    pub severity: Severity,
}

/// Reads the cache on every call; holds no state of its own.
///
/// Without an Error packet in the cache every fault predicate is false.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    cache: Arc<StatusCache>,
    thresholds: MonitorThresholds,
}

impl SafetyMonitor {
    pub fn new(cache: Arc<StatusCache>, thresholds: MonitorThresholds) -> Self {
        Self { cache, thresholds }
    }

    pub fn thresholds(&self) -> MonitorThresholds {
        self.thresholds
    }

    pub fn error_flags(&self) -> Option<ErrorFlags> {
        self.cache.latest::<ErrorFlags>()
    }

    fn state_faults(&self) -> StateFaults {
        self.error_flags().map(|flags| flags.state).unwrap_or_default()
    }

    fn sensor_faults(&self) -> SensorFaults {
        self.error_flags().map(|flags| flags.sensor).unwrap_or_default()
    }

    pub fn is_low_battery(&self) -> bool {
        self.state_faults().contains(StateFaults::LOW_BATTERY)
    }

    pub fn is_calibrating(&self) -> bool {
        self.sensor_faults().intersects(SensorFaults::CALIBRATION)
    }

    /// True if any bit of `flag` is set.
    pub fn has_state_fault(&self, flag: StateFaults) -> bool {
        self.state_faults().intersects(flag)
    }

    pub fn has_sensor_fault(&self, flag: SensorFaults) -> bool {
        self.sensor_faults().intersects(flag)
    }

    /// Low battery, unstable attitude, takeoff failure or propeller vibration.
    pub fn has_critical_faults(&self) -> bool {
        !self.critical_faults().is_empty()
    }

    pub fn critical_faults(&self) -> StateFaults {
        self.state_faults().critical()
    }

    pub fn has_any_faults(&self) -> bool {
        self.error_flags()
            .is_some_and(|flags| !flags.state.is_empty() || !flags.sensor.is_empty())
    }

    /// Battery percentage from the latest State packet.
    pub fn battery(&self) -> Option<u8> {
        self.cache.latest::<State>().map(|state| state.battery)
    }

    pub fn battery_level(&self) -> BatteryLevel {
        self.classify_battery(self.battery())
    }

    fn classify_battery(&self, battery: Option<u8>) -> BatteryLevel {
        match battery {
            None => BatteryLevel::Unknown,
            Some(level) if level <= self.thresholds.critical_battery => BatteryLevel::Critical,
            Some(level) if level < self.thresholds.risky_battery => BatteryLevel::Risky,
            Some(_) => BatteryLevel::Nominal,
        }
    }

    pub fn severity(&self) -> Severity {
        self.report().severity
    }

    pub fn report(&self) -> SafetyReport {
        let flags = self.error_flags().unwrap_or_default();
        let battery = self.battery();
        let battery_level = self.classify_battery(battery);
        let critical_faults = flags.state.critical();
        let calibrating = flags.sensor.intersects(SensorFaults::CALIBRATION);

        let severity = if !critical_faults.is_empty() || battery_level == BatteryLevel::Critical
        {
            Severity::Critical
        } else if !flags.state.is_empty()
            || !flags.sensor.is_empty()
            || battery_level == BatteryLevel::Risky
        {
            Severity::Warning
        } else {
            Severity::Nominal
        };

        SafetyReport {
            battery,
            battery_level,
            sensor_faults: flags.sensor,
            state_faults: flags.state,
            critical_faults,
            calibrating,
            severity,
        }
    }
}
