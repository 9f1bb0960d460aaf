//! Fault bitmasks reported in the `Error` packet.
//!
//! Both masks are point-in-time: a bit is set while the condition holds and
//! clears when it goes away. Unknown bits are retained.

use bitflags::bitflags;

bitflags! {
    /// Sensor-domain faults.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
    pub struct SensorFaults: u32 {
        const MOTION_NO_ANSWER = 0x0000_0001;
        const MOTION_WRONG_VALUE = 0x0000_0002;
        const MOTION_NOT_CALIBRATED = 0x0000_0004;
        const MOTION_CALIBRATING = 0x0000_0008;
        const PRESSURE_NO_ANSWER = 0x0000_0010;
        const PRESSURE_WRONG_VALUE = 0x0000_0020;
        const RANGE_GROUND_NO_ANSWER = 0x0000_0100;
        const RANGE_GROUND_WRONG_VALUE = 0x0000_0200;
        const FLOW_NO_ANSWER = 0x0000_1000;
        const FLOW_WRONG_VALUE = 0x0000_2000;
        const FLOW_CANNOT_RECOGNIZE_GROUND = 0x0000_4000;
    }
}

bitflags! {
    /// State-domain faults.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
    pub struct StateFaults: u32 {
        const NOT_REGISTERED = 0x0000_0001;
        const FLASH_READ_LOCK_UNLOCKED = 0x0000_0002;
        const BOOTLOADER_WRITE_LOCK_UNLOCKED = 0x0000_0004;
        const LOW_BATTERY = 0x0000_0008;
        const TAKEOFF_FAILURE = 0x0000_0010;
        const PROPELLER_VIBRATION = 0x0000_0020;
        const ATTITUDE_NOT_STABLE = 0x0000_0040;
        const CANNOT_FLIP_LOW_BATTERY = 0x0000_0100;
        const CANNOT_FLIP_TOO_HEAVY = 0x0000_0200;
    }
}

impl SensorFaults {
    /// IMU calibration in progress or still required.
    pub const CALIBRATION: Self =
        Self::MOTION_CALIBRATING.union(Self::MOTION_NOT_CALIBRATED);
}

impl StateFaults {
    /// Faults that must keep the drone on the ground.
    pub const CRITICAL: Self = Self::LOW_BATTERY
        .union(Self::ATTITUDE_NOT_STABLE)
        .union(Self::TAKEOFF_FAILURE)
        .union(Self::PROPELLER_VIBRATION);

    pub fn critical(self) -> Self {
        self & Self::CRITICAL
    }
}
