//! Telemetry the drone reports about itself.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::packet::Packet;
use crate::tag::DataType;

/// Firmware run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeSystem {
    Boot,
    Start,
    Running,
    ReadyToReset,
    Error,
    Unknown(u8),
}

impl ModeSystem {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x10 => Self::Boot,
            0x11 => Self::Start,
            0x12 => Self::Running,
            0x13 => Self::ReadyToReset,
            0xA0 => Self::Error,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Boot => 0x10,
            Self::Start => 0x11,
            Self::Running => 0x12,
            Self::ReadyToReset => 0x13,
            Self::Error => 0xA0,
            Self::Unknown(byte) => byte,
        }
    }
}

/// Flight phase as reported by the drone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeFlight {
    None,
    Ready,
    Start,
    TakeOff,
    Flight,
    Landing,
    Flip,
    Reverse,
    Stop,
    Accident,
    Error,
    Test,
    Unknown(u8),
}

impl ModeFlight {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::None,
            0x10 => Self::Ready,
            0x11 => Self::Start,
            0x12 => Self::TakeOff,
            0x13 => Self::Flight,
            0x14 => Self::Landing,
            0x15 => Self::Flip,
            0x16 => Self::Reverse,
            0x20 => Self::Stop,
            0x30 => Self::Accident,
            0x31 => Self::Error,
            0x40 => Self::Test,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Ready => 0x10,
            Self::Start => 0x11,
            Self::TakeOff => 0x12,
            Self::Flight => 0x13,
            Self::Landing => 0x14,
            Self::Flip => 0x15,
            Self::Reverse => 0x16,
            Self::Stop => 0x20,
            Self::Accident => 0x30,
            Self::Error => 0x31,
            Self::Test => 0x40,
            Self::Unknown(byte) => byte,
        }
    }

    pub fn is_airborne(self) -> bool {
        matches!(self, Self::TakeOff | Self::Flight)
    }

    pub fn is_grounded(self) -> bool {
        matches!(self, Self::Ready | Self::Stop)
    }
}

/// Mode summary and battery level.
///
/// Mode bytes are kept raw so unknown firmware values survive a round trip;
/// use [`State::system`] and [`State::flight`] for the typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct State {
    pub mode_system: u8,
    pub mode_flight: u8,
    pub mode_control_flight: u8,
    pub mode_movement: u8,
    pub headless: u8,
    pub control_speed: u8,
    pub sensor_orientation: u8,
    /// Battery charge in percent.
    pub battery: u8,
}

impl State {
    pub fn system(&self) -> ModeSystem {
        ModeSystem::from_byte(self.mode_system)
    }

    pub fn flight(&self) -> ModeFlight {
        ModeFlight::from_byte(self.mode_flight)
    }
}

impl Packet for State {
    const DATA_TYPE: DataType = DataType::State;
    const SIZE: usize = 8;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u8(self.mode_system);
        dst.put_u8(self.mode_flight);
        dst.put_u8(self.mode_control_flight);
        dst.put_u8(self.mode_movement);
        dst.put_u8(self.headless);
        dst.put_u8(self.control_speed);
        dst.put_u8(self.sensor_orientation);
        dst.put_u8(self.battery);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            mode_system: src.get_u8(),
            mode_flight: src.get_u8(),
            mode_control_flight: src.get_u8(),
            mode_movement: src.get_u8(),
            headless: src.get_u8(),
            control_speed: src.get_u8(),
            sensor_orientation: src.get_u8(),
            battery: src.get_u8(),
        }
    }
}

/// Roll, pitch and yaw in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Attitude {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
}

impl Packet for Attitude {
    const DATA_TYPE: DataType = DataType::Attitude;
    const SIZE: usize = 6;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_i16_le(self.roll);
        dst.put_i16_le(self.pitch);
        dst.put_i16_le(self.yaw);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            roll: src.get_i16_le(),
            pitch: src.get_i16_le(),
            yaw: src.get_i16_le(),
        }
    }
}

/// Position estimate in metres relative to the takeoff point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Packet for Position {
    const DATA_TYPE: DataType = DataType::Position;
    const SIZE: usize = 12;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_f32_le(self.x);
        dst.put_f32_le(self.y);
        dst.put_f32_le(self.z);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            x: src.get_f32_le(),
            y: src.get_f32_le(),
            z: src.get_f32_le(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Altitude {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Pascals.
    pub pressure: f32,
    /// Metres above sea level, derived from pressure.
    pub altitude: f32,
    /// Metres from the bottom range sensor.
    pub range_height: f32,
}

impl Packet for Altitude {
    const DATA_TYPE: DataType = DataType::Altitude;
    const SIZE: usize = 16;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_f32_le(self.temperature);
        dst.put_f32_le(self.pressure);
        dst.put_f32_le(self.altitude);
        dst.put_f32_le(self.range_height);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            temperature: src.get_f32_le(),
            pressure: src.get_f32_le(),
            altitude: src.get_f32_le(),
            range_height: src.get_f32_le(),
        }
    }
}

/// Raw IMU output: accelerometer, gyroscope and fused angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Motion {
    pub accel_x: i16,
    pub accel_y: i16,
    pub accel_z: i16,
    pub gyro_roll: i16,
    pub gyro_pitch: i16,
    pub gyro_yaw: i16,
    pub angle_roll: i16,
    pub angle_pitch: i16,
    pub angle_yaw: i16,
}

impl Packet for Motion {
    const DATA_TYPE: DataType = DataType::Motion;
    const SIZE: usize = 18;

    fn pack(&self, dst: &mut BytesMut) {
        for value in [
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.gyro_roll,
            self.gyro_pitch,
            self.gyro_yaw,
            self.angle_roll,
            self.angle_pitch,
            self.angle_yaw,
        ] {
            dst.put_i16_le(value);
        }
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            accel_x: src.get_i16_le(),
            accel_y: src.get_i16_le(),
            accel_z: src.get_i16_le(),
            gyro_roll: src.get_i16_le(),
            gyro_pitch: src.get_i16_le(),
            gyro_yaw: src.get_i16_le(),
            angle_roll: src.get_i16_le(),
            angle_pitch: src.get_i16_le(),
            angle_yaw: src.get_i16_le(),
        }
    }
}

/// Distance sensors in millimetres. Only `front` and `bottom` are fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Range {
    pub left: i16,
    pub front: i16,
    pub right: i16,
    pub rear: i16,
    pub top: i16,
    pub bottom: i16,
}

impl Packet for Range {
    const DATA_TYPE: DataType = DataType::Range;
    const SIZE: usize = 12;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_i16_le(self.left);
        dst.put_i16_le(self.front);
        dst.put_i16_le(self.right);
        dst.put_i16_le(self.rear);
        dst.put_i16_le(self.top);
        dst.put_i16_le(self.bottom);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            left: src.get_i16_le(),
            front: src.get_i16_le(),
            right: src.get_i16_le(),
            rear: src.get_i16_le(),
            top: src.get_i16_le(),
            bottom: src.get_i16_le(),
        }
    }
}

/// Optical-flow displacement in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Flow {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Packet for Flow {
    const DATA_TYPE: DataType = DataType::Flow;
    const SIZE: usize = 12;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_f32_le(self.x);
        dst.put_f32_le(self.y);
        dst.put_f32_le(self.z);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            x: src.get_f32_le(),
            y: src.get_f32_le(),
            z: src.get_f32_le(),
        }
    }
}

/// Lifetime counters kept in the drone's flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Count {
    pub system_time: u32,
    pub flight_time: u32,
    pub takeoffs: u16,
    pub landings: u16,
    pub accidents: u16,
}

impl Packet for Count {
    const DATA_TYPE: DataType = DataType::Count;
    const SIZE: usize = 14;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.system_time);
        dst.put_u32_le(self.flight_time);
        dst.put_u16_le(self.takeoffs);
        dst.put_u16_le(self.landings);
        dst.put_u16_le(self.accidents);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            system_time: src.get_u32_le(),
            flight_time: src.get_u32_le(),
            takeoffs: src.get_u16_le(),
            landings: src.get_u16_le(),
            accidents: src.get_u16_le(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Trim {
    pub roll: i16,
    pub pitch: i16,
    pub yaw: i16,
    pub throttle: i16,
}

impl Packet for Trim {
    const DATA_TYPE: DataType = DataType::Trim;
    const SIZE: usize = 8;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_i16_le(self.roll);
        dst.put_i16_le(self.pitch);
        dst.put_i16_le(self.yaw);
        dst.put_i16_le(self.throttle);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            roll: src.get_i16_le(),
            pitch: src.get_i16_le(),
            yaw: src.get_i16_le(),
            throttle: src.get_i16_le(),
        }
    }
}
