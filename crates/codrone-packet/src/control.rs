//! Host-to-drone control and command packets.

use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::packet::Packet;
use crate::tag::DataType;

/// Stick input, each axis in -100..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Control {
    pub roll: i8,
    pub pitch: i8,
    pub yaw: i8,
    pub throttle: i8,
}

impl Control {
    pub const AXIS_LIMIT: i8 = 100;

    /// Build a control packet, clamping every axis to ±100.
    pub fn clamped(roll: i32, pitch: i32, yaw: i32, throttle: i32) -> Self {
        let limit = i32::from(Self::AXIS_LIMIT);
        let clamp = |v: i32| v.clamp(-limit, limit) as i8;
        Self {
            roll: clamp(roll),
            pitch: clamp(pitch),
            yaw: clamp(yaw),
            throttle: clamp(throttle),
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    fn put(&self, dst: &mut BytesMut) {
        dst.put_i8(self.roll);
        dst.put_i8(self.pitch);
        dst.put_i8(self.yaw);
        dst.put_i8(self.throttle);
    }
}

impl Packet for Control {
    const DATA_TYPE: DataType = DataType::Control;
    const SIZE: usize = 4;

    fn pack(&self, dst: &mut BytesMut) {
        self.put(dst);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            roll: src.get_i8(),
            pitch: src.get_i8(),
            yaw: src.get_i8(),
            throttle: src.get_i8(),
        }
    }
}

/// Stick input with a piggy-backed request for one telemetry packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlRequest {
    pub control: Control,
    /// Raw wire byte of the requested data type.
    pub request: u8,
}

impl ControlRequest {
    pub fn new(control: Control, request: DataType) -> Self {
        Self {
            control,
            request: request.wire_byte(),
        }
    }
}

impl Packet for ControlRequest {
    const DATA_TYPE: DataType = DataType::ControlRequest;
    const SIZE: usize = 5;

    fn pack(&self, dst: &mut BytesMut) {
        self.control.put(dst);
        dst.put_u8(self.request);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            control: Control::read(src),
            request: src.get_u8(),
        }
    }
}

/// Relative move: metres, m/s, degrees and degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ControlPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub velocity: f32,
    pub heading: i16,
    pub rotational_velocity: i16,
}

impl ControlPosition {
    /// Clamp to what the flight controller accepts: ±10 m per axis,
    /// 0.5–2.0 m/s, ±360°, and 10–360 °/s.
    pub fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(-10.0, 10.0),
            y: self.y.clamp(-10.0, 10.0),
            z: self.z.clamp(-10.0, 10.0),
            velocity: self.velocity.clamp(0.5, 2.0),
            heading: self.heading.clamp(-360, 360),
            rotational_velocity: self.rotational_velocity.clamp(10, 360),
        }
    }
}

impl Packet for ControlPosition {
    const DATA_TYPE: DataType = DataType::ControlPosition;
    const SIZE: usize = 20;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_f32_le(self.x);
        dst.put_f32_le(self.y);
        dst.put_f32_le(self.z);
        dst.put_f32_le(self.velocity);
        dst.put_i16_le(self.heading);
        dst.put_i16_le(self.rotational_velocity);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            x: src.get_f32_le(),
            y: src.get_f32_le(),
            z: src.get_f32_le(),
            velocity: src.get_f32_le(),
            heading: src.get_i16_le(),
            rotational_velocity: src.get_i16_le(),
        }
    }
}

/// Fixed-point variant of [`ControlPosition`]: centimetres and cm/s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ControlPosition16 {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub velocity: i16,
    pub heading: i16,
    pub rotational_velocity: i16,
}

impl Packet for ControlPosition16 {
    const DATA_TYPE: DataType = DataType::ControlPosition16;
    const SIZE: usize = 12;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_i16_le(self.x);
        dst.put_i16_le(self.y);
        dst.put_i16_le(self.z);
        dst.put_i16_le(self.velocity);
        dst.put_i16_le(self.heading);
        dst.put_i16_le(self.rotational_velocity);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            x: src.get_i16_le(),
            y: src.get_i16_le(),
            z: src.get_i16_le(),
            velocity: src.get_i16_le(),
            heading: src.get_i16_le(),
            rotational_velocity: src.get_i16_le(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum CommandType {
    Stop = 0x01,
    ModeControlFlight = 0x02,
    Headless = 0x03,
    ControlSpeed = 0x04,
    ClearBias = 0x05,
    ClearTrim = 0x06,
    FlightEvent = 0x07,
    SetDefault = 0x08,
    Backlight = 0x09,
    ModeController = 0x0A,
    Link = 0x0B,
    ClearCounter = 0xA0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum FlightEvent {
    Stop = 0x10,
    TakeOff = 0x11,
    Landing = 0x12,
    Reverse = 0x13,
    FlipFront = 0x14,
    FlipRear = 0x15,
    FlipLeft = 0x16,
    FlipRight = 0x17,
    Return = 0x18,
    ResetHeading = 0xA0,
}

/// A one-shot command such as a flight event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Command {
    pub command_type: u8,
    pub option: u8,
}

impl Command {
    pub fn new(command_type: CommandType, option: u8) -> Self {
        Self {
            command_type: command_type as u8,
            option,
        }
    }

    pub fn flight_event(event: FlightEvent) -> Self {
        Self::new(CommandType::FlightEvent, event as u8)
    }
}

impl Packet for Command {
    const DATA_TYPE: DataType = DataType::Command;
    const SIZE: usize = 2;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u8(self.command_type);
        dst.put_u8(self.option);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            command_type: src.get_u8(),
            option: src.get_u8(),
        }
    }
}
