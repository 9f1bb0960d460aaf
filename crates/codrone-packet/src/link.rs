//! Link-manager packets: liveness, acknowledgements, faults and identity.

use bytes::{Buf, BufMut, BytesMut};
use codrone_frame::DeviceType;
use serde::Serialize;

use crate::flags::{SensorFaults, StateFaults};
use crate::packet::Packet;
use crate::tag::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Ping {
    pub system_time: u64,
}

impl Packet for Ping {
    const DATA_TYPE: DataType = DataType::Ping;
    const SIZE: usize = 8;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.system_time);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            system_time: src.get_u64_le(),
        }
    }
}

/// Sent by the device after it accepts a packet of `data_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Ack {
    pub system_time: u32,
    /// Raw wire byte of the acknowledged packet.
    pub data_type: u8,
}

impl Packet for Ack {
    const DATA_TYPE: DataType = DataType::Ack;
    const SIZE: usize = 5;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.system_time);
        dst.put_u8(self.data_type);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            system_time: src.get_u32_le(),
            data_type: src.get_u8(),
        }
    }
}

/// Current sensor and state fault masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ErrorFlags {
    pub system_time: u64,
    pub sensor: SensorFaults,
    pub state: StateFaults,
}

impl Packet for ErrorFlags {
    const DATA_TYPE: DataType = DataType::Error;
    const SIZE: usize = 16;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.system_time);
        dst.put_u32_le(self.sensor.bits());
        dst.put_u32_le(self.state.bits());
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            system_time: src.get_u64_le(),
            sensor: SensorFaults::from_bits_retain(src.get_u32_le()),
            state: StateFaults::from_bits_retain(src.get_u32_le()),
        }
    }
}

/// Ask the addressed device to send its latest packet of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Request {
    pub data_type: u8,
}

impl Request {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type: data_type.wire_byte(),
        }
    }
}

impl Packet for Request {
    const DATA_TYPE: DataType = DataType::Request;
    const SIZE: usize = 1;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u8(self.data_type);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            data_type: src.get_u8(),
        }
    }
}

/// Radio address. The first 12 bytes are the MCU's unique 96-bit ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Address {
    pub address: [u8; 16],
}

impl Address {
    pub fn cpu_id(&self) -> [u8; 12] {
        let mut id = [0u8; 12];
        id.copy_from_slice(&self.address[..12]);
        id
    }

    /// CPU ID as uppercase hex, most significant word first.
    pub fn cpu_id_hex(&self) -> String {
        self.cpu_id()
            .chunks_exact(4)
            .rev()
            .map(|word| {
                let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                format!("{value:08X}")
            })
            .collect()
    }
}

impl Packet for Address {
    const DATA_TYPE: DataType = DataType::Address;
    const SIZE: usize = 16;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.address);
    }

    fn read(src: &mut &[u8]) -> Self {
        let mut address = [0u8; 16];
        src.copy_to_slice(&mut address);
        Self { address }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Version {
    pub build: u16,
    pub minor: u8,
    pub major: u8,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Firmware identity of the answering device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Information {
    pub mode_update: u8,
    pub model_number: u32,
    pub version: Version,
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Information {
    /// The device class encoded in the model number.
    pub fn device(&self) -> Option<DeviceType> {
        DeviceType::from_byte((self.model_number >> 8) as u8)
    }
}

impl Packet for Information {
    const DATA_TYPE: DataType = DataType::Information;
    const SIZE: usize = 13;

    fn pack(&self, dst: &mut BytesMut) {
        dst.put_u8(self.mode_update);
        dst.put_u32_le(self.model_number);
        dst.put_u16_le(self.version.build);
        dst.put_u8(self.version.minor);
        dst.put_u8(self.version.major);
        dst.put_u16_le(self.year);
        dst.put_u8(self.month);
        dst.put_u8(self.day);
    }

    fn read(src: &mut &[u8]) -> Self {
        Self {
            mode_update: src.get_u8(),
            model_number: src.get_u32_le(),
            version: Version {
                build: src.get_u16_le(),
                minor: src.get_u8(),
                major: src.get_u8(),
            },
            year: src.get_u16_le(),
            month: src.get_u8(),
            day: src.get_u8(),
        }
    }
}
