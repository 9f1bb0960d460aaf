//! Device addresses carried in every frame header.

/// A node on the controller's radio network.
///
/// The host is always [`DeviceType::Base`]; telemetry arrives from the drone
/// or the controller itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceType {
    None = 0x00,
    Drone = 0x10,
    Controller = 0x20,
    Link = 0x30,
    LinkServer = 0x31,
    BleClient = 0x32,
    BleServer = 0x33,
    Range = 0x40,
    Base = 0x70,
    ByScratch = 0x80,
    Scratch = 0x81,
    Entry = 0x82,
    Tester = 0xA0,
    Monitor = 0xA1,
    Updater = 0xA2,
    Encryptor = 0xA3,
    Whispering = 0xFE,
    Broadcasting = 0xFF,
}

impl DeviceType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let device = match byte {
            0x00 => Self::None,
            0x10 => Self::Drone,
            0x20 => Self::Controller,
            0x30 => Self::Link,
            0x31 => Self::LinkServer,
            0x32 => Self::BleClient,
            0x33 => Self::BleServer,
            0x40 => Self::Range,
            0x70 => Self::Base,
            0x80 => Self::ByScratch,
            0x81 => Self::Scratch,
            0x82 => Self::Entry,
            0xA0 => Self::Tester,
            0xA1 => Self::Monitor,
            0xA2 => Self::Updater,
            0xA3 => Self::Encryptor,
            0xFE => Self::Whispering,
            0xFF => Self::Broadcasting,
            _ => return None,
        };
        Some(device)
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns a human-readable name for a device byte.
    pub fn name_of(byte: u8) -> &'static str {
        match Self::from_byte(byte) {
            Some(Self::Drone) => "drone",
            Some(Self::Controller) => "controller",
            Some(Self::Base) => "base",
            Some(Self::Broadcasting) => "broadcast",
            Some(_) => "other",
            None => "unknown",
        }
    }
}
