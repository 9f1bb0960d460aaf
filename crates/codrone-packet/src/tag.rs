//! Data type tags.

use serde::Serialize;

/// Identifies the schema of a frame payload.
///
/// The enumeration is closed: it lists exactly the payloads this crate can
/// decode. Other wire values are legal and are skipped by the registry.
///
/// The four control variants share wire byte `0x10`; the device tells them
/// apart by payload length, and so does [`DataType::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DataType {
    Ping,
    Ack,
    Error,
    Request,
    Address,
    Information,
    Control,
    ControlRequest,
    ControlPosition16,
    ControlPosition,
    Command,
    State,
    Attitude,
    Position,
    Altitude,
    Motion,
    Range,
    Flow,
    Count,
    Trim,
    Button,
    Joystick,
    CardColor,
}

impl DataType {
    pub const ALL: [DataType; 23] = [
        Self::Ping,
        Self::Ack,
        Self::Error,
        Self::Request,
        Self::Address,
        Self::Information,
        Self::Control,
        Self::ControlRequest,
        Self::ControlPosition16,
        Self::ControlPosition,
        Self::Command,
        Self::State,
        Self::Attitude,
        Self::Position,
        Self::Altitude,
        Self::Motion,
        Self::Range,
        Self::Flow,
        Self::Count,
        Self::Trim,
        Self::Button,
        Self::Joystick,
        Self::CardColor,
    ];

    /// Byte carried in the frame header.
    pub const fn wire_byte(self) -> u8 {
        match self {
            Self::Ping => 0x01,
            Self::Ack => 0x02,
            Self::Error => 0x03,
            Self::Request => 0x04,
            Self::Address => 0x06,
            Self::Information => 0x07,
            Self::Control
            | Self::ControlRequest
            | Self::ControlPosition16
            | Self::ControlPosition => 0x10,
            Self::Command => 0x11,
            Self::State => 0x40,
            Self::Attitude => 0x41,
            Self::Position => 0x42,
            Self::Altitude => 0x43,
            Self::Motion => 0x44,
            Self::Range => 0x45,
            Self::Flow => 0x46,
            Self::Count => 0x50,
            Self::Trim => 0x52,
            Self::Button => 0x70,
            Self::Joystick => 0x71,
            Self::CardColor => 0x93,
        }
    }

    /// Map a wire byte and payload length to a data type.
    ///
    /// An exact `(byte, size)` match wins. Otherwise the first type with that
    /// byte is returned so the size check can report the mismatch.
    pub fn resolve(byte: u8, len: usize) -> Option<DataType> {
        let mut candidates = Self::ALL.iter().copied().filter(|t| t.wire_byte() == byte);
        let first = candidates.next()?;
        if first.payload_size() == len {
            return Some(first);
        }
        Some(candidates.find(|t| t.payload_size() == len).unwrap_or(first))
    }

    /// Whether the host sends this type rather than receives it.
    pub fn is_outgoing(self) -> bool {
        matches!(
            self,
            Self::Request
                | Self::Control
                | Self::ControlRequest
                | Self::ControlPosition16
                | Self::ControlPosition
                | Self::Command
        )
    }

    /// Parse a case-insensitive name, as used on the command line.
    pub fn from_name(name: &str) -> Option<DataType> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Ack => "ack",
            Self::Error => "error",
            Self::Request => "request",
            Self::Address => "address",
            Self::Information => "information",
            Self::Control => "control",
            Self::ControlRequest => "control-request",
            Self::ControlPosition16 => "control-position16",
            Self::ControlPosition => "control-position",
            Self::Command => "command",
            Self::State => "state",
            Self::Attitude => "attitude",
            Self::Position => "position",
            Self::Altitude => "altitude",
            Self::Motion => "motion",
            Self::Range => "range",
            Self::Flow => "flow",
            Self::Count => "count",
            Self::Trim => "trim",
            Self::Button => "button",
            Self::Joystick => "joystick",
            Self::CardColor => "card-color",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
