//! Typed payloads for the CoDrone protocol.
//!
//! Every [`DataType`] maps to exactly one fixed-width, little-endian,
//! padding-free payload struct. The [`PacketRegistry`] turns checked frames
//! into [`Payload`] values and skips data types it does not know.

pub mod card;
pub mod control;
pub mod error;
pub mod flags;
pub mod input;
pub mod link;
pub mod packet;
pub mod payload;
pub mod registry;
pub mod status;
pub mod tag;

pub use card::CardColor;
pub use control::{
    Command, CommandType, Control, ControlPosition, ControlPosition16, ControlRequest,
    FlightEvent,
};
pub use error::{PacketError, Result};
pub use flags::{SensorFaults, StateFaults};
pub use input::{Button, Joystick, JoystickBlock};
pub use link::{Ack, Address, ErrorFlags, Information, Ping, Request, Version};
pub use packet::{Packet, PayloadKind};
pub use payload::Payload;
pub use registry::{schema_for, Decoded, PacketRegistry, RegistryConfig, Schema};
pub use status::{
    Altitude, Attitude, Count, Flow, ModeFlight, ModeSystem, Motion, Position, Range, State,
    Trim,
};
pub use tag::DataType;
