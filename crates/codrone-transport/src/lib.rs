//! Byte-stream transports for the CoDrone controller link.
//!
//! The drone is reached through its radio controller, which enumerates as a
//! USB serial device. This crate provides:
//! - a raw termios serial port ([`SerialPort`]),
//! - a Unix domain socket transport for bridges and simulators,
//! - controller discovery on Linux via sysfs.
//!
//! This is the lowest layer of the workspace. Everything else builds on top
//! of the [`LinkStream`] type provided here.

pub mod config;
pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod discover;
#[cfg(unix)]
pub mod serial;
#[cfg(unix)]
pub mod uds;

pub use config::{SerialConfig, DEFAULT_BAUD_RATE, DEFAULT_SERIAL_READ_TIMEOUT};
pub use error::{Result, TransportError};
pub use stream::LinkStream;

#[cfg(unix)]
pub use discover::{find_controller, list_ports, PortInfo, CONTROLLER_VENDOR_ID};
#[cfg(unix)]
pub use serial::SerialPort;
#[cfg(unix)]
pub use uds::UnixDomainSocket;
