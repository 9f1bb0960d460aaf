//! Host-side driver for the CoDrone EDU quadcopter.
//!
//! The drone is reached through its radio controller over a serial link.
//! Each layer is its own crate and is re-exported here:
//!
//! - [`transport`]: serial and Unix-socket byte streams, controller discovery
//! - [`frame`]: CRC-checked frame codec with stream resynchronization
//! - [`packet`]: typed payloads and the registry that decodes them
//! - [`link`]: the drone session, status cache and flight state machine
//!   (behind the `link` feature)
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use codrone::link::{Drone, FlightConfig, LinkConfig};
//!
//! let drone = Drone::connect_auto(LinkConfig::default(), FlightConfig::default())?;
//! drone.takeoff()?;
//! drone.hover(Duration::from_secs(3))?;
//! drone.land()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use codrone_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use codrone_frame::*;
}

/// Re-export packet types.
pub mod packet {
    pub use codrone_packet::*;
}

/// Re-export session types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use codrone_link::*;
}
