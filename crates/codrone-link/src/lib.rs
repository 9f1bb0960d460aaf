//! A drone session on top of the frame and packet layers.
//!
//! One background thread reads frames into a [`StatusCache`]; everything
//! else runs on the caller's thread. Commands go out through a single
//! [`CommandChannel`], and [`FlightController`] runs the timed takeoff and
//! landing stages against the cache.

pub mod ack;
pub mod cache;
pub mod command;
pub mod config;
pub mod drone;
pub mod error;
pub mod flight;
pub mod monitor;
pub mod receiver;

pub use ack::{AckOutcome, AckTracker};
pub use cache::{Snapshot, StatusCache};
pub use command::{CommandChannel, CommandSink};
pub use config::{FlightConfig, LinkConfig, MonitorThresholds};
pub use drone::Drone;
pub use error::{FlightError, FlightResult, LinkError, Result};
pub use flight::{FlightController, FlightStage, TakeoffReport, Watchdog};
pub use monitor::{BatteryLevel, SafetyMonitor, SafetyReport, Severity};
pub use receiver::{Liveness, Receiver, ReceiverStats};
