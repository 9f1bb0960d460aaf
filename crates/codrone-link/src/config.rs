use std::time::Duration;

use codrone_frame::FrameConfig;
use codrone_packet::RegistryConfig;
use codrone_transport::SerialConfig;

/// Configuration for a drone session.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Serial port settings used by [`crate::Drone::connect`].
    pub serial: SerialConfig,
    /// Frame codec settings. The read timeout bounds how long the receiver
    /// waits before it rechecks its stop flag.
    pub frame: FrameConfig,
    pub registry: RegistryConfig,
    /// Request State and Information after connecting and fail if the drone
    /// does not answer.
    pub verify_on_connect: bool,
    pub verify_timeout: Duration,
    /// How long to wait for each acknowledgement.
    pub ack_timeout: Duration,
    /// Send attempts before giving up on an acknowledgement.
    pub ack_attempts: u32,
    /// Poll interval for request-and-wait.
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            frame: FrameConfig {
                read_timeout: Some(Duration::from_millis(100)),
                write_timeout: Some(Duration::from_secs(1)),
                ..FrameConfig::default()
            },
            registry: RegistryConfig::default(),
            verify_on_connect: true,
            verify_timeout: Duration::from_secs(1),
            ack_timeout: Duration::from_millis(200),
            ack_attempts: 3,
            poll_interval: Duration::from_millis(20),
        }
    }
}

/// Battery thresholds in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorThresholds {
    /// At or below this level the drone must stay on the ground.
    pub critical_battery: u8,
    /// Below this level takeoff proceeds with a warning.
    pub risky_battery: u8,
}

impl Default for MonitorThresholds {
    fn default() -> Self {
        Self {
            critical_battery: 15,
            risky_battery: 45,
        }
    }
}

/// Timing and safety limits for the flight state machine.
#[derive(Debug, Clone)]
pub struct FlightConfig {
    /// Sleep between status polls.
    pub poll_interval: Duration,
    /// Time allowed for the drone to report it is airborne.
    pub takeoff_timeout: Duration,
    /// Time allowed for the drone to settle into steady flight.
    pub confirm_timeout: Duration,
    /// Time allowed for each landing phase before motors are force-stopped.
    pub landing_timeout: Duration,
    pub thresholds: MonitorThresholds,
    /// Run the in-flight safety check on a background thread at this
    /// interval. `None` disables the watchdog.
    pub watchdog_interval: Option<Duration>,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            takeoff_timeout: Duration::from_secs(4),
            confirm_timeout: Duration::from_secs(2),
            landing_timeout: Duration::from_secs(4),
            thresholds: MonitorThresholds::default(),
            watchdog_interval: None,
        }
    }
}
