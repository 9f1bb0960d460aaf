//! The single writer path to the device.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codrone_frame::{DeviceType, FrameWriter, Route};
use codrone_packet::{
    Command, CommandType, Control, ControlPosition, ControlRequest, DataType, FlightEvent,
    Packet, PayloadKind, Request,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::ack::{AckOutcome, AckTracker};
use crate::error::{LinkError, Result};

/// Boxed byte sink so sessions over any stream share one channel type.
pub type CommandSink = Box<dyn Write + Send>;

/// Encodes outgoing packets and writes them to the stream.
///
/// Sends are synchronous and best-effort: a packet is on the wire when a
/// send returns, but nothing waits for the device unless
/// [`CommandChannel::send_confirmed`] is used.
pub struct CommandChannel {
    writer: Mutex<FrameWriter<CommandSink>>,
    route: Route,
    acks: Arc<AckTracker>,
    ack_timeout: Duration,
    ack_attempts: u32,
    frames_sent: AtomicU64,
}

impl CommandChannel {
    pub fn new(
        writer: FrameWriter<CommandSink>,
        acks: Arc<AckTracker>,
        ack_timeout: Duration,
        ack_attempts: u32,
    ) -> Self {
        let route = writer.config().route;
        Self {
            writer: Mutex::new(writer),
            route,
            acks,
            ack_timeout,
            ack_attempts: ack_attempts.max(1),
            frames_sent: AtomicU64::new(0),
        }
    }

    /// Send a packet to the default destination.
    pub fn send<T: Packet>(&self, packet: &T) -> Result<()> {
        self.send_routed(packet, self.route)
    }

    /// Send a packet to a specific device.
    pub fn send_routed<T: Packet>(&self, packet: &T, route: Route) -> Result<()> {
        let payload = packet.to_bytes();
        self.writer
            .lock()
            .send_to(T::DATA_TYPE.wire_byte(), route, &payload)?;
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        debug!(data_type = %T::DATA_TYPE, to = route.to, len = payload.len(), "sent");
        Ok(())
    }

    /// Stick input; every axis is clamped to -100..=100.
    pub fn send_control(&self, roll: i32, pitch: i32, yaw: i32, throttle: i32) -> Result<()> {
        self.send(&Control::clamped(roll, pitch, yaw, throttle))
    }

    /// Stick input plus a request for one telemetry packet.
    pub fn send_control_request(&self, control: Control, data_type: DataType) -> Result<()> {
        self.send(&ControlRequest::new(control, data_type))
    }

    /// Relative move, clamped to what the flight controller accepts.
    pub fn send_position(&self, position: ControlPosition) -> Result<()> {
        self.send(&position.clamped())
    }

    /// Ask the drone for its latest packet of `data_type`.
    pub fn send_request(&self, data_type: DataType) -> Result<()> {
        self.send(&Request::new(data_type))
    }

    /// Ask a specific device, such as the controller, for a packet.
    pub fn send_request_to(&self, data_type: DataType, device: DeviceType) -> Result<()> {
        let route = Route::new(DeviceType::Base, device);
        self.send_routed(&Request::new(data_type), route)
    }

    pub fn send_command(&self, command_type: CommandType, option: u8) -> Result<()> {
        self.send(&Command::new(command_type, option))
    }

    pub fn send_flight_event(&self, event: FlightEvent) -> Result<()> {
        self.send(&Command::flight_event(event))
    }

    /// Send and wait for the device's ack, retrying on timeout.
    pub fn send_confirmed<T: PayloadKind>(&self, packet: &T) -> Result<()> {
        let wire = T::DATA_TYPE.wire_byte();
        for attempt in 1..=self.ack_attempts {
            self.acks.expect(wire);
            if let Err(err) = self.send(packet) {
                self.acks.cancel(wire);
                return Err(err);
            }
            match self.acks.wait(wire, self.ack_timeout) {
                AckOutcome::Acked => return Ok(()),
                AckOutcome::TimedOut => {
                    debug!(data_type = %T::DATA_TYPE, attempt, "no ack yet");
                }
                AckOutcome::Closed => {
                    return Err(LinkError::ConnectionLost(
                        "receiver stopped while waiting for ack".to_string(),
                    ));
                }
            }
        }
        self.acks.cancel(wire);
        warn!(data_type = %T::DATA_TYPE, attempts = self.ack_attempts, "not acknowledged");
        Err(LinkError::NotAcknowledged {
            data_type: T::DATA_TYPE,
            attempts: self.ack_attempts,
        })
    }

    /// Frames written since the channel was created.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn route(&self) -> Route {
        self.route
    }
}
