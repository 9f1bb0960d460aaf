use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use codrone_frame::{FrameReader, FrameWriter};
use codrone_packet::{DataType, PacketError, PacketRegistry, PayloadKind};
use codrone_transport::LinkStream;
use tracing::{debug, info, warn};

use crate::ack::AckTracker;
use crate::cache::{Snapshot, StatusCache};
use crate::command::{CommandChannel, CommandSink};
use crate::config::{FlightConfig, LinkConfig};
use crate::error::{FlightResult, LinkError, Result};
use crate::flight::{FlightController, FlightStage, TakeoffReport, Watchdog};
use crate::monitor::SafetyMonitor;
use crate::receiver::{Receiver, ReceiverStats};

/// A connected drone session.
///
/// Owns the receiver thread, the command channel and the flight state
/// machine. Telemetry accessors read the cache and never block.
pub struct Drone {
    stream: LinkStream,
    cache: Arc<StatusCache>,
    commands: Arc<CommandChannel>,
    flight: Arc<FlightController>,
    receiver: Receiver,
    watchdog: Option<Watchdog>,
    config: LinkConfig,
    closed: bool,
}

impl Drone {
    /// Open the controller's serial port and start a session.
    #[cfg(unix)]
    pub fn connect(
        path: impl AsRef<std::path::Path>,
        config: LinkConfig,
        flight: FlightConfig,
    ) -> Result<Self> {
        let port = codrone_transport::SerialPort::open(path, &config.serial)?;
        Self::from_stream(LinkStream::from_serial(port), config, flight)
    }

    /// Find the controller by USB vendor id and connect to it.
    #[cfg(unix)]
    pub fn connect_auto(config: LinkConfig, flight: FlightConfig) -> Result<Self> {
        let port = codrone_transport::find_controller()?;
        info!(path = %port.path.display(), "found controller");
        Self::connect(&port.path, config, flight)
    }

    /// Connect to a bridge or simulator listening on a Unix socket.
    #[cfg(unix)]
    pub fn connect_socket(
        path: impl AsRef<std::path::Path>,
        config: LinkConfig,
        flight: FlightConfig,
    ) -> Result<Self> {
        let stream = codrone_transport::UnixDomainSocket::connect(path)?;
        Self::from_stream(stream, config, flight)
    }

    /// Start a session over an already connected stream.
    ///
    /// With `verify_on_connect` set, fails with [`LinkError::NotVerified`]
    /// unless the drone answers State and Information requests in time.
    pub fn from_stream(stream: LinkStream, config: LinkConfig, flight: FlightConfig) -> Result<Self> {
        let reader = FrameReader::with_config_link(stream.try_clone()?, config.frame.clone())?;

        let writer_stream = stream.try_clone()?;
        writer_stream.set_write_timeout(config.frame.write_timeout)?;
        let sink: CommandSink = Box::new(writer_stream);
        let writer = FrameWriter::with_config(sink, config.frame.clone());

        let cache = Arc::new(StatusCache::new());
        let acks = Arc::new(AckTracker::new());
        let receiver = Receiver::spawn(
            reader,
            PacketRegistry::with_config(config.registry.clone()),
            Arc::clone(&cache),
            Arc::clone(&acks),
        )?;

        let commands = Arc::new(CommandChannel::new(
            writer,
            acks,
            config.ack_timeout,
            config.ack_attempts,
        ));
        let watchdog_interval = flight.watchdog_interval;
        let flight = Arc::new(
            FlightController::new(Arc::clone(&commands), Arc::clone(&cache), flight)
                .with_liveness(receiver.liveness()),
        );
        let watchdog = watchdog_interval
            .map(|interval| Watchdog::spawn(Arc::clone(&flight), interval))
            .transpose()?;

        let transport = stream.transport_name();
        let mut drone = Self {
            stream,
            cache,
            commands,
            flight,
            receiver,
            watchdog,
            config,
            closed: false,
        };

        if drone.config.verify_on_connect {
            if let Err(err) = drone.verify() {
                warn!(%err, "drone did not answer, disconnecting");
                drone.disconnect();
                return Err(err);
            }
        }
        info!(transport, "connected");
        Ok(drone)
    }

    /// Request State and Information and wait for both.
    pub fn verify(&self) -> Result<()> {
        let timeout = self.config.verify_timeout;
        let mut missing = Vec::new();
        for data_type in [DataType::State, DataType::Information] {
            match self.request_and_wait(data_type, timeout) {
                Ok(_) => {}
                Err(LinkError::Timeout { .. }) => missing.push(data_type),
                Err(err) => return Err(err),
            }
        }
        if missing.is_empty() {
            debug!("drone verified");
            Ok(())
        } else {
            Err(LinkError::NotVerified { missing, timeout })
        }
    }

    /// Request a packet and wait for one that arrived after the request.
    ///
    /// The request is repeated every ack timeout until `timeout` passes.
    pub fn request_and_wait(&self, data_type: DataType, timeout: Duration) -> Result<Arc<Snapshot>> {
        let since = self.cache.sequence();
        let deadline = Instant::now() + timeout;
        let mut next_send = Instant::now();
        loop {
            if !self.receiver.is_connected() {
                return Err(self.connection_lost());
            }
            if let Some(snapshot) = self.cache.newer_than(data_type, since) {
                return Ok(snapshot);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(LinkError::Timeout { data_type, timeout });
            }
            if now >= next_send {
                self.commands.send_request(data_type)?;
                next_send = now + self.config.ack_timeout;
            }
            thread::sleep(self.config.poll_interval.min(deadline - now));
        }
    }

    /// Typed [`Drone::request_and_wait`].
    pub fn request<T: PayloadKind + Copy>(&self, timeout: Duration) -> Result<T> {
        let snapshot = self.request_and_wait(T::DATA_TYPE, timeout)?;
        snapshot.get::<T>().copied().ok_or_else(|| {
            PacketError::WrongSchema {
                expected: T::DATA_TYPE,
                actual: snapshot.payload.data_type(),
            }
            .into()
        })
    }

    /// Latest cached packet of type `T`, if any has arrived.
    pub fn latest<T: PayloadKind + Copy>(&self) -> Option<T> {
        self.cache.latest::<T>()
    }

    pub fn snapshot(&self, data_type: DataType) -> Option<Arc<Snapshot>> {
        self.cache.get(data_type)
    }

    pub fn cache(&self) -> &Arc<StatusCache> {
        &self.cache
    }

    pub fn monitor(&self) -> &SafetyMonitor {
        self.flight.monitor()
    }

    pub fn commands(&self) -> &CommandChannel {
        &self.commands
    }

    pub fn flight(&self) -> &Arc<FlightController> {
        &self.flight
    }

    pub fn stage(&self) -> FlightStage {
        self.flight.stage()
    }

    pub fn receiver_stats(&self) -> ReceiverStats {
        self.receiver.stats()
    }

    pub fn is_connected(&self) -> bool {
        !self.closed && self.receiver.is_connected()
    }

    /// Fire-and-forget request; the reply lands in the cache.
    pub fn send_request(&self, data_type: DataType) -> Result<()> {
        self.commands.send_request(data_type)
    }

    /// Stick input, safety-checked while in flight.
    pub fn send_control(&self, roll: i32, pitch: i32, yaw: i32, throttle: i32) -> FlightResult<()> {
        self.flight.control(roll, pitch, yaw, throttle)
    }

    pub fn takeoff(&self) -> FlightResult<TakeoffReport> {
        self.flight.takeoff()
    }

    pub fn land(&self) -> FlightResult<()> {
        self.flight.land()
    }

    pub fn hover(&self, duration: Duration) -> FlightResult<()> {
        self.flight.hover(duration)
    }

    pub fn emergency_stop(&self) -> FlightResult<()> {
        self.flight.emergency_stop()
    }

    /// Close the session. A drone still in flight is landed first; one in
    /// any other active stage is stopped.
    pub fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(mut watchdog) = self.watchdog.take() {
            watchdog.stop();
        }

        let stage = self.flight.stage();
        if stage.is_active() && self.receiver.is_connected() {
            let landed = stage == FlightStage::Flight && self.flight.land().is_ok();
            if !landed {
                warn!(%stage, "disconnecting while active, stopping motors");
                if let Err(err) = self.flight.emergency_stop() {
                    warn!(%err, "stop before disconnect failed");
                }
            }
        }

        if let Err(err) = self.stream.shutdown() {
            debug!(%err, "stream shutdown failed");
        }
        self.receiver.stop();
        info!("disconnected");
    }

    fn connection_lost(&self) -> LinkError {
        LinkError::ConnectionLost(
            self.receiver
                .last_error()
                .unwrap_or_else(|| "receiver stopped".to_string()),
        )
    }
}

impl Drop for Drone {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for Drone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drone")
            .field("stream", &self.stream)
            .field("stage", &self.flight.stage())
            .field("connected", &self.is_connected())
            .finish()
    }
}
