//! Staged takeoff and landing.
//!
//! Every stage polls the status cache at a fixed interval and is bounded by
//! a timeout. A stage that does not confirm in time stops the motors before
//! returning, so a failed takeoff never leaves the drone powered.
//!
//! ```text
//! Ground ──takeoff──▶ TakeoffStabilizing ──airborne──▶ TakeoffConfirmed ──steady──▶ Flight
//!                         │ timeout                         │ timeout / fault        │ land
//!                         ▼                                 ▼                        ▼
//!                      Aborted ◀────────────────────────────┘                     Landing ──▶ Ground
//!
//! any stage ──emergency_stop──▶ EmergencyStopped
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use codrone_packet::{DataType, FlightEvent, ModeFlight, State};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cache::StatusCache;
use crate::command::CommandChannel;
use crate::config::FlightConfig;
use crate::error::{FlightError, FlightResult, LinkError};
use crate::monitor::{BatteryLevel, SafetyMonitor};
use crate::receiver::Liveness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStage {
    Ground,
    TakeoffStabilizing,
    TakeoffConfirmed,
    Flight,
    Landing,
    Aborted,
    EmergencyStopped,
}

impl FlightStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::TakeoffStabilizing => "takeoff-stabilizing",
            Self::TakeoffConfirmed => "takeoff-confirmed",
            Self::Flight => "flight",
            Self::Landing => "landing",
            Self::Aborted => "aborted",
            Self::EmergencyStopped => "emergency-stopped",
        }
    }

    /// Stages in which the motors may be running under our control.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::TakeoffStabilizing | Self::TakeoffConfirmed | Self::Flight | Self::Landing
        )
    }
}

impl fmt::Display for FlightStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful takeoff observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TakeoffReport {
    pub battery: Option<u8>,
    pub battery_level: BatteryLevel,
    /// Time until the drone reported it was airborne.
    pub airborne_after: Duration,
    /// Total time until steady flight was confirmed.
    pub confirmed_after: Duration,
}

/// Drives the flight stages. All methods take `&self` so an emergency stop
/// can be issued from another thread while a takeoff is polling.
pub struct FlightController {
    commands: Arc<CommandChannel>,
    cache: Arc<StatusCache>,
    monitor: SafetyMonitor,
    liveness: Option<Liveness>,
    config: FlightConfig,
    stage: Mutex<FlightStage>,
    /// Bumped by every emergency stop; a poll loop that sees it change exits.
    emergency_epoch: AtomicU64,
    /// Held across an epoch check and the stage send that follows it, and by
    /// an emergency stop while it bumps the epoch and writes Stop. No stage
    /// command can follow a Stop on the wire.
    send_gate: Mutex<()>,
}

impl FlightController {
    pub fn new(
        commands: Arc<CommandChannel>,
        cache: Arc<StatusCache>,
        config: FlightConfig,
    ) -> Self {
        let monitor = SafetyMonitor::new(Arc::clone(&cache), config.thresholds);
        Self {
            commands,
            cache,
            monitor,
            liveness: None,
            config,
            stage: Mutex::new(FlightStage::Ground),
            emergency_epoch: AtomicU64::new(0),
            send_gate: Mutex::new(()),
        }
    }

    /// Treat a stopped receiver as a lost connection.
    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = Some(liveness);
        self
    }

    pub fn stage(&self) -> FlightStage {
        *self.stage.lock()
    }

    pub fn monitor(&self) -> &SafetyMonitor {
        &self.monitor
    }

    pub fn config(&self) -> &FlightConfig {
        &self.config
    }

    /// Take off and wait until the drone reports steady flight.
    ///
    /// The safety gate reads only cached telemetry: on a critical fault or a
    /// critical battery nothing is sent. An unknown battery level or one in
    /// the risky band logs a warning and proceeds.
    pub fn takeoff(&self) -> FlightResult<TakeoffReport> {
        let epoch = self.begin_takeoff()?;
        self.ensure_connected(FlightStage::Ground)?;

        let battery = self.monitor.battery();
        let battery_level = self.gate()?;

        self.transition(epoch, FlightStage::Ground, FlightStage::TakeoffStabilizing)?;
        let started = Instant::now();
        let since = self.cache.sequence();

        // Stage 1: repeat the takeoff event until the drone says it is airborne.
        let deadline = started + self.config.takeoff_timeout;
        loop {
            self.check_running(epoch, FlightStage::TakeoffStabilizing)?;
            if self.fresh_mode(since).is_some_and(ModeFlight::is_airborne) {
                break;
            }
            if Instant::now() >= deadline {
                return Err(self.abort(epoch, FlightStage::TakeoffStabilizing, started));
            }
            self.send(epoch, FlightStage::TakeoffStabilizing, |commands| {
                commands.send_flight_event(FlightEvent::TakeOff)?;
                commands.send_request(DataType::State)
            })?;
            thread::sleep(self.config.poll_interval);
        }
        let airborne_after = started.elapsed();
        info!(?airborne_after, "airborne");

        self.transition(
            epoch,
            FlightStage::TakeoffStabilizing,
            FlightStage::TakeoffConfirmed,
        )?;

        // Stage 2: steady flight with no critical fault raised since the gate.
        let confirm_started = Instant::now();
        let deadline = confirm_started + self.config.confirm_timeout;
        loop {
            self.check_running(epoch, FlightStage::TakeoffConfirmed)?;
            let faults = self.monitor.critical_faults();
            if !faults.is_empty() {
                warn!(?faults, "critical fault during takeoff, stopping motors");
                self.stop_motors();
                self.transition(epoch, FlightStage::TakeoffConfirmed, FlightStage::Aborted)?;
                return Err(FlightError::CriticalFault(faults));
            }
            if self.fresh_mode(since) == Some(ModeFlight::Flight) {
                break;
            }
            if Instant::now() >= deadline {
                return Err(self.abort(epoch, FlightStage::TakeoffConfirmed, confirm_started));
            }
            self.send(epoch, FlightStage::TakeoffConfirmed, |commands| {
                commands.send_request(DataType::State)?;
                commands.send_request(DataType::Error)
            })?;
            thread::sleep(self.config.poll_interval);
        }

        self.transition(epoch, FlightStage::TakeoffConfirmed, FlightStage::Flight)?;
        let confirmed_after = started.elapsed();
        info!(?confirmed_after, "takeoff confirmed");

        Ok(TakeoffReport {
            battery,
            battery_level,
            airborne_after,
            confirmed_after,
        })
    }

    /// Land and wait until the drone reports it is on the ground.
    ///
    /// If the drone is not on the ground within `landing_timeout` the motors
    /// are force-stopped and the controller ends in
    /// [`FlightStage::EmergencyStopped`].
    pub fn land(&self) -> FlightResult<()> {
        let epoch = {
            let mut stage = self.stage.lock();
            match *stage {
                FlightStage::Ground => return Ok(()),
                FlightStage::Flight => {}
                other => {
                    return Err(FlightError::InvalidStage {
                        stage: other,
                        operation: "land",
                    })
                }
            }
            info!(from = %*stage, to = %FlightStage::Landing, "flight stage");
            *stage = FlightStage::Landing;
            self.emergency_epoch.load(Ordering::Acquire)
        };

        let started = Instant::now();
        let since = self.cache.sequence();
        // One bound for both phases.
        let deadline = started + self.config.landing_timeout;

        // Phase 1: repeat the landing event until the descent is reported.
        loop {
            self.check_running(epoch, FlightStage::Landing)?;
            match self.fresh_mode(since) {
                Some(mode) if mode.is_grounded() => return self.landed(epoch, started),
                Some(ModeFlight::Landing) => break,
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(self.force_stop(epoch, started));
            }
            self.send(epoch, FlightStage::Landing, |commands| {
                commands.send_flight_event(FlightEvent::Landing)?;
                commands.send_request(DataType::State)
            })?;
            thread::sleep(self.config.poll_interval);
        }

        // Phase 2: wait for touchdown.
        loop {
            self.check_running(epoch, FlightStage::Landing)?;
            if self.fresh_mode(since).is_some_and(ModeFlight::is_grounded) {
                return self.landed(epoch, started);
            }
            if Instant::now() >= deadline {
                return Err(self.force_stop(epoch, started));
            }
            self.send(epoch, FlightStage::Landing, |commands| {
                commands.send_request(DataType::State)
            })?;
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Stop all motors now. Always accepted, from any stage.
    ///
    /// Any takeoff or landing poll in progress on another thread returns
    /// [`FlightError::Interrupted`] at its next poll.
    pub fn emergency_stop(&self) -> FlightResult<()> {
        let _gate = self.send_gate.lock();
        {
            let mut stage = self.stage.lock();
            self.emergency_epoch.fetch_add(1, Ordering::AcqRel);
            warn!(from = %*stage, "emergency stop");
            *stage = FlightStage::EmergencyStopped;
        }
        self.commands
            .send_flight_event(FlightEvent::Stop)
            .and_then(|()| self.commands.send_control(0, 0, 0, 0))
            .map_err(|err| self.link_failure(err, FlightStage::EmergencyStopped))
    }

    /// Send stick input. In flight, a newly raised critical fault lands the
    /// drone instead and returns [`FlightError::CriticalFault`].
    pub fn control(&self, roll: i32, pitch: i32, yaw: i32, throttle: i32) -> FlightResult<()> {
        self.safety_check()?;
        let stage = self.stage();
        self.commands
            .send_control(roll, pitch, yaw, throttle)
            .map_err(|err| self.link_failure(err, stage))
    }

    /// Hold position for `duration`, sending neutral sticks every poll.
    pub fn hover(&self, duration: Duration) -> FlightResult<()> {
        let epoch = self.emergency_epoch.load(Ordering::Acquire);
        let end = Instant::now() + duration;
        loop {
            let stage = self.stage();
            if stage != FlightStage::Flight {
                return Err(FlightError::InvalidStage {
                    stage,
                    operation: "hover",
                });
            }
            self.check_running(epoch, stage)?;
            self.control(0, 0, 0, 0)?;

            let now = Instant::now();
            if now >= end {
                return Ok(());
            }
            thread::sleep(self.config.poll_interval.min(end - now));
        }
    }

    /// The in-flight check run every control cycle and by the watchdog.
    ///
    /// Outside [`FlightStage::Flight`] this does nothing.
    pub fn safety_check(&self) -> FlightResult<()> {
        if self.stage() != FlightStage::Flight {
            return Ok(());
        }
        self.ensure_connected(FlightStage::Flight)?;

        let faults = self.monitor.critical_faults();
        if faults.is_empty() {
            return Ok(());
        }
        warn!(?faults, "critical fault in flight, landing");
        if let Err(err) = self.land() {
            warn!(%err, "emergency landing did not complete normally");
        }
        Err(FlightError::CriticalFault(faults))
    }

    fn begin_takeoff(&self) -> FlightResult<u64> {
        let mut stage = self.stage.lock();
        match *stage {
            FlightStage::Ground => {}
            FlightStage::Aborted | FlightStage::EmergencyStopped => {
                info!(from = %*stage, to = %FlightStage::Ground, "flight stage reset");
                *stage = FlightStage::Ground;
            }
            other => {
                return Err(FlightError::InvalidStage {
                    stage: other,
                    operation: "take off",
                })
            }
        }
        Ok(self.emergency_epoch.load(Ordering::Acquire))
    }

    /// Decide from cached telemetry whether takeoff may start.
    fn gate(&self) -> FlightResult<BatteryLevel> {
        let faults = self.monitor.critical_faults();
        if !faults.is_empty() {
            warn!(?faults, "takeoff blocked by critical fault");
            return Err(FlightError::CriticalFault(faults));
        }

        let battery = self.monitor.battery();
        let level = self.monitor.battery_level();
        match (level, battery) {
            (BatteryLevel::Critical, Some(battery)) => {
                let threshold = self.config.thresholds.critical_battery;
                warn!(battery, threshold, "takeoff blocked by low battery");
                return Err(FlightError::LowBattery { battery, threshold });
            }
            (BatteryLevel::Risky, Some(battery)) => {
                warn!(battery, "battery is low, flight time will be short");
            }
            (BatteryLevel::Unknown, _) => {
                warn!("battery level unknown, taking off anyway");
            }
            _ => {}
        }
        Ok(level)
    }

    /// Flight mode from a State packet newer than `since`.
    fn fresh_mode(&self, since: u64) -> Option<ModeFlight> {
        self.cache
            .newer_than(DataType::State, since)
            .and_then(|snapshot| snapshot.get::<State>().map(State::flight))
    }

    fn transition(&self, epoch: u64, from: FlightStage, to: FlightStage) -> FlightResult<()> {
        let mut stage = self.stage.lock();
        if self.emergency_epoch.load(Ordering::Acquire) != epoch {
            return Err(FlightError::Interrupted { stage: from });
        }
        if *stage != from {
            return Err(FlightError::InvalidStage {
                stage: *stage,
                operation: to.name(),
            });
        }
        info!(from = %from, to = %to, "flight stage");
        *stage = to;
        Ok(())
    }

    fn check_running(&self, epoch: u64, during: FlightStage) -> FlightResult<()> {
        if self.emergency_epoch.load(Ordering::Acquire) != epoch {
            return Err(FlightError::Interrupted { stage: during });
        }
        self.ensure_connected(during)
    }

    fn ensure_connected(&self, during: FlightStage) -> FlightResult<()> {
        match &self.liveness {
            Some(liveness) if !liveness.is_connected() => {
                error!(stage = %during, "connection lost, assuming emergency state");
                *self.stage.lock() = FlightStage::EmergencyStopped;
                Err(FlightError::ConnectionLost { stage: during })
            }
            _ => Ok(()),
        }
    }

    /// Send from inside a stage loop, unless an emergency stop got there
    /// first. On failure the motors are stopped.
    fn send(
        &self,
        epoch: u64,
        during: FlightStage,
        op: impl FnOnce(&CommandChannel) -> crate::error::Result<()>,
    ) -> FlightResult<()> {
        let result = {
            let _gate = self.send_gate.lock();
            if self.emergency_epoch.load(Ordering::Acquire) != epoch {
                return Err(FlightError::Interrupted { stage: during });
            }
            op(self.commands.as_ref())
        };
        let Err(err) = result else {
            return Ok(());
        };
        if err.is_connection_lost() {
            return Err(self.link_failure(err, during));
        }
        warn!(%err, stage = %during, "send failed, stopping motors");
        self.stop_motors();
        if let Err(transition_err) = self.transition(epoch, during, FlightStage::Aborted) {
            warn!(%transition_err, stage = %during, "could not mark stage aborted");
        }
        Err(FlightError::Link(err))
    }

    fn link_failure(&self, err: LinkError, during: FlightStage) -> FlightError {
        if err.is_connection_lost() {
            error!(%err, stage = %during, "connection lost, assuming emergency state");
            *self.stage.lock() = FlightStage::EmergencyStopped;
            FlightError::ConnectionLost { stage: during }
        } else {
            FlightError::Link(err)
        }
    }

    /// Best-effort stop: flight event plus neutral sticks.
    fn stop_motors(&self) {
        if let Err(err) = self.commands.send_flight_event(FlightEvent::Stop) {
            error!(%err, "failed to send stop");
        }
        if let Err(err) = self.commands.send_control(0, 0, 0, 0) {
            error!(%err, "failed to send neutral control");
        }
    }

    fn abort(&self, epoch: u64, during: FlightStage, started: Instant) -> FlightError {
        let elapsed = started.elapsed();
        warn!(stage = %during, ?elapsed, "stage not confirmed, aborting");
        self.stop_motors();
        if let Err(err) = self.transition(epoch, during, FlightStage::Aborted) {
            return err;
        }
        FlightError::StageTimeout {
            stage: during,
            elapsed,
        }
    }

    fn force_stop(&self, epoch: u64, started: Instant) -> FlightError {
        let elapsed = started.elapsed();
        warn!(?elapsed, "landing not confirmed, forcing motor stop");
        self.stop_motors();
        if let Err(err) = self.transition(epoch, FlightStage::Landing, FlightStage::EmergencyStopped)
        {
            return err;
        }
        FlightError::StageTimeout {
            stage: FlightStage::Landing,
            elapsed,
        }
    }

    fn landed(&self, epoch: u64, started: Instant) -> FlightResult<()> {
        self.transition(epoch, FlightStage::Landing, FlightStage::Ground)?;
        info!(elapsed = ?started.elapsed(), "landed");
        Ok(())
    }
}

/// Background thread running [`FlightController::safety_check`] while the
/// caller is not sending controls.
pub struct Watchdog {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn spawn(
        flight: Arc<FlightController>,
        interval: Duration,
    ) -> crate::error::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("codrone-watchdog".to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    if let Err(err) = flight.safety_check() {
                        warn!(%err, "watchdog safety check failed");
                    }
                    thread::sleep(interval);
                }
            })
            .map_err(|source| LinkError::Spawn {
                name: "codrone-watchdog",
                source,
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use codrone_frame::{FrameConfig, FrameDecoder, FrameWriter, Route};
    use codrone_packet::{
        Command, CommandType, Control, Decoded, ErrorFlags, PacketRegistry, Payload,
        PayloadKind, Request, StateFaults,
    };

    use super::*;
    use crate::ack::AckTracker;
    use crate::command::CommandSink;

    /// A drone that answers inside `write`: commands change its flight mode
    /// and State/Error requests publish straight into the cache.
    #[derive(Clone)]
    struct SimDrone {
        state: Arc<Mutex<SimState>>,
        cache: Arc<StatusCache>,
    }

    struct SimState {
        decoder: FrameDecoder,
        battery: u8,
        faults: StateFaults,
        /// `None` never gets airborne.
        airborne_after: Option<Duration>,
        /// False stays in the takeoff climb instead of reporting steady flight.
        reports_flight: bool,
        /// Keeps flying this long after the landing event before descending.
        descend_after: Duration,
        /// `None` descends forever.
        land_after: Option<Duration>,
        takeoff_at: Option<Instant>,
        landing_at: Option<Instant>,
        stopped: bool,
        received: Vec<Payload>,
        bytes: usize,
    }

    impl SimState {
        fn mode(&self) -> ModeFlight {
            if self.stopped {
                return ModeFlight::Stop;
            }
            if let Some(at) = self.landing_at {
                let elapsed = at.elapsed();
                if elapsed >= self.descend_after {
                    return match self.land_after {
                        Some(after) if elapsed >= self.descend_after + after => ModeFlight::Ready,
                        _ => ModeFlight::Landing,
                    };
                }
            }
            match (self.takeoff_at, self.airborne_after) {
                (Some(at), Some(after)) if at.elapsed() >= after => {
                    if self.reports_flight {
                        ModeFlight::Flight
                    } else {
                        ModeFlight::TakeOff
                    }
                }
                _ => ModeFlight::Ready,
            }
        }
    }

    impl SimDrone {
        fn new(cache: Arc<StatusCache>, battery: u8, airborne_after: Option<Duration>) -> Self {
            Self {
                state: Arc::new(Mutex::new(SimState {
                    decoder: FrameDecoder::default(),
                    battery,
                    faults: StateFaults::empty(),
                    airborne_after,
                    reports_flight: true,
                    descend_after: Duration::ZERO,
                    land_after: Some(Duration::from_millis(100)),
                    takeoff_at: None,
                    landing_at: None,
                    stopped: false,
                    received: Vec::new(),
                    bytes: 0,
                })),
                cache,
            }
        }

        fn bytes(&self) -> usize {
            self.state.lock().bytes
        }

        fn received(&self) -> Vec<Payload> {
            self.state.lock().received.clone()
        }

        fn last_command(&self) -> Option<Command> {
            self.received()
                .iter()
                .rev()
                .find_map(|payload| payload.get::<Command>().copied())
        }

        fn handle(&self, state: &mut SimState, payload: Payload) {
            state.received.push(payload);
            match payload {
                Payload::Command(command)
                    if command.command_type == CommandType::FlightEvent as u8 =>
                {
                    match command.option {
                        o if o == FlightEvent::TakeOff as u8 => {
                            if state.takeoff_at.is_none() || state.mode().is_grounded() {
                                state.takeoff_at = Some(Instant::now());
                                state.landing_at = None;
                                state.stopped = false;
                            }
                        }
                        o if o == FlightEvent::Landing as u8 => {
                            if state.landing_at.is_none() {
                                state.landing_at = Some(Instant::now());
                            }
                        }
                        o if o == FlightEvent::Stop as u8 => {
                            state.stopped = true;
                            state.takeoff_at = None;
                            state.landing_at = None;
                        }
                        _ => {}
                    }
                }
                Payload::Request(Request { data_type }) if data_type == DataType::State.wire_byte() => {
                    let reply = State {
                        mode_system: codrone_packet::ModeSystem::Running.as_byte(),
                        mode_flight: state.mode().as_byte(),
                        battery: state.battery,
                        ..State::default()
                    };
                    self.cache.put(reply.into_payload(), Route::default());
                }
                Payload::Request(Request { data_type }) if data_type == DataType::Error.wire_byte() => {
                    let reply = ErrorFlags {
                        state: state.faults,
                        ..ErrorFlags::default()
                    };
                    self.cache.put(reply.into_payload(), Route::default());
                }
                _ => {}
            }
        }
    }

    impl Write for SimDrone {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut state = self.state.lock();
            state.bytes += buf.len();
            state.decoder.feed(buf);
            let registry = PacketRegistry::new();
            while let Some(frame) = state.decoder.next_frame() {
                if let Ok(Decoded::Packet(payload)) = registry.decode(&frame) {
                    self.handle(&mut state, payload);
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn fast_config() -> FlightConfig {
        FlightConfig {
            poll_interval: Duration::from_millis(10),
            takeoff_timeout: Duration::from_secs(2),
            confirm_timeout: Duration::from_secs(1),
            landing_timeout: Duration::from_secs(1),
            ..FlightConfig::default()
        }
    }

    fn rig(
        battery: u8,
        airborne_after: Option<Duration>,
        config: FlightConfig,
    ) -> (Arc<FlightController>, SimDrone, Arc<StatusCache>) {
        let cache = Arc::new(StatusCache::new());
        let sim = SimDrone::new(Arc::clone(&cache), battery, airborne_after);
        let sink: CommandSink = Box::new(sim.clone());
        let commands = Arc::new(CommandChannel::new(
            FrameWriter::with_config(sink, FrameConfig::default()),
            Arc::new(AckTracker::new()),
            Duration::from_millis(50),
            1,
        ));
        // what the drone reported before the session started
        cache.put(
            State {
                mode_flight: ModeFlight::Ready.as_byte(),
                battery,
                ..State::default()
            }
            .into_payload(),
            Route::default(),
        );
        let flight = Arc::new(FlightController::new(commands, Arc::clone(&cache), config));
        (flight, sim, cache)
    }

    fn put_faults(cache: &StatusCache, sim: &SimDrone, faults: StateFaults) {
        sim.state.lock().faults = faults;
        cache.put(
            ErrorFlags {
                state: faults,
                ..ErrorFlags::default()
            }
            .into_payload(),
            Route::default(),
        );
    }

    fn is_stop(command: Option<Command>) -> bool {
        command == Some(Command::flight_event(FlightEvent::Stop))
    }

    #[test]
    fn nominal_takeoff_reaches_flight() {
        let (flight, sim, _cache) = rig(85, Some(Duration::from_millis(300)), fast_config());

        let report = flight.takeoff().unwrap();

        assert_eq!(flight.stage(), FlightStage::Flight);
        assert_eq!(report.battery, Some(85));
        assert_eq!(report.battery_level, BatteryLevel::Nominal);
        assert!(report.airborne_after >= Duration::from_millis(300));
        assert!(report.confirmed_after < Duration::from_secs(2));
        assert!(sim
            .received()
            .contains(&Command::flight_event(FlightEvent::TakeOff).into_payload()));
    }

    #[test]
    fn critical_fault_blocks_takeoff_without_sending() {
        let (flight, sim, cache) = rig(10, Some(Duration::ZERO), fast_config());
        put_faults(&cache, &sim, StateFaults::LOW_BATTERY);

        let err = flight.takeoff().unwrap_err();

        assert!(matches!(err, FlightError::CriticalFault(f) if f == StateFaults::LOW_BATTERY));
        assert!(err.is_safety_block());
        assert_eq!(sim.bytes(), 0);
        assert_eq!(flight.stage(), FlightStage::Ground);
    }

    #[test]
    fn critical_battery_blocks_takeoff_without_sending() {
        let (flight, sim, _cache) = rig(12, Some(Duration::ZERO), fast_config());

        let err = flight.takeoff().unwrap_err();

        assert!(matches!(
            err,
            FlightError::LowBattery {
                battery: 12,
                threshold: 15
            }
        ));
        assert_eq!(sim.bytes(), 0);
    }

    #[test]
    fn risky_battery_warns_and_proceeds() {
        let (flight, _sim, _cache) = rig(40, Some(Duration::from_millis(50)), fast_config());

        let report = flight.takeoff().unwrap();
        assert_eq!(report.battery_level, BatteryLevel::Risky);
        assert_eq!(flight.stage(), FlightStage::Flight);
    }

    #[test]
    fn stage_timeout_aborts_and_stops() {
        let config = FlightConfig {
            takeoff_timeout: Duration::from_millis(200),
            ..fast_config()
        };
        let poll = config.poll_interval;
        let (flight, sim, _cache) = rig(85, None, config);

        let started = Instant::now();
        let err = flight.takeoff().unwrap_err();
        let took = started.elapsed();

        match err {
            FlightError::StageTimeout { stage, elapsed } => {
                assert_eq!(stage, FlightStage::TakeoffStabilizing);
                assert!(elapsed >= Duration::from_millis(200));
            }
            other => panic!("unexpected {other:?}"),
        }
        // timeout plus one poll, with slack for a loaded machine
        assert!(took < Duration::from_millis(200) + poll + Duration::from_millis(150));
        assert_eq!(flight.stage(), FlightStage::Aborted);
        assert!(is_stop(sim.last_command()));
        assert_eq!(
            sim.received().last(),
            Some(&Control::default().into_payload())
        );
    }

    #[test]
    fn confirm_window_timeout_aborts_and_stops() {
        let config = FlightConfig {
            confirm_timeout: Duration::from_millis(200),
            ..fast_config()
        };
        let (flight, sim, _cache) = rig(85, Some(Duration::ZERO), config);
        sim.state.lock().reports_flight = false;

        let err = flight.takeoff().unwrap_err();

        match err {
            FlightError::StageTimeout { stage, elapsed } => {
                assert_eq!(stage, FlightStage::TakeoffConfirmed);
                assert!(elapsed >= Duration::from_millis(200));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(flight.stage(), FlightStage::Aborted);
        assert!(is_stop(sim.last_command()));
        assert_eq!(
            sim.received().last(),
            Some(&Control::default().into_payload())
        );
    }

    #[test]
    fn fault_during_confirmation_aborts_and_stops() {
        let (flight, sim, cache) = rig(85, Some(Duration::ZERO), fast_config());
        sim.state.lock().reports_flight = false;

        let pending = {
            let flight = Arc::clone(&flight);
            thread::spawn(move || flight.takeoff())
        };
        let deadline = Instant::now() + Duration::from_secs(2);
        while flight.stage() != FlightStage::TakeoffConfirmed && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(flight.stage(), FlightStage::TakeoffConfirmed);
        put_faults(&cache, &sim, StateFaults::ATTITUDE_NOT_STABLE);

        let result = pending.join().unwrap();
        assert!(matches!(
            result,
            Err(FlightError::CriticalFault(f)) if f == StateFaults::ATTITUDE_NOT_STABLE
        ));
        assert_eq!(flight.stage(), FlightStage::Aborted);
        assert!(is_stop(sim.last_command()));
    }

    #[test]
    fn aborted_allows_new_takeoff() {
        let config = FlightConfig {
            takeoff_timeout: Duration::from_millis(50),
            ..fast_config()
        };
        let (flight, sim, _cache) = rig(85, None, config);
        assert!(flight.takeoff().unwrap_err().is_timeout());

        sim.state.lock().airborne_after = Some(Duration::ZERO);
        flight.takeoff().unwrap();
        assert_eq!(flight.stage(), FlightStage::Flight);
    }

    #[test]
    fn emergency_stop_interrupts_pending_takeoff() {
        let config = FlightConfig {
            takeoff_timeout: Duration::from_secs(10),
            ..fast_config()
        };
        let (flight, sim, _cache) = rig(85, None, config);

        let pending = {
            let flight = Arc::clone(&flight);
            thread::spawn(move || {
                let started = Instant::now();
                (flight.takeoff(), started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(100));
        flight.emergency_stop().unwrap();

        let (result, took) = pending.join().unwrap();
        assert!(matches!(
            result,
            Err(FlightError::Interrupted {
                stage: FlightStage::TakeoffStabilizing
            })
        ));
        assert!(took < Duration::from_secs(1));
        assert_eq!(flight.stage(), FlightStage::EmergencyStopped);
        assert!(sim
            .received()
            .contains(&Command::flight_event(FlightEvent::Stop).into_payload()));
    }

    #[test]
    fn takeoff_never_follows_emergency_stop_on_the_wire() {
        let config = FlightConfig {
            poll_interval: Duration::ZERO,
            takeoff_timeout: Duration::from_secs(10),
            ..fast_config()
        };
        let stop = Command::flight_event(FlightEvent::Stop).into_payload();
        let takeoff = Command::flight_event(FlightEvent::TakeOff).into_payload();

        for trial in 0..200u64 {
            let (flight, sim, _cache) = rig(85, None, config.clone());
            let pending = {
                let flight = Arc::clone(&flight);
                thread::spawn(move || flight.takeoff())
            };
            let deadline = Instant::now() + Duration::from_secs(2);
            while flight.stage() == FlightStage::Ground && Instant::now() < deadline {
                thread::yield_now();
            }
            // land the stop at varying points of the send loop
            thread::sleep(Duration::from_micros(trial % 20 * 25));
            flight.emergency_stop().unwrap();

            let result = pending.join().unwrap();
            assert!(
                matches!(result, Err(FlightError::Interrupted { .. })),
                "trial {trial}: {result:?}"
            );
            assert_eq!(flight.stage(), FlightStage::EmergencyStopped);

            let received = sim.received();
            let first_stop = received
                .iter()
                .position(|payload| *payload == stop)
                .expect("stop should be sent");
            assert!(
                !received[first_stop..].contains(&takeoff),
                "trial {trial}: takeoff sent after stop"
            );
        }
    }

    #[test]
    fn emergency_stop_from_ground_is_accepted() {
        let (flight, sim, _cache) = rig(85, None, fast_config());
        flight.emergency_stop().unwrap();
        assert_eq!(flight.stage(), FlightStage::EmergencyStopped);
        assert!(sim
            .received()
            .contains(&Command::flight_event(FlightEvent::Stop).into_payload()));
    }

    #[test]
    fn land_returns_to_ground() {
        let (flight, sim, _cache) = rig(85, Some(Duration::ZERO), fast_config());
        flight.takeoff().unwrap();

        flight.land().unwrap();

        assert_eq!(flight.stage(), FlightStage::Ground);
        assert!(sim
            .received()
            .contains(&Command::flight_event(FlightEvent::Landing).into_payload()));
    }

    #[test]
    fn landing_timeout_forces_stop() {
        let config = FlightConfig {
            landing_timeout: Duration::from_millis(100),
            ..fast_config()
        };
        let (flight, sim, _cache) = rig(85, Some(Duration::ZERO), config);
        flight.takeoff().unwrap();
        sim.state.lock().land_after = None;

        let err = flight.land().unwrap_err();

        assert!(matches!(
            err,
            FlightError::StageTimeout {
                stage: FlightStage::Landing,
                ..
            }
        ));
        assert_eq!(flight.stage(), FlightStage::EmergencyStopped);
        assert!(is_stop(sim.last_command()));
    }

    #[test]
    fn landing_timeout_bounds_both_phases() {
        let config = FlightConfig {
            landing_timeout: Duration::from_millis(200),
            ..fast_config()
        };
        let poll = config.poll_interval;
        let (flight, sim, _cache) = rig(85, Some(Duration::ZERO), config);
        flight.takeoff().unwrap();
        {
            let mut state = sim.state.lock();
            state.descend_after = Duration::from_millis(180);
            state.land_after = None;
        }

        let started = Instant::now();
        let err = flight.land().unwrap_err();
        let took = started.elapsed();

        assert!(matches!(
            err,
            FlightError::StageTimeout {
                stage: FlightStage::Landing,
                ..
            }
        ));
        assert_eq!(sim.state.lock().mode(), ModeFlight::Stop);
        assert!(took < Duration::from_millis(200) + poll + Duration::from_millis(100));
        assert_eq!(flight.stage(), FlightStage::EmergencyStopped);
        assert!(is_stop(sim.last_command()));
    }

    #[test]
    fn new_fault_in_flight_triggers_landing() {
        let (flight, sim, cache) = rig(85, Some(Duration::ZERO), fast_config());
        flight.takeoff().unwrap();
        flight.control(10, 0, 0, 0).unwrap();

        put_faults(&cache, &sim, StateFaults::ATTITUDE_NOT_STABLE);
        let err = flight.control(10, 0, 0, 0).unwrap_err();

        assert!(matches!(err, FlightError::CriticalFault(f) if f == StateFaults::ATTITUDE_NOT_STABLE));
        assert_eq!(flight.stage(), FlightStage::Ground);
        assert!(sim
            .received()
            .contains(&Command::flight_event(FlightEvent::Landing).into_payload()));
    }

    #[test]
    fn hover_sends_neutral_controls() {
        let (flight, sim, _cache) = rig(85, Some(Duration::ZERO), fast_config());
        flight.takeoff().unwrap();
        let before = sim.received().len();

        flight.hover(Duration::from_millis(50)).unwrap();

        let controls = sim.received()[before..]
            .iter()
            .filter(|payload| payload.get::<Control>() == Some(&Control::default()))
            .count();
        assert!(controls >= 2);
    }

    #[test]
    fn invalid_stage_transitions() {
        let (flight, _sim, _cache) = rig(85, Some(Duration::ZERO), fast_config());
        assert!(flight.land().is_ok());
        assert!(matches!(
            flight.hover(Duration::from_millis(10)),
            Err(FlightError::InvalidStage {
                stage: FlightStage::Ground,
                ..
            })
        ));

        flight.takeoff().unwrap();
        assert!(matches!(
            flight.takeoff(),
            Err(FlightError::InvalidStage {
                stage: FlightStage::Flight,
                ..
            })
        ));

        flight.emergency_stop().unwrap();
        assert!(matches!(
            flight.land(),
            Err(FlightError::InvalidStage {
                stage: FlightStage::EmergencyStopped,
                ..
            })
        ));
    }

    #[test]
    fn watchdog_lands_on_fault() {
        let (flight, sim, cache) = rig(85, Some(Duration::ZERO), fast_config());
        flight.takeoff().unwrap();
        let mut watchdog = Watchdog::spawn(Arc::clone(&flight), Duration::from_millis(10)).unwrap();

        put_faults(&cache, &sim, StateFaults::PROPELLER_VIBRATION);
        let deadline = Instant::now() + Duration::from_secs(2);
        while flight.stage() != FlightStage::Ground && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        watchdog.stop();

        assert_eq!(flight.stage(), FlightStage::Ground);
    }

    #[cfg(unix)]
    #[test]
    fn lost_connection_means_emergency() {
        use std::os::unix::net::UnixStream;

        use codrone_frame::FrameReader;

        use crate::receiver::Receiver;

        let (host, device) = UnixStream::pair().unwrap();
        host.set_read_timeout(Some(Duration::from_millis(10))).unwrap();
        let receiver = Receiver::spawn(
            FrameReader::new(host),
            PacketRegistry::new(),
            Arc::new(StatusCache::new()),
            Arc::new(AckTracker::new()),
        )
        .unwrap();

        let cache = Arc::new(StatusCache::new());
        let sink: CommandSink = Box::new(io::sink());
        let commands = Arc::new(CommandChannel::new(
            FrameWriter::new(sink),
            Arc::new(AckTracker::new()),
            Duration::from_millis(10),
            1,
        ));
        let flight = FlightController::new(commands, cache, fast_config())
            .with_liveness(receiver.liveness());

        drop(device);
        let deadline = Instant::now() + Duration::from_secs(2);
        while receiver.is_connected() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert!(matches!(
            flight.takeoff(),
            Err(FlightError::ConnectionLost { .. })
        ));
        assert_eq!(flight.stage(), FlightStage::EmergencyStopped);
    }
}
