//! A scripted drone on the far end of a Unix socket.
//!
//! It decodes whatever the host sends, answers requests from its current
//! state and moves through flight modes on takeoff, landing and stop events.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use codrone::frame::{encode_frame, DeviceType, FrameDecoder, Route};
use codrone::packet::{
    Ack, Attitude, CommandType, DataType, Decoded, ErrorFlags, FlightEvent, Information,
    ModeFlight, ModeSystem, PacketRegistry, Payload, PayloadKind, State, StateFaults, Version,
};

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub battery: u8,
    pub faults: StateFaults,
    /// `None` never leaves the ground.
    pub airborne_after: Option<Duration>,
    pub land_after: Duration,
    /// Prefix every reply with line noise.
    pub noisy: bool,
    /// Ignore requests entirely.
    pub silent: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            battery: 85,
            faults: StateFaults::empty(),
            airborne_after: Some(Duration::from_millis(300)),
            land_after: Duration::from_millis(200),
            noisy: false,
            silent: false,
        }
    }
}

struct SimState {
    config: SimConfig,
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
            return if at.elapsed() >= self.config.land_after {
                ModeFlight::Ready
            } else {
                ModeFlight::Landing
            };
        }
        match (self.takeoff_at, self.config.airborne_after) {
            (Some(at), Some(after)) if at.elapsed() >= after => ModeFlight::Flight,
            (Some(_), _) => ModeFlight::Start,
            _ => ModeFlight::Ready,
        }
    }

    fn flight_event(&mut self, option: u8) {
        if option == FlightEvent::TakeOff as u8 {
            if self.takeoff_at.is_none() || self.mode().is_grounded() {
                self.takeoff_at = Some(Instant::now());
                self.landing_at = None;
                self.stopped = false;
            }
        } else if option == FlightEvent::Landing as u8 {
            if self.takeoff_at.is_some() && self.landing_at.is_none() {
                self.landing_at = Some(Instant::now());
            }
        } else if option == FlightEvent::Stop as u8 {
            self.stopped = true;
            self.takeoff_at = None;
            self.landing_at = None;
        }
    }

    /// What the drone sends back for one received payload.
    fn reply(&mut self, payload: Payload) -> Option<Payload> {
        self.received.push(payload);
        match payload {
            Payload::Command(command) => {
                if command.command_type == CommandType::FlightEvent as u8 {
                    self.flight_event(command.option);
                }
                Some(
                    Ack {
                        system_time: 0,
                        data_type: DataType::Command.wire_byte(),
                    }
                    .into_payload(),
                )
            }
            Payload::Request(request) if !self.config.silent => {
                self.answer(request.data_type)
            }
            _ => None,
        }
    }

    fn answer(&self, wire: u8) -> Option<Payload> {
        let payload = if wire == DataType::State.wire_byte() {
            State {
                mode_system: ModeSystem::Running.as_byte(),
                mode_flight: self.mode().as_byte(),
                battery: self.config.battery,
                ..State::default()
            }
            .into_payload()
        } else if wire == DataType::Error.wire_byte() {
            ErrorFlags {
                state: self.config.faults,
                ..ErrorFlags::default()
            }
            .into_payload()
        } else if wire == DataType::Information.wire_byte() {
            Information {
                model_number: 0x0009_1002,
                version: Version {
                    build: 7,
                    minor: 1,
                    major: 22,
                },
                year: 2023,
                month: 5,
                day: 2,
                ..Information::default()
            }
            .into_payload()
        } else if wire == DataType::Attitude.wire_byte() {
            Attitude {
                roll: 3,
                pitch: -4,
                yaw: 90,
            }
            .into_payload()
        } else {
            return None;
        };
        Some(payload)
    }
}

pub struct SimDrone {
    state: Arc<Mutex<SimState>>,
    handle: Option<JoinHandle<()>>,
}

impl SimDrone {
    /// Serve the drone end of an already connected pair.
    pub fn spawn(stream: UnixStream, config: SimConfig) -> Self {
        let state = new_state(config);
        let thread_state = Arc::clone(&state);
        let handle = thread::spawn(move || serve(stream, &thread_state));
        Self {
            state,
            handle: Some(handle),
        }
    }

    /// Accept one host on `path` and serve it.
    pub fn listen(path: &Path, config: SimConfig) -> Self {
        let listener = UnixListener::bind(path).expect("sim socket should bind");
        let state = new_state(config);
        let thread_state = Arc::clone(&state);
        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                serve(stream, &thread_state);
            }
        });
        Self {
            state,
            handle: Some(handle),
        }
    }

    pub fn received(&self) -> Vec<Payload> {
        self.state.lock().expect("sim state lock").received.clone()
    }

    pub fn bytes(&self) -> usize {
        self.state.lock().expect("sim state lock").bytes
    }

    pub fn mode(&self) -> ModeFlight {
        self.state.lock().expect("sim state lock").mode()
    }

    pub fn set_faults(&self, faults: StateFaults) {
        self.state.lock().expect("sim state lock").config.faults = faults;
    }

    pub fn flight_events(&self) -> Vec<u8> {
        self.received()
            .iter()
            .filter_map(|payload| match payload {
                Payload::Command(command)
                    if command.command_type == CommandType::FlightEvent as u8 =>
                {
                    Some(command.option)
                }
                _ => None,
            })
            .collect()
    }

    /// Wait for the host to hang up.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("sim thread should not panic");
        }
    }
}

fn new_state(config: SimConfig) -> Arc<Mutex<SimState>> {
    Arc::new(Mutex::new(SimState {
        config,
        takeoff_at: None,
        landing_at: None,
        stopped: false,
        received: Vec::new(),
        bytes: 0,
    }))
}

fn serve(stream: UnixStream, state: &Mutex<SimState>) {
    let mut reader = stream.try_clone().expect("sim stream should clone");
    let mut writer = stream;
    let registry = PacketRegistry::new();
    let mut decoder = FrameDecoder::default();
    let route = Route::new(DeviceType::Drone, DeviceType::Base);
    let mut buf = [0u8; 512];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.feed(&buf[..n]);

        let mut out = BytesMut::new();
        {
            let mut state = state.lock().expect("sim state lock");
            state.bytes += n;
            while let Some(frame) = decoder.next_frame() {
                let Ok(Decoded::Packet(payload)) = registry.decode(&frame) else {
                    continue;
                };
                let Some(reply) = state.reply(payload) else {
                    continue;
                };
                if state.config.noisy {
                    out.extend_from_slice(&[0xFF, 0x00, 0x55, 0x13]);
                }
                encode_frame(reply.data_type().wire_byte(), route, &reply.to_bytes(), &mut out)
                    .expect("reply should encode");
            }
        }
        if !out.is_empty() && writer.write_all(&out).is_err() {
            return;
        }
    }
}

pub fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/codrone-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}
