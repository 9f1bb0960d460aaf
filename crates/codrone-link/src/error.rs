use std::io::ErrorKind;
use std::time::Duration;

use codrone_frame::FrameError;
use codrone_packet::{DataType, StateFaults};

use crate::flight::FlightStage;

/// Errors that can occur on a drone link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] codrone_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Payload could not be packed.
    #[error("packet error: {0}")]
    Packet(#[from] codrone_packet::PacketError),

    /// The receiver stopped because the byte stream failed or closed.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The device never acknowledged a packet.
    #[error("{data_type} not acknowledged after {attempts} attempts")]
    NotAcknowledged { data_type: DataType, attempts: u32 },

    /// The drone did not answer the connect-time status requests.
    #[error("drone did not answer {missing:?} within {timeout:?}")]
    NotVerified {
        missing: Vec<DataType>,
        timeout: Duration,
    },

    /// A request was not answered in time.
    #[error("no {data_type} received within {timeout:?}")]
    Timeout {
        data_type: DataType,
        timeout: Duration,
    },

    /// Failed to start a background thread.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

impl LinkError {
    /// Whether the link itself is gone, as opposed to one operation failing.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::ConnectionLost(_) => true,
            Self::Frame(err) => match err {
                FrameError::ConnectionClosed => true,
                FrameError::Io(io) => !err.is_timeout() && io.kind() != ErrorKind::Interrupted,
                _ => false,
            },
            Self::Transport(codrone_transport::TransportError::Io(_)) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors returned by the flight state machine.
#[derive(Debug, thiserror::Error)]
pub enum FlightError {
    /// A critical state fault is set; nothing was sent.
    #[error("critical fault blocks flight: {0:?}")]
    CriticalFault(StateFaults),

    /// Battery at or below the critical threshold; nothing was sent.
    #[error("battery {battery}% is at or below the critical threshold of {threshold}%")]
    LowBattery { battery: u8, threshold: u8 },

    /// A stage did not confirm in time. A stop was sent.
    #[error("{stage} not confirmed after {elapsed:?}")]
    StageTimeout {
        stage: FlightStage,
        elapsed: Duration,
    },

    /// An emergency stop cancelled the operation.
    #[error("{stage} interrupted by emergency stop")]
    Interrupted { stage: FlightStage },

    /// The link dropped. The drone is assumed to be in an emergency state.
    #[error("connection lost during {stage}")]
    ConnectionLost { stage: FlightStage },

    /// The operation is not valid from the current stage.
    #[error("cannot {operation} while {stage}")]
    InvalidStage {
        stage: FlightStage,
        operation: &'static str,
    },

    /// Sending a command failed.
    #[error("link error: {0}")]
    Link(#[from] LinkError),
}

impl FlightError {
    /// The drone was kept on the ground by a safety check.
    pub fn is_safety_block(&self) -> bool {
        matches!(self, Self::CriticalFault(_) | Self::LowBattery { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::StageTimeout { .. })
    }
}

pub type FlightResult<T> = std::result::Result<T, FlightError>;
