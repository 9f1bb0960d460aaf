use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_16_XMODEM};

use crate::device::DeviceType;
use crate::error::{FrameError, Result};

/// Start marker (2) + data type (1) + length (1) + source (1) + destination (1).
pub const HEADER_SIZE: usize = 6;

/// Trailing CRC-16 size.
pub const CRC_SIZE: usize = 2;

/// Start marker preceding every frame.
pub const MAGIC: [u8; 2] = [0x0A, 0x55];

/// The length field is one byte.
pub const DEFAULT_MAX_PAYLOAD: usize = u8::MAX as usize;

/// A partially received frame older than this is abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(600);

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-16/XMODEM as used in the frame trailer.
pub fn checksum(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// Source and destination device bytes of a frame.
///
/// Stored raw so frames from unrecognized devices still decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    pub from: u8,
    pub to: u8,
}

impl Route {
    /// Host to drone; the default for outgoing commands.
    pub const BASE_TO_DRONE: Route = Route::new(DeviceType::Base, DeviceType::Drone);
    /// Host to the controller itself.
    pub const BASE_TO_CONTROLLER: Route = Route::new(DeviceType::Base, DeviceType::Controller);

    pub const fn new(from: DeviceType, to: DeviceType) -> Self {
        Self {
            from: from as u8,
            to: to as u8,
        }
    }

    pub fn source(&self) -> Option<DeviceType> {
        DeviceType::from_byte(self.from)
    }

    pub fn destination(&self) -> Option<DeviceType> {
        DeviceType::from_byte(self.to)
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::BASE_TO_DRONE
    }
}

/// A checked frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw data type byte. Interpreted by the packet registry.
    pub data_type: u8,
    pub route: Route,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame addressed from the host to the drone.
    pub fn new(data_type: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            data_type,
            route: Route::default(),
            payload: payload.into(),
        }
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    /// The total wire size of this frame (header + payload + checksum).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CRC_SIZE
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────┬─────┬──────┬──────┬──────────────┬──────────┐
/// │ 0x0A 0x55 │ type │ len │ from │ to   │ payload      │ CRC16 LE │
/// │ (2B)      │ (1B) │(1B) │ (1B) │ (1B) │ (len bytes)  │ (2B)     │
/// └───────────┴──────┴─────┴──────┴──────┴──────────────┴──────────┘
/// ```
/// The checksum covers `type` through the end of the payload.
pub fn encode_frame(data_type: u8, route: Route, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = u8::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: DEFAULT_MAX_PAYLOAD,
    })?;

    dst.reserve(HEADER_SIZE + payload.len() + CRC_SIZE);
    let start = dst.len();
    dst.put_slice(&MAGIC);
    dst.put_u8(data_type);
    dst.put_u8(len);
    dst.put_u8(route.from);
    dst.put_u8(route.to);
    dst.put_slice(payload);
    let crc = checksum(&dst[start + MAGIC.len()..]);
    dst.put_u16_le(crc);
    Ok(())
}

/// Decode one frame from the front of a buffer.
///
/// Bytes before the first start marker are discarded. Returns `Ok(None)` if
/// the buffer doesn't contain a complete frame yet. On a bad checksum or an
/// oversized length, one byte is dropped so the next call rescans from just
/// past the rejected marker, and a recoverable error is returned.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(start) = src.windows(MAGIC.len()).position(|w| w == MAGIC) else {
        // A trailing first marker byte may begin the next frame.
        let keep = usize::from(src.last() == Some(&MAGIC[0]));
        src.advance(src.len() - keep);
        return Ok(None);
    };
    src.advance(start);

    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let payload_len = src[3] as usize;
    if payload_len > max_payload {
        src.advance(1);
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let body_end = HEADER_SIZE + payload_len;
    if src.len() < body_end + CRC_SIZE {
        return Ok(None); // Need more data
    }

    let expected = checksum(&src[MAGIC.len()..body_end]);
    let actual = u16::from_le_bytes([src[body_end], src[body_end + 1]]);
    if expected != actual {
        src.advance(1);
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    let data_type = src[2];
    let route = Route {
        from: src[4],
        to: src[5],
    };
    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    src.advance(CRC_SIZE);

    Ok(Some(Frame {
        data_type,
        route,
        payload,
    }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 255.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
    /// Abandon a partial frame after this long without completing it.
    pub stale_after: Option<Duration>,
    /// Default addressing for frames sent with [`crate::FrameWriter::send`].
    pub route: Route,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
            stale_after: Some(DEFAULT_STALE_AFTER),
            route: Route::default(),
        }
    }
}
