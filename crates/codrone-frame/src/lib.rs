//! Frame codec for the CoDrone controller protocol.
//!
//! Every message on the wire is framed with:
//! - a 2-byte start marker (`0x0A 0x55`) for stream synchronization
//! - a 4-byte header: data type, payload length, source and destination device
//! - the payload (at most 255 bytes)
//! - a little-endian CRC-16/XMODEM over header and payload
//!
//! Corrupted or truncated frames are dropped and the decoder resynchronizes
//! on the next start marker. Callers only ever see complete, checked frames.

pub mod codec;
pub mod decoder;
pub mod device;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    checksum, decode_frame, encode_frame, Frame, FrameConfig, Route, CRC_SIZE,
    DEFAULT_MAX_PAYLOAD, DEFAULT_STALE_AFTER, HEADER_SIZE, MAGIC,
};
pub use decoder::{DecoderStats, FrameDecoder};
pub use device::DeviceType;
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
