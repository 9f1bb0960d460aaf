//! `tokio_util::codec` adapter for async transports.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig};
use crate::decoder::DecoderStats;
use crate::error::FrameError;

/// Frame codec for `FramedRead`/`FramedWrite`.
///
/// Recoverable errors (bad checksum, oversized length) are counted and
/// skipped, matching the blocking [`crate::FrameReader`].
#[derive(Debug, Default)]
pub struct FrameCodec {
    config: FrameConfig,
    stats: DecoderStats,
}

impl FrameCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            stats: DecoderStats::default(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match decode_frame(src, self.config.max_payload_size) {
                Ok(Some(frame)) => {
                    self.stats.frames += 1;
                    return Ok(Some(frame));
                }
                Ok(None) => return Ok(None),
                Err(FrameError::ChecksumMismatch { .. }) => {
                    self.stats.checksum_failures += 1;
                    warn!("dropping frame with bad checksum");
                }
                Err(FrameError::PayloadTooLarge { size, max }) => {
                    self.stats.oversized += 1;
                    warn!(size, max, "dropping frame with oversized length");
                }
                Err(other) => return Err(other),
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.payload.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_frame(item.data_type, item.route, &item.payload, dst)
    }
}
