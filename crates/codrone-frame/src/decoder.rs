use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::codec::{decode_frame, Frame, FrameConfig, CRC_SIZE, HEADER_SIZE};
use crate::error::FrameError;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Counters describing what the decoder has seen on the stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames: u64,
    pub checksum_failures: u64,
    pub oversized: u64,
    /// Bytes discarded while hunting for a start marker.
    pub bytes_skipped: u64,
    /// Partial frames abandoned because the rest never arrived.
    pub stale_resets: u64,
}

impl DecoderStats {
    /// Frames rejected for any reason.
    pub fn rejected(&self) -> u64 {
        self.checksum_failures + self.oversized + self.stale_resets
    }
}

/// Accumulate-and-retry stream decoder.
///
/// Bytes are fed in whatever chunks the transport delivers. Complete frames
/// come out in order; corrupted frames are counted and skipped. Feeding a
/// stream one byte at a time yields the same frames as feeding it at once.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_payload: usize,
    stale_after: Option<Duration>,
    partial_since: Option<Instant>,
    stats: DecoderStats,
}

impl FrameDecoder {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload: config.max_payload_size,
            stale_after: config.stale_after,
            partial_since: None,
            stats: DecoderStats::default(),
        }
    }

    /// Append received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.feed_at(bytes, Instant::now());
    }

    pub(crate) fn feed_at(&mut self, bytes: &[u8], now: Instant) {
        self.expire_stale(now);
        self.buf.extend_from_slice(bytes);
        if self.partial_since.is_none() && !self.buf.is_empty() {
            self.partial_since = Some(now);
        }
    }

    /// Next complete frame, or `None` when more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let before = self.buf.len();
            match decode_frame(&mut self.buf, self.max_payload) {
                Ok(Some(frame)) => {
                    let skipped = before - self.buf.len() - frame.wire_size();
                    self.stats.bytes_skipped += skipped as u64;
                    self.stats.frames += 1;
                    self.partial_since = (!self.buf.is_empty()).then(Instant::now);
                    return Some(frame);
                }
                Ok(None) => {
                    self.stats.bytes_skipped += (before - self.buf.len()) as u64;
                    if self.buf.is_empty() {
                        self.partial_since = None;
                    }
                    return None;
                }
                Err(err) => {
                    // decode_frame dropped the marker byte; everything before it was garbage.
                    self.stats.bytes_skipped += (before - self.buf.len() - 1) as u64;
                    match err {
                        FrameError::ChecksumMismatch { expected, actual } => {
                            self.stats.checksum_failures += 1;
                            warn!(
                                expected = format_args!("{expected:#06x}"),
                                actual = format_args!("{actual:#06x}"),
                                "dropping frame with bad checksum"
                            );
                        }
                        FrameError::PayloadTooLarge { size, max } => {
                            self.stats.oversized += 1;
                            warn!(size, max, "dropping frame with oversized length");
                        }
                        other => debug!(error = %other, "unexpected decode error"),
                    }
                }
            }
        }
    }

    /// Every complete frame currently buffered.
    pub fn decode_all(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.next_frame()).collect()
    }

    /// Drop a partial frame that has waited longer than the stale timeout.
    ///
    /// Only the start marker is dropped; the decoder rescans the rest, so a
    /// valid frame hiding behind a corrupted length byte is still found.
    fn expire_stale(&mut self, now: Instant) {
        let (Some(limit), Some(since)) = (self.stale_after, self.partial_since) else {
            return;
        };
        if self.buf.is_empty() || now.saturating_duration_since(since) <= limit {
            return;
        }
        debug!(
            buffered = self.buf.len(),
            needed = self.expected_len(),
            "abandoning stale partial frame"
        );
        self.buf.advance(1);
        self.stats.stale_resets += 1;
        self.partial_since = Some(now);
    }

    fn expected_len(&self) -> Option<usize> {
        (self.buf.len() >= HEADER_SIZE).then(|| HEADER_SIZE + self.buf[3] as usize + CRC_SIZE)
    }

    /// Bytes held waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Discard buffered bytes, e.g. after reconnecting.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.partial_since = None;
    }

    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.max_payload = max_payload_size;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(&FrameConfig::default())
    }
}
