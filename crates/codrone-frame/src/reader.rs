use std::io::{ErrorKind, Read};

use codrone_transport::LinkStream;

use crate::codec::{Frame, FrameConfig};
use crate::decoder::{DecoderStats, FrameDecoder};
use crate::error::{FrameError, Result};

/// Serial reads rarely return more than a few frames at a time.
const READ_CHUNK_SIZE: usize = 512;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads and resynchronization internally. Callers always get
/// complete frames with a verified checksum.
pub struct FrameReader<T> {
    inner: T,
    decoder: FrameDecoder,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(&config),
            config,
        }
    }

    /// Read the next complete frame (blocking up to the stream's read timeout).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A read
    /// timeout surfaces as an I/O error for which [`FrameError::is_timeout`]
    /// holds; buffered partial data is kept and the call can be retried.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.decoder.feed(&chunk[..read]);
        }
    }

    /// Decoder counters since this reader was created.
    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for a `LinkStream` and apply the read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: codrone_transport::TransportError) -> FrameError {
    match err {
        codrone_transport::TransportError::Io(io) => FrameError::Io(io),
        codrone_transport::TransportError::Open { source, .. }
        | codrone_transport::TransportError::Configure { source, .. }
        | codrone_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, Route, HEADER_SIZE};
    use crate::device::DeviceType;

    const TELEMETRY: Route = Route::new(DeviceType::Drone, DeviceType::Base);

    fn wire(frames: &[(u8, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (data_type, payload) in frames {
            encode_frame(*data_type, TELEMETRY, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(0x40, &[0x12; 8])])));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.data_type, 0x40);
        assert_eq!(frame.route, TELEMETRY);
        assert_eq!(frame.payload.as_ref(), &[0x12; 8]);
    }

    #[test]
    fn read_multiple_frames() {
        let bytes = wire(&[(0x40, b"one"), (0x41, b"two"), (0x42, b"three")]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!((f1.data_type, f1.payload.as_ref()), (0x40, b"one".as_ref()));
        assert_eq!((f2.data_type, f2.payload.as_ref()), (0x41, b"two".as_ref()));
        assert_eq!((f3.data_type, f3.payload.as_ref()), (0x42, b"three".as_ref()));
        assert_eq!(reader.stats().frames, 3);
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[(0x44, &[0x33; 18])]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.data_type, 0x44);
        assert_eq!(frame.payload.len(), 18);
    }

    #[test]
    fn skips_corrupted_frame_in_stream() {
        let mut bytes = wire(&[(0x40, &[1; 8])]);
        bytes[HEADER_SIZE] ^= 0xFF;
        bytes.extend(wire(&[(0x45, &[2; 12])]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.data_type, 0x45);
        assert_eq!(reader.stats().checksum_failures, 1);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let bytes = wire(&[(0x43, &[0; 16])]);
        let mut reader = FrameReader::new(Cursor::new(bytes[..HEADER_SIZE + 4].to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(0x04, &[0x40]).unwrap();
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.data_type, 0x04);
        assert_eq!(frame.route, Route::BASE_TO_DRONE);
        assert_eq!(frame.payload.as_ref(), &[0x40]);
    }

    #[test]
    fn timeout_keeps_partial_frame() {
        let bytes = wire(&[(0x40, &[5; 8])]);
        let reader = TimeoutBetweenHalves {
            halves: [bytes[..7].to_vec(), bytes[7..].to_vec()],
            step: 0,
        };
        let mut framed = FrameReader::new(reader);

        let err = framed.read_frame().unwrap_err();
        assert!(err.is_timeout());

        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.data_type, 0x40);
    }

    /// Delivers the first half, times out once, then delivers the rest.
    struct TimeoutBetweenHalves {
        halves: [Vec<u8>; 2],
        step: u8,
    }

    impl Read for TimeoutBetweenHalves {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.step += 1;
            let half = match self.step {
                1 => &self.halves[0],
                2 => return Err(std::io::Error::from(ErrorKind::TimedOut)),
                3 => &self.halves[1],
                _ => return Ok(0),
            };
            buf[..half.len()].copy_from_slice(half);
            Ok(half.len())
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: wire(&[(0x02, &[0, 0, 0, 0, 0x11])]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();

        assert_eq!(frame.data_type, 0x02);
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn applies_read_timeout_for_link_stream() {
        let (host, _drone) = std::os::unix::net::UnixStream::pair().unwrap();
        let cfg = FrameConfig {
            read_timeout: Some(Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let mut reader = FrameReader::with_config_link(LinkStream::from_unix(host), cfg).unwrap();
        let err = reader.read_frame().unwrap_err();
        assert!(err.is_timeout());
    }
}
