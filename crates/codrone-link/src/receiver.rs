//! The reader thread: stream → frames → payloads → cache.

use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use codrone_frame::{DecoderStats, FrameError, FrameReader};
use codrone_packet::{Decoded, PacketRegistry, Payload};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::ack::AckTracker;
use crate::cache::StatusCache;
use crate::error::{LinkError, Result};

const THREAD_NAME: &str = "codrone-receiver";

/// Counters for everything the receiver has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Frames that passed the checksum.
    pub frames: u64,
    /// Payloads stored in the cache.
    pub packets: u64,
    pub acks: u64,
    /// Frames with a data type that has no schema.
    pub unknown: u64,
    /// Frames whose payload did not fit their schema.
    pub malformed: u64,
    pub checksum_failures: u64,
    pub oversized: u64,
    pub bytes_skipped: u64,
    pub stale_resets: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    packets: AtomicU64,
    acks: AtomicU64,
    unknown: AtomicU64,
    malformed: AtomicU64,
}

#[derive(Debug)]
struct Shared {
    stop: AtomicBool,
    connected: AtomicBool,
    counters: Counters,
    decoder: Mutex<DecoderStats>,
    last_error: Mutex<Option<String>>,
}

/// Handle to the receiver thread. Dropping it stops the thread.
pub struct Receiver {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Receiver {
    /// Start reading frames from `reader` on a dedicated thread.
    ///
    /// The reader's stream must have a read timeout, otherwise
    /// [`Receiver::stop`] waits for the next byte to arrive.
    pub fn spawn<R>(
        mut reader: FrameReader<R>,
        registry: PacketRegistry,
        cache: Arc<StatusCache>,
        acks: Arc<AckTracker>,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let shared = Arc::new(Shared {
            stop: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            counters: Counters::default(),
            decoder: Mutex::new(DecoderStats::default()),
            last_error: Mutex::new(None),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                run(&mut reader, &registry, &cache, &acks, &thread_shared);
                thread_shared.connected.store(false, Ordering::Release);
                acks.close();
            })
            .map_err(|source| LinkError::Spawn {
                name: THREAD_NAME,
                source,
            })?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// False once the stream has failed or closed, or after [`Receiver::stop`].
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Shared liveness flag for components that must notice a dead link.
    pub(crate) fn liveness(&self) -> Liveness {
        Liveness(Arc::clone(&self.shared))
    }

    /// Why the receiver stopped, if it stopped on an error.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    pub fn stats(&self) -> ReceiverStats {
        let counters = &self.shared.counters;
        let decoder = *self.shared.decoder.lock();
        ReceiverStats {
            frames: counters.frames.load(Ordering::Relaxed),
            packets: counters.packets.load(Ordering::Relaxed),
            acks: counters.acks.load(Ordering::Relaxed),
            unknown: counters.unknown.load(Ordering::Relaxed),
            malformed: counters.malformed.load(Ordering::Relaxed),
            checksum_failures: decoder.checksum_failures,
            oversized: decoder.oversized,
            bytes_skipped: decoder.bytes_skipped,
            stale_resets: decoder.stale_resets,
        }
    }

    /// Ask the thread to stop and wait for it.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("receiver thread panicked");
            }
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read-only view of whether the receiver is still running.
#[derive(Clone)]
pub struct Liveness(Arc<Shared>);

impl Liveness {
    pub fn is_connected(&self) -> bool {
        self.0.connected.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Liveness").field(&self.is_connected()).finish()
    }
}

fn run<R: Read>(
    reader: &mut FrameReader<R>,
    registry: &PacketRegistry,
    cache: &StatusCache,
    acks: &AckTracker,
    shared: &Shared,
) {
    debug!("receiver started");
    while !shared.stop.load(Ordering::Acquire) {
        let result = reader.read_frame();
        *shared.decoder.lock() = reader.stats();

        let frame = match result {
            Ok(frame) => frame,
            Err(err) if err.is_timeout() => continue,
            Err(FrameError::ConnectionClosed) => {
                info!("link closed by peer");
                *shared.last_error.lock() = Some("closed by peer".to_string());
                return;
            }
            Err(err) => {
                error!(%err, "link read failed, stopping receiver");
                *shared.last_error.lock() = Some(err.to_string());
                return;
            }
        };

        shared.counters.frames.fetch_add(1, Ordering::Relaxed);
        match registry.decode(&frame) {
            Ok(Decoded::Packet(Payload::Ack(ack))) => {
                trace!(data_type = ack.data_type, "ack");
                shared.counters.acks.fetch_add(1, Ordering::Relaxed);
                acks.acknowledge(ack.data_type);
            }
            Ok(Decoded::Packet(payload)) => {
                trace!(data_type = %payload.data_type(), from = frame.route.from, "packet");
                shared.counters.packets.fetch_add(1, Ordering::Relaxed);
                cache.put(payload, frame.route);
            }
            Ok(Decoded::Unknown(_)) => {
                shared.counters.unknown.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!(%err, data_type = frame.data_type, "dropping malformed payload");
                shared.counters.malformed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    debug!("receiver stopped");
}
