//! Latest decoded payload per data type.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use codrone_frame::Route;
use codrone_packet::{DataType, Payload, PayloadKind};
use dashmap::DashMap;

/// One cached payload and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub payload: Payload,
    pub received_at: Instant,
    /// Cache-wide arrival counter. Larger means newer, across all types.
    pub sequence: u64,
    pub route: Route,
}

impl Snapshot {
    pub fn get<T: PayloadKind>(&self) -> Option<&T> {
        self.payload.get::<T>()
    }
}

/// Thread-safe "latest value per data type" store.
///
/// Entries are replaced whole, so a reader sees either no snapshot or a
/// complete one. There is no ordering between data types; compare
/// [`Snapshot::sequence`] when freshness matters.
#[derive(Debug, Default)]
pub struct StatusCache {
    entries: DashMap<DataType, Arc<Snapshot>>,
    sequence: AtomicU64,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a payload, replacing any earlier one of the same type.
    ///
    /// On a live session the receiver thread is the only writer.
    pub fn put(&self, payload: Payload, route: Route) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = Arc::new(Snapshot {
            payload,
            received_at: Instant::now(),
            sequence,
            route,
        });
        self.entries.insert(payload.data_type(), snapshot);
        sequence
    }

    pub fn get(&self, data_type: DataType) -> Option<Arc<Snapshot>> {
        self.entries
            .get(&data_type)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Copy out the latest payload of type `T`.
    pub fn latest<T: PayloadKind + Copy>(&self) -> Option<T> {
        self.get(T::DATA_TYPE)
            .and_then(|snapshot| snapshot.get::<T>().copied())
    }

    /// Snapshot of `data_type` if it arrived after `sequence`.
    pub fn newer_than(&self, data_type: DataType, sequence: u64) -> Option<Arc<Snapshot>> {
        self.get(data_type)
            .filter(|snapshot| snapshot.sequence > sequence)
    }

    /// Sequence number of the most recent put, 0 if none.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Data types currently cached, sorted.
    pub fn data_types(&self) -> Vec<DataType> {
        let mut types: Vec<DataType> = self.entries.iter().map(|entry| *entry.key()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
