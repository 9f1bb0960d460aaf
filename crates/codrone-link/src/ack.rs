//! Matching device acknowledgements to sent packets.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// Result of waiting for an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked,
    TimedOut,
    /// The receiver stopped while waiting.
    Closed,
}

#[derive(Debug, Default)]
struct AckState {
    /// Expected wire bytes, and whether an ack arrived for each.
    pending: HashMap<u8, bool>,
    closed: bool,
}

/// Tracks expected acknowledgements keyed by wire data type.
///
/// Acks carry no correlation id, so at most one send per data type can be
/// awaited at a time.
#[derive(Debug, Default)]
pub struct AckTracker {
    state: Mutex<AckState>,
    arrived: Condvar,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in an ack for `data_type`, discarding any earlier one.
    pub fn expect(&self, data_type: u8) {
        self.state.lock().pending.insert(data_type, false);
    }

    /// Record an ack from the device. Unexpected acks are ignored.
    pub fn acknowledge(&self, data_type: u8) {
        let mut state = self.state.lock();
        match state.pending.get_mut(&data_type) {
            Some(acked) => {
                *acked = true;
                self.arrived.notify_all();
            }
            None => debug!(data_type, "ignoring unsolicited ack"),
        }
    }

    /// Block until the ack for `data_type` arrives or `timeout` passes.
    ///
    /// The expectation is consumed on `Acked`; it stays registered on
    /// `TimedOut` so a late ack still counts for a retry.
    pub fn wait(&self, data_type: u8, timeout: Duration) -> AckOutcome {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return AckOutcome::Closed;
            }
            if state.pending.get(&data_type) == Some(&true) {
                state.pending.remove(&data_type);
                return AckOutcome::Acked;
            }
            if self.arrived.wait_until(&mut state, deadline).timed_out() {
                if state.pending.get(&data_type) == Some(&true) {
                    state.pending.remove(&data_type);
                    return AckOutcome::Acked;
                }
                return AckOutcome::TimedOut;
            }
        }
    }

    pub fn cancel(&self, data_type: u8) {
        self.state.lock().pending.remove(&data_type);
    }

    /// Wake every waiter with [`AckOutcome::Closed`].
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.pending.clear();
        self.arrived.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
