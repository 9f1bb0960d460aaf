use std::time::Duration;

/// Line speed of the controller's USB serial bridge.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How long a serial read waits for the first byte before returning.
///
/// Reads are semi-blocking so the receiver loop can observe its stop flag.
pub const DEFAULT_SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial line configuration. Framing is always 8N1 without flow control.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// Rounded up to whole deciseconds by the termios layer.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_SERIAL_READ_TIMEOUT,
        }
    }
}
