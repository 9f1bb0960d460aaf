use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::config::SerialConfig;
use crate::error::{Result, TransportError};

/// A raw-mode serial device configured for 8N1 without flow control.
///
/// Reads wait at most `read_timeout` for data. A read that times out with
/// nothing received reports [`ErrorKind::TimedOut`] instead of `Ok(0)`, so
/// callers can tell an idle line from a closed one.
pub struct SerialPort {
    file: File,
    path: PathBuf,
}

impl SerialPort {
    /// Open and configure the device at `path`.
    pub fn open(path: impl AsRef<Path>, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let speed = baud_to_speed(config.baud_rate)?;

        // O_NONBLOCK keeps open() from waiting on carrier detect; it is cleared below.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|source| TransportError::Open {
                path: path.clone(),
                source,
            })?;

        let port = Self { file, path };
        port.configure(speed, config.read_timeout)
            .map_err(|source| TransportError::Configure {
                path: port.path.clone(),
                source,
            })?;

        debug!(path = ?port.path, baud = config.baud_rate, "serial port open");
        Ok(port)
    }

    fn configure(&self, speed: libc::speed_t, read_timeout: Duration) -> std::io::Result<()> {
        let fd = self.file.as_raw_fd();

        // SAFETY: `fd` is an open descriptor owned by `self.file`.
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(std::io::Error::last_os_error());
        }
        // SAFETY: as above; only the O_NONBLOCK bit is changed.
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
            return Err(std::io::Error::last_os_error());
        }

        let mut tio = self.termios()?;
        // SAFETY: `tio` is a valid termios structure obtained from tcgetattr.
        unsafe {
            libc::cfmakeraw(&mut tio);
            if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0
            {
                return Err(std::io::Error::last_os_error());
            }
        }
        tio.c_cflag |= libc::CLOCAL | libc::CREAD | libc::CS8;
        tio.c_cflag &= !(libc::CSTOPB | libc::PARENB);
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            tio.c_cflag &= !libc::CRTSCTS;
        }
        tio.c_cc[libc::VMIN] = 0;
        tio.c_cc[libc::VTIME] = deciseconds(read_timeout);
        self.apply(&tio)?;

        // SAFETY: `fd` is open; discards bytes queued before we configured the line.
        if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    fn termios(&self) -> std::io::Result<libc::termios> {
        // SAFETY: termios is plain old data; tcgetattr fully initializes it on success.
        let mut tio: libc::termios = unsafe { std::mem::zeroed() };
        // SAFETY: `tio` is a valid writable pointer and the descriptor is open.
        if unsafe { libc::tcgetattr(self.file.as_raw_fd(), &mut tio) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(tio)
    }

    fn apply(&self, tio: &libc::termios) -> std::io::Result<()> {
        // SAFETY: `tio` points to an initialized termios and the descriptor is open.
        if unsafe { libc::tcsetattr(self.file.as_raw_fd(), libc::TCSANOW, tio) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// Change how long reads wait for the first byte.
    ///
    /// `None` blocks until at least one byte arrives.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        let mut tio = self.termios()?;
        match timeout {
            Some(timeout) => {
                tio.c_cc[libc::VMIN] = 0;
                tio.c_cc[libc::VTIME] = deciseconds(timeout);
            }
            None => {
                tio.c_cc[libc::VMIN] = 1;
                tio.c_cc[libc::VTIME] = 0;
            }
        }
        self.apply(&tio).map_err(Into::into)
    }

    /// Try to clone this port (duplicates the file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            file: self.file.try_clone()?,
            path: self.path.clone(),
        })
    }

    /// The device path this port was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.file.read(buf)? {
            0 => Err(std::io::Error::new(
                ErrorKind::TimedOut,
                "no data before serial read timeout",
            )),
            n => Ok(n),
        }
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // SAFETY: the descriptor is open; tcdrain blocks until output is transmitted.
        if unsafe { libc::tcdrain(self.file.as_raw_fd()) } != 0 {
            let err = std::io::Error::last_os_error();
            // Pseudo-terminals and sockets used in tests do not support tcdrain.
            if err.raw_os_error() != Some(libc::ENOTTY) {
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.path)
            .finish()
    }
}

fn deciseconds(timeout: Duration) -> libc::cc_t {
    let ds = timeout.as_millis().div_ceil(100).clamp(1, u8::MAX as u128);
    ds as libc::cc_t
}

fn baud_to_speed(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        other => return Err(TransportError::UnsupportedBaudRate(other)),
    };
    Ok(speed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deciseconds_round_up_and_clamp() {
        assert_eq!(deciseconds(Duration::from_millis(100)), 1);
        assert_eq!(deciseconds(Duration::from_millis(150)), 2);
        assert_eq!(deciseconds(Duration::ZERO), 1);
        assert_eq!(deciseconds(Duration::from_secs(60)), u8::MAX as libc::cc_t);
    }

    #[test]
    fn controller_baud_rate_is_supported() {
        assert_eq!(baud_to_speed(115_200).unwrap(), libc::B115200);
    }

    #[test]
    fn odd_baud_rate_rejected() {
        let err = baud_to_speed(12_345).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedBaudRate(12_345)));
    }

    #[test]
    fn open_missing_device_reports_path() {
        let path = std::env::temp_dir().join(format!("codrone-no-tty-{}", std::process::id()));
        let err = SerialPort::open(&path, &SerialConfig::default()).unwrap_err();
        match err {
            TransportError::Open { path: reported, source } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), ErrorKind::NotFound);
            }
            other => panic!("expected open error, got {other:?}"),
        }
    }

    #[test]
    fn regular_file_is_not_a_tty() {
        let path = std::env::temp_dir().join(format!("codrone-not-tty-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let err = SerialPort::open(&path, &SerialConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::Configure { .. }));

        let _ = std::fs::remove_file(&path);
    }
}
