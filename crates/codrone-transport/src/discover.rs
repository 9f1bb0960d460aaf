//! Locate the controller's USB serial device.
//!
//! On Linux every tty that belongs to a USB interface has a sysfs entry whose
//! ancestor device carries `idVendor`/`idProduct`. Other platforms report no
//! ports; pass the device path explicitly there.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TransportError};

/// USB vendor ID reported by the controller (STMicroelectronics, 1155).
pub const CONTROLLER_VENDOR_ID: u16 = 0x0483;

/// A serial device found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Device node, e.g. `/dev/ttyACM0`.
    pub path: PathBuf,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub product: Option<String>,
}

impl PortInfo {
    /// Whether this port looks like the drone's controller.
    pub fn is_controller(&self) -> bool {
        self.vendor_id == Some(CONTROLLER_VENDOR_ID)
    }
}

/// List USB serial ports.
pub fn list_ports() -> Vec<PortInfo> {
    #[cfg(target_os = "linux")]
    {
        scan_sysfs(Path::new("/sys/class/tty"), Path::new("/dev"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

/// Find the first attached controller.
pub fn find_controller() -> Result<PortInfo> {
    list_ports()
        .into_iter()
        .find(PortInfo::is_controller)
        .ok_or(TransportError::NoControllerFound {
            vendor_id: CONTROLLER_VENDOR_ID,
        })
}

/// Scan a sysfs tty class directory. Split out so tests can point it at a fake tree.
pub(crate) fn scan_sysfs(class_dir: &Path, dev_dir: &Path) -> Vec<PortInfo> {
    let Ok(entries) = std::fs::read_dir(class_dir) else {
        return Vec::new();
    };

    let mut ports: Vec<PortInfo> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let device = entry.path().join("device");
            let usb = usb_ancestor(&device)?;
            let port = PortInfo {
                path: dev_dir.join(&name),
                vendor_id: read_hex(&usb.join("idVendor")),
                product_id: read_hex(&usb.join("idProduct")),
                product: read_trimmed(&usb.join("product")),
            };
            debug!(path = ?port.path, vendor = ?port.vendor_id, "usb serial port");
            Some(port)
        })
        .collect();

    ports.sort_by(|a, b| a.path.cmp(&b.path));
    ports
}

/// Walk up from a tty's `device` link to the USB device that owns `idVendor`.
fn usb_ancestor(device: &Path) -> Option<PathBuf> {
    let mut dir = std::fs::canonicalize(device).ok()?;
    for _ in 0..4 {
        if dir.join("idVendor").is_file() {
            return Some(dir);
        }
        dir = dir.parent()?.to_path_buf();
    }
    None
}

fn read_trimmed(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn read_hex(path: &Path) -> Option<u16> {
    u16::from_str_radix(&read_trimmed(path)?, 16).ok()
}
