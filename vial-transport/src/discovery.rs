//! Device discovery for Vial/VIA keyboards

use hidapi::HidApi;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::hid_wired::HidWiredDevice;
use crate::protocol::device;
use crate::types::{DiscoveredDevice, FirmwareKind, TransportDeviceInfo};
use crate::HidDevice;

/// Device discovery abstraction
pub trait DeviceDiscovery: Send + Sync {
    /// List currently available devices
    fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError>;

    /// Open a specific device
    fn open_device(&self, device: &DiscoveredDevice) -> Result<Box<dyn HidDevice>, TransportError>;
}

/// HID discovery of raw-HID (usage page 0xFF60) keyboard interfaces
#[derive(Debug, Clone, Default)]
pub struct HidDiscovery {
    /// Also report keyboards running plain VIA firmware
    include_via_only: bool,
}

impl HidDiscovery {
    /// Create a discovery instance listing Vial keyboards only
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a discovery instance that also lists VIA-only keyboards
    pub fn with_via_only(include_via_only: bool) -> Self {
        Self { include_via_only }
    }

    /// Check if this is the raw HID interface
    fn is_raw_hid_interface(device_info: &hidapi::DeviceInfo) -> bool {
        device_info.usage_page() == device::USAGE_PAGE && device_info.usage() == device::USAGE
    }

    /// Classify firmware from the serial number
    fn firmware_kind(serial: Option<&str>) -> FirmwareKind {
        match serial {
            Some(s) if s.contains(device::VIAL_SERIAL_MAGIC) => FirmwareKind::Vial,
            _ => FirmwareKind::ViaOnly,
        }
    }

    fn describe(device_info: &hidapi::DeviceInfo) -> TransportDeviceInfo {
        TransportDeviceInfo {
            vid: device_info.vendor_id(),
            pid: device_info.product_id(),
            kind: Self::firmware_kind(device_info.serial_number()),
            device_path: device_info.path().to_string_lossy().to_string(),
            manufacturer: device_info.manufacturer_string().map(|s| s.to_string()),
            product_name: device_info.product_string().map(|s| s.to_string()),
        }
    }
}

impl DeviceDiscovery for HidDiscovery {
    fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let api = HidApi::new()?;
        let mut devices = Vec::new();

        for device_info in api.device_list() {
            if !Self::is_raw_hid_interface(device_info) {
                continue;
            }

            let info = Self::describe(device_info);
            if info.kind == FirmwareKind::ViaOnly && !self.include_via_only {
                debug!(
                    "Skipping VIA-only device {:04X}:{:04X} at {}",
                    info.vid, info.pid, info.device_path
                );
                continue;
            }

            debug!(
                "Found device: VID={:04X} PID={:04X} kind={:?} path={}",
                info.vid, info.pid, info.kind, info.device_path
            );
            devices.push(DiscoveredDevice { info });
        }

        info!("Found {} devices", devices.len());
        Ok(devices)
    }

    fn open_device(&self, device: &DiscoveredDevice) -> Result<Box<dyn HidDevice>, TransportError> {
        let api = HidApi::new()?;

        let raw_info = api
            .device_list()
            .find(|d| {
                Self::is_raw_hid_interface(d)
                    && d.path().to_string_lossy() == device.info.device_path
            })
            .ok_or_else(|| {
                TransportError::DeviceNotFound(format!(
                    "Raw HID interface for {:04X}:{:04X} at {}",
                    device.info.vid, device.info.pid, device.info.device_path
                ))
            })?;

        let hid = raw_info.open_device(&api)?;

        info!(
            "Opened {:?} keyboard {:04X}:{:04X}",
            device.info.kind, device.info.vid, device.info.pid
        );

        Ok(Box::new(HidWiredDevice::new(hid, device.info.clone())))
    }
}
