//! hidapi-backed raw HID device for USB-connected keyboards

use hidapi::HidDevice as RawHidDevice;
use tracing::debug;

use crate::error::TransportError;
use crate::types::TransportDeviceInfo;
use crate::HidDevice;

/// Raw HID interface of a keyboard connected via USB cable
///
/// Reports are exchanged on the raw-HID interrupt endpoints (usage page
/// 0xFF60): output reports for requests, input reports for responses.
pub struct HidWiredDevice {
    device: RawHidDevice,
    info: TransportDeviceInfo,
}

impl HidWiredDevice {
    pub fn new(device: RawHidDevice, info: TransportDeviceInfo) -> Self {
        Self { device, info }
    }
}

impl HidDevice for HidWiredDevice {
    fn write_report(&self, report: &[u8]) -> Result<usize, TransportError> {
        Ok(self.device.write(report)?)
    }

    fn read_report(&self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        let timeout = i32::try_from(timeout_ms).unwrap_or(i32::MAX);
        Ok(self.device.read_timeout(buf, timeout)?)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        // Try to read a descriptor string to check connection
        self.device.get_product_string().is_ok()
    }
}

impl Drop for HidWiredDevice {
    fn drop(&mut self) {
        debug!("Closing HID device {}", self.info.device_path);
    }
}
