//! Device identity and retry policy types

use serde::{Deserialize, Serialize};

use crate::protocol::timing;

/// Which protocol a raw HID interface speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareKind {
    /// VIA plus the Vial extension (serial carries the Vial magic)
    Vial,
    ViaOnly,
}

/// Identity of one keyboard's raw HID interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDeviceInfo {
    pub vid: u16,
    pub pid: u16,
    pub kind: FirmwareKind,
    /// Opaque hidapi path; stable while the keyboard stays plugged in
    pub device_path: String,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
}

impl TransportDeviceInfo {
    /// "<manufacturer> <product>", the product alone, or VID:PID
    pub fn display_name(&self) -> String {
        match (&self.manufacturer, &self.product_name) {
            (Some(m), Some(p)) => format!("{m} {p}"),
            (None, Some(p)) => p.clone(),
            _ => format!("{:04x}:{:04x}", self.vid, self.pid),
        }
    }
}

/// Keyboard found by a scan, ready to be opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub info: TransportDeviceInfo,
}

/// Hot-plug notification from the presence monitor
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    DeviceAdded(DiscoveredDevice),
    /// Carries the last known identity of the unplugged keyboard
    DeviceRemoved(TransportDeviceInfo),
}

/// Retry budget layered on top of single report exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per request (write + read)
    pub retries: u32,
    /// Per-read timeout
    pub read_timeout_ms: u64,
    /// Sleep before every attempt but the first
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: timing::DEFAULT_RETRIES,
            read_timeout_ms: timing::READ_TIMEOUT_MS,
            retry_delay_ms: timing::RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Policy with no back-off, for tests and emulated devices
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            read_timeout_ms: 0,
            retry_delay_ms: 0,
        }
    }
}
