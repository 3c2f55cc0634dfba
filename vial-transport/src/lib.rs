//! Transport abstraction layer for Vial/VIA keyboard communication
//!
//! Every exchange with the firmware is one 32-byte output report followed by
//! one 32-byte input report on the raw HID interface. This crate provides:
//!
//! - [`HidDevice`]: raw single-report write/read, implemented by hidapi
//!   ([`HidWiredDevice`]) and by the scriptable [`mock::MockDevice`]
//! - [`FlowControlTransport`]: padding, bounded retries and the
//!   [`TransactionGate`] shared with background pollers
//! - [`HidDiscovery`]: enumeration of Vial (and optionally VIA-only) keyboards
//! - [`PresenceMonitor`]: hot-plug polling thread publishing [`DiscoveryEvent`]s

pub mod error;
pub mod flow_control;
pub mod mock;
pub mod protocol;
pub mod types;

mod discovery;
mod hid_wired;
mod presence;

pub use discovery::{DeviceDiscovery, HidDiscovery};
pub use error::TransportError;
pub use flow_control::{FlowControlTransport, TransactionGate, TransactionGuard};
pub use hid_wired::HidWiredDevice;
pub use presence::PresenceMonitor;
pub use types::{
    DiscoveredDevice, DiscoveryEvent, FirmwareKind, RetryPolicy, TransportDeviceInfo,
};

/// Raw report I/O - all device backends implement this
///
/// Implementations do no retrying or padding; `report` already carries the
/// report ID and `buf` receives the input report without one.
pub trait HidDevice: Send {
    /// Write one output report, returning the number of bytes written
    fn write_report(&self, report: &[u8]) -> Result<usize, TransportError>;

    /// Read one input report, returning 0 on timeout
    fn read_report(&self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError>;

    /// Get device information
    fn device_info(&self) -> &TransportDeviceInfo;

    /// Check if the device is still attached
    fn is_connected(&self) -> bool;
}
