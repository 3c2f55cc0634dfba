//! Transport error types

use thiserror::Error;

/// hidapi messages that mean the node exists but cannot be opened
const PERMISSION_MARKERS: &[&str] = &["Permission denied", "EPERM", "EACCES"];

#[derive(Error, Debug)]
pub enum TransportError {
    /// No raw HID interface matches the requested keyboard
    #[error("Keyboard not found: {0}")]
    DeviceNotFound(String),

    /// Write/read did not complete within the retry budget
    #[error("No answer from the keyboard after {attempts} attempts")]
    Failed { attempts: u32 },

    #[error("Payload of {len} bytes exceeds the {max}-byte report")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0} (is a udev rule for usage page 0xFF60 installed?)")]
    HidPermissionDenied(String),
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if PERMISSION_MARKERS.iter().any(|m| msg.contains(m)) {
            Self::HidPermissionDenied(msg)
        } else {
            Self::HidError(msg)
        }
    }
}
