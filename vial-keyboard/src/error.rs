//! Keyboard interface error types

use thiserror::Error;
use vial_transport::TransportError;

/// Keycode text could not be turned into a number
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeycodeError {
    #[error("Unknown constant: {0}")]
    UnknownConstant(String),

    #[error("Invalid keycode expression: {0}")]
    InvalidKeycodeExpression(String),
}

/// Macro action cannot be encoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacroError {
    /// Action needs a newer macro dialect than the session negotiated
    #[error("{action} is not supported by macro dialect v{dialect}")]
    UnsupportedInDialect { action: String, dialect: u8 },

    #[error("Delay of {delay}ms exceeds the maximum of {max}ms")]
    DelayOutOfRange { delay: u32, max: u32 },

    /// A NUL byte would end the macro early in the stored set
    #[error("{action} would encode a NUL byte")]
    NulByte { action: String },
}

/// Errors from keyboard operations
#[derive(Error, Debug)]
pub enum KeyboardError {
    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// VIA or Vial protocol version outside the supported set
    #[error("Unsupported {which} protocol version {version}")]
    ProtocolVersionUnsupported { which: &'static str, version: i64 },

    /// Keyboard definition is unreadable or inconsistent with the matrix
    #[error("Malformed keyboard definition: {0}")]
    MalformedDefinition(String),

    /// Payload exceeds device-declared memory; rejected before any transfer
    #[error("{what} is {size} bytes, exceeding the device limit of {max} bytes")]
    BufferTooLarge {
        what: &'static str,
        size: usize,
        max: usize,
    },

    #[error(transparent)]
    Keycode(#[from] KeycodeError),

    #[error(transparent)]
    Macro(#[from] MacroError),

    /// Non-zero status byte in a device response
    #[error("{op} failed with device status {status}")]
    DeviceStatus { op: &'static str, status: u8 },

    /// Unlock poll budget ran out before the device reported unlocked
    #[error("Unlock was not completed")]
    UnlockAbandoned,

    /// Mirror accessed before a successful reload
    #[error("Device session is not loaded")]
    NotLoaded,

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Feature not supported by this device
    #[error("Feature not supported: {0}")]
    NotSupported(String),
}
