//! Vial/VIA keyboard protocol
//!
//! This crate implements everything above raw report transport:
//!
//! - [`keycode`]: 16-bit keycode table, serialization and expressions
//! - [`buffer`]: chunked transfer of keymap, macro and definition buffers
//! - [`dynamic`]: tap dance, combo, key override and alt-repeat-key records
//! - [`macros`]: the two macro wire dialects
//! - [`settings`]: QMK settings enumeration and values
//! - [`unlock`]: the hold-keys security challenge
//! - [`session`]: reload sequence and the in-memory device mirror

pub mod buffer;
pub mod definition;
pub mod dynamic;
pub mod error;
pub mod keycode;
pub mod keymap;
pub mod macros;
pub mod session;
pub mod settings;
pub mod unlock;

pub use definition::{KeyboardDefinition, LayoutLabel, LayoutOptions};
pub use dynamic::{AltRepeatKey, Combo, DynamicEntries, DynamicRecord, DynamicTable, KeyOverride, TapDance};
pub use error::{KeyboardError, KeycodeError, MacroError};
pub use keycode::{Keycode, KeycodeTable, KeycodeVersion};
pub use keymap::KeymapMirror;
pub use macros::{Macro, MacroAction, MacroDialect};
pub use session::{DeviceSession, LightingCollaborator, SessionState};
pub use settings::{QmkSettingsSchema, SettingKind, SettingLayout, SettingsSchema};
pub use unlock::{UnlockPoll, UnlockPolicy, UnlockStatus};

use std::sync::Arc;

use vial_transport::{DeviceDiscovery, DiscoveredDevice, FlowControlTransport, RetryPolicy};

/// List all connected keyboards
pub fn list_keyboards(discovery: &dyn DeviceDiscovery) -> Result<Vec<DiscoveredDevice>, KeyboardError> {
    Ok(discovery.list_devices()?)
}

/// Open a keyboard and wrap it in an unloaded session
pub fn open_session(
    discovery: &dyn DeviceDiscovery,
    device: &DiscoveredDevice,
    policy: RetryPolicy,
) -> Result<DeviceSession, KeyboardError> {
    let hid = discovery.open_device(device)?;
    let transport = Arc::new(FlowControlTransport::with_policy(hid, policy));
    Ok(DeviceSession::new(transport))
}
