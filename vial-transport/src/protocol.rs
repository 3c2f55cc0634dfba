//! Protocol constants and utilities for VIA/Vial keyboard communication

use crate::error::TransportError;

/// Size of one HID report (without report ID)
pub const REPORT_SIZE: usize = 32;

/// Report ID prepended for hidapi writes
pub const REPORT_ID: u8 = 0x00;

/// VIA commands (first byte of every report)
pub mod cmd {
    pub const GET_PROTOCOL_VERSION: u8 = 0x01;
    pub const GET_KEYBOARD_VALUE: u8 = 0x02;
    pub const SET_KEYBOARD_VALUE: u8 = 0x03;
    pub const GET_KEYCODE: u8 = 0x04;
    pub const SET_KEYCODE: u8 = 0x05;
    pub const LIGHTING_SET_VALUE: u8 = 0x07;
    pub const LIGHTING_GET_VALUE: u8 = 0x08;
    pub const LIGHTING_SAVE: u8 = 0x09;
    pub const MACRO_GET_COUNT: u8 = 0x0C;
    pub const MACRO_GET_BUFFER_SIZE: u8 = 0x0D;
    pub const MACRO_GET_BUFFER: u8 = 0x0E;
    pub const MACRO_SET_BUFFER: u8 = 0x0F;
    pub const GET_LAYER_COUNT: u8 = 0x11;
    pub const KEYMAP_GET_BUFFER: u8 = 0x12;
    pub const KEYMAP_SET_BUFFER: u8 = 0x13;
    /// Prefix for all Vial sub-commands
    pub const VIAL_PREFIX: u8 = 0xFE;

    /// Get human-readable name for command byte
    pub fn name(cmd: u8) -> &'static str {
        match cmd {
            GET_PROTOCOL_VERSION => "GET_PROTOCOL_VERSION",
            GET_KEYBOARD_VALUE => "GET_KEYBOARD_VALUE",
            SET_KEYBOARD_VALUE => "SET_KEYBOARD_VALUE",
            GET_KEYCODE => "GET_KEYCODE",
            SET_KEYCODE => "SET_KEYCODE",
            LIGHTING_SET_VALUE => "LIGHTING_SET_VALUE",
            LIGHTING_GET_VALUE => "LIGHTING_GET_VALUE",
            LIGHTING_SAVE => "LIGHTING_SAVE",
            MACRO_GET_COUNT => "MACRO_GET_COUNT",
            MACRO_GET_BUFFER_SIZE => "MACRO_GET_BUFFER_SIZE",
            MACRO_GET_BUFFER => "MACRO_GET_BUFFER",
            MACRO_SET_BUFFER => "MACRO_SET_BUFFER",
            GET_LAYER_COUNT => "GET_LAYER_COUNT",
            KEYMAP_GET_BUFFER => "KEYMAP_GET_BUFFER",
            KEYMAP_SET_BUFFER => "KEYMAP_SET_BUFFER",
            VIAL_PREFIX => "VIAL",
            _ => "UNKNOWN",
        }
    }
}

/// Keyboard value ids for GET/SET_KEYBOARD_VALUE
pub mod keyboard_value {
    pub const UPTIME: u8 = 0x01;
    pub const LAYOUT_OPTIONS: u8 = 0x02;
    pub const SWITCH_MATRIX_STATE: u8 = 0x03;
}

/// Vial sub-commands (second byte after [`cmd::VIAL_PREFIX`])
pub mod vial {
    pub const GET_KEYBOARD_ID: u8 = 0x00;
    pub const GET_SIZE: u8 = 0x01;
    pub const GET_DEFINITION: u8 = 0x02;
    pub const GET_ENCODER: u8 = 0x03;
    pub const SET_ENCODER: u8 = 0x04;
    pub const GET_UNLOCK_STATUS: u8 = 0x05;
    pub const UNLOCK_START: u8 = 0x06;
    pub const UNLOCK_POLL: u8 = 0x07;
    pub const LOCK: u8 = 0x08;
    pub const QMK_SETTINGS_QUERY: u8 = 0x09;
    pub const QMK_SETTINGS_GET: u8 = 0x0A;
    pub const QMK_SETTINGS_SET: u8 = 0x0B;
    pub const QMK_SETTINGS_RESET: u8 = 0x0C;
    pub const DYNAMIC_ENTRY_OP: u8 = 0x0D;

    /// Get human-readable name for a Vial sub-command
    pub fn name(sub: u8) -> &'static str {
        match sub {
            GET_KEYBOARD_ID => "GET_KEYBOARD_ID",
            GET_SIZE => "GET_SIZE",
            GET_DEFINITION => "GET_DEFINITION",
            GET_ENCODER => "GET_ENCODER",
            SET_ENCODER => "SET_ENCODER",
            GET_UNLOCK_STATUS => "GET_UNLOCK_STATUS",
            UNLOCK_START => "UNLOCK_START",
            UNLOCK_POLL => "UNLOCK_POLL",
            LOCK => "LOCK",
            QMK_SETTINGS_QUERY => "QMK_SETTINGS_QUERY",
            QMK_SETTINGS_GET => "QMK_SETTINGS_GET",
            QMK_SETTINGS_SET => "QMK_SETTINGS_SET",
            QMK_SETTINGS_RESET => "QMK_SETTINGS_RESET",
            DYNAMIC_ENTRY_OP => "DYNAMIC_ENTRY_OP",
            _ => "UNKNOWN",
        }
    }
}

/// Sub-operations of [`vial::DYNAMIC_ENTRY_OP`]
pub mod dynamic {
    pub const GET_NUMBER_OF_ENTRIES: u8 = 0x00;
    pub const TAP_DANCE_GET: u8 = 0x01;
    pub const TAP_DANCE_SET: u8 = 0x02;
    pub const COMBO_GET: u8 = 0x03;
    pub const COMBO_SET: u8 = 0x04;
    pub const KEY_OVERRIDE_GET: u8 = 0x05;
    pub const KEY_OVERRIDE_SET: u8 = 0x06;
    pub const ALT_REPEAT_KEY_GET: u8 = 0x07;
    pub const ALT_REPEAT_KEY_SET: u8 = 0x08;
}

/// Timing constants
pub mod timing {
    /// Default attempts per request
    pub const DEFAULT_RETRIES: u32 = 20;
    /// Per-read timeout
    pub const READ_TIMEOUT_MS: u64 = 500;
    /// Back-off between attempts
    pub const RETRY_DELAY_MS: u64 = 500;
}

/// HID interface identification
pub mod device {
    /// Raw HID usage page used by VIA/Vial firmware
    pub const USAGE_PAGE: u16 = 0xFF60;
    /// Raw HID usage
    pub const USAGE: u16 = 0x61;
    /// Serial-number marker of Vial firmware
    pub const VIAL_SERIAL_MAGIC: &str = "vial:f64c2b3c";
}

/// Build a HID output report: report ID followed by the zero-padded payload.
pub fn build_report(payload: &[u8]) -> Result<[u8; REPORT_SIZE + 1], TransportError> {
    if payload.len() > REPORT_SIZE {
        return Err(TransportError::PayloadTooLarge {
            len: payload.len(),
            max: REPORT_SIZE,
        });
    }
    let mut buf = [0u8; REPORT_SIZE + 1];
    buf[0] = REPORT_ID;
    buf[1..1 + payload.len()].copy_from_slice(payload);
    Ok(buf)
}

/// Human-readable name of a request, resolving Vial sub-commands
pub fn request_name(payload: &[u8]) -> &'static str {
    match payload {
        [cmd::VIAL_PREFIX, sub, ..] => vial::name(*sub),
        [first, ..] => cmd::name(*first),
        [] => "EMPTY",
    }
}
