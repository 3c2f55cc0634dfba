//! QMK settings over Vial
//!
//! The device enumerates which setting ids (qsids) it implements; each value
//! is an opaque little-endian byte string. Widths and bit meanings come from
//! a [`SettingsSchema`], a pure lookup supplied by the caller.

use std::collections::BTreeMap;

use tracing::{debug, warn};
use vial_transport::protocol::{cmd, vial, REPORT_SIZE};
use vial_transport::FlowControlTransport;

use crate::error::KeyboardError;

/// Cursor value terminating the qsid enumeration
const QSID_END: u16 = 0xFFFF;

/// Largest value a set request can carry (`FE 0B qsid_lo qsid_hi` header)
pub const MAX_SETTING_WIDTH: usize = REPORT_SIZE - 4;

/// How a setting's bytes are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// Unsigned little-endian integer
    Integer,
    /// Named bit flags packed into the value
    Flags(&'static [(&'static str, u8)]),
}

/// Static description of one qsid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingLayout {
    pub name: &'static str,
    pub width: usize,
    pub kind: SettingKind,
}

impl SettingLayout {
    /// Bit offset of a named flag
    pub fn bit(&self, flag: &str) -> Option<u8> {
        match self.kind {
            SettingKind::Flags(flags) => flags.iter().find(|(n, _)| *n == flag).map(|(_, b)| *b),
            SettingKind::Integer => None,
        }
    }
}

/// External mapping from qsid to value layout
pub trait SettingsSchema: Send + Sync {
    fn layout(&self, qsid: u16) -> Option<SettingLayout>;
}

const GRAVE_ESC_FLAGS: &[(&str, u8)] = &[
    ("alt_override", 0),
    ("ctrl_override", 1),
    ("gui_override", 2),
    ("shift_override", 3),
];

const AUTO_SHIFT_FLAGS: &[(&str, u8)] = &[
    ("enabled", 0),
    ("modifiers", 1),
    ("no_special", 2),
    ("no_numeric", 3),
    ("no_alpha", 4),
    ("repeat", 5),
    ("no_auto_repeat", 6),
];

const TAPPING_FLAGS: &[(&str, u8)] = &[
    ("permissive_hold", 0),
    ("ignore_mod_tap_interrupt", 1),
    ("tapping_force_hold", 2),
    ("retro_tapping", 3),
];

const MAGIC_FLAGS: &[(&str, u8)] = &[
    ("swap_control_capslock", 0),
    ("capslock_to_control", 1),
    ("swap_lalt_lgui", 2),
    ("swap_ralt_rgui", 3),
    ("no_gui", 4),
    ("swap_grave_esc", 5),
    ("swap_backslash_backspace", 6),
    ("host_nkro", 7),
];

/// Built-in schema of the standard QMK settings
#[derive(Debug, Clone, Copy, Default)]
pub struct QmkSettingsSchema;

impl SettingsSchema for QmkSettingsSchema {
    fn layout(&self, qsid: u16) -> Option<SettingLayout> {
        use SettingKind::{Flags, Integer};
        let (name, width, kind) = match qsid {
            1 => ("grave_esc", 1, Flags(GRAVE_ESC_FLAGS)),
            2 => ("combo_term", 2, Integer),
            3 => ("auto_shift", 1, Flags(AUTO_SHIFT_FLAGS)),
            4 => ("auto_shift_timeout", 2, Integer),
            5 => ("oneshot_tap_toggle", 1, Integer),
            6 => ("oneshot_timeout", 2, Integer),
            7 => ("tapping_term", 2, Integer),
            8 => ("tapping", 1, Flags(TAPPING_FLAGS)),
            9 => ("mousekey_delay", 2, Integer),
            10 => ("mousekey_interval", 2, Integer),
            11 => ("mousekey_move_delta", 2, Integer),
            12 => ("mousekey_max_speed", 2, Integer),
            13 => ("mousekey_time_to_max", 2, Integer),
            14 => ("mousekey_wheel_delay", 2, Integer),
            15 => ("mousekey_wheel_interval", 2, Integer),
            16 => ("mousekey_wheel_max_speed", 2, Integer),
            17 => ("mousekey_wheel_time_to_max", 2, Integer),
            18 => ("tap_code_delay", 2, Integer),
            19 => ("tap_hold_caps_delay", 2, Integer),
            20 => ("tapping_toggle", 1, Integer),
            21 => ("magic", 1, Flags(MAGIC_FLAGS)),
            22 => ("quick_tap_term", 2, Integer),
            _ => return None,
        };
        Some(SettingLayout { name, width, kind })
    }
}

/// Interpret a value as a little-endian integer
pub fn value_as_u32(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .enumerate()
        .fold(0, |acc, (i, b)| acc | (u32::from(*b) << (8 * i)))
}

/// Encode an integer into `width` little-endian bytes
pub fn u32_to_value(value: u32, width: usize) -> Vec<u8> {
    let mut bytes = value.to_le_bytes().to_vec();
    bytes.resize(width, 0);
    bytes
}

/// Read a flag bit
pub fn get_bit(bytes: &[u8], bit: u8) -> bool {
    bytes
        .get(usize::from(bit / 8))
        .is_some_and(|b| b & (1 << (bit % 8)) != 0)
}

/// Copy of `bytes` with one flag bit changed
pub fn with_bit(bytes: &[u8], bit: u8, on: bool) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let idx = usize::from(bit / 8);
    if out.len() <= idx {
        out.resize(idx + 1, 0);
    }
    if on {
        out[idx] |= 1 << (bit % 8);
    } else {
        out[idx] &= !(1 << (bit % 8));
    }
    out
}

fn check_status(op: &'static str, status: u8) -> Result<(), KeyboardError> {
    if status != 0 {
        return Err(KeyboardError::DeviceStatus { op, status });
    }
    Ok(())
}

/// Enumerate supported qsids
pub fn query_supported(transport: &FlowControlTransport) -> Result<Vec<u16>, KeyboardError> {
    let mut supported = Vec::new();
    let mut cursor: u16 = 0;

    loop {
        let start = cursor;
        let [lo, hi] = cursor.to_le_bytes();
        let resp = transport.send(&[cmd::VIAL_PREFIX, vial::QMK_SETTINGS_QUERY, lo, hi])?;
        let mut done = false;
        for pair in resp.chunks_exact(2) {
            let qsid = u16::from_le_bytes([pair[0], pair[1]]);
            if qsid == QSID_END {
                done = true;
                break;
            }
            cursor = cursor.max(qsid);
            if !supported.contains(&qsid) {
                supported.push(qsid);
            }
        }
        if done {
            break;
        }
        if cursor == start {
            break;
        }
    }

    supported.sort_unstable();
    debug!("Device supports {} settings", supported.len());
    Ok(supported)
}

/// Read one setting value of `width` bytes
pub fn get_setting(
    transport: &FlowControlTransport,
    qsid: u16,
    width: usize,
) -> Result<Vec<u8>, KeyboardError> {
    let width = width.min(REPORT_SIZE - 1);
    let [lo, hi] = qsid.to_le_bytes();
    let resp = transport.send(&[cmd::VIAL_PREFIX, vial::QMK_SETTINGS_GET, lo, hi])?;
    check_status("settings get", resp[0])?;
    Ok(resp[1..1 + width].to_vec())
}

/// Write one setting value
pub fn set_setting(
    transport: &FlowControlTransport,
    qsid: u16,
    value: &[u8],
) -> Result<(), KeyboardError> {
    if value.len() > MAX_SETTING_WIDTH {
        return Err(KeyboardError::BufferTooLarge {
            what: "setting value",
            size: value.len(),
            max: MAX_SETTING_WIDTH,
        });
    }
    let [lo, hi] = qsid.to_le_bytes();
    let mut req = vec![cmd::VIAL_PREFIX, vial::QMK_SETTINGS_SET, lo, hi];
    req.extend_from_slice(value);
    let resp = transport.send(&req)?;
    check_status("settings set", resp[0])
}

/// Restore firmware defaults for every setting
pub fn reset_settings(transport: &FlowControlTransport) -> Result<(), KeyboardError> {
    transport.send(&[cmd::VIAL_PREFIX, vial::QMK_SETTINGS_RESET])?;
    Ok(())
}

/// Enumerate and fetch every supported setting
///
/// Qsids without a schema layout, and reads the device refuses, are left out.
pub fn fetch_all(
    transport: &FlowControlTransport,
    schema: &dyn SettingsSchema,
) -> Result<BTreeMap<u16, Vec<u8>>, KeyboardError> {
    let mut values = BTreeMap::new();
    for qsid in query_supported(transport)? {
        let Some(layout) = schema.layout(qsid) else {
            warn!("qsid {} has no known layout, skipping", qsid);
            continue;
        };
        match get_setting(transport, qsid, layout.width) {
            Ok(value) => {
                values.insert(qsid, value);
            }
            Err(KeyboardError::DeviceStatus { status, .. }) => {
                warn!("Device rejected read of qsid {} (status {}), skipping", qsid, status);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vial_transport::mock::{MockDevice, MockReply};
    use vial_transport::RetryPolicy;

    fn transport(mock: &MockDevice) -> FlowControlTransport {
        FlowControlTransport::with_policy(Box::new(mock.clone()), RetryPolicy::immediate(2))
    }

    /// Query answer advertising `qsids` in pages of 16
    fn query_reply(qsids: &[u16], req: &[u8]) -> MockReply {
        let mut resp = [0xFFu8; REPORT_SIZE];
        if req[..2] == [cmd::VIAL_PREFIX, vial::QMK_SETTINGS_QUERY] {
            let cursor = u16::from_le_bytes([req[2], req[3]]);
            let page: Vec<u16> = qsids
                .iter()
                .copied()
                .filter(|&q| q > cursor || (cursor == 0 && q == 0))
                .take(16)
                .collect();
            for (i, q) in page.iter().enumerate() {
                resp[i * 2..i * 2 + 2].copy_from_slice(&q.to_le_bytes());
            }
        }
        MockReply::Respond(resp)
    }

    fn query_device(qsids: Vec<u16>) -> MockDevice {
        MockDevice::new(move |req| query_reply(&qsids, req))
    }

    #[test]
    fn test_query_single_page() {
        let mock = query_device(vec![1, 2, 7]);
        let ids = query_supported(&transport(&mock)).unwrap();
        assert_eq!(ids, vec![1, 2, 7]);
        assert_eq!(mock.writes().len(), 1);
    }

    #[test]
    fn test_query_pages_through_cursor() {
        let qsids: Vec<u16> = (1..=20).collect();
        let mock = query_device(qsids.clone());
        let ids = query_supported(&transport(&mock)).unwrap();
        assert_eq!(ids, qsids);
        let cursors: Vec<u16> = mock
            .payloads()
            .iter()
            .map(|p| u16::from_le_bytes([p[2], p[3]]))
            .collect();
        assert_eq!(cursors, vec![0, 16]);
    }

    #[test]
    fn test_get_and_set_requests() {
        let mock = MockDevice::new(|req| {
            let mut resp = [0u8; REPORT_SIZE];
            if req[1] == vial::QMK_SETTINGS_GET {
                resp[1..3].copy_from_slice(&200u16.to_le_bytes());
            }
            MockReply::Respond(resp)
        });
        let t = transport(&mock);
        assert_eq!(get_setting(&t, 7, 2).unwrap(), vec![200, 0]);
        set_setting(&t, 7, &[250, 0]).unwrap();
        assert_eq!(&mock.payloads()[1][..6], &[0xFE, 0x0B, 7, 0, 250, 0]);
    }

    #[test]
    fn test_oversize_value_never_sent() {
        let mock = MockDevice::echo();
        let err = set_setting(&transport(&mock), 7, &[0; 29]).unwrap_err();
        assert!(matches!(err, KeyboardError::BufferTooLarge { size: 29, .. }));
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_status_error() {
        let mock = MockDevice::new(|_| {
            let mut resp = [0u8; REPORT_SIZE];
            resp[0] = 2;
            MockReply::Respond(resp)
        });
        assert!(matches!(
            get_setting(&transport(&mock), 7, 2),
            Err(KeyboardError::DeviceStatus { status: 2, .. })
        ));
    }

    #[test]
    fn test_fetch_all_skips_rejected_and_unknown() {
        let mock = MockDevice::new(|req| {
            if req[1] != vial::QMK_SETTINGS_GET {
                return query_reply(&[2, 7, 999], req);
            }
            let mut resp = [0u8; REPORT_SIZE];
            match u16::from_le_bytes([req[2], req[3]]) {
                2 => resp[0] = 1,
                _ => resp[1..3].copy_from_slice(&200u16.to_le_bytes()),
            }
            MockReply::Respond(resp)
        });
        let values = fetch_all(&transport(&mock), &QmkSettingsSchema).unwrap();
        assert_eq!(values.into_iter().collect::<Vec<_>>(), vec![(7, vec![200, 0])]);
        let gets: Vec<u16> = mock
            .payloads()
            .iter()
            .filter(|p| p[1] == vial::QMK_SETTINGS_GET)
            .map(|p| u16::from_le_bytes([p[2], p[3]]))
            .collect();
        assert_eq!(gets, vec![2, 7]);
    }

    #[test]
    fn test_value_helpers() {
        assert_eq!(value_as_u32(&[0x2C, 0x01]), 300);
        assert_eq!(u32_to_value(300, 2), vec![0x2C, 0x01]);
        let layout = QmkSettingsSchema.layout(8).unwrap();
        let bit = layout.bit("retro_tapping").unwrap();
        let v = with_bit(&[0x01], bit, true);
        assert_eq!(v, vec![0x09]);
        assert!(get_bit(&v, bit));
        assert!(!get_bit(&with_bit(&v, bit, false), bit));
        assert_eq!(QmkSettingsSchema.layout(999), None);
    }
}
