//! Dynamic entries: tap dance, combos, key overrides, alt-repeat keys
//!
//! All four tables share one wire operation, `DYNAMIC_ENTRY_OP`, which
//! multiplexes on a table-specific get/set sub-op and a dense index. The
//! response starts with a status byte (0 = success) followed by the packed
//! little-endian record. Each record type is a zerocopy struct; the generic
//! [`get_entry`] / [`set_entry`] functions are parameterized by it.

use std::fmt::Debug;

use tracing::debug;
use vial_transport::protocol::{cmd, dynamic, vial};
use vial_transport::FlowControlTransport;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::KeyboardError;
use crate::keycode::Keycode;

/// Dynamic entry table selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicTable {
    TapDance,
    Combo,
    KeyOverride,
    AltRepeatKey,
}

impl DynamicTable {
    pub fn get_op(self) -> u8 {
        match self {
            DynamicTable::TapDance => dynamic::TAP_DANCE_GET,
            DynamicTable::Combo => dynamic::COMBO_GET,
            DynamicTable::KeyOverride => dynamic::KEY_OVERRIDE_GET,
            DynamicTable::AltRepeatKey => dynamic::ALT_REPEAT_KEY_GET,
        }
    }

    pub fn set_op(self) -> u8 {
        match self {
            DynamicTable::TapDance => dynamic::TAP_DANCE_SET,
            DynamicTable::Combo => dynamic::COMBO_SET,
            DynamicTable::KeyOverride => dynamic::KEY_OVERRIDE_SET,
            DynamicTable::AltRepeatKey => dynamic::ALT_REPEAT_KEY_SET,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DynamicTable::TapDance => "tap dance",
            DynamicTable::Combo => "combo",
            DynamicTable::KeyOverride => "key override",
            DynamicTable::AltRepeatKey => "alt repeat key",
        }
    }
}

/// Fixed-layout record stored in a dynamic entry table
pub trait DynamicRecord:
    IntoBytes + FromBytes + KnownLayout + Immutable + Copy + PartialEq + Debug
{
    const TABLE: DynamicTable;

    /// Keycodes carried by the record (checked for the reset keycode before writes)
    fn keycodes(&self) -> Vec<Keycode>;

    /// This record type's entries in the mirror
    fn entries(store: &DynamicEntries) -> &Vec<Self>;

    fn entries_mut(store: &mut DynamicEntries) -> &mut Vec<Self>;
}

// =============================================================================
// Record layouts
// =============================================================================

/// Tap dance: four keycode actions and a tapping term in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct TapDance {
    on_tap: U16,
    on_hold: U16,
    on_double_tap: U16,
    on_tap_hold: U16,
    tapping_term: U16,
}

impl TapDance {
    pub fn new(
        on_tap: Keycode,
        on_hold: Keycode,
        on_double_tap: Keycode,
        on_tap_hold: Keycode,
        tapping_term: u16,
    ) -> Self {
        Self {
            on_tap: on_tap.into(),
            on_hold: on_hold.into(),
            on_double_tap: on_double_tap.into(),
            on_tap_hold: on_tap_hold.into(),
            tapping_term: tapping_term.into(),
        }
    }

    pub fn on_tap(&self) -> Keycode {
        self.on_tap.get()
    }

    pub fn on_hold(&self) -> Keycode {
        self.on_hold.get()
    }

    pub fn on_double_tap(&self) -> Keycode {
        self.on_double_tap.get()
    }

    pub fn on_tap_hold(&self) -> Keycode {
        self.on_tap_hold.get()
    }

    pub fn tapping_term(&self) -> u16 {
        self.tapping_term.get()
    }
}

impl DynamicRecord for TapDance {
    const TABLE: DynamicTable = DynamicTable::TapDance;

    fn keycodes(&self) -> Vec<Keycode> {
        vec![
            self.on_tap(),
            self.on_hold(),
            self.on_double_tap(),
            self.on_tap_hold(),
        ]
    }

    fn entries(store: &DynamicEntries) -> &Vec<Self> {
        &store.tap_dances
    }

    fn entries_mut(store: &mut DynamicEntries) -> &mut Vec<Self> {
        &mut store.tap_dances
    }
}

/// Combo: up to four input keys (0 = unused) producing one output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct Combo {
    inputs: [U16; 4],
    output: U16,
}

impl Combo {
    pub fn new(inputs: [Keycode; 4], output: Keycode) -> Self {
        Self {
            inputs: inputs.map(U16::new),
            output: output.into(),
        }
    }

    pub fn inputs(&self) -> [Keycode; 4] {
        self.inputs.map(|k| k.get())
    }

    pub fn output(&self) -> Keycode {
        self.output.get()
    }
}

impl DynamicRecord for Combo {
    const TABLE: DynamicTable = DynamicTable::Combo;

    fn keycodes(&self) -> Vec<Keycode> {
        let mut codes = self.inputs().to_vec();
        codes.push(self.output());
        codes
    }

    fn entries(store: &DynamicEntries) -> &Vec<Self> {
        &store.combos
    }

    fn entries_mut(store: &mut DynamicEntries) -> &mut Vec<Self> {
        &mut store.combos
    }
}

/// Key override option bits
pub mod key_override_options {
    pub const ACTIVATION_TRIGGER_DOWN: u8 = 1 << 0;
    pub const ACTIVATION_REQUIRED_MOD_DOWN: u8 = 1 << 1;
    pub const ACTIVATION_NEGATIVE_MOD_UP: u8 = 1 << 2;
    pub const ONE_MOD: u8 = 1 << 3;
    pub const NO_REREGISTER_TRIGGER: u8 = 1 << 4;
    pub const NO_UNREGISTER_ON_OTHER_KEY_DOWN: u8 = 1 << 5;
    pub const ENABLED: u8 = 1 << 7;
}

/// Key override: replace `trigger` (with `trigger_mods` held) by `replacement`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct KeyOverride {
    trigger: U16,
    replacement: U16,
    layers: U16,
    trigger_mods: u8,
    negative_mod_mask: u8,
    suppressed_mods: u8,
    options: u8,
}

impl KeyOverride {
    pub fn new(trigger: Keycode, replacement: Keycode, layers: u16) -> Self {
        Self {
            trigger: trigger.into(),
            replacement: replacement.into(),
            layers: layers.into(),
            ..Default::default()
        }
    }

    pub fn with_mods(mut self, trigger_mods: u8, negative_mod_mask: u8, suppressed_mods: u8) -> Self {
        self.trigger_mods = trigger_mods;
        self.negative_mod_mask = negative_mod_mask;
        self.suppressed_mods = suppressed_mods;
        self
    }

    pub fn with_options(mut self, options: u8) -> Self {
        self.options = options;
        self
    }

    pub fn trigger(&self) -> Keycode {
        self.trigger.get()
    }

    pub fn replacement(&self) -> Keycode {
        self.replacement.get()
    }

    /// Bitmask of layers the override is active on
    pub fn layers(&self) -> u16 {
        self.layers.get()
    }

    pub fn trigger_mods(&self) -> u8 {
        self.trigger_mods
    }

    pub fn negative_mod_mask(&self) -> u8 {
        self.negative_mod_mask
    }

    pub fn suppressed_mods(&self) -> u8 {
        self.suppressed_mods
    }

    pub fn options(&self) -> u8 {
        self.options
    }

    pub fn is_enabled(&self) -> bool {
        self.options & key_override_options::ENABLED != 0
    }
}

impl DynamicRecord for KeyOverride {
    const TABLE: DynamicTable = DynamicTable::KeyOverride;

    fn keycodes(&self) -> Vec<Keycode> {
        vec![self.trigger(), self.replacement()]
    }

    fn entries(store: &DynamicEntries) -> &Vec<Self> {
        &store.key_overrides
    }

    fn entries_mut(store: &mut DynamicEntries) -> &mut Vec<Self> {
        &mut store.key_overrides
    }
}

/// Alt-repeat-key option bits
pub mod alt_repeat_key_options {
    pub const DEFAULT_TO_THIS_ALT_KEY: u8 = 1 << 0;
    pub const BIDIRECTIONAL: u8 = 1 << 1;
    pub const IGNORE_MOD_HANDEDNESS: u8 = 1 << 2;
    pub const ENABLED: u8 = 1 << 3;
}

/// Alt-repeat key: what the alternate repeat key sends after `keycode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct AltRepeatKey {
    keycode: U16,
    alt_keycode: U16,
    allowed_mods: u8,
    options: u8,
}

impl AltRepeatKey {
    pub fn new(keycode: Keycode, alt_keycode: Keycode, allowed_mods: u8, options: u8) -> Self {
        Self {
            keycode: keycode.into(),
            alt_keycode: alt_keycode.into(),
            allowed_mods,
            options,
        }
    }

    pub fn keycode(&self) -> Keycode {
        self.keycode.get()
    }

    pub fn alt_keycode(&self) -> Keycode {
        self.alt_keycode.get()
    }

    pub fn allowed_mods(&self) -> u8 {
        self.allowed_mods
    }

    pub fn options(&self) -> u8 {
        self.options
    }
}

impl DynamicRecord for AltRepeatKey {
    const TABLE: DynamicTable = DynamicTable::AltRepeatKey;

    fn keycodes(&self) -> Vec<Keycode> {
        vec![self.keycode(), self.alt_keycode()]
    }

    fn entries(store: &DynamicEntries) -> &Vec<Self> {
        &store.alt_repeat_keys
    }

    fn entries_mut(store: &mut DynamicEntries) -> &mut Vec<Self> {
        &mut store.alt_repeat_keys
    }
}

// =============================================================================
// Counts and mirror
// =============================================================================

/// Optional firmware features reported alongside the entry counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DynamicFeatures {
    pub caps_word: bool,
    pub layer_lock: bool,
}

/// Entry counts per table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DynamicCounts {
    pub tap_dance: u8,
    pub combo: u8,
    pub key_override: u8,
    pub alt_repeat_key: u8,
    pub features: DynamicFeatures,
}

impl DynamicCounts {
    pub fn count(&self, table: DynamicTable) -> u8 {
        match table {
            DynamicTable::TapDance => self.tap_dance,
            DynamicTable::Combo => self.combo,
            DynamicTable::KeyOverride => self.key_override,
            DynamicTable::AltRepeatKey => self.alt_repeat_key,
        }
    }
}

/// Mirror of every dynamic entry on the device
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DynamicEntries {
    pub counts: DynamicCounts,
    pub tap_dances: Vec<TapDance>,
    pub combos: Vec<Combo>,
    pub key_overrides: Vec<KeyOverride>,
    pub alt_repeat_keys: Vec<AltRepeatKey>,
}

// =============================================================================
// Wire operations
// =============================================================================

/// Query entry counts; the count response carries no status byte
pub fn get_counts(transport: &FlowControlTransport) -> Result<DynamicCounts, KeyboardError> {
    let resp = transport.send(&[
        cmd::VIAL_PREFIX,
        vial::DYNAMIC_ENTRY_OP,
        dynamic::GET_NUMBER_OF_ENTRIES,
    ])?;
    Ok(DynamicCounts {
        tap_dance: resp[0],
        combo: resp[1],
        key_override: resp[2],
        alt_repeat_key: resp[3],
        features: DynamicFeatures {
            caps_word: resp[31] & 0x01 != 0,
            layer_lock: resp[31] & 0x02 != 0,
        },
    })
}

fn check_status(op: &'static str, status: u8) -> Result<(), KeyboardError> {
    if status != 0 {
        return Err(KeyboardError::DeviceStatus { op, status });
    }
    Ok(())
}

/// Read one record
pub fn get_entry<R: DynamicRecord>(
    transport: &FlowControlTransport,
    index: u8,
) -> Result<R, KeyboardError> {
    let resp = transport.send(&[
        cmd::VIAL_PREFIX,
        vial::DYNAMIC_ENTRY_OP,
        R::TABLE.get_op(),
        index,
    ])?;
    check_status(R::TABLE.name(), resp[0])?;
    let size = std::mem::size_of::<R>();
    R::read_from_bytes(&resp[1..1 + size]).map_err(|_| {
        KeyboardError::InvalidParameter(format!("{} record size {}", R::TABLE.name(), size))
    })
}

/// Write one record
pub fn set_entry<R: DynamicRecord>(
    transport: &FlowControlTransport,
    index: u8,
    record: &R,
) -> Result<(), KeyboardError> {
    let mut req = vec![
        cmd::VIAL_PREFIX,
        vial::DYNAMIC_ENTRY_OP,
        R::TABLE.set_op(),
        index,
    ];
    req.extend_from_slice(record.as_bytes());
    let resp = transport.send(&req)?;
    check_status(R::TABLE.name(), resp[0])
}

fn fetch_table<R: DynamicRecord>(
    transport: &FlowControlTransport,
    count: u8,
) -> Result<Vec<R>, KeyboardError> {
    debug!("Fetching {} {} entries", count, R::TABLE.name());
    (0..count).map(|i| get_entry::<R>(transport, i)).collect()
}

/// Fetch counts and every record; alt-repeat keys only where supported
pub fn fetch_all(
    transport: &FlowControlTransport,
    with_alt_repeat_keys: bool,
) -> Result<DynamicEntries, KeyboardError> {
    let mut counts = get_counts(transport)?;
    if !with_alt_repeat_keys {
        counts.alt_repeat_key = 0;
    }

    Ok(DynamicEntries {
        counts,
        tap_dances: fetch_table(transport, counts.tap_dance)?,
        combos: fetch_table(transport, counts.combo)?,
        key_overrides: fetch_table(transport, counts.key_override)?,
        alt_repeat_keys: fetch_table(transport, counts.alt_repeat_key)?,
    })
}
