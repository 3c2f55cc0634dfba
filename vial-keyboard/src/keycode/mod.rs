//! 16-bit keycode codec
//!
//! A [`KeycodeTable`] maps canonical identifiers (`KC_A`, `LCTL(KC_A)`,
//! `MO(1)`, `M3`, `TD(0)`) to numeric keycodes and back. Tables are immutable
//! values built for one session from the static name lists plus the ranges
//! the device reports (layer, macro and tap-dance counts, custom keycodes);
//! rebuilding is a pure function of those inputs.
//!
//! Keycodes whose high byte is a registered mask (modifier wrappers,
//! mod-tap, layer-tap) are composite: the high byte selects the outer
//! operation and the low byte is an inner basic keycode.

mod expr;
mod names;

use std::collections::HashMap;

use tracing::warn;

use crate::error::KeycodeError;
use names::{
    KeyName, BASIC, MODIFIER_MASKS, MOD_CONSTANTS, MOUSE_V5, MOUSE_V6, ONE_SHOT_MODS, QUANTUM_V5,
    QUANTUM_V6, RANGES_V5, RANGES_V6, SHIFTED,
};

/// A 16-bit keycode as stored in the keymap
pub type Keycode = u16;

/// Number of `USERnn` keycodes
pub const USER_KEYCODE_COUNT: u8 = 64;

/// Keycode numbering scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeycodeVersion {
    /// Legacy numbering (Vial protocol < 6)
    V5,
    /// Renumbered quantum ranges (Vial protocol >= 6)
    V6,
}

impl KeycodeVersion {
    pub fn for_vial_protocol(vial_protocol: i32) -> Self {
        if vial_protocol >= 6 {
            KeycodeVersion::V6
        } else {
            KeycodeVersion::V5
        }
    }
}

/// Layer actions taking a single layer argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerAction {
    To,
    Momentary,
    DefaultLayer,
    Toggle,
    OneShotLayer,
    TapToggle,
}

impl LayerAction {
    pub const ALL: [LayerAction; 6] = [
        LayerAction::To,
        LayerAction::Momentary,
        LayerAction::DefaultLayer,
        LayerAction::Toggle,
        LayerAction::OneShotLayer,
        LayerAction::TapToggle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayerAction::To => "TO",
            LayerAction::Momentary => "MO",
            LayerAction::DefaultLayer => "DF",
            LayerAction::Toggle => "TG",
            LayerAction::OneShotLayer => "OSL",
            LayerAction::TapToggle => "TT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

/// Device-reported sizes the table is generated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicRanges {
    pub layers: u8,
    pub macros: u8,
    pub tap_dances: u8,
    /// Names of keyboard-specific keycodes, assigned to `USER00..` in order
    pub custom_keycodes: Vec<String>,
}

impl Default for DynamicRanges {
    fn default() -> Self {
        Self {
            layers: 4,
            macros: 16,
            tap_dances: 0,
            custom_keycodes: Vec::new(),
        }
    }
}

/// Immutable keycode lookup table for one session
#[derive(Debug, Clone)]
pub struct KeycodeTable {
    version: KeycodeVersion,
    ranges: DynamicRanges,
    /// Every accepted identifier, aliases included
    names: HashMap<String, Keycode>,
    /// Canonical identifier per exact value
    primary: HashMap<Keycode, String>,
    /// Registered masks: high byte (as `value & 0xFF00`) -> outer identifier
    masks: HashMap<Keycode, String>,
    /// Outer identifier -> high byte
    mask_names: HashMap<String, Keycode>,
    constants: HashMap<&'static str, u16>,
}

impl KeycodeTable {
    /// Table with default ranges (4 layers, 16 macros)
    pub fn new(version: KeycodeVersion) -> Self {
        Self::build(version, DynamicRanges::default())
    }

    /// Build the table for a version and a set of device-reported ranges
    pub fn build(version: KeycodeVersion, ranges: DynamicRanges) -> Self {
        let mut table = Self {
            version,
            ranges,
            names: HashMap::new(),
            primary: HashMap::new(),
            masks: HashMap::new(),
            mask_names: HashMap::new(),
            constants: HashMap::new(),
        };

        let (mouse, quantum, range_consts) = match version {
            KeycodeVersion::V5 => (MOUSE_V5, QUANTUM_V5, RANGES_V5),
            KeycodeVersion::V6 => (MOUSE_V6, QUANTUM_V6, RANGES_V6),
        };

        for &(name, value) in MOD_CONSTANTS.iter().chain(range_consts) {
            table.constants.insert(name, value);
        }

        for key in BASIC.iter().chain(mouse).chain(quantum) {
            table.insert_static(key);
        }
        for key in SHIFTED {
            table.names.entry(key.name.to_string()).or_insert(key.value);
        }

        let mod_tap = table.constant("QK_MOD_TAP");
        for &(bits, wrapper, tap_hold) in MODIFIER_MASKS {
            let bits = u16::from(bits) << 8;
            table.add_mask(bits, wrapper.to_string());
            table.add_mask(mod_tap | bits, tap_hold.to_string());
        }

        let layer_tap = table.constant("QK_LAYER_TAP");
        for layer in 0..u16::from(table.ranges.layers.min(16)) {
            table.add_mask(layer_tap | (layer << 8), format!("LT{layer}"));
        }

        let layer_limit = table.layer_action_limit();
        for layer in 0..u16::from(table.ranges.layers).min(layer_limit) {
            for action in LayerAction::ALL {
                let value = table.layer_action(action, layer);
                table.insert(value, format!("{}({layer})", action.name()), true);
            }
        }

        for &(bits, name) in ONE_SHOT_MODS {
            let value = table.one_shot_mod(u16::from(bits));
            table.insert(value, format!("OSM({name})"), true);
        }

        let macro_base = table.constant("QK_MACRO");
        for n in 0..u16::from(table.ranges.macros).min(table.macro_limit()) {
            table.insert(macro_base + n, format!("M{n}"), true);
        }

        let tap_dance = table.constant("QK_TAP_DANCE");
        for n in 0..u16::from(table.ranges.tap_dances) {
            table.insert(tap_dance | n, format!("TD({n})"), true);
        }

        let user_base = table.user_base();
        for n in 0..u16::from(USER_KEYCODE_COUNT) {
            table.insert(user_base + n, format!("USER{n:02}"), true);
        }
        let custom = std::mem::take(&mut table.ranges.custom_keycodes);
        for (n, name) in (0..u16::from(USER_KEYCODE_COUNT)).zip(&custom) {
            if let Some(&existing) = table.names.get(name) {
                warn!(
                    "Custom keycode {} already names 0x{:04X}, keeping USER{:02}",
                    name, existing, n
                );
                continue;
            }
            table.insert(user_base + n, name.clone(), true);
        }
        table.ranges.custom_keycodes = custom;

        table
    }

    /// Rebuild for new device-reported ranges, keeping the version
    pub fn rebuild(&self, ranges: DynamicRanges) -> Self {
        Self::build(self.version, ranges)
    }

    pub fn version(&self) -> KeycodeVersion {
        self.version
    }

    pub fn ranges(&self) -> &DynamicRanges {
        &self.ranges
    }

    fn insert_static(&mut self, key: &KeyName) {
        self.insert(key.value, key.name.to_string(), false);
        for alias in key.aliases {
            self.names.entry((*alias).to_string()).or_insert(key.value);
        }
    }

    /// Register `name`; `primary` makes it the printed form even if one exists
    fn insert(&mut self, value: Keycode, name: String, primary: bool) {
        if primary {
            self.primary.insert(value, name.clone());
        } else {
            self.primary.entry(value).or_insert_with(|| name.clone());
        }
        self.names.insert(name, value);
    }

    fn add_mask(&mut self, high: Keycode, outer: String) {
        self.mask_names.insert(outer.clone(), high);
        self.masks.insert(high, outer);
    }

    fn constant(&self, name: &str) -> u16 {
        self.constants.get(name).copied().unwrap_or_default()
    }

    fn layer_action_limit(&self) -> u16 {
        match self.version {
            KeycodeVersion::V5 => 16,
            KeycodeVersion::V6 => 32,
        }
    }

    fn macro_limit(&self) -> u16 {
        match self.version {
            KeycodeVersion::V5 => self.constant("QK_USER") - self.constant("QK_MACRO"),
            KeycodeVersion::V6 => 128,
        }
    }

    fn user_base(&self) -> u16 {
        match self.version {
            KeycodeVersion::V5 => self.constant("QK_USER"),
            KeycodeVersion::V6 => self.constant("QK_KB"),
        }
    }

    // === Composition ===

    /// Keycode of a single-layer action such as `MO(layer)`
    pub fn layer_action(&self, action: LayerAction, layer: u16) -> Keycode {
        match self.version {
            KeycodeVersion::V5 => match action {
                LayerAction::To => {
                    self.constant("QK_TO") | (self.constant("ON_PRESS") << 4) | (layer & 0x0F)
                }
                LayerAction::Momentary => self.constant("QK_MOMENTARY") | (layer & 0xFF),
                LayerAction::DefaultLayer => self.constant("QK_DEF_LAYER") | (layer & 0xFF),
                LayerAction::Toggle => self.constant("QK_TOGGLE_LAYER") | (layer & 0xFF),
                LayerAction::OneShotLayer => self.constant("QK_ONE_SHOT_LAYER") | (layer & 0xFF),
                LayerAction::TapToggle => self.constant("QK_LAYER_TAP_TOGGLE") | (layer & 0xFF),
            },
            KeycodeVersion::V6 => {
                let base = match action {
                    LayerAction::To => self.constant("QK_TO"),
                    LayerAction::Momentary => self.constant("QK_MOMENTARY"),
                    LayerAction::DefaultLayer => self.constant("QK_DEF_LAYER"),
                    LayerAction::Toggle => self.constant("QK_TOGGLE_LAYER"),
                    LayerAction::OneShotLayer => self.constant("QK_ONE_SHOT_LAYER"),
                    LayerAction::TapToggle => self.constant("QK_LAYER_TAP_TOGGLE"),
                };
                base | (layer & 0x1F)
            }
        }
    }

    /// `LT(layer, kc)`
    pub fn layer_tap(&self, layer: u16, kc: u16) -> Keycode {
        self.constant("QK_LAYER_TAP") | ((layer & 0x0F) << 8) | (kc & 0xFF)
    }

    /// `MT(mods, kc)`
    pub fn mod_tap(&self, mods: u16, kc: u16) -> Keycode {
        self.constant("QK_MOD_TAP") | ((mods & 0x1F) << 8) | (kc & 0xFF)
    }

    /// `OSM(mods)`
    pub fn one_shot_mod(&self, mods: u16) -> Keycode {
        match self.version {
            KeycodeVersion::V5 => self.constant("QK_ONE_SHOT_MOD") | (mods & 0xFF),
            KeycodeVersion::V6 => self.constant("QK_ONE_SHOT_MOD") | (mods & 0x1F),
        }
    }

    /// `LM(layer, mods)`
    pub fn layer_mod(&self, layer: u16, mods: u16) -> Keycode {
        match self.version {
            KeycodeVersion::V5 => {
                self.constant("QK_LAYER_MOD") | ((layer & 0x0F) << 4) | (mods & 0x0F)
            }
            KeycodeVersion::V6 => {
                self.constant("QK_LAYER_MOD") | ((layer & 0x0F) << 5) | (mods & 0x1F)
            }
        }
    }

    /// `TD(index)`
    pub fn tap_dance(&self, index: u16) -> Keycode {
        self.constant("QK_TAP_DANCE") | (index & 0xFF)
    }

    /// `M<index>`
    pub fn macro_key(&self, index: u16) -> Keycode {
        self.constant("QK_MACRO") + index
    }

    /// Factory-reset (bootloader) keycode, whose writes require unlock
    pub fn reset_keycode(&self) -> Keycode {
        match self.version {
            KeycodeVersion::V5 => 0x5C00,
            KeycodeVersion::V6 => self.constant("QK_BOOT"),
        }
    }

    pub(crate) fn lookup_name(&self, name: &str) -> Option<u16> {
        self.names
            .get(name)
            .copied()
            .or_else(|| self.constants.get(name).copied())
    }

    pub(crate) fn mask_base(&self, outer: &str) -> Option<u16> {
        self.mask_names.get(outer).copied()
    }

    // === Codec ===

    /// Look up a named constant (`MOD_LCTL`, `QK_MOD_TAP`, ...)
    pub fn resolve(&self, constant: &str) -> Result<u16, KeycodeError> {
        self.constants
            .get(constant)
            .copied()
            .ok_or_else(|| KeycodeError::UnknownConstant(constant.to_string()))
    }

    /// Parse a keycode: number, identifier, or restricted expression
    pub fn deserialize(&self, text: &str) -> Result<Keycode, KeycodeError> {
        let text = text.trim();
        if let Some(value) = expr::parse_number(text) {
            return u16::try_from(value)
                .map_err(|_| KeycodeError::InvalidKeycodeExpression(text.to_string()));
        }
        if let Some(&value) = self.names.get(text) {
            return Ok(value);
        }
        expr::evaluate(self, text)
    }

    /// Canonical text of a keycode; unknown values print as hex
    pub fn serialize(&self, value: Keycode) -> String {
        if self.is_masked(value) {
            return match (self.outer(value), self.primary.get(&Self::inner(value))) {
                (Some(outer), Some(inner)) => format!("{outer}({inner})"),
                _ => hex(value),
            };
        }
        self.primary
            .get(&value)
            .cloned()
            .unwrap_or_else(|| hex(value))
    }

    /// Whether the high byte is a registered mask
    pub fn is_masked(&self, value: Keycode) -> bool {
        self.masks.contains_key(&(value & 0xFF00))
    }

    /// Outer identifier of a masked keycode, e.g. `LCTL` or `LT1`
    pub fn outer(&self, value: Keycode) -> Option<&str> {
        self.masks.get(&(value & 0xFF00)).map(String::as_str)
    }

    /// Inner basic keycode of a masked keycode
    pub fn inner(value: Keycode) -> Keycode {
        value & 0x00FF
    }

    /// Replace the inner key of a masked keycode, keeping the wrapper
    pub fn with_inner(value: Keycode, inner: Keycode) -> Keycode {
        (value & 0xFF00) | (inner & 0x00FF)
    }

    /// All canonical identifiers, sorted by value
    pub fn identifiers(&self) -> Vec<(Keycode, &str)> {
        let mut all: Vec<_> = self
            .primary
            .iter()
            .map(|(v, n)| (*v, n.as_str()))
            .collect();
        all.sort_unstable();
        all
    }
}

fn hex(value: Keycode) -> String {
    format!("0x{value:04X}")
}
