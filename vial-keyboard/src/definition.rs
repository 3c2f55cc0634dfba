//! Keyboard definition decoding
//!
//! Vial firmware stores its keyboard definition as an XZ (or raw LZMA)
//! compressed JSON document. Only the parts the protocol needs are decoded:
//! matrix size, the matrix positions and encoders referenced by the KLE
//! layout, layout option labels, custom keycodes and the lighting type.

use std::collections::BTreeSet;
use std::io::Read;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use xz2::read::XzDecoder;
use xz2::stream::Stream;

use crate::error::KeyboardError;

/// Legend marking an encoder key in the KLE layout
const ENCODER_LEGEND: &str = "e";

/// KLE label slots, numbered left to right and top to bottom
const LABEL_SLOTS: usize = 12;
/// Top-left slot: matrix `row,col`, or encoder `index,direction`
const MATRIX_SLOT: usize = 0;
/// Center slot: encoder marker
const ENCODER_SLOT: usize = 4;
/// Bottom-right slot: layout option `option,choice`
const LAYOUT_OPTION_SLOT: usize = 8;

/// KLE alignment in effect until a key sets `a`
const DEFAULT_ALIGNMENT: usize = 4;

/// Slot of each newline-separated legend line, per KLE alignment value.
/// Lines mapped to `-1` are not displayed.
const LABEL_MAP: [[i8; LABEL_SLOTS]; 8] = [
    [0, 6, 2, 8, 9, 11, 3, 5, 1, 4, 7, 10],
    [1, 7, -1, -1, 9, 11, 4, -1, -1, -1, -1, 10],
    [3, -1, 5, -1, 9, 11, -1, -1, 4, -1, -1, 10],
    [4, -1, -1, -1, 9, 11, -1, -1, -1, -1, -1, 10],
    [0, 6, 2, 8, 10, -1, 3, 5, 1, 4, 7, -1],
    [1, 7, -1, -1, 10, -1, 4, -1, -1, -1, -1, -1],
    [3, -1, 5, -1, 10, -1, -1, -1, 4, -1, -1, -1],
    [4, -1, -1, -1, 10, -1, -1, -1, -1, -1, -1, -1],
];

/// Place a legend's lines into their label slots
fn label_slots(legend: &str, alignment: usize) -> [&str; LABEL_SLOTS] {
    let map = LABEL_MAP.get(alignment).unwrap_or(&LABEL_MAP[DEFAULT_ALIGNMENT]);
    let mut slots = [""; LABEL_SLOTS];
    for (line, text) in legend.split('\n').enumerate().take(LABEL_SLOTS) {
        if let Ok(slot) = usize::try_from(map[line]) {
            slots[slot] = text;
        }
    }
    slots
}

#[derive(Debug, Clone, Deserialize)]
struct JsonMatrix {
    rows: u8,
    cols: u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct JsonLayouts {
    #[serde(default)]
    keymap: Vec<Value>,
    #[serde(default)]
    labels: Vec<Value>,
}

/// Keyboard-specific keycode entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomKeycode {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub short_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonDefinition {
    #[serde(default)]
    name: Option<String>,
    matrix: JsonMatrix,
    #[serde(default)]
    layouts: JsonLayouts,
    #[serde(default)]
    custom_keycodes: Vec<CustomKeycode>,
    #[serde(default)]
    lighting: Option<String>,
}

/// One layout option as labelled in the definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutLabel {
    /// On/off option, one bit
    Toggle(String),
    /// Multiple choice option
    Select { title: String, choices: Vec<String> },
}

impl LayoutLabel {
    fn from_json(value: &Value) -> Result<Self, KeyboardError> {
        match value {
            Value::String(title) => Ok(LayoutLabel::Toggle(title.clone())),
            Value::Array(items) if !items.is_empty() => {
                let mut strings = items.iter().map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        KeyboardError::MalformedDefinition(format!("layout label {value}"))
                    })
                });
                let title = strings.next().transpose()?.unwrap_or_default();
                let choices = strings.collect::<Result<Vec<_>, _>>()?;
                Ok(LayoutLabel::Select { title, choices })
            }
            _ => Err(KeyboardError::MalformedDefinition(format!(
                "layout label {value}"
            ))),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            LayoutLabel::Toggle(title) => title,
            LayoutLabel::Select { title, .. } => title,
        }
    }

    /// Number of choices the option accepts
    pub fn choice_count(&self) -> u32 {
        match self {
            LayoutLabel::Toggle(_) => 2,
            LayoutLabel::Select { choices, .. } => choices.len() as u32,
        }
    }

    /// Bits occupied in the packed layout options value
    pub fn bits(&self) -> u32 {
        match self {
            LayoutLabel::Toggle(_) => 1,
            LayoutLabel::Select { choices, .. } => {
                let n = choices.len().max(1) as u32;
                // ceil(log2(n)), zero for a single choice
                u32::BITS - (n - 1).leading_zeros()
            }
        }
    }
}

/// Packed layout option choices
///
/// The firmware stores all choices in one 32-bit value; the last label
/// occupies the least significant bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutOptions {
    pub choices: Vec<u32>,
}

impl LayoutOptions {
    pub fn decode(labels: &[LayoutLabel], packed: u32) -> Self {
        let mut choices = vec![0; labels.len()];
        let mut shift = 0;
        for (i, label) in labels.iter().enumerate().rev() {
            let bits = label.bits();
            let mask = if bits >= 32 { u32::MAX } else { (1 << bits) - 1 };
            choices[i] = packed.checked_shr(shift).unwrap_or(0) & mask;
            shift += bits;
        }
        Self { choices }
    }

    pub fn encode(&self, labels: &[LayoutLabel]) -> u32 {
        let mut packed = 0u32;
        let mut shift = 0;
        for (label, &choice) in labels.iter().zip(&self.choices).rev() {
            packed |= choice.checked_shl(shift).unwrap_or(0);
            shift += label.bits();
        }
        packed
    }
}

/// A key of the physical layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutKey {
    pub row: u8,
    pub col: u8,
    /// `(option, choice)` the key belongs to, if any
    pub layout_option: Option<(u8, u8)>,
}

/// An encoder direction of the physical layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEncoder {
    pub index: u8,
    /// 0 counter-clockwise, 1 clockwise
    pub direction: u8,
}

/// Decoded keyboard definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardDefinition {
    pub name: Option<String>,
    pub rows: u8,
    pub cols: u8,
    pub keys: Vec<LayoutKey>,
    pub encoders: Vec<LayoutEncoder>,
    pub layout_labels: Vec<LayoutLabel>,
    pub custom_keycodes: Vec<CustomKeycode>,
    pub lighting: Option<String>,
}

fn parse_pair(text: &str) -> Option<(u8, u8)> {
    let (a, b) = text.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

impl KeyboardDefinition {
    /// Decompress and parse a definition blob fetched from the device
    pub fn from_compressed(data: &[u8]) -> Result<Self, KeyboardError> {
        let mut json = Vec::new();
        if let Err(xz_err) = XzDecoder::new(data).read_to_end(&mut json) {
            debug!("Definition is not XZ ({xz_err}), trying raw LZMA");
            json.clear();
            let malformed =
                |e: std::io::Error| KeyboardError::MalformedDefinition(format!("decompression failed: {e}"));
            let stream = Stream::new_lzma_decoder(u64::MAX).map_err(|e| malformed(e.into()))?;
            XzDecoder::new_stream(data, stream)
                .read_to_end(&mut json)
                .map_err(malformed)?;
        }
        let text = std::str::from_utf8(&json)
            .map_err(|e| KeyboardError::MalformedDefinition(format!("not UTF-8: {e}")))?;
        Self::from_json(text)
    }

    /// Parse the JSON document
    pub fn from_json(text: &str) -> Result<Self, KeyboardError> {
        let raw: JsonDefinition = serde_json::from_str(text)
            .map_err(|e| KeyboardError::MalformedDefinition(e.to_string()))?;

        let layout_labels = raw
            .layouts
            .labels
            .iter()
            .map(LayoutLabel::from_json)
            .collect::<Result<Vec<_>, _>>()?;

        let mut def = Self {
            name: raw.name,
            rows: raw.matrix.rows,
            cols: raw.matrix.cols,
            keys: Vec::new(),
            encoders: Vec::new(),
            layout_labels,
            custom_keycodes: raw.custom_keycodes,
            lighting: raw.lighting,
        };
        def.parse_kle(&raw.layouts.keymap)?;

        debug!(
            "Definition: {}x{} matrix, {} keys, {} encoders, {} layout options",
            def.rows,
            def.cols,
            def.keys.len(),
            def.encoder_count(),
            def.layout_labels.len()
        );
        Ok(def)
    }

    fn parse_kle(&mut self, rows: &[Value]) -> Result<(), KeyboardError> {
        // Alignment carries over between keys and rows
        let mut alignment = DEFAULT_ALIGNMENT;
        for row in rows {
            // Leading metadata objects are not key rows
            let Value::Array(items) = row else { continue };
            let mut decal = false;
            for item in items {
                match item {
                    Value::Object(props) => {
                        if props.get("d").and_then(Value::as_bool) == Some(true) {
                            decal = true;
                        }
                        if let Some(a) = props.get("a").and_then(Value::as_u64) {
                            alignment = usize::try_from(a).unwrap_or(DEFAULT_ALIGNMENT);
                        }
                    }
                    Value::String(legend) => {
                        if !std::mem::take(&mut decal) {
                            self.add_key(legend, &label_slots(legend, alignment))?;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn add_key(
        &mut self,
        legend: &str,
        slots: &[&str; LABEL_SLOTS],
    ) -> Result<(), KeyboardError> {
        let Some(position) = parse_pair(slots[MATRIX_SLOT]) else {
            warn!("Ignoring key without matrix position: {:?}", legend);
            return Ok(());
        };

        if slots[ENCODER_SLOT] == ENCODER_LEGEND {
            let (index, direction) = position;
            if direction > 1 {
                return Err(KeyboardError::MalformedDefinition(format!(
                    "encoder {index} has direction {direction}"
                )));
            }
            let encoder = LayoutEncoder { index, direction };
            if !self.encoders.contains(&encoder) {
                self.encoders.push(encoder);
            }
            return Ok(());
        }

        let (row, col) = position;
        if row >= self.rows || col >= self.cols {
            return Err(KeyboardError::MalformedDefinition(format!(
                "key {row},{col} outside {}x{} matrix",
                self.rows, self.cols
            )));
        }
        let layout_option = parse_pair(slots[LAYOUT_OPTION_SLOT]);
        self.keys.push(LayoutKey {
            row,
            col,
            layout_option,
        });
        Ok(())
    }

    /// Number of encoders referenced by the layout
    pub fn encoder_count(&self) -> u8 {
        self.encoders
            .iter()
            .map(|e| e.index.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Distinct matrix positions used by the layout
    pub fn matrix_positions(&self) -> BTreeSet<(u8, u8)> {
        self.keys.iter().map(|k| (k.row, k.col)).collect()
    }

    pub fn custom_keycode_names(&self) -> Vec<String> {
        self.custom_keycodes.iter().map(|k| k.name.clone()).collect()
    }
}
