//! Macro codec
//!
//! Macros are stored in the firmware's flat macro memory as escape-coded
//! byte streams, one per macro, separated by NUL. Two incompatible dialects
//! exist; the session picks one from its Vial protocol version at reload
//! and routes every encode/decode through that [`MacroDialect`] value.
//!
//! Dialect v1: `[op, kc]` pairs (op 1/2/3 = tap/down/up) mixed with text.
//!
//! Dialect v2: every escape starts with [`SS_QMK_PREFIX`]:
//!
//! ```text
//! 01 01 kc        tap          01 05 lo hi   tap (16-bit keycode)
//! 01 02 kc        down         01 06 lo hi   down (16-bit keycode)
//! 01 03 kc        up           01 07 lo hi   up (16-bit keycode)
//! 01 04 lo hi     delay = (lo - 1) + (hi - 1) * 255 ms
//! ```

use tracing::warn;

use crate::error::MacroError;
use crate::keycode::Keycode;

/// Escape prefix of dialect v2
pub const SS_QMK_PREFIX: u8 = 0x01;
pub const SS_TAP_CODE: u8 = 0x01;
pub const SS_DOWN_CODE: u8 = 0x02;
pub const SS_UP_CODE: u8 = 0x03;
pub const SS_DELAY_CODE: u8 = 0x04;
/// Added to tap/down/up for the 16-bit keycode variants
pub const VIAL_MACRO_EXT_OFFSET: u8 = 0x04;

/// Largest delay the biased base-255 encoding can carry
pub const MAX_DELAY_MS: u32 = 254 * 255 + 254;

/// One step of a macro
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroAction {
    Text(String),
    Tap(Vec<Keycode>),
    Down(Vec<Keycode>),
    Up(Vec<Keycode>),
    Delay(u32),
}

impl MacroAction {
    fn name(&self) -> &'static str {
        match self {
            MacroAction::Text(_) => "text",
            MacroAction::Tap(_) => "tap",
            MacroAction::Down(_) => "down",
            MacroAction::Up(_) => "up",
            MacroAction::Delay(_) => "delay",
        }
    }

    fn key_op(&self) -> Option<(u8, &[Keycode])> {
        match self {
            MacroAction::Tap(kcs) => Some((SS_TAP_CODE, kcs)),
            MacroAction::Down(kcs) => Some((SS_DOWN_CODE, kcs)),
            MacroAction::Up(kcs) => Some((SS_UP_CODE, kcs)),
            _ => None,
        }
    }
}

/// An ordered list of actions
pub type Macro = Vec<MacroAction>;

/// Wire dialect of the macro buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroDialect {
    V1,
    V2,
}

impl MacroDialect {
    pub fn for_vial_protocol(vial_protocol: i32) -> Self {
        if vial_protocol >= 2 {
            MacroDialect::V2
        } else {
            MacroDialect::V1
        }
    }

    pub fn number(self) -> u8 {
        match self {
            MacroDialect::V1 => 1,
            MacroDialect::V2 => 2,
        }
    }

    /// Encode one macro
    pub fn serialize(self, actions: &[MacroAction]) -> Result<Vec<u8>, MacroError> {
        let mut out = Vec::new();
        for action in actions {
            match (self, action) {
                (_, MacroAction::Text(text)) => {
                    if text.contains('\0') {
                        return Err(MacroError::NulByte {
                            action: format!("text {text:?}"),
                        });
                    }
                    out.extend_from_slice(text.as_bytes());
                }
                (MacroDialect::V1, MacroAction::Delay(_)) => {
                    return Err(self.unsupported(action.name()));
                }
                (MacroDialect::V2, MacroAction::Delay(ms)) => {
                    out.extend_from_slice(&encode_delay(*ms)?);
                }
                (_, key_action) => {
                    let Some((op, keycodes)) = key_action.key_op() else {
                        continue;
                    };
                    for &kc in keycodes {
                        self.encode_key(&mut out, op, kc)?;
                    }
                }
            }
        }
        Ok(out)
    }

    fn encode_key(self, out: &mut Vec<u8>, op: u8, kc: Keycode) -> Result<(), MacroError> {
        if kc == 0 {
            return Err(MacroError::NulByte {
                action: "keycode 0x0000".to_string(),
            });
        }
        match self {
            MacroDialect::V1 => {
                let kc = u8::try_from(kc).map_err(|_| {
                    self.unsupported(&format!("keycode 0x{kc:04X}"))
                })?;
                out.extend_from_slice(&[op, kc]);
            }
            MacroDialect::V2 => match u8::try_from(kc) {
                Ok(kc) => out.extend_from_slice(&[SS_QMK_PREFIX, op, kc]),
                Err(_) => {
                    // A zero low byte would read as a terminator
                    let wire = if kc & 0xFF == 0 { 0xFF00 | (kc >> 8) } else { kc };
                    let [lo, hi] = wire.to_le_bytes();
                    out.extend_from_slice(&[SS_QMK_PREFIX, op + VIAL_MACRO_EXT_OFFSET, lo, hi]);
                }
            },
        }
        Ok(())
    }

    fn unsupported(self, action: &str) -> MacroError {
        MacroError::UnsupportedInDialect {
            action: action.to_string(),
            dialect: self.number(),
        }
    }

    /// Decode one macro; bytes outside a recognized escape are text
    pub fn deserialize(self, data: &[u8]) -> Macro {
        let mut builder = MacroBuilder::default();
        let mut i = 0;

        while i < data.len() {
            let consumed = match self {
                MacroDialect::V1 => decode_v1(&data[i..], &mut builder),
                MacroDialect::V2 => decode_v2(&data[i..], &mut builder),
            };
            match consumed {
                Some(n) => i += n,
                None => {
                    builder.text(data[i]);
                    i += 1;
                }
            }
        }

        builder.finish()
    }
}

/// Consume one v1 escape at the start of `data`
fn decode_v1(data: &[u8], builder: &mut MacroBuilder) -> Option<usize> {
    match data {
        [op @ (SS_TAP_CODE | SS_DOWN_CODE | SS_UP_CODE), kc, ..] => {
            builder.key(*op, Keycode::from(*kc));
            Some(2)
        }
        _ => None,
    }
}

/// Consume one v2 escape at the start of `data`
fn decode_v2(data: &[u8], builder: &mut MacroBuilder) -> Option<usize> {
    match data {
        [SS_QMK_PREFIX, op @ (SS_TAP_CODE | SS_DOWN_CODE | SS_UP_CODE), kc, ..] => {
            builder.key(*op, Keycode::from(*kc));
            Some(3)
        }
        [SS_QMK_PREFIX, SS_DELAY_CODE, lo, hi, ..] => {
            builder.delay(decode_delay(*lo, *hi));
            Some(4)
        }
        [SS_QMK_PREFIX, ext @ 0x05..=0x07, lo, hi, ..] => {
            let wire = u16::from_le_bytes([*lo, *hi]);
            let kc = if wire > 0xFF00 { (wire & 0xFF) << 8 } else { wire };
            builder.key(ext - VIAL_MACRO_EXT_OFFSET, kc);
            Some(4)
        }
        _ => None,
    }
}

/// Biased base-255 delay bytes; neither byte can be zero
pub fn encode_delay(ms: u32) -> Result<[u8; 4], MacroError> {
    if ms > MAX_DELAY_MS {
        return Err(MacroError::DelayOutOfRange {
            delay: ms,
            max: MAX_DELAY_MS,
        });
    }
    Ok([
        SS_QMK_PREFIX,
        SS_DELAY_CODE,
        (ms % 255 + 1) as u8,
        (ms / 255 + 1) as u8,
    ])
}

pub fn decode_delay(lo: u8, hi: u8) -> u32 {
    u32::from(lo.saturating_sub(1)) + u32::from(hi.saturating_sub(1)) * 255
}

/// Accumulates decoded actions, coalescing text runs and same-op key runs
#[derive(Default)]
struct MacroBuilder {
    actions: Macro,
    text: Vec<u8>,
}

impl MacroBuilder {
    fn text(&mut self, byte: u8) {
        self.text.push(byte);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = String::from_utf8_lossy(&self.text).into_owned();
            self.actions.push(MacroAction::Text(text));
            self.text.clear();
        }
    }

    fn key(&mut self, op: u8, kc: Keycode) {
        self.flush_text();
        match (self.actions.last_mut(), op) {
            (Some(MacroAction::Tap(kcs)), SS_TAP_CODE)
            | (Some(MacroAction::Down(kcs)), SS_DOWN_CODE)
            | (Some(MacroAction::Up(kcs)), SS_UP_CODE) => kcs.push(kc),
            (_, SS_TAP_CODE) => self.actions.push(MacroAction::Tap(vec![kc])),
            (_, SS_DOWN_CODE) => self.actions.push(MacroAction::Down(vec![kc])),
            _ => self.actions.push(MacroAction::Up(vec![kc])),
        }
    }

    fn delay(&mut self, ms: u32) {
        self.flush_text();
        self.actions.push(MacroAction::Delay(ms));
    }

    fn finish(mut self) -> Macro {
        self.flush_text();
        self.actions
    }
}

/// Encode a macro set: each macro followed by a NUL terminator
pub fn serialize_set(dialect: MacroDialect, macros: &[Macro]) -> Result<Vec<u8>, MacroError> {
    let mut out = Vec::new();
    for m in macros {
        out.extend(dialect.serialize(m)?);
        out.push(0);
    }
    Ok(out)
}

/// Decode exactly `count` macros from the macro memory.
///
/// Missing macros are padded with empty ones and extras are dropped, which
/// hides firmware that returns a short or overlong buffer.
pub fn deserialize_set(dialect: MacroDialect, data: &[u8], count: usize) -> Vec<Macro> {
    let mut pieces: Vec<&[u8]> = data.split(|&b| b == 0).collect();
    // Content after the final NUL is padding, not a macro
    if data.last() == Some(&0) || data.is_empty() {
        pieces.pop();
    }
    if pieces.len() < count {
        warn!(
            "Macro buffer holds {} macros, expected {}; padding",
            pieces.len(),
            count
        );
    }
    pieces.resize(count, &[]);
    pieces.into_iter().map(|p| dialect.deserialize(p)).collect()
}
