//! Text forms used on the command line
//!
//! Macro actions are written as `kind:argument`:
//!
//! ```text
//! text:hello    tap:KC_A+KC_B    down:KC_LSFT    up:KC_LSFT    delay:100
//! ```

use vial_keyboard::error::KeycodeError;
use vial_keyboard::settings::{get_bit, value_as_u32, SettingKind, SettingLayout};
use vial_keyboard::{KeyboardError, Keycode, KeycodeTable, Macro, MacroAction};

/// Separator between keycodes of one tap/down/up action
const KEY_SEPARATOR: char = '+';

fn parse_keys(table: &KeycodeTable, arg: &str) -> Result<Vec<Keycode>, KeycodeError> {
    arg.split(KEY_SEPARATOR)
        .map(|k| table.deserialize(k))
        .collect()
}

/// Parse one `kind:argument` macro action
pub fn parse_macro_action(table: &KeycodeTable, text: &str) -> Result<MacroAction, KeyboardError> {
    let invalid = || KeyboardError::InvalidParameter(format!("macro action {text:?}"));
    let (kind, arg) = text.split_once(':').ok_or_else(invalid)?;

    let action = match kind {
        "text" => MacroAction::Text(arg.to_string()),
        "tap" => MacroAction::Tap(parse_keys(table, arg)?),
        "down" => MacroAction::Down(parse_keys(table, arg)?),
        "up" => MacroAction::Up(parse_keys(table, arg)?),
        "delay" => MacroAction::Delay(arg.trim().parse().map_err(|_| invalid())?),
        _ => return Err(invalid()),
    };
    Ok(action)
}

pub fn parse_macro(table: &KeycodeTable, actions: &[String]) -> Result<Macro, KeyboardError> {
    actions
        .iter()
        .map(|a| parse_macro_action(table, a))
        .collect()
}

fn format_keys(table: &KeycodeTable, keys: &[Keycode]) -> String {
    keys.iter()
        .map(|&k| table.serialize(k))
        .collect::<Vec<_>>()
        .join(&KEY_SEPARATOR.to_string())
}

/// Inverse of [`parse_macro_action`]
pub fn format_macro_action(table: &KeycodeTable, action: &MacroAction) -> String {
    match action {
        MacroAction::Text(text) => format!("text:{text}"),
        MacroAction::Tap(keys) => format!("tap:{}", format_keys(table, keys)),
        MacroAction::Down(keys) => format!("down:{}", format_keys(table, keys)),
        MacroAction::Up(keys) => format!("up:{}", format_keys(table, keys)),
        MacroAction::Delay(ms) => format!("delay:{ms}"),
    }
}

/// Human-readable setting value
pub fn format_setting(layout: Option<&SettingLayout>, value: &[u8]) -> String {
    match layout.map(|l| l.kind) {
        Some(SettingKind::Integer) => value_as_u32(value).to_string(),
        Some(SettingKind::Flags(flags)) => {
            let set: Vec<&str> = flags
                .iter()
                .filter(|(_, bit)| get_bit(value, *bit))
                .map(|(name, _)| *name)
                .collect();
            if set.is_empty() {
                "-".to_string()
            } else {
                set.join(",")
            }
        }
        None => value.iter().map(|b| format!("{b:02x}")).collect(),
    }
}
