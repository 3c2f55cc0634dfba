//! Offline keycode conversion.

use vial_keyboard::{KeycodeTable, KeycodeVersion};

use super::CommandResult;

/// Print the numeric value and canonical name of a keycode
pub fn keycode(value: &str, v5: bool) -> CommandResult {
    let version = if v5 { KeycodeVersion::V5 } else { KeycodeVersion::V6 };
    let table = KeycodeTable::new(version);
    let kc = table.deserialize(value)?;
    println!("0x{kc:04X}  {}", table.serialize(kc));
    Ok(())
}
