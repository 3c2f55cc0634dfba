//! Dynamic entry command handlers (tap dance, combo, key override, alt-repeat-key).

use anyhow::bail;
use vial_keyboard::{AltRepeatKey, Combo, KeyOverride, KeycodeTable, TapDance};

use super::{parse_number, with_session, CommandResult, Context};

/// Print every non-empty dynamic entry
pub fn dynamic(ctx: &Context) -> CommandResult {
    with_session(ctx, |session| {
        let state = session.state()?;
        if !state.supports_dynamic() {
            println!("Keyboard does not support dynamic entries (Vial protocol {}).", state.vial_protocol);
            return Ok(());
        }
        let kc = |k| state.keycodes.serialize(k);
        let entries = &state.dynamic;

        println!("Tap dance ({}):", entries.tap_dances.len());
        for (i, td) in entries.tap_dances.iter().enumerate() {
            if *td == TapDance::default() {
                continue;
            }
            println!(
                "  TD({i}): tap={} hold={} double={} tap_hold={} term={}ms",
                kc(td.on_tap()),
                kc(td.on_hold()),
                kc(td.on_double_tap()),
                kc(td.on_tap_hold()),
                td.tapping_term()
            );
        }

        println!("Combos ({}):", entries.combos.len());
        for (i, combo) in entries.combos.iter().enumerate() {
            if *combo == Combo::default() {
                continue;
            }
            let inputs: Vec<String> = combo
                .inputs()
                .into_iter()
                .filter(|&k| k != 0)
                .map(kc)
                .collect();
            println!("  {i}: {} -> {}", inputs.join("+"), kc(combo.output()));
        }

        println!("Key overrides ({}):", entries.key_overrides.len());
        for (i, ko) in entries.key_overrides.iter().enumerate() {
            if *ko == KeyOverride::default() {
                continue;
            }
            println!(
                "  {i}: {} -> {} layers=0x{:04X} mods=0x{:02X}/0x{:02X}/0x{:02X} options=0x{:02X}{}",
                kc(ko.trigger()),
                kc(ko.replacement()),
                ko.layers(),
                ko.trigger_mods(),
                ko.negative_mod_mask(),
                ko.suppressed_mods(),
                ko.options(),
                if ko.is_enabled() { "" } else { " (disabled)" }
            );
        }

        if !entries.alt_repeat_keys.is_empty() {
            println!("Alt-repeat keys ({}):", entries.alt_repeat_keys.len());
            for (i, ar) in entries.alt_repeat_keys.iter().enumerate() {
                if *ar == AltRepeatKey::default() {
                    continue;
                }
                println!(
                    "  {i}: {} -> {} allowed_mods=0x{:02X} options=0x{:02X}",
                    kc(ar.keycode()),
                    kc(ar.alt_keycode()),
                    ar.allowed_mods(),
                    ar.options()
                );
            }
        }
        Ok(())
    })
}

pub fn set_tap_dance(
    ctx: &Context,
    index: u8,
    keys: [&str; 4],
    tapping_term: u16,
) -> CommandResult {
    with_session(ctx, |session| {
        let [tap, hold, double, tap_hold] = parse_keys(session.keycodes()?, keys)?;
        session.set_dynamic(index, TapDance::new(tap, hold, double, tap_hold, tapping_term))?;
        println!("Tap dance {index} saved.");
        Ok(())
    })
}

pub fn set_combo(ctx: &Context, index: u8, inputs: &str, output: &str) -> CommandResult {
    with_session(ctx, |session| {
        let table = session.keycodes()?;
        let names: Vec<&str> = inputs.split(',').map(str::trim).collect();
        if names.is_empty() || names.len() > 4 {
            bail!("a combo takes 1 to 4 input keys");
        }
        let mut keys = [0u16; 4];
        for (slot, name) in keys.iter_mut().zip(names) {
            *slot = table.deserialize(name)?;
        }
        let output = table.deserialize(output)?;
        session.set_dynamic(index, Combo::new(keys, output))?;
        println!("Combo {index} saved.");
        Ok(())
    })
}

#[allow(clippy::too_many_arguments)]
pub fn set_key_override(
    ctx: &Context,
    index: u8,
    trigger: &str,
    replacement: &str,
    layers: &str,
    trigger_mods: u8,
    negative_mods: u8,
    suppressed_mods: u8,
    options: u8,
) -> CommandResult {
    let layers = u16::try_from(parse_number(layers)?)?;
    with_session(ctx, |session| {
        let table = session.keycodes()?;
        let record = KeyOverride::new(table.deserialize(trigger)?, table.deserialize(replacement)?, layers)
            .with_mods(trigger_mods, negative_mods, suppressed_mods)
            .with_options(options);
        session.set_dynamic(index, record)?;
        println!("Key override {index} saved.");
        Ok(())
    })
}

pub fn set_alt_repeat_key(
    ctx: &Context,
    index: u8,
    keycode: &str,
    alt_keycode: &str,
    allowed_mods: u8,
    options: u8,
) -> CommandResult {
    with_session(ctx, |session| {
        let table = session.keycodes()?;
        let record = AltRepeatKey::new(
            table.deserialize(keycode)?,
            table.deserialize(alt_keycode)?,
            allowed_mods,
            options,
        );
        session.set_dynamic(index, record)?;
        println!("Alt-repeat key {index} saved.");
        Ok(())
    })
}

fn parse_keys<const N: usize>(table: &KeycodeTable, names: [&str; N]) -> anyhow::Result<[u16; N]> {
    let mut out = [0u16; N];
    for (slot, name) in out.iter_mut().zip(names) {
        *slot = table.deserialize(name)?;
    }
    Ok(out)
}
