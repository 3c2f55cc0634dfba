//! QMK settings command handlers.

use anyhow::anyhow;
use vial_driver::format::format_setting;
use vial_keyboard::settings::{u32_to_value, with_bit};
use vial_keyboard::SettingKind;

use super::{parse_number, with_session, CommandResult, Context};

/// List every supported setting
pub fn settings(ctx: &Context) -> CommandResult {
    with_session(ctx, |session| {
        let state = session.state()?;
        if state.settings.is_empty() {
            println!("Keyboard reports no QMK settings.");
            return Ok(());
        }
        let schema = session.settings_schema();
        for (qsid, value) in &state.settings {
            let layout = schema.layout(*qsid);
            let name = layout.as_ref().map(|l| l.name).unwrap_or("unknown");
            println!(
                "  {qsid:>3}  {name:<28} {}",
                format_setting(layout.as_ref(), value)
            );
        }
        Ok(())
    })
}

/// Set one setting from a number or a list of flag names
pub fn set_setting(ctx: &Context, qsid: u16, value: &str) -> CommandResult {
    with_session(ctx, |session| {
        let layout = session.settings_schema().layout(qsid);
        let bytes = match &layout {
            Some(layout) => match layout.kind {
                SettingKind::Integer => u32_to_value(parse_number(value)?, layout.width),
                SettingKind::Flags(_) => {
                    let mut bytes = vec![0; layout.width];
                    for flag in value.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                        let bit = layout
                            .bit(flag)
                            .ok_or_else(|| anyhow!("{} has no flag {flag:?}", layout.name))?;
                        bytes = with_bit(&bytes, bit, true);
                    }
                    bytes
                }
            },
            None => u32_to_value(parse_number(value)?, session.get_setting(qsid)?.len()),
        };

        session.set_setting(qsid, bytes)?;
        let current = session.get_setting(qsid)?;
        println!("Setting {qsid} = {}", format_setting(layout.as_ref(), current));
        Ok(())
    })
}

/// Restore firmware defaults
pub fn reset_settings(ctx: &Context) -> CommandResult {
    with_session(ctx, |session| {
        session.reset_settings()?;
        println!("Settings reset ({} re-read).", session.state()?.settings.len());
        Ok(())
    })
}
