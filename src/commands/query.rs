//! Query (read-only) command handlers.

use super::{with_session, CommandResult, Context};
use vial_keyboard::list_keyboards;
use vial_transport::FirmwareKind;

/// List connected keyboards
pub fn list(ctx: &Context) -> CommandResult {
    let devices = list_keyboards(&ctx.discovery())?;
    if devices.is_empty() {
        println!("No keyboards found.");
        return Ok(());
    }

    for dev in &devices {
        let info = &dev.info;
        let kind = match info.kind {
            FirmwareKind::Vial => "vial",
            FirmwareKind::ViaOnly => "via",
        };
        println!(
            "{:04X}:{:04X}  {:<4}  {:<30}  {}",
            info.vid,
            info.pid,
            kind,
            info.product_name.as_deref().unwrap_or("?"),
            info.device_path
        );
    }
    Ok(())
}

/// Show protocol versions and matrix geometry
pub fn info(ctx: &Context) -> CommandResult {
    with_session(ctx, |session| {
        let state = session.state()?;
        let info = session.transport().device_info();
        println!("Device:        {:04X}:{:04X} {}", info.vid, info.pid, info.device_path);
        if let Some(name) = &state.definition.name {
            println!("Name:          {name}");
        }
        println!("VIA protocol:  {}", state.via_protocol);
        println!("Vial protocol: {}", state.vial_protocol);
        println!("Keyboard id:   0x{:016X}", state.keyboard_id);
        println!(
            "Matrix:        {} layers x {} rows x {} cols",
            state.layers, state.definition.rows, state.definition.cols
        );
        println!("Encoders:      {}", state.encoder_count());
        println!(
            "Macros:        {} ({} bytes, dialect v{})",
            state.macro_count,
            state.macro_memory,
            state.macro_dialect.number()
        );
        if state.supports_dynamic() {
            let counts = &state.dynamic.counts;
            println!(
                "Dynamic:       {} tap dance, {} combo, {} key override, {} alt-repeat",
                counts.tap_dance, counts.combo, counts.key_override, counts.alt_repeat_key
            );
            println!(
                "Features:      caps_word={} layer_lock={}",
                counts.features.caps_word, counts.features.layer_lock
            );
        }
        println!("Settings:      {} supported", state.settings.len());
        if let Some(lighting) = &state.definition.lighting {
            println!("Lighting:      {lighting}");
        }
        Ok(())
    })
}
