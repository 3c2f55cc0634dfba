//! Key remapping command handlers.

use anyhow::bail;
use serde_json::json;
use vial_keyboard::keymap::direction;
use vial_keyboard::{LayoutLabel, LayoutOptions};

use super::{parse_number, with_session, CommandResult, Context};
use crate::cli::Direction;

/// Dump the keymap as a grid of keycode names
pub fn keymap(ctx: &Context, only_layer: Option<u8>, as_json: bool) -> CommandResult {
    with_session(ctx, |session| {
        let state = session.state()?;
        let table = &state.keycodes;
        let layers: Vec<u8> = match only_layer {
            Some(l) if l >= state.layers => {
                bail!("layer {l} out of range (0-{})", state.layers.saturating_sub(1))
            }
            Some(l) => vec![l],
            None => (0..state.layers).collect(),
        };
        let encoders = state.encoder_count();

        if as_json {
            let out: Vec<_> = layers
                .iter()
                .map(|&l| {
                    let rows: Vec<Vec<String>> = state
                        .keymap
                        .layer(l)
                        .unwrap_or_default()
                        .iter()
                        .map(|row| row.iter().map(|&kc| table.serialize(kc)).collect())
                        .collect();
                    let encs: Vec<[String; 2]> = (0..encoders)
                        .map(|i| {
                            [direction::COUNTER_CLOCKWISE, direction::CLOCKWISE].map(|d| {
                                state
                                    .keymap
                                    .encoder(l, i, d)
                                    .map(|kc| table.serialize(kc))
                                    .unwrap_or_default()
                            })
                        })
                        .collect();
                    json!({ "layer": l, "keys": rows, "encoders": encs })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        for l in layers {
            println!("Layer {l}:");
            for (row_idx, row) in state.keymap.layer(l).unwrap_or_default().iter().enumerate() {
                let names: Vec<String> = row
                    .iter()
                    .map(|&kc| format!("{:<12}", table.serialize(kc)))
                    .collect();
                println!("  {row_idx:>2}: {}", names.join(" ").trim_end());
            }
            for i in 0..encoders {
                let name = |d| {
                    state
                        .keymap
                        .encoder(l, i, d)
                        .map(|kc| table.serialize(kc))
                        .unwrap_or_else(|| "?".to_string())
                };
                println!(
                    "  enc {i}: ccw={} cw={}",
                    name(direction::COUNTER_CLOCKWISE),
                    name(direction::CLOCKWISE)
                );
            }
        }
        Ok(())
    })
}

/// Assign a keycode to one key
pub fn set_key(ctx: &Context, layer: u8, row: u8, col: u8, keycode: &str) -> CommandResult {
    with_session(ctx, |session| {
        let kc = session.keycodes()?.deserialize(keycode)?;
        session.set_key(layer, row, col, kc)?;
        println!("Key ({layer},{row},{col}) = {}", session.keycodes()?.serialize(kc));
        Ok(())
    })
}

/// Assign a keycode to one encoder direction
pub fn set_encoder(
    ctx: &Context,
    layer: u8,
    index: u8,
    dir: Direction,
    keycode: &str,
) -> CommandResult {
    let dir = match dir {
        Direction::Ccw => direction::COUNTER_CLOCKWISE,
        Direction::Cw => direction::CLOCKWISE,
    };
    with_session(ctx, |session| {
        let kc = session.keycodes()?.deserialize(keycode)?;
        session.set_encoder(layer, index, dir, kc)?;
        println!("Encoder {index} layer {layer} = {}", session.keycodes()?.serialize(kc));
        Ok(())
    })
}

/// Show the layout options, or set them to a packed value
pub fn layout_options(ctx: &Context, value: Option<&str>) -> CommandResult {
    with_session(ctx, |session| {
        if let Some(value) = value {
            session.set_layout_options(parse_number(value)?)?;
        }

        let state = session.state()?;
        let labels = &state.definition.layout_labels;
        let Some(packed) = state.layout_options else {
            println!("Keyboard has no layout options.");
            return Ok(());
        };
        println!("Layout options: 0x{packed:08X}");
        let decoded = LayoutOptions::decode(labels, packed);
        for (label, choice) in labels.iter().zip(&decoded.choices) {
            match label {
                LayoutLabel::Toggle(title) => println!("  {title}: {}", *choice != 0),
                LayoutLabel::Select { title, choices } => println!(
                    "  {title}: {}",
                    choices
                        .get(*choice as usize)
                        .map(String::as_str)
                        .unwrap_or("?")
                ),
            }
        }
        Ok(())
    })
}
