//! Macro command handlers.

use vial_driver::format::{format_macro_action, parse_macro};
use vial_keyboard::macros::serialize_set;

use super::{with_session, CommandResult, Context};

/// List every macro slot
pub fn macros(ctx: &Context) -> CommandResult {
    with_session(ctx, |session| {
        let state = session.state()?;
        let used = serialize_set(state.macro_dialect, &state.macros)?.len();
        println!(
            "Macros: {} slots, {}/{} bytes used",
            state.macro_count, used, state.macro_memory
        );
        for (i, actions) in state.macros.iter().enumerate() {
            if actions.is_empty() {
                continue;
            }
            let text: Vec<String> = actions
                .iter()
                .map(|a| format_macro_action(&state.keycodes, a))
                .collect();
            println!("  M{i}: {}", text.join(" "));
        }
        Ok(())
    })
}

/// Replace one macro; no actions clears it
pub fn set_macro(ctx: &Context, index: usize, actions: &[String]) -> CommandResult {
    with_session(ctx, |session| {
        let parsed = parse_macro(session.keycodes()?, actions)?;
        session.set_macro(index, parsed)?;
        println!("Macro {index} saved.");
        Ok(())
    })
}
