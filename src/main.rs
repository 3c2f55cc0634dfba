//! Vial Keyboard Driver CLI
//!
//! A command-line interface for configuring Vial and VIA keyboards.

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vial_driver::DriverConfig;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;
use commands::Context;

fn init_logging(default_filter: &str, override_filter: Option<&str>) {
    let filter = match override_filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(DriverConfig::default_path);
    let mut config = DriverConfig::load(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    init_logging(&config.log_level, cli.log_level.as_deref());
    if cli.via {
        config.include_via_only = true;
    }

    let ctx = Context {
        config,
        device: cli.device,
        definition: cli.definition,
    };

    match cli.command {
        None | Some(Commands::Info) => commands::query::info(&ctx),

        // === Query Commands ===
        Some(Commands::List) => commands::query::list(&ctx),
        Some(Commands::Keymap { layer, json }) => commands::keymap::keymap(&ctx, layer, json),
        Some(Commands::Keycode { value, v5 }) => commands::keycode::keycode(&value, v5),

        // === Keymap Commands ===
        Some(Commands::SetKey {
            layer,
            row,
            col,
            keycode,
        }) => commands::keymap::set_key(&ctx, layer, row, col, &keycode),
        Some(Commands::SetEncoder {
            layer,
            index,
            direction,
            keycode,
        }) => commands::keymap::set_encoder(&ctx, layer, index, direction, &keycode),
        Some(Commands::LayoutOptions { value }) => {
            commands::keymap::layout_options(&ctx, value.as_deref())
        }

        // === Macro Commands ===
        Some(Commands::Macros) => commands::macros::macros(&ctx),
        Some(Commands::SetMacro { index, actions }) => {
            commands::macros::set_macro(&ctx, index, &actions)
        }

        // === Settings Commands ===
        Some(Commands::Settings) => commands::settings::settings(&ctx),
        Some(Commands::SetSetting { qsid, value }) => {
            commands::settings::set_setting(&ctx, qsid, &value)
        }
        Some(Commands::ResetSettings) => commands::settings::reset_settings(&ctx),

        // === Dynamic Entry Commands ===
        Some(Commands::Dynamic) => commands::dynamic::dynamic(&ctx),
        Some(Commands::SetTapDance {
            index,
            on_tap,
            on_hold,
            on_double_tap,
            on_tap_hold,
            tapping_term,
        }) => commands::dynamic::set_tap_dance(
            &ctx,
            index,
            [on_tap.as_str(), on_hold.as_str(), on_double_tap.as_str(), on_tap_hold.as_str()],
            tapping_term,
        ),
        Some(Commands::SetCombo {
            index,
            inputs,
            output,
        }) => commands::dynamic::set_combo(&ctx, index, &inputs, &output),
        Some(Commands::SetKeyOverride {
            index,
            trigger,
            replacement,
            layers,
            trigger_mods,
            negative_mods,
            suppressed_mods,
            options,
        }) => commands::dynamic::set_key_override(
            &ctx,
            index,
            &trigger,
            &replacement,
            &layers,
            trigger_mods,
            negative_mods,
            suppressed_mods,
            options,
        ),
        Some(Commands::SetAltRepeatKey {
            index,
            keycode,
            alt_keycode,
            allowed_mods,
            options,
        }) => commands::dynamic::set_alt_repeat_key(
            &ctx,
            index,
            &keycode,
            &alt_keycode,
            allowed_mods,
            options,
        ),

        // === Security Commands ===
        Some(Commands::UnlockStatus) => commands::unlock::unlock_status(&ctx),
        Some(Commands::Unlock) => commands::unlock::unlock(&ctx),
        Some(Commands::Lock) => commands::unlock::lock(&ctx),

        // === Utility Commands ===
        Some(Commands::Watch) => commands::utility::watch(&ctx),
    }
}
