// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vial_driver")]
#[command(author, version, about = "Vial/VIA keyboard configuration tool")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: <config dir>/vial-driver/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tracing filter, overrides RUST_LOG and the config file
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// HID path of the keyboard to open (default: first found)
    #[arg(long, short = 'd', global = true)]
    pub device: Option<String>,

    /// Also accept keyboards running plain VIA firmware
    #[arg(long, global = true)]
    pub via: bool,

    /// Keyboard definition JSON, required for VIA-only firmware
    #[arg(long, global = true, value_name = "FILE")]
    pub definition: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Encoder rotation direction
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Direction {
    /// Counter-clockwise
    Ccw,
    /// Clockwise
    Cw,
}

#[derive(Subcommand)]
pub enum Commands {
    // === Query Commands ===
    /// List connected keyboards
    #[command(visible_aliases = ["ls"])]
    List,

    /// Show protocol versions, keyboard id and matrix size
    #[command(visible_aliases = ["version", "i"])]
    Info,

    /// Dump the keymap
    #[command(visible_aliases = ["km", "k"])]
    Keymap {
        /// Only show this layer
        #[arg(short, long)]
        layer: Option<u8>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a keycode between name and number
    #[command(visible_alias = "kc")]
    Keycode {
        /// Name or expression (e.g. "LCTL(KC_A)") or number (e.g. 0x104)
        value: String,
        /// Use the legacy (Vial protocol < 6) numbering
        #[arg(long)]
        v5: bool,
    },

    // === Keymap Commands ===
    /// Assign a keycode to a key
    #[command(visible_alias = "sk")]
    SetKey {
        layer: u8,
        row: u8,
        col: u8,
        /// Keycode name, expression or number
        keycode: String,
    },

    /// Assign a keycode to an encoder direction
    #[command(visible_alias = "se")]
    SetEncoder {
        layer: u8,
        index: u8,
        #[arg(value_enum)]
        direction: Direction,
        keycode: String,
    },

    /// Show or set the packed layout options
    #[command(visible_aliases = ["layout", "lo"])]
    LayoutOptions {
        /// New packed value (e.g. 3 or 0x3)
        value: Option<String>,
    },

    // === Macro Commands ===
    /// List macros
    #[command(visible_alias = "m")]
    Macros,

    /// Replace one macro
    #[command(visible_alias = "sm")]
    SetMacro {
        index: usize,
        /// Actions: text:<s>, tap:<kc>[+<kc>..], down:<kc>, up:<kc>, delay:<ms>
        actions: Vec<String>,
    },

    // === Settings Commands ===
    /// List QMK settings
    #[command(visible_alias = "s")]
    Settings,

    /// Set a QMK setting
    #[command(visible_alias = "ss")]
    SetSetting {
        qsid: u16,
        /// Integer value, or comma-separated flag names for flag settings
        value: String,
    },

    /// Restore every QMK setting to its firmware default
    ResetSettings,

    // === Dynamic Entry Commands ===
    /// List tap dance, combo, key override and alt-repeat-key entries
    #[command(visible_alias = "dyn")]
    Dynamic,

    /// Set a tap dance entry
    #[command(visible_alias = "td")]
    SetTapDance {
        index: u8,
        on_tap: String,
        on_hold: String,
        on_double_tap: String,
        on_tap_hold: String,
        /// Tapping term in ms
        tapping_term: u16,
    },

    /// Set a combo entry
    SetCombo {
        index: u8,
        /// Up to four input keycodes, comma-separated
        inputs: String,
        output: String,
    },

    /// Set a key override entry
    SetKeyOverride {
        index: u8,
        trigger: String,
        replacement: String,
        /// Layer bitmask
        #[arg(long, default_value = "0xFFFF")]
        layers: String,
        #[arg(long, default_value_t = 0)]
        trigger_mods: u8,
        #[arg(long, default_value_t = 0)]
        negative_mods: u8,
        #[arg(long, default_value_t = 0)]
        suppressed_mods: u8,
        #[arg(long, default_value_t = 0x80)]
        options: u8,
    },

    /// Set an alt-repeat-key entry
    SetAltRepeatKey {
        index: u8,
        keycode: String,
        alt_keycode: String,
        #[arg(long, default_value_t = 0)]
        allowed_mods: u8,
        #[arg(long, default_value_t = 0x08)]
        options: u8,
    },

    // === Security Commands ===
    /// Show unlock status and the keys to hold
    UnlockStatus,

    /// Run the unlock challenge (hold the listed keys)
    #[command(visible_alias = "ul")]
    Unlock,

    /// Lock the keyboard again
    Lock,

    // === Utility Commands ===
    /// Watch for keyboards being plugged in or removed
    #[command(visible_alias = "w")]
    Watch,
}
