//! Command handlers for the CLI application.
//!
//! - `query`: list, info
//! - `keymap`: keymap dump, set-key, set-encoder, layout options
//! - `macros`: macro listing and editing
//! - `settings`: QMK settings
//! - `dynamic`: tap dance, combo, key override, alt-repeat-key
//! - `unlock`: unlock status, unlock, lock
//! - `keycode`: offline keycode conversion
//! - `utility`: watch

pub mod dynamic;
pub mod keycode;
pub mod keymap;
pub mod macros;
pub mod query;
pub mod settings;
pub mod unlock;
pub mod utility;

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context as _};
use tracing::debug;
use vial_driver::config::DriverConfig;
use vial_keyboard::{open_session, DeviceSession, KeyboardDefinition, UnlockPoll};
use vial_transport::{DeviceDiscovery, DiscoveredDevice, HidDiscovery};

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Options shared by every device command
pub struct Context {
    pub config: DriverConfig,
    pub device: Option<String>,
    pub definition: Option<PathBuf>,
}

impl Context {
    pub fn discovery(&self) -> HidDiscovery {
        HidDiscovery::with_via_only(self.config.include_via_only)
    }

    /// Pick the requested keyboard, or the first one found
    fn select_device(&self, discovery: &HidDiscovery) -> anyhow::Result<DiscoveredDevice> {
        let devices = discovery.list_devices()?;
        let found = match &self.device {
            Some(path) => devices.into_iter().find(|d| &d.info.device_path == path),
            None => devices.into_iter().next(),
        };
        found.ok_or_else(|| match &self.device {
            Some(path) => anyhow!("no keyboard at {path}"),
            None => anyhow!("no Vial keyboard found (use --via for VIA-only firmware)"),
        })
    }

    /// Open a keyboard and load its full state
    pub fn open(&self) -> anyhow::Result<DeviceSession> {
        let discovery = self.discovery();
        let device = self.select_device(&discovery)?;
        debug!(path = %device.info.device_path, kind = ?device.info.kind, "opening keyboard");

        let mut session = open_session(&discovery, &device, self.config.transport)?
            .with_unlock_policy(self.config.unlock);

        if let Some(path) = &self.definition {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read definition {}", path.display()))?;
            session = session.with_definition(KeyboardDefinition::from_json(&text)?);
        }
        session.set_unlock_observer(Some(Box::new(print_unlock_progress)));

        session.reload().context("reload keyboard state")?;
        Ok(session)
    }
}

/// Open a keyboard and run a closure with it.
pub fn with_session<F>(ctx: &Context, f: F) -> CommandResult
where
    F: FnOnce(&mut DeviceSession) -> CommandResult,
{
    let mut session = ctx.open()?;
    f(&mut session)
}

fn print_unlock_progress(poll: &UnlockPoll) {
    if poll.unlocked {
        println!("\rUnlocked.                         ");
    } else {
        print!("\rHold the unlock keys... {:>3}", poll.counter);
        let _ = std::io::stdout().flush();
    }
}

/// Parse a decimal or 0x-prefixed hex number
pub fn parse_number(text: &str) -> anyhow::Result<u32> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("invalid number {text:?}"))
}

/// Set up a Ctrl-C handler that sets the given flag to false when triggered.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    if let Err(e) = ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    running
}
