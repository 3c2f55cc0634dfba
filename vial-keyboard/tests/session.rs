//! Device session tests against the emulated firmware

mod common;

use std::sync::Arc;

use common::{Emulator, EmulatorConfig};
use parking_lot::Mutex;
use vial_keyboard::definition::KeyboardDefinition;
use vial_keyboard::dynamic::{Combo, TapDance};
use vial_keyboard::keymap::direction;
use vial_keyboard::macros::{MacroAction, MacroDialect};
use vial_keyboard::session::LightingCollaborator;
use vial_keyboard::{KeyboardError, KeycodeVersion, UnlockPoll};
use vial_transport::protocol::{cmd, dynamic, keyboard_value, vial};
use vial_transport::{FlowControlTransport, TransportError};

const UNLOCK_START: &[u8] = &[cmd::VIAL_PREFIX, vial::UNLOCK_START];
const UNLOCK_POLL: &[u8] = &[cmd::VIAL_PREFIX, vial::UNLOCK_POLL];

#[test]
fn test_reload_populates_mirror() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.session();
    assert!(!session.is_loaded());
    session.reload().unwrap();

    let state = session.state().unwrap();
    assert_eq!(state.via_protocol, 9);
    assert_eq!(state.vial_protocol, 6);
    assert_eq!(state.keyboard_id, 0x1122_3344_5566_7788);
    assert_eq!(state.layers, 2);
    assert_eq!((state.definition.rows, state.definition.cols), (2, 2));
    assert_eq!(state.encoder_count(), 1);
    assert_eq!(state.layout_options, Some(0));
    assert_eq!(state.macro_dialect, MacroDialect::V2);
    assert_eq!(state.macros.len(), 4);
    assert_eq!(state.macros[0], vec![MacroAction::Text("hi".into())]);
    assert!(state.macros[1..].iter().all(Vec::is_empty));
    assert_eq!(state.settings.keys().copied().collect::<Vec<_>>(), vec![2, 7, 8]);
    assert_eq!(state.settings[&7], vec![200, 0]);
    assert_eq!(state.dynamic.tap_dances.len(), common::TAP_DANCE_COUNT);
    assert_eq!(state.dynamic.combos.len(), common::COMBO_COUNT);
    assert_eq!(state.dynamic.key_overrides.len(), common::KEY_OVERRIDE_COUNT);
    assert_eq!(state.dynamic.alt_repeat_keys.len(), common::ALT_REPEAT_KEY_COUNT);
    assert!(state.dynamic.counts.features.caps_word);
    assert_eq!(state.keycodes.version(), KeycodeVersion::V6);
    assert_eq!(state.keycodes.deserialize("CK_TEST").unwrap(), 0x7E00);
}

#[test]
fn test_keymap_scenario() {
    let emu = Emulator::new(EmulatorConfig::default());
    emu.set_keymap(vec![1, 2, 3, 4, 5, 6, 7, 8]);
    let session = emu.loaded_session();
    let keymap = session.keymap().unwrap();
    assert_eq!(keymap.get(0, 0, 0), Some(1));
    assert_eq!(keymap.get(1, 1, 1), Some(8));
    assert_eq!(keymap.encoder(1, 0, direction::COUNTER_CLOCKWISE), Some(0x80));
    assert_eq!(keymap.encoder(1, 0, direction::CLOCKWISE), Some(0x81));
}

#[test]
fn test_reload_request_order() {
    let emu = Emulator::new(EmulatorConfig::default());
    emu.session().reload().unwrap();

    let steps = [
        vec![cmd::GET_PROTOCOL_VERSION],
        vec![cmd::VIAL_PREFIX, vial::GET_KEYBOARD_ID],
        vec![cmd::VIAL_PREFIX, vial::GET_DEFINITION],
        vec![cmd::GET_LAYER_COUNT],
        vec![cmd::KEYMAP_GET_BUFFER],
        vec![cmd::VIAL_PREFIX, vial::GET_ENCODER],
        vec![cmd::GET_KEYBOARD_VALUE, keyboard_value::LAYOUT_OPTIONS],
        vec![cmd::MACRO_GET_COUNT],
        vec![cmd::MACRO_GET_BUFFER],
        vec![cmd::VIAL_PREFIX, vial::QMK_SETTINGS_QUERY],
        vec![cmd::VIAL_PREFIX, vial::DYNAMIC_ENTRY_OP],
    ];
    let positions: Vec<usize> = steps
        .iter()
        .map(|s| emu.position_of(s).unwrap_or_else(|| panic!("missing {s:02x?}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");

    // One encoder request per (layer, encoder)
    assert_eq!(emu.count_of(&[cmd::VIAL_PREFIX, vial::GET_ENCODER]), 2);
    // 2 layers x 2 x 2 x 2 bytes in one chunk; 64 macro bytes in three
    assert_eq!(emu.count_of(&[cmd::KEYMAP_GET_BUFFER]), 1);
    assert_eq!(emu.count_of(&[cmd::MACRO_GET_BUFFER]), 3);
}

#[test]
fn test_set_key_write_avoidance() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();

    session.set_key(1, 1, 0, 0x0004).unwrap();
    session.set_key(1, 1, 0, 0x0004).unwrap();

    assert_eq!(emu.count_of(&[cmd::SET_KEYCODE]), 1);
    assert_eq!(
        emu.requests()[0][..6],
        [cmd::SET_KEYCODE, 1, 1, 0, 0x00, 0x04]
    );
    assert_eq!(emu.keycode_at(1, 1, 0), 0x0004);
    assert_eq!(session.keymap().unwrap().get(1, 1, 0), Some(0x0004));
}

#[test]
fn test_set_key_unchanged_value_sends_nothing() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    let current = session.keymap().unwrap().get(0, 0, 1).unwrap();
    session.set_key(0, 0, 1, current).unwrap();
    assert!(emu.requests().is_empty());
}

#[test]
fn test_set_key_out_of_range() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    let err = session.set_key(0, 2, 0, 0x04).unwrap_err();
    assert!(matches!(err, KeyboardError::InvalidParameter(_)));
    assert!(emu.requests().is_empty());
}

#[test]
fn test_reset_keycode_unlocks_first() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    let reset = session.keycodes().unwrap().reset_keycode();
    assert_eq!(reset, 0x7C00);

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    session.set_unlock_observer(Some(Box::new(move |poll: &UnlockPoll| {
        sink.lock().push(poll.counter)
    })));

    session.set_key(0, 0, 0, reset).unwrap();

    let start = emu.position_of(UNLOCK_START).unwrap();
    let poll = emu.position_of(UNLOCK_POLL).unwrap();
    let write = emu.position_of(&[cmd::SET_KEYCODE]).unwrap();
    assert!(start < poll && poll < write);
    assert_eq!(emu.count_of(UNLOCK_POLL), 3);
    assert_eq!(*progress.lock(), vec![2, 1, 0]);
    assert_eq!(emu.keycode_at(0, 0, 0), reset);
    assert_eq!(emu.rejected_writes(), 0);
}

#[test]
fn test_plain_key_needs_no_unlock() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    session.set_key(0, 0, 0, 0x0029).unwrap();
    assert_eq!(emu.position_of(UNLOCK_START), None);
    assert!(!emu.is_unlocked());
}

#[test]
fn test_abandoned_unlock_blocks_write() {
    let emu = Emulator::new(EmulatorConfig {
        unlock_polls: 50,
        ..Default::default()
    });
    let mut session = emu.loaded_session();
    let reset = session.keycodes().unwrap().reset_keycode();
    let before = session.keymap().unwrap().get(0, 0, 0);

    let err = session.set_key(0, 0, 0, reset).unwrap_err();
    assert!(matches!(err, KeyboardError::UnlockAbandoned));
    assert_eq!(emu.position_of(&[cmd::SET_KEYCODE]), None);
    assert_eq!(session.keymap().unwrap().get(0, 0, 0), before);
}

#[test]
fn test_set_encoder() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();

    session.set_encoder(0, 0, direction::CLOCKWISE, 0x00E9).unwrap();
    session.set_encoder(0, 0, direction::CLOCKWISE, 0x00E9).unwrap();
    assert_eq!(emu.count_of(&[cmd::VIAL_PREFIX, vial::SET_ENCODER]), 1);
    assert_eq!(
        emu.requests()[0][..7],
        [cmd::VIAL_PREFIX, vial::SET_ENCODER, 0, 0, 1, 0x00, 0xE9]
    );
    assert_eq!(emu.encoder(0, 0), [0x0080, 0x00E9]);

    assert!(matches!(
        session.set_encoder(0, 1, 0, 0x04),
        Err(KeyboardError::InvalidParameter(_))
    ));
}

#[test]
fn test_set_layout_options() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    session.set_layout_options(1).unwrap();
    session.set_layout_options(1).unwrap();
    assert_eq!(emu.count_of(&[cmd::SET_KEYBOARD_VALUE]), 1);
    assert_eq!(emu.layout_options(), 1);
}

#[test]
fn test_set_macro_unlocks_and_stores() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();

    session
        .set_macro(1, vec![MacroAction::Tap(vec![0x04]), MacroAction::Delay(100)])
        .unwrap();

    let poll = emu.position_of(UNLOCK_POLL).unwrap();
    let store = emu.position_of(&[cmd::MACRO_SET_BUFFER]).unwrap();
    assert!(poll < store);

    // "hi" NUL, tap A, delay 100, NUL, then two empty macros
    let memory = emu.macro_memory();
    assert_eq!(
        &memory[..13],
        &[b'h', b'i', 0, 1, 1, 0x04, 1, 4, 101, 1, 0, 0, 0]
    );
    assert_eq!(session.macros().unwrap()[1].len(), 2);
    assert_eq!(emu.rejected_writes(), 0);
}

#[test]
fn test_unchanged_macros_not_written() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    let macros = session.macros().unwrap().to_vec();
    session.set_macros(macros).unwrap();
    assert!(emu.requests().is_empty());
}

#[test]
fn test_macro_overflow_rejected_before_transfer() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    let long = vec![MacroAction::Text("x".repeat(80))];

    let err = session.set_macro(0, long).unwrap_err();
    assert!(matches!(err, KeyboardError::BufferTooLarge { max: 64, .. }));
    assert!(emu.requests().is_empty());
    assert_eq!(session.macros().unwrap()[0], vec![MacroAction::Text("hi".into())]);
}

#[test]
fn test_macro_count_mismatch() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    assert!(matches!(
        session.set_macros(vec![Vec::new()]),
        Err(KeyboardError::InvalidParameter(_))
    ));
}

#[test]
fn test_delay_rejected_on_v1_dialect() {
    let emu = Emulator::new(EmulatorConfig {
        vial_protocol: 1,
        ..Default::default()
    });
    let mut session = emu.loaded_session();
    assert_eq!(session.state().unwrap().macro_dialect, MacroDialect::V1);
    let err = session
        .set_macro(0, vec![MacroAction::Delay(10)])
        .unwrap_err();
    assert!(matches!(err, KeyboardError::Macro(_)));
    assert!(emu.requests().is_empty());
}

#[test]
fn test_settings_roundtrip() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();

    session.set_setting(7, vec![0x2C, 0x01]).unwrap();
    session.set_setting(7, vec![0x2C, 0x01]).unwrap();
    assert_eq!(emu.count_of(&[cmd::VIAL_PREFIX, vial::QMK_SETTINGS_SET]), 1);
    assert_eq!(emu.setting(7), Some(vec![0x2C, 0x01]));
    assert_eq!(session.get_setting(7).unwrap(), &[0x2C, 0x01]);

    assert!(matches!(
        session.set_setting(99, vec![1]),
        Err(KeyboardError::InvalidParameter(_))
    ));

    session.reset_settings().unwrap();
    assert_eq!(session.get_setting(7).unwrap(), &[200, 0]);
    assert_eq!(emu.setting(7), Some(vec![200, 0]));
}

#[test]
fn test_reload_skips_rejected_and_unknown_settings() {
    let emu = Emulator::new(EmulatorConfig::default());
    emu.reject_setting_read(7);
    emu.add_setting(999, vec![1, 2, 3]);

    let mut session = emu.session();
    session.reload().unwrap();

    let state = session.state().unwrap();
    assert_eq!(state.settings.keys().copied().collect::<Vec<_>>(), vec![2, 8]);
    assert_eq!(state.settings[&2], vec![50, 0]);
    assert_eq!(state.dynamic.tap_dances.len(), common::TAP_DANCE_COUNT);

    let get = |qsid: u16| {
        let [lo, hi] = qsid.to_le_bytes();
        emu.count_of(&[cmd::VIAL_PREFIX, vial::QMK_SETTINGS_GET, lo, hi])
    };
    assert_eq!(get(7), 1);
    assert_eq!(get(999), 0);
}

#[test]
fn test_dynamic_write_avoidance() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();

    let td = TapDance::new(0x04, 0xE0, 0, 0, 200);
    session.set_dynamic(1, td).unwrap();
    session.set_dynamic(1, td).unwrap();

    let set = [cmd::VIAL_PREFIX, vial::DYNAMIC_ENTRY_OP, dynamic::TAP_DANCE_SET];
    assert_eq!(emu.count_of(&set), 1);
    assert_eq!(
        emu.dynamic_record(dynamic::TAP_DANCE_GET, 1),
        vec![0x04, 0, 0xE0, 0, 0, 0, 0, 0, 200, 0]
    );
    assert_eq!(session.dynamic().unwrap().tap_dances[1], td);

    let err = session.set_dynamic(5, td).unwrap_err();
    assert!(matches!(err, KeyboardError::InvalidParameter(_)));
}

#[test]
fn test_dynamic_reset_keycode_unlocks_first() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    let reset = session.keycodes().unwrap().reset_keycode();

    session
        .set_dynamic(0, Combo::new([0x04, 0x05, 0, 0], reset))
        .unwrap();

    let poll = emu.position_of(UNLOCK_POLL).unwrap();
    let write = emu
        .position_of(&[cmd::VIAL_PREFIX, vial::DYNAMIC_ENTRY_OP, dynamic::COMBO_SET])
        .unwrap();
    assert!(poll < write);
    assert_eq!(emu.rejected_writes(), 0);
}

#[test]
fn test_old_vial_skips_dynamic_and_settings() {
    let emu = Emulator::new(EmulatorConfig {
        vial_protocol: 3,
        ..Default::default()
    });
    let mut session = emu.session();
    session.reload().unwrap();
    assert_eq!(emu.position_of(&[cmd::VIAL_PREFIX, vial::QMK_SETTINGS_QUERY]), None);
    assert_eq!(emu.position_of(&[cmd::VIAL_PREFIX, vial::DYNAMIC_ENTRY_OP]), None);

    let state = session.state().unwrap();
    assert!(state.settings.is_empty());
    assert_eq!(state.keycodes.version(), KeycodeVersion::V5);
    assert!(matches!(
        session.set_dynamic(0, TapDance::default()),
        Err(KeyboardError::NotSupported(_))
    ));
}

#[test]
fn test_v5_skips_alt_repeat_keys() {
    let emu = Emulator::new(EmulatorConfig {
        vial_protocol: 5,
        ..Default::default()
    });
    let session = emu.loaded_session();
    let state = session.state().unwrap();
    assert!(state.dynamic.alt_repeat_keys.is_empty());
    assert_eq!(state.dynamic.tap_dances.len(), common::TAP_DANCE_COUNT);
    assert_eq!(state.keycodes.reset_keycode(), 0x5C00);
}

#[test]
fn test_unsupported_via_protocol() {
    let emu = Emulator::new(EmulatorConfig {
        via_protocol: 8,
        ..Default::default()
    });
    let mut session = emu.session();
    let err = session.reload().unwrap_err();
    assert!(matches!(
        err,
        KeyboardError::ProtocolVersionUnsupported { which: "VIA", version: 8 }
    ));
    assert!(!session.is_loaded());
    assert_eq!(emu.requests().len(), 1);
}

#[test]
fn test_unsupported_vial_protocol() {
    let emu = Emulator::new(EmulatorConfig {
        vial_protocol: 7,
        ..Default::default()
    });
    let err = emu.session().reload().unwrap_err();
    assert!(matches!(
        err,
        KeyboardError::ProtocolVersionUnsupported { which: "Vial", version: 7 }
    ));
}

#[test]
fn test_reload_abort_leaves_session_unloaded() {
    let emu = Emulator::new(EmulatorConfig::default());
    emu.fail_on(&[cmd::MACRO_GET_BUFFER]);
    let mut session = emu.session();

    let err = session.reload().unwrap_err();
    assert!(matches!(
        err,
        KeyboardError::Transport(TransportError::Failed { attempts: 2 })
    ));
    assert!(!session.is_loaded());
    assert!(matches!(session.keymap(), Err(KeyboardError::NotLoaded)));
    assert!(matches!(
        session.set_key(0, 0, 0, 0x04),
        Err(KeyboardError::NotLoaded)
    ));
}

#[test]
fn test_failed_reload_discards_previous_state() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.session();
    session.reload().unwrap();

    emu.fail_on(&[cmd::VIAL_PREFIX, vial::DYNAMIC_ENTRY_OP]);
    assert!(session.reload().is_err());
    assert!(!session.is_loaded());

    emu.clear_failures();
    session.reload().unwrap();
    assert!(session.is_loaded());
}

#[test]
fn test_failed_write_keeps_mirror() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();
    let before = session.keymap().unwrap().get(0, 1, 1);

    emu.fail_on(&[cmd::SET_KEYCODE]);
    assert!(session.set_key(0, 1, 1, 0x29).is_err());
    assert_eq!(session.keymap().unwrap().get(0, 1, 1), before);
    assert!(session.is_loaded());
}

struct RecordingLighting {
    calls: Arc<Mutex<usize>>,
}

impl LightingCollaborator for RecordingLighting {
    fn reload(
        &mut self,
        transport: &FlowControlTransport,
        definition: &KeyboardDefinition,
    ) -> Result<(), KeyboardError> {
        assert_eq!(definition.name.as_deref(), Some("Emulated"));
        transport.send(&[cmd::LIGHTING_GET_VALUE, 0x80])?;
        *self.calls.lock() += 1;
        Ok(())
    }
}

#[test]
fn test_lighting_runs_between_macros_and_settings() {
    let emu = Emulator::new(EmulatorConfig::default());
    let calls = Arc::new(Mutex::new(0));
    let mut session = emu.session().with_lighting(Box::new(RecordingLighting {
        calls: Arc::clone(&calls),
    }));
    session.reload().unwrap();

    assert_eq!(*calls.lock(), 1);
    let macros = emu.position_of(&[cmd::MACRO_GET_BUFFER]).unwrap();
    let lighting = emu.position_of(&[cmd::LIGHTING_GET_VALUE]).unwrap();
    let settings = emu
        .position_of(&[cmd::VIAL_PREFIX, vial::QMK_SETTINGS_QUERY])
        .unwrap();
    assert!(macros < lighting && lighting < settings);
}

#[test]
fn test_via_only_keyboard() {
    let emu = Emulator::new(EmulatorConfig {
        vial_protocol: -1,
        ..Default::default()
    });

    let mut session = emu.session();
    assert!(matches!(
        session.reload(),
        Err(KeyboardError::NotSupported(_))
    ));

    let json = r#"{"matrix": {"rows": 2, "cols": 2}, "layouts": {"keymap": [["0,0", "0,1"], ["1,0", "1,1"]]}}"#;
    let definition = KeyboardDefinition::from_json(json).unwrap();
    let mut session = emu.session().with_definition(definition);
    session.reload().unwrap();
    assert_eq!(emu.position_of(&[cmd::VIAL_PREFIX]), None);
    emu.device().clear_writes();

    let state = session.state().unwrap();
    assert_eq!(state.vial_protocol, -1);
    assert_eq!(state.encoder_count(), 0);
    assert!(session.unlock_status().unwrap().unlocked);

    // Reset keycode goes straight out without a challenge
    let reset = session.keycodes().unwrap().reset_keycode();
    session.set_key(0, 0, 0, reset).unwrap();
    assert_eq!(emu.requests().len(), 1);
}

#[test]
fn test_explicit_unlock_and_lock() {
    let emu = Emulator::new(EmulatorConfig::default());
    let mut session = emu.loaded_session();

    let status = session.unlock_status().unwrap();
    assert!(!status.unlocked);
    assert_eq!(status.keys, vec![(0, 0), (1, 1)]);

    session.unlock().unwrap();
    assert!(emu.is_unlocked());
    assert!(session.unlock_status().unwrap().unlocked);

    session.lock().unwrap();
    assert!(!emu.is_unlocked());
}
