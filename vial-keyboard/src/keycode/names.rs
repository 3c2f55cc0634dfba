//! Static keycode identifier tables
//!
//! Values follow QMK: the basic HID range below 0x100 is shared between
//! keycode table versions except for mouse keys, while quantum ranges moved
//! wholesale in the v6 renumbering.

/// One canonical identifier and the aliases accepted when parsing
pub(crate) struct KeyName {
    pub value: u16,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

const fn k(value: u16, name: &'static str) -> KeyName {
    KeyName {
        value,
        name,
        aliases: &[],
    }
}

const fn ka(value: u16, name: &'static str, aliases: &'static [&'static str]) -> KeyName {
    KeyName {
        value,
        name,
        aliases,
    }
}

/// HID usage page 0x07 keys, identical in both table versions
pub(crate) static BASIC: &[KeyName] = &[
    ka(0x00, "KC_NO", &["XXXXXXX"]),
    ka(0x01, "KC_TRNS", &["KC_TRANSPARENT", "_______"]),
    k(0x04, "KC_A"),
    k(0x05, "KC_B"),
    k(0x06, "KC_C"),
    k(0x07, "KC_D"),
    k(0x08, "KC_E"),
    k(0x09, "KC_F"),
    k(0x0A, "KC_G"),
    k(0x0B, "KC_H"),
    k(0x0C, "KC_I"),
    k(0x0D, "KC_J"),
    k(0x0E, "KC_K"),
    k(0x0F, "KC_L"),
    k(0x10, "KC_M"),
    k(0x11, "KC_N"),
    k(0x12, "KC_O"),
    k(0x13, "KC_P"),
    k(0x14, "KC_Q"),
    k(0x15, "KC_R"),
    k(0x16, "KC_S"),
    k(0x17, "KC_T"),
    k(0x18, "KC_U"),
    k(0x19, "KC_V"),
    k(0x1A, "KC_W"),
    k(0x1B, "KC_X"),
    k(0x1C, "KC_Y"),
    k(0x1D, "KC_Z"),
    k(0x1E, "KC_1"),
    k(0x1F, "KC_2"),
    k(0x20, "KC_3"),
    k(0x21, "KC_4"),
    k(0x22, "KC_5"),
    k(0x23, "KC_6"),
    k(0x24, "KC_7"),
    k(0x25, "KC_8"),
    k(0x26, "KC_9"),
    k(0x27, "KC_0"),
    ka(0x28, "KC_ENTER", &["KC_ENT"]),
    ka(0x29, "KC_ESCAPE", &["KC_ESC"]),
    ka(0x2A, "KC_BSPACE", &["KC_BSPC", "KC_BACKSPACE"]),
    k(0x2B, "KC_TAB"),
    ka(0x2C, "KC_SPACE", &["KC_SPC"]),
    ka(0x2D, "KC_MINUS", &["KC_MINS"]),
    ka(0x2E, "KC_EQUAL", &["KC_EQL"]),
    ka(0x2F, "KC_LBRACKET", &["KC_LBRC", "KC_LEFT_BRACKET"]),
    ka(0x30, "KC_RBRACKET", &["KC_RBRC", "KC_RIGHT_BRACKET"]),
    ka(0x31, "KC_BSLASH", &["KC_BSLS", "KC_BACKSLASH"]),
    ka(0x32, "KC_NONUS_HASH", &["KC_NUHS"]),
    ka(0x33, "KC_SCOLON", &["KC_SCLN", "KC_SEMICOLON"]),
    ka(0x34, "KC_QUOTE", &["KC_QUOT"]),
    ka(0x35, "KC_GRAVE", &["KC_GRV"]),
    ka(0x36, "KC_COMMA", &["KC_COMM"]),
    k(0x37, "KC_DOT"),
    ka(0x38, "KC_SLASH", &["KC_SLSH"]),
    ka(0x39, "KC_CAPSLOCK", &["KC_CAPS", "KC_CAPS_LOCK"]),
    k(0x3A, "KC_F1"),
    k(0x3B, "KC_F2"),
    k(0x3C, "KC_F3"),
    k(0x3D, "KC_F4"),
    k(0x3E, "KC_F5"),
    k(0x3F, "KC_F6"),
    k(0x40, "KC_F7"),
    k(0x41, "KC_F8"),
    k(0x42, "KC_F9"),
    k(0x43, "KC_F10"),
    k(0x44, "KC_F11"),
    k(0x45, "KC_F12"),
    ka(0x46, "KC_PSCREEN", &["KC_PSCR", "KC_PRINT_SCREEN"]),
    ka(0x47, "KC_SCROLLLOCK", &["KC_SLCK", "KC_SCRL"]),
    ka(0x48, "KC_PAUSE", &["KC_PAUS", "KC_BRK"]),
    ka(0x49, "KC_INSERT", &["KC_INS"]),
    k(0x4A, "KC_HOME"),
    ka(0x4B, "KC_PGUP", &["KC_PAGE_UP"]),
    ka(0x4C, "KC_DELETE", &["KC_DEL"]),
    k(0x4D, "KC_END"),
    ka(0x4E, "KC_PGDOWN", &["KC_PGDN", "KC_PAGE_DOWN"]),
    ka(0x4F, "KC_RIGHT", &["KC_RGHT"]),
    k(0x50, "KC_LEFT"),
    k(0x51, "KC_DOWN"),
    k(0x52, "KC_UP"),
    ka(0x53, "KC_NUMLOCK", &["KC_NLCK", "KC_NUM"]),
    ka(0x54, "KC_KP_SLASH", &["KC_PSLS"]),
    ka(0x55, "KC_KP_ASTERISK", &["KC_PAST"]),
    ka(0x56, "KC_KP_MINUS", &["KC_PMNS"]),
    ka(0x57, "KC_KP_PLUS", &["KC_PPLS"]),
    ka(0x58, "KC_KP_ENTER", &["KC_PENT"]),
    ka(0x59, "KC_KP_1", &["KC_P1"]),
    ka(0x5A, "KC_KP_2", &["KC_P2"]),
    ka(0x5B, "KC_KP_3", &["KC_P3"]),
    ka(0x5C, "KC_KP_4", &["KC_P4"]),
    ka(0x5D, "KC_KP_5", &["KC_P5"]),
    ka(0x5E, "KC_KP_6", &["KC_P6"]),
    ka(0x5F, "KC_KP_7", &["KC_P7"]),
    ka(0x60, "KC_KP_8", &["KC_P8"]),
    ka(0x61, "KC_KP_9", &["KC_P9"]),
    ka(0x62, "KC_KP_0", &["KC_P0"]),
    ka(0x63, "KC_KP_DOT", &["KC_PDOT"]),
    ka(0x64, "KC_NONUS_BSLASH", &["KC_NUBS"]),
    ka(0x65, "KC_APPLICATION", &["KC_APP"]),
    k(0x66, "KC_POWER"),
    ka(0x67, "KC_KP_EQUAL", &["KC_PEQL"]),
    k(0x68, "KC_F13"),
    k(0x69, "KC_F14"),
    k(0x6A, "KC_F15"),
    k(0x6B, "KC_F16"),
    k(0x6C, "KC_F17"),
    k(0x6D, "KC_F18"),
    k(0x6E, "KC_F19"),
    k(0x6F, "KC_F20"),
    k(0x70, "KC_F21"),
    k(0x71, "KC_F22"),
    k(0x72, "KC_F23"),
    k(0x73, "KC_F24"),
    ka(0x74, "KC_EXECUTE", &["KC_EXEC"]),
    k(0x75, "KC_HELP"),
    k(0x76, "KC_MENU"),
    ka(0x77, "KC_SELECT", &["KC_SLCT"]),
    k(0x78, "KC_STOP"),
    ka(0x79, "KC_AGAIN", &["KC_AGIN"]),
    k(0x7A, "KC_UNDO"),
    k(0x7B, "KC_CUT"),
    k(0x7C, "KC_COPY"),
    ka(0x7D, "KC_PASTE", &["KC_PSTE"]),
    k(0x7E, "KC_FIND"),
    ka(0x85, "KC_KP_COMMA", &["KC_PCMM"]),
    ka(0x87, "KC_RO", &["KC_INT1"]),
    ka(0x88, "KC_KANA", &["KC_INT2"]),
    ka(0x89, "KC_JYEN", &["KC_INT3"]),
    ka(0x8A, "KC_HENK", &["KC_INT4"]),
    ka(0x8B, "KC_MHEN", &["KC_INT5"]),
    k(0x8C, "KC_INT6"),
    k(0x8D, "KC_INT7"),
    k(0x8E, "KC_INT8"),
    k(0x8F, "KC_INT9"),
    ka(0x90, "KC_LANG1", &["KC_LNG1"]),
    ka(0x91, "KC_LANG2", &["KC_LNG2"]),
    ka(0x92, "KC_LANG3", &["KC_LNG3"]),
    ka(0x93, "KC_LANG4", &["KC_LNG4"]),
    ka(0x94, "KC_LANG5", &["KC_LNG5"]),
    ka(0xA5, "KC_PWR", &["KC_SYSTEM_POWER"]),
    ka(0xA6, "KC_SLEP", &["KC_SYSTEM_SLEEP"]),
    ka(0xA7, "KC_WAKE", &["KC_SYSTEM_WAKE"]),
    ka(0xA8, "KC_MUTE", &["KC_AUDIO_MUTE"]),
    ka(0xA9, "KC_VOLU", &["KC_AUDIO_VOL_UP"]),
    ka(0xAA, "KC_VOLD", &["KC_AUDIO_VOL_DOWN"]),
    ka(0xAB, "KC_MNXT", &["KC_MEDIA_NEXT_TRACK"]),
    ka(0xAC, "KC_MPRV", &["KC_MEDIA_PREV_TRACK"]),
    ka(0xAD, "KC_MSTP", &["KC_MEDIA_STOP"]),
    ka(0xAE, "KC_MPLY", &["KC_MEDIA_PLAY_PAUSE"]),
    ka(0xAF, "KC_MSEL", &["KC_MEDIA_SELECT"]),
    ka(0xB0, "KC_EJCT", &["KC_MEDIA_EJECT"]),
    k(0xB1, "KC_MAIL"),
    ka(0xB2, "KC_CALC", &["KC_CALCULATOR"]),
    ka(0xB3, "KC_MYCM", &["KC_MY_COMPUTER"]),
    k(0xB4, "KC_WWW_SEARCH"),
    k(0xB5, "KC_WWW_HOME"),
    k(0xB6, "KC_WWW_BACK"),
    k(0xB7, "KC_WWW_FORWARD"),
    k(0xB8, "KC_WWW_STOP"),
    k(0xB9, "KC_WWW_REFRESH"),
    k(0xBA, "KC_WWW_FAVORITES"),
    ka(0xBB, "KC_MFFD", &["KC_MEDIA_FAST_FORWARD"]),
    ka(0xBC, "KC_MRWD", &["KC_MEDIA_REWIND"]),
    ka(0xBD, "KC_BRIU", &["KC_BRIGHTNESS_UP"]),
    ka(0xBE, "KC_BRID", &["KC_BRIGHTNESS_DOWN"]),
    ka(0xE0, "KC_LCTRL", &["KC_LCTL"]),
    ka(0xE1, "KC_LSHIFT", &["KC_LSFT"]),
    k(0xE2, "KC_LALT"),
    ka(0xE3, "KC_LGUI", &["KC_LCMD", "KC_LWIN"]),
    ka(0xE4, "KC_RCTRL", &["KC_RCTL"]),
    ka(0xE5, "KC_RSHIFT", &["KC_RSFT"]),
    ka(0xE6, "KC_RALT", &["KC_ALGR"]),
    ka(0xE7, "KC_RGUI", &["KC_RCMD", "KC_RWIN"]),
];

/// Mouse keys before the v6 renumbering
pub(crate) static MOUSE_V5: &[KeyName] = &[
    k(0xF0, "KC_MS_U"),
    k(0xF1, "KC_MS_D"),
    k(0xF2, "KC_MS_L"),
    k(0xF3, "KC_MS_R"),
    k(0xF4, "KC_BTN1"),
    k(0xF5, "KC_BTN2"),
    k(0xF6, "KC_BTN3"),
    k(0xF7, "KC_BTN4"),
    k(0xF8, "KC_BTN5"),
    k(0xF9, "KC_WH_U"),
    k(0xFA, "KC_WH_D"),
    k(0xFB, "KC_WH_L"),
    k(0xFC, "KC_WH_R"),
    k(0xFD, "KC_ACL0"),
    k(0xFE, "KC_ACL1"),
    k(0xFF, "KC_ACL2"),
];

pub(crate) static MOUSE_V6: &[KeyName] = &[
    k(0xCD, "KC_MS_U"),
    k(0xCE, "KC_MS_D"),
    k(0xCF, "KC_MS_L"),
    k(0xD0, "KC_MS_R"),
    k(0xD1, "KC_BTN1"),
    k(0xD2, "KC_BTN2"),
    k(0xD3, "KC_BTN3"),
    k(0xD4, "KC_BTN4"),
    k(0xD5, "KC_BTN5"),
    k(0xD6, "KC_BTN6"),
    k(0xD7, "KC_BTN7"),
    k(0xD8, "KC_BTN8"),
    k(0xD9, "KC_WH_U"),
    k(0xDA, "KC_WH_D"),
    k(0xDB, "KC_WH_L"),
    k(0xDC, "KC_WH_R"),
    k(0xDD, "KC_ACL0"),
    k(0xDE, "KC_ACL1"),
    k(0xDF, "KC_ACL2"),
];

/// Quantum keys of the legacy numbering
pub(crate) static QUANTUM_V5: &[KeyName] = &[
    ka(0x5C00, "RESET", &["QK_BOOT"]),
    ka(0x5C01, "DEBUG", &["DB_TOGG"]),
    ka(0x5C16, "KC_GESC", &["QK_GESC"]),
    k(0x5CD7, "KC_LSPO"),
    k(0x5CD8, "KC_RSPC"),
    k(0x5CDF, "EEPROM_RESET"),
    k(0x5CE6, "KC_SFTENT"),
];

/// Quantum keys of the v6 numbering
pub(crate) static QUANTUM_V6: &[KeyName] = &[
    ka(0x7C00, "QK_BOOT", &["RESET", "QK_BOOTLOADER"]),
    ka(0x7C01, "QK_REBOOT", &["QK_RBT"]),
    ka(0x7C02, "DB_TOGG", &["DEBUG", "QK_DEBUG_TOGGLE"]),
    ka(0x7C03, "QK_CLEAR_EEPROM", &["EEPROM_RESET", "EE_CLR"]),
    ka(0x7C16, "QK_GESC", &["KC_GESC"]),
    ka(0x7C1A, "SC_LSPO", &["KC_LSPO"]),
    ka(0x7C1B, "SC_RSPC", &["KC_RSPC"]),
    ka(0x7C1E, "SC_SENT", &["KC_SFTENT"]),
    ka(0x7C73, "QK_CAPS_WORD_TOGGLE", &["CW_TOGG"]),
    ka(0x7C79, "QK_REPEAT_KEY", &["QK_REP"]),
    ka(0x7C7A, "QK_ALT_REPEAT_KEY", &["QK_AREP"]),
    ka(0x7C7B, "QK_LAYER_LOCK", &["QK_LLCK"]),
    k(0x7820, "RGB_TOG"),
    ka(0x7821, "RGB_MOD", &["RGB_MODE_FORWARD"]),
    ka(0x7822, "RGB_RMOD", &["RGB_MODE_REVERSE"]),
    k(0x7823, "RGB_HUI"),
    k(0x7824, "RGB_HUD"),
    k(0x7825, "RGB_SAI"),
    k(0x7826, "RGB_SAD"),
    k(0x7827, "RGB_VAI"),
    k(0x7828, "RGB_VAD"),
    k(0x7829, "RGB_SPI"),
    k(0x782A, "RGB_SPD"),
];

/// Shifted symbols, accepted when parsing only; they print as `LSFT(...)`
pub(crate) static SHIFTED: &[KeyName] = &[
    k(0x0235, "KC_TILD"),
    k(0x021E, "KC_EXLM"),
    k(0x021F, "KC_AT"),
    k(0x0220, "KC_HASH"),
    k(0x0221, "KC_DLR"),
    k(0x0222, "KC_PERC"),
    k(0x0223, "KC_CIRC"),
    k(0x0224, "KC_AMPR"),
    k(0x0225, "KC_ASTR"),
    k(0x0226, "KC_LPRN"),
    k(0x0227, "KC_RPRN"),
    k(0x022D, "KC_UNDS"),
    k(0x022E, "KC_PLUS"),
    k(0x022F, "KC_LCBR"),
    k(0x0230, "KC_RCBR"),
    k(0x0231, "KC_PIPE"),
    k(0x0233, "KC_COLN"),
    k(0x0234, "KC_DQUO"),
    k(0x0236, "KC_LT"),
    k(0x0237, "KC_GT"),
    k(0x0238, "KC_QUES"),
];

/// Named modifier combinations: (mod bits, wrapper, tap-hold variant)
pub(crate) static MODIFIER_MASKS: &[(u8, &str, &str)] = &[
    (0x01, "LCTL", "LCTL_T"),
    (0x02, "LSFT", "LSFT_T"),
    (0x04, "LALT", "LALT_T"),
    (0x08, "LGUI", "LGUI_T"),
    (0x11, "RCTL", "RCTL_T"),
    (0x12, "RSFT", "RSFT_T"),
    (0x14, "RALT", "RALT_T"),
    (0x18, "RGUI", "RGUI_T"),
    (0x03, "C_S", "C_S_T"),
    (0x05, "LCA", "LCA_T"),
    (0x06, "LSA", "LSA_T"),
    (0x07, "MEH", "MEH_T"),
    (0x09, "LCG", "LCG_T"),
    (0x0A, "SGUI", "SGUI_T"),
    (0x0C, "LAG", "LAG_T"),
    (0x0D, "LCAG", "LCAG_T"),
    (0x0F, "HYPR", "ALL_T"),
    (0x13, "RCS", "RCS_T"),
    (0x16, "RSA", "RSA_T"),
    (0x1D, "RCAG", "RCAG_T"),
];

/// One-shot modifiers exposed as exact keycodes: (mod bits, constant name)
pub(crate) static ONE_SHOT_MODS: &[(u8, &str)] = &[
    (0x01, "MOD_LCTL"),
    (0x02, "MOD_LSFT"),
    (0x04, "MOD_LALT"),
    (0x08, "MOD_LGUI"),
    (0x11, "MOD_RCTL"),
    (0x12, "MOD_RSFT"),
    (0x14, "MOD_RALT"),
    (0x18, "MOD_RGUI"),
    (0x07, "MOD_MEH"),
    (0x0F, "MOD_HYPR"),
];

/// Modifier bit constants, shared by both versions
pub(crate) static MOD_CONSTANTS: &[(&str, u16)] = &[
    ("MOD_LCTL", 0x01),
    ("MOD_LSFT", 0x02),
    ("MOD_LALT", 0x04),
    ("MOD_LGUI", 0x08),
    ("MOD_RCTL", 0x11),
    ("MOD_RSFT", 0x12),
    ("MOD_RALT", 0x14),
    ("MOD_RGUI", 0x18),
    ("MOD_MEH", 0x07),
    ("MOD_HYPR", 0x0F),
];

/// Range bases of the legacy numbering
pub(crate) static RANGES_V5: &[(&str, u16)] = &[
    ("QK_MODS", 0x0100),
    ("QK_FUNCTION", 0x2000),
    ("QK_LAYER_TAP", 0x4000),
    ("QK_TO", 0x5000),
    ("QK_MOMENTARY", 0x5100),
    ("QK_DEF_LAYER", 0x5200),
    ("QK_TOGGLE_LAYER", 0x5300),
    ("QK_ONE_SHOT_LAYER", 0x5400),
    ("QK_ONE_SHOT_MOD", 0x5500),
    ("QK_TAP_DANCE", 0x5700),
    ("QK_LAYER_TAP_TOGGLE", 0x5800),
    ("QK_LAYER_MOD", 0x5900),
    ("QK_MACRO", 0x5F12),
    ("QK_USER", 0x5F80),
    ("QK_MOD_TAP", 0x6000),
    ("ON_PRESS", 0x0001),
];

/// Range bases of the v6 numbering
pub(crate) static RANGES_V6: &[(&str, u16)] = &[
    ("QK_MODS", 0x0100),
    ("QK_MOD_TAP", 0x2000),
    ("QK_LAYER_TAP", 0x4000),
    ("QK_LAYER_MOD", 0x5000),
    ("QK_TO", 0x5200),
    ("QK_MOMENTARY", 0x5220),
    ("QK_DEF_LAYER", 0x5240),
    ("QK_TOGGLE_LAYER", 0x5260),
    ("QK_ONE_SHOT_LAYER", 0x5280),
    ("QK_ONE_SHOT_MOD", 0x52A0),
    ("QK_LAYER_TAP_TOGGLE", 0x52C0),
    ("QK_TAP_DANCE", 0x5700),
    ("QK_MACRO", 0x7700),
    ("QK_LIGHTING", 0x7800),
    ("QK_BOOT", 0x7C00),
    ("QK_KB", 0x7E00),
    ("QK_USER", 0x7E40),
];
