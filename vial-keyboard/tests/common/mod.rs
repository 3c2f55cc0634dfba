//! In-memory Vial firmware for integration tests
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::Arc;

use parking_lot::Mutex;
use vial_keyboard::session::DeviceSession;
use vial_keyboard::unlock::UnlockPolicy;
use vial_transport::mock::{MockDevice, MockReply};
use vial_transport::protocol::{cmd, dynamic, keyboard_value, vial, REPORT_SIZE};
use vial_transport::{FirmwareKind, FlowControlTransport, RetryPolicy, TransportDeviceInfo};
use xz2::read::XzEncoder;

/// Shape of the emulated keyboard
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    pub via_protocol: u16,
    pub vial_protocol: i32,
    pub layers: u8,
    pub rows: u8,
    pub cols: u8,
    pub encoders: u8,
    pub macro_count: u8,
    pub macro_memory: usize,
    /// Polls the unlock challenge takes to complete
    pub unlock_polls: u8,
    pub layout_labels: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            via_protocol: 9,
            vial_protocol: 6,
            layers: 2,
            rows: 2,
            cols: 2,
            encoders: 1,
            macro_count: 4,
            macro_memory: 64,
            unlock_polls: 3,
            layout_labels: true,
        }
    }
}

pub const TAP_DANCE_COUNT: usize = 2;
pub const COMBO_COUNT: usize = 2;
pub const KEY_OVERRIDE_COUNT: usize = 1;
pub const ALT_REPEAT_KEY_COUNT: usize = 1;

struct Firmware {
    config: EmulatorConfig,
    definition: Vec<u8>,
    keymap: Vec<u16>,
    encoders: HashMap<(u8, u8), [u16; 2]>,
    layout_options: u32,
    macros: Vec<u8>,
    unlocked: bool,
    unlock_counter: Option<u8>,
    settings: BTreeMap<u16, Vec<u8>>,
    dynamic: HashMap<u8, Vec<Vec<u8>>>,
    /// Request prefixes that never get an answer
    failing: Vec<Vec<u8>>,
    /// Protected writes attempted while locked
    rejected: usize,
    /// Qsids whose get request answers with a non-zero status
    unreadable: Vec<u16>,
}

fn default_settings() -> BTreeMap<u16, Vec<u8>> {
    BTreeMap::from([(2, vec![50, 0]), (7, vec![200, 0]), (8, vec![0])])
}

fn definition_json(config: &EmulatorConfig) -> String {
    let mut rows = Vec::new();
    for r in 0..config.rows {
        let keys: Vec<String> = (0..config.cols).map(|c| format!("\"{r},{c}\"")).collect();
        rows.push(format!("[{}]", keys.join(",")));
    }
    let encoders: Vec<String> = (0..config.encoders)
        .flat_map(|i| (0..2).map(move |d| format!("\"{i},{d}\\n\\n\\n\\n\\n\\n\\n\\n\\ne\"")))
        .collect();
    if !encoders.is_empty() {
        rows.push(format!("[{}]", encoders.join(",")));
    }
    let labels = if config.layout_labels {
        r#"["Split Backspace"]"#
    } else {
        "[]"
    };
    format!(
        r#"{{"name": "Emulated", "matrix": {{"rows": {}, "cols": {}}},
            "customKeycodes": [{{"name": "CK_TEST", "title": "Test", "shortName": "Tst"}}],
            "layouts": {{"labels": {labels}, "keymap": [{}]}}}}"#,
        config.rows,
        config.cols,
        rows.join(",")
    )
}

impl Firmware {
    fn new(config: EmulatorConfig) -> Self {
        let json = definition_json(&config);
        let mut definition = Vec::new();
        XzEncoder::new(json.as_bytes(), 6)
            .read_to_end(&mut definition)
            .expect("compress definition");

        let cells = usize::from(config.layers) * usize::from(config.rows) * usize::from(config.cols);
        let keymap = (1..=cells as u16).collect();

        let mut encoders = HashMap::new();
        for layer in 0..config.layers {
            for idx in 0..config.encoders {
                encoders.insert((layer, idx), [0x0080, 0x0081]);
            }
        }

        let mut macros = vec![0u8; config.macro_memory];
        macros[..2].copy_from_slice(b"hi");

        let mut dynamic = HashMap::new();
        dynamic.insert(dynamic::TAP_DANCE_GET, vec![vec![0u8; 10]; TAP_DANCE_COUNT]);
        dynamic.insert(dynamic::COMBO_GET, vec![vec![0u8; 10]; COMBO_COUNT]);
        dynamic.insert(dynamic::KEY_OVERRIDE_GET, vec![vec![0u8; 10]; KEY_OVERRIDE_COUNT]);
        dynamic.insert(dynamic::ALT_REPEAT_KEY_GET, vec![vec![0u8; 6]; ALT_REPEAT_KEY_COUNT]);

        Self {
            config,
            definition,
            keymap,
            encoders,
            layout_options: 0,
            macros,
            unlocked: false,
            unlock_counter: None,
            settings: default_settings(),
            dynamic,
            failing: Vec::new(),
            rejected: 0,
            unreadable: Vec::new(),
        }
    }

    fn reset_keycode(&self) -> u16 {
        if self.config.vial_protocol >= 6 {
            0x7C00
        } else {
            0x5C00
        }
    }

    /// VIA-only firmware has no lock
    fn locked(&self) -> bool {
        !self.unlocked && self.config.vial_protocol >= 0
    }

    fn cell(&self, layer: u8, row: u8, col: u8) -> usize {
        let (rows, cols) = (usize::from(self.config.rows), usize::from(self.config.cols));
        (usize::from(layer) * rows + usize::from(row)) * cols + usize::from(col)
    }

    fn handle(&mut self, req: &[u8]) -> MockReply {
        if self.failing.iter().any(|p| req.starts_with(p)) {
            return MockReply::NoResponse;
        }

        let mut resp = [0u8; REPORT_SIZE];
        resp.copy_from_slice(&req[..REPORT_SIZE]);

        match req[0] {
            cmd::GET_PROTOCOL_VERSION => {
                resp[1..3].copy_from_slice(&self.config.via_protocol.to_be_bytes());
            }
            cmd::GET_KEYBOARD_VALUE if req[1] == keyboard_value::LAYOUT_OPTIONS => {
                resp[2..6].copy_from_slice(&self.layout_options.to_be_bytes());
            }
            cmd::SET_KEYBOARD_VALUE if req[1] == keyboard_value::LAYOUT_OPTIONS => {
                self.layout_options = u32::from_be_bytes([req[2], req[3], req[4], req[5]]);
            }
            cmd::SET_KEYCODE => {
                let value = u16::from_be_bytes([req[4], req[5]]);
                if value == self.reset_keycode() && self.locked() {
                    self.rejected += 1;
                } else {
                    let i = self.cell(req[1], req[2], req[3]);
                    self.keymap[i] = value;
                }
            }
            cmd::GET_LAYER_COUNT => resp[1] = self.config.layers,
            cmd::KEYMAP_GET_BUFFER => {
                let bytes: Vec<u8> = self.keymap.iter().flat_map(|k| k.to_be_bytes()).collect();
                let (off, len) = (usize::from(u16::from_be_bytes([req[1], req[2]])), usize::from(req[3]));
                resp[4..4 + len].copy_from_slice(&bytes[off..off + len]);
            }
            cmd::MACRO_GET_COUNT => resp[1] = self.config.macro_count,
            cmd::MACRO_GET_BUFFER_SIZE => {
                resp[1..3].copy_from_slice(&(self.config.macro_memory as u16).to_be_bytes());
            }
            cmd::MACRO_GET_BUFFER => {
                let (off, len) = (usize::from(u16::from_be_bytes([req[1], req[2]])), usize::from(req[3]));
                resp[4..4 + len].copy_from_slice(&self.macros[off..off + len]);
            }
            cmd::MACRO_SET_BUFFER => {
                if !self.locked() {
                    let (off, len) = (usize::from(u16::from_be_bytes([req[1], req[2]])), usize::from(req[3]));
                    self.macros[off..off + len].copy_from_slice(&req[4..4 + len]);
                } else {
                    self.rejected += 1;
                }
            }
            cmd::VIAL_PREFIX => self.handle_vial(req, &mut resp),
            _ => {}
        }

        MockReply::Respond(resp)
    }

    fn handle_vial(&mut self, req: &[u8], resp: &mut [u8; REPORT_SIZE]) {
        match req[1] {
            vial::GET_KEYBOARD_ID => {
                resp[0..4].copy_from_slice(&self.config.vial_protocol.to_le_bytes());
                resp[4..12].copy_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
            }
            vial::GET_SIZE => {
                resp[0..4].copy_from_slice(&(self.definition.len() as u32).to_le_bytes());
            }
            vial::GET_DEFINITION => {
                let block = u32::from_le_bytes([req[2], req[3], req[4], req[5]]) as usize;
                *resp = [0; REPORT_SIZE];
                let start = block * REPORT_SIZE;
                if start < self.definition.len() {
                    let end = self.definition.len().min(start + REPORT_SIZE);
                    resp[..end - start].copy_from_slice(&self.definition[start..end]);
                }
            }
            vial::GET_ENCODER => {
                let [ccw, cw] = self.encoders.get(&(req[2], req[3])).copied().unwrap_or_default();
                resp[0..2].copy_from_slice(&ccw.to_be_bytes());
                resp[2..4].copy_from_slice(&cw.to_be_bytes());
            }
            vial::SET_ENCODER => {
                let value = u16::from_be_bytes([req[5], req[6]]);
                if value == self.reset_keycode() && self.locked() {
                    self.rejected += 1;
                } else {
                    let entry = self.encoders.entry((req[2], req[3])).or_default();
                    entry[usize::from(req[4])] = value;
                }
            }
            vial::GET_UNLOCK_STATUS => {
                resp.fill(0xFF);
                resp[0] = u8::from(self.unlocked);
                resp[1] = u8::from(self.unlock_counter.is_some());
                resp[2..6].copy_from_slice(&[0, 0, 1, 1]);
            }
            vial::UNLOCK_START => {
                self.unlock_counter = Some(self.config.unlock_polls);
            }
            vial::UNLOCK_POLL => {
                if let Some(counter) = self.unlock_counter.as_mut() {
                    *counter = counter.saturating_sub(1);
                    if *counter == 0 {
                        self.unlocked = true;
                        self.unlock_counter = None;
                    }
                }
                resp[0] = u8::from(self.unlocked);
                resp[1] = u8::from(self.unlock_counter.is_some());
                resp[2] = self.unlock_counter.unwrap_or(0);
            }
            vial::LOCK => {
                self.unlocked = false;
                self.unlock_counter = None;
            }
            vial::QMK_SETTINGS_QUERY => {
                let cursor = u16::from_le_bytes([req[2], req[3]]);
                resp.fill(0xFF);
                let page: Vec<u16> = self
                    .settings
                    .keys()
                    .copied()
                    .filter(|&q| q > cursor)
                    .take(16)
                    .collect();
                for (i, q) in page.iter().enumerate() {
                    resp[i * 2..i * 2 + 2].copy_from_slice(&q.to_le_bytes());
                }
            }
            vial::QMK_SETTINGS_GET => {
                let qsid = u16::from_le_bytes([req[2], req[3]]);
                *resp = [0; REPORT_SIZE];
                match self.settings.get(&qsid) {
                    Some(_) if self.unreadable.contains(&qsid) => resp[0] = 1,
                    Some(value) => resp[1..1 + value.len()].copy_from_slice(value),
                    None => resp[0] = 1,
                }
            }
            vial::QMK_SETTINGS_SET => {
                let qsid = u16::from_le_bytes([req[2], req[3]]);
                match self.settings.get_mut(&qsid) {
                    Some(value) => {
                        let width = value.len();
                        value.copy_from_slice(&req[4..4 + width]);
                        resp[0] = 0;
                    }
                    None => resp[0] = 1,
                }
            }
            vial::QMK_SETTINGS_RESET => self.settings = default_settings(),
            vial::DYNAMIC_ENTRY_OP => self.handle_dynamic(req, resp),
            _ => {}
        }
    }

    fn handle_dynamic(&mut self, req: &[u8], resp: &mut [u8; REPORT_SIZE]) {
        *resp = [0; REPORT_SIZE];
        let sub = req[2];
        if sub == dynamic::GET_NUMBER_OF_ENTRIES {
            resp[0] = TAP_DANCE_COUNT as u8;
            resp[1] = COMBO_COUNT as u8;
            resp[2] = KEY_OVERRIDE_COUNT as u8;
            resp[3] = ALT_REPEAT_KEY_COUNT as u8;
            resp[31] = 0x01;
            return;
        }

        // Get ops are odd, set ops the following even number
        let get_op = if sub % 2 == 1 { sub } else { sub - 1 };
        let index = usize::from(req[3]);
        let reset = self.reset_keycode().to_le_bytes();
        let locked = self.locked();
        let Some(record) = self.dynamic.get_mut(&get_op).and_then(|t| t.get_mut(index)) else {
            resp[0] = 1;
            return;
        };
        if sub == get_op {
            resp[1..1 + record.len()].copy_from_slice(record);
        } else {
            let incoming = &req[4..4 + record.len()];
            let carries_reset = incoming.chunks(2).any(|c| c == reset);
            if carries_reset && locked {
                self.rejected += 1;
            } else {
                record.copy_from_slice(incoming);
            }
        }
    }
}

/// Shared handle to an emulated keyboard
#[derive(Clone)]
pub struct Emulator {
    firmware: Arc<Mutex<Firmware>>,
    device: MockDevice,
}

impl Emulator {
    pub fn new(config: EmulatorConfig) -> Self {
        let via_only = config.vial_protocol < 0;
        let firmware = Arc::new(Mutex::new(Firmware::new(config)));
        let handler = Arc::clone(&firmware);
        let mut device = MockDevice::new(move |req| handler.lock().handle(req));
        if via_only {
            device = device.with_info(TransportDeviceInfo {
                vid: 0xFEED,
                pid: 0x0001,
                kind: FirmwareKind::ViaOnly,
                device_path: "mock-via".to_string(),
                manufacturer: None,
                product_name: Some("VIA Keyboard".to_string()),
            });
        }
        Self { firmware, device }
    }

    pub fn device(&self) -> MockDevice {
        self.device.clone()
    }

    /// Session on this keyboard with no retry or unlock delays
    pub fn session(&self) -> DeviceSession {
        let transport = FlowControlTransport::with_policy(
            Box::new(self.device.clone()),
            RetryPolicy::immediate(2),
        );
        DeviceSession::new(Arc::new(transport)).with_unlock_policy(UnlockPolicy::immediate(10))
    }

    /// Session reloaded and with its write log cleared
    pub fn loaded_session(&self) -> DeviceSession {
        let mut session = self.session();
        session.reload().expect("reload");
        self.device.clear_writes();
        session
    }

    /// Never answer requests starting with `prefix`
    pub fn fail_on(&self, prefix: &[u8]) {
        self.firmware.lock().failing.push(prefix.to_vec());
    }

    pub fn clear_failures(&self) {
        self.firmware.lock().failing.clear();
    }

    pub fn set_keymap(&self, cells: Vec<u16>) {
        self.firmware.lock().keymap = cells;
    }

    pub fn keycode_at(&self, layer: u8, row: u8, col: u8) -> u16 {
        let fw = self.firmware.lock();
        fw.keymap[fw.cell(layer, row, col)]
    }

    pub fn encoder(&self, layer: u8, index: u8) -> [u16; 2] {
        self.firmware.lock().encoders[&(layer, index)]
    }

    pub fn layout_options(&self) -> u32 {
        self.firmware.lock().layout_options
    }

    pub fn macro_memory(&self) -> Vec<u8> {
        self.firmware.lock().macros.clone()
    }

    pub fn setting(&self, qsid: u16) -> Option<Vec<u8>> {
        self.firmware.lock().settings.get(&qsid).cloned()
    }

    /// Advertise `qsid` with `value`
    pub fn add_setting(&self, qsid: u16, value: Vec<u8>) {
        self.firmware.lock().settings.insert(qsid, value);
    }

    /// Answer get requests for `qsid` with a non-zero status
    pub fn reject_setting_read(&self, qsid: u16) {
        self.firmware.lock().unreadable.push(qsid);
    }

    pub fn dynamic_record(&self, get_op: u8, index: usize) -> Vec<u8> {
        self.firmware.lock().dynamic[&get_op][index].clone()
    }

    pub fn is_unlocked(&self) -> bool {
        self.firmware.lock().unlocked
    }

    pub fn rejected_writes(&self) -> usize {
        self.firmware.lock().rejected
    }

    /// Payloads sent since the log was last cleared
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.device.payloads()
    }

    /// Index of the first request starting with `prefix`
    pub fn position_of(&self, prefix: &[u8]) -> Option<usize> {
        self.requests().iter().position(|r| r.starts_with(prefix))
    }

    /// Number of requests starting with `prefix`
    pub fn count_of(&self, prefix: &[u8]) -> usize {
        self.requests().iter().filter(|r| r.starts_with(prefix)).count()
    }
}
