//! Device session
//!
//! [`DeviceSession`] owns one open keyboard: it negotiates protocol versions,
//! runs the reload sequence and keeps a mirror of everything it fetched.
//! Writes go through to the device only when they change the mirror, and the
//! mirror is updated only after the device accepted the write.
//!
//! ```text
//! reload:  VIA version → Vial id → definition → layers → keymap/encoders
//!          → macros → lighting → settings (v4+) → dynamic entries (v4+)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use vial_transport::protocol::{cmd, keyboard_value, vial};
use vial_transport::{FirmwareKind, FlowControlTransport};

use crate::buffer;
use crate::definition::KeyboardDefinition;
use crate::dynamic::{self, DynamicEntries, DynamicRecord};
use crate::error::KeyboardError;
use crate::keycode::{DynamicRanges, Keycode, KeycodeTable, KeycodeVersion};
use crate::keymap::{direction, KeymapMirror};
use crate::macros::{self, Macro, MacroDialect};
use crate::settings::{self, QmkSettingsSchema, SettingsSchema};
use crate::unlock::{UnlockPoll, UnlockPolicy, UnlockStatus, Unlocker};

/// VIA protocol versions this client speaks; -1 means not reported
pub const SUPPORTED_VIA_PROTOCOLS: &[i32] = &[-1, 9];

/// Vial protocol versions this client speaks; -1 means VIA-only firmware
pub const SUPPORTED_VIAL_PROTOCOLS: &[i32] = &[-1, 0, 1, 2, 3, 4, 5, 6];

/// First Vial protocol with QMK settings and dynamic entries
pub const VIAL_PROTOCOL_DYNAMIC: i32 = 4;

/// First Vial protocol with alt-repeat keys
pub const VIAL_PROTOCOL_ALT_REPEAT_KEY: i32 = 6;

/// Lighting subsystem hook run during reload
///
/// Lighting protocols (QMK backlight, rgblight, VialRGB) live outside this
/// crate; the session only sequences them.
pub trait LightingCollaborator: Send {
    fn reload(
        &mut self,
        transport: &FlowControlTransport,
        definition: &KeyboardDefinition,
    ) -> Result<(), KeyboardError>;
}

/// Callback receiving unlock progress
pub type UnlockCallback = Box<dyn FnMut(&UnlockPoll) + Send>;

/// Everything fetched by a successful reload
#[derive(Debug, Clone)]
pub struct SessionState {
    pub via_protocol: i32,
    pub vial_protocol: i32,
    pub keyboard_id: u64,
    pub definition: KeyboardDefinition,
    pub layers: u8,
    pub keymap: KeymapMirror,
    /// Packed layout options, when the definition has layout labels
    pub layout_options: Option<u32>,
    pub macro_dialect: MacroDialect,
    pub macro_count: u8,
    /// Size of the device macro memory in bytes
    pub macro_memory: usize,
    pub macros: Vec<Macro>,
    /// Supported qsids and their current values
    pub settings: BTreeMap<u16, Vec<u8>>,
    pub dynamic: DynamicEntries,
    pub keycodes: KeycodeTable,
}

impl SessionState {
    pub fn encoder_count(&self) -> u8 {
        if self.vial_protocol < 0 {
            0
        } else {
            self.definition.encoder_count()
        }
    }

    pub fn supports_dynamic(&self) -> bool {
        self.vial_protocol >= VIAL_PROTOCOL_DYNAMIC
    }
}

/// One open keyboard
pub struct DeviceSession {
    transport: Arc<FlowControlTransport>,
    unlock_policy: UnlockPolicy,
    schema: Box<dyn SettingsSchema>,
    lighting: Option<Box<dyn LightingCollaborator>>,
    unlock_observer: Option<UnlockCallback>,
    /// Definition for VIA-only firmware, which cannot report its own
    external_definition: Option<KeyboardDefinition>,
    state: Option<SessionState>,
}

impl DeviceSession {
    pub fn new(transport: Arc<FlowControlTransport>) -> Self {
        Self {
            transport,
            unlock_policy: UnlockPolicy::default(),
            schema: Box::new(QmkSettingsSchema),
            lighting: None,
            unlock_observer: None,
            external_definition: None,
            state: None,
        }
    }

    pub fn with_unlock_policy(mut self, policy: UnlockPolicy) -> Self {
        self.unlock_policy = policy;
        self
    }

    pub fn with_settings_schema(mut self, schema: Box<dyn SettingsSchema>) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_lighting(mut self, lighting: Box<dyn LightingCollaborator>) -> Self {
        self.lighting = Some(lighting);
        self
    }

    /// Supply the definition of a VIA-only keyboard
    pub fn with_definition(mut self, definition: KeyboardDefinition) -> Self {
        self.external_definition = Some(definition);
        self
    }

    /// Observe unlock challenges started by writes
    pub fn set_unlock_observer(&mut self, observer: Option<UnlockCallback>) {
        self.unlock_observer = observer;
    }

    pub fn transport(&self) -> &Arc<FlowControlTransport> {
        &self.transport
    }

    pub fn settings_schema(&self) -> &dyn SettingsSchema {
        self.schema.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Result<&SessionState, KeyboardError> {
        self.state.as_ref().ok_or(KeyboardError::NotLoaded)
    }

    fn state_mut(&mut self) -> Result<&mut SessionState, KeyboardError> {
        self.state.as_mut().ok_or(KeyboardError::NotLoaded)
    }

    pub fn keymap(&self) -> Result<&KeymapMirror, KeyboardError> {
        Ok(&self.state()?.keymap)
    }

    pub fn keycodes(&self) -> Result<&KeycodeTable, KeyboardError> {
        Ok(&self.state()?.keycodes)
    }

    pub fn macros(&self) -> Result<&[Macro], KeyboardError> {
        Ok(&self.state()?.macros)
    }

    pub fn dynamic(&self) -> Result<&DynamicEntries, KeyboardError> {
        Ok(&self.state()?.dynamic)
    }

    // =========================================================================
    // Reload
    // =========================================================================

    /// Run the full reload sequence
    ///
    /// On any failure the session is left unloaded; no partially fetched
    /// state is ever exposed.
    pub fn reload(&mut self) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();

        self.state = None;
        let state = self.load(&transport)?;
        info!(
            "Loaded {}: VIA {}, Vial {}, {} layers, {} macros",
            transport.device_info().display_name(),
            state.via_protocol,
            state.vial_protocol,
            state.layers,
            state.macro_count
        );
        self.state = Some(state);
        Ok(())
    }

    fn load(&mut self, transport: &FlowControlTransport) -> Result<SessionState, KeyboardError> {
        let via_protocol = query_via_protocol(transport)?;
        if !SUPPORTED_VIA_PROTOCOLS.contains(&via_protocol) {
            return Err(KeyboardError::ProtocolVersionUnsupported {
                which: "VIA",
                version: i64::from(via_protocol),
            });
        }

        let (vial_protocol, keyboard_id) = match transport.device_info().kind {
            FirmwareKind::Vial => query_keyboard_id(transport)?,
            FirmwareKind::ViaOnly => (-1, 0),
        };
        if !SUPPORTED_VIAL_PROTOCOLS.contains(&vial_protocol) {
            return Err(KeyboardError::ProtocolVersionUnsupported {
                which: "Vial",
                version: i64::from(vial_protocol),
            });
        }
        debug!("VIA protocol {via_protocol}, Vial protocol {vial_protocol}, id {keyboard_id:#018x}");

        let definition = self.load_definition(transport, vial_protocol)?;

        let resp = transport.send(&[cmd::GET_LAYER_COUNT])?;
        let layers = resp[1];

        let mut keymap = load_keymap(transport, &definition, layers)?;
        if vial_protocol >= 0 {
            load_encoders(transport, &mut keymap, definition.encoder_count())?;
        }
        let layout_options = if definition.layout_labels.is_empty() {
            None
        } else {
            let resp = transport.send(&[cmd::GET_KEYBOARD_VALUE, keyboard_value::LAYOUT_OPTIONS])?;
            Some(u32::from_be_bytes([resp[2], resp[3], resp[4], resp[5]]))
        };

        let macro_dialect = MacroDialect::for_vial_protocol(vial_protocol);
        let (macro_count, macro_memory, macros) = load_macros(transport, macro_dialect)?;

        if let Some(lighting) = self.lighting.as_mut() {
            lighting.reload(transport, &definition)?;
        }

        let (settings, dynamic) = if vial_protocol >= VIAL_PROTOCOL_DYNAMIC {
            (
                settings::fetch_all(transport, self.schema.as_ref())?,
                dynamic::fetch_all(transport, vial_protocol >= VIAL_PROTOCOL_ALT_REPEAT_KEY)?,
            )
        } else {
            (BTreeMap::new(), DynamicEntries::default())
        };

        let keycodes = KeycodeTable::build(
            KeycodeVersion::for_vial_protocol(vial_protocol),
            DynamicRanges {
                layers,
                macros: macro_count,
                tap_dances: dynamic.counts.tap_dance,
                custom_keycodes: definition.custom_keycode_names(),
            },
        );

        Ok(SessionState {
            via_protocol,
            vial_protocol,
            keyboard_id,
            definition,
            layers,
            keymap,
            layout_options,
            macro_dialect,
            macro_count,
            macro_memory,
            macros,
            settings,
            dynamic,
            keycodes,
        })
    }

    fn load_definition(
        &self,
        transport: &FlowControlTransport,
        vial_protocol: i32,
    ) -> Result<KeyboardDefinition, KeyboardError> {
        if vial_protocol < 0 {
            return self.external_definition.clone().ok_or_else(|| {
                KeyboardError::NotSupported(
                    "VIA-only keyboard requires an external definition".to_string(),
                )
            });
        }
        let size = buffer::definition_size(transport)?;
        if size == 0 {
            return Err(KeyboardError::MalformedDefinition(
                "device reports an empty definition".to_string(),
            ));
        }
        let blob = buffer::fetch_definition(transport, size)?;
        KeyboardDefinition::from_compressed(&blob)
    }

    // =========================================================================
    // Keymap
    // =========================================================================

    /// Change one key, writing only if the value differs from the mirror
    pub fn set_key(&mut self, layer: u8, row: u8, col: u8, keycode: Keycode) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();

        let state = self.state()?;
        state.keymap.check_key(layer, row, col)?;
        if state.keymap.get(layer, row, col) == Some(keycode) {
            debug!("Key ({layer},{row},{col}) already {keycode:#06x}");
            return Ok(());
        }

        self.require_unlock_for(&transport, &[keycode])?;
        let [hi, lo] = keycode.to_be_bytes();
        transport.send(&[cmd::SET_KEYCODE, layer, row, col, hi, lo])?;
        self.state_mut()?.keymap.set(layer, row, col, keycode);
        Ok(())
    }

    /// Change one encoder direction, writing only if the value differs
    pub fn set_encoder(
        &mut self,
        layer: u8,
        index: u8,
        dir: u8,
        keycode: Keycode,
    ) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();

        let state = self.state()?;
        if layer >= state.layers || index >= state.encoder_count() || dir > direction::CLOCKWISE {
            return Err(KeyboardError::InvalidParameter(format!(
                "encoder ({layer},{index},{dir}) out of range"
            )));
        }
        if state.keymap.encoder(layer, index, dir) == Some(keycode) {
            return Ok(());
        }

        self.require_unlock_for(&transport, &[keycode])?;
        let [hi, lo] = keycode.to_be_bytes();
        transport.send(&[cmd::VIAL_PREFIX, vial::SET_ENCODER, layer, index, dir, hi, lo])?;
        self.state_mut()?.keymap.set_encoder(layer, index, dir, keycode);
        Ok(())
    }

    /// Write the packed layout options value
    pub fn set_layout_options(&mut self, options: u32) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();

        let state = self.state()?;
        if state.definition.layout_labels.is_empty() {
            return Err(KeyboardError::NotSupported("layout options".to_string()));
        }
        if state.layout_options == Some(options) {
            return Ok(());
        }

        let [b0, b1, b2, b3] = options.to_be_bytes();
        transport.send(&[
            cmd::SET_KEYBOARD_VALUE,
            keyboard_value::LAYOUT_OPTIONS,
            b0,
            b1,
            b2,
            b3,
        ])?;
        self.state_mut()?.layout_options = Some(options);
        Ok(())
    }

    // =========================================================================
    // Macros
    // =========================================================================

    /// Replace the whole macro set
    ///
    /// The serialized set must fit the device macro memory; this is checked
    /// before anything is sent. Writing macros always requires unlock.
    pub fn set_macros(&mut self, macros: Vec<Macro>) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();
        self.store_macros(&transport, macros)
    }

    /// Replace one macro, keeping the others
    pub fn set_macro(&mut self, index: usize, actions: Macro) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();

        let mut macros = self.state()?.macros.clone();
        let Some(slot) = macros.get_mut(index) else {
            return Err(KeyboardError::InvalidParameter(format!(
                "macro {index} out of range"
            )));
        };
        *slot = actions;
        self.store_macros(&transport, macros)
    }

    fn store_macros(
        &mut self,
        transport: &FlowControlTransport,
        macros: Vec<Macro>,
    ) -> Result<(), KeyboardError> {
        let state = self.state()?;
        if macros.len() != usize::from(state.macro_count) {
            return Err(KeyboardError::InvalidParameter(format!(
                "expected {} macros, got {}",
                state.macro_count,
                macros.len()
            )));
        }
        if macros == state.macros {
            return Ok(());
        }

        let data = macros::serialize_set(state.macro_dialect, &macros)?;
        if data.len() > state.macro_memory {
            return Err(KeyboardError::BufferTooLarge {
                what: "macro set",
                size: data.len(),
                max: state.macro_memory,
            });
        }

        self.require_unlock(transport)?;
        buffer::store_buffer(transport, cmd::MACRO_SET_BUFFER, &data)?;
        self.state_mut()?.macros = macros;
        Ok(())
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn get_setting(&self, qsid: u16) -> Result<&[u8], KeyboardError> {
        self.state()?
            .settings
            .get(&qsid)
            .map(Vec::as_slice)
            .ok_or_else(|| KeyboardError::InvalidParameter(format!("qsid {qsid} not supported")))
    }

    /// Write one setting, skipping unchanged values
    pub fn set_setting(&mut self, qsid: u16, value: Vec<u8>) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();

        if self.get_setting(qsid)? == value.as_slice() {
            return Ok(());
        }
        settings::set_setting(&transport, qsid, &value)?;
        self.state_mut()?.settings.insert(qsid, value);
        Ok(())
    }

    /// Restore firmware defaults and re-read every setting
    pub fn reset_settings(&mut self) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();

        if !self.state()?.supports_dynamic() {
            return Err(KeyboardError::NotSupported("QMK settings".to_string()));
        }
        settings::reset_settings(&transport)?;
        let values = settings::fetch_all(&transport, self.schema.as_ref())?;
        self.state_mut()?.settings = values;
        Ok(())
    }

    // =========================================================================
    // Dynamic entries
    // =========================================================================

    /// Write one dynamic entry, skipping byte-identical records
    pub fn set_dynamic<R: DynamicRecord>(&mut self, index: u8, record: R) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();

        let state = self.state()?;
        if !state.supports_dynamic() {
            return Err(KeyboardError::NotSupported(R::TABLE.name().to_string()));
        }
        let current = R::entries(&state.dynamic)
            .get(usize::from(index))
            .ok_or_else(|| {
                KeyboardError::InvalidParameter(format!("{} {index} out of range", R::TABLE.name()))
            })?;
        if *current == record {
            return Ok(());
        }

        self.require_unlock_for(&transport, &record.keycodes())?;
        dynamic::set_entry(&transport, index, &record)?;
        R::entries_mut(&mut self.state_mut()?.dynamic)[usize::from(index)] = record;
        Ok(())
    }

    // =========================================================================
    // Unlock
    // =========================================================================

    pub fn unlock_status(&self) -> Result<UnlockStatus, KeyboardError> {
        let _guard = self.transport.begin_transaction();
        Unlocker::new(&self.transport, self.state()?.vial_protocol).get_status()
    }

    /// Run the unlock challenge now
    pub fn unlock(&mut self) -> Result<(), KeyboardError> {
        let transport = Arc::clone(&self.transport);
        let _guard = transport.begin_transaction();
        self.require_unlock(&transport)
    }

    pub fn lock(&self) -> Result<(), KeyboardError> {
        let _guard = self.transport.begin_transaction();
        Unlocker::new(&self.transport, self.state()?.vial_protocol).lock()
    }

    /// Unlock before a write carrying the factory reset keycode
    fn require_unlock_for(
        &mut self,
        transport: &FlowControlTransport,
        keycodes: &[Keycode],
    ) -> Result<(), KeyboardError> {
        let reset = self.state()?.keycodes.reset_keycode();
        if keycodes.contains(&reset) {
            warn!("Writing reset keycode {reset:#06x}, unlock required");
            self.require_unlock(transport)?;
        }
        Ok(())
    }

    fn require_unlock(&mut self, transport: &FlowControlTransport) -> Result<(), KeyboardError> {
        let vial_protocol = self.state()?.vial_protocol;
        let unlocker = Unlocker::new(transport, vial_protocol);
        match self.unlock_observer.as_mut() {
            Some(observer) => {
                let mut forward = |poll: &UnlockPoll| observer(poll);
                unlocker.ensure_unlocked(&self.unlock_policy, Some(&mut forward))
            }
            None => unlocker.ensure_unlocked(&self.unlock_policy, None),
        }
    }
}

fn query_via_protocol(transport: &FlowControlTransport) -> Result<i32, KeyboardError> {
    let resp = transport.send(&[cmd::GET_PROTOCOL_VERSION])?;
    let version = u16::from_be_bytes([resp[1], resp[2]]);
    Ok(if version == u16::MAX { -1 } else { i32::from(version) })
}

fn query_keyboard_id(transport: &FlowControlTransport) -> Result<(i32, u64), KeyboardError> {
    let resp = transport.send(&[cmd::VIAL_PREFIX, vial::GET_KEYBOARD_ID])?;
    let protocol = i32::from_le_bytes([resp[0], resp[1], resp[2], resp[3]]);
    let mut id = [0u8; 8];
    id.copy_from_slice(&resp[4..12]);
    Ok((protocol, u64::from_le_bytes(id)))
}

fn load_keymap(
    transport: &FlowControlTransport,
    definition: &KeyboardDefinition,
    layers: u8,
) -> Result<KeymapMirror, KeyboardError> {
    let (rows, cols) = (definition.rows, definition.cols);
    let size = KeymapMirror::buffer_size(layers, rows, cols);
    let data = buffer::fetch_buffer(transport, cmd::KEYMAP_GET_BUFFER, size)?;
    KeymapMirror::from_buffer(layers, rows, cols, &data)
}

fn load_encoders(
    transport: &FlowControlTransport,
    keymap: &mut KeymapMirror,
    encoders: u8,
) -> Result<(), KeyboardError> {
    for layer in 0..keymap.layers() {
        for index in 0..encoders {
            let resp = transport.send(&[cmd::VIAL_PREFIX, vial::GET_ENCODER, layer, index])?;
            let ccw = u16::from_be_bytes([resp[0], resp[1]]);
            let cw = u16::from_be_bytes([resp[2], resp[3]]);
            keymap.set_encoder(layer, index, direction::COUNTER_CLOCKWISE, ccw);
            keymap.set_encoder(layer, index, direction::CLOCKWISE, cw);
        }
    }
    Ok(())
}

fn load_macros(
    transport: &FlowControlTransport,
    dialect: MacroDialect,
) -> Result<(u8, usize, Vec<Macro>), KeyboardError> {
    let count = transport.send(&[cmd::MACRO_GET_COUNT])?[1];
    let resp = transport.send(&[cmd::MACRO_GET_BUFFER_SIZE])?;
    let memory = usize::from(u16::from_be_bytes([resp[1], resp[2]]));
    let data = buffer::fetch_buffer(transport, cmd::MACRO_GET_BUFFER, memory)?;
    let macros = macros::deserialize_set(dialect, &data, usize::from(count));
    debug!("{} macros in {} bytes, dialect v{}", count, memory, dialect.number());
    Ok((count, memory, macros))
}
