//! In-memory mirror of the device keymap

use std::collections::HashMap;

use crate::error::KeyboardError;
use crate::keycode::Keycode;

/// Encoder direction index
pub mod direction {
    pub const COUNTER_CLOCKWISE: u8 = 0;
    pub const CLOCKWISE: u8 = 1;
}

/// Keycodes per (layer, row, col) and per (layer, encoder, direction)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeymapMirror {
    layers: u8,
    rows: u8,
    cols: u8,
    cells: Vec<Keycode>,
    encoders: HashMap<(u8, u8, u8), Keycode>,
}

impl KeymapMirror {
    /// Empty mirror filled with `KC_NO`
    pub fn new(layers: u8, rows: u8, cols: u8) -> Self {
        let len = usize::from(layers) * usize::from(rows) * usize::from(cols);
        Self {
            layers,
            rows,
            cols,
            cells: vec![0; len],
            encoders: HashMap::new(),
        }
    }

    /// Size in bytes of the device keymap buffer
    pub fn buffer_size(layers: u8, rows: u8, cols: u8) -> usize {
        usize::from(layers) * usize::from(rows) * usize::from(cols) * 2
    }

    /// Split a raw keymap buffer (big-endian cells, layer-major) into a mirror
    pub fn from_buffer(layers: u8, rows: u8, cols: u8, data: &[u8]) -> Result<Self, KeyboardError> {
        let expected = Self::buffer_size(layers, rows, cols);
        if data.len() != expected {
            return Err(KeyboardError::InvalidParameter(format!(
                "keymap buffer is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
        let cells = data
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        Ok(Self {
            layers,
            rows,
            cols,
            cells,
            encoders: HashMap::new(),
        })
    }

    pub fn layers(&self) -> u8 {
        self.layers
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn cols(&self) -> u8 {
        self.cols
    }

    fn index(&self, layer: u8, row: u8, col: u8) -> Option<usize> {
        if layer >= self.layers || row >= self.rows || col >= self.cols {
            return None;
        }
        let (rows, cols) = (usize::from(self.rows), usize::from(self.cols));
        Some((usize::from(layer) * rows + usize::from(row)) * cols + usize::from(col))
    }

    /// Check a position against the mirror dimensions
    pub fn check_key(&self, layer: u8, row: u8, col: u8) -> Result<(), KeyboardError> {
        self.index(layer, row, col).map(|_| ()).ok_or_else(|| {
            KeyboardError::InvalidParameter(format!(
                "key ({layer},{row},{col}) outside {}x{}x{} keymap",
                self.layers, self.rows, self.cols
            ))
        })
    }

    pub fn get(&self, layer: u8, row: u8, col: u8) -> Option<Keycode> {
        self.index(layer, row, col).map(|i| self.cells[i])
    }

    /// Store a keycode; returns false for positions outside the mirror
    pub fn set(&mut self, layer: u8, row: u8, col: u8, keycode: Keycode) -> bool {
        match self.index(layer, row, col) {
            Some(i) => {
                self.cells[i] = keycode;
                true
            }
            None => false,
        }
    }

    pub fn encoder(&self, layer: u8, index: u8, direction: u8) -> Option<Keycode> {
        self.encoders.get(&(layer, index, direction)).copied()
    }

    pub fn set_encoder(&mut self, layer: u8, index: u8, direction: u8, keycode: Keycode) {
        self.encoders.insert((layer, index, direction), keycode);
    }

    /// One layer as rows of keycodes
    pub fn layer(&self, layer: u8) -> Option<Vec<Vec<Keycode>>> {
        if layer >= self.layers {
            return None;
        }
        let cols = usize::from(self.cols);
        let start = usize::from(layer) * usize::from(self.rows) * cols;
        Some(
            self.cells[start..start + usize::from(self.rows) * cols]
                .chunks(cols.max(1))
                .map(<[Keycode]>::to_vec)
                .collect(),
        )
    }
}
