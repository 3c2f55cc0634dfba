//! Chunked buffer transfer
//!
//! Buffers larger than one report move as a strictly sequential series of
//! requests. Keymap and macro buffers are addressed by a big-endian byte
//! offset; the keyboard definition blob by a little-endian block index.
//! Any failed chunk aborts the transfer.

use tracing::debug;
use vial_transport::protocol::{cmd, vial, REPORT_SIZE};
use vial_transport::FlowControlTransport;

use crate::error::KeyboardError;

/// Payload bytes per offset-addressed request (`[cmd, off_hi, off_lo, len]` header)
pub const BUFFER_FETCH_CHUNK: usize = 28;

/// Bytes per definition block
pub const DEFINITION_BLOCK_SIZE: usize = REPORT_SIZE;

/// Number of requests needed to move `size` bytes in `chunk`-byte pieces
pub fn chunk_count(size: usize, chunk: usize) -> usize {
    size.div_ceil(chunk)
}

fn check_addressable(what: &'static str, size: usize) -> Result<(), KeyboardError> {
    if size > usize::from(u16::MAX) + 1 {
        return Err(KeyboardError::BufferTooLarge {
            what,
            size,
            max: usize::from(u16::MAX) + 1,
        });
    }
    Ok(())
}

/// Fetch `size` bytes with a GET-BUFFER command (`KEYMAP_GET_BUFFER`, `MACRO_GET_BUFFER`)
pub fn fetch_buffer(
    transport: &FlowControlTransport,
    get_cmd: u8,
    size: usize,
) -> Result<Vec<u8>, KeyboardError> {
    check_addressable(cmd::name(get_cmd), size)?;
    debug!(
        "Fetching {} bytes via {} in {} chunks",
        size,
        cmd::name(get_cmd),
        chunk_count(size, BUFFER_FETCH_CHUNK)
    );

    let mut data = Vec::with_capacity(size);
    for offset in (0..size).step_by(BUFFER_FETCH_CHUNK) {
        let len = BUFFER_FETCH_CHUNK.min(size - offset);
        let [hi, lo] = (offset as u16).to_be_bytes();
        let resp = transport.send(&[get_cmd, hi, lo, len as u8])?;
        data.extend_from_slice(&resp[4..4 + len]);
    }
    Ok(data)
}

/// Store `data` with a SET-BUFFER command (`MACRO_SET_BUFFER`)
pub fn store_buffer(
    transport: &FlowControlTransport,
    set_cmd: u8,
    data: &[u8],
) -> Result<(), KeyboardError> {
    check_addressable(cmd::name(set_cmd), data.len())?;
    debug!(
        "Storing {} bytes via {} in {} chunks",
        data.len(),
        cmd::name(set_cmd),
        chunk_count(data.len(), BUFFER_FETCH_CHUNK)
    );

    for (i, piece) in data.chunks(BUFFER_FETCH_CHUNK).enumerate() {
        let offset = (i * BUFFER_FETCH_CHUNK) as u16;
        let [hi, lo] = offset.to_be_bytes();
        let mut req = Vec::with_capacity(4 + piece.len());
        req.extend_from_slice(&[set_cmd, hi, lo, piece.len() as u8]);
        req.extend_from_slice(piece);
        transport.send(&req)?;
    }
    Ok(())
}

/// Size of the compressed keyboard definition
pub fn definition_size(transport: &FlowControlTransport) -> Result<usize, KeyboardError> {
    let resp = transport.send(&[cmd::VIAL_PREFIX, vial::GET_SIZE])?;
    Ok(u32::from_le_bytes([resp[0], resp[1], resp[2], resp[3]]) as usize)
}

/// Fetch the compressed keyboard definition, block by block
pub fn fetch_definition(
    transport: &FlowControlTransport,
    size: usize,
) -> Result<Vec<u8>, KeyboardError> {
    let blocks = chunk_count(size, DEFINITION_BLOCK_SIZE);
    debug!("Fetching {} byte definition in {} blocks", size, blocks);

    let mut data = Vec::with_capacity(blocks * DEFINITION_BLOCK_SIZE);
    for block in 0..blocks as u32 {
        let [b0, b1, b2, b3] = block.to_le_bytes();
        let resp = transport.send(&[cmd::VIAL_PREFIX, vial::GET_DEFINITION, b0, b1, b2, b3])?;
        data.extend_from_slice(&resp);
    }
    data.truncate(size);
    Ok(data)
}
