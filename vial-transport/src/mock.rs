//! Scriptable in-memory device for tests
//!
//! A `MockDevice` records every report written to it and answers each write
//! through a responder closure. Faults pushed with [`MockDevice::push_fault`]
//! take precedence over the responder, one per write.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::protocol::REPORT_SIZE;
use crate::types::{FirmwareKind, TransportDeviceInfo};
use crate::HidDevice;

/// What the device does in reply to one written report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Queue this input report
    Respond([u8; REPORT_SIZE]),
    /// Accept the write but never answer (read times out)
    NoResponse,
    /// Report fewer bytes written than requested; nothing is queued
    ShortWrite,
    /// Answer with a truncated report
    ShortRead,
    /// Fail the write with a HID error
    WriteError,
}

type Responder = dyn FnMut(&[u8]) -> MockReply + Send;

struct MockState {
    responder: Box<Responder>,
    faults: VecDeque<MockReply>,
    pending: Option<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    connected: bool,
}

/// Cloneable handle to a scripted device; clones share state
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
    info: TransportDeviceInfo,
}

impl MockDevice {
    /// Device answering every request via `responder`, which receives the
    /// 32-byte payload without report ID
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> MockReply + Send + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(MockState {
                responder: Box::new(responder),
                faults: VecDeque::new(),
                pending: None,
                writes: Vec::new(),
                connected: true,
            })),
            info: Self::default_info(),
        }
    }

    /// Device echoing each payload back as its response
    pub fn echo() -> Self {
        Self::new(|payload| {
            let mut resp = [0u8; REPORT_SIZE];
            resp.copy_from_slice(&payload[..REPORT_SIZE]);
            MockReply::Respond(resp)
        })
    }

    fn default_info() -> TransportDeviceInfo {
        TransportDeviceInfo {
            vid: 0xFEED,
            pid: 0x0000,
            kind: FirmwareKind::Vial,
            device_path: "mock".to_string(),
            manufacturer: Some("Mock".to_string()),
            product_name: Some("Emulated Keyboard".to_string()),
        }
    }

    /// Replace the reported device information
    pub fn with_info(mut self, info: TransportDeviceInfo) -> Self {
        self.info = info;
        self
    }

    /// Inject a one-shot fault for the next write
    pub fn push_fault(&self, fault: MockReply) {
        self.state.lock().faults.push_back(fault);
    }

    /// Every report written so far, report ID included
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// Written payloads with the report ID stripped
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .writes
            .iter()
            .map(|w| w[1..].to_vec())
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }
}

impl HidDevice for MockDevice {
    fn write_report(&self, report: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        state.writes.push(report.to_vec());
        state.pending = None;

        let payload = report.get(1..).unwrap_or_default();
        let reply = match state.faults.pop_front() {
            Some(fault) => fault,
            None => (state.responder)(payload),
        };

        match reply {
            MockReply::Respond(resp) => {
                state.pending = Some(resp.to_vec());
                Ok(report.len())
            }
            MockReply::NoResponse => Ok(report.len()),
            MockReply::ShortWrite => Ok(report.len().saturating_sub(1)),
            MockReply::ShortRead => {
                state.pending = Some(vec![0u8; REPORT_SIZE / 2]);
                Ok(report.len())
            }
            MockReply::WriteError => Err(TransportError::HidError("mock write failure".into())),
        }
    }

    fn read_report(&self, buf: &mut [u8], _timeout_ms: u64) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        match state.pending.take() {
            Some(resp) => {
                let n = resp.len().min(buf.len());
                buf[..n].copy_from_slice(&resp[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }
}
