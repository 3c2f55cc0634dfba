//! Flow-control transport layer
//!
//! `FlowControlTransport` wraps a raw `HidDevice` (which only does write/read
//! of individual HID reports) and adds request semantics: zero-padding,
//! bounded retries with back-off, and full-report validation.
//!
//! ```text
//! [HidWiredDevice / MockDevice]   ← implements HidDevice (raw I/O)
//!              |
//!     [FlowControlTransport]       ← adds retries, padding, transaction gate
//!              |
//!       [DeviceSession / CLI]
//! ```
//!
//! Requests carry no correlation id: a response is simply the next input
//! report after the write. The device lock serializes every write/read
//! pair, and the [`TransactionGate`] serializes multi-request operations
//! so a background poller can tell when a foreground operation is running.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::protocol::{self, REPORT_SIZE};
use crate::types::{RetryPolicy, TransportDeviceInfo};
use crate::HidDevice;

/// Held while a foreground operation is mid-transaction
pub type TransactionGuard<'a> = MutexGuard<'a, ()>;

/// "Is another operation in flight" lock shared with background pollers
#[derive(Default)]
pub struct TransactionGate {
    lock: Mutex<()>,
}

impl TransactionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other transaction is running, then hold the gate
    pub fn enter(&self) -> TransactionGuard<'_> {
        self.lock.lock()
    }

    /// Hold the gate only if it is free; pollers skip their cycle otherwise
    pub fn try_enter(&self) -> Option<TransactionGuard<'_>> {
        self.lock.try_lock()
    }

    pub fn is_busy(&self) -> bool {
        self.lock.is_locked()
    }
}

/// A transport that exchanges fixed-size reports with retries.
pub struct FlowControlTransport {
    device: Mutex<Box<dyn HidDevice>>,
    info: TransportDeviceInfo,
    policy: RetryPolicy,
    gate: Arc<TransactionGate>,
}

impl FlowControlTransport {
    /// Wrap a raw device with the default retry policy
    pub fn new(device: Box<dyn HidDevice>) -> Self {
        Self::with_policy(device, RetryPolicy::default())
    }

    pub fn with_policy(device: Box<dyn HidDevice>, policy: RetryPolicy) -> Self {
        let info = device.device_info().clone();
        Self {
            device: Mutex::new(device),
            info,
            policy,
            gate: Arc::new(TransactionGate::new()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Gate shared with background pollers
    pub fn gate(&self) -> &Arc<TransactionGate> {
        &self.gate
    }

    /// Mark the start of a multi-request operation
    pub fn begin_transaction(&self) -> TransactionGuard<'_> {
        self.gate.enter()
    }

    pub fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    pub fn is_connected(&self) -> bool {
        self.device.lock().is_connected()
    }

    /// Send a request with the policy's retry budget and return the 32-byte response.
    pub fn send(&self, payload: &[u8]) -> Result<[u8; REPORT_SIZE], TransportError> {
        self.send_retries(payload, self.policy.retries)
    }

    /// Send a request, retrying short writes and empty or short reads.
    ///
    /// Exhausting `retries` attempts yields [`TransportError::Failed`].
    pub fn send_retries(
        &self,
        payload: &[u8],
        retries: u32,
    ) -> Result<[u8; REPORT_SIZE], TransportError> {
        let report = protocol::build_report(payload)?;
        let name = protocol::request_name(payload);
        debug!("Sending {}: {:02X?}", name, payload);

        let attempts = retries.max(1);
        let device = self.device.lock();

        for attempt in 0..attempts {
            if attempt > 0 && self.policy.retry_delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(self.policy.retry_delay_ms));
            }

            match device.write_report(&report) {
                Ok(written) if written == report.len() => {}
                Ok(written) => {
                    debug!(
                        "Short write on attempt {} for {}: {} of {} bytes",
                        attempt,
                        name,
                        written,
                        report.len()
                    );
                    continue;
                }
                Err(e) => {
                    debug!("Write attempt {} failed for {}: {}", attempt, name, e);
                    continue;
                }
            }

            let mut buf = [0u8; REPORT_SIZE];
            match device.read_report(&mut buf, self.policy.read_timeout_ms) {
                Ok(REPORT_SIZE) => {
                    debug!("Got response for {}: {:02X?}", name, &buf[..8]);
                    return Ok(buf);
                }
                Ok(0) => debug!("Empty read on attempt {} for {}", attempt, name),
                Ok(n) => debug!("Short read on attempt {} for {}: {} bytes", attempt, name, n),
                Err(e) => debug!("Read attempt {} failed for {}: {}", attempt, name, e),
            }
        }

        warn!("{} failed after {} attempts", name, attempts);
        Err(TransportError::Failed { attempts })
    }
}
