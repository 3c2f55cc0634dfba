//! Background device-presence polling
//!
//! Periodically re-enumerates keyboards and publishes `DeviceAdded` /
//! `DeviceRemoved` events on a broadcast channel. When a [`TransactionGate`]
//! is attached, a cycle that finds the gate held by a foreground operation is
//! skipped entirely rather than queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::discovery::DeviceDiscovery;
use crate::error::TransportError;
use crate::flow_control::TransactionGate;
use crate::types::{DiscoveredDevice, DiscoveryEvent};

/// Hot-plug poller
pub struct PresenceMonitor {
    discovery: Arc<dyn DeviceDiscovery>,
    gate: Option<Arc<TransactionGate>>,
    interval: Duration,
    event_tx: broadcast::Sender<DiscoveryEvent>,
    /// Devices seen on the last completed cycle, keyed by device path
    known: Mutex<HashMap<String, DiscoveredDevice>>,
    running: AtomicBool,
}

impl PresenceMonitor {
    pub fn new(discovery: Arc<dyn DeviceDiscovery>, interval: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            discovery,
            gate: None,
            interval,
            event_tx,
            known: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Skip cycles while `gate` is held
    pub fn with_gate(mut self, gate: Arc<TransactionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Run one enumeration cycle.
    ///
    /// Returns `Ok(false)` when the cycle was skipped because a foreground
    /// transaction was in flight.
    pub fn poll_once(&self) -> Result<bool, TransportError> {
        let _guard = match &self.gate {
            Some(gate) => match gate.try_enter() {
                Some(guard) => Some(guard),
                None => {
                    debug!("Transaction in flight, skipping presence scan");
                    return Ok(false);
                }
            },
            None => None,
        };

        let current: HashMap<String, DiscoveredDevice> = self
            .discovery
            .list_devices()?
            .into_iter()
            .map(|d| (d.info.device_path.clone(), d))
            .collect();

        let mut known = self.known.lock();

        for (path, device) in known.iter() {
            if !current.contains_key(path) {
                info!("Device removed: {}", device.info.display_name());
                let _ = self
                    .event_tx
                    .send(DiscoveryEvent::DeviceRemoved(device.info.clone()));
            }
        }

        for (path, device) in current.iter() {
            if !known.contains_key(path) {
                info!("Device added: {}", device.info.display_name());
                let _ = self.event_tx.send(DiscoveryEvent::DeviceAdded(device.clone()));
            }
        }

        *known = current;
        Ok(true)
    }

    /// Start polling on a dedicated thread until [`PresenceMonitor::stop`]
    pub fn spawn(self: &Arc<Self>) -> thread::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let monitor = Arc::clone(self);
        thread::spawn(move || {
            while monitor.running.load(Ordering::SeqCst) {
                if let Err(e) = monitor.poll_once() {
                    warn!("Presence scan failed: {}", e);
                }
                thread::sleep(monitor.interval);
            }
            debug!("Presence monitor stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
