//! Vial security unlock
//!
//! Destructive writes (the factory reset keycode, macro memory) require the
//! user to hold a set of physical keys. The device counts down while they are
//! held and reports unlocked once the counter expires.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vial_transport::protocol::{cmd, vial};
use vial_transport::FlowControlTransport;

use crate::error::KeyboardError;

/// Marker for an unused slot in the unlock key list
const UNUSED_KEY: u8 = 0xFF;

/// Number of (row, col) pairs carried by the status response
const MAX_UNLOCK_KEYS: usize = 15;

/// Result of `GET_UNLOCK_STATUS`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockStatus {
    pub unlocked: bool,
    pub in_progress: bool,
    /// Matrix positions the user must hold
    pub keys: Vec<(u8, u8)>,
}

/// Result of one `UNLOCK_POLL`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnlockPoll {
    pub unlocked: bool,
    pub in_progress: bool,
    /// Remaining hold counter; decreases while the keys are held
    pub counter: u8,
}

/// Polling cadence of the unlock challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockPolicy {
    pub poll_interval_ms: u64,
    /// Polls before the challenge is abandoned
    pub max_polls: u32,
}

impl Default for UnlockPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            // One minute at the default interval
            max_polls: 300,
        }
    }
}

impl UnlockPolicy {
    /// No sleeping between polls
    pub fn immediate(max_polls: u32) -> Self {
        Self {
            poll_interval_ms: 0,
            max_polls,
        }
    }
}

/// Callback receiving every poll result of a running challenge
pub type UnlockObserver<'a> = &'a mut dyn FnMut(&UnlockPoll);

/// Unlock state machine for one device
pub struct Unlocker<'a> {
    transport: &'a FlowControlTransport,
    vial_protocol: i32,
}

impl<'a> Unlocker<'a> {
    pub fn new(transport: &'a FlowControlTransport, vial_protocol: i32) -> Self {
        Self {
            transport,
            vial_protocol,
        }
    }

    /// VIA-only firmware has no lock
    fn is_lockless(&self) -> bool {
        self.vial_protocol < 0
    }

    pub fn get_status(&self) -> Result<UnlockStatus, KeyboardError> {
        if self.is_lockless() {
            return Ok(UnlockStatus {
                unlocked: true,
                ..Default::default()
            });
        }

        let resp = self
            .transport
            .send(&[cmd::VIAL_PREFIX, vial::GET_UNLOCK_STATUS])?;
        let keys = resp[2..2 + MAX_UNLOCK_KEYS * 2]
            .chunks_exact(2)
            .filter(|pair| pair[0] != UNUSED_KEY && pair[1] != UNUSED_KEY)
            .map(|pair| (pair[0], pair[1]))
            .collect();

        Ok(UnlockStatus {
            unlocked: resp[0] == 1,
            in_progress: resp[1] == 1,
            keys,
        })
    }

    /// Begin the hold challenge
    pub fn start(&self) -> Result<(), KeyboardError> {
        if self.is_lockless() {
            return Ok(());
        }
        self.transport.send(&[cmd::VIAL_PREFIX, vial::UNLOCK_START])?;
        Ok(())
    }

    pub fn poll(&self) -> Result<UnlockPoll, KeyboardError> {
        if self.is_lockless() {
            return Ok(UnlockPoll {
                unlocked: true,
                ..Default::default()
            });
        }
        let resp = self.transport.send(&[cmd::VIAL_PREFIX, vial::UNLOCK_POLL])?;
        Ok(UnlockPoll {
            unlocked: resp[0] == 1,
            in_progress: resp[1] == 1,
            counter: resp[2],
        })
    }

    /// Re-lock the device
    pub fn lock(&self) -> Result<(), KeyboardError> {
        if self.is_lockless() {
            return Ok(());
        }
        self.transport.send(&[cmd::VIAL_PREFIX, vial::LOCK])?;
        Ok(())
    }

    /// Run the challenge to completion
    ///
    /// Starts the challenge and polls every `policy.poll_interval_ms` until the
    /// device reports unlocked. Returns [`KeyboardError::UnlockAbandoned`] once
    /// `policy.max_polls` polls pass without success.
    pub fn unlock(
        &self,
        policy: &UnlockPolicy,
        mut observer: Option<UnlockObserver<'_>>,
    ) -> Result<(), KeyboardError> {
        if self.is_lockless() {
            return Ok(());
        }

        info!("Starting unlock challenge");
        self.start()?;

        for attempt in 0..policy.max_polls {
            if attempt > 0 && policy.poll_interval_ms > 0 {
                thread::sleep(Duration::from_millis(policy.poll_interval_ms));
            }
            let poll = self.poll()?;
            debug!(
                "Unlock poll {}: unlocked={} in_progress={} counter={}",
                attempt, poll.unlocked, poll.in_progress, poll.counter
            );
            if let Some(observer) = observer.as_mut() {
                observer(&poll);
            }
            if poll.unlocked {
                info!("Device unlocked");
                return Ok(());
            }
        }

        warn!("Unlock abandoned after {} polls", policy.max_polls);
        Err(KeyboardError::UnlockAbandoned)
    }

    /// Unlock only if the device is currently locked
    pub fn ensure_unlocked(
        &self,
        policy: &UnlockPolicy,
        observer: Option<UnlockObserver<'_>>,
    ) -> Result<(), KeyboardError> {
        if self.get_status()?.unlocked {
            return Ok(());
        }
        self.unlock(policy, observer)
    }
}
