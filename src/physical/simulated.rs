//! Scriptable in-memory backend.
//!
//! Devices are plugged and unplugged through [`SimulatedHandle`]s, and any
//! device operation can be made to fail, which is how the assignment
//! manager's recovery paths get exercised without hardware.

use super::{PhysicalBackend, PhysicalDevice, PhysicalDeviceInfo, PhysicalError, PhysicalId, RawJoyState, Result};
use crate::dinput::catalog::ObjectCounts;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Device operations that can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedOp {
    Open,
    ObjectCounts,
    SetCaptureFormat,
    Claim,
    Poll,
    ReadState,
    Release,
}

#[derive(Debug)]
struct SimulatedState {
    name: String,
    counts: ObjectCounts,
    raw: RawJoyState,
    attached: bool,
    claimed: bool,
    opens: usize,
    failing: HashSet<SimulatedOp>,
}

type Devices = Arc<Mutex<BTreeMap<PhysicalId, SimulatedState>>>;

#[derive(Clone, Default)]
pub struct SimulatedBackend {
    devices: Devices,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug in a device. Re-plugging an id replaces its state.
    pub fn attach(&self, id: &str, name: &str, counts: ObjectCounts) -> SimulatedHandle {
        let id = PhysicalId(id.to_string());
        self.devices.lock().insert(
            id.clone(),
            SimulatedState {
                name: name.to_string(),
                counts,
                raw: RawJoyState::default(),
                attached: true,
                claimed: false,
                opens: 0,
                failing: HashSet::new(),
            },
        );
        debug!("Simulated device {} attached", id);
        SimulatedHandle {
            id,
            devices: Arc::clone(&self.devices),
        }
    }

    /// Standard 6/14/1 pad
    pub fn attach_standard(&self, id: &str) -> SimulatedHandle {
        self.attach(
            id,
            "Wireless Controller",
            ObjectCounts {
                axes: 6,
                buttons: 14,
                povs: 1,
            },
        )
    }
}

impl PhysicalBackend for SimulatedBackend {
    fn enumerate(&self) -> Result<Vec<PhysicalDeviceInfo>> {
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|(_, state)| state.attached)
            .map(|(id, state)| PhysicalDeviceInfo {
                id: id.clone(),
                name: state.name.clone(),
            })
            .collect())
    }

    fn open(&self, id: &PhysicalId) -> Result<Box<dyn PhysicalDevice>> {
        let mut devices = self.devices.lock();
        let state = devices
            .get_mut(id)
            .filter(|state| state.attached)
            .ok_or_else(|| PhysicalError::Disconnected(id.to_string()))?;
        if state.failing.contains(&SimulatedOp::Open) {
            return Err(PhysicalError::Rejected(format!("open {}", id)));
        }
        state.opens += 1;
        Ok(Box::new(SimulatedDevice {
            id: id.clone(),
            devices: Arc::clone(&self.devices),
        }))
    }
}

struct SimulatedDevice {
    id: PhysicalId,
    devices: Devices,
}

impl SimulatedDevice {
    fn with_state<T>(&self, op: SimulatedOp, f: impl FnOnce(&mut SimulatedState) -> T) -> Result<T> {
        let mut devices = self.devices.lock();
        let state = devices
            .get_mut(&self.id)
            .filter(|state| state.attached)
            .ok_or_else(|| PhysicalError::Disconnected(self.id.to_string()))?;
        if state.failing.contains(&op) {
            return Err(PhysicalError::Rejected(format!("{:?} on {}", op, self.id)));
        }
        Ok(f(state))
    }
}

impl PhysicalDevice for SimulatedDevice {
    fn object_counts(&mut self) -> Result<ObjectCounts> {
        self.with_state(SimulatedOp::ObjectCounts, |state| state.counts)
    }

    fn set_capture_format(&mut self) -> Result<()> {
        self.with_state(SimulatedOp::SetCaptureFormat, |_| ())
    }

    fn claim(&mut self) -> Result<()> {
        self.with_state(SimulatedOp::Claim, |state| state.claimed = true)
    }

    fn poll(&mut self) -> Result<()> {
        self.with_state(SimulatedOp::Poll, |_| ())
    }

    fn read_state(&mut self) -> Result<RawJoyState> {
        self.with_state(SimulatedOp::ReadState, |state| state.raw)
    }

    fn release(&mut self) -> Result<()> {
        self.with_state(SimulatedOp::Release, |state| state.claimed = false)
    }
}

/// Test-side control over one simulated device
#[derive(Clone)]
pub struct SimulatedHandle {
    id: PhysicalId,
    devices: Devices,
}

impl SimulatedHandle {
    pub fn id(&self) -> &PhysicalId {
        &self.id
    }

    fn update<T>(&self, f: impl FnOnce(&mut SimulatedState) -> T) -> Option<T> {
        self.devices.lock().get_mut(&self.id).map(f)
    }

    pub fn set_state(&self, raw: RawJoyState) {
        self.update(|state| state.raw = raw);
    }

    pub fn fail(&self, op: SimulatedOp) {
        self.update(|state| state.failing.insert(op));
    }

    pub fn recover(&self, op: SimulatedOp) {
        self.update(|state| state.failing.remove(&op));
    }

    /// Unplug: every later operation on open handles fails
    pub fn detach(&self) {
        self.update(|state| state.attached = false);
    }

    pub fn reattach(&self) {
        self.update(|state| state.attached = true);
    }

    pub fn is_claimed(&self) -> bool {
        self.update(|state| state.claimed).unwrap_or(false)
    }

    /// Number of successful opens so far
    pub fn opens(&self) -> usize {
        self.update(|state| state.opens).unwrap_or(0)
    }
}
