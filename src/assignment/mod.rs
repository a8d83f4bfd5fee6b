//! Binding of physical controllers to the fixed pool of virtual devices.
//!
//! Two locks guard the manager. The scan lock covers the set of physical
//! identifiers currently open and the slow open sequence; the assignment
//! lock covers the free pool, the live assignments and every snapshot.
//! Whenever both are needed the scan lock is taken first (see
//! [`lock::OrderedLocks`]), and refreshes only ever take the assignment
//! lock, so a slow scan never stalls input.

use crate::input::{DeviceInputs, InputSource};
use crate::physical::{
    DeviceProfile, PhysicalBackend, PhysicalDevice, PhysicalDeviceInfo, PhysicalError, PhysicalId, RawJoyState,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

mod lock;
mod scanner;

use lock::OrderedLocks;
pub use scanner::{DEFAULT_SCAN_INTERVAL, spawn_scanner};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssignmentError {
    #[error("Virtual device {0} is not managed")]
    UnknownDevice(usize),
}

/// What a refresh did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Snapshot overwritten with fresh state
    Updated,
    /// Nothing bound to the device
    Unassigned,
    /// The physical device failed and was released
    Released,
}

/// Counters from one scan pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanReport {
    pub bound: usize,
    pub pending: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// A virtual device slot and its current snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualDevice {
    pub id: usize,
    pub inputs: DeviceInputs,
    lost: bool,
}

/// Public view of one assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentInfo {
    pub virtual_id: usize,
    pub physical_id: PhysicalId,
    pub name: String,
    pub profile: DeviceProfile,
}

/// Physical handle that went through the open sequence
struct OpenedDevice {
    info: PhysicalDeviceInfo,
    profile: DeviceProfile,
    device: Box<dyn PhysicalDevice>,
}

struct Assignment {
    virtual_id: usize,
    opened: OpenedDevice,
}

impl Assignment {
    fn read(&mut self) -> Result<RawJoyState, PhysicalError> {
        self.opened.device.poll()?;
        self.opened.device.read_state()
    }
}

#[derive(Default)]
struct ScanState {
    open: HashSet<PhysicalId>,
    /// Opened while every slot was taken
    pending: Vec<OpenedDevice>,
}

struct AssignmentState {
    devices: Vec<VirtualDevice>,
    /// Sorted ascending
    free: VecDeque<usize>,
    assignments: Vec<Assignment>,
}

impl AssignmentState {
    fn new(device_count: usize) -> Self {
        Self {
            devices: (0..device_count)
                .map(|id| VirtualDevice {
                    id,
                    inputs: DeviceInputs::default(),
                    lost: false,
                })
                .collect(),
            free: (0..device_count).collect(),
            assignments: Vec::new(),
        }
    }

    /// Bind to the lowest free slot, handing the device back if none is left
    fn bind(&mut self, opened: OpenedDevice) -> Result<usize, OpenedDevice> {
        let Some(slot) = self.free.pop_front() else {
            return Err(opened);
        };
        if let Some(device) = self.devices.get_mut(slot) {
            device.inputs.reset();
        }
        info!(
            "Assigned {} ({}, {:?}) to virtual device {}",
            opened.info.name, opened.info.id, opened.profile, slot
        );
        self.assignments.push(Assignment {
            virtual_id: slot,
            opened,
        });
        Ok(slot)
    }

    fn free_slot(&mut self, id: usize) {
        if self.free.contains(&id) {
            return;
        }
        let position = self.free.partition_point(|slot| *slot < id);
        self.free.insert(position, id);
        if let Some(device) = self.devices.get_mut(id) {
            device.inputs.reset();
            device.lost = true;
        }
    }
}

fn release_device(opened: &mut OpenedDevice) {
    if let Err(e) = opened.device.release() {
        debug!("Failed to release {}: {}", opened.info.id, e);
    }
}

pub struct AssignmentManager {
    backend: Arc<dyn PhysicalBackend>,
    locks: OrderedLocks<ScanState, AssignmentState>,
}

impl AssignmentManager {
    pub fn new(backend: Arc<dyn PhysicalBackend>, device_count: usize) -> Self {
        info!("Managing {} virtual devices", device_count);
        Self {
            backend,
            locks: OrderedLocks::new(ScanState::default(), AssignmentState::new(device_count)),
        }
    }

    /// One discovery pass: bind held handles, then open and bind anything
    /// newly attached.
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        let mut scan = self.locks.outer();

        let held = std::mem::take(&mut scan.pending);
        if !held.is_empty() {
            let mut state = scan.inner();
            for opened in held {
                match state.bind(opened) {
                    Ok(_) => report.bound += 1,
                    Err(opened) => scan.pending.push(opened),
                }
            }
        }

        let attached = match self.backend.enumerate() {
            Ok(attached) => attached,
            Err(e) => {
                warn!("Failed to enumerate physical devices: {}", e);
                report.pending = scan.pending.len();
                return report;
            }
        };

        for info in attached {
            if scan.open.contains(&info.id) {
                continue;
            }
            let opened = match self.open_candidate(info) {
                Ok(Some(opened)) => opened,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping physical device: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            scan.open.insert(opened.info.id.clone());
            let bound = scan.inner().bind(opened);
            match bound {
                Ok(_) => report.bound += 1,
                Err(opened) => {
                    debug!("No free virtual device for {}, holding it", opened.info.id);
                    scan.pending.push(opened);
                }
            }
        }

        report.pending = scan.pending.len();
        trace!("Scan finished: {:?}", report);
        report
    }

    fn open_candidate(&self, info: PhysicalDeviceInfo) -> Result<Option<OpenedDevice>, PhysicalError> {
        let mut device = self.backend.open(&info.id)?;
        let counts = device.object_counts()?;
        let Some(profile) = DeviceProfile::classify(counts) else {
            debug!("{} ({}) exposes no objects", info.name, info.id);
            return Ok(None);
        };
        if profile == DeviceProfile::Unknown {
            info!(
                "{} ({}) has an unknown layout: {} axes, {} buttons, {} POVs",
                info.name, info.id, counts.axes, counts.buttons, counts.povs
            );
        }
        device.set_capture_format()?;
        device.claim()?;
        Ok(Some(OpenedDevice { info, profile, device }))
    }

    /// Read fresh state for one virtual device. A physical failure releases
    /// the binding before returning.
    pub fn refresh(&self, id: usize) -> Result<RefreshOutcome, AssignmentError> {
        let failed = {
            let mut guard = self.locks.inner();
            let state = &mut *guard;
            if id >= state.devices.len() {
                return Err(AssignmentError::UnknownDevice(id));
            }
            let Some(assignment) = state.assignments.iter_mut().find(|a| a.virtual_id == id) else {
                return Ok(RefreshOutcome::Unassigned);
            };
            match assignment.read() {
                Ok(raw) => {
                    state.devices[id].inputs = assignment.opened.profile.translate(&raw);
                    return Ok(RefreshOutcome::Updated);
                }
                Err(e) => {
                    warn!(
                        "Lost {} on virtual device {}: {}",
                        assignment.opened.info.id, id, e
                    );
                    assignment.opened.info.id.clone()
                }
            }
        };

        self.release_binding(id, &failed);
        Ok(RefreshOutcome::Released)
    }

    /// Drop whatever is bound to a virtual device. Returns whether anything
    /// was bound.
    pub fn release(&self, id: usize) -> Result<bool, AssignmentError> {
        let physical = {
            let state = self.locks.inner();
            if id >= state.devices.len() {
                return Err(AssignmentError::UnknownDevice(id));
            }
            state
                .assignments
                .iter()
                .find(|a| a.virtual_id == id)
                .map(|a| a.opened.info.id.clone())
        };
        Ok(physical.is_some_and(|physical| self.release_binding(id, &physical)))
    }

    /// Undo one binding, if it still exists as `(id, physical)`
    fn release_binding(&self, id: usize, physical: &PhysicalId) -> bool {
        let mut scan = self.locks.outer();
        let mut state = scan.inner();

        let Some(position) = state
            .assignments
            .iter()
            .position(|a| a.virtual_id == id && a.opened.info.id == *physical)
        else {
            debug!("Virtual device {} was already released", id);
            return false;
        };
        let mut assignment = state.assignments.remove(position);
        release_device(&mut assignment.opened);
        scan.open.remove(physical);
        state.free_slot(id);
        info!("Released {} from virtual device {}", physical, id);
        true
    }

    /// Release every binding and held handle
    pub fn release_all(&self) {
        let mut scan = self.locks.outer();
        let mut state = scan.inner();

        let assignments: Vec<Assignment> = state.assignments.drain(..).collect();
        for mut assignment in assignments {
            release_device(&mut assignment.opened);
            scan.open.remove(&assignment.opened.info.id);
            state.free_slot(assignment.virtual_id);
        }
        for mut opened in std::mem::take(&mut scan.pending) {
            release_device(&mut opened);
            scan.open.remove(&opened.info.id);
        }
        info!("Released all physical devices");
    }

    pub fn snapshot(&self, id: usize) -> Option<DeviceInputs> {
        self.locks.inner().devices.get(id).map(|d| d.inputs)
    }

    pub fn free_slots(&self) -> Vec<usize> {
        self.locks.inner().free.iter().copied().collect()
    }

    pub fn assignments(&self) -> Vec<AssignmentInfo> {
        let mut assignments: Vec<_> = self
            .locks
            .inner()
            .assignments
            .iter()
            .map(|a| AssignmentInfo {
                virtual_id: a.virtual_id,
                physical_id: a.opened.info.id.clone(),
                name: a.opened.info.name.clone(),
                profile: a.opened.profile,
            })
            .collect();
        assignments.sort_by_key(|a| a.virtual_id);
        assignments
    }

    pub fn is_open(&self, physical: &PhysicalId) -> bool {
        self.locks.outer().open.contains(physical)
    }

    pub fn pending(&self) -> usize {
        self.locks.outer().pending.len()
    }
}

impl InputSource for AssignmentManager {
    fn device_count(&self) -> usize {
        self.locks.inner().devices.len()
    }

    fn update(&self) {
        for id in 0..self.device_count() {
            self.update_device(id);
        }
    }

    fn update_device(&self, index: usize) {
        if let Err(e) = self.refresh(index) {
            debug!("Refresh of virtual device {} failed: {}", index, e);
        }
    }

    fn inputs(&self, index: usize) -> Option<DeviceInputs> {
        self.snapshot(index)
    }

    fn take_input_lost(&self, index: usize) -> bool {
        self.locks
            .inner()
            .devices
            .get_mut(index)
            .is_some_and(|d| std::mem::take(&mut d.lost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dinput::catalog::ObjectCounts;
    use crate::input::{AxisType, ButtonType, Hat, HatType};
    use crate::physical::simulated::{SimulatedBackend, SimulatedOp};

    fn manager(count: usize) -> (SimulatedBackend, AssignmentManager) {
        let backend = SimulatedBackend::new();
        let manager = AssignmentManager::new(Arc::new(backend.clone()), count);
        (backend, manager)
    }

    #[test]
    fn test_scan_binds_lowest_free_slots() {
        let (backend, manager) = manager(2);
        backend.attach_standard("pad0");
        backend.attach_standard("pad1");

        let report = manager.scan();
        assert_eq!(report.bound, 2);
        assert!(manager.free_slots().is_empty());
        let ids: Vec<_> = manager.assignments().into_iter().map(|a| a.physical_id.0).collect();
        assert_eq!(ids, ["pad0", "pad1"]);
    }

    #[test]
    fn test_scan_skips_open_devices() {
        let (backend, manager) = manager(2);
        let pad = backend.attach_standard("pad0");
        manager.scan();
        manager.scan();
        manager.scan();
        assert_eq!(pad.opens(), 1);
        assert_eq!(manager.assignments().len(), 1);
        assert_eq!(manager.free_slots(), vec![1]);
    }

    #[test]
    fn test_refresh_translates_state() {
        let (backend, manager) = manager(1);
        let pad = backend.attach_standard("pad0");
        manager.scan();

        let mut raw = RawJoyState::default();
        raw.axes[0] = 65535;
        raw.axes[4] = 65535;
        raw.buttons[3] = 0x80;
        raw.povs[0] = 4500;
        pad.set_state(raw);

        assert_eq!(manager.refresh(0), Ok(RefreshOutcome::Updated));
        let inputs = manager.snapshot(0).unwrap();
        assert_eq!(inputs.axis(AxisType::LeftStickX), 1.0);
        assert_eq!(inputs.axis(AxisType::RightTrigger), 1.0);
        assert!(inputs.button(ButtonType::North));
        assert_eq!(inputs.hat(HatType::DPad), Hat::NorthEast);
    }

    #[test]
    fn test_refresh_unknown_and_free() {
        let (_, manager) = manager(2);
        assert_eq!(manager.refresh(0), Ok(RefreshOutcome::Unassigned));
        assert_eq!(manager.refresh(2), Err(AssignmentError::UnknownDevice(2)));
    }

    #[test]
    fn test_failed_refresh_releases_in_same_call() {
        let (backend, manager) = manager(3);
        let pads: Vec<_> = (0..3).map(|i| backend.attach_standard(&format!("pad{}", i))).collect();
        manager.scan();
        assert!(manager.free_slots().is_empty());

        let mut raw = RawJoyState::default();
        raw.buttons[0] = 0x80;
        pads[2].set_state(raw);
        manager.refresh(2).unwrap();
        assert!(!manager.snapshot(2).unwrap().is_neutral());

        pads[2].fail(SimulatedOp::Poll);
        assert_eq!(manager.refresh(2), Ok(RefreshOutcome::Released));
        assert_eq!(manager.free_slots(), vec![2]);
        assert!(manager.snapshot(2).unwrap().is_neutral());
        assert!(!manager.is_open(pads[2].id()));
        assert!(!pads[2].is_claimed());

        pads[0].detach();
        assert_eq!(manager.refresh(0), Ok(RefreshOutcome::Released));
        assert_eq!(manager.free_slots(), vec![0, 2]);
        assert_eq!(manager.assignments().len(), 1);
    }

    #[test]
    fn test_input_lost_reported_once() {
        let (backend, manager) = manager(1);
        let pad = backend.attach_standard("pad0");
        manager.scan();
        assert!(!manager.take_input_lost(0));

        pad.fail(SimulatedOp::ReadState);
        manager.update();
        assert!(manager.take_input_lost(0));
        assert!(!manager.take_input_lost(0));
    }

    #[test]
    fn test_device_update_leaves_other_slots() {
        let (backend, manager) = manager(2);
        let first = backend.attach_standard("pad0");
        let second = backend.attach_standard("pad1");
        manager.scan();

        let mut raw = RawJoyState::default();
        raw.buttons[1] = 0x80;
        first.set_state(raw);
        second.fail(SimulatedOp::Poll);

        manager.update_device(0);
        assert!(manager.snapshot(0).unwrap().button(ButtonType::South));
        assert_eq!(manager.assignments().len(), 2);
        assert!(!manager.take_input_lost(1));

        manager.update_device(1);
        assert_eq!(manager.free_slots(), vec![1]);
        assert!(manager.take_input_lost(1));
        assert!(!manager.take_input_lost(0));
    }

    #[test]
    fn test_released_device_is_reopened_by_next_scan() {
        let (backend, manager) = manager(1);
        let pad = backend.attach_standard("pad0");
        manager.scan();
        pad.fail(SimulatedOp::Poll);
        manager.refresh(0).unwrap();
        assert!(manager.assignments().is_empty());

        pad.recover(SimulatedOp::Poll);
        manager.scan();
        assert_eq!(pad.opens(), 2);
        assert_eq!(manager.assignments()[0].virtual_id, 0);
    }

    #[test]
    fn test_open_failure_is_retried() {
        let (backend, manager) = manager(1);
        let pad = backend.attach_standard("pad0");
        pad.fail(SimulatedOp::Claim);

        let report = manager.scan();
        assert_eq!(report.failed, 1);
        assert!(!manager.is_open(pad.id()));
        assert_eq!(manager.free_slots(), vec![0]);

        pad.recover(SimulatedOp::Claim);
        assert_eq!(manager.scan().bound, 1);
        assert!(pad.is_claimed());
    }

    #[test]
    fn test_empty_devices_are_skipped() {
        let (backend, manager) = manager(1);
        let empty = backend.attach("dongle", "Receiver", ObjectCounts::default());
        let report = manager.scan();
        assert_eq!(report.skipped, 1);
        assert!(!manager.is_open(empty.id()));
        assert_eq!(manager.free_slots(), vec![0]);
    }

    #[test]
    fn test_held_devices_bind_first() {
        let (backend, manager) = manager(1);
        let first = backend.attach_standard("pad0");
        let second = backend.attach_standard("pad1");
        let report = manager.scan();
        assert_eq!((report.bound, report.pending), (1, 1));
        assert!(manager.is_open(second.id()));

        first.detach();
        manager.refresh(0).unwrap();
        let report = manager.scan();
        assert_eq!((report.bound, report.pending), (1, 0));
        assert_eq!(manager.assignments()[0].physical_id, *second.id());
        assert_eq!(second.opens(), 1);
    }

    #[test]
    fn test_unknown_layout_still_binds() {
        let (backend, manager) = manager(1);
        backend.attach(
            "stick",
            "Flight Stick",
            ObjectCounts {
                axes: 3,
                buttons: 8,
                povs: 1,
            },
        );
        manager.scan();
        assert_eq!(manager.assignments()[0].profile, DeviceProfile::Unknown);
    }

    #[test]
    fn test_release_and_release_all() {
        let (backend, manager) = manager(2);
        let first = backend.attach_standard("pad0");
        let second = backend.attach_standard("pad1");
        backend.attach_standard("pad2");
        manager.scan();
        assert_eq!(manager.pending(), 1);

        assert_eq!(manager.release(0), Ok(true));
        assert_eq!(manager.release(0), Ok(false));
        assert!(!first.is_claimed());
        assert_eq!(manager.release(5), Err(AssignmentError::UnknownDevice(5)));

        manager.release_all();
        assert!(manager.assignments().is_empty());
        assert_eq!(manager.pending(), 0);
        assert_eq!(manager.free_slots(), vec![0, 1]);
        assert!(!second.is_claimed());
    }

    #[test]
    fn test_concurrent_scan_and_refresh() {
        let (backend, manager) = manager(4);
        let pads: Vec<_> = (0..6).map(|i| backend.attach_standard(&format!("pad{}", i))).collect();
        let manager = Arc::new(manager);

        std::thread::scope(|s| {
            let scanner = Arc::clone(&manager);
            s.spawn(move || {
                for _ in 0..200 {
                    scanner.scan();
                }
            });
            for _ in 0..2 {
                let reader = Arc::clone(&manager);
                s.spawn(move || {
                    for _ in 0..200 {
                        reader.update();
                    }
                });
            }
            let pads = &pads;
            s.spawn(move || {
                for round in 0..200 {
                    let pad = &pads[round % pads.len()];
                    if round % 3 == 0 {
                        pad.fail(SimulatedOp::Poll);
                    } else {
                        pad.recover(SimulatedOp::Poll);
                    }
                }
            });
        });

        for pad in &pads {
            pad.recover(SimulatedOp::Poll);
        }
        manager.scan();
        manager.scan();

        // every slot is either free or assigned, never both
        let assigned: Vec<_> = manager.assignments().into_iter().map(|a| a.virtual_id).collect();
        let free = manager.free_slots();
        assert_eq!(assigned.len() + free.len(), 4);
        assert!(assigned.iter().all(|id| !free.contains(id)));
    }
}
