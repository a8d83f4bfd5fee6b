//! Access to real controllers attached to the host.
//!
//! Backends only have to hand out raw state in the canonical joystick
//! layout; classification and translation into [`DeviceInputs`] happen
//! here so every backend behaves the same way.

use crate::dinput::catalog::ObjectCounts;
use crate::input::{AxisType, ButtonType, DeviceInputs, Hat, HatType};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[cfg(target_os = "linux")]
mod linux;
pub mod simulated;

#[cfg(target_os = "linux")]
pub use linux::EvdevBackend;
pub use simulated::{SimulatedBackend, SimulatedHandle};

/// Full scale of a raw axis value
pub const RAW_AXIS_MAX: i32 = 65535;

#[derive(Debug, thiserror::Error)]
pub enum PhysicalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("Device rejected request: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, PhysicalError>;

/// Backend-native identifier, stable while the device stays attached
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalId(pub String);

impl std::fmt::Display for PhysicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalDeviceInfo {
    pub id: PhysicalId,
    pub name: String,
}

/// Raw state in the canonical joystick layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawJoyState {
    /// X, Y, Z, Rx, Ry, Rz in `0..=RAW_AXIS_MAX`
    pub axes: [i32; 6],
    pub povs: [u32; 4],
    pub buttons: [u8; 32],
}

impl Default for RawJoyState {
    fn default() -> Self {
        let center = RAW_AXIS_MAX / 2;
        Self {
            axes: [center, center, center, 0, 0, center],
            povs: [crate::input::POV_CENTERED; 4],
            buttons: [0; 32],
        }
    }
}

/// Enumerates attached controllers and opens them
pub trait PhysicalBackend: Send + Sync {
    fn enumerate(&self) -> Result<Vec<PhysicalDeviceInfo>>;

    fn open(&self, id: &PhysicalId) -> Result<Box<dyn PhysicalDevice>>;
}

/// An open controller handle
pub trait PhysicalDevice: Send {
    fn object_counts(&mut self) -> Result<ObjectCounts>;

    /// Switch the device to the canonical joystick layout
    fn set_capture_format(&mut self) -> Result<()>;

    /// Take exclusive access
    fn claim(&mut self) -> Result<()>;

    fn poll(&mut self) -> Result<()>;

    fn read_state(&mut self) -> Result<RawJoyState>;

    /// Give exclusive access back
    fn release(&mut self) -> Result<()>;
}

/// Known controller shapes, by object counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceProfile {
    /// 6 axes, 14 buttons, 1 hat
    Standard,
    /// 4 axes, 13 buttons, 1 hat: no analog triggers, no trackpad
    Compact,
    Unknown,
}

/// Button order of the canonical layout for a PlayStation style pad
const BUTTON_ORDER: [ButtonType; 14] = [
    ButtonType::West,     // Square
    ButtonType::South,    // Cross
    ButtonType::East,     // Circle
    ButtonType::North,    // Triangle
    ButtonType::L1,
    ButtonType::R1,
    ButtonType::L2,
    ButtonType::R2,
    ButtonType::Select,   // Share
    ButtonType::Start,    // Options
    ButtonType::L3,
    ButtonType::R3,
    ButtonType::Home,     // PS
    ButtonType::Trackpad,
];

/// Canonical axis slot feeding each logical axis
const AXIS_ORDER: [(usize, AxisType); 6] = [
    (0, AxisType::LeftStickX),
    (1, AxisType::LeftStickY),
    (2, AxisType::RightStickX),
    (5, AxisType::RightStickY),
    (3, AxisType::LeftTrigger),
    (4, AxisType::RightTrigger),
];

impl DeviceProfile {
    /// `None` for devices with nothing to read at all
    pub fn classify(counts: ObjectCounts) -> Option<DeviceProfile> {
        match (counts.axes, counts.buttons, counts.povs) {
            (0, 0, 0) => None,
            (6, 14, 1) => Some(DeviceProfile::Standard),
            (4, 13, 1) => Some(DeviceProfile::Compact),
            _ => Some(DeviceProfile::Unknown),
        }
    }

    fn has_triggers(self) -> bool {
        !matches!(self, DeviceProfile::Compact)
    }

    pub fn translate(self, raw: &RawJoyState) -> DeviceInputs {
        let mut inputs = DeviceInputs::default();

        for (slot, axis) in AXIS_ORDER {
            let is_trigger = matches!(axis, AxisType::LeftTrigger | AxisType::RightTrigger);
            if is_trigger && !self.has_triggers() {
                continue;
            }
            inputs.set_axis(axis, raw.axes[slot] as f32 / RAW_AXIS_MAX as f32);
        }

        let buttons = match self {
            DeviceProfile::Compact => &BUTTON_ORDER[..13],
            _ => &BUTTON_ORDER[..],
        };
        for (raw_button, button) in raw.buttons.iter().zip(buttons) {
            inputs.set_button(*button, *raw_button != 0);
        }

        let hat = Hat::from_pov(raw.povs[0]).unwrap_or_else(|| {
            warn!("Unrecognized POV value {}, treating as centered", raw.povs[0]);
            Hat::Neutral
        });
        inputs.set_hat(HatType::DPad, hat);

        inputs
    }
}
