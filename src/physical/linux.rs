//! evdev backed controllers.
//!
//! Absolute axes are rescaled from each device's reported range onto the
//! canonical `0..=65535`, and the first hat is folded into a POV value.

use super::{
    PhysicalBackend, PhysicalDevice, PhysicalDeviceInfo, PhysicalError, PhysicalId, RAW_AXIS_MAX, RawJoyState, Result,
};
use crate::dinput::catalog::ObjectCounts;
use crate::input::Hat;
use ::evdev::{AbsoluteAxisType, Device, Key};
use std::path::Path;
use tracing::{debug, info};

/// Source axis for each canonical slot (X, Y, Z, Rx, Ry, Rz)
const AXIS_SOURCES: [AbsoluteAxisType; 6] = [
    AbsoluteAxisType::ABS_X,
    AbsoluteAxisType::ABS_Y,
    AbsoluteAxisType::ABS_RX, // right stick X
    AbsoluteAxisType::ABS_Z,  // L2
    AbsoluteAxisType::ABS_RZ, // R2
    AbsoluteAxisType::ABS_RY, // right stick Y
];

/// Source key for each canonical button, in PlayStation order. The last
/// slot is the touchpad click, which drivers expose under different codes;
/// the first one the device supports is used.
const BUTTON_SOURCES: [&[Key]; 14] = [
    &[Key::BTN_WEST],
    &[Key::BTN_SOUTH],
    &[Key::BTN_EAST],
    &[Key::BTN_NORTH],
    &[Key::BTN_TL],
    &[Key::BTN_TR],
    &[Key::BTN_TL2],
    &[Key::BTN_TR2],
    &[Key::BTN_SELECT],
    &[Key::BTN_START],
    &[Key::BTN_THUMBL],
    &[Key::BTN_THUMBR],
    &[Key::BTN_MODE],
    &[Key::BTN_TOUCH, Key::BTN_THUMB, Key::BTN_LEFT],
];

/// Key read for each canonical button slot, `None` where the device has none
fn select_buttons(supports: impl Fn(Key) -> bool) -> [Option<Key>; 14] {
    BUTTON_SOURCES.map(|candidates| candidates.iter().copied().find(|key| supports(*key)))
}

/// Range of each canonical axis slot the device actually has
fn select_ranges(
    supports: impl Fn(AbsoluteAxisType) -> bool,
    range_of: impl Fn(AbsoluteAxisType) -> Option<(i32, i32)>,
) -> [Option<(i32, i32)>; 6] {
    AXIS_SOURCES.map(|axis| if supports(axis) { range_of(axis) } else { None })
}

fn is_gamepad(device: &Device) -> bool {
    device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_SOUTH) || keys.contains(Key::BTN_TRIGGER))
}

/// Controllers under /dev/input
#[derive(Debug, Default)]
pub struct EvdevBackend;

impl EvdevBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PhysicalBackend for EvdevBackend {
    fn enumerate(&self) -> Result<Vec<PhysicalDeviceInfo>> {
        Ok(::evdev::enumerate()
            .filter(|(_, device)| is_gamepad(device))
            .map(|(path, device)| PhysicalDeviceInfo {
                id: PhysicalId(path.to_string_lossy().to_string()),
                name: device.name().unwrap_or("Unknown").to_string(),
            })
            .collect())
    }

    fn open(&self, id: &PhysicalId) -> Result<Box<dyn PhysicalDevice>> {
        let device = Device::open(&id.0)?;
        debug!("Opened {} ({})", id, device.name().unwrap_or("Unknown"));
        let buttons = match device.supported_keys() {
            Some(keys) => select_buttons(|key| keys.contains(key)),
            None => [None; 14],
        };
        Ok(Box::new(EvdevDevice {
            id: id.clone(),
            device,
            ranges: [None; 6],
            buttons,
            grabbed: false,
        }))
    }
}

struct EvdevDevice {
    id: PhysicalId,
    device: Device,
    /// `(minimum, maximum)` per canonical slot the device has, filled by the
    /// capture format
    ranges: [Option<(i32, i32)>; 6],
    buttons: [Option<Key>; 14],
    grabbed: bool,
}

impl EvdevDevice {
    fn supports_axis(&self, axis: AbsoluteAxisType) -> bool {
        self.device
            .supported_absolute_axes()
            .is_some_and(|axes| axes.contains(axis))
    }

    fn has_hat(&self) -> bool {
        self.supports_axis(AbsoluteAxisType::ABS_HAT0X)
    }
}

fn rescale(value: i32, (min, max): (i32, i32)) -> i32 {
    if max <= min {
        return RAW_AXIS_MAX / 2;
    }
    let span = i64::from(max) - i64::from(min);
    let value = i64::from(value.clamp(min, max)) - i64::from(min);
    (value * i64::from(RAW_AXIS_MAX) / span) as i32
}

impl PhysicalDevice for EvdevDevice {
    fn object_counts(&mut self) -> Result<ObjectCounts> {
        let axes = AXIS_SOURCES.iter().filter(|axis| self.supports_axis(**axis)).count();
        Ok(ObjectCounts {
            axes: axes as u32,
            buttons: self.buttons.iter().flatten().count() as u32,
            povs: u32::from(self.has_hat()),
        })
    }

    fn set_capture_format(&mut self) -> Result<()> {
        let state = self.device.get_abs_state()?;
        self.ranges = select_ranges(
            |axis| self.supports_axis(axis),
            |axis| state.get(axis.0 as usize).map(|info| (info.minimum, info.maximum)),
        );
        Ok(())
    }

    fn claim(&mut self) -> Result<()> {
        self.device.grab()?;
        self.grabbed = true;
        info!("Grabbed {}", self.id);
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        if !Path::new(&self.id.0).exists() {
            return Err(PhysicalError::Disconnected(self.id.to_string()));
        }
        Ok(())
    }

    fn read_state(&mut self) -> Result<RawJoyState> {
        let abs = self.device.get_abs_state()?;
        let keys = self.device.get_key_state()?;

        let mut raw = RawJoyState::default();
        // absent axes keep their resting values
        for (slot, axis) in AXIS_SOURCES.iter().enumerate() {
            if let (Some(range), Some(info)) = (self.ranges[slot], abs.get(axis.0 as usize)) {
                raw.axes[slot] = rescale(info.value, range);
            }
        }
        for (slot, key) in self.buttons.iter().enumerate() {
            if key.is_some_and(|key| keys.contains(key)) {
                raw.buttons[slot] = 0x80;
            }
        }
        if self.has_hat() {
            let x = abs.get(AbsoluteAxisType::ABS_HAT0X.0 as usize).map_or(0, |i| i.value);
            let y = abs.get(AbsoluteAxisType::ABS_HAT0Y.0 as usize).map_or(0, |i| i.value);
            raw.povs[0] = Hat::from_xy(x, y).to_pov();
        }
        Ok(raw)
    }

    fn release(&mut self) -> Result<()> {
        if self.grabbed {
            self.device.ungrab()?;
            self.grabbed = false;
            info!("Released {}", self.id);
        }
        Ok(())
    }
}
