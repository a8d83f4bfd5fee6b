//! Normalized controller state shared by every input source.
//!
//! Axis values live in `[0, 1]`: sticks rest at `0.5`, triggers at `0.0`.

use serde::{Deserialize, Serialize};

mod filter;
mod source;

pub use filter::{DeadzoneFilter, InputFilter};
pub use source::{FeedSource, InputSource};

/// Logical analog axes of a virtual gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisType {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
}

impl AxisType {
    pub const ALL: [AxisType; 6] = [
        AxisType::LeftStickX,
        AxisType::LeftStickY,
        AxisType::RightStickX,
        AxisType::RightStickY,
        AxisType::LeftTrigger,
        AxisType::RightTrigger,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Value the axis takes when nothing is touching it
    pub fn neutral(self) -> f32 {
        match self {
            AxisType::LeftTrigger | AxisType::RightTrigger => 0.0,
            _ => 0.5,
        }
    }
}

/// Logical buttons of a virtual gamepad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonType {
    /// Start/Options
    Start,
    /// Back/Share
    Select,
    /// Guide/PS
    Home,
    /// Y/Triangle
    North,
    /// B/Circle
    East,
    /// A/Cross
    South,
    /// X/Square
    West,
    L1,
    L2,
    L3,
    R1,
    R2,
    R3,
    Trackpad,
}

impl ButtonType {
    pub const ALL: [ButtonType; 14] = [
        ButtonType::Start,
        ButtonType::Select,
        ButtonType::Home,
        ButtonType::North,
        ButtonType::East,
        ButtonType::South,
        ButtonType::West,
        ButtonType::L1,
        ButtonType::L2,
        ButtonType::L3,
        ButtonType::R1,
        ButtonType::R2,
        ButtonType::R3,
        ButtonType::Trackpad,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Eight-way hat position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hat {
    #[default]
    Neutral,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

/// POV value reported for a centered hat
pub const POV_CENTERED: u32 = 0xFFFF_FFFF;

impl Hat {
    /// Position as a DirectInput POV value: hundredths of a degree clockwise
    /// from north, or [`POV_CENTERED`].
    pub fn to_pov(self) -> u32 {
        match self {
            Hat::Neutral => POV_CENTERED,
            Hat::North => 0,
            Hat::NorthEast => 4500,
            Hat::East => 9000,
            Hat::SouthEast => 13500,
            Hat::South => 18000,
            Hat::SouthWest => 22500,
            Hat::West => 27000,
            Hat::NorthWest => 31500,
        }
    }

    /// Inverse of [`Hat::to_pov`]. A low word of `0xFFFF` also means centered,
    /// which is how some drivers report it. Anything else is `None`.
    pub fn from_pov(pov: u32) -> Option<Hat> {
        if pov & 0xFFFF == 0xFFFF {
            return Some(Hat::Neutral);
        }
        let hat = match pov {
            0 => Hat::North,
            4500 => Hat::NorthEast,
            9000 => Hat::East,
            13500 => Hat::SouthEast,
            18000 => Hat::South,
            22500 => Hat::SouthWest,
            27000 => Hat::West,
            31500 => Hat::NorthWest,
            _ => return None,
        };
        Some(hat)
    }

    /// Build a hat from a pair of digital directions, `y < 0` being up.
    pub fn from_xy(x: i32, y: i32) -> Hat {
        match (x.signum(), y.signum()) {
            (-1, -1) => Hat::NorthWest,
            (-1, 0) => Hat::West,
            (-1, 1) => Hat::SouthWest,
            (0, -1) => Hat::North,
            (0, 1) => Hat::South,
            (1, -1) => Hat::NorthEast,
            (1, 0) => Hat::East,
            (1, 1) => Hat::SouthEast,
            _ => Hat::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HatType {
    DPad,
}

/// Control a device object reads its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalControl {
    Axis(AxisType),
    Button(ButtonType),
    Hat(HatType),
}

/// Snapshot of one virtual gamepad
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceInputs {
    axes: [f32; 6],
    buttons: [bool; 14],
    dpad: Hat,
}

impl Default for DeviceInputs {
    fn default() -> Self {
        Self {
            axes: AxisType::ALL.map(AxisType::neutral),
            buttons: [false; 14],
            dpad: Hat::Neutral,
        }
    }
}

impl DeviceInputs {
    pub fn axis(&self, axis: AxisType) -> f32 {
        self.axes[axis.index()]
    }

    /// Set an axis, clamping into `[0, 1]`. NaN is treated as the axis's
    /// neutral position.
    pub fn set_axis(&mut self, axis: AxisType, value: f32) {
        let value = if value.is_nan() {
            axis.neutral()
        } else {
            value.clamp(0.0, 1.0)
        };
        self.axes[axis.index()] = value;
    }

    pub fn button(&self, button: ButtonType) -> bool {
        self.buttons[button.index()]
    }

    pub fn set_button(&mut self, button: ButtonType, pressed: bool) {
        self.buttons[button.index()] = pressed;
    }

    pub fn hat(&self, hat: HatType) -> Hat {
        match hat {
            HatType::DPad => self.dpad,
        }
    }

    pub fn set_hat(&mut self, hat: HatType, value: Hat) {
        match hat {
            HatType::DPad => self.dpad = value,
        }
    }

    /// Return every control to its neutral position
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }

    /// Builder-style helpers, mostly for callers composing a frame in one go
    pub fn with_axis(mut self, axis: AxisType, value: f32) -> Self {
        self.set_axis(axis, value);
        self
    }

    pub fn with_button(mut self, button: ButtonType, pressed: bool) -> Self {
        self.set_button(button, pressed);
        self
    }

    pub fn with_hat(mut self, hat: HatType, value: Hat) -> Self {
        self.set_hat(hat, value);
        self
    }
}
