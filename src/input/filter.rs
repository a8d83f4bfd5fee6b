use super::{AxisType, DeviceInputs, Hat, HatType};
use serde::{Deserialize, Serialize};

/// Left-stick threshold: each axis is snapped to the center or to the edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeadzoneFilter {
    pub threshold: f32,
}

/// Post-processing applied to a snapshot before it is rendered
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputFilter {
    /// Recenter the left stick whenever the d-pad is held
    pub dpad_override: bool,
    pub deadzone: Option<DeadzoneFilter>,
}

impl InputFilter {
    pub fn is_passthrough(&self) -> bool {
        !self.dpad_override && self.deadzone.is_none()
    }

    pub fn apply(&self, mut inputs: DeviceInputs) -> DeviceInputs {
        if self.dpad_override && inputs.hat(HatType::DPad) != Hat::Neutral {
            inputs.set_axis(AxisType::LeftStickX, 0.5);
            inputs.set_axis(AxisType::LeftStickY, 0.5);
        }

        if let Some(deadzone) = self.deadzone {
            for axis in [AxisType::LeftStickX, AxisType::LeftStickY] {
                let value = inputs.axis(axis);
                let (sign, magnitude) = if value > 0.5 {
                    (1.0, (value - 0.5) * 2.0)
                } else {
                    (-1.0, (0.5 - value) * 2.0)
                };
                let magnitude = if magnitude > deadzone.threshold { 1.0 } else { 0.0 };
                inputs.set_axis(axis, 0.5 + 0.5 * sign * magnitude);
            }
        }

        inputs
    }
}
