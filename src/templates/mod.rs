use crate::dinput::catalog::{EmulatedDeviceObject, ObjectClass};
use crate::dinput::ObjectGuid;
use crate::input::{AxisType, ButtonType, HatType, LogicalControl};
use serde::{Deserialize, Serialize};

/// Object layouts a virtual device can present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceKind {
    /// DualShock 4 style pad: 6 axes, 14 buttons, 1 hat
    #[default]
    Standard,
}

impl DeviceKind {
    pub fn product_name(self) -> &'static str {
        match self {
            DeviceKind::Standard => "Wireless Controller",
        }
    }

    pub fn objects(self) -> Vec<EmulatedDeviceObject> {
        match self {
            DeviceKind::Standard => CatalogTemplates::standard(),
        }
    }
}

/// Pre-configured object layouts
pub struct CatalogTemplates;

impl CatalogTemplates {
    /// PlayStation 4 controller as DirectInput reports it
    ///
    /// Native offsets are those of the controller's own HID report so that
    /// callers probing with raw offsets land where they would on hardware.
    pub fn standard() -> Vec<EmulatedDeviceObject> {
        CatalogBuilder::new()
            .axis("X Axis", ObjectGuid::XAxis, 0, 12, AxisType::LeftStickX)
            .axis("Y Axis", ObjectGuid::YAxis, 1, 8, AxisType::LeftStickY)
            .axis("Z Axis", ObjectGuid::ZAxis, 2, 4, AxisType::RightStickX)
            .axis("Z Rotation", ObjectGuid::RzAxis, 5, 0, AxisType::RightStickY)
            .axis("X Rotation", ObjectGuid::RxAxis, 3, 28, AxisType::LeftTrigger)
            .axis("Y Rotation", ObjectGuid::RyAxis, 4, 24, AxisType::RightTrigger)
            .buttons(
                220,
                [
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
                ],
            )
            .hat("Hat Switch", 0, 16, HatType::DPad)
            .collection("Collection 0 - Game Pad", 0)
            .build()
    }
}

/// Builder for custom object layouts
///
/// Instances are given explicitly for axes since DirectInput numbers them by
/// usage rather than by position; buttons are numbered in insertion order.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    objects: Vec<EmulatedDeviceObject>,
    next_button: u16,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an absolute axis
    pub fn axis(
        mut self,
        name: &str,
        guid: ObjectGuid,
        instance: u16,
        offset: u32,
        axis: AxisType,
    ) -> Self {
        self.objects.push(EmulatedDeviceObject::new(
            name,
            guid,
            ObjectClass::AbsAxis,
            instance,
            offset,
            Some(LogicalControl::Axis(axis)),
        ));
        self
    }

    /// Add a push button named after its instance
    pub fn button(mut self, offset: u32, button: ButtonType) -> Self {
        let instance = self.next_button;
        self.objects.push(EmulatedDeviceObject::new(
            format!("Button {}", instance),
            ObjectGuid::Button,
            ObjectClass::PushButton,
            instance,
            offset,
            Some(LogicalControl::Button(button)),
        ));
        self.next_button += 1;
        self
    }

    /// Add consecutive one-byte buttons starting at `first_offset`
    pub fn buttons(mut self, first_offset: u32, buttons: impl IntoIterator<Item = ButtonType>) -> Self {
        for (offset, button) in (first_offset..).zip(buttons) {
            self = self.button(offset, button);
        }
        self
    }

    pub fn hat(mut self, name: &str, instance: u16, offset: u32, hat: HatType) -> Self {
        self.objects.push(EmulatedDeviceObject::new(
            name,
            ObjectGuid::Pov,
            ObjectClass::Pov,
            instance,
            offset,
            Some(LogicalControl::Hat(hat)),
        ));
        self
    }

    /// Add a data-less collection node
    pub fn collection(mut self, name: &str, instance: u16) -> Self {
        self.objects.push(EmulatedDeviceObject::new(
            name,
            ObjectGuid::Unknown,
            ObjectClass::Collection,
            instance,
            0,
            None,
        ));
        self
    }

    pub fn build(self) -> Vec<EmulatedDeviceObject> {
        self.objects
    }
}
