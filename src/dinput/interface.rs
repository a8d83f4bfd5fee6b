use super::charset::{Charset, EncodedName, MAX_PATH};
use super::device::EmulatedDevice;
use super::{Guid, devtype, diedfl};
use crate::error::{DirectInputError, Result};
use crate::input::{InputFilter, InputSource};
use crate::templates::DeviceKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Leading bytes shared by every virtual device GUID; the index fills the
/// last four bytes.
const VIRTUAL_GUID_PREFIX: Guid = Guid {
    data1: 0xdead571c,
    data2: 0x4efc,
    data3: 0x9fa7,
    data4: [0x9a, 0x7e, 0x8d, 0x10, 0, 0, 0, 0],
};

/// Device classes accepted by `EnumDevices` (`DI8DEVCLASS_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    All,
    Pointer,
    Keyboard,
    GameController,
}

/// Identity of an enumerable device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceGuid {
    SysKeyboard,
    SysMouse,
    Virtual(usize),
}

impl DeviceGuid {
    pub fn to_guid(self) -> Guid {
        match self {
            DeviceGuid::SysKeyboard => Guid {
                data1: 0x6F1D2B61,
                data2: 0xD5A0,
                data3: 0x11CF,
                data4: [0xBF, 0xC7, 0x44, 0x45, 0x53, 0x54, 0x00, 0x00],
            },
            DeviceGuid::SysMouse => Guid {
                data1: 0x6F1D2B60,
                data2: 0xD5A0,
                data3: 0x11CF,
                data4: [0xBF, 0xC7, 0x44, 0x45, 0x53, 0x54, 0x00, 0x00],
            },
            DeviceGuid::Virtual(index) => {
                let mut guid = VIRTUAL_GUID_PREFIX;
                guid.data4[4..].copy_from_slice(&(index as u32).to_be_bytes());
                guid
            }
        }
    }

    pub fn from_guid(guid: &Guid) -> Option<DeviceGuid> {
        [DeviceGuid::SysKeyboard, DeviceGuid::SysMouse]
            .into_iter()
            .find(|known| known.to_guid() == *guid)
            .or_else(|| {
                let prefix = &VIRTUAL_GUID_PREFIX;
                let same_prefix = guid.data1 == prefix.data1
                    && guid.data2 == prefix.data2
                    && guid.data3 == prefix.data3
                    && guid.data4[..4] == prefix.data4[..4];
                same_prefix.then(|| {
                    let index = u32::from_be_bytes([guid.data4[4], guid.data4[5], guid.data4[6], guid.data4[7]]);
                    DeviceGuid::Virtual(index as usize)
                })
            })
    }
}

/// `EnumDevices` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInstance {
    pub instance: DeviceGuid,
    pub product: DeviceGuid,
    pub dev_type: u32,
    pub instance_name: EncodedName,
    pub product_name: EncodedName,
}

impl DeviceInstance {
    pub fn keyboard(charset: Charset) -> Self {
        Self::named(
            DeviceGuid::SysKeyboard,
            devtype::make(devtype::KEYBOARD, devtype::KEYBOARD_PCENH),
            "Keyboard",
            "Keyboard",
            charset,
        )
    }

    pub fn mouse(charset: Charset) -> Self {
        Self::named(
            DeviceGuid::SysMouse,
            devtype::make(devtype::MOUSE, devtype::MOUSE_TRADITIONAL),
            "Mouse",
            "Mouse",
            charset,
        )
    }

    pub fn gamepad(index: usize, kind: DeviceKind, charset: Charset) -> Self {
        Self::named(
            DeviceGuid::Virtual(index),
            devtype::make(devtype::GAMEPAD, devtype::GAMEPAD_STANDARD),
            &format!("VPad P{}", index + 1),
            kind.product_name(),
            charset,
        )
    }

    fn named(guid: DeviceGuid, dev_type: u32, instance_name: &str, product_name: &str, charset: Charset) -> Self {
        Self {
            instance: guid,
            product: guid,
            dev_type,
            instance_name: charset.encode(instance_name, MAX_PATH),
            product_name: charset.encode(product_name, MAX_PATH),
        }
    }
}

/// Root of the emulated API: lists devices and opens sessions on them
pub struct EmulatedInput {
    charset: Charset,
    kind: DeviceKind,
    source: Arc<dyn InputSource>,
    filter: InputFilter,
}

impl EmulatedInput {
    pub fn new(charset: Charset, source: Arc<dyn InputSource>, filter: InputFilter) -> Self {
        info!(
            "DirectInput emulation over {} devices ({:?} names)",
            source.device_count(),
            charset
        );
        Self {
            charset,
            kind: DeviceKind::Standard,
            source,
            filter,
        }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn device_count(&self) -> usize {
        self.source.device_count()
    }

    pub fn enum_devices(&self, class: DeviceClass, flags: u32) -> Result<Vec<DeviceInstance>> {
        debug!("EnumDevices({:?}, 0x{:08x})", class, flags);
        if flags & diedfl::FORCEFEEDBACK != 0 {
            return Ok(Vec::new());
        }

        let mut devices = Vec::new();
        if matches!(class, DeviceClass::All | DeviceClass::Keyboard) {
            devices.push(DeviceInstance::keyboard(self.charset));
        }
        if matches!(class, DeviceClass::All | DeviceClass::Pointer) {
            devices.push(DeviceInstance::mouse(self.charset));
        }
        if matches!(class, DeviceClass::All | DeviceClass::GameController) {
            devices.extend(
                (0..self.device_count()).map(|index| DeviceInstance::gamepad(index, self.kind, self.charset)),
            );
        }
        Ok(devices)
    }

    /// Open a fresh session. Every call builds a new catalog.
    pub fn create_device(&self, guid: DeviceGuid) -> Result<EmulatedDevice> {
        match guid {
            DeviceGuid::SysKeyboard | DeviceGuid::SysMouse => Err(DirectInputError::Unsupported(format!(
                "{:?} is passed through to the system",
                guid
            ))),
            DeviceGuid::Virtual(index) if index < self.device_count() => Ok(EmulatedDevice::new(
                index,
                self.kind,
                self.charset,
                Arc::clone(&self.source),
                self.filter,
            )),
            DeviceGuid::Virtual(index) => Err(DirectInputError::DeviceNotRegistered(format!(
                "virtual device {}",
                index
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::FeedSource;

    fn input() -> EmulatedInput {
        EmulatedInput::new(Charset::Wide, Arc::new(FeedSource::new(2)), InputFilter::default())
    }

    #[test]
    fn test_enum_all_devices() {
        let devices = input().enum_devices(DeviceClass::All, diedfl::ATTACHEDONLY).unwrap();
        let names: Vec<_> = devices.iter().map(|d| d.instance_name.decode()).collect();
        assert_eq!(names, ["Keyboard", "Mouse", "VPad P1", "VPad P2"]);
        assert_eq!(devices[2].instance, DeviceGuid::Virtual(0));
        assert_eq!(devices[3].dev_type & 0xFF, devtype::GAMEPAD);
    }

    #[test]
    fn test_enum_filters() {
        let input = input();
        assert_eq!(input.enum_devices(DeviceClass::GameController, 0).unwrap().len(), 2);
        assert_eq!(input.enum_devices(DeviceClass::Keyboard, 0).unwrap().len(), 1);
        assert!(input.enum_devices(DeviceClass::All, diedfl::FORCEFEEDBACK).unwrap().is_empty());
    }

    #[test]
    fn test_create_device() {
        let input = input();
        let device = input.create_device(DeviceGuid::Virtual(1)).unwrap();
        assert_eq!(device.index(), 1);
        assert!(matches!(
            input.create_device(DeviceGuid::Virtual(2)),
            Err(DirectInputError::DeviceNotRegistered(_))
        ));
        assert!(matches!(
            input.create_device(DeviceGuid::SysMouse),
            Err(DirectInputError::Unsupported(_))
        ));
    }

    #[test]
    fn test_sessions_do_not_share_catalogs() {
        let input = input();
        let mut first = input.create_device(DeviceGuid::Virtual(0)).unwrap();
        let second = input.create_device(DeviceGuid::Virtual(0)).unwrap();
        first.set_data_format(&crate::dinput::DataFormat::joystick()).unwrap();
        assert!(first.catalog().get(0).unwrap().is_matched());
        assert!(!second.catalog().get(0).unwrap().is_matched());
    }

    #[test]
    fn test_guid_round_trip() {
        for guid in [DeviceGuid::SysKeyboard, DeviceGuid::SysMouse, DeviceGuid::Virtual(7)] {
            assert_eq!(DeviceGuid::from_guid(&guid.to_guid()), Some(guid));
        }
        let virtual_guid = DeviceGuid::Virtual(1).to_guid();
        assert_eq!(virtual_guid.to_string(), "{dead571c-4efc-9fa7-9a7e-8d1000000001}");
    }
}
