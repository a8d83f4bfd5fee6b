//! DirectInput 8 style capability negotiation over the virtual gamepads.
//!
//! A caller enumerates devices through [`EmulatedInput`], opens an
//! [`EmulatedDevice`] session, negotiates a data format against the device's
//! object catalog and then reads rendered state snapshots into its own
//! buffer layout.

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod charset;
pub mod device;
pub mod format;
pub mod interface;
pub mod property;
pub mod render;

pub use catalog::{DeviceObjectCatalog, EmulatedDeviceObject, ObjectClass};
pub use charset::{Charset, EncodedName};
pub use device::{DeviceCaps, EmulatedDevice, ObjectInstance};
pub use format::{DataFormat, DefaultFixup, FormatMapping, NegotiatedFormat, ObjectDataFormat};
pub use interface::{DeviceClass, DeviceGuid, DeviceInstance, EmulatedInput};
pub use property::{Property, PropertyStore, PropertyTarget, PropertyValue};

/// Object type bits (`DIDFT_*`)
pub mod didft {
    pub const ALL: u32 = 0x0000_0000;
    pub const RELAXIS: u32 = 0x0000_0001;
    pub const ABSAXIS: u32 = 0x0000_0002;
    pub const AXIS: u32 = RELAXIS | ABSAXIS;
    pub const PSHBUTTON: u32 = 0x0000_0004;
    pub const TGLBUTTON: u32 = 0x0000_0008;
    pub const BUTTON: u32 = PSHBUTTON | TGLBUTTON;
    pub const POV: u32 = 0x0000_0010;
    pub const COLLECTION: u32 = 0x0000_0040;
    pub const NODATA: u32 = 0x0000_0080;
    pub const ANYINSTANCE: u32 = 0x00FF_FF00;
    pub const INSTANCEMASK: u32 = ANYINSTANCE;
    pub const FFACTUATOR: u32 = 0x0100_0000;
    pub const FFEFFECTTRIGGER: u32 = 0x0200_0000;
    pub const VENDORDEFINED: u32 = 0x0400_0000;
    pub const ALIAS: u32 = 0x0800_0000;
    pub const OUTPUT: u32 = 0x1000_0000;
    pub const OPTIONAL: u32 = 0x8000_0000;

    /// Every bit that names an object class
    pub const CLASSMASK: u32 = AXIS | BUTTON | POV | COLLECTION | NODATA;

    pub const fn make_instance(n: u16) -> u32 {
        (n as u32) << 8
    }

    pub const fn get_instance(bits: u32) -> u16 {
        ((bits >> 8) & 0xFFFF) as u16
    }

    /// Collection number packed into an `EnumObjects` filter
    pub const fn enum_collection(bits: u32) -> u16 {
        ((bits & 0xFFFF) >> 8) as u16
    }
}

/// Object capability flags (`DIDOI_*`)
pub mod didoi {
    pub const FFACTUATOR: u32 = 0x0000_0001;
    pub const FFEFFECTTRIGGER: u32 = 0x0000_0002;
    pub const POLLED: u32 = 0x0000_8000;
    pub const ASPECTPOSITION: u32 = 0x0000_0100;
    pub const ASPECTVELOCITY: u32 = 0x0000_0200;
    pub const ASPECTACCEL: u32 = 0x0000_0300;
    pub const ASPECTFORCE: u32 = 0x0000_0400;
    pub const ASPECTMASK: u32 = 0x0000_0F00;
}

/// Data format flags (`DIDF_*`)
pub mod didf {
    pub const ABSAXIS: u32 = 0x0000_0001;
    pub const RELAXIS: u32 = 0x0000_0002;
}

/// Device capability flags (`DIDC_*`)
pub mod didc {
    pub const ATTACHED: u32 = 0x0000_0001;
    pub const POLLEDDEVICE: u32 = 0x0000_0002;
    pub const EMULATED: u32 = 0x0000_0004;
}

/// Device type codes (`DI8DEVTYPE_*`), subtype in the second byte
pub mod devtype {
    pub const MOUSE: u32 = 0x12;
    pub const KEYBOARD: u32 = 0x13;
    pub const GAMEPAD: u32 = 0x15;
    pub const MOUSE_TRADITIONAL: u32 = 2;
    pub const KEYBOARD_PCENH: u32 = 4;
    pub const GAMEPAD_STANDARD: u32 = 2;
    /// Device is a HID device
    pub const HID: u32 = 0x0001_0000;

    pub const fn make(kind: u32, subtype: u32) -> u32 {
        kind | (subtype << 8)
    }
}

/// `EnumDevices` flags (`DIEDFL_*`)
pub mod diedfl {
    pub const ALLDEVICES: u32 = 0x0000_0000;
    pub const ATTACHEDONLY: u32 = 0x0000_0001;
    pub const FORCEFEEDBACK: u32 = 0x0000_0100;
    pub const INCLUDEALIASES: u32 = 0x0001_0000;
    pub const INCLUDEPHANTOMS: u32 = 0x0002_0000;
    pub const INCLUDEHIDDEN: u32 = 0x0004_0000;
}

/// Predefined object type GUIDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectGuid {
    XAxis,
    YAxis,
    ZAxis,
    RxAxis,
    RyAxis,
    RzAxis,
    Slider,
    Button,
    Key,
    Pov,
    Unknown,
}

/// 128-bit COM style GUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{{{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}}}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_packing() {
        assert_eq!(didft::make_instance(5), 0x500);
        assert_eq!(didft::get_instance(didft::AXIS | didft::make_instance(13)), 13);
        assert_eq!(didft::get_instance(didft::ANYINSTANCE), 0xFFFF);
        assert_eq!(didft::enum_collection(didft::ALL), 0);
        assert_eq!(didft::enum_collection(0x0000_0200 | didft::AXIS), 2);
    }

    #[test]
    fn test_guid_display() {
        let guid = Guid {
            data1: 0xdead571c,
            data2: 0x4efc,
            data3: 0x9fa7,
            data4: [0x9a, 0x7e, 0x8d, 0x10, 0, 0, 0, 1],
        };
        assert_eq!(guid.to_string(), "{dead571c-4efc-9fa7-9a7e-8d1000000001}");
    }
}
