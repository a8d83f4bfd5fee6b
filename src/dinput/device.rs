use super::catalog::{DeviceObjectCatalog, ObjectClass};
use super::charset::{Charset, EncodedName, MAX_PATH};
use super::format::{DataFormat, FormatMapping, NegotiatedFormat, negotiate};
use super::interface::{DeviceGuid, DeviceInstance};
use super::property::{Property, PropertyStore, PropertyTarget, PropertyValue};
use super::render::render;
use super::{ObjectGuid, devtype, didc, didft};
use crate::error::{DirectInputError, Result};
use crate::input::{InputFilter, InputSource};
use crate::templates::DeviceKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// `GetCapabilities` answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCaps {
    pub flags: u32,
    pub dev_type: u32,
    pub axes: u32,
    pub buttons: u32,
    pub povs: u32,
}

/// `EnumObjects` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInstance {
    pub guid: ObjectGuid,
    pub offset: u32,
    pub type_bits: u32,
    pub flags: u32,
    pub name: EncodedName,
}

/// One open device session.
///
/// Every session owns its own catalog, so negotiation and property changes
/// never leak between callers even when they share a virtual device.
pub struct EmulatedDevice {
    index: usize,
    charset: Charset,
    catalog: DeviceObjectCatalog,
    format: Option<NegotiatedFormat>,
    acquired: bool,
    source: Arc<dyn InputSource>,
    filter: InputFilter,
}

impl EmulatedDevice {
    pub fn new(index: usize, kind: DeviceKind, charset: Charset, source: Arc<dyn InputSource>, filter: InputFilter) -> Self {
        info!("Opened virtual device {} as {:?}", index, kind);
        Self {
            index,
            charset,
            catalog: DeviceObjectCatalog::build(kind),
            format: None,
            acquired: false,
            source,
            filter,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn catalog(&self) -> &DeviceObjectCatalog {
        &self.catalog
    }

    pub fn mappings(&self) -> &[FormatMapping] {
        self.format.as_ref().map_or(&[][..], |f| f.mappings.as_slice())
    }

    pub fn negotiated_format(&self) -> Option<&NegotiatedFormat> {
        self.format.as_ref()
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    pub fn capabilities(&self) -> DeviceCaps {
        let counts = self.catalog.counts();
        DeviceCaps {
            flags: didc::ATTACHED | didc::EMULATED,
            dev_type: devtype::make(devtype::GAMEPAD, devtype::GAMEPAD_STANDARD) | devtype::HID,
            axes: counts.axes,
            buttons: counts.buttons,
            povs: counts.povs,
        }
    }

    pub fn device_info(&self) -> DeviceInstance {
        DeviceInstance::gamepad(self.index, self.catalog.kind(), self.charset)
    }

    pub fn enum_objects(&self, filter: u32) -> Vec<ObjectInstance> {
        let collection = didft::enum_collection(filter);
        if collection != 0 {
            info!("Ignoring object enumeration of collection {}", collection);
            return Vec::new();
        }
        self.catalog
            .enumerate(filter)
            .map(|object| ObjectInstance {
                guid: object.guid,
                offset: object.native_offset,
                type_bits: object.object_id(),
                flags: object.flags,
                name: self.charset.encode(&object.name, MAX_PATH),
            })
            .collect()
    }

    /// Negotiate a new data format. On failure the previous format stays in
    /// effect.
    pub fn set_data_format(&mut self, format: &DataFormat) -> Result<()> {
        let negotiated = negotiate(&mut self.catalog, format)?;
        self.format = Some(negotiated);
        Ok(())
    }

    pub fn set_cooperative_level(&mut self, flags: u32) -> Result<()> {
        debug!("Device {} cooperative level 0x{:08x}", self.index, flags);
        Ok(())
    }

    pub fn acquire(&mut self) -> Result<()> {
        self.acquired = true;
        Ok(())
    }

    pub fn unacquire(&mut self) -> Result<()> {
        self.acquired = false;
        Ok(())
    }

    pub fn get_property(&mut self, property: Property, target: PropertyTarget) -> Result<PropertyValue> {
        let mappings = self.format.as_ref().map_or(&[][..], |f| f.mappings.as_slice());
        PropertyStore::new(&mut self.catalog, mappings).get(property, target)
    }

    pub fn set_property(&mut self, property: Property, target: PropertyTarget, value: PropertyValue) -> Result<()> {
        let mappings = self.format.as_ref().map_or(&[][..], |f| f.mappings.as_slice());
        PropertyStore::new(&mut self.catalog, mappings).set(property, target, value)
    }

    /// Pull fresh state from the input source
    pub fn poll(&self) -> Result<()> {
        self.source.update_device(self.index);
        if self.source.take_input_lost(self.index) {
            warn!("Virtual device {} lost its input", self.index);
            return Err(DirectInputError::InputLost);
        }
        trace!("Polled device {}", self.index);
        Ok(())
    }

    /// The negotiated format, if `size` is the buffer size it expects
    fn format_for(&self, size: usize) -> Result<&NegotiatedFormat> {
        let format = self
            .format
            .as_ref()
            .ok_or_else(|| DirectInputError::invalid("no data format set"))?;
        if size != format.data_size as usize {
            return Err(DirectInputError::invalid(format!(
                "state buffer is {} bytes, format needs {}",
                size, format.data_size
            )));
        }
        Ok(format)
    }

    /// Render the latest snapshot into `buffer` using the negotiated format
    pub fn get_device_state(&self, buffer: &mut [u8]) -> Result<()> {
        let format = self.format_for(buffer.len())?;
        let inputs = self.filter.apply(self.source.inputs(self.index).unwrap_or_default());
        render(&self.catalog, format, &inputs, buffer);
        Ok(())
    }

    /// Like [`get_device_state`](Self::get_device_state), allocating the
    /// buffer only once `size` is known to match the format
    pub fn read_state(&self, size: usize) -> Result<Vec<u8>> {
        self.format_for(size)?;
        let mut buffer = vec![0; size];
        self.get_device_state(&mut buffer)?;
        Ok(buffer)
    }

    pub fn instance_guid(&self) -> DeviceGuid {
        DeviceGuid::Virtual(self.index)
    }

    /// Whether a mapped object of `class` exists at `offset`
    pub fn is_mapped(&self, offset: u32, class: ObjectClass) -> bool {
        self.mappings()
            .iter()
            .any(|m| m.offset == offset && self.catalog.get(m.object).is_some_and(|o| o.class == class))
    }
}
