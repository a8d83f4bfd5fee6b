use super::catalog::{DeviceObjectCatalog, EmulatedDeviceObject};
use super::format::FormatMapping;
use crate::error::{DirectInputError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Deadzone and saturation are exchanged in ten-thousandths of the half-range
pub const PROPERTY_SCALE: u32 = 10_000;

/// `DIPROPAXISMODE_ABS`
pub const AXIS_MODE_ABSOLUTE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    AppData,
    AutoCenter,
    AxisMode,
    BufferSize,
    Calibration,
    CalibrationMode,
    CPoints,
    DeadZone,
    FfGain,
    InstanceName,
    ProductName,
    Range,
    Saturation,
}

impl Property {
    /// Properties that only make sense for the device as a whole
    pub fn is_device_wide(self) -> bool {
        matches!(
            self,
            Property::AutoCenter
                | Property::AxisMode
                | Property::BufferSize
                | Property::FfGain
                | Property::InstanceName
                | Property::ProductName
        )
    }
}

/// How a property request picks its object (`DIPH_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyTarget {
    /// The device as a whole
    Device,
    /// Object mapped at this offset of the current data format
    ByOffset(u32),
    /// First object matching this identifier bitfield
    ById(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    Dword(u32),
    Range { min: i32, max: i32 },
}

/// Per-object property access for one device session
pub struct PropertyStore<'a> {
    catalog: &'a mut DeviceObjectCatalog,
    mappings: &'a [FormatMapping],
}

impl<'a> PropertyStore<'a> {
    pub fn new(catalog: &'a mut DeviceObjectCatalog, mappings: &'a [FormatMapping]) -> Self {
        Self { catalog, mappings }
    }

    pub fn get(&mut self, property: Property, target: PropertyTarget) -> Result<PropertyValue> {
        if property.is_device_wide() {
            check_device_target(property, target)?;
            return match property {
                Property::AxisMode => Ok(PropertyValue::Dword(AXIS_MODE_ABSOLUTE)),
                _ => Err(DirectInputError::Unsupported(format!("{:?}", property))),
            };
        }

        let object = self.resolve(property, target)?;
        let value = match property {
            Property::DeadZone => PropertyValue::Dword(to_scaled(object.deadzone)),
            Property::Saturation => PropertyValue::Dword(to_scaled(object.saturation)),
            Property::Range => PropertyValue::Range {
                min: object.range_min,
                max: object.range_max,
            },
            _ => return Err(DirectInputError::Unimplemented(format!("get {:?}", property))),
        };
        if !object.class.is_axis() {
            return Err(DirectInputError::invalid(format!(
                "{:?} on non-axis object {}",
                property, object.name
            )));
        }
        Ok(value)
    }

    pub fn set(&mut self, property: Property, target: PropertyTarget, value: PropertyValue) -> Result<()> {
        if property.is_device_wide() {
            check_device_target(property, target)?;
            return match property {
                Property::AxisMode => {
                    warn!("Ignoring axis mode change to {:?}", value);
                    Ok(())
                }
                _ => Err(DirectInputError::Unsupported(format!("{:?}", property))),
            };
        }

        if !matches!(
            property,
            Property::DeadZone | Property::Saturation | Property::Range
        ) {
            // resolve first so bad addressing still reports as such
            self.resolve(property, target)?;
            return Err(DirectInputError::Unimplemented(format!("set {:?}", property)));
        }

        let object = self.resolve(property, target)?;
        if !object.class.is_axis() {
            return Err(DirectInputError::invalid(format!(
                "{:?} on non-axis object {}",
                property, object.name
            )));
        }

        match (property, value) {
            (Property::DeadZone, PropertyValue::Dword(raw)) => {
                object.deadzone = from_scaled(raw)?;
            }
            (Property::Saturation, PropertyValue::Dword(raw)) => {
                object.saturation = from_scaled(raw)?;
            }
            (Property::Range, PropertyValue::Range { min, max }) => {
                object.range_min = min;
                object.range_max = max;
            }
            _ => {
                return Err(DirectInputError::invalid(format!(
                    "{:?} does not take {:?}",
                    property, value
                )));
            }
        }
        debug!("Set {:?} on {} to {:?}", property, object.name, value);
        Ok(())
    }

    fn resolve(&mut self, property: Property, target: PropertyTarget) -> Result<&mut EmulatedDeviceObject> {
        let index = match target {
            PropertyTarget::Device => {
                return Err(DirectInputError::Unimplemented(format!(
                    "{:?} on the whole device",
                    property
                )));
            }
            PropertyTarget::ByOffset(offset) => self
                .mappings
                .iter()
                .find(|m| m.offset == offset)
                .map(|m| m.object)
                .ok_or_else(|| DirectInputError::not_found(format!("no object at offset {}", offset)))?,
            PropertyTarget::ById(bits) => self
                .catalog
                .find_by_id(bits)
                .ok_or_else(|| DirectInputError::not_found(format!("no object with id 0x{:08x}", bits)))?,
        };
        self.catalog
            .get_mut(index)
            .ok_or_else(|| DirectInputError::not_found(format!("object {}", index)))
    }
}

fn check_device_target(property: Property, target: PropertyTarget) -> Result<()> {
    match target {
        PropertyTarget::Device => Ok(()),
        _ => Err(DirectInputError::invalid(format!(
            "{:?} must address the whole device",
            property
        ))),
    }
}

fn from_scaled(raw: u32) -> Result<f64> {
    if raw > PROPERTY_SCALE {
        return Err(DirectInputError::invalid(format!(
            "{} exceeds {}",
            raw, PROPERTY_SCALE
        )));
    }
    Ok(f64::from(raw) / f64::from(PROPERTY_SCALE))
}

fn to_scaled(value: f64) -> u32 {
    (value * f64::from(PROPERTY_SCALE)).round() as u32
}
