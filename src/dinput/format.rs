use super::catalog::{DeviceObjectCatalog, ObjectClass};
use super::{ObjectGuid, didf, didft, didoi};
use crate::error::{DirectInputError, Result};
use crate::input::POV_CENTERED;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// One requested entry of a caller's data format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDataFormat {
    /// Exact object type to accept, any type when `None`
    pub guid: Option<ObjectGuid>,
    /// Destination offset in the caller's buffer
    pub offset: u32,
    /// `DIDFT_*` identifier bitfield
    pub type_bits: u32,
    /// `DIDOI_*` flags, only the aspect is considered
    pub flags: u32,
}

impl ObjectDataFormat {
    pub fn new(guid: Option<ObjectGuid>, offset: u32, type_bits: u32, flags: u32) -> Self {
        Self {
            guid,
            offset,
            type_bits,
            flags,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.type_bits & didft::OPTIONAL != 0
    }

    /// Requests for a hat get a centered default when nothing can back them
    pub fn is_hat(&self) -> bool {
        match self.guid {
            Some(guid) => guid == ObjectGuid::Pov,
            None => self.type_bits & didft::CLASSMASK == didft::POV,
        }
    }

    /// Bytes the request may write at its offset. Hat requests always
    /// reserve a full POV value, since an unbacked one gets a fixup.
    fn data_width(&self) -> u32 {
        let class = self.type_bits & didft::CLASSMASK;
        if !self.is_hat() && class != 0 && class & !didft::BUTTON == 0 {
            1
        } else {
            4
        }
    }
}

/// Caller-chosen state layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFormat {
    /// `DIDF_*` flags
    pub flags: u32,
    /// Size of the caller's state buffer
    pub data_size: u32,
    pub objects: Vec<ObjectDataFormat>,
}

impl DataFormat {
    /// The stock `DIJOYSTATE` layout: six axes, two sliders, four POVs and
    /// 32 buttons, all optional.
    pub fn joystick() -> Self {
        let axis = |guid, offset| {
            ObjectDataFormat::new(
                Some(guid),
                offset,
                didft::AXIS | didft::ANYINSTANCE | didft::OPTIONAL,
                didoi::ASPECTPOSITION,
            )
        };
        let mut objects = vec![
            axis(ObjectGuid::XAxis, 0),
            axis(ObjectGuid::YAxis, 4),
            axis(ObjectGuid::ZAxis, 8),
            axis(ObjectGuid::RxAxis, 12),
            axis(ObjectGuid::RyAxis, 16),
            axis(ObjectGuid::RzAxis, 20),
            axis(ObjectGuid::Slider, 24),
            axis(ObjectGuid::Slider, 28),
        ];
        objects.extend((0..4).map(|i| {
            ObjectDataFormat::new(
                Some(ObjectGuid::Pov),
                32 + 4 * i,
                didft::POV | didft::ANYINSTANCE | didft::OPTIONAL,
                0,
            )
        }));
        objects.extend((0..32).map(|i| {
            ObjectDataFormat::new(
                None,
                48 + i,
                didft::BUTTON | didft::ANYINSTANCE | didft::OPTIONAL,
                0,
            )
        }));
        Self {
            flags: didf::ABSAXIS,
            data_size: 80,
            objects,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.objects.is_empty() {
            return Err(DirectInputError::invalid("data format has no objects"));
        }
        if self.data_size % 4 != 0 {
            return Err(DirectInputError::invalid(format!(
                "data size {} is not a multiple of 4",
                self.data_size
            )));
        }
        for object in &self.objects {
            if object.is_hat() && object.offset % 4 != 0 {
                return Err(DirectInputError::invalid(format!(
                    "POV at offset {} is not 4-byte aligned",
                    object.offset
                )));
            }
            let end = u64::from(object.offset) + u64::from(object.data_width());
            if end > u64::from(self.data_size) {
                return Err(DirectInputError::invalid(format!(
                    "object at offset {} overruns data size {}",
                    object.offset, self.data_size
                )));
            }
        }
        Ok(())
    }
}

/// Catalog object routed to a destination offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatMapping {
    /// Index into the device's catalog
    pub object: usize,
    pub offset: u32,
}

/// Constant written at an offset nothing else backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultFixup {
    pub offset: u32,
    pub value: u32,
}

/// Result of a successful negotiation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NegotiatedFormat {
    pub data_size: u32,
    pub mappings: Vec<FormatMapping>,
    pub fixups: Vec<DefaultFixup>,
}

impl NegotiatedFormat {
    pub fn mapping_at(&self, offset: u32) -> Option<&FormatMapping> {
        self.mappings.iter().find(|m| m.offset == offset)
    }
}

/// Match a caller's requested layout against the catalog.
///
/// Each request claims the first unmatched object, in catalog order, that
/// passes the identifier, aspect and type checks. Matching always starts
/// over from a clean slate. On failure the catalog is left untouched, so
/// whatever format was in effect before stays valid.
pub fn negotiate(catalog: &mut DeviceObjectCatalog, format: &DataFormat) -> Result<NegotiatedFormat> {
    format.validate()?;

    let mut matched = vec![false; catalog.len()];
    let mut negotiated = NegotiatedFormat {
        data_size: format.data_size,
        ..Default::default()
    };

    for request in &format.objects {
        let found = catalog.iter().enumerate().position(|(index, object)| {
            !matched[index]
                && object.matches_type(request.type_bits)
                && object.matches_aspect(request.flags)
                && request.guid.is_none_or(|guid| guid == object.guid)
        });

        match found {
            Some(index) => {
                let class = catalog.get(index).map(|object| object.class);
                if class.is_some_and(|c| c.is_axis() || c == ObjectClass::Pov) && request.offset % 4 != 0 {
                    return Err(DirectInputError::invalid(format!(
                        "{:?} object at offset {} is not 4-byte aligned",
                        request.guid, request.offset
                    )));
                }
                matched[index] = true;
                negotiated.mappings.push(FormatMapping {
                    object: index,
                    offset: request.offset,
                });
                trace!(
                    "Matched request 0x{:08x} at offset {} to object {}",
                    request.type_bits, request.offset, index
                );
            }
            None if request.is_optional() => {
                if request.is_hat() {
                    negotiated.fixups.push(DefaultFixup {
                        offset: request.offset,
                        value: POV_CENTERED,
                    });
                }
                trace!(
                    "No object for optional request 0x{:08x} at offset {}",
                    request.type_bits, request.offset
                );
            }
            None => {
                debug!(
                    "No object for required request 0x{:08x} ({:?}) at offset {}",
                    request.type_bits, request.guid, request.offset
                );
                return Err(DirectInputError::not_found(format!(
                    "required object 0x{:08x} at offset {}",
                    request.type_bits, request.offset
                )));
            }
        }
    }

    catalog.commit_matches(&matched);
    debug!(
        "Negotiated {} mappings and {} fixups over {} bytes",
        negotiated.mappings.len(),
        negotiated.fixups.len(),
        negotiated.data_size
    );
    Ok(negotiated)
}
