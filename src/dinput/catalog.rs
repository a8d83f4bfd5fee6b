use super::{ObjectGuid, didft, didoi};
use crate::input::LogicalControl;
use crate::templates::DeviceKind;
use serde::{Deserialize, Serialize};

/// Default logical range reported for every axis
pub const DEFAULT_RANGE_MIN: i32 = 0;
pub const DEFAULT_RANGE_MAX: i32 = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectClass {
    AbsAxis,
    RelAxis,
    PushButton,
    ToggleButton,
    Pov,
    Collection,
}

impl ObjectClass {
    /// `DIDFT_*` bits an object of this class reports
    pub fn type_bits(self) -> u32 {
        match self {
            ObjectClass::AbsAxis => didft::ABSAXIS,
            ObjectClass::RelAxis => didft::RELAXIS,
            ObjectClass::PushButton => didft::PSHBUTTON,
            ObjectClass::ToggleButton => didft::TGLBUTTON,
            ObjectClass::Pov => didft::POV,
            ObjectClass::Collection => didft::COLLECTION | didft::NODATA,
        }
    }

    pub fn is_axis(self) -> bool {
        matches!(self, ObjectClass::AbsAxis | ObjectClass::RelAxis)
    }

    pub fn is_button(self) -> bool {
        matches!(self, ObjectClass::PushButton | ObjectClass::ToggleButton)
    }

    /// Bytes the object occupies in a rendered state buffer
    pub fn data_width(self) -> usize {
        match self {
            ObjectClass::AbsAxis | ObjectClass::RelAxis | ObjectClass::Pov => 4,
            ObjectClass::PushButton | ObjectClass::ToggleButton => 1,
            ObjectClass::Collection => 0,
        }
    }
}

/// One control the virtual device exposes, with its per-object properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatedDeviceObject {
    pub name: String,
    pub guid: ObjectGuid,
    pub class: ObjectClass,
    /// Instance number within the object's class
    pub instance: u16,
    /// `DIDOI_*` flags
    pub flags: u32,
    /// Offset in the unnegotiated native layout
    pub native_offset: u32,
    pub logical: Option<LogicalControl>,
    pub range_min: i32,
    pub range_max: i32,
    /// Fraction of the half-range, `[0, 1]`
    pub deadzone: f64,
    /// Fraction of the half-range, `[0, 1]`
    pub saturation: f64,
    #[serde(skip)]
    pub(crate) matched: bool,
}

impl EmulatedDeviceObject {
    pub fn new(
        name: impl Into<String>,
        guid: ObjectGuid,
        class: ObjectClass,
        instance: u16,
        native_offset: u32,
        logical: Option<LogicalControl>,
    ) -> Self {
        let flags = if class.is_axis() {
            didoi::ASPECTPOSITION
        } else {
            0
        };
        Self {
            name: name.into(),
            guid,
            class,
            instance,
            flags,
            native_offset,
            logical,
            range_min: DEFAULT_RANGE_MIN,
            range_max: DEFAULT_RANGE_MAX,
            deadzone: 0.0,
            saturation: 1.0,
            matched: false,
        }
    }

    pub fn type_bits(&self) -> u32 {
        self.class.type_bits()
    }

    /// Identifier as reported by `EnumObjects`: type bits plus instance
    pub fn object_id(&self) -> u32 {
        self.type_bits() | didft::make_instance(self.instance)
    }

    pub fn aspect(&self) -> u32 {
        self.flags & didoi::ASPECTMASK
    }

    pub fn is_matched(&self) -> bool {
        self.matched
    }

    /// Identifier bitfield match.
    ///
    /// The optional bit is ignored. The class bits must intersect the
    /// object's type, the instance must be the wildcard or equal, and no
    /// other bit may be set.
    pub fn matches_type(&self, bits: u32) -> bool {
        let bits = bits & !didft::OPTIONAL;
        if bits & didft::CLASSMASK & self.type_bits() == 0 {
            return false;
        }
        let instance = bits & didft::INSTANCEMASK;
        if instance != didft::ANYINSTANCE && didft::get_instance(bits) != self.instance {
            return false;
        }
        bits & !(didft::CLASSMASK | didft::INSTANCEMASK) == 0
    }

    /// A request naming an aspect only accepts objects of that aspect
    pub fn matches_aspect(&self, request_flags: u32) -> bool {
        let wanted = request_flags & didoi::ASPECTMASK;
        wanted == 0 || wanted == self.aspect()
    }

    /// `EnumObjects` filter. `DIDFT_ALL` selects everything, otherwise the
    /// filter's class bits must intersect the object's type.
    pub fn matches_filter(&self, filter: u32) -> bool {
        let class = filter & didft::CLASSMASK;
        class == didft::ALL || class & self.type_bits() != 0
    }
}

/// Per-kind object counts as reported by `GetCapabilities`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectCounts {
    pub axes: u32,
    pub buttons: u32,
    pub povs: u32,
}

/// Ordered objects of one virtual device. Each device owns its own catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceObjectCatalog {
    kind: DeviceKind,
    objects: Vec<EmulatedDeviceObject>,
}

impl DeviceObjectCatalog {
    pub fn build(kind: DeviceKind) -> Self {
        Self {
            kind,
            objects: kind.objects(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EmulatedDeviceObject> {
        self.objects.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut EmulatedDeviceObject> {
        self.objects.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmulatedDeviceObject> {
        self.objects.iter()
    }

    /// First object, in catalog order, matching an identifier bitfield
    pub fn find_by_id(&self, bits: u32) -> Option<usize> {
        self.objects.iter().position(|o| o.matches_type(bits))
    }

    pub fn enumerate(&self, filter: u32) -> impl Iterator<Item = &EmulatedDeviceObject> {
        self.objects.iter().filter(move |o| o.matches_filter(filter))
    }

    pub fn counts(&self) -> ObjectCounts {
        self.objects
            .iter()
            .fold(ObjectCounts::default(), |mut counts, object| {
                match object.class {
                    c if c.is_axis() => counts.axes += 1,
                    c if c.is_button() => counts.buttons += 1,
                    ObjectClass::Pov => counts.povs += 1,
                    _ => {}
                }
                counts
            })
    }

    pub(crate) fn matched_flags(&self) -> Vec<bool> {
        self.objects.iter().map(|o| o.matched).collect()
    }

    /// Replace every object's matched flag. `flags` must cover the catalog.
    pub(crate) fn commit_matches(&mut self, flags: &[bool]) {
        debug_assert_eq!(flags.len(), self.objects.len());
        for (object, matched) in self.objects.iter_mut().zip(flags) {
            object.matched = *matched;
        }
    }
}
