use super::catalog::{DeviceObjectCatalog, EmulatedDeviceObject, ObjectClass};
use super::format::NegotiatedFormat;
use crate::input::{DeviceInputs, LogicalControl};
use tracing::trace;

/// Value written for a pressed button
pub const BUTTON_PRESSED: u8 = 0x80;

/// Apply saturation then deadzone to a normalized axis value.
///
/// Distance from center is measured in half-ranges: anything at or past
/// `saturation` pins to the nearer edge, anything within `deadzone` snaps
/// to center.
pub fn shape_axis(value: f64, deadzone: f64, saturation: f64) -> f64 {
    let distance = (value - 0.5).abs() * 2.0;
    if distance >= saturation {
        if value > 0.5 { 1.0 } else { 0.0 }
    } else if distance <= deadzone {
        0.5
    } else {
        value
    }
}

/// Map a `[0, 1]` value onto an object's logical range. An inverted range
/// inverts the direction.
pub fn scale_to_range(value: f64, min: i32, max: i32) -> i32 {
    let min = f64::from(min);
    let max = f64::from(max);
    (min + value * (max - min)).round() as i32
}

fn axis_midpoint(object: &EmulatedDeviceObject) -> i32 {
    ((i64::from(object.range_min) + i64::from(object.range_max)) / 2) as i32
}

fn write_bytes(buffer: &mut [u8], offset: u32, bytes: &[u8]) {
    let start = offset as usize;
    let end = start + bytes.len();
    assert!(
        end <= buffer.len(),
        "state write at {}..{} overruns {} byte buffer",
        start,
        end,
        buffer.len()
    );
    buffer[start..end].copy_from_slice(bytes);
}

/// Render a snapshot into a caller buffer laid out by `format`.
///
/// The buffer is cleared first, fixups are written last. A write outside
/// the buffer means the negotiated format and the buffer disagree, which
/// callers rule out by checking the size beforehand.
pub fn render(catalog: &DeviceObjectCatalog, format: &NegotiatedFormat, inputs: &DeviceInputs, buffer: &mut [u8]) {
    buffer.fill(0);

    for mapping in &format.mappings {
        let Some(object) = catalog.get(mapping.object) else {
            panic!("mapping refers to missing object {}", mapping.object);
        };

        match (object.class, object.logical) {
            (ObjectClass::Collection, _) => {}
            (class, None) if class.is_axis() => {
                write_bytes(buffer, mapping.offset, &axis_midpoint(object).to_le_bytes());
            }
            (class, None) if class.is_button() => {
                write_bytes(buffer, mapping.offset, &[0]);
            }
            (_, None) => {}
            (_, Some(LogicalControl::Axis(axis))) => {
                let value = shape_axis(f64::from(inputs.axis(axis)), object.deadzone, object.saturation);
                let scaled = scale_to_range(value, object.range_min, object.range_max);
                write_bytes(buffer, mapping.offset, &scaled.to_le_bytes());
            }
            (_, Some(LogicalControl::Button(button))) => {
                let value = if inputs.button(button) { BUTTON_PRESSED } else { 0 };
                write_bytes(buffer, mapping.offset, &[value]);
            }
            (_, Some(LogicalControl::Hat(hat))) => {
                write_bytes(buffer, mapping.offset, &inputs.hat(hat).to_pov().to_le_bytes());
            }
        }
    }

    for fixup in &format.fixups {
        write_bytes(buffer, fixup.offset, &fixup.value.to_le_bytes());
    }

    trace!("Rendered {} mappings into {} bytes", format.mappings.len(), buffer.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dinput::format::{DataFormat, DefaultFixup, FormatMapping, ObjectDataFormat, negotiate};
    use crate::dinput::{didf, didft};
    use crate::input::{AxisType, ButtonType, Hat, HatType};
    use crate::templates::DeviceKind;

    fn read_i32(buffer: &[u8], offset: usize) -> i32 {
        i32::from_le_bytes(buffer[offset..offset + 4].try_into().unwrap())
    }

    fn read_u32(buffer: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buffer[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_left_stick_three_quarters() {
        let mut catalog = DeviceObjectCatalog::build(DeviceKind::Standard);
        let format = DataFormat {
            flags: didf::ABSAXIS,
            data_size: 16,
            objects: vec![ObjectDataFormat::new(None, 12, didft::AXIS | didft::make_instance(0), 0)],
        };
        let negotiated = negotiate(&mut catalog, &format).unwrap();
        assert_eq!(negotiated.mappings, vec![FormatMapping { object: 0, offset: 12 }]);

        let inputs = DeviceInputs::default().with_axis(AxisType::LeftStickX, 0.75);
        let mut buffer = vec![0xAA; 16];
        render(&catalog, &negotiated, &inputs, &mut buffer);
        assert_eq!(read_i32(&buffer, 12), 49151);
        assert!(buffer[..12].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_hat_and_missing_hat_fixup() {
        let mut catalog = DeviceObjectCatalog::build(DeviceKind::Standard);
        let pov = |offset| ObjectDataFormat::new(None, offset, didft::POV | didft::ANYINSTANCE | didft::OPTIONAL, 0);
        let format = DataFormat {
            flags: didf::ABSAXIS,
            data_size: 8,
            objects: vec![pov(0), pov(4)],
        };
        let negotiated = negotiate(&mut catalog, &format).unwrap();
        assert_eq!(
            negotiated.fixups,
            vec![DefaultFixup {
                offset: 4,
                value: 0xFFFF_FFFF
            }]
        );

        let inputs = DeviceInputs::default().with_hat(HatType::DPad, Hat::East);
        let mut buffer = vec![0; 8];
        render(&catalog, &negotiated, &inputs, &mut buffer);
        assert_eq!(read_u32(&buffer, 0), 9000);
        assert_eq!(read_u32(&buffer, 4), 0xFFFF_FFFF);

        render(&catalog, &negotiated, &DeviceInputs::default(), &mut buffer);
        assert_eq!(read_u32(&buffer, 0), 0xFFFF_FFFF);
    }

    #[test]
    fn test_buttons_render_high_bit() {
        let mut catalog = DeviceObjectCatalog::build(DeviceKind::Standard);
        let negotiated = negotiate(&mut catalog, &DataFormat::joystick()).unwrap();
        let inputs = DeviceInputs::default()
            .with_button(ButtonType::South, true)
            .with_button(ButtonType::Trackpad, true);
        let mut buffer = vec![0; 80];
        render(&catalog, &negotiated, &inputs, &mut buffer);

        // Square, Cross, Circle...
        assert_eq!(buffer[48], 0);
        assert_eq!(buffer[49], BUTTON_PRESSED);
        assert_eq!(buffer[61], BUTTON_PRESSED);
        assert_eq!(buffer[62], 0);
        // sticks centered, triggers released
        assert_eq!(read_i32(&buffer, 0), 32768);
        assert_eq!(read_i32(&buffer, 12), 0);
        assert_eq!(read_u32(&buffer, 36), 0xFFFF_FFFF);
    }

    #[test]
    fn test_shape_axis_laws() {
        for value in [0.0, 0.1, 0.3, 0.5, 0.62, 0.9, 1.0] {
            for saturation in [0.0, 0.25, 0.5, 1.0] {
                let shaped = shape_axis(value, 0.0, saturation);
                if (value - 0.5).abs() * 2.0 >= saturation {
                    assert!(shaped == 0.0 || shaped == 1.0, "{} {}", value, saturation);
                }
            }
            for deadzone in [0.0, 0.2, 0.5] {
                if (value - 0.5).abs() * 2.0 <= deadzone {
                    assert_eq!(shape_axis(value, deadzone, 1.0), 0.5);
                }
            }
        }
        assert_eq!(shape_axis(0.75, 0.0, 1.0), 0.75);
        assert_eq!(shape_axis(0.55, 0.2, 1.0), 0.5);
        assert_eq!(shape_axis(0.95, 0.0, 0.8), 1.0);
        assert_eq!(shape_axis(0.05, 0.0, 0.8), 0.0);
    }

    #[test]
    fn test_inverted_range() {
        assert_eq!(scale_to_range(0.0, 100, -100), 100);
        assert_eq!(scale_to_range(1.0, 100, -100), -100);
        assert_eq!(scale_to_range(0.5, -1000, 1000), 0);
    }

    #[test]
    fn test_unbacked_axis_renders_midpoint() {
        let mut catalog = DeviceObjectCatalog::build(DeviceKind::Standard);
        catalog.get_mut(0).unwrap().logical = None;
        catalog.get_mut(0).unwrap().range_min = -100;
        catalog.get_mut(0).unwrap().range_max = 300;
        let format = NegotiatedFormat {
            data_size: 8,
            mappings: vec![FormatMapping { object: 0, offset: 0 }, FormatMapping { object: 6, offset: 4 }],
            fixups: vec![],
        };
        let mut buffer = vec![0; 8];
        let inputs = DeviceInputs::default().with_button(ButtonType::West, true);
        render(&catalog, &format, &inputs, &mut buffer);
        assert_eq!(read_i32(&buffer, 0), 100);
        assert_eq!(buffer[4], BUTTON_PRESSED);
    }

    #[test]
    #[should_panic(expected = "overruns")]
    fn test_overrun_panics() {
        let catalog = DeviceObjectCatalog::build(DeviceKind::Standard);
        let format = NegotiatedFormat {
            data_size: 4,
            mappings: vec![FormatMapping { object: 0, offset: 2 }],
            fixups: vec![],
        };
        let mut buffer = vec![0; 4];
        render(&catalog, &format, &DeviceInputs::default(), &mut buffer);
    }
}
