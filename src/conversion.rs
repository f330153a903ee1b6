//! Raw sample to engineering unit conversion.
//!
//! Inputs are single-ended and unipolar: raw 0 is 0 V and full scale
//! (0xFFF) is the reference voltage. Nothing negative is representable.
//!
//! Raw values above [`FULL_SCALE`] saturate at full scale. Every conversion,
//! rendering and [`SampleSet`](crate::SampleSet) applies [`saturate`], so an
//! out-of-range value never wraps to a small one.

/// Reference voltage of the converter, in volts.
pub const REFERENCE_VOLTAGE: f64 = 3.0;

/// Largest 12-bit sample.
pub const FULL_SCALE: u16 = 0x0FFF;

/// Clamp a raw value to the 12-bit range.
pub fn saturate(raw: u16) -> u16 {
    raw.min(FULL_SCALE)
}

/// Convert a raw 12-bit sample to volts against [`REFERENCE_VOLTAGE`].
pub fn to_voltage(raw: u16) -> f64 {
    to_voltage_with(raw, REFERENCE_VOLTAGE)
}

/// Convert a raw 12-bit sample to volts against an explicit reference.
pub fn to_voltage_with(raw: u16, reference: f64) -> f64 {
    f64::from(saturate(raw)) * (reference / f64::from(FULL_SCALE))
}

/// Render a raw sample as a 4-character voltage string `D.DD`.
///
/// Each digit is extracted by truncation from the remainder of the previous
/// step, so the result can sit one hundredth below the rounded value
/// (raw 1638 is exactly 1.2 V but renders as `"1.19"`).
pub fn format_voltage(raw: u16) -> String {
    let volts = (f64::from(saturate(raw)) * REFERENCE_VOLTAGE) / f64::from(FULL_SCALE);

    let units = volts as i8;
    let tenths_rem = 10.0 * (volts - f64::from(units));
    let tenths = tenths_rem as i8;
    let hundredths_rem = 10.0 * (tenths_rem - f64::from(tenths));
    let hundredths = hundredths_rem as i8;

    format!("{}.{}{}", units, tenths, hundredths)
}

/// Render a sample as three upper-case hex digits.
pub fn format_hex(raw: u16) -> String {
    format!("{:03X}", saturate(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voltage_endpoints() {
        assert_eq!(to_voltage(0), 0.0);
        assert!((to_voltage(FULL_SCALE) - REFERENCE_VOLTAGE).abs() < 1e-12);
        assert!((to_voltage(2048) - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_voltage_is_monotonic() {
        let mut previous = to_voltage(0);
        for raw in 1..=FULL_SCALE {
            let v = to_voltage(raw);
            assert!(v >= previous, "to_voltage({}) decreased", raw);
            assert!(v >= 0.0);
            previous = v;
        }
    }

    #[test]
    fn test_voltage_saturates_above_full_scale() {
        assert_eq!(to_voltage(0xFFFF), to_voltage(FULL_SCALE));
    }

    #[test]
    fn test_voltage_with_reference() {
        assert!((to_voltage_with(FULL_SCALE, 3.3) - 3.3).abs() < 1e-12);
        assert_eq!(to_voltage_with(0, 5.0), 0.0);
    }

    #[test]
    fn test_format_voltage() {
        assert_eq!(format_voltage(0), "0.00");
        assert_eq!(format_voltage(1), "0.00");
        assert_eq!(format_voltage(2048), "1.50");
        assert_eq!(format_voltage(4095), "3.00");
        assert_eq!(format_voltage(1365), "1.00");
        assert_eq!(format_voltage(3000), "2.19");
    }

    #[test]
    fn test_format_voltage_truncates_each_digit() {
        // rounding would give 3.00, 1.00, 0.50
        assert_eq!(format_voltage(4094), "2.99");
        assert_eq!(format_voltage(1364), "0.99");
        assert_eq!(format_voltage(682), "0.49");
        // exact tenths that lose a hundredth to stepwise truncation
        assert_eq!(format_voltage(1638), "1.19");
        assert_eq!(format_voltage(1911), "1.39");
        assert_eq!(format_voltage(3276), "2.39");
        assert_eq!(format_voltage(3822), "2.79");
        // exact tenths that survive
        assert_eq!(format_voltage(273), "0.20");
        assert_eq!(format_voltage(2457), "1.80");
    }

    #[test]
    fn test_format_voltage_width() {
        for raw in 0..=FULL_SCALE {
            assert_eq!(format_voltage(raw).len(), 4);
        }
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(0), "000");
        assert_eq!(format_hex(0xABC), "ABC");
        assert_eq!(format_hex(0x0FFF), "FFF");
    }

    #[test]
    fn test_out_of_range_saturates() {
        assert_eq!(saturate(0x1000), FULL_SCALE);
        assert_eq!(saturate(0x0123), 0x0123);
        assert_eq!(to_voltage(0x1000), REFERENCE_VOLTAGE);
        assert_eq!(format_voltage(0x1000), "3.00");
        assert_eq!(format_hex(0x1000), "FFF");
        assert_eq!(format_hex(0x1234), "FFF");
    }
}
