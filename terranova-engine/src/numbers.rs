//! Numeric conversion helpers centralizing safe numeric casts and rounding.

use num_traits::cast::cast;

/// Round half away from zero to the given number of decimal places.
///
/// Non-finite input is returned unchanged so callers can detect it.
#[must_use]
pub fn round_to_places(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let exponent = cast::<u32, i32>(places).unwrap_or(0);
    let factor = 10_f64.powi(exponent);
    (value * factor).round() / factor
}

/// Replace NaN and infinities with zero.
#[must_use]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert!((round_to_places(1.005_000_1, 2) - 1.01).abs() < 1e-12);
        assert!((round_to_places(-2.345, 1) - -2.3).abs() < 1e-12);
        assert!((round_to_places(0.25, 1) - 0.3).abs() < 1e-12);
        assert!((round_to_places(-0.25, 1) - -0.3).abs() < 1e-12);
    }

    #[test]
    fn rounding_passes_non_finite_through() {
        assert!(round_to_places(f64::NAN, 2).is_nan());
        assert!(round_to_places(f64::INFINITY, 2).is_infinite());
    }

    #[test]
    fn finite_guard_zeroes_nan_and_inf() {
        assert!(finite_or_zero(f64::NAN).abs() < f64::EPSILON);
        assert!(finite_or_zero(f64::NEG_INFINITY).abs() < f64::EPSILON);
        assert!((finite_or_zero(3.5) - 3.5).abs() < f64::EPSILON);
    }

    #[test]
    fn counts_convert() {
        assert!((usize_to_f64(10_000) - 10_000.0).abs() < f64::EPSILON);
    }
}
