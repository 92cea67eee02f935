//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where 
    T: Float 
{
    target_range.0 
        + ((value - source_range.0) 
        * (target_range.1 - target_range.0) 
        / (source_range.1 - source_range.0))
}

/// Limit a value to the inclusive range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: PartialOrd
{
    if value > max {
        max
    }
    else if value < min {
        min
    }
    else {
        value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 100f64), (0f64, 4095f64), 0.0), 0.0);
        assert_eq!(lin_map((0f64, 100f64), (0f64, 4095f64), 100.0), 4095.0);
        assert_eq!(lin_map((-1f64, 1f64), (0f64, 10f64), 0.0), 5.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(105u8, 0, 100), 100);
        assert_eq!(clamp(-3i32, 0, 100), 0);
        assert_eq!(clamp(42.0f32, 0.0, 100.0), 42.0);
    }
}
