/// Computes the arithmetic mean of a slice of values. Returns `None` for empty
/// input or when the sum overflows.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64).filter(|m| m.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty_is_undefined() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_mean_values() {
        assert_eq!(mean(&[4.0, 5.0]), Some(4.5));
        assert_eq!(mean(&[3.0]), Some(3.0));
    }

    #[test]
    fn test_mean_overflow_is_undefined() {
        assert_eq!(mean(&[f64::MAX, f64::MAX]), None);
        assert_eq!(mean(&[f64::MAX, -f64::MAX]), Some(0.0));
    }
}
