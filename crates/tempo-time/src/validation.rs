//! Pure validation of bounds and deltas.
//!
//! No side effects; callers decide what to do with a failure. The conductor
//! declines the change and keeps its prior state.

use crate::error::ValidationError;
use crate::values::{Bounds, Deltas};

/// Validate a time window before it is committed to the conductor.
///
/// Bounds are invalid if either value is not a finite number or if
/// `start > end`.
pub fn validate_bounds(bounds: &Bounds) -> Result<(), ValidationError> {
    for value in [bounds.start, bounds.end] {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteBound { value });
        }
    }
    if bounds.start > bounds.end {
        return Err(ValidationError::BackwardsBounds {
            start: bounds.start,
            end: bounds.end,
        });
    }
    Ok(())
}

/// Validate Follow-mode deltas.
///
/// Deltas are invalid if either value is not a finite, non-negative number.
pub fn validate_deltas(deltas: &Deltas) -> Result<(), ValidationError> {
    for value in [deltas.start, deltas.end] {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteDelta { value });
        }
        if value < 0.0 {
            return Err(ValidationError::NegativeDelta { value });
        }
    }
    Ok(())
}

/// Parse raw delta form fields as floats and validate the result.
///
/// The form layer hands over the text exactly as the user typed it; the
/// single lossy conversion lives here, at the commit boundary.
pub fn parse_deltas(start_raw: &str, end_raw: &str) -> Result<Deltas, ValidationError> {
    let deltas = Deltas {
        start: parse_delta_field(start_raw)?,
        end: parse_delta_field(end_raw)?,
    };
    validate_deltas(&deltas)?;
    Ok(deltas)
}

fn parse_delta_field(raw: &str) -> Result<f64, ValidationError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::UnparseableDelta {
            raw: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ordered_finite_bounds_are_valid() {
        assert_eq!(validate_bounds(&Bounds::new(0.0, 0.0)), Ok(()));
        assert_eq!(validate_bounds(&Bounds::new(-10.0, 10.0)), Ok(()));
    }

    #[test]
    fn backwards_bounds_are_rejected() {
        let err = validate_bounds(&Bounds::new(10.0, 5.0)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BackwardsBounds {
                start: 10.0,
                end: 5.0
            }
        );
    }

    #[test]
    fn non_finite_bounds_are_rejected() {
        assert!(validate_bounds(&Bounds::new(f64::NAN, 5.0)).is_err());
        assert!(validate_bounds(&Bounds::new(0.0, f64::INFINITY)).is_err());
        assert!(validate_bounds(&Bounds::new(f64::NEG_INFINITY, 0.0)).is_err());
    }

    #[test]
    fn negative_deltas_are_rejected() {
        let err = validate_deltas(&Deltas::new(-1.0, 0.0)).unwrap_err();
        assert_eq!(err, ValidationError::NegativeDelta { value: -1.0 });
    }

    #[test]
    fn parse_deltas_accepts_plain_numbers() {
        let deltas = parse_deltas("5", "10").unwrap();
        assert_eq!(deltas, Deltas::new(5.0, 10.0));
    }

    #[test]
    fn parse_deltas_trims_whitespace() {
        let deltas = parse_deltas(" 1.5 ", "0").unwrap();
        assert_eq!(deltas, Deltas::new(1.5, 0.0));
    }

    #[test]
    fn parse_deltas_rejects_garbage() {
        let err = parse_deltas("fast", "10").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnparseableDelta {
                raw: "fast".to_string()
            }
        );
    }

    #[test]
    fn parse_deltas_rejects_negative_input() {
        assert!(parse_deltas("-5", "10").is_err());
    }

    proptest! {
        #[test]
        fn ordered_bounds_always_validate(start in -1.0e15f64..1.0e15, span in 0.0f64..1.0e15) {
            let bounds = Bounds::new(start, start + span);
            prop_assert_eq!(validate_bounds(&bounds), Ok(()));
        }

        #[test]
        fn backwards_bounds_never_validate(start in -1.0e15f64..1.0e15, span in 1.0e-6f64..1.0e15) {
            let bounds = Bounds::new(start, start - span);
            prop_assert!(validate_bounds(&bounds).is_err());
        }

        #[test]
        fn non_negative_deltas_always_validate(start in 0.0f64..1.0e15, end in 0.0f64..1.0e15) {
            prop_assert_eq!(validate_deltas(&Deltas::new(start, end)), Ok(()));
        }
    }
}
