//! Choosing between specialized and general implementations, and inferring
//! the type of a specialized result.

use crate::algebra::{Algebra, ValueType};
use crate::bail_domain;
use crate::error::Result;
use crate::request::{ArgumentBinding, OperationRequest};
use crate::symbolic::Multivector;

/// Relative tolerance when matching a constant coordinate of a shape.
const CONSTANT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every argument has a known sparse layout; the body is closed-form.
    Specialized,
    /// Some argument is of the general type; the body iterates over coordinates.
    General,
}

pub fn classify(args: &[ArgumentBinding]) -> Mode {
    if args.iter().any(ArgumentBinding::is_general) {
        Mode::General
    } else {
        Mode::Specialized
    }
}

/// False when general and specialized multivectors appear together.
pub fn not_mixed(types: &[ValueType]) -> bool {
    let general = types.iter().any(|t| *t == ValueType::General);
    let shaped = types.iter().any(|t| matches!(t, ValueType::Shape(_)));
    !(general && shaped)
}

fn constant_matches(expected: f64, actual: f64) -> bool {
    (expected - actual).abs() <= CONSTANT_TOLERANCE * expected.abs().max(1.0)
}

fn shape_holds(algebra: &Algebra, index: usize, value: &Multivector) -> bool {
    let shape = &algebra.shapes[index];
    let covers = value.support().iter().all(|b| shape.blade(*b).is_some());
    let constants = shape.constant_blades().all(|blade| {
        let expected = blade.constant.unwrap_or_default() * blade.sign;
        match value.coefficient(blade.bitmap).as_constant() {
            Some(actual) => constant_matches(expected, actual),
            None => false,
        }
    });
    covers && constants
}

/// The smallest declared type able to hold `value`.
///
/// Scalars and zero map to the scalar type. Among shapes whose blades cover
/// the support (with matching constant coordinates), the one with the fewest
/// coordinates wins; on a tie the first declared wins.
pub fn find_tightest_type(algebra: &Algebra, value: &Multivector) -> Option<ValueType> {
    if value.is_zero() || value.is_scalar() {
        return Some(ValueType::Scalar);
    }
    let mut best: Option<(usize, usize)> = None;
    for (i, shape) in algebra.shapes.iter().enumerate() {
        if shape.is_scalar_only() || !shape_holds(algebra, i, value) {
            continue;
        }
        let size = shape.coordinate_count();
        if best.map_or(true, |(_, s)| size < s) {
            best = Some((i, size));
        }
    }
    best.map(|(i, _)| ValueType::Shape(i))
}

/// The return type of a specialized request: the one the request names, or
/// the tightest type holding `value`.
pub fn return_type(algebra: &Algebra, request: &OperationRequest, value: &Multivector) -> Result<ValueType> {
    if request.has_return_type() {
        let ty = match algebra.value_type(&request.return_type) {
            Some(ty) => ty,
            None => bail_domain!("unknown return type '{}'", request.return_type),
        };
        if let ValueType::Shape(i) = ty {
            let shape = &algebra.shapes[i];
            if let Some(b) = value.support().into_iter().find(|b| shape.blade(*b).is_none()) {
                bail_domain!(
                    "the result has a {} coordinate that '{}' cannot hold",
                    algebra.blade_name(b),
                    shape.name
                );
            }
        }
        return Ok(ty);
    }
    match find_tightest_type(algebra, value) {
        Some(ty) => Ok(ty),
        None => {
            let blades: Vec<String> = value.support().into_iter().map(|b| algebra.blade_name(b)).collect();
            bail_domain!(
                "no declared type can hold the result; declare a shape with blades [{}]",
                blades.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::Scalar;

    const ALGEBRA: &str = r#"
name: e3ga
basis: [e1, e2, e3]
floats:
  - type: double
shapes:
  - name: vector
    blades: [e1, e2, e3]
  - name: vectorE1E2
    blades: [e1, e2]
  - name: planar
    blades: [e1, e2]
  - name: rotor
    blades: [scalar, e1^e2, e2^e3, e3^e1]
  - name: unitScalarVector
    blades: ["1=1", e1]
"#;

    fn algebra() -> Algebra {
        Algebra::from_yaml(ALGEBRA).unwrap().0
    }

    fn blade(bitmap: u32, name: &str) -> Multivector {
        Multivector::blade(bitmap, Scalar::var(name))
    }

    #[test]
    fn test_scalar_and_zero_map_to_scalar() {
        let a = algebra();
        assert_eq!(find_tightest_type(&a, &Multivector::zero()), Some(ValueType::Scalar));
        assert_eq!(
            find_tightest_type(&a, &Multivector::scalar(Scalar::var("x"))),
            Some(ValueType::Scalar)
        );
    }

    #[test]
    fn test_smallest_shape_first_on_tie() {
        let a = algebra();
        let v = blade(1, "x").add(&blade(2, "y"));
        assert_eq!(find_tightest_type(&a, &v), Some(ValueType::Shape(1)));
        let v3 = v.add(&blade(4, "z"));
        assert_eq!(find_tightest_type(&a, &v3), Some(ValueType::Shape(0)));
    }

    #[test]
    fn test_constant_coordinates_must_match() {
        let a = algebra();
        let one_plus_e1 = Multivector::constant(1.0).add(&blade(1, "x"));
        assert_eq!(find_tightest_type(&a, &one_plus_e1), Some(ValueType::Shape(4)));
        let two_plus_e1 = Multivector::constant(2.0).add(&blade(1, "x"));
        assert_eq!(find_tightest_type(&a, &two_plus_e1), None);
    }

    #[test]
    fn test_unmatched_result_is_a_domain_error() {
        let a = algebra();
        let request = OperationRequest::new("gp");
        let value = blade(7, "t").add(&blade(1, "x"));
        let err = return_type(&a, &request, &value).unwrap_err();
        assert!(err.to_string().contains("e1^e2^e3"));
    }

    #[test]
    fn test_mixed_types() {
        assert!(not_mixed(&[ValueType::Shape(0), ValueType::Scalar]));
        assert!(not_mixed(&[ValueType::General, ValueType::Scalar]));
        assert!(!not_mixed(&[ValueType::General, ValueType::Shape(1)]));
    }
}
