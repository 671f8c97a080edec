//! Property tests for output name mangling

use bladegen_core::algebra::FloatPrecision;
use bladegen_core::lower::Backend;
use bladegen_core::Algebra;
use proptest::prelude::*;

fn algebra(convention: &str) -> Algebra {
    let source = format!(
        r#"
name: e3ga
basis: [e1, e2, e3]
convention: {}
floats:
  - type: double
  - type: float
    suffix: _f
shapes:
  - name: vector
    blades: [e1, e2, e3]
  - name: bivector
    blades: [e1^e2, e2^e3, e3^e1]
  - name: rotor
    blades: [scalar, e1^e2, e2^e3, e3^e1]
"#,
        convention
    );
    Algebra::from_yaml(&source).expect("description should load").0
}

const MULTIVECTOR_TYPES: [&str; 4] = ["vector", "bivector", "rotor", "mv"];

/// A precision index and an argument list. Scalar positions use the
/// precision's own name, as resolution keys do.
fn arb_signature() -> impl Strategy<Value = (usize, Vec<Option<usize>>)> {
    (0..2usize, prop::collection::vec(prop::option::of(0..MULTIVECTOR_TYPES.len()), 0..4))
}

fn argument_types(float: &FloatPrecision, args: &[Option<usize>]) -> Vec<String> {
    args.iter()
        .map(|a| match a {
            Some(i) => MULTIVECTOR_TYPES[*i].to_string(),
            None => float.name.clone(),
        })
        .collect()
}

proptest! {
    /// Without overloading, distinct precisions or argument lists never share a name.
    #[test]
    fn distinct_signatures_get_distinct_names(
        (f1, a1) in arb_signature(),
        (f2, a2) in arb_signature(),
    ) {
        prop_assume!(f1 != f2 || a1 != a2);
        let algebra = algebra("c");
        let backend = Backend::new(&algebra);
        let (p1, p2) = (&algebra.floats[f1], &algebra.floats[f2]);
        let n1 = backend.function_name("gp", p1, &argument_types(p1, &a1), None);
        let n2 = backend.function_name("gp", p2, &argument_types(p2, &a2), None);
        prop_assert_ne!(n1, n2);
    }

    /// A forced return type always changes the name.
    #[test]
    fn forced_return_is_visible(
        (f, a) in arb_signature(),
        ret in 0..MULTIVECTOR_TYPES.len(),
    ) {
        let algebra = algebra("c");
        let backend = Backend::new(&algebra);
        let float = &algebra.floats[f];
        let args = argument_types(float, &a);
        let plain = backend.function_name("gp", float, &args, None);
        let forced = backend.function_name("gp", float, &args, Some(MULTIVECTOR_TYPES[ret]));
        prop_assert_ne!(&plain, &forced);
        prop_assert!(forced.starts_with("gp_returns_"));
    }

    /// With overloading only the precision is encoded.
    #[test]
    fn overloaded_names_follow_precision(
        (f1, a1) in arb_signature(),
        (f2, a2) in arb_signature(),
    ) {
        let algebra = algebra("cpp");
        let backend = Backend::new(&algebra);
        let (p1, p2) = (&algebra.floats[f1], &algebra.floats[f2]);
        let n1 = backend.function_name("gp", p1, &argument_types(p1, &a1), None);
        let n2 = backend.function_name("gp", p2, &argument_types(p2, &a2), None);
        prop_assert_eq!(n1 == n2, f1 == f2);
    }
}
