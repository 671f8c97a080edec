use bladegen_core::lower::Convention;
use bladegen_core::{Bladegen, Feature, SessionOptions};

const DEMO: &str = include_str!("../../demos/e3ga.yaml");

fn generate_without_tests() -> bladegen_core::GenerationOutput {
    let bladegen = Bladegen::new(SessionOptions {
        threads: 4,
        emit_tests: Some(false),
    });
    bladegen.generate(DEMO).expect("demo description should generate")
}

#[test]
fn test_demo_generates_every_request() {
    let output = generate_without_tests();
    let text = &output.contents.definitions;
    for name in [
        "add_vector_vector",
        "gp_vector_vector",
        "gp_rotor_vector",
        "gp_vector_f_vector_f",
        "op_vector_bivector",
        "exp_bivector",
        "cosh_mv",
        "random_vector_double",
        "applyOM_om_mv",
        "_rotor_mv",
    ] {
        assert!(text.contains(&format!(" {}(", name)), "missing {}", name);
    }
    assert!(output.functions.iter().all(|f| f.complete));
    assert!(output.test_functions.is_empty());
    assert_eq!(output.algebra_name, "e3ga");
    assert_eq!(output.convention, Convention::C);
}

#[test]
fn test_demo_shapes_are_inferred() {
    let output = generate_without_tests();
    let declarations = &output.contents.declarations;
    assert!(declarations.contains("void gp_rotor_vector(oddVersor *_dst, const rotor *a, const vector *b);"));
    assert!(declarations.contains("void op_vector_bivector(trivector *_dst, const vector *a, const bivector *b);"));
    assert!(declarations.contains("void undual_bivector(vector *_dst, const bivector *a);"));
    assert!(declarations.contains("/** geometric product of two vectors */"));
}

#[test]
fn test_demo_features() {
    let output = generate_without_tests();
    assert!(output.contents.features.contains(&Feature::MathLibrary));
    assert!(output.contents.features.contains(&Feature::RandomGenerator));
}

#[test]
fn test_demo_check_counts_functions() {
    let bladegen = Bladegen::new(SessionOptions {
        threads: 2,
        emit_tests: Some(false),
    });
    let generated = generate_without_tests().functions.len();
    assert_eq!(bladegen.check(DEMO).unwrap(), generated);
    assert!(generated > 40);
}
