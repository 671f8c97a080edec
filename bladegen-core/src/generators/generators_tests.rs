use crate::algebra::Algebra;
use crate::error::GenError;
use crate::session::{GenerationSession, SessionOptions};
use crate::sink::{Buffer, Feature};

const E3GA: &str = r#"
name: e3ga
basis: [e1, e2, e3]
metrics:
  - name: default
  - name: degenerate
    diagonal: [1, 1, 0]
floats:
  - type: double
shapes:
  - name: vector
    blades: [e1, e2, e3]
  - name: bivector
    blades: [e1^e2, e2^e3, e3^e1]
  - name: rotor
    blades: [scalar, e1^e2, e2^e3, e3^e1]
"#;

fn session() -> GenerationSession {
    let (algebra, _) = Algebra::from_yaml(E3GA).unwrap();
    let options = SessionOptions {
        threads: 1,
        emit_tests: Some(false),
    };
    GenerationSession::with_options(algebra, options)
}

fn definitions(session: &GenerationSession) -> String {
    session.sink().contents(Buffer::Definitions)
}

#[test]
fn test_vector_product_is_closed_form() {
    let s = session();
    let name = s.resolve("gp", &["vector", "vector"], None, "double", "default").unwrap();
    assert_eq!(name, "gp_vector_vector");
    let text = definitions(&s);
    assert!(text.contains("void gp_vector_vector(rotor *_dst, const vector *a, const vector *b)"));
    assert!(text.contains("_dst->c[0] = "));
    assert!(!text.contains("for ("));
}

#[test]
fn test_general_product_uses_a_table() {
    let s = session();
    s.resolve("gp", &["mv", "mv"], None, "double", "default").unwrap();
    let text = definitions(&s);
    assert!(text.contains("void gp_mv_mv(mv *_dst, const mv *a, const mv *b)"));
    assert!(text.contains("r.c[tk[t]] += ts[t] * a->c[ti[t]] * b->c[tj[t]];"));
    assert!(text.contains("*_dst = r;"));
}

#[test]
fn test_scalar_product_returns_a_float() {
    let s = session();
    s.resolve("sp", &["vector", "vector"], None, "double", "default").unwrap();
    assert!(definitions(&s).contains("double sp_vector_vector(const vector *a, const vector *b)"));
}

#[test]
fn test_dual_under_degenerate_metric_writes_nothing() {
    let s = session();
    let err = s.resolve("dual", &["vector"], None, "double", "degenerate").unwrap_err();
    assert!(matches!(err, GenError::Domain(..)));
    assert!(s.sink().is_empty());
}

#[test]
fn test_general_dependencies_are_shared() {
    let s = session();
    let igp = s.resolve("igp", &["mv", "mv"], None, "double", "default").unwrap();
    let apply = s.resolve("applyVersor", &["mv", "mv"], None, "double", "default").unwrap();
    assert_eq!(igp, "igp_mv_mv");
    assert_eq!(apply, "applyVersor_mv_mv");
    let text = definitions(&s);
    assert_eq!(text.matches("void versorInverse_mv(mv *_dst, const mv *a)").count(), 1);
    assert!(text.contains("versorInverse_mv(&bi, b);"));
    assert!(text.contains("versorInverse_mv(&vi, a);"));
}

#[test]
fn test_bivector_exponential_has_a_closed_form() {
    let s = session();
    s.resolve("exp", &["bivector"], None, "double", "default").unwrap();
    let text = definitions(&s);
    assert!(text.contains("void exp_bivector(rotor *_dst, const bivector *a)"));
    assert!(text.contains("cos(_alpha)"));
    assert!(text.contains("sin(_alpha)"));
    assert!(s.sink().requires(Feature::MathLibrary));
}

#[test]
fn test_general_exponential_sums_a_series() {
    let s = session();
    s.resolve("exp", &["mv"], None, "double", "default").unwrap();
    let text = definitions(&s);
    assert!(text.contains("for (k = 2; k <= 32; k++)"));
    assert!(text.contains("_mv_mv(&term, a);"));
    assert!(text.contains("void sas_mv_double_double("));
}

#[test]
fn test_rotor_exponential_falls_back_to_a_series() {
    let s = session();
    let name = s.resolve("exp", &["rotor"], None, "double", "default").unwrap();
    assert_eq!(name, "exp_rotor");
    let text = definitions(&s);
    assert!(text.contains("void exp_rotor(rotor *_dst, const rotor *a)"));
    assert!(text.contains("for (k = 2; k <= 32; k++)"));
    assert!(text.contains("gp_returns_rotor_rotor_rotor(&tmp, &term, a);"));
    assert!(text.contains("void gp_returns_rotor_rotor_rotor(rotor *_dst, const rotor *a, const rotor *b)"));
    assert!(text.contains("void sas_returns_rotor_rotor_double_double("));
    assert!(text.contains("void add_returns_rotor_rotor_rotor("));
    assert!(!text.contains("void gp_mv_mv("));
}

#[test]
fn test_rotor_logarithm_branches_on_the_bivector_norm() {
    let s = session();
    let name = s.resolve("log", &["rotor"], None, "double", "default").unwrap();
    assert_eq!(name, "log_rotor");
    let text = definitions(&s);
    assert!(text.contains("void log_rotor(bivector *_dst, const rotor *a)"));
    assert!(text.contains("if (_n2 > 0.0) {"));
    assert!(text.contains("double _m = atan2(_n, _s) / _n;"));
    assert!(text.contains("if (_s < 0.0) {"));
    assert!(text.contains("3.141592653589793"));
    assert!(s.sink().requires(Feature::MathLibrary));
}

#[test]
fn test_general_logarithm_uses_helpers() {
    let s = session();
    s.resolve("log", &["mv"], None, "double", "default").unwrap();
    let text = definitions(&s);
    assert!(text.contains("void log_mv(mv *_dst, const mv *a)"));
    assert!(text.contains("extractGrade2_mv(&B, a);"));
    assert!(text.contains("double n2 = norm2_mv(&B);"));
    assert!(text.contains("sas_mv_double_double(&r, &B, m, 0.0);"));
    assert!(text.contains("void sas_mv_double_double("));
}

#[test]
fn test_logarithm_needs_a_bivector_part() {
    let s = session();
    let err = s.resolve("log", &["vector"], None, "double", "default").unwrap_err();
    assert!(matches!(err, GenError::Domain(..)));
    let resolver = s.resolver();
    let request = crate::request::OperationRequest::new("log")
        .with_args(&["rotor"])
        .with_floats(&["double"])
        .with_metric("default")
        .with_option("type", "conformal");
    assert!(matches!(resolver.generate_top_level(&request), Err(GenError::Dispatch(_))));
}

#[test]
fn test_square_option_must_be_a_sign() {
    let s = session();
    let resolver = s.resolver();
    let request = crate::request::OperationRequest::new("exp")
        .with_args(&["bivector"])
        .with_floats(&["double"])
        .with_metric("default")
        .with_option("square", "sideways");
    let err = resolver.generate_top_level(&request).unwrap_err();
    assert!(err.to_string().contains("square"));
}

#[test]
fn test_norm_and_unit() {
    let s = session();
    s.resolve("norm", &["vector"], None, "double", "default").unwrap();
    s.resolve("unit", &["vector"], None, "double", "default").unwrap();
    let text = definitions(&s);
    assert!(text.contains("double norm_vector(const vector *a)"));
    assert!(text.contains("return sqrt("));
    assert!(text.contains("double _n = "));
}

#[test]
fn test_random_value_needs_the_runtime_source() {
    let s = session();
    let name = s.resolve("random_vector", &["double"], None, "double", "default").unwrap();
    assert_eq!(name, "random_vector_double");
    let text = definitions(&s);
    assert!(text.contains("double random_double(void)"));
    assert!(text.contains("return bladegen_random();"));
    assert!(text.contains("random_double() - 1.0)"));
    assert!(s.sink().requires(Feature::RandomGenerator));
}

#[test]
fn test_predicates() {
    let s = session();
    s.resolve("equals", &["vector", "vector", "double"], None, "double", "default").unwrap();
    s.resolve("gradeBitmap", &["mv", "double"], None, "double", "default").unwrap();
    let text = definitions(&s);
    assert!(text.contains("int equals_vector_vector_double(const vector *a, const vector *b, double eps)"));
    assert!(text.contains("return 0;"));
    assert!(text.contains("static const int grades[] = {0, 1, 1, 2, 1, 2, 2, 3};"));
}

#[test]
fn test_converter_drops_coordinates() {
    let s = session();
    let name = s.resolve("_vector", &["mv"], None, "double", "default").unwrap();
    assert_eq!(name, "_vector_mv");
    let text = definitions(&s);
    assert!(text.contains("_dst->c[0] = a->c[1];"));
    assert!(text.contains("_dst->c[2] = a->c[4];"));
}

#[test]
fn test_outermorphism_must_be_declared() {
    let s = session();
    let err = s.resolve("applyOM", &[], None, "double", "default").unwrap_err();
    assert!(err.to_string().contains("outermorphism"));
}

#[test]
fn test_unknown_operation_is_a_dispatch_error() {
    let s = session();
    let err = s.resolve("frobnicate", &["mv"], None, "double", "default").unwrap_err();
    assert!(matches!(err, GenError::Dispatch(_)));
}

#[test]
fn test_tests_compare_against_general_implementation() {
    let (algebra, _) = Algebra::from_yaml(E3GA).unwrap();
    let options = SessionOptions {
        threads: 1,
        emit_tests: Some(true),
    };
    let s = GenerationSession::with_options(algebra, options);
    s.resolve("add", &["vector", "vector"], None, "double", "default").unwrap();
    let tests = s.test_functions();
    assert!(tests.contains(&"test_add_vector_vector".to_string()));
    assert!(tests.contains(&"test_add_mv_mv".to_string()));
    let text = definitions(&s);
    assert!(text.contains("int test_add_vector_vector(void)"));
    assert!(text.contains("add_mv_mv(&reference, &garg0, &garg1);"));
    assert!(text.contains("subtract_mv_mv(&s, &r, &b);"));
}

const C3GA: &str = r#"
name: c3ga
basis: [no, e1, e2, e3, ni]
metrics:
  - name: conformal
    diagonal: [0, 1, 1, 1, 0]
    entries:
      - {a: no, b: ni, value: -1}
    round: true
floats:
  - type: double
shapes:
  - name: vectorE3
    blades: [e1, e2, e3]
  - name: normalizedPoint
    blades: [no=1, e1, e2, e3, ni]
"#;

fn conformal_session() -> GenerationSession {
    let (algebra, _) = Algebra::from_yaml(C3GA).unwrap();
    let options = SessionOptions {
        threads: 1,
        emit_tests: Some(false),
    };
    GenerationSession::with_options(algebra, options)
}

#[test]
fn test_conformal_points_from_vectors_and_coordinates() {
    let s = conformal_session();
    let from_vector = s.resolve("cgaPoint", &["vectorE3"], None, "double", "conformal").unwrap();
    assert_eq!(from_vector, "cgaPoint_vectorE3");
    let from_coordinates = s
        .resolve("cgaPoint", &["double", "double", "double"], None, "double", "conformal")
        .unwrap();
    assert_eq!(from_coordinates, "cgaPoint_double_double_double");
    let text = definitions(&s);
    assert!(text.contains("void cgaPoint_vectorE3(normalizedPoint *_dst, const vectorE3 *a)"));
    assert!(text.contains("void cgaPoint_double_double_double(normalizedPoint *_dst, double a, double b, double c)"));
    assert!(text.contains("_dst->c[0] = a;"));
}

#[test]
fn test_random_conformal_point_draws_coordinates() {
    let s = conformal_session();
    s.resolve("randomCgaPoint", &[], None, "double", "conformal").unwrap();
    let text = definitions(&s);
    assert!(text.contains("void randomCgaPoint(normalizedPoint *_dst)"));
    assert!(text.contains("double random_double("));
    assert!(text.contains("2.0 * random_double() - 1.0"));
    assert!(s.sink().requires(Feature::RandomGenerator));
}

#[test]
fn test_conformal_point_distance_is_a_scalar() {
    let s = conformal_session();
    s.resolve("cgaPointDistance2", &["normalizedPoint", "normalizedPoint"], None, "double", "conformal")
        .unwrap();
    s.resolve("cgaPointDistance", &["normalizedPoint", "normalizedPoint"], None, "double", "conformal")
        .unwrap();
    let text = definitions(&s);
    assert!(text.contains(
        "double cgaPointDistance2_normalizedPoint_normalizedPoint(const normalizedPoint *a, const normalizedPoint *b)"
    ));
    assert!(text.contains("return sqrt(fabs("));
    assert!(s.sink().requires(Feature::MathLibrary));
}

#[test]
fn test_conformal_point_needs_origin_and_infinity() {
    let s = session();
    let err = s.resolve("cgaPoint", &["vector"], None, "double", "default").unwrap_err();
    assert!(matches!(err, GenError::Domain(..)));
}
