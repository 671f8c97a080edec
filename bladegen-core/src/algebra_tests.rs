use crate::algebra::{Algebra, ValueType, SCALAR_TYPE};
use crate::error::GenError;
use crate::request::{OperationRequest, ResolutionKey};

const E3GA: &str = r#"
name: e3ga
basis: [e1, e2, e3]
metrics:
  - name: euclidean
  - name: minkowski
    diagonal: [1, 1, -1]
floats:
  - type: double
  - type: float
    suffix: _f
    tolerance: 0.001
shapes:
  - name: vector
    blades: [e1, e2, e3]
  - name: bivector
    blades: [e1^e2, e2^e3, e3^e1]
  - name: flatPoint
    blades: [e1, e2, e3=1]
functions:
  - name: gp
    args: [vector, vector]
  - name: dual
    args: [bivector]
    floats: [float]
    metric: minkowski
    output: dualOf
"#;

fn config_error(source: &str) -> String {
    match Algebra::from_yaml(source) {
        Err(e @ GenError::Config(_)) => e.to_string(),
        Err(e) => panic!("expected a configuration error, got {}", e),
        Ok(_) => panic!("expected a configuration error"),
    }
}

#[test]
fn test_description_loads() {
    let (algebra, requests) = Algebra::from_yaml(E3GA).unwrap();
    assert_eq!(algebra.dimension(), 3);
    assert_eq!(algebra.blade_count(), 8);
    assert_eq!(algebra.general, "mv");
    assert!(algebra.emit_tests);
    assert_eq!(algebra.default_metric_name(), "euclidean");
    assert_eq!(algebra.float("float").unwrap().tolerance, 0.001);
    assert_eq!(algebra.float("double").unwrap().tolerance, 1e-14);

    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].floats, vec!["double".to_string(), "float".to_string()]);
    assert_eq!(requests[0].metric, "euclidean");
    assert_eq!(requests[1].floats, vec!["float".to_string()]);
    assert_eq!(requests[1].metric, "minkowski");
    assert_eq!(requests[1].output_name, "dualOf");
}

#[test]
fn test_blade_orientation_is_kept() {
    let (algebra, _) = Algebra::from_yaml(E3GA).unwrap();
    assert_eq!(algebra.parse_blade("e1^e2").unwrap(), (0b011, 1.0));
    assert_eq!(algebra.parse_blade("e2^e1").unwrap(), (0b011, -1.0));
    assert_eq!(algebra.parse_blade("e3^e1").unwrap(), (0b101, -1.0));
    assert_eq!(algebra.parse_blade(SCALAR_TYPE).unwrap(), (0, 1.0));
    assert_eq!(algebra.blade_name(0b110), "e2^e3");

    let (_, bivector) = algebra.shape("bivector").unwrap();
    assert_eq!(bivector.blade(0b101).unwrap().sign, -1.0);
}

#[test]
fn test_constant_coordinates() {
    let (algebra, _) = Algebra::from_yaml(E3GA).unwrap();
    let (_, point) = algebra.shape("flatPoint").unwrap();
    assert_eq!(point.coordinate_count(), 2);
    assert_eq!(point.blade(0b100).unwrap().constant, Some(1.0));
}

#[test]
fn test_value_types() {
    let (algebra, _) = Algebra::from_yaml(E3GA).unwrap();
    assert_eq!(algebra.value_type("double"), Some(ValueType::Scalar));
    assert_eq!(algebra.value_type(SCALAR_TYPE), Some(ValueType::Scalar));
    assert_eq!(algebra.value_type("mv"), Some(ValueType::General));
    assert_eq!(algebra.value_type("bivector"), Some(ValueType::Shape(1)));
    assert_eq!(algebra.value_type("rotor"), None);
    let float = algebra.float("float").unwrap();
    assert_eq!(algebra.mangled_type_name(ValueType::Shape(0), float), "vector_f");
    assert_eq!(algebra.mangled_type_name(ValueType::Scalar, float), "float");
}

#[test]
fn test_metric_properties() {
    let (algebra, _) = Algebra::from_yaml(E3GA).unwrap();
    assert!(!algebra.metric("euclidean").unwrap().is_degenerate());
    assert!(!algebra.metric("minkowski").unwrap().is_degenerate());
    assert_eq!(algebra.metric("").unwrap().name, "euclidean");
    assert!(algebra.metric("conformal").is_none());
}

#[test]
fn test_invalid_descriptions() {
    let base = "name: t\nbasis: [e1, e2]\nfloats:\n  - type: double\n";
    assert!(config_error("name: t\nbasis: []\nfloats:\n  - type: double\n").contains("basis"));
    assert!(config_error("name: t\nbasis: [e1, e1]\nfloats:\n  - type: double\n").contains("twice"));
    assert!(config_error("name: t\nbasis: [e1]\nfloats: []\n").contains("float"));
    assert!(config_error(&format!("{}shapes:\n  - name: v\n    blades: [e1, e3]\n", base)).contains("e3"));
    assert!(config_error(&format!("{}shapes:\n  - name: v\n    blades: [e1^e1]\n", base)).contains("repeats"));
    assert!(config_error(&format!("{}shapes:\n  - name: double\n    blades: [e1]\n", base)).contains("clashes"));
    assert!(config_error(&format!("{}metrics:\n  - name: m\n    diagonal: [1]\n", base)).contains("diagonal"));
    assert!(config_error(&format!("{}  - type: float\n", base)).contains("suffix"));
    assert!(
        config_error(&format!("{}functions:\n  - name: gp\n    metric: other\n", base)).contains("undeclared metric")
    );
}

#[test]
fn test_resolution_keys_normalize_scalars_and_metric() {
    let (algebra, _) = Algebra::from_yaml(E3GA).unwrap();
    let double = algebra.float("double").unwrap();
    let args = vec!["mv".to_string(), SCALAR_TYPE.to_string()];
    let key = ResolutionKey::new(&algebra, "sas", &args, double, "", None);
    assert_eq!(key.arguments, vec!["mv".to_string(), "double".to_string()]);
    assert_eq!(key.metric, "euclidean");

    let explicit = vec!["mv".to_string(), "double".to_string()];
    assert_eq!(key, ResolutionKey::new(&algebra, "sas", &explicit, double, "euclidean", Some("")));
    assert_eq!(key.to_string(), "sas(mv, double) [double, euclidean]");

    let request = key.to_request();
    assert_eq!(request.floats, vec!["double".to_string()]);
    assert!(!request.has_return_type());
}

#[test]
fn test_requests_split_by_float() {
    let (algebra, _) = Algebra::from_yaml(E3GA).unwrap();
    let request = OperationRequest::new("gp").with_args(&["vector", "vector"]);
    let split = request.split_by_float(&algebra);
    assert_eq!(split.len(), 2);
    assert_eq!(split[1].floats, vec!["float".to_string()]);
    assert!(OperationRequest::new("_vector").is_converter());
    assert!(!OperationRequest::new("_").is_converter());
}
