use crate::algebra::Algebra;
use crate::catalog::Catalog;
use crate::error::{GenError, Result};
use crate::generators::{general_defaults, general_value, plan_fixed, require, OperationGenerator, Plan};
use crate::request::OperationRequest;
use crate::session::{GenerationSession, Resolver, SessionOptions};
use crate::sink::Buffer;
use crate::Bladegen;

const HEADER: &str = r#"
name: e3ga
basis: [e1, e2, e3]
metrics:
  - name: euclidean
  - name: degenerate
    diagonal: [1, 1, 0]
floats:
  - type: double
shapes:
  - name: vector
    blades: [e1, e2, e3]
  - name: bivector
    blades: [e1^e2, e2^e3, e3^e1]
  - name: trivector
    blades: [e1^e2^e3]
  - name: rotor
    blades: [scalar, e1^e2, e2^e3, e3^e1]
"#;

fn description(functions: &str) -> String {
    format!("{}tests: false\nfunctions:\n{}", HEADER, functions)
}

fn bladegen(threads: usize) -> Bladegen {
    Bladegen::new(SessionOptions {
        threads,
        emit_tests: None,
    })
}

#[test]
fn test_general_product_is_a_loop() {
    let source = description("  - name: gp\n    args: [mv, mv]\n");
    let output = bladegen(1).generate(&source).unwrap();
    let text = &output.contents.definitions;
    assert!(text.contains("void gp_mv_mv(mv *_dst, const mv *a, const mv *b)"));
    assert!(text.contains("for ("));
    assert!(output.contents.declarations.contains("void gp_mv_mv(mv *_dst, const mv *a, const mv *b);"));
}

#[test]
fn test_vector_product_lands_in_the_rotor() {
    let source = description("  - name: gp\n    args: [vector, vector]\n");
    let output = bladegen(1).generate(&source).unwrap();
    let text = &output.contents.definitions;
    assert!(text.contains("void gp_vector_vector(rotor *_dst, const vector *a, const vector *b)"));
    assert!(!text.contains("for ("));
    assert_eq!(output.functions.len(), 1);
    assert_eq!(output.functions[0].output_name.as_deref(), Some("gp_vector_vector"));
}

#[test]
fn test_vector_product_without_a_fitting_shape() {
    let source = r#"
name: e3ga
basis: [e1, e2, e3]
floats:
  - type: double
shapes:
  - name: vector
    blades: [e1, e2, e3]
functions:
  - name: gp
    args: [vector, vector]
"#;
    let err = bladegen(1).generate(source).unwrap_err();
    assert!(matches!(err, GenError::Domain(..)));
    assert!(err.to_string().contains("no declared type"));
    assert!(err.request().is_some());
}

#[test]
fn test_degenerate_dual_aborts_before_writing() {
    let source = description("  - name: dual\n    args: [vector]\n    metric: degenerate\n");
    let (algebra, requests) = Algebra::from_yaml(&source).unwrap();
    let session = GenerationSession::with_options(
        algebra,
        SessionOptions {
            threads: 2,
            emit_tests: None,
        },
    );
    let err = session.run(&requests).unwrap_err();
    assert!(matches!(err, GenError::Domain(..)));
    assert!(session.sink().is_empty());
    assert!(bladegen(1).generate(&source).is_err());
}

#[test]
fn test_shared_dependency_is_written_once() {
    let source = description(
        "  - name: igp\n    args: [mv, mv]\n  - name: applyVersor\n    args: [mv, mv]\n  - name: unit\n    args: [mv]\n",
    );
    let output = bladegen(4).generate(&source).unwrap();
    let text = &output.contents.definitions;
    assert_eq!(text.matches("void versorInverse_mv(mv *_dst, const mv *a)").count(), 1);
    assert_eq!(text.matches("void gp_mv_mv(mv *_dst, const mv *a, const mv *b)").count(), 1);
    assert!(text.contains("versorInverse_mv(&bi, b);"));
    assert!(text.contains("versorInverse_mv(&vi, a);"));
    assert!(output.functions.iter().all(|f| f.complete));
}

#[test]
fn test_shared_subtract_across_tests() {
    let (algebra, _) = Algebra::from_yaml(HEADER).unwrap();
    let session = GenerationSession::with_options(
        algebra,
        SessionOptions {
            threads: 4,
            emit_tests: Some(true),
        },
    );
    let requests = vec![
        crate::request::OperationRequest::new("add")
            .with_args(&["vector", "vector"])
            .with_floats(&["double"])
            .with_metric("euclidean"),
        crate::request::OperationRequest::new("add")
            .with_args(&["bivector", "bivector"])
            .with_floats(&["double"])
            .with_metric("euclidean"),
    ];
    session.run(&requests).unwrap();
    let text = session.sink().contents(Buffer::Definitions);
    assert_eq!(text.matches("void subtract_mv_mv(mv *_dst, const mv *a, const mv *b)").count(), 1);
    assert_eq!(text.matches("int test_add_mv_mv(void)").count(), 1);
    assert!(text.contains("subtract_mv_mv(&s, &r, &b);"));
}

#[test]
fn test_resolving_twice_changes_nothing() {
    let (algebra, _) = Algebra::from_yaml(HEADER).unwrap();
    let session = GenerationSession::with_options(
        algebra,
        SessionOptions {
            threads: 1,
            emit_tests: Some(false),
        },
    );
    let first = session.resolve("op", &["vector", "bivector"], None, "double", "euclidean").unwrap();
    let before = session.sink().contents(Buffer::Definitions);
    let second = session.resolve("op", &["vector", "bivector"], None, "double", "euclidean").unwrap();
    assert_eq!(first, second);
    assert_eq!(before, session.sink().contents(Buffer::Definitions));
    assert_eq!(session.registry().len(), 1);
}

#[test]
fn test_concurrent_requests_share_one_definition() {
    let (algebra, _) = Algebra::from_yaml(HEADER).unwrap();
    let session = GenerationSession::with_options(
        algebra,
        SessionOptions {
            threads: 8,
            emit_tests: Some(false),
        },
    );
    let names: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| session.resolve("lc", &["mv", "mv"], None, "double", "euclidean").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(names.iter().all(|n| n == "lc_mv_mv"));
    let text = session.sink().contents(Buffer::Definitions);
    assert_eq!(text.matches("void lc_mv_mv(").count(), 1);
}

#[test]
fn test_output_name_and_check() {
    let source = description("  - name: gp\n    args: [vector, vector]\n    output: mul\n  - name: norm\n    args: [vector]\n");
    let output = bladegen(2).generate(&source).unwrap();
    assert!(output.contents.definitions.contains("void mul_vector_vector(rotor *_dst"));
    assert!(output.test_functions.is_empty());
    assert_eq!(bladegen(2).check(&source).unwrap(), 2);
}

#[test]
fn test_unknown_metric_is_reported() {
    let source = description("  - name: gp\n    args: [vector, vector]\n    metric: conformal\n");
    let err = bladegen(1).generate(&source).unwrap_err();
    assert!(err.to_string().contains("conformal"));
}

#[test]
fn test_metric_is_part_of_the_output_name() {
    let source = description(
        "  - name: gp\n    args: [mv, mv]\n  - name: gp\n    args: [mv, mv]\n    metric: degenerate\n  - name: exp\n    args: [mv]\n    metric: degenerate\n",
    );
    let output = bladegen(4).generate(&source).unwrap();
    let text = &output.contents.definitions;
    assert_eq!(text.matches("void gp_mv_mv(").count(), 1);
    assert_eq!(text.matches("void gp_degenerate_mv_mv(").count(), 1);
    assert!(text.contains("void exp_degenerate_mv(mv *_dst, const mv *a)"));
    assert!(text.contains("gp_degenerate_mv_mv(&tmp, &term, a);"));

    let mut names: Vec<String> = output.functions.iter().filter_map(|f| f.output_name.clone()).collect();
    let count = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), count);
}

#[test]
fn test_overloaded_tests_get_distinct_names() {
    let source = format!(
        "{}convention: cpp\ntests: true\nfunctions:\n  - name: add\n    args: [vector, vector]\n  - name: add\n    args: [bivector, bivector]\n",
        HEADER
    );
    let output = bladegen(2).generate(&source).unwrap();
    let tests = &output.test_functions;
    assert!(tests.contains(&"test_add_vector_vector".to_string()));
    assert!(tests.contains(&"test_add_bivector_bivector".to_string()));
    let mut unique = tests.clone();
    unique.dedup();
    assert_eq!(&unique, tests);
    let text = &output.contents.definitions;
    assert_eq!(text.matches("bool test_add_vector_vector()").count(), 1);
}

#[test]
fn test_custom_passing_gets_its_own_function() {
    let source = description(
        "  - name: gp\n    args: [mv, mv]\n    by_ref: [false, false]\n  - name: igp\n    args: [mv, mv]\n",
    );
    let output = bladegen(1).generate(&source).unwrap();
    let text = &output.contents.definitions;
    assert!(text.contains("void gp_pass_vv_mv_mv(mv *_dst, mv a, mv b)"));
    assert_eq!(text.matches("void gp_mv_mv(mv *_dst, const mv *a, const mv *b)").count(), 1);
    assert!(text.contains("gp_mv_mv(&r, a, &bi);"));
}

#[test]
fn test_helpers_use_the_declared_output_name() {
    let source = description("  - name: igp\n    args: [mv, mv]\n  - name: gp\n    args: [mv, mv]\n    output: mygp\n");
    for threads in [1, 4] {
        let output = bladegen(threads).generate(&source).unwrap();
        let text = &output.contents.definitions;
        assert_eq!(text.matches("void mygp_mv_mv(").count(), 1);
        assert!(!text.contains("void gp_mv_mv("));
        assert!(text.contains("mygp_mv_mv(&r, a, &bi);"));
    }
}

/// Claims `ping` and `pong`; each one needs the other.
struct PingPong;

impl OperationGenerator for PingPong {
    fn name(&self) -> &'static str {
        "ping-pong"
    }

    fn can_implement(&self, _: &Algebra, request: &OperationRequest) -> bool {
        request.name == "ping" || request.name == "pong"
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let defaults = general_defaults(cx.algebra(), 1);
        plan_fixed(cx, request, &defaults, |float, _| general_value(float))
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        let other = if request.name == "ping" { "pong" } else { "ping" };
        let general = cx.algebra().general.clone();
        for fp in plan.floats.iter_mut() {
            require(cx, fp, "other", other, &[&general], None, &request.metric)?;
        }
        Ok(())
    }

    fn write_function(&self, _: &Resolver<'_>, _: &OperationRequest, _: &Plan) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_dependency_cycle_is_reported_with_its_keys() {
    let (algebra, _) = Algebra::from_yaml(HEADER).unwrap();
    let session = GenerationSession::new(algebra).with_catalog(Catalog::new(vec![Box::new(PingPong)]));
    let err = session.resolve("ping", &["mv"], None, "double", "").unwrap_err();
    match err {
        GenError::Cycle(chain) => assert_eq!(
            chain,
            "ping(mv) [double, euclidean] -> pong(mv) [double, euclidean] -> ping(mv) [double, euclidean]"
        ),
        other => panic!("expected a cycle, got {}", other),
    }
    assert!(session.sink().is_empty());
    assert!(session.registry().records().iter().all(|r| !r.complete));
}
