#![cfg(test)]

use crate::symbolic::blade;
use crate::symbolic::metric::{jacobi_eigen, Metric};
use crate::symbolic::{
    Atom, CliffordEngine, Monomial, Multivector, ProductKind, Scalar, ScalarFn, SymbolicEngine, SymbolicOp,
};

const E1: u32 = 0b001;
const E2: u32 = 0b010;
const E3: u32 = 0b100;

fn vector(coords: &[(u32, &str)]) -> Multivector {
    let mut mv = Multivector::zero();
    for (bitmap, name) in coords {
        mv.add_term(*bitmap, Scalar::var(*name));
    }
    mv
}

#[test]
fn test_reordering_sign() {
    assert_eq!(blade::reordering_sign(E1, E2), 1.0);
    assert_eq!(blade::reordering_sign(E2, E1), -1.0);
    assert_eq!(blade::reordering_sign(E1 | E2, E3), 1.0);
    assert_eq!(blade::reordering_sign(E3, E1 | E2), 1.0);
    assert_eq!(blade::reordering_sign(E2 | E3, E1), 1.0);
}

#[test]
fn test_involution_signs_by_grade() {
    let reverse: Vec<f64> = (0..5).map(blade::reverse_sign).collect();
    assert_eq!(reverse, vec![1.0, 1.0, -1.0, -1.0, 1.0]);
    let conjugate: Vec<f64> = (0..5).map(blade::conjugate_sign).collect();
    assert_eq!(conjugate, vec![1.0, -1.0, -1.0, 1.0, 1.0]);
    assert_eq!(blade::involution_sign(3), -1.0);
}

#[test]
fn test_scalar_polynomial_arithmetic() {
    let x = Scalar::var("x");
    let y = Scalar::var("y");
    let sum = x.add(&y);
    let square = sum.mul(&sum);
    // (x + y)^2 - x^2 - y^2 = 2xy
    let cross = square.sub(&x.mul(&x)).sub(&y.mul(&y));
    assert_eq!(cross, x.mul(&y).scale(2.0));
    assert!(x.sub(&x).is_zero());
    assert_eq!(Scalar::call(ScalarFn::Sqrt, Scalar::constant(4.0)).as_constant(), Some(2.0));
}

#[test]
fn test_scalar_eval_with_calls() {
    let x = Scalar::var("x");
    let s = Scalar::call(ScalarFn::Sqrt, x.mul(&x)).add(&Scalar::constant(1.0));
    let v = s.eval(&mut |_| -3.0).unwrap();
    assert!((v - 4.0).abs() < 1e-12);
    assert!(s.has_calls());
}

#[test]
fn test_euclidean_vector_product() {
    let metric = Metric::euclidean("default", 3);
    let a = vector(&[(E1, "a1"), (E2, "a2")]);
    let b = vector(&[(E1, "b1"), (E2, "b2")]);
    let gp = a.product(&b, &metric, ProductKind::Geometric);

    let expected_scalar = Scalar::var("a1").mul(&Scalar::var("b1")).add(&Scalar::var("a2").mul(&Scalar::var("b2")));
    assert_eq!(gp.scalar_part(), expected_scalar);

    let expected_bivector = Scalar::var("a1").mul(&Scalar::var("b2")).sub(&Scalar::var("a2").mul(&Scalar::var("b1")));
    assert_eq!(gp.coefficient(E1 | E2), expected_bivector);
    assert_eq!(gp.support(), vec![0, E1 | E2]);
}

#[test]
fn test_contractions_filter_grades() {
    let metric = Metric::euclidean("default", 3);
    let e1 = Multivector::blade(E1, Scalar::constant(1.0));
    let e12 = Multivector::blade(E1 | E2, Scalar::constant(1.0));

    let lc = e1.product(&e12, &metric, ProductKind::LeftContraction);
    assert_eq!(lc, Multivector::blade(E2, Scalar::constant(1.0)));

    let rc = e1.product(&e12, &metric, ProductKind::RightContraction);
    assert!(rc.is_zero());

    let op = e1.product(&e12, &metric, ProductKind::Outer);
    assert!(op.is_zero());
}

#[test]
fn test_non_diagonal_metric_product() {
    let metric = Metric::from_matrix("null", vec![vec![0.0, 1.0], vec![1.0, 0.0]], true).unwrap();
    assert!(!metric.is_diagonal());
    assert!(!metric.is_degenerate());

    let e1 = Multivector::blade(E1, Scalar::constant(1.0));
    let e2 = Multivector::blade(E2, Scalar::constant(1.0));

    assert!(e1.product(&e1, &metric, ProductKind::Geometric).is_zero());

    let gp = e1.product(&e2, &metric, ProductKind::Geometric);
    assert_eq!(gp.scalar_part().as_constant(), Some(1.0));
    assert_eq!(gp.coefficient(E1 | E2).as_constant(), Some(1.0));
}

#[test]
fn test_jacobi_eigenvalues() {
    let (mut values, _) = jacobi_eigen(&[vec![2.0, 1.0], vec![1.0, 2.0]]);
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert!((values[0] - 1.0).abs() < 1e-12);
    assert!((values[1] - 3.0).abs() < 1e-12);
}

#[test]
fn test_dual_requires_invertible_pseudoscalar() {
    let engine = CliffordEngine::new();
    let degenerate = Metric::from_diagonal("degenerate", &[1.0, 1.0, 0.0]);
    let value = vector(&[(E1, "a1")]);
    assert!(engine.compute(SymbolicOp::Dual, &[value.clone()], &degenerate).is_err());

    let euclidean = Metric::euclidean("default", 3);
    let dual = engine.compute(SymbolicOp::Dual, &[value], &euclidean).unwrap();
    assert_eq!(dual.support(), vec![E2 | E3]);
}

#[test]
fn test_versor_inverse_of_vector() {
    let engine = CliffordEngine::new();
    let metric = Metric::euclidean("default", 3);
    let v = Multivector::blade(E1, Scalar::constant(2.0));
    let inverse = engine.compute(SymbolicOp::VersorInverse, &[v], &metric).unwrap();
    assert_eq!(inverse.coefficient(E1).as_constant(), Some(0.5));
}

#[test]
fn test_square_sign() {
    let engine = CliffordEngine::new();
    let metric = Metric::euclidean("default", 3);

    let v = vector(&[(E1, "x"), (E2, "y")]);
    assert_eq!(engine.square_sign(&v, &metric), Some(1));

    let b = Multivector::blade(E1 | E2, Scalar::var("x"));
    assert_eq!(engine.square_sign(&b, &metric), Some(-1));

    let minkowski = Metric::from_diagonal("minkowski", &[1.0, -1.0, 1.0]);
    assert_eq!(engine.square_sign(&v, &minkowski), None);

    let null = Multivector::blade(E1, Scalar::constant(1.0)).add(&Multivector::blade(E2, Scalar::constant(1.0)));
    assert_eq!(engine.square_sign(&null, &minkowski), Some(0));
}

#[test]
fn test_products_merge_powers_into_one_monomial() {
    let a = Scalar::var("a");
    let b = Scalar::var("b");
    let p = b.mul(&a).mul(&a);
    let terms: Vec<(&Monomial, f64)> = p.terms().collect();
    assert_eq!(terms.len(), 1);
    let (monomial, coefficient) = terms[0];
    assert_eq!(coefficient, 1.0);
    assert!(monomial.factors().contains(&(Atom::Var("a".to_string()), 2)));
    assert!(monomial.factors().contains(&(Atom::Var("b".to_string()), 1)));
    assert!(Monomial::default().is_constant());
}
