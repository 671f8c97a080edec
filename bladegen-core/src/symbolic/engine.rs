use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::metric::Metric;
use super::multivector::{Multivector, ProductKind};
use super::scalar::{Scalar, ScalarFn};
use crate::bail_domain;
use crate::error::Result;

/// Number of random evaluations used to decide the sign of a symbolic square.
const SIGN_SAMPLES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolicOp {
    Add,
    Subtract,
    Negate,
    Product(ProductKind),
    Reverse,
    GradeInvolution,
    CliffordConjugate,
    Dual,
    Undual,
    VersorInverse,
    /// Scalar part of `a * reverse(a)`.
    Norm2,
}

impl SymbolicOp {
    pub fn arity(self) -> usize {
        match self {
            SymbolicOp::Add | SymbolicOp::Subtract | SymbolicOp::Product(_) => 2,
            _ => 1,
        }
    }
}

/// Symbolic multivector computation used by the generators.
pub trait SymbolicEngine: Send + Sync {
    fn compute(&self, op: SymbolicOp, operands: &[Multivector], metric: &Metric) -> Result<Multivector>;

    fn grade_extract(&self, value: &Multivector, grade: u32) -> Multivector {
        value.grade_part(grade)
    }

    fn is_zero(&self, value: &Multivector) -> bool {
        value.is_zero()
    }

    fn round(&self, value: &Multivector, epsilon: f64) -> Multivector {
        value.round(epsilon)
    }

    /// Sign of `value * value` when it is a scalar of constant sign.
    fn square_sign(&self, value: &Multivector, metric: &Metric) -> Option<i32>;
}

/// Expansion-based engine over [`Multivector`].
pub struct CliffordEngine {
    seed: u64,
}

impl CliffordEngine {
    pub fn new() -> Self {
        CliffordEngine { seed: 0x5eed_b1ad }
    }

    pub fn with_seed(seed: u64) -> Self {
        CliffordEngine { seed }
    }

    fn pseudoscalar(metric: &Metric) -> Multivector {
        let bitmap = (1u32 << metric.dimension()) - 1;
        Multivector::blade(bitmap, Scalar::constant(1.0))
    }

    fn pseudoscalar_inverse(metric: &Metric) -> Result<Multivector> {
        let i = Self::pseudoscalar(metric);
        let square = i.product(&i, metric, ProductKind::Geometric).scalar_part();
        match square.as_constant() {
            Some(s) if s.abs() > 1e-12 => Ok(i.scale(&Scalar::constant(1.0 / s))),
            _ => bail_domain!(
                "the pseudoscalar is not invertible under metric '{}'",
                metric.name
            ),
        }
    }
}

impl Default for CliffordEngine {
    fn default() -> Self {
        CliffordEngine::new()
    }
}

impl SymbolicEngine for CliffordEngine {
    fn compute(&self, op: SymbolicOp, operands: &[Multivector], metric: &Metric) -> Result<Multivector> {
        if operands.len() != op.arity() {
            bail_domain!("{:?} expects {} operands, got {}", op, op.arity(), operands.len());
        }
        let a = &operands[0];
        let value = match op {
            SymbolicOp::Add => a.add(&operands[1]),
            SymbolicOp::Subtract => a.sub(&operands[1]),
            SymbolicOp::Negate => a.neg(),
            SymbolicOp::Product(kind) => a.product(&operands[1], metric, kind),
            SymbolicOp::Reverse => a.reverse(),
            SymbolicOp::GradeInvolution => a.grade_involution(),
            SymbolicOp::CliffordConjugate => a.clifford_conjugate(),
            SymbolicOp::Dual => {
                let inverse = Self::pseudoscalar_inverse(metric)?;
                a.product(&inverse, metric, ProductKind::LeftContraction)
            }
            SymbolicOp::Undual => {
                Self::pseudoscalar_inverse(metric)?;
                a.product(&Self::pseudoscalar(metric), metric, ProductKind::LeftContraction)
            }
            SymbolicOp::Norm2 => {
                let n2 = a.product(&a.reverse(), metric, ProductKind::Scalar).scalar_part();
                Multivector::scalar(n2)
            }
            SymbolicOp::VersorInverse => {
                let reverse = a.reverse();
                let n2 = a.product(&reverse, metric, ProductKind::Scalar).scalar_part();
                if n2.is_zero() {
                    bail_domain!("versor inverse of a value with zero norm");
                }
                reverse.scale(&Scalar::call(ScalarFn::Inverse, n2))
            }
        };
        Ok(if metric.round { value.round(1e-14) } else { value })
    }

    fn square_sign(&self, value: &Multivector, metric: &Metric) -> Option<i32> {
        let square = value
            .product(value, metric, ProductKind::Geometric)
            .round(1e-12);
        if !square.is_scalar() {
            return None;
        }
        let s = square.scalar_part();
        if s.is_zero() {
            return Some(0);
        }
        if let Some(c) = s.as_constant() {
            return Some(if c > 0.0 { 1 } else { -1 });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut sign = None;
        for _ in 0..SIGN_SAMPLES {
            let mut samples: HashMap<String, f64> = HashMap::new();
            let v = s.eval(&mut |name| {
                *samples
                    .entry(name.to_string())
                    .or_insert_with(|| rng.gen_range(-1.0..1.0))
            })?;
            let current = if v > 0.0 { 1 } else if v < 0.0 { -1 } else { 0 };
            match sign {
                None => sign = Some(current),
                Some(previous) if previous != current => return None,
                _ => {}
            }
        }
        sign
    }
}
