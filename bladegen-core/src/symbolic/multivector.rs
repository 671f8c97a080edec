use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::blade;
use super::metric::Metric;
use super::scalar::Scalar;

/// Rounding applied after computing in the metric's eigenbasis.
pub const EIGEN_ROUNDING: f64 = 1e-14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductKind {
    Geometric,
    Outer,
    LeftContraction,
    RightContraction,
    Hestenes,
    ModifiedHestenes,
    Scalar,
}

impl ProductKind {
    fn keeps(self, ga: u32, gb: u32, result: u32) -> bool {
        match self {
            ProductKind::Geometric => true,
            ProductKind::Outer => result == ga + gb,
            ProductKind::LeftContraction => ga <= gb && result == gb - ga,
            ProductKind::RightContraction => ga >= gb && result == ga - gb,
            ProductKind::Hestenes => ga != 0 && gb != 0 && result == ga.abs_diff(gb),
            ProductKind::ModifiedHestenes => result == ga.abs_diff(gb),
            ProductKind::Scalar => result == 0,
        }
    }
}

/// A sparse multivector with polynomial coefficients, keyed by blade bitmap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Multivector {
    terms: BTreeMap<u32, Scalar>,
}

impl Multivector {
    pub fn zero() -> Self {
        Multivector::default()
    }

    pub fn scalar(value: Scalar) -> Self {
        Multivector::blade(0, value)
    }

    pub fn constant(value: f64) -> Self {
        Multivector::scalar(Scalar::constant(value))
    }

    pub fn blade(bitmap: u32, coefficient: Scalar) -> Self {
        let mut mv = Multivector::zero();
        mv.add_term(bitmap, coefficient);
        mv
    }

    pub fn terms(&self) -> impl Iterator<Item = (u32, &Scalar)> {
        self.terms.iter().map(|(b, c)| (*b, c))
    }

    pub fn coefficient(&self, bitmap: u32) -> Scalar {
        self.terms.get(&bitmap).cloned().unwrap_or_default()
    }

    pub fn support(&self) -> Vec<u32> {
        self.terms.keys().copied().collect()
    }

    pub fn grades(&self) -> BTreeSet<u32> {
        self.terms.keys().map(|b| blade::grade(*b)).collect()
    }

    pub fn is_zero(&self) -> bool {
        self.terms.values().all(Scalar::is_zero)
    }

    /// True when every non-zero term is the scalar blade.
    pub fn is_scalar(&self) -> bool {
        self.terms.iter().all(|(b, c)| *b == 0 || c.is_zero())
    }

    pub fn scalar_part(&self) -> Scalar {
        self.coefficient(0)
    }

    pub fn has_calls(&self) -> bool {
        self.terms.values().any(Scalar::has_calls)
    }

    pub fn add_term(&mut self, bitmap: u32, coefficient: Scalar) {
        if coefficient.is_empty() {
            return;
        }
        let sum = match self.terms.remove(&bitmap) {
            Some(existing) => existing.add(&coefficient),
            None => coefficient,
        };
        if !sum.is_empty() {
            self.terms.insert(bitmap, sum);
        }
    }

    pub fn add(&self, other: &Multivector) -> Multivector {
        let mut out = self.clone();
        for (b, c) in &other.terms {
            out.add_term(*b, c.clone());
        }
        out
    }

    pub fn sub(&self, other: &Multivector) -> Multivector {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Multivector {
        self.map(|_, c| c.neg())
    }

    pub fn scale(&self, factor: &Scalar) -> Multivector {
        self.map(|_, c| c.mul(factor))
    }

    pub fn grade_part(&self, grade: u32) -> Multivector {
        let mut out = Multivector::zero();
        for (b, c) in &self.terms {
            if blade::grade(*b) == grade {
                out.add_term(*b, c.clone());
            }
        }
        out
    }

    pub fn reverse(&self) -> Multivector {
        self.map(|b, c| c.scale(blade::reverse_sign(blade::grade(b))))
    }

    pub fn grade_involution(&self) -> Multivector {
        self.map(|b, c| c.scale(blade::involution_sign(blade::grade(b))))
    }

    pub fn clifford_conjugate(&self) -> Multivector {
        self.map(|b, c| c.scale(blade::conjugate_sign(blade::grade(b))))
    }

    pub fn round(&self, epsilon: f64) -> Multivector {
        self.map(|_, c| c.round(epsilon))
    }

    pub fn product(&self, other: &Multivector, metric: &Metric, kind: ProductKind) -> Multivector {
        if kind == ProductKind::Outer || metric.is_diagonal() {
            return self.product_diagonal(other, metric.eigenvalues(), kind);
        }

        let a = self.change_basis(|b| metric.to_eigenbasis(b));
        let b = other.change_basis(|b| metric.to_eigenbasis(b));
        // Grade filtering happens per blade pair, which the eigenbasis preserves.
        a.product_diagonal(&b, metric.eigenvalues(), kind)
            .change_basis(|b| metric.from_eigenbasis(b))
            .round(EIGEN_ROUNDING)
    }

    fn product_diagonal(&self, other: &Multivector, diagonal: &[f64], kind: ProductKind) -> Multivector {
        let mut out = Multivector::zero();
        for (ba, ca) in &self.terms {
            for (bb, cb) in &other.terms {
                if kind == ProductKind::Outer && ba & bb != 0 {
                    continue;
                }
                let (bitmap, sign) = blade::geometric_product(*ba, *bb, diagonal);
                if sign == 0.0 {
                    continue;
                }
                if !kind.keeps(blade::grade(*ba), blade::grade(*bb), blade::grade(bitmap)) {
                    continue;
                }
                out.add_term(bitmap, ca.mul(cb).scale(sign));
            }
        }
        out
    }

    fn change_basis<'m>(&self, transform: impl Fn(u32) -> &'m [(u32, f64)]) -> Multivector {
        let mut out = Multivector::zero();
        for (b, c) in &self.terms {
            for (target, factor) in transform(*b) {
                out.add_term(*target, c.scale(*factor));
            }
        }
        out
    }

    fn map(&self, f: impl Fn(u32, &Scalar) -> Scalar) -> Multivector {
        let mut out = Multivector::zero();
        for (b, c) in &self.terms {
            out.add_term(*b, f(*b, c));
        }
        out
    }
}

impl fmt::Display for Multivector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, (b, c)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "({})*[{:#b}]", c, b)?;
        }
        Ok(())
    }
}
