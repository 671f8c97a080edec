//! Symbolic multivector arithmetic.

pub mod blade;
pub mod engine;
pub mod metric;
pub mod multivector;
pub mod scalar;

pub use engine::{CliffordEngine, SymbolicEngine, SymbolicOp};
pub use metric::Metric;
pub use multivector::{Multivector, ProductKind, EIGEN_ROUNDING};
pub use scalar::{Atom, Monomial, Scalar, ScalarFn};

#[cfg(test)]
mod symbolic_tests;
