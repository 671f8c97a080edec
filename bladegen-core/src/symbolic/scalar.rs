//! Polynomial coefficients over opaque atoms.
//!
//! A coefficient of a symbolic multivector is a polynomial whose variables are
//! either coordinate access text (`a->c[0]`) or scalar function applications
//! such as `sqrt(...)`. Atom text is emitted verbatim by the lowering backend.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

/// Coefficients smaller than this are treated as zero when testing for zero.
pub const ZERO_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarFn {
    Sqrt,
    Abs,
    Sin,
    Cos,
    Sinh,
    Cosh,
    Inverse,
}

impl ScalarFn {
    pub fn apply(self, x: f64) -> Option<f64> {
        let v = match self {
            ScalarFn::Sqrt if x < 0.0 => return None,
            ScalarFn::Sqrt => x.sqrt(),
            ScalarFn::Abs => x.abs(),
            ScalarFn::Sin => x.sin(),
            ScalarFn::Cos => x.cos(),
            ScalarFn::Sinh => x.sinh(),
            ScalarFn::Cosh => x.cosh(),
            ScalarFn::Inverse if x == 0.0 => return None,
            ScalarFn::Inverse => 1.0 / x,
        };
        Some(v)
    }

    fn tag(self) -> &'static str {
        match self {
            ScalarFn::Sqrt => "sqrt",
            ScalarFn::Abs => "abs",
            ScalarFn::Sin => "sin",
            ScalarFn::Cos => "cos",
            ScalarFn::Sinh => "sinh",
            ScalarFn::Cosh => "cosh",
            ScalarFn::Inverse => "inv",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Atom {
    /// Verbatim text: coordinate access, a local variable or a helper call.
    Var(String),
    Call(ScalarFn, Box<Scalar>),
}

impl Atom {
    fn key(&self) -> String {
        match self {
            Atom::Var(name) => name.clone(),
            Atom::Call(f, arg) => format!("{}({})", f.tag(), arg),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Atom::Var(_) => 0,
            Atom::Call(..) => 1,
        }
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Atom {}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.key().cmp(&other.key()))
    }
}

/// A product of atoms raised to positive powers, kept sorted by atom.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Monomial(Vec<(Atom, u32)>);

impl Monomial {
    pub fn atom(atom: Atom) -> Self {
        Monomial(vec![(atom, 1)])
    }

    pub fn factors(&self) -> &[(Atom, u32)] {
        &self.0
    }

    pub fn is_constant(&self) -> bool {
        self.0.is_empty()
    }

    fn mul(&self, other: &Monomial) -> Monomial {
        let mut out = Vec::with_capacity(self.0.len() + other.0.len());
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].0.cmp(&other.0[j].0) {
                Ordering::Less => {
                    out.push(self.0[i].clone());
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(other.0[j].clone());
                    j += 1;
                }
                Ordering::Equal => {
                    out.push((self.0[i].0.clone(), self.0[i].1 + other.0[j].1));
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&self.0[i..]);
        out.extend_from_slice(&other.0[j..]);
        Monomial(out)
    }
}

/// A polynomial with `f64` coefficients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scalar {
    terms: BTreeMap<Monomial, f64>,
}

impl Scalar {
    pub fn zero() -> Self {
        Scalar::default()
    }

    pub fn constant(value: f64) -> Self {
        let mut s = Scalar::zero();
        if value != 0.0 {
            s.terms.insert(Monomial::default(), value);
        }
        s
    }

    pub fn var(text: impl Into<String>) -> Self {
        Scalar::from_atom(Atom::Var(text.into()))
    }

    pub fn from_atom(atom: Atom) -> Self {
        let mut s = Scalar::zero();
        s.terms.insert(Monomial::atom(atom), 1.0);
        s
    }

    /// Apply a scalar function. Constant arguments are folded numerically.
    pub fn call(f: ScalarFn, arg: Scalar) -> Self {
        if let Some(c) = arg.as_constant() {
            if let Some(v) = f.apply(c) {
                return Scalar::constant(v);
            }
        }
        Scalar::from_atom(Atom::Call(f, Box::new(arg)))
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, f64)> {
        self.terms.iter().map(|(m, c)| (m, *c))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.terms.values().all(|c| c.abs() < ZERO_EPSILON)
    }

    /// The value of this polynomial when it has no variable terms.
    pub fn as_constant(&self) -> Option<f64> {
        match self.terms.len() {
            0 => Some(0.0),
            1 => self.terms.get(&Monomial::default()).copied(),
            _ => None,
        }
    }

    pub fn has_calls(&self) -> bool {
        self.terms.keys().any(|m| {
            m.0.iter().any(|(a, _)| matches!(a, Atom::Call(..)))
        })
    }

    pub fn add(&self, other: &Scalar) -> Scalar {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.accumulate(m.clone(), *c);
        }
        out
    }

    pub fn sub(&self, other: &Scalar) -> Scalar {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.accumulate(m.clone(), -*c);
        }
        out
    }

    pub fn mul(&self, other: &Scalar) -> Scalar {
        let mut out = Scalar::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.accumulate(ma.mul(mb), ca * cb);
            }
        }
        out
    }

    pub fn scale(&self, factor: f64) -> Scalar {
        if factor == 0.0 {
            return Scalar::zero();
        }
        Scalar {
            terms: self.terms.iter().map(|(m, c)| (m.clone(), c * factor)).collect(),
        }
    }

    pub fn neg(&self) -> Scalar {
        self.scale(-1.0)
    }

    /// Drop near-zero terms and snap coefficients close to an integer.
    pub fn round(&self, epsilon: f64) -> Scalar {
        let mut out = Scalar::zero();
        for (m, c) in &self.terms {
            if c.abs() < epsilon {
                continue;
            }
            let nearest = c.round();
            let v = if (c - nearest).abs() < epsilon { nearest } else { *c };
            out.terms.insert(m.clone(), v);
        }
        out
    }

    /// Evaluate with `lookup` supplying a value for every variable atom.
    pub fn eval(&self, lookup: &mut dyn FnMut(&str) -> f64) -> Option<f64> {
        let mut sum = 0.0;
        for (m, c) in &self.terms {
            let mut prod = *c;
            for (atom, power) in &m.0 {
                let base = match atom {
                    Atom::Var(name) => lookup(name),
                    Atom::Call(f, arg) => f.apply(arg.eval(lookup)?)?,
                };
                prod *= base.powi(*power as i32);
            }
            sum += prod;
        }
        Some(sum)
    }

    fn accumulate(&mut self, m: Monomial, c: f64) {
        if c == 0.0 {
            return;
        }
        match self.terms.entry(m) {
            Entry::Vacant(slot) => {
                slot.insert(c);
            }
            Entry::Occupied(mut slot) => {
                *slot.get_mut() += c;
                if *slot.get() == 0.0 {
                    slot.remove();
                }
            }
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::constant(value)
    }
}

/// Canonical text, used for keys and diagnostics rather than for emitted code.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "0");
        }
        for (i, (m, c)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{:?}", c)?;
            for (atom, power) in &m.0 {
                write!(f, "*{}", atom.key())?;
                if *power > 1 {
                    write!(f, "^{}", power)?;
                }
            }
        }
        Ok(())
    }
}
