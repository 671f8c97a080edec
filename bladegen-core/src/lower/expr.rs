use crate::algebra::FloatPrecision;
use crate::lower::Convention;
use crate::symbolic::{Atom, Monomial, Scalar, ScalarFn};

/// Renders polynomial coefficients as target-language expressions.
pub struct ExprWriter<'a> {
    pub convention: Convention,
    pub float: &'a FloatPrecision,
}

impl<'a> ExprWriter<'a> {
    pub fn new(convention: Convention, float: &'a FloatPrecision) -> Self {
        ExprWriter { convention, float }
    }

    pub fn literal(&self, value: f64) -> String {
        self.float.literal(value)
    }

    pub fn scalar(&self, s: &Scalar) -> String {
        let mut out = String::new();
        for (i, (m, c)) in s.terms().enumerate() {
            let negative = c < 0.0;
            if i == 0 {
                if negative {
                    out.push('-');
                }
            } else {
                out.push_str(if negative { " - " } else { " + " });
            }
            out.push_str(&self.term(m, c.abs()));
        }
        if out.is_empty() {
            out = self.literal(0.0);
        }
        out
    }

    /// Rendered as a single operand, parenthesized when it has several terms.
    pub fn operand(&self, s: &Scalar) -> String {
        let text = self.scalar(s);
        if s.len() > 1 || text.starts_with('-') {
            format!("({})", text)
        } else {
            text
        }
    }

    fn term(&self, m: &Monomial, magnitude: f64) -> String {
        if m.is_constant() {
            return self.literal(magnitude);
        }
        let mut factors = Vec::new();
        if magnitude != 1.0 {
            factors.push(self.literal(magnitude));
        }
        for (atom, power) in m.factors() {
            let text = self.atom(atom);
            for _ in 0..*power {
                factors.push(text.clone());
            }
        }
        factors.join("*")
    }

    fn atom(&self, atom: &Atom) -> String {
        match atom {
            Atom::Var(text) => text.clone(),
            Atom::Call(ScalarFn::Inverse, arg) => {
                format!("({}/{})", self.literal(1.0), self.operand_always(arg))
            }
            Atom::Call(f, arg) => {
                let single = self.float.is_single();
                let name = self.convention.math_function(*f, single);
                let call = format!("{}({})", name, self.scalar(arg));
                if self.convention.math_needs_cast(single) {
                    format!("(({})({}))", self.float.name, call)
                } else {
                    call
                }
            }
        }
    }

    fn operand_always(&self, s: &Scalar) -> String {
        let text = self.scalar(s);
        if s.len() > 1 || s.terms().any(|(m, c)| !m.is_constant() && (c != 1.0 || m.factors().len() > 1)) {
            format!("({})", text)
        } else {
            text
        }
    }

    /// Cast text placed before an expression to narrow it to `self.float`.
    pub fn cast(&self, expr: &str) -> String {
        format!("({})({})", self.float.name, expr)
    }
}
