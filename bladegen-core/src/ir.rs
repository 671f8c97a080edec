//! Instructions handed from generators to the lowering backend.

use crate::algebra::ValueType;
use crate::symbolic::{Multivector, Scalar};

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: ValueType,
    /// The variable is a pointer to the value.
    pub by_ref: bool,
}

impl Variable {
    pub fn local(name: &str, ty: ValueType) -> Self {
        Variable {
            name: name.to_string(),
            ty,
            by_ref: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    Greater,
    /// `|lhs| > rhs`, written without a math library call.
    AbsGreater,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: Scalar,
    pub op: Comparison,
    pub rhs: Scalar,
}

impl Condition {
    pub fn new(lhs: Scalar, op: Comparison, rhs: Scalar) -> Self {
        Condition { lhs, op, rhs }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Assign {
        dest: Variable,
        value: Multivector,
        declare: bool,
    },
    /// Return a value; `cast` narrows coordinates to the declared precision.
    Return {
        value: Multivector,
        cast: bool,
    },
    IfElse {
        condition: Condition,
        then_block: Vec<Instruction>,
        else_block: Vec<Instruction>,
    },
    /// Pre-rendered statements, indented but otherwise written as is.
    Verbatim(String),
    Comment(String),
}

impl Instruction {
    pub fn uses_math_library(&self) -> bool {
        match self {
            Instruction::Assign { value, .. } | Instruction::Return { value, .. } => value.has_calls(),
            Instruction::IfElse {
                condition,
                then_block,
                else_block,
            } => {
                condition.lhs.has_calls()
                    || condition.rhs.has_calls()
                    || then_block.iter().any(Instruction::uses_math_library)
                    || else_block.iter().any(Instruction::uses_math_library)
            }
            Instruction::Verbatim(_) | Instruction::Comment(_) => false,
        }
    }
}
