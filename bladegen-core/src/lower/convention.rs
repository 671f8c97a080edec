use serde::Deserialize;

use crate::symbolic::ScalarFn;

/// Output language conventions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Convention {
    /// C: no overloading, values passed by address, value results via `_dst`.
    #[default]
    C,
    Cpp,
    CSharp,
    Java,
}

impl Convention {
    pub fn supports_overloading(self) -> bool {
        !matches!(self, Convention::C)
    }

    pub fn writes_declarations(self) -> bool {
        matches!(self, Convention::C | Convention::Cpp)
    }

    /// Whether multivector arguments are passed by address unless told otherwise.
    pub fn passes_by_address(self) -> bool {
        matches!(self, Convention::C)
    }

    pub fn returns_through_destination(self) -> bool {
        matches!(self, Convention::C)
    }

    pub fn is_managed(self) -> bool {
        matches!(self, Convention::CSharp | Convention::Java)
    }

    pub fn template_family(self) -> &'static str {
        if self.is_managed() {
            "managed"
        } else {
            "c"
        }
    }

    pub fn bool_type(self) -> &'static str {
        match self {
            Convention::C => "int",
            Convention::Cpp | Convention::CSharp => "bool",
            Convention::Java => "boolean",
        }
    }

    pub fn true_literal(self) -> &'static str {
        match self {
            Convention::C => "1",
            _ => "true",
        }
    }

    pub fn false_literal(self) -> &'static str {
        match self {
            Convention::C => "0",
            _ => "false",
        }
    }

    /// Modifiers placed before the return type of every generated function.
    pub fn function_prefix(self, inline: bool) -> &'static str {
        match self {
            Convention::C | Convention::Cpp if inline => "inline ",
            Convention::C | Convention::Cpp => "",
            Convention::CSharp => "public static ",
            Convention::Java => "public static final ",
        }
    }

    pub fn math_function(self, f: ScalarFn, single: bool) -> &'static str {
        match self {
            Convention::C | Convention::Cpp => match (f, single) {
                (ScalarFn::Sqrt, false) => "sqrt",
                (ScalarFn::Sqrt, true) => "sqrtf",
                (ScalarFn::Abs, false) => "fabs",
                (ScalarFn::Abs, true) => "fabsf",
                (ScalarFn::Sin, false) => "sin",
                (ScalarFn::Sin, true) => "sinf",
                (ScalarFn::Cos, false) => "cos",
                (ScalarFn::Cos, true) => "cosf",
                (ScalarFn::Sinh, false) => "sinh",
                (ScalarFn::Sinh, true) => "sinhf",
                (ScalarFn::Cosh, false) => "cosh",
                (ScalarFn::Cosh, true) => "coshf",
                (ScalarFn::Inverse, _) => "",
            },
            Convention::CSharp => match f {
                ScalarFn::Sqrt => "Math.Sqrt",
                ScalarFn::Abs => "Math.Abs",
                ScalarFn::Sin => "Math.Sin",
                ScalarFn::Cos => "Math.Cos",
                ScalarFn::Sinh => "Math.Sinh",
                ScalarFn::Cosh => "Math.Cosh",
                ScalarFn::Inverse => "",
            },
            Convention::Java => match f {
                ScalarFn::Sqrt => "Math.sqrt",
                ScalarFn::Abs => "Math.abs",
                ScalarFn::Sin => "Math.sin",
                ScalarFn::Cos => "Math.cos",
                ScalarFn::Sinh => "Math.sinh",
                ScalarFn::Cosh => "Math.cosh",
                ScalarFn::Inverse => "",
            },
        }
    }

    /// Two-argument arc tangent, `atan2(y, x)`.
    pub fn atan2(self, single: bool) -> &'static str {
        match self {
            Convention::C | Convention::Cpp if single => "atan2f",
            Convention::C | Convention::Cpp => "atan2",
            Convention::CSharp => "Math.Atan2",
            Convention::Java => "Math.atan2",
        }
    }

    /// Managed math libraries work in double precision and need a narrowing cast.
    pub fn math_needs_cast(self, single: bool) -> bool {
        single && self.is_managed()
    }

    pub fn file_extensions(self) -> (&'static str, &'static str) {
        match self {
            Convention::C => ("h", "c"),
            Convention::Cpp => ("h", "cpp"),
            Convention::CSharp => ("cs", "cs"),
            Convention::Java => ("java", "java"),
        }
    }
}
