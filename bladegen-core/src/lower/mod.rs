//! Lowering of instructions into host-language text.
//!
//! The backend knows how each convention passes multivector arguments, how it
//! returns values, and whether function names must carry argument types.
//! Generators never write text directly except through [`Backend`] helpers
//! and the template renderer.

pub mod convention;
pub mod expr;


use std::fmt::Write;

pub use convention::Convention;
pub use expr::ExprWriter;

use crate::algebra::{Algebra, FloatPrecision, ValueType};
use crate::bail_domain;
use crate::error::Result;
use crate::ir::{Comparison, Condition, Instruction, Variable};
use crate::request::{passing_code, ArgumentBinding, OperationRequest};
use crate::sink::{Buffer, Feature, OutputSink};
use crate::symbolic::{Multivector, Scalar};

/// Name of the output parameter or local holding a returned value.
pub const DESTINATION: &str = "_dst";

/// Helper returning a uniform random double in `[0, 1)`, supplied by the runtime support code.
pub const RANDOM_SOURCE: &str = "bladegen_random";

pub const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq)]
pub enum Returns {
    /// A scalar of the named float type.
    Scalar(String),
    Bool,
    Int,
    Value(ValueType),
}

pub struct FunctionDef<'a> {
    pub name: String,
    pub comment: String,
    pub returns: Returns,
    pub args: &'a [ArgumentBinding],
    pub body: Vec<Instruction>,
    pub float: &'a FloatPrecision,
}

#[derive(Clone, Copy)]
pub struct Backend<'a> {
    pub algebra: &'a Algebra,
    pub convention: Convention,
}

impl<'a> Backend<'a> {
    pub fn new(algebra: &'a Algebra) -> Self {
        Backend {
            algebra,
            convention: algebra.convention,
        }
    }

    pub fn writer<'f>(&self, float: &'f FloatPrecision) -> ExprWriter<'f> {
        ExprWriter::new(self.convention, float)
    }

    /// Mangled output name. Precision is always encoded; argument types are
    /// encoded when the convention cannot overload.
    pub fn function_name(
        &self,
        base: &str,
        float: &FloatPrecision,
        argument_types: &[String],
        forced_return: Option<&str>,
    ) -> String {
        let overloaded = self.convention.supports_overloading();
        self.mangled_name(base, float, argument_types, forced_return, overloaded)
    }

    /// Name of the self-test of a function. Tests take no arguments, so the
    /// argument types are spelled out even where functions overload.
    pub fn test_name(
        &self,
        base: &str,
        float: &FloatPrecision,
        argument_types: &[String],
        forced_return: Option<&str>,
    ) -> String {
        format!("test_{}", self.mangled_name(base, float, argument_types, forced_return, false))
    }

    /// `base` with a non-default metric and non-default passing flags appended.
    pub fn qualified_name(&self, base: &str, metric: &str, passing: Option<&[bool]>) -> String {
        let mut name = base.to_string();
        if !metric.is_empty() && metric != self.algebra.default_metric_name() {
            name.push('_');
            name.push_str(metric);
        }
        if let Some(flags) = passing {
            name.push_str("_pass_");
            name.push_str(&passing_code(flags));
        }
        name
    }

    fn mangled_name(
        &self,
        base: &str,
        float: &FloatPrecision,
        argument_types: &[String],
        forced_return: Option<&str>,
        overloaded: bool,
    ) -> String {
        let mut name = base.to_string();
        if let Some(ret) = forced_return.filter(|r| !r.is_empty()) {
            name.push_str("_returns_");
            name.push_str(&self.mangle_type(ret, float));
        }
        if overloaded || argument_types.is_empty() {
            name.push_str(&float.suffix);
        } else {
            for t in argument_types {
                name.push('_');
                name.push_str(&self.mangle_type(t, float));
            }
        }
        name
    }

    pub fn mangle_type(&self, type_name: &str, float: &FloatPrecision) -> String {
        match self.algebra.value_type(type_name) {
            Some(ty) => self.algebra.mangled_type_name(ty, float),
            None => type_name.to_string(),
        }
    }

    pub fn bind_arguments(&self, request: &OperationRequest, float: &FloatPrecision) -> Result<Vec<ArgumentBinding>> {
        let mut bindings = Vec::with_capacity(request.arity());
        for (i, type_name) in request.argument_types.iter().enumerate() {
            let ty = match self.algebra.value_type(type_name) {
                Some(ty) => ty,
                None => bail_domain!("unknown argument type '{}'", type_name),
            };
            let name = request
                .argument_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| crate::request::default_argument_name(i));
            let by_ref = ty != ValueType::Scalar
                && request
                    .by_ref
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| self.convention.passes_by_address());
            let value = self.symbolic_value(ty, &name, by_ref);
            bindings.push(ArgumentBinding {
                type_name: self.algebra.type_name(ty, float),
                mangled_type: self.algebra.mangled_type_name(ty, float),
                name,
                ty,
                by_ref,
                value,
            });
        }
        Ok(bindings)
    }

    pub fn coordinate(&self, name: &str, by_ref: bool, index: usize) -> String {
        format!("{}{}c[{}]", name, self.member(by_ref), index)
    }

    pub fn member(&self, by_ref: bool) -> &'static str {
        if by_ref {
            "->"
        } else {
            "."
        }
    }

    /// Symbolic value of a variable whose coordinates are read through `name`.
    pub fn symbolic_value(&self, ty: ValueType, name: &str, by_ref: bool) -> Option<Multivector> {
        match ty {
            ValueType::Scalar => Some(Multivector::scalar(Scalar::var(name))),
            ValueType::Shape(i) => {
                let mut mv = Multivector::zero();
                let mut k = 0;
                for blade in &self.algebra.shapes[i].blades {
                    let coefficient = match blade.constant {
                        Some(c) => Scalar::constant(c * blade.sign),
                        None => {
                            let access = Scalar::var(self.coordinate(name, by_ref, k));
                            k += 1;
                            access.scale(blade.sign)
                        }
                    };
                    mv.add_term(blade.bitmap, coefficient);
                }
                Some(mv)
            }
            ValueType::General => {
                let mut mv = Multivector::zero();
                for b in 0..self.algebra.blade_count() {
                    mv.add_term(b as u32, Scalar::var(self.coordinate(name, by_ref, b)));
                }
                Some(mv)
            }
            ValueType::Outermorphism => None,
        }
    }

    /// Coordinate expressions of `value` in the layout of `ty`, by coordinate index.
    pub fn coordinates(&self, ty: ValueType, value: &Multivector) -> Vec<Scalar> {
        match ty {
            ValueType::Shape(i) => self.algebra.shapes[i]
                .variable_blades()
                .map(|b| value.coefficient(b.bitmap).scale(b.sign))
                .collect(),
            ValueType::General => (0..self.algebra.blade_count())
                .map(|b| value.coefficient(b as u32))
                .collect(),
            ValueType::Scalar => vec![value.scalar_part()],
            ValueType::Outermorphism => Vec::new(),
        }
    }

    pub fn type_text(&self, ty: ValueType, float: &FloatPrecision) -> String {
        self.algebra.mangled_type_name(ty, float)
    }

    /// Expression passing `name` to a parameter. `is_pointer` tells whether
    /// `name` holds an address, `by_ref` whether the parameter takes one.
    pub fn argument(&self, name: &str, is_pointer: bool, by_ref: bool) -> String {
        if self.convention.is_managed() {
            return name.to_string();
        }
        match (is_pointer, by_ref) {
            (false, true) => format!("&{}", name),
            (true, false) => format!("*{}", name),
            _ => name.to_string(),
        }
    }

    /// Statement storing the value returned by `function` into local `dest`.
    pub fn call_value(&self, dest: &str, function: &str, args: &[String]) -> String {
        if self.convention.returns_through_destination() {
            let mut all = vec![format!("&{}", dest)];
            all.extend(args.iter().cloned());
            format!("{}({});", function, all.join(", "))
        } else {
            format!("{} = {}({});", dest, function, args.join(", "))
        }
    }

    pub fn call_expression(&self, function: &str, args: &[String]) -> String {
        format!("{}({})", function, args.join(", "))
    }

    pub fn declare_local(&self, name: &str, ty: ValueType, float: &FloatPrecision) -> String {
        let type_text = self.type_text(ty, float);
        match ty {
            ValueType::Scalar => format!("{} {};", type_text, name),
            _ if self.convention.is_managed() => format!("{} {} = new {}();", type_text, name, type_text),
            _ => format!("{} {};", type_text, name),
        }
    }

    /// Statement returning local value `name` from a value-returning function.
    pub fn return_local(&self, name: &str) -> String {
        if self.convention.returns_through_destination() {
            format!("*{} = {};", DESTINATION, name)
        } else {
            format!("return {};", name)
        }
    }

    pub fn return_type_text(&self, returns: &Returns, float: &FloatPrecision) -> String {
        match returns {
            Returns::Scalar(name) => name.clone(),
            Returns::Bool => self.convention.bool_type().to_string(),
            Returns::Int => "int".to_string(),
            Returns::Value(_) if self.convention.returns_through_destination() => "void".to_string(),
            Returns::Value(ty) => self.type_text(*ty, float),
        }
    }

    pub fn parameter_text(&self, arg: &ArgumentBinding) -> String {
        if arg.ty == ValueType::Scalar {
            return format!("{} {}", arg.mangled_type, arg.name);
        }
        match self.convention {
            Convention::C if arg.by_ref => format!("const {} *{}", arg.mangled_type, arg.name),
            Convention::C => format!("{} {}", arg.mangled_type, arg.name),
            Convention::Cpp if arg.by_ref => format!("const {} *{}", arg.mangled_type, arg.name),
            Convention::Cpp => format!("const {} &{}", arg.mangled_type, arg.name),
            Convention::CSharp | Convention::Java => format!("{} {}", arg.mangled_type, arg.name),
        }
    }

    pub fn signature(&self, def: &FunctionDef<'_>) -> String {
        let mut params = Vec::new();
        if let Returns::Value(ty) = def.returns {
            if self.convention.returns_through_destination() {
                params.push(format!("{} *{}", self.type_text(ty, def.float), DESTINATION));
            }
        }
        params.extend(def.args.iter().map(|a| self.parameter_text(a)));
        let params = if params.is_empty() && self.convention == Convention::C {
            "void".to_string()
        } else {
            params.join(", ")
        };
        format!(
            "{}{} {}({})",
            self.convention.function_prefix(self.algebra.inline),
            self.return_type_text(&def.returns, def.float),
            def.name,
            params
        )
    }

    pub fn test_signature(&self, name: &str) -> String {
        match self.convention {
            Convention::C => format!("int {}(void)", name),
            Convention::Cpp => format!("bool {}()", name),
            Convention::CSharp | Convention::Java => format!(
                "{}{} {}()",
                self.convention.function_prefix(false),
                self.convention.bool_type(),
                name
            ),
        }
    }

    /// Render `def` and append it, with its declaration, to the sink.
    pub fn write_function(&self, sink: &OutputSink, def: &FunctionDef<'_>) -> Result<()> {
        if def.body.iter().any(Instruction::uses_math_library) {
            sink.require(Feature::MathLibrary);
        }
        let signature = self.signature(def);
        let mut body = String::new();
        for instruction in &def.body {
            self.write_instruction(&mut body, instruction, def, 1);
        }
        self.emit(sink, &signature, &def.comment, &body, self.algebra.inline);
        Ok(())
    }

    /// Append a function with a pre-rendered body.
    pub fn write_raw(&self, sink: &OutputSink, signature: &str, comment: &str, body: &str) {
        self.emit(sink, signature, comment, &indent(body, 1), false);
    }

    fn emit(&self, sink: &OutputSink, signature: &str, comment: &str, body: &str, inline: bool) {
        let mut definition = String::new();
        let doc = if comment.is_empty() {
            String::new()
        } else {
            format!("/** {} */\n", comment)
        };
        if self.convention.writes_declarations() {
            sink.append(Buffer::Declarations, &format!("{}{};\n", doc, signature));
        } else {
            definition.push_str(&doc);
        }
        let _ = writeln!(definition, "{}\n{{\n{}}}\n", signature, body);
        let target = if inline { Buffer::Inline } else { Buffer::Definitions };
        sink.append(target, &definition);
    }

    fn write_instruction(&self, out: &mut String, instruction: &Instruction, def: &FunctionDef<'_>, depth: usize) {
        let pad = INDENT.repeat(depth);
        let w = self.writer(def.float);
        match instruction {
            Instruction::Comment(text) => {
                let _ = writeln!(out, "{}/* {} */", pad, text);
            }
            Instruction::Verbatim(text) => out.push_str(&indent(text, depth)),
            Instruction::Assign { dest, value, declare } => {
                self.write_assign(out, dest, value, *declare, def.float, &pad);
            }
            Instruction::Return { value, cast } => match &def.returns {
                Returns::Value(ty) => {
                    let dest = Variable {
                        name: DESTINATION.to_string(),
                        ty: *ty,
                        by_ref: self.convention.returns_through_destination(),
                    };
                    let declare = !self.convention.returns_through_destination();
                    let coords = self.coordinates(*ty, value);
                    self.write_coordinates(out, &dest, &coords, declare, *cast, def.float, &pad);
                    if declare {
                        let _ = writeln!(out, "{}return {};", pad, DESTINATION);
                    }
                }
                _ => {
                    let text = w.scalar(&value.scalar_part());
                    let text = if *cast { w.cast(&text) } else { text };
                    let _ = writeln!(out, "{}return {};", pad, text);
                }
            },
            Instruction::IfElse {
                condition,
                then_block,
                else_block,
            } => {
                let _ = writeln!(out, "{}if ({}) {{", pad, self.condition(condition, def.float));
                for i in then_block {
                    self.write_instruction(out, i, def, depth + 1);
                }
                if else_block.is_empty() {
                    let _ = writeln!(out, "{}}}", pad);
                } else {
                    let _ = writeln!(out, "{}}}\n{}else {{", pad, pad);
                    for i in else_block {
                        self.write_instruction(out, i, def, depth + 1);
                    }
                    let _ = writeln!(out, "{}}}", pad);
                }
            }
        }
    }

    fn write_assign(
        &self,
        out: &mut String,
        dest: &Variable,
        value: &Multivector,
        declare: bool,
        float: &FloatPrecision,
        pad: &str,
    ) {
        if dest.ty == ValueType::Scalar {
            let w = self.writer(float);
            let prefix = if declare { format!("{} ", float.name) } else { String::new() };
            let _ = writeln!(out, "{}{}{} = {};", pad, prefix, dest.name, w.scalar(&value.scalar_part()));
            return;
        }
        let coords = self.coordinates(dest.ty, value);
        self.write_coordinates(out, dest, &coords, declare, false, float, pad);
    }

    #[allow(clippy::too_many_arguments)]
    fn write_coordinates(
        &self,
        out: &mut String,
        dest: &Variable,
        coords: &[Scalar],
        declare: bool,
        cast: bool,
        float: &FloatPrecision,
        pad: &str,
    ) {
        let w = self.writer(float);
        if declare {
            let _ = writeln!(out, "{}{}", pad, self.declare_local(&dest.name, dest.ty, float));
        }
        for (k, c) in coords.iter().enumerate() {
            let text = w.scalar(c);
            let text = if cast { w.cast(&text) } else { text };
            let _ = writeln!(out, "{}{} = {};", pad, self.coordinate(&dest.name, dest.by_ref, k), text);
        }
    }

    pub fn condition(&self, condition: &Condition, float: &FloatPrecision) -> String {
        let w = self.writer(float);
        let lhs = w.operand(&condition.lhs);
        let rhs = w.operand(&condition.rhs);
        match condition.op {
            Comparison::Equal => format!("{} == {}", lhs, rhs),
            Comparison::NotEqual => format!("{} != {}", lhs, rhs),
            Comparison::Less => format!("{} < {}", lhs, rhs),
            Comparison::Greater => format!("{} > {}", lhs, rhs),
            Comparison::AbsGreater => format!("({} < -{}) || ({} > {})", lhs, rhs, lhs, rhs),
        }
    }
}

/// Prefix every non-empty line of `text` with `depth` levels of indentation.
pub fn indent(text: &str, depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    let mut out = String::with_capacity(text.len() + 16);
    for line in text.lines() {
        if !line.is_empty() {
            out.push_str(&pad);
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
