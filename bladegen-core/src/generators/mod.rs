//! Operation generators, one per family of operations.
//!
//! A generator never keeps per-request state. Everything it works out while
//! completing a request goes into the returned [`Plan`], which the session
//! hands back to the later calls.

mod add_subtract;
mod conformal;
mod converter;
mod dual;
mod logarithm;
mod norm;
mod outermorphism;
mod predicates;
mod products;
mod random;
mod series;
mod unary;
mod versor;

#[cfg(test)]
mod generators_tests;

use std::collections::BTreeMap;

pub use add_subtract::AddSubtract;
pub use conformal::{CgaPoint, CgaPointDistance};
pub use converter::Converter;
pub use dual::Dual;
pub use logarithm::Logarithm;
pub use norm::{Norm, Unit};
pub use outermorphism::ApplyOm;
pub use predicates::{Equals, GradeBitmap, Zero};
pub use products::{InverseGeometricProduct, Product};
pub use random::{RandomProduct, RandomScalar, RandomValue};
pub use series::SinCosExp;
pub use unary::{ExtractGrade, Increment, ScaleAddScalar, ToggleSign};
pub use versor::{ApplyVersor, VersorInverse};

use crate::algebra::{Algebra, FloatPrecision, ValueType};
use crate::error::Result;
use crate::ir::Instruction;
use crate::lower::{FunctionDef, Returns};
use crate::request::{ArgumentBinding, OperationRequest};
use crate::session::Resolver;
use crate::specialize::{self, Mode};
use crate::symbolic::{Metric, Multivector, Scalar, SymbolicOp, EIGEN_ROUNDING};
use crate::templates::TemplateParams;
use crate::testgen::{self, TestProgram};

pub trait OperationGenerator: Send + Sync {
    /// Short family name used in logs.
    fn name(&self) -> &'static str;

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool;

    /// Fill in the open parts of `request` and work out how to implement it.
    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan>;

    fn check_dependencies(&self, _cx: &Resolver<'_>, _request: &OperationRequest, _plan: &mut Plan) -> Result<()> {
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()>;

    /// Plan the tests and resolve the helpers they call. Runs once the
    /// function itself is registered.
    fn check_test_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        testgen::plan_tests(cx, request, plan)
    }

    fn write_test_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<Vec<String>> {
        testgen::write_tests(cx, request, plan)
    }
}

/// Family-specific choice of algorithm.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    Direct,
    /// Closed form for an operand whose square is a scalar of the given sign.
    ClosedForm { square_sign: i32 },
    /// Power series accumulated in the given type.
    Series { series_type: ValueType },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatPlan {
    pub float: FloatPrecision,
    /// Set by the session once the request is complete.
    pub function_name: String,
    pub test_name: String,
    pub args: Vec<ArgumentBinding>,
    pub returns: Returns,
    /// What the same operation returns over general arguments.
    pub reference: Returns,
    pub value: Option<Multivector>,
    pub strategy: Strategy,
    /// Output names of helper functions, by role.
    pub deps: BTreeMap<String, String>,
    pub test: Option<TestProgram>,
}

impl FloatPlan {
    pub fn new(float: FloatPrecision, args: Vec<ArgumentBinding>, returns: Returns) -> Self {
        FloatPlan {
            float,
            function_name: String::new(),
            test_name: String::new(),
            args,
            reference: returns.clone(),
            returns,
            value: None,
            strategy: Strategy::Direct,
            deps: BTreeMap::new(),
            test: None,
        }
    }

    pub fn dep(&self, role: &str) -> &str {
        self.deps.get(role).map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub mode: Mode,
    pub floats: Vec<FloatPlan>,
}

/// Argument value types, or `None` if any of them is unknown.
pub(crate) fn argument_types(algebra: &Algebra, request: &OperationRequest, defaults: &[&str]) -> Option<Vec<ValueType>> {
    let n = defaults.len().max(request.arity());
    (0..n)
        .map(|i| {
            let default = defaults.get(i).copied().unwrap_or(algebra.general.as_str());
            request.argument_value_type(algebra, i, default)
        })
        .collect()
}

/// True when the request has `arity` multivector arguments (or leaves them
/// all open), without mixing general and specialized ones.
pub(crate) fn multivector_arguments(algebra: &Algebra, request: &OperationRequest, arity: usize) -> bool {
    typed_arguments(algebra, request, &general_defaults(algebra, arity))
}

/// Like [`multivector_arguments`], with per-position defaults. Positions whose
/// default is a float name must hold scalars.
pub(crate) fn typed_arguments(algebra: &Algebra, request: &OperationRequest, defaults: &[&str]) -> bool {
    if request.arity() != defaults.len() && request.arity() != 0 {
        return false;
    }
    let types = match argument_types(algebra, request, defaults) {
        Some(types) => types,
        None => return false,
    };
    let positions_match = types.iter().zip(defaults).all(|(ty, default)| {
        if algebra.is_float_name(default) {
            *ty == ValueType::Scalar
        } else {
            ty.is_multivector()
        }
    });
    positions_match && specialize::not_mixed(&types)
}

pub(crate) fn general_defaults(algebra: &Algebra, arity: usize) -> Vec<&str> {
    vec![algebra.general.as_str(); arity]
}

pub(crate) fn scalar_returns(request: &OperationRequest, float: &FloatPrecision, algebra: &Algebra) -> Returns {
    match algebra.float(&request.return_type) {
        Some(f) => Returns::Scalar(f.name.clone()),
        None => Returns::Scalar(float.name.clone()),
    }
}

pub(crate) fn returns_for(ty: ValueType, request: &OperationRequest, float: &FloatPrecision, algebra: &Algebra) -> Returns {
    match ty {
        ValueType::Scalar => scalar_returns(request, float, algebra),
        other => Returns::Value(other),
    }
}

pub(crate) fn general_value(_: &FloatPrecision) -> Returns {
    Returns::Value(ValueType::General)
}

pub(crate) fn float_scalar(float: &FloatPrecision) -> Returns {
    Returns::Scalar(float.name.clone())
}

/// Complete a request whose specialized result is computed symbolically.
///
/// `general` gives what the function returns when an argument is of the
/// general type; `compute` gets the metric and the bound arguments.
pub(crate) fn plan_symbolic<G, F>(
    cx: &Resolver<'_>,
    request: &mut OperationRequest,
    defaults: &[&str],
    general: G,
    compute: F,
) -> Result<Plan>
where
    G: Fn(&FloatPrecision) -> Returns,
    F: Fn(&Metric, &[ArgumentBinding]) -> Result<Multivector>,
{
    let algebra = cx.algebra();
    request.complete_arguments(algebra, defaults);
    let metric = cx.metric(request)?;
    let backend = cx.backend();
    let mut floats = Vec::new();
    let mut mode = Mode::General;
    for float in cx.floats(request)? {
        let args = backend.bind_arguments(request, &float)?;
        mode = specialize::classify(&args);
        let reference = general(&float);
        let fp = match mode {
            Mode::General => FloatPlan::new(float, args, reference),
            Mode::Specialized => {
                let value = compute(metric, &args)?;
                let value = if metric.round {
                    cx.engine().round(&value, EIGEN_ROUNDING)
                } else {
                    value
                };
                let ty = specialize::return_type(algebra, request, &value)?;
                let returns = returns_for(ty, request, &float, algebra);
                let mut fp = FloatPlan::new(float, args, returns);
                fp.reference = reference;
                fp.value = Some(value);
                fp
            }
        };
        floats.push(fp);
    }
    fill_return_type(request, &floats, algebra);
    Ok(Plan { mode, floats })
}

/// Complete a request whose result type does not depend on a symbolic value.
pub(crate) fn plan_fixed<R>(
    cx: &Resolver<'_>,
    request: &mut OperationRequest,
    defaults: &[&str],
    returns: R,
) -> Result<Plan>
where
    R: Fn(&FloatPrecision, &[ArgumentBinding]) -> Returns,
{
    let algebra = cx.algebra();
    request.complete_arguments(algebra, defaults);
    cx.metric(request)?;
    let backend = cx.backend();
    let mut floats = Vec::new();
    let mut mode = Mode::Specialized;
    for float in cx.floats(request)? {
        let args = backend.bind_arguments(request, &float)?;
        mode = specialize::classify(&args);
        let r = returns(&float, &args);
        floats.push(FloatPlan::new(float, args, r));
    }
    fill_return_type(request, &floats, algebra);
    Ok(Plan { mode, floats })
}

pub(crate) fn fill_return_type(request: &mut OperationRequest, floats: &[FloatPlan], algebra: &Algebra) {
    if request.has_return_type() {
        return;
    }
    if let Some(fp) = floats.first() {
        request.return_type = match &fp.returns {
            Returns::Scalar(name) => name.clone(),
            Returns::Bool => "bool".to_string(),
            Returns::Int => "int".to_string(),
            Returns::Value(ty) => algebra.type_name(*ty, &fp.float),
        };
    }
}

pub(crate) fn symbolic_values(args: &[ArgumentBinding]) -> Vec<Multivector> {
    args.iter().map(ArgumentBinding::value).collect()
}

/// Compute `op` over the argument values.
pub(crate) fn compute_op(cx: &Resolver<'_>, op: SymbolicOp, metric: &Metric, args: &[ArgumentBinding]) -> Result<Multivector> {
    cx.engine().compute(op, &symbolic_values(args), metric)
}

pub(crate) fn write_body(cx: &Resolver<'_>, request: &OperationRequest, fp: &FloatPlan, body: Vec<Instruction>) -> Result<()> {
    let def = FunctionDef {
        name: fp.function_name.clone(),
        comment: request.comment.clone(),
        returns: fp.returns.clone(),
        args: &fp.args,
        body,
        float: &fp.float,
    };
    cx.backend().write_function(cx.sink(), &def)
}

/// Write the symbolic value of a specialized precision as a single return.
pub(crate) fn write_closed_form(cx: &Resolver<'_>, request: &OperationRequest, fp: &FloatPlan) -> Result<()> {
    let value = fp.value.clone().unwrap_or_default();
    write_body(cx, request, fp, vec![Instruction::Return { value, cast: needs_cast(fp) }])
}

/// The declared scalar return type differs from the computing precision.
pub(crate) fn needs_cast(fp: &FloatPlan) -> bool {
    matches!(&fp.returns, Returns::Scalar(name) if *name != fp.float.name)
}

pub(crate) fn write_template(
    cx: &Resolver<'_>,
    request: &OperationRequest,
    fp: &FloatPlan,
    template: &str,
    params: &TemplateParams,
) -> Result<()> {
    let text = cx.render(template, params)?;
    write_body(cx, request, fp, vec![Instruction::Verbatim(text)])
}

pub(crate) fn write_lines(cx: &Resolver<'_>, request: &OperationRequest, fp: &FloatPlan, lines: Vec<String>) -> Result<()> {
    write_body(cx, request, fp, vec![Instruction::Verbatim(lines.join("\n"))])
}

/// Parameters shared by the generic templates.
pub(crate) fn generic_params(cx: &Resolver<'_>, fp: &FloatPlan) -> TemplateParams {
    let backend = cx.backend();
    let w = backend.writer(&fp.float);
    let mut params = TemplateParams::new()
        .set("F", fp.float.name.clone())
        .set("N", cx.algebra().blade_count().to_string())
        .set("zero", w.literal(0.0))
        .set("prelude", "")
        .set("post", "");
    if let Returns::Value(ty) = fp.returns {
        params.insert("T", backend.type_text(ty, &fp.float));
        params.insert("declR", backend.declare_local("r", ty, &fp.float));
        params.insert("ret", backend.return_local("r"));
    }
    params
}

/// Prefix for reading an argument's coordinates, `a->` or `a.`.
pub(crate) fn access(cx: &Resolver<'_>, arg: &ArgumentBinding) -> String {
    format!("{}{}", arg.name, cx.backend().member(arg.by_ref))
}

/// Text passing argument `arg` on to a helper declared with default passing flags.
pub(crate) fn pass_arg(cx: &Resolver<'_>, arg: &ArgumentBinding) -> String {
    if arg.ty == ValueType::Scalar {
        return arg.name.clone();
    }
    let by_ref = cx.algebra().convention.passes_by_address();
    cx.backend().argument(&arg.name, arg.by_ref, by_ref)
}

/// Text passing a local multivector to a helper declared with default passing flags.
pub(crate) fn pass_local(cx: &Resolver<'_>, name: &str) -> String {
    let by_ref = cx.algebra().convention.passes_by_address();
    cx.backend().argument(name, false, by_ref)
}

pub(crate) fn blade_value(bitmap: u32) -> Multivector {
    Multivector::blade(bitmap, Scalar::constant(1.0))
}

/// Non-zero entries `(i, j, k, s)` of `f(e_i, e_j) = s * e_k` over all blades.
pub(crate) fn bilinear_table<F>(cx: &Resolver<'_>, f: F) -> Result<Vec<(usize, usize, usize, f64)>>
where
    F: Fn(&Multivector, &Multivector) -> Result<Multivector>,
{
    let n = cx.algebra().blade_count() as u32;
    let mut table = Vec::new();
    for i in 0..n {
        for j in 0..n {
            let value = f(&blade_value(i), &blade_value(j))?;
            for (k, c) in value.terms() {
                if let Some(s) = c.as_constant().filter(|s| *s != 0.0) {
                    table.push((i as usize, j as usize, k as usize, s));
                }
            }
        }
    }
    Ok(table)
}

/// Non-zero entries `(i, k, s)` of `f(e_i) = s * e_k` over all blades.
pub(crate) fn linear_table<F>(cx: &Resolver<'_>, f: F) -> Result<Vec<(usize, usize, f64)>>
where
    F: Fn(&Multivector) -> Result<Multivector>,
{
    let n = cx.algebra().blade_count() as u32;
    let mut table = Vec::new();
    for i in 0..n {
        let value = f(&blade_value(i))?;
        for (k, c) in value.terms() {
            if let Some(s) = c.as_constant().filter(|s| *s != 0.0) {
                table.push((i as usize, k as usize, s));
            }
        }
    }
    Ok(table)
}

/// Comma-separated list, or a single `0` so that array initializers stay valid.
pub(crate) fn join_indices(values: impl Iterator<Item = usize>) -> String {
    let text = values.map(|v| v.to_string()).collect::<Vec<_>>().join(", ");
    if text.is_empty() {
        "0".to_string()
    } else {
        text
    }
}

pub(crate) fn join_literals(fp: &FloatPrecision, values: impl Iterator<Item = f64>) -> String {
    let text = values.map(|v| fp.literal(v)).collect::<Vec<_>>().join(", ");
    if text.is_empty() {
        fp.literal(0.0)
    } else {
        text
    }
}

/// Fill the table parameters of the `bilinear` and `bilinearScalar` templates.
pub(crate) fn bilinear_params(params: &mut TemplateParams, fp: &FloatPlan, table: &[(usize, usize, usize, f64)]) {
    params.insert("NT", table.len().to_string());
    params.insert("ti", join_indices(table.iter().map(|e| e.0)));
    params.insert("tj", join_indices(table.iter().map(|e| e.1)));
    params.insert("tk", join_indices(table.iter().map(|e| e.2)));
    params.insert("ts", join_literals(&fp.float, table.iter().map(|e| e.3)));
}

pub(crate) fn linear_params(params: &mut TemplateParams, fp: &FloatPlan, table: &[(usize, usize, f64)]) {
    params.insert("NT", table.len().to_string());
    params.insert("ti", join_indices(table.iter().map(|e| e.0)));
    params.insert("tk", join_indices(table.iter().map(|e| e.1)));
    params.insert("ts", join_literals(&fp.float, table.iter().map(|e| e.2)));
}

/// Resolve a helper for the precision of `fp` and record it under `role`.
pub(crate) fn require(
    cx: &Resolver<'_>,
    fp: &mut FloatPlan,
    role: &str,
    name: &str,
    argument_types: &[&str],
    forced_return: Option<&str>,
    metric: &str,
) -> Result<String> {
    let types: Vec<String> = argument_types.iter().map(|t| t.to_string()).collect();
    let output = cx.resolve(name, &types, forced_return, &fp.float, metric)?;
    fp.deps.insert(role.to_string(), output.clone());
    Ok(output)
}
