use crate::algebra::{Algebra, ValueType};
use crate::bail_domain;
use crate::error::Result;
use crate::generators::*;
use crate::ir::{Instruction, Variable};
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::sink::Feature;
use crate::specialize::Mode;
use crate::symbolic::{Multivector, ProductKind, Scalar, ScalarFn, SymbolicOp};

/// Local holding the reciprocal norm in specialized `unit` bodies.
const SCALE: &str = "_n";

/// `sqrt(|x|)`, the norm of a value whose reverse norm is `x`.
fn magnitude(x: Scalar) -> Scalar {
    Scalar::call(ScalarFn::Sqrt, Scalar::call(ScalarFn::Abs, x))
}

/// `norm2(a)`, the scalar part of `a * reverse(a)`, and its square root `norm(a)`.
pub struct Norm;

impl OperationGenerator for Norm {
    fn name(&self) -> &'static str {
        "norm"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        matches!(request.name.as_str(), "norm" | "norm2") && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let squared = request.name == "norm2";
        let defaults = general_defaults(cx.algebra(), 1);
        plan_symbolic(cx, request, &defaults, float_scalar, |metric, args| {
            let n2 = compute_op(cx, SymbolicOp::Norm2, metric, args)?.scalar_part();
            Ok(Multivector::scalar(if squared { n2 } else { magnitude(n2) }))
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let metric = cx.metric(request)?;
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let table = bilinear_table(cx, |x, y| {
                Ok(x.product(&y.reverse(), metric, ProductKind::Scalar))
            })?;
            let mut params = generic_params(cx, fp);
            let a = access(cx, &fp.args[0]);
            params.insert("a", a.clone());
            params.insert("b", a);
            bilinear_params(&mut params, fp, &table);
            let w = cx.backend().writer(&fp.float);
            let result = if request.name == "norm2" {
                "r".to_string()
            } else {
                cx.sink().require(Feature::MathLibrary);
                w.scalar(&magnitude(Scalar::var("r")))
            };
            let result = if needs_cast(fp) { w.cast(&result) } else { result };
            params.insert("result", result);
            write_template(cx, request, fp, "bilinearScalar", &params)?;
        }
        Ok(())
    }
}

/// `unit(a)`: `a` divided by its norm.
pub struct Unit;

impl OperationGenerator for Unit {
    fn name(&self) -> &'static str {
        "unit"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        request.name == "unit" && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let defaults = general_defaults(cx.algebra(), 1);
        plan_symbolic(cx, request, &defaults, general_value, |metric, args| {
            let n2 = compute_op(cx, SymbolicOp::Norm2, metric, args)?.scalar_part();
            if n2.is_zero() {
                bail_domain!("unit of a value whose norm is identically zero");
            }
            Ok(args[0].value().scale(&Scalar::var(SCALE)))
        })
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        if plan.mode == Mode::Specialized {
            return Ok(());
        }
        let general = cx.algebra().general.clone();
        for fp in plan.floats.iter_mut() {
            require(cx, fp, "norm", "norm", &[&general], None, &request.metric)?;
        }
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let metric = cx.metric(request)?;
        let backend = cx.backend();
        for fp in &plan.floats {
            let w = backend.writer(&fp.float);
            if plan.mode == Mode::Specialized {
                let n2 = cx
                    .engine()
                    .compute(SymbolicOp::Norm2, &symbolic_values(&fp.args), metric)?
                    .scalar_part();
                let scale = Instruction::Assign {
                    dest: Variable::local(SCALE, ValueType::Scalar),
                    value: Multivector::scalar(Scalar::call(ScalarFn::Inverse, magnitude(n2))),
                    declare: true,
                };
                let value = fp.value.clone().unwrap_or_default();
                write_body(cx, request, fp, vec![scale, Instruction::Return { value, cast: false }])?;
                continue;
            }
            let mut params = generic_params(cx, fp);
            let one = w.literal(1.0);
            let norm = backend.call_expression(fp.dep("norm"), &[pass_arg(cx, &fp.args[0])]);
            params.insert("prelude", format!("{} s = {} / {};", fp.float.name, one, norm));
            params.insert("expr", format!("s * {}c[i]", access(cx, &fp.args[0])));
            write_template(cx, request, fp, "coordinateWise", &params)?;
        }
        Ok(())
    }
}
