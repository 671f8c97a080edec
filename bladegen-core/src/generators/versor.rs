use crate::algebra::{Algebra, ValueType};
use crate::error::Result;
use crate::generators::*;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::specialize::Mode;
use crate::symbolic::{ProductKind, SymbolicOp};

/// `versorInverse(a)`: `reverse(a) / norm2(a)`.
pub struct VersorInverse;

impl OperationGenerator for VersorInverse {
    fn name(&self) -> &'static str {
        "versor-inverse"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        request.name == "versorInverse" && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let defaults = general_defaults(cx.algebra(), 1);
        plan_symbolic(cx, request, &defaults, general_value, |metric, args| {
            compute_op(cx, SymbolicOp::VersorInverse, metric, args)
        })
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        if plan.mode == Mode::Specialized {
            return Ok(());
        }
        let general = cx.algebra().general.clone();
        for fp in plan.floats.iter_mut() {
            require(cx, fp, "reverse", "reverse", &[&general], None, &request.metric)?;
            require(cx, fp, "norm2", "norm2", &[&general], None, &request.metric)?;
        }
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let backend = cx.backend();
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let a = pass_arg(cx, &fp.args[0]);
            let one = backend.writer(&fp.float).literal(1.0);
            let prelude = [
                backend.declare_local("ra", ValueType::General, &fp.float),
                backend.call_value("ra", fp.dep("reverse"), &[a.clone()]),
                format!(
                    "{} s = {} / {};",
                    fp.float.name,
                    one,
                    backend.call_expression(fp.dep("norm2"), &[a])
                ),
            ];
            let mut params = generic_params(cx, fp);
            params.insert("prelude", prelude.join("\n"));
            params.insert("expr", "s * ra.c[i]");
            write_template(cx, request, fp, "coordinateWise", &params)?;
        }
        Ok(())
    }
}

/// `applyVersor(v, x)`, `applyUnitVersor(v, x)` and `applyVersorWI(v, x, w)`,
/// which compute `v x inverse(v)`, `v x reverse(v)` and `v x w`.
pub struct ApplyVersor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Inverse,
    Unit,
    GivenInverse,
}

fn variant(name: &str) -> Option<Variant> {
    match name {
        "applyVersor" => Some(Variant::Inverse),
        "applyUnitVersor" => Some(Variant::Unit),
        "applyVersorWI" => Some(Variant::GivenInverse),
        _ => None,
    }
}

fn arity(variant: Variant) -> usize {
    if variant == Variant::GivenInverse {
        3
    } else {
        2
    }
}

impl OperationGenerator for ApplyVersor {
    fn name(&self) -> &'static str {
        "apply-versor"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        match variant(&request.name) {
            Some(v) => multivector_arguments(algebra, request, arity(v)),
            None => false,
        }
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let v = variant(&request.name).unwrap_or(Variant::Inverse);
        let defaults = general_defaults(cx.algebra(), arity(v));
        plan_symbolic(cx, request, &defaults, general_value, |metric, args| {
            let engine = cx.engine();
            let values = symbolic_values(args);
            let inverse = match v {
                Variant::Inverse => engine.compute(SymbolicOp::VersorInverse, &values[..1], metric)?,
                Variant::Unit => engine.compute(SymbolicOp::Reverse, &values[..1], metric)?,
                Variant::GivenInverse => values[2].clone(),
            };
            let gp = SymbolicOp::Product(ProductKind::Geometric);
            let vx = engine.compute(gp, &values[..2], metric)?;
            engine.compute(gp, &[vx, inverse], metric)
        })
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        if plan.mode == Mode::Specialized {
            return Ok(());
        }
        let general = cx.algebra().general.clone();
        let v = variant(&request.name).unwrap_or(Variant::Inverse);
        for fp in plan.floats.iter_mut() {
            require(cx, fp, "gp", "gp", &[&general, &general], None, &request.metric)?;
            match v {
                Variant::Inverse => {
                    require(cx, fp, "inverse", "versorInverse", &[&general], None, &request.metric)?;
                }
                Variant::Unit => {
                    require(cx, fp, "inverse", "reverse", &[&general], None, &request.metric)?;
                }
                Variant::GivenInverse => {}
            }
        }
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let backend = cx.backend();
        let v = variant(&request.name).unwrap_or(Variant::Inverse);
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let float = &fp.float;
            let versor = pass_arg(cx, &fp.args[0]);
            let mut lines = vec![
                backend.declare_local("vx", ValueType::General, float),
                backend.declare_local("r", ValueType::General, float),
            ];
            let inverse = if v == Variant::GivenInverse {
                pass_arg(cx, &fp.args[2])
            } else {
                lines.push(backend.declare_local("vi", ValueType::General, float));
                lines.push(backend.call_value("vi", fp.dep("inverse"), &[versor.clone()]));
                pass_local(cx, "vi")
            };
            lines.push(backend.call_value("vx", fp.dep("gp"), &[versor, pass_arg(cx, &fp.args[1])]));
            lines.push(backend.call_value("r", fp.dep("gp"), &[pass_local(cx, "vx"), inverse]));
            lines.push(backend.return_local("r"));
            write_lines(cx, request, fp, lines)?;
        }
        Ok(())
    }
}
