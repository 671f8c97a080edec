use crate::algebra::Algebra;
use crate::bail_domain;
use crate::error::Result;
use crate::generators::*;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::specialize::Mode;
use crate::symbolic::SymbolicOp;

/// `dual(a)` and `undual(a)` through the pseudoscalar of the metric.
pub struct Dual;

fn op_for(name: &str) -> SymbolicOp {
    if name == "undual" {
        SymbolicOp::Undual
    } else {
        SymbolicOp::Dual
    }
}

impl OperationGenerator for Dual {
    fn name(&self) -> &'static str {
        "dual"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        matches!(request.name.as_str(), "dual" | "undual") && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let metric = cx.metric(request)?;
        if metric.is_degenerate() {
            bail_domain!("{} needs an invertible pseudoscalar, but metric '{}' is degenerate", request.name, metric.name);
        }
        let op = op_for(&request.name);
        let defaults = general_defaults(cx.algebra(), 1);
        plan_symbolic(cx, request, &defaults, general_value, |metric, args| {
            compute_op(cx, op, metric, args)
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let op = op_for(&request.name);
        let metric = cx.metric(request)?;
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let table = linear_table(cx, |x| cx.engine().compute(op, &[x.clone()], metric))?;
            let mut params = generic_params(cx, fp);
            params.insert("a", access(cx, &fp.args[0]));
            linear_params(&mut params, fp, &table);
            write_template(cx, request, fp, "linear", &params)?;
        }
        Ok(())
    }
}
