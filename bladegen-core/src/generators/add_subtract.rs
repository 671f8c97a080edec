use crate::algebra::Algebra;
use crate::error::Result;
use crate::generators::*;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::specialize::Mode;
use crate::symbolic::SymbolicOp;

/// `add(a, b)` and `subtract(a, b)`.
pub struct AddSubtract;

fn op_for(name: &str) -> SymbolicOp {
    if name == "subtract" {
        SymbolicOp::Subtract
    } else {
        SymbolicOp::Add
    }
}

impl OperationGenerator for AddSubtract {
    fn name(&self) -> &'static str {
        "add-subtract"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        matches!(request.name.as_str(), "add" | "subtract") && multivector_arguments(algebra, request, 2)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let op = op_for(&request.name);
        let defaults = general_defaults(cx.algebra(), 2);
        plan_symbolic(cx, request, &defaults, general_value, |metric, args| {
            compute_op(cx, op, metric, args)
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let sign = if request.name == "subtract" { "-" } else { "+" };
        for fp in &plan.floats {
            match plan.mode {
                Mode::Specialized => write_closed_form(cx, request, fp)?,
                Mode::General => {
                    let mut params = generic_params(cx, fp);
                    let a = access(cx, &fp.args[0]);
                    let b = access(cx, &fp.args[1]);
                    params.insert("expr", format!("{}c[i] {} {}c[i]", a, sign, b));
                    write_template(cx, request, fp, "coordinateWise", &params)?;
                }
            }
        }
        Ok(())
    }
}
