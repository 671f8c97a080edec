//! Tolerance-based predicates: `equals`, `zero` and `gradeBitmap`.

use crate::algebra::{Algebra, SCALAR_TYPE};
use crate::error::Result;
use crate::generators::*;
use crate::ir::{Comparison, Condition, Instruction};
use crate::lower::Returns;
use crate::request::{ArgumentBinding, OperationRequest};
use crate::session::Resolver;
use crate::specialize::Mode;
use crate::symbolic::{blade, Multivector, Scalar};

fn name_arguments(request: &mut OperationRequest, names: &[&str]) {
    if request.argument_names.is_empty() {
        request.argument_names = names.iter().map(|n| n.to_string()).collect();
    }
}

fn tolerance(args: &[ArgumentBinding]) -> Scalar {
    match args.last() {
        Some(eps) => Scalar::var(eps.name.clone()),
        None => Scalar::zero(),
    }
}

/// `return false` for every coordinate of `value` outside `[-eps, eps]`, then `return true`.
fn within_tolerance(cx: &Resolver<'_>, value: &Multivector, eps: &Scalar) -> Vec<Instruction> {
    let convention = cx.backend().convention;
    let mut body: Vec<Instruction> = value
        .terms()
        .filter(|(_, c)| !c.is_zero())
        .map(|(_, c)| Instruction::IfElse {
            condition: Condition::new(c.clone(), Comparison::AbsGreater, eps.clone()),
            then_block: vec![Instruction::Verbatim(format!("return {};", convention.false_literal()))],
            else_block: Vec::new(),
        })
        .collect();
    body.push(Instruction::Verbatim(format!("return {};", convention.true_literal())));
    body
}

/// Parameters of the `reduceBool` template over coordinate expression `expr`.
fn reduce_params(cx: &Resolver<'_>, fp: &FloatPlan, expr: String) -> crate::templates::TemplateParams {
    let convention = cx.backend().convention;
    let mut params = generic_params(cx, fp);
    params.insert("expr", expr);
    params.insert("eps", fp.args[fp.args.len() - 1].name.clone());
    params.insert("true", convention.true_literal());
    params.insert("false", convention.false_literal());
    params
}

/// `equals(a, b, eps)`: every coordinate of `a - b` lies within `eps`.
pub struct Equals;

impl OperationGenerator for Equals {
    fn name(&self) -> &'static str {
        "equals"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        let general = algebra.general.as_str();
        request.name == "equals" && typed_arguments(algebra, request, &[general, general, SCALAR_TYPE])
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let general = cx.algebra().general.clone();
        name_arguments(request, &["a", "b", "eps"]);
        plan_fixed(cx, request, &[&general, &general, SCALAR_TYPE], |_, _| Returns::Bool)
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                let difference = fp.args[0].value().sub(&fp.args[1].value());
                let body = within_tolerance(cx, &difference, &tolerance(&fp.args));
                write_body(cx, request, fp, body)?;
                continue;
            }
            let expr = format!("{}c[i] - {}c[i]", access(cx, &fp.args[0]), access(cx, &fp.args[1]));
            let params = reduce_params(cx, fp, expr);
            write_template(cx, request, fp, "reduceBool", &params)?;
        }
        Ok(())
    }
}

/// `zero(a, eps)`: every coordinate of `a` lies within `eps`.
pub struct Zero;

impl OperationGenerator for Zero {
    fn name(&self) -> &'static str {
        "zero"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        request.name == "zero" && typed_arguments(algebra, request, &[algebra.general.as_str(), SCALAR_TYPE])
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let general = cx.algebra().general.clone();
        name_arguments(request, &["a", "eps"]);
        plan_fixed(cx, request, &[&general, SCALAR_TYPE], |_, _| Returns::Bool)
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                let body = within_tolerance(cx, &fp.args[0].value(), &tolerance(&fp.args));
                write_body(cx, request, fp, body)?;
                continue;
            }
            let expr = format!("{}c[i]", access(cx, &fp.args[0]));
            let params = reduce_params(cx, fp, expr);
            write_template(cx, request, fp, "reduceBool", &params)?;
        }
        Ok(())
    }
}

/// `gradeBitmap(a, eps)`: bit `g` is set when some grade `g` coordinate lies outside `eps`.
pub struct GradeBitmap;

impl OperationGenerator for GradeBitmap {
    fn name(&self) -> &'static str {
        "grade-bitmap"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        request.name == "gradeBitmap" && typed_arguments(algebra, request, &[algebra.general.as_str(), SCALAR_TYPE])
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let general = cx.algebra().general.clone();
        name_arguments(request, &["a", "eps"]);
        plan_fixed(cx, request, &[&general, SCALAR_TYPE], |_, _| Returns::Int)
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let backend = cx.backend();
        for fp in &plan.floats {
            let eps = fp.args[fp.args.len() - 1].name.clone();
            if plan.mode == Mode::Specialized {
                let mut lines = vec!["int bm = 0;".to_string()];
                for (bitmap, c) in fp.args[0].value().terms() {
                    if c.is_zero() {
                        continue;
                    }
                    let condition = Condition::new(c.clone(), Comparison::AbsGreater, Scalar::var(eps.clone()));
                    lines.push(format!(
                        "if ({}) bm |= 1 << {};",
                        backend.condition(&condition, &fp.float),
                        blade::grade(bitmap)
                    ));
                }
                lines.push("return bm;".to_string());
                write_lines(cx, request, fp, lines)?;
                continue;
            }
            let grades = (0..cx.algebra().blade_count() as u32).map(|b| blade::grade(b) as usize);
            let mut params = generic_params(cx, fp);
            params.insert("grades", join_indices(grades));
            params.insert("a", access(cx, &fp.args[0]));
            params.insert("eps", eps);
            write_template(cx, request, fp, "gradeBitmap", &params)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::ValueType;

    #[test]
    fn test_tolerance_uses_last_argument() {
        let arg = ArgumentBinding {
            name: "eps".to_string(),
            type_name: "double".to_string(),
            mangled_type: "double".to_string(),
            ty: ValueType::Scalar,
            by_ref: false,
            value: None,
        };
        assert_eq!(tolerance(&[arg]), Scalar::var("eps"));
        assert!(tolerance(&[]).is_zero());
    }
}
