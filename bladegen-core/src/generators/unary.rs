use crate::algebra::{Algebra, SCALAR_TYPE};
use crate::error::Result;
use crate::generators::*;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::specialize::Mode;
use crate::symbolic::{blade, Multivector, Scalar, SymbolicOp};

/// `extractGrade<digits>(a)`, e.g. `extractGrade2` or `extractGrade02`.
pub struct ExtractGrade;

fn extracted_grades(name: &str) -> Option<Vec<u32>> {
    let digits = name.strip_prefix("extractGrade")?;
    if digits.is_empty() {
        return None;
    }
    digits.chars().map(|c| c.to_digit(10)).collect()
}

fn grade_selection(value: &Multivector, grades: &[u32]) -> Multivector {
    let mut out = Multivector::zero();
    for (bitmap, c) in value.terms() {
        if grades.contains(&blade::grade(bitmap)) {
            out.add_term(bitmap, c.clone());
        }
    }
    out
}

impl OperationGenerator for ExtractGrade {
    fn name(&self) -> &'static str {
        "extract-grade"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        match extracted_grades(&request.name) {
            Some(grades) => {
                grades.iter().all(|g| *g as usize <= algebra.dimension()) && multivector_arguments(algebra, request, 1)
            }
            None => false,
        }
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let grades = extracted_grades(&request.name).unwrap_or_default();
        let defaults = general_defaults(cx.algebra(), 1);
        plan_symbolic(cx, request, &defaults, general_value, |_, args| {
            Ok(grade_selection(&args[0].value(), &grades))
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let grades = extracted_grades(&request.name).unwrap_or_default();
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let table = linear_table(cx, |x| Ok(grade_selection(x, &grades)))?;
            let mut params = generic_params(cx, fp);
            params.insert("a", access(cx, &fp.args[0]));
            linear_params(&mut params, fp, &table);
            write_template(cx, request, fp, "linear", &params)?;
        }
        Ok(())
    }
}

/// Sign flips per grade: `negate`, `reverse`, `cliffordConjugate` and `gradeInvolution`.
pub struct ToggleSign;

fn toggle_op(name: &str) -> Option<SymbolicOp> {
    Some(match name {
        "negate" => SymbolicOp::Negate,
        "reverse" => SymbolicOp::Reverse,
        "cliffordConjugate" => SymbolicOp::CliffordConjugate,
        "gradeInvolution" => SymbolicOp::GradeInvolution,
        _ => return None,
    })
}

impl OperationGenerator for ToggleSign {
    fn name(&self) -> &'static str {
        "toggle-sign"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        toggle_op(&request.name).is_some() && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let op = toggle_op(&request.name).unwrap_or(SymbolicOp::Negate);
        let defaults = general_defaults(cx.algebra(), 1);
        plan_symbolic(cx, request, &defaults, general_value, |metric, args| {
            compute_op(cx, op, metric, args)
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let op = toggle_op(&request.name).unwrap_or(SymbolicOp::Negate);
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

/// `increment(a)` and `decrement(a)`: add or subtract one from the scalar part.
pub struct Increment;

fn step(name: &str) -> Option<f64> {
    match name {
        "increment" => Some(1.0),
        "decrement" => Some(-1.0),
        _ => None,
    }
}

impl OperationGenerator for Increment {
    fn name(&self) -> &'static str {
        "increment"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        step(&request.name).is_some() && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let delta = step(&request.name).unwrap_or(1.0);
        let defaults = general_defaults(cx.algebra(), 1);
        plan_symbolic(cx, request, &defaults, general_value, |_, args| {
            Ok(args[0].value().add(&Multivector::constant(delta)))
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let delta = step(&request.name).unwrap_or(1.0);
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let w = cx.backend().writer(&fp.float);
            let op = if delta > 0.0 { "+" } else { "-" };
            let mut params = generic_params(cx, fp);
            params.insert("expr", format!("{}c[i]", access(cx, &fp.args[0])));
            params.insert("post", format!("r.c[0] = r.c[0] {} {};", op, w.literal(1.0)));
            write_template(cx, request, fp, "coordinateWise", &params)?;
        }
        Ok(())
    }
}

/// `sas(a, s, b)`: `s * a + b`, with `s` and `b` scalars.
pub struct ScaleAddScalar;

impl OperationGenerator for ScaleAddScalar {
    fn name(&self) -> &'static str {
        "scale-add-scalar"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        request.name == "sas" && typed_arguments(algebra, request, &[algebra.general.as_str(), SCALAR_TYPE, SCALAR_TYPE])
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let general = cx.algebra().general.clone();
        if request.argument_names.is_empty() {
            request.argument_names = vec!["a".to_string(), "s".to_string(), "b".to_string()];
        }
        plan_symbolic(cx, request, &[&general, SCALAR_TYPE, SCALAR_TYPE], general_value, |_, args| {
            let scale: Scalar = args[1].value().scalar_part();
            let offset = args[2].value();
            Ok(args[0].value().scale(&scale).add(&offset))
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let mut params = generic_params(cx, fp);
            params.insert("expr", format!("{} * {}c[i]", fp.args[1].name, access(cx, &fp.args[0])));
            params.insert("post", format!("r.c[0] = r.c[0] + {};", fp.args[2].name));
            write_template(cx, request, fp, "coordinateWise", &params)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracted_grades() {
        assert_eq!(extracted_grades("extractGrade2"), Some(vec![2]));
        assert_eq!(extracted_grades("extractGrade02"), Some(vec![0, 2]));
        assert_eq!(extracted_grades("extractGrade"), None);
        assert_eq!(extracted_grades("extractGradeX"), None);
    }

    #[test]
    fn test_grade_selection() {
        let value = Multivector::constant(2.0)
            .add(&Multivector::blade(1, Scalar::var("x")))
            .add(&Multivector::blade(3, Scalar::var("y")));
        assert_eq!(grade_selection(&value, &[0, 2]).support(), vec![0, 3]);
        assert!(grade_selection(&value, &[3]).is_zero());
    }
}
