use crate::algebra::{Algebra, ValueType};
use crate::bail_domain;
use crate::error::Result;
use crate::generators::*;
use crate::request::{ArgumentBinding, OperationRequest};
use crate::session::Resolver;
use crate::specialize::Mode;
use crate::symbolic::{blade, Multivector, Scalar};

/// `applyOM(m, a)`: apply an outermorphism stored as one matrix per grade.
///
/// Matrix `m<g>` maps the grade `g` blades, in bitmap order, to themselves;
/// entry `(i, j)` sits at `m<g>[i * k + j]` with `k` the number of such blades.
/// The scalar part is copied.
pub struct ApplyOm;

fn outermorphism_value(dimension: usize, om: &str, a: &Multivector) -> Multivector {
    let mut value = Multivector::scalar(a.scalar_part());
    for g in 1..=dimension as u32 {
        let blades = blade::blades_of_grade(dimension, g);
        let k = blades.len();
        for (i, target) in blades.iter().enumerate() {
            let mut c = Scalar::zero();
            for (j, source) in blades.iter().enumerate() {
                let entry = Scalar::var(format!("{}m{}[{}]", om, g, i * k + j));
                c = c.add(&entry.mul(&a.coefficient(*source)));
            }
            value.add_term(*target, c);
        }
    }
    value
}

fn om_access(cx: &Resolver<'_>, arg: &ArgumentBinding) -> String {
    format!("{}{}", arg.name, cx.backend().member(arg.by_ref))
}

impl OperationGenerator for ApplyOm {
    fn name(&self) -> &'static str {
        "apply-om"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        if request.name != "applyOM" || !(request.arity() == 0 || request.arity() == 2) {
            return false;
        }
        let om = match &algebra.outermorphism {
            Some(om) => om.as_str(),
            None => return true,
        };
        let first = request.argument_value_type(algebra, 0, om);
        let second = request.argument_value_type(algebra, 1, &algebra.general);
        first == Some(ValueType::Outermorphism) && second.map_or(false, ValueType::is_multivector)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let algebra = cx.algebra();
        let om = match &algebra.outermorphism {
            Some(om) => om.clone(),
            None => bail_domain!("applyOM needs an outermorphism type in the algebra description"),
        };
        if request.argument_names.is_empty() {
            request.argument_names = vec!["m".to_string(), "a".to_string()];
        }
        let general = algebra.general.clone();
        let dimension = algebra.dimension();
        plan_symbolic(cx, request, &[&om, &general], general_value, |_, args| {
            Ok(outermorphism_value(dimension, &om_access(cx, &args[0]), &args[1].value()))
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let dimension = cx.algebra().dimension();
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let om = om_access(cx, &fp.args[0]);
            let a = access(cx, &fp.args[1]);
            let mut grades = Vec::with_capacity(dimension);
            for g in 1..=dimension as u32 {
                let blades = blade::blades_of_grade(dimension, g);
                let block = crate::templates::TemplateParams::new()
                    .set("g", g.to_string())
                    .set("k", blades.len().to_string())
                    .set("idx", join_indices(blades.iter().map(|b| *b as usize)))
                    .set("om", om.clone())
                    .set("a", a.clone());
                grades.push(cx.render("omGrade", &block)?);
            }
            let mut params = generic_params(cx, fp);
            params.insert("a", a);
            params.insert("grades", grades.concat());
            write_template(cx, request, fp, "applyOM", &params)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_entries_select_coordinates() {
        let a = Multivector::blade(1, Scalar::var("x")).add(&Multivector::blade(2, Scalar::var("y")));
        let value = outermorphism_value(2, "m.", &a);
        // Grade 1 has blades e1 and e2, so e1 picks up m1[0]*x + m1[1]*y.
        let e1 = value.coefficient(1);
        assert_eq!(e1.len(), 2);
        assert!(value.coefficient(3).is_zero());
        assert!(value.scalar_part().is_zero());
    }
}
