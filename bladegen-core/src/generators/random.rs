use crate::algebra::{Algebra, ValueType, SCALAR_TYPE};
use crate::error::Result;
use crate::generators::*;
use crate::lower::{Returns, RANDOM_SOURCE};
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::sink::Feature;

fn random_suffix(request: &OperationRequest) -> Option<&str> {
    request.name.strip_prefix("random_").filter(|s| !s.is_empty())
}

/// Name the scale argument unless the request already names it.
fn scale_argument(request: &mut OperationRequest) {
    if request.argument_names.is_empty() {
        request.argument_names.push("scale".to_string());
    }
}

/// `random_<float>()`: a uniform value in `[0, 1)` from the runtime source.
pub struct RandomScalar;

impl OperationGenerator for RandomScalar {
    fn name(&self) -> &'static str {
        "random-scalar"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        match random_suffix(request) {
            Some(suffix) => algebra.float(suffix).is_some() && request.arity() == 0,
            None => false,
        }
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        plan_fixed(cx, request, &[], |float, _| float_scalar(float))
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let sink = cx.sink();
        sink.require(Feature::RandomGenerator);
        sink.require(Feature::WallClock);
        for fp in &plan.floats {
            let call = format!("{}()", RANDOM_SOURCE);
            let value = if fp.float.is_single() {
                cx.backend().writer(&fp.float).cast(&call)
            } else {
                call
            };
            write_lines(cx, request, fp, vec![format!("return {};", value)])?;
        }
        Ok(())
    }

    fn check_test_dependencies(&self, _cx: &Resolver<'_>, _request: &OperationRequest, _plan: &mut Plan) -> Result<()> {
        Ok(())
    }
}

/// `random_<type>(scale)`: every coordinate uniform in `[-scale, scale)`.
pub struct RandomValue;

fn random_type(algebra: &Algebra, request: &OperationRequest) -> Option<ValueType> {
    random_suffix(request)
        .and_then(|suffix| algebra.value_type(suffix))
        .filter(|ty| ty.is_multivector())
}

impl OperationGenerator for RandomValue {
    fn name(&self) -> &'static str {
        "random-value"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        random_type(algebra, request).is_some() && typed_arguments(algebra, request, &[SCALAR_TYPE])
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let ty = random_type(cx.algebra(), request).unwrap_or(ValueType::General);
        scale_argument(request);
        plan_fixed(cx, request, &[SCALAR_TYPE], |_, _| Returns::Value(ty))
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        for fp in plan.floats.iter_mut() {
            let source = format!("random_{}", fp.float.name);
            require(cx, fp, "source", &source, &[], None, &request.metric)?;
        }
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let algebra = cx.algebra();
        for fp in &plan.floats {
            let n = match fp.returns {
                Returns::Value(ValueType::Shape(i)) => algebra.shapes[i].coordinate_count(),
                _ => algebra.blade_count(),
            };
            let mut params = generic_params(cx, fp);
            params.insert("N", n.to_string());
            params.insert("scale", fp.args[0].name.clone());
            params.insert("source", fp.dep("source"));
            write_template(cx, request, fp, "random", &params)?;
        }
        Ok(())
    }

    fn check_test_dependencies(&self, _cx: &Resolver<'_>, _request: &OperationRequest, _plan: &mut Plan) -> Result<()> {
        Ok(())
    }
}

/// `random_versor(scale)` and `random_blade(scale)`: the geometric or outer
/// product of random vectors, one per basis dimension.
pub struct RandomProduct;

fn product_of(request: &OperationRequest) -> Option<&'static str> {
    match random_suffix(request)? {
        "versor" => Some("gp"),
        "blade" => Some("op"),
        _ => None,
    }
}

impl OperationGenerator for RandomProduct {
    fn name(&self) -> &'static str {
        "random-product"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        let declared = random_suffix(request).map_or(false, |s| algebra.value_type(s).is_some());
        product_of(request).is_some() && !declared && typed_arguments(algebra, request, &[SCALAR_TYPE])
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        scale_argument(request);
        plan_fixed(cx, request, &[SCALAR_TYPE], |_, _| Returns::Value(ValueType::General))
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        let general = cx.algebra().general.clone();
        let product = product_of(request).unwrap_or("gp");
        for fp in plan.floats.iter_mut() {
            let source = format!("random_{}", fp.float.name);
            require(cx, fp, "source", &source, &[], None, &request.metric)?;
            require(cx, fp, "product", product, &[&general, &general], None, &request.metric)?;
        }
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let backend = cx.backend();
        let dimension = cx.algebra().dimension();
        for fp in &plan.floats {
            let float = &fp.float;
            let scale = &fp.args[0].name;
            let vector = |name: &str| {
                (0..dimension)
                    .map(|i| {
                        format!(
                            "{}.c[{}] = {} * ({})({} * {}() - {});",
                            name,
                            1usize << i,
                            scale,
                            float.name,
                            float.literal(2.0),
                            fp.dep("source"),
                            float.literal(1.0)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            let mut params = generic_params(cx, fp);
            params.insert("declV", backend.declare_local("v", ValueType::General, float));
            params.insert("declT", backend.declare_local("t", ValueType::General, float));
            params.insert("initR", vector("r"));
            params.insert("setV", vector("v"));
            params.insert(
                "product",
                backend.call_value("t", fp.dep("product"), &[pass_local(cx, "r"), pass_local(cx, "v")]),
            );
            params.insert("dim", dimension.to_string());
            write_template(cx, request, fp, "randomProduct", &params)?;
        }
        Ok(())
    }

    fn check_test_dependencies(&self, _cx: &Resolver<'_>, _request: &OperationRequest, _plan: &mut Plan) -> Result<()> {
        Ok(())
    }
}
