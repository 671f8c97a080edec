use crate::algebra::{Algebra, ValueType};
use crate::error::Result;
use crate::generators::*;
use crate::lower::Returns;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::specialize::Mode;
use crate::symbolic::{ProductKind, SymbolicOp};

/// The bilinear products: `gp`, `op`, `lc`, `rc`, `hip`, `mhip` and `sp`.
pub struct Product;

pub(crate) fn product_kind(name: &str) -> Option<ProductKind> {
    Some(match name {
        "gp" => ProductKind::Geometric,
        "op" => ProductKind::Outer,
        "lc" => ProductKind::LeftContraction,
        "rc" => ProductKind::RightContraction,
        "hip" => ProductKind::Hestenes,
        "mhip" => ProductKind::ModifiedHestenes,
        "sp" => ProductKind::Scalar,
        _ => return None,
    })
}

impl OperationGenerator for Product {
    fn name(&self) -> &'static str {
        "product"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        product_kind(&request.name).is_some() && multivector_arguments(algebra, request, 2)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let kind = product_kind(&request.name).unwrap_or(ProductKind::Geometric);
        let defaults = general_defaults(cx.algebra(), 2);
        let general = move |float: &crate::algebra::FloatPrecision| {
            if kind == ProductKind::Scalar {
                float_scalar(float)
            } else {
                general_value(float)
            }
        };
        plan_symbolic(cx, request, &defaults, general, |metric, args| {
            compute_op(cx, SymbolicOp::Product(kind), metric, args)
        })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let kind = product_kind(&request.name).unwrap_or(ProductKind::Geometric);
        let metric = cx.metric(request)?;
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let table = bilinear_table(cx, |x, y| {
                cx.engine().compute(SymbolicOp::Product(kind), &[x.clone(), y.clone()], metric)
            })?;
            let mut params = generic_params(cx, fp);
            params.insert("a", access(cx, &fp.args[0]));
            params.insert("b", access(cx, &fp.args[1]));
            bilinear_params(&mut params, fp, &table);
            match fp.returns {
                Returns::Value(_) => write_template(cx, request, fp, "bilinear", &params)?,
                _ => {
                    params.insert("result", "r");
                    write_template(cx, request, fp, "bilinearScalar", &params)?;
                }
            }
        }
        Ok(())
    }
}

/// `igp(a, b)`: `a` times the versor inverse of `b`.
pub struct InverseGeometricProduct;

impl OperationGenerator for InverseGeometricProduct {
    fn name(&self) -> &'static str {
        "inverse-geometric-product"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        request.name == "igp" && multivector_arguments(algebra, request, 2)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let defaults = general_defaults(cx.algebra(), 2);
        plan_symbolic(cx, request, &defaults, general_value, |metric, args| {
            let values = symbolic_values(args);
            let engine = cx.engine();
            let inverse = engine.compute(SymbolicOp::VersorInverse, &values[1..], metric)?;
            engine.compute(
                SymbolicOp::Product(ProductKind::Geometric),
                &[values[0].clone(), inverse],
                metric,
            )
        })
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        if plan.mode == Mode::Specialized {
            return Ok(());
        }
        let general = cx.algebra().general.clone();
        for fp in plan.floats.iter_mut() {
            require(cx, fp, "inverse", "versorInverse", &[&general], None, &request.metric)?;
            require(cx, fp, "gp", "gp", &[&general, &general], None, &request.metric)?;
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
            let lines = vec![
                backend.declare_local("bi", ValueType::General, &fp.float),
                backend.declare_local("r", ValueType::General, &fp.float),
                backend.call_value("bi", fp.dep("inverse"), &[pass_arg(cx, &fp.args[1])]),
                backend.call_value("r", fp.dep("gp"), &[pass_arg(cx, &fp.args[0]), pass_local(cx, "bi")]),
                backend.return_local("r"),
            ];
            write_lines(cx, request, fp, lines)?;
        }
        Ok(())
    }
}
