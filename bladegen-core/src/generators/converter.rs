use crate::algebra::{Algebra, ValueType};
use crate::bail_domain;
use crate::error::Result;
use crate::generators::*;
use crate::lower::Returns;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::specialize::{self, Mode};

/// `_T(a)`: copy the coordinates `T` can hold, dropping the rest.
pub struct Converter;

fn target(algebra: &Algebra, request: &OperationRequest) -> Option<ValueType> {
    if !request.is_converter() {
        return None;
    }
    algebra
        .value_type(&request.name[1..])
        .filter(|ty| *ty != ValueType::Outermorphism)
}

impl OperationGenerator for Converter {
    fn name(&self) -> &'static str {
        "converter"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        target(algebra, request).is_some() && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let algebra = cx.algebra();
        let ty = match target(algebra, request) {
            Some(ty) => ty,
            None => bail_domain!("'{}' does not name a type to convert to", request.name),
        };
        request.complete_arguments(algebra, &general_defaults(algebra, 1));
        cx.metric(request)?;
        let backend = cx.backend();
        let mut floats = Vec::new();
        for float in cx.floats(request)? {
            let args = backend.bind_arguments(request, &float)?;
            let value = args[0].value();
            let mut fp = FloatPlan::new(float, args, Returns::Value(ValueType::General));
            fp.returns = returns_for(ty, request, &fp.float, algebra);
            fp.reference = fp.returns.clone();
            fp.value = Some(value);
            floats.push(fp);
        }
        fill_return_type(request, &floats, algebra);
        let mode = floats
            .first()
            .map_or(Mode::Specialized, |fp| specialize::classify(&fp.args));
        Ok(Plan { mode, floats })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        for fp in &plan.floats {
            write_closed_form(cx, request, fp)?;
        }
        Ok(())
    }

    fn check_test_dependencies(&self, _cx: &Resolver<'_>, _request: &OperationRequest, _plan: &mut Plan) -> Result<()> {
        Ok(())
    }
}
