//! `exp`, `sin`, `cos`, `sinh` and `cosh`.
//!
//! When the operand squares to a scalar of known sign the result has a closed
//! form in terms of `alpha = sqrt(|a * a|)`. Otherwise the function sums a
//! truncated power series through generated helpers.

use std::collections::BTreeSet;

use log::warn;

use crate::algebra::{Algebra, ValueType};
use crate::bail_domain;
use crate::error::Result;
use crate::generators::*;
use crate::ir::{Comparison, Condition, Instruction, Variable};
use crate::lower::Returns;
use crate::request::{ArgumentBinding, OperationRequest};
use crate::session::Resolver;
use crate::specialize::{self, Mode};
use crate::symbolic::{Metric, Multivector, ProductKind, Scalar, ScalarFn};

pub const SERIES_ORDER: usize = 32;

const ALPHA: &str = "_alpha";
const MUL: &str = "_mul";

pub struct SinCosExp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Exp,
    Sin,
    Cos,
    Sinh,
    Cosh,
}

impl Function {
    fn parse(name: &str) -> Option<Function> {
        Some(match name {
            "exp" => Function::Exp,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "sinh" => Function::Sinh,
            "cosh" => Function::Cosh,
            _ => return None,
        })
    }

    /// Scalar functions of `alpha` multiplying `1` and `a / alpha` in the closed form.
    fn closed_form(self, square_sign: i32) -> (Option<ScalarFn>, Option<ScalarFn>) {
        let negative = square_sign < 0;
        match (self, negative) {
            (Function::Exp, true) => (Some(ScalarFn::Cos), Some(ScalarFn::Sin)),
            (Function::Exp, false) => (Some(ScalarFn::Cosh), Some(ScalarFn::Sinh)),
            (Function::Sin, true) => (None, Some(ScalarFn::Sinh)),
            (Function::Sin, false) => (None, Some(ScalarFn::Sin)),
            (Function::Cos, true) => (Some(ScalarFn::Cosh), None),
            (Function::Cos, false) => (Some(ScalarFn::Cos), None),
            (Function::Sinh, true) => (None, Some(ScalarFn::Sin)),
            (Function::Sinh, false) => (None, Some(ScalarFn::Sinh)),
            (Function::Cosh, true) => (Some(ScalarFn::Cos), None),
            (Function::Cosh, false) => (Some(ScalarFn::Cosh), None),
        }
    }

    /// Series terms of odd or even order only.
    fn parity(self) -> Option<usize> {
        match self {
            Function::Exp => None,
            Function::Sin | Function::Sinh => Some(1),
            Function::Cos | Function::Cosh => Some(0),
        }
    }

    fn alternates(self) -> bool {
        matches!(self, Function::Sin | Function::Cos)
    }
}

fn function_of(request: &OperationRequest) -> Function {
    Function::parse(&request.name).unwrap_or(Function::Exp)
}

fn square_option(request: &OperationRequest) -> Result<Option<i32>> {
    match request.option("square") {
        None => Ok(None),
        Some("positive") | Some("+") | Some("1") => Ok(Some(1)),
        Some("negative") | Some("-") | Some("-1") => Ok(Some(-1)),
        Some("zero") | Some("0") => Ok(Some(0)),
        Some(other) => bail_domain!("option square must be positive, negative or zero, got '{}'", other),
    }
}

fn series_order(request: &OperationRequest) -> Result<usize> {
    match request.option("order") {
        None => Ok(SERIES_ORDER),
        Some(text) => match text.parse::<usize>() {
            Ok(order) if order >= 2 => Ok(order),
            _ => bail_domain!("option order must be an integer of at least 2, got '{}'", text),
        },
    }
}

fn alpha_squared(a: &Multivector, metric: &Metric) -> Scalar {
    a.product(a, metric, ProductKind::Geometric).scalar_part()
}

/// Closed-form value in terms of the locals `_alpha` and `_mul`.
fn closed_form_value(f: Function, square_sign: i32, a: &Multivector) -> Multivector {
    if square_sign == 0 {
        let even = if f.parity() == Some(1) {
            Multivector::zero()
        } else {
            Multivector::constant(1.0)
        };
        let odd = if f.parity() == Some(0) { Multivector::zero() } else { a.clone() };
        return even.add(&odd);
    }
    let (even, odd) = f.closed_form(square_sign);
    let mut value = Multivector::zero();
    if let Some(e) = even {
        value = value.add(&Multivector::scalar(Scalar::call(e, Scalar::var(ALPHA))));
    }
    if odd.is_some() {
        value = value.add(&a.scale(&Scalar::var(MUL)));
    }
    value
}

/// Blades reachable from the scalar by repeated multiplication with `a`.
fn series_support(a: &Multivector, metric: &Metric) -> Multivector {
    let factors = a.support();
    let mut reached: BTreeSet<u32> = factors.iter().copied().collect();
    reached.insert(0);
    loop {
        let mut next = reached.clone();
        for s in &reached {
            for t in &factors {
                let p = blade_value(*s).product(&blade_value(*t), metric, ProductKind::Geometric);
                next.extend(p.support());
            }
        }
        if next.len() == reached.len() {
            break;
        }
        reached = next;
    }
    let mut support = Multivector::zero();
    for b in reached {
        support.add_term(b, Scalar::var(format!("s{}", b)));
    }
    support
}

/// The type the series is summed in: the requested one, else the tightest shape, else general.
fn series_type(algebra: &Algebra, request: &OperationRequest, arg: &ArgumentBinding, metric: &Metric) -> Result<ValueType> {
    if arg.ty == ValueType::General {
        return Ok(ValueType::General);
    }
    let support = series_support(&arg.value(), metric);
    if request.has_return_type() {
        return specialize::return_type(algebra, request, &support);
    }
    Ok(match specialize::find_tightest_type(algebra, &support) {
        Some(ValueType::Shape(i)) => ValueType::Shape(i),
        _ => ValueType::General,
    })
}

impl OperationGenerator for SinCosExp {
    fn name(&self) -> &'static str {
        "sin-cos-exp"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        Function::parse(&request.name).is_some() && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let f = function_of(request);
        let algebra = cx.algebra();
        request.complete_arguments(algebra, &general_defaults(algebra, 1));
        let metric = cx.metric(request)?;
        let forced_sign = square_option(request)?;
        series_order(request)?;
        let backend = cx.backend();

        let mut floats = Vec::new();
        let mut mode = Mode::General;
        for float in cx.floats(request)? {
            let args = backend.bind_arguments(request, &float)?;
            mode = specialize::classify(&args);
            let a = args[0].value();
            let sign = match mode {
                Mode::General => None,
                Mode::Specialized => forced_sign.or_else(|| cx.engine().square_sign(&a, metric)),
            };
            let fp = match sign {
                Some(s) => {
                    let value = closed_form_value(f, s, &a);
                    let ty = specialize::return_type(algebra, request, &value)?;
                    let returns = returns_for(ty, request, &float, algebra);
                    let mut fp = FloatPlan::new(float, args, returns);
                    fp.reference = Returns::Value(ValueType::General);
                    fp.value = Some(value);
                    fp.strategy = Strategy::ClosedForm { square_sign: s };
                    fp
                }
                None => {
                    if mode == Mode::Specialized {
                        warn!("{}: the square of the operand has no fixed sign, summing a power series", request);
                    }
                    let series = series_type(algebra, request, &args[0], metric)?;
                    let mut fp = FloatPlan::new(float, args, Returns::Value(series));
                    fp.reference = Returns::Value(ValueType::General);
                    fp.strategy = Strategy::Series { series_type: series };
                    fp
                }
            };
            floats.push(fp);
        }
        fill_return_type(request, &floats, algebra);
        Ok(Plan { mode, floats })
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        let algebra = cx.algebra();
        let general = algebra.general.clone();
        for fp in plan.floats.iter_mut() {
            let series = match fp.strategy {
                Strategy::Series { series_type } => series_type,
                _ => continue,
            };
            let float_name = fp.float.name.clone();
            let r = algebra.type_name(series, &fp.float);
            let a = fp.args[0].type_name.clone();
            let forced = (series != ValueType::General).then_some(r.as_str());
            require(cx, fp, "convert", &format!("_{}", r), &[&a], None, &request.metric)?;
            if series == ValueType::General {
                require(cx, fp, "gp", "gp", &[&general, &general], None, &request.metric)?;
            } else {
                require(cx, fp, "gp", "gp", &[&r, &a], forced, &request.metric)?;
            }
            require(cx, fp, "sas", "sas", &[&r, &float_name, &float_name], forced, &request.metric)?;
            require(cx, fp, "add", "add", &[&r, &r], forced, &request.metric)?;
        }
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let f = function_of(request);
        let metric = cx.metric(request)?;
        for fp in &plan.floats {
            match fp.strategy {
                Strategy::ClosedForm { square_sign } => write_closed(cx, request, fp, f, square_sign, metric)?,
                Strategy::Series { series_type } => write_series(cx, request, fp, f, series_type)?,
                Strategy::Direct => write_closed_form(cx, request, fp)?,
            }
        }
        Ok(())
    }
}

fn write_closed(
    cx: &Resolver<'_>,
    request: &OperationRequest,
    fp: &FloatPlan,
    f: Function,
    square_sign: i32,
    metric: &Metric,
) -> Result<()> {
    let value = fp.value.clone().unwrap_or_default();
    let mut body = Vec::new();
    if square_sign != 0 {
        let a = fp.args[0].value();
        let alpha = Scalar::call(ScalarFn::Sqrt, Scalar::call(ScalarFn::Abs, alpha_squared(&a, metric)));
        body.push(Instruction::Assign {
            dest: Variable::local(ALPHA, ValueType::Scalar),
            value: Multivector::scalar(alpha),
            declare: true,
        });
        if let (_, Some(odd)) = f.closed_form(square_sign) {
            let alpha = Scalar::var(ALPHA);
            let mul = Variable::local(MUL, ValueType::Scalar);
            body.push(Instruction::Assign {
                dest: mul.clone(),
                value: Multivector::constant(1.0),
                declare: true,
            });
            body.push(Instruction::IfElse {
                condition: Condition::new(alpha.clone(), Comparison::NotEqual, Scalar::zero()),
                then_block: vec![Instruction::Assign {
                    dest: mul,
                    value: Multivector::scalar(Scalar::call(odd, alpha.clone()).mul(&Scalar::call(ScalarFn::Inverse, alpha))),
                    declare: false,
                }],
                else_block: Vec::new(),
            });
        }
    }
    body.push(Instruction::Return { value, cast: needs_cast(fp) });
    write_body(cx, request, fp, body)
}

fn write_series(
    cx: &Resolver<'_>,
    request: &OperationRequest,
    fp: &FloatPlan,
    f: Function,
    series: ValueType,
) -> Result<()> {
    let backend = cx.backend();
    let convention = backend.convention;
    let w = backend.writer(&fp.float);
    let float = &fp.float;
    let arg = &fp.args[0];
    let narrow = |text: String| if float.is_single() { w.cast(&text) } else { text };
    let one = w.literal(1.0);
    let zero = w.literal(0.0);

    let mut decl_tmp = vec![
        backend.declare_local("tmp", series, float),
        backend.declare_local("sum", series, float),
    ];
    let mut init_term = Vec::new();
    let factor = if series == ValueType::General && arg.ty != ValueType::General {
        decl_tmp.push(backend.declare_local("x", series, float));
        init_term.push(backend.call_value("x", fp.dep("convert"), &[pass_arg(cx, arg)]));
        pass_local(cx, "x")
    } else {
        pass_arg(cx, arg)
    };
    init_term.push(backend.call_value("term", fp.dep("convert"), &[pass_arg(cx, arg)]));

    let (linear, constant) = match f.parity() {
        None => (one.clone(), one.clone()),
        Some(1) => (one.clone(), zero.clone()),
        _ => (zero.clone(), one.clone()),
    };
    let init_result = backend.call_value("result", fp.dep("sas"), &[pass_local(cx, "term"), linear, constant]);

    let include = match f.parity() {
        None => convention.true_literal().to_string(),
        Some(p) => format!("k % 2 == {}", p),
    };
    let added = if f.alternates() {
        let sign = narrow(format!("((k / 2) % 2 == 0) ? {} : -{}", one, one));
        vec![
            backend.call_value("tmp", fp.dep("sas"), &[pass_local(cx, "term"), sign, zero.clone()]),
            backend.call_value("sum", fp.dep("add"), &[pass_local(cx, "result"), pass_local(cx, "tmp")]),
        ]
    } else {
        vec![backend.call_value("sum", fp.dep("add"), &[pass_local(cx, "result"), pass_local(cx, "term")])]
    };
    let mut accumulate = added;
    accumulate.push("result = sum;".to_string());

    let params = crate::templates::TemplateParams::new()
        .set("declTerm", backend.declare_local("term", series, float))
        .set("declResult", backend.declare_local("result", series, float))
        .set("declTmp", decl_tmp.join("\n"))
        .set("initTerm", init_term.join("\n"))
        .set("initResult", init_result)
        .set("order", series_order(request)?.to_string())
        .set("step", backend.call_value("tmp", fp.dep("gp"), &[pass_local(cx, "term"), factor]))
        .set(
            "scale",
            backend.call_value("term", fp.dep("sas"), &[pass_local(cx, "tmp"), narrow(format!("{} / k", one)), zero]),
        )
        .set("include", include)
        .set("accumulate", accumulate.join("\n"))
        .set("ret", backend.return_local("result"));
    write_template(cx, request, fp, "series", &params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::Metric;

    #[test]
    fn test_closed_form_shapes() {
        let b = Multivector::blade(3, Scalar::var("b"));
        let exp = closed_form_value(Function::Exp, -1, &b);
        assert_eq!(exp.support(), vec![0, 3]);
        let cos = closed_form_value(Function::Cos, -1, &b);
        assert_eq!(cos.support(), vec![0]);
        let sin = closed_form_value(Function::Sin, 1, &b);
        assert_eq!(sin.support(), vec![3]);
        let null = closed_form_value(Function::Exp, 0, &b);
        assert_eq!(null.coefficient(0).as_constant(), Some(1.0));
    }

    #[test]
    fn test_series_support_closes_under_products() {
        let metric = Metric::euclidean("default", 3);
        let a = Multivector::blade(1, Scalar::var("x")).add(&Multivector::blade(6, Scalar::var("y")));
        let support = series_support(&a, &metric).support();
        // e1 and e2^e3 generate the whole even-odd mix {1, e1, e23, e123}.
        assert_eq!(support, vec![0, 1, 6, 7]);
    }

    #[test]
    fn test_square_option() {
        let request = OperationRequest::new("exp").with_option("square", "negative");
        assert_eq!(square_option(&request).unwrap(), Some(-1));
        let bad = OperationRequest::new("exp").with_option("square", "maybe");
        assert!(square_option(&bad).is_err());
    }
}
