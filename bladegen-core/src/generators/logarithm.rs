use std::f64::consts::PI;

use crate::algebra::{Algebra, ValueType};
use crate::bail_domain;
use crate::error::Result;
use crate::generators::*;
use crate::ir::{Comparison, Condition, Instruction, Variable};
use crate::lower::indent;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::sink::Feature;
use crate::specialize::Mode;
use crate::symbolic::{Metric, Multivector, Scalar, ScalarFn, SymbolicOp};

const NORM2: &str = "_n2";
const SCALAR_PART: &str = "_s";
const NORM: &str = "_n";
const FACTOR: &str = "_m";

/// `log(R)` of a Euclidean rotor `R = s + B`: the bivector
/// `B * atan2(|B|, s) / |B|`.
///
/// When `B` vanishes the result is zero for `s >= 0` and a half turn in a
/// fixed plane otherwise.
pub struct Logarithm;

/// Requests may say `type: euclidean`; no other kind of logarithm exists.
fn euclidean_request(request: &OperationRequest) -> bool {
    request
        .option("type")
        .map_or(true, |t| t.eq_ignore_ascii_case("euclidean"))
}

/// The plane of the first two basis vectors that square to one.
fn euclidean_plane(metric: &Metric) -> Option<u32> {
    let mut unit = (0..metric.dimension()).filter(|&i| metric.inner(i, i) == 1.0);
    let first = unit.next()?;
    let second = unit.next()?;
    Some((1 << first) | (1 << second))
}

fn half_turn_plane(metric: &Metric) -> Result<u32> {
    match euclidean_plane(metric) {
        Some(plane) => Ok(plane),
        None => bail_domain!("log needs two basis vectors of unit square, metric '{}' has fewer", metric.name),
    }
}

impl OperationGenerator for Logarithm {
    fn name(&self) -> &'static str {
        "log"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        request.name == "log" && euclidean_request(request) && multivector_arguments(algebra, request, 1)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        half_turn_plane(cx.metric(request)?)?;
        let defaults = general_defaults(cx.algebra(), 1);
        plan_symbolic(cx, request, &defaults, general_value, |_, args| {
            let bivector = args[0].value().grade_part(2);
            if bivector.is_zero() {
                bail_domain!("log needs an argument with a bivector part");
            }
            Ok(bivector.scale(&Scalar::var(FACTOR)))
        })
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        if plan.mode == Mode::Specialized {
            return Ok(());
        }
        let general = cx.algebra().general.clone();
        for fp in plan.floats.iter_mut() {
            let float_name = fp.float.name.clone();
            require(cx, fp, "grade2", "extractGrade2", &[&general], None, &request.metric)?;
            require(cx, fp, "norm2", "norm2", &[&general], None, &request.metric)?;
            require(cx, fp, "sas", "sas", &[&general, &float_name, &float_name], None, &request.metric)?;
        }
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let metric = cx.metric(request)?;
        cx.sink().require(Feature::MathLibrary);
        for fp in &plan.floats {
            if plan.mode == Mode::Specialized {
                let body = specialized_body(cx, fp, metric)?;
                write_body(cx, request, fp, body)?;
            } else {
                let lines = general_lines(cx, fp, half_turn_plane(metric)?);
                write_lines(cx, request, fp, lines)?;
            }
        }
        Ok(())
    }
}

/// `atan2(norm, s) / norm`, narrowed where the math library works in double.
fn factor_text(cx: &Resolver<'_>, fp: &FloatPlan, norm: &str, s: &str) -> String {
    let convention = cx.algebra().convention;
    let single = fp.float.is_single();
    let text = format!("{}({}, {}) / {}", convention.atan2(single), norm, s, norm);
    if convention.math_needs_cast(single) {
        cx.backend().writer(&fp.float).cast(&text)
    } else {
        text
    }
}

fn specialized_body(cx: &Resolver<'_>, fp: &FloatPlan, metric: &Metric) -> Result<Vec<Instruction>> {
    let a = fp.args[0].value();
    let bivector = a.grade_part(2);
    let norm2 = cx
        .engine()
        .compute(SymbolicOp::Norm2, &[bivector.clone()], metric)?
        .scalar_part();
    let plane = match bivector.support().first() {
        Some(b) => *b,
        None => bail_domain!("log needs an argument with a bivector part"),
    };

    let local = |name: &str, value: Scalar| Instruction::Assign {
        dest: Variable::local(name, ValueType::Scalar),
        value: Multivector::scalar(value),
        declare: true,
    };
    let ret = |value: Multivector| Instruction::Return { value, cast: false };
    let zero = Scalar::constant(0.0);

    let rotation = vec![
        local(NORM, Scalar::call(ScalarFn::Sqrt, Scalar::var(NORM2))),
        Instruction::Verbatim(format!(
            "{} {} = {};",
            fp.float.name,
            FACTOR,
            factor_text(cx, fp, NORM, SCALAR_PART)
        )),
        ret(fp.value.clone().unwrap_or_default()),
    ];
    let half_turn = Instruction::IfElse {
        condition: Condition::new(Scalar::var(SCALAR_PART), Comparison::Less, zero.clone()),
        then_block: vec![ret(Multivector::blade(plane, Scalar::constant(PI)))],
        else_block: vec![ret(Multivector::zero())],
    };
    Ok(vec![
        local(NORM2, norm2),
        local(SCALAR_PART, a.scalar_part()),
        Instruction::IfElse {
            condition: Condition::new(Scalar::var(NORM2), Comparison::Greater, zero),
            then_block: rotation,
            else_block: vec![half_turn],
        },
    ])
}

fn general_lines(cx: &Resolver<'_>, fp: &FloatPlan, plane: u32) -> Vec<String> {
    let backend = cx.backend();
    let w = backend.writer(&fp.float);
    let float = &fp.float;
    let a = &fp.args[0];
    let zero = w.literal(0.0);

    let rotation = [
        format!("{} n = {};", float.name, w.scalar(&Scalar::call(ScalarFn::Sqrt, Scalar::var("n2")))),
        format!("{} m = {};", float.name, factor_text(cx, fp, "n", "s")),
        backend.call_value("r", fp.dep("sas"), &[pass_local(cx, "B"), "m".to_string(), zero.clone()]),
    ];
    let half_turn = [
        backend.call_value("r", fp.dep("sas"), &[pass_local(cx, "B"), zero.clone(), zero.clone()]),
        format!(
            "if (s < {}) {} = {};",
            zero,
            backend.coordinate("r", false, plane as usize),
            w.literal(PI)
        ),
    ];
    vec![
        backend.declare_local("B", ValueType::General, float),
        backend.call_value("B", fp.dep("grade2"), &[pass_arg(cx, a)]),
        format!(
            "{} n2 = {};",
            float.name,
            backend.call_expression(fp.dep("norm2"), &[pass_local(cx, "B")])
        ),
        format!("{} s = {};", float.name, backend.coordinate(&a.name, a.by_ref, 0)),
        backend.declare_local("r", ValueType::General, float),
        format!("if (n2 > {}) {{", zero),
        indent(&rotation.join("\n"), 1).trim_end().to_string(),
        "}".to_string(),
        "else {".to_string(),
        indent(&half_turn.join("\n"), 1).trim_end().to_string(),
        "}".to_string(),
        backend.return_local("r"),
    ]
}
