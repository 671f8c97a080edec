//! Points of the conformal model: `no + x + x²/2 ni`.

use crate::algebra::{Algebra, ValueType, SCALAR_TYPE};
use crate::bail_domain;
use crate::error::Result;
use crate::generators::*;
use crate::lower::Returns;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::sink::Feature;
use crate::specialize::{self, Mode};
use crate::symbolic::{Metric, Multivector, ProductKind, Scalar, ScalarFn, EIGEN_ROUNDING};
use crate::testgen;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointForm {
    /// `cgaPoint(x)` from a Euclidean vector.
    Vector,
    /// `cgaPoint(x1, ..., xn)` from coordinates.
    Coordinates,
    /// `randomCgaPoint()`.
    Random,
}

fn point_form(algebra: &Algebra, request: &OperationRequest) -> Option<PointForm> {
    match request.name.as_str() {
        "randomCgaPoint" if request.arity() == 0 => Some(PointForm::Random),
        "cgaPoint" => {
            let n = algebra.dimension();
            let scalars = n > 2
                && request.arity() == n - 2
                && (0..request.arity())
                    .all(|i| request.argument_value_type(algebra, i, SCALAR_TYPE) == Some(ValueType::Scalar));
            if scalars {
                Some(PointForm::Coordinates)
            } else if multivector_arguments(algebra, request, 1) {
                Some(PointForm::Vector)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Origin, infinity and the remaining (Euclidean) basis vectors, as bitmaps.
/// `origin` and `infinity` options rename the first two.
struct ConformalBasis {
    origin: u32,
    infinity: u32,
    euclidean: Vec<u32>,
}

impl ConformalBasis {
    fn new(algebra: &Algebra, request: &OperationRequest) -> Result<Self> {
        let find = |key: &str, default: &str| -> Result<usize> {
            let name = request.option(key).unwrap_or(default);
            match algebra.basis.iter().position(|b| b == name) {
                Some(i) => Ok(i),
                None => bail_domain!("no basis vector '{}' to use as {}", name, key),
            }
        };
        let origin = find("origin", "no")?;
        let infinity = find("infinity", "ni")?;
        if origin == infinity {
            bail_domain!("origin and infinity must be different basis vectors");
        }
        let euclidean = (0..algebra.dimension())
            .filter(|i| *i != origin && *i != infinity)
            .map(|i| 1 << i)
            .collect();
        Ok(ConformalBasis {
            origin: 1 << origin,
            infinity: 1 << infinity,
            euclidean,
        })
    }

    fn vector(&self, coordinates: impl Iterator<Item = Scalar>) -> Multivector {
        let mut x = Multivector::zero();
        for (bitmap, c) in self.euclidean.iter().zip(coordinates) {
            x.add_term(*bitmap, c);
        }
        x
    }

    fn point(&self, x: &Multivector, metric: &Metric) -> Multivector {
        let x2 = x.product(x, metric, ProductKind::Scalar).scalar_part();
        Multivector::blade(self.origin, Scalar::constant(1.0))
            .add(x)
            .add(&Multivector::blade(self.infinity, x2.scale(0.5)))
    }
}

/// `cgaPoint` from a vector or from coordinates, and `randomCgaPoint()`.
pub struct CgaPoint;

impl OperationGenerator for CgaPoint {
    fn name(&self) -> &'static str {
        "cga-point"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        point_form(algebra, request).is_some()
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let algebra = cx.algebra();
        let form = point_form(algebra, request).unwrap_or(PointForm::Vector);
        let basis = ConformalBasis::new(algebra, request)?;
        let defaults = match form {
            PointForm::Vector => general_defaults(algebra, 1),
            PointForm::Coordinates => vec![SCALAR_TYPE; basis.euclidean.len()],
            PointForm::Random => Vec::new(),
        };
        request.complete_arguments(algebra, &defaults);
        let metric = cx.metric(request)?;
        let backend = cx.backend();

        let mut floats = Vec::new();
        let mut mode = Mode::Specialized;
        for float in cx.floats(request)? {
            let args = backend.bind_arguments(request, &float)?;
            mode = specialize::classify(&args);
            let x = match form {
                PointForm::Vector => {
                    let v = args[0].value();
                    basis.vector(basis.euclidean.iter().map(|b| v.coefficient(*b)))
                }
                PointForm::Coordinates => basis.vector(args.iter().map(|a| a.value().scalar_part())),
                PointForm::Random => basis.vector((0..basis.euclidean.len()).map(|k| Scalar::var(format!("c{}", k)))),
            };
            let value = basis.point(&x, metric);
            let value = if metric.round {
                cx.engine().round(&value, EIGEN_ROUNDING)
            } else {
                value
            };
            let ty = if mode == Mode::General && !request.has_return_type() {
                ValueType::General
            } else {
                specialize::return_type(algebra, request, &value)?
            };
            let mut fp = FloatPlan::new(float, args, Returns::Value(ty));
            fp.reference = Returns::Value(ValueType::General);
            fp.value = Some(value);
            floats.push(fp);
        }
        fill_return_type(request, &floats, algebra);
        Ok(Plan { mode, floats })
    }

    fn check_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        let algebra = cx.algebra();
        if point_form(algebra, request) != Some(PointForm::Random) {
            return Ok(());
        }
        let n = ConformalBasis::new(algebra, request)?.euclidean.len();
        for fp in plan.floats.iter_mut() {
            let float_name = fp.float.name.clone();
            let point_type = match fp.returns {
                Returns::Value(ty) => algebra.type_name(ty, &fp.float),
                _ => algebra.general.clone(),
            };
            let source = format!("random_{}", float_name);
            require(cx, fp, "source", &source, &[], None, &request.metric)?;
            let coordinates = vec![float_name.as_str(); n];
            require(cx, fp, "point", "cgaPoint", &coordinates, Some(&point_type), &request.metric)?;
        }
        Ok(())
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        let algebra = cx.algebra();
        let random = point_form(algebra, request) == Some(PointForm::Random);
        let backend = cx.backend();
        for fp in &plan.floats {
            if !random {
                write_closed_form(cx, request, fp)?;
                continue;
            }
            let Returns::Value(ty) = fp.returns else {
                continue;
            };
            let w = backend.writer(&fp.float);
            let n = ConformalBasis::new(algebra, request)?.euclidean.len();
            let coordinate = format!(
                "{} * {} - {}",
                w.literal(2.0),
                backend.call_expression(fp.dep("source"), &[]),
                w.literal(1.0)
            );
            let lines = vec![
                backend.declare_local("r", ty, &fp.float),
                backend.call_value("r", fp.dep("point"), &vec![coordinate; n]),
                backend.return_local("r"),
            ];
            write_lines(cx, request, fp, lines)?;
        }
        Ok(())
    }

    /// Only the vector form has a general counterpart to compare against.
    fn check_test_dependencies(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
        if point_form(cx.algebra(), request) == Some(PointForm::Vector) {
            testgen::plan_tests(cx, request, plan)
        } else {
            Ok(())
        }
    }
}

/// `cgaPointDistance(p, q)`, `sqrt(|-2 p.q|)`, and `cgaPointDistance2(p, q)`, `-2 p.q`.
pub struct CgaPointDistance;

impl OperationGenerator for CgaPointDistance {
    fn name(&self) -> &'static str {
        "cga-point-distance"
    }

    fn can_implement(&self, algebra: &Algebra, request: &OperationRequest) -> bool {
        matches!(request.name.as_str(), "cgaPointDistance" | "cgaPointDistance2")
            && multivector_arguments(algebra, request, 2)
    }

    fn complete_request(&self, cx: &Resolver<'_>, request: &mut OperationRequest) -> Result<Plan> {
        let algebra = cx.algebra();
        let squared = request.name == "cgaPointDistance2";
        request.complete_arguments(algebra, &general_defaults(algebra, 2));
        let metric = cx.metric(request)?;
        let backend = cx.backend();

        let mut floats = Vec::new();
        let mut mode = Mode::Specialized;
        for float in cx.floats(request)? {
            let args = backend.bind_arguments(request, &float)?;
            mode = specialize::classify(&args);
            let sp = args[0]
                .value()
                .product(&args[1].value(), metric, ProductKind::Scalar)
                .scalar_part()
                .scale(-2.0);
            let d = if squared {
                sp
            } else {
                Scalar::call(ScalarFn::Sqrt, Scalar::call(ScalarFn::Abs, sp))
            };
            let value = Multivector::scalar(d);
            let value = if metric.round {
                cx.engine().round(&value, EIGEN_ROUNDING)
            } else {
                value
            };
            let returns = scalar_returns(request, &float, algebra);
            let mut fp = FloatPlan::new(float, args, returns);
            fp.reference = Returns::Scalar(fp.float.name.clone());
            fp.value = Some(value);
            floats.push(fp);
        }
        fill_return_type(request, &floats, algebra);
        Ok(Plan { mode, floats })
    }

    fn write_function(&self, cx: &Resolver<'_>, request: &OperationRequest, plan: &Plan) -> Result<()> {
        if request.name == "cgaPointDistance" {
            cx.sink().require(Feature::MathLibrary);
        }
        for fp in &plan.floats {
            write_closed_form(cx, request, fp)?;
        }
        Ok(())
    }
}
