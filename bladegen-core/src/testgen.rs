//! Self-tests for generated functions.
//!
//! A specialized function is compared against the general implementation of
//! the same operation on random operands. A general function is checked
//! against an algebraic identity when its family has one. Each test returns
//! true when every loop iteration agrees within the precision's tolerance.

use crate::algebra::ValueType;
use crate::error::Result;
use crate::generators::{FloatPlan, Plan};
use crate::lower::Returns;
use crate::request::OperationRequest;
use crate::session::Resolver;
use crate::specialize::Mode;
use crate::templates::TemplateParams;

/// Random trials per test function.
pub const TEST_LOOPS: usize = 10;

const EPSILON: &str = "eps";

#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A test local, passed by address when `by_ref` is set.
    Value { name: String, by_ref: bool },
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub dest: String,
    pub function: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    /// `function(lhs, rhs, eps)` must hold.
    Equals { lhs: Arg, rhs: Arg, function: String },
    /// Scalar expressions equal within `eps`.
    Scalar { lhs: String, rhs: String },
    Exact { lhs: String, rhs: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestProgram {
    pub locals: Vec<(String, Returns)>,
    pub steps: Vec<Step>,
    pub check: Check,
}

/// Collects locals and steps while resolving the helpers a test calls.
struct TestBuilder<'r, 's> {
    cx: &'r Resolver<'s>,
    fp: &'r FloatPlan,
    metric: String,
    locals: Vec<(String, Returns)>,
    steps: Vec<Step>,
}

impl<'r, 's> TestBuilder<'r, 's> {
    fn new(cx: &'r Resolver<'s>, request: &OperationRequest, fp: &'r FloatPlan) -> Self {
        TestBuilder {
            cx,
            fp,
            metric: request.metric.clone(),
            locals: Vec::new(),
            steps: Vec::new(),
        }
    }

    fn default_by_ref(&self) -> bool {
        self.cx.algebra().convention.passes_by_address()
    }

    fn helper(&self, name: &str, argument_types: &[String]) -> Result<String> {
        self.cx.resolve(name, argument_types, None, &self.fp.float, &self.metric)
    }

    fn local(&mut self, name: &str, returns: Returns) -> String {
        self.locals.push((name.to_string(), returns));
        name.to_string()
    }

    fn call(&mut self, dest: &str, function: &str, args: Vec<Arg>) {
        self.steps.push(Step {
            dest: dest.to_string(),
            function: function.to_string(),
            args,
        });
    }

    fn type_name(&self, ty: ValueType) -> String {
        self.cx.algebra().type_name(ty, &self.fp.float)
    }

    fn general(&self) -> String {
        self.cx.algebra().general.clone()
    }

    /// A helper argument: locals holding multivectors go by the default passing flags.
    fn value(&self, name: &str, ty: ValueType) -> Arg {
        Arg::Value {
            name: name.to_string(),
            by_ref: ty != ValueType::Scalar && self.default_by_ref(),
        }
    }

    /// Declare `name` and fill it with a random value of `ty`.
    fn random(&mut self, name: &str, ty: ValueType) -> Result<String> {
        let float = self.fp.float.clone();
        let local = match ty {
            ValueType::Scalar => {
                let source = self.helper(&format!("random_{}", float.name), &[])?;
                let local = self.local(name, Returns::Scalar(float.name.clone()));
                self.call(&local, &source, Vec::new());
                local
            }
            _ => {
                let type_name = self.type_name(ty);
                let source = self.helper(&format!("random_{}", type_name), &[float.name.clone()])?;
                let local = self.local(name, Returns::Value(ty));
                self.call(&local, &source, vec![Arg::Literal(float.literal(1.0))]);
                local
            }
        };
        Ok(local)
    }

    /// Widen a local of type `ty` into a new general local.
    fn widen(&mut self, name: &str, from: &str, ty: ValueType) -> Result<String> {
        let general = self.general();
        let converter = self.helper(&format!("_{}", general), &[self.type_name(ty)])?;
        let local = self.local(name, Returns::Value(ValueType::General));
        let arg = self.value(from, ty);
        self.call(&local, &converter, vec![arg]);
        Ok(local)
    }

    fn equals(&self, lhs: &str, rhs: &str) -> Result<Check> {
        let general = self.general();
        let function = self.helper("equals", &[general.clone(), general, self.fp.float.name.clone()])?;
        Ok(Check::Equals {
            lhs: self.value(lhs, ValueType::General),
            rhs: self.value(rhs, ValueType::General),
            function,
        })
    }

    fn finish(self, check: Check) -> TestProgram {
        TestProgram {
            locals: self.locals,
            steps: self.steps,
            check,
        }
    }
}

/// Plan a test for every precision and resolve the helpers it calls.
pub fn plan_tests(cx: &Resolver<'_>, request: &OperationRequest, plan: &mut Plan) -> Result<()> {
    for i in 0..plan.floats.len() {
        let test = match plan.mode {
            Mode::Specialized => comparison_test(cx, request, &plan.floats[i])?,
            Mode::General => identity_test(cx, request, &plan.floats[i])?,
        };
        plan.floats[i].test = test;
    }
    Ok(())
}

/// Random specialized operands, evaluated by the function under test and by
/// the general implementation of the same operation.
fn comparison_test(cx: &Resolver<'_>, request: &OperationRequest, fp: &FloatPlan) -> Result<Option<TestProgram>> {
    if fp.args.is_empty() || fp.args.iter().any(|a| a.ty == ValueType::Outermorphism) {
        return Ok(None);
    }
    let mut t = TestBuilder::new(cx, request, fp);
    let general = t.general();

    let mut specialized = Vec::new();
    let mut widened = Vec::new();
    let mut reference_types = Vec::new();
    for (i, arg) in fp.args.iter().enumerate() {
        let local = t.random(&format!("arg{}", i), arg.ty)?;
        specialized.push(Arg::Value {
            name: local.clone(),
            by_ref: arg.by_ref,
        });
        if arg.ty == ValueType::Scalar {
            widened.push(t.value(&local, ValueType::Scalar));
            reference_types.push(fp.float.name.clone());
        } else {
            let g = t.widen(&format!("garg{}", i), &local, arg.ty)?;
            widened.push(t.value(&g, ValueType::General));
            reference_types.push(general.clone());
        }
    }

    let result = t.local("result", fp.returns.clone());
    t.call(&result, &fp.function_name, specialized);
    let reference_function = t.helper(&request.name, &reference_types)?;
    let reference = t.local("reference", fp.reference.clone());
    t.call(&reference, &reference_function, widened);

    let check = match (&fp.returns, &fp.reference) {
        (Returns::Value(ValueType::General), Returns::Value(ValueType::General)) => t.equals(&result, &reference)?,
        (Returns::Value(ty), Returns::Value(ValueType::General)) => {
            let converted = t.widen("converted", &result, *ty)?;
            t.equals(&converted, &reference)?
        }
        (Returns::Scalar(_), Returns::Scalar(_)) => Check::Scalar {
            lhs: result,
            rhs: reference,
        },
        (Returns::Scalar(_), Returns::Value(ValueType::General)) => Check::Scalar {
            lhs: result,
            rhs: format!("{}.c[0]", reference),
        },
        (Returns::Bool, Returns::Bool) | (Returns::Int, Returns::Int) => Check::Exact {
            lhs: result,
            rhs: reference,
        },
        _ => return Ok(None),
    };
    Ok(Some(t.finish(check)))
}

fn inverse_of(name: &str) -> Option<&'static str> {
    Some(match name {
        "add" => "subtract",
        "subtract" => "add",
        "negate" => "negate",
        "reverse" => "reverse",
        "cliffordConjugate" => "cliffordConjugate",
        "gradeInvolution" => "gradeInvolution",
        "dual" => "undual",
        "undual" => "dual",
        "increment" => "decrement",
        "decrement" => "increment",
        _ => return None,
    })
}

fn is_bilinear(name: &str) -> bool {
    matches!(name, "gp" | "op" | "lc" | "rc" | "hip" | "mhip" | "sp")
}

/// Identities for functions over the general type.
fn identity_test(cx: &Resolver<'_>, request: &OperationRequest, fp: &FloatPlan) -> Result<Option<TestProgram>> {
    let mut t = TestBuilder::new(cx, request, fp);
    let general = t.general();
    let g = ValueType::General;
    let own = |i: usize, name: &str| Arg::Value {
        name: name.to_string(),
        by_ref: fp.args.get(i).map_or(false, |a| a.by_ref),
    };

    let check = if let Some(inverse) = inverse_of(&request.name) {
        let arity = fp.args.len();
        let a = t.random("a", g)?;
        let r = t.local("r", Returns::Value(g));
        let s = t.local("s", Returns::Value(g));
        if arity == 2 {
            let b = t.random("b", g)?;
            t.call(&r, &fp.function_name, vec![own(0, &a), own(1, &b)]);
            let undo = t.helper(inverse, &[general.clone(), general.clone()])?;
            let args = vec![t.value(&r, g), t.value(&b, g)];
            t.call(&s, &undo, args);
        } else {
            t.call(&r, &fp.function_name, vec![own(0, &a)]);
            let undo = t.helper(inverse, &[general.clone()])?;
            let args = vec![t.value(&r, g)];
            t.call(&s, &undo, args);
        }
        t.equals(&s, &a)?
    } else if request.name.starts_with("extractGrade") {
        let a = t.random("a", g)?;
        let r = t.local("r", Returns::Value(g));
        let s = t.local("s", Returns::Value(g));
        t.call(&r, &fp.function_name, vec![own(0, &a)]);
        t.call(&s, &fp.function_name, vec![own(0, &r)]);
        t.equals(&s, &r)?
    } else if is_bilinear(&request.name) && fp.args.len() == 2 {
        let a = t.random("a", g)?;
        let b = t.random("b", g)?;
        let c = t.random("c", g)?;
        let add = t.helper("add", &[general.clone(), general.clone()])?;
        let bc = t.local("bc", Returns::Value(g));
        let args = vec![t.value(&b, g), t.value(&c, g)];
        t.call(&bc, &add, args);
        let whole = t.local("whole", fp.returns.clone());
        let left = t.local("left", fp.returns.clone());
        let right = t.local("right", fp.returns.clone());
        t.call(&whole, &fp.function_name, vec![own(0, &a), own(1, &bc)]);
        t.call(&left, &fp.function_name, vec![own(0, &a), own(1, &b)]);
        t.call(&right, &fp.function_name, vec![own(0, &a), own(1, &c)]);
        match fp.returns {
            Returns::Value(_) => {
                let sum = t.local("sum", Returns::Value(g));
                let args = vec![t.value(&left, g), t.value(&right, g)];
                t.call(&sum, &add, args);
                t.equals(&whole, &sum)?
            }
            _ => Check::Scalar {
                lhs: whole,
                rhs: format!("{} + {}", left, right),
            },
        }
    } else {
        return Ok(None);
    };
    Ok(Some(t.finish(check)))
}

/// Write the planned tests and return their names.
pub fn write_tests(cx: &Resolver<'_>, _request: &OperationRequest, plan: &Plan) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for fp in &plan.floats {
        if let Some(test) = &fp.test {
            let name = fp.test_name.clone();
            let body = render_test(cx, fp, test)?;
            let backend = cx.backend();
            backend.write_raw(cx.sink(), &backend.test_signature(&name), "", &body);
            names.push(name);
        }
    }
    Ok(names)
}

fn render_test(cx: &Resolver<'_>, fp: &FloatPlan, test: &TestProgram) -> Result<String> {
    let backend = cx.backend();
    let convention = backend.convention;
    let float = &fp.float;

    let mut decls = vec![format!("{} {} = {};", float.name, EPSILON, float.literal(float.tolerance))];
    for (name, returns) in &test.locals {
        decls.push(match returns {
            Returns::Value(ty) => backend.declare_local(name, *ty, float),
            Returns::Scalar(f) => format!("{} {};", f, name),
            Returns::Bool => format!("{} {};", convention.bool_type(), name),
            Returns::Int => format!("int {};", name),
        });
    }

    let pass = |arg: &Arg| match arg {
        Arg::Value { name, by_ref } => backend.argument(name, false, *by_ref),
        Arg::Literal(text) => text.clone(),
    };
    let is_value = |dest: &str| {
        test.locals
            .iter()
            .any(|(name, r)| name == dest && matches!(r, Returns::Value(_)))
    };

    let mut body = Vec::new();
    for step in &test.steps {
        let args: Vec<String> = step.args.iter().map(pass).collect();
        if is_value(&step.dest) {
            body.push(backend.call_value(&step.dest, &step.function, &args));
        } else {
            body.push(format!("{} = {};", step.dest, backend.call_expression(&step.function, &args)));
        }
    }
    let fail = format!("return {};", convention.false_literal());
    body.push(match &test.check {
        Check::Equals { lhs, rhs, function } => {
            let call = backend.call_expression(function, &[pass(lhs), pass(rhs), EPSILON.to_string()]);
            format!("if (!{}) {}", call, fail)
        }
        Check::Scalar { lhs, rhs } => {
            let d = format!("(({}) - ({}))", lhs, rhs);
            format!("if (({} < -{}) || ({} > {})) {}", d, EPSILON, d, EPSILON, fail)
        }
        Check::Exact { lhs, rhs } => format!("if ({} != {}) {}", lhs, rhs, fail),
    });

    let params = TemplateParams::new()
        .set("decls", decls.join("\n"))
        .set("loops", TEST_LOOPS.to_string())
        .set("body", body.join("\n"))
        .set("true", convention.true_literal());
    cx.render("testLoop", &params)
}
