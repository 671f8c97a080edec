use std::collections::BTreeMap;
use std::fmt;

use crate::algebra::{Algebra, FloatPrecision, ValueType};
use crate::symbolic::Multivector;

/// A request for one generated function, possibly with unspecified parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationRequest {
    pub name: String,
    /// Base of the emitted name; equal to `name` unless overridden.
    pub output_name: String,
    /// Empty when the return type should be inferred.
    pub return_type: String,
    pub argument_types: Vec<String>,
    pub argument_names: Vec<String>,
    /// Pass multivector arguments by address instead of the convention default.
    pub by_ref: Vec<bool>,
    pub floats: Vec<String>,
    pub metric: String,
    pub comment: String,
    pub options: BTreeMap<String, String>,
}

impl OperationRequest {
    pub fn new(name: &str) -> Self {
        OperationRequest {
            name: name.to_string(),
            output_name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, types: &[&str]) -> Self {
        self.argument_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_floats(mut self, floats: &[&str]) -> Self {
        self.floats = floats.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_return_type(mut self, ty: &str) -> Self {
        self.return_type = ty.to_string();
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_metric(mut self, metric: &str) -> Self {
        self.metric = metric.to_string();
        self
    }

    pub fn arity(&self) -> usize {
        self.argument_types.len()
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn has_return_type(&self) -> bool {
        !self.return_type.is_empty()
    }

    /// Argument type `i`, or `default` when the request leaves it open.
    pub fn argument_type<'a>(&'a self, i: usize, default: &'a str) -> &'a str {
        self.argument_types
            .get(i)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(default)
    }

    /// The value type of argument `i`, falling back to `default`.
    pub fn argument_value_type(&self, algebra: &Algebra, i: usize, default: &str) -> Option<ValueType> {
        algebra.value_type(self.argument_type(i, default))
    }

    /// Fill in missing argument types, names and passing flags.
    pub fn complete_arguments(&mut self, algebra: &Algebra, defaults: &[&str]) {
        let n = defaults.len().max(self.argument_types.len());
        for i in 0..n {
            let default = defaults.get(i).copied().unwrap_or(algebra.general.as_str());
            if i >= self.argument_types.len() {
                self.argument_types.push(default.to_string());
            } else if self.argument_types[i].is_empty() {
                self.argument_types[i] = default.to_string();
            }
        }
        for i in self.argument_names.len()..n {
            self.argument_names.push(default_argument_name(i));
        }
        let by_address = algebra.convention.passes_by_address();
        self.by_ref.resize(n, by_address);
        if self.metric.is_empty() {
            self.metric = algebra.default_metric_name().to_string();
        }
    }

    /// One request per float precision, as the session processes them.
    pub fn split_by_float(&self, algebra: &Algebra) -> Vec<OperationRequest> {
        let floats: Vec<String> = if self.floats.is_empty() {
            algebra.floats.iter().map(|f| f.name.clone()).collect()
        } else {
            self.floats.clone()
        };
        floats
            .into_iter()
            .map(|f| OperationRequest {
                floats: vec![f],
                ..self.clone()
            })
            .collect()
    }

    pub fn is_converter(&self) -> bool {
        self.name.starts_with('_') && self.name.len() > 1
    }
}

impl fmt::Display for OperationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, t) in self.argument_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
            if let Some(n) = self.argument_names.get(i) {
                write!(f, " {}", n)?;
            }
        }
        write!(f, ")")?;
        if self.has_return_type() {
            write!(f, " -> {}", self.return_type)?;
        }
        if !self.floats.is_empty() {
            write!(f, " [{}]", self.floats.join(", "))?;
        }
        if !self.metric.is_empty() {
            write!(f, " metric={}", self.metric)?;
        }
        if self.output_name != self.name && !self.output_name.is_empty() {
            write!(f, " as {}", self.output_name)?;
        }
        Ok(())
    }
}

pub fn default_argument_name(i: usize) -> String {
    let letters = b"abcdefghijklmnopqrstuvwxyz";
    if i < letters.len() {
        (letters[i] as char).to_string()
    } else {
        format!("a{}", i)
    }
}

/// A function argument bound to a concrete type for one float precision.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentBinding {
    pub name: String,
    pub type_name: String,
    pub mangled_type: String,
    pub ty: ValueType,
    pub by_ref: bool,
    /// Symbolic value built from coordinate access text; absent for outermorphisms.
    pub value: Option<Multivector>,
}

impl ArgumentBinding {
    pub fn value(&self) -> Multivector {
        self.value.clone().unwrap_or_default()
    }

    pub fn is_general(&self) -> bool {
        self.ty == ValueType::General
    }
}

/// Key identifying a generated function in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolutionKey {
    pub operation: String,
    pub arguments: Vec<String>,
    pub float: String,
    pub metric: String,
    pub forced_return: Option<String>,
    /// Passing flags of a top-level request that overrides the defaults.
    pub passing: Option<Vec<bool>>,
}

impl ResolutionKey {
    /// Scalar argument types are normalized to the precision name.
    pub fn new(
        algebra: &Algebra,
        operation: &str,
        arguments: &[String],
        float: &FloatPrecision,
        metric: &str,
        forced_return: Option<&str>,
    ) -> Self {
        let normalize = |t: &str| {
            if algebra.is_float_name(t) {
                float.name.clone()
            } else {
                t.to_string()
            }
        };
        let metric = if metric.is_empty() {
            algebra.default_metric_name().to_string()
        } else {
            metric.to_string()
        };
        ResolutionKey {
            operation: operation.to_string(),
            arguments: arguments.iter().map(|t| normalize(t)).collect(),
            float: float.name.clone(),
            metric,
            forced_return: forced_return.filter(|r| !r.is_empty()).map(normalize),
            passing: None,
        }
    }

    /// Record `flags` when they differ from the convention defaults.
    pub fn with_passing(mut self, flags: Vec<bool>, defaults: &[bool]) -> Self {
        self.passing = (flags.as_slice() != defaults).then_some(flags);
        self
    }

    pub fn to_request(&self) -> OperationRequest {
        OperationRequest {
            name: self.operation.clone(),
            output_name: self.operation.clone(),
            return_type: self.forced_return.clone().unwrap_or_default(),
            argument_types: self.arguments.clone(),
            floats: vec![self.float.clone()],
            metric: self.metric.clone(),
            by_ref: self.passing.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// One letter per argument: `r` by address, `v` by value.
pub fn passing_code(flags: &[bool]) -> String {
    flags.iter().map(|by_ref| if *by_ref { 'r' } else { 'v' }).collect()
}

impl fmt::Display for ResolutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.operation, self.arguments.join(", "))?;
        if let Some(r) = &self.forced_return {
            write!(f, " -> {}", r)?;
        }
        if let Some(flags) = &self.passing {
            write!(f, " pass {}", passing_code(flags))?;
        }
        write!(f, " [{}, {}]", self.float, self.metric)
    }
}
