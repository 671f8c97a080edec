//! The algebra being generated for, loaded from a YAML description.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::bail_config;
use crate::error::Result;
use crate::lower::Convention;
use crate::request::OperationRequest;
use crate::symbolic::blade;
use crate::symbolic::Metric;

/// Bitmaps are `u32` and generic tables grow with the square of the blade count.
pub const MAX_DIMENSION: usize = 10;

/// Name accepted in place of a float type, meaning "the current precision".
pub const SCALAR_TYPE: &str = "scalar";

#[derive(Debug, Clone, Deserialize)]
pub struct AlgebraDescription {
    pub name: String,
    pub basis: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<MetricDescription>,
    pub floats: Vec<FloatDescription>,
    #[serde(default = "default_general")]
    pub general: String,
    #[serde(default)]
    pub outermorphism: Option<String>,
    #[serde(default)]
    pub shapes: Vec<ShapeDescription>,
    #[serde(default)]
    pub convention: Convention,
    #[serde(default)]
    pub inline: bool,
    #[serde(default = "default_true")]
    pub tests: bool,
    #[serde(default)]
    pub functions: Vec<FunctionDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricDescription {
    pub name: String,
    #[serde(default)]
    pub diagonal: Option<Vec<f64>>,
    #[serde(default)]
    pub entries: Vec<MetricEntry>,
    #[serde(default)]
    pub round: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricEntry {
    pub a: String,
    pub b: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FloatDescription {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub tolerance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShapeDescription {
    pub name: String,
    /// Blades such as `e1^e2`, `scalar`, or `no=1` for a constant coordinate.
    pub blades: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDescription {
    pub name: String,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub returns: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub by_ref: Vec<bool>,
    #[serde(default)]
    pub floats: Vec<String>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

fn default_general() -> String {
    "mv".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatPrecision {
    pub name: String,
    pub suffix: String,
    pub tolerance: f64,
}

impl FloatPrecision {
    pub fn new(name: &str, suffix: &str) -> Self {
        let tolerance = if name == "float" { 1e-5 } else { 1e-14 };
        FloatPrecision {
            name: name.to_string(),
            suffix: suffix.to_string(),
            tolerance,
        }
    }

    pub fn is_single(&self) -> bool {
        self.name == "float"
    }

    pub fn mangle(&self, type_name: &str) -> String {
        format!("{}{}", type_name, self.suffix)
    }

    pub fn literal(&self, value: f64) -> String {
        let mut text = format!("{:?}", value);
        if !text.contains('.') && !text.contains('e') && !text.contains("inf") && !text.contains("NaN") {
            text.push_str(".0");
        }
        if self.is_single() {
            text.push('f');
        }
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeBlade {
    pub bitmap: u32,
    /// Orientation relative to the canonical blade, `1.0` or `-1.0`.
    pub sign: f64,
    pub constant: Option<f64>,
}

/// A specialized multivector type: a fixed subset of blades, some of them constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub name: String,
    pub blades: Vec<ShapeBlade>,
}

impl Shape {
    pub fn variable_blades(&self) -> impl Iterator<Item = &ShapeBlade> {
        self.blades.iter().filter(|b| b.constant.is_none())
    }

    pub fn constant_blades(&self) -> impl Iterator<Item = &ShapeBlade> {
        self.blades.iter().filter(|b| b.constant.is_some())
    }

    pub fn coordinate_count(&self) -> usize {
        self.variable_blades().count()
    }

    pub fn blade(&self, bitmap: u32) -> Option<&ShapeBlade> {
        self.blades.iter().find(|b| b.bitmap == bitmap)
    }

    pub fn is_scalar_only(&self) -> bool {
        self.blades.iter().all(|b| b.bitmap == 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Scalar,
    Shape(usize),
    General,
    Outermorphism,
}

impl ValueType {
    pub fn is_multivector(self) -> bool {
        matches!(self, ValueType::Shape(_) | ValueType::General)
    }
}

#[derive(Debug, Clone)]
pub struct Algebra {
    pub name: String,
    pub basis: Vec<String>,
    pub metrics: Vec<Metric>,
    pub floats: Vec<FloatPrecision>,
    pub general: String,
    pub outermorphism: Option<String>,
    pub shapes: Vec<Shape>,
    pub convention: Convention,
    pub inline: bool,
    pub emit_tests: bool,
}

impl AlgebraDescription {
    pub fn from_yaml(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Validate the description and split it into the algebra and its requests.
    pub fn build(&self) -> Result<(Algebra, Vec<OperationRequest>)> {
        let algebra = Algebra::from_description(self)?;
        let mut requests = Vec::with_capacity(self.functions.len());
        for f in &self.functions {
            requests.push(algebra.request_from_description(f)?);
        }
        Ok((algebra, requests))
    }
}

impl Algebra {
    pub fn from_yaml(source: &str) -> Result<(Algebra, Vec<OperationRequest>)> {
        AlgebraDescription::from_yaml(source)?.build()
    }

    pub fn from_description(desc: &AlgebraDescription) -> Result<Algebra> {
        let n = desc.basis.len();
        if n == 0 || n > MAX_DIMENSION {
            bail_config!("basis must have between 1 and {} vectors, got {}", MAX_DIMENSION, n);
        }
        let mut seen = HashSet::new();
        for b in &desc.basis {
            check_identifier("basis vector", b)?;
            if !seen.insert(b.as_str()) {
                bail_config!("basis vector '{}' declared twice", b);
            }
        }

        let mut algebra = Algebra {
            name: desc.name.clone(),
            basis: desc.basis.clone(),
            metrics: Vec::new(),
            floats: Vec::new(),
            general: desc.general.clone(),
            outermorphism: desc.outermorphism.clone(),
            shapes: Vec::new(),
            convention: desc.convention,
            inline: desc.inline,
            emit_tests: desc.tests,
        };

        algebra.metrics = desc
            .metrics
            .iter()
            .map(|m| algebra.build_metric(m))
            .collect::<Result<_>>()?;
        if algebra.metrics.is_empty() {
            algebra.metrics.push(Metric::euclidean("default", n));
        }
        let mut metric_names = HashSet::new();
        for m in &algebra.metrics {
            check_identifier("metric", &m.name)?;
            if !metric_names.insert(m.name.clone()) {
                bail_config!("metric '{}' declared twice", m.name);
            }
        }

        if desc.floats.is_empty() {
            bail_config!("at least one float type is required");
        }
        for f in &desc.floats {
            if !f.suffix.is_empty() {
                let body = f.suffix.strip_prefix('_').unwrap_or("");
                if body.is_empty() || !body.chars().all(|c| c.is_ascii_alphanumeric()) {
                    bail_config!("float suffix '{}' must be '_' followed by letters or digits", f.suffix);
                }
            }
            if algebra.floats.iter().any(|p| p.suffix == f.suffix) {
                bail_config!("float suffix '{}' is used by more than one float type", f.suffix);
            }
            if algebra.floats.iter().any(|p| p.name == f.ty) {
                bail_config!("float type '{}' declared twice", f.ty);
            }
            let mut precision = FloatPrecision::new(&f.ty, &f.suffix);
            if let Some(t) = f.tolerance {
                precision.tolerance = t;
            }
            algebra.floats.push(precision);
        }

        for s in &desc.shapes {
            let shape = algebra.build_shape(s)?;
            algebra.shapes.push(shape);
        }
        algebra.check_type_names()?;
        Ok(algebra)
    }

    fn build_metric(&self, desc: &MetricDescription) -> Result<Metric> {
        let n = self.dimension();
        let diagonal = desc.diagonal.clone().unwrap_or_else(|| vec![1.0; n]);
        if diagonal.len() != n {
            bail_config!(
                "metric '{}' has {} diagonal entries for {} basis vectors",
                desc.name,
                diagonal.len(),
                n
            );
        }
        let mut matrix = vec![vec![0.0; n]; n];
        for (i, d) in diagonal.iter().enumerate() {
            matrix[i][i] = *d;
        }
        for entry in &desc.entries {
            let i = self.basis_index(&entry.a)?;
            let j = self.basis_index(&entry.b)?;
            matrix[i][j] = entry.value;
            matrix[j][i] = entry.value;
        }
        Metric::from_matrix(&desc.name, matrix, desc.round)
    }

    fn build_shape(&self, desc: &ShapeDescription) -> Result<Shape> {
        if desc.blades.is_empty() {
            bail_config!("shape '{}' has no blades", desc.name);
        }
        let mut blades: Vec<ShapeBlade> = Vec::new();
        for text in &desc.blades {
            let (blade_text, constant) = match text.split_once('=') {
                Some((b, v)) => {
                    let value: f64 = v.trim().parse().map_err(|_| {
                        crate::error::GenError::Config(format!(
                            "shape '{}': invalid constant '{}'",
                            desc.name, text
                        ))
                    })?;
                    (b.trim(), Some(value))
                }
                None => (text.trim(), None),
            };
            let (bitmap, sign) = self.parse_blade(blade_text)?;
            if blades.iter().any(|b| b.bitmap == bitmap) {
                bail_config!("shape '{}' lists blade '{}' twice", desc.name, blade_text);
            }
            blades.push(ShapeBlade { bitmap, sign, constant });
        }
        Ok(Shape { name: desc.name.clone(), blades })
    }

    fn check_type_names(&self) -> Result<()> {
        let mut names: Vec<&str> = vec![self.general.as_str()];
        names.extend(self.outermorphism.as_deref());
        names.extend(self.shapes.iter().map(|s| s.name.as_str()));

        let mut plain = HashSet::new();
        for name in &names {
            check_identifier("type", name)?;
            if self.float(name).is_some() || *name == SCALAR_TYPE {
                bail_config!("type '{}' clashes with a float type", name);
            }
            if self.floats.iter().any(|f| f.suffix.trim_start_matches('_') == *name) {
                bail_config!("type '{}' clashes with a float suffix", name);
            }
            if !plain.insert(*name) {
                bail_config!("type '{}' declared twice", name);
            }
        }

        let mut mangled = HashSet::new();
        for name in &names {
            for f in &self.floats {
                let m = f.mangle(name);
                if !mangled.insert(m.clone()) {
                    bail_config!("mangled type name '{}' is ambiguous", m);
                }
            }
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.basis.len()
    }

    pub fn blade_count(&self) -> usize {
        1 << self.dimension()
    }

    pub fn basis_index(&self, name: &str) -> Result<usize> {
        match self.basis.iter().position(|b| b == name) {
            Some(i) => Ok(i),
            None => bail_config!("unknown basis vector '{}'", name),
        }
    }

    /// Parse `e1^e2`-style blade text into a canonical bitmap and orientation.
    pub fn parse_blade(&self, text: &str) -> Result<(u32, f64)> {
        let text = text.trim();
        if text == SCALAR_TYPE || text == "1" {
            return Ok((0, 1.0));
        }
        let mut bitmap = 0u32;
        let mut sign = 1.0;
        for part in text.split('^') {
            let i = self.basis_index(part.trim())?;
            let bit = 1u32 << i;
            if bitmap & bit != 0 {
                bail_config!("blade '{}' repeats basis vector '{}'", text, part.trim());
            }
            sign *= blade::reordering_sign(bitmap, bit);
            bitmap |= bit;
        }
        Ok((bitmap, sign))
    }

    pub fn blade_name(&self, bitmap: u32) -> String {
        if bitmap == 0 {
            return SCALAR_TYPE.to_string();
        }
        (0..self.dimension())
            .filter(|i| bitmap & (1 << i) != 0)
            .map(|i| self.basis[i].as_str())
            .collect::<Vec<_>>()
            .join("^")
    }

    /// The metric named `name`, or the first declared metric for an empty name.
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        if name.is_empty() {
            return self.metrics.first();
        }
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn default_metric_name(&self) -> &str {
        self.metrics.first().map(|m| m.name.as_str()).unwrap_or("default")
    }

    pub fn float(&self, name: &str) -> Option<&FloatPrecision> {
        self.floats.iter().find(|f| f.name == name)
    }

    pub fn is_float_name(&self, name: &str) -> bool {
        name == SCALAR_TYPE || self.float(name).is_some()
    }

    pub fn shape(&self, name: &str) -> Option<(usize, &Shape)> {
        self.shapes.iter().enumerate().find(|(_, s)| s.name == name)
    }

    pub fn value_type(&self, name: &str) -> Option<ValueType> {
        if self.is_float_name(name) {
            Some(ValueType::Scalar)
        } else if name == self.general {
            Some(ValueType::General)
        } else if self.outermorphism.as_deref() == Some(name) {
            Some(ValueType::Outermorphism)
        } else {
            self.shape(name).map(|(i, _)| ValueType::Shape(i))
        }
    }

    /// Unmangled type name. Scalars are named after the float precision.
    pub fn type_name(&self, ty: ValueType, float: &FloatPrecision) -> String {
        match ty {
            ValueType::Scalar => float.name.clone(),
            ValueType::Shape(i) => self.shapes[i].name.clone(),
            ValueType::General => self.general.clone(),
            ValueType::Outermorphism => self.outermorphism.clone().unwrap_or_default(),
        }
    }

    pub fn mangled_type_name(&self, ty: ValueType, float: &FloatPrecision) -> String {
        match ty {
            ValueType::Scalar => float.name.clone(),
            _ => float.mangle(&self.type_name(ty, float)),
        }
    }

    fn request_from_description(&self, f: &FunctionDescription) -> Result<OperationRequest> {
        let mut request = OperationRequest::new(&f.name);
        if let Some(output) = &f.output {
            request.output_name = output.clone();
        }
        request.return_type = f.returns.clone().unwrap_or_default();
        request.argument_types = f.args.clone();
        request.argument_names = f.names.clone();
        request.by_ref = f.by_ref.clone();
        request.floats = if f.floats.is_empty() {
            self.floats.iter().map(|p| p.name.clone()).collect()
        } else {
            f.floats.clone()
        };
        for name in &request.floats {
            if self.float(name).is_none() {
                bail_config!("function '{}' uses undeclared float type '{}'", f.name, name);
            }
        }
        request.metric = f
            .metric
            .clone()
            .unwrap_or_else(|| self.default_metric_name().to_string());
        if self.metric(&request.metric).is_none() {
            bail_config!("function '{}' uses undeclared metric '{}'", f.name, request.metric);
        }
        request.comment = f.comment.clone().unwrap_or_default();
        request.options = f.options.clone();
        Ok(request)
    }
}

fn check_identifier(what: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    };
    if !valid {
        bail_config!("{} name '{}' must be alphanumeric and start with a letter", what, name);
    }
    Ok(())
}
