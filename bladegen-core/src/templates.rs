//! Named templates for generic implementations and test functions.
//!
//! Templates use `${name}` placeholders. A value spanning several lines keeps
//! the indentation of the line its placeholder sits on.

use std::collections::{BTreeMap, HashMap};

use crate::bail_render;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateParams(BTreeMap<String, String>);

impl TemplateParams {
    pub fn new() -> Self {
        TemplateParams::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

pub trait TemplateRenderer: Send + Sync {
    /// Append the rendering of `template` to `out`.
    fn render(&self, out: &mut String, template: &str, params: &TemplateParams) -> Result<()>;
}

pub struct BuiltinTemplates {
    templates: HashMap<&'static str, &'static str>,
}

impl Default for BuiltinTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinTemplates {
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        for (name, text) in C_TEMPLATES {
            templates.insert(*name, *text);
        }
        for (name, text) in MANAGED_TEMPLATES {
            templates.insert(*name, *text);
        }
        BuiltinTemplates { templates }
    }

    pub fn names(&self) -> impl Iterator<Item = &&'static str> {
        self.templates.keys()
    }
}

impl TemplateRenderer for BuiltinTemplates {
    fn render(&self, out: &mut String, template: &str, params: &TemplateParams) -> Result<()> {
        let text = match self.templates.get(template) {
            Some(text) => *text,
            None => bail_render!("template '{}' not found", template),
        };
        substitute(out, template, text, params)
    }
}

fn substitute(out: &mut String, template: &str, text: &str, params: &TemplateParams) -> Result<()> {
    for line in text.lines() {
        let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
        let mut rest = line;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = match after.find('}') {
                Some(end) => end,
                None => bail_render!("unterminated placeholder in template '{}'", template),
            };
            let key = &after[..end];
            let value = match params.get(key) {
                Some(value) => value,
                None => bail_render!("template '{}' needs parameter '{}'", template, key),
            };
            let mut lines = value.lines();
            if let Some(first) = lines.next() {
                out.push_str(first);
            }
            for next in lines {
                out.push('\n');
                if !next.is_empty() {
                    out.push_str(&indent);
                }
                out.push_str(next);
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out.push('\n');
    }
    Ok(())
}

const C_TEMPLATES: &[(&str, &str)] = &[
    (
        "c.bilinear",
        r#"static const int ti[] = {${ti}};
static const int tj[] = {${tj}};
static const int tk[] = {${tk}};
static const ${F} ts[] = {${ts}};
${declR}
int t;
for (t = 0; t < ${N}; t++) r.c[t] = ${zero};
for (t = 0; t < ${NT}; t++) {
    r.c[tk[t]] += ts[t] * ${a}c[ti[t]] * ${b}c[tj[t]];
}
${ret}"#,
    ),
    (
        "c.bilinearScalar",
        r#"static const int ti[] = {${ti}};
static const int tj[] = {${tj}};
static const ${F} ts[] = {${ts}};
${F} r = ${zero};
int t;
for (t = 0; t < ${NT}; t++) {
    r += ts[t] * ${a}c[ti[t]] * ${b}c[tj[t]];
}
return ${result};"#,
    ),
    (
        "c.linear",
        r#"static const int ti[] = {${ti}};
static const int tk[] = {${tk}};
static const ${F} ts[] = {${ts}};
${declR}
int t;
for (t = 0; t < ${N}; t++) r.c[t] = ${zero};
for (t = 0; t < ${NT}; t++) {
    r.c[tk[t]] += ts[t] * ${a}c[ti[t]];
}
${ret}"#,
    ),
    (
        "c.coordinateWise",
        r#"${prelude}
${declR}
int i;
for (i = 0; i < ${N}; i++) {
    r.c[i] = ${expr};
}
${post}
${ret}"#,
    ),
    (
        "c.reduceBool",
        r#"int i;
for (i = 0; i < ${N}; i++) {
    ${F} d = ${expr};
    if ((d < -${eps}) || (d > ${eps})) return ${false};
}
return ${true};"#,
    ),
    (
        "c.gradeBitmap",
        r#"static const int grades[] = {${grades}};
int bm = 0;
int i;
for (i = 0; i < ${N}; i++) {
    ${F} v = ${a}c[i];
    if ((v < -${eps}) || (v > ${eps})) bm |= 1 << grades[i];
}
return bm;"#,
    ),
    (
        "c.random",
        r#"${declR}
int i;
for (i = 0; i < ${N}; i++) {
    r.c[i] = ${scale} * (${F})(2.0 * ${source}() - 1.0);
}
${ret}"#,
    ),
    (
        "c.randomProduct",
        r#"${declR}
${declV}
${declT}
int i, k;
for (i = 0; i < ${N}; i++) r.c[i] = ${zero};
${initR}
for (k = 1; k < ${dim}; k++) {
    for (i = 0; i < ${N}; i++) v.c[i] = ${zero};
    ${setV}
    ${product}
    r = t;
}
${ret}"#,
    ),
    (
        "c.series",
        r#"${declTerm}
${declResult}
${declTmp}
int k;
${initTerm}
${initResult}
for (k = 2; k <= ${order}; k++) {
    ${step}
    ${scale}
    if (${include}) {
        ${accumulate}
    }
}
${ret}"#,
    ),
    (
        "c.applyOM",
        r#"${declR}
int i, j;
for (i = 0; i < ${N}; i++) r.c[i] = ${zero};
r.c[0] = ${a}c[0];
${grades}
${ret}"#,
    ),
    (
        "c.omGrade",
        r#"{
    static const int idx${g}[] = {${idx}};
    for (i = 0; i < ${k}; i++) {
        for (j = 0; j < ${k}; j++) {
            r.c[idx${g}[i]] += ${om}m${g}[i * ${k} + j] * ${a}c[idx${g}[j]];
        }
    }
}"#,
    ),
    (
        "c.testLoop",
        r#"${decls}
int i;
for (i = 0; i < ${loops}; i++) {
    ${body}
}
return ${true};"#,
    ),
];

const MANAGED_TEMPLATES: &[(&str, &str)] = &[
    (
        "managed.bilinear",
        r#"int[] ti = {${ti}};
int[] tj = {${tj}};
int[] tk = {${tk}};
${F}[] ts = {${ts}};
${declR}
for (int t = 0; t < ${NT}; t++) {
    r.c[tk[t]] += ts[t] * ${a}c[ti[t]] * ${b}c[tj[t]];
}
${ret}"#,
    ),
    (
        "managed.bilinearScalar",
        r#"int[] ti = {${ti}};
int[] tj = {${tj}};
${F}[] ts = {${ts}};
${F} r = ${zero};
for (int t = 0; t < ${NT}; t++) {
    r += ts[t] * ${a}c[ti[t]] * ${b}c[tj[t]];
}
return ${result};"#,
    ),
    (
        "managed.linear",
        r#"int[] ti = {${ti}};
int[] tk = {${tk}};
${F}[] ts = {${ts}};
${declR}
for (int t = 0; t < ${NT}; t++) {
    r.c[tk[t]] += ts[t] * ${a}c[ti[t]];
}
${ret}"#,
    ),
    (
        "managed.coordinateWise",
        r#"${prelude}
${declR}
for (int i = 0; i < ${N}; i++) {
    r.c[i] = ${expr};
}
${post}
${ret}"#,
    ),
    (
        "managed.reduceBool",
        r#"for (int i = 0; i < ${N}; i++) {
    ${F} d = ${expr};
    if ((d < -${eps}) || (d > ${eps})) return ${false};
}
return ${true};"#,
    ),
    (
        "managed.gradeBitmap",
        r#"int[] grades = {${grades}};
int bm = 0;
for (int i = 0; i < ${N}; i++) {
    ${F} v = ${a}c[i];
    if ((v < -${eps}) || (v > ${eps})) bm |= 1 << grades[i];
}
return bm;"#,
    ),
    (
        "managed.random",
        r#"${declR}
for (int i = 0; i < ${N}; i++) {
    r.c[i] = ${scale} * (${F})(2.0 * ${source}() - 1.0);
}
${ret}"#,
    ),
    (
        "managed.randomProduct",
        r#"${declR}
${declV}
${declT}
${initR}
for (int k = 1; k < ${dim}; k++) {
    v = new ${T}();
    ${setV}
    ${product}
    r = t;
}
${ret}"#,
    ),
    (
        "managed.series",
        r#"${declTerm}
${declResult}
${declTmp}
${initTerm}
${initResult}
for (int k = 2; k <= ${order}; k++) {
    ${step}
    ${scale}
    if (${include}) {
        ${accumulate}
    }
}
${ret}"#,
    ),
    (
        "managed.applyOM",
        r#"${declR}
r.c[0] = ${a}c[0];
${grades}
${ret}"#,
    ),
    (
        "managed.omGrade",
        r#"{
    int[] idx${g} = {${idx}};
    for (int i = 0; i < ${k}; i++) {
        for (int j = 0; j < ${k}; j++) {
            r.c[idx${g}[i]] += ${om}m${g}[i * ${k} + j] * ${a}c[idx${g}[j]];
        }
    }
}"#,
    ),
    (
        "managed.testLoop",
        r#"${decls}
for (int i = 0; i < ${loops}; i++) {
    ${body}
}
return ${true};"#,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_and_indents() {
        let templates = BuiltinTemplates::new();
        let params = TemplateParams::new()
            .set("decls", "int x;")
            .set("loops", "10")
            .set("body", "x = 1;\nx = 2;")
            .set("true", "1");
        let mut out = String::new();
        templates.render(&mut out, "c.testLoop", &params).unwrap();
        assert!(out.contains("for (i = 0; i < 10; i++) {\n    x = 1;\n    x = 2;\n}"));
        assert!(out.ends_with("return 1;\n"));
    }

    #[test]
    fn test_missing_template() {
        let templates = BuiltinTemplates::new();
        let mut out = String::new();
        let err = templates.render(&mut out, "c.nothing", &TemplateParams::new()).unwrap_err();
        assert!(matches!(err, crate::error::GenError::Render(_)));
    }

    #[test]
    fn test_missing_parameter() {
        let templates = BuiltinTemplates::new();
        let mut out = String::new();
        let params = TemplateParams::new().set("decls", "");
        assert!(templates.render(&mut out, "c.testLoop", &params).is_err());
    }

    #[test]
    fn test_every_family_has_the_same_templates() {
        let templates = BuiltinTemplates::new();
        for name in templates.names() {
            let (family, base) = name.split_once('.').unwrap();
            let other = if family == "c" { "managed" } else { "c" };
            assert!(
                templates.templates.contains_key(format!("{}.{}", other, base).as_str()),
                "{} has no {} counterpart",
                name,
                other
            );
        }
    }
}
