//! Per-run variable scope and reference resolution

use crate::core::value::Value;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{BTreeMap, HashMap};

/// Whole-string `${path}` with no nested `${`
static EXACT_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{([^${}]+)\}$").expect("valid exact template regex"));

/// Any `${path}` occurrence inside a larger string
static INLINE_TEMPLATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^${}]+)\}").expect("valid inline template regex"));

/// Key of a structured `{ $ref: path }` reference
const REF_KEY: &str = "$ref";

/// Variables visible to one pipeline run
///
/// Keys are dotted-path strings. Run inputs live under `inputs.<key>`,
/// step outputs under `$<output>` (plus `$<output>.<field>` for maps).
/// The scope is owned by exactly one run and dropped when it ends.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    variables: HashMap<String, Value>,
}

impl VariableScope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope seeded with run inputs as `inputs.<key>`
    pub fn seeded(inputs: &BTreeMap<String, Value>) -> Self {
        let mut scope = Self::new();
        for (key, value) in inputs {
            scope.set(format!("inputs.{}", key), value.clone());
        }
        scope
    }

    /// Set a variable
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    /// Get a variable by its exact key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Bind a single step output
    ///
    /// Writes `$<name>`, and for map outputs also `$<name>.<field>` for
    /// every top-level field.
    pub fn bind_output(&mut self, name: &str, output: Value) {
        if let Value::Map(fields) = &output {
            for (field, value) in fields {
                self.set(format!("${}.{}", name, field), value.clone());
            }
        }
        self.set(format!("${}", name), output);
    }

    /// Bind a batch output as one ordered list (no field flattening)
    pub fn bind_batch_output(&mut self, name: &str, outputs: Vec<Value>) {
        self.set(format!("${}", name), Value::List(outputs));
    }

    /// Look up a dotted path
    ///
    /// Tries the exact key first, then walks into the value of the longest
    /// existing prefix key (`$fetch.meta.author` finds `$fetch.meta` or
    /// `$fetch` and descends through map fields and list indices).
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.variables.get(path) {
            return Some(value);
        }

        let mut split = path.len();
        while let Some(dot) = path[..split].rfind('.') {
            if let Some(base) = self.variables.get(&path[..dot]) {
                return path[dot + 1..]
                    .split('.')
                    .try_fold(base, |value, segment| value.child(segment));
            }
            split = dot;
        }

        None
    }

    /// Resolve a `$`-prefixed reference, falling back to the bare path
    fn lookup_reference(&self, reference: &str) -> Option<&Value> {
        self.lookup(reference).or_else(|| {
            reference
                .strip_prefix('$')
                .filter(|bare| !bare.is_empty())
                .and_then(|bare| self.lookup(bare))
        })
    }

    /// Resolve a template or condition path: bare path first, then the
    /// `$`-prefixed form
    pub fn lookup_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        self.lookup(path)
            .or_else(|| self.lookup(&format!("${}", path)))
    }

    /// Resolve one declared step input value against the scope
    ///
    /// Unresolvable references come back as the original value, never an error.
    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::String(text) => self.resolve_text(text),
            Value::Map(map) => match structured_reference(map) {
                Some(path) => self
                    .lookup_reference(path)
                    .cloned()
                    .unwrap_or_else(|| value.clone()),
                None => value.clone(),
            },
            other => other.clone(),
        }
    }

    fn resolve_text(&self, text: &str) -> Value {
        if let Some(captures) = EXACT_TEMPLATE.captures(text) {
            return self
                .lookup_path(&captures[1])
                .cloned()
                .unwrap_or_else(|| Value::from(text));
        }

        if text.contains("${") {
            let rendered = INLINE_TEMPLATE.replace_all(text, |caps: &Captures| {
                match self.lookup_path(&caps[1]) {
                    Some(value) => value.render(),
                    None => caps[0].to_string(),
                }
            });
            return Value::String(rendered.into_owned());
        }

        if text.starts_with('$') {
            return self
                .lookup_reference(text)
                .cloned()
                .unwrap_or_else(|| Value::from(text));
        }

        Value::from(text)
    }

    /// Resolve every declared input of a step
    pub fn resolve_inputs(&self, inputs: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        inputs
            .iter()
            .map(|(key, value)| (key.clone(), self.resolve(value)))
            .collect()
    }

    /// Copy of all variables, sorted by key
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Extract the path from a `{ $ref: path }` map
fn structured_reference(map: &BTreeMap<String, Value>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.get(REF_KEY).and_then(Value::as_str)
}
