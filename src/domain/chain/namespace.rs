//! Execution namespace and token interpolation
//!
//! The namespace maps names to values: `input` holds the initial input and every
//! completed step adds its output locator under its own name. Parameter strings
//! refer to namespace entries with tokens:
//! - `{{input}}` - the initial input
//! - `{{input.field.0}}` - a nested field of a structured initial input
//! - `{{step}}` / `{{step.output}}` - a step's output locator
//!
//! A parameter that is exactly one token takes the referenced value as-is;
//! tokens embedded in longer strings are substituted as text.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Namespace key of the initial input
pub const INPUT_KEY: &str = "input";

/// Segment selecting a step's output, accepted for readability
const OUTPUT_SEGMENT: &str = "output";

/// `{{root}}` or `{{root.path.to.field}}`
static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_-]+)((?:\.[A-Za-z0-9_-]+)*)\s*\}\}").unwrap()
});

/// A string consisting of a single token and nothing else
static SOLE_TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\{\{\s*([A-Za-z0-9_-]+)((?:\.[A-Za-z0-9_-]+)*)\s*\}\}\s*$").unwrap()
});

/// A token that could not be resolved against the namespace
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unresolved reference {token}: {reason}")]
pub struct InterpolationError {
    pub token: String,
    pub reason: String,
}

impl InterpolationError {
    fn new(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            reason: reason.into(),
        }
    }
}

/// Growing name-to-output map available to later steps
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    values: BTreeMap<String, Value>,
}

impl Namespace {
    /// Seed a namespace with the initial input
    pub fn new(initial_input: Value) -> Self {
        let mut values = BTreeMap::new();
        values.insert(INPUT_KEY.to_string(), initial_input);
        Self { values }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn input(&self) -> &Value {
        self.values.get(INPUT_KEY).unwrap_or(&Value::Null)
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.values
    }

    /// Resolve every token inside `value`, recursing into arrays and objects
    pub fn interpolate(&self, value: &Value) -> Result<Value, InterpolationError> {
        match value {
            Value::String(template) => self.interpolate_str(template),
            Value::Array(items) => items
                .iter()
                .map(|item| self.interpolate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(fields) => {
                let mut resolved = serde_json::Map::with_capacity(fields.len());

                for (key, field) in fields {
                    resolved.insert(key.clone(), self.interpolate(field)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolve tokens in a template string
    fn interpolate_str(&self, template: &str) -> Result<Value, InterpolationError> {
        if let Some(caps) = SOLE_TOKEN_PATTERN.captures(template) {
            let full = caps.get(0).map_or(template, |m| m.as_str().trim());
            let root = caps.get(1).map_or("", |m| m.as_str());
            let path = caps.get(2).map_or("", |m| m.as_str());

            return self.resolve_token(full, root, path).cloned();
        }

        let mut result = String::with_capacity(template.len());
        let mut last = 0;

        for caps in TOKEN_PATTERN.captures_iter(template) {
            let Some(full) = caps.get(0) else { continue };
            let root = caps.get(1).map_or("", |m| m.as_str());
            let path = caps.get(2).map_or("", |m| m.as_str());

            let value = self.resolve_token(full.as_str(), root, path)?;

            result.push_str(&template[last..full.start()]);
            result.push_str(&value_to_string(value));
            last = full.end();
        }

        result.push_str(&template[last..]);
        Ok(Value::String(result))
    }

    fn resolve_token(&self, token: &str, root: &str, path: &str) -> Result<&Value, InterpolationError> {
        let base = self.values.get(root).ok_or_else(|| {
            InterpolationError::new(token, format!("'{}' is not in the namespace", root))
        })?;

        let mut segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();

        if root != INPUT_KEY && segments.first() == Some(&OUTPUT_SEGMENT) {
            segments.remove(0);
        }

        get_nested_field(base, &segments).ok_or_else(|| {
            InterpolationError::new(
                token,
                format!("field '{}' not found in '{}'", segments.join("."), root),
            )
        })
    }
}

/// Names referenced by tokens anywhere inside `value`
pub fn token_roots(value: &Value) -> BTreeSet<String> {
    let mut roots = BTreeSet::new();
    collect_token_roots(value, &mut roots);
    roots
}

fn collect_token_roots(value: &Value, roots: &mut BTreeSet<String>) {
    match value {
        Value::String(template) => {
            for caps in TOKEN_PATTERN.captures_iter(template) {
                if let Some(root) = caps.get(1) {
                    roots.insert(root.as_str().to_string());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_token_roots(item, roots)),
        Value::Object(fields) => fields
            .values()
            .for_each(|field| collect_token_roots(field, roots)),
        _ => {}
    }
}

/// Walk a JSON value along dotted segments
fn get_nested_field<'a>(value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let mut current = value;

    for segment in segments {
        match current {
            Value::Object(obj) => {
                current = obj.get(*segment)?;
            }
            Value::Array(arr) => {
                let index: usize = segment.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Convert a JSON value to a string representation
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),

        // For arrays and objects, use JSON representation
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
