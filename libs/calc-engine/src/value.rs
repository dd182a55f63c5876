//! Runtime value and variable environment (§3, §6).
//!
//! `Value` is the evaluator's result type and the only type that crosses
//! the `Calculate`/`CalculateMultiStep` boundary in either direction.
//! `Environment` is a plain string-keyed map rather than the upstream
//! crate's ID-interned `VariableRegistry`: this engine has no persistent
//! compiled-plan slots to intern into, every lookup is by name against a
//! request-scoped map, so the extra indirection would buy nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A runtime value. `Null` exists only as the result of no operation this
/// engine performs today, but is carried in the public boundary type per
/// §3 so a future built-in (or `RegisterFunction` caller) can produce one
/// without an API break.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Number(f64),
    Boolean(bool),
    String(String),
    Null,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Null => "null",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Null => write!(f, "null"),
        }
    }
}

/// A variable environment: a name-keyed map of bound values, consulted by
/// the evaluator for `Variable` nodes. `BTreeMap` keeps iteration
/// (serialization, `visualize` dumps) in a deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    bindings: BTreeMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.set(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }
}

impl From<BTreeMap<String, Value>> for Environment {
    fn from(bindings: BTreeMap<String, Value>) -> Self {
        Self { bindings }
    }
}
