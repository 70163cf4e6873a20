//! Parameter values attached to elements, models and directives.

use std::fmt;

use serde::Serialize;

use crate::units::parse_value;

/// A value as written in a netlist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Numeric literal with its unit suffix already applied.
    Number(f64),
    /// Brace or quoted expression, kept symbolic.
    Expr(String),
    /// Anything else: keywords (`DC`, `AC`), function forms
    /// (`SIN(0 0.02 440)`), model or source names.
    Text(String),
}

impl Value {
    /// Classify a single netlist field.
    pub fn parse(field: &str) -> Self {
        let field = field.trim();
        if let Some(inner) = field
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            return Value::Expr(inner.trim().to_string());
        }
        for quote in ['\'', '"'] {
            if field.len() >= 2 && field.starts_with(quote) && field.ends_with(quote) {
                return Value::Expr(field[1..field.len() - 1].trim().to_string());
            }
        }
        match parse_value(field) {
            Some(v) => Value::Number(v),
            None => Value::Text(field.to_string()),
        }
    }

    /// Numeric value, if this is a literal.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text content, if this is a bare word.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Expr(e) => write!(f, "{{{}}}", e),
            Value::Text(t) => write!(f, "{}", t),
        }
    }
}

/// A `name=value` assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub value: Value,
}

impl Param {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Find a parameter by name, case-insensitively.
pub fn find_param<'a>(params: &'a [Param], name: &str) -> Option<&'a Value> {
    params
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .map(|p| &p.value)
}
