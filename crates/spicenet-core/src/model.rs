//! Device models from `.model` cards.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::value::Param;

/// A named device model (`.model D1N4148 D(IS=2.52n)`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub name: String,
    /// Model type as written: `D`, `NPN`, `NMOS`, ...
    pub kind: String,
    pub params: Vec<Param>,
    /// Library file the model was loaded from, `None` if defined inline.
    pub source: Option<PathBuf>,
}

impl Model {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            params,
            source: None,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".model {} {}", self.name, self.kind)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, "({})", params.join(" "))?;
        }
        Ok(())
    }
}
