//! Circuit elements: primitives and subcircuit instances.

use std::fmt;

use serde::Serialize;

use crate::NodeId;
use crate::value::{Param, Value};

/// The closed set of element kinds, keyed by reference-name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    CurrentSource,
    BehavioralSource,
    Diode,
    Bjt,
    Jfet,
    Mosfet,
    /// Voltage-controlled voltage source (E).
    Vcvs,
    /// Voltage-controlled current source (G).
    Vccs,
    /// Current-controlled current source (F).
    Cccs,
    /// Current-controlled voltage source (H).
    Ccvs,
    MutualInductance,
    SubcircuitInstance,
}

impl ElementKind {
    /// Reference-name prefix character for this kind.
    pub fn prefix(self) -> char {
        match self {
            ElementKind::Resistor => 'R',
            ElementKind::Capacitor => 'C',
            ElementKind::Inductor => 'L',
            ElementKind::VoltageSource => 'V',
            ElementKind::CurrentSource => 'I',
            ElementKind::BehavioralSource => 'B',
            ElementKind::Diode => 'D',
            ElementKind::Bjt => 'Q',
            ElementKind::Jfet => 'J',
            ElementKind::Mosfet => 'M',
            ElementKind::Vcvs => 'E',
            ElementKind::Vccs => 'G',
            ElementKind::Cccs => 'F',
            ElementKind::Ccvs => 'H',
            ElementKind::MutualInductance => 'K',
            ElementKind::SubcircuitInstance => 'X',
        }
    }

    /// Number of required node terminals, `None` for subcircuit instances.
    /// A BJT may carry a fourth, substrate node.
    pub fn node_count(self) -> Option<usize> {
        match self {
            ElementKind::Resistor
            | ElementKind::Capacitor
            | ElementKind::Inductor
            | ElementKind::VoltageSource
            | ElementKind::CurrentSource
            | ElementKind::BehavioralSource
            | ElementKind::Diode
            | ElementKind::Cccs
            | ElementKind::Ccvs => Some(2),
            ElementKind::Bjt | ElementKind::Jfet => Some(3),
            ElementKind::Mosfet | ElementKind::Vcvs | ElementKind::Vccs => Some(4),
            ElementKind::MutualInductance => Some(0),
            ElementKind::SubcircuitInstance => None,
        }
    }

    /// Whether the card names a `.model` after its nodes.
    pub fn takes_model(self) -> bool {
        matches!(
            self,
            ElementKind::Diode | ElementKind::Bjt | ElementKind::Jfet | ElementKind::Mosfet
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Resistor => "resistor",
            ElementKind::Capacitor => "capacitor",
            ElementKind::Inductor => "inductor",
            ElementKind::VoltageSource => "voltage source",
            ElementKind::CurrentSource => "current source",
            ElementKind::BehavioralSource => "behavioral source",
            ElementKind::Diode => "diode",
            ElementKind::Bjt => "bjt",
            ElementKind::Jfet => "jfet",
            ElementKind::Mosfet => "mosfet",
            ElementKind::Vcvs => "vcvs",
            ElementKind::Vccs => "vccs",
            ElementKind::Cccs => "cccs",
            ElementKind::Ccvs => "ccvs",
            ElementKind::MutualInductance => "mutual inductance",
            ElementKind::SubcircuitInstance => "subcircuit instance",
        };
        f.write_str(name)
    }
}

/// A circuit element that connects nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub kind: ElementKind,
    /// Reference name (`R1`, `X3`).
    pub name: String,
    /// Connected nodes in card order.
    pub nodes: Vec<NodeId>,
    /// Device model name, or the template name for subcircuit instances.
    pub model: Option<String>,
    /// Positional values after the nodes (and model).
    pub values: Vec<Value>,
    /// `name=value` assignments.
    pub params: Vec<Param>,
}

impl Element {
    /// Create an element with no model, values or parameters.
    pub fn new(kind: ElementKind, name: impl Into<String>, nodes: Vec<NodeId>) -> Self {
        Self {
            kind,
            name: name.into(),
            nodes,
            model: None,
            values: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Create a subcircuit instance of `template`.
    pub fn instance(name: impl Into<String>, nodes: Vec<NodeId>, template: &str) -> Self {
        let mut element = Self::new(ElementKind::SubcircuitInstance, name, nodes);
        element.model = Some(template.to_string());
        element
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values = values;
        self
    }

    pub fn with_params(mut self, params: Vec<Param>) -> Self {
        self.params = params;
        self
    }

    /// Template name for subcircuit instances.
    pub fn template(&self) -> Option<&str> {
        match self.kind {
            ElementKind::SubcircuitInstance => self.model.as_deref(),
            _ => None,
        }
    }

    /// The primary value (`100` in `R1 1 2 100`).
    pub fn value(&self) -> Option<&Value> {
        self.values.first()
    }

    pub fn is_instance(&self) -> bool {
        self.kind == ElementKind::SubcircuitInstance
    }
}
