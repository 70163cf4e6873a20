//! Core circuit representation for spicenet.
//!
//! This crate provides the data structures a parsed netlist resolves to:
//! nodes and their canonical ids, elements, device models, the subcircuit
//! registry, analysis requests, and the [`Simulator`] interface through
//! which an external engine turns a [`Circuit`] into waveforms.

pub mod analysis;
pub mod circuit;
pub mod element;
pub mod error;
pub mod flatten;
pub mod model;
pub mod netlist;
pub mod node;
pub mod simulate;
pub mod subcircuit;
pub mod units;
pub mod value;

pub use analysis::{AcSweepType, AnalysisCommand, DcSweepSpec, InitialCondition};
pub use circuit::{Circuit, Include, OpaqueDirective, OptionSetting};
pub use element::{Element, ElementKind};
pub use error::{Error, Result};
pub use model::Model;
pub use node::{Node, NodeId, NodeTable};
pub use simulate::{Quantity, Simulator, Waveform, WaveformSet};
pub use subcircuit::{SubcircuitRegistry, SubcircuitTemplate, TemplateBuilder};
pub use value::{Param, Value};
