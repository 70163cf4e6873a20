//! # spicenet
//!
//! SPICE netlist parsing and circuit-graph building.
//!
//! spicenet turns netlist text (for example the output of a schematic
//! editor) into a [`Circuit`]: canonical nodes, elements, device models and
//! a registry of subcircuit templates. Subcircuits and models the netlist
//! only names are pulled lazily from library files through a [`Resolver`].
//! The finished circuit can be flattened, written back out as netlist text
//! or handed to a [`Simulator`].
//!
//! ## Quick Start
//!
//! ```rust
//! use spicenet::prelude::*;
//!
//! let circuit = parse("V1 1 0 DC 10\nR1 1 2 1k\nR2 2 0 1k\n.op\n.end\n").unwrap();
//! assert_eq!(circuit.node_count(), 3);
//! assert_eq!(circuit.analyses(), &[AnalysisCommand::Op]);
//! ```
//!
//! ## Libraries and ground remapping
//!
//! ```rust,no_run
//! use spicenet::prelude::*;
//!
//! let resolver = Resolver::new("libraries");
//! let opamp = resolver.locate("LMV981")?.expect("LMV981 in library");
//! let mut circuit = CircuitBuilder::new(&resolver)
//!     .ground("5")
//!     .include(opamp)
//!     .build(&std::fs::read_to_string("pedal.cir")?)?;
//! circuit.set_temperature(25.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Features
//!
//! - `ngspice` (default) - [`NgspiceSimulator`], a [`Simulator`] that runs
//!   an external ngspice process

pub use spicenet_core as core;
pub use spicenet_parser as parser;
#[cfg(feature = "ngspice")]
pub use spicenet_sim as sim;

pub use spicenet_core::{
    AcSweepType, AnalysisCommand, Circuit, DcSweepSpec, Element, ElementKind,
    Error as CircuitError, Include, InitialCondition, Model, Node, NodeId, OpaqueDirective,
    OptionSetting, Param, Quantity, Simulator, SubcircuitRegistry, SubcircuitTemplate,
    TemplateBuilder, Value, Waveform, WaveformSet,
};

pub use spicenet_parser::{
    CircuitBuilder, Error as ParseError, Library, LibraryIndex, LibraryRef, Location, Resolver,
    parse, parse_file,
};

#[cfg(feature = "ngspice")]
pub use spicenet_sim::{Error as SimulationError, NgspiceConfig, NgspiceSimulator};

/// Prelude module containing commonly used types and traits.
///
/// ```rust
/// use spicenet::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Circuit, Element, ElementKind, Node, NodeId, SubcircuitTemplate, Value};

    pub use crate::{CircuitBuilder, Resolver, parse, parse_file};

    pub use crate::{AnalysisCommand, Simulator, WaveformSet};

    #[cfg(feature = "ngspice")]
    pub use crate::NgspiceSimulator;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_circuit() {
        let circuit = parse("V1 1 0 DC 5\nR1 1 0 1k\n.op\n.end\n").unwrap();
        assert_eq!(circuit.node_count(), 2);
        assert_eq!(circuit.element_count(), 2);
        assert_eq!(circuit.analyses(), &[AnalysisCommand::Op]);
    }

    #[test]
    fn test_parse_error_reexport() {
        let err = parse("X1 a b NOPE\n").unwrap_err();
        assert!(matches!(err, ParseError::UndefinedSubcircuit { .. }));
    }

    #[test]
    fn test_template_builder() {
        let template = SubcircuitTemplate::builder("JackOut", ["output", "x", "ground"])
            .element(
                ElementKind::Resistor,
                "Rload",
                ["output", "x"],
                vec![Value::Number(10.0)],
            )
            .build();
        assert_eq!(template.arity(), 3);
        assert_eq!(template.elements.len(), 1);
    }
}
