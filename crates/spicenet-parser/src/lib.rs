//! SPICE netlist parser for spicenet.
//!
//! Netlist text goes through the [`Tokenizer`] (logical lines), the card
//! parser ([`parse_card`]) and the [`CircuitBuilder`], which resolves node
//! names, subcircuit templates and library references into a
//! [`Circuit`](spicenet_core::Circuit).
//!
//! # Example
//!
//! ```
//! use spicenet_parser::parse;
//!
//! let circuit = parse(r#"
//! * voltage divider
//! V1 1 0 5
//! R1 1 2 100
//! R2 2 0 50
//! .end
//! "#).unwrap();
//!
//! assert_eq!(circuit.node_count(), 3);
//! assert_eq!(circuit.element_count(), 3);
//! ```

use std::fs;
use std::path::Path;

use spicenet_core::Circuit;

pub mod builder;
pub mod card;
pub mod error;
pub mod fields;
pub mod resolver;
pub mod tokenizer;

pub use builder::CircuitBuilder;
pub use card::{Card, Directive, ElementCard, parse_card};
pub use error::{Error, Location, Result};
pub use resolver::{Library, LibraryIndex, LibraryRef, Resolver};
pub use tokenizer::{LogicalLine, Tokenizer};

/// Parse netlist text with libraries resolved from the current directory.
pub fn parse(input: &str) -> Result<Circuit> {
    let resolver = Resolver::default();
    CircuitBuilder::new(&resolver).build(input)
}

/// Read and parse a netlist file.
pub fn parse_file(path: impl AsRef<Path>, resolver: &Resolver) -> Result<Circuit> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    CircuitBuilder::new(resolver).file(path).build(&text)
}
