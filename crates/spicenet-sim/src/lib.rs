//! ngspice backend for spicenet.
//!
//! [`NgspiceSimulator`] implements [`spicenet_core::Simulator`] by writing
//! the circuit out as a netlist, running `ngspice -b` on it and reading the
//! rawfile back into a [`WaveformSet`](spicenet_core::WaveformSet).
//!
//! ```no_run
//! use spicenet_core::AnalysisCommand;
//! use spicenet_sim::NgspiceSimulator;
//!
//! let circuit = spicenet_parser::parse("V1 1 0 5\nR1 1 2 1k\nR2 2 0 1k\n").unwrap();
//! let simulator = NgspiceSimulator::default();
//! let waves = circuit
//!     .simulate(&simulator, &AnalysisCommand::transient(1e-4, 3e-3))
//!     .unwrap();
//! println!("{:?}", waves["2"].real.last());
//! ```

pub mod error;
pub mod ngspice;
mod simulator;

pub use error::{Error, Result};
pub use ngspice::{
    AnalysisType, NgspiceConfig, RawVariable, RawfileData, RawfileHeader, is_ngspice_available,
    ngspice_version, parse_rawfile, parse_rawfile_plots, run_ngspice,
};
pub use simulator::NgspiceSimulator;
