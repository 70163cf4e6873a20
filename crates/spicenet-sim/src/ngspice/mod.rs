//! ngspice process runner and rawfile reader.

mod rawfile;
mod runner;
mod types;

pub use rawfile::{parse_rawfile, parse_rawfile_plots};
pub use runner::{NgspiceConfig, is_ngspice_available, ngspice_version, run_ngspice};
pub use types::{AnalysisType, RawVariable, RawfileData, RawfileHeader};
