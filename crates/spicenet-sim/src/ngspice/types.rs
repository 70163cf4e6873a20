//! Types for ngspice simulation results.

use spicenet_core::{AnalysisCommand, Quantity, Waveform, WaveformSet};

/// Analysis type parsed from rawfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    /// DC operating point.
    DcOp,
    /// DC sweep.
    DcSweep,
    /// AC analysis.
    Ac,
    /// Transient analysis.
    Transient,
}

impl AnalysisType {
    /// Short name used in [`WaveformSet::analysis`].
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisType::DcOp => "op",
            AnalysisType::DcSweep => "dc",
            AnalysisType::Ac => "ac",
            AnalysisType::Transient => "tran",
        }
    }
}

impl From<&AnalysisCommand> for AnalysisType {
    fn from(analysis: &AnalysisCommand) -> Self {
        match analysis {
            AnalysisCommand::Op => AnalysisType::DcOp,
            AnalysisCommand::Dc { .. } => AnalysisType::DcSweep,
            AnalysisCommand::Ac { .. } => AnalysisType::Ac,
            AnalysisCommand::Tran { .. } => AnalysisType::Transient,
        }
    }
}

/// A variable in the rawfile (column in the data).
#[derive(Debug, Clone)]
pub struct RawVariable {
    /// Variable index (0-based).
    pub index: usize,
    /// Variable name (e.g., "v(1)", "i(v1)", "v1#branch").
    pub name: String,
    /// Variable type (e.g., "voltage", "current", "time", "frequency").
    pub var_type: String,
}

impl RawVariable {
    /// Node or element this variable traces, with ngspice decoration
    /// (`v(..)`, `i(..)`, `#branch`) removed.
    pub fn target(&self) -> &str {
        let name = self.name.as_str();
        let unwrapped = ["v(", "V(", "i(", "I("]
            .iter()
            .find_map(|open| name.strip_prefix(open))
            .and_then(|inner| inner.strip_suffix(')'));
        if let Some(inner) = unwrapped {
            return inner;
        }
        name.strip_suffix("#branch").unwrap_or(name)
    }

    pub fn quantity(&self) -> Quantity {
        if self.name.ends_with("#branch") {
            return Quantity::Current;
        }
        Quantity::from_type_name(&self.var_type)
    }
}

/// Parsed rawfile header information.
#[derive(Debug, Clone, Default)]
pub struct RawfileHeader {
    /// Title of the simulation.
    pub title: String,
    /// Plot name (e.g., "DC transfer characteristic", "AC Analysis").
    pub plotname: String,
    /// Flags (e.g., "real", "complex").
    pub flags: String,
    pub num_variables: usize,
    pub num_points: usize,
    pub variables: Vec<RawVariable>,
    /// Whether data is complex (AC analysis).
    pub is_complex: bool,
    /// Whether data is binary format.
    pub is_binary: bool,
}

/// Result of parsing a rawfile.
#[derive(Debug, Clone)]
pub struct RawfileData {
    pub header: RawfileHeader,
    /// Real data values (num_points x num_variables).
    /// For complex data, this contains only the real parts.
    pub real_data: Vec<Vec<f64>>,
    /// Imaginary data values (only for complex data).
    pub imag_data: Option<Vec<Vec<f64>>>,
}

impl RawfileData {
    /// Get the analysis type from the plotname.
    pub fn analysis_type(&self) -> AnalysisType {
        let plotname = self.header.plotname.to_lowercase();
        if plotname.contains("operating point") {
            AnalysisType::DcOp
        } else if plotname.contains("dc transfer") || plotname.contains("dc analysis") {
            AnalysisType::DcSweep
        } else if plotname.contains("ac analysis") {
            AnalysisType::Ac
        } else if plotname.contains("transient") {
            AnalysisType::Transient
        } else {
            AnalysisType::DcOp
        }
    }

    /// Find a variable by name (case-insensitive).
    pub fn find_variable(&self, name: &str) -> Option<&RawVariable> {
        self.header
            .variables
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Get real values for a variable across all points.
    pub fn get_real_values(&self, var_index: usize) -> Option<Vec<f64>> {
        if var_index >= self.header.num_variables {
            return None;
        }
        self.real_data
            .iter()
            .map(|row| row.get(var_index).copied())
            .collect()
    }

    /// Get imaginary values for a variable, for complex plots only.
    pub fn get_imag_values(&self, var_index: usize) -> Option<Vec<f64>> {
        if var_index >= self.header.num_variables {
            return None;
        }
        self.imag_data
            .as_ref()?
            .iter()
            .map(|row| row.get(var_index).copied())
            .collect()
    }

    /// Convert the plot into a waveform set keyed by node and element name.
    ///
    /// Every plot but the operating point has its first variable as the
    /// sweep (time, frequency or the swept source).
    pub fn to_waveforms(&self) -> WaveformSet {
        let analysis = self.analysis_type();
        let mut set = WaveformSet::new(analysis.as_str());

        for var in &self.header.variables {
            let Some(real) = self.get_real_values(var.index) else {
                continue;
            };
            let waveform = Waveform {
                name: var.target().to_string(),
                quantity: var.quantity(),
                real,
                imag: self.get_imag_values(var.index),
            };

            if var.index == 0 && analysis != AnalysisType::DcOp {
                set.sweep = Some(waveform);
                continue;
            }
            match waveform.quantity {
                Quantity::Current => {
                    set.currents.insert(waveform.name.clone(), waveform);
                }
                _ => {
                    set.voltages.insert(waveform.name.clone(), waveform);
                }
            }
        }
        set
    }
}
