//! Interface to the external solver and the waveforms it returns.

use indexmap::IndexMap;
use serde::Serialize;

use crate::analysis::AnalysisCommand;
use crate::circuit::Circuit;

/// An external engine that runs an analysis on a finished circuit.
///
/// Calls may block for a long time; callers that need to stay responsive
/// should run them on a worker thread.
pub trait Simulator {
    type Error;

    fn simulate(
        &self,
        circuit: &Circuit,
        analysis: &AnalysisCommand,
    ) -> Result<WaveformSet, Self::Error>;
}

/// Physical quantity of a waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantity {
    Voltage,
    Current,
    Time,
    Frequency,
    Other,
}

impl Quantity {
    /// Map a rawfile variable type (`voltage`, `time`, ...) to a quantity.
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "voltage" => Quantity::Voltage,
            "current" => Quantity::Current,
            "time" => Quantity::Time,
            "frequency" => Quantity::Frequency,
            _ => Quantity::Other,
        }
    }
}

/// One sampled trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waveform {
    pub name: String,
    pub quantity: Quantity,
    pub real: Vec<f64>,
    /// Imaginary parts for AC results.
    pub imag: Option<Vec<f64>>,
}

impl Waveform {
    pub fn real(name: impl Into<String>, quantity: Quantity, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            quantity,
            real: values,
            imag: None,
        }
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty()
    }

    /// Magnitude at each point.
    pub fn magnitude(&self) -> Vec<f64> {
        match &self.imag {
            Some(imag) => self
                .real
                .iter()
                .zip(imag)
                .map(|(re, im)| re.hypot(*im))
                .collect(),
            None => self.real.iter().map(|v| v.abs()).collect(),
        }
    }
}

/// Result of one analysis.
///
/// Node voltages are keyed by node name (`"2"`, `"out"`), branch currents
/// by the name of the element carrying them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformSet {
    /// Analysis kind (`op`, `dc`, `ac`, `tran`).
    pub analysis: String,
    /// Sweep variable: time, frequency or swept source value.
    pub sweep: Option<Waveform>,
    pub voltages: IndexMap<String, Waveform>,
    pub currents: IndexMap<String, Waveform>,
}

impl WaveformSet {
    pub fn new(analysis: impl Into<String>) -> Self {
        Self {
            analysis: analysis.into(),
            sweep: None,
            voltages: IndexMap::new(),
            currents: IndexMap::new(),
        }
    }

    /// Voltage trace of a node, case-insensitively.
    pub fn voltage(&self, node: &str) -> Option<&Waveform> {
        lookup(&self.voltages, node)
    }

    /// Branch current through an element, case-insensitively.
    pub fn current(&self, element: &str) -> Option<&Waveform> {
        lookup(&self.currents, element)
    }

    pub fn len(&self) -> usize {
        self.sweep.as_ref().map_or_else(
            || self.voltages.values().next().map_or(0, Waveform::len),
            Waveform::len,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::ops::Index<&str> for WaveformSet {
    type Output = Waveform;

    /// Panics when the node has no trace; [`WaveformSet::voltage`] returns
    /// an `Option` instead.
    fn index(&self, node: &str) -> &Waveform {
        match self.voltage(node) {
            Some(w) => w,
            None => panic!("no voltage waveform for node {node}"),
        }
    }
}

fn lookup<'a>(map: &'a IndexMap<String, Waveform>, name: &str) -> Option<&'a Waveform> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, w)| w)
    })
}
