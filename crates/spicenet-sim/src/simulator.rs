//! [`Simulator`] implementation backed by an ngspice process.

use spicenet_core::netlist::write_netlist;
use spicenet_core::{AnalysisCommand, Circuit, OptionSetting, Simulator, Value, WaveformSet};

use crate::error::{Error, Result};
use crate::ngspice::{AnalysisType, NgspiceConfig, RawfileData, run_ngspice};

/// Runs analyses by handing the rendered netlist to ngspice.
#[derive(Debug, Clone, Default)]
pub struct NgspiceSimulator {
    config: NgspiceConfig,
}

impl NgspiceSimulator {
    pub fn new(config: NgspiceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NgspiceConfig {
        &self.config
    }

    /// Set the circuit temperature in °C.
    pub fn temperature(mut self, celsius: f64) -> Self {
        self.config.temperature = Some(celsius);
        self
    }

    /// Set the nominal temperature in °C.
    pub fn nominal_temperature(mut self, celsius: f64) -> Self {
        self.config.nominal_temperature = Some(celsius);
        self
    }

    /// Render the netlist ngspice is given for `analysis`.
    ///
    /// The circuit's own analysis cards are replaced by `analysis`; the
    /// configured temperatures are appended as `.options`.
    pub fn netlist(&self, circuit: &Circuit, analysis: &AnalysisCommand) -> Result<String> {
        let mut circuit = circuit.clone();
        let temperatures = [
            ("temp", self.config.temperature),
            ("tnom", self.config.nominal_temperature),
        ];
        for (name, celsius) in temperatures {
            if let Some(celsius) = celsius {
                circuit.add_option(OptionSetting {
                    name: name.to_string(),
                    value: Some(Value::Number(celsius)),
                });
            }
        }

        let mut text = String::new();
        write_netlist(&mut text, &circuit, std::slice::from_ref(analysis))
            .map_err(|e| Error::TempFile(format!("failed to render netlist: {}", e)))?;
        Ok(text)
    }
}

impl Simulator for NgspiceSimulator {
    type Error = Error;

    fn simulate(&self, circuit: &Circuit, analysis: &AnalysisCommand) -> Result<WaveformSet> {
        let netlist = self.netlist(circuit, analysis)?;
        log::info!(
            "simulating {} ({} elements) with ngspice: {}",
            circuit.title().unwrap_or("untitled circuit"),
            circuit.element_count(),
            analysis
        );

        let plots = run_ngspice(&netlist, &self.config)?;
        let waveforms = select_plot(&plots, analysis)?.to_waveforms();
        log::info!(
            "ngspice returned {} points for {} traces",
            waveforms.len(),
            waveforms.voltages.len() + waveforms.currents.len()
        );
        Ok(waveforms)
    }
}

/// The plot ngspice wrote for `analysis`. A `.dc` or `.tran` run may be
/// preceded by plots from opaque control commands.
fn select_plot<'a>(
    plots: &'a [RawfileData],
    analysis: &AnalysisCommand,
) -> Result<&'a RawfileData> {
    let wanted = AnalysisType::from(analysis);
    plots
        .iter()
        .rev()
        .find(|plot| plot.analysis_type() == wanted)
        .ok_or_else(|| {
            let found: Vec<&str> = plots.iter().map(|p| p.header.plotname.as_str()).collect();
            Error::RawfileParseError(format!(
                "no {} plot among [{}]",
                wanted.as_str(),
                found.join(", ")
            ))
        })
}
