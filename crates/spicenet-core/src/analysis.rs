//! Analysis requests handed to the external solver.

use std::fmt;

use serde::Serialize;

/// AC sweep type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcSweepType {
    /// Linear frequency spacing.
    Lin,
    /// Logarithmic spacing per decade.
    Dec,
    /// Logarithmic spacing per octave.
    Oct,
}

impl fmt::Display for AcSweepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AcSweepType::Lin => "lin",
            AcSweepType::Dec => "dec",
            AcSweepType::Oct => "oct",
        })
    }
}

/// A single DC sweep specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DcSweepSpec {
    /// Name of the source to sweep.
    pub source_name: String,
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

/// An analysis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisCommand {
    /// DC operating point (.OP).
    Op,
    /// DC sweep (.DC source start stop step [source2 start2 stop2 step2]).
    ///
    /// The first sweep is the outer one.
    Dc { sweeps: Vec<DcSweepSpec> },
    /// AC sweep (.AC type npoints fstart fstop).
    Ac {
        sweep_type: AcSweepType,
        num_points: usize,
        fstart: f64,
        fstop: f64,
    },
    /// Transient analysis (.TRAN tstep tstop \[tstart \[tmax\]\] \[UIC\]).
    Tran {
        tstep: f64,
        tstop: f64,
        tstart: f64,
        tmax: Option<f64>,
        /// Skip the operating point and start from `.IC` values.
        uic: bool,
    },
}

impl AnalysisCommand {
    /// Transient analysis from 0 to `end` with the given step.
    pub fn transient(step: f64, end: f64) -> Self {
        AnalysisCommand::Tran {
            tstep: step,
            tstop: end,
            tstart: 0.0,
            tmax: None,
            uic: false,
        }
    }

    /// Short name of the analysis kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisCommand::Op => "op",
            AnalysisCommand::Dc { .. } => "dc",
            AnalysisCommand::Ac { .. } => "ac",
            AnalysisCommand::Tran { .. } => "tran",
        }
    }
}

impl fmt::Display for AnalysisCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisCommand::Op => write!(f, ".op"),
            AnalysisCommand::Dc { sweeps } => {
                write!(f, ".dc")?;
                for s in sweeps {
                    write!(f, " {} {} {} {}", s.source_name, s.start, s.stop, s.step)?;
                }
                Ok(())
            }
            AnalysisCommand::Ac {
                sweep_type,
                num_points,
                fstart,
                fstop,
            } => write!(f, ".ac {} {} {} {}", sweep_type, num_points, fstart, fstop),
            AnalysisCommand::Tran {
                tstep,
                tstop,
                tstart,
                tmax,
                uic,
            } => {
                write!(f, ".tran {} {}", tstep, tstop)?;
                if *tstart != 0.0 || tmax.is_some() {
                    write!(f, " {}", tstart)?;
                }
                if let Some(tmax) = tmax {
                    write!(f, " {}", tmax)?;
                }
                if *uic {
                    write!(f, " uic")?;
                }
                Ok(())
            }
        }
    }
}

/// Initial condition for a node voltage (`.ic v(node)=value`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialCondition {
    pub node: String,
    pub voltage: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_display() {
        assert_eq!(
            AnalysisCommand::transient(1e-4, 3e-3).to_string(),
            ".tran 0.0001 0.003"
        );
        let tran = AnalysisCommand::Tran {
            tstep: 1e-9,
            tstop: 1e-6,
            tstart: 0.0,
            tmax: Some(1e-10),
            uic: true,
        };
        assert_eq!(tran.to_string(), ".tran 0.000000001 0.000001 0 0.0000000001 uic");
    }

    #[test]
    fn test_ac_and_dc_display() {
        let ac = AnalysisCommand::Ac {
            sweep_type: AcSweepType::Dec,
            num_points: 10,
            fstart: 1.0,
            fstop: 1e6,
        };
        assert_eq!(ac.to_string(), ".ac dec 10 1 1000000");

        let dc = AnalysisCommand::Dc {
            sweeps: vec![DcSweepSpec {
                source_name: "V1".into(),
                start: 0.0,
                stop: 5.0,
                step: 0.5,
            }],
        };
        assert_eq!(dc.to_string(), ".dc V1 0 5 0.5");
        assert_eq!(dc.kind(), "dc");
    }
}
