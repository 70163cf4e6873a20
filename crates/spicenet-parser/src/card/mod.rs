//! Card classification: element cards, dot-directives and everything else.

use spicenet_core::{
    AnalysisCommand, ElementKind, InitialCondition, Model, OpaqueDirective, OptionSetting, Param,
    Value,
};

use crate::error::{Error, Location, Result};
use crate::fields::{Field, split_fields};
use crate::tokenizer::LogicalLine;

mod commands;
mod elements;

use elements::ELEMENT_PARSERS;

/// A classified logical line.
#[derive(Debug, Clone, PartialEq)]
pub enum Card {
    Element(ElementCard),
    Directive(Directive),
    /// Unknown directive or element prefix, kept verbatim.
    Unrecognized(OpaqueDirective),
}

/// An element card before node names are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementCard {
    pub kind: ElementKind,
    pub name: String,
    pub nodes: Vec<String>,
    /// Device model, or template name for `X` cards.
    pub model: Option<String>,
    pub values: Vec<Value>,
    pub params: Vec<Param>,
}

/// A recognized dot-directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Subckt {
        name: String,
        ports: Vec<String>,
        params: Vec<Param>,
    },
    Ends {
        name: Option<String>,
    },
    Include {
        path: String,
    },
    /// `.lib path section`: pull one section of a library.
    Lib {
        path: String,
        section: String,
    },
    /// `.lib name`: start of a section inside a library file; at top level
    /// it includes the file `name`.
    LibSection {
        name: String,
    },
    EndLib,
    Model(Model),
    Param(Vec<Param>),
    Analysis(AnalysisCommand),
    Options(Vec<OptionSetting>),
    Temp(f64),
    Ic(Vec<InitialCondition>),
    Title(String),
    End,
}

/// The raw line a card came from, for error reporting.
pub(crate) struct Site<'a> {
    pub location: Location,
    pub text: &'a str,
}

impl Site<'_> {
    pub(crate) fn malformed(&self, message: impl Into<String>) -> Error {
        Error::malformed(&self.location, message, self.text)
    }
}

/// Classify one logical line.
pub fn parse_card(line: &LogicalLine) -> Result<Card> {
    let site = Site {
        location: line.location(),
        text: &line.text,
    };
    let text = line.text.trim();
    if let Some(rest) = text.strip_prefix('.') {
        let (keyword, args) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));
        return commands::parse_directive(keyword, args.trim(), line, &site);
    }

    let fields = split_fields(text).map_err(|msg| site.malformed(msg))?;
    let Some(first) = fields.first().and_then(Field::as_word) else {
        return Err(site.malformed("card does not start with a name"));
    };
    let prefix = first
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or(' ');

    match ELEMENT_PARSERS.iter().find(|(p, _, _)| *p == prefix) {
        Some((_, kind, parse)) => parse(*kind, fields, &site).map(Card::Element),
        None => {
            log::warn!("{}: unknown element prefix in {}", site.location, first);
            Ok(Card::Unrecognized(opaque(first, text, line.line)))
        }
    }
}

fn opaque(keyword: &str, text: &str, line: usize) -> OpaqueDirective {
    OpaqueDirective {
        keyword: keyword.to_string(),
        args: text.split_whitespace().skip(1).map(str::to_string).collect(),
        line,
        text: text.to_string(),
    }
}

impl Card {
    /// The non-fatal diagnostic for an unrecognized card.
    pub fn diagnostic(&self) -> Option<Error> {
        match self {
            Card::Unrecognized(op) => Some(Error::UnknownDirective {
                location: Location::line(op.line),
                keyword: op.keyword.trim_start_matches('.').to_string(),
                text: op.text.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spicenet_core::AcSweepType;

    fn card(text: &str) -> Card {
        parse_card(&LogicalLine::new(1, text)).unwrap()
    }

    fn element(text: &str) -> ElementCard {
        match card(text) {
            Card::Element(e) => e,
            other => panic!("expected element, got {:?}", other),
        }
    }

    fn directive(text: &str) -> Directive {
        match card(text) {
            Card::Directive(d) => d,
            other => panic!("expected directive, got {:?}", other),
        }
    }

    fn malformed(text: &str) -> bool {
        matches!(
            parse_card(&LogicalLine::new(1, text)),
            Err(Error::MalformedInput { .. })
        )
    }

    #[test]
    fn test_resistor() {
        let r = element("R1 1 2 1k tc=0.001");
        assert_eq!(r.kind, ElementKind::Resistor);
        assert_eq!(r.name, "R1");
        assert_eq!(r.nodes, vec!["1", "2"]);
        assert_eq!(r.values, vec![Value::Number(1000.0)]);
        assert_eq!(r.params, vec![Param::new("tc", Value::Number(0.001))]);
    }

    #[test]
    fn test_lowercase_prefix() {
        assert_eq!(element("c1 out 0 10uF").kind, ElementKind::Capacitor);
        assert_eq!(element("c1 out 0 10uF").values, vec![Value::Number(10e-6)]);
    }

    #[test]
    fn test_voltage_source_values() {
        let v = element("V1 in 0 DC 0 AC 1 SIN(0 0.02 440)");
        assert_eq!(v.nodes, vec!["in", "0"]);
        assert_eq!(
            v.values,
            vec![
                Value::Text("DC".into()),
                Value::Number(0.0),
                Value::Text("AC".into()),
                Value::Number(1.0),
                Value::Text("SIN(0 0.02 440)".into()),
            ]
        );
    }

    #[test]
    fn test_devices_take_models() {
        let d = element("D1 a k D1N4148");
        assert_eq!(d.model.as_deref(), Some("D1N4148"));
        let q = element("Q1 c b e 2N3904");
        assert_eq!(q.nodes, vec!["c", "b", "e"]);
        assert_eq!(q.model.as_deref(), Some("2N3904"));
        let q = element("Q2 c b e sub QMOD");
        assert_eq!(q.nodes, vec!["c", "b", "e", "sub"]);
        assert_eq!(q.model.as_deref(), Some("QMOD"));
        let q = element("Q3 c b e QMOD 2");
        assert_eq!(q.nodes.len(), 3);
        assert_eq!(q.model.as_deref(), Some("QMOD"));
        assert_eq!(q.values, vec![Value::Number(2.0)]);
        let q = element("Q4 c b e QMOD OFF");
        assert_eq!(q.model.as_deref(), Some("QMOD"));
        let m = element("M1 d g s b NMOS1 W=10u L=1u");
        assert_eq!(m.nodes.len(), 4);
        assert_eq!(m.params.len(), 2);
        assert!(malformed("D1 a k"));
    }

    #[test]
    fn test_controlled_sources() {
        let e = element("E1 out 0 in 0 10");
        assert_eq!(e.nodes, vec!["out", "0", "in", "0"]);
        let f = element("F1 out 0 Vsense 2");
        assert_eq!(f.nodes, vec!["out", "0"]);
        assert_eq!(f.values[0], Value::Text("Vsense".into()));
        let k = element("K1 L1 L2 0.99");
        assert!(k.nodes.is_empty());
        assert_eq!(k.values.len(), 3);
    }

    #[test]
    fn test_instance() {
        let x = element("X1 a b c DIV");
        assert_eq!(x.kind, ElementKind::SubcircuitInstance);
        assert_eq!(x.nodes, vec!["a", "b", "c"]);
        assert_eq!(x.model.as_deref(), Some("DIV"));

        let x = element("X2 in out OPAMP PARAMS: gain=10");
        assert_eq!(x.nodes, vec!["in", "out"]);
        assert_eq!(x.model.as_deref(), Some("OPAMP"));
        assert_eq!(x.params, vec![Param::new("gain", Value::Number(10.0))]);

        assert!(malformed("X3"));
    }

    #[test]
    fn test_too_few_nodes() {
        assert!(malformed("R1 1"));
        assert!(malformed("R1 1 2"));
        assert!(malformed("M1 d g s NMOS1"));
        assert!(malformed("V1 1 0 SIN(0 1"));
    }

    #[test]
    fn test_unknown_prefix_is_opaque() {
        match card("Z1 a b foo") {
            Card::Unrecognized(op) => {
                assert_eq!(op.keyword, "Z1");
                assert_eq!(op.args, vec!["a", "b", "foo"]);
            }
            other => panic!("expected opaque, got {:?}", other),
        }
    }

    #[test]
    fn test_subckt_and_ends() {
        assert_eq!(
            directive(".subckt DIV in out gnd"),
            Directive::Subckt {
                name: "DIV".into(),
                ports: vec!["in".into(), "out".into(), "gnd".into()],
                params: vec![],
            }
        );
        assert_eq!(
            directive(".SUBCKT AMP in out PARAMS: gain=2"),
            Directive::Subckt {
                name: "AMP".into(),
                ports: vec!["in".into(), "out".into()],
                params: vec![Param::new("gain", Value::Number(2.0))],
            }
        );
        assert_eq!(directive(".ends"), Directive::Ends { name: None });
        assert_eq!(
            directive(".ends DIV"),
            Directive::Ends {
                name: Some("DIV".into())
            }
        );
        assert!(malformed(".subckt"));
    }

    #[test]
    fn test_include_and_lib() {
        assert_eq!(
            directive(".include \"models/op amp.lib\""),
            Directive::Include {
                path: "models/op amp.lib".into()
            }
        );
        assert_eq!(
            directive(".inc opamp.lib"),
            Directive::Include {
                path: "opamp.lib".into()
            }
        );
        assert_eq!(
            directive(".lib 'corners.lib' TT"),
            Directive::Lib {
                path: "corners.lib".into(),
                section: "TT".into()
            }
        );
        assert_eq!(
            directive(".lib TT"),
            Directive::LibSection { name: "TT".into() }
        );
        assert_eq!(directive(".endl TT"), Directive::EndLib);
        assert!(malformed(".include"));
    }

    #[test]
    fn test_model() {
        let Directive::Model(model) = directive(".model D1N4148 D(IS=2.52n RS=.568 N=1.752)")
        else {
            panic!("expected model");
        };
        assert_eq!(model.name, "D1N4148");
        assert_eq!(model.kind, "D");
        assert_eq!(model.params.len(), 3);
        assert_eq!(model.params[1], Param::new("RS", Value::Number(0.568)));

        let Directive::Model(model) = directive(".model QN NPN (BF=100 VAF=50)") else {
            panic!("expected model");
        };
        assert_eq!(model.kind, "NPN");
        assert_eq!(model.params.len(), 2);

        let Directive::Model(model) = directive(".model MN nmos level=1 vto=0.7") else {
            panic!("expected model");
        };
        assert_eq!(model.kind, "nmos");
        assert_eq!(model.params.len(), 2);
    }

    #[test]
    fn test_param_and_options() {
        assert_eq!(
            directive(".param gain = 10 rload={2*r}"),
            Directive::Param(vec![
                Param::new("gain", Value::Number(10.0)),
                Param::new("rload", Value::Expr("2*r".into())),
            ])
        );
        assert_eq!(
            directive(".options reltol=1e-4 noacct"),
            Directive::Options(vec![
                OptionSetting {
                    name: "reltol".into(),
                    value: Some(Value::Number(1e-4))
                },
                OptionSetting {
                    name: "noacct".into(),
                    value: None
                },
            ])
        );
        assert!(malformed(".param gain"));
    }

    #[test]
    fn test_analyses() {
        assert_eq!(
            directive(".tran 0.1m 3m"),
            Directive::Analysis(AnalysisCommand::transient(1e-4, 3e-3))
        );
        assert_eq!(
            directive(".tran 1u 1m 0 10u UIC"),
            Directive::Analysis(AnalysisCommand::Tran {
                tstep: 1e-6,
                tstop: 1e-3,
                tstart: 0.0,
                tmax: Some(1e-5),
                uic: true,
            })
        );
        assert_eq!(
            directive(".ac dec 10 1 100k"),
            Directive::Analysis(AnalysisCommand::Ac {
                sweep_type: AcSweepType::Dec,
                num_points: 10,
                fstart: 1.0,
                fstop: 1e5,
            })
        );
        let Directive::Analysis(AnalysisCommand::Dc { sweeps }) =
            directive(".dc V1 0 5 0.1 V2 0 1 0.5")
        else {
            panic!("expected dc");
        };
        assert_eq!(sweeps.len(), 2);
        assert_eq!(sweeps[1].source_name, "V2");
        assert_eq!(directive(".op"), Directive::Analysis(AnalysisCommand::Op));

        assert!(malformed(".tran 1u"));
        assert!(malformed(".ac log 10 1 1k"));
        assert!(malformed(".dc V1 0 5"));
    }

    #[test]
    fn test_misc_directives() {
        assert_eq!(directive(".temp 85"), Directive::Temp(85.0));
        assert_eq!(
            directive(".ic v(out)=0 V(in)=1.5"),
            Directive::Ic(vec![
                InitialCondition {
                    node: "out".into(),
                    voltage: 0.0
                },
                InitialCondition {
                    node: "in".into(),
                    voltage: 1.5
                },
            ])
        );
        assert_eq!(
            directive(".title Fuzz pedal (rev. B)"),
            Directive::Title("Fuzz pedal (rev. B)".into())
        );
        assert_eq!(directive(".END"), Directive::End);
    }

    #[test]
    fn test_unknown_directive_is_opaque() {
        let parsed = card(".measure tran vmax MAX v(out)");
        let Card::Unrecognized(op) = &parsed else {
            panic!("expected opaque");
        };
        assert_eq!(op.keyword, "measure");
        assert_eq!(op.text, ".measure tran vmax MAX v(out)");
        assert!(matches!(
            parsed.diagnostic(),
            Some(Error::UnknownDirective { keyword, .. }) if keyword == "measure"
        ));
    }
}
