//! Rendering circuits back to SPICE netlist text.
//!
//! The output is what the external solver reads. Library-loaded templates
//! are not written out; the `.include` lines that provide them are.

use std::fmt::{self, Write};

use crate::analysis::AnalysisCommand;
use crate::circuit::Circuit;
use crate::element::{Element, ElementKind};
use crate::node::NodeTable;
use crate::subcircuit::SubcircuitTemplate;

/// Write `circuit` as a complete netlist with the given analyses.
pub fn write_netlist<W: Write>(
    out: &mut W,
    circuit: &Circuit,
    analyses: &[AnalysisCommand],
) -> fmt::Result {
    match circuit.title() {
        Some(title) => writeln!(out, ".title {}", title)?,
        None => writeln!(out, "* spicenet netlist")?,
    }

    for include in circuit.includes() {
        match &include.section {
            Some(section) => writeln!(out, ".lib \"{}\" {}", include.path.display(), section)?,
            None => writeln!(out, ".include \"{}\"", include.path.display())?,
        }
    }

    for param in circuit.params() {
        writeln!(out, ".param {}", param)?;
    }

    if !circuit.options().is_empty() {
        write!(out, ".options")?;
        for option in circuit.options() {
            match &option.value {
                Some(value) => write!(out, " {}={}", option.name, value)?,
                None => write!(out, " {}", option.name)?,
            }
        }
        writeln!(out)?;
    }

    if let Some(temp) = circuit.temperature() {
        writeln!(out, ".temp {}", temp)?;
    }

    for model in circuit.models().filter(|m| m.source.is_none()) {
        writeln!(out, "{}", model)?;
    }

    for template in circuit.subcircuits().iter().filter(|t| t.source.is_none()) {
        write!(out, "{}", template)?;
    }

    for element in circuit.elements() {
        write_element(out, element, circuit.node_table())?;
    }

    for ic in circuit.initial_conditions() {
        writeln!(out, ".ic v({})={}", ic.node, ic.voltage)?;
    }

    for analysis in analyses {
        writeln!(out, "{}", analysis)?;
    }

    for directive in circuit.opaque_directives() {
        writeln!(out, "{}", directive.text)?;
    }

    writeln!(out, ".end")
}

/// Write one element card using the names from `nodes`.
pub fn write_element<W: Write>(out: &mut W, element: &Element, nodes: &NodeTable) -> fmt::Result {
    write!(out, "{}", element.name)?;
    for id in &element.nodes {
        write!(out, " {}", nodes.name_of(*id).unwrap_or("0"))?;
    }
    if let Some(model) = &element.model {
        write!(out, " {}", model)?;
    }
    for value in &element.values {
        write!(out, " {}", value)?;
    }
    for param in &element.params {
        write!(out, " {}", param)?;
    }
    writeln!(out)
}

impl fmt::Display for SubcircuitTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".subckt {}", self.name)?;
        for port in &self.ports {
            write!(f, " {}", port)?;
        }
        if !self.params.is_empty() {
            write!(f, " params:")?;
            for param in &self.params {
                write!(f, " {}", param)?;
            }
        }
        writeln!(f)?;
        for model in &self.models {
            writeln!(f, "{}", model)?;
        }
        for element in &self.elements {
            write_element(f, element, &self.nodes)?;
        }
        writeln!(f, ".ends {}", self.name)
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_netlist(f, self, self.analyses())
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)?;
        if self.kind == ElementKind::SubcircuitInstance
            && let Some(template) = &self.model
        {
            write!(f, " of {}", template)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::value::{Param, Value};

    #[test]
    fn test_render_divider() {
        let mut circuit = Circuit::with_title("divider");
        let n1 = circuit.unify_node("in");
        let n2 = circuit.unify_node("out");
        circuit.add_element(
            Element::new(ElementKind::VoltageSource, "V1", vec![n1, crate::NodeId::GROUND])
                .with_values(vec![Value::Text("DC".into()), Value::Number(5.0)]),
        );
        circuit.add_element(
            Element::new(ElementKind::Resistor, "R1", vec![n1, n2])
                .with_values(vec![Value::Number(1000.0)])
                .with_params(vec![Param::new("tc", Value::Number(0.001))]),
        );
        circuit.add_model(Model::new("DMOD", "D", vec![Param::new("IS", Value::Number(1e-14))]));
        circuit.add_analysis(AnalysisCommand::Op);

        let text = circuit.to_string();
        assert_eq!(
            text,
            ".title divider\n\
             .model DMOD D(IS=0.00000000000001)\n\
             V1 in 0 DC 5\n\
             R1 in out 1000 tc=0.001\n\
             .op\n\
             .end\n"
        );
    }

    #[test]
    fn test_render_template() {
        let template = SubcircuitTemplate::builder("JackOut", ["output", "x", "ground"])
            .element(
                ElementKind::Resistor,
                "Rload",
                ["output", "x"],
                vec![Value::Number(10.0)],
            )
            .build();
        assert_eq!(
            template.to_string(),
            ".subckt JackOut output x ground\nRload output x 10\n.ends JackOut\n"
        );
    }
}
