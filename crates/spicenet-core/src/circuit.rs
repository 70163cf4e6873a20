//! Circuit graph representation.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::analysis::{AnalysisCommand, InitialCondition};
use crate::element::Element;
use crate::error::Result;
use crate::model::Model;
use crate::node::{Node, NodeId, NodeTable};
use crate::simulate::{Simulator, WaveformSet};
use crate::subcircuit::{SubcircuitRegistry, SubcircuitTemplate};
use crate::value::{Param, Value};

/// A library file referenced by `.include` or `.lib`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Include {
    pub path: PathBuf,
    /// Section name for `.lib path section`.
    pub section: Option<String>,
}

impl Include {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            section: None,
        }
    }

    pub fn section(path: impl Into<PathBuf>, section: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            section: Some(section.into()),
        }
    }
}

/// A directive the parser does not interpret, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpaqueDirective {
    /// Keyword without the leading dot, as written.
    pub keyword: String,
    pub args: Vec<String>,
    /// Source line number.
    pub line: usize,
    pub text: String,
}

/// An `.options` entry; flags have no value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSetting {
    pub name: String,
    pub value: Option<Value>,
}

/// A fully resolved circuit.
///
/// Built once by the parser, then only changed through
/// [`remap_ground`](Self::remap_ground),
/// [`attach_subcircuit`](Self::attach_subcircuit) and
/// [`include`](Self::include) before it is handed to a solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Circuit {
    pub(crate) title: Option<String>,
    pub(crate) nodes: NodeTable,
    pub(crate) elements: Vec<Element>,
    pub(crate) subcircuits: SubcircuitRegistry,
    pub(crate) models: Vec<Model>,
    pub(crate) params: Vec<Param>,
    pub(crate) includes: Vec<Include>,
    pub(crate) analyses: Vec<AnalysisCommand>,
    pub(crate) options: Vec<OptionSetting>,
    pub(crate) temperature: Option<f64>,
    pub(crate) initial_conditions: Vec<InitialCondition>,
    pub(crate) opaque: Vec<OpaqueDirective>,
}

impl Circuit {
    /// Create a new empty circuit holding only ground.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new circuit with a title.
    pub fn with_title(title: impl Into<String>) -> Self {
        let mut circuit = Self::new();
        circuit.title = Some(title.into());
        circuit
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    // Nodes

    /// Return the canonical id for a node name, creating it on first use.
    pub fn unify_node(&mut self, name: &str) -> NodeId {
        self.nodes.unify(name)
    }

    /// Look up a node id by name, aliases included.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes.lookup(name)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Display name of a node; ground renders as `0`.
    pub fn node_name(&self, id: NodeId) -> &str {
        self.nodes.name_of(id).unwrap_or("0")
    }

    /// The ground node.
    pub fn ground(&self) -> &Node {
        self.nodes.ground()
    }

    /// Iterate over all canonical nodes, ground first.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Number of canonical nodes, ground included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_table(&self) -> &NodeTable {
        &self.nodes
    }

    /// Treat the node named `alias` as ground.
    ///
    /// Every element terminal on that node is rewritten to
    /// [`NodeId::GROUND`] and the name stays bound to ground afterwards.
    /// Remapping an alias that is already ground is a no-op.
    pub fn remap_ground(&mut self, alias: &str) -> Result<()> {
        let Some(old) = self.nodes.fold_into_ground(alias)? else {
            return Ok(());
        };
        for element in &mut self.elements {
            for node in &mut element.nodes {
                if *node == old {
                    *node = NodeId::GROUND;
                }
            }
        }
        log::debug!("remapped node {} ({}) to ground", alias, old);
        Ok(())
    }

    // Elements

    pub fn add_element(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Find an element by reference name, case-insensitively.
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    // Subcircuits

    pub fn subcircuits(&self) -> &SubcircuitRegistry {
        &self.subcircuits
    }

    pub fn subcircuit(&self, name: &str) -> Option<&SubcircuitTemplate> {
        self.subcircuits.get(name)
    }

    /// Register a template, see [`SubcircuitRegistry::register`].
    pub fn attach_subcircuit(&mut self, template: SubcircuitTemplate) -> Result<bool> {
        self.subcircuits.register(template)
    }

    // Models and parameters

    /// Add a model, replacing an earlier one of the same name.
    pub fn add_model(&mut self, model: Model) {
        match self
            .models
            .iter_mut()
            .find(|m| m.name.eq_ignore_ascii_case(&model.name))
        {
            Some(existing) => *existing = model,
            None => self.models.push(model),
        }
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn add_param(&mut self, param: Param) {
        self.params.push(param);
    }

    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Latest value assigned to a `.param`, case-insensitively.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .rev()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    // Libraries

    /// Record a library file for the solver. Duplicates are ignored.
    pub fn include(&mut self, path: impl AsRef<Path>) {
        self.add_include(Include::new(path.as_ref()));
    }

    pub fn add_include(&mut self, include: Include) {
        if !self.includes.contains(&include) {
            self.includes.push(include);
        }
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    // Analyses and simulator settings

    pub fn add_analysis(&mut self, analysis: AnalysisCommand) {
        self.analyses.push(analysis);
    }

    pub fn analyses(&self) -> &[AnalysisCommand] {
        &self.analyses
    }

    pub fn add_option(&mut self, option: OptionSetting) {
        self.options.push(option);
    }

    pub fn options(&self) -> &[OptionSetting] {
        &self.options
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn set_temperature(&mut self, celsius: f64) {
        self.temperature = Some(celsius);
    }

    pub fn add_initial_condition(&mut self, ic: InitialCondition) {
        self.initial_conditions.push(ic);
    }

    pub fn initial_conditions(&self) -> &[InitialCondition] {
        &self.initial_conditions
    }

    pub fn add_opaque(&mut self, directive: OpaqueDirective) {
        self.opaque.push(directive);
    }

    /// Directives kept verbatim because the parser does not know them.
    pub fn opaque_directives(&self) -> &[OpaqueDirective] {
        &self.opaque
    }

    // Checks and solver hand-off

    /// Check every instance against the registry and reject recursive
    /// templates.
    pub fn validate(&self) -> Result<()> {
        for element in &self.elements {
            self.subcircuits.check_instance(element)?;
        }
        for template in self.subcircuits.iter() {
            for element in template.instances() {
                self.subcircuits.check_instance(element)?;
            }
        }
        self.subcircuits.check_acyclic()
    }

    /// Run one analysis on an external solver.
    pub fn simulate<S: Simulator>(
        &self,
        simulator: &S,
        analysis: &AnalysisCommand,
    ) -> std::result::Result<WaveformSet, S::Error> {
        simulator.simulate(self, analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;
    use crate::error::Error;

    fn divider() -> Circuit {
        let mut circuit = Circuit::with_title("divider");
        let n1 = circuit.unify_node("1");
        let n2 = circuit.unify_node("2");
        let n5 = circuit.unify_node("5");
        circuit.add_element(
            Element::new(ElementKind::VoltageSource, "V1", vec![n1, n5])
                .with_values(vec![Value::Number(5.0)]),
        );
        circuit.add_element(Element::new(ElementKind::Resistor, "R1", vec![n1, n2]));
        circuit.add_element(Element::new(ElementKind::Resistor, "R2", vec![n2, n5]));
        circuit
    }

    #[test]
    fn test_new_circuit_has_ground() {
        let circuit = Circuit::new();
        assert_eq!(circuit.node_count(), 1);
        assert!(circuit.ground().is_ground());
        assert_eq!(circuit.node_id("0"), Some(NodeId::GROUND));
    }

    #[test]
    fn test_remap_ground_rewrites_elements() {
        let mut circuit = divider();
        circuit.remap_ground("5").unwrap();

        assert_eq!(circuit.node_count(), 3);
        assert_eq!(circuit.node_id("5"), Some(NodeId::GROUND));
        assert_eq!(circuit.element("V1").unwrap().nodes[1], NodeId::GROUND);
        assert_eq!(circuit.element("r2").unwrap().nodes[1], NodeId::GROUND);
    }

    #[test]
    fn test_remap_ground_is_idempotent() {
        let mut once = divider();
        once.remap_ground("5").unwrap();
        let mut twice = divider();
        twice.remap_ground("5").unwrap();
        twice.remap_ground("5").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_remap_unknown_node() {
        let mut circuit = divider();
        assert_eq!(
            circuit.remap_ground("42"),
            Err(Error::NodeNotFound("42".into()))
        );
    }

    #[test]
    fn test_include_dedup() {
        let mut circuit = Circuit::new();
        circuit.include("lib/opamp.lib");
        circuit.include("lib/opamp.lib");
        assert_eq!(circuit.includes().len(), 1);
    }

    #[test]
    fn test_model_replacement() {
        let mut circuit = Circuit::new();
        circuit.add_model(Model::new("DMOD", "D", vec![]));
        circuit.add_model(Model::new("dmod", "D", vec![Param::new("IS", Value::Number(1e-14))]));
        assert_eq!(circuit.models().count(), 1);
        assert_eq!(circuit.model("DMOD").unwrap().params.len(), 1);
    }

    #[test]
    fn test_validate_reports_undefined_template() {
        let mut circuit = Circuit::new();
        let a = circuit.unify_node("a");
        circuit.add_element(Element::instance("X1", vec![a], "MISSING"));
        assert!(matches!(
            circuit.validate(),
            Err(Error::UndefinedSubcircuit { .. })
        ));

        circuit
            .attach_subcircuit(SubcircuitTemplate::new("missing", vec!["p".into()]))
            .unwrap();
        assert!(circuit.validate().is_ok());
    }
}
