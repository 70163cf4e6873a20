//! Circuit graph construction from netlist text.
//!
//! A single forward pass turns cards into elements and templates. Names
//! that are still unresolved afterwards go through the [`Resolver`], then
//! every instance is checked against its template and ground is remapped.

use std::collections::VecDeque;
use std::mem;
use std::path::{Path, PathBuf};

use spicenet_core::{Circuit, Element, ElementKind, NodeId, OpaqueDirective, SubcircuitTemplate};

use crate::card::{Card, Directive, ElementCard, parse_card};
use crate::error::{Error, Location, Result};
use crate::resolver::{LibraryRef, Resolver};
use crate::tokenizer::{LogicalLine, Tokenizer};

/// Turn a parsed element card into an element, naming nodes through `unify`.
pub(crate) fn element_from_card(card: ElementCard, mut unify: impl FnMut(&str) -> NodeId) -> Element {
    let nodes = card.nodes.iter().map(|n| unify(n)).collect();
    let mut element = Element::new(card.kind, card.name, nodes)
        .with_values(card.values)
        .with_params(card.params);
    element.model = card.model;
    element
}

/// Builds a [`Circuit`] from netlist text.
///
/// ```no_run
/// use spicenet_parser::{CircuitBuilder, Resolver};
///
/// let resolver = Resolver::new("libs");
/// let circuit = CircuitBuilder::new(&resolver)
///     .file("pedal.cir")
///     .ground("5")
///     .build(&std::fs::read_to_string("pedal.cir")?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct CircuitBuilder<'r> {
    resolver: &'r Resolver,
    file: Option<PathBuf>,
    ground: Option<String>,
    templates: Vec<SubcircuitTemplate>,
    includes: Vec<PathBuf>,
}

impl<'r> CircuitBuilder<'r> {
    pub fn new(resolver: &'r Resolver) -> Self {
        Self {
            resolver,
            file: None,
            ground: None,
            templates: Vec::new(),
            includes: Vec::new(),
        }
    }

    /// Treat the node named `alias` as ground once the circuit is built.
    pub fn ground(mut self, alias: impl Into<String>) -> Self {
        self.ground = Some(alias.into());
        self
    }

    /// Name the file the text came from; relative includes resolve
    /// against its directory first.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Supply a template before the netlist is read, as if it had been
    /// defined inline.
    pub fn subcircuit(mut self, template: SubcircuitTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Make a library available as if the netlist began with
    /// `.include path`.
    pub fn include(mut self, path: impl Into<PathBuf>) -> Self {
        self.includes.push(path.into());
        self
    }

    /// Build the circuit. Unknown directives are logged and kept verbatim.
    pub fn build(self, text: &str) -> Result<Circuit> {
        self.build_with_warnings(text).map(|(circuit, _)| circuit)
    }

    /// Build the circuit and return the non-fatal diagnostics as well.
    pub fn build_with_warnings(self, text: &str) -> Result<(Circuit, Vec<Error>)> {
        let file = self.file.clone();
        let result = self.run(text);
        match file {
            Some(file) => result
                .map(|(c, warnings)| {
                    let warnings = warnings.into_iter().map(|w| w.in_file(&file)).collect();
                    (c, warnings)
                })
                .map_err(|e| e.in_file(&file)),
            None => result,
        }
    }

    fn run(self, text: &str) -> Result<(Circuit, Vec<Error>)> {
        let base = self.file.as_deref().and_then(Path::parent).map(Path::to_path_buf);
        let mut pass = Pass {
            resolver: self.resolver,
            base,
            circuit: Circuit::new(),
            open: Vec::new(),
            references: Vec::new(),
            libraries: Vec::new(),
            warnings: Vec::new(),
            in_control: false,
        };

        for path in self.includes {
            pass.library(LibraryRef::new(path));
        }
        for template in self.templates {
            pass.references
                .extend(template_references(&template, &Location::default()));
            pass.circuit
                .attach_subcircuit(template)
                .map_err(Error::from)?;
        }

        for line in Tokenizer::new(text) {
            let line = line?;
            if pass.in_control {
                pass.control_line(&line);
                continue;
            }
            let card = parse_card(&line)?;
            if !pass.card(&line, card)? {
                break;
            }
        }
        if let Some(open) = pass.open.last() {
            return Err(Error::malformed(
                &open.location,
                format!(".subckt {} has no matching .ends", open.template.name),
                &open.text,
            ));
        }

        pass.resolve()?;
        pass.circuit.validate().map_err(Error::from)?;

        if let Some(alias) = &self.ground {
            pass.circuit.remap_ground(alias)?;
        }

        log::debug!(
            "built circuit: {} nodes, {} elements, {} subcircuits",
            pass.circuit.node_count(),
            pass.circuit.element_count(),
            pass.circuit.subcircuits().len()
        );
        Ok((pass.circuit, pass.warnings))
    }
}

/// A `.subckt` block that has not reached its `.ends` yet.
struct OpenTemplate {
    template: SubcircuitTemplate,
    location: Location,
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceKind {
    Subcircuit,
    Model,
}

/// A name that must resolve once the whole netlist has been read.
#[derive(Debug)]
struct Reference {
    kind: ReferenceKind,
    name: String,
    /// Templates enclosing the referencing element, outermost first; empty
    /// at top level.
    scope: Vec<String>,
    element: String,
    nodes: usize,
    location: Location,
    text: String,
}

impl Reference {
    fn for_element(
        card_kind: ElementKind,
        element: &str,
        name: Option<&str>,
        nodes: usize,
        scope: Vec<String>,
        location: &Location,
        text: &str,
    ) -> Option<Self> {
        let kind = match card_kind {
            ElementKind::SubcircuitInstance => ReferenceKind::Subcircuit,
            k if k.takes_model() => ReferenceKind::Model,
            _ => return None,
        };
        Some(Reference {
            kind,
            name: name?.to_string(),
            scope,
            element: element.to_string(),
            nodes,
            location: location.clone(),
            text: text.to_string(),
        })
    }
}

/// References made by a template that did not come from the netlist text.
fn template_references(template: &SubcircuitTemplate, location: &Location) -> Vec<Reference> {
    template
        .elements
        .iter()
        .filter_map(|e| {
            Reference::for_element(
                e.kind,
                &e.name,
                e.model.as_deref(),
                e.nodes.len(),
                vec![template.name.clone()],
                location,
                &e.name,
            )
        })
        .collect()
}

struct Pass<'r> {
    resolver: &'r Resolver,
    base: Option<PathBuf>,
    circuit: Circuit,
    open: Vec<OpenTemplate>,
    references: Vec<Reference>,
    libraries: Vec<LibraryRef>,
    warnings: Vec<Error>,
    /// Inside a `.control` .. `.endc` block, kept verbatim.
    in_control: bool,
}

impl Pass<'_> {
    /// Apply one card. Returns `false` once `.end` is reached.
    fn card(&mut self, line: &LogicalLine, card: Card) -> Result<bool> {
        let location = line.location();
        self.warnings.extend(card.diagnostic());
        match card {
            Card::Element(card) => self.element(card, &location, &line.text),
            Card::Directive(directive) => return self.directive(directive, &location, &line.text),
            Card::Unrecognized(op) => {
                self.in_control = op.keyword.eq_ignore_ascii_case("control");
                self.circuit.add_opaque(op);
            }
        }
        Ok(true)
    }

    /// Keep a line of an interactive control block as written.
    fn control_line(&mut self, line: &LogicalLine) {
        let mut words = line.text.split_whitespace();
        let keyword = words.next().unwrap_or_default().trim_start_matches('.');
        if keyword.eq_ignore_ascii_case("endc") {
            self.in_control = false;
        }
        self.circuit.add_opaque(OpaqueDirective {
            keyword: keyword.to_string(),
            args: words.map(str::to_string).collect(),
            line: line.line,
            text: line.text.clone(),
        });
    }

    fn element(&mut self, card: ElementCard, location: &Location, text: &str) {
        let scope = self.open.iter().map(|o| o.template.name.clone()).collect();
        self.references.extend(Reference::for_element(
            card.kind,
            &card.name,
            card.model.as_deref(),
            card.nodes.len(),
            scope,
            location,
            text,
        ));

        match self.open.last_mut() {
            Some(open) => {
                let element = element_from_card(card, |n| open.template.nodes.unify(n));
                open.template.add_element(element);
            }
            None => {
                let circuit = &mut self.circuit;
                let element = element_from_card(card, |n| circuit.unify_node(n));
                circuit.add_element(element);
            }
        }
    }

    fn directive(&mut self, directive: Directive, location: &Location, text: &str) -> Result<bool> {
        match directive {
            Directive::Subckt {
                name,
                ports,
                params,
            } => {
                let mut template = SubcircuitTemplate::new(name, ports);
                template.params = params;
                self.open.push(OpenTemplate {
                    template,
                    location: location.clone(),
                    text: text.to_string(),
                });
            }
            Directive::Ends { name } => {
                let Some(open) = self.open.pop() else {
                    return Err(Error::malformed(location, ".ends without .subckt", text));
                };
                if let Some(name) = name
                    && !name.eq_ignore_ascii_case(&open.template.name)
                {
                    return Err(Error::malformed(
                        location,
                        format!(".ends {} closes .subckt {}", name, open.template.name),
                        text,
                    ));
                }
                let name = open.template.name.clone();
                let added = self
                    .circuit
                    .attach_subcircuit(open.template)
                    .map_err(|e| Error::lift(e, &open.location, &open.text))?;
                if !added {
                    log::debug!("{}: identical redefinition of {}", location, name);
                }
            }
            Directive::Include { path } => {
                let resolved = self.resolver.resolve_path(&path, self.base.as_deref());
                self.library(LibraryRef::new(resolved).at(location.clone(), text));
            }
            Directive::Lib { path, section } => {
                let resolved = self.resolver.resolve_path(&path, self.base.as_deref());
                self.library(
                    LibraryRef::new(resolved)
                        .with_section(section)
                        .at(location.clone(), text),
                );
            }
            // Outside a library file, a one-argument `.lib` names a whole file.
            Directive::LibSection { name } => {
                let resolved = self.resolver.resolve_path(&name, self.base.as_deref());
                self.library(LibraryRef::new(resolved).at(location.clone(), text));
            }
            Directive::EndLib => {}
            Directive::Model(model) => match self.open.last_mut() {
                Some(open) => open.template.models.push(model),
                None => self.circuit.add_model(model),
            },
            Directive::Param(params) => match self.open.last_mut() {
                Some(open) => open.template.params.extend(params),
                None => params.into_iter().for_each(|p| self.circuit.add_param(p)),
            },
            Directive::Analysis(analysis) => self.circuit.add_analysis(analysis),
            Directive::Options(options) => {
                options.into_iter().for_each(|o| self.circuit.add_option(o))
            }
            Directive::Temp(celsius) => self.circuit.set_temperature(celsius),
            Directive::Ic(conditions) => conditions
                .into_iter()
                .for_each(|ic| self.circuit.add_initial_condition(ic)),
            Directive::Title(title) => self.circuit.set_title(title),
            Directive::End => return Ok(false),
        }
        Ok(true)
    }

    fn library(&mut self, reference: LibraryRef) {
        self.circuit.add_include(reference.include());
        if !self.libraries.contains(&reference) {
            self.libraries.push(reference);
        }
    }

    /// Resolve every outstanding reference, loading libraries on demand.
    fn resolve(&mut self) -> Result<()> {
        let mut queue: VecDeque<Reference> = mem::take(&mut self.references).into();
        while let Some(reference) = queue.pop_front() {
            match reference.kind {
                ReferenceKind::Subcircuit => {
                    if !self.circuit.subcircuits().contains(&reference.name) {
                        let Some(template) = self
                            .resolver
                            .find_subcircuit(&reference.name, &self.libraries)?
                        else {
                            return Err(Error::UndefinedSubcircuit {
                                location: reference.location,
                                instance: reference.element,
                                name: reference.name,
                                text: reference.text,
                            });
                        };
                        let origin = Location::new(template.source.clone(), 0);
                        queue.extend(template_references(&template, &origin));
                        self.circuit
                            .attach_subcircuit(template)
                            .map_err(|e| Error::lift(e, &reference.location, &reference.text))?;
                    }
                    self.check_arity(&reference)?;
                }
                ReferenceKind::Model => {
                    if self.model_in_scope(&reference) {
                        continue;
                    }
                    match self.resolver.find_model(&reference.name, &self.libraries)? {
                        Some(model) => self.circuit.add_model(model),
                        None => {
                            return Err(Error::ModelNotFound {
                                location: reference.location,
                                name: reference.name,
                                text: reference.text,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn model_in_scope(&self, reference: &Reference) -> bool {
        let local = reference.scope.iter().any(|s| {
            self.circuit
                .subcircuit(s)
                .is_some_and(|t| t.model(&reference.name).is_some())
        });
        local || self.circuit.model(&reference.name).is_some()
    }

    fn check_arity(&self, reference: &Reference) -> Result<()> {
        let Some(template) = self.circuit.subcircuit(&reference.name) else {
            return Ok(());
        };
        if template.arity() != reference.nodes {
            return Err(Error::PortArityMismatch {
                location: reference.location.clone(),
                instance: reference.element.clone(),
                name: template.name.clone(),
                expected: template.arity(),
                found: reference.nodes,
                text: reference.text.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spicenet_core::{AnalysisCommand, Value};

    fn build(text: &str) -> Result<Circuit> {
        let resolver = Resolver::new(".");
        CircuitBuilder::new(&resolver).build(text)
    }

    #[test]
    fn test_nodes_are_unified() {
        let circuit = build("V1 1 0 5\nR1 1 2 100\nR2 2 0 50\n.end\n").unwrap();
        assert_eq!(circuit.node_count(), 3);
        assert_eq!(circuit.element_count(), 3);
        let n1 = circuit.node_id("1").unwrap();
        assert_eq!(circuit.element("V1").unwrap().nodes, vec![n1, NodeId::GROUND]);
        assert_eq!(circuit.element("R1").unwrap().nodes[0], n1);
    }

    #[test]
    fn test_subckt_scope_is_local() {
        let circuit = build(
            ".subckt DIV in out gnd\n\
             R1 in mid 1k\n\
             R2 mid out 1k\n\
             .ends DIV\n\
             X1 a b c DIV\n",
        )
        .unwrap();
        assert!(circuit.node_id("mid").is_none());
        let div = circuit.subcircuit("div").unwrap();
        assert_eq!(div.arity(), 3);
        assert_eq!(div.nodes.len(), 5);
        assert_eq!(circuit.element("X1").unwrap().template(), Some("DIV"));
    }

    #[test]
    fn test_nested_subckt_registers_globally() {
        let circuit = build(
            ".subckt OUTER a b\n\
             .subckt INNER p q\n\
             R1 p q 1\n\
             .ends INNER\n\
             X1 a b INNER\n\
             .ends OUTER\n\
             X9 n1 n2 INNER\n",
        )
        .unwrap();
        assert_eq!(circuit.subcircuits().len(), 2);
        assert!(circuit.subcircuit("INNER").is_some());
    }

    #[test]
    fn test_ends_mismatch_and_unclosed() {
        assert!(matches!(
            build(".ends\n"),
            Err(Error::MalformedInput { .. })
        ));
        assert!(matches!(
            build(".subckt A x\n.ends B\n"),
            Err(Error::MalformedInput { .. })
        ));
        match build("R1 1 0 1k\n.subckt A x\nR2 x 0 1\n") {
            Err(Error::MalformedInput { location, .. }) => assert_eq!(location.line, 2),
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_end_stops_pass() {
        let circuit = build("R1 1 0 1k\n.end\nthis is not a netlist (\n").unwrap();
        assert_eq!(circuit.element_count(), 1);
    }

    #[test]
    fn test_local_and_top_level_models() {
        let circuit = build(
            ".model DTOP D(IS=1e-14)\n\
             .subckt CLIP a k\n\
             .model DLOC D(IS=1e-12)\n\
             D1 a k DLOC\n\
             D2 k a DTOP\n\
             .ends\n\
             D3 1 0 DTOP\n",
        )
        .unwrap();
        assert_eq!(circuit.models().count(), 1);
        assert_eq!(circuit.subcircuit("CLIP").unwrap().models.len(), 1);
    }

    #[test]
    fn test_nested_template_sees_parent_models() {
        let circuit = build(
            ".subckt OUTER a b\n\
             .model DOUT D(IS=1e-14)\n\
             .subckt INNER p q\n\
             D1 p q DOUT\n\
             .ends INNER\n\
             X1 a b INNER\n\
             .ends OUTER\n\
             X9 n1 0 OUTER\n",
        )
        .unwrap();
        assert_eq!(circuit.models().count(), 0);

        let flat = circuit.flatten().unwrap();
        assert_eq!(
            flat.element("D.X9.X1.D1").unwrap().model.as_deref(),
            Some("X9.DOUT")
        );
    }

    #[test]
    fn test_missing_model_without_includes() {
        match build("D1 1 0 D1N4148\n") {
            Err(Error::ModelNotFound { name, location, .. }) => {
                assert_eq!(name, "D1N4148");
                assert_eq!(location.line, 1);
            }
            other => panic!("expected ModelNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_subckt() {
        let same = ".subckt A x\nR1 x 0 1\n.ends\n";
        assert!(build(&format!("{same}{same}")).is_ok());

        match build(&format!("{same}.subckt a x\nR1 x 0 2\n.ends\n")) {
            Err(Error::DuplicateSubcircuitName { location, .. }) => assert_eq!(location.line, 4),
            other => panic!("expected DuplicateSubcircuitName, got {:?}", other),
        }
    }

    #[test]
    fn test_recursive_template() {
        let result = build(".subckt LOOP a\nX1 a LOOP\n.ends\nX1 n LOOP\n");
        match result {
            Err(Error::RecursiveSubcircuit { chain }) => {
                assert_eq!(chain, vec!["LOOP".to_string(), "LOOP".to_string()])
            }
            other => panic!("expected RecursiveSubcircuit, got {:?}", other),
        }
    }

    #[test]
    fn test_ground_remap_runs_last() {
        let resolver = Resolver::new(".");
        let circuit = CircuitBuilder::new(&resolver)
            .ground("5")
            .build("V1 1 5 9\nR1 1 5 10k\n")
            .unwrap();
        assert_eq!(circuit.node_count(), 2);
        assert_eq!(circuit.element("R1").unwrap().nodes[1], NodeId::GROUND);

        let missing = CircuitBuilder::new(&resolver).ground("42").build("R1 1 0 1k\n");
        assert!(matches!(missing, Err(Error::NodeNotFound(n)) if n == "42"));
    }

    #[test]
    fn test_presupplied_template() {
        let resolver = Resolver::new(".");
        let jack = SubcircuitTemplate::builder("JackOut", ["output", "x", "ground"])
            .element(ElementKind::Resistor, "Rload", ["output", "x"], vec![Value::Number(10e3)])
            .build();
        let circuit = CircuitBuilder::new(&resolver)
            .subcircuit(jack)
            .build("XJ out 0 0 JackOut\n.tran 1u 1m\n")
            .unwrap();
        assert_eq!(circuit.subcircuits().len(), 1);
        assert_eq!(circuit.analyses(), &[AnalysisCommand::transient(1e-6, 1e-3)]);
    }

    #[test]
    fn test_warnings_for_unknown_directives() {
        let resolver = Resolver::new(".");
        let (circuit, warnings) = CircuitBuilder::new(&resolver)
            .file("pedal.cir")
            .build_with_warnings("R1 1 0 1k\n.save all\n.control\nrun\nplot v(1)\n.endc\nR2 1 0 1k\n")
            .unwrap();
        assert_eq!(circuit.element_count(), 2);
        assert_eq!(circuit.opaque_directives().len(), 5);
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings[0].location().unwrap().file.as_deref(),
            Some(Path::new("pedal.cir"))
        );
    }
}
