//! Subcircuit templates and the registry that holds them.

use std::collections::HashSet;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::element::{Element, ElementKind};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::node::{NodeId, NodeTable};
use crate::value::{Param, Value};

/// A reusable named sub-graph with a fixed external port list.
///
/// Nodes live in a local [`NodeTable`]: ports take ids `1..=arity` in
/// order, internal nodes follow, and `0` is the global ground.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubcircuitTemplate {
    pub name: String,
    pub ports: Vec<String>,
    pub nodes: NodeTable,
    pub elements: Vec<Element>,
    /// Models declared inside the `.subckt` block.
    pub models: Vec<Model>,
    /// Defaults from the `PARAMS:` section.
    pub params: Vec<Param>,
    /// Library file the template was loaded from, `None` if defined inline.
    pub source: Option<PathBuf>,
}

impl SubcircuitTemplate {
    /// Create an empty template whose local scope holds the ports.
    pub fn new(name: impl Into<String>, ports: Vec<String>) -> Self {
        let mut nodes = NodeTable::new();
        for port in &ports {
            nodes.unify(port);
        }
        Self {
            name: name.into(),
            ports,
            nodes,
            elements: Vec::new(),
            models: Vec::new(),
            params: Vec::new(),
            source: None,
        }
    }

    /// Equal in everything but where the definition came from.
    pub fn same_body(&self, other: &SubcircuitTemplate) -> bool {
        self.name == other.name
            && self.ports == other.ports
            && self.nodes == other.nodes
            && self.elements == other.elements
            && self.models == other.models
            && self.params == other.params
    }

    /// Start authoring a template in code.
    pub fn builder<I, S>(name: impl Into<String>, ports: I) -> TemplateBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TemplateBuilder {
            template: Self::new(name, ports.into_iter().map(Into::into).collect()),
        }
    }

    /// Number of external ports.
    pub fn arity(&self) -> usize {
        self.ports.len()
    }

    /// Local ids of the ports, in port order.
    pub fn port_ids(&self) -> Vec<NodeId> {
        self.ports
            .iter()
            .map(|p| self.nodes.lookup(p).unwrap_or(NodeId::GROUND))
            .collect()
    }

    pub fn add_element(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Look up a model declared in this template.
    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Subcircuit instances inside this template.
    pub fn instances(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.is_instance())
    }

    /// Names of the templates this one instantiates.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.instances().filter_map(Element::template)
    }
}

/// Code-side construction of a [`SubcircuitTemplate`].
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    template: SubcircuitTemplate,
}

impl TemplateBuilder {
    fn node_ids<I, S>(&mut self, nodes: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        nodes
            .into_iter()
            .map(|n| self.template.nodes.unify(n.as_ref()))
            .collect()
    }

    /// Add a primitive element.
    pub fn element<I, S>(
        mut self,
        kind: ElementKind,
        name: impl Into<String>,
        nodes: I,
        values: Vec<Value>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let nodes = self.node_ids(nodes);
        self.template
            .add_element(Element::new(kind, name, nodes).with_values(values));
        self
    }

    /// Add an instance of another template.
    pub fn instance<I, S>(mut self, name: impl Into<String>, nodes: I, template: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let nodes = self.node_ids(nodes);
        self.template
            .add_element(Element::instance(name, nodes, template));
        self
    }

    pub fn model(mut self, model: Model) -> Self {
        self.template.models.push(model);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.template.params.push(Param::new(name, value));
        self
    }

    pub fn build(self) -> SubcircuitTemplate {
        self.template
    }
}

/// Case-insensitive map from template name to template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubcircuitRegistry {
    templates: IndexMap<String, SubcircuitTemplate>,
}

impl SubcircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> String {
        name.to_uppercase()
    }

    /// Register a template.
    ///
    /// Returns `true` when the name was new. Registering identical content
    /// again is a no-op returning `false`; different content under a taken
    /// name fails with [`Error::DuplicateSubcircuitName`].
    pub fn register(&mut self, template: SubcircuitTemplate) -> Result<bool> {
        let key = Self::key(&template.name);
        match self.templates.get(&key) {
            Some(existing) if existing.same_body(&template) => Ok(false),
            Some(_) => Err(Error::DuplicateSubcircuitName {
                name: template.name,
            }),
            None => {
                self.templates.insert(key, template);
                Ok(true)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SubcircuitTemplate> {
        self.templates.get(&Self::key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(&Self::key(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubcircuitTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Check an instance against the template it names.
    pub fn check_instance(&self, element: &Element) -> Result<()> {
        let Some(name) = element.template() else {
            return Ok(());
        };
        let template = self.get(name).ok_or_else(|| Error::UndefinedSubcircuit {
            instance: element.name.clone(),
            name: name.to_string(),
        })?;
        if template.arity() != element.nodes.len() {
            return Err(Error::PortArityMismatch {
                instance: element.name.clone(),
                name: template.name.clone(),
                expected: template.arity(),
                found: element.nodes.len(),
            });
        }
        Ok(())
    }

    /// Fail if any template instantiates itself, directly or through others.
    ///
    /// References to unregistered templates are ignored here; they are
    /// reported by [`check_instance`](Self::check_instance).
    pub fn check_acyclic(&self) -> Result<()> {
        let mut done = HashSet::new();
        for template in self.templates.values() {
            let mut stack = Vec::new();
            self.visit(&template.name, &mut stack, &mut done)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> Result<()> {
        let key = Self::key(name);
        if done.contains(&key) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|s| Self::key(s) == key) {
            let mut chain = stack[pos..].to_vec();
            chain.push(name.to_string());
            return Err(Error::RecursiveSubcircuit { chain });
        }
        let Some(template) = self.get(name) else {
            return Ok(());
        };
        stack.push(template.name.clone());
        for child in template.references() {
            self.visit(child, stack, done)?;
        }
        stack.pop();
        done.insert(key);
        Ok(())
    }
}
