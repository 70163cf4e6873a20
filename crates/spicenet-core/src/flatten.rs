//! Inline expansion of subcircuit instances.
//!
//! Flattened names follow the ngspice convention: an element `R1` inside
//! instance `X1` becomes `R.X1.R1`, internal node `mid` becomes `X1.mid`.
//! Models declared inside a template are hoisted as `X1.<model>` and stay
//! visible to the instances nested below it.

use std::collections::HashMap;

use crate::circuit::Circuit;
use crate::element::{Element, ElementKind};
use crate::error::{Error, Result};
use crate::node::NodeId;
use crate::subcircuit::SubcircuitRegistry;
use crate::value::Value;

/// Maximum instance nesting depth before expansion gives up.
pub const MAX_DEPTH: usize = 64;

impl Circuit {
    /// Return a copy with every subcircuit instance expanded inline.
    ///
    /// The registry is consulted but not copied into the result; library
    /// includes stay in place for models referenced by expanded elements.
    pub fn flatten(&self) -> Result<Circuit> {
        let mut flat = self.clone();
        flat.elements = Vec::new();
        flat.subcircuits = SubcircuitRegistry::new();

        let mut stack = Vec::new();
        let top_level = HashMap::new();
        for element in &self.elements {
            if element.is_instance() {
                let nodes = element.nodes.clone();
                let scope = Scope {
                    path: &element.name,
                    models: &top_level,
                };
                expand(self, &mut flat, element, &nodes, scope, &mut stack)?;
            } else {
                flat.elements.push(element.clone());
            }
        }
        Ok(flat)
    }
}

/// Where an instance sits in the hierarchy.
#[derive(Clone, Copy)]
struct Scope<'a> {
    /// Hierarchical instance name.
    path: &'a str,
    /// Models hoisted by enclosing instances, by upper-cased local name.
    models: &'a HashMap<String, String>,
}

/// Expand `instance` into `flat`. `actual` holds the instance's nodes as
/// ids in `flat`.
fn expand(
    source: &Circuit,
    flat: &mut Circuit,
    instance: &Element,
    actual: &[NodeId],
    scope: Scope<'_>,
    stack: &mut Vec<String>,
) -> Result<()> {
    let path = scope.path;
    source.subcircuits.check_instance(instance)?;
    let Some(template) = instance.template().and_then(|n| source.subcircuits.get(n)) else {
        return Ok(());
    };

    if stack.iter().any(|s| s.eq_ignore_ascii_case(&template.name)) || stack.len() >= MAX_DEPTH
    {
        let mut chain = stack.clone();
        chain.push(template.name.clone());
        return Err(Error::RecursiveSubcircuit { chain });
    }
    stack.push(template.name.clone());

    let mut map: HashMap<NodeId, NodeId> = template
        .port_ids()
        .into_iter()
        .zip(actual.iter().copied())
        .collect();
    map.insert(NodeId::GROUND, NodeId::GROUND);

    let mut local_models = scope.models.clone();
    for model in &template.models {
        let mut hoisted = model.clone();
        hoisted.name = format!("{}.{}", path, model.name);
        hoisted.source = None;
        local_models.insert(model.name.to_uppercase(), hoisted.name.clone());
        flat.add_model(hoisted);
    }

    let local_elements: HashMap<String, String> = template
        .elements
        .iter()
        .filter(|e| !e.is_instance())
        .map(|e| (e.name.to_uppercase(), expanded_name(e, path)))
        .collect();

    for element in &template.elements {
        let nodes: Vec<NodeId> = element
            .nodes
            .iter()
            .map(|local| {
                *map.entry(*local).or_insert_with(|| {
                    let name = template.nodes.name_of(*local).unwrap_or("?");
                    flat.nodes.unify(&format!("{}.{}", path, name))
                })
            })
            .collect();

        if element.is_instance() {
            let child_path = format!("{}.{}", path, element.name);
            let child = Scope {
                path: &child_path,
                models: &local_models,
            };
            expand(source, flat, element, &nodes, child, stack)?;
            continue;
        }

        let mut expanded = element.clone();
        expanded.name = expanded_name(element, path);
        expanded.nodes = nodes;
        if names_elements(element.kind) {
            for value in &mut expanded.values {
                if let Value::Text(name) = value
                    && let Some(renamed) = local_elements.get(&name.to_uppercase())
                {
                    *name = renamed.clone();
                }
            }
        }
        if let Some(model) = &element.model
            && let Some(hoisted) = local_models.get(&model.to_uppercase())
        {
            expanded.model = Some(hoisted.clone());
        }
        flat.elements.push(expanded);
    }

    stack.pop();
    Ok(())
}

fn expanded_name(element: &Element, path: &str) -> String {
    format!("{}.{}.{}", element.kind.prefix(), path, element.name)
}

/// Kinds whose positional values name other elements: coupled inductors
/// and controlling voltage sources.
fn names_elements(kind: ElementKind) -> bool {
    matches!(
        kind,
        ElementKind::MutualInductance | ElementKind::Cccs | ElementKind::Ccvs
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::subcircuit::SubcircuitTemplate;

    fn divider() -> SubcircuitTemplate {
        SubcircuitTemplate::builder("DIV", ["in", "out", "gnd"])
            .element(ElementKind::Resistor, "R1", ["in", "mid"], vec![Value::Number(500.0)])
            .element(ElementKind::Resistor, "R2", ["mid", "out"], vec![Value::Number(500.0)])
            .element(ElementKind::Resistor, "R3", ["out", "gnd"], vec![Value::Number(1e3)])
            .build()
    }

    #[test]
    fn test_flatten_single_level() {
        let mut circuit = Circuit::new();
        circuit.attach_subcircuit(divider()).unwrap();
        let a = circuit.unify_node("a");
        let b = circuit.unify_node("b");
        circuit.add_element(Element::instance("X1", vec![a, b, NodeId::GROUND], "DIV"));

        let flat = circuit.flatten().unwrap();
        let names: Vec<&str> = flat.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["R.X1.R1", "R.X1.R2", "R.X1.R3"]);

        let mid = flat.node_id("X1.mid").unwrap();
        assert_eq!(flat.element("R.X1.R1").unwrap().nodes, vec![a, mid]);
        assert_eq!(flat.element("R.X1.R3").unwrap().nodes, vec![b, NodeId::GROUND]);
        assert!(flat.subcircuits().is_empty());
    }

    #[test]
    fn test_flatten_nested_with_local_model() {
        let mut circuit = Circuit::new();
        circuit.attach_subcircuit(divider()).unwrap();
        let mut clamp = SubcircuitTemplate::builder("CLAMP", ["p", "n"])
            .instance("XD", ["p", "n", "0"], "DIV")
            .element(ElementKind::Diode, "D1", ["p", "n"], vec![])
            .model(Model::new("DCLAMP", "D", vec![]))
            .build();
        clamp.elements[1].model = Some("DCLAMP".into());
        circuit.attach_subcircuit(clamp).unwrap();

        let p = circuit.unify_node("p");
        circuit.add_element(Element::instance("X9", vec![p, NodeId::GROUND], "CLAMP"));

        let flat = circuit.flatten().unwrap();
        assert!(flat.element("R.X9.XD.R1").is_some());
        assert_eq!(
            flat.element("D.X9.D1").unwrap().model.as_deref(),
            Some("X9.DCLAMP")
        );
        assert!(flat.model("X9.DCLAMP").is_some());
        assert!(flat.node_id("X9.XD.mid").is_some());
    }

    #[test]
    fn test_flatten_renames_referenced_elements() {
        let mut circuit = Circuit::new();
        let transformer = SubcircuitTemplate::builder("XF", ["p", "s"])
            .element(ElementKind::Inductor, "L1", ["p", "0"], vec![Value::Number(1e-3)])
            .element(ElementKind::Inductor, "L2", ["s", "0"], vec![Value::Number(1e-3)])
            .element(
                ElementKind::MutualInductance,
                "K1",
                Vec::<&str>::new(),
                vec![Value::Text("L1".into()), Value::Text("l2".into()), Value::Number(0.99)],
            )
            .element(ElementKind::VoltageSource, "Vsense", ["p", "m"], vec![Value::Number(0.0)])
            .element(
                ElementKind::Cccs,
                "F1",
                ["m", "s"],
                vec![Value::Text("Vsense".into()), Value::Number(2.0)],
            )
            .element(
                ElementKind::Ccvs,
                "H1",
                ["m", "0"],
                vec![Value::Text("Vglobal".into()), Value::Number(1.0)],
            )
            .build();
        circuit.attach_subcircuit(transformer).unwrap();
        let a = circuit.unify_node("a");
        let b = circuit.unify_node("b");
        circuit.add_element(Element::instance("X1", vec![a, b], "XF"));

        let flat = circuit.flatten().unwrap();
        assert!(flat.element("L1").is_none());
        assert_eq!(
            flat.element("K.X1.K1").unwrap().values,
            vec![
                Value::Text("L.X1.L1".into()),
                Value::Text("L.X1.L2".into()),
                Value::Number(0.99)
            ]
        );
        assert_eq!(
            flat.element("F.X1.F1").unwrap().values[0],
            Value::Text("V.X1.Vsense".into())
        );
        // Names outside the template are left alone.
        assert_eq!(
            flat.element("H.X1.H1").unwrap().values[0],
            Value::Text("Vglobal".into())
        );
        assert!(flat.to_string().contains("K.X1.K1 L.X1.L1 L.X1.L2 0.99"));
    }

    #[test]
    fn test_flatten_rejects_recursion() {
        let mut circuit = Circuit::new();
        circuit
            .attach_subcircuit(
                SubcircuitTemplate::builder("LOOP", ["p"])
                    .instance("X1", ["p"], "LOOP")
                    .build(),
            )
            .unwrap();
        let p = circuit.unify_node("p");
        circuit.add_element(Element::instance("X1", vec![p], "LOOP"));

        assert!(matches!(
            circuit.flatten(),
            Err(Error::RecursiveSubcircuit { .. })
        ));
    }

    #[test]
    fn test_flatten_checks_arity() {
        let mut circuit = Circuit::new();
        circuit.attach_subcircuit(divider()).unwrap();
        let a = circuit.unify_node("a");
        circuit.add_element(Element::instance("X1", vec![a], "DIV"));
        assert!(matches!(
            circuit.flatten(),
            Err(Error::PortArityMismatch { .. })
        ));
    }
}
