//! Element card parsing (R, C, L, V, I, B, D, Q, J, M, E, G, F, H, K, X).

use spicenet_core::{ElementKind, Param, Value};

use crate::error::Result;
use crate::fields::Field;

use super::{ElementCard, Site};

pub(crate) type ElementParser = fn(ElementKind, Vec<Field>, &Site<'_>) -> Result<ElementCard>;

/// Prefix dispatch: one entry per element kind.
pub(crate) const ELEMENT_PARSERS: &[(char, ElementKind, ElementParser)] = &[
    ('R', ElementKind::Resistor, parse_fixed),
    ('C', ElementKind::Capacitor, parse_fixed),
    ('L', ElementKind::Inductor, parse_fixed),
    ('V', ElementKind::VoltageSource, parse_fixed),
    ('I', ElementKind::CurrentSource, parse_fixed),
    ('B', ElementKind::BehavioralSource, parse_fixed),
    ('D', ElementKind::Diode, parse_fixed),
    ('Q', ElementKind::Bjt, parse_fixed),
    ('J', ElementKind::Jfet, parse_fixed),
    ('M', ElementKind::Mosfet, parse_fixed),
    ('E', ElementKind::Vcvs, parse_fixed),
    ('G', ElementKind::Vccs, parse_fixed),
    ('F', ElementKind::Cccs, parse_fixed),
    ('H', ElementKind::Ccvs, parse_fixed),
    ('K', ElementKind::MutualInductance, parse_fixed),
    ('X', ElementKind::SubcircuitInstance, parse_instance),
];

/// Parse a card with a fixed node count: `name nodes.. [model] values.. params..`.
fn parse_fixed(kind: ElementKind, fields: Vec<Field>, site: &Site<'_>) -> Result<ElementCard> {
    let mut fields = fields.into_iter();
    let name = element_name(&mut fields, site)?;
    let count = kind.node_count().unwrap_or(0);

    let mut nodes = Vec::with_capacity(count);
    for i in 0..count {
        match fields.next() {
            Some(Field::Word(node)) => nodes.push(node),
            _ => {
                return Err(site.malformed(format!(
                    "{} {} needs {} nodes, found {}",
                    kind, name, count, i
                )));
            }
        }
    }

    let mut rest: Vec<Field> = fields.collect();
    if kind == ElementKind::Bjt
        && has_substrate_node(&rest)
        && let Field::Word(substrate) = rest.remove(0)
    {
        nodes.push(substrate);
    }
    let mut fields = rest.into_iter();

    let model = if kind.takes_model() {
        match fields.next() {
            Some(Field::Word(model)) => Some(model),
            _ => return Err(site.malformed(format!("{} {} is missing a model name", kind, name))),
        }
    } else {
        None
    };

    let (values, params) = split_values(fields, site)?;

    let needs_value = matches!(
        kind,
        ElementKind::Resistor | ElementKind::Capacitor | ElementKind::Inductor
    );
    if needs_value && values.is_empty() && params.is_empty() {
        return Err(site.malformed(format!("{} {} has no value", kind, name)));
    }

    Ok(ElementCard {
        kind,
        name,
        nodes,
        model,
        values,
        params,
    })
}

/// Parse `Xname nodes.. template [PARAMS:] [k=v..]`.
fn parse_instance(kind: ElementKind, fields: Vec<Field>, site: &Site<'_>) -> Result<ElementCard> {
    let mut fields = fields.into_iter().peekable();
    let name = element_name(&mut fields, site)?;

    let mut positional = Vec::new();
    while let Some(Field::Word(word)) = fields.peek() {
        if word.eq_ignore_ascii_case("PARAMS:") {
            fields.next();
            break;
        }
        positional.push(word.clone());
        fields.next();
    }

    let Some(template) = positional.pop() else {
        return Err(site.malformed(format!("instance {} names no subcircuit", name)));
    };

    let mut params = Vec::new();
    for field in fields {
        match field {
            Field::Assign { name: key, value } => {
                let key = strip_params_marker(&key);
                params.push(Param::new(key, Value::parse(&value)));
            }
            Field::Word(word) => {
                return Err(site.malformed(format!(
                    "unexpected field {} after the subcircuit name of {}",
                    word, name
                )));
            }
        }
    }

    Ok(ElementCard {
        kind,
        name,
        nodes: positional,
        model: Some(template),
        values: Vec::new(),
        params,
    })
}

/// `Q1 c b e s QMOD`: a fourth word is the substrate node when a model
/// name, not an area factor or `OFF`, follows it.
fn has_substrate_node(rest: &[Field]) -> bool {
    match rest {
        [Field::Word(_), Field::Word(next), ..] => {
            matches!(Value::parse(next), Value::Text(_)) && !next.eq_ignore_ascii_case("OFF")
        }
        _ => false,
    }
}

fn element_name(fields: &mut impl Iterator<Item = Field>, site: &Site<'_>) -> Result<String> {
    match fields.next() {
        Some(Field::Word(name)) => Ok(name),
        _ => Err(site.malformed("card does not start with a name")),
    }
}

/// Words become values, assignments become parameters.
pub(crate) fn split_values(
    fields: impl IntoIterator<Item = Field>,
    site: &Site<'_>,
) -> Result<(Vec<Value>, Vec<Param>)> {
    let mut values = Vec::new();
    let mut params = Vec::new();
    for field in fields {
        match field {
            Field::Word(word) if params.is_empty() => values.push(Value::parse(&word)),
            Field::Word(word) => {
                return Err(site.malformed(format!("value {} follows a parameter", word)));
            }
            Field::Assign { name, value } => params.push(Param::new(name, Value::parse(&value))),
        }
    }
    Ok((values, params))
}

/// `PARAMS:gain=2` splits as an assignment to `PARAMS:gain`.
fn strip_params_marker(key: &str) -> &str {
    match key.get(..7) {
        Some(marker) if marker.eq_ignore_ascii_case("PARAMS:") => &key[7..],
        _ => key,
    }
}
