//! Dot-directive parsing (.SUBCKT, .ENDS, .INCLUDE, .LIB, .MODEL, .PARAM,
//! .TRAN, .DC, .AC, .OP, .OPTIONS, .TEMP, .IC, .TITLE, .END).

use spicenet_core::units::parse_value;
use spicenet_core::{
    AcSweepType, AnalysisCommand, DcSweepSpec, InitialCondition, Model, OptionSetting, Param,
    Value,
};

use crate::error::Result;
use crate::fields::{Field, split_fields, unquote};
use crate::tokenizer::LogicalLine;

use super::{Card, Directive, Site, opaque};

pub(super) fn parse_directive(
    keyword: &str,
    args: &str,
    line: &LogicalLine,
    site: &Site<'_>,
) -> Result<Card> {
    let upper = keyword.to_ascii_uppercase();
    if upper == "TITLE" {
        return Ok(Card::Directive(Directive::Title(args.to_string())));
    }

    let fields = split_fields(args).map_err(|msg| site.malformed(msg))?;
    let directive = match upper.as_str() {
        "SUBCKT" => parse_subckt(fields, site)?,
        "ENDS" => Directive::Ends {
            name: fields.first().and_then(Field::as_word).map(str::to_string),
        },
        "INCLUDE" | "INC" => parse_include(&fields, site)?,
        "LIB" => parse_lib(&fields, site)?,
        "ENDL" => Directive::EndLib,
        "MODEL" => parse_model(fields, site)?,
        "PARAM" => Directive::Param(assignments_only(fields, ".param", site)?),
        "TRAN" => Directive::Analysis(parse_tran(&fields, site)?),
        "DC" => Directive::Analysis(parse_dc(&fields, site)?),
        "AC" => Directive::Analysis(parse_ac(&fields, site)?),
        "OP" => Directive::Analysis(AnalysisCommand::Op),
        "OPTIONS" | "OPTION" => Directive::Options(parse_options(fields)),
        "TEMP" => Directive::Temp(expect_number(fields.first(), "temperature", site)?),
        "IC" => Directive::Ic(parse_ic(fields, site)?),
        "END" => Directive::End,
        _ => {
            log::warn!("{}: unknown directive .{}", site.location, keyword);
            return Ok(Card::Unrecognized(opaque(keyword, &line.text, line.line)));
        }
    };
    Ok(Card::Directive(directive))
}

/// Parse .SUBCKT name port.. [PARAMS:] [k=v..]
fn parse_subckt(fields: Vec<Field>, site: &Site<'_>) -> Result<Directive> {
    let mut fields = fields.into_iter().peekable();
    let name = match fields.next() {
        Some(Field::Word(name)) => name,
        _ => return Err(site.malformed("expected subcircuit name for .SUBCKT")),
    };

    let mut ports = Vec::new();
    while let Some(Field::Word(word)) = fields.peek() {
        if word.eq_ignore_ascii_case("PARAMS:") {
            fields.next();
            break;
        }
        ports.push(word.clone());
        fields.next();
    }

    let params = assignments_only(fields, ".subckt", site)?;
    Ok(Directive::Subckt {
        name,
        ports,
        params,
    })
}

/// Parse .INCLUDE path; unquoted paths may contain spaces.
fn parse_include(fields: &[Field], site: &Site<'_>) -> Result<Directive> {
    let words: Vec<&str> = fields.iter().filter_map(Field::as_word).collect();
    if words.is_empty() {
        return Err(site.malformed("expected file path for .INCLUDE"));
    }
    Ok(Directive::Include {
        path: unquote(&words.join(" ")).to_string(),
    })
}

/// Parse .LIB path section, or the one-argument .LIB: a section start inside
/// a library file, a whole-file include elsewhere.
fn parse_lib(fields: &[Field], site: &Site<'_>) -> Result<Directive> {
    let words: Vec<&str> = fields.iter().filter_map(Field::as_word).collect();
    match words.as_slice() {
        [name] => Ok(Directive::LibSection {
            name: unquote(name).to_string(),
        }),
        [path, section] => Ok(Directive::Lib {
            path: unquote(path).to_string(),
            section: section.to_string(),
        }),
        _ => Err(site.malformed("expected .LIB path section or .LIB section")),
    }
}

/// Parse .MODEL name type[(params)] [params]
fn parse_model(fields: Vec<Field>, site: &Site<'_>) -> Result<Directive> {
    let mut fields = fields.into_iter();
    let name = match fields.next() {
        Some(Field::Word(name)) => name,
        _ => return Err(site.malformed("expected model name for .MODEL")),
    };
    let kind_field = match fields.next() {
        Some(Field::Word(kind)) => kind,
        _ => return Err(site.malformed(format!("model {} has no type", name))),
    };

    let mut params = Vec::new();
    let kind = match kind_field.split_once('(') {
        Some((kind, rest)) => {
            params.extend(group_params(&format!("({}", rest), site)?);
            kind.to_string()
        }
        None => kind_field,
    };

    for field in fields {
        match field {
            Field::Assign { .. } => params.extend(field.to_param()),
            Field::Word(group) if group.starts_with('(') => {
                params.extend(group_params(&group, site)?)
            }
            Field::Word(word) => {
                return Err(site.malformed(format!("unexpected field {} in model {}", word, name)));
            }
        }
    }

    Ok(Directive::Model(Model::new(name, kind, params)))
}

/// Parameters inside a `( .. )` group.
fn group_params(group: &str, site: &Site<'_>) -> Result<Vec<Param>> {
    let inner = group
        .strip_prefix('(')
        .and_then(|g| g.strip_suffix(')'))
        .ok_or_else(|| site.malformed("model parameters are not enclosed in parentheses"))?;
    let fields = split_fields(&inner.replace(',', " ")).map_err(|msg| site.malformed(msg))?;
    assignments_only(fields, ".model", site)
}

fn assignments_only(
    fields: impl IntoIterator<Item = Field>,
    what: &str,
    site: &Site<'_>,
) -> Result<Vec<Param>> {
    fields
        .into_iter()
        .map(|field| match field {
            Field::Assign { name, value } => Ok(Param::new(name, Value::parse(&value))),
            Field::Word(word) => Err(site.malformed(format!(
                "expected name=value in {}, found {}",
                what, word
            ))),
        })
        .collect()
}

/// Parse .TRAN tstep tstop [tstart [tmax]] [UIC]
fn parse_tran(fields: &[Field], site: &Site<'_>) -> Result<AnalysisCommand> {
    let mut words: Vec<&str> = fields.iter().filter_map(Field::as_word).collect();
    let uic = words
        .last()
        .is_some_and(|w| w.eq_ignore_ascii_case("UIC"));
    if uic {
        words.pop();
    }
    if words.len() < 2 || words.len() > 4 {
        return Err(site.malformed("expected .TRAN tstep tstop [tstart [tmax]] [UIC]"));
    }

    let number = |i: usize, what: &str| -> Result<f64> {
        parse_value(words[i]).ok_or_else(|| site.malformed(format!("invalid {} {}", what, words[i])))
    };
    let tstep = number(0, "tstep")?;
    let tstop = number(1, "tstop")?;
    let tstart = if words.len() > 2 { number(2, "tstart")? } else { 0.0 };
    let tmax = if words.len() > 3 { Some(number(3, "tmax")?) } else { None };

    Ok(AnalysisCommand::Tran {
        tstep,
        tstop,
        tstart,
        tmax,
        uic,
    })
}

/// Parse .DC source start stop step [source2 start2 stop2 step2]
fn parse_dc(fields: &[Field], site: &Site<'_>) -> Result<AnalysisCommand> {
    let words: Vec<&str> = fields.iter().filter_map(Field::as_word).collect();
    if words.is_empty() || words.len() % 4 != 0 || words.len() > 8 {
        return Err(site.malformed(
            "expected .DC source start stop step [source2 start2 stop2 step2]",
        ));
    }

    let mut sweeps = Vec::new();
    for chunk in words.chunks(4) {
        let number = |s: &str| {
            parse_value(s).ok_or_else(|| site.malformed(format!("invalid sweep value {}", s)))
        };
        sweeps.push(DcSweepSpec {
            source_name: chunk[0].to_string(),
            start: number(chunk[1])?,
            stop: number(chunk[2])?,
            step: number(chunk[3])?,
        });
    }
    Ok(AnalysisCommand::Dc { sweeps })
}

/// Parse .AC type npoints fstart fstop
fn parse_ac(fields: &[Field], site: &Site<'_>) -> Result<AnalysisCommand> {
    let words: Vec<&str> = fields.iter().filter_map(Field::as_word).collect();
    let [sweep, points, fstart, fstop] = words.as_slice() else {
        return Err(site.malformed("expected .AC DEC|OCT|LIN npoints fstart fstop"));
    };

    let sweep_type = match sweep.to_ascii_uppercase().as_str() {
        "DEC" => AcSweepType::Dec,
        "OCT" => AcSweepType::Oct,
        "LIN" => AcSweepType::Lin,
        other => {
            return Err(site.malformed(format!(
                "unknown AC sweep type '{}' (expected DEC, OCT, or LIN)",
                other
            )));
        }
    };

    let num_points = parse_value(points)
        .filter(|n| *n >= 1.0 && n.fract() == 0.0)
        .ok_or_else(|| site.malformed(format!("invalid point count {}", points)))?
        as usize;
    let number = |s: &str| {
        parse_value(s).ok_or_else(|| site.malformed(format!("invalid frequency {}", s)))
    };

    Ok(AnalysisCommand::Ac {
        sweep_type,
        num_points,
        fstart: number(fstart)?,
        fstop: number(fstop)?,
    })
}

fn parse_options(fields: Vec<Field>) -> Vec<OptionSetting> {
    fields
        .into_iter()
        .map(|field| match field {
            Field::Word(name) => OptionSetting { name, value: None },
            Field::Assign { name, value } => OptionSetting {
                name,
                value: Some(Value::parse(&value)),
            },
        })
        .collect()
}

/// Parse .IC V(node)=value ...
fn parse_ic(fields: Vec<Field>, site: &Site<'_>) -> Result<Vec<InitialCondition>> {
    let mut conditions = Vec::new();
    for field in fields {
        let Field::Assign { name, value } = field else {
            return Err(site.malformed("expected V(node)=value in .IC"));
        };
        let node = name
            .strip_prefix(|c: char| c.eq_ignore_ascii_case(&'V'))
            .and_then(|n| n.strip_prefix('('))
            .and_then(|n| n.strip_suffix(')'))
            .map(str::trim)
            .ok_or_else(|| site.malformed(format!("expected V(node) in .IC, found {}", name)))?;
        let voltage = parse_value(&value)
            .ok_or_else(|| site.malformed(format!("invalid initial voltage {}", value)))?;
        conditions.push(InitialCondition {
            node: node.to_string(),
            voltage,
        });
    }
    Ok(conditions)
}

fn expect_number(field: Option<&Field>, what: &str, site: &Site<'_>) -> Result<f64> {
    field
        .and_then(Field::as_word)
        .and_then(parse_value)
        .ok_or_else(|| site.malformed(format!("expected {}", what)))
}
