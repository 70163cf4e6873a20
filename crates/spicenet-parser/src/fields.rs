//! Field splitting for a single logical line.
//!
//! Fields are separated by whitespace. Parenthesised, braced and quoted
//! groups stay in one field, and `name = value` (spaces optional) becomes
//! a single assignment.

use spicenet_core::{Param, Value};

/// One field of a card.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Word(String),
    Assign { name: String, value: String },
}

impl Field {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Field::Word(w) => Some(w),
            Field::Assign { .. } => None,
        }
    }

    pub fn is_word(&self) -> bool {
        matches!(self, Field::Word(_))
    }

    /// Convert an assignment to a [`Param`]; words yield `None`.
    pub fn to_param(&self) -> Option<Param> {
        match self {
            Field::Assign { name, value } => Some(Param::new(name.clone(), Value::parse(value))),
            Field::Word(_) => None,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Raw {
    Text(String),
    Equals,
}

/// Split `text` into fields. Errors carry a short description of what is
/// unbalanced or dangling.
pub fn split_fields(text: &str) -> Result<Vec<Field>, String> {
    let raw = split_raw(text)?;
    let mut fields = Vec::with_capacity(raw.len());
    let mut iter = raw.into_iter().peekable();

    while let Some(token) = iter.next() {
        match token {
            Raw::Equals => return Err("'=' without a parameter name".to_string()),
            Raw::Text(word) => {
                if iter.peek() != Some(&Raw::Equals) {
                    fields.push(Field::Word(word));
                    continue;
                }
                iter.next();
                match iter.next() {
                    Some(Raw::Text(value)) => fields.push(Field::Assign { name: word, value }),
                    _ => return Err(format!("parameter {} has no value", word)),
                }
            }
        }
    }
    Ok(fields)
}

fn split_raw(text: &str) -> Result<Vec<Raw>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '{' => {
                depth.push(if c == '(' { ')' } else { '}' });
                current.push(c);
            }
            ')' | '}' => {
                if depth.pop() != Some(c) {
                    return Err(format!("unbalanced '{}'", c));
                }
                current.push(c);
            }
            '=' if depth.is_empty() => {
                flush(&mut current, &mut tokens);
                tokens.push(Raw::Equals);
            }
            c if c.is_whitespace() && depth.is_empty() => flush(&mut current, &mut tokens),
            c => current.push(c),
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if let Some(close) = depth.last() {
        return Err(format!("missing '{}'", close));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn flush(current: &mut String, tokens: &mut Vec<Raw>) {
    if !current.is_empty() {
        tokens.push(Raw::Text(std::mem::take(current)));
    }
}

/// Strip one layer of matching quotes.
pub fn unquote(field: &str) -> &str {
    for q in ['"', '\''] {
        if field.len() >= 2 && field.starts_with(q) && field.ends_with(q) {
            return &field[1..field.len() - 1];
        }
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Field {
        Field::Word(s.to_string())
    }

    fn assign(n: &str, v: &str) -> Field {
        Field::Assign {
            name: n.to_string(),
            value: v.to_string(),
        }
    }

    #[test]
    fn test_plain_words() {
        assert_eq!(
            split_fields("R1 1 2 100").unwrap(),
            vec![word("R1"), word("1"), word("2"), word("100")]
        );
    }

    #[test]
    fn test_assignments_with_spaces() {
        assert_eq!(
            split_fields("R1 1 2 100 tc = 0.001 m=2").unwrap(),
            vec![
                word("R1"),
                word("1"),
                word("2"),
                word("100"),
                assign("tc", "0.001"),
                assign("m", "2")
            ]
        );
    }

    #[test]
    fn test_groups_stay_together() {
        assert_eq!(
            split_fields("V1 in 0 SIN(0 0.02 440) AC 1").unwrap(),
            vec![
                word("V1"),
                word("in"),
                word("0"),
                word("SIN(0 0.02 440)"),
                word("AC"),
                word("1")
            ]
        );
        assert_eq!(
            split_fields("B1 out 0 V={v(in) * 2}").unwrap(),
            vec![word("B1"), word("out"), word("0"), assign("V", "{v(in) * 2}")]
        );
        assert_eq!(
            split_fields(".include \"my libs/op.lib\"").unwrap(),
            vec![word(".include"), word("\"my libs/op.lib\"")]
        );
    }

    #[test]
    fn test_model_parameters_in_parens() {
        assert_eq!(
            split_fields(".model D1 D(IS=2.52n RS = .568)").unwrap(),
            vec![word(".model"), word("D1"), word("D(IS=2.52n RS = .568)")]
        );
    }

    #[test]
    fn test_unbalanced() {
        assert!(split_fields("V1 1 0 SIN(0 1 1k").is_err());
        assert!(split_fields("R1 1 0 {a+b").is_err());
        assert!(split_fields("R1 1 0 1k)").is_err());
        assert!(split_fields(".include 'lib.sp").is_err());
    }

    #[test]
    fn test_dangling_equals() {
        assert!(split_fields("R1 1 0 = 5").is_ok());
        assert!(split_fields("= 5").is_err());
        assert!(split_fields("R1 1 0 tc=").is_err());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a b.lib\""), "a b.lib");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("plain"), "plain");
    }
}
