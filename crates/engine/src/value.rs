//! Literal values carried by directive arguments.

use crate::syntax::{node_text, significant_children};
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use tree_sitter::Node;

/// A bare (possibly dotted) name used as a directive argument.
///
/// Keeps the byte span of the expression in the source it was read from so
/// callers can map the reference back onto the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identifier {
    pub name: String,
    pub span: Range<usize>,
}

impl Identifier {
    pub fn new(name: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Evaluated argument value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Identifier(Identifier),
}

impl Value {
    /// Short shape name used in schema messages
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Identifier(_) => "identifier",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float view; integers widen
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Elements of a list or tuple
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub const fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Self::Identifier(ident) => Some(ident),
            _ => None,
        }
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Evaluate a literal expression node.
    ///
    /// Only literals, bare names and containers of those are accepted; any
    /// other expression is reported as an error message.
    pub(crate) fn from_node(node: Node, src: &str) -> Result<Self, String> {
        match node.kind() {
            "true" => Ok(Self::Bool(true)),
            "false" => Ok(Self::Bool(false)),
            "none" => Ok(Self::None),
            "integer" => parse_int(node_text(node, src)).map(Self::Int),
            "float" => parse_float(node_text(node, src)).map(Self::Float),
            "string" => decode_string(node_text(node, src)).map(Self::Str),
            "concatenated_string" => {
                let mut joined = String::new();
                for part in significant_children(node) {
                    joined.push_str(&decode_string(node_text(part, src))?);
                }
                Ok(Self::Str(joined))
            }
            "identifier" | "attribute" => dotted_name(node, src)
                .map(|name| Self::Identifier(Identifier::new(name, node.byte_range())))
                .ok_or_else(|| unsupported(node, src)),
            "list" | "set" => Self::elements(node, src).map(Self::List),
            "tuple" => Self::elements(node, src).map(Self::Tuple),
            "parenthesized_expression" => match significant_children(node).as_slice() {
                [inner] => Self::from_node(*inner, src),
                _ => Err(unsupported(node, src)),
            },
            "dictionary" => {
                let mut pairs = Vec::new();
                for pair in significant_children(node) {
                    let key = pair.child_by_field_name("key");
                    let value = pair.child_by_field_name("value");
                    match (pair.kind(), key, value) {
                        ("pair", Some(key), Some(value)) => {
                            pairs.push((Self::from_node(key, src)?, Self::from_node(value, src)?));
                        }
                        _ => return Err(unsupported(pair, src)),
                    }
                }
                Ok(Self::Dict(pairs))
            }
            "unary_operator" => {
                let operator = node.child_by_field_name("operator").map(|op| node_text(op, src));
                let operand = node
                    .child_by_field_name("argument")
                    .map(|arg| Self::from_node(arg, src))
                    .transpose()?;
                match (operator, operand) {
                    (Some("-"), Some(Self::Int(i))) => Ok(Self::Int(-i)),
                    (Some("-"), Some(Self::Float(f))) => Ok(Self::Float(-f)),
                    (Some("+"), Some(v @ (Self::Int(_) | Self::Float(_)))) => Ok(v),
                    _ => Err(unsupported(node, src)),
                }
            }
            _ => Err(unsupported(node, src)),
        }
    }

    fn elements(node: Node, src: &str) -> Result<Vec<Self>, String> {
        significant_children(node)
            .into_iter()
            .map(|child| Self::from_node(child, src))
            .collect()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Identifier(ident) => f.write_str(&ident.name),
            Self::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Dict(pairs) => {
                f.write_str("{")?;
                for (idx, (key, value)) in pairs.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn unsupported(node: Node, src: &str) -> String {
    format!(
        "unsupported argument expression '{}' ({})",
        node_text(node, src),
        node.kind()
    )
}

/// Dotted name of an `identifier` or a chain of `attribute` accesses
fn dotted_name(node: Node, src: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, src).to_string()),
        "attribute" => {
            let object = dotted_name(node.child_by_field_name("object")?, src)?;
            let attribute = node.child_by_field_name("attribute")?;
            Some(format!("{object}.{}", node_text(attribute, src)))
        }
        _ => None,
    }
}

fn parse_int(text: &str) -> Result<i64, String> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        lower.parse()
    };
    parsed.map_err(|e| format!("invalid integer literal '{text}': {e}"))
}

fn parse_float(text: &str) -> Result<f64, String> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    cleaned
        .parse()
        .map_err(|e| format!("invalid float literal '{text}': {e}"))
}

/// Decode a single Python string literal, including its prefix and quotes
pub(crate) fn decode_string(literal: &str) -> Result<String, String> {
    let quote_at = literal
        .find(['\'', '"'])
        .ok_or_else(|| format!("malformed string literal {literal}"))?;
    let prefix = literal[..quote_at].to_ascii_lowercase();
    if prefix.contains('f') {
        return Err(format!("formatted string {literal} is not a literal"));
    }
    let raw = prefix.contains('r');

    let body = &literal[quote_at..];
    let quote_len = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        3
    } else {
        1
    };
    if body.len() < quote_len * 2 {
        return Err(format!("malformed string literal {literal}"));
    }
    let content = &body[quote_len..body.len() - quote_len];

    if raw {
        Ok(content.to_string())
    } else {
        Ok(unescape(content))
    }
}

fn unescape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            '\\' | '\'' | '"' => out.push(next),
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => out.push(decoded),
                    _ => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_python;
    use pretty_assertions::assert_eq;

    fn eval(expr: &str) -> Result<Value, String> {
        let code = format!("{expr}\n");
        let tree = parse_python(&code).unwrap();
        let stmt = significant_children(tree.root_node())[0];
        let node = significant_children(stmt)[0];
        Value::from_node(node, &code)
    }

    #[test]
    fn literals() {
        assert_eq!(eval("True").unwrap(), Value::Bool(true));
        assert_eq!(eval("None").unwrap(), Value::None);
        assert_eq!(eval("-3").unwrap(), Value::Int(-3));
        assert_eq!(eval("0x1_0").unwrap(), Value::Int(16));
        assert_eq!(eval("2.5").unwrap(), Value::Float(2.5));
        assert_eq!(eval("'a\\tb'").unwrap(), Value::Str("a\tb".to_string()));
        assert_eq!(eval("r'a\\tb'").unwrap(), Value::Str("a\\tb".to_string()));
        assert_eq!(eval("'''x'''").unwrap(), Value::Str("x".to_string()));
        assert_eq!(eval("'a' 'b'").unwrap(), Value::Str("ab".to_string()));
    }

    #[test]
    fn names_and_containers() {
        let value = eval("[foo, pkg.bar, \"x.py:y\"]").unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items[0].as_identifier().unwrap().name, "foo");
        assert_eq!(items[0].as_identifier().unwrap().span, 1..4);
        assert_eq!(items[1].as_identifier().unwrap().name, "pkg.bar");
        assert_eq!(items[2].as_str(), Some("x.py:y"));

        assert_eq!(
            eval("(1,)").unwrap(),
            Value::Tuple(vec![Value::Int(1)])
        );
        assert_eq!(
            eval("{'k': 1}").unwrap(),
            Value::Dict(vec![(Value::Str("k".to_string()), Value::Int(1))])
        );
    }

    #[test]
    fn rejects_non_literals() {
        assert!(eval("f'{x}'").is_err());
        assert!(eval("a + b").is_err());
        assert!(eval("call()").is_err());
    }

    #[test]
    fn display_is_python_like() {
        assert_eq!(Value::Bool(false).to_string(), "False");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Str("a".to_string())]).to_string(),
            "[1, \"a\"]"
        );
    }
}
