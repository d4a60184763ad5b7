//! Thin helpers over the tree-sitter Python grammar.
//!
//! Everything that knows concrete node kinds lives here so the rest of the
//! engine talks about declarations, decorators and imports instead.

use crate::error::{DirectiveError, Result};
use serde::Serialize;
use std::ops::Range;
use tree_sitter::{Node, Parser, Tree};

pub(crate) const DECORATED_DEFINITION: &str = "decorated_definition";
pub(crate) const FUNCTION_DEFINITION: &str = "function_definition";
pub(crate) const CLASS_DEFINITION: &str = "class_definition";
pub(crate) const EXPRESSION_STATEMENT: &str = "expression_statement";
pub(crate) const COMMENT: &str = "comment";

/// Kind of declaration that can carry markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Class,
    Function,
}

impl DeclKind {
    pub(crate) fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            CLASS_DEFINITION => Some(Self::Class),
            FUNCTION_DEFINITION => Some(Self::Function),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Function => "function",
        }
    }
}

/// A class or function declaration found in the tree
#[derive(Debug, Clone, Copy)]
pub(crate) struct Declaration<'t> {
    /// `decorated_definition` when decorated, otherwise the definition itself
    pub statement: Node<'t>,
    pub definition: Node<'t>,
    pub kind: DeclKind,
}

impl<'t> Declaration<'t> {
    /// Build from either a `decorated_definition` or a bare definition node
    pub fn from_statement(statement: Node<'t>) -> Option<Self> {
        let definition = if statement.kind() == DECORATED_DEFINITION {
            statement.child_by_field_name("definition")?
        } else {
            statement
        };
        let kind = DeclKind::from_node_kind(definition.kind())?;
        Some(Self {
            statement,
            definition,
            kind,
        })
    }

    pub fn name<'s>(&self, src: &'s str) -> &'s str {
        self.definition
            .child_by_field_name("name")
            .map(|name| node_text(name, src))
            .unwrap_or_default()
    }

    pub fn decorators(&self) -> Vec<Node<'t>> {
        if self.statement.kind() != DECORATED_DEFINITION {
            return Vec::new();
        }
        let mut cursor = self.statement.walk();
        self.statement
            .children(&mut cursor)
            .filter(|child| child.kind() == "decorator")
            .collect()
    }

    pub fn body(&self) -> Option<Node<'t>> {
        self.definition.child_by_field_name("body")
    }

    /// Column of the first line of the statement
    pub fn column(&self) -> usize {
        self.statement.start_position().column
    }
}

/// Parse Python source, failing on the first syntax error
pub(crate) fn parse_python(text: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| DirectiveError::tree_sitter(format!("Failed to set language: {e}")))?;

    let tree = parser
        .parse(text, None)
        .ok_or_else(|| DirectiveError::tree_sitter("Parser returned no tree"))?;

    if let Some(bad) = first_error(tree.root_node()) {
        let position = bad.start_position();
        let message = if bad.is_missing() {
            format!("missing '{}'", bad.kind())
        } else {
            let snippet: String = node_text(bad, text).chars().take(40).collect();
            format!("unexpected '{snippet}'")
        };
        return Err(DirectiveError::parse(
            position.row + 1,
            position.column + 1,
            message,
        ));
    }

    Ok(tree)
}

fn first_error(node: Node) -> Option<Node> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(first_error)
        .or(Some(node))
}

pub(crate) fn node_text<'s>(node: Node, src: &'s str) -> &'s str {
    &src[node.byte_range()]
}

/// Declarations directly in `scope`, in pre-order, without entering nested
/// declarations (compound statements such as `if` or `try` are entered)
pub(crate) fn scope_declarations(scope: Node) -> Vec<Declaration> {
    let mut found = Vec::new();
    collect_declarations(scope, &mut found);
    found
}

fn collect_declarations<'t>(node: Node<'t>, found: &mut Vec<Declaration<'t>>) {
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    for child in children {
        match Declaration::from_statement(child) {
            Some(declaration) => found.push(declaration),
            None => collect_declarations(child, found),
        }
    }
}

/// First declaration named `name` in pre-order, optionally of one kind only
pub(crate) fn find_declaration<'t>(
    scope: Node<'t>,
    src: &str,
    kind: Option<DeclKind>,
    name: &str,
) -> Option<Declaration<'t>> {
    for decl in scope_declarations(scope) {
        if kind.map_or(true, |k| k == decl.kind) && decl.name(src) == name {
            return Some(decl);
        }
        if let Some(found) = find_declaration(decl.definition, src, kind, name) {
            return Some(found);
        }
    }
    None
}

/// The outermost declaration enclosing `decl` (or `decl` itself)
pub(crate) fn outermost_declaration(decl: Declaration) -> Declaration {
    let mut top = decl;
    let mut current = decl.statement.parent();
    while let Some(node) = current {
        if let Some(enclosing) = Declaration::from_statement(node) {
            top = enclosing;
        }
        current = node.parent();
    }
    top
}

/// Split a call's callee into `(prefix, name)`: `a.b.c(...)` → `("a.b", "c")`,
/// `f(...)` → `("", "f")`
pub(crate) fn call_name(call: Node, src: &str) -> Option<(String, String)> {
    if call.kind() != "call" {
        return None;
    }
    let function = call.child_by_field_name("function")?;
    match function.kind() {
        "identifier" => Some((String::new(), node_text(function, src).to_string())),
        "attribute" => {
            let object = function.child_by_field_name("object")?;
            let attribute = function.child_by_field_name("attribute")?;
            Some((
                node_text(object, src).to_string(),
                node_text(attribute, src).to_string(),
            ))
        }
        _ => None,
    }
}

/// Whether `statement` sits directly in the module, outside any block
pub(crate) fn is_module_statement(statement: Node) -> bool {
    statement.parent().is_some_and(|parent| parent.kind() == "module")
}

/// The expression of a decorator (`@expr`)
pub(crate) fn decorator_expression(decorator: Node) -> Option<Node> {
    let mut cursor = decorator.walk();
    let found = decorator
        .named_children(&mut cursor)
        .find(|child| child.kind() != COMMENT);
    found
}

/// Named, non-comment children
pub(crate) fn significant_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != COMMENT)
        .collect()
}

/// The docstring statement of a block, when its first statement is a bare string
pub(crate) fn docstring(block: Node) -> Option<Node> {
    let first = significant_children(block).into_iter().next()?;
    if first.kind() != EXPRESSION_STATEMENT {
        return None;
    }
    let inner = significant_children(first);
    match inner.as_slice() {
        [only] if matches!(only.kind(), "string" | "concatenated_string") => Some(first),
        _ => None,
    }
}

pub(crate) fn line_start(src: &str, pos: usize) -> usize {
    src[..pos].rfind('\n').map_or(0, |idx| idx + 1)
}

/// Offset just past the newline ending the line that contains `pos`
pub(crate) fn line_end(src: &str, pos: usize) -> usize {
    src[pos..].find('\n').map_or(src.len(), |idx| pos + idx + 1)
}

/// Span that removes `span` together with its physical lines when nothing
/// else shares them
pub(crate) fn line_removal_span(src: &str, span: Range<usize>) -> Range<usize> {
    let start_of_line = line_start(src, span.start);
    let leading_blank = src[start_of_line..span.start].trim().is_empty();
    let end_of_line = if src[..span.end].ends_with('\n') {
        span.end
    } else {
        line_end(src, span.end)
    };
    let trailing_blank = src[span.end..end_of_line].trim().is_empty();

    if leading_blank && trailing_blank {
        start_of_line..end_of_line
    } else if trailing_blank {
        span.start..end_of_line.saturating_sub(1).max(span.end)
    } else {
        span
    }
}

/// Extend `end` over following comment lines indented deeper than `column`;
/// such comments visually belong to the block that ends at `end`
pub(crate) fn trailing_comment_end(src: &str, end: usize, column: usize) -> usize {
    let mut extended = end;
    let mut cursor = if src[..end].ends_with('\n') {
        end
    } else {
        line_end(src, end)
    };
    while cursor < src.len() {
        let next = line_end(src, cursor);
        let line = src[cursor..next].trim_end_matches(['\n', '\r']);
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            cursor = next;
            continue;
        }
        let indent = line.len() - trimmed.len();
        if !trimmed.starts_with('#') || indent <= column {
            break;
        }
        extended = cursor + line.len();
        cursor = next;
    }
    extended
}

/// Byte spans of the string literals under `node` that run over more than
/// one line. Lines starting inside them belong to the literal's value.
pub(crate) fn multiline_strings(node: Node) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    collect_multiline_strings(node, &mut spans);
    spans
}

fn collect_multiline_strings(node: Node, spans: &mut Vec<Range<usize>>) {
    if node.kind() == "string" {
        if node.start_position().row != node.end_position().row {
            spans.push(node.byte_range());
        }
        return;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    for child in children {
        collect_multiline_strings(child, spans);
    }
}

/// Leading whitespace of the line containing `pos`
pub(crate) fn line_indent(src: &str, pos: usize) -> &str {
    let start = line_start(src, pos);
    let line = src[start..line_end(src, start)].trim_end_matches(['\n', '\r']);
    &line[..line.len() - line.trim_start().len()]
}

/// Remove up to `column` leading whitespace bytes from every line.
///
/// `text` starts at offset `base` of the source that `strings` (see
/// [`multiline_strings`]) refer to; lines starting inside those are kept.
pub(crate) fn dedent(text: &str, base: usize, column: usize, strings: &[Range<usize>]) -> String {
    if column == 0 {
        return text.to_string();
    }
    relayout(text, base, strings, false, |line| strip_indent(line, column).to_string())
}

/// Replace `from` columns of indentation with `indent` on every line after
/// the first; blank lines become empty
pub(crate) fn reindent(
    text: &str,
    base: usize,
    from: usize,
    indent: &str,
    strings: &[Range<usize>],
) -> String {
    relayout(text, base, strings, true, |line| shift_line(line, from, indent))
}

/// [`reindent`] including the first line
pub(crate) fn reindent_all(
    text: &str,
    base: usize,
    from: usize,
    indent: &str,
    strings: &[Range<usize>],
) -> String {
    relayout(text, base, strings, false, |line| shift_line(line, from, indent))
}

fn shift_line(line: &str, from: usize, indent: &str) -> String {
    if line.trim().is_empty() {
        String::new()
    } else {
        format!("{indent}{}", strip_indent(line, from))
    }
}

fn relayout(
    text: &str,
    base: usize,
    strings: &[Range<usize>],
    keep_first: bool,
    shift: impl Fn(&str) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut offset = base;
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let in_literal = strings
            .iter()
            .any(|span| span.start < offset && offset < span.end);
        if (idx == 0 && keep_first) || in_literal {
            out.push_str(line);
        } else {
            out.push_str(&shift(line));
        }
        offset += line.len() + 1;
    }
    out
}

fn strip_indent(line: &str, column: usize) -> &str {
    let removable = line
        .bytes()
        .take(column)
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count();
    &line[removable..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_reports_syntax_errors() {
        let err = parse_python("def broken(:\n    pass\n").unwrap_err();
        assert!(matches!(err, DirectiveError::Parse { line: 1, .. }), "{err}");
    }

    #[test]
    fn scope_declarations_enters_compound_statements_only() {
        let code = "\
def a():
    def inner():
        pass

if True:
    class B:
        def method(self):
            pass

@decorator
def c():
    pass
";
        let tree = parse_python(code).unwrap();
        let names: Vec<_> = scope_declarations(tree.root_node())
            .iter()
            .map(|d| (d.kind, d.name(code).to_string()))
            .collect();
        assert_eq!(
            names,
            vec![
                (DeclKind::Function, "a".to_string()),
                (DeclKind::Class, "B".to_string()),
                (DeclKind::Function, "c".to_string()),
            ]
        );
    }

    #[test]
    fn call_name_splits_prefix() {
        let code = "popcorn.pop(1)\nrun()\n";
        let tree = parse_python(code).unwrap();
        let root = tree.root_node();
        let first = significant_children(root)[0];
        let call = significant_children(first)[0];
        assert_eq!(
            call_name(call, code),
            Some(("popcorn".to_string(), "pop".to_string()))
        );
        let second = significant_children(root)[1];
        let call = significant_children(second)[0];
        assert_eq!(call_name(call, code), Some((String::new(), "run".to_string())));
    }

    #[test]
    fn line_removal_takes_whole_lines() {
        let src = "a\n    @x.y()\n    def f(): pass\n";
        let start = src.find('@').unwrap();
        let end = src.find(")\n").unwrap() + 1;
        let span = line_removal_span(src, start..end);
        let mut out = src.to_string();
        out.replace_range(span, "");
        assert_eq!(out, "a\n    def f(): pass\n");
    }

    #[test]
    fn trailing_comments_deeper_than_column_are_included() {
        let src = "def f():\n    x = 1\n    # tail\n\n# module comment\n";
        let end = src.find("x = 1").unwrap() + "x = 1".len();
        let extended = trailing_comment_end(src, end, 0);
        assert_eq!(&src[..extended], "def f():\n    x = 1\n    # tail");
    }

    #[test]
    fn dedent_and_reindent() {
        assert_eq!(dedent("    def f():\n        pass", 0, 4, &[]), "def f():\n    pass");
        assert_eq!(
            reindent("x = 1\n        y = 2\n\n        z = 3", 0, 8, "    ", &[]),
            "x = 1\n    y = 2\n\n    z = 3"
        );
        assert_eq!(reindent("if x:\n  y()", 0, 2, "\t\t", &[]), "if x:\n\t\ty()");
    }

    #[test]
    fn lines_inside_string_literals_keep_their_indentation() {
        let code = "    x = \"\"\"a\n  b\n\"\"\"\n    y = 1\n";
        let tree = parse_python(&format!("if 1:\n{code}")).unwrap();
        let base = "if 1:\n".len();
        let strings = multiline_strings(tree.root_node());
        assert_eq!(strings.len(), 1);

        assert_eq!(
            dedent(code, base, 4, &strings),
            "x = \"\"\"a\n  b\n\"\"\"\ny = 1\n"
        );
        assert_eq!(
            reindent(code, base, 4, "\t", &strings),
            "    x = \"\"\"a\n  b\n\"\"\"\n\ty = 1\n"
        );
    }

    #[test]
    fn line_indent_is_the_leading_whitespace() {
        let src = "class A:\n\tdef f(self):\n\t\treturn 1\n";
        assert_eq!(line_indent(src, src.find("return").unwrap()), "\t\t");
        assert_eq!(line_indent(src, 0), "");
    }
}
