//! Format-preserving rewriting.
//!
//! Every transformation is expressed as a set of byte-span [`TextEdit`]s over
//! the current text and applied back to front, so bytes outside the edited
//! spans (comments, blank lines, quoting style) are kept exactly.

use crate::directive::RUN_ALIAS;
use crate::document::SourceDocument;
use crate::error::{DirectiveError, Result, Violation};
use crate::imports::ImportFilter;
use crate::syntax::{
    call_name, decorator_expression, dedent, docstring, is_module_statement, line_indent,
    line_removal_span, line_start, multiline_strings, reindent, reindent_all,
    significant_children, trailing_comment_end, DeclKind, Declaration, EXPRESSION_STATEMENT,
};
use std::ops::Range;
use tree_sitter::Node;

/// Replace `span` of the text with `replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TextEdit {
    pub span: Range<usize>,
    pub replacement: String,
}

impl TextEdit {
    pub fn replace(span: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn delete(span: Range<usize>) -> Self {
        Self::replace(span, String::new())
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }

    fn shifted(self, offset: usize) -> Self {
        Self {
            span: self.span.start - offset..self.span.end - offset,
            replacement: self.replacement,
        }
    }
}

/// Apply edits to `text`.
///
/// Edits fully contained in another edit are discarded; partially
/// overlapping edits are rejected. Insertions at the same offset keep the
/// order in which they were given.
pub(crate) fn apply_edits(text: &str, edits: Vec<TextEdit>) -> Result<String> {
    apply_edits_carrying(text, edits, &[]).map(|(out, _)| out)
}

/// [`apply_edits`], also moving `spans` of `text` to their place in the
/// result. Spans touched by an edit are dropped.
pub(crate) fn apply_edits_carrying(
    text: &str,
    mut edits: Vec<TextEdit>,
    spans: &[Range<usize>],
) -> Result<(String, Vec<Range<usize>>)> {
    edits.sort_by(|a, b| {
        a.span
            .start
            .cmp(&b.span.start)
            .then(b.span.end.cmp(&a.span.end))
    });

    let mut accepted: Vec<TextEdit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if edit.span.end > text.len() || edit.span.start > edit.span.end {
            return Err(DirectiveError::splice(format!(
                "edit {:?} is outside of the text (length {})",
                edit.span,
                text.len()
            )));
        }
        match accepted.last() {
            Some(last) if edit.span.start < last.span.end => {
                if edit.span.end > last.span.end {
                    return Err(DirectiveError::splice(format!(
                        "overlapping edits: {:?} and {:?}",
                        last.span, edit.span
                    )));
                }
            }
            _ => accepted.push(edit),
        }
    }

    let carried = spans
        .iter()
        .filter_map(|span| carry(span, &accepted))
        .collect();

    let mut out = text.to_string();
    for edit in accepted.into_iter().rev() {
        out.replace_range(edit.span, &edit.replacement);
    }
    Ok((out, carried))
}

fn carry(span: &Range<usize>, edits: &[TextEdit]) -> Option<Range<usize>> {
    let (mut removed, mut added) = (0, 0);
    for edit in edits {
        if edit.span.end <= span.start {
            removed += edit.span.len();
            added += edit.replacement.len();
        } else if edit.span.start < span.end {
            return None;
        }
    }
    Some(span.start - removed + added..span.end - removed + added)
}

/// Options controlling how an entity or document is rendered back to text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnparseOptions {
    /// Remove marker decorators, `run(...)` statements and marker imports
    pub drop_markers: bool,
    /// Keep only the docstring of every function body
    pub drop_implementation: bool,
    /// Render the outermost enclosing declaration instead of the entity
    pub include_ancestor: bool,
    /// Prepend the leading import block
    pub return_global_import: bool,
    /// Marker namespace, required for `drop_markers` on documents
    pub prefix: Option<String>,
    /// Functions whose bodies survive `drop_implementation`
    pub keep_implementation: Vec<String>,
}

impl UnparseOptions {
    #[must_use]
    pub const fn drop_markers(mut self, drop: bool) -> Self {
        self.drop_markers = drop;
        self
    }

    #[must_use]
    pub const fn drop_implementation(mut self, drop: bool) -> Self {
        self.drop_implementation = drop;
        self
    }

    #[must_use]
    pub const fn include_ancestor(mut self, include: bool) -> Self {
        self.include_ancestor = include;
        self
    }

    #[must_use]
    pub const fn with_imports(mut self, include: bool) -> Self {
        self.return_global_import = include;
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Keep the bodies of the functions named in `names` when dropping
    /// implementations; functions nested in them are still dropped
    #[must_use]
    pub fn keep_implementation<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keep_implementation = names.into_iter().map(Into::into).collect();
        self
    }
}

/// Options for replacing an entity with new code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Also replace name, parameters and return annotation (or bases)
    pub modify_signature: bool,
    /// Name of the declaration to take from the new code; defaults to the
    /// entity's own name
    pub name: Option<String>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            modify_signature: true,
            name: None,
        }
    }
}

impl UpdateOptions {
    #[must_use]
    pub const fn modify_signature(mut self, modify: bool) -> Self {
        self.modify_signature = modify;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Text span of a declaration: whole lines from the first decorator through
/// the body, plus trailing comments that belong to the body
pub(crate) fn statement_extent(decl: &Declaration, src: &str) -> Range<usize> {
    let start = line_start(src, decl.statement.start_byte());
    let end = trailing_comment_end(src, decl.statement.end_byte(), decl.column());
    start..end
}

/// Render `target` (or the whole document) with the composition
/// copy → drop markers → drop implementation → prepend imports
pub(crate) fn render(
    doc: &SourceDocument,
    target: Option<Declaration>,
    opts: &UnparseOptions,
) -> Result<String> {
    let src = doc.text();
    let (region, scope, column) = match target {
        Some(decl) => (statement_extent(&decl, src), decl.statement, decl.column()),
        None => (0..src.len(), doc.root(), 0),
    };

    let prefix = if opts.drop_markers {
        Some(opts.prefix.as_deref().filter(|p| !p.is_empty()).ok_or_else(|| {
            DirectiveError::usage(
                Violation::MissingPrefix,
                "drop_markers",
                "Must specify a directive prefix when dropping markers",
            )
        })?)
    } else {
        None
    };

    let mut edits = Vec::new();
    if let Some(prefix) = prefix {
        edits.extend(marker_edits(scope, src, prefix));
    }
    if opts.drop_implementation {
        edits.extend(implementation_edits(scope, src, &opts.keep_implementation));
    }
    let edits = edits
        .into_iter()
        .filter(|edit| edit.span.start >= region.start && edit.span.end <= region.end)
        .map(|edit| edit.shifted(region.start))
        .collect();
    let strings: Vec<_> = multiline_strings(scope)
        .into_iter()
        .filter(|span| span.start >= region.start && span.end <= region.end)
        .map(|span| span.start - region.start..span.end - region.start)
        .collect();

    let (code, strings) = apply_edits_carrying(&src[region], edits, &strings)?;
    let code = dedent(&code, 0, column, &strings);

    if opts.return_global_import {
        let filter = prefix.map_or_else(ImportFilter::all, ImportFilter::without_markers);
        let imports = doc.import_statement(&filter);
        if !imports.is_empty() {
            return Ok(format!("{imports}\n\n{code}"));
        }
    }

    Ok(code)
}

/// Edits removing every marker under `scope`: `@prefix.x(...)` decorators,
/// `prefix.run(...)` statements and imports of the prefix namespace
pub(crate) fn marker_edits(scope: Node, src: &str, prefix: &str) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    collect_marker_edits(scope, src, prefix, &mut edits);
    edits
}

fn collect_marker_edits(node: Node, src: &str, prefix: &str, edits: &mut Vec<TextEdit>) {
    match node.kind() {
        "decorator" => {
            if let Some(expr) = decorator_expression(node) {
                let is_marker = call_name(expr, src).is_some_and(|(p, _)| p == prefix);
                if is_marker {
                    let span = node.start_byte()..expr.end_byte();
                    edits.push(TextEdit::delete(line_removal_span(src, span)));
                }
            }
            return;
        }
        EXPRESSION_STATEMENT => {
            if let [call] = significant_children(node).as_slice() {
                let is_run = call_name(*call, src)
                    .is_some_and(|(p, name)| p == prefix && name == RUN_ALIAS);
                if is_run && is_module_statement(node) {
                    edits.push(TextEdit::delete(line_removal_span(src, node.byte_range())));
                    return;
                }
            }
        }
        "import_statement" | "import_from_statement" => {
            if crate::imports::is_marker_import(node, src, prefix) {
                edits.push(TextEdit::delete(line_removal_span(src, node.byte_range())));
            }
            return;
        }
        _ => {}
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    for child in children {
        collect_marker_edits(child, src, prefix, edits);
    }
}

/// Edits reducing every function body under `scope` to its docstring,
/// except for functions named in `keep`. Functions nested in a dropped body
/// disappear with it.
pub(crate) fn implementation_edits(scope: Node, src: &str, keep: &[String]) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    collect_implementation_edits(scope, src, keep, &mut edits);
    edits
}

fn collect_implementation_edits(node: Node, src: &str, keep: &[String], edits: &mut Vec<TextEdit>) {
    if let Some(decl) = Declaration::from_statement(node) {
        let kept = keep.iter().any(|name| name == decl.name(src));
        if decl.kind == DeclKind::Function && !kept {
            if let Some(edit) = body_to_docstring(&decl, src) {
                edits.push(edit);
            }
            return;
        }
        let mut cursor = decl.definition.walk();
        let children: Vec<_> = decl.definition.children(&mut cursor).collect();
        for child in children {
            collect_implementation_edits(child, src, keep, edits);
        }
        return;
    }

    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    for child in children {
        collect_implementation_edits(child, src, keep, edits);
    }
}

/// Everything after the docstring goes; the docstring itself is left in
/// place so its bytes stay untouched
fn body_to_docstring(decl: &Declaration, src: &str) -> Option<TextEdit> {
    let body = decl.body()?;
    let colon = header_colon_end(decl.definition, body)?;
    let end = trailing_comment_end(src, body.end_byte(), decl.definition.start_position().column);
    match docstring(body) {
        Some(doc) => Some(TextEdit::delete(doc.end_byte()..end)),
        None => Some(TextEdit::delete(colon..end)),
    }
}

/// Offset right after the `:` that ends a declaration header
pub(crate) fn header_colon_end(definition: Node, body: Node) -> Option<usize> {
    let mut cursor = definition.walk();
    let colon = definition
        .children(&mut cursor)
        .filter(|child| child.kind() == ":" && child.end_byte() <= body.start_byte())
        .last()
        .map(|child| child.end_byte());
    colon
}

/// Edits that make the live declaration look like `fragment`: body and
/// decorators always, header (name through `:`) when `modify_signature`
pub(crate) fn replacement_edits(
    live: &Declaration,
    live_src: &str,
    fragment: &Declaration,
    fragment_src: &str,
    modify_signature: bool,
) -> Result<Vec<TextEdit>> {
    let missing = |what: &str| DirectiveError::splice(format!("declaration without {what}"));
    let live_body = live.body().ok_or_else(|| missing("body"))?;
    let new_body = fragment.body().ok_or_else(|| missing("body"))?;
    let live_colon = header_colon_end(live.definition, live_body).ok_or_else(|| missing("':'"))?;
    let new_colon =
        header_colon_end(fragment.definition, new_body).ok_or_else(|| missing("':'"))?;

    let live_col = live.definition.start_position().column;
    let new_col = fragment.definition.start_position().column;
    let live_indent = line_indent(live_src, live.definition.start_byte());
    let strings = multiline_strings(fragment.statement);
    let mut edits = Vec::new();

    // decorators
    let live_def_line = line_start(live_src, live.definition.start_byte());
    let live_decorators = match live.decorators().first() {
        Some(first) => line_start(live_src, first.start_byte())..live_def_line,
        None => live_def_line..live_def_line,
    };
    let new_decorators = match fragment.decorators().first() {
        Some(first) => {
            let start = line_start(fragment_src, first.start_byte());
            let end = line_start(fragment_src, fragment.definition.start_byte());
            reindent_all(&fragment_src[start..end], start, new_col, live_indent, &strings)
        }
        None => String::new(),
    };
    edits.push(TextEdit::replace(live_decorators, new_decorators));

    // header
    if modify_signature {
        let live_name = live
            .definition
            .child_by_field_name("name")
            .ok_or_else(|| missing("name"))?;
        let new_name = fragment
            .definition
            .child_by_field_name("name")
            .ok_or_else(|| missing("name"))?;
        let header = &fragment_src[new_name.start_byte()..new_colon];
        edits.push(TextEdit::replace(
            live_name.start_byte()..live_colon,
            reindent(header, new_name.start_byte(), new_col, live_indent, &strings),
        ));
    }

    // body
    let live_body_inline = live_src[live_colon..live_body.start_byte()].find('\n').is_none();
    let body_indent = if live_body_inline {
        let step = if live_indent.contains('\t') { "\t" } else { "    " };
        format!("{live_indent}{step}")
    } else {
        line_indent(live_src, live_body.start_byte()).to_string()
    };
    let new_body_col = new_body.start_position().column;
    let new_body_end = trailing_comment_end(fragment_src, new_body.end_byte(), new_col);
    let body_text = reindent(
        &fragment_src[new_body.start_byte()..new_body_end],
        new_body.start_byte(),
        new_body_col,
        &body_indent,
        &strings,
    );
    let lead = &fragment_src[new_colon..new_body.start_byte()];
    let replacement = match lead.rfind('\n') {
        Some(newline) => format!(
            "{}{body_indent}{body_text}",
            reindent(&lead[..=newline], new_colon, new_body_col, &body_indent, &strings),
        ),
        None if live_body_inline => format!("{lead}{body_text}"),
        None => format!("\n{body_indent}{body_text}"),
    };
    let live_body_end = trailing_comment_end(live_src, live_body.end_byte(), live_col);
    edits.push(TextEdit::replace(live_colon..live_body_end, replacement));

    Ok(edits)
}
