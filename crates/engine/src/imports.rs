//! Leading import block: extraction, filtering and additive merging.

use crate::splice::TextEdit;
use crate::syntax::{docstring, line_end, line_start, node_text, significant_children};
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tree_sitter::Node;

/// Which leading imports to keep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportFilter {
    drop_prefix: Option<String>,
    relative_only: bool,
}

impl ImportFilter {
    /// Every leading import
    pub fn all() -> Self {
        Self::default()
    }

    /// Leading imports except those of the marker namespace
    pub fn without_markers(prefix: &str) -> Self {
        Self {
            drop_prefix: Some(prefix.to_string()),
            relative_only: false,
        }
    }

    /// Builder: keep only `from .x import y` style imports
    #[must_use]
    pub const fn relative_only(mut self, relative: bool) -> Self {
        self.relative_only = relative;
        self
    }

    fn accepts(&self, import: &ImportStatement) -> bool {
        if self.relative_only && !import.is_relative() {
            return false;
        }
        match &self.drop_prefix {
            Some(prefix) => !import.is_marker(prefix),
            None => true,
        }
    }
}

/// A name brought in by an import, with its optional `as` alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    /// Name under which the import is bound in the module
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    fn render(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} as {alias}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// `import a.b [as c], d`
    Import { names: Vec<ImportedName> },
    /// `from ..m import a [as b]`, `from m import *`
    From {
        module: String,
        level: usize,
        names: Vec<ImportedName>,
        wildcard: bool,
    },
}

/// One import statement of the leading block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub span: Range<usize>,
    pub text: String,
    pub kind: ImportKind,
    /// End offset of the last imported name, where extra names are appended
    names_end: Option<usize>,
}

impl ImportStatement {
    pub const fn is_relative(&self) -> bool {
        matches!(self.kind, ImportKind::From { level, .. } if level > 0)
    }

    /// `from __future__ import ...`, which must precede every other import
    pub fn is_future(&self) -> bool {
        matches!(&self.kind, ImportKind::From { module, level: 0, .. } if module == "__future__")
    }

    /// Whether the statement imports the marker namespace or a submodule of it
    pub fn is_marker(&self, prefix: &str) -> bool {
        let under = |module: &str| {
            module == prefix
                || module
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'))
        };
        match &self.kind {
            ImportKind::Import { names } => names.first().is_some_and(|n| under(&n.name)),
            ImportKind::From { module, level, .. } => *level == 0 && under(module),
        }
    }

    pub(crate) fn from_node(node: Node, src: &str) -> Option<Self> {
        let names_of = |node: Node| -> Vec<ImportedName> {
            let mut cursor = node.walk();
            let names = node
                .children_by_field_name("name", &mut cursor)
                .filter_map(|name| imported_name(name, src))
                .collect();
            names
        };
        let names_end = |node: Node| -> Option<usize> {
            let mut cursor = node.walk();
            let end = node
                .children_by_field_name("name", &mut cursor)
                .map(|name| name.end_byte())
                .last();
            end
        };

        let kind = match node.kind() {
            "import_statement" => ImportKind::Import {
                names: names_of(node),
            },
            "future_import_statement" => ImportKind::From {
                module: "__future__".to_string(),
                level: 0,
                names: names_of(node),
                wildcard: false,
            },
            "import_from_statement" => {
                let module_node = node.child_by_field_name("module_name")?;
                let (module, level) = if module_node.kind() == "relative_import" {
                    let mut level = 0;
                    let mut module = String::new();
                    for part in significant_children(module_node) {
                        match part.kind() {
                            "import_prefix" => level = node_text(part, src).trim().len(),
                            _ => module = node_text(part, src).to_string(),
                        }
                    }
                    (module, level)
                } else {
                    (node_text(module_node, src).to_string(), 0)
                };
                let wildcard = significant_children(node)
                    .iter()
                    .any(|child| child.kind() == "wildcard_import");
                ImportKind::From {
                    module,
                    level,
                    names: names_of(node),
                    wildcard,
                }
            }
            _ => return None,
        };

        Some(Self {
            span: node.byte_range(),
            text: node_text(node, src).to_string(),
            kind,
            names_end: names_end(node),
        })
    }

    fn same_target(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (ImportKind::Import { names }, ImportKind::Import { names: incoming }) => incoming
                .first()
                .is_some_and(|first| names.iter().any(|n| n.name == first.name)),
            (
                ImportKind::From { module, level, .. },
                ImportKind::From {
                    module: other_module,
                    level: other_level,
                    ..
                },
            ) => module == other_module && level == other_level,
            _ => false,
        }
    }
}

fn imported_name(node: Node, src: &str) -> Option<ImportedName> {
    match node.kind() {
        "dotted_name" | "identifier" => Some(ImportedName {
            name: node_text(node, src).to_string(),
            alias: None,
        }),
        "aliased_import" => Some(ImportedName {
            name: node_text(node.child_by_field_name("name")?, src).to_string(),
            alias: node
                .child_by_field_name("alias")
                .map(|alias| node_text(alias, src).to_string()),
        }),
        _ => None,
    }
}

/// Whether `node` is an import statement of the marker namespace
pub(crate) fn is_marker_import(node: Node, src: &str, prefix: &str) -> bool {
    ImportStatement::from_node(node, src).is_some_and(|import| import.is_marker(prefix))
}

/// The leading run of import statements. Comments and a module docstring
/// in front are skipped; the first other statement ends the block.
pub(crate) fn leading_imports(root: Node, src: &str) -> Vec<ImportStatement> {
    let doc_id = docstring(root).map(|doc| doc.id());
    let mut imports = Vec::new();
    for child in significant_children(root) {
        if Some(child.id()) == doc_id {
            continue;
        }
        match ImportStatement::from_node(child, src) {
            Some(import) => imports.push(import),
            None => break,
        }
    }
    imports
}

pub(crate) fn filtered(imports: Vec<ImportStatement>, filter: &ImportFilter) -> Vec<ImportStatement> {
    imports.into_iter().filter(|i| filter.accepts(i)).collect()
}

/// Offset where new imports go: after the `from __future__` imports that
/// open the block, else before the first leading import, otherwise before
/// the first statement after the module docstring
fn insertion_point(root: Node, src: &str, existing: &[ImportStatement]) -> usize {
    if let Some(last_future) = existing.iter().take_while(|i| i.is_future()).last() {
        return line_end(src, last_future.span.end);
    }
    if let Some(first) = existing.first() {
        return line_start(src, first.span.start);
    }
    let doc_id = docstring(root).map(|doc| doc.id());
    significant_children(root)
        .into_iter()
        .find(|child| Some(child.id()) != doc_id)
        .map_or_else(
            || match docstring(root) {
                Some(doc) => line_end(src, doc.end_byte()),
                None => src.len(),
            },
            |stmt| line_start(src, stmt.start_byte()),
        )
}

/// Edits adding the imports of `incoming_src` missing from `src`.
///
/// Existing statements are never removed or rewritten; with `merge`, names
/// missing from a matching `from m import ...` are appended to it.
pub(crate) fn import_edits(
    root: Node,
    src: &str,
    incoming_root: Node,
    incoming_src: &str,
    merge: bool,
) -> Vec<TextEdit> {
    let existing = leading_imports(root, src);
    let incoming = leading_imports(incoming_root, incoming_src);
    let at = insertion_point(root, src, &existing);

    // (statement, present in the live text)
    let mut known: Vec<(ImportStatement, bool)> =
        existing.iter().cloned().map(|import| (import, true)).collect();
    let mut inserted = Vec::new();
    let mut edits = Vec::new();
    for import in incoming {
        match known.iter_mut().find(|(k, _)| k.same_target(&import)) {
            None => {
                inserted.push(import.text.clone());
                known.push((import, false));
            }
            Some((target, live)) if merge => {
                if let Some(edit) = append_names(target, &import, *live) {
                    edits.push(edit);
                }
            }
            Some(_) => {}
        }
    }

    if !inserted.is_empty() {
        let mut block = inserted.join("\n");
        block.push('\n');
        if existing.is_empty() && at < src.len() {
            block.push('\n');
        }
        if at > 0 && !src[..at].ends_with('\n') {
            block.insert(0, '\n');
        }
        edits.insert(0, TextEdit::insert(at, block));
    }
    edits
}

/// Edit appending names of `incoming` that `target` does not import yet;
/// `target` is updated so later statements see the merged names
fn append_names(
    target: &mut ImportStatement,
    incoming: &ImportStatement,
    live: bool,
) -> Option<TextEdit> {
    let ImportKind::From {
        names, wildcard, ..
    } = &mut target.kind
    else {
        return None;
    };
    let ImportKind::From {
        names: new_names,
        wildcard: new_wildcard,
        ..
    } = &incoming.kind
    else {
        return None;
    };
    if *wildcard || *new_wildcard {
        return None;
    }

    let missing: Vec<ImportedName> = new_names
        .iter()
        .filter(|n| !names.iter().any(|existing| existing.name == n.name))
        .cloned()
        .collect();
    if missing.is_empty() {
        return None;
    }
    names.extend(missing.iter().cloned());

    if !live {
        return None;
    }
    let at = target.names_end?;
    let appended: String = missing
        .iter()
        .map(|name| format!(", {}", name.render()))
        .collect();
    Some(TextEdit::insert(at, appended))
}

/// Where a relatively imported name comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportTarget {
    /// Absolute path of the imported module file
    pub path: PathBuf,
    /// Name inside that module; `None` when the module itself is imported
    pub entity_name: Option<String>,
}

/// Bound name → origin, for relative `from` imports
pub type EntityMap = HashMap<String, ImportTarget>;

/// Map relative imports of a module located in `base_dir`
pub(crate) fn entity_map(imports: &[ImportStatement], base_dir: &Path) -> EntityMap {
    let mut map = EntityMap::new();
    for import in imports {
        let ImportKind::From {
            module,
            level,
            names,
            ..
        } = &import.kind
        else {
            continue;
        };
        if *level == 0 {
            continue;
        }

        let mut package = base_dir.to_path_buf();
        for _ in 1..*level {
            package.push("..");
        }
        let package = crate::resolver::normalize_path(&package);

        for name in names {
            let target = if module.is_empty() {
                ImportTarget {
                    path: module_file(&package, &name.name),
                    entity_name: None,
                }
            } else {
                ImportTarget {
                    path: module_file(&package, module),
                    entity_name: Some(name.name.clone()),
                }
            };
            map.insert(name.bound_name().to_string(), target);
        }
    }
    map
}

fn module_file(package: &Path, dotted: &str) -> PathBuf {
    let mut path = package.to_path_buf();
    for segment in dotted.split('.') {
        path.push(segment);
    }
    path.set_extension("py");
    path
}
