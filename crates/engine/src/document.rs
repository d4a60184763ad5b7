use crate::error::{DirectiveError, Result};
use crate::imports::{self, EntityMap, ImportFilter, ImportStatement};
use crate::resolver::normalize_path;
use crate::splice::{self, TextEdit, UnparseOptions};
use crate::syntax::{find_declaration, outermost_declaration, parse_python, DeclKind, Declaration};
use once_cell::unsync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Tree};

/// A parsed Python source file.
///
/// The document is the single owner of its text and syntax tree. Entities
/// produced by a scan refer into it by path and are resolved against the
/// current tree on every use.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    text: String,
    tree: Tree,
    path: Option<PathBuf>,
    entity_map: OnceCell<EntityMap>,
}

impl SourceDocument {
    /// Parse source text; `path` is the identity used to resolve relative
    /// references and is never written to implicitly
    pub fn parse(text: impl Into<String>, path: Option<PathBuf>) -> Result<Self> {
        let text = text.into();
        let tree = parse_python(&text)?;
        Ok(Self {
            text,
            tree,
            path: path.map(|p| absolute(&p)),
            entity_map: OnceCell::new(),
        })
    }

    /// Read and parse a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        log::debug!("Loaded {} ({} bytes)", path.display(), text.len());
        Self::parse(text, Some(path.to_path_buf()))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Serialize the document back to source text
    pub fn unparse(&self) -> String {
        self.text.clone()
    }

    /// Absolute path of the file the document was loaded from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// File name used as the module entity's name
    pub fn file_name(&self) -> Option<&str> {
        self.path.as_deref()?.file_name()?.to_str()
    }

    /// Write the text to `path`, creating parent directories.
    /// Only the given path is written, whatever the document's origin.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &self.text)?;
        log::info!("Saved {}", path.display());
        Ok(())
    }

    pub(crate) fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Replace the whole text. The document is unchanged when `text` does
    /// not parse.
    pub(crate) fn set_text(&mut self, text: String) -> Result<()> {
        let tree = parse_python(&text)?;
        self.text = text;
        self.tree = tree;
        self.invalidate_entity_map();
        Ok(())
    }

    pub(crate) fn apply_edits(&mut self, edits: Vec<TextEdit>) -> Result<()> {
        if edits.is_empty() {
            return Ok(());
        }
        let text = splice::apply_edits(&self.text, edits)?;
        self.set_text(text)
    }

    /// Relative-import map of the leading import block, built on first use
    pub fn entity_map(&self) -> &EntityMap {
        self.entity_map.get_or_init(|| {
            let Some(dir) = self.path.as_deref().and_then(Path::parent) else {
                log::debug!("Document has no path; relative imports are not mapped");
                return EntityMap::new();
            };
            let imports = self.import_block(&ImportFilter::all().relative_only(true));
            imports::entity_map(&imports, dir)
        })
    }

    pub fn invalidate_entity_map(&mut self) {
        self.entity_map.take();
    }

    /// Leading import statements accepted by `filter`
    pub fn import_block(&self, filter: &ImportFilter) -> Vec<ImportStatement> {
        imports::filtered(imports::leading_imports(self.root(), &self.text), filter)
    }

    /// Leading import statements accepted by `filter`, one per line
    pub fn import_statement(&self, filter: &ImportFilter) -> String {
        self.import_block(filter)
            .into_iter()
            .map(|import| import.text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub(crate) fn locate(&self, kind: Option<DeclKind>, name: &str) -> Option<Declaration<'_>> {
        find_declaration(self.root(), &self.text, kind, name)
    }

    /// Render the first function named `name`
    pub fn get_function(&self, name: &str, opts: &UnparseOptions) -> Result<String> {
        self.render_named(Some(DeclKind::Function), "Function", name, opts)
    }

    /// Render the first class named `name`
    pub fn get_class(&self, name: &str, opts: &UnparseOptions) -> Result<String> {
        self.render_named(Some(DeclKind::Class), "Class", name, opts)
    }

    /// Render the first class or function named `name`
    pub fn get_entity(&self, name: &str, opts: &UnparseOptions) -> Result<String> {
        self.render_named(None, "Entity", name, opts)
    }

    fn render_named(
        &self,
        kind: Option<DeclKind>,
        label: &str,
        name: &str,
        opts: &UnparseOptions,
    ) -> Result<String> {
        let decl = self
            .locate(kind, name)
            .ok_or_else(|| DirectiveError::not_found(label, name))?;
        let target = if opts.include_ancestor {
            outermost_declaration(decl)
        } else {
            decl
        };
        splice::render(self, Some(target), opts)
    }

    /// Render the whole document
    pub fn render(&self, opts: &UnparseOptions) -> Result<String> {
        splice::render(self, None, opts)
    }

    /// Insert the leading imports of `new_source` that this document lacks
    pub fn update_import_statement(&mut self, new_source: &str) -> Result<()> {
        self.add_imports(new_source, false)
    }

    /// Like [`Self::update_import_statement`], and also append missing names
    /// to existing `from m import ...` statements
    pub fn merge_import_statement(&mut self, new_source: &str) -> Result<()> {
        self.add_imports(new_source, true)
    }

    fn add_imports(&mut self, new_source: &str, merge: bool) -> Result<()> {
        let incoming = parse_python(new_source)?;
        let edits = imports::import_edits(
            self.root(),
            &self.text,
            incoming.root_node(),
            new_source,
            merge,
        );
        log::debug!("Import merge produced {} edit(s)", edits.len());
        self.apply_edits(edits)
    }

    /// Remove every marker of the `prefix` namespace from the live text
    pub fn strip_markers(&mut self, prefix: &str) -> Result<()> {
        let edits = splice::marker_edits(self.root(), &self.text, prefix);
        log::debug!("Stripping {} marker(s)", edits.len());
        self.apply_edits(edits)
    }
}

fn absolute(path: &Path) -> PathBuf {
    let joined = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_path(&joined)
}
