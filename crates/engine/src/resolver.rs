use crate::config::ResolverConfig;
use crate::directive::Directive;
use crate::document::SourceDocument;
use crate::error::{DirectiveError, Result};
use crate::splice::UnparseOptions;
use crate::value::{Identifier, Value};
use once_cell::unsync::OnceCell;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: `.` is dropped and `..` pops a component.
/// Symlinks are not followed and the file need not exist.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// One entry of a hint's entity list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum HintReference {
    /// Bare name resolved through the document's relative imports
    Symbol(Identifier),
    /// `"path:entity"` string, path relative to the document's directory
    Qualified(String),
}

impl HintReference {
    /// Flatten the references held by `field` of every directive in `hints`
    pub fn collect(hints: &[Directive], field: &str) -> Result<Vec<Self>> {
        let mut references = Vec::new();
        for hint in hints {
            let Some(value) = hint.value(field) else {
                continue;
            };
            match value.as_list() {
                Some(items) => {
                    for item in items {
                        references.push(Self::from_value(hint.name(), item)?);
                    }
                }
                None => references.push(Self::from_value(hint.name(), value)?),
            }
        }
        Ok(references)
    }

    fn from_value(directive: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Identifier(identifier) => Ok(Self::Symbol(identifier.clone())),
            Value::Str(text) => Ok(Self::Qualified(text.clone())),
            other => Err(DirectiveError::schema(
                directive,
                format!(
                    "hint reference must be a name or a string, got {} `{other}`",
                    other.type_name()
                ),
            )),
        }
    }
}

impl fmt::Display for HintReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symbol(identifier) => write!(f, "{identifier}"),
            Self::Qualified(text) => write!(f, "\"{text}\""),
        }
    }
}

/// A reference that could not be turned into a dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionDiagnostic {
    pub reference: String,
    pub message: String,
}

/// Source code some task depends on: a whole file or one entity in it
#[derive(Debug, Clone)]
pub struct CodeDependency {
    path: PathBuf,
    entity_name: Option<String>,
    prefix: String,
    document: OnceCell<SourceDocument>,
}

impl CodeDependency {
    pub fn new(path: impl Into<PathBuf>, entity_name: Option<String>, prefix: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entity_name,
            prefix: prefix.into(),
            document: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entity_name(&self) -> Option<&str> {
        self.entity_name.as_deref()
    }

    /// The dependency's document, loaded on first use
    pub fn document(&self) -> Result<&SourceDocument> {
        self.document
            .get_or_try_init(|| SourceDocument::from_file(&self.path))
    }

    /// Source text of the dependency: the named entity without markers and
    /// with the file's imports, or the whole file
    pub fn resolve(&self) -> Result<String> {
        let document = self.document()?;
        match &self.entity_name {
            Some(name) => document.get_entity(
                name,
                &UnparseOptions::default()
                    .drop_markers(true)
                    .with_imports(true)
                    .prefix(self.prefix.as_str()),
            ),
            None => Ok(document.unparse()),
        }
    }
}

impl PartialEq for CodeDependency {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.entity_name == other.entity_name
    }
}

impl Eq for CodeDependency {}

impl Hash for CodeDependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.entity_name.hash(state);
    }
}

impl Serialize for CodeDependency {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("CodeDependency", 2)?;
        state.serialize_field("path", &self.path)?;
        state.serialize_field("entity_name", &self.entity_name)?;
        state.end()
    }
}

/// Dependencies and diagnostics for one set of hint references
#[derive(Debug, Clone, Default)]
pub struct HintResolution {
    pub dependencies: Vec<CodeDependency>,
    pub diagnostics: Vec<ResolutionDiagnostic>,
}

/// Turns hint references into code dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    config: ResolverConfig,
}

impl DependencyResolver {
    pub const fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Resolve `references` relative to `doc`, in order.
    ///
    /// Unresolvable references never fail the call: they are skipped and
    /// reported as diagnostics.
    pub fn resolve(
        &self,
        doc: &SourceDocument,
        prefix: &str,
        references: &[HintReference],
    ) -> HintResolution {
        let mut resolution = HintResolution::default();
        for reference in references {
            match self.resolve_one(doc, reference) {
                Ok((path, entity_name)) => {
                    log::debug!("Resolved {reference} to {}", path.display());
                    resolution
                        .dependencies
                        .push(CodeDependency::new(path, entity_name, prefix));
                }
                Err(message) => {
                    log::warn!("Cannot resolve hint {reference}: {message}");
                    resolution.diagnostics.push(ResolutionDiagnostic {
                        reference: reference.to_string(),
                        message,
                    });
                }
            }
        }
        resolution
    }

    fn resolve_one(
        &self,
        doc: &SourceDocument,
        reference: &HintReference,
    ) -> std::result::Result<(PathBuf, Option<String>), String> {
        match reference {
            HintReference::Symbol(identifier) => self.resolve_symbol(doc, &identifier.name),
            HintReference::Qualified(text) => resolve_qualified(doc, text),
        }
    }

    fn resolve_symbol(
        &self,
        doc: &SourceDocument,
        name: &str,
    ) -> std::result::Result<(PathBuf, Option<String>), String> {
        if let Some(target) = doc.entity_map().get(name) {
            return existing(&target.path).map(|path| (path, target.entity_name.clone()));
        }
        if !self.config.self_reference_fallback {
            return Err(format!("'{name}' is not imported relatively"));
        }
        let path = doc
            .path()
            .ok_or_else(|| format!("'{name}' is not imported and the document has no path"))?;
        existing(path).map(|path| (path, Some(name.to_string())))
    }
}

fn resolve_qualified(
    doc: &SourceDocument,
    text: &str,
) -> std::result::Result<(PathBuf, Option<String>), String> {
    let (path, entity) = match text.rsplit_once(':') {
        Some((path, entity)) => (path, Some(entity.trim()).filter(|e| !e.is_empty())),
        None => (text, None),
    };
    let base = doc
        .path()
        .and_then(Path::parent)
        .ok_or_else(|| "the document has no path to resolve against".to_string())?;
    existing(&normalize_path(&base.join(path.trim())))
        .map(|path| (path, entity.map(str::to_string)))
}

fn existing(path: &Path) -> std::result::Result<PathBuf, String> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(format!("file {} does not exist", path.display()))
    }
}

/// Deduplicate by `(path, entity_name)`, first occurrence wins
pub fn union_dependencies(dependencies: impl IntoIterator<Item = CodeDependency>) -> Vec<CodeDependency> {
    let mut unique: Vec<CodeDependency> = Vec::new();
    for dependency in dependencies {
        if !unique.contains(&dependency) {
            unique.push(dependency);
        }
    }
    unique
}
