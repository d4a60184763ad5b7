use crate::directives::{Autocomplete, Hint, AUTOCOMPLETE, HINT};
use crate::error::{Result, TaskError};
use scribe_engine::{
    CodeDependency, DependencyResolver, DirectiveError, EntityId, EntityKind,
    ResolutionDiagnostic, Scan, SourceDocument, UnparseOptions, UpdateOptions,
};
use serde::Serialize;
use std::fmt;

/// What a task asks to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    File,
    Class,
    Function,
}

impl TaskKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Class => "class",
            Self::Function => "function",
        }
    }
}

impl From<EntityKind> for TaskKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Module => Self::File,
            EntityKind::Class => Self::Class,
            EntityKind::Function => Self::Function,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One annotated entity turned into a unit of work
#[derive(Debug, Clone)]
pub struct Task {
    entity: EntityId,
    kind: TaskKind,
    name: String,
    autocomplete: Autocomplete,
    dependencies: Vec<CodeDependency>,
    diagnostics: Vec<ResolutionDiagnostic>,
}

impl Task {
    /// Build the task for entity `id`, resolving its hints
    pub fn from_entity(
        scan: &Scan,
        doc: &SourceDocument,
        id: EntityId,
        resolver: &DependencyResolver,
    ) -> Result<Self> {
        let entity = scan
            .get(id)
            .ok_or_else(|| DirectiveError::not_found("Entity", &format!("#{id}")))?;
        let autocomplete = entity
            .directives
            .first(AUTOCOMPLETE)
            .map(Autocomplete::from_directive)
            .ok_or_else(|| TaskError::MissingAutocomplete(entity.name.clone()))?;

        let mut references = Vec::new();
        for hint in entity.directives.get(HINT).unwrap_or_default() {
            references.extend(Hint::from_directive(hint)?.references);
        }
        let resolution = resolver.resolve(doc, scan.prefix(), &references);
        log::debug!(
            "Task '{}': {} dependencies, {} unresolved",
            entity.name,
            resolution.dependencies.len(),
            resolution.diagnostics.len()
        );

        Ok(Self {
            entity: id,
            kind: entity.kind.into(),
            name: entity.name.clone(),
            autocomplete,
            dependencies: resolution.dependencies,
            diagnostics: resolution.diagnostics,
        })
    }

    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    pub const fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn autocomplete(&self) -> &Autocomplete {
        &self.autocomplete
    }

    pub fn dependencies(&self) -> &[CodeDependency] {
        &self.dependencies
    }

    /// Hint references that could not be resolved
    pub fn diagnostics(&self) -> &[ResolutionDiagnostic] {
        &self.diagnostics
    }

    /// Natural-language description of what the task asks for
    pub fn requirement(&self, doc: &SourceDocument) -> String {
        let auto = &self.autocomplete;
        let file = doc.file_name().unwrap_or("<module>");
        let name = &self.name;

        let mut text = match (auto.modify, self.kind) {
            (true, TaskKind::File) => format!("Modify the program called {file}. "),
            (true, kind) => format!("Modify existing implementation in {name} {kind}. "),
            (false, TaskKind::File) => format!("Rewrite the {file} script. "),
            (false, kind) => format!("Implement {name} {kind}. "),
        };

        if auto.requirement.is_empty() {
            if auto.modify {
                text.push_str(
                    "Follow instruction from comments starting with 'm:' on how to modify the implementation. ",
                );
            } else {
                text.push_str(&format!(
                    "Follow instruction from docstrings and comments on how to implement the {}. ",
                    self.kind
                ));
            }
        }
        text.push_str(&auto.requirement);
        if !text.ends_with(char::is_whitespace) {
            text.push(' ');
        }

        if auto.pseudo_code {
            text.push_str(
                "You may implement the solution based on the pseudo-code specified in the docstrings or comments. ",
            );
        }
        if auto.rewrite_docs {
            text.push_str(
                "You are required to rewrite the docstrings to follow the Python pandas library docstrings style. ",
            );
        }
        if auto.annotations {
            text.push_str("Ensure that your answer has type annotations. ");
        }
        text
    }

    /// Whether the entity sits inside a class or function
    pub fn is_nested(&self, scan: &Scan) -> bool {
        scan.parent(self.entity).is_some()
    }

    /// Source the task is about: the outermost enclosing declaration for
    /// nested entities, the entity itself otherwise
    pub fn context(&self, scan: &Scan, doc: &SourceDocument) -> Result<String> {
        let opts = UnparseOptions::default()
            .drop_markers(true)
            .include_ancestor(self.is_nested(scan));
        Ok(scan.unparse(doc, self.entity, &opts)?)
    }

    /// Splice the matching declaration of `response` into the document
    pub fn integrate(
        &self,
        scan: &mut Scan,
        doc: &mut SourceDocument,
        response: &str,
        opts: &UpdateOptions,
    ) -> Result<()> {
        scan.update(doc, self.entity, response, opts)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::registry;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const CODE: &str = r#"import scribe

scribe.run(scribe.autocomplete(modify=True, annotations=False))


@scribe.autocomplete(pseudo_code=True, rewrite_docs=True)
def build(x):
    """Build it."""


class Box:
    @scribe.autocomplete("Return the size.", modify=True, annotations=False)
    def size(self):
        return 0
"#;

    fn tasks() -> (Scan, SourceDocument, Vec<Task>) {
        let mut doc = SourceDocument::parse(CODE, Some(PathBuf::from("/work/shapes.py"))).unwrap();
        let scan = registry().unwrap().parse(&mut doc, false).unwrap();
        let resolver = DependencyResolver::default();
        let tasks = scan
            .entities()
            .map(|e| Task::from_entity(&scan, &doc, e.id, &resolver).unwrap())
            .collect();
        (scan, doc, tasks)
    }

    #[test]
    fn kinds_follow_entities() {
        let (_, _, tasks) = tasks();
        let kinds: Vec<_> = tasks.iter().map(Task::kind).collect();
        assert_eq!(kinds, vec![TaskKind::File, TaskKind::Function, TaskKind::Function]);
    }

    #[test]
    fn requirement_text() {
        let (_, doc, tasks) = tasks();
        assert_eq!(
            tasks[0].requirement(&doc),
            "Modify the program called shapes.py. Follow instruction from comments starting with 'm:' on how to modify the implementation. "
        );
        assert_eq!(
            tasks[1].requirement(&doc),
            "Implement build function. Follow instruction from docstrings and comments on how to implement the function. \
You may implement the solution based on the pseudo-code specified in the docstrings or comments. \
You are required to rewrite the docstrings to follow the Python pandas library docstrings style. \
Ensure that your answer has type annotations. "
        );
        assert_eq!(
            tasks[2].requirement(&doc),
            "Modify existing implementation in size function. Return the size. "
        );
    }

    #[test]
    fn nested_context_renders_the_enclosing_class() {
        let (scan, doc, tasks) = tasks();
        assert!(!tasks[1].is_nested(&scan));
        assert_eq!(tasks[1].context(&scan, &doc).unwrap(), "def build(x):\n    \"\"\"Build it.\"\"\"");

        assert!(tasks[2].is_nested(&scan));
        assert_eq!(
            tasks[2].context(&scan, &doc).unwrap(),
            "class Box:\n    def size(self):\n        return 0"
        );
    }
}
