use crate::directives::{Autocomplete, AUTOCOMPLETE};
use crate::error::{Result, TaskError};
use crate::task::{Task, TaskKind};
use once_cell::unsync::OnceCell;
use scribe_engine::{
    union_dependencies, CodeDependency, DependencyResolver, Entity, EntityGroup, EntityGrouper,
    Scan, SourceDocument, UpdateOptions,
};
use serde::Serialize;
use std::path::PathBuf;

/// Group key of an entity: its `autocomplete(group=...)`, or a key no other
/// entity shares
pub fn group_key(entity: &Entity) -> String {
    entity
        .directives
        .first(AUTOCOMPLETE)
        .map(Autocomplete::from_directive)
        .and_then(|auto| auto.group)
        .unwrap_or_else(|| format!("{}#{}", entity.name, entity.id))
}

/// Resolved source of one dependency, ready to show next to a task
#[derive(Debug, Clone, Serialize)]
pub struct DependencySnippet {
    pub path: PathBuf,
    pub entity_name: Option<String>,
    pub code: String,
}

/// Everything the prompt layer needs for one task
#[derive(Debug, Clone, Serialize)]
pub struct PromptSection {
    pub title: String,
    pub kind: TaskKind,
    pub name: String,
    pub requirement: String,
    pub context: String,
    pub dependencies: Vec<DependencySnippet>,
}

/// Tasks that are written and integrated together
#[derive(Debug, Clone)]
pub struct TaskGroup {
    name: String,
    tasks: Vec<Task>,
    aggregate: OnceCell<Vec<CodeDependency>>,
}

impl TaskGroup {
    pub fn from_entity_group(
        scan: &Scan,
        doc: &SourceDocument,
        group: &EntityGroup<'_>,
        resolver: &DependencyResolver,
    ) -> Result<Self> {
        let tasks = group
            .entities
            .iter()
            .map(|entity| Task::from_entity(scan, doc, entity.id, resolver))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: group.name.clone(),
            tasks,
            aggregate: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Dependencies of all tasks, deduplicated in first-seen order
    pub fn aggregate_dependencies(&self) -> &[CodeDependency] {
        self.aggregate.get_or_init(|| {
            union_dependencies(
                self.tasks
                    .iter()
                    .flat_map(|task| task.dependencies().iter().cloned()),
            )
        })
    }

    /// Requirement, context and dependency sources per task, in task order.
    ///
    /// A dependency whose source cannot be rendered is left out with a
    /// warning.
    pub fn prompt_sections(&self, scan: &Scan, doc: &SourceDocument) -> Result<Vec<PromptSection>> {
        let mut sections = Vec::with_capacity(self.tasks.len());
        for (idx, task) in self.tasks.iter().enumerate() {
            let dependencies = task
                .dependencies()
                .iter()
                .filter_map(|dependency| match dependency.resolve() {
                    Ok(code) => Some(DependencySnippet {
                        path: dependency.path().to_path_buf(),
                        entity_name: dependency.entity_name().map(str::to_string),
                        code,
                    }),
                    Err(err) => {
                        log::warn!(
                            "Skipping dependency {}: {err}",
                            dependency.path().display()
                        );
                        None
                    }
                })
                .collect();

            sections.push(PromptSection {
                title: format!("Task {}", idx + 1),
                kind: task.kind(),
                name: task.name().to_string(),
                requirement: task.requirement(doc),
                context: task.context(scan, doc)?,
                dependencies,
            });
        }
        Ok(sections)
    }

    /// Apply `response` to every task of the group, then merge the
    /// response's imports into the document once
    pub fn integrate(&self, scan: &mut Scan, doc: &mut SourceDocument, response: &str) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(TaskError::EmptyGroup(self.name.clone()));
        }
        let opts = UpdateOptions::default();
        for task in &self.tasks {
            task.integrate(scan, doc, response, &opts)?;
        }
        doc.update_import_statement(response)?;
        log::info!("Integrated {} task(s) of group '{}'", self.tasks.len(), self.name);
        Ok(())
    }
}

/// Group the annotated entities of `scan` and build their tasks
pub fn task_groups(
    scan: &Scan,
    doc: &SourceDocument,
    resolver: &DependencyResolver,
) -> Result<Vec<TaskGroup>> {
    let grouper = EntityGrouper::new(group_key);
    grouper
        .group(scan.entities())
        .iter()
        .map(|group| TaskGroup::from_entity_group(scan, doc, group, resolver))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::registry;
    use pretty_assertions::assert_eq;

    const CODE: &str = r#"import scribe


@scribe.autocomplete(group="pair")
def left():
    pass


@scribe.autocomplete()
def alone():
    pass


@scribe.autocomplete(group="pair")
def right():
    pass
"#;

    #[test]
    fn groups_by_autocomplete_group() {
        let mut doc = SourceDocument::parse(CODE, None).unwrap();
        let scan = registry().unwrap().parse(&mut doc, false).unwrap();
        let groups = task_groups(&scan, &doc, &DependencyResolver::default()).unwrap();

        let shape: Vec<_> = groups
            .iter()
            .map(|g| {
                (
                    g.name().to_string(),
                    g.tasks().iter().map(|t| t.name().to_string()).collect::<Vec<_>>(),
                )
            })
            .collect();
        assert_eq!(
            shape,
            vec![
                ("pair".to_string(), vec!["left".to_string(), "right".to_string()]),
                ("alone#1".to_string(), vec!["alone".to_string()]),
            ]
        );
    }

    #[test]
    fn prompt_sections_are_numbered() {
        let mut doc = SourceDocument::parse(CODE, None).unwrap();
        let scan = registry().unwrap().parse(&mut doc, false).unwrap();
        let groups = task_groups(&scan, &doc, &DependencyResolver::default()).unwrap();

        let sections = groups[0].prompt_sections(&scan, &doc).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].title, "Task 2");
        assert_eq!(sections[1].context, "def right():\n    pass");
        assert!(sections[1].dependencies.is_empty());
    }
}
