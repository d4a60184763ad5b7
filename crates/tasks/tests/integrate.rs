use pretty_assertions::assert_eq;
use scribe_engine::{DependencyResolver, SourceDocument};
use scribe_tasks::{registry, task_groups, TaskKind};
use std::fs;
use std::path::Path;

const MAIN: &str = r#"import scribe
from .helpers import load


@scribe.hint([load])
@scribe.autocomplete("Parse the config", group="config")
def parse(text):
    """Parse text."""


@scribe.autocomplete(group="config", modify=True)
def render(config):
    """Render config."""
    return str(config)
"#;

const HELPERS: &str = "def load(path):\n    return open(path).read()\n";

const RESPONSE: &str = r#"import json
from .helpers import load


def parse(text):
    """Parse text."""
    return json.loads(text)


def render(config):
    """Render config."""
    return json.dumps(config)
"#;

fn project(dir: &Path) {
    fs::write(dir.join("main.py"), MAIN).unwrap();
    fs::write(dir.join("helpers.py"), HELPERS).unwrap();
}

#[test]
fn scan_group_and_prompt_sections() {
    let dir = tempfile::tempdir().unwrap();
    project(dir.path());

    let mut doc = SourceDocument::from_file(dir.path().join("main.py")).unwrap();
    let scan = registry().unwrap().parse(&mut doc, true).unwrap();
    let groups = task_groups(&scan, &doc, &DependencyResolver::default()).unwrap();

    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.name(), "config");
    assert_eq!(group.aggregate_dependencies().len(), 1);
    assert!(group.tasks().iter().all(|t| t.kind() == TaskKind::Function));

    let sections = group.prompt_sections(&scan, &doc).unwrap();
    assert_eq!(sections.len(), 2);
    assert_eq!(
        sections[0].requirement,
        "Implement parse function. Parse the config Ensure that your answer has type annotations. "
    );
    assert_eq!(sections[0].context, "def parse(text):\n    \"\"\"Parse text.\"\"\"");
    assert_eq!(sections[0].dependencies.len(), 1);
    assert_eq!(
        sections[0].dependencies[0].code,
        "def load(path):\n    return open(path).read()"
    );
    assert!(sections[1].requirement.starts_with(
        "Modify existing implementation in render function. Follow instruction from comments starting with 'm:'"
    ));
}

#[test]
fn integrate_response_and_save_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    project(dir.path());
    let origin = dir.path().join("main.py");

    let mut doc = SourceDocument::from_file(&origin).unwrap();
    let mut scan = registry().unwrap().parse(&mut doc, true).unwrap();
    let groups = task_groups(&scan, &doc, &DependencyResolver::default()).unwrap();
    groups[0].integrate(&mut scan, &mut doc, RESPONSE).unwrap();

    assert_eq!(
        doc.text(),
        r#"import json
from .helpers import load


def parse(text):
    """Parse text."""
    return json.loads(text)


def render(config):
    """Render config."""
    return json.dumps(config)
"#
    );

    let output = dir.path().join("out").join("main.py");
    doc.save(&output).unwrap();
    assert_eq!(fs::read_to_string(&origin).unwrap(), MAIN);
    assert_eq!(fs::read_to_string(&output).unwrap(), doc.text());
}
