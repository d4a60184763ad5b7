mod common;

use common::{fixture, load, registry};
use pretty_assertions::assert_eq;
use scribe_engine::{
    union_dependencies, DependencyResolver, EngineConfig, HintReference, ResolverConfig,
    SourceDocument,
};

fn hint_references(doc: &mut SourceDocument, entity: &str) -> Vec<HintReference> {
    let scan = registry().parse(doc, false).unwrap();
    let entity = scan.entities().find(|e| e.name == entity).unwrap();
    let hints = entity.directives.get("hint").unwrap();
    HintReference::collect(hints, "entity_list").unwrap()
}

#[test]
fn bare_names_resolve_through_relative_imports() {
    let mut doc = load("hints/relative.py");
    let references = hint_references(&mut doc, "cached_load");
    assert_eq!(references.len(), 2);

    let resolution = DependencyResolver::default().resolve(&doc, "pop", &references);
    assert!(resolution.diagnostics.is_empty());
    let deps = &resolution.dependencies;
    assert_eq!(deps.len(), 2);
    assert!(deps.iter().all(|d| d.path().ends_with("hints/helpers.py")));
    assert_eq!(
        deps.iter().map(|d| d.entity_name()).collect::<Vec<_>>(),
        vec![Some("load"), Some("Store")]
    );

    assert!(deps[0].resolve().unwrap().starts_with("def load(path: str) -> str:"));
    let store = deps[1].resolve().unwrap();
    assert!(store.starts_with("class Store:"));
    assert!(!store.contains("@pop"));
}

#[test]
fn qualified_string_resolves_relative_to_the_document() {
    let mut doc = load("hints/pkg/qualified.py");
    let references = hint_references(&mut doc, "wrapper");
    assert_eq!(
        references,
        vec![HintReference::Qualified("../other.py:target".to_string())]
    );

    let resolution = DependencyResolver::default().resolve(&doc, "pop", &references);
    assert_eq!(resolution.dependencies.len(), 1);
    let dependency = &resolution.dependencies[0];
    assert_eq!(dependency.path(), fixture("hints/other.py"));
    assert_eq!(
        dependency.resolve().unwrap(),
        "def target(value):\n    \"\"\"Return the value.\"\"\"\n    return value"
    );
}

#[test]
fn missing_files_become_diagnostics() {
    let doc = load("hints/pkg/qualified.py");
    let references = vec![
        HintReference::Qualified("../nowhere.py:thing".to_string()),
        HintReference::Qualified("../other.py".to_string()),
    ];
    let resolution = DependencyResolver::default().resolve(&doc, "pop", &references);

    assert_eq!(resolution.dependencies.len(), 1);
    assert_eq!(resolution.dependencies[0].entity_name(), None);
    assert_eq!(resolution.diagnostics.len(), 1);
    assert_eq!(resolution.diagnostics[0].reference, "\"../nowhere.py:thing\"");
}

#[test]
fn strict_config_reports_unimported_names() {
    let mut doc = SourceDocument::parse(
        "import pop\n\n@pop.hint([local])\n@pop.note()\ndef f():\n    pass\n\ndef local():\n    pass\n",
        Some(fixture("hints/inline.py")),
    )
    .unwrap();
    let references = hint_references(&mut doc, "f");

    let lenient = DependencyResolver::new(ResolverConfig::default());
    // inline.py only exists in memory, so even the fallback cannot load it
    assert_eq!(lenient.resolve(&doc, "pop", &references).diagnostics.len(), 1);

    let strict = DependencyResolver::new(EngineConfig::strict().resolver);
    let resolution = strict.resolve(&doc, "pop", &references);
    assert!(resolution.dependencies.is_empty());
    assert!(resolution.diagnostics[0].message.contains("not imported relatively"));
}

#[test]
fn union_across_hints() {
    let mut doc = load("hints/relative.py");
    let mut references = hint_references(&mut doc, "cached_load");
    references.extend(references.clone());

    let resolution = DependencyResolver::default().resolve(&doc, "pop", &references);
    assert_eq!(resolution.dependencies.len(), 4);
    assert_eq!(union_dependencies(resolution.dependencies).len(), 2);
}
