mod common;

use common::{load, registry};
use pretty_assertions::assert_eq;
use scribe_engine::{DirectiveError, Entity, EntityGrouper, EntityKind, Value, Violation};

#[test]
fn basic_fixture_emits_module_then_declarations() {
    let mut doc = load("basic.py");
    let scan = registry().parse(&mut doc, false).unwrap();

    let names: Vec<_> = scan.entities().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["basic.py", "count_items", "dump_items", "Shelf", "relabel"]);

    let kinds: Vec<_> = scan.entities().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::Module,
            EntityKind::Function,
            EntityKind::Function,
            EntityKind::Class,
            EntityKind::Function,
        ]
    );

    // the method sits in a class without markers
    let relabel = scan.entities().last().unwrap();
    let parent = scan.parent(relabel.id).unwrap();
    assert_eq!(parent.name, "Plain");
    assert_eq!(parent.kind, EntityKind::Class);
    assert!(!parent.is_annotated());
    assert!(scan.parent(parent.id).is_none());
    assert_eq!(scan.top_ancestor(relabel.id).map(|e| e.name.as_str()), Some("Plain"));
}

#[test]
fn marker_arguments_are_bound() {
    let mut doc = load("basic.py");
    let scan = registry().parse(&mut doc, false).unwrap();
    let entities: Vec<&Entity> = scan.entities().collect();

    let module = entities[0].directives.first("note").unwrap();
    assert_eq!(module.str_field("requirement"), Some("Keep the module importable"));

    let count = entities[1].directives.first("note").unwrap();
    assert_eq!(count.str_field("requirement"), Some("Count the items"));
    assert_eq!(count.bool_field("modify"), Some(false));
    let Some(Value::Dict(extra)) = count.value("extra") else {
        panic!("extra should be a dict");
    };
    assert_eq!(extra[0].0, Value::Str("unit".into()));
    let unit = extra[0].1.as_list().unwrap();
    assert_eq!(unit[0].as_identifier().map(|i| i.name.as_str()), Some("pieces"));
    assert_eq!(unit[1], Value::Int(16));
    assert_eq!(count.list_field("items").map(<[Value]>::len), Some(4));

    let dump = entities[2];
    assert_eq!(dump.directives.keys().collect::<Vec<_>>(), vec!["tag", "note"]);
    let tag = dump.directives.first("tag").unwrap();
    assert_eq!(tag.str_field("label"), Some("storage"));
    assert_eq!(
        tag.value("owner").and_then(Value::as_identifier).map(|i| i.name.as_str()),
        Some("json")
    );

    let relabel = entities[4].directives.first("tag").unwrap();
    assert_eq!(relabel.str_field("label"), Some("mutation"));
    assert_eq!(relabel.value("owner"), Some(&Value::None));
}

#[test]
fn single_use_directive_repeated() {
    let mut doc = load("duplicate_single.py");
    let err = registry().parse(&mut doc, false).unwrap_err();
    assert_eq!(err.violation(), Some(Violation::Multiplicity));
    assert!(err.to_string().contains("does not allow multiple instances"));
}

#[test]
fn requires_and_resists_messages() {
    let mut doc = load("missing_requirement.py");
    let err = registry().parse(&mut doc, false).unwrap_err();
    assert!(err.to_string().contains("requires directives"));
    assert_eq!(
        err.to_string(),
        "Directive function_only requires directives note"
    );

    let mut doc = load("resisted.py");
    let err = registry().parse(&mut doc, false).unwrap_err();
    assert!(err.to_string().contains("resists directives"));
}

#[test]
fn schema_violation_reports_the_directive() {
    let mut doc = scribe_engine::SourceDocument::parse(
        "import pop\n\n@pop.tag(owner=json)\ndef f():\n    pass\n",
        None,
    )
    .unwrap();
    match registry().parse(&mut doc, false).unwrap_err() {
        DirectiveError::Schema { directive, message } => {
            assert_eq!(directive, "tag");
            assert_eq!(message, "field 'label' is required");
        }
        other => panic!("expected a schema error, got {other}"),
    }
}

#[test]
fn grouping_by_tag_label() {
    let mut doc = load("group.py");
    let scan = registry().parse(&mut doc, false).unwrap();
    assert_eq!(scan.len(), 6);

    let grouper = EntityGrouper::new(|entity: &Entity| {
        entity
            .directives
            .first("tag")
            .and_then(|tag| tag.str_field("label"))
            .unwrap_or("untagged")
            .to_string()
    });
    let mut groups = grouper.group(scan.entities());
    assert_eq!(
        groups.iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
        vec!["module_group", "first", "untagged", "second"]
    );

    groups.sort_by(|a, b| a.name.cmp(&b.name));
    let shape: Vec<_> = groups
        .iter()
        .map(|g| (g.name.as_str(), g.entities.len()))
        .collect();
    assert_eq!(
        shape,
        vec![("first", 2), ("module_group", 1), ("second", 1), ("untagged", 2)]
    );
}
