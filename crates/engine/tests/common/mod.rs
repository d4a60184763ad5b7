#![allow(dead_code)]

use scribe_engine::{
    DirectiveConfig, DirectiveContext, DirectiveDefinition, DirectiveRegistry, FieldKind,
    FieldSpec, SourceDocument, Value,
};
use std::path::PathBuf;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load(name: &str) -> SourceDocument {
    SourceDocument::from_file(fixture(name)).expect("fixture should parse")
}

/// Registry under the `pop` prefix used by every fixture
pub fn registry() -> DirectiveRegistry {
    let note = DirectiveDefinition::new(
        DirectiveConfig::new("note").positional_order(["requirement"]),
        vec![
            FieldSpec::with_default("requirement", FieldKind::Str, Value::Str(String::new())),
            FieldSpec::with_default("modify", FieldKind::Bool, Value::Bool(false)),
            FieldSpec::with_default("extra", FieldKind::Dict, Value::Dict(Vec::new())),
            FieldSpec::with_default(
                "items",
                FieldKind::List(Box::new(FieldKind::Any)),
                Value::List(Vec::new()),
            ),
        ],
    )
    .unwrap();

    let tag = DirectiveDefinition::new(
        DirectiveConfig::new("tag").positional_order(["label"]),
        vec![
            FieldSpec::required("label", FieldKind::Str),
            FieldSpec::optional("owner", FieldKind::Identifier),
        ],
    )
    .unwrap();

    let hint = DirectiveDefinition::new(
        DirectiveConfig::new("hint")
            .positional_order(["entity_list"])
            .requires(["note"]),
        vec![FieldSpec::required(
            "entity_list",
            FieldKind::List(Box::new(FieldKind::Reference)),
        )],
    )
    .unwrap();

    let single = DirectiveDefinition::new(DirectiveConfig::new("single").allow_multiple(false), vec![])
        .unwrap();

    let function_only = DirectiveDefinition::new(
        DirectiveConfig::new("function_only")
            .allowed_contexts([DirectiveContext::Function])
            .requires(["note"])
            .resists(["tag"])
            .allow_multiple(false),
        vec![],
    )
    .unwrap();

    DirectiveRegistry::new("pop", vec![note, tag, hint, single, function_only]).unwrap()
}
