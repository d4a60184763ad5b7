//! Built-in directive set: `autocomplete` marks code to be written or
//! changed, `hint` points at code the change depends on.

use crate::error::Result;
use scribe_engine::{
    Directive, DirectiveConfig, DirectiveDefinition, DirectiveRegistry, EngineConfig, FieldKind,
    FieldSpec, HintReference, Value,
};

/// Default marker namespace (`@scribe.autocomplete(...)`)
pub const PREFIX: &str = "scribe";
pub const AUTOCOMPLETE: &str = "autocomplete";
pub const HINT: &str = "hint";

pub fn autocomplete_definition() -> Result<DirectiveDefinition> {
    let definition = DirectiveDefinition::new(
        DirectiveConfig::new(AUTOCOMPLETE)
            .allow_multiple(false)
            .positional_order(["requirement"]),
        vec![
            FieldSpec::with_default("requirement", FieldKind::Str, Value::Str(String::new())),
            FieldSpec::with_default("rewrite_docs", FieldKind::Bool, Value::Bool(false)),
            FieldSpec::with_default("annotations", FieldKind::Bool, Value::Bool(true)),
            FieldSpec::with_default("pseudo_code", FieldKind::Bool, Value::Bool(false)),
            FieldSpec::optional("group", FieldKind::Str),
            FieldSpec::with_default("modify", FieldKind::Bool, Value::Bool(false)),
            FieldSpec::with_default("count", FieldKind::Int, Value::Int(1)),
        ],
    )?;
    Ok(definition)
}

pub fn hint_definition() -> Result<DirectiveDefinition> {
    let definition = DirectiveDefinition::new(
        DirectiveConfig::new(HINT)
            .allow_multiple(true)
            .positional_order(["entity_list", "infer"])
            .requires([AUTOCOMPLETE]),
        vec![
            FieldSpec::required("entity_list", FieldKind::List(Box::new(FieldKind::Reference))),
            FieldSpec::with_default("infer", FieldKind::Bool, Value::Bool(false)),
        ],
    )?;
    Ok(definition)
}

pub fn definitions() -> Result<Vec<DirectiveDefinition>> {
    Ok(vec![autocomplete_definition()?, hint_definition()?])
}

/// Registry of the built-in directives under [`PREFIX`]
pub fn registry() -> Result<DirectiveRegistry> {
    Ok(DirectiveRegistry::new(PREFIX, definitions()?)?)
}

/// Registry of the built-in directives under the prefix of `config`
pub fn registry_with(config: &EngineConfig) -> Result<DirectiveRegistry> {
    Ok(DirectiveRegistry::from_config(config, definitions()?)?)
}

/// Typed view of an `autocomplete` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autocomplete {
    pub requirement: String,
    pub rewrite_docs: bool,
    pub annotations: bool,
    pub pseudo_code: bool,
    pub group: Option<String>,
    pub modify: bool,
    pub count: i64,
}

impl Default for Autocomplete {
    fn default() -> Self {
        Self {
            requirement: String::new(),
            rewrite_docs: false,
            annotations: true,
            pseudo_code: false,
            group: None,
            modify: false,
            count: 1,
        }
    }
}

impl Autocomplete {
    pub fn from_directive(directive: &Directive) -> Self {
        let defaults = Self::default();
        Self {
            requirement: directive
                .str_field("requirement")
                .map_or(defaults.requirement, str::to_string),
            rewrite_docs: directive
                .bool_field("rewrite_docs")
                .unwrap_or(defaults.rewrite_docs),
            annotations: directive
                .bool_field("annotations")
                .unwrap_or(defaults.annotations),
            pseudo_code: directive
                .bool_field("pseudo_code")
                .unwrap_or(defaults.pseudo_code),
            group: directive.str_field("group").map(str::to_string),
            modify: directive.bool_field("modify").unwrap_or(defaults.modify),
            count: directive.int_field("count").unwrap_or(defaults.count),
        }
    }
}

/// Typed view of a `hint` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub references: Vec<HintReference>,
    pub infer: bool,
}

impl Hint {
    pub fn from_directive(directive: &Directive) -> Result<Self> {
        let references = HintReference::collect(std::slice::from_ref(directive), "entity_list")?;
        Ok(Self {
            references,
            infer: directive.bool_field("infer").unwrap_or(false),
        })
    }
}
