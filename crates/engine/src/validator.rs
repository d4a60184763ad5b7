use crate::entity::{DirectiveMap, Entity};
use crate::error::{DirectiveError, Result, Violation};
use crate::registry::DirectiveRegistry;

/// Check placement, multiplicity, requires and resists rules on every
/// entity. Stops at the first violation.
pub fn validate<'a>(
    registry: &DirectiveRegistry,
    entities: impl IntoIterator<Item = &'a Entity>,
) -> Result<()> {
    let mut checked = 0usize;
    for entity in entities {
        check_entity(registry, entity)?;
        checked += 1;
    }
    log::debug!("Validated {checked} entities");
    Ok(())
}

fn check_entity(registry: &DirectiveRegistry, entity: &Entity) -> Result<()> {
    let context = entity.context();
    for (name, instances) in entity.directives.iter() {
        let Some(definition) = registry.get(name) else {
            continue;
        };
        let config = definition.config();

        if !config.allows_context(context) {
            return Err(DirectiveError::usage(
                Violation::Placement,
                name,
                format!("Directive {name} cannot be placed in {context}. "),
            ));
        }

        if instances.len() > 1 && !config.allows_multiple() {
            return Err(DirectiveError::usage(
                Violation::Multiplicity,
                name,
                format!("Directive {name} does not allow multiple instances. "),
            ));
        }

        if let Some(missing) = first_missing(&entity.directives, config.required()) {
            return Err(DirectiveError::usage(
                Violation::MissingRequirement,
                name,
                format!("Directive {name} requires directives {missing}"),
            ));
        }

        if let Some(present) = config
            .resisted()
            .iter()
            .find(|other| entity.directives.contains_key(other))
        {
            return Err(DirectiveError::usage(
                Violation::ResistedPresent,
                name,
                format!("Directive {name} resists directives {present}"),
            ));
        }
    }
    Ok(())
}

fn first_missing<'c>(directives: &DirectiveMap, required: &'c [String]) -> Option<&'c str> {
    required
        .iter()
        .find(|other| !directives.contains_key(other))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::EntityDetector;
    use crate::directive::{
        DirectiveConfig, DirectiveContext, DirectiveDefinition, FieldKind, FieldSpec,
    };
    use crate::document::SourceDocument;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn registry() -> DirectiveRegistry {
        let dummy = || {
            vec![FieldSpec::with_default(
                "dummy",
                FieldKind::Str,
                Value::Str(String::new()),
            )]
        };
        DirectiveRegistry::new(
            "world",
            vec![
                DirectiveDefinition::new(DirectiveConfig::new("hello"), vec![]).unwrap(),
                DirectiveDefinition::new(DirectiveConfig::new("other"), vec![]).unwrap(),
                DirectiveDefinition::new(
                    DirectiveConfig::new("function_only")
                        .allowed_contexts([DirectiveContext::Function])
                        .requires(["hello"])
                        .resists(["other"])
                        .allow_multiple(false),
                    dummy(),
                )
                .unwrap(),
                DirectiveDefinition::new(
                    DirectiveConfig::new("single").allow_multiple(false),
                    dummy(),
                )
                .unwrap(),
            ],
        )
        .unwrap()
    }

    fn check(code: &str) -> Result<()> {
        let registry = registry();
        let doc = SourceDocument::parse(code, None)?;
        let scan = EntityDetector::new(&registry).detect(&doc)?;
        validate(&registry, scan.entities())
    }

    fn usage_error(code: &str) -> (Violation, String) {
        match check(code).unwrap_err() {
            DirectiveError::InvalidUsage {
                violation, message, ..
            } => (violation, message),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn valid_combination_passes() {
        check("@world.hello()\n@world.function_only()\ndef f():\n    pass\n").unwrap();
    }

    #[test]
    fn placement() {
        let (violation, message) =
            usage_error("@world.hello()\n@world.function_only()\nclass C:\n    pass\n");
        assert_eq!(violation, Violation::Placement);
        assert_eq!(message, "Directive function_only cannot be placed in class. ");

        let (violation, _) = usage_error("world.run(world.hello(), world.function_only())\n");
        assert_eq!(violation, Violation::Placement);
    }

    #[test]
    fn multiplicity() {
        let (violation, message) = usage_error("@world.single()\n@world.single()\ndef f():\n    pass\n");
        assert_eq!(violation, Violation::Multiplicity);
        assert_eq!(message, "Directive single does not allow multiple instances. ");

        check("@world.hello()\n@world.hello()\ndef f():\n    pass\n").unwrap();
    }

    #[test]
    fn requires_and_resists() {
        let (violation, message) = usage_error("@world.function_only()\ndef f():\n    pass\n");
        assert_eq!(violation, Violation::MissingRequirement);
        assert_eq!(message, "Directive function_only requires directives hello");

        let (violation, message) = usage_error(
            "@world.other()\n@world.hello()\n@world.function_only()\ndef f():\n    pass\n",
        );
        assert_eq!(violation, Violation::ResistedPresent);
        assert_eq!(message, "Directive function_only resists directives other");
    }
}
