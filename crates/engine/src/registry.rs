use crate::config::EngineConfig;
use crate::detector::EntityDetector;
use crate::directive::DirectiveDefinition;
use crate::document::SourceDocument;
use crate::entity::Scan;
use crate::error::{DirectiveError, Result, Violation};
use crate::validator;
use std::collections::HashMap;

/// The set of directive types recognised under one marker prefix
#[derive(Debug, Clone)]
pub struct DirectiveRegistry {
    prefix: String,
    definitions: Vec<DirectiveDefinition>,
    /// alias → index into `definitions`
    aliases: HashMap<String, usize>,
}

impl DirectiveRegistry {
    /// Build a registry; canonical names and aliases must be unique
    pub fn new(prefix: impl Into<String>, definitions: Vec<DirectiveDefinition>) -> Result<Self> {
        let mut aliases = HashMap::new();
        for (idx, definition) in definitions.iter().enumerate() {
            let name = definition.name();
            if definitions[..idx].iter().any(|d| d.name() == name) {
                return Err(DirectiveError::usage(
                    Violation::DuplicateName,
                    name,
                    format!(
                        "Name '{name}' has already been used. All directives must have unique name."
                    ),
                ));
            }
            for alias in definition.config().alias_names() {
                if let Some(owner) = aliases.insert(alias.to_string(), idx) {
                    if owner != idx {
                        return Err(DirectiveError::usage(
                            Violation::DuplicateAlias,
                            alias,
                            format!(
                                "Alias '{alias}' is used by both {} and {name}",
                                definitions[owner].name()
                            ),
                        ));
                    }
                }
            }
        }

        Ok(Self {
            prefix: prefix.into(),
            definitions,
            aliases,
        })
    }

    /// Registry using the prefix of `config`
    pub fn from_config(config: &EngineConfig, definitions: Vec<DirectiveDefinition>) -> Result<Self> {
        config
            .validate()
            .map_err(|message| DirectiveError::usage(Violation::InvalidConfig, &config.prefix, message))?;
        Self::new(config.prefix.clone(), definitions)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn definitions(&self) -> &[DirectiveDefinition] {
        &self.definitions
    }

    /// Resolve a marker's surface name to its definition and canonical name
    pub fn lookup(&self, alias: &str) -> Option<(&DirectiveDefinition, &str)> {
        let definition = &self.definitions[*self.aliases.get(alias)?];
        Some((definition, definition.name()))
    }

    /// Definition by canonical name
    pub fn get(&self, name: &str) -> Option<&DirectiveDefinition> {
        self.definitions.iter().find(|d| d.name() == name)
    }

    /// Detect and validate the annotated entities of `doc`.
    ///
    /// With `strip_markers` the live document loses every marker of this
    /// prefix, but only once validation succeeded.
    pub fn parse(&self, doc: &mut SourceDocument, strip_markers: bool) -> Result<Scan> {
        let scan = EntityDetector::new(self).detect(doc)?;
        validator::validate(self, scan.entities())?;
        if strip_markers {
            doc.strip_markers(&self.prefix)?;
        }
        log::info!(
            "Found {} annotated entities in {}",
            scan.len(),
            doc.file_name().unwrap_or("<module>")
        );
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::DirectiveConfig;
    use pretty_assertions::assert_eq;

    fn plain(name: &str) -> DirectiveDefinition {
        DirectiveDefinition::new(DirectiveConfig::new(name), vec![]).unwrap()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = DirectiveRegistry::new("pop", vec![plain("pop"), plain("pop")]).unwrap_err();
        assert_eq!(err.violation(), Some(Violation::DuplicateName));
        assert_eq!(
            err.to_string(),
            "Name 'pop' has already been used. All directives must have unique name."
        );
    }

    #[test]
    fn shared_aliases_are_rejected() {
        let aliased = DirectiveDefinition::new(
            DirectiveConfig::new("corn").aliases(["corn", "salt"]),
            vec![],
        )
        .unwrap();
        let err = DirectiveRegistry::new("pop", vec![aliased, plain("salt")]).unwrap_err();
        assert_eq!(err.violation(), Some(Violation::DuplicateAlias));
    }

    #[test]
    fn lookup_by_alias() {
        let aliased = DirectiveDefinition::new(
            DirectiveConfig::new("corn").aliases(["c", "kernel"]),
            vec![],
        )
        .unwrap();
        let registry = DirectiveRegistry::new("pop", vec![aliased]).unwrap();
        assert_eq!(registry.lookup("kernel").map(|(_, name)| name), Some("corn"));
        assert!(registry.lookup("corn").is_none());
        assert!(registry.get("corn").is_some());
    }

    #[test]
    fn from_config_checks_prefix() {
        let config = EngineConfig::with_prefix("not an identifier");
        let err = DirectiveRegistry::from_config(&config, vec![]).unwrap_err();
        assert_eq!(err.violation(), Some(Violation::InvalidConfig));
    }

    #[test]
    fn failed_validation_leaves_document_untouched() {
        let single = DirectiveDefinition::new(DirectiveConfig::new("one").allow_multiple(false), vec![])
            .unwrap();
        let registry = DirectiveRegistry::new("pop", vec![single]).unwrap();
        let code = "@pop.one()\n@pop.one()\ndef f():\n    pass\n";
        let mut doc = SourceDocument::parse(code, None).unwrap();
        assert!(registry.parse(&mut doc, true).is_err());
        assert_eq!(doc.text(), code);

        let mut doc = SourceDocument::parse("@pop.one()\ndef f():\n    pass\n", None).unwrap();
        let scan = registry.parse(&mut doc, true).unwrap();
        assert_eq!(scan.len(), 1);
        assert_eq!(doc.text(), "def f():\n    pass\n");
    }
}
