use crate::directive::RUN_ALIAS;
use crate::document::SourceDocument;
use crate::entity::{DeclPath, DeclStep, DirectiveMap, Entity, EntityId, EntityKind, Scan};
use crate::error::{DirectiveError, Result, Violation};
use crate::registry::DirectiveRegistry;
use crate::syntax::{
    call_name, decorator_expression, is_module_statement, node_text, significant_children,
    Declaration, EXPRESSION_STATEMENT,
};
use crate::value::Value;
use std::collections::HashMap;
use tree_sitter::Node;

/// Single depth-first pass collecting directive markers per declaration
pub struct EntityDetector<'r> {
    registry: &'r DirectiveRegistry,
}

/// Per-scope bookkeeping while walking
struct Frame {
    entity: EntityId,
    /// (kind, name) → declarations seen so far in this scope
    seen: HashMap<(EntityKind, String), usize>,
}

struct Walk<'a> {
    registry: &'a DirectiveRegistry,
    src: &'a str,
    module_name: String,
    arena: Vec<Entity>,
    module: Option<EntityId>,
    stack: Vec<Frame>,
    top_seen: HashMap<(EntityKind, String), usize>,
}

impl<'r> EntityDetector<'r> {
    pub const fn new(registry: &'r DirectiveRegistry) -> Self {
        Self { registry }
    }

    /// Walk the document once and return the scan.
    ///
    /// Emission order: the module entity first when a `run(...)` marker
    /// carries directives, then annotated declarations in pre-order.
    pub fn detect(&self, doc: &SourceDocument) -> Result<Scan> {
        let mut walk = Walk {
            registry: self.registry,
            src: doc.text(),
            module_name: doc.file_name().unwrap_or("<module>").to_string(),
            arena: Vec::new(),
            module: None,
            stack: Vec::new(),
            top_seen: HashMap::new(),
        };
        walk.visit_children(doc.root())?;

        let module = walk
            .module
            .filter(|id| walk.arena[*id].is_annotated());
        let annotated: Vec<EntityId> = module
            .into_iter()
            .chain(
                walk.arena
                    .iter()
                    .filter(|e| e.kind != EntityKind::Module && e.is_annotated())
                    .map(|e| e.id),
            )
            .collect();

        log::debug!(
            "Walked {} declaration(s), {} annotated",
            walk.arena.len(),
            annotated.len()
        );
        Ok(Scan::new(
            self.registry.prefix().to_string(),
            walk.arena,
            annotated,
        ))
    }
}

impl Walk<'_> {
    fn visit_children(&mut self, node: Node) -> Result<()> {
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        for child in children {
            self.visit(child)?;
        }
        Ok(())
    }

    fn visit(&mut self, node: Node) -> Result<()> {
        if let Some(decl) = Declaration::from_statement(node) {
            return self.visit_declaration(&decl);
        }
        if node.kind() == "call" {
            self.visit_call(node)?;
        }
        self.visit_children(node)
    }

    fn visit_declaration(&mut self, decl: &Declaration) -> Result<()> {
        let kind = EntityKind::from(decl.kind);
        let name = decl.name(self.src).to_string();

        let decorators: Vec<Node> = decl
            .decorators()
            .into_iter()
            .filter_map(decorator_expression)
            .collect();
        let directives = self.extract_directives(&decorators)?;

        let seen = match self.stack.last_mut() {
            Some(frame) => &mut frame.seen,
            None => &mut self.top_seen,
        };
        let ordinal = seen.entry((kind, name.clone())).or_insert(0);
        let step = DeclStep {
            kind: decl.kind,
            name: name.clone(),
            ordinal: *ordinal,
        };
        *ordinal += 1;

        let parent = self.stack.last().map(|frame| frame.entity);
        let path = match parent {
            Some(parent) => self.arena[parent].path.child(step),
            None => DeclPath::root().child(step),
        };
        let id = self.arena.len();
        self.arena.push(Entity {
            id,
            kind,
            name,
            path,
            parent,
            directives,
        });

        self.stack.push(Frame {
            entity: id,
            seen: HashMap::new(),
        });
        for decorator in decl.decorators() {
            self.visit_children(decorator)?;
        }
        let result = self.visit_children(decl.definition);
        self.stack.pop();
        result
    }

    /// Handle a `prefix.run(...)` module marker
    fn visit_call(&mut self, call: Node) -> Result<()> {
        let Some((prefix, name)) = call_name(call, self.src) else {
            return Ok(());
        };
        if prefix != self.registry.prefix() || name != RUN_ALIAS {
            return Ok(());
        }

        if let Some(frame) = self.stack.last() {
            let owner = &self.arena[frame.entity].name;
            return Err(DirectiveError::usage(
                Violation::NestedModuleMarker,
                owner.clone(),
                format!(
                    "Module marker {prefix}.{RUN_ALIAS}(...) must be placed at top level, found inside '{owner}'"
                ),
            ));
        }

        let statement = call.parent().filter(|parent| {
            parent.kind() == EXPRESSION_STATEMENT && significant_children(*parent).len() == 1
        });
        if !statement.is_some_and(is_module_statement) {
            let marker = format!("{prefix}.{RUN_ALIAS}");
            return Err(DirectiveError::usage(
                Violation::NestedModuleMarker,
                marker.clone(),
                format!(
                    "Module marker {marker}(...) must be a statement of its own at module level, outside any block"
                ),
            ));
        }

        let arguments = call
            .child_by_field_name("arguments")
            .map(significant_children)
            .unwrap_or_default();
        let directives = self.extract_directives(&arguments)?;

        match self.module {
            Some(id) => self.arena[id].directives.extend(directives),
            None => {
                let id = self.arena.len();
                self.arena.push(Entity {
                    id,
                    kind: EntityKind::Module,
                    name: self.module_name.clone(),
                    path: DeclPath::root(),
                    parent: None,
                    directives,
                });
                self.module = Some(id);
            }
        }
        Ok(())
    }

    /// Bind every recognised marker call among `candidates`
    fn extract_directives(&self, candidates: &[Node]) -> Result<DirectiveMap> {
        let mut map = DirectiveMap::new();
        for candidate in candidates {
            let Some((prefix, alias)) = call_name(*candidate, self.src) else {
                continue;
            };
            if prefix != self.registry.prefix() || alias == RUN_ALIAS {
                continue;
            }
            let Some((definition, canonical)) = self.registry.lookup(&alias) else {
                log::debug!("Skipping unknown marker {prefix}.{alias}");
                continue;
            };

            let (positional, keywords) = self.arguments(*candidate, canonical)?;
            map.push(definition.bind(&alias, positional, keywords)?);
        }
        Ok(map)
    }

    fn arguments(
        &self,
        call: Node,
        directive: &str,
    ) -> Result<(Vec<Value>, Vec<(String, Value)>)> {
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        let Some(arguments) = call.child_by_field_name("arguments") else {
            return Ok((positional, keywords));
        };
        if arguments.kind() != "argument_list" {
            return Err(DirectiveError::schema(
                directive,
                format!("unsupported arguments '{}'", node_text(arguments, self.src)),
            ));
        }

        let evaluate = |node: Node| {
            Value::from_node(node, self.src).map_err(|message| DirectiveError::schema(directive, message))
        };
        for argument in significant_children(arguments) {
            match argument.kind() {
                "keyword_argument" => {
                    let (Some(name), Some(value)) = (
                        argument.child_by_field_name("name"),
                        argument.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    keywords.push((node_text(name, self.src).to_string(), evaluate(value)?));
                }
                "list_splat" | "dictionary_splat" => {
                    return Err(DirectiveError::schema(
                        directive,
                        format!(
                            "argument unpacking '{}' is not supported",
                            node_text(argument, self.src)
                        ),
                    ));
                }
                _ => positional.push(evaluate(argument)?),
            }
        }
        Ok((positional, keywords))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{DirectiveConfig, DirectiveDefinition, FieldKind, FieldSpec};
    use pretty_assertions::assert_eq;

    fn registry() -> DirectiveRegistry {
        DirectiveRegistry::new(
            "pop",
            vec![
                DirectiveDefinition::new(
                    DirectiveConfig::new("corn")
                        .aliases(["corn", "c"])
                        .positional_order(["size"]),
                    vec![FieldSpec::with_default("size", FieldKind::Int, Value::Int(1))],
                )
                .unwrap(),
                DirectiveDefinition::new(DirectiveConfig::new("salt"), vec![]).unwrap(),
            ],
        )
        .unwrap()
    }

    fn scan(code: &str) -> Result<Scan> {
        let doc = SourceDocument::parse(code, None)?;
        EntityDetector::new(&registry()).detect(&doc)
    }

    #[test]
    fn module_first_then_preorder() {
        let code = "\
@pop.corn(2)
def first():
    pass

class Outer:
    @pop.c()
    def inner(self):
        pass

pop.run(pop.salt(), other.thing())
";
        let scan = scan(code).unwrap();
        let names: Vec<_> = scan.entities().map(|e| (e.kind, e.name.clone())).collect();
        assert_eq!(
            names,
            vec![
                (EntityKind::Module, "<module>".to_string()),
                (EntityKind::Function, "first".to_string()),
                (EntityKind::Function, "inner".to_string()),
            ]
        );

        let inner = scan.entities().last().unwrap();
        assert_eq!(scan.parent(inner.id).map(|p| p.name.as_str()), Some("Outer"));
        let corn = inner.directives.first("corn").unwrap();
        assert_eq!(corn.alias(), "c");
        assert_eq!(corn.int_field("size"), Some(1));
    }

    #[test]
    fn unknown_and_foreign_markers_are_skipped() {
        let scan = scan("@pop.unknown()\n@other.corn()\n@pop.corn\ndef f():\n    pass\n").unwrap();
        assert!(scan.is_empty());
        assert_eq!(scan.get(0).map(|e| e.name.as_str()), Some("f"));
    }

    #[test]
    fn run_inside_declaration_is_rejected() {
        let err = scan("def f():\n    pop.run(pop.salt())\n").unwrap_err();
        assert_eq!(err.violation(), Some(Violation::NestedModuleMarker));
    }

    #[test]
    fn run_inside_a_block_or_expression_is_rejected() {
        let err = scan("if __name__ == '__main__':\n    pop.run(pop.salt())\n").unwrap_err();
        assert_eq!(err.violation(), Some(Violation::NestedModuleMarker));
        assert_eq!(
            err.to_string(),
            "Module marker pop.run(...) must be a statement of its own at module level, outside any block"
        );

        let err = scan("marker = pop.run(pop.salt())\n").unwrap_err();
        assert_eq!(err.violation(), Some(Violation::NestedModuleMarker));
    }

    #[test]
    fn multiple_run_markers_merge() {
        let scan = scan("pop.run(pop.salt())\nx = 1\npop.run(pop.corn(3), pop.salt())\n").unwrap();
        assert_eq!(scan.len(), 1);
        let module = scan.entities().next().unwrap();
        assert_eq!(module.directives.keys().collect::<Vec<_>>(), vec!["salt", "corn"]);
        assert_eq!(module.directives.get("salt").map(<[_]>::len), Some(2));
    }

    #[test]
    fn schema_errors_propagate() {
        let err = scan("@pop.corn(size='big')\ndef f():\n    pass\n").unwrap_err();
        assert!(err.is_schema());
        let err = scan("@pop.salt(1)\ndef f():\n    pass\n").unwrap_err();
        assert!(err.to_string().contains("without specifying positional orders"));
    }
}
