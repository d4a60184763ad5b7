use crate::directive::{Directive, DirectiveContext};
use crate::document::SourceDocument;
use crate::error::{DirectiveError, Result};
use crate::splice::{self, UnparseOptions, UpdateOptions};
use crate::syntax::{
    find_declaration, line_start, parse_python, scope_declarations, DeclKind, Declaration,
};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tree_sitter::Node;

/// Index of an entity inside its [`Scan`]
pub type EntityId = usize;

/// Kind of declaration an entity stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Module,
    Class,
    Function,
}

impl EntityKind {
    #[must_use]
    pub const fn context(self) -> DirectiveContext {
        match self {
            Self::Module => DirectiveContext::Module,
            Self::Class => DirectiveContext::Class,
            Self::Function => DirectiveContext::Function,
        }
    }
}

impl From<DeclKind> for EntityKind {
    fn from(kind: DeclKind) -> Self {
        match kind {
            DeclKind::Class => Self::Class,
            DeclKind::Function => Self::Function,
        }
    }
}

/// One step of a [`DeclPath`]: the `ordinal`-th declaration of this kind and
/// name in the enclosing scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeclStep {
    pub kind: DeclKind,
    pub name: String,
    pub ordinal: usize,
}

/// Handle to a declaration, resolved against the document's current tree.
///
/// Paths survive edits that keep names in place (marker stripping, body
/// replacement). Two entities alias each other when one path is a prefix of
/// the other: an update through the outer entity is visible through the
/// inner one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct DeclPath(Vec<DeclStep>);

impl DeclPath {
    /// Path of the module itself
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn steps(&self) -> &[DeclStep] {
        &self.0
    }

    #[must_use]
    pub(crate) fn child(&self, step: DeclStep) -> Self {
        let mut steps = self.0.clone();
        steps.push(step);
        Self(steps)
    }

    fn starts_with(&self, other: &Self) -> bool {
        self.0.starts_with(&other.0)
    }

    /// The declaration this path points at; `None` for the root or when the
    /// tree no longer contains it
    pub(crate) fn resolve<'t>(&self, root: Node<'t>, src: &str) -> Option<Declaration<'t>> {
        let mut scope = root;
        let mut found = None;
        for step in &self.0 {
            let decl = scope_declarations(scope)
                .into_iter()
                .filter(|d| d.kind == step.kind && d.name(src) == step.name)
                .nth(step.ordinal)?;
            scope = decl.definition;
            found = Some(decl);
        }
        found
    }
}

/// Directives of one entity: canonical name → instances in source order.
/// Keys iterate in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectiveMap {
    entries: Vec<(String, Vec<Directive>)>,
}

impl DirectiveMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, directive: Directive) {
        match self.entries.iter_mut().find(|(name, _)| name == directive.name()) {
            Some((_, list)) => list.push(directive),
            None => self
                .entries
                .push((directive.name().to_string(), vec![directive])),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Directive]> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, list)| list.as_slice())
    }

    /// First instance of `name`
    pub fn first(&self, name: &str) -> Option<&Directive> {
        self.get(name).and_then(<[Directive]>::first)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Directive])> {
        self.entries
            .iter()
            .map(|(key, list)| (key.as_str(), list.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn extend(&mut self, other: Self) {
        for (_, list) in other.entries {
            for directive in list {
                self.push(directive);
            }
        }
    }
}

impl Serialize for DirectiveMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, list) in &self.entries {
            map.serialize_entry(key, list)?;
        }
        map.end()
    }
}

/// A module, class or function found by a scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    /// Declaration name, or file name for the module
    pub name: String,
    pub path: DeclPath,
    /// Lexically enclosing class or function
    pub parent: Option<EntityId>,
    pub directives: DirectiveMap,
}

impl Entity {
    pub const fn context(&self) -> DirectiveContext {
        self.kind.context()
    }

    pub fn is_annotated(&self) -> bool {
        !self.directives.is_empty()
    }
}

/// Result of one detection pass over a document.
///
/// Holds every walked declaration, annotated or not, so parents are always
/// addressable. [`Scan::entities`] yields only the annotated ones, module
/// first, then declarations in pre-order.
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    prefix: String,
    arena: Vec<Entity>,
    annotated: Vec<EntityId>,
}

impl Scan {
    pub(crate) fn new(prefix: String, arena: Vec<Entity>, annotated: Vec<EntityId>) -> Self {
        Self {
            prefix,
            arena,
            annotated,
        }
    }

    /// Marker namespace the scan was made with
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Annotated entities in emission order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.annotated.iter().map(|id| &self.arena[*id])
    }

    pub fn len(&self) -> usize {
        self.annotated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotated.is_empty()
    }

    /// Any walked entity, annotated or not
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.arena.get(id)
    }

    pub fn parent(&self, id: EntityId) -> Option<&Entity> {
        self.get(id)?.parent.and_then(|parent| self.get(parent))
    }

    /// Enclosing entities, nearest first
    pub fn ancestors(&self, id: EntityId) -> Vec<&Entity> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(entity) = current {
            chain.push(entity);
            current = self.parent(entity.id);
        }
        chain
    }

    /// Outermost enclosing entity, if nested
    pub fn top_ancestor(&self, id: EntityId) -> Option<&Entity> {
        self.ancestors(id).last().copied()
    }

    fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.get(id)
            .ok_or_else(|| DirectiveError::not_found("Entity", &format!("#{id}")))
    }

    fn declaration<'d>(&self, doc: &'d SourceDocument, entity: &Entity) -> Result<Declaration<'d>> {
        entity
            .path
            .resolve(doc.root(), doc.text())
            .ok_or_else(|| DirectiveError::not_found(label(entity.kind), &entity.name))
    }

    /// Render an entity from the document.
    ///
    /// The module renders the whole document. Markers are dropped with the
    /// scan's prefix unless `opts.prefix` overrides it.
    pub fn unparse(&self, doc: &SourceDocument, id: EntityId, opts: &UnparseOptions) -> Result<String> {
        let mut opts = opts.clone();
        if opts.prefix.is_none() {
            opts.prefix = Some(self.prefix.clone());
        }

        let entity = self.entity(id)?;
        let target = match (entity.kind, opts.include_ancestor) {
            (EntityKind::Module, _) => return splice::render(doc, None, &opts),
            (_, true) => self.top_ancestor(id).unwrap_or(entity),
            (_, false) => entity,
        };
        let decl = self.declaration(doc, target)?;
        splice::render(doc, Some(decl), &opts)
    }

    /// Replace an entity in the live document with the matching declaration
    /// of `new_code`.
    ///
    /// Body and decorators are always replaced; with `modify_signature` the
    /// header (name, parameters, return annotation or bases) too. The module
    /// entity replaces the whole text. A rename is tracked in this scan.
    pub fn update(
        &mut self,
        doc: &mut SourceDocument,
        id: EntityId,
        new_code: &str,
        opts: &UpdateOptions,
    ) -> Result<()> {
        let entity = self.entity(id)?.clone();
        let decl_kind = match entity.kind {
            EntityKind::Module => return doc.set_text(new_code.to_string()),
            EntityKind::Class => DeclKind::Class,
            EntityKind::Function => DeclKind::Function,
        };

        let fragment_tree = parse_python(new_code)?;
        let wanted = opts.name.as_deref().unwrap_or(&entity.name);
        let enclosing_class = self
            .parent(id)
            .filter(|parent| parent.kind == EntityKind::Class)
            .map(|parent| parent.name.clone());
        let fragment = enclosing_class
            .and_then(|class| {
                find_declaration(fragment_tree.root_node(), new_code, Some(DeclKind::Class), &class)
                    .and_then(|c| find_declaration(c.definition, new_code, Some(decl_kind), wanted))
            })
            .or_else(|| {
                find_declaration(fragment_tree.root_node(), new_code, Some(decl_kind), wanted)
            })
            .ok_or_else(|| DirectiveError::not_found(label(entity.kind), wanted))?;

        let (edits, line) = {
            let live = self.declaration(doc, &entity)?;
            let edits = splice::replacement_edits(
                &live,
                doc.text(),
                &fragment,
                new_code,
                opts.modify_signature,
            )?;
            (edits, line_start(doc.text(), live.statement.start_byte()))
        };
        doc.apply_edits(edits)?;
        log::debug!("Updated {} '{}'", entity.kind.context(), entity.name);

        if opts.modify_signature {
            self.retarget(doc, &entity, line);
        }
        Ok(())
    }

    /// Re-point `entity` (and everything nested in it) at the declaration
    /// that now starts on the line at `line`
    fn retarget(&mut self, doc: &SourceDocument, entity: &Entity, line: usize) {
        let parent_path = DeclPath(entity.path.0[..entity.path.0.len() - 1].to_vec());
        let scope = if parent_path.is_root() {
            Some(doc.root())
        } else {
            parent_path.resolve(doc.root(), doc.text()).map(|d| d.definition)
        };
        let Some(scope) = scope else {
            return;
        };

        let siblings = scope_declarations(scope);
        let Some(position) = siblings
            .iter()
            .position(|d| line_start(doc.text(), d.statement.start_byte()) == line)
        else {
            return;
        };
        let current = siblings[position];
        let name = current.name(doc.text()).to_string();
        let ordinal = siblings[..position]
            .iter()
            .filter(|d| d.kind == current.kind && d.name(doc.text()) == name)
            .count();
        let new_path = parent_path.child(DeclStep {
            kind: current.kind,
            name: name.clone(),
            ordinal,
        });
        if new_path == entity.path {
            return;
        }

        let depth = entity.path.0.len();
        for other in &mut self.arena {
            if other.path.starts_with(&entity.path) {
                let mut steps = new_path.0.clone();
                steps.extend_from_slice(&other.path.0[depth..]);
                other.path = DeclPath(steps);
            }
        }
        self.arena[entity.id].name = name;
    }
}

const fn label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Module => "Module",
        EntityKind::Class => "Class",
        EntityKind::Function => "Function",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{DirectiveConfig, DirectiveDefinition, FieldKind, FieldSpec};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn directive(name: &str) -> Directive {
        DirectiveDefinition::new(
            DirectiveConfig::new(name),
            vec![FieldSpec::with_default("x", FieldKind::Int, Value::Int(0))],
        )
        .unwrap()
        .bind(name, vec![], vec![])
        .unwrap()
    }

    #[test]
    fn directive_map_keeps_first_appearance_order() {
        let mut map = DirectiveMap::new();
        map.push(directive("b"));
        map.push(directive("a"));
        map.push(directive("b"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.get("b").map(<[Directive]>::len), Some(2));
        assert!(map.contains_key("a"));
        assert!(map.first("c").is_none());
    }

    #[test]
    fn decl_path_resolves_by_name_and_ordinal() {
        let code = "\
class A:
    def f(self):
        pass

if True:
    def g():
        pass
else:
    def g():
        return 2
";
        let tree = parse_python(code).unwrap();
        let method = DeclPath::root()
            .child(DeclStep {
                kind: DeclKind::Class,
                name: "A".to_string(),
                ordinal: 0,
            })
            .child(DeclStep {
                kind: DeclKind::Function,
                name: "f".to_string(),
                ordinal: 0,
            });
        let decl = method.resolve(tree.root_node(), code).unwrap();
        assert_eq!(decl.name(code), "f");

        let second_g = DeclPath::root().child(DeclStep {
            kind: DeclKind::Function,
            name: "g".to_string(),
            ordinal: 1,
        });
        let decl = second_g.resolve(tree.root_node(), code).unwrap();
        assert!(crate::syntax::node_text(decl.statement, code).contains("return 2"));

        assert!(DeclPath::root().resolve(tree.root_node(), code).is_none());
    }
}
