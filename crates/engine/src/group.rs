use crate::entity::Entity;
use serde::Serialize;

/// Entities sharing one group key
#[derive(Debug, Clone, Serialize)]
pub struct EntityGroup<'a> {
    pub name: String,
    pub entities: Vec<&'a Entity>,
}

/// Partitions entities by a caller-supplied key
pub struct EntityGrouper<F> {
    key: F,
}

impl<F> EntityGrouper<F>
where
    F: Fn(&Entity) -> String,
{
    pub const fn new(key: F) -> Self {
        Self { key }
    }

    /// Groups in order of first appearance; entities keep input order
    pub fn group<'a>(&self, entities: impl IntoIterator<Item = &'a Entity>) -> Vec<EntityGroup<'a>> {
        let mut groups: Vec<EntityGroup<'a>> = Vec::new();
        for entity in entities {
            let name = (self.key)(entity);
            match groups.iter_mut().find(|group| group.name == name) {
                Some(group) => group.entities.push(entity),
                None => groups.push(EntityGroup {
                    name,
                    entities: vec![entity],
                }),
            }
        }
        log::debug!("Grouped into {} group(s)", groups.len());
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{DeclPath, DirectiveMap, EntityKind};
    use pretty_assertions::assert_eq;

    fn entity(id: usize, name: &str) -> Entity {
        Entity {
            id,
            kind: EntityKind::Function,
            name: name.to_string(),
            path: DeclPath::root(),
            parent: None,
            directives: DirectiveMap::new(),
        }
    }

    #[test]
    fn buckets_in_first_seen_order() {
        let entities = vec![
            entity(0, "a1"),
            entity(1, "b1"),
            entity(2, "a2"),
            entity(3, "c1"),
        ];
        let grouper = EntityGrouper::new(|e: &Entity| e.name[..1].to_string());
        let groups = grouper.group(&entities);

        let shape: Vec<_> = groups
            .iter()
            .map(|g| (g.name.as_str(), g.entities.iter().map(|e| e.id).collect::<Vec<_>>()))
            .collect();
        assert_eq!(shape, vec![("a", vec![0, 2]), ("b", vec![1]), ("c", vec![3])]);
    }
}
