use crate::{
    entity::{EntityRef, EntityState},
    persist::{PersistError, SchemaSource, WriteOperation},
    value::Value,
};
use std::collections::{BTreeSet, HashMap};

///
/// WritePlan
///
/// Dirty entities partitioned by lifecycle state and ordered for issue:
/// inserts parents first, then updates, then deletes children first.
///

#[derive(Debug, Default)]
pub struct WritePlan {
    pub inserts: Vec<EntityRef>,
    pub updates: Vec<EntityRef>,
    pub deletes: Vec<EntityRef>,
}

impl WritePlan {
    /// Partition and order `entities`. Input order is creation order.
    pub fn build(entities: &[EntityRef], schema: &dyn SchemaSource) -> Result<Self, PersistError> {
        let mut inserts = Vec::new();
        let mut updates = Vec::new();
        let mut deletes = Vec::new();

        for entity in entities {
            match entity.state() {
                EntityState::Created => inserts.push(EntityRef::clone(entity)),
                EntityState::Modified(_) => updates.push(EntityRef::clone(entity)),
                EntityState::Delete => deletes.push(EntityRef::clone(entity)),
                EntityState::Unchanged | EntityState::Deleted => {}
            }
        }

        // inserts: parent before child
        let mut insert_edges = link_edges(&inserts);
        insert_edges.extend(key_edges(&inserts, schema)?);
        let inserts = order(inserts, &insert_edges)?;

        // deletes: child before parent
        let delete_edges: Vec<_> = key_edges(&deletes, schema)?
            .into_iter()
            .map(|(parent, child)| (child, parent))
            .collect();
        let deletes = order(deletes, &delete_edges)?;

        Ok(Self {
            inserts,
            updates,
            deletes,
        })
    }

    /// Every step in issue order.
    pub fn steps(&self) -> impl Iterator<Item = (WriteOperation, &EntityRef)> {
        let inserts = self.inserts.iter().map(|e| (WriteOperation::Insert, e));
        let updates = self.updates.iter().map(|e| (WriteOperation::Update, e));
        let deletes = self.deletes.iter().map(|e| (WriteOperation::Delete, e));

        inserts.chain(updates).chain(deletes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len() + self.deletes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// (before, after) index pairs from explicit parent links
fn link_edges(nodes: &[EntityRef]) -> Vec<(usize, usize)> {
    let index: HashMap<_, _> = nodes.iter().enumerate().map(|(i, e)| (e.id(), i)).collect();
    let mut edges = Vec::new();

    for (child, entity) in nodes.iter().enumerate() {
        for link in entity.parent_links() {
            if let Some(&parent) = index.get(&link.parent.id()) {
                edges.push((parent, child));
            }
        }
    }

    edges
}

// (parent, child) index pairs where the child's foreign-key values equal the
// parent's primary-key values
fn key_edges(
    nodes: &[EntityRef],
    schema: &dyn SchemaSource,
) -> Result<Vec<(usize, usize)>, PersistError> {
    let mut edges = Vec::new();

    for (child, entity) in nodes.iter().enumerate() {
        let relationships = schema.relationships(entity.table())?;

        for rel in &relationships.parents {
            let Some(foreign) = key_values(entity, &rel.foreign_keys) else {
                continue;
            };

            for (parent, candidate) in nodes.iter().enumerate() {
                if parent != child
                    && candidate.table() == &rel.primary_table
                    && key_values(candidate, &rel.primary_keys).as_ref() == Some(&foreign)
                {
                    edges.push((parent, child));
                }
            }
        }
    }

    Ok(edges)
}

fn key_values(entity: &EntityRef, columns: &[String]) -> Option<Vec<Value>> {
    columns
        .iter()
        .map(|column| entity.get_value(column).filter(|v| !v.is_null()))
        .collect()
}

// Kahn's algorithm; ready nodes are taken lowest index first so unrelated
// rows keep their input order.
fn order(nodes: Vec<EntityRef>, edges: &[(usize, usize)]) -> Result<Vec<EntityRef>, PersistError> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut outgoing = vec![Vec::new(); nodes.len()];
    for &(before, after) in edges {
        indegree[after] += 1;
        outgoing[before].push(after);
    }

    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut sequence = Vec::with_capacity(nodes.len());

    while let Some(next) = ready.pop_first() {
        sequence.push(next);
        for &after in &outgoing[next] {
            indegree[after] -= 1;
            if indegree[after] == 0 {
                ready.insert(after);
            }
        }
    }

    if sequence.len() < nodes.len() {
        let mut tables: Vec<String> = (0..nodes.len())
            .filter(|i| indegree[*i] > 0)
            .map(|i| nodes[i].table().to_string())
            .collect();
        tables.sort();
        tables.dedup();

        return Err(PersistError::DependencyCycle { tables });
    }

    let mut slots: Vec<Option<EntityRef>> = nodes.into_iter().map(Some).collect();
    Ok(sequence
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}
