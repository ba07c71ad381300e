//! # Graph Walker
//!
//! Breadth-first traversal of a live entity graph, driven by the schema.
//!
//! In deterministic mode relation fields are visited in the schema's
//! canonical order and collections in their stored order. Unordered
//! collections of primitives are linearized by the primitives' canonical
//! sort key; unordered collections of non-primitive entities have no safe
//! linearization and abort the walk with `NonDeterministicCollectionField`.

use crate::graph::{Entity, FieldValue, Graph, ObjectId};
use crate::schema::{RelationField, Schema};
use crate::GraphError;
use std::collections::{BTreeSet, VecDeque};

/// One outgoing relation edge of a non-primitive entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<'s> {
    pub field: &'s RelationField,
    pub target: Entity,
}

/// Read-only traversal over one graph under one schema.
#[derive(Debug, Clone, Copy)]
pub struct GraphWalker<'a> {
    schema: &'a Schema,
    graph: &'a Graph,
}

impl<'a> GraphWalker<'a> {
    #[must_use]
    pub fn new(schema: &'a Schema, graph: &'a Graph) -> Self {
        Self { schema, graph }
    }

    /// Every non-primitive entity reachable from `root`, each exactly once,
    /// in breadth-first order.
    pub fn reachable_entities(
        &self,
        root: ObjectId,
        include_root: bool,
        deterministic: bool,
    ) -> Result<Vec<ObjectId>, GraphError> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        let mut order = Vec::new();

        self.graph.node(root)?;
        visited.insert(root);
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            if include_root || current != root {
                order.push(current);
            }
            for edge in self.outgoing_edges(current, deterministic)? {
                if let Entity::Object(target) = edge.target {
                    if visited.insert(target) {
                        queue.push_back(target);
                    }
                }
            }
        }

        Ok(order)
    }

    /// Direct edges of one entity, primitive and non-primitive alike.
    ///
    /// Absent single values (`Null`) produce no edge.
    pub fn outgoing_edges(
        &self,
        entity: ObjectId,
        deterministic: bool,
    ) -> Result<Vec<Edge<'a>>, GraphError> {
        let node = self.graph.node(entity)?;
        let fields = self.schema.fields(node.type_name(), deterministic)?;

        let mut edges = Vec::new();
        for field in fields {
            let value = node
                .field(&field.name)
                .ok_or_else(|| GraphError::MalformedField {
                    type_name: node.type_name().to_string(),
                    field: field.name.clone(),
                })?;

            match value {
                FieldValue::One(target) if !field.ty.is_collection() => {
                    if !target.is_null() {
                        edges.push(Edge {
                            field,
                            target: target.clone(),
                        });
                    }
                }
                FieldValue::Many(items) if field.ty.is_collection() => {
                    let mut targets: Vec<Entity> =
                        items.iter().filter(|e| !e.is_null()).cloned().collect();
                    if deterministic && !field.ty.is_ordered() {
                        if !field.ty.is_primitive() {
                            return Err(GraphError::NonDeterministicCollectionField {
                                type_name: node.type_name().to_string(),
                                field: field.name.clone(),
                            });
                        }
                        targets.sort();
                    }
                    edges.extend(targets.into_iter().map(|target| Edge { field, target }));
                }
                _ => {
                    return Err(GraphError::MalformedField {
                        type_name: node.type_name().to_string(),
                        field: field.name.clone(),
                    });
                }
            }
        }
        Ok(edges)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldType, TypeRegistry};
    use crate::PrimitiveKind;
    use std::sync::Arc;

    fn setup() -> (Schema, Graph) {
        let registry = Arc::new(
            TypeRegistry::builder()
                .entity("Board", |t| {
                    t.field("lists", FieldType::entity("Card").list())
                        .field("labels", FieldType::primitive(PrimitiveKind::Text).set())
                        .field("archive", FieldType::entity("Archive"))
                })
                .entity("Archive", |t| t.field("watchers", FieldType::entity("Card").set()))
                .entity("Card", |t| {
                    t.field("title", FieldType::primitive(PrimitiveKind::Text))
                        .field("next", FieldType::entity("Card"))
                        .field("tags", FieldType::primitive(PrimitiveKind::Text).set())
                })
                .build()
                .expect("registry"),
        );
        let schema = Schema::discover(Arc::clone(&registry), "Board").expect("schema");
        (schema, Graph::new(registry))
    }

    #[test]
    fn bfs_visits_each_entity_once_in_list_order() {
        let (schema, mut graph) = setup();
        let board = graph.create("Board").expect("board");
        let a = graph.create("Card").expect("a");
        let b = graph.create("Card").expect("b");
        let c = graph.create("Card").expect("c");
        graph.push(board, "lists", b).expect("push");
        graph.push(board, "lists", a).expect("push");
        graph.set(b, "next", c).expect("next");
        graph.set(c, "next", b).expect("cycle");

        let walker = GraphWalker::new(&schema, &graph);
        let order = walker.reachable_entities(board, false, true).expect("walk");
        assert_eq!(order, vec![b, a, c]);

        let with_root = walker.reachable_entities(board, true, true).expect("walk");
        assert_eq!(with_root.first(), Some(&board));
        assert_eq!(with_root.len(), 4);
    }

    #[test]
    fn unordered_entity_collection_rejected_when_deterministic() {
        let (schema, mut graph) = setup();
        let board = graph.create("Board").expect("board");
        let archive = graph.create("Archive").expect("archive");
        let a = graph.create("Card").expect("a");
        graph.set(board, "archive", archive).expect("archive");
        graph.push(archive, "watchers", a).expect("push");

        let walker = GraphWalker::new(&schema, &graph);
        assert!(matches!(
            walker.reachable_entities(board, true, true),
            Err(GraphError::NonDeterministicCollectionField { .. })
        ));
        assert_eq!(
            walker.reachable_entities(board, true, false).expect("walk").len(),
            3
        );
    }

    #[test]
    fn unordered_primitive_collection_is_sorted() {
        let (schema, mut graph) = setup();
        let card = graph.create("Card").expect("card");
        graph.push(card, "tags", "urgent").expect("push");
        graph.push(card, "tags", "bug").expect("push");

        let walker = GraphWalker::new(&schema, &graph);
        let targets = |deterministic| -> Vec<Entity> {
            walker
                .outgoing_edges(card, deterministic)
                .expect("edges")
                .into_iter()
                .map(|e| e.target)
                .collect()
        };
        assert_eq!(targets(true), vec![Entity::from("bug"), Entity::from("urgent")]);
        assert_eq!(targets(false), vec![Entity::from("urgent"), Entity::from("bug")]);
    }

    #[test]
    fn null_single_values_produce_no_edge() {
        let (schema, mut graph) = setup();
        let card = graph.create("Card").expect("card");
        graph.set(card, "title", "todo").expect("title");

        let walker = GraphWalker::new(&schema, &graph);
        let edges = walker.outgoing_edges(card, true).expect("edges");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].field.name, "title");
    }
}
