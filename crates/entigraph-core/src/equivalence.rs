//! # Equivalence Checker
//!
//! Identifier-independent structural comparison of two entity graphs.
//!
//! Both graphs are walked deterministically and their entities are paired
//! by position. Two graphs are equivalent when every pair has the same
//! runtime type, the same ordered primitive edges, and the same ordered
//! non-primitive edges, where an edge target on one side must be the
//! positional counterpart of the target on the other side.
//!
//! The check is sensitive to list order: `[A, B]` and `[B, A]` are not
//! equivalent.

use crate::graph::{Entity, Graph, ObjectId};
use crate::schema::Schema;
use crate::state::State;
use crate::walker::{Edge, GraphWalker};
use crate::GraphError;
use std::collections::HashMap;

/// Compare the graphs rooted at `a` and `b` under one schema.
///
/// Fails with `NonDeterministicCollectionField` if either graph holds an
/// unordered collection of non-primitive entities.
pub fn equivalent(
    schema: &Schema,
    a: (&Graph, ObjectId),
    b: (&Graph, ObjectId),
) -> Result<bool, GraphError> {
    let (graph_a, root_a) = a;
    let (graph_b, root_b) = b;
    let walker_a = GraphWalker::new(schema, graph_a);
    let walker_b = GraphWalker::new(schema, graph_b);

    let order_a = walker_a.reachable_entities(root_a, true, true)?;
    let order_b = walker_b.reachable_entities(root_b, true, true)?;
    if order_a.len() != order_b.len() {
        return Ok(false);
    }

    let pairing: HashMap<ObjectId, ObjectId> = order_a
        .iter()
        .copied()
        .zip(order_b.iter().copied())
        .collect();

    for (left, right) in order_a.iter().zip(&order_b) {
        if graph_a.type_of(*left)? != graph_b.type_of(*right)? {
            return Ok(false);
        }
        let edges_a = walker_a.outgoing_edges(*left, true)?;
        let edges_b = walker_b.outgoing_edges(*right, true)?;

        let (prims_a, objs_a) = split(&edges_a);
        let (prims_b, objs_b) = split(&edges_b);
        if prims_a != prims_b || objs_a.len() != objs_b.len() {
            return Ok(false);
        }
        let objects_match = objs_a.iter().zip(&objs_b).all(|((fa, ta), (fb, tb))| {
            fa == fb && pairing.get(ta) == Some(tb)
        });
        if !objects_match {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Compare the root graphs of two States.
///
/// Identifiers are never consulted, so a State and its deep copy compare
/// equal even after their identifier assignments diverge.
pub fn states_equivalent(a: &State, b: &State) -> Result<bool, GraphError> {
    equivalent(a.schema(), (a.graph(), a.root()), (b.graph(), b.root()))
}

type FieldKey<'a> = (&'a str, &'a str);

/// Primitive edges as `(field, value)`, object edges as `(field, target)`.
fn split<'e>(
    edges: &'e [Edge<'_>],
) -> (Vec<(FieldKey<'e>, &'e Entity)>, Vec<(FieldKey<'e>, ObjectId)>) {
    let mut prims = Vec::new();
    let mut objs = Vec::new();
    for edge in edges {
        let key = (edge.field.declaring_type.as_str(), edge.field.name.as_str());
        match edge.target {
            Entity::Object(target) => objs.push((key, target)),
            Entity::Primitive(_) => prims.push((key, &edge.target)),
        }
    }
    (prims, objs)
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

    fn schema() -> Schema {
        let registry = Arc::new(
            TypeRegistry::builder()
                .entity("Company", |t| {
                    t.field("employees", FieldType::entity("Employee").list())
                })
                .entity("Employee", |t| {
                    t.field("salary", FieldType::primitive(PrimitiveKind::Integer))
                        .field("manager", FieldType::entity("Employee"))
                })
                .entity("Contractor", |t| t.extends("Employee"))
                .build()
                .expect("registry"),
        );
        Schema::discover(registry, "Company").expect("schema")
    }

    /// Company [A, B] with B managed by A. Slots are allocated in `order`.
    fn build(schema: &Schema, b_first: bool, b_type: &str) -> (Graph, ObjectId, ObjectId, ObjectId) {
        let mut graph = Graph::new(Arc::clone(schema.registry()));
        let (a, b, root) = if b_first {
            let b = graph.create(b_type).expect("b");
            let a = graph.create("Employee").expect("a");
            (a, b, graph.create("Company").expect("root"))
        } else {
            let root = graph.create("Company").expect("root");
            let a = graph.create("Employee").expect("a");
            (a, graph.create(b_type).expect("b"), root)
        };
        graph.set(a, "salary", 100i64).expect("salary");
        graph.set(b, "salary", 80i64).expect("salary");
        graph.set(b, "manager", a).expect("manager");
        graph.push(root, "employees", a).expect("push");
        graph.push(root, "employees", b).expect("push");
        (graph, root, a, b)
    }

    #[test]
    fn independent_isomorphic_graphs_are_equivalent() {
        let schema = schema();
        let (g1, r1, _, _) = build(&schema, false, "Employee");
        let (mut g2, r2, _, b2) = build(&schema, true, "Employee");
        assert!(equivalent(&schema, (&g1, r1), (&g2, r2)).expect("equiv"));

        g2.set(b2, "salary", 81i64).expect("raise");
        assert!(!equivalent(&schema, (&g1, r1), (&g2, r2)).expect("equiv"));
    }

    #[test]
    fn list_order_matters() {
        let schema = schema();
        let (g1, r1, _, _) = build(&schema, false, "Employee");
        let (mut g2, r2, a2, b2) = build(&schema, false, "Employee");
        g2.set_many(r2, "employees", vec![Entity::Object(b2), Entity::Object(a2)])
            .expect("reorder");
        assert!(!equivalent(&schema, (&g1, r1), (&g2, r2)).expect("equiv"));
    }

    #[test]
    fn edge_targets_must_be_paired_counterparts() {
        let schema = schema();
        let (g1, r1, _, _) = build(&schema, false, "Employee");
        // Same shape and values, but B manages itself instead of being
        // managed by A.
        let (mut g2, r2, a2, b2) = build(&schema, false, "Employee");
        g2.remove(b2, "manager", a2).expect("unset");
        g2.set(b2, "manager", b2).expect("self");
        assert!(!equivalent(&schema, (&g1, r1), (&g2, r2)).expect("equiv"));
    }

    #[test]
    fn runtime_types_must_agree() {
        let schema = schema();
        let (g1, r1, _, _) = build(&schema, false, "Employee");
        let (g2, r2, _, _) = build(&schema, false, "Contractor");
        assert!(!equivalent(&schema, (&g1, r1), (&g2, r2)).expect("equiv"));
    }

    #[test]
    fn state_and_copy_are_equivalent() {
        let schema = Arc::new(schema());
        let (graph, root, _, _) = build(&schema, true, "Employee");
        let state = State::new(Arc::clone(&schema), graph, root).expect("state");
        let copy = state.deep_copy().expect("copy");
        assert!(states_equivalent(&state, &state).expect("reflexive"));
        assert!(states_equivalent(&state, &copy).expect("copy"));
    }
}
