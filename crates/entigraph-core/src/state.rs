//! # State Manager
//!
//! A `State` owns one root entity graph and the identifier assignment for
//! everything reachable from its root.
//!
//! ## Identifier lifecycle
//!
//! - Identifiers are minted from a per-State monotonically increasing
//!   counter (`e1`, `e2`, ...).
//! - An entity that stays reachable across a recomputation keeps its id.
//! - An entity that becomes unreachable loses its id; the id is retired and
//!   never minted again by this State.
//!
//! ## Mutation protocol
//!
//! The State does not observe the graph. After mutating through
//! [`State::graph_mut`], the caller must call [`State::invalidate`] or
//! [`State::recompute_identifiers`]. Between `invalidate` and a successful
//! recompute the State is stale: id lookups and the triple store report
//! `StaleState` instead of answering from outdated data.
//!
//! A State is single-owner and has no interior locking. Concurrent
//! speculative work goes through [`State::deep_copy`].

use crate::graph::{Entity, Graph, ObjectId};
use crate::schema::Schema;
use crate::walker::GraphWalker;
use crate::{EntityId, GraphError, Primitive};
use crate::primitives::FIRST_ID;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// TRIPLES
// =============================================================================

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TripleObject {
    /// A non-primitive entity, by id.
    Entity(EntityId),
    /// A primitive value.
    Value(Primitive),
}

impl fmt::Display for TripleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "{id}"),
            Self::Value(Primitive::Text(s)) => write!(f, "{s:?}"),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

/// One normalized fact: `(subject, relation, object)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: EntityId,
    pub relation: String,
    pub object: TripleObject,
}

impl Triple {
    /// Whether `id` appears in subject or object position.
    #[must_use]
    pub fn mentions(&self, id: &EntityId) -> bool {
        self.subject == *id || self.object == TripleObject::Entity(id.clone())
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.relation, self.object)
    }
}

// =============================================================================
// STATE
// =============================================================================

/// A root entity graph plus its identifier assignment and triple store.
///
/// Note: State does NOT implement Clone. Use `deep_copy()`, which produces a
/// compact, aliasing-preserving copy that keeps the identifier assignment.
#[derive(Debug)]
pub struct State {
    schema: Arc<Schema>,
    graph: Graph,
    root: ObjectId,
    /// Slot -> id. Lookup only, never iterated for output.
    ids: HashMap<ObjectId, EntityId>,
    /// Id -> slot. Lookup only, never iterated for output.
    objects: HashMap<EntityId, ObjectId>,
    /// Breadth-first order of the last recomputation, root first.
    order: Vec<ObjectId>,
    next_id: u64,
    triples: Option<BTreeSet<Triple>>,
    stale: bool,
}

impl State {
    /// Create a State over `graph`, rooted at `root`, with a deterministic
    /// initial identifier assignment.
    pub fn new(schema: Arc<Schema>, graph: Graph, root: ObjectId) -> Result<Self, GraphError> {
        Self::with_mode(schema, graph, root, true)
    }

    /// Create a State, choosing the walk mode of the initial assignment.
    pub fn with_mode(
        schema: Arc<Schema>,
        graph: Graph,
        root: ObjectId,
        deterministic: bool,
    ) -> Result<Self, GraphError> {
        if !Arc::ptr_eq(schema.registry(), graph.registry()) {
            return Err(GraphError::InvalidRegistry(
                "graph and schema belong to different registries".to_string(),
            ));
        }
        let root_type = graph.type_of(root)?;
        if !schema.is_assignable(root_type, schema.root_type()) {
            return Err(GraphError::RootTypeMismatch {
                expected: schema.root_type().to_string(),
                found: root_type.to_string(),
            });
        }

        let mut state = Self {
            schema,
            graph,
            root,
            ids: HashMap::new(),
            objects: HashMap::new(),
            order: Vec::new(),
            next_id: FIRST_ID,
            triples: None,
            stale: true,
        };
        state.recompute_identifiers(deterministic)?;
        Ok(state)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the graph.
    ///
    /// The State is not notified; call `invalidate` or
    /// `recompute_identifiers` after mutating.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Slot of the root entity.
    #[must_use]
    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// Identifier of the root entity.
    pub fn root_id(&self) -> Result<&EntityId, GraphError> {
        self.id_of(self.root)
    }

    /// Value the counter will mint next.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Number of identified entities, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Identified entities in breadth-first order, root first.
    pub fn entities(&self) -> Result<Vec<(&EntityId, ObjectId)>, GraphError> {
        self.ensure_fresh()?;
        self.order
            .iter()
            .map(|obj| Ok((self.id_of(*obj)?, *obj)))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Resolve an identifier to its entity.
    pub fn resolve(&self, id: &EntityId) -> Result<ObjectId, GraphError> {
        self.ensure_fresh()?;
        self.objects
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownEntityId(id.clone()))
    }

    /// Identifier of a reachable entity.
    pub fn id_of(&self, entity: ObjectId) -> Result<&EntityId, GraphError> {
        self.ensure_fresh()?;
        self.ids
            .get(&entity)
            .ok_or_else(|| GraphError::EntityNotInState(entity.to_string()))
    }

    /// Mark the graph as mutated: drops the triple cache and blocks id
    /// lookups until the next recomputation.
    pub fn invalidate(&mut self) {
        self.triples = None;
        self.stale = true;
    }

    /// Recompute identifiers from a fresh breadth-first walk of the root.
    ///
    /// On error the State stays invalidated.
    pub fn recompute_identifiers(&mut self, deterministic: bool) -> Result<(), GraphError> {
        self.invalidate();

        let order = GraphWalker::new(&self.schema, &self.graph).reachable_entities(
            self.root,
            true,
            deterministic,
        )?;

        let mut ids = HashMap::with_capacity(order.len());
        let mut objects = HashMap::with_capacity(order.len());
        let mut minted = 0usize;
        for obj in &order {
            let id = match self.ids.get(obj) {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = EntityId::from_counter(self.next_id);
                    self.next_id = self.next_id.saturating_add(1);
                    minted += 1;
                    fresh
                }
            };
            objects.insert(id.clone(), *obj);
            ids.insert(*obj, id);
        }

        let kept = ids.len().saturating_sub(minted);
        let retired = self.ids.len().saturating_sub(kept);
        tracing::debug!(
            entities = ids.len(),
            minted,
            retired,
            deterministic,
            "identifiers recomputed"
        );

        self.ids = ids;
        self.objects = objects;
        self.order = order;
        self.stale = false;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Triples
    // -------------------------------------------------------------------------

    /// The triple store, materialized on first use and cached until the
    /// next invalidation.
    pub fn materialize_triples(&mut self) -> Result<&BTreeSet<Triple>, GraphError> {
        self.ensure_fresh()?;
        if self.triples.is_none() {
            let computed = self.compute_triples()?;
            self.triples = Some(computed);
        }
        self.triples.as_ref().ok_or(GraphError::StaleState)
    }

    /// The cached triple store, if it has been materialized.
    #[must_use]
    pub fn cached_triples(&self) -> Option<&BTreeSet<Triple>> {
        self.triples.as_ref()
    }

    fn compute_triples(&self) -> Result<BTreeSet<Triple>, GraphError> {
        let walker = GraphWalker::new(&self.schema, &self.graph);
        let mut triples = BTreeSet::new();
        for obj in &self.order {
            let subject = self.id_of(*obj)?;
            for edge in walker.outgoing_edges(*obj, false)? {
                let object = match edge.target {
                    Entity::Object(target) => TripleObject::Entity(self.id_of(target)?.clone()),
                    Entity::Primitive(value) => TripleObject::Value(value),
                };
                triples.insert(Triple {
                    subject: subject.clone(),
                    relation: edge.field.name.clone(),
                    object,
                });
            }
        }
        Ok(triples)
    }

    // -------------------------------------------------------------------------
    // Copying
    // -------------------------------------------------------------------------

    /// Independent copy of the reachable graph.
    ///
    /// The copy shares the schema, preserves aliasing (two edges to one
    /// entity still meet at one entity), keeps every identifier and the id
    /// counter, and carries over the triple cache since the ids agree.
    pub fn deep_copy(&self) -> Result<State, GraphError> {
        let (graph, remap) = self.graph.copy_reachable(self.root)?;

        let mut ids = HashMap::with_capacity(self.ids.len());
        let mut objects = HashMap::with_capacity(self.ids.len());
        for obj in &self.order {
            if let (Some(new_obj), Some(id)) = (remap.get(obj), self.ids.get(obj)) {
                ids.insert(*new_obj, id.clone());
                objects.insert(id.clone(), *new_obj);
            }
        }
        let order = self
            .order
            .iter()
            .filter_map(|obj| remap.get(obj).copied())
            .collect();
        let root = remap
            .get(&self.root)
            .copied()
            .ok_or(GraphError::DanglingObject(self.root))?;

        Ok(State {
            schema: Arc::clone(&self.schema),
            graph,
            root,
            ids,
            objects,
            order,
            next_id: self.next_id,
            triples: self.triples.clone(),
            stale: self.stale,
        })
    }

    fn ensure_fresh(&self) -> Result<(), GraphError> {
        if self.stale {
            Err(GraphError::StaleState)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
