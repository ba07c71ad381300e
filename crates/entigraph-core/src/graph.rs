//! # Entity Graph
//!
//! Arena storage for the non-primitive entities of one domain graph.
//!
//! Every non-primitive entity occupies a slot addressed by an [`ObjectId`].
//! Relation edges store slot ids, never references, so "same entity" is
//! "same slot" and an aliasing-preserving copy is a slot remap. All maps are
//! `BTreeMap` for deterministic iteration.

use crate::registry::{Cardinality, FieldDef, FieldType, TypeRegistry, ValueType};
use crate::{GraphError, Primitive};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

pub use crate::types::ObjectId;

// =============================================================================
// ENTITIES & FIELD VALUES
// =============================================================================

/// A node of the domain graph as seen from an edge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Entity {
    /// A scalar value (or `Null` for absence); value identity.
    Primitive(Primitive),
    /// A domain object; reference identity.
    Object(ObjectId),
}

impl Entity {
    /// The absent value.
    #[must_use]
    pub const fn null() -> Self {
        Self::Primitive(Primitive::Null)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Null))
    }

    #[must_use]
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Self::Object(id) => Some(*id),
            Self::Primitive(_) => None,
        }
    }

    #[must_use]
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Self::Primitive(p) => Some(p),
            Self::Object(_) => None,
        }
    }
}

impl From<ObjectId> for Entity {
    fn from(id: ObjectId) -> Self {
        Self::Object(id)
    }
}

impl From<Primitive> for Entity {
    fn from(p: Primitive) -> Self {
        Self::Primitive(p)
    }
}

impl From<i64> for Entity {
    fn from(v: i64) -> Self {
        Self::Primitive(v.into())
    }
}

impl From<f64> for Entity {
    fn from(v: f64) -> Self {
        Self::Primitive(v.into())
    }
}

impl From<bool> for Entity {
    fn from(v: bool) -> Self {
        Self::Primitive(v.into())
    }
}

impl From<&str> for Entity {
    fn from(v: &str) -> Self {
        Self::Primitive(v.into())
    }
}

impl From<String> for Entity {
    fn from(v: String) -> Self {
        Self::Primitive(v.into())
    }
}

/// Stored value of one relation field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    One(Entity),
    Many(Vec<Entity>),
}

impl FieldValue {
    fn empty_for(ty: &FieldType) -> Self {
        match ty.cardinality {
            Cardinality::One => Self::One(Entity::null()),
            Cardinality::List | Cardinality::Set => Self::Many(Vec::new()),
        }
    }

    /// Every stored entity, `Null` included, in storage order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        let (one, many) = match self {
            Self::One(e) => (Some(e), None),
            Self::Many(v) => (None, Some(v.iter())),
        };
        one.into_iter().chain(many.into_iter().flatten())
    }

    fn entities_mut(&mut self) -> Box<dyn Iterator<Item = &mut Entity> + '_> {
        match self {
            Self::One(e) => Box::new(std::iter::once(e)),
            Self::Many(v) => Box::new(v.iter_mut()),
        }
    }
}

/// A non-primitive entity: its runtime type plus one value per declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    type_name: String,
    fields: BTreeMap<String, FieldValue>,
}

impl Node {
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

fn slot_index(len: usize) -> Result<u32, GraphError> {
    u32::try_from(len).map_err(|_| GraphError::ArenaExhausted)
}

// =============================================================================
// GRAPH
// =============================================================================

/// Arena of non-primitive entities bound to one type registry.
///
/// Mutators check every value against the registry, so a graph only ever
/// holds well-typed edges. Slots are never reused: removing an entity from
/// every relation leaves its slot allocated but unreachable.
#[derive(Clone)]
pub struct Graph {
    registry: Arc<TypeRegistry>,
    nodes: BTreeMap<ObjectId, Node>,
    next_object_id: u32,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.nodes.len())
            .field("next_object_id", &self.next_object_id)
            .finish()
    }
}

impl Graph {
    /// Create an empty graph for the given domain.
    #[must_use]
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            nodes: BTreeMap::new(),
            next_object_id: 0,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Allocate a new entity of `type_name` with every field empty.
    pub fn create(&mut self, type_name: &str) -> Result<ObjectId, GraphError> {
        self.registry.require(type_name)?;
        let fields = self
            .registry
            .all_fields(type_name)
            .into_iter()
            .map(|(_, f)| (f.name.clone(), FieldValue::empty_for(&f.ty)))
            .collect();

        let id = ObjectId(self.next_object_id);
        self.next_object_id = self
            .next_object_id
            .checked_add(1)
            .ok_or(GraphError::ArenaExhausted)?;
        self.nodes.insert(
            id,
            Node {
                type_name: type_name.to_string(),
                fields,
            },
        );
        Ok(id)
    }

    #[must_use]
    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of allocated slots, reachable or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: ObjectId) -> Result<&Node, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::DanglingObject(id))
    }

    /// Runtime type of an entity.
    pub fn type_of(&self, id: ObjectId) -> Result<&str, GraphError> {
        Ok(self.node(id)?.type_name())
    }

    /// Stored value of a field.
    pub fn get(&self, id: ObjectId, field: &str) -> Result<&FieldValue, GraphError> {
        let node = self.node(id)?;
        node.fields
            .get(field)
            .ok_or_else(|| GraphError::UnknownField {
                type_name: node.type_name.clone(),
                field: field.to_string(),
            })
    }

    /// Value of a single-valued field.
    pub fn get_one(&self, id: ObjectId, field: &str) -> Result<&Entity, GraphError> {
        match self.get(id, field)? {
            FieldValue::One(e) => Ok(e),
            FieldValue::Many(_) => Err(self.malformed(id, field)),
        }
    }

    /// Elements of a collection field.
    pub fn get_many(&self, id: ObjectId, field: &str) -> Result<&[Entity], GraphError> {
        match self.get(id, field)? {
            FieldValue::Many(v) => Ok(v),
            FieldValue::One(_) => Err(self.malformed(id, field)),
        }
    }

    /// Referenced entity of a single-valued entity field, `None` when absent.
    pub fn get_object(&self, id: ObjectId, field: &str) -> Result<Option<ObjectId>, GraphError> {
        Ok(self.get_one(id, field)?.as_object())
    }

    /// Assign a single-valued field.
    pub fn set(
        &mut self,
        id: ObjectId,
        field: &str,
        value: impl Into<Entity>,
    ) -> Result<(), GraphError> {
        let value = value.into();
        let def = self.field_def(id, field)?;
        if def.ty.is_collection() {
            return Err(self.cardinality_mismatch(id, field, &def.ty, "single value"));
        }
        self.check_value(id, &def, &value)?;
        *self.slot_mut(id, field)? = FieldValue::One(value);
        Ok(())
    }

    /// Replace every element of a collection field.
    pub fn set_many(
        &mut self,
        id: ObjectId,
        field: &str,
        values: Vec<Entity>,
    ) -> Result<(), GraphError> {
        let def = self.field_def(id, field)?;
        if !def.ty.is_collection() {
            return Err(self.cardinality_mismatch(id, field, &def.ty, "collection"));
        }
        let mut deduped: Vec<Entity> = Vec::with_capacity(values.len());
        for value in values {
            self.check_value(id, &def, &value)?;
            if def.ty.cardinality == Cardinality::Set && deduped.contains(&value) {
                continue;
            }
            deduped.push(value);
        }
        *self.slot_mut(id, field)? = FieldValue::Many(deduped);
        Ok(())
    }

    /// Append to a collection field. Sets ignore duplicates.
    ///
    /// Returns whether the value was added.
    pub fn push(
        &mut self,
        id: ObjectId,
        field: &str,
        value: impl Into<Entity>,
    ) -> Result<bool, GraphError> {
        let value = value.into();
        let def = self.field_def(id, field)?;
        if !def.ty.is_collection() {
            return Err(self.cardinality_mismatch(id, field, &def.ty, "collection"));
        }
        self.check_value(id, &def, &value)?;
        let is_set = def.ty.cardinality == Cardinality::Set;
        match self.slot_mut(id, field)? {
            FieldValue::Many(items) => {
                if is_set && items.contains(&value) {
                    return Ok(false);
                }
                items.push(value);
                Ok(true)
            }
            FieldValue::One(_) => Err(self.malformed(id, field)),
        }
    }

    /// Remove the first occurrence of `value` from a field.
    ///
    /// On a single-valued field a matching value is reset to `Null`.
    /// Returns whether anything was removed.
    pub fn remove(
        &mut self,
        id: ObjectId,
        field: &str,
        value: impl Into<Entity>,
    ) -> Result<bool, GraphError> {
        let value = value.into();
        match self.slot_mut(id, field)? {
            FieldValue::One(current) => {
                if *current == value && !current.is_null() {
                    *current = Entity::null();
                    return Ok(true);
                }
                Ok(false)
            }
            FieldValue::Many(items) => match items.iter().position(|e| *e == value) {
                Some(pos) => {
                    items.remove(pos);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// Copy the subgraph reachable from `root` into a fresh arena.
    ///
    /// New slots are allocated in breadth-first order from `root`, which
    /// lands at `ObjectId(0)`. Every edge is rewritten through the returned
    /// old-to-new map, so two fields sharing an entity in `self` share the
    /// copied entity in the result.
    pub fn copy_reachable(
        &self,
        root: ObjectId,
    ) -> Result<(Graph, BTreeMap<ObjectId, ObjectId>), GraphError> {
        let mut remap = BTreeMap::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();

        self.node(root)?;
        remap.insert(root, ObjectId(0));
        queue.push_back(root);

        while let Some(current) = queue.pop_front() {
            order.push(current);
            for value in self.node(current)?.fields.values() {
                for target in value.entities().filter_map(Entity::as_object) {
                    if !remap.contains_key(&target) {
                        self.node(target)?;
                        remap.insert(target, ObjectId(slot_index(remap.len())?));
                        queue.push_back(target);
                    }
                }
            }
        }

        let mut copy = Graph::new(Arc::clone(&self.registry));
        for old in order {
            let mut node = self.node(old)?.clone();
            for value in node.fields.values_mut() {
                for entity in value.entities_mut() {
                    if let Entity::Object(target) = entity {
                        let moved = remap.get(&*target).ok_or(GraphError::DanglingObject(*target))?;
                        *target = *moved;
                    }
                }
            }
            let slot = remap.get(&old).ok_or(GraphError::DanglingObject(old))?;
            copy.nodes.insert(*slot, node);
        }
        copy.next_object_id = slot_index(remap.len())?;
        Ok((copy, remap))
    }

    fn field_def(&self, id: ObjectId, field: &str) -> Result<FieldDef, GraphError> {
        let type_name = self.type_of(id)?;
        let (_, def) = self.registry.field(type_name, field)?;
        Ok(def.clone())
    }

    fn slot_mut(&mut self, id: ObjectId, field: &str) -> Result<&mut FieldValue, GraphError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(GraphError::DanglingObject(id))?;
        let type_name = &node.type_name;
        match node.fields.get_mut(field) {
            Some(slot) => Ok(slot),
            None => Err(GraphError::UnknownField {
                type_name: type_name.clone(),
                field: field.to_string(),
            }),
        }
    }

    fn check_value(&self, id: ObjectId, def: &FieldDef, value: &Entity) -> Result<(), GraphError> {
        let fits = match (&def.ty.value, value) {
            (_, e) if e.is_null() => true,
            (ValueType::Primitive(kind), Entity::Primitive(p)) => p.is_assignable_to(kind),
            (ValueType::Entity(expected), Entity::Object(target)) => {
                let actual = self.type_of(*target)?;
                self.registry.is_assignable(actual, expected)
            }
            _ => false,
        };
        if fits {
            return Ok(());
        }
        let found = match value {
            Entity::Primitive(p) => p.kind_name(),
            Entity::Object(target) => self.type_of(*target)?.to_string(),
        };
        Err(GraphError::FieldTypeMismatch {
            type_name: self.type_of(id)?.to_string(),
            field: def.name.clone(),
            expected: def.ty.value.to_string(),
            found,
        })
    }

    fn cardinality_mismatch(
        &self,
        id: ObjectId,
        field: &str,
        declared: &FieldType,
        found: &str,
    ) -> GraphError {
        GraphError::FieldTypeMismatch {
            type_name: self.type_of(id).unwrap_or_default().to_string(),
            field: field.to_string(),
            expected: declared.to_string(),
            found: found.to_string(),
        }
    }

    fn malformed(&self, id: ObjectId, field: &str) -> GraphError {
        GraphError::MalformedField {
            type_name: self.type_of(id).unwrap_or_default().to_string(),
            field: field.to_string(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimitiveKind;

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(
            TypeRegistry::builder()
                .entity("Team", |t| {
                    t.field("members", FieldType::entity("Person").list())
                        .field("lead", FieldType::entity("Person"))
                        .field("tags", FieldType::primitive(PrimitiveKind::Text).set())
                })
                .entity("Person", |t| {
                    t.field("name", FieldType::primitive(PrimitiveKind::Text))
                        .field("age", FieldType::primitive(PrimitiveKind::Integer))
                })
                .entity("Robot", |t| t)
                .build()
                .expect("registry"),
        )
    }

    #[test]
    fn create_initializes_empty_fields() {
        let mut graph = Graph::new(registry());
        let team = graph.create("Team").expect("create");

        assert!(graph.get_one(team, "lead").expect("lead").is_null());
        assert!(graph.get_many(team, "members").expect("members").is_empty());
        assert!(matches!(
            graph.create("Planet"),
            Err(GraphError::UnknownType(_))
        ));
    }

    #[test]
    fn set_checks_declared_types() {
        let mut graph = Graph::new(registry());
        let team = graph.create("Team").expect("create");
        let alice = graph.create("Person").expect("create");
        let robot = graph.create("Robot").expect("create");

        graph.set(alice, "age", 30i64).expect("age");
        assert!(matches!(
            graph.set(alice, "age", "thirty"),
            Err(GraphError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            graph.set(team, "lead", robot),
            Err(GraphError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            graph.set(team, "members", alice),
            Err(GraphError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            graph.set(alice, "height", 180i64),
            Err(GraphError::UnknownField { .. })
        ));
    }

    #[test]
    fn set_fields_ignore_duplicates() {
        let mut graph = Graph::new(registry());
        let team = graph.create("Team").expect("create");

        assert!(graph.push(team, "tags", "infra").expect("push"));
        assert!(!graph.push(team, "tags", "infra").expect("push"));
        assert_eq!(graph.get_many(team, "tags").expect("tags").len(), 1);
    }

    #[test]
    fn remove_from_list_and_single() {
        let mut graph = Graph::new(registry());
        let team = graph.create("Team").expect("create");
        let a = graph.create("Person").expect("create");
        let b = graph.create("Person").expect("create");
        graph.push(team, "members", a).expect("push");
        graph.push(team, "members", b).expect("push");
        graph.set(team, "lead", a).expect("lead");

        assert!(graph.remove(team, "members", a).expect("remove"));
        assert!(!graph.remove(team, "members", a).expect("remove"));
        assert_eq!(
            graph.get_many(team, "members").expect("members"),
            &[Entity::Object(b)]
        );

        assert!(graph.remove(team, "lead", a).expect("remove"));
        assert_eq!(graph.get_object(team, "lead").expect("lead"), None);
    }

    #[test]
    fn copy_reachable_preserves_aliasing() {
        let mut graph = Graph::new(registry());
        let team = graph.create("Team").expect("create");
        let _orphan = graph.create("Person").expect("create");
        let shared = graph.create("Person").expect("create");
        graph.push(team, "members", shared).expect("push");
        graph.set(team, "lead", shared).expect("lead");

        let (copy, remap) = graph.copy_reachable(team).expect("copy");

        assert_eq!(copy.node_count(), 2);
        let new_team = remap[&team];
        let via_list = copy.get_many(new_team, "members").expect("members")[0].as_object();
        let via_lead = copy.get_object(new_team, "lead").expect("lead");
        assert_eq!(via_list, via_lead);
        assert_eq!(via_lead, Some(remap[&shared]));
    }

    #[test]
    fn copy_is_independent() {
        let mut graph = Graph::new(registry());
        let team = graph.create("Team").expect("create");
        let a = graph.create("Person").expect("create");
        graph.push(team, "members", a).expect("push");
        graph.set(a, "name", "Ada").expect("name");

        let (mut copy, remap) = graph.copy_reachable(team).expect("copy");
        copy.set(remap[&a], "name", "Grace").expect("rename");

        assert_eq!(
            graph.get_one(a, "name").expect("name"),
            &Entity::from("Ada")
        );
    }

    #[test]
    fn create_fails_when_slots_run_out() {
        let mut graph = Graph::new(registry());
        graph.next_object_id = u32::MAX - 1;
        let last = graph.create("Person").expect("last slot");
        assert_eq!(last, ObjectId(u32::MAX - 1));

        assert!(matches!(graph.create("Person"), Err(GraphError::ArenaExhausted)));
        assert_eq!(graph.node_count(), 1);
    }
}
