//! # Schema Discovery
//!
//! Computes, once per domain, everything reachable from a root entity type:
//! the entity types, their relation fields, their invocable operations and a
//! collision-free friendly-id table for the operations.
//!
//! Discovery is a depth-first closure over field target types with a
//! visited set, so cyclic schemas (an employee pointing at its manager)
//! terminate. The result is stored immutably; nothing is computed lazily.
//!
//! ## Orders
//!
//! Fields and operations are kept twice: in declaration order (inherited
//! members first) and in canonical order, sorted by
//! `(declaring type, name)`. Deterministic consumers must use the canonical
//! order; the grounding layer relies on it for byte-stable output.

use crate::primitives::FRIENDLY_ID_SUFFIX_START;
use crate::registry::{FieldType, OperationBody, TypeRegistry};
use crate::GraphError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// RELATION FIELDS & OPERATIONS
// =============================================================================

/// A relation field as seen by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelationField {
    /// Type that declares the field (an ancestor for inherited fields).
    pub declaring_type: String,
    pub name: String,
    pub ty: FieldType,
}

impl RelationField {
    /// Target type, if the field points at non-primitive entities.
    #[must_use]
    pub fn target_type(&self) -> Option<&str> {
        self.ty.entity_type()
    }

    fn canonical_key(&self) -> (&str, &str) {
        (&self.declaring_type, &self.name)
    }
}

impl fmt::Display for RelationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.declaring_type, self.name, self.ty)
    }
}

/// Identity of an operation: declaring type, name and parameter signature.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId {
    pub declaring_type: String,
    pub name: String,
    pub params: Vec<FieldType>,
}

impl OperationId {
    #[must_use]
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        params: Vec<FieldType>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            params,
        }
    }
}

/// Canonical unique string: `Type.name(P1, P2)`.
impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.declaring_type, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

/// An invocable operation: its identity plus its body.
#[derive(Clone)]
pub struct OperationSchema {
    pub id: OperationId,
    pub body: OperationBody,
}

impl fmt::Debug for OperationSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationSchema")
            .field("id", &self.id)
            .finish()
    }
}

/// Relation fields and operations of one reachable entity type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    pub name: String,
    fields: Vec<RelationField>,
    canonical_fields: Vec<RelationField>,
    operations: Vec<OperationSchema>,
    canonical_operations: Vec<OperationSchema>,
}

impl EntitySchema {
    /// Relation fields, canonical order when `deterministic`.
    #[must_use]
    pub fn fields(&self, deterministic: bool) -> &[RelationField] {
        if deterministic {
            &self.canonical_fields
        } else {
            &self.fields
        }
    }

    /// Invocable operations, canonical order when `deterministic`.
    #[must_use]
    pub fn operations(&self, deterministic: bool) -> &[OperationSchema] {
        if deterministic {
            &self.canonical_operations
        } else {
            &self.operations
        }
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&RelationField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

// =============================================================================
// SCHEMA
// =============================================================================

/// Discovered shape of a domain, rooted at one entity type.
#[derive(Debug, Clone)]
pub struct Schema {
    root: String,
    registry: Arc<TypeRegistry>,
    types: BTreeMap<String, EntitySchema>,
    discovery_order: Vec<String>,
    friendly_ids: BTreeMap<OperationId, String>,
    by_friendly_id: BTreeMap<String, OperationId>,
}

impl Schema {
    /// Discover the schema reachable from `root`.
    ///
    /// Besides field targets, the closure includes the ancestors of every
    /// reachable type (their members are inherited) and every registered
    /// subtype (a field typed `Person` may hold an `Employee`).
    ///
    /// Fails fast with `InvalidOperationSignature` if an operation declares
    /// a parameter that is neither a primitive kind nor a registered entity
    /// type.
    pub fn discover(registry: Arc<TypeRegistry>, root: &str) -> Result<Self, GraphError> {
        registry.require(root)?;

        let mut visited = BTreeSet::new();
        let mut discovery_order = Vec::new();
        let mut stack = vec![root.to_string()];

        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            let def = registry.require(&current)?;
            discovery_order.push(current.clone());

            let mut frontier: Vec<String> = Vec::new();
            frontier.extend(def.parent.iter().cloned());
            frontier.extend(
                registry
                    .all_fields(&current)
                    .into_iter()
                    .filter_map(|(_, f)| f.ty.entity_type().map(str::to_string)),
            );
            frontier.extend(
                registry
                    .direct_subtypes(&current)
                    .into_iter()
                    .map(str::to_string),
            );
            // Reverse so the first declared target is explored first.
            for next in frontier.into_iter().rev() {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }

        let mut types = BTreeMap::new();
        for name in &discovery_order {
            types.insert(name.clone(), Self::entity_schema(&registry, name)?);
        }

        let (friendly_ids, by_friendly_id) = Self::assign_friendly_ids(&types);

        tracing::debug!(
            root,
            types = discovery_order.len(),
            operations = friendly_ids.len(),
            "schema discovered"
        );

        Ok(Self {
            root: root.to_string(),
            registry,
            types,
            discovery_order,
            friendly_ids,
            by_friendly_id,
        })
    }

    fn entity_schema(registry: &TypeRegistry, name: &str) -> Result<EntitySchema, GraphError> {
        let fields: Vec<RelationField> = registry
            .all_fields(name)
            .into_iter()
            .map(|(declaring, f)| RelationField {
                declaring_type: declaring.to_string(),
                name: f.name.clone(),
                ty: f.ty.clone(),
            })
            .collect();

        let mut operations = Vec::new();
        for (declaring, op) in registry.all_operations(name) {
            let id = OperationId::new(declaring, op.name.clone(), op.params.clone());
            for param in &op.params {
                if let Some(target) = param.entity_type() {
                    if registry.get(target).is_none() {
                        return Err(GraphError::InvalidOperationSignature {
                            operation: id.to_string(),
                            reason: format!("parameter type {target} is not an entity type"),
                        });
                    }
                }
            }
            operations.push(OperationSchema {
                id,
                body: Arc::clone(&op.body),
            });
        }

        let mut canonical_fields = fields.clone();
        canonical_fields.sort_by(|a, b| a.canonical_key().cmp(&b.canonical_key()));
        let mut canonical_operations = operations.clone();
        canonical_operations.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(EntitySchema {
            name: name.to_string(),
            fields,
            canonical_fields,
            operations,
            canonical_operations,
        })
    }

    /// Assign `Type.name`, disambiguating collisions with a numeric suffix.
    ///
    /// Operations are visited sorted by their canonical string, so the table
    /// is identical across runs.
    fn assign_friendly_ids(
        types: &BTreeMap<String, EntitySchema>,
    ) -> (BTreeMap<OperationId, String>, BTreeMap<String, OperationId>) {
        let unique: BTreeSet<&OperationId> = types
            .values()
            .flat_map(|t| t.operations.iter().map(|op| &op.id))
            .collect();
        let mut sorted: Vec<&OperationId> = unique.into_iter().collect();
        sorted.sort_by_key(|id| id.to_string());

        let mut forward = BTreeMap::new();
        let mut backward = BTreeMap::new();
        for id in sorted {
            let base = format!("{}.{}", id.declaring_type, id.name);
            let mut candidate = base.clone();
            let mut suffix = FRIENDLY_ID_SUFFIX_START;
            while backward.contains_key(&candidate) {
                candidate = format!("{base}{suffix}");
                suffix += 1;
            }
            backward.insert(candidate.clone(), id.clone());
            forward.insert(id.clone(), candidate);
        }
        (forward, backward)
    }

    /// Name of the root entity type.
    #[must_use]
    pub fn root_type(&self) -> &str {
        &self.root
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Reachable entity types; sorted by name when `deterministic`,
    /// discovery order otherwise.
    #[must_use]
    pub fn reachable_types(&self, include_root: bool, deterministic: bool) -> Vec<&str> {
        let names: Vec<&str> = if deterministic {
            self.types.keys().map(String::as_str).collect()
        } else {
            self.discovery_order.iter().map(String::as_str).collect()
        };
        names
            .into_iter()
            .filter(|name| include_root || *name != self.root)
            .collect()
    }

    /// Schema of one reachable type.
    pub fn entity(&self, type_name: &str) -> Result<&EntitySchema, GraphError> {
        self.types
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownType(type_name.to_string()))
    }

    /// Relation fields of a type.
    pub fn fields(&self, type_name: &str, deterministic: bool) -> Result<&[RelationField], GraphError> {
        Ok(self.entity(type_name)?.fields(deterministic))
    }

    /// Every operation declared on a reachable type, each listed once under
    /// its declaring type, canonical order when `deterministic`.
    #[must_use]
    pub fn all_operations(&self, deterministic: bool) -> Vec<&OperationSchema> {
        let mut seen = BTreeSet::new();
        let mut ops = Vec::new();
        let order: Vec<&String> = if deterministic {
            self.types.keys().collect()
        } else {
            self.discovery_order.iter().collect()
        };
        for name in order {
            if let Some(entity) = self.types.get(name) {
                for op in entity.operations(deterministic) {
                    if seen.insert(&op.id) {
                        ops.push(op);
                    }
                }
            }
        }
        if deterministic {
            ops.sort_by(|a, b| a.id.cmp(&b.id));
        }
        ops
    }

    /// Look up an operation by identity.
    pub fn operation(&self, id: &OperationId) -> Result<&OperationSchema, GraphError> {
        self.types
            .get(&id.declaring_type)
            .and_then(|t| t.operations.iter().find(|op| op.id == *id))
            .ok_or_else(|| GraphError::UnknownOperation(id.to_string()))
    }

    /// Friendly id of an operation.
    #[must_use]
    pub fn friendly_id(&self, id: &OperationId) -> Option<&str> {
        self.friendly_ids.get(id).map(String::as_str)
    }

    /// Operation registered under a friendly id.
    pub fn operation_by_friendly_id(&self, friendly: &str) -> Result<&OperationSchema, GraphError> {
        let id = self
            .by_friendly_id
            .get(friendly)
            .ok_or_else(|| GraphError::UnknownOperation(friendly.to_string()))?;
        self.operation(id)
    }

    /// The whole friendly-id table, sorted by friendly id.
    pub fn friendly_ids(&self) -> impl Iterator<Item = (&str, &OperationId)> {
        self.by_friendly_id.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether an entity of type `sub` may stand where `sup` is expected.
    #[must_use]
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        self.registry.is_assignable(sub, sup)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Graph, ObjectId};
    use crate::registry::{ArgValue, OperationError};
    use crate::PrimitiveKind;

    fn noop(_: &mut Graph, _: ObjectId, _: &[ArgValue]) -> Result<(), OperationError> {
        Ok(())
    }

    fn org() -> Arc<TypeRegistry> {
        Arc::new(
            TypeRegistry::builder()
                .entity("Company", |t| {
                    t.field("employees", FieldType::entity("Employee").list())
                        .field("name", FieldType::primitive(PrimitiveKind::Text))
                        .operation("hire", vec![FieldType::primitive(PrimitiveKind::Text)], noop)
                        .operation("fire", vec![FieldType::entity("Employee")], noop)
                        .operation(
                            "fire",
                            vec![FieldType::entity("Employee").list()],
                            noop,
                        )
                })
                .entity("Employee", |t| {
                    t.field("manager", FieldType::entity("Employee"))
                        .field("salary", FieldType::primitive(PrimitiveKind::Integer))
                })
                .entity("Unrelated", |t| t)
                .build()
                .expect("registry"),
        )
    }

    #[test]
    fn discovers_reachable_types_only() {
        let schema = Schema::discover(org(), "Company").expect("discover");
        assert_eq!(schema.reachable_types(false, true), vec!["Employee"]);
        assert_eq!(schema.reachable_types(true, false), vec!["Company", "Employee"]);
    }

    #[test]
    fn cyclic_field_terminates_and_is_recorded() {
        let schema = Schema::discover(org(), "Company").expect("discover");
        let manager = schema
            .entity("Employee")
            .expect("employee")
            .field("manager")
            .expect("manager");
        assert_eq!(manager.target_type(), Some("Employee"));
    }

    #[test]
    fn canonical_field_order_is_sorted() {
        let schema = Schema::discover(org(), "Company").expect("discover");
        let declared: Vec<_> = schema
            .fields("Company", false)
            .expect("fields")
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        let canonical: Vec<_> = schema
            .fields("Company", true)
            .expect("fields")
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(declared, vec!["employees", "name"]);
        assert_eq!(canonical, vec!["employees", "name"]);

        let employee: Vec<_> = schema
            .fields("Employee", true)
            .expect("fields")
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(employee, vec!["manager", "salary"]);
    }

    #[test]
    fn friendly_ids_disambiguate_overloads() {
        let schema = Schema::discover(org(), "Company").expect("discover");
        let table: Vec<(String, String)> = schema
            .friendly_ids()
            .map(|(f, id)| (f.to_string(), id.to_string()))
            .collect();
        assert_eq!(
            table,
            vec![
                ("Company.fire".to_string(), "Company.fire(Employee)".to_string()),
                (
                    "Company.fire2".to_string(),
                    "Company.fire(List<Employee>)".to_string()
                ),
                ("Company.hire".to_string(), "Company.hire(string)".to_string()),
            ]
        );
    }

    #[test]
    fn friendly_ids_are_stable_across_runs() {
        let a = Schema::discover(org(), "Company").expect("discover");
        let b = Schema::discover(org(), "Company").expect("discover");
        let ta: Vec<_> = a.friendly_ids().map(|(f, _)| f.to_string()).collect();
        let tb: Vec<_> = b.friendly_ids().map(|(f, _)| f.to_string()).collect();
        assert_eq!(ta, tb);
    }

    #[test]
    fn operation_with_unknown_parameter_type_fails() {
        let registry = Arc::new(
            TypeRegistry::builder()
                .entity("Root", |t| {
                    t.operation("launch", vec![FieldType::entity("Rocket")], noop)
                })
                .build()
                .expect("registry"),
        );
        assert!(matches!(
            Schema::discover(registry, "Root"),
            Err(GraphError::InvalidOperationSignature { .. })
        ));
    }

    #[test]
    fn subtypes_and_inherited_members_are_discovered() {
        let registry = Arc::new(
            TypeRegistry::builder()
                .entity("Zoo", |t| t.field("animals", FieldType::entity("Animal").list()))
                .entity("Animal", |t| {
                    t.field("name", FieldType::primitive(PrimitiveKind::Text))
                        .operation("feed", vec![], noop)
                })
                .entity("Lion", |t| {
                    t.extends("Animal")
                        .field("mane", FieldType::primitive(PrimitiveKind::Boolean))
                })
                .build()
                .expect("registry"),
        );
        let schema = Schema::discover(registry, "Zoo").expect("discover");

        assert_eq!(schema.reachable_types(false, true), vec!["Animal", "Lion"]);
        let lion_fields: Vec<_> = schema
            .fields("Lion", true)
            .expect("fields")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(lion_fields, vec!["Animal.name: string", "Lion.mane: bool"]);
        assert_eq!(schema.all_operations(true).len(), 1);
        assert_eq!(
            schema
                .friendly_id(&OperationId::new("Animal", "feed", vec![]))
                .expect("friendly"),
            "Animal.feed"
        );
    }

    #[test]
    fn unknown_root_fails() {
        assert!(matches!(
            Schema::discover(org(), "Nope"),
            Err(GraphError::UnknownType(_))
        ));
    }
}
