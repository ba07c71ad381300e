//! # Domain Type Registry
//!
//! The explicit descriptor through which a domain author declares its entity
//! types. Nothing is discovered by introspection: every entity type, relation
//! field and invocable operation is registered here once, at startup, and
//! frozen by [`TypeRegistryBuilder::build`].
//!
//! ```
//! use entigraph_core::{FieldType, PrimitiveKind, TypeRegistry};
//!
//! let registry = TypeRegistry::builder()
//!     .entity("Company", |t| t.field("employees", FieldType::entity("Employee").list()))
//!     .entity("Employee", |t| {
//!         t.field("name", FieldType::primitive(PrimitiveKind::Text))
//!             .field("manager", FieldType::entity("Employee"))
//!     })
//!     .build()
//!     .expect("valid registry");
//!
//! assert!(registry.get("Employee").is_some());
//! ```

use crate::graph::{Graph, ObjectId};
use crate::{GraphError, Primitive, PrimitiveKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// FIELD TYPES
// =============================================================================

/// How many entities a relation field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Exactly one slot; `Null` marks absence.
    One,
    /// Ordered collection.
    List,
    /// Unordered collection without duplicates.
    Set,
}

/// Element type of a field or parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Primitive(PrimitiveKind),
    /// A non-primitive entity type, by registered name.
    Entity(String),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{kind}"),
            Self::Entity(name) => f.write_str(name),
        }
    }
}

/// Declared type of a relation field or operation parameter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub value: ValueType,
    pub cardinality: Cardinality,
}

impl FieldType {
    /// Single-valued primitive.
    #[must_use]
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            value: ValueType::Primitive(kind),
            cardinality: Cardinality::One,
        }
    }

    /// Single-valued reference to a non-primitive entity type.
    #[must_use]
    pub fn entity(type_name: impl Into<String>) -> Self {
        Self {
            value: ValueType::Entity(type_name.into()),
            cardinality: Cardinality::One,
        }
    }

    /// Turn this type into an ordered collection of the same element type.
    #[must_use]
    pub fn list(self) -> Self {
        Self {
            cardinality: Cardinality::List,
            ..self
        }
    }

    /// Turn this type into an unordered collection of the same element type.
    #[must_use]
    pub fn set(self) -> Self {
        Self {
            cardinality: Cardinality::Set,
            ..self
        }
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.cardinality != Cardinality::One
    }

    /// Single fields and lists have a stable element order; sets do not.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.cardinality != Cardinality::Set
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        matches!(self.value, ValueType::Primitive(_))
    }

    /// Target entity type name, if the element type is non-primitive.
    #[must_use]
    pub fn entity_type(&self) -> Option<&str> {
        match &self.value {
            ValueType::Entity(name) => Some(name),
            ValueType::Primitive(_) => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cardinality {
            Cardinality::One => write!(f, "{}", self.value),
            Cardinality::List => write!(f, "List<{}>", self.value),
            Cardinality::Set => write!(f, "Set<{}>", self.value),
        }
    }
}

// =============================================================================
// OPERATION BODIES
// =============================================================================

/// A resolved argument handed to an operation body.
///
/// Holds one value unless the corresponding parameter is collection-typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Primitives(Vec<Primitive>),
    Objects(Vec<ObjectId>),
}

impl ArgValue {
    /// The single entity of a non-collection entity parameter.
    pub fn object(&self) -> Result<ObjectId, OperationError> {
        match self {
            Self::Objects(ids) if ids.len() == 1 => Ok(ids[0]),
            _ => Err(OperationError::Failed(
                "expected exactly one entity argument".to_string(),
            )),
        }
    }

    /// The single value of a non-collection primitive parameter.
    pub fn primitive(&self) -> Result<&Primitive, OperationError> {
        match self {
            Self::Primitives(values) if values.len() == 1 => Ok(&values[0]),
            _ => Err(OperationError::Failed(
                "expected exactly one primitive argument".to_string(),
            )),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Primitives(v) => v.len(),
            Self::Objects(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How an operation body reports that it did not complete.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The call is semantically invalid for this state. Expected, frequent,
    /// never logged as a warning.
    #[error("invalid invocation: {0}")]
    Invalid(String),

    /// Any other failure inside the operation body.
    #[error("operation failed: {0}")]
    Failed(String),

    /// A graph contract violation raised while the body mutated the graph.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl OperationError {
    /// Shorthand for the invalid-invocation signal.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}

/// Body of an invocable operation: mutates the graph in place, starting from
/// the entity it is invoked on.
pub type OperationBody =
    Arc<dyn Fn(&mut Graph, ObjectId, &[ArgValue]) -> Result<(), OperationError> + Send + Sync>;

// =============================================================================
// DECLARATIONS
// =============================================================================

/// A declared relation field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

/// A declared invocable operation.
#[derive(Clone)]
pub struct OperationDef {
    pub name: String,
    pub params: Vec<FieldType>,
    pub body: OperationBody,
}

impl fmt::Debug for OperationDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// A declared non-primitive entity type.
#[derive(Debug, Clone)]
pub struct EntityTypeDef {
    pub name: String,
    pub parent: Option<String>,
    pub fields: Vec<FieldDef>,
    pub operations: Vec<OperationDef>,
}

// =============================================================================
// BUILDERS
// =============================================================================

/// Declares the members of one entity type.
#[derive(Debug)]
pub struct EntityTypeBuilder {
    def: EntityTypeDef,
}

impl EntityTypeBuilder {
    fn new(name: &str) -> Self {
        Self {
            def: EntityTypeDef {
                name: name.to_string(),
                parent: None,
                fields: Vec::new(),
                operations: Vec::new(),
            },
        }
    }

    /// Inherit fields and operations from `parent`.
    #[must_use]
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.def.parent = Some(parent.into());
        self
    }

    /// Declare a relation field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.def.fields.push(FieldDef {
            name: name.into(),
            ty,
        });
        self
    }

    /// Declare an invocable operation.
    #[must_use]
    pub fn operation<F>(mut self, name: impl Into<String>, params: Vec<FieldType>, body: F) -> Self
    where
        F: Fn(&mut Graph, ObjectId, &[ArgValue]) -> Result<(), OperationError>
            + Send
            + Sync
            + 'static,
    {
        self.def.operations.push(OperationDef {
            name: name.into(),
            params,
            body: Arc::new(body),
        });
        self
    }
}

/// Collects entity type declarations; validation happens in `build`.
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    types: Vec<EntityTypeDef>,
}

impl TypeRegistryBuilder {
    /// Declare an entity type.
    #[must_use]
    pub fn entity(
        mut self,
        name: &str,
        declare: impl FnOnce(EntityTypeBuilder) -> EntityTypeBuilder,
    ) -> Self {
        self.types.push(declare(EntityTypeBuilder::new(name)).def);
        self
    }

    /// Validate and freeze the declarations.
    ///
    /// Rejects duplicate types, fields (including ones shadowing an
    /// inherited field) and operation signatures, unknown parents,
    /// inheritance cycles and fields targeting unregistered types.
    /// Operation parameter types are checked later, by schema discovery.
    pub fn build(self) -> Result<TypeRegistry, GraphError> {
        let mut types = BTreeMap::new();
        for def in self.types {
            if types.contains_key(&def.name) {
                return Err(GraphError::DuplicateDeclaration(format!(
                    "entity type {}",
                    def.name
                )));
            }
            types.insert(def.name.clone(), def);
        }

        let registry = TypeRegistry { types };
        for def in registry.types.values() {
            registry.check_ancestry(def)?;
        }
        for def in registry.types.values() {
            registry.check_members(def)?;
        }
        Ok(registry)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Frozen set of entity type declarations for one domain.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, EntityTypeDef>,
}

impl TypeRegistry {
    /// Start declaring a domain.
    #[must_use]
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Look up a type declaration.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityTypeDef> {
        self.types.get(name)
    }

    /// Look up a type declaration, failing with `UnknownType`.
    pub fn require(&self, name: &str) -> Result<&EntityTypeDef, GraphError> {
        self.get(name)
            .ok_or_else(|| GraphError::UnknownType(name.to_string()))
    }

    /// All registered type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// `name` followed by its ancestors, nearest first.
    #[must_use]
    pub fn lineage(&self, name: &str) -> Vec<&EntityTypeDef> {
        let mut chain = Vec::new();
        let mut current = self.get(name);
        while let Some(def) = current {
            chain.push(def);
            current = def.parent.as_deref().and_then(|p| self.get(p));
        }
        chain
    }

    /// Whether an entity of type `sub` may stand where `sup` is expected.
    #[must_use]
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        self.lineage(sub).iter().any(|def| def.name == sup)
    }

    /// Registered types that directly extend `name`, sorted.
    #[must_use]
    pub fn direct_subtypes(&self, name: &str) -> Vec<&str> {
        self.types
            .values()
            .filter(|def| def.parent.as_deref() == Some(name))
            .map(|def| def.name.as_str())
            .collect()
    }

    /// Fields of `name` including inherited ones, root ancestor first, each
    /// paired with its declaring type.
    #[must_use]
    pub fn all_fields(&self, name: &str) -> Vec<(&str, &FieldDef)> {
        self.lineage(name)
            .into_iter()
            .rev()
            .flat_map(|def| def.fields.iter().map(move |f| (def.name.as_str(), f)))
            .collect()
    }

    /// Resolve a field on `name` or its ancestors.
    pub fn field(&self, name: &str, field: &str) -> Result<(&str, &FieldDef), GraphError> {
        self.require(name)?;
        self.lineage(name)
            .into_iter()
            .find_map(|def| {
                def.fields
                    .iter()
                    .find(|f| f.name == field)
                    .map(|f| (def.name.as_str(), f))
            })
            .ok_or_else(|| GraphError::UnknownField {
                type_name: name.to_string(),
                field: field.to_string(),
            })
    }

    /// Operations of `name` including inherited ones, root ancestor first.
    #[must_use]
    pub fn all_operations(&self, name: &str) -> Vec<(&str, &OperationDef)> {
        self.lineage(name)
            .into_iter()
            .rev()
            .flat_map(|def| def.operations.iter().map(move |o| (def.name.as_str(), o)))
            .collect()
    }

    fn check_ancestry(&self, def: &EntityTypeDef) -> Result<(), GraphError> {
        let mut seen = BTreeSet::new();
        let mut current = def;
        seen.insert(current.name.as_str());
        while let Some(parent) = current.parent.as_deref() {
            let Some(parent_def) = self.get(parent) else {
                return Err(GraphError::InvalidRegistry(format!(
                    "{} extends unknown type {}",
                    current.name, parent
                )));
            };
            if !seen.insert(parent_def.name.as_str()) {
                return Err(GraphError::InvalidRegistry(format!(
                    "inheritance cycle through {}",
                    def.name
                )));
            }
            current = parent_def;
        }
        Ok(())
    }

    fn check_members(&self, def: &EntityTypeDef) -> Result<(), GraphError> {
        let mut field_names = BTreeSet::new();
        for (declaring, field) in self.all_fields(&def.name) {
            if !field_names.insert(field.name.as_str()) {
                return Err(GraphError::DuplicateDeclaration(format!(
                    "field {}.{}",
                    declaring, field.name
                )));
            }
            if let Some(target) = field.ty.entity_type() {
                self.require(target)?;
            }
        }

        let mut signatures = BTreeSet::new();
        for op in &def.operations {
            if !signatures.insert((op.name.as_str(), &op.params)) {
                return Err(GraphError::DuplicateDeclaration(format!(
                    "operation {}.{}",
                    def.name, op.name
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Graph, _: ObjectId, _: &[ArgValue]) -> Result<(), OperationError> {
        Ok(())
    }

    fn people() -> TypeRegistry {
        TypeRegistry::builder()
            .entity("Person", |t| {
                t.field("name", FieldType::primitive(PrimitiveKind::Text))
                    .operation("rename", vec![FieldType::primitive(PrimitiveKind::Text)], noop)
            })
            .entity("Employee", |t| {
                t.extends("Person")
                    .field("manager", FieldType::entity("Employee"))
            })
            .build()
            .expect("registry")
    }

    #[test]
    fn inherited_fields_come_first() {
        let registry = people();
        let fields: Vec<_> = registry
            .all_fields("Employee")
            .into_iter()
            .map(|(decl, f)| format!("{decl}.{}", f.name))
            .collect();
        assert_eq!(fields, vec!["Person.name", "Employee.manager"]);
    }

    #[test]
    fn subtype_assignability() {
        let registry = people();
        assert!(registry.is_assignable("Employee", "Person"));
        assert!(registry.is_assignable("Employee", "Employee"));
        assert!(!registry.is_assignable("Person", "Employee"));
        assert_eq!(registry.direct_subtypes("Person"), vec!["Employee"]);
    }

    #[test]
    fn field_resolution_walks_ancestors() {
        let registry = people();
        let (declaring, field) = registry.field("Employee", "name").expect("field");
        assert_eq!(declaring, "Person");
        assert_eq!(field.ty, FieldType::primitive(PrimitiveKind::Text));
        assert!(matches!(
            registry.field("Employee", "salary"),
            Err(GraphError::UnknownField { .. })
        ));
    }

    #[test]
    fn inherited_operations_are_listed() {
        let registry = people();
        let ops = registry.all_operations("Employee");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].0, "Person");
    }

    #[test]
    fn duplicate_type_rejected() {
        let result = TypeRegistry::builder()
            .entity("A", |t| t)
            .entity("A", |t| t)
            .build();
        assert!(matches!(result, Err(GraphError::DuplicateDeclaration(_))));
    }

    #[test]
    fn shadowed_field_rejected() {
        let result = TypeRegistry::builder()
            .entity("A", |t| t.field("x", FieldType::primitive(PrimitiveKind::Integer)))
            .entity("B", |t| {
                t.extends("A")
                    .field("x", FieldType::primitive(PrimitiveKind::Integer))
            })
            .build();
        assert!(matches!(result, Err(GraphError::DuplicateDeclaration(_))));
    }

    #[test]
    fn unknown_parent_and_cycles_rejected() {
        let unknown = TypeRegistry::builder()
            .entity("A", |t| t.extends("Missing"))
            .build();
        assert!(matches!(unknown, Err(GraphError::InvalidRegistry(_))));

        let cycle = TypeRegistry::builder()
            .entity("A", |t| t.extends("B"))
            .entity("B", |t| t.extends("A"))
            .build();
        assert!(matches!(cycle, Err(GraphError::InvalidRegistry(_))));
    }

    #[test]
    fn field_targeting_unknown_type_rejected() {
        let result = TypeRegistry::builder()
            .entity("A", |t| t.field("b", FieldType::entity("B")))
            .build();
        assert!(matches!(result, Err(GraphError::UnknownType(_))));
    }

    #[test]
    fn field_type_display() {
        assert_eq!(FieldType::entity("Employee").list().to_string(), "List<Employee>");
        assert_eq!(
            FieldType::primitive(PrimitiveKind::Integer).set().to_string(),
            "Set<int>"
        );
    }
}
