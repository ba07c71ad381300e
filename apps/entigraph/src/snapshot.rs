//! # JSON Snapshots
//!
//! Loads an object graph of the demo domain from a JSON document:
//!
//! ```json
//! {
//!   "root": "acme",
//!   "entities": {
//!     "acme": { "type": "Company", "fields": { "employees": ["ada", "bob"] } },
//!     "ada":  { "type": "Employee", "fields": { "name": "Ada", "salary": 120 } },
//!     "bob":  { "type": "Employee", "fields": { "name": "Bob", "manager": "ada" } }
//!   }
//! }
//! ```
//!
//! Entity-typed fields hold snapshot keys; primitive fields hold JSON
//! scalars interpreted by the declared kind. Keys are local to the document
//! and unrelated to the identifiers a State assigns.

use entigraph_core::{
    Entity, Graph, GraphError, ObjectId, Primitive, PrimitiveKind, TypeRegistry, ValueType,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Maximum snapshot file size (100 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Key of the root entity.
    pub root: String,
    pub entities: BTreeMap<String, EntitySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Read a snapshot file.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            GraphError::IoError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_SNAPSHOT_FILE_SIZE {
            return Err(GraphError::SerializationError(format!(
                "File size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_SNAPSHOT_FILE_SIZE
            )));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GraphError::IoError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, GraphError> {
        serde_json::from_str(raw)
            .map_err(|e| GraphError::SerializationError(format!("Invalid snapshot: {}", e)))
    }

    /// Materialize the snapshot as a graph.
    ///
    /// Entities are allocated in key order, so loading the same document
    /// twice yields identical slot layouts.
    pub fn build(&self, registry: &Arc<TypeRegistry>) -> Result<(Graph, ObjectId), GraphError> {
        let mut graph = Graph::new(Arc::clone(registry));
        let mut slots = BTreeMap::new();
        for (key, entity) in &self.entities {
            slots.insert(key.as_str(), graph.create(&entity.type_name)?);
        }
        let lookup = |key: &str| {
            slots
                .get(key)
                .copied()
                .ok_or_else(|| GraphError::SerializationError(format!("Unknown snapshot key: {key}")))
        };

        for (key, entity) in &self.entities {
            let id = lookup(key)?;
            for (field, value) in &entity.fields {
                let (_, def) = registry.field(&entity.type_name, field)?;
                let convert = |v: &Value| -> Result<Entity, GraphError> {
                    match (&def.ty.value, v) {
                        (_, Value::Null) => Ok(Entity::null()),
                        (ValueType::Entity(_), Value::String(target)) => {
                            Ok(Entity::Object(lookup(target)?))
                        }
                        (ValueType::Primitive(kind), scalar) => {
                            Ok(Entity::Primitive(json_primitive(kind, scalar)?))
                        }
                        _ => Err(malformed(&entity.type_name, field, v)),
                    }
                };

                if def.ty.is_collection() {
                    let Value::Array(items) = value else {
                        return Err(malformed(&entity.type_name, field, value));
                    };
                    let values = items.iter().map(convert).collect::<Result<Vec<_>, _>>()?;
                    graph.set_many(id, field, values)?;
                } else {
                    graph.set(id, field, convert(value)?)?;
                }
            }
        }

        let root = lookup(&self.root)?;
        tracing::debug!(entities = slots.len(), root = %self.root, "snapshot loaded");
        Ok((graph, root))
    }
}

/// Interpret a JSON scalar as a value of `kind`.
pub fn json_primitive(kind: &PrimitiveKind, value: &Value) -> Result<Primitive, GraphError> {
    match (kind, value) {
        (_, Value::Null) => Ok(Primitive::Null),
        (PrimitiveKind::Text, Value::String(s)) => Ok(Primitive::Text(s.clone())),
        (_, Value::String(s)) => kind.parse(s),
        (_, Value::Number(n)) => kind.parse(&n.to_string()),
        (_, Value::Bool(b)) => kind.parse(&b.to_string()),
        (_, Value::Array(_)) => Err(GraphError::UnsupportedPrimitiveType(format!(
            "array given for {kind}"
        ))),
        (_, Value::Object(_)) => Err(GraphError::UnsupportedPrimitiveType(format!(
            "object given for {kind}"
        ))),
    }
}

fn malformed(type_name: &str, field: &str, value: &Value) -> GraphError {
    GraphError::SerializationError(format!(
        "Unexpected value for {type_name}.{field}: {value}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain;

    const ACME: &str = r#"{
        "root": "acme",
        "entities": {
            "acme": { "type": "Company", "fields": { "name": "Acme", "employees": ["ada", "bob"] } },
            "ada":  { "type": "Employee", "fields": { "name": "Ada", "salary": 120, "level": "Senior" } },
            "bob":  { "type": "Contractor", "fields": { "name": "Bob", "manager": "ada", "skills": ["rust", "sql"] } }
        }
    }"#;

    #[test]
    fn builds_typed_graph() {
        let registry = domain::registry().expect("registry");
        let (graph, root) = Snapshot::from_json(ACME)
            .expect("parse")
            .build(&registry)
            .expect("build");

        assert_eq!(graph.type_of(root).expect("type"), "Company");
        let staff = graph.get_many(root, "employees").expect("employees");
        assert_eq!(staff.len(), 2);
        let bob = staff[1].as_object().expect("bob");
        assert_eq!(graph.type_of(bob).expect("type"), "Contractor");
        assert_eq!(graph.get_object(bob, "manager").expect("manager"), staff[0].as_object());
        assert_eq!(graph.get_many(bob, "skills").expect("skills").len(), 2);
    }

    #[test]
    fn loading_twice_is_identical() {
        let registry = domain::registry().expect("registry");
        let snapshot = Snapshot::from_json(ACME).expect("parse");
        let (a, ra) = snapshot.build(&registry).expect("build");
        let (b, rb) = snapshot.build(&registry).expect("build");
        assert_eq!(ra, rb);
        assert_eq!(a.node(ra).expect("node"), b.node(rb).expect("node"));
    }

    #[test]
    fn ill_typed_values_rejected() {
        let registry = domain::registry().expect("registry");
        let bad_salary = ACME.replace("\"salary\": 120", "\"salary\": \"lots\"");
        assert!(matches!(
            Snapshot::from_json(&bad_salary).expect("parse").build(&registry),
            Err(GraphError::InvalidPrimitiveLiteral { .. })
        ));
        let dangling = ACME.replace("\"manager\": \"ada\"", "\"manager\": \"zed\"");
        assert!(Snapshot::from_json(&dangling).expect("parse").build(&registry).is_err());
        let unknown = ACME.replace("\"salary\": 120", "\"bonus\": 1");
        assert!(matches!(
            Snapshot::from_json(&unknown).expect("parse").build(&registry),
            Err(GraphError::UnknownField { .. })
        ));
    }

    #[test]
    fn json_scalars_follow_declared_kind() {
        assert_eq!(
            json_primitive(&PrimitiveKind::Integer, &Value::from(7)).expect("int"),
            Primitive::Integer(7)
        );
        assert_eq!(
            json_primitive(&PrimitiveKind::Text, &Value::from("7")).expect("text"),
            Primitive::Text("7".to_string())
        );
        assert!(json_primitive(&PrimitiveKind::Boolean, &Value::from(1)).is_err());
    }

    #[test]
    fn structured_json_is_not_a_primitive() {
        let nested = serde_json::json!({ "amount": 1 });
        assert!(matches!(
            json_primitive(&PrimitiveKind::Integer, &nested),
            Err(GraphError::UnsupportedPrimitiveType(_))
        ));
        assert!(matches!(
            json_primitive(&PrimitiveKind::Text, &serde_json::json!(["a"])),
            Err(GraphError::UnsupportedPrimitiveType(_))
        ));

        let registry = domain::registry().expect("registry");
        let boxed_name = ACME.replace("\"name\": \"Ada\"", "\"name\": {\"first\": \"Ada\"}");
        assert!(matches!(
            Snapshot::from_json(&boxed_name).expect("parse").build(&registry),
            Err(GraphError::UnsupportedPrimitiveType(_))
        ));
    }
}
