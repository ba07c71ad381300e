//! # entigraph-core
//!
//! The deterministic entity-graph runtime - THE LOGIC.
//!
//! This crate turns a domain of typed entities into a graph the rest of a
//! pipeline can reason over:
//! - `value`: the closed primitive value model
//! - `registry` / `schema`: explicit domain descriptors and the discovered
//!   schema (reachable types, relation fields, operations, friendly ids)
//! - `graph` / `walker`: the arena-backed entity graph and its traversal
//! - `state`: stable identifiers and the triple store
//! - `invoker`: validation and isolated execution of candidate operations
//! - `equivalence`: identifier-independent structural comparison
//! - `export`: byte-stable canonical triple export
//!
//! ## Architectural Constraints
//!
//! - Single-owner, synchronous: no async, no locking, no network
//! - Isolation between speculative operations comes from deep copies only
//! - Deterministic mode yields byte-stable orders across runs
//!
//! ## Example
//!
//! ```
//! use entigraph_core::{FieldType, Graph, PrimitiveKind, Schema, State, TypeRegistry};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(
//!     TypeRegistry::builder()
//!         .entity("Company", |t| t.field("employees", FieldType::entity("Employee").list()))
//!         .entity("Employee", |t| t.field("salary", FieldType::primitive(PrimitiveKind::Integer)))
//!         .build()?,
//! );
//! let schema = Arc::new(Schema::discover(Arc::clone(&registry), "Company")?);
//!
//! let mut graph = Graph::new(registry);
//! let company = graph.create("Company")?;
//! let ada = graph.create("Employee")?;
//! graph.set(ada, "salary", 100i64)?;
//! graph.push(company, "employees", ada)?;
//!
//! let mut state = State::new(schema, graph, company)?;
//! assert_eq!(state.id_of(ada)?.as_str(), "e2");
//! assert_eq!(state.materialize_triples()?.len(), 2);
//! # Ok::<(), entigraph_core::GraphError>(())
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod equivalence;
pub mod export;
pub mod graph;
pub mod invoker;
pub mod primitives;
pub mod registry;
pub mod schema;
pub mod state;
pub mod types;
pub mod value;
pub mod walker;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{EntityId, GraphError, ObjectId};
pub use value::{Primitive, PrimitiveKind};

// =============================================================================
// RE-EXPORTS: Domain Description
// =============================================================================

pub use registry::{
    ArgValue, Cardinality, EntityTypeBuilder, FieldType, OperationBody, OperationError,
    TypeRegistry, TypeRegistryBuilder, ValueType,
};
pub use schema::{EntitySchema, OperationId, OperationSchema, RelationField, Schema};

// =============================================================================
// RE-EXPORTS: Runtime
// =============================================================================

pub use equivalence::{equivalent, states_equivalent};
pub use export::{
    CanonicalHeader, CanonicalTriples, canonical_checksum, export_canonical, import_canonical,
    verify_canonical,
};
#[cfg(feature = "crypto-hash")]
pub use export::{canonical_crypto_hash, compute_blake3_hash};
pub use graph::{Entity, FieldValue, Graph, Node};
pub use invoker::{Argument, MethodCall, OperationInvoker, Outcome, ValidOperation};
pub use state::{State, Triple, TripleObject};
pub use walker::{Edge, GraphWalker};
