//! # Core Type Definitions
//!
//! This module contains the identifier and error types shared by every layer
//! of the entity-graph runtime:
//! - Arena slot handles (`ObjectId`)
//! - Stable, State-scoped string identifiers (`EntityId`)
//! - Error types (`GraphError`)
//!
//! ## Identity Model
//!
//! A non-primitive entity is addressed by the slot it occupies in its
//! `Graph` arena. Slots are private to one graph: a deep copy allocates new
//! slots. The string `EntityId` is what survives across copies and
//! recomputations and is what downstream consumers see.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::primitives::ID_PREFIX;

// =============================================================================
// OBJECT & ENTITY IDENTIFIERS
// =============================================================================

/// Opaque slot index of a non-primitive entity inside one `Graph` arena.
///
/// "Same entity" inside a graph means "same `ObjectId`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable string identifier assigned to a reachable entity by a `State`.
///
/// Identifiers are minted from a per-State counter and are never reused
/// within that State's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create an identifier from an arbitrary string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Mint the identifier for counter value `n`.
    #[must_use]
    pub fn from_counter(n: u64) -> Self {
        Self(format!("{ID_PREFIX}{n}"))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the entity-graph runtime.
///
/// Every variant is a contract violation: a domain-definition bug or caller
/// misuse. Expected semantic rejections (an ill-typed candidate operation,
/// an operation signalling invalid invocation) are NOT errors and never
/// surface through this type.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A value or type name outside the closed primitive set.
    #[error("Unsupported primitive type: {0}")]
    UnsupportedPrimitiveType(String),

    /// A literal could not be parsed as the requested primitive kind.
    #[error("Invalid {kind} literal: {raw:?}")]
    InvalidPrimitiveLiteral { kind: String, raw: String },

    /// Relational comparison between values of different or unordered kinds.
    #[error("Incomparable types: {0} and {1}")]
    IncomparableTypes(String, String),

    /// An invocable operation declares a parameter outside the allowed types.
    #[error("Invalid operation signature {operation}: {reason}")]
    InvalidOperationSignature { operation: String, reason: String },

    /// An unordered collection of non-primitive entities met a deterministic walk.
    #[error("Field {type_name}.{field} is an unordered entity collection; it cannot be walked deterministically")]
    NonDeterministicCollectionField { type_name: String, field: String },

    /// The entity is not reachable in this State.
    #[error("Entity not in state: {0}")]
    EntityNotInState(String),

    /// The identifier does not resolve to any entity of this State.
    #[error("Unknown entity id: {0}")]
    UnknownEntityId(EntityId),

    /// The State was invalidated and not yet recomputed.
    #[error("State is stale; recompute identifiers before reading it")]
    StaleState,

    /// The root entity's type does not fit the schema's root type.
    #[error("Root type mismatch: schema is rooted at {expected}, entity is {found}")]
    RootTypeMismatch { expected: String, found: String },

    /// The entity type is not registered.
    #[error("Unknown entity type: {0}")]
    UnknownType(String),

    /// The field is not declared on the entity type (or its ancestors).
    #[error("Unknown field {type_name}.{field}")]
    UnknownField { type_name: String, field: String },

    /// The operation is not part of the schema.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// A value does not fit the declared field type.
    #[error("Type mismatch on {type_name}.{field}: expected {expected}, got {found}")]
    FieldTypeMismatch {
        type_name: String,
        field: String,
        expected: String,
        found: String,
    },

    /// A stored field value has a shape that contradicts its declaration.
    #[error("Malformed value in {type_name}.{field}")]
    MalformedField { type_name: String, field: String },

    /// An edge points at a slot that holds no entity.
    #[error("Dangling object reference: {0}")]
    DanglingObject(ObjectId),

    /// Every object slot of the arena has been handed out.
    #[error("Graph arena exhausted: no free object slot")]
    ArenaExhausted,

    /// The same type, field or operation was declared twice.
    #[error("Duplicate declaration: {0}")]
    DuplicateDeclaration(String),

    /// A registry-level inconsistency (unknown parent, inheritance cycle).
    #[error("Invalid registry: {0}")]
    InvalidRegistry(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
