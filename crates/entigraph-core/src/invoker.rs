//! # Operation Invoker
//!
//! Type-checks candidate operation calls against a State and applies them
//! to an isolated copy.
//!
//! ## Outcomes
//!
//! `validate` answers `Ok(None)` for a candidate that is not well-typed for
//! the State. That is the normal, frequent outcome of a search and is not an
//! error. `Err` is reserved for contract violations (unknown operation,
//! stale State).
//!
//! `execute` never mutates its input and never propagates a failure of the
//! operation body. It answers one of:
//! - `Applied(State)`: the body completed; the mutated copy is returned with
//!   identifiers recomputed deterministically.
//! - `Rejected`: the body signalled `OperationError::Invalid`. Logged at
//!   trace level only.
//! - `Failed(cause)`: any other failure, panics included. Logged as a
//!   warning with the operation's friendly id.

use crate::graph::ObjectId;
use crate::registry::{ArgValue, FieldType, OperationError, ValueType};
use crate::schema::OperationId;
use crate::state::State;
use crate::{EntityId, GraphError, Primitive};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

// =============================================================================
// CALLS
// =============================================================================

/// One argument of a candidate call, expressed in State-level terms.
///
/// Non-collection parameters take exactly one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Primitives(Vec<Primitive>),
    Entities(Vec<EntityId>),
}

impl Argument {
    /// A single entity, by id.
    #[must_use]
    pub fn entity(id: impl Into<EntityId>) -> Self {
        Self::Entities(vec![id.into()])
    }

    /// A single primitive value.
    #[must_use]
    pub fn value(value: impl Into<Primitive>) -> Self {
        Self::Primitives(vec![value.into()])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Primitives(v) => v.len(),
            Self::Entities(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<EntityId> for Argument {
    fn from(id: EntityId) -> Self {
        Self::Entities(vec![id])
    }
}

/// A candidate call: operation, the entity it is invoked on, arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub operation: OperationId,
    pub invoke_on: EntityId,
    pub arguments: Vec<Argument>,
}

impl MethodCall {
    #[must_use]
    pub fn new(operation: OperationId, invoke_on: impl Into<EntityId>, arguments: Vec<Argument>) -> Self {
        Self {
            operation,
            invoke_on: invoke_on.into(),
            arguments,
        }
    }
}

impl fmt::Display for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[", self.operation, self.invoke_on)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match arg {
                Argument::Primitives(values) => {
                    let parts: Vec<String> = values.iter().map(ToString::to_string).collect();
                    write!(f, "{}", parts.join(" "))?;
                }
                Argument::Entities(ids) => {
                    let parts: Vec<&str> = ids.iter().map(EntityId::as_str).collect();
                    write!(f, "{}", parts.join(" "))?;
                }
            }
        }
        f.write_str("]")
    }
}

/// A call that passed `validate` against some State.
///
/// Only `OperationInvoker::validate` constructs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidOperation {
    call: MethodCall,
    friendly_id: String,
}

impl ValidOperation {
    #[must_use]
    pub fn call(&self) -> &MethodCall {
        &self.call
    }

    #[must_use]
    pub fn operation(&self) -> &OperationId {
        &self.call.operation
    }

    /// Friendly id of the operation, used in diagnostics.
    #[must_use]
    pub fn friendly_id(&self) -> &str {
        &self.friendly_id
    }
}

/// Result of `execute`.
#[derive(Debug)]
pub enum Outcome {
    /// The operation completed; this is the mutated copy.
    Applied(State),
    /// The operation reported the call as invalid for the State.
    Rejected,
    /// The operation failed unexpectedly.
    Failed(String),
}

impl Outcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// The successor State, if any.
    #[must_use]
    pub fn into_state(self) -> Option<State> {
        match self {
            Self::Applied(state) => Some(state),
            Self::Rejected | Self::Failed(_) => None,
        }
    }
}

// =============================================================================
// INVOKER
// =============================================================================

/// Validates and applies candidate calls. Stateless.
pub struct OperationInvoker;

impl OperationInvoker {
    /// Type-check a candidate call against `state`.
    ///
    /// Checks, in order: arity; the invoke-on entity resolves and its
    /// runtime type is assignable to the declaring type; every
    /// non-collection parameter receives exactly one value; every primitive
    /// value fits the declared kind; every entity id resolves to an entity
    /// assignable to the declared type.
    pub fn validate(call: &MethodCall, state: &State) -> Result<Option<ValidOperation>, GraphError> {
        let schema = state.schema();
        let op = schema.operation(&call.operation)?;
        let friendly_id = schema
            .friendly_id(&op.id)
            .unwrap_or(op.id.name.as_str())
            .to_string();

        match Self::check(call, state, &op.id.params) {
            Ok(()) => {}
            Err(Mismatch::Contract(err)) => return Err(err),
            Err(reason) => {
                tracing::trace!(call = %call, %reason, "candidate rejected by validation");
                return Ok(None);
            }
        }

        Ok(Some(ValidOperation {
            call: call.clone(),
            friendly_id,
        }))
    }

    /// `validate` followed by `execute`. `Rejected` when validation fails.
    pub fn try_apply(call: &MethodCall, state: &State) -> Result<Outcome, GraphError> {
        Ok(match Self::validate(call, state)? {
            Some(valid) => Self::execute(&valid, state),
            None => Outcome::Rejected,
        })
    }

    /// Apply a validated call to a deep copy of `state`.
    pub fn execute(valid: &ValidOperation, state: &State) -> Outcome {
        match Self::run(valid, state) {
            Ok(Ok(copy)) => Outcome::Applied(copy),
            Ok(Err(OperationError::Invalid(reason))) => {
                tracing::trace!(operation = valid.friendly_id(), %reason, "invalid invocation");
                Outcome::Rejected
            }
            Ok(Err(err)) => Self::failed(valid, err.to_string()),
            Err(err) => Self::failed(valid, err.to_string()),
        }
    }

    fn failed(valid: &ValidOperation, cause: String) -> Outcome {
        tracing::warn!(
            operation = valid.friendly_id(),
            call = %valid.call,
            %cause,
            "operation failed unexpectedly"
        );
        Outcome::Failed(cause)
    }

    /// Outer `Err` is a runtime failure around the body; inner `Err` is
    /// what the body itself reported.
    fn run(valid: &ValidOperation, state: &State) -> Result<Result<State, OperationError>, GraphError> {
        let mut copy = state.deep_copy()?;
        let op = copy.schema().operation(valid.operation())?;
        let body = Arc::clone(&op.body);

        let target = copy.resolve(&valid.call.invoke_on)?;
        let args = Self::resolve_arguments(&valid.call.arguments, &copy)?;

        copy.invalidate();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            body(copy.graph_mut(), target, &args)
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Ok(Err(err)),
            Err(payload) => return Ok(Err(OperationError::Failed(panic_message(&*payload)))),
        }

        copy.recompute_identifiers(true)?;
        Ok(Ok(copy))
    }

    fn resolve_arguments(arguments: &[Argument], state: &State) -> Result<Vec<ArgValue>, GraphError> {
        arguments
            .iter()
            .map(|arg| match arg {
                Argument::Primitives(values) => Ok(ArgValue::Primitives(values.clone())),
                Argument::Entities(ids) => ids
                    .iter()
                    .map(|id| state.resolve(id))
                    .collect::<Result<Vec<ObjectId>, _>>()
                    .map(ArgValue::Objects),
            })
            .collect()
    }

    fn check(call: &MethodCall, state: &State, params: &[FieldType]) -> Result<(), Mismatch> {
        if call.arguments.len() != params.len() {
            return Err(Mismatch::Arity {
                expected: params.len(),
                found: call.arguments.len(),
            });
        }

        let target = Self::resolve_candidate(state, &call.invoke_on)?;
        let target_type = state.graph().type_of(target).map_err(Mismatch::Contract)?;
        if !state
            .schema()
            .is_assignable(target_type, &call.operation.declaring_type)
        {
            return Err(Mismatch::Receiver(target_type.to_string()));
        }

        for (index, (arg, param)) in call.arguments.iter().zip(params).enumerate() {
            if !param.is_collection() && arg.len() != 1 {
                return Err(Mismatch::Argument(index));
            }
            let fits = match (&param.value, arg) {
                (ValueType::Primitive(kind), Argument::Primitives(values)) => {
                    values.iter().all(|v| v.is_assignable_to(kind))
                }
                (ValueType::Entity(expected), Argument::Entities(ids)) => {
                    let mut all = true;
                    for id in ids {
                        let obj = Self::resolve_candidate(state, id)?;
                        let actual = state.graph().type_of(obj).map_err(Mismatch::Contract)?;
                        if !state.schema().is_assignable(actual, expected) {
                            all = false;
                            break;
                        }
                    }
                    all
                }
                _ => false,
            };
            if !fits {
                return Err(Mismatch::Argument(index));
            }
        }
        Ok(())
    }

    /// Unknown ids are a mismatch; a stale State is a contract violation.
    fn resolve_candidate(state: &State, id: &EntityId) -> Result<ObjectId, Mismatch> {
        match state.resolve(id) {
            Ok(obj) => Ok(obj),
            Err(GraphError::UnknownEntityId(id)) => Err(Mismatch::UnknownId(id)),
            Err(err) => Err(Mismatch::Contract(err)),
        }
    }
}

enum Mismatch {
    Arity { expected: usize, found: usize },
    Receiver(String),
    Argument(usize),
    UnknownId(EntityId),
    Contract(GraphError),
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arity { expected, found } => {
                write!(f, "expected {expected} arguments, got {found}")
            }
            Self::Receiver(found) => write!(f, "cannot invoke on {found}"),
            Self::Argument(index) => write!(f, "argument {index} does not fit its parameter"),
            Self::UnknownId(id) => write!(f, "unknown entity {id}"),
            Self::Contract(err) => write!(f, "{err}"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
