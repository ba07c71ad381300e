//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::Settings;
use crate::domain::{self, ROOT_TYPE};
use crate::snapshot::Snapshot;
use entigraph_core::{
    Argument, CanonicalTriples, EntityId, FieldType, GraphError, MethodCall, OperationInvoker,
    Outcome, Primitive, Schema, State, ValueType, canonical_checksum, canonical_crypto_hash,
    export_canonical, states_equivalent,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// PATH VALIDATION
// =============================================================================

/// Canonicalize an input path and ensure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, GraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        GraphError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(GraphError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path and ensure it is a directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, GraphError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        GraphError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(GraphError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| GraphError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// LOADING
// =============================================================================

fn load_schema() -> Result<Arc<Schema>, GraphError> {
    let registry = domain::registry()?;
    Ok(Arc::new(Schema::discover(registry, ROOT_TYPE)?))
}

/// Load a snapshot file into a fresh State of the demo domain.
pub fn load_state(settings: Settings, path: &Path) -> Result<State, GraphError> {
    let path = validate_file_path(path)?;
    let schema = load_schema()?;
    let (graph, root) = Snapshot::load(&path)?.build(schema.registry())?;
    State::with_mode(schema, graph, root, settings.deterministic)
}

fn print_json(value: &serde_json::Value) -> Result<(), GraphError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| GraphError::SerializationError(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

// =============================================================================
// SCHEMA COMMAND
// =============================================================================

/// Show reachable types, their relation fields and the operation table.
pub fn cmd_schema(settings: Settings) -> Result<(), GraphError> {
    let schema = load_schema()?;
    let det = settings.deterministic;

    if settings.json_mode {
        let mut types = Vec::new();
        for name in schema.reachable_types(true, det) {
            let fields: Vec<String> = schema
                .fields(name, det)?
                .iter()
                .map(ToString::to_string)
                .collect();
            types.push(json!({ "type": name, "fields": fields }));
        }
        let operations: Vec<_> = schema
            .friendly_ids()
            .map(|(friendly, id)| json!({ "id": friendly, "signature": id.to_string() }))
            .collect();
        return print_json(&json!({
            "root": schema.root_type(),
            "types": types,
            "operations": operations,
        }));
    }

    println!("Root: {}", schema.root_type());
    println!();
    for name in schema.reachable_types(true, det) {
        println!("{}", name);
        for field in schema.fields(name, det)? {
            println!("  {}", field);
        }
    }
    println!();
    println!("Operations:");
    for (friendly, id) in schema.friendly_ids() {
        println!("  {:<24} {}", friendly, id);
    }
    Ok(())
}

// =============================================================================
// ENTITIES / TRIPLES COMMANDS
// =============================================================================

/// List reachable entities in walk order.
pub fn cmd_entities(settings: Settings, snapshot: &Path) -> Result<(), GraphError> {
    let state = load_state(settings, snapshot)?;
    let mut rows = Vec::new();
    for (id, obj) in state.entities()? {
        rows.push((id.clone(), state.graph().type_of(obj)?.to_string()));
    }

    if settings.json_mode {
        let items: Vec<_> = rows
            .iter()
            .map(|(id, ty)| json!({ "id": id.as_str(), "type": ty }))
            .collect();
        return print_json(&json!(items));
    }

    for (id, ty) in rows {
        println!("{:<6} {}", id, ty);
    }
    Ok(())
}

/// Print the triple store.
pub fn cmd_triples(settings: Settings, snapshot: &Path) -> Result<(), GraphError> {
    let mut state = load_state(settings, snapshot)?;
    print_triples(settings, &mut state)
}

fn print_triples(settings: Settings, state: &mut State) -> Result<(), GraphError> {
    let triples = state.materialize_triples()?;
    if settings.json_mode {
        let items = serde_json::to_value(triples)
            .map_err(|e| GraphError::SerializationError(e.to_string()))?;
        return print_json(&items);
    }
    for triple in triples {
        println!("{}", triple);
    }
    Ok(())
}

// =============================================================================
// INVOKE COMMAND
// =============================================================================

/// Turn one command-line argument into a call argument for `param`.
///
/// Literals that do not parse as the declared kind are passed on as text
/// and left to validation.
#[must_use]
pub fn parse_argument(param: Option<&FieldType>, raw: &str) -> Argument {
    let Some(param) = param else {
        return Argument::value(raw);
    };
    let parts: Vec<&str> = if param.is_collection() {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    } else {
        vec![raw]
    };
    match &param.value {
        ValueType::Entity(_) => Argument::Entities(parts.into_iter().map(EntityId::from).collect()),
        ValueType::Primitive(kind) => Argument::Primitives(
            parts
                .into_iter()
                .map(|p| kind.parse(p).unwrap_or_else(|_| Primitive::Text(p.to_string())))
                .collect(),
        ),
    }
}

/// Validate and execute one operation, printing the outcome.
///
/// A rejected or failed candidate is reported, not returned as an error.
pub fn cmd_invoke(
    settings: Settings,
    snapshot: &Path,
    operation: &str,
    on: &str,
    args: &[String],
) -> Result<(), GraphError> {
    let state = load_state(settings, snapshot)?;
    let op = state.schema().operation_by_friendly_id(operation)?;
    let arguments = args
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_argument(op.id.params.get(i), raw))
        .collect();
    let call = MethodCall::new(op.id.clone(), on, arguments);

    let Some(valid) = OperationInvoker::validate(&call, &state)? else {
        return report(settings, "ill-typed", &format!("{} does not fit this state", call));
    };

    match OperationInvoker::execute(&valid, &state) {
        Outcome::Applied(mut next) => {
            if !settings.json_mode {
                println!("Applied {}", call);
            }
            print_triples(settings, &mut next)
        }
        Outcome::Rejected => report(settings, "rejected", &format!("{} is invalid here", call)),
        Outcome::Failed(cause) => report(settings, "failed", &cause),
    }
}

fn report(settings: Settings, outcome: &str, detail: &str) -> Result<(), GraphError> {
    if settings.json_mode {
        return print_json(&json!({ "outcome": outcome, "detail": detail }));
    }
    println!("{}: {}", outcome, detail);
    Ok(())
}

// =============================================================================
// EQUIV COMMAND
// =============================================================================

/// Compare two snapshots structurally.
pub fn cmd_equiv(settings: Settings, left: &Path, right: &Path) -> Result<(), GraphError> {
    let a = load_state(settings, left)?;
    let b = load_state(settings, right)?;
    let equal = states_equivalent(&a, &b)?;

    if settings.json_mode {
        return print_json(&json!({ "equivalent": equal }));
    }
    println!("{}", if equal { "equivalent" } else { "different" });
    Ok(())
}

// =============================================================================
// EXPORT / HASH COMMANDS
// =============================================================================

/// Write the triple store in canonical (postcard) or JSON form.
pub fn cmd_export(
    settings: Settings,
    snapshot: &Path,
    output: &Path,
    format: &str,
) -> Result<(), GraphError> {
    let output = validate_output_path(output)?;
    let mut state = load_state(settings, snapshot)?;

    let data = match format {
        "canonical" => export_canonical(&mut state)?,
        "json" => {
            let canonical = CanonicalTriples::from_state(&mut state)?;
            serde_json::to_vec_pretty(&canonical)
                .map_err(|e| GraphError::SerializationError(e.to_string()))?
        }
        other => {
            return Err(GraphError::SerializationError(format!(
                "Unknown export format: {}",
                other
            )));
        }
    };

    std::fs::write(&output, &data)
        .map_err(|e| GraphError::IoError(format!("Cannot write export: {}", e)))?;
    tracing::info!(path = %output.display(), bytes = data.len(), format, "export written");
    Ok(())
}

/// Print the canonical checksum and BLAKE3 hash of the triple store.
pub fn cmd_hash(settings: Settings, snapshot: &Path) -> Result<(), GraphError> {
    let mut state = load_state(settings, snapshot)?;
    let checksum = canonical_checksum(&mut state)?;
    let blake3 = canonical_crypto_hash(&mut state)?;

    if settings.json_mode {
        return print_json(&json!({ "checksum": checksum, "blake3": blake3 }));
    }
    println!("checksum: {:016x}", checksum);
    println!("blake3:   {}", blake3);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
