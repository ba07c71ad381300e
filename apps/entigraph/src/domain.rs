//! # Demo Domain
//!
//! A company / employee hierarchy registered with the core's type registry.
//!
//! ```text
//! Company
//!   name:        string
//!   employees:   List<Employee>
//!   hire(string, int)
//!   fire(Employee)
//!   updateSalary(Employee, int)
//!   assignManager(Employee, Employee)
//!
//! Employee
//!   name:    string
//!   salary:  int
//!   level:   enum:Level
//!   skills:  Set<string>
//!   manager: Employee
//!   promote(enum:Level)
//!
//! Contractor extends Employee
//!   agency:  string
//! ```

use entigraph_core::{
    ArgValue, Entity, FieldType, Graph, GraphError, ObjectId, OperationError, Primitive, PrimitiveKind,
    TypeRegistry,
};
use std::sync::Arc;

/// Root entity type of the demo domain.
pub const ROOT_TYPE: &str = "Company";

/// Members of the `Level` enumeration, lowest first.
pub const LEVELS: [&str; 3] = ["Junior", "Senior", "Principal"];

fn text() -> FieldType {
    FieldType::primitive(PrimitiveKind::Text)
}

fn int() -> FieldType {
    FieldType::primitive(PrimitiveKind::Integer)
}

fn level() -> FieldType {
    FieldType::primitive(PrimitiveKind::Enum("Level".to_string()))
}

fn employee() -> FieldType {
    FieldType::entity("Employee")
}

/// Build the demo registry.
pub fn registry() -> Result<Arc<TypeRegistry>, GraphError> {
    let registry = TypeRegistry::builder()
        .entity("Company", |t| {
            t.field("name", text())
                .field("employees", employee().list())
                .operation("hire", vec![text(), int()], hire)
                .operation("fire", vec![employee()], fire)
                .operation("updateSalary", vec![employee(), int()], update_salary)
                .operation("assignManager", vec![employee(), employee()], assign_manager)
        })
        .entity("Employee", |t| {
            t.field("name", text())
                .field("salary", int())
                .field("level", level())
                .field("skills", text().set())
                .field("manager", employee())
                .operation("promote", vec![level()], promote)
        })
        .entity("Contractor", |t| t.extends("Employee").field("agency", text()))
        .build()?;
    Ok(Arc::new(registry))
}

// =============================================================================
// OPERATION BODIES
// =============================================================================

fn salary_arg(value: &Primitive) -> Result<i64, OperationError> {
    let salary = value
        .as_integer()
        .ok_or_else(|| OperationError::Failed("salary must be an integer".to_string()))?;
    if salary < 0 {
        return Err(OperationError::invalid("salary cannot be negative"));
    }
    Ok(salary)
}

fn employs(graph: &Graph, company: ObjectId, who: ObjectId) -> Result<bool, OperationError> {
    Ok(graph
        .get_many(company, "employees")?
        .contains(&Entity::Object(who)))
}

fn hire(graph: &mut Graph, company: ObjectId, args: &[ArgValue]) -> Result<(), OperationError> {
    let name = args[0].primitive()?.clone();
    let salary = salary_arg(args[1].primitive()?)?;
    if name.as_text().is_none_or(str::is_empty) {
        return Err(OperationError::invalid("a hire needs a name"));
    }
    let who = graph.create("Employee")?;
    graph.set(who, "name", name)?;
    graph.set(who, "salary", salary)?;
    graph.set(who, "level", level_value(LEVELS[0]))?;
    graph.push(company, "employees", who)?;
    Ok(())
}

fn fire(graph: &mut Graph, company: ObjectId, args: &[ArgValue]) -> Result<(), OperationError> {
    let who = args[0].object()?;
    if !graph.remove(company, "employees", who)? {
        return Err(OperationError::invalid("not an employee of this company"));
    }
    // Reports of the fired employee lose their manager.
    let staff: Vec<ObjectId> = graph
        .get_many(company, "employees")?
        .iter()
        .filter_map(Entity::as_object)
        .collect();
    for report in staff {
        if graph.get_object(report, "manager")? == Some(who) {
            graph.set(report, "manager", Entity::null())?;
        }
    }
    Ok(())
}

fn update_salary(
    graph: &mut Graph,
    company: ObjectId,
    args: &[ArgValue],
) -> Result<(), OperationError> {
    let who = args[0].object()?;
    let salary = salary_arg(args[1].primitive()?)?;
    if !employs(graph, company, who)? {
        return Err(OperationError::invalid("not an employee of this company"));
    }
    graph.set(who, "salary", salary)?;
    Ok(())
}

fn assign_manager(
    graph: &mut Graph,
    company: ObjectId,
    args: &[ArgValue],
) -> Result<(), OperationError> {
    let who = args[0].object()?;
    let manager = args[1].object()?;
    if who == manager {
        return Err(OperationError::invalid("nobody manages themselves"));
    }
    if !employs(graph, company, who)? || !employs(graph, company, manager)? {
        return Err(OperationError::invalid("both must be employees of this company"));
    }
    // Walk up from the new manager; meeting `who` would close a cycle.
    let mut current = Some(manager);
    while let Some(step) = current {
        if step == who {
            return Err(OperationError::invalid("management chain would loop"));
        }
        current = graph.get_object(step, "manager")?;
    }
    graph.set(who, "manager", manager)?;
    Ok(())
}

fn promote(graph: &mut Graph, who: ObjectId, args: &[ArgValue]) -> Result<(), OperationError> {
    let target = args[0].primitive()?.clone();
    let to = level_rank(&target).ok_or_else(|| OperationError::invalid("unknown level"))?;
    let from = graph
        .get_one(who, "level")?
        .as_primitive()
        .and_then(level_rank)
        .unwrap_or(0);
    if to <= from {
        return Err(OperationError::invalid("a promotion must raise the level"));
    }
    graph.set(who, "level", target)?;
    Ok(())
}

fn level_rank(value: &Primitive) -> Option<usize> {
    match value {
        Primitive::Enum { member, .. } => LEVELS.iter().position(|l| *l == member.as_str()),
        _ => None,
    }
}

/// The `Level` member named `member`.
#[must_use]
pub fn level_value(member: &str) -> Primitive {
    Primitive::Enum {
        enum_type: "Level".to_string(),
        member: member.to_string(),
    }
}
