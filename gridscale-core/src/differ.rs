//! Differ - Compare desired state with current state
//!
//! Compares the desired attributes of a resource block with the state last
//! read from the API and decides whether the object must be created,
//! updated in place, replaced or left alone.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeType, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A force-new attribute changed -> delete and create again
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
        forced_by: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but not in desired state -> needs deletion
    Delete(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }

    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Diff::Create(r) => &r.id,
            Diff::Update { id, .. } | Diff::Replace { id, .. } => id,
            Diff::NoChange(id) | Diff::Delete(id) => id,
        }
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(schema: &ResourceSchema, desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let mut changed = find_changed_attributes(schema, &desired.attributes, &current.attributes);
    changed.sort();

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let forced_by: Vec<String> = changed
        .iter()
        .filter(|name| schema.get(name).is_some_and(|a| a.force_new))
        .cloned()
        .collect();

    if forced_by.is_empty() {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
            forced_by,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    schema: &ResourceSchema,
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, attr) in &schema.attributes {
        if attr.is_computed_only() {
            continue;
        }

        let desired_value = desired.get(key).or(attr.default.as_ref());
        match (desired_value, current.get(key)) {
            (Some(d), Some(c)) if attribute_eq(&attr.attr_type, d, c) => {}
            (Some(d), None) if d.is_zero() => {}
            // Optional + computed attributes keep the remote value when unset
            (None, _) if attr.computed => {}
            (None, None) => {}
            (None, Some(c)) if c.is_zero() => {}
            _ => changed.push(key.clone()),
        }
    }

    changed
}

/// Compare two values of an attribute, ignoring order for sets
pub fn attribute_eq(attr_type: &AttributeType, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(xs), Value::List(ys)) if attr_type.is_set() => {
            xs.len() == ys.len() && xs.iter().all(|x| ys.contains(x)) && ys.iter().all(|y| xs.contains(y))
        }
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
        _ => a == b,
    }
}

/// Compute Diffs for multiple resources
///
/// States without a matching desired resource are scheduled for deletion.
/// Data sources and resources without a schema are skipped.
pub fn create_plan(
    schemas: &HashMap<String, ResourceSchema>,
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
) -> Vec<Diff> {
    let mut plan = Vec::new();

    for resource in desired.iter().filter(|r| !r.is_data_source()) {
        let Some(schema) = schemas.get(&resource.id.resource_type) else {
            continue;
        };
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let d = diff(schema, resource, &current);
        if d.is_change() {
            plan.push(d);
        }
    }

    let mut orphans: Vec<&ResourceId> = current_states
        .iter()
        .filter(|(id, state)| state.exists && !desired.iter().any(|r| &r.id == *id))
        .map(|(id, _)| id)
        .collect();
    orphans.sort_by_key(|id| id.to_string());
    plan.extend(orphans.into_iter().cloned().map(Diff::Delete));

    plan
}
