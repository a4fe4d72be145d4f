//! Whole-document ID resolution
//!
//! Runs after every section validated. Declared IDs must be unique, every
//! reference must name a declared ID of a compatible type, and generated IDs
//! get unique names derived from their type.

use std::collections::{HashMap, HashSet};

use crate::config::{ConfigId, ConfigNode, ConfigPath, IdKind, Value};
use crate::errors::{unknown_name_help, ValidationError};
use crate::registry::{ensure_unique_name, TypeTag};

/// Visit every ID, parents before children.
///
/// Within a mapping, the IDs held directly by that mapping come first.
fn walk_ids(value: &mut Value, path: &ConfigPath, visit: &mut dyn FnMut(&mut ConfigId, &ConfigPath)) {
    match value {
        Value::Id(id) => visit(id, path),
        Value::Map(map) => {
            for (key, child) in map.iter_mut() {
                if let Value::Id(id) = child {
                    visit(id, &path.key(key));
                }
            }
            for (key, child) in map.iter_mut() {
                if !matches!(child, Value::Id(_)) {
                    walk_ids(child, &path.key(key), visit);
                }
            }
        }
        Value::List(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                walk_ids(item, &path.index(i), visit);
            }
        }
        _ => {}
    }
}

/// Check and finalize the IDs of a validated document.
///
/// Generated IDs are renamed in place; returns every problem found.
pub fn resolve_ids(root: &mut ConfigNode) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut declared: HashMap<String, (ConfigPath, TypeTag)> = HashMap::new();
    let mut declared_order: Vec<String> = Vec::new();
    let root_path = root.path.clone();

    walk_ids(&mut root.value, &root_path, &mut |id, path| {
        if id.kind != IdKind::Declare {
            return;
        }
        if let Some((first, _)) = declared.get(&id.name) {
            errors.push(
                ValidationError::new(path.clone(), format!("ID '{}' redefined", id.name))
                    .with_help(format!("'{}' was first declared at {}", id.name, first)),
            );
        } else {
            declared.insert(id.name.clone(), (path.clone(), id.ty.clone()));
            declared_order.push(id.name.clone());
        }
    });

    let mut taken: HashSet<String> = declared.keys().cloned().collect();
    walk_ids(&mut root.value, &root_path, &mut |id, _| {
        if id.kind != IdKind::Generated {
            return;
        }
        let name = ensure_unique_name(&id.ty.id_hint(), |n| taken.contains(n));
        taken.insert(name.clone());
        id.name = name;
    });

    walk_ids(&mut root.value, &root_path, &mut |id, path| {
        if id.kind != IdKind::Use {
            return;
        }
        match declared.get(&id.name) {
            None => errors.push(
                ValidationError::new(path.clone(), format!("couldn't find ID '{}'", id.name))
                    .with_help(unknown_name_help(&id.name, &declared_order, "IDs")),
            ),
            Some((_, ty)) if !ty.derives_from(&id.ty) => errors.push(
                ValidationError::new(
                    path.clone(),
                    format!(
                        "ID '{}' of type {} doesn't inherit from {}",
                        id.name, ty, id.ty
                    ),
                )
                .with_help("check that the ID points to the right kind of object"),
            ),
            Some(_) => {}
        }
    });

    errors
}

/// User-declared IDs in document order, parents before children
pub fn declared_ids(root: &ConfigNode) -> Vec<ConfigId> {
    let mut value = root.value.clone();
    let mut out = Vec::new();
    walk_ids(&mut value, &root.path, &mut |id, _| {
        if id.kind == IdKind::Declare {
            out.push(id.clone());
        }
    });
    out
}
