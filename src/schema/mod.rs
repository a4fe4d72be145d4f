//! Configuration schemas
//!
//! A [`Validator`] maps a raw node to its normalized form or to a list of
//! [`ValidationError`]s. Map-shaped levels are described by a [`MapSchema`];
//! they report every problem found at that level rather than stopping at the
//! first, and fold the problems of each child into one entry per key.
//!
//! Validation is idempotent: normalized output validates to itself.

pub mod coerce;
pub mod ids;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::config::{ConfigId, ConfigNode, IdKind, Value};
use crate::errors::{unknown_name_help, ValidationError};
use crate::registry::TypeTag;

pub use ids::{declared_ids, resolve_ids};

/// Result of validating one node
pub type ValidationResult = Result<ConfigNode, Vec<ValidationError>>;

/// A custom coercion of a scalar value
pub type CoerceFn = Rc<dyn Fn(&ConfigNode) -> Result<Value, ValidationError>>;

/// Validates and normalizes one node
#[derive(Clone)]
pub enum Validator {
    /// Accept anything unchanged
    Any,
    Boolean,
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    /// Any scalar, coerced to text
    String,
    /// Only values written as strings
    StringStrict,
    /// Lowercase letters, digits and underscores
    ValidName,
    /// Case-insensitive choice, normalized to the listed spelling
    OneOf(Vec<String>),
    Duration,
    Quantity(String),
    Lambda,
    /// A lambda, or a value for the inner validator
    Templatable(Box<Validator>),
    /// A single item is wrapped into a one-element list
    EnsureList(Box<Validator>),
    ListOf(Box<Validator>),
    Map(MapSchema),
    /// Apply each validator to the previous one's output
    AllOf(Vec<Validator>),
    /// The first validator that accepts the value wins
    AnyOf(Vec<Validator>),
    /// A new ID for an object of the given type
    DeclareId(TypeTag),
    /// A reference to an ID declared elsewhere
    UseId(TypeTag),
    /// Always fails; used for removed keys
    Invalid(String),
    Coerce { name: &'static str, coerce: CoerceFn },
    /// A mapping whose schema is chosen by the value under `key`
    Dispatch {
        key: String,
        choices: Vec<(String, MapSchema)>,
    },
    /// A mapping with exactly one key naming an entry, e.g. an action
    SingleKey {
        kind: String,
        entries: Vec<(String, Validator)>,
    },
    /// An automation: a list of actions, or a mapping with `then`
    Automation(MapSchema),
    /// Built on use, for recursive schemas
    Lazy(fn() -> Validator),
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Any => write!(f, "Any"),
            Validator::Boolean => write!(f, "Boolean"),
            Validator::Int { min, max } => write!(f, "Int({:?}..{:?})", min, max),
            Validator::Float { min, max } => write!(f, "Float({:?}..{:?})", min, max),
            Validator::String => write!(f, "String"),
            Validator::StringStrict => write!(f, "StringStrict"),
            Validator::ValidName => write!(f, "ValidName"),
            Validator::OneOf(choices) => write!(f, "OneOf({:?})", choices),
            Validator::Duration => write!(f, "Duration"),
            Validator::Quantity(unit) => write!(f, "Quantity({})", unit),
            Validator::Lambda => write!(f, "Lambda"),
            Validator::Templatable(inner) => write!(f, "Templatable({:?})", inner),
            Validator::EnsureList(inner) => write!(f, "EnsureList({:?})", inner),
            Validator::ListOf(inner) => write!(f, "ListOf({:?})", inner),
            Validator::Map(schema) => write!(f, "{:?}", schema),
            Validator::AllOf(vs) => write!(f, "AllOf({:?})", vs),
            Validator::AnyOf(vs) => write!(f, "AnyOf({:?})", vs),
            Validator::DeclareId(ty) => write!(f, "DeclareId({})", ty),
            Validator::UseId(ty) => write!(f, "UseId({})", ty),
            Validator::Invalid(msg) => write!(f, "Invalid({:?})", msg),
            Validator::Coerce { name, .. } => write!(f, "Coerce({})", name),
            Validator::Dispatch { key, choices } => {
                let names: Vec<&str> = choices.iter().map(|(n, _)| n.as_str()).collect();
                write!(f, "Dispatch({} in {:?})", key, names)
            }
            Validator::SingleKey { kind, entries } => {
                let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
                write!(f, "SingleKey({} in {:?})", kind, names)
            }
            Validator::Automation(schema) => write!(f, "Automation({:?})", schema),
            Validator::Lazy(_) => write!(f, "Lazy"),
        }
    }
}

/// Shorthand constructors
impl Validator {
    pub fn int() -> Self {
        Validator::Int { min: None, max: None }
    }

    pub fn int_range(min: Option<i64>, max: Option<i64>) -> Self {
        Validator::Int { min, max }
    }

    pub fn float() -> Self {
        Validator::Float { min: None, max: None }
    }

    pub fn one_of(choices: &[&str]) -> Self {
        Validator::OneOf(choices.iter().map(|c| c.to_string()).collect())
    }

    pub fn quantity(unit: &str) -> Self {
        Validator::Quantity(unit.to_string())
    }

    pub fn templatable(inner: Validator) -> Self {
        Validator::Templatable(Box::new(inner))
    }

    pub fn ensure_list(inner: Validator) -> Self {
        Validator::EnsureList(Box::new(inner))
    }

    pub fn list_of(inner: Validator) -> Self {
        Validator::ListOf(Box::new(inner))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Validator::Invalid(message.into())
    }

    pub fn coerce(
        name: &'static str,
        coerce: impl Fn(&ConfigNode) -> Result<Value, ValidationError> + 'static,
    ) -> Self {
        Validator::Coerce {
            name,
            coerce: Rc::new(coerce),
        }
    }
}

fn single(node: &ConfigNode, message: impl Into<String>) -> Vec<ValidationError> {
    vec![ValidationError::new(node.path.clone(), message)]
}

fn coerced(
    node: &ConfigNode,
    result: Result<Value, ValidationError>,
) -> ValidationResult {
    result
        .map(|value| ConfigNode::new(node.path.clone(), value))
        .map_err(|e| vec![e])
}

impl Validator {
    /// Validate `node`, producing its normalized form
    pub fn validate(&self, node: &ConfigNode) -> ValidationResult {
        match self {
            Validator::Any => Ok(node.clone()),
            Validator::Boolean => coerced(node, coerce::boolean(node)),
            Validator::Int { min, max } => coerced(node, coerce::int(node, *min, *max)),
            Validator::Float { min, max } => coerced(node, coerce::float(node, *min, *max)),
            Validator::String => coerced(node, coerce::string(node)),
            Validator::StringStrict => coerced(node, coerce::string_strict(node)),
            Validator::ValidName => coerced(node, coerce::valid_name(node)),
            Validator::OneOf(choices) => coerced(node, coerce::one_of(node, choices)),
            Validator::Duration => coerced(node, coerce::duration(node)),
            Validator::Quantity(unit) => coerced(node, coerce::quantity(node, unit)),
            Validator::Lambda => coerced(node, coerce::lambda(node)),
            Validator::Templatable(inner) => {
                if matches!(node.value, Value::Lambda(_)) {
                    Ok(node.clone())
                } else {
                    inner.validate(node)
                }
            }
            Validator::EnsureList(inner) => match &node.value {
                Value::List(_) => validate_list(inner, node),
                Value::Null => Ok(ConfigNode::new(node.path.clone(), Value::List(Vec::new()))),
                _ => {
                    let wrapped = ConfigNode::new(
                        node.path.clone(),
                        Value::List(vec![node.value.clone()]),
                    );
                    validate_list(inner, &wrapped)
                }
            },
            Validator::ListOf(inner) => match &node.value {
                Value::List(_) => validate_list(inner, node),
                other => Err(single(
                    node,
                    format!("expected a list, got {}", other.type_name()),
                )),
            },
            Validator::Map(schema) => schema.validate(node),
            Validator::AllOf(validators) => {
                let mut current = node.clone();
                for validator in validators {
                    current = validator.validate(&current)?;
                }
                Ok(current)
            }
            Validator::AnyOf(validators) => {
                let mut first_errors = None;
                for validator in validators {
                    match validator.validate(node) {
                        Ok(out) => return Ok(out),
                        Err(errors) => {
                            first_errors.get_or_insert(errors);
                        }
                    }
                }
                Err(first_errors.unwrap_or_else(|| single(node, "no validator accepted the value")))
            }
            Validator::DeclareId(ty) => validate_id(node, ty, IdKind::Declare),
            Validator::UseId(ty) => validate_id(node, ty, IdKind::Use),
            Validator::Invalid(message) => Err(single(node, message.clone())),
            Validator::Coerce { coerce, .. } => coerced(node, coerce(node)),
            Validator::Dispatch { key, choices } => validate_dispatch(node, key, choices),
            Validator::SingleKey { kind, entries } => validate_single_key(node, kind, entries),
            Validator::Automation(schema) => validate_automation(node, schema),
            Validator::Lazy(build) => build().validate(node),
        }
    }
}

fn validate_list(inner: &Validator, node: &ConfigNode) -> ValidationResult {
    let mut out = Vec::new();
    let mut errors = Vec::new();
    for item in node.items() {
        match inner.validate(&item) {
            Ok(valid) => out.push(valid.value),
            Err(errs) => errors.push(ValidationError::fold(item.path.clone(), errs)),
        }
    }
    if errors.is_empty() {
        Ok(ConfigNode::new(node.path.clone(), Value::List(out)))
    } else {
        Err(errors)
    }
}

fn validate_id(node: &ConfigNode, ty: &TypeTag, kind: IdKind) -> ValidationResult {
    let name = match &node.value {
        Value::Id(id) => id.name.clone(),
        Value::String(s) => s.clone(),
        other => {
            return Err(single(
                node,
                format!("an ID must be a string, got {}", other.type_name()),
            ))
        }
    };
    if !coerce::is_cpp_identifier(&name) {
        return Err(vec![ValidationError::new(
            node.path.clone(),
            format!("'{}' is not a valid ID", name),
        )
        .with_help("IDs may contain letters, digits and underscores and must not start with a digit")]);
    }
    // Generated IDs keep their kind when normalized output is validated again
    let kind = match &node.value {
        Value::Id(existing) if existing.kind == IdKind::Generated && kind == IdKind::Declare => {
            IdKind::Generated
        }
        _ => kind,
    };
    if kind != IdKind::Generated && coerce::is_reserved_word(&name) {
        return Err(vec![ValidationError::new(
            node.path.clone(),
            format!("'{}' is a reserved word and can't be used as an ID", name),
        )
        .with_help("pick another ID, for example by adding a suffix such as '_1'")]);
    }
    Ok(ConfigNode::new(
        node.path.clone(),
        Value::Id(ConfigId {
            name,
            ty: ty.clone(),
            kind,
        }),
    ))
}

fn validate_dispatch(
    node: &ConfigNode,
    key: &str,
    choices: &[(String, MapSchema)],
) -> ValidationResult {
    if !matches!(node.value, Value::Map(_)) {
        return Err(single(
            node,
            format!("expected a mapping, got {}", node.value.type_name()),
        ));
    }
    let selector = node.get(key).ok_or_else(|| {
        vec![ValidationError::new(
            node.path.key(key),
            format!("required key '{}' not provided", key),
        )]
    })?;
    let name = selector.value.scalar_text().unwrap_or_default();
    let names: Vec<String> = choices.iter().map(|(n, _)| n.clone()).collect();
    let schema = choices
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, schema)| schema)
        .ok_or_else(|| {
            vec![ValidationError::new(
                selector.path.clone(),
                format!("unknown {} '{}'", key, name),
            )
            .with_help(unknown_name_help(&name, &names, "platforms"))]
        })?;
    schema.validate(node)
}

fn validate_single_key(
    node: &ConfigNode,
    kind: &str,
    entries: &[(String, Validator)],
) -> ValidationResult {
    let map = node.value.as_map().ok_or_else(|| {
        single(
            node,
            format!("expected a {} mapping, got {}", kind, node.value.type_name()),
        )
    })?;
    let names: Vec<String> = entries.iter().map(|(n, _)| n.clone()).collect();
    let keys: Vec<&String> = map.keys().collect();

    match keys.as_slice() {
        [] => Err(single(node, format!("expected a {}", kind))),
        [key] => {
            let validator = entries
                .iter()
                .find(|(n, _)| n == *key)
                .map(|(_, v)| v)
                .ok_or_else(|| {
                    vec![ValidationError::new(
                        node.path.key(key.as_str()),
                        format!("unable to find {} with the name '{}'", kind, key),
                    )
                    .with_help(unknown_name_help(key, &names, &format!("{}s", kind)))]
                })?;
            let child = node.get(key).unwrap_or_else(|| node.clone());
            let valid = validator
                .validate(&child)
                .map_err(|errs| vec![ValidationError::fold(child.path.clone(), errs)])?;
            let mut out = IndexMap::new();
            out.insert(key.to_string(), valid.value);
            Ok(ConfigNode::new(node.path.clone(), Value::Map(out)))
        }
        [first, second, ..] => Err(vec![ValidationError::new(
            node.path.clone(),
            format!(
                "cannot have two {}s in one item; key '{}' overrides '{}'",
                kind, second, first
            ),
        )
        .with_help(format!(
            "did you forget to indent the block inside the {}?",
            kind
        ))]),
    }
}

fn validate_automation(node: &ConfigNode, schema: &MapSchema) -> ValidationResult {
    let wrap_then = |value: Value| {
        let mut map = IndexMap::new();
        map.insert("then".to_string(), value);
        ConfigNode::new(node.path.clone(), Value::Map(map))
    };

    let automations: Vec<ConfigNode> = match &node.value {
        Value::List(items) if !items.is_empty() && items.iter().all(is_automation_map) => {
            node.items()
        }
        Value::List(_) => vec![wrap_then(node.value.clone())],
        Value::Map(_) if is_automation_map(&node.value) => {
            vec![ConfigNode::new(node.path.index(0), node.value.clone())]
        }
        Value::Map(_) => vec![wrap_then(node.value.clone())],
        other => {
            return Err(single(
                node,
                format!("expected an automation, got {}", other.type_name()),
            ))
        }
    };

    let mut out = Vec::new();
    let mut errors = Vec::new();
    for automation in automations {
        match schema.validate(&automation) {
            Ok(valid) => out.push(valid.value),
            Err(errs) => errors.push(ValidationError::fold(automation.path.clone(), errs)),
        }
    }
    if errors.is_empty() {
        Ok(ConfigNode::new(node.path.clone(), Value::List(out)))
    } else {
        Err(errors)
    }
}

fn is_automation_map(value: &Value) -> bool {
    value
        .as_map()
        .map(|map| map.contains_key("then"))
        .unwrap_or(false)
}

/// Whether a key must be present
#[derive(Debug, Clone)]
pub enum Presence {
    Required,
    Optional,
    /// Inserted when absent, then validated like a written value
    Default(Value),
    /// An ID generated from the type's hint when absent
    GenerateId(TypeTag),
}

/// One key of a map schema
#[derive(Debug, Clone)]
pub struct KeySpec {
    pub key: String,
    pub presence: Presence,
    pub validator: Validator,
}

/// Validator for a mapping level
#[derive(Debug, Clone, Default)]
pub struct MapSchema {
    keys: Vec<KeySpec>,
    exclusive: Vec<Vec<String>>,
    allow_extra: bool,
}

impl MapSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_key(mut self, key: &str, presence: Presence, validator: Validator) -> Self {
        let spec = KeySpec {
            key: key.to_string(),
            presence,
            validator,
        };
        match self.keys.iter_mut().find(|k| k.key == key) {
            Some(existing) => *existing = spec,
            None => self.keys.push(spec),
        }
        self
    }

    pub fn required(self, key: &str, validator: Validator) -> Self {
        self.with_key(key, Presence::Required, validator)
    }

    pub fn optional(self, key: &str, validator: Validator) -> Self {
        self.with_key(key, Presence::Optional, validator)
    }

    pub fn optional_default(self, key: &str, default: impl Into<Value>, validator: Validator) -> Self {
        self.with_key(key, Presence::Default(default.into()), validator)
    }

    /// Declared ID under `key`, generated when absent
    pub fn generate_id(self, key: &str, ty: TypeTag) -> Self {
        let validator = Validator::DeclareId(ty.clone());
        self.with_key(key, Presence::GenerateId(ty), validator)
    }

    /// At most one of `keys` may be present
    pub fn exclusive(mut self, keys: &[&str]) -> Self {
        self.exclusive
            .push(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Accept and keep keys the schema does not name
    pub fn allow_extra(mut self) -> Self {
        self.allow_extra = true;
        self
    }

    /// Combine with `other`; keys of `other` override keys of the same name
    pub fn extend(mut self, other: MapSchema) -> Self {
        for spec in other.keys {
            self = self.with_key(&spec.key.clone(), spec.presence, spec.validator);
        }
        self.exclusive.extend(other.exclusive);
        self.allow_extra |= other.allow_extra;
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.key.as_str())
    }

    /// Validate a mapping node.
    ///
    /// Output keeps the input order, followed by defaults and generated IDs in
    /// schema order.
    pub fn validate(&self, node: &ConfigNode) -> ValidationResult {
        let map = match &node.value {
            Value::Map(map) => map,
            other => {
                return Err(single(
                    node,
                    format!("expected a mapping, got {}", other.type_name()),
                ))
            }
        };

        let known: Vec<String> = self.keys.iter().map(|k| k.key.clone()).collect();
        let mut out = IndexMap::new();
        let mut errors = Vec::new();

        for group in &self.exclusive {
            let present: Vec<&String> = group.iter().filter(|k| map.contains_key(*k)).collect();
            if present.len() > 1 {
                let names: Vec<String> = present.iter().map(|k| format!("'{}'", k)).collect();
                errors.push(
                    ValidationError::new(
                        node.path.clone(),
                        format!(
                            "cannot specify {} at the same time",
                            names.join(" and ")
                        ),
                    )
                    .with_help("these options are mutually exclusive; keep only one"),
                );
            }
        }

        for (key, value) in map {
            let child = ConfigNode::new(node.path.key(key), value.clone());
            match self.keys.iter().find(|k| k.key == *key) {
                Some(spec) => match spec.validator.validate(&child) {
                    Ok(valid) => {
                        out.insert(key.clone(), valid.value);
                    }
                    Err(errs) => errors.push(ValidationError::fold(child.path.clone(), errs)),
                },
                None if self.allow_extra => {
                    out.insert(key.clone(), value.clone());
                }
                None => errors.push(
                    ValidationError::new(child.path.clone(), format!("'{}' is an invalid option", key))
                        .with_help(unknown_name_help(key, &known, "options")),
                ),
            }
        }

        for spec in &self.keys {
            if map.contains_key(&spec.key) {
                continue;
            }
            let path = node.path.key(&spec.key);
            match &spec.presence {
                Presence::Required => errors.push(ValidationError::new(
                    path,
                    format!("required key '{}' not provided", spec.key),
                )),
                Presence::Optional => {}
                Presence::Default(default) => {
                    let child = ConfigNode::new(path.clone(), default.clone());
                    match spec.validator.validate(&child) {
                        Ok(valid) => {
                            out.insert(spec.key.clone(), valid.value);
                        }
                        Err(errs) => errors.push(ValidationError::fold(path, errs)),
                    }
                }
                Presence::GenerateId(ty) => {
                    out.insert(spec.key.clone(), Value::Id(ConfigId::generated(ty.clone())));
                }
            }
        }

        if errors.is_empty() {
            Ok(ConfigNode::new(node.path.clone(), Value::Map(out)))
        } else {
            Err(errors)
        }
    }
}

/// Validate `node` against `schema`
pub fn validate(schema: &MapSchema, node: &ConfigNode) -> ValidationResult {
    schema.validate(node)
}
